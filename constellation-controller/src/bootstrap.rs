// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::bindings::BindingTable;
use crate::config::ControllerConfig;
use crate::correlator::Correlator;
use crate::registry::WorkerRegistry;
use crate::router::ResourceRouter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// All controller-wide state, assembled once and passed explicitly so
/// multiple controllers can coexist in one process (tests do this).
#[derive(Clone)]
pub struct Services {
    pub config: Arc<ControllerConfig>,
    pub registry: Arc<WorkerRegistry>,
    pub bindings: Arc<BindingTable>,
    pub router: Arc<ResourceRouter>,
    pub correlator: Arc<Correlator>,
    pub cancellation: CancellationToken,
}

impl Services {
    pub fn new(config: ControllerConfig) -> Services {
        let config = Arc::new(config);
        let bindings = Arc::new(BindingTable::new());
        let registry = Arc::new(WorkerRegistry::new(bindings.clone()));
        let router = Arc::new(ResourceRouter::new(registry.clone(), bindings.clone()));
        let correlator = Arc::new(Correlator::new(config.proxy.response_retention_ms));

        Services {
            config,
            registry,
            bindings,
            router,
            correlator,
            cancellation: CancellationToken::new(),
        }
    }
}
