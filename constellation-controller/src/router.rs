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
use crate::error::RoutingError;
use crate::model::RegisteredWorker;
use crate::registry::WorkerRegistry;
use std::sync::Arc;
use tracing::debug;

/// Picks the worker for a resource key: the existing healthy owner when
/// there is one, otherwise the next healthy worker in round-robin order.
/// The whole decision runs under the registry lock (bindings second), so
/// there is a single consistent owner for every key at every moment.
pub struct ResourceRouter {
    registry: Arc<WorkerRegistry>,
    bindings: Arc<BindingTable>,
}

impl ResourceRouter {
    pub fn new(registry: Arc<WorkerRegistry>, bindings: Arc<BindingTable>) -> ResourceRouter {
        ResourceRouter { registry, bindings }
    }

    pub fn route(&self, resource: &str) -> Result<Arc<RegisteredWorker>, RoutingError> {
        let mut state = self.registry.lock_state();

        if let Some(owner) = self.bindings.owner(resource) {
            if let Some(worker) = state
                .workers
                .iter()
                .find(|worker| worker.id == owner && worker.is_healthy())
            {
                return Ok(worker.clone());
            }
            // the recorded owner is gone or unhealthy; the binding is stale
            self.bindings.evict_key(resource);
        }

        let count = state.workers.len();
        for step in 1..=count {
            let index = (state.cursor + step) % count;
            let candidate = state.workers[index].clone();
            if candidate.is_healthy() {
                // the cursor moves only when a new binding is recorded, so
                // reusing a pinned owner does not skew the distribution
                state.cursor = index;
                self.bindings.bind(resource, candidate.id);
                debug!(resource, worker_id = %candidate.id, "bound resource to worker");
                return Ok(candidate);
            }
        }

        Err(RoutingError::NoWorkers {
            resource: resource.to_string(),
        })
    }
}
