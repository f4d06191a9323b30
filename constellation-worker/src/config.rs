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

use constellation_common::config::ConfigLoader;
use constellation_common::tracing::TracingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkerConfig {
    #[serde(default)]
    pub controller: ControllerEndpointConfig,
    #[serde(default = "default_connection_check_interval_ms")]
    pub connection_check_interval_ms: u64,
    #[serde(default)]
    pub logging: TracingConfig,
}

fn default_connection_check_interval_ms() -> u64 {
    5000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            controller: ControllerEndpointConfig::default(),
            connection_check_interval_ms: default_connection_check_interval_ms(),
            logging: TracingConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn connection_check_interval(&self) -> Duration {
        Duration::from_millis(self.connection_check_interval_ms)
    }

    pub fn validate(&self) -> Result<(), WorkerConfigError> {
        if self.connection_check_interval_ms < 1000 {
            return Err(WorkerConfigError::ConnectionCheckIntervalTooSmall(
                self.connection_check_interval_ms,
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControllerEndpointConfig {
    pub hostname: String,
    pub port: u16,
    pub ssl: bool,
}

impl ControllerEndpointConfig {
    pub fn url(&self) -> Url {
        let scheme = if self.ssl { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}:{}", self.hostname, self.port))
            .expect("Failed to parse controller URL")
    }
}

impl Default for ControllerEndpointConfig {
    fn default() -> Self {
        ControllerEndpointConfig {
            hostname: "127.0.0.1".to_string(),
            port: 8001,
            ssl: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerConfigError {
    #[error("ConnectionCheckIntervalMs must be at least 1000, got {0}")]
    ConnectionCheckIntervalTooSmall(u64),
}

pub fn make_config_loader() -> ConfigLoader<WorkerConfig> {
    ConfigLoader::new(Path::new("constellation-worker.json"))
}
