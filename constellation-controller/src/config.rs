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

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControllerConfig {
    #[serde(default)]
    pub webserver: WebserverConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: TracingConfig,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.socket.validate()?;
        self.heartbeat.validate()?;
        self.proxy.validate()?;
        self.admin.validate()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebserverConfig {
    pub hostname: String,
    pub port: u16,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        WebserverConfig {
            hostname: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SocketConfig {
    pub hostnames: Vec<String>,
    pub port: u16,
    pub ssl: bool,
}

impl SocketConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.hostnames.is_empty() {
            return Err(ConfigValidationError::NoSocketHostnames);
        }
        Ok(())
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig {
            hostnames: vec!["0.0.0.0".to_string()],
            port: 8001,
            ssl: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    pub max_failures: u32,
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.interval_ms < 1000 {
            return Err(ConfigValidationError::HeartbeatIntervalTooSmall(
                self.interval_ms,
            ));
        }
        if self.max_failures < 1 {
            return Err(ConfigValidationError::HeartbeatMaxFailuresZero);
        }
        Ok(())
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            interval_ms: 2000,
            max_failures: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyConfig {
    pub timeout_ms: u64,
    pub response_retention_ms: u64,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timeout_ms < 1000 {
            return Err(ConfigValidationError::ProxyTimeoutTooSmall(self.timeout_ms));
        }
        if self.response_retention_ms < 1000 {
            return Err(ConfigValidationError::ResponseRetentionTooSmall(
                self.response_retention_ms,
            ));
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            timeout_ms: 30000,
            response_retention_ms: 30000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminConfig {
    pub api_key_header: String,
    pub api_keys: Vec<String>,
}

impl AdminConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.api_keys.is_empty() {
            return Err(ConfigValidationError::NoApiKeys);
        }
        Ok(())
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            api_key_header: "x-api-key".to_string(),
            api_keys: vec!["constellation-admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Heartbeat.IntervalMs must be at least 1000, got {0}")]
    HeartbeatIntervalTooSmall(u64),
    #[error("Heartbeat.MaxFailures must be at least 1")]
    HeartbeatMaxFailuresZero,
    #[error("Proxy.TimeoutMs must be at least 1000, got {0}")]
    ProxyTimeoutTooSmall(u64),
    #[error("Proxy.ResponseRetentionMs must be at least 1000, got {0}")]
    ResponseRetentionTooSmall(u64),
    #[error("Admin.ApiKeys must not be empty")]
    NoApiKeys,
    #[error("Socket.Hostnames must not be empty")]
    NoSocketHostnames,
}

pub fn make_config_loader() -> ConfigLoader<ControllerConfig> {
    ConfigLoader::new(Path::new("constellation.json"))
}
