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

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TracingConfig {
    #[serde(default = "default_min_level")]
    pub min_level: String,
    #[serde(default)]
    pub console: ConsoleTracingConfig,
    #[serde(default)]
    pub file: FileTracingConfig,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            min_level: default_min_level(),
            console: ConsoleTracingConfig::default(),
            file: FileTracingConfig::default(),
        }
    }
}

fn default_min_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsoleTracingConfig {
    pub enabled: bool,
    pub colors: bool,
    pub json: bool,
}

impl Default for ConsoleTracingConfig {
    fn default() -> Self {
        ConsoleTracingConfig {
            enabled: true,
            colors: true,
            json: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileTracingConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for FileTracingConfig {
    fn default() -> Self {
        FileTracingConfig {
            enabled: false,
            path: PathBuf::from("constellation.log"),
        }
    }
}

/// Initializes the global subscriber from the configuration, with
/// `RUST_LOG` taking precedence over the configured minimum level.
/// Call once, from the binary entry point.
pub fn init_tracing_with_default_env_filter(config: &TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.min_level.clone()));

    tracing_subscriber::registry()
        .with(make_layers(config))
        .with(env_filter)
        .init();
}

/// Test variant: defaults to `debug` and tolerates an already installed
/// subscriber, so test dependencies can initialize it eagerly.
pub fn init_tracing_with_default_debug_env_filter(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(make_layers(config))
        .with(env_filter)
        .try_init();
}

fn make_layers(config: &TracingConfig) -> Vec<Box<dyn Layer<Registry> + Send + Sync>> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console.enabled {
        if config.console.json {
            layers.push(tracing_subscriber::fmt::layer().json().boxed());
        } else {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.console.colors)
                    .boxed(),
            );
        }
    }

    if config.file.enabled {
        match File::create(&config.file.path) {
            Ok(file) => layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .boxed(),
            ),
            Err(error) => eprintln!(
                "Failed to open log file {}: {error}",
                config.file.path.display()
            ),
        }
    }

    layers
}
