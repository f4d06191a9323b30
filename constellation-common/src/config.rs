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

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CONSTELLATION__";

pub trait ConfigLoaderConfig: Default + Serialize + DeserializeOwned {}

impl<T: Default + Serialize + DeserializeOwned> ConfigLoaderConfig for T {}

/// Loads a configuration type from its JSON settings file merged with
/// `CONSTELLATION__*` environment variables, on top of the type's defaults.
/// When the settings file does not exist yet it is created with the
/// defaults, so a freshly deployed process leaves a template behind.
pub struct ConfigLoader<T: ConfigLoaderConfig> {
    pub config_file_name: PathBuf,
    phantom: PhantomData<T>,
}

impl<T: ConfigLoaderConfig> ConfigLoader<T> {
    pub fn new(config_file_name: &Path) -> ConfigLoader<T> {
        ConfigLoader {
            config_file_name: config_file_name.to_path_buf(),
            phantom: PhantomData,
        }
    }

    pub fn figment(&self) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(T::default()))
            .merge(Json::file(&self.config_file_name))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| env_key_to_pascal(key.as_str()).into())
                    .split("__"),
            )
    }

    pub fn load(&self) -> figment::Result<T> {
        self.figment().extract()
    }

    /// Writes the default configuration to the settings file if it is
    /// missing. Returns whether the file was created.
    pub fn ensure_config_file(&self) -> std::io::Result<bool> {
        if self.config_file_name.exists() {
            return Ok(false);
        }
        let defaults =
            serde_json::to_string_pretty(&T::default()).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_file_name, defaults)?;
        Ok(true)
    }

    /// Standard binary entry point: with `--dump-config` on the command line
    /// the default configuration is printed and `None` is returned, telling
    /// the caller to exit; otherwise the configuration is loaded (creating
    /// the settings file first if needed).
    pub fn load_or_dump_config(&self) -> Option<T> {
        if std::env::args().any(|arg| arg == "--dump-config") {
            let dump = serde_json::to_string_pretty(&T::default())
                .expect("Failed to serialize default config");
            println!("{dump}");
            return None;
        }

        if let Err(error) = self.ensure_config_file() {
            eprintln!(
                "Failed to create settings file {}: {error}",
                self.config_file_name.display()
            );
            return None;
        }

        match self.load() {
            Ok(config) => Some(config),
            Err(error) => {
                eprintln!(
                    "Failed to load configuration from {}: {error}",
                    self.config_file_name.display()
                );
                None
            }
        }
    }
}

/// Settings keys are PascalCase on disk; environment segments arrive as
/// `SCREAMING_SNAKE` and are folded to match
/// (`HEARTBEAT__INTERVAL_MS` → `Heartbeat__IntervalMs`).
fn env_key_to_pascal(key: &str) -> String {
    key.split("__")
        .map(|segment| {
            segment
                .split('_')
                .filter(|word| !word.is_empty())
                .map(|word| {
                    let word = word.to_ascii_lowercase();
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use test_r::test;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct SampleConfig {
        name: String,
        count: u32,
    }

    impl Default for SampleConfig {
        fn default() -> Self {
            SampleConfig {
                name: "default".to_string(),
                count: 3,
            }
        }
    }

    #[test]
    fn missing_file_yields_defaults_and_creates_template() {
        let dir = std::env::temp_dir().join(format!("constellation-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.json");

        let loader: ConfigLoader<SampleConfig> = ConfigLoader::new(&path);
        assert!(loader.ensure_config_file().unwrap());
        assert_eq!(loader.load().unwrap(), SampleConfig::default());

        // a second run finds the file already in place
        assert!(!loader.ensure_config_file().unwrap());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn env_keys_fold_to_settings_casing() {
        assert_eq!(
            env_key_to_pascal("HEARTBEAT__INTERVAL_MS"),
            "Heartbeat__IntervalMs"
        );
        assert_eq!(
            env_key_to_pascal("ADMIN__API_KEY_HEADER"),
            "Admin__ApiKeyHeader"
        );
        assert_eq!(env_key_to_pascal("SOCKET__SSL"), "Socket__Ssl");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = std::env::temp_dir().join(format!("constellation-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.json");
        std::fs::write(&path, r#"{ "Name": "from-file" }"#).unwrap();

        let loader: ConfigLoader<SampleConfig> = ConfigLoader::new(&path);
        let config = loader.load().unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.count, 3);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
