//! Per-model controller tunables and top-level settings, persisted as YAML.
//!
//! `serde(default)` on every field means loading an older file and
//! re-saving it fills in any keys a newer binary added — the
//! default-merge-on-load behavior the startup sequence relies on (§4.10
//! step 2: load the matching config, then persist it back so new keys
//! appear in the file).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controllers::idle::{blink::BlinkConfig, body_swing::BodySwingConfig, breathing::BreathingConfig, mouth_expression::MouthExpressionConfig};
use crate::controllers::oneshot::mouth_sync::MouthSyncConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControllerConfig {
    #[serde(default)]
    pub blink: BlinkConfigYaml,
    #[serde(default)]
    pub breathing: BreathingConfigYaml,
    #[serde(default)]
    pub body_swing: BodySwingConfigYaml,
    #[serde(default)]
    pub mouth_expression: MouthExpressionConfigYaml,
    #[serde(default)]
    pub mouth_sync: MouthSyncConfigYaml,
}

macro_rules! yaml_wrapper {
    ($yaml_name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $yaml_name(pub $inner);

        impl Default for $yaml_name {
            fn default() -> Self {
                Self(<$inner>::default())
            }
        }
    };
}

yaml_wrapper!(BlinkConfigYaml, BlinkConfig);
yaml_wrapper!(BreathingConfigYaml, BreathingConfig);
yaml_wrapper!(BodySwingConfigYaml, BodySwingConfig);
yaml_wrapper!(MouthExpressionConfigYaml, MouthExpressionConfig);
yaml_wrapper!(MouthSyncConfigYaml, MouthSyncConfig);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfigPersisted {
    #[serde(default)]
    pub room: String,
    #[serde(default = "default_trigger_count")]
    pub trigger_count: usize,
    #[serde(default = "default_trigger_time")]
    pub trigger_time_secs: f64,
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
}

fn default_trigger_count() -> usize {
    5
}

fn default_trigger_time() -> f64 {
    10.0
}

impl Default for ChatConfigPersisted {
    fn default() -> Self {
        Self { room: String::new(), trigger_count: default_trigger_count(), trigger_time_secs: default_trigger_time(), credentials: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub chat: ChatConfigPersisted,
}

pub struct ConfigStore {
    configs_dir: PathBuf,
    global_path: PathBuf,
}

impl ConfigStore {
    pub fn new(configs_dir: impl Into<PathBuf>, global_path: impl Into<PathBuf>) -> Self {
        Self { configs_dir: configs_dir.into(), global_path: global_path.into() }
    }

    fn model_path(&self, model_name: Option<&str>) -> PathBuf {
        let file_name = model_name.unwrap_or("default");
        self.configs_dir.join(format!("{file_name}.yaml"))
    }

    pub fn load_model_config(&self, model_name: Option<&str>) -> Result<ControllerConfig, ConfigError> {
        load_yaml_or_default(&self.model_path(model_name))
    }

    pub fn save_model_config(&self, model_name: Option<&str>, config: &ControllerConfig) -> Result<(), ConfigError> {
        save_yaml(&self.model_path(model_name), config)
    }

    pub fn load_global(&self) -> Result<GlobalConfig, ConfigError> {
        load_yaml_or_default(&self.global_path)
    }

    pub fn save_global(&self, config: &GlobalConfig) -> Result<(), ConfigError> {
        save_yaml(&self.global_path, config)
    }
}

fn load_yaml_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
}

fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    }
    let text = serde_yaml::to_string(value).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), dir.path().join("settings.yaml"));
        let config = store.load_model_config(Some("nonexistent")).unwrap();
        assert_eq!(config.blink.0.open_max, BlinkConfig::default().open_max);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), dir.path().join("settings.yaml"));
        let mut config = ControllerConfig::default();
        config.blink.0.open_max = 0.9;
        store.save_model_config(Some("shizuku"), &config).unwrap();
        let loaded = store.load_model_config(Some("shizuku")).unwrap();
        assert_eq!(loaded.blink.0.open_max, 0.9);
    }
}
