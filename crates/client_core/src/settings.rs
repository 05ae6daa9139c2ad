use std::{collections::HashMap, fs, path::PathBuf, str::FromStr, time::Duration};

use chain::RpcConfig;
use shared::domain::Address;
use storage::{DeploymentStore, HardhatArtifacts};
use thiserror::Error;

use crate::confirm::ConfirmationPolicy;

pub const SETTINGS_FILE: &str = "recipe.toml";
pub const DEFAULT_LENS_HUB: &str = "0x5de679113eA5fdC6a0239fBbBb8C476456dD4A1A";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse {path}: {source}")]
    File {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for '{key}': {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub rpc_url: String,
    pub network: String,
    pub deployments_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub lens_hub: Address,
    pub module_registry: Option<Address>,
    pub metadata_upload_url: Option<String>,
    pub metadata_uri_scheme: String,
    pub confirmation_timeout_secs: u64,
    pub confirmation_poll_interval_ms: u64,
    pub registration_settle_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            network: "localhost".into(),
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            lens_hub: Address::from_str(DEFAULT_LENS_HUB).unwrap_or(Address::ZERO),
            module_registry: None,
            metadata_upload_url: None,
            metadata_uri_scheme: "ar".into(),
            confirmation_timeout_secs: 60,
            confirmation_poll_interval_ms: 500,
            registration_settle_secs: 0,
            http_timeout_secs: 30,
        }
    }
}

// (settings key, env names in ascending precedence)
const ENV_KEYS: &[(&str, &[&str])] = &[
    ("rpc_url", &["RPC_URL", "APP__RPC_URL"]),
    ("network", &["NETWORK", "APP__NETWORK"]),
    ("deployments_dir", &["DEPLOYMENTS_DIR", "APP__DEPLOYMENTS_DIR"]),
    ("artifacts_dir", &["ARTIFACTS_DIR", "APP__ARTIFACTS_DIR"]),
    ("lens_hub", &["LENS_HUB", "APP__LENS_HUB"]),
    ("module_registry", &["MODULE_REGISTRY", "APP__MODULE_REGISTRY"]),
    (
        "metadata_upload_url",
        &["METADATA_UPLOAD_URL", "APP__METADATA_UPLOAD_URL"],
    ),
    ("metadata_uri_scheme", &["APP__METADATA_URI_SCHEME"]),
    (
        "confirmation_timeout_secs",
        &["APP__CONFIRMATION_TIMEOUT_SECS"],
    ),
    (
        "confirmation_poll_interval_ms",
        &["APP__CONFIRMATION_POLL_INTERVAL_MS"],
    ),
    (
        "registration_settle_secs",
        &["APP__REGISTRATION_SETTLE_SECS"],
    ),
    ("http_timeout_secs", &["APP__HTTP_TIMEOUT_SECS"]),
];

fn parse_secs(key: &str, value: &str) -> Result<u64, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_address(key: &str, value: &str) -> Result<Address, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Settings {
    /// Sets one key from its string form. Unknown keys are ignored.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "rpc_url" => self.rpc_url = value.trim().to_string(),
            "network" => self.network = value.trim().to_string(),
            "deployments_dir" => self.deployments_dir = PathBuf::from(value.trim()),
            "artifacts_dir" => self.artifacts_dir = PathBuf::from(value.trim()),
            "lens_hub" => self.lens_hub = parse_address(key, value)?,
            "module_registry" => {
                self.module_registry = match non_empty(value) {
                    Some(raw) => Some(parse_address(key, &raw)?),
                    None => None,
                }
            }
            "metadata_upload_url" => self.metadata_upload_url = non_empty(value),
            "metadata_uri_scheme" => self.metadata_uri_scheme = value.trim().to_string(),
            "confirmation_timeout_secs" => self.confirmation_timeout_secs = parse_secs(key, value)?,
            "confirmation_poll_interval_ms" => {
                self.confirmation_poll_interval_ms = parse_secs(key, value)?
            }
            "registration_settle_secs" => self.registration_settle_secs = parse_secs(key, value)?,
            "http_timeout_secs" => self.http_timeout_secs = parse_secs(key, value)?,
            _ => {}
        }
        Ok(())
    }

    pub fn apply_toml(&mut self, raw: &str) -> Result<(), toml::de::Error> {
        let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
        for (key, value) in file_cfg {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            // A bad value in the file should not hide the env overlay.
            if let Err(err) = self.apply(&key, &value) {
                tracing::warn!(%err, "ignoring settings file entry");
            }
        }
        Ok(())
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, names) in ENV_KEYS {
            for name in *names {
                if let Some(value) = lookup(name) {
                    self.apply(key, &value)?;
                }
            }
        }
        Ok(())
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.confirmation_poll_interval_ms.max(1)),
            timeout: Some(Duration::from_secs(self.confirmation_timeout_secs)),
        }
    }

    pub fn registration_settle_delay(&self) -> Duration {
        Duration::from_secs(self.registration_settle_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            url: self.rpc_url.clone(),
            request_timeout: self.http_timeout(),
        }
    }

    pub fn deployment_store(&self) -> DeploymentStore {
        DeploymentStore::new(&self.deployments_dir, &self.network)
    }

    pub fn hardhat_artifacts(&self) -> HardhatArtifacts {
        HardhatArtifacts::new(&self.artifacts_dir)
    }
}

/// Defaults, then `recipe.toml` in the working directory, then environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings
            .apply_toml(&raw)
            .map_err(|source| SettingsError::File {
                path: PathBuf::from(SETTINGS_FILE),
                source,
            })?;
    }

    settings.apply_env(|name| std::env::var(name).ok())?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_node_and_lens_hub() {
        let settings = Settings::default();
        assert_eq!(settings.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(
            settings.lens_hub.to_string(),
            DEFAULT_LENS_HUB.to_ascii_lowercase()
        );
        assert_eq!(settings.module_registry, None);
        assert_eq!(settings.registration_settle_delay(), Duration::ZERO);
    }

    #[test]
    fn file_then_env_overlay() {
        let mut settings = Settings::default();
        settings
            .apply_toml(
                r#"
                network = "mumbai"
                module_registry = "0x1111111111111111111111111111111111111111"
                confirmation_timeout_secs = 5
                "#,
            )
            .expect("toml");
        assert_eq!(settings.network, "mumbai");
        assert_eq!(settings.confirmation_timeout_secs, 5);

        let env: HashMap<&str, &str> = HashMap::from([
            ("MODULE_REGISTRY", "0x2222222222222222222222222222222222222222"),
            ("APP__MODULE_REGISTRY", "0x3333333333333333333333333333333333333333"),
            ("LENS_HUB", "0x4444444444444444444444444444444444444444"),
        ]);
        settings
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .expect("env");

        assert_eq!(
            settings.module_registry,
            Some(Address([0x33; 20])),
            "APP__ names win over plain names"
        );
        assert_eq!(settings.lens_hub, Address([0x44; 20]));
        assert_eq!(settings.network, "mumbai");
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(|name| (name == "LENS_HUB").then(|| "not-an-address".to_string()))
            .expect_err("invalid hub");
        assert!(matches!(err, SettingsError::Invalid { key, .. } if key == "lens_hub"));
    }

    #[test]
    fn empty_registry_clears_it() {
        let mut settings = Settings::default();
        settings
            .apply("module_registry", "0x1111111111111111111111111111111111111111")
            .expect("set");
        settings.apply("module_registry", "  ").expect("clear");
        assert_eq!(settings.module_registry, None);
    }
}
