//! Configuration traits and the agent `conf.yaml` layout.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};
use crate::{Format, LoggingConfig, ZenohConfig};

/// Default collection interval when an instance does not set one.
pub const DEFAULT_MIN_COLLECTION_INTERVAL_SECS: u64 = 15;

/// Trait for check configuration types.
///
/// Implement this trait for a check's configuration struct to get
/// automatic loading, validation, and access to common config fields.
/// Most checks use [`CheckConfigFile`] directly.
pub trait CheckConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the serialization format for submissions.
    fn serialization(&self) -> Format {
        Format::Json
    }

    /// Get the key expression prefix for this check.
    fn key_prefix(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path.
    ///
    /// YAML for `.yaml`/`.yml` files, JSON5 otherwise. Calls
    /// [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CheckError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let config: Self = integrations_common::load_config(path)?;

        config.validate()?;

        Ok(config)
    }
}

/// The agent's per-check configuration file.
///
/// ```yaml
/// zenoh: { mode: peer }
/// logging: { level: info }
/// init_config: { ... }
/// instances:
///   - { ... }
/// ```
///
/// Instances stay raw mappings so each check can report its own
/// configuration errors instance by instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfigFile<N = serde_json::Value> {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Serialization format for submissions.
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Key expression prefix.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Settings shared by all instances.
    pub init_config: Option<N>,

    /// One mapping per monitored target.
    #[serde(default)]
    pub instances: Vec<serde_json::Value>,
}

fn default_key_prefix() -> String {
    integrations_common::KEY_PREFIX.to_string()
}

impl<N: DeserializeOwned> CheckConfig for CheckConfigFile<N> {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn serialization(&self) -> Format {
        self.serialization
    }

    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(CheckError::configuration(
                "At least one instance must be configured",
            ));
        }

        for (i, instance) in self.instances.iter().enumerate() {
            if !instance.is_object() {
                return Err(CheckError::configuration(format!(
                    "Instance #{} must be a mapping",
                    i
                )));
            }
        }

        Ok(())
    }
}

impl<N: Default + Clone> CheckConfigFile<N> {
    /// Init config, or its default when the file leaves it empty.
    pub fn init_config_or_default(&self) -> N {
        self.init_config.clone().unwrap_or_default()
    }
}

/// Collection interval of an instance (`min_collection_interval`).
///
/// Values that are not positive or do not fit a `Duration` fall back to the
/// default.
pub fn min_collection_interval(instance: &serde_json::Value) -> std::time::Duration {
    instance
        .get("min_collection_interval")
        .and_then(integrations_common::as_float)
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| std::time::Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(std::time::Duration::from_secs(
            DEFAULT_MIN_COLLECTION_INTERVAL_SECS,
        ))
}
