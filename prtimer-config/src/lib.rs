//! # prtimer Configuration
//!
//! Layered configuration for the timer engine.
//!
//! ## Sources (lowest to highest precedence)
//! 1. Built-in defaults
//! 2. `config/prtimer.yaml`
//! 3. `config/<PRTIMER_ENV>.yaml`
//! 4. `PRTIMER_*` environment variables, `__` separating nested keys

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod queue;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use queue::{QueueConfig, SubmissionMode};
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/prtimer.yaml";
const ENV_PREFIX: &str = "PRTIMER_";

/// Top-level configuration for one timer engine instance.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct EngineConfig {
    /// Command queue sizing and submission policy.
    #[validate(nested)]
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging parameters.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Load configuration from the default files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            tracing::debug!("{BASE_FILE} not found, using default configuration");
        }

        if let Ok(env) = std::env::var("PRTIMER_ENV") {
            let env_file = format!("config/{env}.yaml");
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file, still honouring `PRTIMER_*` overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that read or write `PRTIMER_*` variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn default_config_validates() {
        let config = EngineConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.queue.capacity, 1024);
        assert_eq!(config.queue.submission, SubmissionMode::Ordered);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = EngineConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn shipped_config_file_loads() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/prtimer.yaml");
        let config = EngineConfig::load_from_path(path).unwrap();
        assert_eq!(config.queue.capacity, 1024);
        assert_eq!(config.queue.submission, SubmissionMode::Ordered);
        assert_eq!(config.telemetry.log_filter, "info");
        assert!(config.telemetry.thread_names);
    }

    #[test]
    fn file_values_are_validated() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let path = std::env::temp_dir().join(format!("prtimer-{}.yaml", std::process::id()));
        std::fs::write(&path, "queue:\n  capacity: 4\n").unwrap();
        let result = EngineConfig::load_from_path(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn environment_override() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::env::set_var("PRTIMER_QUEUE__CAPACITY", "4096");
        std::env::set_var("PRTIMER_QUEUE__SUBMISSION", "detached");
        let config = EngineConfig::load();
        std::env::remove_var("PRTIMER_QUEUE__CAPACITY");
        std::env::remove_var("PRTIMER_QUEUE__SUBMISSION");

        let config = config.unwrap();
        assert_eq!(config.queue.capacity, 4096);
        assert_eq!(config.queue.submission, SubmissionMode::Detached);
    }

    #[test]
    fn out_of_range_capacity_is_rejected() {
        let mut config = EngineConfig::default();
        config.queue.capacity = 2;
        let err = ConfigError::from(config.validate().unwrap_err());
        assert!(err.to_string().contains("capacity"));
    }
}
