//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    #[validate(custom(function = validation::validate_log_filter))]
    pub log_filter: String,

    /// Include thread names in log lines. Timer callbacks fire on runtime workers.
    #[serde(default = "default_true")]
    pub thread_names: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            thread_names: default_true(),
        }
    }
}
