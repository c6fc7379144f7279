use prtimer_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No tokio runtime available to host the dispatcher")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The dispatcher shut down before it could answer.
    #[error("Timer dispatcher has shut down")]
    DispatcherClosed,
}
