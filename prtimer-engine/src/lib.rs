//! # prtimer-engine
//!
//! Pausable, resumable one-shot timers addressed by id.
//!
//! All lifecycle operations are funnelled through one command queue into a
//! single dispatcher task that owns every piece of timer state. Platform
//! timer expirations take the same route, so a firing can never race a
//! concurrent stop, pause or remove of the same timer.
//!
//! ```no_run
//! use std::time::Duration;
//! use prtimer_config::EngineConfig;
//! use prtimer_engine::TimerEngine;
//!
//! # async fn demo() -> Result<(), prtimer_engine::EngineError> {
//! let engine = TimerEngine::start(&EngineConfig::default())?;
//! let id = engine.schedule(Duration::from_secs(1), || println!("fired"));
//! assert!(engine.pause_confirmed(id).await?);
//! assert!(engine.resume_confirmed(id).await?);
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::{EngineError, TimerEngine};
pub use prtimer_core::command::{TimerId, TimerSnapshot};

use prtimer_config::EngineConfig;
use prtimer_telemetry::TimerLogger;

/// Installs the stock `tracing` subscriber configured by `config.telemetry`.
pub fn init_logging(config: &EngineConfig) -> Result<(), prtimer_telemetry::logging::TryInitError> {
    TimerLogger::try_init(&config.telemetry.log_filter, config.telemetry.thread_names)
}
