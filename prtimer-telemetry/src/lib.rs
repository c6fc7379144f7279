//! # prtimer Telemetry
//!
//! Logging and metrics for the timer engine.

pub mod logging;
pub mod metrics;

pub use logging::TimerLogger;
pub use metrics::MetricsRecorder;
