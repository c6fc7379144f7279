//! ## prtimer-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! The engine itself only emits `tracing` events; embedding applications
//! decide whether to install a subscriber. `TimerLogger` is the stock one.

pub use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct TimerLogger;

impl TimerLogger {
    /// Installs a global `fmt` subscriber.
    ///
    /// `RUST_LOG` wins over `default_filter` when it is set and parses.
    pub fn try_init(default_filter: &str, thread_names: bool) -> Result<(), TryInitError> {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        tracing_subscriber::registry()
            .with(Self::filter(default_filter))
            .with(fmt::layer().with_thread_names(thread_names))
            .try_init()
    }

    /// Builds the filter used by [`TimerLogger::try_init`].
    pub fn filter(default_filter: &str) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn filter_falls_back_to_default() {
        std::env::remove_var("RUST_LOG");
        let filter = TimerLogger::filter("prtimer_engine=debug");
        assert!(filter.to_string().contains("prtimer_engine=debug"));
    }

    #[traced_test]
    #[test]
    fn events_reach_the_subscriber() {
        tracing::info!(timer_id = 7, "timer armed");
        assert!(logs_contain("timer armed"));
        assert!(logs_contain("timer_id=7"));
    }
}
