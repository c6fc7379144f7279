//! Runs in its own binary: installing a global subscriber is process-wide.

use prtimer_telemetry::TimerLogger;

#[test]
fn logger_installs_only_once() {
    assert!(TimerLogger::try_init("info", true).is_ok());
    assert!(TimerLogger::try_init("debug", false).is_err());
    tracing::info!("still routed to the first subscriber");
}
