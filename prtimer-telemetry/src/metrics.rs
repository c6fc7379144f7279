//! ## prtimer-telemetry::metrics
//! **Prometheus counters and gauges for the dispatcher**

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Commands processed by the dispatcher, labelled by command kind.
    pub commands_processed: IntCounterVec,
    pub timers_fired: IntCounter,
    pub live_timers: IntGauge,
    pub paused_timers: IntGauge,
    /// Commands that found the queue full and took the overflow lane.
    pub queue_overflows: IntCounter,
    pub callback_panics: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let commands_processed = IntCounterVec::new(
            Opts::new(
                "prtimer_commands_processed_total",
                "Commands processed by the dispatcher",
            ),
            &["kind"],
        )?;
        let timers_fired =
            IntCounter::new("prtimer_timers_fired_total", "Timer callbacks executed")?;
        let live_timers = IntGauge::new("prtimer_live_timers", "Timers known to the dispatcher")?;
        let paused_timers = IntGauge::new("prtimer_paused_timers", "Timers currently paused")?;
        let queue_overflows = IntCounter::new(
            "prtimer_queue_overflows_total",
            "Commands diverted to the overflow lane",
        )?;
        let callback_panics = IntCounter::new(
            "prtimer_callback_panics_total",
            "User or completion callbacks that panicked",
        )?;

        registry.register(Box::new(commands_processed.clone()))?;
        registry.register(Box::new(timers_fired.clone()))?;
        registry.register(Box::new(live_timers.clone()))?;
        registry.register(Box::new(paused_timers.clone()))?;
        registry.register(Box::new(queue_overflows.clone()))?;
        registry.register(Box::new(callback_panics.clone()))?;

        Ok(Self {
            registry,
            commands_processed,
            timers_fired,
            live_timers,
            paused_timers,
            queue_overflows,
            callback_panics,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    #[inline]
    pub fn inc_command(&self, kind: &str) {
        self.commands_processed.with_label_values(&[kind]).inc();
    }

    /// Publishes the dispatcher's store sizes.
    #[inline]
    pub fn set_store_sizes(&self, live: usize, paused: usize) {
        self.live_timers.set(live as i64);
        self.paused_timers.set(paused as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_registered_series() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.inc_command("stop_with_result");
        metrics.timers_fired.inc();
        metrics.set_store_sizes(3, 1);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("prtimer_commands_processed_total{kind=\"stop_with_result\"} 1"));
        assert!(text.contains("prtimer_timers_fired_total 1"));
        assert!(text.contains("prtimer_live_timers 3"));
        assert!(text.contains("prtimer_paused_timers 1"));
    }

    #[test]
    fn recorders_do_not_share_registries() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.timers_fired.inc();
        assert_eq!(b.timers_fired.get(), 0);
    }
}
