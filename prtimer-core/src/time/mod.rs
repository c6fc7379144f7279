//! ## prtimer-core::time
//! **Nanosecond timestamps and a virtual clock**
//!
//! Deadlines and pause instants are absolute nanosecond counts on the
//! platform's clock. The helpers here keep that arithmetic saturating so a
//! late pause or a huge duration can never wrap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Absolute deadline `after` from `now_ns`.
#[inline]
pub fn deadline_after(now_ns: u64, after: Duration) -> u64 {
    let after_ns = u64::try_from(after.as_nanos()).unwrap_or(u64::MAX);
    now_ns.saturating_add(after_ns)
}

/// Time left until `deadline_ns` as seen from `at_ns`; zero once it has passed.
#[inline]
pub fn remaining(deadline_ns: u64, at_ns: u64) -> Duration {
    Duration::from_nanos(deadline_ns.saturating_sub(at_ns))
}

/// Manually driven clock shared between clones.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>, // Nanoseconds
}

impl VirtualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Moves the clock forward and returns the new reading.
    #[inline]
    pub fn advance(&self, by: Duration) -> u64 {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset.fetch_add(by, Ordering::AcqRel).saturating_add(by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_initial_value() {
        let clock = VirtualClock::new(100);
        assert_eq!(clock.now_ns(), 100);
    }

    #[test]
    fn clock_advance_is_shared() {
        let clock = VirtualClock::new(0);
        let other = clock.clone();
        assert_eq!(clock.advance(Duration::from_nanos(500)), 500);
        other.advance(Duration::from_nanos(250));
        assert_eq!(clock.now_ns(), 750);
    }

    #[test]
    fn remaining_after_pause() {
        let deadline = deadline_after(0, Duration::from_millis(1000));
        assert_eq!(
            remaining(deadline, 900_000_000),
            Duration::from_millis(100)
        );
        assert_eq!(remaining(deadline, deadline + 1), Duration::ZERO);
    }

    #[test]
    fn deadline_saturates() {
        assert_eq!(deadline_after(u64::MAX - 1, Duration::from_secs(1)), u64::MAX);
        assert_eq!(deadline_after(1, Duration::MAX), u64::MAX);
    }
}
