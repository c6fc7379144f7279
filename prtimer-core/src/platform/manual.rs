//! Deterministic platform for simulation and tests.
//!
//! Time only moves when [`ManualPlatform::advance`] is called. Due timers
//! fire in deadline order (arming order breaks ties) on the advancing thread,
//! after the internal lock is released, so `on_fire` may call back into the
//! platform.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{FireFn, TimerHandle, TimerPlatform};
use crate::time::{deadline_after, VirtualClock};

#[derive(Clone, Default)]
pub struct ManualPlatform {
    clock: VirtualClock,
    slots: Arc<Mutex<Slots>>,
}

#[derive(Default)]
struct Slots {
    next: u64,
    entries: HashMap<u64, Slot>,
}

struct Slot {
    /// `Some(deadline_ns)` while pending.
    due_ns: Option<u64>,
    /// Bumped on every arming; orders timers sharing a deadline.
    sequence: u64,
    on_fire: FireFn,
}

impl ManualPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Moves time forward by `by`, firing every timer that becomes due.
    /// Returns how many timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let now = self.clock.advance(by);

        let mut due: Vec<(u64, u64, FireFn)> = {
            let mut slots = self.slots.lock();
            slots
                .entries
                .values_mut()
                .filter_map(|slot| match slot.due_ns {
                    Some(at) if at <= now => {
                        slot.due_ns = None;
                        Some((at, slot.sequence, Arc::clone(&slot.on_fire)))
                    }
                    _ => None,
                })
                .collect()
        };
        due.sort_by_key(|(at, sequence, _)| (*at, *sequence));

        for (_, _, on_fire) in &due {
            on_fire();
        }
        due.len()
    }

    /// Number of timers currently waiting to fire.
    pub fn pending(&self) -> usize {
        self.slots
            .lock()
            .entries
            .values()
            .filter(|slot| slot.due_ns.is_some())
            .count()
    }

    fn set_due(&self, key: u64, after: Duration) -> bool {
        let mut slots = self.slots.lock();
        slots.next += 1;
        let sequence = slots.next;
        let due_ns = deadline_after(self.clock.now_ns(), after);
        match slots.entries.get_mut(&key) {
            Some(slot) => {
                slot.sequence = sequence;
                slot.due_ns.replace(due_ns).is_some()
            }
            None => false,
        }
    }
}

impl TimerPlatform for ManualPlatform {
    type Handle = ManualTimer;

    fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    fn arm(&self, after: Duration, on_fire: FireFn) -> ManualTimer {
        let key = {
            let mut slots = self.slots.lock();
            slots.next += 1;
            let key = slots.next;
            slots.entries.insert(
                key,
                Slot {
                    due_ns: None,
                    sequence: key,
                    on_fire,
                },
            );
            key
        };
        self.set_due(key, after);
        ManualTimer {
            platform: self.clone(),
            key,
        }
    }
}

pub struct ManualTimer {
    platform: ManualPlatform,
    key: u64,
}

impl ManualTimer {
    pub fn is_pending(&self) -> bool {
        self.platform
            .slots
            .lock()
            .entries
            .get(&self.key)
            .is_some_and(|slot| slot.due_ns.is_some())
    }
}

impl TimerHandle for ManualTimer {
    fn cancel(&self) -> bool {
        self.platform
            .slots
            .lock()
            .entries
            .get_mut(&self.key)
            .and_then(|slot| slot.due_ns.take())
            .is_some()
    }

    fn reschedule(&self, after: Duration) -> bool {
        self.platform.set_due(self.key, after)
    }
}

impl Drop for ManualTimer {
    fn drop(&mut self) {
        self.platform.slots.lock().entries.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> FireFn {
        let log = Arc::clone(log);
        Arc::new(move || log.lock().push(name))
    }

    #[test]
    fn fires_in_deadline_order() {
        let platform = ManualPlatform::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _late = platform.arm(Duration::from_millis(30), recorder(&log, "late"));
        let _early = platform.arm(Duration::from_millis(10), recorder(&log, "early"));
        let _tie = platform.arm(Duration::from_millis(10), recorder(&log, "tie"));

        assert_eq!(platform.advance(Duration::from_millis(9)), 0);
        assert_eq!(platform.advance(Duration::from_millis(25)), 3);
        assert_eq!(*log.lock(), vec!["early", "tie", "late"]);
    }

    #[test]
    fn cancel_and_reschedule_report_pending_state() {
        let platform = ManualPlatform::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = platform.arm(
            Duration::from_millis(10),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.reschedule(Duration::from_millis(5)));
        assert!(timer.is_pending());
        assert!(timer.reschedule(Duration::from_millis(20)));

        platform.advance(Duration::from_millis(10));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        platform.advance(Duration::from_millis(10));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[test]
    fn dropped_handles_never_fire() {
        let platform = ManualPlatform::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        drop(platform.arm(
            Duration::from_millis(1),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        assert_eq!(platform.pending(), 0);
        platform.advance(Duration::from_secs(1));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
