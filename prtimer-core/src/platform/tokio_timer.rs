//! Tokio-backed platform timers.
//!
//! Each arming spawns a task that sleeps and then tries to claim the current
//! generation from the handle's `armed` word. `cancel` and `reschedule` swap
//! that word, so exactly one of "fire", "cancel" or "reschedule" wins for any
//! given arming, whatever thread each runs on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{sleep, Instant};

use super::{FireFn, TimerHandle, TimerPlatform};

const DISARMED: u64 = 0;

/// Platform timers driven by `tokio::time`. Uses tokio's clock, so paused
/// test time applies to both firing and [`TimerPlatform::now_ns`].
pub struct TokioPlatform {
    runtime: Handle,
    epoch: Instant,
}

impl TokioPlatform {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            epoch: Instant::now(),
        }
    }
}

impl TimerPlatform for TokioPlatform {
    type Handle = TokioTimer;

    fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn arm(&self, after: Duration, on_fire: FireFn) -> TokioTimer {
        let timer = TokioTimer {
            shared: Arc::new(Shared {
                armed: AtomicU64::new(DISARMED),
                generation: AtomicU64::new(DISARMED),
                sleeper: Mutex::new(None),
                runtime: self.runtime.clone(),
                on_fire,
            }),
        };
        timer.arm(after);
        timer
    }
}

struct Shared {
    /// Generation currently allowed to fire, or `DISARMED`.
    armed: AtomicU64,
    generation: AtomicU64,
    sleeper: Mutex<Option<AbortHandle>>,
    runtime: Handle,
    on_fire: FireFn,
}

pub struct TokioTimer {
    shared: Arc<Shared>,
}

impl TokioTimer {
    /// Starts a new generation and reports whether the previous one was pending.
    fn arm(&self, after: Duration) -> bool {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let was_pending = self.shared.armed.swap(generation, Ordering::AcqRel) != DISARMED;

        let shared = Arc::clone(&self.shared);
        let task = self.shared.runtime.spawn(async move {
            sleep(after).await;
            if shared
                .armed
                .compare_exchange(generation, DISARMED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                (shared.on_fire)();
            }
        });

        if let Some(previous) = self.shared.sleeper.lock().replace(task.abort_handle()) {
            previous.abort();
        }
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        self.shared.armed.load(Ordering::Acquire) != DISARMED
    }
}

impl TimerHandle for TokioTimer {
    fn cancel(&self) -> bool {
        let was_pending = self.shared.armed.swap(DISARMED, Ordering::AcqRel) != DISARMED;
        if let Some(sleeper) = self.shared.sleeper.lock().take() {
            sleeper.abort();
        }
        was_pending
    }

    fn reschedule(&self, after: Duration) -> bool {
        self.arm(after)
    }
}
