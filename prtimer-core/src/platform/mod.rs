//! ## prtimer-core::platform
//! **One-shot deferred execution primitive**
//!
//! The engine does not count down time itself. A [`TimerPlatform`] arms
//! one-shot timers that call back on a thread of their choosing; the engine
//! only ever cancels or reschedules them through the returned handle.
//!
//! - [`TokioPlatform`]: sleeping tasks on a tokio runtime
//! - [`ManualPlatform`]: a deterministic platform advanced by hand

use std::sync::Arc;
use std::time::Duration;

mod manual;
mod tokio_timer;

pub use self::manual::{ManualPlatform, ManualTimer};
pub use self::tokio_timer::{TokioPlatform, TokioTimer};

/// Invoked when an armed timer expires. A rescheduled timer may fire again,
/// so this is `Fn`, not `FnOnce`.
pub type FireFn = Arc<dyn Fn() + Send + Sync + 'static>;

pub trait TimerPlatform: Send + Sync + 'static {
    type Handle: TimerHandle;

    /// Current reading of the clock timers are measured against, in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Arms a one-shot timer that calls `on_fire` once `after` has elapsed.
    fn arm(&self, after: Duration, on_fire: FireFn) -> Self::Handle;
}

pub trait TimerHandle: Send + 'static {
    /// Prevents a pending firing. Returns `true` if the timer was still pending.
    fn cancel(&self) -> bool;

    /// Re-arms the timer to fire `after` from now, whether or not it already
    /// fired or was cancelled. Returns `true` if it was still pending.
    fn reschedule(&self, after: Duration) -> bool;
}
