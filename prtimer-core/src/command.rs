//! Timer ids and the command records consumed by the dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Opaque handle for one scheduled callback. Never reused by an allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Lock-free id source. Ids start at 1 and grow in allocation order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU64,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn next(&self) -> TimerId {
        TimerId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;
pub type CreatedCallback = Box<dyn FnOnce(TimerId) + Send + 'static>;
pub type ResultCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// A user callback parked between the platform and the dispatcher.
///
/// A rescheduled platform timer can fire more than once, and a firing can be
/// overtaken by a remove or pause. Every firing carries a clone of the same
/// slot and the dispatcher takes the callback out only when it actually runs
/// it, so it runs at most once and a discarded firing never consumes it.
#[derive(Clone)]
pub struct ParkedCallback(Arc<Mutex<Option<TimerCallback>>>);

impl ParkedCallback {
    pub fn new(callback: TimerCallback) -> Self {
        Self(Arc::new(Mutex::new(Some(callback))))
    }

    #[inline]
    pub fn take(&self) -> Option<TimerCallback> {
        self.0.lock().take()
    }
}

/// Dispatcher-side view of one timer, returned by [`Command::Inspect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub id: TimerId,
    /// Absolute deadline in nanoseconds on the platform clock.
    pub deadline_ns: u64,
    /// Present only while the timer is paused.
    pub paused_at_ns: Option<u64>,
}

impl TimerSnapshot {
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused_at_ns.is_some()
    }
}

pub type InspectCallback = Box<dyn FnOnce(Option<TimerSnapshot>) + Send + 'static>;
pub type ShutdownCallback = Box<dyn FnOnce(usize) + Send + 'static>;

/// A lifecycle request. The `on_*` callbacks are run by the dispatcher once
/// the command has been applied; `None` selects the plain variant.
pub enum Command {
    Create {
        id: TimerId,
        after: Duration,
        callback: TimerCallback,
        on_created: Option<CreatedCallback>,
    },
    /// Injected by the platform trampoline when a timer fires.
    Execute {
        id: TimerId,
        callback: ParkedCallback,
    },
    Stop {
        id: TimerId,
        on_result: Option<ResultCallback>,
    },
    Reset {
        id: TimerId,
        after: Duration,
        on_result: Option<ResultCallback>,
    },
    Remove {
        id: TimerId,
        on_result: Option<ResultCallback>,
    },
    Pause {
        id: TimerId,
        on_result: Option<ResultCallback>,
    },
    Resume {
        id: TimerId,
        on_result: Option<ResultCallback>,
    },
    Inspect { id: TimerId, reply: InspectCallback },
    /// Cancels every live timer and ends the dispatcher loop.
    Shutdown { reply: Option<ShutdownCallback> },
}

/// Flat discriminant of [`Command`], used for logging and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    CreateWithCallback,
    Execute,
    Stop,
    StopWithResult,
    Reset,
    ResetWithResult,
    Remove,
    RemoveWithResult,
    Pause,
    PauseWithResult,
    Resume,
    ResumeWithResult,
    Inspect,
    Shutdown,
}

impl CommandKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::CreateWithCallback => "create_with_callback",
            CommandKind::Execute => "execute",
            CommandKind::Stop => "stop",
            CommandKind::StopWithResult => "stop_with_result",
            CommandKind::Reset => "reset",
            CommandKind::ResetWithResult => "reset_with_result",
            CommandKind::Remove => "remove",
            CommandKind::RemoveWithResult => "remove_with_result",
            CommandKind::Pause => "pause",
            CommandKind::PauseWithResult => "pause_with_result",
            CommandKind::Resume => "resume",
            CommandKind::ResumeWithResult => "resume_with_result",
            CommandKind::Inspect => "inspect",
            CommandKind::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        fn pick<T>(callback: &Option<T>, plain: CommandKind, with: CommandKind) -> CommandKind {
            if callback.is_some() {
                with
            } else {
                plain
            }
        }

        match self {
            Command::Create { on_created, .. } => {
                pick(on_created, CommandKind::Create, CommandKind::CreateWithCallback)
            }
            Command::Execute { .. } => CommandKind::Execute,
            Command::Stop { on_result, .. } => {
                pick(on_result, CommandKind::Stop, CommandKind::StopWithResult)
            }
            Command::Reset { on_result, .. } => {
                pick(on_result, CommandKind::Reset, CommandKind::ResetWithResult)
            }
            Command::Remove { on_result, .. } => {
                pick(on_result, CommandKind::Remove, CommandKind::RemoveWithResult)
            }
            Command::Pause { on_result, .. } => {
                pick(on_result, CommandKind::Pause, CommandKind::PauseWithResult)
            }
            Command::Resume { on_result, .. } => {
                pick(on_result, CommandKind::Resume, CommandKind::ResumeWithResult)
            }
            Command::Inspect { .. } => CommandKind::Inspect,
            Command::Shutdown { .. } => CommandKind::Shutdown,
        }
    }

    /// The id the command addresses, if any.
    pub fn id(&self) -> Option<TimerId> {
        match self {
            Command::Create { id, .. }
            | Command::Execute { id, .. }
            | Command::Stop { id, .. }
            | Command::Reset { id, .. }
            | Command::Remove { id, .. }
            | Command::Pause { id, .. }
            | Command::Resume { id, .. }
            | Command::Inspect { id, .. } => Some(*id),
            Command::Shutdown { .. } => None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Command");
        out.field("kind", &self.kind());
        if let Some(id) = self.id() {
            out.field("id", &id);
        }
        match self {
            Command::Create { after, .. } | Command::Reset { after, .. } => {
                out.field("after", after);
            }
            _ => {}
        }
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_start_at_one_and_increase() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next().as_u64(), 1);
        assert_eq!(ids.next().as_u64(), 2);
        assert!(ids.next() > TimerId::from_raw(2));
    }

    #[test]
    fn concurrent_allocation_never_repeats() {
        let ids = Arc::new(IdAllocator::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1000).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert!(seen.insert(id), "{id} allocated twice");
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn kind_tracks_callback_presence() {
        let id = TimerId::from_raw(9);
        let plain = Command::Pause {
            id,
            on_result: None,
        };
        let with = Command::Pause {
            id,
            on_result: Some(Box::new(|_| {})),
        };
        assert_eq!(plain.kind(), CommandKind::Pause);
        assert_eq!(with.kind(), CommandKind::PauseWithResult);
        assert_eq!(with.kind().as_str(), "pause_with_result");
        assert_eq!(Command::Shutdown { reply: None }.id(), None);
    }

    #[test]
    fn parked_callback_is_taken_once() {
        let parked = ParkedCallback::new(Box::new(|| {}));
        let firing = parked.clone();
        assert!(firing.take().is_some());
        assert!(parked.take().is_none());
    }

    #[test]
    fn debug_omits_callbacks() {
        let cmd = Command::Reset {
            id: TimerId::from_raw(3),
            after: Duration::from_millis(5),
            on_result: Some(Box::new(|_| {})),
        };
        let rendered = format!("{cmd:?}");
        assert!(rendered.contains("ResetWithResult"));
        assert!(rendered.contains("5ms"));
    }
}
