//! The dispatcher: single consumer of the command queue and sole owner of
//! timer state.
//!
//! Every lifecycle change, including a platform timer firing, arrives here as
//! a [`Command`] and is applied completely before the next one is looked at.
//! Because nothing else can reach the [`TimerStore`], that serial order is the
//! whole synchronisation story; there are no locks around timer state.
//!
//! Per-id states:
//!
//! | State   | Platform timer | Pause instant |
//! |---------|----------------|---------------|
//! | Active  | armed          | none          |
//! | Stopped | cancelled      | none          |
//! | Paused  | cancelled      | recorded      |
//! | Unknown | no entry       | no entry      |

mod store;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use prtimer_core::command::{
    Command, CreatedCallback, InspectCallback, ParkedCallback, ResultCallback, ShutdownCallback,
    TimerCallback, TimerId,
};
use prtimer_core::platform::{FireFn, TimerHandle, TimerPlatform};
use prtimer_core::queue::{CommandReceiver, CommandSender};
use prtimer_core::time::{deadline_after, remaining};
use prtimer_telemetry::MetricsRecorder;
use tracing::{debug, error, info, instrument, trace, warn};

use self::store::TimerStore;

/// Whether the dispatch loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

pub(crate) struct Dispatcher<P: TimerPlatform> {
    platform: Arc<P>,
    store: TimerStore<P::Handle>,
    /// Handed to trampolines so firings re-enter through the queue.
    sender: CommandSender,
    metrics: Arc<MetricsRecorder>,
}

impl<P: TimerPlatform> Dispatcher<P> {
    pub(crate) fn new(
        platform: Arc<P>,
        sender: CommandSender,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            platform,
            store: TimerStore::new(),
            sender,
            metrics,
        }
    }

    /// Consumes commands until a shutdown is processed or every sender is gone.
    #[instrument(name = "dispatcher", skip_all)]
    pub(crate) async fn run(mut self, mut receiver: CommandReceiver) {
        info!("dispatcher started");
        let mut processed: u64 = 0;

        while let Some(command) = receiver.recv().await {
            processed += 1;
            if self.handle(command) == Flow::Exit {
                receiver.close();
                break;
            }
        }

        info!(processed, "dispatcher stopped");
    }

    /// Applies one command to the store.
    pub(crate) fn handle(&mut self, command: Command) -> Flow {
        let kind = command.kind();
        trace!(?command, "processing");
        self.metrics.inc_command(kind.as_str());

        let flow = match command {
            Command::Create {
                id,
                after,
                callback,
                on_created,
            } => {
                self.create(id, after, callback, on_created);
                Flow::Continue
            }
            Command::Execute { id, callback } => {
                self.execute(id, callback);
                Flow::Continue
            }
            Command::Stop { id, on_result } => {
                let stopped = self.stop(id);
                self.report(id, kind.as_str(), stopped, on_result);
                Flow::Continue
            }
            Command::Reset {
                id,
                after,
                on_result,
            } => {
                let reset = self.reset(id, after);
                self.report(id, kind.as_str(), reset, on_result);
                Flow::Continue
            }
            Command::Remove { id, on_result } => {
                let removed = self.remove(id);
                self.report(id, kind.as_str(), removed, on_result);
                Flow::Continue
            }
            Command::Pause { id, on_result } => {
                let paused = self.pause(id);
                self.report(id, kind.as_str(), paused, on_result);
                Flow::Continue
            }
            Command::Resume { id, on_result } => {
                let resumed = self.resume(id);
                self.report(id, kind.as_str(), resumed, on_result);
                Flow::Continue
            }
            Command::Inspect { id, reply } => {
                self.inspect(id, reply);
                Flow::Continue
            }
            Command::Shutdown { reply } => {
                self.shutdown(reply);
                Flow::Exit
            }
        };

        self.metrics
            .set_store_sizes(self.store.len(), self.store.paused_len());
        flow
    }

    fn create(
        &mut self,
        id: TimerId,
        after: Duration,
        callback: TimerCallback,
        on_created: Option<CreatedCallback>,
    ) {
        if self.store.contains(id) {
            warn!(%id, "ignoring create for an id that is already live");
            return;
        }

        let deadline = deadline_after(self.platform.now_ns(), after);
        let handle = self
            .platform
            .arm(after, self.trampoline(id, ParkedCallback::new(callback)));
        self.store.insert(id, handle, deadline);
        debug!(%id, ?after, deadline, "timer armed");

        if let Some(on_created) = on_created {
            self.guarded(id, "create", move || on_created(id));
        }
    }

    /// What the platform calls on expiry: forward the firing to the queue,
    /// never touch the store.
    fn trampoline(&self, id: TimerId, callback: ParkedCallback) -> FireFn {
        let sender = self.sender.clone();
        Arc::new(move || {
            let firing = Command::Execute {
                id,
                callback: callback.clone(),
            };
            if let Err(e) = sender.submit(firing) {
                trace!(%id, "firing dropped: {e}");
            }
        })
    }

    fn execute(&mut self, id: TimerId, callback: ParkedCallback) {
        if !self.store.contains(id) {
            debug!(%id, "discarding firing of a timer that is no longer known");
            return;
        }
        if self.store.paused_at(id).is_some() {
            debug!(%id, "discarding stale firing of a paused timer");
            return;
        }
        let Some(callback) = callback.take() else {
            return;
        };

        self.guarded(id, "timer", callback);
        if let Some(handle) = self.store.erase(id) {
            // A reset that raced this firing may have re-armed the platform timer.
            handle.cancel();
        }
        self.metrics.timers_fired.inc();
        debug!(%id, "timer fired");
    }

    fn stop(&mut self, id: TimerId) -> bool {
        self.store
            .handle(id)
            .map(|handle| handle.cancel())
            .unwrap_or(false)
    }

    fn reset(&mut self, id: TimerId, after: Duration) -> bool {
        let Some(handle) = self.store.handle(id) else {
            return false;
        };
        handle.reschedule(after);
        let deadline = deadline_after(self.platform.now_ns(), after);
        self.store.set_deadline(id, deadline);
        self.store.clear_pause(id);
        true
    }

    fn remove(&mut self, id: TimerId) -> bool {
        match self.store.erase(id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    fn pause(&mut self, id: TimerId) -> bool {
        let cancelled = self
            .store
            .handle(id)
            .map(|handle| handle.cancel())
            .unwrap_or(false);
        if cancelled {
            let now = self.platform.now_ns();
            self.store.mark_paused(id, now);
        }
        cancelled
    }

    fn resume(&mut self, id: TimerId) -> bool {
        let (Some(paused_at), Some(deadline)) = (self.store.paused_at(id), self.store.deadline(id))
        else {
            return false;
        };
        let Some(handle) = self.store.handle(id) else {
            return false;
        };

        let left = remaining(deadline, paused_at);
        handle.reschedule(left);
        self.store.clear_pause(id);
        // Re-anchor so a later pause measures against the resumed schedule.
        let deadline = deadline_after(self.platform.now_ns(), left);
        self.store.set_deadline(id, deadline);
        debug!(%id, ?left, deadline, "timer resumed");
        true
    }

    fn inspect(&mut self, id: TimerId, reply: InspectCallback) {
        let snapshot = self.store.snapshot(id);
        self.guarded(id, "inspect", move || reply(snapshot));
    }

    fn shutdown(&mut self, reply: Option<ShutdownCallback>) {
        let mut discarded = 0usize;
        for (_, handle) in self.store.drain() {
            handle.cancel();
            discarded += 1;
        }
        info!(discarded, "dispatcher shutting down");
        if let Some(reply) = reply {
            if panic::catch_unwind(AssertUnwindSafe(move || reply(discarded))).is_err() {
                self.metrics.callback_panics.inc();
                error!("shutdown callback panicked");
            }
        }
    }

    fn report(&self, id: TimerId, kind: &'static str, result: bool, on_result: Option<ResultCallback>) {
        debug!(%id, kind, result, "command applied");
        if let Some(on_result) = on_result {
            self.guarded(id, kind, move || on_result(result));
        }
    }

    /// Runs a user-supplied callback; a panic is logged and counted instead
    /// of taking the dispatcher down.
    fn guarded(&self, id: TimerId, what: &'static str, callback: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
            self.metrics.callback_panics.inc();
            error!(%id, what, "callback panicked");
        }
    }
}
