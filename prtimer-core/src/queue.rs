//! ## prtimer-core::queue
//! **Bounded command queue with non-blocking submission**
//!
//! Many producers (public API calls, platform trampolines) feed a single
//! consumer, the dispatcher. `submit` never waits for queue space:
//!
//! - [`SubmissionMode::Ordered`] enqueues on the caller's thread. When the
//!   queue is full the command spills into an unbounded FIFO lane drained by a
//!   single forwarder task, and every later command follows it there until
//!   the lane is empty again. Commands from one caller therefore keep their
//!   order even under backpressure.
//! - [`SubmissionMode::Detached`] spawns one task per command. Nothing orders
//!   two commands issued back to back by the same caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prtimer_config::SubmissionMode;
use prtimer_telemetry::MetricsRecorder;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use crate::command::Command;
use crate::error::QueueError;

/// Creates the queue. Spawns the overflow forwarder on `runtime` in ordered mode.
pub fn command_queue(
    capacity: usize,
    mode: SubmissionMode,
    runtime: Handle,
    metrics: Arc<MetricsRecorder>,
) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let overflow = match mode {
        SubmissionMode::Ordered => Some(spawn_forwarder(&runtime, tx.clone())),
        SubmissionMode::Detached => None,
    };

    let sender = CommandSender {
        inner: Arc::new(SenderInner {
            tx,
            overflow,
            runtime,
            metrics,
        }),
    };
    (sender, CommandReceiver { rx })
}

struct OverflowLane {
    tx: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
}

fn spawn_forwarder(runtime: &Handle, queue: mpsc::Sender<Command>) -> OverflowLane {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let pending = Arc::new(AtomicUsize::new(0));

    let drained = Arc::clone(&pending);
    runtime.spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(mpsc::error::SendError(command)) = queue.send(command).await {
                trace!(?command, "dropping overflowed command, dispatcher gone");
            }
            // Only after the command is in the queue may callers bypass the lane.
            drained.fetch_sub(1, Ordering::AcqRel);
        }
    });

    OverflowLane { tx, pending }
}

struct SenderInner {
    tx: mpsc::Sender<Command>,
    overflow: Option<OverflowLane>,
    runtime: Handle,
    metrics: Arc<MetricsRecorder>,
}

/// Producer side of the queue. Cheap to clone.
#[derive(Clone)]
pub struct CommandSender {
    inner: Arc<SenderInner>,
}

impl CommandSender {
    /// Places `command` on its way to the dispatcher without blocking.
    pub fn submit(&self, command: Command) -> Result<(), QueueError> {
        match &self.inner.overflow {
            Some(lane) => self.submit_ordered(lane, command),
            None => self.submit_detached(command),
        }
    }

    fn submit_ordered(&self, lane: &OverflowLane, command: Command) -> Result<(), QueueError> {
        let command = if lane.pending.load(Ordering::Acquire) == 0 {
            match self.inner.tx.try_send(command) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(_)) => return Err(QueueError::Closed),
                Err(TrySendError::Full(command)) => command,
            }
        } else {
            command
        };

        if lane.pending.fetch_add(1, Ordering::AcqRel) == 0 {
            warn!("command queue full, diverting to overflow lane");
        }
        self.inner.metrics.queue_overflows.inc();
        trace!(?command, "command queued on overflow lane");

        lane.tx.send(command).map_err(|_| {
            lane.pending.fetch_sub(1, Ordering::AcqRel);
            QueueError::Closed
        })
    }

    fn submit_detached(&self, command: Command) -> Result<(), QueueError> {
        if self.inner.tx.is_closed() {
            return Err(QueueError::Closed);
        }
        let tx = self.inner.tx.clone();
        self.inner.runtime.spawn(async move {
            if let Err(mpsc::error::SendError(command)) = tx.send(command).await {
                trace!(?command, "dropping detached command, dispatcher gone");
            }
        });
        Ok(())
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.tx.is_closed()
    }
}

/// Consumer side of the queue, owned by the dispatcher.
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Waits for the next command. `None` once every sender is gone.
    #[inline]
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Returns the next command if one is already queued.
    #[inline]
    pub fn try_recv(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Refuses further submissions; queued commands can still be drained.
    #[inline]
    pub fn close(&mut self) {
        self.rx.close();
    }
}
