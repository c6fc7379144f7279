//! Public command API.
//!
//! Every operation returns as soon as its command is handed to the queue.
//! Creation allocates the id on the caller's thread, so it is known before
//! the dispatcher has seen the command. The `*_with_result` variants report
//! back from the dispatcher; the `*_confirmed` variants wrap those in a
//! future.

use std::sync::Arc;
use std::time::Duration;

use prtimer_config::{ConfigError, EngineConfig};
use prtimer_core::command::{Command, IdAllocator, TimerId, TimerSnapshot};
use prtimer_core::platform::{TimerPlatform, TokioPlatform};
use prtimer_core::queue::{command_queue, CommandSender};
use prtimer_telemetry::MetricsRecorder;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};
use validator::Validate;

use super::dispatcher::Dispatcher;
use super::error::EngineError;

/// Handle to a running timer engine. Clones share the same dispatcher.
pub struct TimerEngine<P: TimerPlatform = TokioPlatform> {
    inner: Arc<EngineInner<P>>,
}

impl<P: TimerPlatform> Clone for TimerEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<P: TimerPlatform> {
    ids: IdAllocator,
    sender: CommandSender,
    platform: Arc<P>,
    metrics: Arc<MetricsRecorder>,
}

impl<P: TimerPlatform> Drop for EngineInner<P> {
    fn drop(&mut self) {
        // Trampolines keep the queue open, so the dispatcher must be told to stop.
        let _ = self.sender.submit(Command::Shutdown { reply: None });
    }
}

impl TimerEngine<TokioPlatform> {
    /// Starts an engine on the current tokio runtime.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let platform = TokioPlatform::new(runtime.clone());
        Self::with_platform(config, platform, runtime)
    }
}

impl<P: TimerPlatform> TimerEngine<P> {
    /// Starts an engine on `platform`, spawning the dispatcher onto `runtime`.
    pub fn with_platform(
        config: &EngineConfig,
        platform: P,
        runtime: Handle,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(ConfigError::from)?;

        let metrics = Arc::new(MetricsRecorder::new()?);
        let (sender, receiver) = command_queue(
            config.queue.capacity,
            config.queue.submission,
            runtime.clone(),
            Arc::clone(&metrics),
        );
        let platform = Arc::new(platform);

        let dispatcher = Dispatcher::new(Arc::clone(&platform), sender.clone(), Arc::clone(&metrics));
        runtime.spawn(dispatcher.run(receiver));

        info!(
            capacity = config.queue.capacity,
            submission = ?config.queue.submission,
            "timer engine started"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                ids: IdAllocator::new(),
                sender,
                platform,
                metrics,
            }),
        })
    }

    /// Runs `callback` once, `after` from when the dispatcher arms it.
    pub fn schedule<F>(&self, after: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.ids.next();
        self.submit(Command::Create {
            id,
            after,
            callback: Box::new(callback),
            on_created: None,
        });
        id
    }

    /// Like [`schedule`](Self::schedule); `on_created` runs on the dispatcher
    /// once the platform timer is armed.
    pub fn schedule_with_created_callback<F, C>(
        &self,
        after: Duration,
        callback: F,
        on_created: C,
    ) -> TimerId
    where
        F: FnOnce() + Send + 'static,
        C: FnOnce(TimerId) + Send + 'static,
    {
        let id = self.inner.ids.next();
        self.submit(Command::Create {
            id,
            after,
            callback: Box::new(callback),
            on_created: Some(Box::new(on_created)),
        });
        id
    }

    /// Cancels the pending firing. The id stays known: it can still be
    /// reset, paused or removed.
    pub fn stop(&self, id: TimerId) {
        self.submit(Command::Stop {
            id,
            on_result: None,
        });
    }

    /// `true` iff the timer was known and still pending.
    pub fn stop_with_result<F>(&self, id: TimerId, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Command::Stop {
            id,
            on_result: Some(Box::new(on_result)),
        });
    }

    /// Re-arms a known timer to fire `after` from now.
    pub fn reset(&self, id: TimerId, after: Duration) {
        self.submit(Command::Reset {
            id,
            after,
            on_result: None,
        });
    }

    /// `true` iff the timer was known.
    pub fn reset_with_result<F>(&self, id: TimerId, after: Duration, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Command::Reset {
            id,
            after,
            on_result: Some(Box::new(on_result)),
        });
    }

    /// Cancels the timer and forgets the id.
    pub fn remove(&self, id: TimerId) {
        self.submit(Command::Remove {
            id,
            on_result: None,
        });
    }

    /// `true` iff the timer was known.
    pub fn remove_with_result<F>(&self, id: TimerId, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Command::Remove {
            id,
            on_result: Some(Box::new(on_result)),
        });
    }

    /// Cancels the pending firing and remembers how much time was left.
    pub fn pause(&self, id: TimerId) {
        self.submit(Command::Pause {
            id,
            on_result: None,
        });
    }

    /// `true` iff the timer was known and still pending.
    pub fn pause_with_result<F>(&self, id: TimerId, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Command::Pause {
            id,
            on_result: Some(Box::new(on_result)),
        });
    }

    /// Re-arms a paused timer for the time it had left when paused.
    pub fn resume(&self, id: TimerId) {
        self.submit(Command::Resume {
            id,
            on_result: None,
        });
    }

    /// `true` iff the timer was known and paused.
    pub fn resume_with_result<F>(&self, id: TimerId, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Command::Resume {
            id,
            on_result: Some(Box::new(on_result)),
        });
    }

    /// Schedules and waits until the timer is armed.
    pub async fn schedule_confirmed<F>(
        &self,
        after: Duration,
        callback: F,
    ) -> Result<TimerId, EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.schedule_with_created_callback(after, callback, move |id| {
            let _ = tx.send(id);
        });
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub async fn stop_confirmed(&self, id: TimerId) -> Result<bool, EngineError> {
        let (on_result, rx) = reply();
        self.stop_with_result(id, on_result);
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub async fn reset_confirmed(&self, id: TimerId, after: Duration) -> Result<bool, EngineError> {
        let (on_result, rx) = reply();
        self.reset_with_result(id, after, on_result);
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub async fn remove_confirmed(&self, id: TimerId) -> Result<bool, EngineError> {
        let (on_result, rx) = reply();
        self.remove_with_result(id, on_result);
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub async fn pause_confirmed(&self, id: TimerId) -> Result<bool, EngineError> {
        let (on_result, rx) = reply();
        self.pause_with_result(id, on_result);
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub async fn resume_confirmed(&self, id: TimerId) -> Result<bool, EngineError> {
        let (on_result, rx) = reply();
        self.resume_with_result(id, on_result);
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    /// The dispatcher's view of `id`; `None` once it fired or was removed.
    pub async fn inspect(&self, id: TimerId) -> Result<Option<TimerSnapshot>, EngineError> {
        let (reply, rx) = reply();
        self.submit(Command::Inspect { id, reply });
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    /// Cancels every live timer and stops the dispatcher. Returns how many
    /// timers were discarded. Later operations report
    /// [`EngineError::DispatcherClosed`] or do nothing.
    pub async fn shutdown(&self) -> Result<usize, EngineError> {
        let (reply, rx) = reply();
        self.submit(Command::Shutdown { reply: Some(reply) });
        rx.await.map_err(|_| EngineError::DispatcherClosed)
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.inner.metrics
    }

    pub fn platform(&self) -> &P {
        &self.inner.platform
    }

    fn submit(&self, command: Command) {
        if let Err(e) = self.inner.sender.submit(command) {
            debug!("command not submitted: {e}");
        }
    }
}

fn reply<T: Send + 'static>() -> (Box<dyn FnOnce(T) + Send + 'static>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Box::new(move |value| {
            let _ = tx.send(value);
        }),
        rx,
    )
}
