//! Marshals mutating work onto the host scheduler thread.
//!
//! Commands arrive concurrently on worker threads, but the host object model
//! may only be mutated from its own scheduler tick. The bridge hands a task
//! to the scheduler, then blocks the calling worker on a single-slot channel
//! until the task deposits its result or the bounded wait expires.
//!
//! A timed-out task is abandoned, not cancelled: the scheduler may still run
//! it later, and its result is silently discarded. Each worker drives at
//! most one task at a time because it does not read its next command until
//! the current one's response has been produced.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use thiserror::Error;

use crate::host::HostScheduler;

/// Errors surfaced while waiting on a scheduled task.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bounded wait expired before the task deposited a result.
    #[error("Timeout waiting for operation to complete")]
    Timeout {
        /// How long the worker waited.
        waited: Duration,
    },
    /// The scheduler dropped the task without ever running it.
    #[error("the host scheduler dropped the operation before it ran")]
    TaskDropped,
}

/// Connects a worker thread's wait to a scheduler-thread task's completion.
#[derive(Clone)]
pub struct MainThreadBridge {
    scheduler: Arc<dyn HostScheduler>,
    timeout: Duration,
}

impl MainThreadBridge {
    /// Builds a bridge over the given scheduler with a bounded result wait.
    #[must_use]
    pub fn new(scheduler: Arc<dyn HostScheduler>, timeout: Duration) -> Self {
        Self { scheduler, timeout }
    }

    /// Runs `task` on the scheduler thread and returns its result.
    ///
    /// When the calling thread already is the scheduler thread the task runs
    /// inline; queueing it and waiting would deadlock the tick that is
    /// currently executing.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] when the bounded wait expires (the
    /// task may still run later; its result is discarded) and
    /// [`BridgeError::TaskDropped`] when the scheduler discards the task.
    pub fn run<T, F>(&self, task: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.scheduler.is_on_scheduler_thread() {
            return Ok(task());
        }

        let (sender, receiver) = mpsc::sync_channel(1);
        self.scheduler.run_async(Box::new(move || {
            // The worker may have given up already; a failed send just
            // discards the abandoned result.
            let _ = sender.try_send(task());
        }));

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(BridgeError::Timeout {
                waited: self.timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::TaskDropped),
        }
    }
}
