//! The host scheduler capability.

/// A unit of work queued for the scheduler thread.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Entry points to the host's cooperative scheduler.
///
/// `run_async` queues a callback for the next scheduler tick and is callable
/// from any thread. `is_on_scheduler_thread` lets callers that may already
/// be running inside a tick execute work inline instead of queueing it,
/// which would otherwise deadlock a caller waiting on its own task.
pub trait HostScheduler: Send + Sync {
    /// Queues `task` to run at the next scheduler tick.
    fn run_async(&self, task: ScheduledTask);

    /// Whether the calling thread is the scheduler thread itself.
    fn is_on_scheduler_thread(&self) -> bool;
}
