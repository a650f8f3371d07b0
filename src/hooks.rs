//! Lifecycle observation hooks.
//!
//! Hooks let external collaborators (metrics, persistence, dashboards)
//! observe terminal task transitions without the queue being coupled to
//! them. They are invoked synchronously from within
//! [`TaskQueue::complete_task`] and [`TaskQueue::fail_task`], after the
//! queue's state guard has been released, so a hook may call back into the
//! queue.
//!
//! [`TaskQueue::complete_task`]: crate::queue::TaskQueue::complete_task
//! [`TaskQueue::fail_task`]: crate::queue::TaskQueue::fail_task

use crate::core::task::Task;

/// Observer for terminal task transitions.
///
/// Both methods default to no-ops so implementors can watch only the
/// transitions they care about. The `task` argument is a snapshot taken
/// after the transition was recorded.
pub trait QueueHook: Send + Sync {
    /// Called after a task transitions to completed.
    fn on_complete(&self, _task: &Task) {}

    /// Called after a task transitions to failed.
    fn on_failed(&self, _task: &Task) {}
}
