//! Task entity and lifecycle types.
//!
//! A [`Task`] is one schedulable unit of work. The scheduler never looks at
//! what the work *is*; it only tracks priority, dependencies, and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use super::types::TaskId;

/// Errors returned by an injected execution function.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Just created, initial placement not yet decided.
    Pending,
    /// All dependencies satisfied, eligible for dequeue.
    Ready,
    /// Currently executing on a worker.
    Running,
    /// Waiting on at least one incomplete dependency.
    Blocked,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Explicitly cancelled before completion.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// One schedulable unit of work.
///
/// `metadata`, `result`, and `error` are opaque to the scheduler; their
/// shape is decided by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Unique, monotonically issued identifier.
    pub id: TaskId,
    /// Human-readable description of the work.
    pub description: String,
    /// Caller-supplied priority; larger means more urgent.
    pub priority: i64,
    /// Wall-clock submission time.
    pub created_at: DateTime<Utc>,
    /// Ids that must reach [`TaskStatus::Completed`] before this task may run.
    pub dependencies: HashSet<TaskId>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Opaque payload set on successful completion.
    pub result: Option<Value>,
    /// Error message set on failure.
    pub error: Option<String>,
    /// Opaque caller payload, untouched by the scheduler.
    pub metadata: Value,
}

impl Task {
    /// Create a new task in the [`TaskStatus::Pending`] state.
    pub(crate) fn new(
        id: TaskId,
        description: String,
        priority: i64,
        dependencies: HashSet<TaskId>,
        metadata: Value,
    ) -> Self {
        Self {
            id,
            description,
            priority,
            created_at: Utc::now(),
            dependencies,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            metadata,
        }
    }

    /// Whether the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn mark_ready(&mut self) {
        self.status = TaskStatus::Ready;
    }

    pub(crate) fn mark_blocked(&mut self) {
        self.status = TaskStatus::Blocked;
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
    }

    pub(crate) fn mark_completed(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
    }
}
