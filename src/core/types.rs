//! Core identifier types for the scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a task.
///
/// Ids are issued by the queue from a monotonically increasing counter and
/// are unique for the lifetime of the process. Lower ids were submitted
/// earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a TaskId from a raw counter value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
