//! ordo - a minimal, dependency-aware task scheduler for agent workloads.
//!
//! Callers submit opaque units of work with a priority and a set of
//! prerequisite task ids. The queue keeps a priority-ordered ready set
//! constrained by the dependency graph, and a bounded pool of persistent
//! workers drains it, invoking a caller-supplied execution function and
//! reporting each outcome back. Completions unblock dependents; failures
//! do not cascade.
//!
//! All scheduler state is in-memory and ephemeral. The scheduler never
//! inspects what a task represents.
//!
//! # Main types
//!
//! - [`TaskQueue`] — owns every task and mediates all status transitions.
//! - [`DependencyGraph`] — "task depends on prerequisite" edges plus the
//!   reverse index; readiness, cycle, and ordering queries.
//! - [`Task`] / [`TaskStatus`] — one unit of schedulable work and its
//!   lifecycle.
//! - [`WorkerPool`] — persistent workers draining the ready set.
//! - [`TaskHandler`] — the execution function supplied by the caller.
//! - [`QueueHook`] — optional observer for terminal transitions.

pub mod core;
pub mod executor;
pub mod hooks;
pub mod queue;

pub use crate::core::graph::DependencyGraph;
pub use crate::core::task::{Task, TaskError, TaskStatus};
pub use crate::core::types::TaskId;
pub use crate::executor::{TaskHandler, WorkerPool, DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_TIMEOUT};
pub use crate::hooks::QueueHook;
pub use crate::queue::{QueueStats, TaskQueue, DEFAULT_MAX_PARALLEL};
