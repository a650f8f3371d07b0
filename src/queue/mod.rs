//! Priority task queue with dependency-driven readiness.
//!
//! [`TaskQueue`] owns every task, the priority-ordered ready set, and the
//! running/completed bookkeeping. It mediates all status transitions:
//! submission decides initial placement, dequeue moves ready tasks to
//! running, and completion reports unblock dependents through the
//! dependency graph.
//!
//! All mutating operations are serialized behind a single coarse mutex;
//! submitters and workers share one queue through an `Arc`. The guard is
//! held only for bookkeeping, never across an await point.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::graph::DependencyGraph;
use crate::core::task::{Task, TaskStatus};
use crate::core::types::TaskId;
use crate::hooks::QueueHook;

/// Default bound on concurrently running tasks.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Entry in the ready heap.
///
/// Ordered so the heap pops the largest caller priority first and breaks
/// ties by submission sequence, earlier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyEntry {
    priority: i64,
    seq: u64,
    id: TaskId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Counts per status plus the aggregate total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub ready: usize,
    pub running: usize,
    pub blocked: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Total number of tasks ever submitted.
    pub total: usize,
}

impl QueueStats {
    /// Tasks that have not started: pending, ready, or blocked.
    pub fn waiting(&self) -> usize {
        self.pending + self.ready + self.blocked
    }

    /// Tasks in a terminal state.
    pub fn terminal(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}

/// Everything guarded by the queue's coarse mutex.
struct QueueState {
    next_id: u64,
    tasks: HashMap<TaskId, Task>,
    graph: DependencyGraph,
    ready: BinaryHeap<ReadyEntry>,
    running: HashSet<TaskId>,
    completed: HashSet<TaskId>,
}

/// Dependency-aware priority queue of tasks.
pub struct TaskQueue {
    max_parallel: usize,
    state: Mutex<QueueState>,
    hooks: RwLock<Vec<Arc<dyn QueueHook>>>,
}

impl TaskQueue {
    /// Create a queue allowing at most `max_parallel` running tasks.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel,
            state: Mutex::new(QueueState {
                next_id: 1,
                tasks: HashMap::new(),
                graph: DependencyGraph::new(),
                ready: BinaryHeap::new(),
                running: HashSet::new(),
                completed: HashSet::new(),
            }),
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// The concurrency bound this queue enforces.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Number of tasks ever submitted.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Check if no tasks have been submitted.
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Register a lifecycle hook.
    ///
    /// Hooks are invoked synchronously from within [`complete_task`] and
    /// [`fail_task`], after the state guard has been released, so a hook
    /// may call back into the queue.
    ///
    /// [`complete_task`]: TaskQueue::complete_task
    /// [`fail_task`]: TaskQueue::fail_task
    pub fn register_hook(&self, hook: Arc<dyn QueueHook>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned guard still holds consistent bookkeeping; recover it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks_snapshot(&self) -> Vec<Arc<dyn QueueHook>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Submit a unit of work and return its id.
    ///
    /// Registers the task's dependency edges and decides initial placement:
    /// ready if the dependency set is already satisfied by the completed
    /// set, blocked otherwise. Dependency ids are not validated — an id
    /// that is never submitted leaves the dependent blocked indefinitely.
    pub fn add(
        &self,
        description: impl Into<String>,
        priority: i64,
        dependencies: HashSet<TaskId>,
        metadata: Value,
    ) -> TaskId {
        let mut guard = self.lock();
        let state = &mut *guard;

        let id = TaskId::new(state.next_id);
        state.next_id += 1;

        let mut task = Task::new(id, description.into(), priority, dependencies.clone(), metadata);
        state.graph.add_task(id, &dependencies);

        if state.graph.is_ready(&id, &state.completed) {
            task.mark_ready();
            state.ready.push(ReadyEntry {
                priority,
                seq: id.as_u64(),
                id,
            });
        } else {
            task.mark_blocked();
        }

        debug!(task = %id, status = ?task.status, priority, "task submitted");
        state.tasks.insert(id, task);
        id
    }

    /// Dequeue up to `max_count` ready tasks, bounded by the free slots
    /// under `max_parallel`, and transition them to running.
    ///
    /// Returned tasks are snapshots; the queue remains the owner of the
    /// authoritative state. Heap entries whose task is no longer ready
    /// (already dequeued by a racing call, or cancelled) are stale and are
    /// discarded rather than returned.
    pub fn next_ready(&self, max_count: usize) -> Vec<Task> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let available = self.max_parallel.saturating_sub(state.running.len());
        let limit = max_count.min(available);

        let mut claimed = Vec::new();
        while claimed.len() < limit {
            let Some(entry) = state.ready.pop() else { break };

            let eligible = state
                .tasks
                .get(&entry.id)
                .map(|t| t.status == TaskStatus::Ready)
                .unwrap_or(false)
                && !state.running.contains(&entry.id);
            if !eligible {
                continue;
            }

            if let Some(task) = state.tasks.get_mut(&entry.id) {
                task.mark_running();
                state.running.insert(entry.id);
                claimed.push(task.clone());
            }
        }

        if !claimed.is_empty() {
            debug!(count = claimed.len(), "dequeued ready tasks");
        }
        claimed
    }

    /// Record a successful completion and promote any dependents whose
    /// full dependency set is now satisfied.
    ///
    /// Idempotent: re-invoking on an already-terminal id overwrites the
    /// stored result and the dependent scan is a no-op.
    pub fn complete_task(&self, id: &TaskId, result: Value) {
        let snapshot = {
            let mut guard = self.lock();
            let state = &mut *guard;

            let Some(task) = state.tasks.get_mut(id) else {
                warn!(task = %id, "complete_task on unknown task id");
                return;
            };
            task.mark_completed(result);
            let snapshot = task.clone();

            state.running.remove(id);
            state.completed.insert(*id);

            for dependent in state.graph.dependents_of(id) {
                let satisfied = state.graph.is_ready(&dependent, &state.completed);
                if let Some(dep_task) = state.tasks.get_mut(&dependent) {
                    if dep_task.status == TaskStatus::Blocked && satisfied {
                        dep_task.mark_ready();
                        state.ready.push(ReadyEntry {
                            priority: dep_task.priority,
                            seq: dependent.as_u64(),
                            id: dependent,
                        });
                        debug!(task = %dependent, "dependent promoted to ready");
                    }
                }
            }

            snapshot
        };

        for hook in self.hooks_snapshot() {
            hook.on_complete(&snapshot);
        }
    }

    /// Record a failure.
    ///
    /// The id does not enter the completed set and no cascading action is
    /// taken: dependents stay blocked until the caller resolves them.
    pub fn fail_task(&self, id: &TaskId, error: impl Into<String>) {
        let snapshot = {
            let mut guard = self.lock();
            let state = &mut *guard;

            let Some(task) = state.tasks.get_mut(id) else {
                warn!(task = %id, "fail_task on unknown task id");
                return;
            };
            task.mark_failed(error);
            state.running.remove(id);
            task.clone()
        };

        debug!(task = %id, "task failed");
        for hook in self.hooks_snapshot() {
            hook.on_failed(&snapshot);
        }
    }

    /// Cancel a task and remove it from the dependency graph.
    ///
    /// Removal strips the id from every dependent's dependency set, so a
    /// blocked dependent whose remaining dependencies are already satisfied
    /// becomes ready even though the cancelled task never completed.
    pub fn cancel_task(&self, id: &TaskId) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(task) = state.tasks.get_mut(id) else {
            warn!(task = %id, "cancel_task on unknown task id");
            return;
        };
        task.mark_cancelled();
        state.running.remove(id);

        let dependents = state.graph.dependents_of(id);
        state.graph.remove_task(id);

        for dependent in dependents {
            let satisfied = state.graph.is_ready(&dependent, &state.completed);
            if let Some(dep_task) = state.tasks.get_mut(&dependent) {
                dep_task.dependencies.remove(id);
                if dep_task.status == TaskStatus::Blocked && satisfied {
                    dep_task.mark_ready();
                    state.ready.push(ReadyEntry {
                        priority: dep_task.priority,
                        seq: dependent.as_u64(),
                        id: dependent,
                    });
                    debug!(task = %dependent, cancelled = %id, "dependent unblocked by cancellation");
                }
            }
        }
    }

    /// Snapshot of a task by id.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.get(id).cloned()
    }

    /// Current status of a task by id.
    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.lock().tasks.get(id).map(|t| t.status)
    }

    /// Counts per status plus the total.
    pub fn get_stats(&self) -> QueueStats {
        let guard = self.lock();
        let mut stats = QueueStats {
            total: guard.tasks.len(),
            ..QueueStats::default()
        };
        for task in guard.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Ready => stats.ready += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Blocked => stats.blocked += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Tasks in dependency order; members of a cycle are absent.
    pub fn execution_order(&self) -> Vec<TaskId> {
        self.lock().graph.topological_sort()
    }

    /// Whether any dependency chain loops back on itself.
    pub fn has_deadlock(&self) -> bool {
        self.lock().graph.has_cycle()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLEL)
    }
}
