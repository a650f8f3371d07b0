//! Worker pool and the injected execution contract.
//!
//! The scheduler does not know what a task *does*; the caller supplies a
//! [`TaskHandler`] and [`WorkerPool`] drives it: a fixed set of persistent
//! workers repeatedly pull ready work from the queue, execute it, and
//! report completion or failure back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::task::{Task, TaskError};
use crate::queue::TaskQueue;

/// Default idle wait between ready-set polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default bound on waiting for workers during [`WorkerPool::stop`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// The execution function supplied by the caller.
///
/// Invoked once per dequeue; the scheduler performs no retries. Returning
/// `Err` marks the task failed with the error's message.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Perform the work for one task and return its result payload.
    async fn execute(&self, task: &Task) -> Result<Value, TaskError>;
}

/// A bounded pool of persistent workers draining a [`TaskQueue`].
///
/// Workers poll the queue on a fixed interval when no work is ready; the
/// interval is the latency floor between a task becoming ready and a
/// worker noticing it.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool over `queue` that executes work with `handler`.
    pub fn new(queue: Arc<TaskQueue>, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            queue,
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Set the idle wait between ready-set polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the bound on waiting for workers during [`stop`].
    ///
    /// [`stop`]: WorkerPool::stop
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Number of workers spawned so far.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Spawn `n` persistent workers.
    ///
    /// Each worker loops: dequeue one ready task, execute it through the
    /// handler, report the outcome back to the queue; when nothing is
    /// ready, sleep for the poll interval and retry.
    pub fn start(&mut self, n: usize) {
        for _ in 0..n {
            let index = self.workers.len();
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            let shutdown = Arc::clone(&self.shutdown);
            let poll_interval = self.poll_interval;

            self.workers.push(tokio::spawn(async move {
                run_worker(index, queue, handler, shutdown, poll_interval).await;
            }));
        }
        debug!(workers = self.workers.len(), "worker pool started");
    }

    /// Signal all workers to exit after their current unit of work and
    /// wait for them, bounded by the shutdown timeout.
    ///
    /// A handler that never returns keeps its worker alive past the
    /// timeout; the worker is then left behind and a warning is logged.
    /// In-flight work is never interrupted.
    pub async fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.workers.is_empty() {
            return;
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        loop {
            self.workers.retain(|handle| !handle.is_finished());
            if self.workers.is_empty() {
                debug!("all workers exited");
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining = self.workers.len(),
                    "shutdown timeout exceeded with workers still busy"
                );
                self.workers.clear();
                break;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// One worker's loop: poll, execute, report.
async fn run_worker(
    index: usize,
    queue: Arc<TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    debug!(worker = index, "worker started");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let Some(task) = queue.next_ready(1).into_iter().next() else {
            tokio::time::sleep(poll_interval).await;
            continue;
        };

        let id = task.id;
        debug!(worker = index, task = %id, "executing task");

        // Run the handler on its own tokio task so a panic surfaces as a
        // JoinError instead of killing the worker loop.
        let handler = Arc::clone(&handler);
        let outcome = tokio::spawn(async move { handler.execute(&task).await }).await;

        match outcome {
            Ok(Ok(result)) => queue.complete_task(&id, result),
            Ok(Err(err)) => queue.fail_task(&id, err.to_string()),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                queue.fail_task(&id, message);
            }
            Err(join_err) => queue.fail_task(&id, join_err.to_string()),
        }
    }

    debug!(worker = index, "worker exited");
}
