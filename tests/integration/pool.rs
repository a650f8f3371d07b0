//! Worker pool behavior under load.
//!
//! Concurrency-cap enforcement, failure isolation, and graceful shutdown.

use async_trait::async_trait;
use ordo::{Task, TaskError, TaskHandler, TaskId, TaskQueue, WorkerPool};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::wait_for_all_terminal;

fn no_deps() -> HashSet<TaskId> {
    HashSet::new()
}

/// Handler that tracks how many executions are in flight at once.
struct GaugeHandler {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    executed: AtomicUsize,
    delay: Duration,
}

impl GaugeHandler {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait]
impl TaskHandler for GaugeHandler {
    async fn execute(&self, _task: &Task) -> Result<Value, TaskError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Handler that fails every other task.
struct AlternatingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl TaskHandler for AlternatingHandler {
    async fn execute(&self, _task: &Task) -> Result<Value, TaskError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 1 {
            Err(TaskError::ExecutionFailed(format!("call {} rejected", n)))
        } else {
            Ok(Value::Null)
        }
    }
}

/// Test: with more workers than slots, the running bound still holds.
#[tokio::test]
async fn test_concurrency_cap_holds_under_load() {
    crate::common::init_tracing();

    let queue = Arc::new(TaskQueue::new(3));
    let handler = GaugeHandler::new(Duration::from_millis(20));
    let mut pool = WorkerPool::new(queue.clone(), handler.clone())
        .with_poll_interval(Duration::from_millis(2));

    let ids: Vec<TaskId> = (0..12)
        .map(|i| queue.add(format!("unit {}", i), (i % 4) as i64, no_deps(), Value::Null))
        .collect();

    pool.start(8);
    wait_for_all_terminal(&queue, &ids, Duration::from_secs(10)).await;
    pool.stop().await;

    assert_eq!(handler.executed.load(Ordering::SeqCst), 12);
    let peak = handler.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {} exceeded max_parallel 3", peak);

    let stats = queue.get_stats();
    assert_eq!(stats.completed, 12);
    assert_eq!(stats.total, 12);
}

/// Test: failures are isolated per task and never take a worker down.
#[tokio::test]
async fn test_failures_are_isolated_per_task() {
    crate::common::init_tracing();

    let queue = Arc::new(TaskQueue::new(2));
    let handler = Arc::new(AlternatingHandler {
        calls: AtomicUsize::new(0),
    });
    let mut pool = WorkerPool::new(queue.clone(), handler)
        .with_poll_interval(Duration::from_millis(2));

    let ids: Vec<TaskId> = (0..10)
        .map(|i| queue.add(format!("unit {}", i), 0, no_deps(), Value::Null))
        .collect();

    pool.start(2);
    wait_for_all_terminal(&queue, &ids, Duration::from_secs(10)).await;
    pool.stop().await;

    let stats = queue.get_stats();
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.terminal(), 10);
    assert_eq!(stats.total, 10);
}

/// Test: stop lets in-flight work finish and leaves the rest untouched.
#[tokio::test]
async fn test_graceful_shutdown_leaves_queue_consistent() {
    crate::common::init_tracing();

    let queue = Arc::new(TaskQueue::new(2));
    let handler = GaugeHandler::new(Duration::from_millis(10));
    let mut pool = WorkerPool::new(queue.clone(), handler.clone())
        .with_poll_interval(Duration::from_millis(2));

    let ids: Vec<TaskId> = (0..20)
        .map(|i| queue.add(format!("unit {}", i), 0, no_deps(), Value::Null))
        .collect();

    pool.start(2);
    // let a few finish, then wind down mid-stream
    wait_for_all_terminal(&queue, &ids[..2], Duration::from_secs(5)).await;
    pool.stop().await;

    let stats = queue.get_stats();
    assert_eq!(stats.running, 0, "no task left marked running after stop");
    assert_eq!(
        stats.completed + stats.ready,
        20,
        "every task is either done or still eligible"
    );

    // a fresh pool can pick up where the old one left off
    let mut second = WorkerPool::new(queue.clone(), handler)
        .with_poll_interval(Duration::from_millis(2));
    second.start(2);
    wait_for_all_terminal(&queue, &ids, Duration::from_secs(10)).await;
    second.stop().await;

    assert_eq!(queue.get_stats().completed, 20);
}
