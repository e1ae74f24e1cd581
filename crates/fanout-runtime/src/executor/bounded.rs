//! Bounded executor: a queue of work items run sequentially or with a
//! concurrency ceiling.
//!
//! Outcomes come back in submission order regardless of completion order.
//! A failing or panicking item becomes a [`TaskOutcome::Failure`] in its own
//! slot and never cancels its siblings.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use fanout_core::errors::TaskError;
use fanout_core::ids::RunId;
use fanout_settings::{ExecutionModeSetting, ExecutorSettings};
use metrics::{counter, gauge, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::executor::outcome::TaskOutcome;
use crate::executor::work_item::WorkItem;
use crate::metrics::{
    EXECUTOR_OUTCOMES_TOTAL, EXECUTOR_RUN_DURATION_SECONDS, EXECUTOR_TASKS_IN_FLIGHT,
    EXECUTOR_TASKS_TOTAL,
};

/// How a [`BoundedTaskExecutor`] runs its queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One item at a time, each starting after the previous completes.
    Sequential,
    /// Up to `max_concurrent` items in flight at once.
    Concurrent {
        /// In-flight ceiling (at least 1).
        max_concurrent: usize,
    },
}

impl ExecutionMode {
    fn label(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent { .. } => "concurrent",
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Concurrent {
            max_concurrent: fanout_settings::DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }
}

impl From<&ExecutorSettings> for ExecutionMode {
    fn from(settings: &ExecutorSettings) -> Self {
        match settings.mode {
            ExecutionModeSetting::Sequential => Self::Sequential,
            ExecutionModeSetting::Concurrent => Self::Concurrent {
                max_concurrent: settings.max_concurrent_tasks.max(1),
            },
        }
    }
}

/// Queue of work items with a bounded run.
pub struct BoundedTaskExecutor<T> {
    mode: ExecutionMode,
    queue: Vec<WorkItem<T>>,
}

impl<T: Send + 'static> BoundedTaskExecutor<T> {
    /// Create an executor in the given mode. A zero ceiling is raised to 1.
    pub fn new(mode: ExecutionMode) -> Self {
        let mode = match mode {
            ExecutionMode::Concurrent { max_concurrent: 0 } => {
                warn!("max_concurrent is 0, raised to 1");
                ExecutionMode::Concurrent { max_concurrent: 1 }
            }
            other => other,
        };
        Self {
            mode,
            queue: Vec::new(),
        }
    }

    /// Sequential executor.
    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential)
    }

    /// Concurrent executor with an in-flight ceiling.
    pub fn concurrent(max_concurrent: usize) -> Self {
        Self::new(ExecutionMode::Concurrent { max_concurrent })
    }

    /// Executor configured from the executor settings section.
    pub fn from_settings(settings: &ExecutorSettings) -> Self {
        Self::new(ExecutionMode::from(settings))
    }

    /// The effective execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue a prepared work item.
    pub fn push(&mut self, item: WorkItem<T>) -> &mut Self {
        self.queue.push(item);
        self
    }

    /// Enqueue a callable. Nothing runs until [`run`](Self::run).
    pub fn add<F, Fut, E>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.push(WorkItem::new(task))
    }

    /// Enqueue a callable together with the argument it will be invoked with.
    pub fn add_with<A, F, Fut, E>(&mut self, task: F, args: A) -> &mut Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.push(WorkItem::with_args(task, args))
    }

    /// Enqueue a labeled callable.
    pub fn add_labeled<F, Fut, E>(&mut self, label: impl Into<String>, task: F) -> &mut Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.push(WorkItem::new(task).labeled(label))
    }

    /// Run every queued item and return one outcome per item, in submission
    /// order. The queue is empty afterwards.
    #[instrument(skip_all, fields(run_id, mode = self.mode.label(), tasks = self.queue.len()))]
    pub async fn run(&mut self) -> Vec<TaskOutcome<T>> {
        let items = std::mem::take(&mut self.queue);
        if items.is_empty() {
            return Vec::new();
        }
        let run_id = RunId::new();
        let _ = tracing::Span::current().record("run_id", run_id.as_str());

        let mode_label = self.mode.label();
        counter!(EXECUTOR_TASKS_TOTAL, "mode" => mode_label).increment(items.len() as u64);
        let started = Instant::now();

        let outcomes = match self.mode {
            ExecutionMode::Sequential => run_sequential(items).await,
            ExecutionMode::Concurrent { max_concurrent } => {
                run_concurrent(items, max_concurrent).await
            }
        };

        for outcome in &outcomes {
            let result = if outcome.is_success() { "success" } else { "failure" };
            counter!(EXECUTOR_OUTCOMES_TOTAL, "result" => result).increment(1);
        }
        histogram!(EXECUTOR_RUN_DURATION_SECONDS, "mode" => mode_label)
            .record(started.elapsed().as_secs_f64());
        debug!(outcomes = outcomes.len(), "executor run complete");
        outcomes
    }
}

impl<T: Send + 'static> Default for BoundedTaskExecutor<T> {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}

impl<T> fmt::Debug for BoundedTaskExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedTaskExecutor")
            .field("mode", &self.mode)
            .field("queued", &self.queue.len())
            .finish()
    }
}

async fn run_sequential<T: Send + 'static>(items: Vec<WorkItem<T>>) -> Vec<TaskOutcome<T>> {
    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
        gauge!(EXECUTOR_TASKS_IN_FLIGHT).increment(1.0);
        outcomes.push(item.drive().await);
        gauge!(EXECUTOR_TASKS_IN_FLIGHT).decrement(1.0);
    }
    outcomes
}

async fn run_concurrent<T: Send + 'static>(
    items: Vec<WorkItem<T>>,
    max_concurrent: usize,
) -> Vec<TaskOutcome<T>> {
    let len = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let _ = set.spawn(async move {
            // Held until the item finishes
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, TaskOutcome::Failure(TaskError::lost("semaphore closed")));
            };
            gauge!(EXECUTOR_TASKS_IN_FLIGHT).increment(1.0);
            let outcome = item.drive().await;
            gauge!(EXECUTOR_TASKS_IN_FLIGHT).decrement(1.0);
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<TaskOutcome<T>>> =
        std::iter::repeat_with(|| None).take(len).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => warn!(error = %e, "work item task did not complete"),
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| TaskOutcome::Failure(TaskError::lost("task was cancelled")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_ceiling_is_raised() {
        let executor = BoundedTaskExecutor::<()>::concurrent(0);
        assert_eq!(executor.mode(), ExecutionMode::Concurrent { max_concurrent: 1 });
    }

    #[test]
    fn mode_from_settings() {
        let settings = ExecutorSettings {
            max_concurrent_tasks: 3,
            mode: ExecutionModeSetting::Concurrent,
        };
        assert_eq!(
            ExecutionMode::from(&settings),
            ExecutionMode::Concurrent { max_concurrent: 3 }
        );
        let settings = ExecutorSettings {
            max_concurrent_tasks: 3,
            mode: ExecutionModeSetting::Sequential,
        };
        assert_eq!(
            BoundedTaskExecutor::<()>::from_settings(&settings).mode(),
            ExecutionMode::Sequential
        );
    }

    #[test]
    fn add_queues_without_running() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut executor = BoundedTaskExecutor::<()>::sequential();
        let counter = Arc::clone(&ran);
        let _ = executor.add(move || async move {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });
        assert_eq!(executor.len(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_run_returns_empty() {
        let mut executor = BoundedTaskExecutor::<u32>::default();
        assert!(executor.run().await.is_empty());
    }

    #[tokio::test]
    async fn sequential_preserves_order_and_isolates_failures() {
        let mut executor = BoundedTaskExecutor::sequential();
        let _ = executor
            .add(|| async { Ok::<_, String>(1) })
            .add(|| async { Err::<i32, _>("bad".to_string()) })
            .add(|| async { Ok::<_, String>(3) });

        let outcomes = executor.run().await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], TaskOutcome::Success(1));
        assert_eq!(outcomes[1].failure().unwrap().message, "bad");
        assert_eq!(outcomes[2], TaskOutcome::Success(3));
    }

    #[tokio::test]
    async fn sequential_starts_after_previous_completes() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut executor = BoundedTaskExecutor::sequential();
        for i in 0..3 {
            let log = Arc::clone(&log);
            let _ = executor.add(move || async move {
                log.lock().push(format!("start {i}"));
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock().push(format!("end {i}"));
                Ok::<_, String>(i)
            });
        }
        let _ = executor.run().await;
        assert_eq!(
            *log.lock(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_respects_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut executor = BoundedTaskExecutor::concurrent(3);
        for i in 0..12 {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let _ = executor.add(move || async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(i)
            });
        }
        let outcomes = executor.run().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let values: Vec<i32> = outcomes.into_iter().map(|o| o.into_result().unwrap()).collect();
        assert_eq!(values, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrent_results_follow_submission_not_completion() {
        let mut executor = BoundedTaskExecutor::concurrent(4);
        for (i, delay) in [30_u64, 5, 20, 1].into_iter().enumerate() {
            let _ = executor.add(move || async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, String>(i)
            });
        }
        let outcomes = executor.run().await;
        let values: Vec<usize> = outcomes.into_iter().map(|o| o.into_result().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    fn explode() -> i32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn panic_becomes_failure_without_aborting_siblings() {
        let mut executor = BoundedTaskExecutor::concurrent(2);
        let _ = executor
            .push(WorkItem::infallible(|| async { 1 }))
            .push(WorkItem::infallible(|| async { explode() }))
            .push(WorkItem::infallible(|| async { 3 }));
        let outcomes = executor.run().await;
        assert_eq!(outcomes[0], TaskOutcome::Success(1));
        assert!(outcomes[1].failure().unwrap().is_panic());
        assert_eq!(outcomes[2], TaskOutcome::Success(3));
    }

    #[tokio::test]
    async fn run_twice_second_is_empty() {
        let mut executor = BoundedTaskExecutor::concurrent(2);
        let _ = executor.add_with(|n: u32| async move { Ok::<_, String>(n + 1) }, 41);
        assert_eq!(executor.run().await, vec![TaskOutcome::Success(42)]);
        assert!(executor.is_empty());
        assert!(executor.run().await.is_empty());
    }

    #[tokio::test]
    async fn labeled_items_run() {
        let mut executor = BoundedTaskExecutor::sequential();
        let _ = executor.add_labeled("fetch", || async { Ok::<_, String>("page") });
        assert_eq!(executor.run().await, vec![TaskOutcome::Success("page")]);
    }
}
