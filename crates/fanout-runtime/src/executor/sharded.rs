//! Thread-sharded executor.
//!
//! Splits a task list into contiguous shards, runs each shard on its own OS
//! thread with a private current-thread runtime and a concurrent
//! [`BoundedTaskExecutor`], then concatenates shard outcomes in shard order.

use std::thread;
use std::time::Instant;

use fanout_core::errors::{ShardDriverError, TaskError};
use fanout_settings::ShardingSettings;
use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use crate::executor::bounded::BoundedTaskExecutor;
use crate::executor::outcome::TaskOutcome;
use crate::executor::work_item::WorkItem;
use crate::metrics::{SHARDED_RUN_DURATION_SECONDS, SHARDS_SPAWNED_TOTAL};

/// Shard sizes for `len` items over at most `max_threads` threads.
///
/// Sizes differ by at most one, larger shards first, and the largest equals
/// `ceil(len / max_threads)`. Empty when there is nothing to run.
pub fn shard_sizes(len: usize, max_threads: usize) -> Vec<usize> {
    if len == 0 || max_threads == 0 {
        return Vec::new();
    }
    let shards = max_threads.min(len);
    let base = len / shards;
    let extra = len % shards;
    (0..shards).map(|i| base + usize::from(i < extra)).collect()
}

/// Per-shard driver: runs one shard's items and returns their outcomes.
pub(crate) type ShardDriver<T> =
    fn(usize, Vec<WorkItem<T>>, usize) -> Result<Vec<TaskOutcome<T>>, ShardDriverError>;

/// Two-level executor: OS threads outside, bounded concurrency inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadShardedExecutor {
    max_threads: usize,
    max_concurrent_per_thread: usize,
}

impl ThreadShardedExecutor {
    /// Create an executor. `max_threads == 0` is rejected when run.
    pub fn new(max_threads: usize, max_concurrent_per_thread: usize) -> Self {
        Self {
            max_threads,
            max_concurrent_per_thread,
        }
    }

    /// Executor configured from the sharding settings section.
    pub fn from_settings(settings: &ShardingSettings) -> Self {
        Self::new(settings.max_threads, settings.max_concurrent_per_thread)
    }

    /// Thread ceiling.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// In-flight ceiling inside each shard.
    pub fn max_concurrent_per_thread(&self) -> usize {
        self.max_concurrent_per_thread
    }

    /// Run all items, blocking the calling thread until every shard finishes.
    ///
    /// Individual item failures come back as [`TaskOutcome::Failure`]. A shard
    /// whose thread or scheduler fails aborts the whole run with the first
    /// such error, after every started shard has been joined.
    ///
    /// Must not be called from inside an async context; use
    /// [`run_async`](Self::run_async) there.
    #[instrument(skip_all, fields(tasks = items.len(), max_threads = self.max_threads))]
    pub fn run<T: Send + 'static>(
        &self,
        items: Vec<WorkItem<T>>,
    ) -> Result<Vec<TaskOutcome<T>>, ShardDriverError> {
        self.run_with_driver(items, run_shard::<T>)
    }

    pub(crate) fn run_with_driver<T: Send + 'static>(
        &self,
        items: Vec<WorkItem<T>>,
        driver: ShardDriver<T>,
    ) -> Result<Vec<TaskOutcome<T>>, ShardDriverError> {
        if self.max_threads == 0 {
            return Err(ShardDriverError::NoThreads);
        }
        let sizes = shard_sizes(items.len(), self.max_threads);
        if sizes.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let total = items.len();

        let mut remaining = items.into_iter();
        let mut handles = Vec::with_capacity(sizes.len());
        let mut first_error: Option<ShardDriverError> = None;

        for (shard, size) in sizes.iter().copied().enumerate() {
            let chunk: Vec<WorkItem<T>> = remaining.by_ref().take(size).collect();
            let per_thread = self.max_concurrent_per_thread;
            let spawned = thread::Builder::new()
                .name(format!("fanout-shard-{shard}"))
                .spawn(move || driver(shard, chunk, per_thread));
            match spawned {
                Ok(handle) => {
                    counter!(SHARDS_SPAWNED_TOTAL).increment(1);
                    handles.push((shard, handle));
                }
                Err(e) => {
                    warn!(shard, error = %e, "failed to spawn shard thread");
                    first_error = Some(ShardDriverError::Spawn {
                        shard,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        for (shard, handle) in handles {
            match handle.join() {
                Ok(Ok(shard_outcomes)) => outcomes.extend(shard_outcomes),
                Ok(Err(e)) => {
                    warn!(shard, error = %e, "shard driver failed");
                    let _ = first_error.get_or_insert(e);
                }
                Err(payload) => {
                    let reason = TaskError::from_panic(payload.as_ref()).message;
                    warn!(shard, %reason, "shard thread panicked");
                    let _ = first_error
                        .get_or_insert(ShardDriverError::Panicked { shard, reason });
                }
            }
        }

        histogram!(SHARDED_RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    /// Async wrapper around [`run`](Self::run) that joins the shard threads on
    /// the blocking pool.
    pub async fn run_async<T: Send + 'static>(
        &self,
        items: Vec<WorkItem<T>>,
    ) -> Result<Vec<TaskOutcome<T>>, ShardDriverError> {
        let executor = *self;
        tokio::task::spawn_blocking(move || executor.run(items))
            .await
            .map_err(|e| ShardDriverError::Join(e.to_string()))?
    }
}

impl Default for ThreadShardedExecutor {
    fn default() -> Self {
        Self::from_settings(&ShardingSettings::default())
    }
}

/// Run `items` over `max_threads` shards of at most `max_concurrent_per_thread`
/// in-flight items each.
pub fn run_sharded<T: Send + 'static>(
    items: Vec<WorkItem<T>>,
    max_threads: usize,
    max_concurrent_per_thread: usize,
) -> Result<Vec<TaskOutcome<T>>, ShardDriverError> {
    ThreadShardedExecutor::new(max_threads, max_concurrent_per_thread).run(items)
}

fn run_shard<T: Send + 'static>(
    shard: usize,
    items: Vec<WorkItem<T>>,
    max_concurrent: usize,
) -> Result<Vec<TaskOutcome<T>>, ShardDriverError> {
    debug!(shard, tasks = items.len(), "shard started");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ShardDriverError::Scheduler {
            shard,
            reason: e.to_string(),
        })?;

    let mut executor = BoundedTaskExecutor::concurrent(max_concurrent);
    for item in items {
        let _ = executor.push(item);
    }
    let outcomes = runtime.block_on(executor.run());
    debug!(shard, outcomes = outcomes.len(), "shard finished");
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn sizes_are_balanced() {
        assert_eq!(shard_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(shard_sizes(9, 3), vec![3, 3, 3]);
        assert_eq!(shard_sizes(11, 4), vec![3, 3, 3, 2]);
    }

    #[test]
    fn sizes_never_exceed_items() {
        assert_eq!(shard_sizes(2, 8), vec![1, 1]);
        assert!(shard_sizes(0, 4).is_empty());
        assert!(shard_sizes(5, 0).is_empty());
    }

    #[test]
    fn zero_threads_is_fatal() {
        let err = run_sharded(vec![WorkItem::infallible(|| async { 1 })], 0, 2).unwrap_err();
        assert_eq!(err, ShardDriverError::NoThreads);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let outcomes = run_sharded::<()>(Vec::new(), 4, 2).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn flattens_in_submission_order() {
        let items: Vec<WorkItem<usize>> = (0..10)
            .map(|i| {
                WorkItem::infallible(move || async move {
                    tokio::time::sleep(Duration::from_millis((10 - i as u64) * 2)).await;
                    i
                })
            })
            .collect();
        let outcomes = run_sharded(items, 3, 2).unwrap();
        let values: Vec<usize> = outcomes.into_iter().map(|o| o.into_result().unwrap()).collect();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shards_run_on_named_threads() {
        let names = Arc::new(parking_lot::Mutex::new(HashSet::new()));
        let items: Vec<WorkItem<()>> = (0..6)
            .map(|_| {
                let names = Arc::clone(&names);
                WorkItem::infallible(move || async move {
                    let name = thread::current().name().unwrap_or_default().to_owned();
                    let _ = names.lock().insert(name);
                })
            })
            .collect();
        let _ = ThreadShardedExecutor::new(3, 2).run(items).unwrap();
        let names = names.lock();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.starts_with("fanout-shard-")));
    }

    #[test]
    fn item_failures_stay_in_their_slot() {
        let items = vec![
            WorkItem::new(|| async { Ok::<_, String>(1) }),
            WorkItem::new(|| async { Err::<i32, _>("nope".to_string()) }),
            WorkItem::new(|| async { Ok::<_, String>(3) }),
        ];
        let outcomes = run_sharded(items, 2, 1).unwrap();
        assert_eq!(outcomes[0], TaskOutcome::Success(1));
        assert_matches!(&outcomes[1], TaskOutcome::Failure(e) if e.message == "nope");
        assert_eq!(outcomes[2], TaskOutcome::Success(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_async_from_runtime() {
        let items: Vec<WorkItem<u8>> = (0..4_u8)
            .map(|i| WorkItem::infallible(move || async move { i }))
            .collect();
        let outcomes = ThreadShardedExecutor::new(2, 2).run_async(items).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(TaskOutcome::is_success));
    }

    fn fail_second_shard(
        shard: usize,
        items: Vec<WorkItem<usize>>,
        max_concurrent: usize,
    ) -> Result<Vec<TaskOutcome<usize>>, ShardDriverError> {
        if shard == 1 {
            return Err(ShardDriverError::Scheduler {
                shard,
                reason: "runtime unavailable".to_owned(),
            });
        }
        run_shard(shard, items, max_concurrent)
    }

    fn crash_last_shard(
        shard: usize,
        items: Vec<WorkItem<usize>>,
        max_concurrent: usize,
    ) -> Result<Vec<TaskOutcome<usize>>, ShardDriverError> {
        if shard == 2 {
            panic!("shard driver crashed");
        }
        run_shard(shard, items, max_concurrent)
    }

    fn counting_items(n: usize) -> Vec<WorkItem<usize>> {
        (0..n)
            .map(|i| WorkItem::infallible(move || async move { i }))
            .collect()
    }

    #[test]
    fn failing_driver_aborts_run() {
        let err = ThreadShardedExecutor::new(3, 2)
            .run_with_driver(counting_items(9), fail_second_shard)
            .unwrap_err();
        assert_matches!(err, ShardDriverError::Scheduler { shard: 1, .. });
    }

    #[test]
    fn panicking_driver_aborts_run() {
        let err = ThreadShardedExecutor::new(3, 2)
            .run_with_driver(counting_items(9), crash_last_shard)
            .unwrap_err();
        assert_matches!(
            err,
            ShardDriverError::Panicked { shard: 2, ref reason } if reason == "shard driver crashed"
        );
    }

    #[test]
    fn default_driver_matches_run() {
        let outcomes = ThreadShardedExecutor::new(3, 2)
            .run_with_driver(counting_items(7), run_shard::<usize>)
            .unwrap();
        assert_eq!(outcomes.len(), 7);
        assert!(outcomes.iter().all(TaskOutcome::is_success));
    }

    #[test]
    fn shards_can_do_network_io() {
        let items: Vec<WorkItem<u16>> = (0..2)
            .map(|_| {
                WorkItem::new(|| async {
                    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
                    Ok::<_, std::io::Error>(listener.local_addr()?.port())
                })
            })
            .collect();
        let outcomes = ThreadShardedExecutor::new(2, 2).run(items).unwrap();
        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            assert_matches!(outcome, TaskOutcome::Success(port) if port > 0);
        }
    }

    #[test]
    fn from_settings_copies_limits() {
        let settings = ShardingSettings {
            max_threads: 5,
            max_concurrent_per_thread: 7,
        };
        let executor = ThreadShardedExecutor::from_settings(&settings);
        assert_eq!(executor.max_threads(), 5);
        assert_eq!(executor.max_concurrent_per_thread(), 7);
    }
}
