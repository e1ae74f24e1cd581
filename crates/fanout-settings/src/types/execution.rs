//! Executor and sharding settings.

use serde::{Deserialize, Serialize};

/// Default in-flight limit for the bounded executor.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10;

/// Thread count used when available parallelism cannot be queried.
pub const FALLBACK_MAX_THREADS: usize = 4;

/// How queued work items are run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionModeSetting {
    /// One at a time, in submission order.
    Sequential,
    /// Up to `maxConcurrentTasks` in flight.
    #[default]
    Concurrent,
}

/// Bounded executor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorSettings {
    /// Maximum tasks in flight in concurrent mode.
    pub max_concurrent_tasks: usize,
    /// Execution mode.
    pub mode: ExecutionModeSetting,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            mode: ExecutionModeSetting::Concurrent,
        }
    }
}

/// Thread-sharded executor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShardingSettings {
    /// Maximum worker threads (one shard per thread).
    pub max_threads: usize,
    /// In-flight limit inside each shard.
    pub max_concurrent_per_thread: usize,
}

impl Default for ShardingSettings {
    fn default() -> Self {
        let max_threads = std::thread::available_parallelism()
            .map_or(FALLBACK_MAX_THREADS, std::num::NonZeroUsize::get);
        Self {
            max_threads,
            max_concurrent_per_thread: DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_defaults() {
        let s = ExecutorSettings::default();
        assert_eq!(s.max_concurrent_tasks, 10);
        assert_eq!(s.mode, ExecutionModeSetting::Concurrent);
    }

    #[test]
    fn sharding_defaults_are_positive() {
        let s = ShardingSettings::default();
        assert!(s.max_threads >= 1);
        assert_eq!(s.max_concurrent_per_thread, 10);
    }

    #[test]
    fn mode_wire_format() {
        let mode: ExecutionModeSetting = serde_json::from_str("\"sequential\"").unwrap();
        assert_eq!(mode, ExecutionModeSetting::Sequential);
        assert_eq!(
            serde_json::to_string(&ExecutionModeSetting::Concurrent).unwrap(),
            "\"concurrent\""
        );
    }
}
