//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file format.
//! Each type implements [`Default`] with production default values, and every
//! struct is `#[serde(default)]` so partial JSON fills in the rest.

mod batching;
mod execution;
mod ledger;

pub use batching::*;
pub use execution::*;
pub use ledger::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "executor": { "maxConcurrentTasks": 4 },
///   "batching": { "maxTokensPerBatch": 12000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FanoutSettings {
    /// Bounded executor settings.
    pub executor: ExecutorSettings,
    /// Thread-sharded executor settings.
    pub sharding: ShardingSettings,
    /// Token batching limits.
    pub batching: BatchingSettings,
    /// Progress ledger settings.
    pub ledger: LedgerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl FanoutSettings {
    /// Correct values that would make a component unusable.
    ///
    /// Zero limits are raised to 1 with a warning rather than rejected.
    pub fn validate(&mut self) {
        fn at_least_one(val: &mut usize, name: &str) {
            if *val == 0 {
                tracing::warn!("{name} is 0, raised to 1");
                *val = 1;
            }
        }

        at_least_one(&mut self.executor.max_concurrent_tasks, "maxConcurrentTasks");
        at_least_one(&mut self.sharding.max_threads, "maxThreads");
        at_least_one(
            &mut self.sharding.max_concurrent_per_thread,
            "maxConcurrentPerThread",
        );
        at_least_one(&mut self.batching.max_tokens_per_batch, "maxTokensPerBatch");
        at_least_one(&mut self.batching.max_items_per_batch, "maxItemsPerBatch");
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`) or a full
    /// `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
