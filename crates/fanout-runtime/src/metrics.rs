//! Metric name constants.
//!
//! Recorded through the `metrics` facade; no recorder is installed by this
//! crate, so every call is a no-op until the host binary installs one.

/// Work items started (counter, labels: mode).
pub const EXECUTOR_TASKS_TOTAL: &str = "executor_tasks_total";
/// Work item outcomes (counter, labels: result).
pub const EXECUTOR_OUTCOMES_TOTAL: &str = "executor_outcomes_total";
/// Work items currently holding a concurrency permit (gauge).
pub const EXECUTOR_TASKS_IN_FLIGHT: &str = "executor_tasks_in_flight";
/// Duration of one executor `run()` (histogram, labels: mode).
pub const EXECUTOR_RUN_DURATION_SECONDS: &str = "executor_run_duration_seconds";
/// Shard threads spawned (counter).
pub const SHARDS_SPAWNED_TOTAL: &str = "shards_spawned_total";
/// Duration of one sharded run (histogram).
pub const SHARDED_RUN_DURATION_SECONDS: &str = "sharded_run_duration_seconds";
/// Batches produced by the token batcher (counter).
pub const BATCHES_TOTAL: &str = "batches_total";
/// Single-item batches over the token ceiling (counter).
pub const OVERSIZED_BATCHES_TOTAL: &str = "oversized_batches_total";
/// Accepted ledger notifications (counter, labels: state).
pub const LEDGER_NOTIFICATIONS_TOTAL: &str = "ledger_notifications_total";
/// Rejected ledger notifications (counter).
pub const LEDGER_REJECTIONS_TOTAL: &str = "ledger_rejections_total";
/// Ledger publishes (counter).
pub const LEDGER_PUBLISHES_TOTAL: &str = "ledger_publishes_total";
/// Order numbers issued by the log sequencer (counter).
pub const SEQUENCER_ORDERS_TOTAL: &str = "sequencer_orders_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            EXECUTOR_TASKS_TOTAL,
            EXECUTOR_OUTCOMES_TOTAL,
            EXECUTOR_TASKS_IN_FLIGHT,
            EXECUTOR_RUN_DURATION_SECONDS,
            SHARDS_SPAWNED_TOTAL,
            SHARDED_RUN_DURATION_SECONDS,
            BATCHES_TOTAL,
            OVERSIZED_BATCHES_TOTAL,
            LEDGER_NOTIFICATIONS_TOTAL,
            LEDGER_REJECTIONS_TOTAL,
            LEDGER_PUBLISHES_TOTAL,
            SEQUENCER_ORDERS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
