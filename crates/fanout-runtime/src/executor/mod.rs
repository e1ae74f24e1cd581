//! Task execution.
//!
//! - [`BoundedTaskExecutor`]: a single-lane queue, sequential or bounded-concurrent
//! - [`ThreadShardedExecutor`]: contiguous shards across OS threads, each a
//!   bounded-concurrent lane
//!
//! Both return one [`TaskOutcome`] per submitted [`WorkItem`], in submission order.

pub mod bounded;
pub mod outcome;
pub mod sharded;
pub mod work_item;

pub use bounded::{BoundedTaskExecutor, ExecutionMode};
pub use outcome::{OutcomeSummary, TaskOutcome};
pub use sharded::{ThreadShardedExecutor, run_sharded, shard_sizes};
pub use work_item::{TaskFuture, WorkItem};
