//! # fanout-runtime
//!
//! Concurrency and ordering core of the fanout task orchestrator.
//!
//! - **Executor**: [`BoundedTaskExecutor`] (sequential or bounded-concurrent)
//!   and [`ThreadShardedExecutor`] (contiguous shards across OS threads)
//! - **Batching**: [`TokenBatcher`] greedy, order-preserving token packing
//! - **Ledger**: [`ProgressLedger`] per-round task status with citation
//!   renumbering, [`ChunkRegistry`], and a [`LedgerEvent`] stream
//! - **Sequencer**: [`OrderedLogSequencer`] per-request order numbers and the
//!   [`RequestLog`] sink built on it
//!
//! ## Crate Position
//!
//! Depends on `fanout-core` and `fanout-settings`. Depended on by `fanout-bench`.

#![deny(unsafe_code)]

pub mod batching;
pub mod executor;
pub mod ledger;
pub mod metrics;
pub mod sequencer;

pub use batching::{Batch, TokenBatcher};
pub use executor::{
    BoundedTaskExecutor, ExecutionMode, OutcomeSummary, TaskOutcome, ThreadShardedExecutor,
    WorkItem, run_sharded,
};
pub use ledger::{
    ChunkRegistry, LedgerEvent, ProgressLedger, PublishedMessage, Reference,
    SharedProgressLedger, StatusUpdate, ToolExecutionStatus, ToolState,
};
pub use sequencer::{LogEntry, OrderedLogSequencer, RequestLog};
