//! Progress tracking for one orchestration round.
//!
//! - [`ProgressLedger`] / [`SharedProgressLedger`]: latest status per task id,
//!   published as one message with renumbered citations
//! - [`ChunkRegistry`]: keyed store for content chunks cited by tasks
//! - [`LedgerEvent`]: broadcast stream of ledger changes

pub mod events;
pub mod progress;
pub mod reference;
pub mod registry;
pub mod status;

pub use events::{LedgerEmitter, LedgerEvent};
pub use progress::{PublishedMessage, ProgressLedger, SharedProgressLedger};
pub use reference::{CitedText, Reference, Renumbered, renumber_citations};
pub use registry::ChunkRegistry;
pub use status::{StatusUpdate, ToolExecutionStatus, ToolState};
