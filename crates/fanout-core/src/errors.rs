//! Error hierarchy for the fanout orchestrator.
//!
//! Two propagation classes:
//!
//! - **Recovered**: [`TaskError`] is what a failing work item turns into. It is
//!   carried as data inside a `Failure` outcome and never aborts siblings.
//! - **Fatal**: [`ShardDriverError`], [`BatchConfigError`], [`RegistryError`]
//!   and [`LedgerError`] surface to the caller as `Err`.
//!
//! [`FanoutError`] wraps all of them for callers that want a single type.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// FanoutError: top-level error enum
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the fanout crates.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// A work item failed.
    #[error("{0}")]
    Task(#[from] TaskError),

    /// A shard driver (thread or scheduler) failed.
    #[error("{0}")]
    ShardDriver(#[from] ShardDriverError),

    /// Chunk registry lookup failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Invalid batching limits.
    #[error("{0}")]
    BatchConfig(#[from] BatchConfigError),

    /// Progress ledger rejected a notification.
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for fanout operations.
pub type Result<T> = std::result::Result<T, FanoutError>;

// ─────────────────────────────────────────────────────────────────────────────
// TaskError: captured per work item
// ─────────────────────────────────────────────────────────────────────────────

/// Kind reported for work items that panicked.
pub const PANIC_KIND: &str = "panic";

/// Kind reported for work items whose result never came back.
pub const LOST_KIND: &str = "lost";

/// A captured work-item failure.
///
/// `kind` names the failing error type (the last path segment of its Rust type
/// name, e.g. `ParseIntError`), or [`PANIC_KIND`] for panics.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct TaskError {
    /// Error type name.
    pub kind: String,
    /// Rendered error message.
    pub message: String,
}

impl TaskError {
    /// Build an error from an explicit kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture any displayable error, recording its type name as the kind.
    pub fn from_error<E: fmt::Display + ?Sized>(err: &E) -> Self {
        Self {
            kind: short_type_name::<E>().to_owned(),
            message: err.to_string(),
        }
    }

    /// Capture a panic payload from `catch_unwind` or a `JoinError`.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::new(PANIC_KIND, message)
    }

    /// A work item whose result was lost (e.g. its task was torn down with the runtime).
    pub fn lost(reason: impl Into<String>) -> Self {
        Self::new(LOST_KIND, reason)
    }

    /// Whether the work item panicked.
    pub fn is_panic(&self) -> bool {
        self.kind == PANIC_KIND
    }
}

/// Last path segment of a type name, ignoring generic arguments.
///
/// `core::num::error::ParseIntError` → `ParseIntError`,
/// `alloc::boxed::Box<dyn core::error::Error>` → `Box`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ─────────────────────────────────────────────────────────────────────────────
// Fatal structural errors
// ─────────────────────────────────────────────────────────────────────────────

/// A shard driver failure. Aborts the whole sharded run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShardDriverError {
    /// `max_threads` was zero.
    #[error("max_threads must be at least 1")]
    NoThreads,
    /// The OS refused to spawn the shard's thread.
    #[error("failed to spawn thread for shard {shard}: {reason}")]
    Spawn {
        /// Shard index.
        shard: usize,
        /// Error description.
        reason: String,
    },
    /// The shard's scheduler could not be built.
    #[error("failed to build scheduler for shard {shard}: {reason}")]
    Scheduler {
        /// Shard index.
        shard: usize,
        /// Error description.
        reason: String,
    },
    /// The shard's thread died before returning its outcomes.
    #[error("shard {shard} driver panicked: {reason}")]
    Panicked {
        /// Shard index.
        shard: usize,
        /// Panic message.
        reason: String,
    },
    /// The blocking join wrapper failed.
    #[error("sharded run join failed: {0}")]
    Join(String),
}

/// Chunk registry errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No item is registered under the id.
    #[error("registry item not found: {id}")]
    NotFound {
        /// The unknown id.
        id: String,
    },
}

/// Invalid batching limits.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BatchConfigError {
    /// `max_tokens` was zero.
    #[error("max_tokens per batch must be positive")]
    ZeroMaxTokens,
    /// `max_items` was zero.
    #[error("max_items per batch must be positive")]
    ZeroMaxItems,
}

/// Progress ledger errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A status notification would move an entry backwards or out of a terminal state.
    #[error("illegal status transition for {id}: {from} -> {to}")]
    IllegalTransition {
        /// Tracked id.
        id: String,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
