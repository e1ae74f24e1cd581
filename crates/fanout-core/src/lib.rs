//! # fanout-core
//!
//! Foundation types, errors, ids, and logging for the fanout task orchestrator.
//!
//! This crate provides the shared vocabulary that the other fanout crates depend on:
//!
//! - **Errors**: [`errors::FanoutError`] and the per-domain errors
//!   ([`errors::TaskError`], [`errors::ShardDriverError`], [`errors::RegistryError`],
//!   [`errors::BatchConfigError`], [`errors::LedgerError`]) via `thiserror`
//! - **Ids**: [`ids::RoundId`] / [`ids::RunId`] newtypes and prefixed random ids
//! - **Tokens**: [`tokens::estimate_tokens`] chars/4 approximation
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other fanout crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod tokens;

pub use errors::{
    BatchConfigError, FanoutError, LedgerError, RegistryError, Result, ShardDriverError, TaskError,
};
