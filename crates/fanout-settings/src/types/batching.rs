//! Token batching limits.

use serde::{Deserialize, Serialize};

/// Limits for grouping content into LLM-request-sized batches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchingSettings {
    /// Token ceiling per batch (a single oversized item may exceed it alone).
    pub max_tokens_per_batch: usize,
    /// Item ceiling per batch.
    pub max_items_per_batch: usize,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            max_tokens_per_batch: 8000,
            max_items_per_batch: 20,
        }
    }
}
