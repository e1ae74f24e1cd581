//! Progress ledger settings.

use serde::{Deserialize, Serialize};

/// Progress ledger and chunk registry settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSettings {
    /// First citation number assigned at publish time.
    pub citation_start_offset: u32,
    /// Prefix for chunk registry ids.
    pub registry_id_prefix: String,
    /// Capacity of the ledger event broadcast channel.
    pub event_capacity: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            citation_start_offset: 1,
            registry_id_prefix: "chunk_".to_string(),
            event_capacity: 256,
        }
    }
}
