//! Chunk registry: a concurrent keyed store with generated ids.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fanout_core::errors::RegistryError;
use fanout_core::ids::prefixed_id;
use fanout_settings::LedgerSettings;

/// Default id prefix.
pub const DEFAULT_PREFIX: &str = "chunk_";

/// Stores items under `prefix + random suffix` ids.
#[derive(Debug)]
pub struct ChunkRegistry<T> {
    prefix: String,
    items: DashMap<String, T>,
}

impl<T: Clone> ChunkRegistry<T> {
    /// Empty registry with the given id prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            items: DashMap::new(),
        }
    }

    /// Registry configured from the ledger settings section.
    pub fn from_settings(settings: &LedgerSettings) -> Self {
        Self::new(settings.registry_id_prefix.clone())
    }

    /// Id prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store `item` under a fresh id and return the id.
    pub fn register(&self, item: T) -> String {
        loop {
            let id = prefixed_id(&self.prefix);
            if let Entry::Vacant(slot) = self.items.entry(id.clone()) {
                let _ = slot.insert(item);
                return id;
            }
            tracing::debug!(%id, "registry id collision, regenerating");
        }
    }

    /// Clone of the item stored under `id`.
    pub fn retrieve(&self, id: &str) -> Result<T, RegistryError> {
        self.items
            .get(id)
            .map(|item| item.value().clone())
            .ok_or_else(|| not_found(id))
    }

    /// Replace the item stored under `id`. Never inserts.
    pub fn update(&self, id: &str, item: T) -> Result<(), RegistryError> {
        let mut slot = self.items.get_mut(id).ok_or_else(|| not_found(id))?;
        *slot = item;
        Ok(())
    }

    /// Remove and return the item stored under `id`.
    pub fn remove(&self, id: &str) -> Result<T, RegistryError> {
        self.items
            .remove(id)
            .map(|(_, item)| item)
            .ok_or_else(|| not_found(id))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Registered item count.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registered ids, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|e| e.key().clone()).collect()
    }
}

impl<T: Clone> Default for ChunkRegistry<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn not_found(id: &str) -> RegistryError {
    RegistryError::NotFound { id: id.to_owned() }
}
