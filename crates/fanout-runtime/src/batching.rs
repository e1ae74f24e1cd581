//! Greedy, order-preserving token batching.
//!
//! Items are packed left to right; a batch closes when the next item would
//! push it over the token ceiling or when it already holds the item ceiling.
//! An item that alone exceeds the token ceiling gets a batch of its own.

use fanout_core::errors::BatchConfigError;
use fanout_core::tokens::estimate_tokens;
use fanout_settings::BatchingSettings;
use metrics::counter;
use tracing::debug;

use crate::metrics::{BATCHES_TOTAL, OVERSIZED_BATCHES_TOTAL};

/// An ordered group of items with its estimated token total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch<I> {
    /// Items in input order.
    pub items: Vec<I>,
    /// Sum of the item costs.
    pub estimated_tokens: usize,
}

impl<I> Batch<I> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            estimated_tokens: 0,
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the batch exceeds `max_tokens` (only possible for a single item).
    pub fn is_oversized(&self, max_tokens: usize) -> bool {
        self.estimated_tokens > max_tokens
    }

    /// Take the items.
    pub fn into_items(self) -> Vec<I> {
        self.items
    }
}

/// Token- and count-bounded batcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenBatcher {
    max_tokens: usize,
    max_items: usize,
}

impl TokenBatcher {
    /// Create a batcher. Both limits must be positive.
    pub fn new(max_tokens: usize, max_items: usize) -> Result<Self, BatchConfigError> {
        if max_tokens == 0 {
            return Err(BatchConfigError::ZeroMaxTokens);
        }
        if max_items == 0 {
            return Err(BatchConfigError::ZeroMaxItems);
        }
        Ok(Self {
            max_tokens,
            max_items,
        })
    }

    /// Batcher configured from the batching settings section.
    pub fn from_settings(settings: &BatchingSettings) -> Result<Self, BatchConfigError> {
        Self::new(settings.max_tokens_per_batch, settings.max_items_per_batch)
    }

    /// Token ceiling.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Item ceiling.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Partition `items` into batches, costing each with `tokenize`.
    pub fn split<I, F>(&self, items: impl IntoIterator<Item = I>, mut tokenize: F) -> Vec<Batch<I>>
    where
        F: FnMut(&I) -> usize,
    {
        let mut batches = Vec::new();
        let mut current = Batch::empty();

        for item in items {
            let cost = tokenize(&item);
            let over_budget = current.estimated_tokens.saturating_add(cost) > self.max_tokens;
            let full = current.len() >= self.max_items;
            if (over_budget || full) && !current.is_empty() {
                batches.push(std::mem::replace(&mut current, Batch::empty()));
            }
            current.estimated_tokens = current.estimated_tokens.saturating_add(cost);
            current.items.push(item);
        }
        if !current.is_empty() {
            batches.push(current);
        }

        let oversized = batches.iter().filter(|b| b.is_oversized(self.max_tokens)).count();
        counter!(BATCHES_TOTAL).increment(batches.len() as u64);
        if oversized > 0 {
            counter!(OVERSIZED_BATCHES_TOTAL).increment(oversized as u64);
            debug!(oversized, max_tokens = self.max_tokens, "single items over token ceiling");
        }
        batches
    }

    /// Partition text items using the chars/4 token estimate.
    pub fn split_texts<S: AsRef<str>>(&self, texts: impl IntoIterator<Item = S>) -> Vec<Batch<S>> {
        self.split(texts, |t| estimate_tokens(t.as_ref()))
    }
}

impl Default for TokenBatcher {
    fn default() -> Self {
        let settings = BatchingSettings::default();
        Self {
            max_tokens: settings.max_tokens_per_batch,
            max_items: settings.max_items_per_batch,
        }
    }
}

/// One-shot form of [`TokenBatcher::split`].
pub fn split<I, F>(
    items: impl IntoIterator<Item = I>,
    max_tokens: usize,
    max_items: usize,
    tokenize: F,
) -> Result<Vec<Batch<I>>, BatchConfigError>
where
    F: FnMut(&I) -> usize,
{
    Ok(TokenBatcher::new(max_tokens, max_items)?.split(items, tokenize))
}
