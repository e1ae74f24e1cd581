//! Per-request ordering for log entries written by concurrent tasks.
//!
//! [`OrderedLogSequencer`] is an explicit object shared by `Arc`; there is no
//! process-global counter map. Orders reflect issue time, not submission
//! order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ledger::status::ToolState;
use crate::metrics::SEQUENCER_ORDERS_TOTAL;

/// Issues `1, 2, 3, ...` per request key.
#[derive(Debug, Default)]
pub struct OrderedLogSequencer {
    counters: DashMap<String, u64>,
}

impl OrderedLogSequencer {
    /// Empty sequencer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next order for `key`, starting at 1. Atomic per key.
    pub fn next_order(&self, key: &str) -> u64 {
        counter!(SEQUENCER_ORDERS_TOTAL).increment(1);
        if let Some(mut last) = self.counters.get_mut(key) {
            *last += 1;
            return *last;
        }
        let mut last = self.counters.entry(key.to_owned()).or_insert(0);
        *last += 1;
        *last
    }

    /// Last order issued for `key`, 0 if none.
    pub fn current(&self, key: &str) -> u64 {
        self.counters.get(key).map_or(0, |last| *last)
    }

    /// Forget `key`; its next order is 1 again.
    pub fn reset(&self, key: &str) {
        let _ = self.counters.remove(key);
    }

    /// Forget every key.
    pub fn reset_all(&self) {
        self.counters.clear();
    }

    /// Keys with at least one issued order.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no order has been issued.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// One ordered log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Request the entry belongs to.
    pub request_key: String,
    /// Sequencer-issued order within the request.
    pub order: u64,
    /// Log text.
    pub text: String,
    /// Task state at the time of the entry.
    pub status: ToolState,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
}

/// Ordered log sink shared by the tasks of one or more requests.
#[derive(Clone, Debug, Default)]
pub struct RequestLog {
    sequencer: Arc<OrderedLogSequencer>,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RequestLog {
    /// Sink with its own sequencer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink sharing an existing sequencer.
    pub fn with_sequencer(sequencer: Arc<OrderedLogSequencer>) -> Self {
        Self {
            sequencer,
            entries: Arc::default(),
        }
    }

    /// The sequencer issuing orders.
    pub fn sequencer(&self) -> &Arc<OrderedLogSequencer> {
        &self.sequencer
    }

    /// Append an entry with the next order for `request_key`.
    pub fn record(
        &self,
        request_key: &str,
        text: impl Into<String>,
        status: ToolState,
    ) -> LogEntry {
        // Order and append under one lock so stored order matches issue order
        let mut entries = self.entries.lock();
        let entry = LogEntry {
            request_key: request_key.to_owned(),
            order: self.sequencer.next_order(request_key),
            text: text.into(),
            status,
            created_at: Utc::now(),
        };
        entries.push(entry.clone());
        entry
    }

    /// Entries for `request_key`, sorted by order.
    pub fn entries(&self, request_key: &str) -> Vec<LogEntry> {
        let mut out: Vec<LogEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.request_key == request_key)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.order);
        out
    }

    /// Drop the entries for `request_key` and reset its counter.
    pub fn clear(&self, request_key: &str) {
        self.entries.lock().retain(|e| e.request_key != request_key);
        self.sequencer.reset(request_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sequential_calls_count_from_one() {
        let sequencer = OrderedLogSequencer::new();
        let orders: Vec<u64> = (0..5).map(|_| sequencer.next_order("req")).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert_eq!(sequencer.current("req"), 5);
    }

    #[test]
    fn keys_are_independent() {
        let sequencer = OrderedLogSequencer::new();
        assert_eq!(sequencer.next_order("a"), 1);
        assert_eq!(sequencer.next_order("b"), 1);
        assert_eq!(sequencer.next_order("a"), 2);
        assert_eq!(sequencer.current("never"), 0);
        assert_eq!(sequencer.len(), 2);
    }

    #[test]
    fn reset_restarts_key() {
        let sequencer = OrderedLogSequencer::new();
        let _ = sequencer.next_order("a");
        let _ = sequencer.next_order("b");
        sequencer.reset("a");
        assert_eq!(sequencer.next_order("a"), 1);
        assert_eq!(sequencer.next_order("b"), 2);
        sequencer.reset_all();
        assert!(sequencer.is_empty());
    }

    #[test]
    fn concurrent_calls_form_permutation() {
        let sequencer = Arc::new(OrderedLogSequencer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequencer = Arc::clone(&sequencer);
                std::thread::spawn(move || {
                    (0..250).map(|_| sequencer.next_order("shared")).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (1..=2000).collect::<Vec<_>>());
    }

    #[test]
    fn request_log_records_in_order() {
        let log = RequestLog::new();
        let first = log.record("req-1", "searching", ToolState::Running);
        let _ = log.record("req-2", "other", ToolState::Started);
        let second = log.record("req-1", "done", ToolState::Finished);
        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);

        let entries = log.entries("req-1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].text, "done");
        assert_eq!(entries[1].status, ToolState::Finished);
    }

    #[test]
    fn clear_drops_entries_and_counter() {
        let log = RequestLog::new();
        let _ = log.record("req", "a", ToolState::Started);
        log.clear("req");
        assert!(log.entries("req").is_empty());
        assert_eq!(log.record("req", "b", ToolState::Started).order, 1);
    }

    #[test]
    fn shared_sequencer_across_logs() {
        let sequencer = Arc::new(OrderedLogSequencer::new());
        let a = RequestLog::with_sequencer(Arc::clone(&sequencer));
        let b = RequestLog::with_sequencer(Arc::clone(&sequencer));
        assert_eq!(a.record("k", "x", ToolState::Started).order, 1);
        assert_eq!(b.record("k", "y", ToolState::Started).order, 2);
        assert_eq!(sequencer.current("k"), 2);
    }

    #[test]
    fn log_entry_serializes_camel_case() {
        let entry = RequestLog::new().record("req", "t", ToolState::Running);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["requestKey"], "req");
        assert_eq!(json["status"], "running");
        assert!(json["createdAt"].is_string());
    }

    proptest! {
        #[test]
        fn n_calls_return_one_through_n(n in 1_usize..200) {
            let sequencer = OrderedLogSequencer::new();
            let orders: Vec<u64> = (0..n).map(|_| sequencer.next_order("p")).collect();
            prop_assert_eq!(orders, (1..=n as u64).collect::<Vec<_>>());
        }
    }
}
