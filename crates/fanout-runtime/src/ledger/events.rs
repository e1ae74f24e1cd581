//! Ledger event stream.

use std::sync::atomic::{AtomicU64, Ordering};

use fanout_core::ids::RoundId;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ledger::status::ToolExecutionStatus;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something that happened to a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A notification was accepted; carries the entry's new status.
    StatusChanged {
        /// Round the entry belongs to.
        round_id: RoundId,
        /// Entry after the update.
        status: ToolExecutionStatus,
    },
    /// The ledger was published.
    Published {
        /// Round that was published.
        round_id: RoundId,
        /// Entries included in the text.
        entries: usize,
        /// References in the payload.
        references: usize,
    },
    /// The ledger was reset and a new round began.
    Reset {
        /// Round that ended.
        previous: RoundId,
        /// Round that began.
        current: RoundId,
    },
}

/// Broadcast emitter for [`LedgerEvent`]s.
///
/// `emit` never blocks. Receivers that fall behind observe `Lagged` rather
/// than stalling the ledger.
#[derive(Debug)]
pub struct LedgerEmitter {
    tx: broadcast::Sender<LedgerEvent>,
    emit_count: AtomicU64,
}

impl LedgerEmitter {
    /// Emitter with [`DEFAULT_EVENT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Emitter with a custom capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Send to all current subscribers. Returns how many received it.
    pub fn emit(&self, event: LedgerEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Receive events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events emitted so far, subscribed or not.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for LedgerEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_event() -> LedgerEvent {
        LedgerEvent::Reset {
            previous: RoundId::from("r1"),
            current: RoundId::from("r2"),
        }
    }

    #[test]
    fn emit_without_subscribers() {
        let emitter = LedgerEmitter::new();
        assert_eq!(emitter.emit(reset_event()), 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn subscriber_receives_events() {
        let emitter = LedgerEmitter::with_capacity(4);
        let mut rx = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 1);
        assert_eq!(emitter.emit(reset_event()), 1);
        assert_eq!(rx.recv().await.unwrap(), reset_event());
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let emitter = LedgerEmitter::with_capacity(1);
        let mut rx = emitter.subscribe();
        let _ = emitter.emit(reset_event());
        let _ = emitter.emit(reset_event());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
    }

    #[test]
    fn event_serializes_tagged() {
        let json = serde_json::to_value(reset_event()).unwrap();
        assert_eq!(json["type"], "reset");
        assert_eq!(json["previous"], "r1");
    }
}
