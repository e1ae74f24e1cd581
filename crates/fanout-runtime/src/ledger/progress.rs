//! Progress ledger for one orchestration round.
//!
//! Tasks report status by id; the ledger keeps the latest status per id, in
//! first-seen order, and publishes everything as one message with citations
//! renumbered across tasks.

use std::collections::HashMap;
use std::sync::Arc;

use fanout_core::errors::LedgerError;
use fanout_core::ids::RoundId;
use fanout_settings::LedgerSettings;
use metrics::counter;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::ledger::events::{LedgerEmitter, LedgerEvent};
use crate::ledger::reference::{CitedText, Reference, renumber_citations};
use crate::ledger::status::{StatusUpdate, ToolExecutionStatus, ToolState};
use crate::metrics::{LEDGER_NOTIFICATIONS_TOTAL, LEDGER_PUBLISHES_TOTAL, LEDGER_REJECTIONS_TOTAL};

/// Separator between published entry messages.
pub const ENTRY_SEPARATOR: &str = "\n\n";

/// The flattened ledger, ready to forward.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedMessage {
    /// Visible messages joined by [`ENTRY_SEPARATOR`], citations rewritten.
    pub text: String,
    /// Every reference with its published number, ordered by number.
    pub references: Vec<Reference>,
    /// Whether any published entry asked for a new outbound message.
    pub requires_new_message: bool,
}

/// Keyed status store for one round.
#[derive(Debug)]
pub struct ProgressLedger {
    round_id: RoundId,
    citation_offset: u32,
    entries: Vec<ToolExecutionStatus>,
    index: HashMap<String, usize>,
    emitter: LedgerEmitter,
}

impl ProgressLedger {
    /// Empty ledger numbering citations from `citation_offset`.
    pub fn new(citation_offset: u32) -> Self {
        Self::with_emitter(citation_offset, LedgerEmitter::new())
    }

    /// Ledger configured from the ledger settings section.
    pub fn from_settings(settings: &LedgerSettings) -> Self {
        Self::with_emitter(
            settings.citation_start_offset,
            LedgerEmitter::with_capacity(settings.event_capacity),
        )
    }

    fn with_emitter(citation_offset: u32, emitter: LedgerEmitter) -> Self {
        Self {
            round_id: RoundId::new(),
            citation_offset,
            entries: Vec::new(),
            index: HashMap::new(),
            emitter,
        }
    }

    /// Current round.
    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    /// Offset used by [`publish`](Self::publish).
    pub fn citation_offset(&self) -> u32 {
        self.citation_offset
    }

    /// Tracked ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been reported this round.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a status notification.
    ///
    /// `references = None` keeps whatever the id reported before.
    pub fn notify(
        &mut self,
        id: &str,
        name: &str,
        message: &str,
        state: ToolState,
        references: Option<Vec<Reference>>,
    ) -> Result<(), LedgerError> {
        let mut update = StatusUpdate::new(name, message, state);
        update.references = references;
        self.notify_update(id, update)
    }

    /// Record a prepared [`StatusUpdate`].
    pub fn notify_update(&mut self, id: &str, update: StatusUpdate) -> Result<(), LedgerError> {
        let state = update.state;
        let position = if let Some(&pos) = self.index.get(id) {
            if let Err(e) = self.entries[pos].apply(update) {
                counter!(LEDGER_REJECTIONS_TOTAL).increment(1);
                warn!(id, error = %e, "rejected status notification");
                return Err(e);
            }
            pos
        } else {
            let pos = self.entries.len();
            self.entries.push(ToolExecutionStatus::from_update(id, update));
            let _ = self.index.insert(id.to_owned(), pos);
            pos
        };

        counter!(LEDGER_NOTIFICATIONS_TOTAL, "state" => state.as_str()).increment(1);
        debug!(id, %state, "status recorded");
        let _ = self.emitter.emit(LedgerEvent::StatusChanged {
            round_id: self.round_id.clone(),
            status: self.entries[position].clone(),
        });
        Ok(())
    }

    /// Latest status for `id`.
    pub fn status(&self, id: &str) -> Option<&ToolExecutionStatus> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    /// All statuses in first-seen order.
    pub fn statuses(&self) -> &[ToolExecutionStatus] {
        &self.entries
    }

    /// Statuses in publish order: explicitly ordered entries by `order`,
    /// then the rest in first-seen order.
    pub fn publish_order(&self) -> Vec<&ToolExecutionStatus> {
        let (mut ordered, unordered): (Vec<_>, Vec<_>) =
            self.entries.iter().partition(|s| s.order.is_some());
        ordered.sort_by_key(|s| s.order);
        ordered.extend(unordered);
        ordered
    }

    /// Flatten the ledger using the configured citation offset.
    ///
    /// Never fails and never mutates stored statuses, so repeated calls
    /// without new notifications return identical results.
    pub fn publish(&self) -> PublishedMessage {
        self.publish_from(self.citation_offset)
    }

    /// Flatten the ledger numbering citations from `offset`.
    pub fn publish_from(&self, offset: u32) -> PublishedMessage {
        let ordered = self.publish_order();
        let inputs: Vec<CitedText<'_>> = ordered
            .iter()
            .map(|s| CitedText {
                text: &s.message,
                references: &s.references,
                visible: s.has_visible_content(),
            })
            .collect();
        let renumbered = renumber_citations(&inputs, offset);
        let requires_new_message = ordered
            .iter()
            .any(|s| s.has_visible_content() && s.requires_new_message);

        counter!(LEDGER_PUBLISHES_TOTAL).increment(1);
        let _ = self.emitter.emit(LedgerEvent::Published {
            round_id: self.round_id.clone(),
            entries: renumbered.texts.len(),
            references: renumbered.references.len(),
        });

        PublishedMessage {
            text: renumbered.texts.join(ENTRY_SEPARATOR),
            references: renumbered.references,
            requires_new_message,
        }
    }

    /// Drop every entry and start a new round.
    pub fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.round_id, RoundId::new());
        self.entries.clear();
        self.index.clear();
        debug!(%previous, current = %self.round_id, "ledger reset");
        let _ = self.emitter.emit(LedgerEvent::Reset {
            previous,
            current: self.round_id.clone(),
        });
    }

    /// Receive events for notifications, publishes, and resets.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.emitter.subscribe()
    }
}

impl Default for ProgressLedger {
    fn default() -> Self {
        Self::from_settings(&LedgerSettings::default())
    }
}

/// Cloneable handle serializing access to one [`ProgressLedger`].
#[derive(Clone, Debug, Default)]
pub struct SharedProgressLedger {
    inner: Arc<Mutex<ProgressLedger>>,
}

impl SharedProgressLedger {
    /// Wrap a ledger.
    pub fn new(ledger: ProgressLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// See [`ProgressLedger::notify`].
    pub fn notify(
        &self,
        id: &str,
        name: &str,
        message: &str,
        state: ToolState,
        references: Option<Vec<Reference>>,
    ) -> Result<(), LedgerError> {
        self.inner.lock().notify(id, name, message, state, references)
    }

    /// See [`ProgressLedger::notify_update`].
    pub fn notify_update(&self, id: &str, update: StatusUpdate) -> Result<(), LedgerError> {
        self.inner.lock().notify_update(id, update)
    }

    /// Snapshot of one status.
    pub fn status(&self, id: &str) -> Option<ToolExecutionStatus> {
        self.inner.lock().status(id).cloned()
    }

    /// See [`ProgressLedger::publish`].
    pub fn publish(&self) -> PublishedMessage {
        self.inner.lock().publish()
    }

    /// See [`ProgressLedger::reset`].
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// See [`ProgressLedger::subscribe`].
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.lock().subscribe()
    }

    /// Tracked ids.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing has been reported this round.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Lock for several operations at once.
    pub fn lock(&self) -> MutexGuard<'_, ProgressLedger> {
        self.inner.lock()
    }
}
