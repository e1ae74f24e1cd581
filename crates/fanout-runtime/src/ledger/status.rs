//! Per-task execution status and its state machine.

use std::fmt;

use fanout_core::errors::LedgerError;
use serde::{Deserialize, Serialize};

use crate::ledger::reference::Reference;

/// Lifecycle state of a tracked task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    /// Accepted, not yet doing work.
    Started,
    /// In progress.
    Running,
    /// Completed successfully.
    Finished,
    /// Completed with an error.
    Failed,
}

impl ToolState {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    /// Whether no further progress is expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Whether an entry in this state may move to `next`.
    ///
    /// Forward moves and same-state refreshes are allowed; terminal states
    /// only accept a refresh.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Started => true,
            Self::Running => next != Self::Started,
            Self::Finished | Self::Failed => next == self,
        }
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status notification for one tracked id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Display name of the task or tool.
    pub name: String,
    /// Progress message; may contain `[n]` citation placeholders.
    pub message: String,
    /// New state.
    pub state: ToolState,
    /// Replacement references; `None` keeps the previous ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    /// Whether the consumer should start a new outbound message.
    #[serde(default)]
    pub requires_new_message: bool,
    /// Explicit publish position; `None` keeps the previous one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u64>,
}

impl StatusUpdate {
    /// Update with no references or ordering.
    pub fn new(name: impl Into<String>, message: impl Into<String>, state: ToolState) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            state,
            references: None,
            requires_new_message: false,
            order: None,
        }
    }

    /// Replace the entry's references.
    #[must_use]
    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = Some(references);
        self
    }

    /// Pin the entry's publish position.
    #[must_use]
    pub fn with_order(mut self, order: u64) -> Self {
        self.order = Some(order);
        self
    }

    /// Ask the consumer to start a new outbound message.
    #[must_use]
    pub fn requiring_new_message(mut self) -> Self {
        self.requires_new_message = true;
        self
    }
}

/// Stored status for one tracked id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionStatus {
    /// Tracked id (tool call id, task id).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latest message.
    pub message: String,
    /// Latest state.
    pub state: ToolState,
    /// References emitted by the task.
    pub references: Vec<Reference>,
    /// Whether the consumer should start a new outbound message.
    pub requires_new_message: bool,
    /// Explicit publish position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u64>,
}

impl ToolExecutionStatus {
    /// First status for a previously unknown id. Any state is accepted.
    pub fn from_update(id: impl Into<String>, update: StatusUpdate) -> Self {
        Self {
            id: id.into(),
            name: update.name,
            message: update.message,
            state: update.state,
            references: update.references.unwrap_or_default(),
            requires_new_message: update.requires_new_message,
            order: update.order,
        }
    }

    /// Apply a later notification. On an illegal transition the entry is
    /// left untouched.
    pub fn apply(&mut self, update: StatusUpdate) -> Result<(), LedgerError> {
        if !self.state.can_transition_to(update.state) {
            return Err(LedgerError::IllegalTransition {
                id: self.id.clone(),
                from: self.state.to_string(),
                to: update.state.to_string(),
            });
        }
        self.name = update.name;
        self.message = update.message;
        self.state = update.state;
        if let Some(references) = update.references {
            self.references = references;
        }
        self.requires_new_message = update.requires_new_message;
        if update.order.is_some() {
            self.order = update.order;
        }
        Ok(())
    }

    /// Whether publishing should include this entry's message.
    pub fn has_visible_content(&self) -> bool {
        !self.message.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn status(state: ToolState) -> ToolExecutionStatus {
        ToolExecutionStatus::from_update("tc_1", StatusUpdate::new("search", "working", state))
    }

    #[test]
    fn transition_table() {
        use ToolState::{Failed, Finished, Running, Started};
        let allowed = [
            (Started, Started),
            (Started, Running),
            (Started, Finished),
            (Started, Failed),
            (Running, Running),
            (Running, Finished),
            (Running, Failed),
            (Finished, Finished),
            (Failed, Failed),
        ];
        for from in [Started, Running, Finished, Failed] {
            for to in [Started, Running, Finished, Failed] {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn unknown_to_finished_is_legal() {
        let s = status(ToolState::Finished);
        assert_eq!(s.state, ToolState::Finished);
        assert!(s.references.is_empty());
    }

    #[test]
    fn apply_overwrites_fields() {
        let mut s = status(ToolState::Started);
        let refs = vec![Reference::new(1, "r1", "Doc")];
        s.apply(
            StatusUpdate::new("search", "found 1", ToolState::Running)
                .with_references(refs.clone())
                .with_order(4),
        )
        .unwrap();
        assert_eq!(s.message, "found 1");
        assert_eq!(s.state, ToolState::Running);
        assert_eq!(s.references, refs);
        assert_eq!(s.order, Some(4));
    }

    #[test]
    fn apply_without_references_keeps_previous() {
        let mut s = status(ToolState::Started);
        s.apply(
            StatusUpdate::new("search", "a", ToolState::Running)
                .with_references(vec![Reference::new(1, "r1", "Doc")]),
        )
        .unwrap();
        s.apply(StatusUpdate::new("search", "b", ToolState::Finished)).unwrap();
        assert_eq!(s.references.len(), 1);
        assert_eq!(s.message, "b");
    }

    #[test]
    fn illegal_transition_leaves_entry_unchanged() {
        let mut s = status(ToolState::Finished);
        let before = s.clone();
        let err = s
            .apply(StatusUpdate::new("search", "again", ToolState::Running))
            .unwrap_err();
        assert_matches!(
            err,
            LedgerError::IllegalTransition { ref from, ref to, .. }
                if from == "finished" && to == "running"
        );
        assert_eq!(s, before);
    }

    #[test]
    fn blank_message_is_not_visible() {
        let mut s = status(ToolState::Started);
        assert!(s.has_visible_content());
        s.message = "  \n".into();
        assert!(!s.has_visible_content());
    }

    #[test]
    fn state_wire_format() {
        assert_eq!(serde_json::to_string(&ToolState::Running).unwrap(), "\"running\"");
        let update: StatusUpdate =
            serde_json::from_str(r#"{"name":"n","message":"m","state":"failed"}"#).unwrap();
        assert_eq!(update.state, ToolState::Failed);
        assert!(update.references.is_none());
        assert!(!update.requires_new_message);
    }
}
