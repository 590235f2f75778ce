//! Triage session state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::mail::MailItem;
use crate::retrieval::Channel;

/// Shown as the digest when there is nothing unread ("no unread mail in your inbox").
pub const NO_UNREAD_MESSAGE: &str = "אין מיילים לא נקראים בתיבת הדואר שלך! 🎉";

/// Load state of one concern.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Errored(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored(message) => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Errored(message) => write!(f, "errored: {message}"),
        }
    }
}

/// Whether the last list load reached a live mailbox.
///
/// Both `Unavailable` and a live empty inbox render as a ready, empty list;
/// this keeps them distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "channel", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Live(Channel),
    Unavailable,
}

/// The single mutable unit of triage state.
#[derive(Debug, Clone, Serialize)]
pub struct TriageSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Unread items in retrieval order.
    pub items: Vec<MailItem>,
    pub selected: Option<MailItem>,
    pub summary: Option<String>,
    /// Editable once loaded.
    pub suggested_reply: Option<String>,
    /// Bulk summary of all unread items.
    pub digest: Option<String>,
    pub connection: ConnectionStatus,
    pub list_state: LoadState,
    pub summary_state: LoadState,
    pub reply_state: LoadState,
    pub send_state: LoadState,
    pub digest_state: LoadState,
}

impl TriageSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items: Vec::new(),
            selected: None,
            summary: None,
            suggested_reply: None,
            digest: None,
            connection: ConnectionStatus::Unknown,
            list_state: LoadState::Idle,
            summary_state: LoadState::Idle,
            reply_state: LoadState::Idle,
            send_state: LoadState::Idle,
            digest_state: LoadState::Idle,
        }
    }

    /// Clear the selection and everything derived from it.
    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
        self.summary = None;
        self.suggested_reply = None;
        self.summary_state = LoadState::Idle;
        self.reply_state = LoadState::Idle;
    }

    /// True when the workflow is showing the list rather than an item.
    pub fn in_list_view(&self) -> bool {
        self.selected.is_none()
    }
}

impl Default for TriageSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle() {
        let session = TriageSession::new();
        assert!(session.in_list_view());
        assert_eq!(session.list_state, LoadState::Idle);
        assert_eq!(session.connection, ConnectionStatus::Unknown);
    }

    #[test]
    fn clear_selection_resets_dependent_state() {
        let mut session = TriageSession::new();
        session.selected = Some(MailItem::default());
        session.summary = Some("s".into());
        session.suggested_reply = Some("r".into());
        session.summary_state = LoadState::Ready;
        session.reply_state = LoadState::Errored("boom".into());

        session.clear_selection();
        assert!(session.selected.is_none());
        assert!(session.summary.is_none());
        assert!(session.suggested_reply.is_none());
        assert_eq!(session.summary_state, LoadState::Idle);
        assert_eq!(session.reply_state, LoadState::Idle);
    }

    #[test]
    fn load_state_display() {
        assert_eq!(LoadState::Loading.to_string(), "loading");
        assert_eq!(
            LoadState::Errored("timeout".into()).to_string(),
            "errored: timeout"
        );
        assert_eq!(LoadState::Errored("x".into()).error(), Some("x"));
    }

    #[test]
    fn session_serializes_states() {
        let mut session = TriageSession::new();
        session.connection = ConnectionStatus::Live(Channel::Legacy);
        session.list_state = LoadState::Errored("down".into());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["connection"]["status"], "live");
        assert_eq!(json["connection"]["channel"], "legacy");
        assert_eq!(json["list_state"]["state"], "errored");
        assert_eq!(json["list_state"]["message"], "down");
    }
}
