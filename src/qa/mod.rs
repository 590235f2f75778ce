//! Mailbox Q&A: index recent mail and upcoming events, then ask questions.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::assistant::{AssistantClient, QueryAnswer, QueryScope};
use crate::error::QaError;
use crate::host::{Folder, MailHost};
use crate::mail::{PayloadFormat, ews, parse_calendar_events, parse_mail_items};

/// Recent inbox items pulled per sync.
pub const SYNC_MAIL_LIMIT: usize = 50;
/// Calendar events pulled per sync.
pub const SYNC_EVENT_LIMIT: usize = 20;

/// Outcome of one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// No live mailbox; the assistant answers from its own data.
    NotConnected,
    Synced {
        emails: usize,
        events: usize,
        /// The assistant accepted the items for indexing.
        indexed: bool,
    },
    Failed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Synced {
                emails,
                events,
                indexed,
            } => {
                write!(f, "synced: {emails} emails, {events} events")?;
                if !indexed {
                    write!(f, " (not indexed)")?;
                }
                Ok(())
            }
            Self::Failed(reason) => write!(f, "sync failed: {reason}"),
        }
    }
}

pub struct MailboxIndexer {
    host: Arc<dyn MailHost>,
    assistant: Arc<dyn AssistantClient>,
}

impl MailboxIndexer {
    pub fn new(host: Arc<dyn MailHost>, assistant: Arc<dyn AssistantClient>) -> Self {
        Self { host, assistant }
    }

    /// Fetch recent mail and events over the legacy protocol and hand them to
    /// the assistant for indexing.
    pub async fn sync(&self) -> SyncStatus {
        if !self.host.is_connected() {
            return SyncStatus::NotConnected;
        }

        let mail_request = ews::find_mail(&Folder::Inbox, SYNC_MAIL_LIMIT);
        let event_request = ews::find_events(SYNC_EVENT_LIMIT);
        let (mail, events) = futures::join!(
            self.host.legacy_request(&mail_request),
            self.host.legacy_request(&event_request),
        );

        let (mail, events) = match (mail, events) {
            (Ok(mail), Ok(events)) => (mail, events),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Mailbox sync failed");
                return SyncStatus::Failed(e.to_string());
            }
        };

        let mail = parse_mail_items(&mail, PayloadFormat::LegacyXml);
        if let Some(reason) = &mail.malformed {
            warn!(reason = %reason, "Unreadable mail in sync response");
        }
        let events = parse_calendar_events(&events, PayloadFormat::LegacyXml);
        if let Some(reason) = &events.malformed {
            warn!(reason = %reason, "Unreadable events in sync response");
        }
        let (mail, events) = (mail.into_items(), events.into_items());

        let indexed = match self.assistant.index_items(&mail, &events).await {
            Ok(ack) => {
                info!(
                    emails = ack.indexed_emails,
                    events = ack.indexed_events,
                    "Mailbox indexed"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Indexing failed");
                false
            }
        };

        SyncStatus::Synced {
            emails: mail.len(),
            events: events.len(),
            indexed,
        }
    }

    /// Ask a question against the indexed data.
    pub async fn ask(&self, question: &str, scope: QueryScope) -> Result<QueryAnswer, QaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::EmptyQuestion);
        }
        Ok(self.assistant.query_indexed(question, scope).await?)
    }
}
