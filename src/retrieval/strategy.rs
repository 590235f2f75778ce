//! Retrieval strategies, one per channel.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Channel, RetrievalResult, Retrieved};
use crate::error::RetrievalError;
use crate::host::{Folder, MailHost, UnreadQuery};
use crate::mail::{MailItem, PayloadFormat, ews, parse_mail_items};

/// One step of the retrieval chain.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn channel(&self) -> Channel;

    /// Whether this strategy needs a live mailbox context.
    fn requires_connection(&self) -> bool {
        true
    }

    /// Attempt retrieval. `previous` is the failure of the step before, if any,
    /// and is chained into this step's failure.
    async fn fetch(
        &self,
        host: &dyn MailHost,
        folder: &Folder,
        previous: Option<&RetrievalError>,
    ) -> RetrievalResult;
}

fn failure(channel: Channel, reason: String, previous: Option<&RetrievalError>) -> RetrievalResult {
    RetrievalResult::Failure(RetrievalError::channel(channel, reason, previous.cloned()))
}

fn unread(items: Vec<MailItem>) -> Vec<MailItem> {
    items.into_iter().filter(|item| !item.is_read).collect()
}

/// Primary: token + structured unread query, newest first.
pub struct StructuredQuery {
    pub page_size: usize,
}

#[async_trait]
impl RetrievalStrategy for StructuredQuery {
    fn channel(&self) -> Channel {
        Channel::Structured
    }

    async fn fetch(
        &self,
        host: &dyn MailHost,
        folder: &Folder,
        previous: Option<&RetrievalError>,
    ) -> RetrievalResult {
        let token = match host.acquire_token().await {
            Ok(token) => token,
            Err(e) => return failure(self.channel(), format!("token: {e}"), previous),
        };

        let query = UnreadQuery::new(folder.clone(), self.page_size);
        let body = match host.query_unread(&token, &query).await {
            Ok(body) => body,
            Err(e) => return failure(self.channel(), e.to_string(), previous),
        };

        let parsed = parse_mail_items(&body, PayloadFormat::Structured);
        if let Some(reason) = parsed.malformed {
            warn!(channel = %self.channel(), reason = %reason, "Unreadable structured response");
            return failure(self.channel(), format!("malformed response: {reason}"), previous);
        }

        // The server filter is authoritative, but records still carry isRead.
        let items = unread(parsed.items);
        debug!(count = items.len(), "Structured query returned unread items");
        RetrievalResult::Success(Retrieved::live(self.channel(), items))
    }
}

/// Secondary: unfiltered legacy fetch, unread items filtered client-side.
pub struct LegacyProtocol {
    pub page_size: usize,
}

#[async_trait]
impl RetrievalStrategy for LegacyProtocol {
    fn channel(&self) -> Channel {
        Channel::Legacy
    }

    async fn fetch(
        &self,
        host: &dyn MailHost,
        folder: &Folder,
        previous: Option<&RetrievalError>,
    ) -> RetrievalResult {
        let request = ews::find_mail(folder, self.page_size);
        let body = match host.legacy_request(&request).await {
            Ok(body) => body,
            Err(e) => return failure(self.channel(), e.to_string(), previous),
        };

        let parsed = parse_mail_items(&body, PayloadFormat::LegacyXml);
        if let Some(reason) = parsed.malformed {
            warn!(channel = %self.channel(), reason = %reason, "Unreadable legacy response");
            return failure(self.channel(), format!("malformed response: {reason}"), previous);
        }

        let total = parsed.items.len();
        let items = unread(parsed.items);
        debug!(total, unread = items.len(), "Legacy fetch filtered client-side");
        RetrievalResult::Success(Retrieved::live(self.channel(), items))
    }
}

/// Tertiary: always succeeds with no items, keeping the prior cause.
pub struct Degraded;

#[async_trait]
impl RetrievalStrategy for Degraded {
    fn channel(&self) -> Channel {
        Channel::Degraded
    }

    fn requires_connection(&self) -> bool {
        false
    }

    async fn fetch(
        &self,
        _host: &dyn MailHost,
        _folder: &Folder,
        previous: Option<&RetrievalError>,
    ) -> RetrievalResult {
        RetrievalResult::Success(Retrieved::degraded(previous.cloned()))
    }
}
