//! Ordered multi-channel retrieval of unread mail.

pub mod adapter;
pub mod strategy;

use std::fmt;

use serde::Serialize;

use crate::error::RetrievalError;
use crate::mail::MailItem;

pub use adapter::RetrievalAdapter;
pub use strategy::{Degraded, LegacyProtocol, RetrievalStrategy, StructuredQuery};

/// A concrete retrieval channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Structured data API (filterable, field-selectable).
    Structured,
    /// Legacy XML protocol.
    Legacy,
    /// Synthesized empty result when no live channel is usable.
    Degraded,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structured => "structured",
            Self::Legacy => "legacy",
            Self::Degraded => "degraded",
        };
        write!(f, "{s}")
    }
}

/// Items produced by one successful channel.
#[derive(Debug, Clone)]
pub struct Retrieved {
    /// Unread items in retrieval order.
    pub items: Vec<MailItem>,
    pub channel: Channel,
    /// Why the live channels were not used, for degraded results.
    pub degraded_cause: Option<RetrievalError>,
}

impl Retrieved {
    pub fn live(channel: Channel, items: Vec<MailItem>) -> Self {
        Self {
            items,
            channel,
            degraded_cause: None,
        }
    }

    pub fn degraded(cause: Option<RetrievalError>) -> Self {
        Self {
            items: Vec::new(),
            channel: Channel::Degraded,
            degraded_cause: cause,
        }
    }

    /// True when no live mailbox was reached.
    pub fn is_degraded(&self) -> bool {
        self.channel == Channel::Degraded
    }
}

/// Tagged outcome of a channel attempt or of the whole chain.
#[derive(Debug, Clone)]
pub enum RetrievalResult {
    Success(Retrieved),
    Failure(RetrievalError),
}

impl RetrievalResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<Retrieved, RetrievalError> {
        match self {
            Self::Success(retrieved) => Ok(retrieved),
            Self::Failure(e) => Err(e),
        }
    }
}
