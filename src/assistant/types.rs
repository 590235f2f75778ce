//! Typed requests and responses for the assistant service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mail::{CalendarEvent, MailItem};

/// Requested tone for compose enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Formal => "formal",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tone: {0} (expected professional, friendly or formal)")]
pub struct UnknownTone(pub String);

impl FromStr for Tone {
    type Err = UnknownTone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            _ => Err(UnknownTone(s.to_string())),
        }
    }
}

/// Which index a question is answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    MailOnly,
    CalendarOnly,
    Combined,
}

impl QueryScope {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::MailOnly => "/query/inbox",
            Self::CalendarOnly => "/query/calendar",
            Self::Combined => "/query/combined",
        }
    }
}

/// Result of compose enhancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedEmail {
    pub subject: String,
    pub body: String,
    pub was_enhanced: bool,
    /// The service produced this from its own rule-based fallback.
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedReply {
    pub text: String,
}

/// Answer to an indexed question plus the items it was grounded on.
#[derive(Debug, Clone, Default)]
pub struct QueryAnswer {
    pub answer: String,
    pub context_used: bool,
    pub relevant_mail: Vec<MailItem>,
    pub relevant_events: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAck {
    pub indexed_emails: usize,
    pub indexed_events: usize,
    pub message: Option<String>,
}

// ── Wire requests ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct EnhanceRequest<'a> {
    pub text: &'a str,
    pub tone: Tone,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailRequest<'a> {
    pub email: &'a MailItem,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailsRequest<'a> {
    pub emails: &'a [MailItem],
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a str,
    pub use_outlook_data: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct IndexRequest<'a> {
    pub emails: &'a [MailItem],
    pub events: &'a [CalendarEvent],
}
