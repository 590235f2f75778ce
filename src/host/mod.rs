//! Host mailbox capability: the platform's data APIs as an injected trait.
//!
//! Production wires `HttpMailHost`; tests supply in-memory fakes.

pub mod http;

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::HostError;

pub use http::HttpMailHost;

/// Fields requested from the structured API for mail items.
pub const MAIL_FIELDS: &[&str] = &["subject", "sender", "body", "dateTimeReceived", "isRead"];

/// A mailbox folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Calendar,
    /// Folder addressed by its opaque id.
    Other(String),
}

impl Folder {
    /// Path segment used by the structured API.
    pub fn rest_segment(&self) -> &str {
        match self {
            Self::Inbox => "inbox",
            Self::Calendar => "calendar",
            Self::Other(id) => id,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rest_segment())
    }
}

/// Short-lived credential for the structured API.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<SecretString> for AccessToken {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Structured query for unread mail, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadQuery {
    pub folder: Folder,
    /// Maximum number of items returned.
    pub top: usize,
    pub fields: Vec<String>,
}

impl UnreadQuery {
    pub fn new(folder: Folder, top: usize) -> Self {
        Self {
            folder,
            top,
            fields: MAIL_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Relative request path including the OData query string.
    pub fn to_path(&self) -> String {
        format!(
            "/v2.0/me/mailFolders/{folder}/messages?$filter=isRead%20eq%20false&$top={top}&$select={select}&$orderby=dateTimeReceived%20desc",
            folder = self.folder.rest_segment(),
            top = self.top,
            select = self.fields.join(","),
        )
    }
}

/// Content written to the host compose surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeContent {
    /// Subject to set; `None` leaves the current subject untouched.
    pub subject: Option<String>,
    /// Body as HTML.
    pub body_html: String,
}

impl ComposeContent {
    /// Build from plain text, converting newlines to `<br>`.
    pub fn from_text(subject: Option<String>, body: &str) -> Self {
        Self {
            subject,
            body_html: body.replace("\r\n", "\n").replace('\n', "<br>"),
        }
    }
}

/// The host platform's mailbox capabilities, consumed as opaque async operations.
#[async_trait]
pub trait MailHost: Send + Sync {
    /// Whether a live mailbox context is available at all.
    fn is_connected(&self) -> bool;

    /// Obtain a short-lived access token for the structured API.
    async fn acquire_token(&self) -> Result<AccessToken, HostError>;

    /// Run a structured unread query. Returns the raw JSON response body.
    async fn query_unread(
        &self,
        token: &AccessToken,
        query: &UnreadQuery,
    ) -> Result<String, HostError>;

    /// Exchange one legacy XML request. Returns the raw XML response.
    async fn legacy_request(&self, envelope: &str) -> Result<String, HostError>;

    /// Write subject/body to the compose surface.
    async fn write_compose(&self, content: &ComposeContent) -> Result<(), HostError>;
}
