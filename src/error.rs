//! Error types for mail triage.

use crate::retrieval::Channel;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Triage error: {0}")]
    Triage(#[from] TriageError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Q&A error: {0}")]
    Qa(#[from] QaError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures reported by the host mailbox collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Host has no live mailbox context")]
    NotConnected,

    #[error("Access token unavailable: {reason}")]
    TokenUnavailable { reason: String },

    #[error("Host {operation} request failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Host {operation} returned HTTP {status}")]
    Http { operation: String, status: u16 },

    #[error("Host does not support {capability}")]
    Unsupported { capability: String },
}

/// Retrieval chain errors.
///
/// Channel failures are chained through `previous` so the final cause keeps
/// the full history of the attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    #[error("No live mailbox connection")]
    ConnectionUnavailable,

    #[error("{channel} channel failed: {reason}")]
    ChannelFailure {
        channel: Channel,
        reason: String,
        previous: Option<Box<RetrievalError>>,
    },

    #[error("All retrieval channels failed (last: {last})")]
    Exhausted { last: Box<RetrievalError> },
}

impl RetrievalError {
    /// Wrap a channel failure, chaining the failure of the previous step.
    pub fn channel(
        channel: Channel,
        reason: impl Into<String>,
        previous: Option<RetrievalError>,
    ) -> Self {
        Self::ChannelFailure {
            channel,
            reason: reason.into(),
            previous: previous.map(Box::new),
        }
    }

    /// Channels that failed, oldest first.
    pub fn failed_channels(&self) -> Vec<Channel> {
        match self {
            Self::ConnectionUnavailable => vec![],
            Self::ChannelFailure {
                channel, previous, ..
            } => {
                let mut channels = previous
                    .as_ref()
                    .map(|p| p.failed_channels())
                    .unwrap_or_default();
                channels.push(*channel);
                channels
            }
            Self::Exhausted { last } => last.failed_channels(),
        }
    }
}

/// Classified assistant service failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistantError {
    #[error("Assistant request to {endpoint} failed: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("Assistant {endpoint} returned status {status}: {message}")]
    ServerError {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl AssistantError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Network { endpoint, .. }
            | Self::ServerError { endpoint, .. }
            | Self::Malformed { endpoint, .. } => endpoint,
        }
    }
}

/// Rejected triage transitions. A rejected transition leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriageError {
    #[error("No item is selected")]
    NoSelection,

    #[error("Reply is empty")]
    EmptyReply,

    #[error("Reply cannot be edited while it is {state}")]
    ReplyNotReady { state: String },

    #[error("A reply is already being sent")]
    SendInProgress,
}

/// Compose workflow errors. Drafting itself never fails; only input
/// validation and the compose-surface write can.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Failed to write to compose surface: {0}")]
    Host(#[from] HostError),
}

/// Mailbox Q&A errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QaError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
