//! Assistant service client and compose fallback.

pub mod client;
pub mod compose;
pub mod types;

pub use client::{AssistantClient, HttpAssistantClient};
pub use compose::{ComposedEmail, Composer, Provenance, fallback_template};
pub use types::{
    EnhancedEmail, IndexAck, QueryAnswer, QueryScope, SuggestedReply, Summary, Tone, UnknownTone,
};
