//! Mail triage: unread mail retrieval with multi-channel fallback and
//! assistant-backed enrichment.

pub mod assistant;
pub mod config;
pub mod error;
pub mod host;
pub mod mail;
pub mod qa;
pub mod retrieval;
pub mod triage;
