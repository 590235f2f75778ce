//! Triage workflow state and the orchestrator that drives it.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{CompletionKind, CompletionOutcome, Ticket, TriageOrchestrator};
pub use state::{ConnectionStatus, LoadState, NO_UNREAD_MESSAGE, TriageSession};
