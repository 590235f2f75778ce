//! Triage orchestrator: list, select, enrich, act.
//!
//! The orchestrator is the sole owner of the `TriageSession`. Transitions are
//! synchronous: they update the session and spawn the network work, which
//! reports back over a channel. Completions are applied one at a time by
//! `next_completion`, so every mutation happens on the caller's task.
//!
//! Every spawned call carries a `Ticket`: the selection epoch it was issued
//! under plus a per-kind sequence number. A completion is applied only while
//! its ticket is still the latest of its kind (and, for item enrichment, the
//! selection has not changed). Late results are discarded instead of cancelled.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::{ConnectionStatus, LoadState, NO_UNREAD_MESSAGE, TriageSession};
use crate::assistant::{AssistantClient, SuggestedReply, Summary};
use crate::error::{AssistantError, HostError, RetrievalError, TriageError};
use crate::host::{ComposeContent, Folder, MailHost};
use crate::mail::MailItem;
use crate::mail::model::reply_subject;
use crate::retrieval::{RetrievalAdapter, RetrievalResult};

/// Identity of one outstanding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

/// Kind of asynchronous work the orchestrator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    List,
    Summary,
    Reply,
    Send,
    Digest,
}

/// What happened to a completion when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied(CompletionKind),
    /// Superseded or issued for a selection that is no longer current.
    Discarded(CompletionKind),
}

impl CompletionOutcome {
    pub fn kind(&self) -> CompletionKind {
        match self {
            Self::Applied(kind) | Self::Discarded(kind) => *kind,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded(_))
    }
}

enum Completion {
    List(Ticket, RetrievalResult),
    Summary(Ticket, Result<Summary, AssistantError>),
    Reply(Ticket, Result<SuggestedReply, AssistantError>),
    Send(Ticket, Result<(), HostError>),
    Digest(Ticket, Result<Summary, AssistantError>),
    /// The spawned call panicked before producing a result.
    Aborted(CompletionKind, Ticket, String),
}

/// Latest issued sequence per kind.
#[derive(Debug, Default)]
struct Issued {
    list: u64,
    summary: u64,
    reply: u64,
    send: u64,
    digest: u64,
}

pub struct TriageOrchestrator {
    session: TriageSession,
    retrieval: Arc<RetrievalAdapter>,
    assistant: Arc<dyn AssistantClient>,
    host: Arc<dyn MailHost>,
    folder: Folder,
    epoch: u64,
    issued: Issued,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl TriageOrchestrator {
    /// Transitions spawn Tokio tasks and must be called from within a runtime.
    pub fn new(
        retrieval: Arc<RetrievalAdapter>,
        assistant: Arc<dyn AssistantClient>,
        host: Arc<dyn MailHost>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: TriageSession::new(),
            retrieval,
            assistant,
            host,
            folder: Folder::Inbox,
            epoch: 0,
            issued: Issued::default(),
            in_flight: 0,
            tx,
            rx,
        }
    }

    pub fn with_folder(mut self, folder: Folder) -> Self {
        self.folder = folder;
        self
    }

    pub fn session(&self) -> &TriageSession {
        &self.session
    }

    /// Number of calls whose completion has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn ticket(&self, seq: u64) -> Ticket {
        Ticket {
            epoch: self.epoch,
            seq,
        }
    }

    /// Run `work` on its own task. A panic inside it still reports back as
    /// an `Aborted` completion, so `in_flight` always drains.
    fn spawn<F>(&mut self, kind: CompletionKind, ticket: Ticket, work: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        let handle = tokio::spawn(work);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!(?kind, error = %e, "Spawned call panicked");
                    Completion::Aborted(kind, ticket, format!("call panicked: {e}"))
                }
            };
            let _ = tx.send(completion);
        });
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Fetch unread items. A newer load supersedes any load still in flight.
    pub fn load_list(&mut self) {
        self.issued.list += 1;
        let ticket = self.ticket(self.issued.list);
        self.session.list_state = LoadState::Loading;
        debug!(session = %self.session.id, seq = ticket.seq, "Loading list");

        let retrieval = self.retrieval.clone();
        let folder = self.folder.clone();
        self.spawn(CompletionKind::List, ticket, async move {
            Completion::List(ticket, retrieval.fetch_unread(&folder).await)
        });
    }

    /// Select `item` and enrich it with a summary and a suggested reply.
    ///
    /// The two calls are independent; either may fail without affecting the other.
    pub fn select_item(&mut self, item: MailItem) {
        self.epoch = self.epoch.wrapping_add(1);
        info!(session = %self.session.id, epoch = self.epoch, subject = %item.subject, "Item selected");

        self.session.selected = Some(item.clone());
        self.session.summary = None;
        self.session.suggested_reply = None;
        self.session.summary_state = LoadState::Loading;
        self.session.reply_state = LoadState::Loading;
        if !self.session.send_state.is_loading() {
            self.session.send_state = LoadState::Idle;
        }

        self.issued.summary += 1;
        let ticket = self.ticket(self.issued.summary);
        let assistant = self.assistant.clone();
        let for_summary = item.clone();
        self.spawn(CompletionKind::Summary, ticket, async move {
            Completion::Summary(ticket, assistant.summarize(&for_summary).await)
        });

        self.spawn_reply(item);
    }

    fn spawn_reply(&mut self, item: MailItem) {
        self.issued.reply += 1;
        let ticket = self.ticket(self.issued.reply);
        let assistant = self.assistant.clone();
        self.spawn(CompletionKind::Reply, ticket, async move {
            Completion::Reply(ticket, assistant.suggest_reply(&item).await)
        });
    }

    /// Ask again for a reply to the current selection, superseding any
    /// outstanding suggestion.
    pub fn regenerate_reply(&mut self) -> Result<(), TriageError> {
        let item = self
            .session
            .selected
            .clone()
            .ok_or(TriageError::NoSelection)?;
        self.session.suggested_reply = None;
        self.session.reply_state = LoadState::Loading;
        self.spawn_reply(item);
        Ok(())
    }

    /// Replace the suggested reply with user-edited text.
    pub fn edit_reply(&mut self, text: impl Into<String>) -> Result<(), TriageError> {
        if !self.session.reply_state.is_ready() {
            return Err(TriageError::ReplyNotReady {
                state: self.session.reply_state.to_string(),
            });
        }
        self.session.suggested_reply = Some(text.into());
        Ok(())
    }

    /// Write the reply to the host compose surface.
    ///
    /// Rejected without any state change when the reply is blank, nothing is
    /// selected, or a send is already running.
    pub fn send_reply(&mut self) -> Result<(), TriageError> {
        let reply = self
            .session
            .suggested_reply
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or(TriageError::EmptyReply)?;
        let selected = self
            .session
            .selected
            .as_ref()
            .ok_or(TriageError::NoSelection)?;
        if self.session.send_state.is_loading() {
            return Err(TriageError::SendInProgress);
        }

        let content = ComposeContent::from_text(Some(reply_subject(&selected.subject)), &reply);
        self.session.send_state = LoadState::Loading;
        self.issued.send += 1;
        let ticket = self.ticket(self.issued.send);
        info!(session = %self.session.id, epoch = ticket.epoch, "Sending reply");

        let host = self.host.clone();
        self.spawn(CompletionKind::Send, ticket, async move {
            Completion::Send(ticket, host.write_compose(&content).await)
        });
        Ok(())
    }

    /// Return to the list view. In-flight enrichment for the old selection
    /// will be discarded when it arrives.
    pub fn deselect(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.session.clear_selection();
        if !self.session.send_state.is_loading() {
            self.session.send_state = LoadState::Idle;
        }
    }

    /// Summarize all unread items in one digest.
    pub fn summarize_unread(&mut self) {
        self.issued.digest += 1;
        if self.session.items.is_empty() {
            self.session.digest = Some(NO_UNREAD_MESSAGE.to_string());
            self.session.digest_state = LoadState::Ready;
            return;
        }

        let ticket = self.ticket(self.issued.digest);
        self.session.digest = None;
        self.session.digest_state = LoadState::Loading;
        let assistant = self.assistant.clone();
        let items = self.session.items.clone();
        self.spawn(CompletionKind::Digest, ticket, async move {
            Completion::Digest(ticket, assistant.summarize_unread(&items).await)
        });
    }

    // ── Completions ─────────────────────────────────────────────────

    /// Wait for one outstanding call and apply its result.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<CompletionOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;

        let outcome = self.apply(completion);
        if let CompletionOutcome::Discarded(kind) = outcome {
            debug!(session = %self.session.id, ?kind, "Stale completion discarded");
        }
        Some(outcome)
    }

    /// Apply completions until nothing is in flight, including work the
    /// completions themselves trigger. A call that never resolves keeps this
    /// waiting.
    pub async fn settle(&mut self) -> Vec<CompletionOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_completion().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Lists, sends and digests only need to be the latest of their kind;
    /// item enrichment must also belong to the current selection.
    fn is_current(&self, kind: CompletionKind, ticket: Ticket) -> bool {
        match kind {
            CompletionKind::List => ticket.seq == self.issued.list,
            CompletionKind::Send => ticket.seq == self.issued.send,
            CompletionKind::Digest => ticket.seq == self.issued.digest,
            CompletionKind::Summary => {
                ticket.epoch == self.epoch && ticket.seq == self.issued.summary
            }
            CompletionKind::Reply => ticket.epoch == self.epoch && ticket.seq == self.issued.reply,
        }
    }

    fn state_mut(&mut self, kind: CompletionKind) -> &mut LoadState {
        match kind {
            CompletionKind::List => &mut self.session.list_state,
            CompletionKind::Summary => &mut self.session.summary_state,
            CompletionKind::Reply => &mut self.session.reply_state,
            CompletionKind::Send => &mut self.session.send_state,
            CompletionKind::Digest => &mut self.session.digest_state,
        }
    }

    fn apply(&mut self, completion: Completion) -> CompletionOutcome {
        use CompletionOutcome::{Applied, Discarded};

        match completion {
            Completion::List(ticket, result) => {
                if !self.is_current(CompletionKind::List, ticket) {
                    return Discarded(CompletionKind::List);
                }
                self.apply_list(result);
                Applied(CompletionKind::List)
            }
            Completion::Summary(ticket, result) => {
                if !self.is_current(CompletionKind::Summary, ticket) {
                    return Discarded(CompletionKind::Summary);
                }
                match result {
                    Ok(summary) => {
                        self.session.summary = Some(summary.text);
                        self.session.summary_state = LoadState::Ready;
                    }
                    Err(e) => {
                        self.session.summary_state = LoadState::Errored(e.to_string());
                    }
                }
                Applied(CompletionKind::Summary)
            }
            Completion::Reply(ticket, result) => {
                if !self.is_current(CompletionKind::Reply, ticket) {
                    return Discarded(CompletionKind::Reply);
                }
                match result {
                    Ok(reply) => {
                        self.session.suggested_reply = Some(reply.text);
                        self.session.reply_state = LoadState::Ready;
                    }
                    Err(e) => {
                        self.session.reply_state = LoadState::Errored(e.to_string());
                    }
                }
                Applied(CompletionKind::Reply)
            }
            Completion::Send(ticket, result) => {
                if !self.is_current(CompletionKind::Send, ticket) {
                    return Discarded(CompletionKind::Send);
                }
                match result {
                    Ok(()) => {
                        info!(session = %self.session.id, "Reply sent");
                        // The user may have moved on to another item meanwhile.
                        if ticket.epoch == self.epoch {
                            self.epoch = self.epoch.wrapping_add(1);
                            self.session.clear_selection();
                        }
                        self.session.send_state = LoadState::Ready;
                        self.load_list();
                    }
                    Err(e) => {
                        warn!(session = %self.session.id, error = %e, "Reply send failed");
                        self.session.send_state = LoadState::Errored(e.to_string());
                    }
                }
                Applied(CompletionKind::Send)
            }
            Completion::Digest(ticket, result) => {
                if !self.is_current(CompletionKind::Digest, ticket) {
                    return Discarded(CompletionKind::Digest);
                }
                match result {
                    Ok(summary) => {
                        self.session.digest = Some(summary.text);
                        self.session.digest_state = LoadState::Ready;
                    }
                    Err(e) => {
                        self.session.digest_state = LoadState::Errored(e.to_string());
                    }
                }
                Applied(CompletionKind::Digest)
            }
            Completion::Aborted(kind, ticket, reason) => {
                if !self.is_current(kind, ticket) {
                    return Discarded(kind);
                }
                *self.state_mut(kind) = LoadState::Errored(reason);
                Applied(kind)
            }
        }
    }

    fn apply_list(&mut self, result: RetrievalResult) {
        match result {
            RetrievalResult::Success(retrieved) => {
                self.session.connection = if retrieved.is_degraded() {
                    ConnectionStatus::Unavailable
                } else {
                    ConnectionStatus::Live(retrieved.channel)
                };
                info!(
                    session = %self.session.id,
                    channel = %retrieved.channel,
                    count = retrieved.items.len(),
                    "List loaded"
                );
                self.session.items = retrieved.items;
                self.session.list_state = LoadState::Ready;
            }
            // No mailbox is not an error: show an empty list and say why.
            RetrievalResult::Failure(RetrievalError::ConnectionUnavailable) => {
                info!(session = %self.session.id, "No live mailbox connection");
                self.session.connection = ConnectionStatus::Unavailable;
                self.session.items.clear();
                self.session.list_state = LoadState::Ready;
            }
            RetrievalResult::Failure(e) => {
                warn!(session = %self.session.id, error = %e, "List load failed");
                self.session.list_state = LoadState::Errored(e.to_string());
            }
        }
    }
}
