//! Retrieval adapter. Folds the strategy list; the first success wins.

use std::sync::Arc;

use tracing::{info, warn};

use super::strategy::{Degraded, LegacyProtocol, RetrievalStrategy, StructuredQuery};
use super::{Channel, RetrievalResult};
use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::host::{Folder, MailHost};

/// Stateless between calls: holds only configuration and the host handle.
pub struct RetrievalAdapter {
    host: Arc<dyn MailHost>,
    strategies: Vec<Box<dyn RetrievalStrategy>>,
}

impl RetrievalAdapter {
    /// Structured query, then legacy protocol, then (optionally) degraded.
    pub fn new(host: Arc<dyn MailHost>, config: RetrievalConfig) -> Self {
        let mut strategies: Vec<Box<dyn RetrievalStrategy>> = vec![
            Box::new(StructuredQuery {
                page_size: config.page_size,
            }),
            Box::new(LegacyProtocol {
                page_size: config.page_size,
            }),
        ];
        if config.degrade_on_exhaustion {
            strategies.push(Box::new(Degraded));
        }
        Self::with_strategies(host, strategies)
    }

    pub fn with_strategies(
        host: Arc<dyn MailHost>,
        strategies: Vec<Box<dyn RetrievalStrategy>>,
    ) -> Self {
        Self { host, strategies }
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.strategies.iter().map(|s| s.channel()).collect()
    }

    /// Fetch unread items from `folder`.
    ///
    /// Strategies run strictly in order; a later one starts only after the
    /// earlier one has failed. Without a live mailbox context the live
    /// channels are skipped entirely.
    pub async fn fetch_unread(&self, folder: &Folder) -> RetrievalResult {
        let connected = self.host.is_connected();
        let mut last: Option<RetrievalError> = None;
        if !connected {
            info!(folder = %folder, "No live mailbox context, skipping live channels");
            last = Some(RetrievalError::ConnectionUnavailable);
        }

        for strategy in &self.strategies {
            if strategy.requires_connection() && !connected {
                continue;
            }

            match strategy
                .fetch(self.host.as_ref(), folder, last.as_ref())
                .await
            {
                RetrievalResult::Success(retrieved) => {
                    info!(
                        channel = %retrieved.channel,
                        count = retrieved.items.len(),
                        folder = %folder,
                        "Unread mail retrieved"
                    );
                    return RetrievalResult::Success(retrieved);
                }
                RetrievalResult::Failure(e) => {
                    warn!(channel = %strategy.channel(), error = %e, "Retrieval channel failed");
                    last = Some(e);
                }
            }
        }

        match last {
            None | Some(RetrievalError::ConnectionUnavailable) => {
                RetrievalResult::Failure(RetrievalError::ConnectionUnavailable)
            }
            Some(other) => RetrievalResult::Failure(RetrievalError::Exhausted {
                last: Box::new(other),
            }),
        }
    }
}
