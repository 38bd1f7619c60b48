//! In-memory calendar archive serving extension requests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keyless_chain::extender::ExtendFuture;
use keyless_chain::{CalendarHashChain, Extender, ProtocolError};
use serde::Deserialize;

use crate::error::VerificationError;

/// An [`Extender`] answering from a fixed set of calendar chains.
///
/// A request matches a chain with the same aggregation time and, when a
/// publication time is given, the same publication time. Head requests
/// return the chain with the latest publication time.
#[derive(Debug, Default)]
pub struct InMemoryExtender {
    chains: Vec<CalendarHashChain>,
    delay: Option<Duration>,
    requests: AtomicUsize,
}

#[derive(Deserialize)]
struct ArchiveDocument {
    chains: Vec<CalendarHashChain>,
}

impl InMemoryExtender {
    /// Build an archive from calendar chains.
    pub fn new(chains: Vec<CalendarHashChain>) -> Self {
        Self {
            chains,
            delay: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Load a JSON archive document: `{"chains": [...]}`.
    pub fn from_file(path: &Path) -> Result<Self, VerificationError> {
        let data = std::fs::read_to_string(path)?;
        let document: ArchiveDocument = serde_json::from_str(&data)?;
        tracing::debug!(chains = document.chains.len(), "loaded calendar archive");
        Ok(Self::new(document.chains))
    }

    /// Delay every answer, simulating a slow service.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of extension requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lookup(
        &self,
        aggregation_time: DateTime<Utc>,
        publication_time: Option<DateTime<Utc>>,
    ) -> Option<CalendarHashChain> {
        let mut candidates = self
            .chains
            .iter()
            .filter(|c| c.aggregation_time == aggregation_time);
        match publication_time {
            Some(time) => candidates.find(|c| c.publication_time == time).cloned(),
            None => candidates.max_by_key(|c| c.publication_time).cloned(),
        }
    }
}

impl Extender for InMemoryExtender {
    fn extend(
        &self,
        aggregation_time: DateTime<Utc>,
        publication_time: Option<DateTime<Utc>>,
    ) -> ExtendFuture<'_> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let found = self.lookup(aggregation_time, publication_time);
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            found.ok_or(ProtocolError::NotFound {
                aggregation_time,
                publication_time,
            })
        })
    }
}
