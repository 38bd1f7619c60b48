//! Per-run verification state.
//!
//! A [`VerificationContext`] borrows the signature and the collaborators
//! for one verification run and owns the cache of extended calendar chains.
//! Each publication time (or the calendar head) is fetched at most once:
//! concurrent requests for the same key wait on the same in-flight fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keyless_chain::extender::check_extension_consistency;
use keyless_chain::{
    CalendarHashChain, DataHash, Extender, ProtocolError, PublicationData, Signature,
};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::error::VerificationError;
use crate::publications::PublicationsLookup;

/// Default time allowed for one extension request.
pub const DEFAULT_EXTENSION_TIMEOUT: Duration = Duration::from_secs(10);

type ChainCell = Arc<OnceCell<Arc<CalendarHashChain>>>;

/// Why an extended calendar chain could not be obtained. These make the
/// requesting rule inconclusive; they never abort the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionFailure {
    /// No extension collaborator was supplied.
    #[error("no extender configured")]
    NotConfigured,

    /// Extension is disabled for this run.
    #[error("extending is not allowed")]
    NotAllowed,

    /// The collaborator did not answer in time.
    #[error("extension request timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator answered with an error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// State for one verification run.
pub struct VerificationContext<'a> {
    signature: &'a Signature,
    document_hash: Option<DataHash>,
    input_level: u64,
    user_publication: Option<PublicationData>,
    extending_allowed: bool,
    extender: Option<&'a dyn Extender>,
    publications: Option<&'a dyn PublicationsLookup>,
    extension_timeout: Duration,
    cancel: CancellationToken,
    extended: Mutex<HashMap<Option<DateTime<Utc>>, ChainCell>>,
}

impl<'a> VerificationContext<'a> {
    /// Start building a context for `signature`.
    pub fn builder(signature: &'a Signature) -> ContextBuilder<'a> {
        ContextBuilder {
            context: VerificationContext {
                signature,
                document_hash: None,
                input_level: 0,
                user_publication: None,
                extending_allowed: false,
                extender: None,
                publications: None,
                extension_timeout: DEFAULT_EXTENSION_TIMEOUT,
                cancel: CancellationToken::new(),
                extended: Mutex::new(HashMap::new()),
            },
        }
    }

    /// The signature under test.
    pub const fn signature(&self) -> &'a Signature {
        self.signature
    }

    /// Hash of the document the caller expects the signature to cover.
    pub const fn document_hash(&self) -> Option<&DataHash> {
        self.document_hash.as_ref()
    }

    /// Tree level of the document hash.
    pub const fn input_level(&self) -> u64 {
        self.input_level
    }

    /// Publication supplied by the user as a trust anchor.
    pub const fn user_publication(&self) -> Option<&PublicationData> {
        self.user_publication.as_ref()
    }

    /// Whether the run may contact the extender and an extender is present.
    pub const fn can_extend(&self) -> bool {
        self.extending_allowed && self.extender.is_some()
    }

    /// The publications lookup, if supplied.
    pub fn publications(&self) -> Option<&'a dyn PublicationsLookup> {
        self.publications
    }

    /// Token cancelling the run.
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The calendar chain from the signature's aggregation time to
    /// `publication_time` (or the calendar head when `None`).
    ///
    /// The outer `Result` carries fatal errors: cancellation, and an
    /// extended chain that drops the signature's own right links. The inner
    /// `Result` carries failures that leave the requesting rule
    /// inconclusive.
    pub async fn extended_calendar_chain(
        &self,
        publication_time: Option<DateTime<Utc>>,
    ) -> Result<Result<Arc<CalendarHashChain>, ExtensionFailure>, VerificationError> {
        let cell = {
            let mut cache = self
                .extended
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(publication_time).or_default())
        };

        let fetched = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(VerificationError::Cancelled),
            fetched = cell.get_or_try_init(|| self.fetch(publication_time)) => fetched.cloned(),
        };

        let chain = match fetched {
            Ok(chain) => chain,
            Err(failure) => {
                tracing::warn!(
                    aggregation_time = %self.signature.aggregation_time(),
                    publication_time = ?publication_time,
                    error = %failure,
                    "extended calendar chain unavailable"
                );
                return Ok(Err(failure));
            }
        };

        check_extension_consistency(self.signature, &chain).map_err(|_| {
            VerificationError::InconsistentCalendarChain {
                aggregation_time: self.signature.aggregation_time(),
                publication_time,
            }
        })?;
        Ok(Ok(chain))
    }

    async fn fetch(
        &self,
        publication_time: Option<DateTime<Utc>>,
    ) -> Result<Arc<CalendarHashChain>, ExtensionFailure> {
        let extender = self.extender.ok_or(ExtensionFailure::NotConfigured)?;
        if !self.extending_allowed {
            return Err(ExtensionFailure::NotAllowed);
        }
        let aggregation_time = self.signature.aggregation_time();
        tracing::debug!(%aggregation_time, ?publication_time, "requesting extended calendar chain");

        match tokio::time::timeout(
            self.extension_timeout,
            extender.extend(aggregation_time, publication_time),
        )
        .await
        {
            Err(_) => Err(ExtensionFailure::Timeout(self.extension_timeout)),
            Ok(Err(e)) => Err(ExtensionFailure::Protocol(e)),
            Ok(Ok(chain)) => Ok(Arc::new(chain)),
        }
    }
}

/// Builder for [`VerificationContext`].
pub struct ContextBuilder<'a> {
    context: VerificationContext<'a>,
}

impl<'a> ContextBuilder<'a> {
    /// Expect the signature to cover `hash`.
    #[must_use]
    pub fn document_hash(mut self, hash: DataHash) -> Self {
        self.context.document_hash = Some(hash);
        self
    }

    /// Level of the document hash in the local aggregation tree.
    #[must_use]
    pub const fn input_level(mut self, level: u64) -> Self {
        self.context.input_level = level;
        self
    }

    /// Trust anchor publication supplied by the user.
    #[must_use]
    pub fn user_publication(mut self, publication: PublicationData) -> Self {
        self.context.user_publication = Some(publication);
        self
    }

    /// Allow contacting the extender.
    #[must_use]
    pub const fn extending_allowed(mut self, allowed: bool) -> Self {
        self.context.extending_allowed = allowed;
        self
    }

    /// Collaborator serving extended calendar chains.
    #[must_use]
    pub fn extender(mut self, extender: &'a dyn Extender) -> Self {
        self.context.extender = Some(extender);
        self
    }

    /// Collaborator serving trusted publications and certificates.
    #[must_use]
    pub fn publications(mut self, publications: &'a dyn PublicationsLookup) -> Self {
        self.context.publications = Some(publications);
        self
    }

    /// Time allowed for each extension request.
    #[must_use]
    pub const fn extension_timeout(mut self, timeout: Duration) -> Self {
        self.context.extension_timeout = timeout;
        self
    }

    /// Cancel the run when `token` is cancelled.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.context.cancel = token;
        self
    }

    /// Finish building.
    pub fn build(self) -> VerificationContext<'a> {
        self.context
    }
}
