//! The extension collaborator and signature extension.
//!
//! An [`Extender`] returns the calendar chain leading from an aggregation
//! round to a later calendar root. Transport is the implementor's concern;
//! this crate only consumes the decoded chain.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::engine::right_links_consistent;
use crate::error::ChainError;
use crate::model::{CalendarHashChain, PublicationRecord, Signature};

/// Failure reported by an extension collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The service has no calendar data for the request.
    #[error("no calendar hash chain from {aggregation_time} to {publication_time:?}")]
    NotFound {
        /// Aggregation time asked about.
        aggregation_time: DateTime<Utc>,
        /// Publication time asked for, or `None` for the calendar head.
        publication_time: Option<DateTime<Utc>>,
    },

    /// The service could not be reached or answered with an error.
    #[error("extension service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something that is not a usable chain.
    #[error("malformed extension response: {0}")]
    Malformed(String),
}

/// Future returned by [`Extender::extend`].
pub type ExtendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CalendarHashChain, ProtocolError>> + Send + 'a>>;

/// Source of extended calendar hash chains.
pub trait Extender: Send + Sync {
    /// Fetch the calendar chain from `aggregation_time` to
    /// `publication_time`, or to the most recent calendar root when
    /// `publication_time` is `None`.
    fn extend(
        &self,
        aggregation_time: DateTime<Utc>,
        publication_time: Option<DateTime<Utc>>,
    ) -> ExtendFuture<'_>;
}

/// Check that `extended` keeps the right links of the signature's own
/// calendar chain as a prefix. Signatures without a calendar chain pass.
pub fn check_extension_consistency(
    signature: &Signature,
    extended: &CalendarHashChain,
) -> Result<(), ChainError> {
    match signature.calendar_chain() {
        Some(existing) if !right_links_consistent(existing, extended) => {
            tracing::warn!(
                aggregation_time = %signature.aggregation_time(),
                publication_time = %extended.publication_time,
                "extended calendar chain diverges from signature calendar chain"
            );
            Err(ChainError::InconsistentCalendarChain)
        }
        _ => Ok(()),
    }
}

/// Extend `signature` to `publication`.
///
/// The result keeps the aggregation chains and legacy record, carries the
/// extended calendar chain and the publication record, and drops any
/// calendar authentication record.
pub async fn extend_signature(
    signature: &Signature,
    extender: &dyn Extender,
    publication: &PublicationRecord,
) -> Result<Signature, ChainError> {
    let publication_time = publication.publication_data.publication_time;
    let aggregation_time = signature.aggregation_time();
    if publication_time < aggregation_time {
        return Err(ChainError::PublicationBeforeSignature {
            publication_time,
            aggregation_time,
        });
    }

    let extended = extender
        .extend(aggregation_time, Some(publication_time))
        .await?;
    check_extension_consistency(signature, &extended)?;

    let mut parts = signature.clone().into_parts();
    parts.calendar_chain = Some(extended);
    parts.publication_record = Some(publication.clone());
    parts.authentication_record = None;
    tracing::info!(
        %aggregation_time,
        %publication_time,
        "signature extended"
    );
    Signature::new(parts)
}
