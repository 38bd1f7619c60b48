//! Verification rules.
//!
//! A [`Rule`] is one consistency check over a [`VerificationContext`]. It
//! yields OK, FAIL or NA; NA caused by a missing or unreachable trust anchor
//! (a certificate, a publication, the extender) is flagged so policies can
//! report the run as inconclusive.
//!
//! Every rule is self-contained: when the element it checks is absent it
//! returns NA rather than assuming an earlier rule ran.

mod aggregation;
mod calendar;
mod document;
mod key;
mod publication;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyless_chain::CalendarHashChain;
use serde::Serialize;

use crate::code::ErrorCode;
use crate::context::VerificationContext;
use crate::error::VerificationError;

/// Outcome of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    /// The check passed.
    Ok,
    /// The check failed.
    Fail,
    /// The check could not be decided.
    Na,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Na => "NA",
        })
    }
}

/// Result of running one [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    /// The rule that produced this result.
    pub rule: Rule,
    /// OK, FAIL or NA.
    pub status: RuleStatus,
    /// The rule's code on FAIL, `GEN-02` on NA, nothing on OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// NA because a trust anchor was missing or unreachable.
    pub trust_anchor_missing: bool,
}

impl RuleResult {
    /// Whether this result makes its policy inconclusive.
    pub const fn is_inconclusive(&self) -> bool {
        self.trust_anchor_missing
    }
}

/// What a rule evaluation decided, before it is tagged with a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Ok,
    Fail,
    Na,
    AnchorUnavailable,
}

impl Verdict {
    pub(crate) fn from_check(passed: bool) -> Self {
        if passed { Self::Ok } else { Self::Fail }
    }
}

/// Every rule the built-in policies are composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rule {
    // Document
    /// Document hash algorithm equals the signature input hash algorithm.
    DocumentHashAlgorithm,
    /// Document hash equals the signature input hash.
    DocumentHash,
    /// Input level does not exceed the first link's level correction.
    InputHashLevel,

    // Aggregation
    /// Signature input hash algorithm not deprecated at signing time.
    InputHashAlgorithmDeprecated,
    /// Legacy record internal algorithms not deprecated at signing time.
    Rfc3161InternalAlgorithmsDeprecated,
    /// Legacy record output algorithm not deprecated at signing time.
    Rfc3161OutputAlgorithmDeprecated,
    /// Legacy record output equals the bottom chain input.
    AggregationChainInputHash,
    /// Legacy record index equals the bottom chain index.
    Rfc3161RecordIndex,
    /// Legacy record time equals the bottom chain time.
    Rfc3161RecordTime,
    /// Each lower chain index extends its upper neighbour's index.
    AggregationChainIndexSuccessor,
    /// Metadata siblings are well formed.
    AggregationChainMetadata,
    /// No aggregation algorithm deprecated at signing time.
    AggregationAlgorithmDeprecated,
    /// Each chain output equals the next chain input.
    AggregationChainConsistency,
    /// All chains share one aggregation time.
    AggregationChainTime,
    /// Each chain index ends with the element its links encode.
    AggregationChainIndex,

    // Calendar
    /// Calendar input equals the aggregation root.
    CalendarInputHash,
    /// Calendar aggregation time equals the signature aggregation time.
    CalendarAggregationTime,
    /// Calendar shape encodes the aggregation time.
    CalendarRegistrationTime,
    /// No calendar sibling algorithm obsolete at publication time.
    CalendarAlgorithmObsolete,
    /// Publication record time equals the calendar publication time.
    PublicationRecordTime,
    /// Publication record hash equals the calendar root.
    PublicationRecordHash,
    /// Authentication record time equals the calendar publication time.
    AuthenticationRecordTime,
    /// Authentication record hash equals the calendar root.
    AuthenticationRecordHash,

    // Trust anchors
    /// The signature has a calendar chain.
    CalendarChainExists,
    /// The signature has a calendar authentication record.
    AuthenticationRecordExists,
    /// The signature has a publication record.
    PublicationRecordExists,
    /// Extension is allowed and an extender is available.
    ExtendingPermitted,

    // Key based
    /// The signing certificate is in the lookup.
    CertificateExists,
    /// The certificate was valid at aggregation time.
    CertificateValidity,
    /// The authentication record signature verifies.
    AuthenticationRecordSignature,

    // Publications lookup
    /// The lookup holds the signature's publication.
    LookupContainsSignaturePublication,
    /// The lookup publication hash equals the signature publication hash.
    LookupSignaturePublicationHash,
    /// The lookup holds a publication made after signing.
    LookupContainsNewerPublication,
    /// Chain extended to the lookup publication reaches its hash.
    ExtendedToLookupRootHash,
    /// Chain extended to the lookup publication has the right times.
    ExtendedToLookupTime,
    /// Chain extended to the lookup publication starts at the aggregation root.
    ExtendedToLookupInputHash,

    // User publication
    /// The user supplied a publication.
    UserPublicationExists,
    /// The user publication time equals the signature publication time.
    UserPublicationTimeMatches,
    /// The user publication hash equals the signature publication hash.
    UserPublicationHash,
    /// The user publication was made after signing.
    UserPublicationNewer,
    /// Chain extended to the user publication reaches its hash.
    ExtendedToUserRootHash,
    /// Chain extended to the user publication has the right times.
    ExtendedToUserTime,
    /// Chain extended to the user publication starts at the aggregation root.
    ExtendedToUserInputHash,

    // Calendar based
    /// Extended chain reaches the same root as the signature calendar chain.
    CalendarExtendedRootHash,
    /// Extended chain starts at the aggregation root.
    CalendarExtendedInputHash,
    /// Extended chain aggregation time equals the signature aggregation time.
    CalendarExtendedAggregationTime,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Rule {
    /// Code reported when this rule fails.
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::DocumentHash => ErrorCode::Gen01,
            Self::InputHashLevel => ErrorCode::Gen03,
            Self::DocumentHashAlgorithm => ErrorCode::Gen04,
            Self::AggregationChainInputHash | Self::AggregationChainConsistency => {
                ErrorCode::Int01
            }
            Self::Rfc3161RecordTime | Self::AggregationChainTime => ErrorCode::Int02,
            Self::CalendarInputHash => ErrorCode::Int03,
            Self::CalendarAggregationTime => ErrorCode::Int04,
            Self::CalendarRegistrationTime => ErrorCode::Int05,
            Self::AuthenticationRecordTime => ErrorCode::Int06,
            Self::PublicationRecordTime => ErrorCode::Int07,
            Self::AuthenticationRecordHash => ErrorCode::Int08,
            Self::PublicationRecordHash => ErrorCode::Int09,
            Self::AggregationChainIndex => ErrorCode::Int10,
            Self::AggregationChainMetadata => ErrorCode::Int11,
            Self::Rfc3161RecordIndex | Self::AggregationChainIndexSuccessor => ErrorCode::Int12,
            Self::InputHashAlgorithmDeprecated => ErrorCode::Int13,
            Self::Rfc3161InternalAlgorithmsDeprecated => ErrorCode::Int14,
            Self::AggregationAlgorithmDeprecated => ErrorCode::Int15,
            Self::CalendarAlgorithmObsolete => ErrorCode::Int16,
            Self::Rfc3161OutputAlgorithmDeprecated => ErrorCode::Int17,
            Self::ExtendedToLookupRootHash | Self::ExtendedToUserRootHash => ErrorCode::Pub01,
            Self::ExtendedToLookupTime | Self::ExtendedToUserTime => ErrorCode::Pub02,
            Self::ExtendedToLookupInputHash | Self::ExtendedToUserInputHash => ErrorCode::Pub03,
            Self::UserPublicationHash => ErrorCode::Pub04,
            Self::LookupSignaturePublicationHash => ErrorCode::Pub05,
            Self::CertificateExists => ErrorCode::Key01,
            Self::AuthenticationRecordSignature => ErrorCode::Key02,
            Self::CertificateValidity => ErrorCode::Key03,
            Self::CalendarExtendedRootHash => ErrorCode::Cal01,
            Self::CalendarExtendedInputHash => ErrorCode::Cal02,
            Self::CalendarExtendedAggregationTime => ErrorCode::Cal03,
            Self::CalendarChainExists
            | Self::AuthenticationRecordExists
            | Self::PublicationRecordExists
            | Self::ExtendingPermitted
            | Self::LookupContainsSignaturePublication
            | Self::LookupContainsNewerPublication
            | Self::UserPublicationExists
            | Self::UserPublicationTimeMatches
            | Self::UserPublicationNewer => ErrorCode::Gen02,
        }
    }

    /// Run this rule.
    ///
    /// Errors are fatal to the whole run; rule-level outcomes are always
    /// carried in the returned [`RuleResult`].
    pub async fn verify(
        self,
        ctx: &VerificationContext<'_>,
    ) -> Result<RuleResult, VerificationError> {
        let verdict = self.evaluate(ctx).await?;
        let (status, code) = match verdict {
            Verdict::Ok => (RuleStatus::Ok, None),
            Verdict::Fail => (RuleStatus::Fail, Some(self.error_code())),
            Verdict::Na | Verdict::AnchorUnavailable => (RuleStatus::Na, Some(ErrorCode::Gen02)),
        };
        Ok(RuleResult {
            rule: self,
            status,
            code,
            trust_anchor_missing: verdict == Verdict::AnchorUnavailable,
        })
    }

    async fn evaluate(self, ctx: &VerificationContext<'_>) -> Result<Verdict, VerificationError> {
        match self {
            Self::DocumentHashAlgorithm => Ok(document::hash_algorithm(ctx)),
            Self::DocumentHash => Ok(document::hash(ctx)),
            Self::InputHashLevel => Ok(document::input_level(ctx)),

            Self::InputHashAlgorithmDeprecated => Ok(aggregation::input_algorithm_deprecated(ctx)),
            Self::Rfc3161InternalAlgorithmsDeprecated => {
                Ok(aggregation::rfc3161_internal_algorithms_deprecated(ctx))
            }
            Self::Rfc3161OutputAlgorithmDeprecated => {
                Ok(aggregation::rfc3161_output_algorithm_deprecated(ctx))
            }
            Self::AggregationChainInputHash => aggregation::rfc3161_output_hash(ctx),
            Self::Rfc3161RecordIndex => Ok(aggregation::rfc3161_index(ctx)),
            Self::Rfc3161RecordTime => Ok(aggregation::rfc3161_time(ctx)),
            Self::AggregationChainIndexSuccessor => aggregation::index_successor(ctx),
            Self::AggregationChainMetadata => Ok(aggregation::metadata(ctx)),
            Self::AggregationAlgorithmDeprecated => Ok(aggregation::algorithm_deprecated(ctx)),
            Self::AggregationChainConsistency => aggregation::consistency(ctx),
            Self::AggregationChainTime => Ok(aggregation::chain_time(ctx)),
            Self::AggregationChainIndex => aggregation::index(ctx),

            Self::CalendarInputHash => calendar::input_hash(ctx),
            Self::CalendarAggregationTime => Ok(calendar::aggregation_time(ctx)),
            Self::CalendarRegistrationTime => Ok(calendar::registration_time(ctx)),
            Self::CalendarAlgorithmObsolete => Ok(calendar::algorithm_obsolete(ctx)),
            Self::PublicationRecordTime => Ok(calendar::publication_record_time(ctx)),
            Self::PublicationRecordHash => calendar::publication_record_hash(ctx),
            Self::AuthenticationRecordTime => Ok(calendar::authentication_record_time(ctx)),
            Self::AuthenticationRecordHash => calendar::authentication_record_hash(ctx),
            Self::CalendarExtendedRootHash => calendar::extended_root_hash(ctx).await,
            Self::CalendarExtendedInputHash => calendar::extended_input_hash(ctx).await,
            Self::CalendarExtendedAggregationTime => {
                calendar::extended_aggregation_time(ctx).await
            }

            Self::CalendarChainExists => Ok(publication::calendar_chain_exists(ctx)),
            Self::AuthenticationRecordExists => Ok(publication::authentication_record_exists(ctx)),
            Self::PublicationRecordExists => Ok(publication::publication_record_exists(ctx)),
            Self::ExtendingPermitted => Ok(publication::extending_permitted(ctx)),
            Self::LookupContainsSignaturePublication => {
                Ok(publication::lookup_contains_signature_publication(ctx))
            }
            Self::LookupSignaturePublicationHash => {
                Ok(publication::lookup_signature_publication_hash(ctx))
            }
            Self::LookupContainsNewerPublication => {
                Ok(publication::lookup_contains_newer_publication(ctx))
            }
            Self::ExtendedToLookupRootHash => {
                publication::extended_root_hash(ctx, publication::Target::Lookup).await
            }
            Self::ExtendedToLookupTime => {
                publication::extended_time(ctx, publication::Target::Lookup).await
            }
            Self::ExtendedToLookupInputHash => {
                publication::extended_input_hash(ctx, publication::Target::Lookup).await
            }
            Self::UserPublicationExists => Ok(publication::user_publication_exists(ctx)),
            Self::UserPublicationTimeMatches => Ok(publication::user_publication_time_matches(ctx)),
            Self::UserPublicationHash => Ok(publication::user_publication_hash(ctx)),
            Self::UserPublicationNewer => Ok(publication::user_publication_newer(ctx)),
            Self::ExtendedToUserRootHash => {
                publication::extended_root_hash(ctx, publication::Target::User).await
            }
            Self::ExtendedToUserTime => {
                publication::extended_time(ctx, publication::Target::User).await
            }
            Self::ExtendedToUserInputHash => {
                publication::extended_input_hash(ctx, publication::Target::User).await
            }

            Self::CertificateExists => Ok(key::certificate_exists(ctx)),
            Self::CertificateValidity => Ok(key::certificate_validity(ctx)),
            Self::AuthenticationRecordSignature => Ok(key::authentication_record_signature(ctx)),
        }
    }
}

/// Fetch an extended calendar chain, mapping collaborator failures to
/// `None`. Fatal errors propagate.
async fn extended_chain(
    ctx: &VerificationContext<'_>,
    publication_time: Option<DateTime<Utc>>,
) -> Result<Option<Arc<CalendarHashChain>>, VerificationError> {
    Ok(ctx.extended_calendar_chain(publication_time).await?.ok())
}
