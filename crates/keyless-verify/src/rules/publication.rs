//! Trust anchors: records carried by the signature, publications from the
//! lookup or the user, and chains extended to those publications.

use keyless_chain::PublicationData;
use keyless_chain::engine::{aggregate_output, calendar_output};

use super::{Verdict, extended_chain};
use crate::context::VerificationContext;
use crate::error::VerificationError;

/// Where the publication a signature is extended to comes from.
#[derive(Debug, Clone, Copy)]
pub(super) enum Target {
    /// The first lookup publication at or after the aggregation time.
    Lookup,
    /// The publication supplied by the user.
    User,
}

impl Target {
    fn publication<'c>(self, ctx: &'c VerificationContext<'_>) -> Option<&'c PublicationData> {
        match self {
            Self::Lookup => ctx
                .publications()?
                .find_publication_after(ctx.signature().aggregation_time())
                .map(|record| &record.publication_data),
            Self::User => ctx.user_publication(),
        }
    }
}

const fn anchored(present: bool) -> Verdict {
    if present { Verdict::Ok } else { Verdict::AnchorUnavailable }
}

pub(super) fn calendar_chain_exists(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(ctx.signature().calendar_chain().is_some())
}

pub(super) fn authentication_record_exists(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(ctx.signature().authentication_record().is_some())
}

pub(super) fn publication_record_exists(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(ctx.signature().publication_record().is_some())
}

pub(super) fn extending_permitted(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(ctx.can_extend())
}

// ── Publications lookup ─────────────────────────────────────────────

pub(super) fn lookup_contains_signature_publication(ctx: &VerificationContext<'_>) -> Verdict {
    let found = ctx
        .publications()
        .zip(ctx.signature().publication_record())
        .and_then(|(lookup, record)| {
            lookup.find_publication(record.publication_data.publication_time)
        });
    anchored(found.is_some())
}

pub(super) fn lookup_signature_publication_hash(ctx: &VerificationContext<'_>) -> Verdict {
    let (Some(lookup), Some(record)) = (ctx.publications(), ctx.signature().publication_record())
    else {
        return Verdict::AnchorUnavailable;
    };
    lookup
        .find_publication(record.publication_data.publication_time)
        .map_or(Verdict::AnchorUnavailable, |trusted| {
            Verdict::from_check(
                trusted.publication_data.published_hash == record.publication_data.published_hash,
            )
        })
}

pub(super) fn lookup_contains_newer_publication(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(Target::Lookup.publication(ctx).is_some())
}

// ── User publication ────────────────────────────────────────────────

pub(super) fn user_publication_exists(ctx: &VerificationContext<'_>) -> Verdict {
    anchored(ctx.user_publication().is_some())
}

/// A user publication at another time than the signature's own cannot be
/// compared directly; the extending policy has to take over.
pub(super) fn user_publication_time_matches(ctx: &VerificationContext<'_>) -> Verdict {
    let matches = ctx
        .user_publication()
        .zip(ctx.signature().publication_record())
        .is_some_and(|(user, record)| {
            user.publication_time == record.publication_data.publication_time
        });
    anchored(matches)
}

pub(super) fn user_publication_hash(ctx: &VerificationContext<'_>) -> Verdict {
    match (ctx.user_publication(), ctx.signature().publication_record()) {
        (Some(user), Some(record))
            if user.publication_time == record.publication_data.publication_time =>
        {
            Verdict::from_check(user.published_hash == record.publication_data.published_hash)
        }
        _ => Verdict::AnchorUnavailable,
    }
}

pub(super) fn user_publication_newer(ctx: &VerificationContext<'_>) -> Verdict {
    let aggregation_time = ctx.signature().aggregation_time();
    anchored(
        ctx.user_publication()
            .is_some_and(|user| user.publication_time > aggregation_time),
    )
}

// ── Extension to a publication ──────────────────────────────────────

pub(super) async fn extended_root_hash(
    ctx: &VerificationContext<'_>,
    target: Target,
) -> Result<Verdict, VerificationError> {
    let Some(publication) = target.publication(ctx) else {
        return Ok(Verdict::AnchorUnavailable);
    };
    let Some(extended) = extended_chain(ctx, Some(publication.publication_time)).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    Ok(Verdict::from_check(
        calendar_output(&extended)? == publication.published_hash,
    ))
}

pub(super) async fn extended_time(
    ctx: &VerificationContext<'_>,
    target: Target,
) -> Result<Verdict, VerificationError> {
    let Some(publication) = target.publication(ctx) else {
        return Ok(Verdict::AnchorUnavailable);
    };
    let Some(extended) = extended_chain(ctx, Some(publication.publication_time)).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    Ok(Verdict::from_check(
        extended.publication_time == publication.publication_time
            && extended.aggregation_time == ctx.signature().aggregation_time(),
    ))
}

pub(super) async fn extended_input_hash(
    ctx: &VerificationContext<'_>,
    target: Target,
) -> Result<Verdict, VerificationError> {
    let Some(publication) = target.publication(ctx) else {
        return Ok(Verdict::AnchorUnavailable);
    };
    let Some(extended) = extended_chain(ctx, Some(publication.publication_time)).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    let root = aggregate_output(ctx.signature().aggregation_chains())?.output_hash;
    Ok(Verdict::from_check(extended.input_hash == root))
}
