//! Calendar chain, calendar record and calendar database checks.

use keyless_chain::engine::{self, aggregate_output, calendar_output};

use super::{Verdict, extended_chain};
use crate::context::VerificationContext;
use crate::error::VerificationError;

pub(super) fn input_hash(ctx: &VerificationContext<'_>) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let Some(calendar) = signature.calendar_chain() else {
        return Ok(Verdict::Na);
    };
    let root = aggregate_output(signature.aggregation_chains())?.output_hash;
    Ok(Verdict::from_check(root == calendar.input_hash))
}

pub(super) fn aggregation_time(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    signature.calendar_chain().map_or(Verdict::Na, |calendar| {
        Verdict::from_check(calendar.aggregation_time == signature.aggregation_time())
    })
}

/// A chain whose shape cannot be walked fails the same way as one that
/// registers the wrong second.
pub(super) fn registration_time(ctx: &VerificationContext<'_>) -> Verdict {
    ctx.signature()
        .calendar_chain()
        .map_or(Verdict::Na, |calendar| {
            match engine::registration_time(calendar) {
                Ok(registered) => Verdict::from_check(registered == calendar.aggregation_time),
                Err(e) => {
                    tracing::debug!(error = %e, "calendar chain shape unusable");
                    Verdict::Fail
                }
            }
        })
}

pub(super) fn algorithm_obsolete(ctx: &VerificationContext<'_>) -> Verdict {
    ctx.signature()
        .calendar_chain()
        .map_or(Verdict::Na, |calendar| {
            Verdict::from_check(
                calendar
                    .links
                    .iter()
                    .all(|link| !link.sibling.algorithm().is_obsolete(calendar.publication_time)),
            )
        })
}

pub(super) fn publication_record_time(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    match (signature.calendar_chain(), signature.publication_record()) {
        (Some(calendar), Some(record)) => Verdict::from_check(
            record.publication_data.publication_time == calendar.publication_time,
        ),
        _ => Verdict::Na,
    }
}

pub(super) fn publication_record_hash(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let (Some(calendar), Some(record)) = (signature.calendar_chain(), signature.publication_record())
    else {
        return Ok(Verdict::Na);
    };
    let root = calendar_output(calendar)?;
    Ok(Verdict::from_check(record.publication_data.published_hash == root))
}

pub(super) fn authentication_record_time(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    match (signature.calendar_chain(), signature.authentication_record()) {
        (Some(calendar), Some(record)) => Verdict::from_check(
            record.publication_data.publication_time == calendar.publication_time,
        ),
        _ => Verdict::Na,
    }
}

pub(super) fn authentication_record_hash(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let (Some(calendar), Some(record)) =
        (signature.calendar_chain(), signature.authentication_record())
    else {
        return Ok(Verdict::Na);
    };
    let root = calendar_output(calendar)?;
    Ok(Verdict::from_check(record.publication_data.published_hash == root))
}

// ── Calendar database ───────────────────────────────────────────────

/// The extended chain must reach the root the signature's own calendar
/// chain reaches.
pub(super) async fn extended_root_hash(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let Some(calendar) = ctx.signature().calendar_chain() else {
        return Ok(Verdict::Na);
    };
    let Some(extended) = extended_chain(ctx, Some(calendar.publication_time)).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    Ok(Verdict::from_check(
        calendar_output(&extended)? == calendar_output(calendar)?,
    ))
}

pub(super) async fn extended_input_hash(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let Some(extended) = extended_chain(ctx, signature.publication_time()).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    let root = aggregate_output(signature.aggregation_chains())?.output_hash;
    Ok(Verdict::from_check(extended.input_hash == root))
}

pub(super) async fn extended_aggregation_time(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let Some(extended) = extended_chain(ctx, signature.publication_time()).await? else {
        return Ok(Verdict::AnchorUnavailable);
    };
    Ok(Verdict::from_check(
        extended.aggregation_time == signature.aggregation_time(),
    ))
}
