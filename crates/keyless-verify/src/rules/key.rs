//! PKI checks over the calendar authentication record.

use keyless_chain::CalendarAuthenticationRecord;
use keyless_chain::tlv::encode_publication_data;

use super::Verdict;
use crate::certificate::Certificate;
use crate::context::VerificationContext;

/// The authentication record and its certificate, when both are at hand.
/// A lookup that lacks the certificate is reported as `Err(Fail)`.
fn record_and_certificate<'c>(
    ctx: &'c VerificationContext<'_>,
) -> Result<(&'c CalendarAuthenticationRecord, &'c dyn Certificate), Verdict> {
    let record = ctx.signature().authentication_record().ok_or(Verdict::Na)?;
    let lookup = ctx.publications().ok_or(Verdict::AnchorUnavailable)?;
    let certificate = lookup
        .find_certificate(&record.signature_data.certificate_id)
        .ok_or_else(|| {
            tracing::debug!(
                certificate_id = %hex::encode(&record.signature_data.certificate_id),
                "certificate not found"
            );
            Verdict::Fail
        })?;
    Ok((record, certificate))
}

pub(super) fn certificate_exists(ctx: &VerificationContext<'_>) -> Verdict {
    match record_and_certificate(ctx) {
        Ok(_) => Verdict::Ok,
        Err(verdict) => verdict,
    }
}

/// Only a certificate that exists can be judged; a missing one is left to
/// [`certificate_exists`].
pub(super) fn certificate_validity(ctx: &VerificationContext<'_>) -> Verdict {
    match record_and_certificate(ctx) {
        Ok((_, certificate)) => {
            Verdict::from_check(certificate.is_valid_at(ctx.signature().aggregation_time()))
        }
        Err(Verdict::Fail) => Verdict::Na,
        Err(verdict) => verdict,
    }
}

pub(super) fn authentication_record_signature(ctx: &VerificationContext<'_>) -> Verdict {
    match record_and_certificate(ctx) {
        Ok((record, certificate)) => match encode_publication_data(&record.publication_data) {
            Ok(signed) => Verdict::from_check(certificate.verify_signature(
                &record.signature_data.signature_type,
                &signed,
                &record.signature_data.signature_value,
            )),
            Err(err) => {
                tracing::debug!(%err, "authentication record has no signed form");
                Verdict::Fail
            }
        },
        Err(Verdict::Fail) => Verdict::Na,
        Err(verdict) => verdict,
    }
}
