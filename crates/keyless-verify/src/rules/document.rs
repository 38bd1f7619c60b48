//! Checks against the document supplied by the caller.

use super::Verdict;
use crate::context::VerificationContext;

pub(super) fn hash_algorithm(ctx: &VerificationContext<'_>) -> Verdict {
    ctx.document_hash().map_or(Verdict::Na, |document| {
        Verdict::from_check(document.algorithm() == ctx.signature().input_hash().algorithm())
    })
}

pub(super) fn hash(ctx: &VerificationContext<'_>) -> Verdict {
    ctx.document_hash().map_or(Verdict::Na, |document| {
        Verdict::from_check(document == ctx.signature().input_hash())
    })
}

pub(super) fn input_level(ctx: &VerificationContext<'_>) -> Verdict {
    let level = ctx.input_level();
    if level == 0 {
        return Verdict::Ok;
    }
    let first_correction = ctx.signature().first_chain().links[0].level_correction;
    Verdict::from_check(level <= first_correction)
}
