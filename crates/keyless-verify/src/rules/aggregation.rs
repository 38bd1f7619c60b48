//! Aggregation chain and legacy record consistency.

use keyless_chain::engine::{calculate_chain_index, compute_output};
use keyless_chain::{DataHash, LinkSibling};

use super::Verdict;
use crate::context::VerificationContext;
use crate::error::VerificationError;

pub(super) fn input_algorithm_deprecated(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    Verdict::from_check(
        !signature
            .input_hash()
            .algorithm()
            .is_deprecated(signature.aggregation_time()),
    )
}

pub(super) fn rfc3161_internal_algorithms_deprecated(ctx: &VerificationContext<'_>) -> Verdict {
    ctx.signature().rfc3161_record().map_or(Verdict::Na, |record| {
        let at = record.aggregation_time;
        Verdict::from_check(
            !record.tst_info_algorithm.is_deprecated(at)
                && !record.signed_attributes_algorithm.is_deprecated(at),
        )
    })
}

pub(super) fn rfc3161_output_algorithm_deprecated(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    signature.rfc3161_record().map_or(Verdict::Na, |record| {
        let output = signature.first_chain().input_hash.algorithm();
        Verdict::from_check(!output.is_deprecated(record.aggregation_time))
    })
}

pub(super) fn rfc3161_output_hash(
    ctx: &VerificationContext<'_>,
) -> Result<Verdict, VerificationError> {
    let signature = ctx.signature();
    let Some(record) = signature.rfc3161_record() else {
        return Ok(Verdict::Na);
    };
    let output = record.output_hash()?;
    Ok(Verdict::from_check(output == signature.first_chain().input_hash))
}

pub(super) fn rfc3161_index(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    signature.rfc3161_record().map_or(Verdict::Na, |record| {
        Verdict::from_check(record.chain_index == signature.first_chain().chain_index)
    })
}

pub(super) fn rfc3161_time(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    signature.rfc3161_record().map_or(Verdict::Na, |record| {
        Verdict::from_check(record.aggregation_time == signature.aggregation_time())
    })
}

/// A lower chain's index is its upper neighbour's index followed by the
/// element the lower chain's own links encode.
pub(super) fn index_successor(ctx: &VerificationContext<'_>) -> Result<Verdict, VerificationError> {
    for pair in ctx.signature().aggregation_chains().windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        let element = calculate_chain_index(&lower.links)?;
        let extends_upper = lower.chain_index.len() == upper.chain_index.len() + 1
            && lower.chain_index.starts_with(&upper.chain_index)
            && lower.chain_index.last() == Some(&element);
        if !extends_upper {
            tracing::debug!(
                lower = ?lower.chain_index,
                upper = ?upper.chain_index,
                element,
                "aggregation chain index does not extend upper chain index"
            );
            return Ok(Verdict::Fail);
        }
    }
    Ok(Verdict::Ok)
}

/// Metadata without padding must not read as a hash imprint; padded
/// metadata must carry one or two padding octets and have even content
/// length.
pub(super) fn metadata(ctx: &VerificationContext<'_>) -> Verdict {
    let mut seen = false;
    for chain in ctx.signature().aggregation_chains() {
        for link in &chain.links {
            let LinkSibling::Metadata(metadata) = &link.sibling else {
                continue;
            };
            seen = true;
            let well_formed = match (metadata.sibling_bytes(), metadata.padding) {
                (Err(_), _) => false,
                (Ok(content), None) => DataHash::from_imprint(&content).is_err(),
                (Ok(content), Some(1 | 2)) => content.len() % 2 == 0,
                (Ok(_), Some(_)) => false,
            };
            if !well_formed {
                tracing::debug!(client_id = %metadata.client_id, "untrusted metadata record");
                return Verdict::Fail;
            }
        }
    }
    if seen { Verdict::Ok } else { Verdict::Na }
}

pub(super) fn algorithm_deprecated(ctx: &VerificationContext<'_>) -> Verdict {
    Verdict::from_check(
        ctx.signature()
            .aggregation_chains()
            .iter()
            .all(|chain| !chain.algorithm.is_deprecated(chain.aggregation_time)),
    )
}

/// Fold the chains bottom-up, carrying levels, and require each output to
/// be the next chain's input.
pub(super) fn consistency(ctx: &VerificationContext<'_>) -> Result<Verdict, VerificationError> {
    let chains = ctx.signature().aggregation_chains();
    let mut level = 0;
    for pair in chains.windows(2) {
        let result = compute_output(&pair[0], level)?;
        if result.output_hash != pair[1].input_hash {
            return Ok(Verdict::Fail);
        }
        level = result.output_level;
    }
    Ok(Verdict::Ok)
}

pub(super) fn chain_time(ctx: &VerificationContext<'_>) -> Verdict {
    let signature = ctx.signature();
    let expected = signature.aggregation_time();
    Verdict::from_check(
        signature
            .aggregation_chains()
            .iter()
            .all(|chain| chain.aggregation_time == expected),
    )
}

pub(super) fn index(ctx: &VerificationContext<'_>) -> Result<Verdict, VerificationError> {
    for chain in ctx.signature().aggregation_chains() {
        let element = calculate_chain_index(&chain.links)?;
        if chain.chain_index.last() != Some(&element) {
            tracing::debug!(
                index = ?chain.chain_index,
                element,
                "aggregation chain index does not match chain shape"
            );
            return Ok(Verdict::Fail);
        }
    }
    Ok(Verdict::Ok)
}

#[cfg(test)]
mod tests {
    use keyless_chain::composition::prepend_chain;
    use keyless_chain::{
        AggregationHashChain, ChainLink, HashAlgorithm, IdentityMetadata, LinkDirection,
        Rfc3161Record, Signature,
    };

    use super::*;
    use crate::rules::tests::{hash, time, unanchored_signature};

    fn two_chain_signature() -> Signature {
        let sig = unanchored_signature();
        let bottom = AggregationHashChain {
            input_hash: hash(b"local document"),
            aggregation_time: sig.aggregation_time(),
            chain_index: vec![],
            links: vec![ChainLink::right(hash(b"local sibling"), 0)],
            algorithm: HashAlgorithm::Sha256,
        };
        let output = compute_output(&bottom, 0).expect("fold").output_hash;
        let mut parts = sig.into_parts();
        parts.aggregation_chains[0].input_hash = output;
        parts.aggregation_chains[0].links[0].level_correction = 1;
        parts.calendar_chain = None;
        let upper = Signature::new(parts).expect("upper");
        prepend_chain(&upper, &bottom).expect("prepend")
    }

    #[test]
    fn prepended_chains_are_consistent() {
        let sig = two_chain_signature();
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(consistency(&ctx).expect("fold"), Verdict::Ok);
        assert_eq!(index_successor(&ctx).expect("index"), Verdict::Ok);
        assert_eq!(index(&ctx).expect("index"), Verdict::Ok);
        assert_eq!(chain_time(&ctx), Verdict::Ok);
    }

    #[test]
    fn broken_hash_link_between_chains_fails() {
        let mut parts = two_chain_signature().into_parts();
        parts.aggregation_chains[1].input_hash = hash(b"elsewhere");
        let sig = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(consistency(&ctx).expect("fold"), Verdict::Fail);
    }

    #[test]
    fn index_not_extending_upper_fails() {
        let mut parts = two_chain_signature().into_parts();
        parts.aggregation_chains[0].chain_index.insert(0, 9);
        let sig = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(index_successor(&ctx).expect("index"), Verdict::Fail);
    }

    #[test]
    fn flipped_link_breaks_index() {
        let mut parts = unanchored_signature().into_parts();
        parts.aggregation_chains[0].links[0].direction = LinkDirection::Right;
        let sig = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(index(&ctx).expect("index"), Verdict::Fail);
        assert_eq!(index_successor(&ctx).expect("index"), Verdict::Ok);
    }

    #[test]
    fn mixed_aggregation_times_fail() {
        let mut parts = two_chain_signature().into_parts();
        parts.aggregation_chains[1].aggregation_time = time(99);
        let sig = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(chain_time(&ctx), Verdict::Fail);
    }

    #[test]
    fn metadata_shapes() {
        let with_metadata = |metadata: IdentityMetadata| {
            let mut parts = unanchored_signature().into_parts();
            parts.aggregation_chains[0].links[1].sibling = LinkSibling::Metadata(metadata);
            Signature::new(parts).expect("signature")
        };

        let sig = unanchored_signature();
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(metadata(&ctx), Verdict::Na);

        let sig = with_metadata(IdentityMetadata::new("client").with_padding());
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(metadata(&ctx), Verdict::Ok);

        // 30 chars plus NUL: 0x01 0x1f and 31 value bytes read as a
        // SHA-256 imprint.
        let sig = with_metadata(IdentityMetadata::new("a".repeat(30)));
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(metadata(&ctx), Verdict::Fail);
    }

    #[test]
    fn metadata_padding_must_be_one_or_two_octets() {
        let padded = |len: u8| {
            let mut sibling = IdentityMetadata::new("client");
            sibling.padding = Some(len);
            let mut parts = unanchored_signature().into_parts();
            parts.aggregation_chains[0].links[1].sibling = LinkSibling::Metadata(sibling);
            let sig = Signature::new(parts).expect("signature");
            let ctx = VerificationContext::builder(&sig).build();
            metadata(&ctx)
        };

        // "client" plus NUL gives 9 bytes of children; a 1-octet padding
        // element makes 12, a 3-octet one 14.
        assert_eq!(padded(1), Verdict::Ok);
        assert_eq!(padded(3), Verdict::Fail);
        assert_eq!(padded(0), Verdict::Fail);
    }

    #[test]
    fn sha1_input_deprecated_after_cutoff() {
        let sha1_input = |secs: i64| {
            let mut parts = unanchored_signature().into_parts();
            parts.calendar_chain = None;
            parts.aggregation_chains[0].input_hash =
                HashAlgorithm::Sha1.digest(b"doc").expect("sha1");
            parts.aggregation_chains[0].aggregation_time = time(secs);
            Signature::new(parts).expect("signature")
        };

        let sig = sha1_input(1_467_331_199);
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(input_algorithm_deprecated(&ctx), Verdict::Ok);

        let sig = sha1_input(1_467_331_200);
        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(input_algorithm_deprecated(&ctx), Verdict::Fail);
    }

    #[test]
    fn rfc3161_record_rules() {
        let sig = unanchored_signature();
        let first = sig.first_chain().clone();
        let mut record = Rfc3161Record {
            aggregation_time: first.aggregation_time,
            chain_index: first.chain_index.clone(),
            input_hash: hash(b"legacy document"),
            tst_info_prefix: vec![0x30, 0x01],
            tst_info_suffix: vec![0x02],
            tst_info_algorithm: HashAlgorithm::Sha256,
            signed_attributes_prefix: vec![0x31],
            signed_attributes_suffix: vec![],
            signed_attributes_algorithm: HashAlgorithm::Sha256,
        };

        let ctx = VerificationContext::builder(&sig).build();
        assert_eq!(rfc3161_output_hash(&ctx).expect("hash"), Verdict::Na);
        assert_eq!(rfc3161_index(&ctx), Verdict::Na);

        // Bottom chain input is not the record output.
        let mut parts = sig.clone().into_parts();
        parts.rfc3161_record = Some(record.clone());
        let mismatched = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&mismatched).build();
        assert_eq!(rfc3161_output_hash(&ctx).expect("hash"), Verdict::Fail);
        assert_eq!(rfc3161_index(&ctx), Verdict::Ok);
        assert_eq!(rfc3161_time(&ctx), Verdict::Ok);
        assert_eq!(rfc3161_internal_algorithms_deprecated(&ctx), Verdict::Ok);
        assert_eq!(rfc3161_output_algorithm_deprecated(&ctx), Verdict::Ok);

        let mut parts = sig.into_parts();
        parts.aggregation_chains[0].input_hash = record.output_hash().expect("output");
        record.chain_index = vec![1, 2];
        parts.rfc3161_record = Some(record);
        let linked = Signature::new(parts).expect("signature");
        let ctx = VerificationContext::builder(&linked).build();
        assert_eq!(rfc3161_output_hash(&ctx).expect("hash"), Verdict::Ok);
        assert_eq!(rfc3161_index(&ctx), Verdict::Fail);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_single_flip_is_caught(
                directions in proptest::collection::vec(any::<bool>(), 1..12),
                flip in any::<prop::sample::Index>(),
            ) {
                let links: Vec<ChainLink> = directions
                    .iter()
                    .enumerate()
                    .map(|(i, &left)| {
                        let sibling = hash(&i.to_be_bytes());
                        if left { ChainLink::left(sibling, 0) } else { ChainLink::right(sibling, 0) }
                    })
                    .collect();
                let element = calculate_chain_index(&links).expect("index");
                let mut parts = unanchored_signature().into_parts();
                parts.calendar_chain = None;
                parts.aggregation_chains[0].links = links;
                parts.aggregation_chains[0].chain_index = vec![element];
                let sig = Signature::new(parts.clone()).expect("signature");
                let ctx = VerificationContext::builder(&sig).build();
                prop_assert_eq!(index(&ctx).expect("index"), Verdict::Ok);

                let position = flip.index(directions.len());
                let link = &mut parts.aggregation_chains[0].links[position];
                link.direction = match link.direction {
                    LinkDirection::Left => LinkDirection::Right,
                    LinkDirection::Right => LinkDirection::Left,
                };
                let sig = Signature::new(parts).expect("signature");
                let ctx = VerificationContext::builder(&sig).build();
                prop_assert_eq!(index(&ctx).expect("index"), Verdict::Fail);
            }
        }
    }
}
