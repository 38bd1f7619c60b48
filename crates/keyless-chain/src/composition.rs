//! Building new signatures from existing ones.
//!
//! Both operations are pure: they take a signature by reference and return
//! a new one, leaving the input untouched.

use crate::engine::{calculate_chain_index, compute_output};
use crate::error::ChainError;
use crate::model::{AggregationHashChain, Signature};

/// Insert `chain` below the bottom aggregation chain of `signature`.
///
/// The new chain must end at the existing bottom input hash, and its output
/// level must fit inside the level correction of the existing first link.
/// That correction is reduced by the new chain's output level, so the full
/// sequence still folds to the same root. The new chain takes the existing
/// bottom chain's aggregation time, and its index is the existing index
/// plus one element derived from its own link directions.
pub fn prepend_chain(
    signature: &Signature,
    chain: &AggregationHashChain,
) -> Result<Signature, ChainError> {
    if chain.links.is_empty() {
        return Err(ChainError::PrependRejected("it has no links".to_owned()));
    }

    let bottom = signature.first_chain();
    let prepended = compute_output(chain, 0)?;
    let first_correction = bottom.links[0].level_correction;

    if prepended.output_level > first_correction {
        return Err(ChainError::PrependRejected(format!(
            "its output level ({}) is bigger than level correction of the first link of the \
             first aggregation hash chain of the base signature ({first_correction})",
            prepended.output_level
        )));
    }
    if prepended.output_hash != bottom.input_hash {
        return Err(ChainError::PrependRejected(format!(
            "its output hash ({}) does not match base signature input hash ({})",
            prepended.output_hash, bottom.input_hash
        )));
    }

    let mut chain_index = bottom.chain_index.clone();
    chain_index.push(calculate_chain_index(&chain.links)?);
    let new_bottom = AggregationHashChain {
        input_hash: chain.input_hash.clone(),
        aggregation_time: bottom.aggregation_time,
        chain_index,
        links: chain.links.clone(),
        algorithm: chain.algorithm,
    };

    let mut parts = signature.clone().into_parts();
    parts.aggregation_chains[0].links[0].level_correction =
        first_correction - prepended.output_level;
    parts.aggregation_chains.insert(0, new_bottom);

    tracing::debug!(
        output_level = prepended.output_level,
        chains = parts.aggregation_chains.len(),
        "prepended aggregation hash chain"
    );
    Signature::new(parts)
}

/// Account for a document hash that sits `level` levels above the leaves by
/// adding `level` to the first link's level correction.
pub fn apply_input_level(signature: &Signature, level: u64) -> Result<Signature, ChainError> {
    if level == 0 {
        return Ok(signature.clone());
    }
    let mut parts = signature.clone().into_parts();
    let first = &mut parts.aggregation_chains[0].links[0];
    first.level_correction = first.level_correction.checked_add(level).ok_or_else(|| {
        ChainError::ChainComputation(format!("level correction overflows adding {level}"))
    })?;
    Signature::new(parts)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::hashing::{DataHash, HashAlgorithm};
    use crate::model::{CalendarHashChain, ChainLink, SignatureParts};

    fn hash(data: &[u8]) -> DataHash {
        HashAlgorithm::Sha256.digest(data).expect("sha256")
    }

    fn time(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid time")
    }

    /// A local two-leaf tree under `doc`, plus a signature whose bottom
    /// chain starts at that tree's root with a level correction of `slack`.
    fn fixture(slack: u64) -> (AggregationHashChain, Signature) {
        let local = AggregationHashChain {
            input_hash: hash(b"doc"),
            aggregation_time: time(0),
            chain_index: vec![],
            links: vec![ChainLink::left(hash(b"neighbour"), 0)],
            algorithm: HashAlgorithm::Sha256,
        };
        let root = compute_output(&local, 0).expect("fold").output_hash;

        let bottom = AggregationHashChain {
            input_hash: root,
            aggregation_time: time(1_500_000_000),
            chain_index: vec![1, 5],
            links: vec![
                ChainLink::right(hash(b"a"), slack),
                ChainLink::left(hash(b"b"), 0),
            ],
            algorithm: HashAlgorithm::Sha256,
        };
        let calendar = CalendarHashChain {
            input_hash: compute_output(&bottom, 0).expect("fold").output_hash,
            aggregation_time: time(1_500_000_000),
            publication_time: time(1_500_000_000),
            links: vec![],
        };
        let signature = Signature::new(SignatureParts {
            aggregation_chains: vec![bottom],
            calendar_chain: Some(calendar),
            ..Default::default()
        })
        .expect("signature");
        (local, signature)
    }

    #[test]
    fn prepend_preserves_root() {
        let (local, signature) = fixture(3);
        let original_root =
            compute_output(&signature.aggregation_chains()[0], 0).expect("fold").output_hash;

        let extended = prepend_chain(&signature, &local).expect("prepend");
        let chains = extended.aggregation_chains();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].input_hash, hash(b"doc"));
        assert_eq!(chains[0].aggregation_time, time(1_500_000_000));
        assert_eq!(chains[0].chain_index, vec![1, 5, 0b11]);
        assert_eq!(chains[1].links[0].level_correction, 2);

        let lower = compute_output(&chains[0], 0).expect("fold");
        let upper = compute_output(&chains[1], lower.output_level).expect("fold");
        assert_eq!(upper.output_hash, original_root);
        assert_eq!(extended.calendar_chain(), signature.calendar_chain());
    }

    #[test]
    fn prepend_does_not_touch_input() {
        let (local, signature) = fixture(1);
        let before = signature.clone();
        prepend_chain(&signature, &local).expect("prepend");
        assert_eq!(signature, before);
    }

    #[test]
    fn prepend_rejects_level_beyond_correction() {
        let (local, signature) = fixture(0);
        let err = prepend_chain(&signature, &local).unwrap_err();
        assert!(matches!(err, ChainError::PrependRejected(_)));
        assert!(err.to_string().contains("output level (1)"));
    }

    #[test]
    fn prepend_rejects_mismatched_output() {
        let (mut local, signature) = fixture(3);
        local.input_hash = hash(b"other document");
        let err = prepend_chain(&signature, &local).unwrap_err();
        assert!(err.to_string().contains("does not match base signature input hash"));
    }

    #[test]
    fn input_level_adds_to_first_link_only() {
        let (_, signature) = fixture(1);
        let leveled = apply_input_level(&signature, 4).expect("level");
        let chain = &leveled.aggregation_chains()[0];
        assert_eq!(chain.links[0].level_correction, 5);
        assert_eq!(chain.links[1].level_correction, 0);
        assert_eq!(chain.input_hash, signature.aggregation_chains()[0].input_hash);
        assert_eq!(chain.chain_index, signature.aggregation_chains()[0].chain_index);
    }

    #[test]
    fn zero_input_level_is_identity() {
        let (_, signature) = fixture(1);
        assert_eq!(apply_input_level(&signature, 0).expect("level"), signature);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Prepending a chain that fits keeps the folded root unchanged,
            /// whatever slack the base signature leaves.
            #[test]
            fn prepend_inverse_law(slack in 0..40_u64, depth in 1..6_u8) {
                let local = AggregationHashChain {
                    input_hash: HashAlgorithm::Sha256.digest(&[depth]).unwrap(),
                    aggregation_time: time(0),
                    chain_index: vec![],
                    links: (0..depth)
                        .map(|i| ChainLink::right(HashAlgorithm::Sha256.digest(&[i]).unwrap(), 0))
                        .collect(),
                    algorithm: HashAlgorithm::Sha256,
                };
                let (_, signature) = fixture(slack + u64::from(depth));
                let mut parts = signature.into_parts();
                parts.aggregation_chains[0].input_hash = compute_output(&local, 0).unwrap().output_hash;
                let base = Signature::new(parts).unwrap();

                let root_before = compute_output(&base.aggregation_chains()[0], 0).unwrap();
                let composed = prepend_chain(&base, &local).unwrap();
                let lower = compute_output(&composed.aggregation_chains()[0], 0).unwrap();
                let upper = compute_output(&composed.aggregation_chains()[1], lower.output_level).unwrap();
                prop_assert_eq!(upper.output_hash, root_before.output_hash);
                prop_assert_eq!(upper.output_level, root_before.output_level);
            }
        }
    }
}
