//! Deterministic recomputation of chain outputs.
//!
//! An aggregation step folds the running hash with a sibling:
//! `H(current || sibling || level)` for a left link and
//! `H(sibling || current || level)` for a right link, where `level` is the
//! new level in minimal big-endian form. A calendar step does the same with
//! a fixed level byte `0xFF` and the sibling's algorithm.

use chrono::{DateTime, Utc};

use crate::error::ChainError;
use crate::hashing::{DataHash, DataHasher};
use crate::model::{AggregationHashChain, CalendarHashChain, ChainLink, LinkDirection};
use crate::tlv::encode_unsigned;

/// Highest level an aggregation tree node can have.
pub const MAX_LEVEL: u64 = 0xFF;

/// Level byte appended to every calendar step.
const CALENDAR_LEVEL_BYTE: u8 = 0xFF;

/// Output of folding an aggregation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    /// Root hash the chain leads to.
    pub output_hash: DataHash,
    /// Level of that root.
    pub output_level: u64,
}

/// Fold `chain` from its input hash, starting at `start_level`.
///
/// The level after each link is `max(level, sibling level) + 1 +
/// level_correction`; sibling level is 0 for both imprint and metadata
/// siblings.
pub fn compute_output(
    chain: &AggregationHashChain,
    start_level: u64,
) -> Result<ChainResult, ChainError> {
    let mut current = chain.input_hash.clone();
    let mut level = start_level;

    for (position, link) in chain.links.iter().enumerate() {
        level = level
            .checked_add(1)
            .and_then(|l| l.checked_add(link.level_correction))
            .filter(|&l| l <= MAX_LEVEL)
            .ok_or_else(|| {
                ChainError::ChainComputation(format!(
                    "aggregation chain level exceeds {MAX_LEVEL} at link {position}"
                ))
            })?;

        let sibling = link.sibling.sibling_bytes()?;
        let mut hasher = DataHasher::new(chain.algorithm)?;
        match link.direction {
            LinkDirection::Left => hasher.add_imprint(&current).update(&sibling),
            LinkDirection::Right => hasher.update(&sibling).add_imprint(&current),
        };
        hasher.update(&encode_unsigned(level));
        current = hasher.finish();
    }

    Ok(ChainResult {
        output_hash: current,
        output_level: level,
    })
}

/// Fold a stack of chains bottom-up, each starting at the level the
/// previous one reached. Chain-to-chain hash continuity is not checked.
pub fn aggregate_output(chains: &[AggregationHashChain]) -> Result<ChainResult, ChainError> {
    let Some((first, rest)) = chains.split_first() else {
        return Err(ChainError::ChainComputation(
            "no aggregation hash chains to fold".to_owned(),
        ));
    };
    rest.iter()
        .try_fold(compute_output(first, 0)?, |previous, chain| {
            compute_output(chain, previous.output_level)
        })
}

/// Index element a chain contributes when stacked below another chain.
///
/// Starting from 1, walk the links from last to first: shift left, and set
/// the low bit for left links.
pub fn calculate_chain_index(links: &[ChainLink]) -> Result<u64, ChainError> {
    if links.len() >= 64 {
        return Err(ChainError::ChainComputation(format!(
            "chain of {} links does not fit a 64-bit index",
            links.len()
        )));
    }
    Ok(links
        .iter()
        .rev()
        .fold(1_u64, |index, link| (index << 1) | u64::from(link.is_left())))
}

/// Fold a calendar chain to its root hash.
pub fn calendar_output(chain: &CalendarHashChain) -> Result<DataHash, ChainError> {
    let mut current = chain.input_hash.clone();
    for link in &chain.links {
        let mut hasher = DataHasher::new(link.sibling.algorithm())?;
        match link.direction {
            LinkDirection::Left => hasher.add_imprint(&current).add_imprint(&link.sibling),
            LinkDirection::Right => hasher.add_imprint(&link.sibling).add_imprint(&current),
        };
        hasher.update(&[CALENDAR_LEVEL_BYTE]);
        current = hasher.finish();
    }
    Ok(current)
}

fn high_bit(value: u64) -> u64 {
    1 << (63 - value.leading_zeros())
}

/// Registration time encoded by the shape of a calendar chain.
///
/// The calendar is a binary tree over seconds since the epoch; walking the
/// links from the root down, a right link steps over a complete left
/// subtree and a left link descends into one. A well-formed chain consumes
/// the publication time exactly.
pub fn registration_time(chain: &CalendarHashChain) -> Result<DateTime<Utc>, ChainError> {
    let mut remaining = u64::try_from(chain.publication_time.timestamp()).map_err(|_| {
        ChainError::ChainComputation("publication time precedes the epoch".to_owned())
    })?;
    let mut registered: u64 = 0;

    for link in chain.links.iter().rev() {
        if remaining == 0 {
            return Err(ChainError::ChainComputation(
                "calendar chain is longer than its publication time allows".to_owned(),
            ));
        }
        let bit = high_bit(remaining);
        match link.direction {
            LinkDirection::Left => remaining = bit - 1,
            LinkDirection::Right => {
                registered += bit;
                remaining -= bit;
            }
        }
    }

    if remaining != 0 {
        return Err(ChainError::ChainComputation(
            "calendar chain is shorter than its publication time requires".to_owned(),
        ));
    }

    i64::try_from(registered)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ChainError::ChainComputation("registration time out of range".to_owned()))
}

/// Whether every right link of `older` appears, in order and by value, as
/// a leading subsequence of the right links of `newer`.
pub fn right_links_consistent(older: &CalendarHashChain, newer: &CalendarHashChain) -> bool {
    let mut newer_right = newer.right_links();
    older
        .right_links()
        .all(|old| newer_right.next().is_some_and(|new| new.sibling == old.sibling))
}
