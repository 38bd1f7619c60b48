//! The `keyless inspect` subcommand.
//!
//! Displays a signature's chains together with the hashes and levels they
//! recompute to.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use color_eyre::eyre::Result;
use keyless_chain::engine::{calendar_output, compute_output, registration_time};
use keyless_chain::{LinkDirection, LinkSibling, Signature};
use serde::Serialize;

use super::read_signature;

/// Arguments for `keyless inspect`.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the signature JSON file.
    pub signature: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Extracted view of a signature.
#[derive(Debug, Serialize)]
pub struct SignatureSummary {
    /// Hash the signature was issued for.
    pub input_hash: String,
    /// Aggregation time of the bottom chain.
    pub aggregation_time: DateTime<Utc>,
    /// Aggregation chains, bottom chain first.
    pub chains: Vec<ChainSummary>,
    /// The calendar chain, if present.
    pub calendar: Option<CalendarSummary>,
    /// Which record authenticates the calendar root.
    pub record: &'static str,
    /// Whether a legacy RFC 3161 record sits below the first chain.
    pub has_rfc3161_record: bool,
}

/// One aggregation chain with its recomputed output.
#[derive(Debug, Serialize)]
pub struct ChainSummary {
    /// Hash algorithm of the chain.
    pub algorithm: String,
    /// Chain index, most significant element first.
    pub chain_index: Vec<u64>,
    /// Input hash of the chain.
    pub input_hash: String,
    /// Links as `L`/`R` with their sibling, leaf first.
    pub links: Vec<String>,
    /// Recomputed output hash, or the error that prevented it.
    pub output_hash: String,
    /// Recomputed output level.
    pub output_level: Option<u64>,
}

/// The calendar chain with its recomputed root and registration time.
#[derive(Debug, Serialize)]
pub struct CalendarSummary {
    /// Publication time the chain leads to.
    pub publication_time: DateTime<Utc>,
    /// Number of links.
    pub link_count: usize,
    /// Recomputed calendar root, or the error that prevented it.
    pub root_hash: String,
    /// Registration time encoded by the chain shape.
    pub registration_time: Option<DateTime<Utc>>,
}

/// Execute the inspect command.
pub fn execute(args: &InspectArgs) -> Result<()> {
    let signature = read_signature(&args.signature)?;
    let summary = summarize(&signature);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }

    Ok(())
}

/// Recompute every chain of `signature` and collect the results.
///
/// Recomputation errors are reported in place rather than aborting, so a
/// damaged signature can still be inspected.
pub fn summarize(signature: &Signature) -> SignatureSummary {
    let mut level = 0;
    let chains = signature
        .aggregation_chains()
        .iter()
        .map(|chain| {
            let links = chain
                .links
                .iter()
                .map(|link| {
                    let side = match link.direction {
                        LinkDirection::Left => 'L',
                        LinkDirection::Right => 'R',
                    };
                    let sibling = match &link.sibling {
                        LinkSibling::Imprint(hash) => hash.to_hex(),
                        LinkSibling::Metadata(metadata) => {
                            format!("metadata({})", metadata.client_id)
                        }
                    };
                    if link.level_correction == 0 {
                        format!("{side} {sibling}")
                    } else {
                        format!("{side} {sibling} +{}", link.level_correction)
                    }
                })
                .collect();
            let (output_hash, output_level) = match compute_output(chain, level) {
                Ok(result) => {
                    level = result.output_level;
                    (result.output_hash.to_hex(), Some(result.output_level))
                }
                Err(e) => (format!("error: {e}"), None),
            };
            ChainSummary {
                algorithm: chain.algorithm.to_string(),
                chain_index: chain.chain_index.clone(),
                input_hash: chain.input_hash.to_hex(),
                links,
                output_hash,
                output_level,
            }
        })
        .collect();

    let calendar = signature.calendar_chain().map(|chain| CalendarSummary {
        publication_time: chain.publication_time,
        link_count: chain.links.len(),
        root_hash: calendar_output(chain)
            .map_or_else(|e| format!("error: {e}"), |root| root.to_hex()),
        registration_time: registration_time(chain).ok(),
    });

    let record = if signature.publication_record().is_some() {
        "publication"
    } else if signature.authentication_record().is_some() {
        "calendar authentication"
    } else {
        "none"
    };

    SignatureSummary {
        input_hash: signature.input_hash().to_hex(),
        aggregation_time: signature.aggregation_time(),
        chains,
        calendar,
        record,
        has_rfc3161_record: signature.rfc3161_record().is_some(),
    }
}

/// Format a summary for terminal display.
pub fn format_summary(summary: &SignatureSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Keyless Signature");
    let _ = writeln!(out, "  Input hash:        {}", summary.input_hash);
    let _ = writeln!(out, "  Aggregation time:  {}", summary.aggregation_time);
    let _ = writeln!(out, "  Record:            {}", summary.record);
    if summary.has_rfc3161_record {
        let _ = writeln!(out, "  Legacy RFC 3161 record present");
    }

    for (position, chain) in summary.chains.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Aggregation chain {position} ({}, index {:?})",
            chain.algorithm, chain.chain_index
        );
        let _ = writeln!(out, "  Input:   {}", chain.input_hash);
        for link in &chain.links {
            let _ = writeln!(out, "    {link}");
        }
        match chain.output_level {
            Some(level) => {
                let _ = writeln!(out, "  Output:  {} (level {level})", chain.output_hash);
            }
            None => {
                let _ = writeln!(out, "  Output:  {}", chain.output_hash);
            }
        }
    }

    if let Some(calendar) = &summary.calendar {
        let _ = writeln!(out);
        let _ = writeln!(out, "Calendar chain ({} links)", calendar.link_count);
        let _ = writeln!(out, "  Publication time:  {}", calendar.publication_time);
        match calendar.registration_time {
            Some(time) => {
                let _ = writeln!(out, "  Registration time: {time}");
            }
            None => {
                let _ = writeln!(out, "  Registration time: malformed chain shape");
            }
        }
        let _ = writeln!(out, "  Root:              {}", calendar.root_hash);
    }

    out
}
