//! The `keyless verify` subcommand.
//!
//! Verifies a signature against a built-in policy, walking its fallbacks.

use std::path::PathBuf;
use std::process;

use chrono::DateTime;
use clap::Args;
use color_eyre::eyre::{Result, eyre};
use keyless_chain::{DataHash, PublicationData};
use keyless_verify::{
    InMemoryExtender, InMemoryPublications, PolicyKind, RuleStatus, VerificationContext,
    VerificationResult, Verifier, VerifierConfig,
};

use super::read_signature;

/// Arguments for `keyless verify`.
#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the signature JSON file.
    pub signature: PathBuf,

    /// Policy to verify with (internal, key-based, publications-file,
    /// user-publication, calendar-based, default).
    #[arg(long, value_name = "NAME")]
    pub policy: Option<String>,

    /// Hex imprint of the signed document's hash.
    #[arg(long, value_name = "IMPRINT")]
    pub document_hash: Option<DataHash>,

    /// Level of the document in the local aggregation tree.
    #[arg(long, value_name = "LEVEL", default_value_t = 0)]
    pub input_level: u64,

    /// Publications file with trusted publications and certificates.
    #[arg(long, value_name = "PATH")]
    pub publications: Option<PathBuf>,

    /// Calendar archive to extend from. Implies extending is allowed.
    #[arg(long, value_name = "PATH")]
    pub calendar: Option<PathBuf>,

    /// Time of a trusted publication, in Unix seconds.
    #[arg(long, value_name = "SECS", requires = "user_publication_hash")]
    pub user_publication_time: Option<i64>,

    /// Hex imprint of the trusted publication's hash.
    #[arg(long, value_name = "IMPRINT", requires = "user_publication_time")]
    pub user_publication_hash: Option<DataHash>,

    /// Configuration file (defaults to the standard locations).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output results as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the verify command.
pub async fn execute(args: VerifyArgs) -> Result<()> {
    let config = VerifierConfig::load(args.config.as_deref())?;
    let kind = match &args.policy {
        Some(name) => name.parse::<PolicyKind>()?,
        None => config.policy,
    };

    let signature = read_signature(&args.signature)?;

    let publications = args
        .publications
        .as_ref()
        .or(config.publications_file.as_ref())
        .map(|path| InMemoryPublications::from_file(path))
        .transpose()?;
    let extending_allowed = config.extending_allowed || args.calendar.is_some();
    let extender = args
        .calendar
        .as_ref()
        .or(config.calendar_archive.as_ref())
        .map(|path| InMemoryExtender::from_file(path))
        .transpose()?;

    let user_publication = match (args.user_publication_time, args.user_publication_hash) {
        (Some(secs), Some(published_hash)) => Some(PublicationData {
            publication_time: DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| eyre!("user publication time {secs} is out of range"))?,
            published_hash,
        }),
        _ => None,
    };

    let mut builder = VerificationContext::builder(&signature)
        .input_level(args.input_level)
        .extending_allowed(extending_allowed)
        .extension_timeout(config.extension_timeout());
    if let Some(hash) = args.document_hash {
        builder = builder.document_hash(hash);
    }
    if let Some(publication) = user_publication {
        builder = builder.user_publication(publication);
    }
    if let Some(lookup) = &publications {
        builder = builder.publications(lookup);
    }
    if let Some(archive) = &extender {
        builder = builder.extender(archive);
    }
    let ctx = builder.build();

    tracing::info!(policy = kind.name(), "verifying signature");
    let result = Verifier::new(kind.policy()).verify(&ctx).await?;

    if args.json {
        let json_report = serde_json::json!({
            "passed": result.is_ok(),
            "error_code": result.error_code(),
            "result": result,
        });
        println!("{}", serde_json::to_string_pretty(&json_report)?);
    } else {
        print_report(&result);
    }

    if !result.is_ok() {
        process::exit(1);
    }

    Ok(())
}

fn print_report(result: &VerificationResult) {
    for outcome in result.policy_outcomes() {
        println!("Policy {}: {}", outcome.policy, outcome.state);
        for rule_result in &outcome.rule_results {
            let icon = match rule_result.status {
                RuleStatus::Ok => "PASS",
                RuleStatus::Fail => "FAIL",
                RuleStatus::Na => "SKIP",
            };
            match rule_result.code {
                Some(code) => println!(
                    "[{icon}] {} ({code}: {})",
                    rule_result.rule,
                    code.message()
                ),
                None => println!("[{icon}] {}", rule_result.rule),
            }
        }
    }

    println!();
    if result.is_ok() {
        println!("Verification PASSED");
    } else {
        println!("Verification FAILED");
        println!("{}", result.summary());
    }
}
