//! The `keyless prepend` subcommand.
//!
//! Adds a locally built aggregation chain below a signature. The result is
//! verified for internal consistency before it is written.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Result, eyre};
use keyless_chain::AggregationHashChain;
use keyless_verify::SignatureFactory;

use super::{read_signature, write_signature};

/// Arguments for `keyless prepend`.
#[derive(Args)]
pub struct PrependArgs {
    /// Path to the signature JSON file.
    pub signature: PathBuf,

    /// Path to the aggregation chain JSON file to prepend.
    pub chain: PathBuf,

    /// Write the new signature here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Execute the prepend command.
pub async fn execute(args: PrependArgs) -> Result<()> {
    let signature = read_signature(&args.signature)?;
    let chain_json = std::fs::read_to_string(&args.chain)
        .map_err(|e| eyre!("cannot read chain `{}`: {e}", args.chain.display()))?;
    let chain: AggregationHashChain = serde_json::from_str(&chain_json)
        .map_err(|e| eyre!("invalid chain `{}`: {e}", args.chain.display()))?;

    let prepended = SignatureFactory::default().prepend(&signature, &chain).await?;
    write_signature(&prepended, args.output.as_deref())
}
