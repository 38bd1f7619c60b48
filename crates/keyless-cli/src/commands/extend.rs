//! The `keyless extend` subcommand.
//!
//! Extends a signature to a publication using a calendar archive. With a
//! publications file, the target is the earliest publication at or after
//! the signature's aggregation time; without one, the archive's most
//! recent calendar root.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::{Result, eyre};
use keyless_chain::engine::calendar_output;
use keyless_chain::{Extender, PublicationData, PublicationRecord, Signature};
use keyless_verify::{InMemoryExtender, InMemoryPublications, PublicationsLookup, SignatureFactory};

use super::{read_signature, write_signature};

/// Arguments for `keyless extend`.
#[derive(Args)]
pub struct ExtendArgs {
    /// Path to the signature JSON file.
    pub signature: PathBuf,

    /// Calendar archive serving extended chains.
    #[arg(long, value_name = "PATH")]
    pub calendar: PathBuf,

    /// Publications file to pick the target publication from.
    #[arg(long, value_name = "PATH")]
    pub publications: Option<PathBuf>,

    /// Write the extended signature here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Execute the extend command.
pub async fn execute(args: ExtendArgs) -> Result<()> {
    let signature = read_signature(&args.signature)?;
    let extender = Arc::new(InMemoryExtender::from_file(&args.calendar)?);

    let publication = match &args.publications {
        Some(path) => {
            let lookup = InMemoryPublications::from_file(path)?;
            lookup
                .find_publication_after(signature.aggregation_time())
                .cloned()
                .ok_or_else(|| {
                    eyre!(
                        "no publication at or after aggregation time {}",
                        signature.aggregation_time()
                    )
                })?
        }
        None => head_publication(&signature, extender.as_ref()).await?,
    };
    tracing::info!(
        publication_time = %publication.publication_data.publication_time,
        "extending signature"
    );

    let factory = SignatureFactory::default().with_extender(extender);
    let extended = factory.extend(&signature, &publication).await?;
    write_signature(&extended, args.output.as_deref())
}

/// Publication of the most recent calendar root the extender knows.
async fn head_publication(
    signature: &Signature,
    extender: &dyn Extender,
) -> Result<PublicationRecord> {
    let head = extender.extend(signature.aggregation_time(), None).await?;
    Ok(PublicationRecord {
        publication_data: PublicationData {
            publication_time: head.publication_time,
            published_hash: calendar_output(&head)?,
        },
        references: vec![],
        repository_uris: vec![],
    })
}
