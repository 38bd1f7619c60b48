//! CLI subcommands.

#[expect(
    unreachable_pub,
    reason = "binary crate: pub inside private module is fine"
)]
pub mod extend;
#[expect(
    unreachable_pub,
    reason = "binary crate: pub inside private module is fine"
)]
pub mod inspect;
#[expect(
    unreachable_pub,
    reason = "binary crate: pub inside private module is fine"
)]
pub mod prepend;
#[expect(
    unreachable_pub,
    reason = "binary crate: pub inside private module is fine"
)]
pub mod verify;

use std::path::Path;

use color_eyre::eyre::{Result, eyre};
use keyless_chain::Signature;

/// Read and structurally validate a signature document.
pub(crate) fn read_signature(path: &Path) -> Result<Signature> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read signature `{}`: {e}", path.display()))?;
    serde_json::from_str(&json).map_err(|e| eyre!("invalid signature `{}`: {e}", path.display()))
}

/// Write `signature` as pretty JSON to `output`, or to stdout.
pub(crate) fn write_signature(signature: &Signature, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(signature)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .map_err(|e| eyre!("cannot write `{}`: {e}", path.display()))?;
            tracing::info!(path = %path.display(), "signature written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
