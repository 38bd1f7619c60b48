//! Keyless CLI for checking and reshaping keyless signatures.
//!
//! All inputs (signatures, chains, publications files, calendar archives)
//! are JSON documents.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

/// Keyless signature toolkit.
///
/// Verifies signatures against built-in policies and builds derived
/// signatures that are checked before they are written.
#[derive(Parser)]
#[command(name = "keyless", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Verify a signature against a policy.
    Verify(commands::verify::VerifyArgs),
    /// Display a signature's chains with recomputed outputs.
    Inspect(commands::inspect::InspectArgs),
    /// Prepend a locally built aggregation chain to a signature.
    Prepend(commands::prepend::PrependArgs),
    /// Extend a signature to a publication using a calendar archive.
    Extend(commands::extend::ExtendArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so command output stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Verify(args) => commands::verify::execute(args).await,
        Commands::Inspect(args) => commands::inspect::execute(&args),
        Commands::Prepend(args) => commands::prepend::execute(args).await,
        Commands::Extend(args) => commands::extend::execute(args).await,
    }
}
