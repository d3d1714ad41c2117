//! # cosa-meta CLI entry point
//!
//! Parses command-line arguments, installs logging, and dispatches to the
//! subcommand handlers. Fatal errors print `error: ...` and exit 1.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cosa_cli::artifact::{run_artifact, ArtifactArgs};
use cosa_cli::meta::{run_get, run_set, run_show, GetArgs, SetArgs, ShowArgs};
use cosa_cli::{load_config, open_build, Selection};

/// Inspect and update OS-image build metadata.
#[derive(Parser, Debug)]
#[command(name = "cosa-meta", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    selection: Selection,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print one of the build's metadata documents.
    Show(ShowArgs),

    /// Look up a field in a metadata document.
    Get(GetArgs),

    /// Merge fields into meta.json and write it atomically.
    Set(SetArgs),

    /// Artifact digests and records.
    Artifact(ArtifactArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("cosa-meta v{} starting", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let code = match &cli.command {
        Commands::Artifact(args) => run_artifact(args, &config, &cli.selection, &mut out)?,
        Commands::Show(args) => run_show(args, &mut open_build(&config, &cli.selection)?, &mut out)?,
        Commands::Get(args) => run_get(args, &mut open_build(&config, &cli.selection)?, &mut out)?,
        Commands::Set(args) => run_set(args, &mut open_build(&config, &cli.selection)?, &mut out)?,
    };
    out.flush()?;
    Ok(code)
}
