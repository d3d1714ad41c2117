//! # Artifact Subcommand
//!
//! `digest` hashes any file with the streaming SHA-256 used for artifact
//! records. `inspect` prints the record for a file in the selected build's
//! directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use cosa_build::BuildConfig;
use cosa_core::sha256_file;

use crate::Selection;

/// Arguments for `cosa-meta artifact`.
#[derive(Args, Debug)]
pub struct ArtifactArgs {
    #[command(subcommand)]
    pub command: ArtifactCommand,
}

/// Artifact subcommands.
#[derive(Subcommand, Debug)]
pub enum ArtifactCommand {
    /// Print the SHA-256 of a file.
    Digest {
        /// File to hash.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the artifact record (path, sha256, size) of a build output.
    Inspect {
        /// File name relative to the build directory.
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// Execute the artifact subcommand.
pub fn run_artifact(
    args: &ArtifactArgs,
    config: &BuildConfig,
    selection: &Selection,
    out: &mut dyn Write,
) -> Result<u8> {
    match &args.command {
        ArtifactCommand::Digest { file } => cmd_digest(file, out),
        ArtifactCommand::Inspect { name } => {
            let build = crate::open_build(config, selection)?;
            let record = build.artifact_meta(Some(name))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
            Ok(0)
        }
    }
}

fn cmd_digest(file: &Path, out: &mut dyn Write) -> Result<u8> {
    if !file.is_file() {
        bail!("file not found: {}", file.display());
    }
    let digest =
        sha256_file(file).with_context(|| format!("failed to hash {}", file.display()))?;
    writeln!(out, "{digest}  {}", file.display())?;
    Ok(0)
}
