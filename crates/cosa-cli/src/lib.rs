//! # cosa-cli — Build Metadata CLI
//!
//! Provides the `cosa-meta` command-line interface over `cosa-build`.
//!
//! ## Subcommands
//!
//! - `cosa-meta show`: print one of a build's documents.
//! - `cosa-meta get`: soft field lookup.
//! - `cosa-meta set`: merge fields into `meta.json` and flush atomically.
//! - `cosa-meta artifact`: file digests and artifact records.
//!
//! ```bash
//! cosa-meta --build latest get meta ostree-commit
//! cosa-meta set coreos-assembler.delayed-meta-merge=true
//! cosa-meta artifact inspect fedora-coreos-35.20220101.0-qemu.x86_64.qcow2
//! ```

pub mod artifact;
pub mod meta;

use std::path::Path;

use anyhow::{Context, Result};
use cosa_build::{Build, BuildConfig, BuildOptions, BuildsJson};

/// Build selection flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct Selection {
    /// Build id, or `latest`.
    #[arg(long, global = true, default_value = "latest")]
    pub build: String,

    /// Architecture override (defaults to the host's).
    #[arg(long, global = true)]
    pub arch: Option<String>,
}

/// Load the configuration file if one was given.
pub fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    match path {
        Some(path) => BuildConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BuildConfig::default()),
    }
}

/// Open the selected build.
pub fn open_build(config: &BuildConfig, selection: &Selection) -> Result<Build> {
    let builds_dir = config.builds_dir()?;
    tracing::debug!(builds_dir = %builds_dir.display(), build = %selection.build, "opening build");
    let index = BuildsJson::load(&builds_dir)?;
    let mut options = BuildOptions::new(
        selection
            .build
            .parse()
            .with_context(|| format!("invalid build reference {:?}", selection.build))?,
    );
    if let Some(arch) = &selection.arch {
        options = options.with_arch(arch.clone());
    }
    let build = Build::open(&index, config, options)?;
    Ok(build)
}
