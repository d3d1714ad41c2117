//! # Configuration
//!
//! [`BuildConfig`] carries the host-level settings shared by every build a
//! process opens: where builds live, the working directory, the tool
//! namespace, and where scratch directories are allocated. All fields are
//! optional; missing values fall back to the defaults below. It is loaded
//! from YAML:
//!
//! ```yaml
//! workdir: /srv/fcos
//! builds-dir: /srv/fcos/builds
//! tool-name: coreos-assembler
//! image-provenance: /cosa/coreos-assembler-git.json
//! scratch-root: /var/tmp
//! ```
//!
//! [`BuildOptions`] selects one build within that configuration.

use std::path::{Path, PathBuf};

use cosa_core::BuildRef;
use serde::Deserialize;

use crate::error::BuildError;

/// Namespace used for tool annotations and the config provenance file name.
pub const DEFAULT_TOOL_NAME: &str = "coreos-assembler";

/// Directory holding the host-global build-tool provenance document.
pub const DEFAULT_PROVENANCE_DIR: &str = "/cosa";

/// Host-level settings for opening builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
    /// Broader working directory. Defaults to the current directory.
    pub workdir: Option<PathBuf>,
    /// Root of the build index. Defaults to `<workdir>/builds`.
    pub builds_dir: Option<PathBuf>,
    /// Tool namespace. Defaults to [`DEFAULT_TOOL_NAME`].
    pub tool_name: Option<String>,
    /// Build-tool provenance document. Defaults to `/cosa/<tool>-git.json`.
    pub image_provenance: Option<PathBuf>,
    /// Parent of per-build scratch directories. Defaults to the system temp dir.
    pub scratch_root: Option<PathBuf>,
}

impl BuildConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BuildError> {
        // An empty file deserializes to unit, not a map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| BuildError::Config(e.to_string()))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, BuildError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            BuildError::Config(msg) => BuildError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// The working directory.
    pub fn workdir(&self) -> Result<PathBuf, BuildError> {
        match &self.workdir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// The build index root.
    pub fn builds_dir(&self) -> Result<PathBuf, BuildError> {
        match &self.builds_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.workdir()?.join("builds")),
        }
    }

    /// The tool namespace.
    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or(DEFAULT_TOOL_NAME)
    }

    /// Path of the host-global build-tool provenance document.
    pub fn image_provenance(&self) -> PathBuf {
        match &self.image_provenance {
            Some(path) => path.clone(),
            None => Path::new(DEFAULT_PROVENANCE_DIR).join(format!("{}-git.json", self.tool_name())),
        }
    }

    /// Parent directory for scratch directories.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Selects a single build to open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// `latest` or a concrete build id.
    pub build: BuildRef,
    /// Architecture override. Defaults to the host base architecture.
    pub arch: Option<String>,
    /// Name of the artifact this build kind produces, relative to the build dir.
    pub image_name: Option<String>,
}

impl BuildOptions {
    /// Options for a specific build reference.
    pub fn new(build: BuildRef) -> Self {
        Self {
            build,
            ..Self::default()
        }
    }

    /// Override the architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Set the artifact name.
    pub fn with_image_name(mut self, name: impl Into<String>) -> Self {
        self.image_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let cfg = BuildConfig::from_yaml_str("").unwrap();
        assert_eq!(cfg, BuildConfig::default());
        assert_eq!(cfg.tool_name(), "coreos-assembler");
        assert_eq!(
            cfg.image_provenance(),
            PathBuf::from("/cosa/coreos-assembler-git.json")
        );
        assert_eq!(cfg.scratch_root(), std::env::temp_dir());
    }

    #[test]
    fn builds_dir_follows_workdir() {
        let cfg = BuildConfig::from_yaml_str("workdir: /srv/fcos\n").unwrap();
        assert_eq!(cfg.workdir().unwrap(), PathBuf::from("/srv/fcos"));
        assert_eq!(cfg.builds_dir().unwrap(), PathBuf::from("/srv/fcos/builds"));
    }

    #[test]
    fn parses_all_fields() {
        let yaml = "workdir: /w\nbuilds-dir: /b\ntool-name: mytool\nimage-provenance: /p.json\nscratch-root: /s\n";
        let cfg = BuildConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.builds_dir().unwrap(), PathBuf::from("/b"));
        assert_eq!(cfg.tool_name(), "mytool");
        assert_eq!(cfg.image_provenance(), PathBuf::from("/p.json"));
        assert_eq!(cfg.scratch_root(), PathBuf::from("/s"));
    }

    #[test]
    fn provenance_default_uses_tool_name() {
        let cfg = BuildConfig::from_yaml_str("tool-name: mytool\n").unwrap();
        assert_eq!(cfg.image_provenance(), PathBuf::from("/cosa/mytool-git.json"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = BuildConfig::from_yaml_str("bogus: 1\n").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn options_builder() {
        let opts = BuildOptions::new(BuildRef::Latest)
            .with_arch("aarch64")
            .with_image_name("fcos-qemu.qcow2");
        assert_eq!(opts.arch.as_deref(), Some("aarch64"));
        assert_eq!(opts.image_name.as_deref(), Some("fcos-qemu.qcow2"));
    }
}
