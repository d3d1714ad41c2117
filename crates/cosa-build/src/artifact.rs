//! # Artifact Catalog
//!
//! Tracks the output files a build kind produced, keyed by name, each with
//! its size and streaming SHA-256 digest. The registry is populated by an
//! [`ArtifactProducer`], one implementation per concrete build kind
//! (qemu, aws, metal, ...). Coordination of production lives on
//! [`Build`](crate::Build): `build()` runs the producer,
//! `ensure_built()` runs it only if the artifact is missing.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cosa_core::{sha256_file, ContentDigest, CoreError};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::handle::Build;

/// Checksum and size of one artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Path relative to the build directory.
    pub path: String,
    /// SHA-256 of the file contents, lowercase hex on the wire.
    pub sha256: ContentDigest,
    /// Size in bytes.
    pub size: u64,
}

/// Compute the record for `build_dir/name`.
pub fn artifact_meta(build_dir: &Path, name: &str) -> Result<ArtifactRecord, BuildError> {
    let path = build_dir.join(name);
    tracing::info!("Calculating metadata for {name}");
    let access = |source: CoreError| BuildError::ArtifactAccess {
        path: path.clone(),
        source,
    };
    let size = std::fs::metadata(&path)
        .map_err(|e| access(CoreError::Io(e)))?
        .len();
    let sha256 = sha256_file(&path).map_err(access)?;
    Ok(ArtifactRecord {
        path: name.to_string(),
        sha256,
        size,
    })
}

/// Per-platform artifact production.
///
/// Implementations create their files under the build directory and must
/// register each one on the build (see [`Build::register_artifact()`]).
pub trait ArtifactProducer {
    /// Platform name used in image names, e.g. `qemu`.
    fn platform(&self) -> &str;

    /// Produce the artifacts for `build`.
    fn produce(&mut self, build: &mut Build, args: &[String]) -> Result<(), BuildError>;
}

/// Registry of a build's produced artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCatalog {
    build_dir: PathBuf,
    registry: HashMap<String, ArtifactRecord>,
}

impl ArtifactCatalog {
    /// An empty catalog for the build rooted at `build_dir`.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            registry: HashMap::new(),
        }
    }

    /// The build directory artifact paths are relative to.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Whether `build_dir/name` currently exists.
    pub fn has_artifact(&self, name: &str) -> bool {
        self.build_dir.join(name).exists()
    }

    /// Compute the record for `build_dir/name` without registering it.
    pub fn artifact_meta(&self, name: &str) -> Result<ArtifactRecord, BuildError> {
        artifact_meta(&self.build_dir, name)
    }

    /// Add or replace a record under its own `path`, returning any previous one.
    pub fn register(&mut self, record: ArtifactRecord) -> Option<ArtifactRecord> {
        self.registry.insert(record.path.clone(), record)
    }

    /// Compute the record for the file `name` and register it under `name`.
    pub fn record(&mut self, name: &str) -> Result<&ArtifactRecord, BuildError> {
        let record = self.artifact_meta(name)?;
        match self.registry.entry(record.path.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(record);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(record)),
        }
    }

    /// The registered record for `name`.
    pub fn get(&self, name: &str) -> Option<&ArtifactRecord> {
        self.registry.get(name)
    }

    /// Iterate over the registry as it stands now. Each call starts afresh.
    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &ArtifactRecord)> + '_ {
        self.registry.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Number of registered artifacts.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
