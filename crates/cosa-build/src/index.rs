//! # Build Index
//!
//! Maps build ids (and the `latest` sentinel) to build directories. Build
//! handles only query the index through the [`BuildIndex`] trait; the
//! directory a build resolves to is fixed for the handle's lifetime.
//!
//! [`BuildsJson`] is the file-backed implementation over
//! `<builds_dir>/builds.json`, which lists builds newest first:
//!
//! ```json
//! {
//!     "schema-version": "1.0.0",
//!     "builds": [
//!         { "id": "35.20220102.0", "arches": ["x86_64", "aarch64"] },
//!         { "id": "35.20220101.0", "arches": ["x86_64"] }
//!     ]
//! }
//! ```
//!
//! The older layout where `builds` is a plain list of id strings is also
//! accepted.

use std::path::PathBuf;

use cosa_core::{BuildId, BuildRef};
use serde::Deserialize;

use crate::error::{BuildError, IndexError};

/// Registry mapping build ids to build directories.
pub trait BuildIndex {
    /// The most recent build, or `None` if the index is empty.
    fn latest(&self) -> Result<Option<BuildId>, BuildError>;

    /// Whether the index knows about `id`.
    fn has(&self, id: &BuildId) -> Result<bool, BuildError>;

    /// Directory holding the build `id` for architecture `arch`.
    fn build_dir(&self, id: &BuildId, arch: &str) -> PathBuf;
}

/// Resolve a build reference to a concrete id present in `index`.
pub fn resolve(index: &dyn BuildIndex, build: &BuildRef) -> Result<BuildId, BuildError> {
    match build {
        BuildRef::Latest => index
            .latest()?
            .ok_or_else(|| BuildError::BuildNotFound(build.to_string())),
        BuildRef::Id(id) => {
            if index.has(id)? {
                Ok(id.clone())
            } else {
                Err(BuildError::BuildNotFound(id.to_string()))
            }
        }
    }
}

/// One build listed in `builds.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBuild {
    /// The build id.
    pub id: BuildId,
    /// Architectures built for this id. Empty in the legacy layout.
    pub arches: Vec<String>,
}

#[derive(Deserialize)]
struct BuildsDocument {
    builds: Vec<BuildEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BuildEntry {
    Full {
        id: BuildId,
        #[serde(default)]
        arches: Vec<String>,
    },
    Legacy(BuildId),
}

impl From<BuildEntry> for IndexedBuild {
    fn from(entry: BuildEntry) -> Self {
        match entry {
            BuildEntry::Full { id, arches } => Self { id, arches },
            BuildEntry::Legacy(id) => Self { id, arches: Vec::new() },
        }
    }
}

/// Build index backed by `<builds_dir>/builds.json`.
#[derive(Debug, Clone)]
pub struct BuildsJson {
    dir: PathBuf,
    builds: Vec<IndexedBuild>,
}

impl BuildsJson {
    /// Name of the index file inside the builds directory.
    pub const FILE_NAME: &'static str = "builds.json";

    /// Read and parse the index in `dir`.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let dir = dir.into();
        let path = dir.join(Self::FILE_NAME);
        let content = std::fs::read_to_string(&path).map_err(|source| IndexError::Io {
            path: path.clone(),
            source,
        })?;
        let doc: BuildsDocument = serde_json::from_str(&content)
            .map_err(|source| IndexError::Parse { path, source })?;
        Ok(Self {
            dir,
            builds: doc.builds.into_iter().map(IndexedBuild::from).collect(),
        })
    }

    /// All listed builds, newest first.
    pub fn builds(&self) -> &[IndexedBuild] {
        &self.builds
    }
}

impl BuildIndex for BuildsJson {
    fn latest(&self) -> Result<Option<BuildId>, BuildError> {
        Ok(self.builds.first().map(|b| b.id.clone()))
    }

    fn has(&self, id: &BuildId) -> Result<bool, BuildError> {
        Ok(self.builds.iter().any(|b| &b.id == id))
    }

    fn build_dir(&self, id: &BuildId, arch: &str) -> PathBuf {
        self.dir.join(id.as_str()).join(arch)
    }
}
