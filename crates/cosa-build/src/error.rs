//! # Error Types — Two-Tier Failure Model
//!
//! Opening a build is fail-fast: any of the four provenance documents being
//! missing or unparsable aborts construction with [`BuildError::Validation`],
//! naming the document. Soft field probes never produce these errors; they
//! log and return `None` instead (see [`crate::metadata`]).

use std::path::PathBuf;

use cosa_core::CoreError;
use thiserror::Error;

use crate::metadata::DocumentKey;

/// Top-level error type for build bookkeeping.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The requested build id is absent from the build index.
    #[error("build {0} was not found in the build index")]
    BuildNotFound(String),

    /// A required metadata document could not be loaded while opening a build.
    #[error("{key} document {} was not read in properly or is not defined", path.display())]
    Validation {
        /// Which document failed.
        key: DocumentKey,
        /// Where it was expected.
        path: PathBuf,
        /// The underlying load failure.
        #[source]
        source: MetadataError,
    },

    /// A document key outside the recognized set was requested.
    #[error("invalid key {key:?}, valid keys are {}", DocumentKey::names().join(", "))]
    UnknownMetadataKey {
        /// The key that was asked for.
        key: String,
    },

    /// Metadata load or persist failure after construction.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Stat or read failure while computing artifact metadata.
    #[error("failed to access artifact {}", path.display())]
    ArtifactAccess {
        /// The artifact file.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: CoreError,
    },

    /// The scratch directory could not be removed on explicit close.
    #[error("failed to remove temporary directory {}", path.display())]
    ScratchTeardown {
        /// The scratch directory.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The build index could not be read.
    #[error("build index error")]
    Index(#[from] IndexError),

    /// The artifact name was queried before the build kind assigned one.
    #[error("image name has not been set for this build")]
    ImageNameUnset,

    /// An artifact-production hook failed.
    #[error("artifact production for platform {platform} failed")]
    Production {
        /// Platform of the build kind that failed.
        platform: String,
        /// The hook's own error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error from a core primitive.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error.
    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Wrap a failure raised inside an artifact-production hook.
    pub fn production(
        platform: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Production {
            platform: platform.into(),
            source: source.into(),
        }
    }
}

/// Failure to load or persist a single metadata document.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// Document path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid JSON.
    #[error("failed to parse {}", path.display())]
    Parse {
        /// Document path.
        path: PathBuf,
        /// The parser failure.
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but is not a JSON object (including `null`).
    #[error("{} does not contain a JSON object", path.display())]
    NotAnObject {
        /// Document path.
        path: PathBuf,
    },

    /// The document could not be written back.
    #[error("failed to write {}", path.display())]
    Write {
        /// Document path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },
}

/// Failure to read the build index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// Index path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The index file is malformed.
    #[error("failed to parse {}", path.display())]
    Parse {
        /// Index path.
        path: PathBuf,
        /// The parser failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Render an error followed by its causes as a single `outer: inner` line.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut line = err.to_string();
    let mut cause = err.source();
    while let Some(e) = cause {
        line.push_str(": ");
        line.push_str(&e.to_string());
        cause = e.source();
    }
    line
}
