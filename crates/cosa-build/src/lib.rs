//! # cosa-build — Build Metadata and Artifact Bookkeeping
//!
//! Given a build id (or `latest`), resolves the build's directory through a
//! [`BuildIndex`], loads and validates its provenance documents, offers
//! tolerant lookups over them, tracks produced artifacts with checksums, and
//! persists `meta.json` updates atomically.
//!
//! ## Flow
//!
//! 1. [`Build::open()`] resolves the directory and validates all four
//!    documents (`commit`, `config`, `image`, `meta`).
//! 2. Callers probe with [`Build::get_field()`] / [`Build::get_nested()`],
//!    edit with [`Build::merge()`] and persist with [`Build::flush()`].
//! 3. An [`ArtifactProducer`] for the concrete build kind is driven through
//!    [`Build::build()`] or [`Build::ensure_built()`].
//! 4. Dropping the handle removes its scratch directory.
//!
//! ## Concurrency
//!
//! Single-threaded and synchronous. A handle's document cache is private to
//! it. Flushes are atomic per call but not serialized across processes.

pub mod artifact;
pub mod atomic;
pub mod config;
pub mod error;
pub mod handle;
pub mod index;
pub mod metadata;
pub mod scratch;

pub use artifact::{artifact_meta, ArtifactCatalog, ArtifactProducer, ArtifactRecord};
pub use atomic::{write_json_atomic, DOCUMENT_MODE};
pub use config::{BuildConfig, BuildOptions, DEFAULT_TOOL_NAME};
pub use error::{BuildError, IndexError, MetadataError};
pub use handle::{image_name_base, namespaced_key, Build};
pub use index::{resolve, BuildIndex, BuildsJson, IndexedBuild};
pub use metadata::{Document, DocumentKey, DocumentPaths, DocumentSlots, DocumentSource, MetadataStore};
pub use scratch::{ProcessPaths, ScratchDir, SCRATCH_PREFIX};
