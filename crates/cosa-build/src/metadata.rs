//! # Metadata Store — Lazily Cached Provenance Documents
//!
//! Every build carries four JSON documents:
//!
//! | Key | File | Mutability |
//! |---|---|---|
//! | `commit` | `<build_dir>/commitmeta.json` | read-only |
//! | `config` | `<build_dir>/<tool>-config-git.json` | read-only |
//! | `image` | host-global build-tool provenance path | read-only |
//! | `meta` | `<build_dir>/meta.json` | read-write |
//!
//! [`MetadataStore`] holds them in explicit [`DocumentSlots`]. A slot is
//! loaded on first use and memoized; only [`MetadataStore::reload()`]
//! invalidates a slot, and only the `meta` slot. `meta` is the only document
//! ever written back, and only through [`MetadataStore::flush()`].
//!
//! ## Soft Lookups
//!
//! [`MetadataStore::get_field()`] and [`MetadataStore::get_nested()`] never
//! fail. A miss is logged at `warn` with the key path that was probed and
//! yields `None`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;

use crate::atomic::write_json_atomic;
use crate::error::{error_chain, BuildError, MetadataError};

/// A parsed metadata document. Always a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Names one of the four metadata documents of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKey {
    /// Source-commit provenance.
    Commit,
    /// Build-config provenance.
    Config,
    /// Build-tool provenance (host-global).
    Image,
    /// Canonical, mutable build metadata.
    Meta,
}

impl DocumentKey {
    /// All keys, in validation order.
    pub const ALL: [DocumentKey; 4] = [Self::Commit, Self::Config, Self::Image, Self::Meta];

    /// Returns the key's name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Config => "config",
            Self::Image => "image",
            Self::Meta => "meta",
        }
    }

    /// Names of all recognized keys.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(DocumentKey::as_str).collect()
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKey {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BuildError::UnknownMetadataKey { key: s.to_string() })
    }
}

/// File locations of the four documents for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    build_dir: PathBuf,
    tool_name: String,
    image_provenance: PathBuf,
}

impl DocumentPaths {
    /// Paths for a build rooted at `build_dir`.
    pub fn new(
        build_dir: impl Into<PathBuf>,
        tool_name: impl Into<String>,
        image_provenance: impl Into<PathBuf>,
    ) -> Self {
        Self {
            build_dir: build_dir.into(),
            tool_name: tool_name.into(),
            image_provenance: image_provenance.into(),
        }
    }

    /// The build directory.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Location of document `key`.
    pub fn path(&self, key: DocumentKey) -> PathBuf {
        match key {
            DocumentKey::Commit => self.build_dir.join("commitmeta.json"),
            DocumentKey::Config => self
                .build_dir
                .join(format!("{}-config-git.json", self.tool_name)),
            DocumentKey::Image => self.image_provenance.clone(),
            DocumentKey::Meta => self.build_dir.join("meta.json"),
        }
    }
}

/// Cached documents. `None` means not loaded yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSlots {
    /// `commitmeta.json`
    pub commit: Option<Document>,
    /// `<tool>-config-git.json`
    pub config: Option<Document>,
    /// Build-tool provenance.
    pub image: Option<Document>,
    /// `meta.json`
    pub meta: Option<Document>,
}

impl DocumentSlots {
    /// Borrow the slot for `key`.
    pub fn slot(&self, key: DocumentKey) -> &Option<Document> {
        match key {
            DocumentKey::Commit => &self.commit,
            DocumentKey::Config => &self.config,
            DocumentKey::Image => &self.image,
            DocumentKey::Meta => &self.meta,
        }
    }

    /// Mutably borrow the slot for `key`.
    pub fn slot_mut(&mut self, key: DocumentKey) -> &mut Option<Document> {
        match key {
            DocumentKey::Commit => &mut self.commit,
            DocumentKey::Config => &mut self.config,
            DocumentKey::Image => &mut self.image,
            DocumentKey::Meta => &mut self.meta,
        }
    }
}

/// Where [`MetadataStore::get_nested()`] looks.
#[derive(Debug, Clone, Copy)]
pub enum DocumentSource<'a> {
    /// A document of the store, loaded on demand.
    Key(DocumentKey),
    /// An already-resolved document.
    Document(&'a Document),
}

impl From<DocumentKey> for DocumentSource<'_> {
    fn from(key: DocumentKey) -> Self {
        Self::Key(key)
    }
}

impl<'a> From<&'a Document> for DocumentSource<'a> {
    fn from(doc: &'a Document) -> Self {
        Self::Document(doc)
    }
}

/// Read and parse a document, requiring a JSON object.
pub fn read_document(path: &Path) -> Result<Document, MetadataError> {
    tracing::debug!(path = %path.display(), "Reading in metadata document");
    let content = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| MetadataError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(doc) => Ok(doc),
        _ => Err(MetadataError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Two-level lookup `doc[field][subfield]`.
pub fn nested<'a>(doc: &'a Document, field: &str, subfield: &str) -> Option<&'a Value> {
    doc.get(field)?.get(subfield)
}

/// Lazily loading, memoizing store of a build's four documents.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    paths: DocumentPaths,
    slots: DocumentSlots,
}

impl MetadataStore {
    /// An empty store; nothing is read until first use.
    pub fn new(paths: DocumentPaths) -> Self {
        Self {
            paths,
            slots: DocumentSlots::default(),
        }
    }

    /// Document locations.
    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    /// Current cache state.
    pub fn slots(&self) -> &DocumentSlots {
        &self.slots
    }

    /// The cached document, without loading.
    pub fn cached(&self, key: DocumentKey) -> Option<&Document> {
        self.slots.slot(key).as_ref()
    }

    /// The document for `key`, loading it on first use.
    pub fn load(&mut self, key: DocumentKey) -> Result<&Document, MetadataError> {
        let slot = self.slots.slot_mut(key);
        let doc = match slot.take() {
            Some(doc) => doc,
            None => read_document(&self.paths.path(key))?,
        };
        let doc: &Document = slot.insert(doc);
        Ok(doc)
    }

    /// Force every slot, reporting the first document that fails.
    pub fn load_all(&mut self) -> Result<(), BuildError> {
        for key in DocumentKey::ALL {
            if let Err(source) = self.load(key) {
                return Err(BuildError::Validation {
                    key,
                    path: self.paths.path(key),
                    source,
                });
            }
        }
        Ok(())
    }

    /// The document named `key`. Unrecognized names are an error.
    pub fn get(&mut self, key: &str) -> Result<&Document, BuildError> {
        let key: DocumentKey = key.parse()?;
        Ok(self.load(key)?)
    }

    /// Soft lookup of `field` in document `key`.
    pub fn get_field(&mut self, key: DocumentKey, field: &str) -> Option<&Value> {
        let doc = match self.load(key) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %error_chain(&e),
                    "metadata document unavailable"
                );
                return None;
            }
        };
        let value = doc.get(field);
        if value.is_none() {
            tracing::warn!("lookup for key '{key}.{field}' returned nothing");
        }
        value
    }

    /// Soft two-level lookup of `field.subfield` in a document.
    pub fn get_nested<'a>(
        &'a mut self,
        source: impl Into<DocumentSource<'a>>,
        field: &str,
        subfield: &str,
    ) -> Option<&'a Value> {
        let (label, doc) = match source.into() {
            DocumentSource::Document(doc) => ("<document>".to_string(), doc),
            DocumentSource::Key(key) => match self.load(key) {
                Ok(doc) => (key.to_string(), doc),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %error_chain(&e),
                        "metadata document unavailable"
                    );
                    return None;
                }
            },
        };
        let value = nested(doc, field, subfield);
        if value.is_none() {
            tracing::warn!("lookup for key '{label}.{field}.{subfield}' returned nothing");
        }
        value
    }

    /// Shallow-merge `updates` into the in-memory `meta` document.
    ///
    /// Later values replace earlier ones per top-level field. Nothing is
    /// written to disk.
    pub fn merge(&mut self, updates: Document) -> Result<(), MetadataError> {
        self.load(DocumentKey::Meta)?;
        if let Some(meta) = self.slots.meta.as_mut() {
            meta.extend(updates);
        }
        Ok(())
    }

    /// Atomically persist the in-memory `meta` document.
    pub fn flush(&mut self) -> Result<(), MetadataError> {
        let path = self.paths.path(DocumentKey::Meta);
        let meta = self.load(DocumentKey::Meta)?;
        write_json_atomic(&path, meta).map_err(|source| MetadataError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote meta document");
        Ok(())
    }

    /// Discard the cached `meta` document and read it again from disk.
    ///
    /// Unflushed merges are lost.
    pub fn reload(&mut self) -> Result<&Document, MetadataError> {
        self.slots.meta = None;
        self.load(DocumentKey::Meta)
    }
}
