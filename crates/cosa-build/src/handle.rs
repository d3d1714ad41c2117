//! # Build Handle
//!
//! [`Build`] ties one build's resolved directory, its metadata documents,
//! its artifact catalog and its scratch directory together for the length
//! of one invocation.
//!
//! ## Construction Invariant
//!
//! [`Build::open()`] resolves the build through the index, then forces all
//! four metadata documents. A missing or malformed document aborts with
//! [`BuildError::Validation`]; no partially valid handle is ever returned,
//! and no scratch directory is left behind.
//!
//! ## Teardown
//!
//! Dropping the handle removes its scratch directory (failures are logged).
//! Pending `meta` edits are not flushed implicitly.

use std::path::{Path, PathBuf};

use cosa_core::{host_basearch, BuildId};
use serde_json::Value;

use crate::artifact::{ArtifactCatalog, ArtifactProducer, ArtifactRecord};
use crate::config::{BuildConfig, BuildOptions};
use crate::error::{BuildError, MetadataError};
use crate::index::{resolve, BuildIndex};
use crate::metadata::{Document, DocumentKey, DocumentPaths, DocumentSource, MetadataStore};
use crate::scratch::{ProcessPaths, ScratchDir};

/// Compose the base name of a build's image: `{name}-{id}-{platform}.{arch}`.
pub fn image_name_base(name: &str, id: &str, platform: &str, arch: &str) -> String {
    format!("{name}-{id}-{platform}.{arch}")
}

/// Qualify `key` into the tool's namespace: `<tool>.<key>`.
pub fn namespaced_key(tool_name: &str, key: &str) -> String {
    format!("{tool_name}.{key}")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An opened build.
#[derive(Debug)]
pub struct Build {
    id: BuildId,
    arch: String,
    build_dir: PathBuf,
    workdir: PathBuf,
    tool_name: String,
    image_name: Option<String>,
    store: MetadataStore,
    catalog: ArtifactCatalog,
    scratch: ScratchDir,
}

impl Build {
    /// Resolve, validate and open a build.
    pub fn open(
        index: &dyn BuildIndex,
        config: &BuildConfig,
        options: BuildOptions,
    ) -> Result<Self, BuildError> {
        let id = resolve(index, &options.build)?;
        tracing::info!("Targeting build: {id}");

        let arch = options
            .arch
            .unwrap_or_else(|| host_basearch().to_string());
        let build_dir = index.build_dir(&id, &arch);
        let tool_name = config.tool_name().to_string();

        let paths = DocumentPaths::new(&build_dir, &tool_name, config.image_provenance());
        let mut store = MetadataStore::new(paths);
        store.load_all()?;

        let workdir = config.workdir()?;
        let scratch = ScratchDir::create_in(&config.scratch_root())?;

        let mut build = Self {
            id,
            arch,
            catalog: ArtifactCatalog::new(&build_dir),
            build_dir,
            workdir,
            tool_name,
            image_name: options.image_name,
            store,
            scratch,
        };

        let summary = build.summary().unwrap_or_default();
        let name = build.build_name().unwrap_or_default().to_uppercase();
        let basearch = build.basearch();
        let build_id = build.build_id().unwrap_or_default();
        tracing::info!("Processed build for: {summary} ({name}-{basearch}) {build_id}");
        Ok(build)
    }

    /// The resolved build id.
    pub fn id(&self) -> &BuildId {
        &self.id
    }

    /// The architecture the build directory was resolved for.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Root directory of the build.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// The broader working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// This handle's scratch directory.
    pub fn tmpdir(&self) -> &Path {
        self.scratch.path()
    }

    /// Environment bindings for subprocesses run on behalf of this build.
    pub fn process_paths(&self) -> ProcessPaths {
        ProcessPaths::new(&self.workdir, self.scratch.path())
    }

    /// The metadata store.
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Qualify `key` into this build's tool namespace.
    pub fn ckey(&self, key: &str) -> String {
        namespaced_key(&self.tool_name, key)
    }

    // ─── Metadata documents ─────────────────────────────────────────

    /// The document named `key`; unrecognized names are an error.
    pub fn get(&mut self, key: &str) -> Result<&Document, BuildError> {
        self.store.get(key)
    }

    /// `commitmeta.json`
    pub fn commit(&mut self) -> Result<&Document, MetadataError> {
        self.store.load(DocumentKey::Commit)
    }

    /// Build-config provenance.
    pub fn config(&mut self) -> Result<&Document, MetadataError> {
        self.store.load(DocumentKey::Config)
    }

    /// Build-tool provenance.
    pub fn image(&mut self) -> Result<&Document, MetadataError> {
        self.store.load(DocumentKey::Image)
    }

    /// `meta.json`, including unflushed merges.
    pub fn meta(&mut self) -> Result<&Document, MetadataError> {
        self.store.load(DocumentKey::Meta)
    }

    /// Soft lookup of `field` in document `key`.
    pub fn get_field(&mut self, key: DocumentKey, field: &str) -> Option<&Value> {
        self.store.get_field(key, field)
    }

    /// Soft two-level lookup of `field.subfield`.
    pub fn get_nested<'a>(
        &'a mut self,
        source: impl Into<DocumentSource<'a>>,
        field: &str,
        subfield: &str,
    ) -> Option<&'a Value> {
        self.store.get_nested(source, field, subfield)
    }

    /// Shallow-merge `updates` into the in-memory `meta` document.
    pub fn merge(&mut self, updates: Document) -> Result<(), BuildError> {
        Ok(self.store.merge(updates)?)
    }

    /// Atomically write `meta` to disk.
    pub fn flush(&mut self) -> Result<(), BuildError> {
        Ok(self.store.flush()?)
    }

    /// Re-read `meta` from disk, dropping unflushed merges.
    pub fn reload(&mut self) -> Result<&Document, BuildError> {
        Ok(self.store.reload()?)
    }

    // ─── Derived accessors ──────────────────────────────────────────

    fn meta_string(&mut self, field: &str) -> Option<String> {
        self.get_field(DocumentKey::Meta, field).map(display_value)
    }

    /// `meta.buildid`
    pub fn build_id(&mut self) -> Option<String> {
        self.meta_string("buildid")
    }

    /// `meta.name`
    pub fn build_name(&mut self) -> Option<String> {
        self.meta_string("name")
    }

    /// `meta.summary`
    pub fn summary(&mut self) -> Option<String> {
        self.meta_string("summary")
    }

    /// `meta["ostree-commit"]`, the upstream source commit.
    pub fn ostree_commit(&mut self) -> Option<String> {
        self.meta_string("ostree-commit")
    }

    /// Target architecture from `meta["<tool>.basearch"]`, else the host's.
    pub fn basearch(&mut self) -> String {
        let key = self.ckey("basearch");
        self.meta_string(&key)
            .unwrap_or_else(|| host_basearch().to_string())
    }

    /// [`image_name_base()`] for this build on `platform`.
    ///
    /// `None` if the meta document lacks a name or build id.
    pub fn image_name_base(&mut self, platform: &str) -> Option<String> {
        let name = self.build_name()?;
        let id = self.build_id()?;
        let arch = self.basearch();
        Some(image_name_base(&name, &id, platform, &arch))
    }

    // ─── Artifacts ──────────────────────────────────────────────────

    /// The artifact name assigned by the build kind.
    pub fn image_name(&self) -> Result<&str, BuildError> {
        self.image_name.as_deref().ok_or(BuildError::ImageNameUnset)
    }

    /// Assign the artifact name.
    pub fn set_image_name(&mut self, name: impl Into<String>) {
        self.image_name = Some(name.into());
    }

    /// `build_dir/image_name`
    pub fn image_path(&self) -> Result<PathBuf, BuildError> {
        Ok(self.build_dir.join(self.image_name()?))
    }

    /// Whether the artifact file exists.
    pub fn has_artifact(&self) -> Result<bool, BuildError> {
        Ok(self.catalog.has_artifact(self.image_name()?))
    }

    /// Checksum and size of `name`, or of the image when `name` is `None`.
    pub fn artifact_meta(&self, name: Option<&str>) -> Result<ArtifactRecord, BuildError> {
        let name = match name {
            Some(name) => name,
            None => self.image_name()?,
        };
        self.catalog.artifact_meta(name)
    }

    /// Compute and register the record for the file `name`.
    pub fn register_artifact(&mut self, name: &str) -> Result<&ArtifactRecord, BuildError> {
        self.catalog.record(name)
    }

    /// The artifact catalog.
    pub fn catalog(&self) -> &ArtifactCatalog {
        &self.catalog
    }

    /// Registered artifacts as they stand now.
    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &ArtifactRecord)> + '_ {
        self.catalog.artifacts()
    }

    /// Run `producer` to build this build's artifacts.
    ///
    /// An empty registry afterwards is logged, not an error.
    pub fn build<P: ArtifactProducer + ?Sized>(
        &mut self,
        producer: &mut P,
        args: &[String],
    ) -> Result<(), BuildError> {
        tracing::info!(platform = producer.platform(), "Processing the build artifacts");
        producer.produce(self, args)?;
        tracing::info!("Finished building artifacts");
        if self.catalog.is_empty() {
            tracing::warn!("There were no files found after building");
        }
        Ok(())
    }

    /// Build only if the artifact does not exist yet. Returns whether
    /// `producer` ran.
    pub fn ensure_built<P: ArtifactProducer + ?Sized>(
        &mut self,
        producer: &mut P,
        args: &[String],
    ) -> Result<bool, BuildError> {
        if self.has_artifact()? {
            return Ok(false);
        }
        self.build(producer, args)?;
        Ok(true)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Remove the entire working directory tree.
    pub fn clean(&self) -> Result<(), BuildError> {
        std::fs::remove_dir_all(&self.workdir)?;
        tracing::info!("Removed temporary work directory at {}", self.workdir.display());
        Ok(())
    }

    /// Tear the handle down, reporting scratch removal failures.
    pub fn close(self) -> Result<(), BuildError> {
        self.scratch.close()
    }
}
