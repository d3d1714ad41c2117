//! # Build Handle Integration Tests
//!
//! Exercises `Build` end to end against an on-disk builds tree: index
//! resolution, construction-time validation, cached document access, the
//! merge/flush/reload cycle, artifact coordination, and scratch directory
//! lifetime.

use std::path::{Path, PathBuf};

use cosa_build::{
    image_name_base, Build, BuildConfig, BuildError, BuildIndex, BuildOptions, BuildsJson,
    ArtifactProducer, Document, DocumentKey, MetadataError,
};
use cosa_core::{host_basearch, BuildId, BuildRef};
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const ARCHES: [&str; 2] = ["x86_64", "aarch64"];

struct Fixture {
    root: TempDir,
    config: BuildConfig,
}

impl Fixture {
    /// Builds `ids` (newest first) for the host arch and `ARCHES`.
    fn new(ids: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let builds_dir = root.path().join("builds");
        let workdir = root.path().join("work");
        std::fs::create_dir_all(&builds_dir).unwrap();
        std::fs::create_dir_all(&workdir).unwrap();

        let mut arches: Vec<String> = ARCHES.iter().map(|a| a.to_string()).collect();
        if !arches.iter().any(|a| a == host_basearch()) {
            arches.push(host_basearch().to_string());
        }

        let entries: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "arches": arches}))
            .collect();
        std::fs::write(
            builds_dir.join("builds.json"),
            json!({"schema-version": "1.0.0", "builds": entries}).to_string(),
        )
        .unwrap();

        for id in ids {
            for arch in &arches {
                let dir = builds_dir.join(id).join(arch);
                std::fs::create_dir_all(&dir).unwrap();
                write(&dir.join("commitmeta.json"), json!({"rpm-ostree-inputhash": "deadbeef"}));
                write(
                    &dir.join("coreos-assembler-config-git.json"),
                    json!({"git": {"commit": "c0ffee", "branch": "testing-devel"}}),
                );
                write(
                    &dir.join("meta.json"),
                    json!({
                        "buildid": id,
                        "name": "fedora-coreos",
                        "summary": "Fedora CoreOS testing-devel",
                        "ostree-commit": "0123abcd",
                        "coreos-assembler.basearch": arch,
                        "images": {"qemu": {"path": "disk.qcow2"}},
                    }),
                );
            }
        }

        let provenance = root.path().join("coreos-assembler-git.json");
        write(&provenance, json!({"git": {"commit": "1234"}}));

        let config = BuildConfig {
            workdir: Some(workdir),
            builds_dir: Some(builds_dir),
            tool_name: None,
            image_provenance: Some(provenance),
            scratch_root: Some(root.path().join("scratch")),
        };
        Self { root, config }
    }

    fn index(&self) -> BuildsJson {
        BuildsJson::load(self.config.builds_dir().unwrap()).unwrap()
    }

    fn open(&self, options: BuildOptions) -> Result<Build, BuildError> {
        Build::open(&self.index(), &self.config, options)
    }

    fn open_id(&self, id: &str) -> Build {
        self.open(BuildOptions::new(id.parse().unwrap())).unwrap()
    }

    fn build_dir(&self, id: &str, arch: &str) -> PathBuf {
        self.root.path().join("builds").join(id).join(arch)
    }

    fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.root.path().join("scratch")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn write(path: &Path, value: Value) {
    std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

// ─── Resolution ─────────────────────────────────────────────────────

#[test]
fn resolves_directory_with_and_without_arch_override() {
    let fx = Fixture::new(&["35.20220102.0", "35.20220101.0"]);
    let index = fx.index();

    for id in ["35.20220102.0", "35.20220101.0"] {
        let build = fx.open_id(id);
        let bid = BuildId::new(id).unwrap();
        assert_eq!(build.build_dir(), index.build_dir(&bid, host_basearch()));

        for arch in ARCHES {
            let options = BuildOptions::new(id.parse().unwrap()).with_arch(arch);
            let build = fx.open(options).unwrap();
            assert_eq!(build.build_dir(), index.build_dir(&bid, arch));
            assert_eq!(build.build_dir(), fx.build_dir(id, arch));
            assert_eq!(build.arch(), arch);
        }
    }
}

#[test]
fn latest_resolves_to_newest_build() {
    let fx = Fixture::new(&["2", "1"]);
    let mut build = fx.open(BuildOptions::new(BuildRef::Latest)).unwrap();
    assert_eq!(build.id().as_str(), "2");
    assert_eq!(build.build_id().as_deref(), Some("2"));
}

#[test]
fn unknown_build_is_not_found() {
    let fx = Fixture::new(&["1"]);
    let err = fx.open(BuildOptions::new("9".parse().unwrap())).unwrap_err();
    assert!(matches!(err, BuildError::BuildNotFound(ref id) if id == "9"));
}

// ─── Construction-time validation ───────────────────────────────────

#[test]
fn missing_document_fails_construction_without_scratch_leak() {
    let fx = Fixture::new(&["1"]);
    std::fs::remove_file(fx.build_dir("1", "x86_64").join("commitmeta.json")).unwrap();

    let err = fx
        .open(BuildOptions::new("1".parse().unwrap()).with_arch("x86_64"))
        .unwrap_err();
    match err {
        BuildError::Validation { key, path, source } => {
            assert_eq!(key, DocumentKey::Commit);
            assert!(path.ends_with("commitmeta.json"));
            assert!(matches!(source, MetadataError::Io { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn malformed_meta_fails_construction() {
    let fx = Fixture::new(&["1"]);
    std::fs::write(fx.build_dir("1", "x86_64").join("meta.json"), "{\"buildid\": ").unwrap();
    let err = fx
        .open(BuildOptions::new("1".parse().unwrap()).with_arch("x86_64"))
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Validation { key: DocumentKey::Meta, source: MetadataError::Parse { .. }, .. }
    ));
}

#[test]
fn null_document_fails_construction() {
    let fx = Fixture::new(&["1"]);
    std::fs::write(
        fx.build_dir("1", "x86_64").join("coreos-assembler-config-git.json"),
        "null",
    )
    .unwrap();
    let err = fx
        .open(BuildOptions::new("1".parse().unwrap()).with_arch("x86_64"))
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Validation { key: DocumentKey::Config, source: MetadataError::NotAnObject { .. }, .. }
    ));
}

#[test]
fn missing_host_provenance_fails_construction() {
    let mut fx = Fixture::new(&["1"]);
    fx.config.image_provenance = Some(fx.root.path().join("absent.json"));
    let err = fx.open(BuildOptions::new("1".parse().unwrap())).unwrap_err();
    assert!(matches!(err, BuildError::Validation { key: DocumentKey::Image, .. }));
}

// ─── Document access ────────────────────────────────────────────────

#[test]
fn open_caches_all_four_documents() {
    let fx = Fixture::new(&["1"]);
    let build = fx.open_id("1");
    for key in DocumentKey::ALL {
        assert!(build.store().cached(key).is_some(), "{key} not cached");
    }
}

#[test]
fn get_returns_the_cached_document_instance() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");

    let by_key = build.get("commit").unwrap() as *const Document;
    let by_accessor = build.commit().unwrap() as *const Document;
    assert_eq!(by_key, by_accessor);

    let by_key = build.get("config").unwrap() as *const Document;
    let by_accessor = build.config().unwrap() as *const Document;
    assert_eq!(by_key, by_accessor);

    let by_key = build.get("image").unwrap() as *const Document;
    let by_accessor = build.image().unwrap() as *const Document;
    assert_eq!(by_key, by_accessor);

    let by_key = build.get("meta").unwrap() as *const Document;
    let by_accessor = build.meta().unwrap() as *const Document;
    assert_eq!(by_key, by_accessor);
}

#[test]
fn get_with_unknown_key_is_an_error() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");
    let err = build.get("metadata").unwrap_err();
    assert!(matches!(err, BuildError::UnknownMetadataKey { ref key } if key == "metadata"));
}

#[test]
fn soft_lookups_return_none_on_miss() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");

    assert_eq!(build.get_field(DocumentKey::Meta, "no-such-field"), None);
    assert_eq!(build.get_field(DocumentKey::Commit, "rpm-ostree-inputhash"), Some(&json!("deadbeef")));

    assert_eq!(build.get_nested(DocumentKey::Config, "git", "branch"), Some(&json!("testing-devel")));
    assert_eq!(build.get_nested(DocumentKey::Config, "git", "tag"), None);
    assert_eq!(build.get_nested(DocumentKey::Meta, "images", "aws"), None);

    let external = doc(json!({"a": {"b": true}}));
    assert_eq!(build.get_nested(&external, "a", "b"), Some(&json!(true)));
}

#[test]
fn derived_accessors() {
    let fx = Fixture::new(&["35.1"]);
    let mut build = fx
        .open(BuildOptions::new("35.1".parse().unwrap()).with_arch("aarch64"))
        .unwrap();
    assert_eq!(build.build_id().as_deref(), Some("35.1"));
    assert_eq!(build.build_name().as_deref(), Some("fedora-coreos"));
    assert_eq!(build.summary().as_deref(), Some("Fedora CoreOS testing-devel"));
    assert_eq!(build.ostree_commit().as_deref(), Some("0123abcd"));
    assert_eq!(build.basearch(), "aarch64");
    assert_eq!(build.ckey("basearch"), "coreos-assembler.basearch");
    assert_eq!(
        build.image_name_base("qemu").as_deref(),
        Some("fedora-coreos-35.1-qemu.aarch64")
    );
}

#[test]
fn basearch_falls_back_to_host() {
    let fx = Fixture::new(&["1"]);
    let meta = fx.build_dir("1", "x86_64").join("meta.json");
    write(&meta, json!({"buildid": "1", "name": "fcos"}));
    let mut build = fx
        .open(BuildOptions::new("1".parse().unwrap()).with_arch("x86_64"))
        .unwrap();
    assert_eq!(build.basearch(), host_basearch());
    assert_eq!(build.summary(), None);
}

#[test]
fn image_name_base_composition() {
    assert_eq!(
        image_name_base("fcos", "35.20220101.0", "qemu", "x86_64"),
        "fcos-35.20220101.0-qemu.x86_64"
    );
}

// ─── Merge / flush / reload ─────────────────────────────────────────

#[test]
fn merge_flush_reload_persists_updates() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");
    let before = build.meta().unwrap().clone();

    let updates = doc(json!({"summary": "updated", "coreos-assembler.delayed-meta-merge": true}));
    build.merge(updates.clone()).unwrap();
    build.flush().unwrap();
    let after = build.reload().unwrap().clone();

    let mut expected = before;
    expected.extend(updates);
    assert_eq!(after, expected);

    // A fresh handle sees the persisted state too.
    let mut other = fx.open_id("1");
    assert_eq!(other.summary().as_deref(), Some("updated"));
}

#[test]
fn merge_then_reload_discards_updates() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");
    let before = build.meta().unwrap().clone();

    build.merge(doc(json!({"summary": "scratch"}))).unwrap();
    assert_eq!(build.summary().as_deref(), Some("scratch"));
    assert_eq!(build.reload().unwrap(), &before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn flushed_merge_equals_disk_state_merged_with_updates(
        updates in proptest::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}", 0..6),
    ) {
        let fx = Fixture::new(&["1"]);
        let mut build = fx.open_id("1");
        let mut expected = build.meta().unwrap().clone();

        let updates: Document = updates
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        build.merge(updates.clone()).unwrap();
        build.flush().unwrap();
        expected.extend(updates);
        prop_assert_eq!(build.reload().unwrap(), &expected);
    }
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Writes a fixed image and registers it, counting invocations.
struct QemuProducer {
    calls: usize,
    payload: &'static [u8],
}

impl ArtifactProducer for QemuProducer {
    fn platform(&self) -> &str {
        "qemu"
    }

    fn produce(&mut self, build: &mut Build, _args: &[String]) -> Result<(), BuildError> {
        self.calls += 1;
        let name = build.image_name()?.to_string();
        std::fs::write(build.build_dir().join(&name), self.payload)?;
        build.register_artifact(&name)?;
        Ok(())
    }
}

struct NoopProducer;

impl ArtifactProducer for NoopProducer {
    fn platform(&self) -> &str {
        "metal"
    }

    fn produce(&mut self, _build: &mut Build, _args: &[String]) -> Result<(), BuildError> {
        Ok(())
    }
}

struct FailingProducer;

impl ArtifactProducer for FailingProducer {
    fn platform(&self) -> &str {
        "aws"
    }

    fn produce(&mut self, _build: &mut Build, _args: &[String]) -> Result<(), BuildError> {
        Err(BuildError::production("aws", "upload rejected"))
    }
}

fn open_with_image(fx: &Fixture) -> Build {
    fx.open(
        BuildOptions::new("1".parse().unwrap())
            .with_arch("x86_64")
            .with_image_name("fedora-coreos-1-qemu.x86_64.qcow2"),
    )
    .unwrap()
}

#[test]
fn ensure_built_runs_producer_at_most_once() {
    let fx = Fixture::new(&["1"]);
    let mut build = open_with_image(&fx);
    let mut producer = QemuProducer { calls: 0, payload: b"qcow2 bytes" };

    assert!(!build.has_artifact().unwrap());
    assert!(build.ensure_built(&mut producer, &[]).unwrap());
    assert!(!build.ensure_built(&mut producer, &[]).unwrap());
    assert_eq!(producer.calls, 1);
    assert!(build.has_artifact().unwrap());

    let records: Vec<_> = build.artifacts().collect();
    assert_eq!(records.len(), 1);
    let (name, record) = records[0];
    assert_eq!(name, "fedora-coreos-1-qemu.x86_64.qcow2");
    assert_eq!(record.size, 11);
    assert_eq!(record, &build.artifact_meta(None).unwrap());
}

#[test]
fn ensure_built_skips_existing_artifact() {
    let fx = Fixture::new(&["1"]);
    let mut build = open_with_image(&fx);
    std::fs::write(build.image_path().unwrap(), b"already here").unwrap();

    let mut producer = QemuProducer { calls: 0, payload: b"" };
    build.ensure_built(&mut producer, &[]).unwrap();
    build.ensure_built(&mut producer, &[]).unwrap();
    assert_eq!(producer.calls, 0);
}

#[test]
fn empty_build_result_is_not_an_error() {
    let fx = Fixture::new(&["1"]);
    let mut build = open_with_image(&fx);
    build.build(&mut NoopProducer, &["--fast".to_string()]).unwrap();
    assert_eq!(build.artifacts().count(), 0);
}

#[test]
fn producer_failure_propagates() {
    let fx = Fixture::new(&["1"]);
    let mut build = open_with_image(&fx);
    let err = build.build(&mut FailingProducer, &[]).unwrap_err();
    assert!(matches!(err, BuildError::Production { ref platform, .. } if platform == "aws"));
    assert_eq!(err.to_string(), "artifact production for platform aws failed");
    let cause = std::error::Error::source(&err).unwrap();
    assert!(cause.to_string().contains("upload rejected"));
}

#[test]
fn artifact_queries_require_image_name() {
    let fx = Fixture::new(&["1"]);
    let mut build = fx.open_id("1");
    assert!(matches!(build.has_artifact(), Err(BuildError::ImageNameUnset)));
    assert!(matches!(build.artifact_meta(None), Err(BuildError::ImageNameUnset)));

    build.set_image_name("x.raw");
    assert!(!build.has_artifact().unwrap());
}

#[test]
fn artifact_meta_for_named_file() {
    let fx = Fixture::new(&["1"]);
    let build = open_with_image(&fx);
    std::fs::write(build.build_dir().join("empty.raw"), b"").unwrap();
    let record = build.artifact_meta(Some("empty.raw")).unwrap();
    assert_eq!(record.path, "empty.raw");
    assert_eq!(record.size, 0);
    assert_eq!(
        record.sha256.to_hex(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert!(matches!(
        build.artifact_meta(Some("missing.raw")),
        Err(BuildError::ArtifactAccess { .. })
    ));
}

// ─── Scratch directories and working tree ───────────────────────────

#[test]
fn handles_get_distinct_scratch_dirs_removed_on_drop() {
    let fx = Fixture::new(&["2", "1"]);
    let a = fx.open_id("1");
    let b = fx.open_id("2");
    assert_ne!(a.tmpdir(), b.tmpdir());
    assert!(a.tmpdir().is_dir());
    assert!(b.tmpdir().is_dir());

    let (pa, pb) = (a.tmpdir().to_path_buf(), b.tmpdir().to_path_buf());
    drop(a);
    assert!(!pa.exists());
    assert!(pb.exists());
    b.close().unwrap();
    assert!(!pb.exists());
}

#[test]
fn process_paths_expose_workdir_and_scratch() {
    let fx = Fixture::new(&["1"]);
    let build = fx.open_id("1");
    let paths = build.process_paths();
    assert_eq!(paths.workdir, fx.root.path().join("work"));
    assert_eq!(paths.tmpdir, fx.root.path().join("work").join("tmp"));
    assert_eq!(paths.scratch, build.tmpdir());
}

#[test]
fn clean_removes_working_directory() {
    let fx = Fixture::new(&["1"]);
    let build = fx.open_id("1");
    std::fs::write(build.workdir().join("leftover"), b"x").unwrap();
    build.clean().unwrap();
    assert!(!fx.root.path().join("work").exists());
}
