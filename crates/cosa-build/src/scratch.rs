//! # Scratch Directories and Process Paths
//!
//! Each [`Build`](crate::Build) owns a [`ScratchDir`]: a uniquely named
//! directory created when the build is opened and removed when it is
//! dropped. Removal on drop is best-effort; a failure is logged, never
//! raised. Callers that need to observe teardown errors use
//! [`ScratchDir::close()`].
//!
//! [`ProcessPaths`] carries the working directory and temp locations that
//! subprocesses expect in their environment. It is applied to each
//! [`Command`] explicitly; the current process environment is not touched.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::error::BuildError;

/// Name prefix of every scratch directory.
pub const SCRATCH_PREFIX: &str = "build_tmpd";

/// A per-build temporary directory, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create_in(root: &Path) -> Result<Self, BuildError> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "created scratch directory");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Location of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now, reporting failure.
    pub fn close(mut self) -> Result<(), BuildError> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(|source| BuildError::ScratchTeardown {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove temporary directory"
                );
            }
        }
    }
}

/// Paths a subprocess of a build expects in its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPaths {
    /// Broader working directory, exported as `workdir`.
    pub workdir: PathBuf,
    /// `<workdir>/tmp`, exported as `TMPDIR`.
    pub tmpdir: PathBuf,
    /// The build's scratch directory.
    pub scratch: PathBuf,
}

impl ProcessPaths {
    /// Paths for `workdir` and a scratch directory.
    pub fn new(workdir: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            tmpdir: workdir.join("tmp"),
            workdir,
            scratch: scratch.into(),
        }
    }

    /// Environment bindings to export to subprocesses.
    pub fn env(&self) -> [(&'static str, &OsStr); 2] {
        [
            ("workdir", self.workdir.as_os_str()),
            ("TMPDIR", self.tmpdir.as_os_str()),
        ]
    }

    /// Export the bindings on `cmd`.
    pub fn apply<'c>(&self, cmd: &'c mut Command) -> &'c mut Command {
        cmd.envs(self.env())
    }
}
