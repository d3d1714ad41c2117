//! # Atomic Document Writer
//!
//! Write-then-rename persistence for JSON documents. The new content is
//! written to a temporary file in the destination's directory, synced,
//! given [`DOCUMENT_MODE`] permissions, and renamed over the destination.
//! Readers observe either the old file or the complete new one.
//!
//! Concurrent writers are not serialized: the last rename wins.

use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

/// Permission bits applied to persisted documents (owner rw, others r).
pub const DOCUMENT_MODE: u32 = 0o644;

/// Atomically replace `path` with the pretty-printed JSON of `value`.
///
/// Output uses four-space indentation. If any step fails the temporary file
/// is removed and `path` is left untouched.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    set_document_mode(tmp.as_file())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_document_mode(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(DOCUMENT_MODE))
}

#[cfg(not(unix))]
fn set_document_mode(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
