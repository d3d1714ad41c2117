//! # Content Digests — Streaming SHA-256
//!
//! Defines [`ContentDigest`], the SHA-256 digest recorded for every build
//! artifact, and the functions that compute it.
//!
//! ## Memory Invariant
//!
//! [`sha256_reader()`] and [`sha256_file()`] consume their input in fixed
//! [`DIGEST_CHUNK_SIZE`] reads straight from the underlying handle. Artifacts
//! are multi-gigabyte disk images; at no point is more than one chunk held in
//! memory.
//!
//! ## Wire Format
//!
//! A digest serializes as a 64-character lowercase hex string, which is the
//! form stored in the `sha256` field of artifact records in `meta.json`.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Size of each read when streaming file contents into the hasher.
pub const DIGEST_CHUNK_SIZE: usize = 128 * 1024;

/// A SHA-256 digest of some byte content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap a raw 32-byte digest value.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string (either case).
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        if hex.len() != 64 {
            return Err(CoreError::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, pair) in hex.as_bytes().chunks_exact(2).enumerate() {
            bytes[i] = (hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?;
        }
        Ok(Self { bytes })
    }
}

fn hex_nibble(c: u8) -> Result<u8, CoreError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(CoreError::InvalidDigest(format!(
            "non-hex character {:?}",
            char::from(c)
        ))),
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

fn finish(hasher: Sha256) -> ContentDigest {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentDigest::new(bytes)
}

/// Compute the SHA-256 digest of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finish(hasher)
}

/// Compute the SHA-256 digest of everything readable from `reader`.
///
/// Reads in [`DIGEST_CHUNK_SIZE`] pieces until EOF. Interrupted reads are
/// retried.
pub fn sha256_reader<R: Read>(mut reader: R) -> Result<ContentDigest, CoreError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(finish(hasher))
}

/// Compute the SHA-256 digest of a file, streaming its contents.
///
/// The file is read through an unbuffered [`File`] handle; each read
/// requests exactly one chunk.
pub fn sha256_file(path: &Path) -> Result<ContentDigest, CoreError> {
    let file = File::open(path)?;
    sha256_reader(file)
}
