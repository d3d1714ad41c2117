//! # cosa-core — Foundational Types for Build Bookkeeping
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! relies on when talking about a build and its outputs:
//!
//! - **Build references.** [`BuildRef`] distinguishes the `latest` sentinel
//!   from a concrete [`BuildId`], so resolution code cannot confuse the two.
//! - **Base architecture.** [`host_basearch()`] maps the compile target to the
//!   RPM-style names used in build directory layouts.
//! - **Content digests.** [`ContentDigest`] is a SHA-256 digest rendered as
//!   lowercase hex. [`sha256_file()`] streams a file in fixed 128 KiB chunks
//!   and never holds the whole file in memory.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cosa-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod arch;
pub mod digest;
pub mod error;
pub mod identity;

pub use arch::host_basearch;
pub use digest::{sha256_bytes, sha256_file, sha256_reader, ContentDigest, DIGEST_CHUNK_SIZE};
pub use error::CoreError;
pub use identity::{BuildId, BuildRef, LATEST};
