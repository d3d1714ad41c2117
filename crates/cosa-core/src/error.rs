//! # Error Types
//!
//! Errors raised by the foundational types. Higher layers wrap these into
//! their own hierarchies with `#[from]`.

use thiserror::Error;

/// Error from a `cosa-core` primitive.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A hex string could not be decoded into a SHA-256 digest.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// A build identifier failed validation.
    #[error("invalid build id {id:?}: {reason}")]
    InvalidBuildId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// IO error while reading digest input.
    #[error("io error")]
    Io(#[from] std::io::Error),
}
