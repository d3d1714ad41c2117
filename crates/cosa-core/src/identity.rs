//! # Build Identity
//!
//! A build is requested either by a concrete identifier (`35.20220101.0`) or
//! by the `latest` sentinel, which the build index resolves to the most
//! recent build. [`BuildRef`] keeps the two apart so that resolution code
//! never treats the sentinel as a real id.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Sentinel accepted in place of a build id to select the newest build.
pub const LATEST: &str = "latest";

/// A concrete build identifier, e.g. `35.20220101.0`.
///
/// Identifiers name a directory under the builds root, so they must be
/// non-empty and contain no path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildId(String);

impl BuildId {
    /// Validate and wrap a build identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if id == LATEST {
            Some("\"latest\" is a sentinel, not an id")
        } else if id.contains('/') || id.contains('\\') {
            Some("must not contain path separators")
        } else if id == "." || id == ".." {
            Some("must not be a relative path component")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CoreError::InvalidBuildId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BuildId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BuildId> for String {
    fn from(id: BuildId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request for a build: either the newest one or a specific id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildRef {
    /// Resolve to the most recent build in the index.
    Latest,
    /// A specific build.
    Id(BuildId),
}

impl Default for BuildRef {
    fn default() -> Self {
        Self::Latest
    }
}

impl FromStr for BuildRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LATEST {
            Ok(Self::Latest)
        } else {
            BuildId::new(s).map(Self::Id)
        }
    }
}

impl std::fmt::Display for BuildRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Id(id) => id.fmt(f),
        }
    }
}
