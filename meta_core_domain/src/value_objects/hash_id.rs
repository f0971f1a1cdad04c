//! Content-derived identifier used as the canonical cross-reference between
//! a `FileRecord` and the metadata persisted for it in the key/value store.
//!
//! Unlike `TaskId`, this is not a ULID: it is the lowercase hex SHA-256
//! digest computed by the fast or background pipeline stage (midhash or
//! full-file hash), so that it is stable across restarts and derivable from
//! file content alone.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::CoreError;

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashId(String);

impl HashId {
    /// Wraps a precomputed hex digest, validating its shape.
    pub fn from_hex(digest: impl Into<String>) -> Result<Self, CoreError> {
        let digest = digest.into();
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::invalid_config(format!(
                "hash id must be a 64-character hex SHA-256 digest, got {digest:?}"
            )));
        }
        Ok(Self(digest.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for HashId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
