//! Content-addressed identifiers for stored records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CoreError;

/// Unique identifier for a record.
///
/// The identifier is derived from the record's state-point, so two records
/// with the same state-point always share one id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Number of hex characters kept from the digest.
    pub const LEN: usize = 32;

    /// Hash the canonical JSON encoding of `value`.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, CoreError> {
        let bytes = serde_json::to_vec(value)?;
        let mut digest = hex::encode(Sha256::digest(&bytes));
        digest.truncate(Self::LEN);
        Ok(Self(digest))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RecordId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::LEN && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(CoreError::InvalidId(s.to_string()))
        }
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
