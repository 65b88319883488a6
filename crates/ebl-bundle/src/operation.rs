//! Operation types

use crate::error::BundleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The enumerated operations a bundle may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Upsert target key with payload content
    Write,
    /// Remove target key (and, recursively, keys it prefixes)
    Delete,
    /// Merge payload into an existing record
    Update,
    /// Ordered list of sub-operations
    Batch,
    /// Copy selected keys between filesystem and database
    Sync,
}

impl OperationType {
    /// Every operation type
    pub const ALL: [Self; 5] = [
        Self::Write,
        Self::Delete,
        Self::Update,
        Self::Batch,
        Self::Sync,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Batch => "batch",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| BundleError::UnknownOperation(s.to_string()))
    }
}
