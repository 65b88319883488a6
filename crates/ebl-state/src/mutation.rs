//! Mutations: the only way resource state changes

use crate::domain::Domain;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single change to resource state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert or replace a key
    Upsert {
        /// Map to write
        domain: Domain,
        /// Key to write
        key: String,
        /// New value
        value: Value,
    },

    /// Remove a key
    Remove {
        /// Map to remove from
        domain: Domain,
        /// Key to remove
        key: String,
    },

    /// Merge fields into an existing record
    Merge {
        /// Map holding the record
        domain: Domain,
        /// Record key
        key: String,
        /// Fields to merge
        fields: Map<String, Value>,
    },
}

impl Mutation {
    /// Create upsert mutation
    #[inline]
    #[must_use]
    pub fn upsert(domain: Domain, key: impl Into<String>, value: Value) -> Self {
        Self::Upsert {
            domain,
            key: key.into(),
            value,
        }
    }

    /// Create remove mutation
    #[inline]
    #[must_use]
    pub fn remove(domain: Domain, key: impl Into<String>) -> Self {
        Self::Remove {
            domain,
            key: key.into(),
        }
    }

    /// Create merge mutation
    #[inline]
    #[must_use]
    pub fn merge(domain: Domain, key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self::Merge {
            domain,
            key: key.into(),
            fields,
        }
    }

    /// Domain this mutation touches
    #[inline]
    #[must_use]
    pub fn domain(&self) -> Domain {
        match self {
            Self::Upsert { domain, .. } | Self::Remove { domain, .. } | Self::Merge { domain, .. } => {
                *domain
            }
        }
    }

    /// Key this mutation touches
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key, .. } | Self::Merge { key, .. } => key,
        }
    }
}

/// What applying a mutation actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationEffect {
    /// New key created
    Created,
    /// Existing key overwritten
    Replaced,
    /// Key removed
    Removed,
    /// Fields merged into an existing record
    Merged,
    /// Target absent; silently ignored
    Absorbed,
}

impl MutationEffect {
    /// Whether state changed
    #[inline]
    #[must_use]
    pub fn changed_state(self) -> bool {
        !matches!(self, Self::Absorbed)
    }
}
