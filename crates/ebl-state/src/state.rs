//! Resource state: two insertion-ordered key→value maps

use crate::domain::{Domain, Target};
use crate::error::StateError;
use crate::mutation::{Mutation, MutationEffect};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// How a non-wildcard selector that names no existing key is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// The literal key is the target (it will be created)
    Create,
    /// Fall back to the keys under `selector/`
    Existing,
}

/// Outcome of resolving a target against live keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Selector names the key directly
    Exact(String),
    /// Wildcard or prefix lookup hit exactly one key
    Unique(String),
    /// Wildcard or prefix lookup hit several keys, in insertion order
    Ambiguous(Vec<String>),
    /// Nothing matched
    Missing,
}

impl Resolution {
    /// First candidate in insertion order
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Exact(k) | Self::Unique(k) => Some(k),
            Self::Ambiguous(keys) => keys.first().map(String::as_str),
            Self::Missing => None,
        }
    }

    /// Every candidate key
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Exact(k) | Self::Unique(k) => vec![k.as_str()],
            Self::Ambiguous(keys) => keys.iter().map(String::as_str).collect(),
            Self::Missing => Vec::new(),
        }
    }

    /// Whether more than one key matched
    #[inline]
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }

    fn from_matches(mut matches: Vec<String>) -> Self {
        match matches.len() {
            0 => Self::Missing,
            1 => Self::Unique(matches.remove(0)),
            _ => Self::Ambiguous(matches),
        }
    }
}

/// Filesystem-like and database-like state
///
/// Exclusively owns both maps. Equality ignores key order; [`digest`]
/// does not.
///
/// [`digest`]: ResourceState::digest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    filesystem: IndexMap<String, Value>,
    #[serde(default)]
    database: IndexMap<String, Value>,
}

impl ResourceState {
    /// Create empty state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pre-populated maps
    #[must_use]
    pub fn from_maps(
        filesystem: IndexMap<String, Value>,
        database: IndexMap<String, Value>,
    ) -> Self {
        Self {
            filesystem,
            database,
        }
    }

    /// Decode a `{"filesystem": {..}, "database": {..}}` document
    pub fn from_json(input: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Filesystem map
    #[inline]
    #[must_use]
    pub fn filesystem(&self) -> &IndexMap<String, Value> {
        &self.filesystem
    }

    /// Database map
    #[inline]
    #[must_use]
    pub fn database(&self) -> &IndexMap<String, Value> {
        &self.database
    }

    /// Map for a domain
    #[inline]
    #[must_use]
    pub fn map(&self, domain: Domain) -> &IndexMap<String, Value> {
        match domain {
            Domain::Filesystem => &self.filesystem,
            Domain::Database => &self.database,
        }
    }

    fn map_mut(&mut self, domain: Domain) -> &mut IndexMap<String, Value> {
        match domain {
            Domain::Filesystem => &mut self.filesystem,
            Domain::Database => &mut self.database,
        }
    }

    /// Read a value
    #[inline]
    #[must_use]
    pub fn get(&self, domain: Domain, key: &str) -> Option<&Value> {
        self.map(domain).get(key)
    }

    /// Whether a key exists
    #[inline]
    #[must_use]
    pub fn contains(&self, domain: Domain, key: &str) -> bool {
        self.map(domain).contains_key(key)
    }

    /// Total number of keys across both maps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.filesystem.len() + self.database.len()
    }

    /// Whether both maps are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filesystem.is_empty() && self.database.is_empty()
    }

    /// Resolve a target against live keys
    ///
    /// Exact match first. Wildcards and (in [`ResolveMode::Existing`])
    /// children of `selector/` yield every match in insertion order.
    pub fn resolve(&self, target: &Target, mode: ResolveMode) -> Result<Resolution, StateError> {
        let domain = target.domain();

        if target.is_wildcard() {
            let matcher = target.matcher()?;
            let matches = self
                .map(domain)
                .keys()
                .filter(|k| matcher.is_match(k))
                .cloned()
                .collect();
            return Ok(Resolution::from_matches(matches));
        }

        if self.contains(domain, target.selector()) || mode == ResolveMode::Create {
            return Ok(Resolution::Exact(target.selector().to_string()));
        }

        Ok(Resolution::from_matches(
            self.children(domain, target.root()),
        ))
    }

    /// Every key a selector names: wildcard matches, or the exact key plus
    /// its children
    pub fn select(&self, target: &Target) -> Result<Vec<String>, StateError> {
        if target.is_wildcard() {
            let matcher = target.matcher()?;
            return Ok(self
                .map(target.domain())
                .keys()
                .filter(|k| matcher.is_match(k))
                .cloned()
                .collect());
        }

        Ok(self.subtree(target.domain(), target.root()))
    }

    /// Keys starting with `prefix` as a raw string (no separator awareness)
    #[must_use]
    pub fn keys_with_prefix(&self, domain: Domain, prefix: &str) -> Vec<String> {
        self.map(domain)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// The key `root` itself (if present) plus every key under `root/`
    #[must_use]
    pub fn subtree(&self, domain: Domain, root: &str) -> Vec<String> {
        let dir = format!("{}/", root.trim_end_matches('/'));
        self.map(domain)
            .keys()
            .filter(|k| k.as_str() == root || k.starts_with(&dir))
            .cloned()
            .collect()
    }

    fn children(&self, domain: Domain, root: &str) -> Vec<String> {
        let dir = format!("{}/", root.trim_end_matches('/'));
        self.map(domain)
            .keys()
            .filter(|k| k.starts_with(&dir))
            .cloned()
            .collect()
    }

    /// Apply one mutation
    ///
    /// Removing or merging into an absent key is absorbed without error.
    pub fn apply(&mut self, mutation: &Mutation) -> MutationEffect {
        match mutation {
            Mutation::Upsert { domain, key, value } => {
                match self.map_mut(*domain).insert(key.clone(), value.clone()) {
                    Some(_) => MutationEffect::Replaced,
                    None => MutationEffect::Created,
                }
            }
            Mutation::Remove { domain, key } => match self.map_mut(*domain).shift_remove(key) {
                Some(_) => MutationEffect::Removed,
                None => MutationEffect::Absorbed,
            },
            Mutation::Merge {
                domain,
                key,
                fields,
            } => match self.map_mut(*domain).get_mut(key) {
                None => MutationEffect::Absorbed,
                Some(Value::Object(record)) => {
                    for (name, value) in fields {
                        record.insert(name.clone(), value.clone());
                    }
                    MutationEffect::Merged
                }
                Some(other) => {
                    *other = Value::Object(fields.clone());
                    MutationEffect::Replaced
                }
            },
        }
    }

    /// SHA-256 over every entry in order; equal digests mean identical state
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for domain in [Domain::Filesystem, Domain::Database] {
            hasher.update(domain.as_str().as_bytes());
            hasher.update([0u8]);
            for (key, value) in self.map(domain) {
                hasher.update(key.as_bytes());
                hasher.update([0u8]);
                hasher.update(value.to_string().as_bytes());
                hasher.update([0u8]);
            }
            hasher.update([1u8]);
        }
        hex::encode(hasher.finalize())
    }
}
