//! Gate policy tables
//!
//! The authority, scope, field and ordering tables the detectors consult.
//! They are explicit, versioned configuration loaded from TOML; the
//! built-in [`Default`] matches `policy/default.toml`.

use crate::error::PolicyError;
use crate::operation::OperationType;
use ebl_state::{Domain, Target};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current policy format version
pub const POLICY_VERSION: u32 = 1;

/// Versioned gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    /// Format version
    pub version: u32,

    /// Capability rules, evaluated in order
    pub authority: Vec<AuthorityRule>,

    /// Role name to granted capabilities
    pub roles: BTreeMap<String, Vec<String>>,

    /// Fields that explicitly declare a needed capability
    pub elevation_fields: Vec<String>,

    /// Recursion defaults
    pub scope: ScopePolicy,

    /// Field whitelists and domain tags
    pub fields: FieldPolicy,

    /// Ordering field names
    pub ordering: OrderingPolicy,

    /// Descriptive triggers the naive model honours
    pub side_effects: SideEffectPolicy,

    /// Sync field names
    pub sync: SyncPolicy,
}

impl GatePolicy {
    /// Parse a TOML policy document
    pub fn from_toml_str(input: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a TOML policy file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| PolicyError::io_error(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Capabilities an operation on a target requires, deduplicated in rule
    /// order
    #[must_use]
    pub fn required_capabilities(&self, operation: OperationType, target: &Target) -> Vec<String> {
        let mut caps: Vec<String> = Vec::new();
        for rule in &self.authority {
            if rule.matches(operation, target) && !caps.contains(&rule.capability) {
                caps.push(rule.capability.clone());
            }
        }
        caps
    }

    /// Capabilities granted by a role (empty when unknown)
    #[must_use]
    pub fn role_capabilities(&self, role: &str) -> &[String] {
        self.roles.get(role).map_or(&[], Vec::as_slice)
    }

    /// Domain tag of a field, if whitelisted
    #[must_use]
    pub fn field_tag(&self, field: &str) -> Option<FieldDomain> {
        self.fields.tags.get(field).copied()
    }

    /// Whether a payload field is whitelisted as descriptive
    #[inline]
    #[must_use]
    pub fn is_descriptive(&self, field: &str) -> bool {
        self.fields.descriptive.iter().any(|f| f == field)
    }

    /// Whether a metadata field names an ordering concept
    #[inline]
    #[must_use]
    pub fn is_ordering_field(&self, field: &str) -> bool {
        self.ordering.fields.iter().any(|f| f == field)
    }

    /// Whether a field is an elevation declaration
    #[inline]
    #[must_use]
    pub fn is_elevation_field(&self, field: &str) -> bool {
        self.elevation_fields.iter().any(|f| f == field)
    }

    /// Replace the authority table
    #[must_use]
    pub fn with_authority(mut self, authority: Vec<AuthorityRule>) -> Self {
        self.authority = authority;
        self
    }

    /// Add or replace a role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>, capabilities: Vec<String>) -> Self {
        self.roles.insert(role.into(), capabilities);
        self
    }

    /// Set the naive recursion default
    #[must_use]
    pub fn with_naive_recursive(mut self, recursive: bool) -> Self {
        self.scope.naive_default = recursive;
        self
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        use OperationType::{Delete, Sync, Update, Write};

        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

        let roles = [
            ("read_only", strings(&["read"])),
            ("editor", strings(&["read", "write"])),
            ("operator", strings(&["read", "write", "sync"])),
            (
                "admin",
                strings(&["read", "write", "sync", "admin", "shared:write"]),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let tags = [
            ("content", FieldDomain::Operational),
            ("recursive", FieldDomain::Operational),
            ("direction", FieldDomain::Operational),
            ("operations", FieldDomain::Operational),
            ("description", FieldDomain::Descriptive),
            ("comment", FieldDomain::Descriptive),
            ("notes", FieldDomain::Descriptive),
            ("label", FieldDomain::Descriptive),
            ("title", FieldDomain::Descriptive),
            ("priority", FieldDomain::Descriptive),
            ("environment", FieldDomain::Session),
            ("permissions", FieldDomain::Session),
            ("user_role", FieldDomain::Session),
            ("role", FieldDomain::Session),
            ("execution_mode", FieldDomain::Session),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            version: POLICY_VERSION,
            authority: vec![
                AuthorityRule::new(vec![Write, Delete, Update], Some(Domain::Filesystem), "/", "write"),
                AuthorityRule::new(vec![Write, Delete, Update], Some(Domain::Database), "", "write"),
                AuthorityRule::new(vec![Sync], None, "", "sync"),
                AuthorityRule::new(Vec::new(), Some(Domain::Filesystem), "/system/", "admin"),
                AuthorityRule::new(Vec::new(), Some(Domain::Filesystem), "/shared/", "shared:write"),
            ],
            roles,
            elevation_fields: strings(&["elevation", "required_capabilities"]),
            scope: ScopePolicy::default(),
            fields: FieldPolicy {
                descriptive: strings(&["description", "comment", "notes", "label", "title", "priority"]),
                operational: strings(&["content", "recursive", "direction", "operations"]),
                content_field: "content".to_string(),
                tags,
            },
            ordering: OrderingPolicy::default(),
            side_effects: SideEffectPolicy::default(),
            sync: SyncPolicy::default(),
        }
    }
}

/// One authority table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRule {
    /// Operations the rule covers (empty covers all)
    #[serde(default)]
    pub operations: Vec<OperationType>,

    /// Domain the rule covers (absent covers both)
    #[serde(default)]
    pub domain: Option<Domain>,

    /// Selector prefix
    #[serde(default)]
    pub prefix: String,

    /// Capability required when the rule matches
    pub capability: String,
}

impl AuthorityRule {
    /// Create rule
    #[must_use]
    pub fn new(
        operations: Vec<OperationType>,
        domain: Option<Domain>,
        prefix: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        Self {
            operations,
            domain,
            prefix: prefix.into(),
            capability: capability.into(),
        }
    }

    /// Whether the rule applies to an operation on a target
    #[must_use]
    pub fn matches(&self, operation: OperationType, target: &Target) -> bool {
        (self.operations.is_empty() || self.operations.contains(&operation))
            && self.domain.map_or(true, |d| d == target.domain())
            && target.selector().starts_with(&self.prefix)
    }
}

/// Semantic domain a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDomain {
    /// Drives mutation
    Operational,
    /// Free text, labels, annotations
    Descriptive,
    /// Caller session and environment
    Session,
}

impl FieldDomain {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Descriptive => "descriptive",
            Self::Session => "session",
        }
    }
}

/// Recursion field and its naive default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopePolicy {
    /// Field that declares recursion
    pub recursive_field: String,
    /// What the naive model assumes when the field is absent
    pub naive_default: bool,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self {
            recursive_field: "recursive".to_string(),
            naive_default: true,
        }
    }
}

/// Field whitelists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPolicy {
    /// Payload fields that must never drive mutation
    pub descriptive: Vec<String>,
    /// Payload fields that legitimately drive mutation
    pub operational: Vec<String>,
    /// Payload field holding the value a write stores
    pub content_field: String,
    /// Field name to semantic domain
    pub tags: BTreeMap<String, FieldDomain>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            descriptive: Vec::new(),
            operational: Vec::new(),
            content_field: "content".to_string(),
            tags: BTreeMap::new(),
        }
    }
}

/// Ordering vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingPolicy {
    /// Field names that describe order, priority or sequence
    pub fields: Vec<String>,
    /// Flag that makes the naive model sort batch steps by operation name
    pub sort_flag: String,
    /// Fields checked first for an explicit index sequence
    pub sequence_fields: Vec<String>,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            fields: strings(&[
                "order",
                "sequence",
                "execution_order",
                "priority",
                "optimize",
                "sort",
                "position",
            ]),
            sort_flag: "optimize".to_string(),
            sequence_fields: strings(&["execution_order", "order", "sequence"]),
        }
    }
}

/// Descriptive trigger that the naive model treats as a log rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideEffectPolicy {
    /// Descriptive field checked
    pub rotation_field: String,
    /// Value that triggers rotation
    pub rotation_value: String,
    /// Rotated keys live under this prefix
    pub rotation_prefix: String,
    /// Rotated keys end with this suffix
    pub rotation_suffix: String,
}

impl Default for SideEffectPolicy {
    fn default() -> Self {
        Self {
            rotation_field: "priority".to_string(),
            rotation_value: "critical".to_string(),
            rotation_prefix: "/logs/".to_string(),
            rotation_suffix: ".old".to_string(),
        }
    }
}

/// Sync field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Field naming the destination namespace
    pub environment_field: String,
    /// Field naming the copy direction
    pub direction_field: String,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            environment_field: "environment".to_string(),
            direction_field: "direction".to_string(),
        }
    }
}
