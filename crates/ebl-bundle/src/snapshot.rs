//! Context snapshots
//!
//! A snapshot is taken once per evaluation: a copy of both resource maps
//! plus the permissions and execution mode derived from the caller's
//! declared context. Nothing in it is read from external I/O.

use crate::bundle::ActionBundle;
use crate::policy::GatePolicy;
use ebl_state::ResourceState;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// How the caller asked to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Mutate on ALLOW
    #[default]
    Normal,
    /// Evaluate only
    DryRun,
    /// Caller claims elevation (does not grant capabilities)
    Elevated,
}

impl ExecutionMode {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::DryRun => "dry-run",
            Self::Elevated => "elevated",
        }
    }

    /// Read from a context value; absent is normal, unrecognised is dry-run
    #[must_use]
    pub fn from_context(value: Option<&Value>) -> Self {
        match value {
            None => Self::Normal,
            Some(Value::String(s)) => match s.as_str() {
                "normal" => Self::Normal,
                "dry-run" | "dry_run" => Self::DryRun,
                "elevated" => Self::Elevated,
                _ => Self::DryRun,
            },
            Some(_) => Self::DryRun,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable capture of state and permissions at evaluation time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    state: ResourceState,
    permissions: BTreeSet<String>,
    execution_mode: ExecutionMode,
}

impl ContextSnapshot {
    /// Build from explicit parts
    #[must_use]
    pub fn new(
        state: ResourceState,
        permissions: BTreeSet<String>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            state,
            permissions,
            execution_mode,
        }
    }

    /// Capture from live state and a bundle's context fields
    ///
    /// Permissions are `context_fields.permissions` plus whatever the
    /// policy grants `user_role` (or `role`). Missing or mistyped data
    /// grants nothing.
    #[must_use]
    pub fn capture(
        state: &ResourceState,
        context_fields: &Map<String, Value>,
        policy: &GatePolicy,
    ) -> Self {
        let mut permissions = BTreeSet::new();

        if let Some(Value::Array(items)) = context_fields.get("permissions") {
            permissions.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
        }

        let role = context_fields
            .get("user_role")
            .or_else(|| context_fields.get("role"))
            .and_then(Value::as_str);
        if let Some(role) = role {
            permissions.extend(policy.role_capabilities(role).iter().cloned());
        }

        Self {
            state: state.clone(),
            permissions,
            execution_mode: ExecutionMode::from_context(context_fields.get("execution_mode")),
        }
    }

    /// Capture for a specific bundle
    #[inline]
    #[must_use]
    pub fn for_bundle(state: &ResourceState, bundle: &ActionBundle, policy: &GatePolicy) -> Self {
        Self::capture(state, bundle.context_fields(), policy)
    }

    /// Captured state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    /// Captured filesystem map
    #[inline]
    #[must_use]
    pub fn filesystem(&self) -> &IndexMap<String, Value> {
        self.state.filesystem()
    }

    /// Captured database map
    #[inline]
    #[must_use]
    pub fn database(&self) -> &IndexMap<String, Value> {
        self.state.database()
    }

    /// Granted capability tags
    #[inline]
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Whether a capability is granted
    #[inline]
    #[must_use]
    pub fn has_permission(&self, capability: &str) -> bool {
        self.permissions.contains(capability)
    }

    /// Requested execution mode
    #[inline]
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }
}
