//! Contamination findings

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six contamination categories, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Operation needs a capability the caller neither holds nor declares
    ImplicitAuthorityEscalation,
    /// Defaulted recursion reaches beyond the declared keys
    HiddenDefaultScopeExpansion,
    /// Target matches more than one key
    AmbiguousTargetResolution,
    /// Metadata steers the order of steps
    MetadataExecutionOrdering,
    /// Descriptive text changes what gets mutated
    DescriptiveFieldSideEffects,
    /// One field name carries different meanings across sections
    CrossDomainFieldOverload,
}

impl Category {
    /// Every category, in evaluation order
    pub const ALL: [Self; 6] = [
        Self::ImplicitAuthorityEscalation,
        Self::HiddenDefaultScopeExpansion,
        Self::AmbiguousTargetResolution,
        Self::MetadataExecutionOrdering,
        Self::DescriptiveFieldSideEffects,
        Self::CrossDomainFieldOverload,
    ];

    /// Category number (1-6)
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::ImplicitAuthorityEscalation => 1,
            Self::HiddenDefaultScopeExpansion => 2,
            Self::AmbiguousTargetResolution => 3,
            Self::MetadataExecutionOrdering => 4,
            Self::DescriptiveFieldSideEffects => 5,
            Self::CrossDomainFieldOverload => 6,
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImplicitAuthorityEscalation => "implicit_authority_escalation",
            Self::HiddenDefaultScopeExpansion => "hidden_default_scope_expansion",
            Self::AmbiguousTargetResolution => "ambiguous_target_resolution",
            Self::MetadataExecutionOrdering => "metadata_execution_ordering",
            Self::DescriptiveFieldSideEffects => "descriptive_field_side_effects",
            Self::CrossDomainFieldOverload => "cross_domain_field_overload",
        }
    }

    /// Human-readable title
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::ImplicitAuthorityEscalation => "Implicit Authority Escalation",
            Self::HiddenDefaultScopeExpansion => "Hidden Default Scope Expansion",
            Self::AmbiguousTargetResolution => "Ambiguous Target Resolution",
            Self::MetadataExecutionOrdering => "Metadata Execution Ordering",
            Self::DescriptiveFieldSideEffects => "Descriptive Field Side Effects",
            Self::CrossDomainFieldOverload => "Cross-Domain Field Overload",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Resubmission with a clarified bundle may succeed; eligible for HOLD
    Correctable,
    /// Forces DENY
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Correctable => "correctable",
            Self::Blocking => "blocking",
        })
    }
}

/// One detected contamination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Category that raised it
    pub category: Category,
    /// Bundle field responsible (dotted path)
    pub field_path: String,
    /// What the naive reading would do
    pub explanation: String,
    /// Correctable or blocking
    pub severity: Severity,
}

impl Finding {
    /// Create finding
    #[must_use]
    pub fn new(
        category: Category,
        field_path: impl Into<String>,
        explanation: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            category,
            field_path: field_path.into(),
            explanation: explanation.into(),
            severity,
        }
    }

    /// Create blocking finding
    #[inline]
    #[must_use]
    pub fn blocking(
        category: Category,
        field_path: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self::new(category, field_path, explanation, Severity::Blocking)
    }

    /// Create correctable finding
    #[inline]
    #[must_use]
    pub fn correctable(
        category: Category,
        field_path: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self::new(category, field_path, explanation, Severity::Correctable)
    }

    /// Whether this forces DENY
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) at {}: {}",
            self.category.number(),
            self.category.title(),
            self.severity,
            self.field_path,
            self.explanation
        )
    }
}
