//! Verdicts and decisions

use crate::finding::{Category, Finding};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Safe to execute as declared
    Allow,
    /// Pause for clarification
    Hold,
    /// Block
    Deny,
}

impl Verdict {
    /// Verdict a finding list forces
    ///
    /// No findings: ALLOW. Only correctable: HOLD. Any blocking: DENY.
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.is_empty() {
            Self::Allow
        } else if findings.iter().any(Finding::is_blocking) {
            Self::Deny
        } else {
            Self::Hold
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Hold => "HOLD",
            Self::Deny => "DENY",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict plus the findings that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    verdict: Verdict,
    findings: Vec<Finding>,
}

impl Decision {
    /// Create decision with an explicit verdict
    ///
    /// For gate implementations that decide by other means; the detector
    /// path uses [`from_findings`](Self::from_findings).
    #[must_use]
    pub fn new(verdict: Verdict, findings: Vec<Finding>) -> Self {
        Self { verdict, findings }
    }

    /// ALLOW with no findings
    #[inline]
    #[must_use]
    pub fn allow() -> Self {
        Self::new(Verdict::Allow, Vec::new())
    }

    /// Decide from findings
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            verdict: Verdict::from_findings(&findings),
            findings,
        }
    }

    /// Verdict
    #[inline]
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Findings in category order
    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Whether execution may proceed
    #[inline]
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    /// Distinct categories present, in order
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        let mut out: Vec<Category> = Vec::new();
        for f in &self.findings {
            if !out.contains(&f.category) {
                out.push(f.category);
            }
        }
        out
    }

    /// Take the findings
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_allow() {
        let d = Decision::from_findings(Vec::new());
        assert_eq!(d.verdict(), Verdict::Allow);
        assert!(d.is_allow());
        assert_eq!(d, Decision::allow());
    }

    #[test]
    fn correctable_only_is_hold() {
        let d = Decision::from_findings(vec![Finding::correctable(
            Category::CrossDomainFieldOverload,
            "metadata.environment",
            "same value in two sections",
        )]);
        assert_eq!(d.verdict(), Verdict::Hold);
    }

    #[test]
    fn any_blocking_is_deny() {
        let d = Decision::from_findings(vec![
            Finding::correctable(Category::CrossDomainFieldOverload, "a", "x"),
            Finding::blocking(Category::AmbiguousTargetResolution, "b", "y"),
            Finding::blocking(Category::AmbiguousTargetResolution, "c", "z"),
        ]);
        assert_eq!(d.verdict(), Verdict::Deny);
        assert_eq!(
            d.categories(),
            vec![
                Category::CrossDomainFieldOverload,
                Category::AmbiguousTargetResolution
            ]
        );
    }

    #[test]
    fn verdict_wire_names() {
        assert_eq!(serde_json::to_string(&Verdict::Hold).unwrap(), "\"HOLD\"");
        let v: Verdict = serde_json::from_str("\"DENY\"").unwrap();
        assert_eq!(v, Verdict::Deny);
        assert_eq!(
            serde_json::to_string(&Category::MetadataExecutionOrdering).unwrap(),
            "\"metadata_execution_ordering\""
        );
    }
}
