//! The admissibility gate

use crate::decision::Decision;
use crate::detectors::ContaminationDetector;
use ebl_bundle::{ActionBundle, ContextSnapshot, GatePolicy};
use std::sync::Arc;

/// Decides whether a bundle may execute
///
/// The single seam executors depend on. Implementations must be pure:
/// no shared mutable state, no I/O, no randomness.
pub trait Gate: Send + Sync {
    /// Evaluate a bundle against a snapshot
    fn evaluate(&self, bundle: &ActionBundle, snapshot: &ContextSnapshot) -> Decision;
}

impl<G: Gate + ?Sized> Gate for Arc<G> {
    fn evaluate(&self, bundle: &ActionBundle, snapshot: &ContextSnapshot) -> Decision {
        (**self).evaluate(bundle, snapshot)
    }
}

impl<G: Gate + ?Sized> Gate for Box<G> {
    fn evaluate(&self, bundle: &ActionBundle, snapshot: &ContextSnapshot) -> Decision {
        (**self).evaluate(bundle, snapshot)
    }
}

/// Gate backed by the six-category contamination detector
///
/// Every category always runs, so the finding list is complete even after
/// the first blocking finding. Internal anomalies arrive as blocking
/// findings; nothing escapes `evaluate` as an error.
#[derive(Debug, Clone, Default)]
pub struct AdmissibilityGate {
    detector: ContaminationDetector,
}

impl AdmissibilityGate {
    /// Create gate over a policy
    #[must_use]
    pub fn new(policy: Arc<GatePolicy>) -> Self {
        Self {
            detector: ContaminationDetector::new(policy),
        }
    }

    /// Create gate owning a policy
    #[must_use]
    pub fn with_policy(policy: GatePolicy) -> Self {
        Self::new(Arc::new(policy))
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        self.detector.policy()
    }

    /// Underlying detector
    #[inline]
    #[must_use]
    pub fn detector(&self) -> &ContaminationDetector {
        &self.detector
    }
}

impl Gate for AdmissibilityGate {
    fn evaluate(&self, bundle: &ActionBundle, snapshot: &ContextSnapshot) -> Decision {
        Decision::from_findings(self.detector.detect(bundle, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{bundle, snapshot};
    use crate::{Category, Verdict};
    use ebl_bundle::OperationType;
    use serde_json::{json, Map};

    #[test]
    fn clean_write_is_allowed() {
        let b = bundle(json!({
            "operation_type": "write",
            "target_resource": "/data/new.json",
            "payload": {"content": "v1"},
            "metadata": {},
            "context_fields": {"permissions": ["write"]}
        }));
        let s = snapshot(json!({}), &b);
        let d = AdmissibilityGate::default().evaluate(&b, &s);
        assert_eq!(d.verdict(), Verdict::Allow);
        assert!(d.findings().is_empty());
    }

    #[test]
    fn findings_are_complete_and_in_category_order() {
        // No permissions, ambiguous wildcard, raw-prefix recursion past the match
        let b = bundle(json!({
            "operation_type": "delete",
            "target_resource": "/data/*.json",
            "payload": {},
            "metadata": {},
            "context_fields": {}
        }));
        let s = snapshot(
            json!({"filesystem": {"/data/a.json": "x", "/data/a.json.bak": "z", "/data/b.json": "y"}}),
            &b,
        );
        let d = AdmissibilityGate::default().evaluate(&b, &s);
        assert_eq!(d.verdict(), Verdict::Deny);
        assert_eq!(
            d.categories(),
            vec![
                Category::ImplicitAuthorityEscalation,
                Category::HiddenDefaultScopeExpansion,
                Category::AmbiguousTargetResolution,
            ]
        );
    }

    #[test]
    fn undecomposable_bundle_fails_closed() {
        let b = ActionBundle::new(
            OperationType::Batch,
            "/data",
            Map::new(),
            Map::new(),
            Map::new(),
        );
        let s = snapshot(json!({}), &b);
        let d = AdmissibilityGate::default().evaluate(&b, &s);
        assert_eq!(d.verdict(), Verdict::Deny);
        assert_eq!(
            d.categories(),
            vec![
                Category::ImplicitAuthorityEscalation,
                Category::HiddenDefaultScopeExpansion,
                Category::AmbiguousTargetResolution,
                Category::DescriptiveFieldSideEffects,
            ]
        );
        assert!(d.findings().iter().all(|f| f.explanation.contains("anomaly")));
    }

    #[test]
    fn consistent_overload_is_held() {
        let b = bundle(json!({
            "operation_type": "write",
            "target_resource": "/data/config.json",
            "payload": {"content": "v2"},
            "metadata": {"environment": "staging"},
            "context_fields": {"permissions": ["write"], "environment": "staging"}
        }));
        let s = snapshot(json!({"filesystem": {"/data/config.json": "v1"}}), &b);
        assert_eq!(
            AdmissibilityGate::default().evaluate(&b, &s).verdict(),
            Verdict::Hold
        );
    }

    #[test]
    fn gate_is_usable_as_trait_object() {
        let gate: Arc<dyn Gate> = Arc::new(AdmissibilityGate::default());
        let b = bundle(json!({
            "operation_type": "write",
            "target_resource": "/a",
            "payload": {},
            "metadata": {},
            "context_fields": {}
        }));
        let s = snapshot(json!({}), &b);
        assert_eq!(gate.evaluate(&b, &s).verdict(), Verdict::Deny);
    }
}
