//! Category 3: ambiguous target resolution

use super::{anomaly, Analysis};
use crate::finding::{Category, Finding};
use ebl_bundle::reading::{explicit_recursive, resolve_mode};
use ebl_bundle::OperationType;
use ebl_state::{Resolution, Target};

const CATEGORY: Category = Category::AmbiguousTargetResolution;

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let steps = match a.steps(CATEGORY) {
        Ok(steps) => steps,
        Err(anomaly) => return vec![anomaly],
    };

    let mut findings = Vec::new();
    for view in steps {
        let step = &view.step;
        let target = Target::parse(&step.target);

        // A sync selector is plural by declaration
        if step.operation == OperationType::Sync {
            continue;
        }
        // So is a declared recursive delete of a named subtree
        if step.operation == OperationType::Delete
            && !target.is_wildcard()
            && explicit_recursive(&step.payload, a.bundle.context_fields(), a.policy) == Some(true)
        {
            continue;
        }

        match view.state.resolve(&target, resolve_mode(step.operation)) {
            Ok(Resolution::Ambiguous(keys)) => findings.push(Finding::blocking(
                CATEGORY,
                step.target_path(),
                format!(
                    "{} target '{}' matches {} keys ({}); no first match is admissible",
                    step.operation,
                    step.target,
                    keys.len(),
                    keys.join(", ")
                ),
            )),
            Ok(_) => {}
            Err(e) => findings.push(anomaly(CATEGORY, step.target_path(), e)),
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bundle, snapshot};
    use crate::{Category, ContaminationDetector, Finding};
    use serde_json::{json, Value};

    fn findings(state: Value, op: &str, target: &str, payload: Value) -> Vec<Finding> {
        let b = bundle(json!({
            "operation_type": op,
            "target_resource": target,
            "payload": payload,
            "metadata": {},
            "context_fields": {"permissions": ["write", "sync"]}
        }));
        let s = snapshot(state, &b);
        ContaminationDetector::default().ambiguous_target_resolution(&b, &s)
    }

    fn two_files() -> Value {
        json!({"filesystem": {"/data/a.json": "x", "/data/b.json": "y"}})
    }

    #[test]
    fn wildcard_delete_matching_two_keys() {
        let f = findings(two_files(), "delete", "/data/*", json!({}));
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].category, Category::AmbiguousTargetResolution);
        assert!(f[0].explanation.contains("matches 2 keys"));
    }

    #[test]
    fn database_prefix_update() {
        let state = json!({"database": {
            "user_record/staging_001": {"status": "active"},
            "user_record/prod_001": {"status": "active"}
        }});
        let f = findings(state, "update", "user_record", json!({"status": "inactive"}));
        assert_eq!(f.len(), 1);
        assert!(f[0].explanation.contains("user_record/prod_001"));
    }

    #[test]
    fn exact_and_unique_are_clean() {
        assert!(findings(two_files(), "update", "/data/a.json", json!({})).is_empty());
        assert!(findings(two_files(), "delete", "/data/a*", json!({})).is_empty());
    }

    #[test]
    fn write_creates_literal_key() {
        assert!(findings(two_files(), "write", "/data", json!({"content": 1})).is_empty());
    }

    #[test]
    fn sync_and_declared_recursive_delete_are_plural_by_declaration() {
        assert!(findings(two_files(), "sync", "/data/*", json!({})).is_empty());
        assert!(findings(two_files(), "delete", "/data", json!({"recursive": true})).is_empty());
        // wildcard stays ambiguous even when recursion is declared
        assert_eq!(
            findings(two_files(), "delete", "/data/*", json!({"recursive": true})).len(),
            1
        );
    }
}
