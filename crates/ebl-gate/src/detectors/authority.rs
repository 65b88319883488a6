//! Category 1: implicit authority escalation

use super::Analysis;
use crate::finding::{Category, Finding};
use ebl_bundle::GatePolicy;
use ebl_state::Target;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const CATEGORY: Category = Category::ImplicitAuthorityEscalation;

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let steps = match a.steps(CATEGORY) {
        Ok(steps) => steps,
        Err(anomaly) => return vec![anomaly],
    };

    let mut bundle_declared = declared(a.bundle.payload(), a.policy);
    bundle_declared.extend(declared(a.bundle.metadata(), a.policy));

    let mut findings = Vec::new();
    for view in steps {
        let step = &view.step;
        let target = Target::parse(&step.target);
        let step_declared = declared(&step.payload, a.policy);

        for capability in a.policy.required_capabilities(step.operation, &target) {
            if a.snapshot.has_permission(&capability)
                || bundle_declared.contains(&capability)
                || step_declared.contains(&capability)
            {
                continue;
            }
            findings.push(Finding::blocking(
                CATEGORY,
                step.target_path(),
                format!(
                    "{} on '{}' requires capability '{}', which is neither granted nor declared",
                    step.operation, step.target, capability
                ),
            ));
        }
    }
    findings
}

/// Capabilities named by elevation fields in one section
fn declared(section: &Map<String, Value>, policy: &GatePolicy) -> BTreeSet<String> {
    let mut caps = BTreeSet::new();
    for (field, value) in section {
        if !policy.is_elevation_field(field) {
            continue;
        }
        match value {
            Value::String(cap) => {
                caps.insert(cap.clone());
            }
            Value::Array(items) => {
                caps.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }
    caps
}
