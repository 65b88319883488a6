//! Category 2: hidden default scope expansion

use super::{anomaly, Analysis};
use crate::finding::{Category, Finding};
use ebl_bundle::reading::{delete_scope, explicit_recursive};
use ebl_bundle::OperationType;
use ebl_state::{ResourceState, StateError, Target};
use std::collections::BTreeSet;

const CATEGORY: Category = Category::HiddenDefaultScopeExpansion;

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let steps = match a.steps(CATEGORY) {
        Ok(steps) => steps,
        Err(anomaly) => return vec![anomaly],
    };

    let field = a.policy.scope.recursive_field.as_str();
    let mut findings = Vec::new();

    for view in steps.iter().filter(|v| v.step.operation == OperationType::Delete) {
        let (step, state) = (&view.step, &view.state);
        let target = Target::parse(&step.target);
        let explicit = explicit_recursive(&step.payload, a.bundle.context_fields(), a.policy);
        let recursive = explicit.unwrap_or(a.policy.scope.naive_default);

        let result = declared_scope(state, &target, explicit == Some(true)).and_then(|declared| {
            delete_scope(state, &target, recursive).map(|effective| (declared, effective))
        });
        let (declared, effective) = match result {
            Ok(scopes) => scopes,
            Err(e) => {
                findings.push(anomaly(CATEGORY, step.target_path(), e));
                continue;
            }
        };

        let extra: Vec<&String> = effective.iter().filter(|k| !declared.contains(*k)).collect();
        if extra.is_empty() {
            continue;
        }

        let how = match explicit {
            None => format!("'{field}' is absent and defaults to {recursive}"),
            Some(v) => format!("'{field}' is {v}"),
        };
        findings.push(Finding::blocking(
            CATEGORY,
            step.payload_path(field),
            format!(
                "delete declares {{{}}} but removes {{{}}}; {how}",
                join(declared.iter()),
                join(effective.iter()),
            ),
        ));
    }
    findings
}

/// Keys the target explicitly names, plus their subtrees when recursion is
/// explicitly declared
fn declared_scope(
    state: &ResourceState,
    target: &Target,
    declared_recursive: bool,
) -> Result<BTreeSet<String>, StateError> {
    let domain = target.domain();
    let named: Vec<String> = if target.is_wildcard() {
        state.select(target)?
    } else if state.contains(domain, target.selector()) {
        vec![target.selector().to_string()]
    } else {
        Vec::new()
    };

    let mut declared: BTreeSet<String> = named.iter().cloned().collect();
    if declared_recursive {
        if !target.is_wildcard() {
            declared.extend(state.subtree(domain, target.root()));
        }
        for key in &named {
            declared.extend(state.subtree(domain, key));
        }
    }
    Ok(declared)
}

fn join<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(", ")
}
