//! Category 4: metadata execution ordering
//!
//! A metadata field is flagged when the policy lists its name as an
//! ordering concept, or (for batches) when its value is a permutation of
//! the step indices. Scalar hints such as `"weight": 2` are only caught by
//! name.

use super::Analysis;
use crate::finding::{Category, Finding};
use ebl_bundle::reading::as_permutation;
use ebl_bundle::OperationType;

const CATEGORY: Category = Category::MetadataExecutionOrdering;

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let op = a.bundle.operation_type();
    if !matches!(op, OperationType::Batch | OperationType::Sync) {
        return Vec::new();
    }

    let steps = a.step_count();
    let payload = a.bundle.payload();
    let mut findings = Vec::new();

    for (field, value) in a.bundle.metadata() {
        let by_name = a.policy.is_ordering_field(field);
        let by_value = op == OperationType::Batch && as_permutation(value, steps).is_some();
        if !by_name && !by_value {
            continue;
        }
        // Declared in the payload too: the order is explicit
        if payload.get(field) == Some(value) {
            continue;
        }

        let reason = if by_name {
            "names an ordering concept"
        } else {
            "is a permutation of the step indices"
        };
        findings.push(Finding::blocking(
            CATEGORY,
            format!("metadata.{field}"),
            format!("metadata field '{field}' = {value} {reason} but is not declared in the payload; the naive executor would reorder {op} processing"),
        ));
    }
    findings
}
