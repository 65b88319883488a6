//! Category 6: cross-domain field overload

use super::Analysis;
use crate::finding::{Category, Finding};
use ebl_bundle::FieldDomain;
use serde_json::{Map, Value};

const CATEGORY: Category = Category::CrossDomainFieldOverload;

struct Occurrence<'a> {
    section: &'static str,
    domain: FieldDomain,
    value: &'a Value,
}

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let sections: [(&'static str, FieldDomain, &Map<String, Value>); 3] = [
        ("payload", FieldDomain::Operational, a.bundle.payload()),
        ("metadata", FieldDomain::Descriptive, a.bundle.metadata()),
        ("context_fields", FieldDomain::Session, a.bundle.context_fields()),
    ];

    // Field names in order of first appearance
    let mut names: Vec<&str> = Vec::new();
    for (_, _, section) in &sections {
        for name in section.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    let mut findings = Vec::new();
    for name in names {
        let occurrences: Vec<Occurrence<'_>> = sections
            .iter()
            .filter_map(|(section, domain, map)| {
                map.get(name).map(|value| Occurrence {
                    section: *section,
                    domain: *domain,
                    value,
                })
            })
            .collect();
        if occurrences.len() < 2 {
            continue;
        }

        let first = occurrences[0].value;
        let type_mismatch = occurrences
            .iter()
            .any(|o| json_type(o.value) != json_type(first));
        let tag = a.policy.field_tag(name);
        let misplaced = tag.and_then(|t| occurrences.iter().find(|o| o.domain != t));
        if !type_mismatch && misplaced.is_none() {
            continue;
        }

        let consistent = occurrences.iter().all(|o| equivalent(o.value, first));
        let path_section = misplaced.map_or(occurrences[occurrences.len() - 1].section, |o| {
            o.section
        });
        let listing = occurrences
            .iter()
            .map(|o| format!("{}.{name} = {}", o.section, o.value))
            .collect::<Vec<_>>()
            .join(", ");
        let domain_note = tag.map_or(String::new(), |t| format!(" (tagged {})", t.as_str()));
        let values = if consistent { "equivalent" } else { "diverging" };
        let explanation =
            format!("'{name}'{domain_note} appears across domains with {values} values: {listing}");

        let path = format!("{path_section}.{name}");
        findings.push(if consistent {
            Finding::correctable(CATEGORY, path, explanation)
        } else {
            Finding::blocking(CATEGORY, path, explanation)
        });
    }
    findings
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Equal, or equal when rendered as scalars (`"1"` and `1`)
fn equivalent(a: &Value, b: &Value) -> bool {
    a == b || matches!((render(a), render(b)), (Some(x), Some(y)) if x == y)
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) | Value::Null => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bundle, snapshot};
    use super::*;
    use crate::{ContaminationDetector, Severity};
    use serde_json::json;

    fn findings(payload: Value, metadata: Value, context: Value) -> Vec<Finding> {
        let b = bundle(json!({
            "operation_type": "sync",
            "target_resource": "/data/catalog.json",
            "payload": payload,
            "metadata": metadata,
            "context_fields": context
        }));
        let s = snapshot(json!({}), &b);
        ContaminationDetector::default().cross_domain_field_overload(&b, &s)
    }

    #[test]
    fn diverging_environment_is_blocking() {
        let f = findings(
            json!({"direction": "fs_to_db"}),
            json!({"environment": "production"}),
            json!({"environment": "staging", "permissions": ["sync"]}),
        );
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].severity, Severity::Blocking);
        assert_eq!(f[0].field_path, "metadata.environment");
        assert!(f[0].explanation.contains("tagged session"));
    }

    #[test]
    fn equal_environment_is_correctable() {
        let f = findings(
            json!({}),
            json!({"environment": "staging"}),
            json!({"environment": "staging"}),
        );
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].severity, Severity::Correctable);
    }

    #[test]
    fn type_mismatch_on_untagged_field() {
        let f = findings(json!({"retries": "3"}), json!({"retries": 3}), json!({}));
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].severity, Severity::Correctable);

        let f = findings(json!({"retries": "3"}), json!({"retries": 4}), json!({}));
        assert_eq!(f[0].severity, Severity::Blocking);
    }

    #[test]
    fn same_type_untagged_is_clean() {
        assert!(findings(json!({"owner": "a"}), json!({"owner": "b"}), json!({})).is_empty());
    }

    #[test]
    fn single_section_is_clean() {
        assert!(findings(json!({"environment": "x"}), json!({}), json!({})).is_empty());
        assert!(findings(json!({}), json!({}), json!({"environment": "x"})).is_empty());
    }

    #[test]
    fn scalar_rendering() {
        assert!(equivalent(&json!("true"), &json!(true)));
        assert!(!equivalent(&json!([1]), &json!("[1]")));
        assert_eq!(json_type(&json!(null)), "null");
    }
}
