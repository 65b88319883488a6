//! Category 5: descriptive field side effects

use super::Analysis;
use crate::finding::{Category, Finding};
use ebl_bundle::reading::{descriptive_effects, rotation_keys};
use ebl_bundle::DescriptiveEffect;

const CATEGORY: Category = Category::DescriptiveFieldSideEffects;

pub(crate) fn detect(a: &Analysis<'_>) -> Vec<Finding> {
    let steps = match a.steps(CATEGORY) {
        Ok(steps) => steps,
        Err(anomaly) => return vec![anomaly],
    };

    let mut findings = Vec::new();
    for view in steps {
        let step = &view.step;
        for effect in descriptive_effects(step, a.policy) {
            let explanation = match &effect {
                DescriptiveEffect::MirrorWrite { field, key } => format!(
                    "descriptive field '{field}' names '{key}'; the naive executor also writes the value there"
                ),
                DescriptiveEffect::LogRotation { field } => {
                    let rotation = &a.policy.side_effects;
                    let purged = rotation_keys(&view.state, a.policy);
                    format!(
                        "descriptive field '{field}' = '{}' triggers a purge of '{}*{}' ({} key(s) present)",
                        rotation.rotation_value,
                        rotation.rotation_prefix,
                        rotation.rotation_suffix,
                        purged.len()
                    )
                }
            };
            findings.push(Finding::blocking(
                CATEGORY,
                step.payload_path(effect.field()),
                explanation,
            ));
        }
    }
    findings
}
