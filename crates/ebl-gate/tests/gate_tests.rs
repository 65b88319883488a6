use ebl_gate::{AdmissibilityGate, Category, ContaminationDetector, Gate, Severity, Verdict};
use ebl_state::{Domain, Mutation};
use ebl_test_utils::{
    arb_backup_then_delete, arb_bundle, arb_state, arb_write_then_wildcard_delete, fs_state,
    snapshot, state, step, BundleBuilder,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

#[test]
fn test_wildcard_delete_has_one_ambiguity_finding() {
    let initial = fs_state(&[("/data/a.json", json!("x")), ("/data/b.json", json!("y"))]);
    let bundle = BundleBuilder::delete("/data/*").permissions(&["write"]).build();
    let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));

    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.findings().len(), 1);
    assert_eq!(
        decision.findings()[0].category,
        Category::AmbiguousTargetResolution
    );
}

#[test]
fn test_batch_steps_see_state_left_by_earlier_steps() {
    // The write creates /data/b.json before the delete resolves /data/*
    let initial = fs_state(&[("/data/a.json", json!(1))]);
    let bundle = BundleBuilder::batch(
        "/data",
        vec![
            step("write", Some("/data/b.json"), json!({"content": 2})),
            step("delete", Some("/data/*"), json!({"recursive": false})),
        ],
    )
    .permissions(&["write"])
    .build();

    let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.findings().len(), 1);
    assert_eq!(
        decision.findings()[0].category,
        Category::AmbiguousTargetResolution
    );
    assert_eq!(
        decision.findings()[0].field_path,
        "payload.operations[1].target_resource"
    );
    assert!(decision.findings()[0].explanation.contains("/data/b.json"));
}

#[test]
fn test_backup_then_default_delete_is_scope_expansion() {
    let initial = fs_state(&[("/data/x", json!("keep-me"))]);
    let bundle = BundleBuilder::batch(
        "/data",
        vec![
            step("write", Some("/data/x.bak"), json!({"content": "backup"})),
            step("delete", Some("/data/x"), json!({})),
        ],
    )
    .permissions(&["write"])
    .build();

    let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.findings().len(), 1);
    let finding = &decision.findings()[0];
    assert_eq!(finding.category, Category::HiddenDefaultScopeExpansion);
    assert_eq!(finding.field_path, "payload.operations[1].payload.recursive");
    assert!(finding.explanation.contains("/data/x.bak"));
}

#[test]
fn test_reordered_batch_is_replayed_in_run_order() {
    // Declared order deletes first; the sequence runs the write first
    let initial = fs_state(&[("/data/x", json!("keep-me"))]);
    let bundle = BundleBuilder::batch(
        "/data",
        vec![
            step("delete", Some("/data/x"), json!({})),
            step("write", Some("/data/x.bak"), json!({"content": "backup"})),
        ],
    )
    .payload("order", json!([1, 0]))
    .permissions(&["write"])
    .build();

    let detector = ContaminationDetector::default();
    let snap = snapshot(&initial, &bundle);
    let findings = detector.hidden_default_scope_expansion(&bundle, &snap);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].field_path, "payload.operations[0].payload.recursive");
}

#[test]
fn test_each_category_reports_independently() {
    let detector = ContaminationDetector::default();
    let initial = state(json!({"database": {
        "user_record/a": {"status": "on"},
        "user_record/b": {"status": "on"}
    }}));
    let bundle = BundleBuilder::update("user_record")
        .payload("status", json!("off"))
        .build();
    let snap = snapshot(&initial, &bundle);

    let all = detector.detect(&bundle, &snap);
    for category in Category::ALL {
        let expected: Vec<_> = all.iter().filter(|f| f.category == category).cloned().collect();
        assert_eq!(detector.detect_category(category, &bundle, &snap), expected);
    }
    assert_eq!(
        detector.implicit_authority_escalation(&bundle, &snap).len(),
        1
    );
    assert_eq!(detector.ambiguous_target_resolution(&bundle, &snap).len(), 1);
}

proptest! {
    #[test]
    fn prop_backup_then_delete_is_denied(initial in arb_state(), bundle in arb_backup_then_delete()) {
        let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
        prop_assert_eq!(decision.verdict(), Verdict::Deny);
        prop_assert!(decision
            .findings()
            .iter()
            .any(|f| f.category == Category::HiddenDefaultScopeExpansion));
    }

    #[test]
    fn prop_wildcard_after_write_is_ambiguous(
        initial in arb_state(),
        bundle in arb_write_then_wildcard_delete(),
    ) {
        let mut initial = initial;
        initial.apply(&Mutation::upsert(Domain::Filesystem, "/data/seed.json", json!(0)));
        let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
        prop_assert_eq!(decision.verdict(), Verdict::Deny);
        prop_assert!(decision
            .findings()
            .iter()
            .any(|f| f.category == Category::AmbiguousTargetResolution));
    }

    #[test]
    fn prop_evaluate_is_deterministic(initial in arb_state(), bundle in arb_bundle()) {
        let gate = AdmissibilityGate::default();
        let snap = snapshot(&initial, &bundle);
        let first = gate.evaluate(&bundle, &snap);
        let second = gate.evaluate(&bundle, &snap);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_any_blocking_finding_denies(initial in arb_state(), bundle in arb_bundle()) {
        let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
        let blocking = decision.findings().iter().any(|f| f.severity == Severity::Blocking);
        if blocking {
            prop_assert_eq!(decision.verdict(), Verdict::Deny);
        } else if decision.findings().is_empty() {
            prop_assert_eq!(decision.verdict(), Verdict::Allow);
        } else {
            prop_assert_eq!(decision.verdict(), Verdict::Hold);
        }
    }

    #[test]
    fn prop_findings_follow_category_order(initial in arb_state(), bundle in arb_bundle()) {
        let decision = AdmissibilityGate::default().evaluate(&bundle, &snapshot(&initial, &bundle));
        let numbers: Vec<u8> = decision.findings().iter().map(|f| f.category.number()).collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        prop_assert_eq!(numbers, sorted);
    }

    #[test]
    fn prop_evaluation_leaves_snapshot_untouched(initial in arb_state(), bundle in arb_bundle()) {
        let snap = snapshot(&initial, &bundle);
        let before = snap.state().digest();
        let _ = AdmissibilityGate::default().evaluate(&bundle, &snap);
        prop_assert_eq!(snap.state().digest(), before.clone());
        prop_assert_eq!(initial.digest(), before);
    }
}
