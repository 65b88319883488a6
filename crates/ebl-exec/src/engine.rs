//! Mutation engine shared by both executors
//!
//! Interprets a bundle by the naive reading rules and applies the resulting
//! mutations in order. The gated executor calls the same engine, so a bundle
//! the gate allows mutates state exactly as the naive executor would.

use crate::error::ExecutionError;
use crate::trace::{TraceKind, TraceLog};
use ebl_bundle::reading::{apply_ordering, descriptive_effects, naive_directive, plan_step};
use ebl_bundle::{ActionBundle, GatePolicy};
use ebl_state::{Mutation, MutationEffect, ResourceState};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// A mutation and what applying it did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applied {
    /// Step that produced it
    pub step: usize,
    /// Mutation
    pub mutation: Mutation,
    /// Outcome
    pub effect: MutationEffect,
}

/// What one execution did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Step indices in the order they ran
    pub order: Vec<usize>,
    /// Every mutation, in order
    pub applied: Vec<Applied>,
}

impl ExecutionReport {
    /// Mutations that changed state
    #[must_use]
    pub fn changes(&self) -> usize {
        self.applied.iter().filter(|a| a.effect.changed_state()).count()
    }

    /// Mutations silently absorbed
    #[must_use]
    pub fn absorbed(&self) -> usize {
        self.applied.len() - self.changes()
    }
}

/// Naive mutation semantics
#[derive(Debug, Clone, Default)]
pub struct Engine {
    policy: Arc<GatePolicy>,
}

impl Engine {
    /// Create engine over a policy
    #[must_use]
    pub fn new(policy: Arc<GatePolicy>) -> Self {
        Self { policy }
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Apply a bundle to state, recording every step in `trace`
    ///
    /// Steps run in naive order, each planned against the state left by
    /// the previous one.
    pub fn run(
        &self,
        bundle: &ActionBundle,
        state: &mut ResourceState,
        trace: &TraceLog,
    ) -> Result<ExecutionReport, ExecutionError> {
        let steps = bundle.sub_operations()?;
        let directive = naive_directive(bundle, steps.len(), &self.policy);
        let steps = apply_ordering(steps, directive.as_ref());

        let mut report = ExecutionReport {
            order: steps.iter().map(|s| s.index).collect(),
            applied: Vec::new(),
        };

        if let Some(directive) = &directive {
            trace.record(
                TraceKind::Reorder,
                format!("steps reordered by '{}'", directive.field()),
                json!({"order": report.order}),
            );
        }

        for step in &steps {
            trace.record(
                TraceKind::Step,
                format!("#{} {} {}", step.index, step.operation, step.target),
                Value::Null,
            );

            for effect in descriptive_effects(step, &self.policy) {
                trace.record(
                    TraceKind::SideEffect,
                    format!("descriptive field '{}' acted on", effect.field()),
                    json!(effect),
                );
            }

            for mutation in plan_step(bundle, step, state, &self.policy)? {
                let effect = state.apply(&mutation);
                let kind = if effect.changed_state() {
                    TraceKind::Mutation
                } else {
                    TraceKind::Absorbed
                };
                trace.record(kind, describe(&mutation), json!({"effect": effect}));
                report.applied.push(Applied {
                    step: step.index,
                    mutation,
                    effect,
                });
            }
        }

        tracing::debug!(
            steps = steps.len(),
            changes = report.changes(),
            absorbed = report.absorbed(),
            "bundle applied"
        );
        Ok(report)
    }
}

fn describe(mutation: &Mutation) -> String {
    match mutation {
        Mutation::Upsert { domain, key, .. } => format!("upsert {domain}:{key}"),
        Mutation::Remove { domain, key } => format!("remove {domain}:{key}"),
        Mutation::Merge { domain, key, .. } => format!("merge {domain}:{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebl_state::Domain;
    use ebl_test_utils::{fs_state, state, step, BundleBuilder};
    use pretty_assertions::assert_eq;

    fn run(bundle: &ActionBundle, initial: &ResourceState) -> (ResourceState, ExecutionReport) {
        let mut s = initial.clone();
        let report = Engine::default()
            .run(bundle, &mut s, &TraceLog::new())
            .unwrap();
        (s, report)
    }

    #[test]
    fn write_upserts_content() {
        let bundle = BundleBuilder::write("/data/new.json", json!("v1")).build();
        let (s, report) = run(&bundle, &ResourceState::new());
        assert_eq!(s.get(Domain::Filesystem, "/data/new.json"), Some(&json!("v1")));
        assert_eq!(report.changes(), 1);
    }

    #[test]
    fn write_without_content_stores_payload() {
        let bundle = BundleBuilder::new("write", "cfg/app")
            .payload("mode", json!("open"))
            .build();
        let (s, _) = run(&bundle, &ResourceState::new());
        assert_eq!(s.get(Domain::Database, "cfg/app"), Some(&json!({"mode": "open"})));
    }

    #[test]
    fn delete_defaults_to_raw_prefix_recursion() {
        let initial = fs_state(&[
            ("/logs/app.log", json!("current")),
            ("/logs/app.log.1", json!("r1")),
            ("/logs/other.log", json!("other")),
        ]);
        let (s, report) = run(&BundleBuilder::delete("/logs/app.log").build(), &initial);
        assert_eq!(s, fs_state(&[("/logs/other.log", json!("other"))]));
        assert_eq!(report.applied.len(), 2);
    }

    #[test]
    fn wildcard_delete_takes_first_match() {
        let initial = fs_state(&[("/data/a.json", json!("x")), ("/data/b.json", json!("y"))]);
        let (s, _) = run(&BundleBuilder::delete("/data/*").build(), &initial);
        assert_eq!(s, fs_state(&[("/data/b.json", json!("y"))]));
    }

    #[test]
    fn update_merges_first_match() {
        let initial = state(json!({"database": {
            "user_record/staging_001": {"status": "active", "env": "staging"},
            "user_record/prod_001": {"status": "active", "env": "production"}
        }}));
        let bundle = BundleBuilder::update("user_record")
            .payload("status", json!("inactive"))
            .build();
        let (s, _) = run(&bundle, &initial);
        assert_eq!(
            s.get(Domain::Database, "user_record/staging_001"),
            Some(&json!({"status": "inactive", "env": "staging"}))
        );
        assert_eq!(
            s.get(Domain::Database, "user_record/prod_001"),
            initial.get(Domain::Database, "user_record/prod_001")
        );
    }

    #[test]
    fn update_of_absent_key_is_absorbed() {
        let initial = fs_state(&[("/a", json!(1))]);
        let bundle = BundleBuilder::update("/missing")
            .payload("x", json!(1))
            .build();
        let trace = TraceLog::new();
        let mut s = initial.clone();
        let report = Engine::default().run(&bundle, &mut s, &trace).unwrap();
        assert_eq!(s, initial);
        assert_eq!(report.absorbed(), 1);
        assert!(trace.events().iter().any(|e| e.kind == TraceKind::Absorbed));
    }

    #[test]
    fn sync_namespaces_by_metadata_environment() {
        let initial = fs_state(&[("/data/catalog.json", json!({"items": 2}))]);
        let bundle = BundleBuilder::sync("/data/catalog.json")
            .payload("direction", json!("fs_to_db"))
            .metadata("environment", json!("production"))
            .context("environment", json!("staging"))
            .build();
        let (s, _) = run(&bundle, &initial);
        assert_eq!(
            s.get(Domain::Database, "production/data/catalog.json"),
            Some(&json!({"items": 2}))
        );
        assert!(s.contains(Domain::Filesystem, "/data/catalog.json"));
    }

    #[test]
    fn sync_back_to_filesystem() {
        let initial = state(json!({"database": {"users/1": {"n": 1}, "orders/1": {}}}));
        let bundle = BundleBuilder::sync("users/*")
            .payload("direction", json!("db_to_fs"))
            .build();
        let (s, _) = run(&bundle, &initial);
        assert_eq!(s.get(Domain::Filesystem, "/users/1"), Some(&json!({"n": 1})));
        assert!(!s.contains(Domain::Filesystem, "/orders/1"));
    }

    #[test]
    fn optimize_reorders_batch() {
        let initial = fs_state(&[("/data/orders.json", json!({"count": 3}))]);
        let bundle = BundleBuilder::batch(
            "/data",
            vec![
                step("sync", Some("/data/*"), json!({"direction": "fs_to_db"})),
                step("delete", Some("/data/orders.json"), json!({"recursive": false})),
            ],
        )
        .metadata("optimize", json!(true))
        .build();

        let trace = TraceLog::new();
        let mut s = initial.clone();
        let report = Engine::default().run(&bundle, &mut s, &trace).unwrap();
        assert_eq!(report.order, vec![1, 0]);
        assert!(s.is_empty());
        assert_eq!(trace.events()[0].kind, TraceKind::Reorder);
    }

    #[test]
    fn declared_batch_order_syncs_before_delete() {
        let initial = fs_state(&[("/data/orders.json", json!({"count": 3}))]);
        let bundle = BundleBuilder::batch(
            "/data",
            vec![
                step("sync", Some("/data/*"), json!({"direction": "fs_to_db"})),
                step("delete", Some("/data/orders.json"), json!({"recursive": false})),
            ],
        )
        .build();
        let (s, report) = run(&bundle, &initial);
        assert_eq!(report.order, vec![0, 1]);
        assert!(s.filesystem().is_empty());
        assert_eq!(
            s.get(Domain::Database, "data/orders.json"),
            Some(&json!({"count": 3}))
        );
    }

    #[test]
    fn critical_priority_purges_old_logs() {
        let initial = fs_state(&[
            ("/logs/system.log.old", json!("old log data")),
            ("/logs/system.log", json!("live")),
        ]);
        let bundle = BundleBuilder::write("/reports/q3.txt", json!("quarterly numbers"))
            .payload("priority", json!("critical"))
            .build();
        let (s, _) = run(&bundle, &initial);
        assert_eq!(
            s,
            fs_state(&[
                ("/logs/system.log", json!("live")),
                ("/reports/q3.txt", json!("quarterly numbers")),
            ])
        );
    }

    #[test]
    fn description_path_is_mirror_written() {
        let bundle = BundleBuilder::write("/a.txt", json!("v"))
            .payload("description", json!("copy to /b.txt"))
            .build();
        let (s, _) = run(&bundle, &ResourceState::new());
        assert_eq!(s.get(Domain::Filesystem, "/b.txt"), Some(&json!("v")));
    }
}
