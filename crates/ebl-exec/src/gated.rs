//! Gated executor: mutation only after an ALLOW verdict

use crate::engine::{Engine, ExecutionReport};
use crate::error::ExecutionError;
use crate::trace::{TraceKind, TraceLog};
use ebl_bundle::{ActionBundle, ContextSnapshot, ExecutionMode, GatePolicy};
use ebl_gate::{AdmissibilityGate, Decision, Gate, Verdict};
use ebl_state::{ResourceState, SharedState};
use serde_json::{json, Value};
use std::sync::Arc;

/// What the gated executor did with a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum GatedOutcome {
    /// Gate allowed; mutations applied
    Executed {
        /// Gate decision
        decision: Decision,
        /// Mutations applied
        report: ExecutionReport,
    },
    /// Gate allowed, but the caller asked for a dry run
    DryRun {
        /// Gate decision
        decision: Decision,
    },
    /// Gate returned HOLD or DENY; state untouched
    Blocked {
        /// Gate decision
        decision: Decision,
    },
}

impl GatedOutcome {
    /// Gate decision
    #[must_use]
    pub fn decision(&self) -> &Decision {
        match self {
            Self::Executed { decision, .. }
            | Self::DryRun { decision }
            | Self::Blocked { decision } => decision,
        }
    }

    /// Gate verdict
    #[inline]
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.decision().verdict()
    }

    /// Whether state was mutated
    #[must_use]
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Executed { report, .. } if report.changes() > 0)
    }
}

/// Executor that consults a [`Gate`] before every bundle
///
/// The snapshot is captured from the state the bundle would run against,
/// and execution uses the same engine as [`NaiveExecutor`], so an allowed
/// bundle behaves identically on both paths.
///
/// [`NaiveExecutor`]: crate::NaiveExecutor
#[derive(Debug)]
pub struct GatedExecutor<G: Gate = AdmissibilityGate> {
    gate: G,
    engine: Engine,
    trace: TraceLog,
}

impl Default for GatedExecutor<AdmissibilityGate> {
    fn default() -> Self {
        Self::with_policy(GatePolicy::default())
    }
}

impl GatedExecutor<AdmissibilityGate> {
    /// Executor with the standard gate over a policy
    #[must_use]
    pub fn with_policy(policy: GatePolicy) -> Self {
        let policy = Arc::new(policy);
        Self::new(AdmissibilityGate::new(Arc::clone(&policy)), policy)
    }
}

impl<G: Gate> GatedExecutor<G> {
    /// Executor over any gate
    ///
    /// `policy` drives the mutation engine and the snapshot's role grants.
    #[must_use]
    pub fn new(gate: G, policy: Arc<GatePolicy>) -> Self {
        Self {
            gate,
            engine: Engine::new(policy),
            trace: TraceLog::new(),
        }
    }

    /// Gate in use
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Trace of every execution so far
    #[inline]
    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Evaluate without executing
    #[must_use]
    pub fn evaluate(&self, bundle: &ActionBundle, state: &ResourceState) -> Decision {
        let snapshot = ContextSnapshot::for_bundle(state, bundle, self.engine.policy());
        self.gate.evaluate(bundle, &snapshot)
    }

    /// Evaluate, then execute only on ALLOW
    pub fn execute(
        &self,
        bundle: &ActionBundle,
        state: &mut ResourceState,
    ) -> Result<GatedOutcome, ExecutionError> {
        self.trace.record(
            TraceKind::Bundle,
            format!("{} {}", bundle.operation_type(), bundle.target_resource()),
            json!({"executor": "gated"}),
        );

        let snapshot = ContextSnapshot::for_bundle(state, bundle, self.engine.policy());
        let decision = self.gate.evaluate(bundle, &snapshot);
        self.record_decision(&decision);

        if decision.verdict() != Verdict::Allow {
            self.trace.record(
                TraceKind::Blocked,
                format!("execution withheld ({})", decision.verdict()),
                Value::Null,
            );
            tracing::warn!(
                operation = %bundle.operation_type(),
                target = bundle.target_resource(),
                verdict = %decision.verdict(),
                findings = decision.findings().len(),
                "bundle blocked"
            );
            return Ok(GatedOutcome::Blocked { decision });
        }

        if snapshot.execution_mode() == ExecutionMode::DryRun {
            self.trace
                .record(TraceKind::DryRun, "dry run; no mutation", Value::Null);
            return Ok(GatedOutcome::DryRun { decision });
        }

        let report = self.engine.run(bundle, state, &self.trace)?;
        self.trace.record(
            TraceKind::Complete,
            format!("{} mutations applied", report.changes()),
            json!({"digest": state.digest()}),
        );
        tracing::info!(
            operation = %bundle.operation_type(),
            target = bundle.target_resource(),
            changes = report.changes(),
            "gated execution complete"
        );
        Ok(GatedOutcome::Executed { decision, report })
    }

    /// Evaluate and execute against shared state
    ///
    /// The writer lock is held from snapshot to last mutation, so no other
    /// writer can invalidate the verdict in between.
    pub fn execute_shared(
        &self,
        bundle: &ActionBundle,
        state: &SharedState,
    ) -> Result<GatedOutcome, ExecutionError> {
        state.with_writer(|s| self.execute(bundle, s))
    }

    fn record_decision(&self, decision: &Decision) {
        self.trace.record(
            TraceKind::Verdict,
            decision.verdict().as_str(),
            json!({"categories": decision.categories()}),
        );
        for finding in decision.findings() {
            self.trace.record(TraceKind::Finding, finding.to_string(), json!(finding));
        }
    }
}
