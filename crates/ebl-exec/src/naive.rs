//! Naive executor: interprets every field of a bundle as executable intent

use crate::engine::{Engine, ExecutionReport};
use crate::error::ExecutionError;
use crate::trace::{TraceKind, TraceLog};
use ebl_bundle::{ActionBundle, GatePolicy};
use ebl_state::{ResourceState, SharedState};
use serde_json::json;
use std::sync::Arc;

/// Executes bundles with no admissibility check
///
/// The baseline the gate is measured against: contaminated bundles run
/// here and produce the divergence the gate is meant to stop.
#[derive(Debug, Default)]
pub struct NaiveExecutor {
    engine: Engine,
    trace: TraceLog,
}

impl NaiveExecutor {
    /// Create executor over a policy
    #[must_use]
    pub fn new(policy: Arc<GatePolicy>) -> Self {
        Self {
            engine: Engine::new(policy),
            trace: TraceLog::new(),
        }
    }

    /// Create executor owning a policy
    #[must_use]
    pub fn with_policy(policy: GatePolicy) -> Self {
        Self::new(Arc::new(policy))
    }

    /// Execute a bundle against exclusively owned state
    pub fn execute(
        &self,
        bundle: &ActionBundle,
        state: &mut ResourceState,
    ) -> Result<ExecutionReport, ExecutionError> {
        self.trace.record(
            TraceKind::Bundle,
            format!("{} {}", bundle.operation_type(), bundle.target_resource()),
            json!({"executor": "naive"}),
        );

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
            "naive execution complete"
        );
        Ok(report)
    }

    /// Execute a bundle against shared state under its writer lock
    pub fn execute_shared(
        &self,
        bundle: &ActionBundle,
        state: &SharedState,
    ) -> Result<ExecutionReport, ExecutionError> {
        state.with_writer(|s| self.execute(bundle, s))
    }

    /// Trace of every execution so far
    #[inline]
    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }
}
