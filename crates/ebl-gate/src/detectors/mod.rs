//! Contamination detector
//!
//! Six independent analyzers, one per [`Category`]. Each reads the bundle,
//! the snapshot and the policy, and predicts what the naive reading would
//! do using the shared [`reading`](ebl_bundle::reading) rules.
//!
//! # Core Concepts
//!
//! - **Analysis**: per-evaluation context; the bundle is decomposed once
//!   and replayed on a copy of the snapshot in naive order, so each step is
//!   judged against the state it would actually run on
//! - **Anomaly**: a decomposition or resolution failure inside an analyzer
//!   becomes a blocking finding in that analyzer's category
//! - **Completeness**: all six analyzers always run, in category order

mod ambiguity;
mod authority;
mod descriptive;
mod ordering;
mod overload;
mod scope;

use crate::finding::{Category, Finding};
use ebl_bundle::reading::{naive_ordering, plan_step};
use ebl_bundle::{ActionBundle, ContextSnapshot, GatePolicy, SubOperation};
use ebl_state::ResourceState;
use std::fmt::Display;
use std::sync::Arc;

/// A step and the state it runs against
pub(crate) struct StepView {
    pub(crate) step: SubOperation,
    pub(crate) state: ResourceState,
}

/// Per-evaluation view shared by the analyzers
pub(crate) struct Analysis<'a> {
    pub(crate) bundle: &'a ActionBundle,
    pub(crate) snapshot: &'a ContextSnapshot,
    pub(crate) policy: &'a GatePolicy,
    steps: Result<Vec<StepView>, String>,
}

impl<'a> Analysis<'a> {
    pub(crate) fn new(
        bundle: &'a ActionBundle,
        snapshot: &'a ContextSnapshot,
        policy: &'a GatePolicy,
    ) -> Self {
        let steps = bundle
            .sub_operations()
            .map(|steps| replay(bundle, steps, snapshot.state(), policy))
            .map_err(|e| e.to_string());
        Self {
            bundle,
            snapshot,
            policy,
            steps,
        }
    }

    /// Steps in declared order, or the anomaly finding for `category`
    pub(crate) fn steps(&self, category: Category) -> Result<&[StepView], Finding> {
        match &self.steps {
            Ok(steps) => Ok(steps),
            Err(reason) => Err(anomaly(
                category,
                "payload",
                format!("bundle could not be decomposed: {reason}"),
            )),
        }
    }

    /// Number of steps (zero when decomposition failed)
    pub(crate) fn step_count(&self) -> usize {
        self.steps.as_ref().map_or(0, Vec::len)
    }
}

/// Pair every step with the state left by the steps the naive model runs
/// before it
///
/// A step that cannot be planned leaves the state as it was; the analyzer
/// resolving that step reports the failure.
fn replay(
    bundle: &ActionBundle,
    steps: Vec<SubOperation>,
    initial: &ResourceState,
    policy: &GatePolicy,
) -> Vec<StepView> {
    let mut state = initial.clone();
    let mut views: Vec<StepView> = naive_ordering(bundle, steps, policy)
        .into_iter()
        .map(|step| {
            let before = state.clone();
            if let Ok(mutations) = plan_step(bundle, &step, &state, policy) {
                for mutation in &mutations {
                    state.apply(mutation);
                }
            }
            StepView {
                step,
                state: before,
            }
        })
        .collect();
    views.sort_by_key(|view| view.step.index);
    views
}

/// Blocking finding for an invariant that did not hold
pub(crate) fn anomaly(category: Category, path: impl Into<String>, reason: impl Display) -> Finding {
    Finding::blocking(category, path, format!("internal anomaly: {reason}"))
}

/// Runs the six analyzers
#[derive(Debug, Clone, Default)]
pub struct ContaminationDetector {
    policy: Arc<GatePolicy>,
}

impl ContaminationDetector {
    /// Create detector over a policy
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

    /// All six categories, findings concatenated in category order
    #[must_use]
    pub fn detect(&self, bundle: &ActionBundle, snapshot: &ContextSnapshot) -> Vec<Finding> {
        let analysis = Analysis::new(bundle, snapshot, &self.policy);
        Category::ALL
            .into_iter()
            .flat_map(|category| run(category, &analysis))
            .collect()
    }

    /// One category in isolation
    #[must_use]
    pub fn detect_category(
        &self,
        category: Category,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        run(category, &Analysis::new(bundle, snapshot, &self.policy))
    }

    /// Category 1
    #[must_use]
    pub fn implicit_authority_escalation(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::ImplicitAuthorityEscalation, bundle, snapshot)
    }

    /// Category 2
    #[must_use]
    pub fn hidden_default_scope_expansion(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::HiddenDefaultScopeExpansion, bundle, snapshot)
    }

    /// Category 3
    #[must_use]
    pub fn ambiguous_target_resolution(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::AmbiguousTargetResolution, bundle, snapshot)
    }

    /// Category 4
    #[must_use]
    pub fn metadata_execution_ordering(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::MetadataExecutionOrdering, bundle, snapshot)
    }

    /// Category 5
    #[must_use]
    pub fn descriptive_field_side_effects(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::DescriptiveFieldSideEffects, bundle, snapshot)
    }

    /// Category 6
    #[must_use]
    pub fn cross_domain_field_overload(
        &self,
        bundle: &ActionBundle,
        snapshot: &ContextSnapshot,
    ) -> Vec<Finding> {
        self.detect_category(Category::CrossDomainFieldOverload, bundle, snapshot)
    }
}

fn run(category: Category, analysis: &Analysis<'_>) -> Vec<Finding> {
    match category {
        Category::ImplicitAuthorityEscalation => authority::detect(analysis),
        Category::HiddenDefaultScopeExpansion => scope::detect(analysis),
        Category::AmbiguousTargetResolution => ambiguity::detect(analysis),
        Category::MetadataExecutionOrdering => ordering::detect(analysis),
        Category::DescriptiveFieldSideEffects => descriptive::detect(analysis),
        Category::CrossDomainFieldOverload => overload::detect(analysis),
    }
}
