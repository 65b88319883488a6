//! Reading rules: how a bundle reads when every implicit default is honoured
//!
//! The naive executor mutates by these rules and the detectors use the same
//! functions to predict what it would do, so the two never drift apart.
//!
//! # Core Concepts
//!
//! - **Naive target**: exact key, else first match in insertion order
//! - **Delete scope**: defaulted recursion removes every key sharing the
//!   target as a raw string prefix
//! - **Ordering**: metadata overrides payload; `optimize` sorts steps by name
//! - **Descriptive effects**: descriptive text treated as instructions
//! - **Planning**: the mutations one step produces against the state the
//!   previous step left behind

use crate::bundle::{ActionBundle, SubOperation};
use crate::operation::OperationType;
use crate::policy::GatePolicy;
use ebl_state::{Domain, Mutation, ResolveMode, ResourceState, StateError, Target};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(/[A-Za-z0-9_.\-/]+)").expect("path token pattern is valid")
});

/// Resolution mode an operation uses
#[must_use]
pub fn resolve_mode(operation: OperationType) -> ResolveMode {
    match operation {
        OperationType::Write => ResolveMode::Create,
        _ => ResolveMode::Existing,
    }
}

/// Key the naive model acts on
///
/// Exact match, else the first match in insertion order, else (create mode)
/// the literal selector.
pub fn naive_target(
    state: &ResourceState,
    target: &Target,
    mode: ResolveMode,
) -> Result<Option<String>, StateError> {
    let resolution = state.resolve(target, mode)?;
    Ok(match resolution.first() {
        Some(key) => Some(key.to_string()),
        None if mode == ResolveMode::Create => Some(target.selector().to_string()),
        None => None,
    })
}

/// Recursion the caller actually declared: payload, then context
#[must_use]
pub fn explicit_recursive(
    payload: &Map<String, Value>,
    context_fields: &Map<String, Value>,
    policy: &GatePolicy,
) -> Option<bool> {
    let field = policy.scope.recursive_field.as_str();
    payload
        .get(field)
        .and_then(Value::as_bool)
        .or_else(|| context_fields.get(field).and_then(Value::as_bool))
}

/// Recursion the naive model applies
#[must_use]
pub fn effective_recursive(
    payload: &Map<String, Value>,
    context_fields: &Map<String, Value>,
    policy: &GatePolicy,
) -> bool {
    explicit_recursive(payload, context_fields, policy).unwrap_or(policy.scope.naive_default)
}

/// Keys a naive delete removes, in insertion order
///
/// Recursive deletes remove every key with the target (for wildcards, the
/// first match) as a raw string prefix. Non-recursive deletes remove only
/// the naive target.
pub fn delete_scope(
    state: &ResourceState,
    target: &Target,
    recursive: bool,
) -> Result<Vec<String>, StateError> {
    let anchor = naive_target(state, target, ResolveMode::Existing)?;

    if !recursive {
        return Ok(anchor
            .filter(|k| state.contains(target.domain(), k))
            .into_iter()
            .collect());
    }

    let prefix = if target.is_wildcard() {
        match anchor {
            Some(first) => first,
            None => return Ok(Vec::new()),
        }
    } else {
        target.selector().to_string()
    };

    Ok(state.keys_with_prefix(target.domain(), &prefix))
}

/// Ordering instruction found in a bundle section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderingDirective {
    /// Stable sort of steps by operation name
    SortByOperation {
        /// Field that requested it
        field: String,
    },
    /// Explicit permutation of step indices
    Sequence {
        /// Field that carried it
        field: String,
        /// Step indices in run order
        order: Vec<usize>,
    },
}

impl OrderingDirective {
    /// Field carrying the directive
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::SortByOperation { field } | Self::Sequence { field, .. } => field,
        }
    }
}

/// Read an ordering directive from one section
///
/// The sort flag wins, then the named sequence fields, then any other field
/// holding a permutation of `0..steps`.
#[must_use]
pub fn ordering_directive(
    section: &Map<String, Value>,
    steps: usize,
    policy: &GatePolicy,
) -> Option<OrderingDirective> {
    let flag = policy.ordering.sort_flag.as_str();
    if section.get(flag).and_then(Value::as_bool) == Some(true) {
        return Some(OrderingDirective::SortByOperation {
            field: flag.to_string(),
        });
    }

    let named = policy
        .ordering
        .sequence_fields
        .iter()
        .filter_map(|f| section.get(f.as_str()).map(|v| (f, v)));
    let others = section
        .iter()
        .filter(|(f, _)| !policy.ordering.sequence_fields.contains(f));

    named.chain(others).find_map(|(field, value)| {
        as_permutation(value, steps).map(|order| OrderingDirective::Sequence {
            field: field.clone(),
            order,
        })
    })
}

/// Whether a value is a permutation of `0..steps`
#[must_use]
pub fn as_permutation(value: &Value, steps: usize) -> Option<Vec<usize>> {
    let items = value.as_array()?;
    if steps == 0 || items.len() != steps {
        return None;
    }

    let mut seen = vec![false; steps];
    let mut order = Vec::with_capacity(steps);
    for item in items {
        let idx = usize::try_from(item.as_u64()?).ok()?;
        if idx >= steps || seen[idx] {
            return None;
        }
        seen[idx] = true;
        order.push(idx);
    }
    Some(order)
}

/// Directive the naive model follows: metadata overrides payload
#[must_use]
pub fn naive_directive(
    bundle: &ActionBundle,
    steps: usize,
    policy: &GatePolicy,
) -> Option<OrderingDirective> {
    if !bundle.is_batch() {
        return None;
    }
    ordering_directive(bundle.metadata(), steps, policy)
        .or_else(|| ordering_directive(bundle.payload(), steps, policy))
}

/// Reorder steps according to a directive
#[must_use]
pub fn apply_ordering(
    mut steps: Vec<SubOperation>,
    directive: Option<&OrderingDirective>,
) -> Vec<SubOperation> {
    match directive {
        None => steps,
        Some(OrderingDirective::SortByOperation { .. }) => {
            steps.sort_by(|a, b| a.operation.as_str().cmp(b.operation.as_str()));
            steps
        }
        Some(OrderingDirective::Sequence { order, .. }) => {
            let mut slots: Vec<Option<SubOperation>> = steps.into_iter().map(Some).collect();
            order.iter().filter_map(|&i| slots.get_mut(i)?.take()).collect()
        }
    }
}

/// Steps in the order the naive model runs them
#[must_use]
pub fn naive_ordering(
    bundle: &ActionBundle,
    steps: Vec<SubOperation>,
    policy: &GatePolicy,
) -> Vec<SubOperation> {
    let directive = naive_directive(bundle, steps.len(), policy);
    apply_ordering(steps, directive.as_ref())
}

/// A descriptive field the naive model treats as operational
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptiveEffect {
    /// A path in descriptive text receives a copy of the written value
    MirrorWrite {
        /// Descriptive field
        field: String,
        /// Filesystem key written
        key: String,
    },
    /// The rotation trigger purges rotated logs
    LogRotation {
        /// Descriptive field
        field: String,
    },
}

impl DescriptiveEffect {
    /// Descriptive field responsible
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MirrorWrite { field, .. } | Self::LogRotation { field } => field,
        }
    }
}

/// Descriptive effects of a `write` step, in payload order
#[must_use]
pub fn descriptive_effects(step: &SubOperation, policy: &GatePolicy) -> Vec<DescriptiveEffect> {
    if step.operation != OperationType::Write {
        return Vec::new();
    }

    let rotation = &policy.side_effects;
    let mut effects = Vec::new();

    for (field, value) in &step.payload {
        if !policy.is_descriptive(field) {
            continue;
        }
        let Some(text) = value.as_str() else {
            continue;
        };

        if *field == rotation.rotation_field && text == rotation.rotation_value {
            effects.push(DescriptiveEffect::LogRotation {
                field: field.clone(),
            });
        }

        for cap in PATH_TOKEN.captures_iter(text) {
            let key = &cap[1];
            if !names_step_target(key, step) {
                effects.push(DescriptiveEffect::MirrorWrite {
                    field: field.clone(),
                    key: key.to_string(),
                });
            }
        }
    }

    effects
}

/// Whether a path token is the step's own filesystem key
fn names_step_target(key: &str, step: &SubOperation) -> bool {
    let target = Target::parse(&step.target);
    target.domain() == Domain::Filesystem && target.selector() == key
}

/// Filesystem keys a log rotation would purge
#[must_use]
pub fn rotation_keys(state: &ResourceState, policy: &GatePolicy) -> Vec<String> {
    let rotation = &policy.side_effects;
    state
        .keys_with_prefix(Domain::Filesystem, &rotation.rotation_prefix)
        .into_iter()
        .filter(|k| k.ends_with(&rotation.rotation_suffix))
        .collect()
}

/// Value a write stores: the content field, else the whole payload
#[must_use]
pub fn write_value(payload: &Map<String, Value>, policy: &GatePolicy) -> Value {
    payload
        .get(&policy.fields.content_field)
        .cloned()
        .unwrap_or_else(|| Value::Object(payload.clone()))
}

/// Environment the naive model namespaces sync output under
///
/// Metadata, then context, then payload.
#[must_use]
pub fn effective_environment(
    metadata: &Map<String, Value>,
    context_fields: &Map<String, Value>,
    payload: &Map<String, Value>,
    policy: &GatePolicy,
) -> Option<String> {
    let field = policy.sync.environment_field.as_str();
    [metadata, context_fields, payload]
        .into_iter()
        .find_map(|section| section.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

/// Sync copy direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Filesystem to database
    #[default]
    FsToDb,
    /// Database to filesystem
    DbToFs,
}

impl SyncDirection {
    /// Source map
    #[must_use]
    pub fn source(self) -> Domain {
        match self {
            Self::FsToDb => Domain::Filesystem,
            Self::DbToFs => Domain::Database,
        }
    }

    /// Destination map
    #[must_use]
    pub fn destination(self) -> Domain {
        self.source().other()
    }
}

/// Direction declared in a sync payload (`fs_to_db` unless `db_to_fs`)
#[must_use]
pub fn sync_direction(payload: &Map<String, Value>, policy: &GatePolicy) -> SyncDirection {
    match payload
        .get(&policy.sync.direction_field)
        .and_then(Value::as_str)
    {
        Some("db_to_fs") => SyncDirection::DbToFs,
        _ => SyncDirection::FsToDb,
    }
}

/// Destination key for a synced source key
#[must_use]
pub fn sync_destination(key: &str, destination: Domain, environment: Option<&str>) -> String {
    let bare = key.trim_start_matches('/');
    let namespaced = match environment {
        Some(env) => format!("{env}/{bare}"),
        None => bare.to_string(),
    };
    match destination {
        Domain::Filesystem => format!("/{namespaced}"),
        Domain::Database => namespaced,
    }
}

/// Mutations one step produces against `state`
///
/// Batch steps are planned one at a time, each against the state the
/// previous step left.
pub fn plan_step(
    bundle: &ActionBundle,
    step: &SubOperation,
    state: &ResourceState,
    policy: &GatePolicy,
) -> Result<Vec<Mutation>, StateError> {
    let target = Target::parse(&step.target);
    let domain = target.domain();

    let mutations = match step.operation {
        OperationType::Write => {
            let key = naive_target(state, &target, ResolveMode::Create)?
                .unwrap_or_else(|| target.selector().to_string());
            let value = write_value(&step.payload, policy);
            let mut out = vec![Mutation::upsert(domain, key, value.clone())];

            for effect in descriptive_effects(step, policy) {
                match effect {
                    DescriptiveEffect::MirrorWrite { key, .. } => {
                        out.push(Mutation::upsert(Domain::Filesystem, key, value.clone()));
                    }
                    DescriptiveEffect::LogRotation { .. } => {
                        out.extend(
                            rotation_keys(state, policy)
                                .into_iter()
                                .map(|k| Mutation::remove(Domain::Filesystem, k)),
                        );
                    }
                }
            }
            out
        }

        OperationType::Delete => {
            let recursive = effective_recursive(&step.payload, bundle.context_fields(), policy);
            delete_scope(state, &target, recursive)?
                .into_iter()
                .map(|k| Mutation::remove(domain, k))
                .collect()
        }

        OperationType::Update => {
            // Absent target: merge into the literal key, which absorbs
            let key = naive_target(state, &target, ResolveMode::Existing)?
                .unwrap_or_else(|| target.selector().to_string());
            vec![Mutation::merge(domain, key, step.payload.clone())]
        }

        OperationType::Sync => {
            let direction = sync_direction(&step.payload, policy);
            let source = Target::in_domain(direction.source(), target.selector());
            let environment = effective_environment(
                bundle.metadata(),
                bundle.context_fields(),
                &step.payload,
                policy,
            );
            let destination = direction.destination();

            state
                .select(&source)?
                .into_iter()
                .filter_map(|key| {
                    let value = state.get(direction.source(), &key)?.clone();
                    let dest = sync_destination(&key, destination, environment.as_deref());
                    Some(Mutation::upsert(destination, dest, value))
                })
                .collect()
        }

        // Decomposition never yields a nested batch
        OperationType::Batch => Vec::new(),
    };

    Ok(mutations)
}
