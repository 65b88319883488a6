//! Testing utilities for EBL workspace
//!
//! Shared builders, state fixtures, corpus location and proptest strategies.

#![allow(missing_docs)]

use ebl_bundle::{ActionBundle, ContextSnapshot, GatePolicy};
use ebl_state::{Domain, Mutation, ResourceState};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Fluent builder for bundle documents
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    operation_type: String,
    target_resource: String,
    payload: Map<String, Value>,
    metadata: Map<String, Value>,
    context_fields: Map<String, Value>,
}

impl BundleBuilder {
    pub fn new(operation_type: &str, target_resource: &str) -> Self {
        Self {
            operation_type: operation_type.to_string(),
            target_resource: target_resource.to_string(),
            payload: Map::new(),
            metadata: Map::new(),
            context_fields: Map::new(),
        }
    }

    pub fn write(target: &str, content: Value) -> Self {
        Self::new("write", target).payload("content", content)
    }

    pub fn delete(target: &str) -> Self {
        Self::new("delete", target)
    }

    pub fn update(target: &str) -> Self {
        Self::new("update", target)
    }

    pub fn sync(target: &str) -> Self {
        Self::new("sync", target)
    }

    /// Batch over `steps` (each a step object)
    pub fn batch(target: &str, steps: Vec<Value>) -> Self {
        Self::new("batch", target).payload("operations", Value::Array(steps))
    }

    pub fn payload(mut self, field: &str, value: Value) -> Self {
        self.payload.insert(field.to_string(), value);
        self
    }

    pub fn metadata(mut self, field: &str, value: Value) -> Self {
        self.metadata.insert(field.to_string(), value);
        self
    }

    pub fn context(mut self, field: &str, value: Value) -> Self {
        self.context_fields.insert(field.to_string(), value);
        self
    }

    pub fn permissions(self, caps: &[&str]) -> Self {
        self.context("permissions", json!(caps))
    }

    pub fn to_value(&self) -> Value {
        json!({
            "operation_type": self.operation_type,
            "target_resource": self.target_resource,
            "payload": self.payload,
            "metadata": self.metadata,
            "context_fields": self.context_fields,
        })
    }

    /// Validated bundle; panics on structural errors
    pub fn build(&self) -> ActionBundle {
        ActionBundle::from_value(self.to_value()).unwrap()
    }
}

/// Step object for [`BundleBuilder::batch`]
pub fn step(operation_type: &str, target: Option<&str>, payload: Value) -> Value {
    let mut step = json!({"operation_type": operation_type, "payload": payload});
    if let Some(target) = target {
        step["target_resource"] = json!(target);
    }
    step
}

/// State from a `{"filesystem": .., "database": ..}` literal
pub fn state(value: Value) -> ResourceState {
    serde_json::from_value(value).unwrap()
}

/// Filesystem-only state
pub fn fs_state(entries: &[(&str, Value)]) -> ResourceState {
    let mut state = ResourceState::new();
    for (key, value) in entries {
        state.apply(&Mutation::upsert(Domain::Filesystem, *key, value.clone()));
    }
    state
}

/// Snapshot under the default policy
pub fn snapshot(state: &ResourceState, bundle: &ActionBundle) -> ContextSnapshot {
    ContextSnapshot::for_bundle(state, bundle, &GatePolicy::default())
}

/// Workspace `cases/` directory
pub fn corpus_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("cases")
}

/// Workspace `policy/default.toml`
pub fn default_policy_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("policy")
        .join("default.toml")
}

fn arb_key() -> impl Strategy<Value = String> {
    "/(data|logs|shared|system|reports)/[a-c]{1,2}(\\.json|\\.log|\\.old)?"
}

/// Small filesystem + database state
pub fn arb_state() -> impl Strategy<Value = ResourceState> {
    (
        prop::collection::vec((arb_key(), 0i32..5), 0..8),
        prop::collection::vec(("(user|order)_record/[a-c]{1,2}", 0i32..5), 0..4),
    )
        .prop_map(|(fs, db)| {
            let mut state = ResourceState::new();
            for (k, v) in fs {
                state.apply(&Mutation::upsert(Domain::Filesystem, k, json!(v)));
            }
            for (k, v) in db {
                state.apply(&Mutation::upsert(Domain::Database, k, json!({"v": v})));
            }
            state
        })
}

/// Arbitrary structurally valid bundle, contaminated or not
pub fn arb_bundle() -> impl Strategy<Value = ActionBundle> {
    let op = prop_oneof![
        Just("write"),
        Just("delete"),
        Just("update"),
        Just("sync"),
    ];
    let target = prop_oneof![
        arb_key(),
        Just("/data/*".to_string()),
        Just("/logs".to_string()),
        Just("user_record".to_string()),
        Just("/shared/x.json".to_string()),
    ];
    let caps = prop::sample::subsequence(vec!["read", "write", "sync", "admin"], 0..=4);
    let recursive = prop_oneof![Just(None), Just(Some(true)), Just(Some(false))];
    let description = prop_oneof![
        Just(None),
        Just(Some("plain text")),
        Just(Some("mirror to /data/copy.json")),
    ];
    let meta_env = prop_oneof![Just(None), Just(Some("staging")), Just(Some("production"))];
    let ctx_env = prop_oneof![Just(None), Just(Some("staging"))];

    (op, target, caps, recursive, description, meta_env, ctx_env).prop_map(
        |(op, target, caps, recursive, description, meta_env, ctx_env)| {
            let mut b = BundleBuilder::new(op, &target)
                .payload("content", json!("v"))
                .permissions(&caps);
            if let Some(r) = recursive {
                b = b.payload("recursive", json!(r));
            }
            if let Some(d) = description {
                b = b.payload("description", json!(d));
            }
            if let Some(e) = meta_env {
                b = b.metadata("environment", json!(e));
            }
            if let Some(e) = ctx_env {
                b = b.context("environment", json!(e));
            }
            b.build()
        },
    )
}

/// Write bundles that carry no contamination under the default policy
pub fn arb_clean_write() -> impl Strategy<Value = ActionBundle> {
    ("/data/[a-c]{1,3}\\.json", 0i32..100).prop_map(|(target, v)| {
        BundleBuilder::write(&target, json!(v))
            .permissions(&["write"])
            .build()
    })
}

/// Batch that writes a sibling of `key` and then deletes `key` with
/// recursion left at its default
pub fn arb_backup_then_delete() -> impl Strategy<Value = ActionBundle> {
    (arb_key(), "\\.(bak|1|tmp)").prop_map(|(key, suffix)| {
        BundleBuilder::batch(
            &key,
            vec![
                step("write", Some(&format!("{key}{suffix}")), json!({"content": "backup"})),
                step("delete", Some(&key), json!({})),
            ],
        )
        .permissions(&["write"])
        .build()
    })
}

/// Batch that writes one more `/data/` file and then deletes `/data/*`
/// without recursion
pub fn arb_write_then_wildcard_delete() -> impl Strategy<Value = ActionBundle> {
    "/data/new_[a-c]{1,2}\\.json".prop_map(|key| {
        BundleBuilder::batch(
            "/data",
            vec![
                step("write", Some(&key), json!({"content": 1})),
                step("delete", Some("/data/*"), json!({"recursive": false})),
            ],
        )
        .permissions(&["write"])
        .build()
    })
}
