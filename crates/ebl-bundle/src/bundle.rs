//! Action bundles and sub-operation decomposition
//!
//! # Core Concepts
//!
//! - **ActionBundle**: immutable request with five required top-level fields
//! - **SubOperation**: one step of a bundle; a non-batch bundle is one step
//! - **Structural validation**: shape errors are rejected here, before any
//!   gate runs

use crate::error::BundleError;
use crate::operation::OperationType;
use serde::Serialize;
use serde_json::{Map, Value};

/// Required top-level fields, in wire order
pub const REQUIRED_FIELDS: [&str; 5] = [
    "operation_type",
    "target_resource",
    "payload",
    "metadata",
    "context_fields",
];

/// Payload field holding the steps of a `batch`
pub const BATCH_OPERATIONS_FIELD: &str = "operations";

/// A structured action request
///
/// Fields are private; a bundle is never modified after it is received.
/// Object key order is preserved as declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionBundle {
    operation_type: OperationType,
    target_resource: String,
    payload: Map<String, Value>,
    metadata: Map<String, Value>,
    context_fields: Map<String, Value>,
}

impl ActionBundle {
    /// Construct without validation
    ///
    /// Decomposition problems on such a bundle surface later, from
    /// [`sub_operations`](Self::sub_operations).
    #[must_use]
    pub fn new(
        operation_type: OperationType,
        target_resource: impl Into<String>,
        payload: Map<String, Value>,
        metadata: Map<String, Value>,
        context_fields: Map<String, Value>,
    ) -> Self {
        Self {
            operation_type,
            target_resource: target_resource.into(),
            payload,
            metadata,
            context_fields,
        }
    }

    /// Parse and structurally validate a JSON document
    pub fn from_json(input: &str) -> Result<Self, BundleError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Structurally validate an already-parsed document
    pub fn from_value(value: Value) -> Result<Self, BundleError> {
        let Value::Object(mut doc) = value else {
            return Err(BundleError::NotAnObject);
        };

        for field in REQUIRED_FIELDS {
            if !doc.contains_key(field) {
                return Err(BundleError::MissingField(field.to_string()));
            }
        }

        let operation_type = parse_operation(&doc, "operation_type", "operation_type")?;
        let target_resource = parse_target(&doc, "target_resource", "target_resource")?;
        let payload = take_object(&mut doc, "payload", "payload")?;
        let metadata = take_object(&mut doc, "metadata", "metadata")?;
        let context_fields = take_object(&mut doc, "context_fields", "context_fields")?;

        let bundle = Self {
            operation_type,
            target_resource,
            payload,
            metadata,
            context_fields,
        };

        // Batch shape is structural too
        bundle.sub_operations()?;
        Ok(bundle)
    }

    /// Requested operation
    #[inline]
    #[must_use]
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Raw target string
    #[inline]
    #[must_use]
    pub fn target_resource(&self) -> &str {
        &self.target_resource
    }

    /// Operation payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Auxiliary metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Caller's declared session state
    #[inline]
    #[must_use]
    pub fn context_fields(&self) -> &Map<String, Value> {
        &self.context_fields
    }

    /// Whether this is a `batch`
    #[inline]
    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.operation_type == OperationType::Batch
    }

    /// Decompose into steps in declared order
    ///
    /// Batch steps inherit the batch target when they omit their own. A
    /// nested batch is rejected.
    pub fn sub_operations(&self) -> Result<Vec<SubOperation>, BundleError> {
        if !self.is_batch() {
            return Ok(vec![SubOperation {
                index: 0,
                operation: self.operation_type,
                target: self.target_resource.clone(),
                payload: self.payload.clone(),
                path: String::new(),
            }]);
        }

        let field = format!("payload.{BATCH_OPERATIONS_FIELD}");
        let steps = match self.payload.get(BATCH_OPERATIONS_FIELD) {
            None => return Err(BundleError::MissingField(field)),
            Some(Value::Array(steps)) => steps,
            Some(_) => return Err(BundleError::invalid_type(field, "an array")),
        };

        steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.decode_step(index, step))
            .collect()
    }

    fn decode_step(&self, index: usize, step: &Value) -> Result<SubOperation, BundleError> {
        let path = format!("payload.{BATCH_OPERATIONS_FIELD}[{index}]");
        let Value::Object(step) = step else {
            return Err(BundleError::invalid_type(path, "an object"));
        };

        let op_path = format!("{path}.operation_type");
        if !step.contains_key("operation_type") {
            return Err(BundleError::MissingField(op_path));
        }
        let operation = parse_operation(step, "operation_type", &op_path)?;
        if operation == OperationType::Batch {
            return Err(BundleError::NestedBatch(path));
        }

        let target = if step.contains_key("target_resource") {
            parse_target(step, "target_resource", &format!("{path}.target_resource"))?
        } else {
            self.target_resource.clone()
        };

        let payload = match step.get("payload") {
            None => Map::new(),
            Some(Value::Object(payload)) => payload.clone(),
            Some(_) => {
                return Err(BundleError::invalid_type(
                    format!("{path}.payload"),
                    "an object",
                ))
            }
        };

        Ok(SubOperation {
            index,
            operation,
            target,
            payload,
            path,
        })
    }
}

/// One step of a bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubOperation {
    /// Position in declared order
    pub index: usize,
    /// Step operation (never `batch`)
    pub operation: OperationType,
    /// Raw target string
    pub target: String,
    /// Step payload
    pub payload: Map<String, Value>,
    path: String,
}

impl SubOperation {
    /// Field path of the step's target
    #[must_use]
    pub fn target_path(&self) -> String {
        self.field_path("target_resource")
    }

    /// Field path of a field inside the step's payload
    #[must_use]
    pub fn payload_path(&self, field: &str) -> String {
        self.field_path(&format!("payload.{field}"))
    }

    /// Field path of the step itself (`""` for a non-batch bundle)
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn field_path(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.path)
        }
    }
}

fn parse_operation(
    doc: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<OperationType, BundleError> {
    match doc.get(key) {
        Some(Value::String(s)) => s.parse(),
        Some(_) => Err(BundleError::invalid_type(path, "a string")),
        None => Err(BundleError::MissingField(path.to_string())),
    }
}

fn parse_target(doc: &Map<String, Value>, key: &str, path: &str) -> Result<String, BundleError> {
    match doc.get(key) {
        Some(Value::String(s)) if s.is_empty() => Err(BundleError::EmptyTarget(path.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(BundleError::invalid_type(path, "a string")),
        None => Err(BundleError::MissingField(path.to_string())),
    }
}

fn take_object(
    doc: &mut Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Map<String, Value>, BundleError> {
    match doc.remove(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(BundleError::invalid_type(path, "an object")),
        None => Err(BundleError::MissingField(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(op: &str, target: &str, payload: Value) -> Value {
        json!({
            "operation_type": op,
            "target_resource": target,
            "payload": payload,
            "metadata": {},
            "context_fields": {}
        })
    }

    #[test]
    fn parses_valid_bundle() {
        let bundle =
            ActionBundle::from_value(doc("write", "/data/new.json", json!({"content": "v1"})))
                .unwrap();
        assert_eq!(bundle.operation_type(), OperationType::Write);
        assert_eq!(bundle.target_resource(), "/data/new.json");
        assert_eq!(bundle.payload().get("content"), Some(&json!("v1")));
        assert!(bundle.metadata().is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ActionBundle::from_json("{not json").unwrap_err();
        assert!(matches!(err, BundleError::Json(_)));
    }

    #[test]
    fn rejects_non_object() {
        let err = ActionBundle::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, BundleError::NotAnObject));
    }

    #[test]
    fn names_missing_field() {
        for field in REQUIRED_FIELDS {
            let mut value = doc("write", "/a", json!({}));
            value.as_object_mut().unwrap().remove(field);
            let err = ActionBundle::from_value(value).unwrap_err();
            assert!(
                matches!(err, BundleError::MissingField(ref f) if f == field),
                "{field}: {err}"
            );
        }
    }

    #[test]
    fn names_mistyped_field() {
        let mut value = doc("write", "/a", json!({}));
        value["metadata"] = json!("not a map");
        let err = ActionBundle::from_value(value).unwrap_err();
        assert!(matches!(err, BundleError::InvalidType { ref field, .. } if field == "metadata"));

        let mut value = doc("write", "/a", json!({}));
        value["operation_type"] = json!(3);
        assert!(ActionBundle::from_value(value).is_err());
    }

    #[test]
    fn rejects_unknown_operation_and_empty_target() {
        let err = ActionBundle::from_value(doc("truncate", "/a", json!({}))).unwrap_err();
        assert!(matches!(err, BundleError::UnknownOperation(_)));

        let err = ActionBundle::from_value(doc("write", "", json!({}))).unwrap_err();
        assert!(matches!(err, BundleError::EmptyTarget(_)));
    }

    #[test]
    fn preserves_payload_order() {
        let bundle = ActionBundle::from_json(
            r#"{"operation_type":"write","target_resource":"/a",
                "payload":{"zeta":1,"alpha":2,"mid":3},
                "metadata":{},"context_fields":{}}"#,
        )
        .unwrap();
        let keys: Vec<_> = bundle.payload().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn single_operation_decomposes_to_itself() {
        let bundle =
            ActionBundle::from_value(doc("delete", "/logs/app.log", json!({"recursive": false})))
                .unwrap();
        let ops = bundle.sub_operations().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation, OperationType::Delete);
        assert_eq!(ops[0].payload_path("recursive"), "payload.recursive");
        assert_eq!(ops[0].target_path(), "target_resource");
    }

    #[test]
    fn batch_steps_inherit_target() {
        let bundle = ActionBundle::from_value(doc(
            "batch",
            "/data",
            json!({"operations": [
                {"operation_type": "sync", "target_resource": "/data/*"},
                {"operation_type": "delete", "payload": {"recursive": false}}
            ]}),
        ))
        .unwrap();

        let ops = bundle.sub_operations().unwrap();
        assert_eq!(ops[0].target, "/data/*");
        assert!(ops[0].payload.is_empty());
        assert_eq!(ops[1].target, "/data");
        assert_eq!(ops[1].index, 1);
        assert_eq!(
            ops[1].payload_path("recursive"),
            "payload.operations[1].payload.recursive"
        );
    }

    #[test]
    fn rejects_malformed_batch() {
        let err = ActionBundle::from_value(doc("batch", "/d", json!({}))).unwrap_err();
        assert!(matches!(err, BundleError::MissingField(ref f) if f == "payload.operations"));

        let err =
            ActionBundle::from_value(doc("batch", "/d", json!({"operations": [1]}))).unwrap_err();
        assert!(matches!(err, BundleError::InvalidType { .. }));

        let err = ActionBundle::from_value(doc(
            "batch",
            "/d",
            json!({"operations": [{"target_resource": "/x"}]}),
        ))
        .unwrap_err();
        assert!(
            matches!(err, BundleError::MissingField(ref f) if f == "payload.operations[0].operation_type")
        );
    }

    #[test]
    fn rejects_nested_batch() {
        let err = ActionBundle::from_value(doc(
            "batch",
            "/d",
            json!({"operations": [{"operation_type": "batch"}]}),
        ))
        .unwrap_err();
        assert!(matches!(err, BundleError::NestedBatch(_)));
    }

    #[test]
    fn unvalidated_bundle_fails_on_decomposition() {
        let bundle = ActionBundle::new(
            OperationType::Batch,
            "/d",
            Map::new(),
            Map::new(),
            Map::new(),
        );
        assert!(bundle.sub_operations().is_err());
    }
}
