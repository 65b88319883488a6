//! Error types for bundles and policy loading
//!
//! Structural errors reject a bundle before any gate sees it; they are
//! never contamination findings.

use std::path::PathBuf;

/// Structural bundle errors (raised before evaluation)
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Input is not valid JSON
    #[error("malformed bundle JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level document is not an object
    #[error("bundle must be a JSON object")]
    NotAnObject,

    /// Required field absent
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Field present with the wrong JSON type
    #[error("field '{field}' must be {expected}")]
    InvalidType {
        /// Field path
        field: String,
        /// Expected JSON type
        expected: &'static str,
    },

    /// `operation_type` outside the enumerated set
    #[error("unknown operation type '{0}'")]
    UnknownOperation(String),

    /// Target string is empty
    #[error("field '{0}' must not be empty")]
    EmptyTarget(String),

    /// A batch nested inside a batch
    #[error("nested batch at '{0}' is not supported")]
    NestedBatch(String),
}

impl BundleError {
    /// Create type error for a field path
    #[inline]
    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidType {
            field: field.into(),
            expected,
        }
    }
}

/// Errors loading gate policy tables
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not match the policy schema
    #[error("invalid policy document: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PolicyError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
