//! Error types for execution and the trace comparator

use ebl_bundle::{BundleError, PolicyError};
use ebl_state::StateError;
use std::path::PathBuf;

/// Execution errors
///
/// Absorbed mutations (update or delete of an absent key) are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Bundle could not be decomposed into steps
    #[error("bundle decomposition failed: {0}")]
    Decomposition(#[from] BundleError),

    /// Target could not be resolved
    #[error("target resolution failed: {0}")]
    Resolution(#[from] StateError),
}

/// Trace log errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Hash chain broken at an event
    #[error("trace integrity violation at event {seq}")]
    IntegrityViolation {
        /// Sequence number of the first bad event
        seq: u64,
    },
}

/// Trace comparator errors
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// IO error reading a case or directory
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Case file is not a valid fixture
    #[error("invalid case fixture {path}: {source}")]
    Fixture {
        /// Case file
        path: PathBuf,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },

    /// Case bundle failed structural validation
    #[error("case '{case}' has a malformed bundle: {source}")]
    Bundle {
        /// Case name
        case: String,
        /// Structural error
        #[source]
        source: BundleError,
    },

    /// Execution failed
    #[error("case '{case}' failed to execute: {source}")]
    Execution {
        /// Case name
        case: String,
        /// Execution error
        #[source]
        source: ExecutionError,
    },

    /// Policy could not be loaded
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl HarnessError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
