//! Error types for the resource state model

/// Errors raised while reading or matching resource state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A wildcard selector could not be compiled into a matcher
    #[error("invalid selector pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending selector
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A state document could not be decoded
    #[error("invalid state document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StateError {
    /// Create pattern error for a selector
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}
