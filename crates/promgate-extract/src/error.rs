//! Extraction error types.

use thiserror::Error;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while extracting values from a JSON document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The query did not resolve. Absent keys, out-of-range indexes and
    /// malformed queries are all reported here.
    #[error("path not found: {query}: {reason}")]
    PathNotFound { query: String, reason: String },

    /// The query resolved to a value of the wrong shape for its role.
    #[error("{role} at {query}: expected {expected}, found {found}")]
    TypeMismatch {
        role: String,
        query: String,
        expected: &'static str,
        found: &'static str,
    },
}
