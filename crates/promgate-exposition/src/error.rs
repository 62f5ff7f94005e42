//! Exposition error types.

use thiserror::Error;

/// Result type alias for exposition operations.
pub type ExpositionResult<T> = Result<T, ExpositionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpositionError {
    /// The stream does not follow the text exposition grammar.
    #[error("text format parsing error in line {line}: {reason}")]
    Decode { line: usize, reason: String },

    /// A family cannot be rendered as valid exposition text.
    #[error("cannot encode metric family {family}: {reason}")]
    Encode { family: String, reason: String },
}
