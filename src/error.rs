// In: src/error.rs

//! This module defines the unified error type for the colshape library, plus the
//! lightweight `PatternNotApplicable` signal raised by operators.
//! Both use the `thiserror` crate for ergonomic, context-aware error handling.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ColshapeError>;

#[derive(Error, Debug)]
pub enum ColshapeError {
    // =========================================================================
    // === High-Level, Semantic Errors
    // =========================================================================
    /// A row has the wrong number of fields, or a node references a column
    /// the tree does not know about.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A declared output column was left unfilled after decompression replay.
    #[error("Internal inconsistency (this is a bug): {0}")]
    InternalInconsistency(String),

    /// Round-trip validation found a difference and the run was configured
    /// to stop on the first mismatch.
    #[error("Validation mismatch: {message}: {diff}")]
    ValidationMismatch {
        message: String,
        diff: serde_json::Value,
    },

    #[error("Invalid expression tree: {0}")]
    InvalidTree(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during tree/config (de)serialization.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Raised by a forward or inverse operator when the values of the current row
/// do not fit the pattern. It is an expected, per-row condition: the compression
/// pipeline turns it into exception routing and the decompression pipeline into
/// a node skip. It never crosses the pipeline boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pattern not applicable: {0}")]
pub struct PatternNotApplicable(pub &'static str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_with_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ColshapeError = io.into();
        assert!(matches!(err, ColshapeError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_pattern_not_applicable_message() {
        let err = PatternNotApplicable("value not in dictionary");
        assert_eq!(err.to_string(), "pattern not applicable: value not in dictionary");
    }
}
