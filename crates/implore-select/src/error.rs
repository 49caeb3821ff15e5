//! Error types for implore-select
//!
//! All variants are programmer or compiler errors. None are retried; they
//! propagate to the immediate caller of the evaluator.

use crate::program::{Level, PredicateId};
use thiserror::Error;

/// Main error type for selection evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// The program does not fit the bound structure
    #[error("Predicate {predicate} does not match the structure: {message}")]
    CompilationMismatch {
        predicate: PredicateId,
        message: String,
    },

    /// A named attribute without a default is absent on an element
    #[error("Attribute '{key}' missing on {level} '{element}' and no default was given")]
    MissingAttribute {
        key: String,
        level: Level,
        element: String,
    },

    /// A level program does not reduce to exactly one value
    #[error("Malformed {level} program: {message}")]
    MalformedProgram { level: Level, message: String },

    /// An attribute value cannot be compared with the predicate parameter
    #[error("Attribute '{key}' holds {found}, predicate expects {expected}")]
    AttributeType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type alias for selection operations
pub type SelectionResult<T> = Result<T, SelectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_display() {
        let err = SelectionError::MissingAttribute {
            key: "beta".to_string(),
            level: Level::Leaf,
            element: "CA".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("beta"));
        assert!(text.contains("leaf"));
        assert!(text.contains("CA"));
    }

    #[test]
    fn test_mismatch_display() {
        let err = SelectionError::CompilationMismatch {
            predicate: 4,
            message: "proximity outside leaf level".to_string(),
        };
        assert!(err.to_string().contains("Predicate 4"));
    }
}
