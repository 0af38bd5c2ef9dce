//! Query error types
//!
//! Defines all error conditions that can occur while building or executing a
//! query. Every variant is fatal for the call that raised it: there is no
//! partial-result mode.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Two different array fields were drilled into at the same depth
    #[error("Ambiguous branch at depth {depth}: already drilling into '{existing}', cannot also drill into '{requested}'")]
    AmbiguousBranch {
        depth: usize,
        existing: String,
        requested: String,
    },

    /// Predicate object does not name exactly one known operator
    #[error("Unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// A single key's weight cannot fit inside the requested chunk bounds
    #[error("Chunk too large: key '{key}' has weight {weight}, range ({min_size}, {max_size}) is too strict")]
    ChunkTooLarge {
        key: String,
        weight: usize,
        min_size: usize,
        max_size: usize,
    },

    /// Sort keys contain values with no defined order
    #[error("Comparison error: {0}")]
    Comparison(String),

    /// Unique index saw two records for one key
    #[error("Index on {index} is not unique: key {key} maps to both {first} and {second}")]
    DuplicateKey {
        index: String,
        key: String,
        first: Box<Value>,
        second: Box<Value>,
    },

    /// Malformed dotted path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Malformed query, window, or sort description
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Query clause that is recognised but not supported
    #[error("Unsupported clause: {0}")]
    UnsupportedClause(String),

    /// Records nest deeper than the configured limit
    #[error("Nesting depth {depth} exceeds limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = QueryError::AmbiguousBranch {
            depth: 0,
            existing: "b".to_string(),
            requested: "d".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous branch at depth 0: already drilling into 'b', cannot also drill into 'd'"
        );

        let err = QueryError::UnsupportedPredicate("{\"like\":{}}".to_string());
        assert_eq!(err.to_string(), "Unsupported predicate: {\"like\":{}}");
    }

    #[test]
    fn test_duplicate_key_reports_both_records() {
        let err = QueryError::DuplicateKey {
            index: "id".to_string(),
            key: "7".to_string(),
            first: Box::new(json!({"id": 7, "n": 1})),
            second: Box::new(json!({"id": 7, "n": 2})),
        };
        let message = err.to_string();
        assert!(message.contains("{\"id\":7,\"n\":1}"));
        assert!(message.contains("{\"id\":7,\"n\":2}"));
    }
}
