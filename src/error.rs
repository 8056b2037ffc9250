//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// A missing key is never an error: lookups return `Ok(None)` and removals
/// report whether anything was removed.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The value stored under a key is not of the requested type
    #[error("Type mismatch for key `{key}`: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The producer passed to a compute-if-absent call failed
    #[error("Producer failed for key `{key}`")]
    ProducerFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CacheError {
    /// Returns the key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            CacheError::TypeMismatch { key, .. } => key,
            CacheError::ProducerFailed { key, .. } => key,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_type_mismatch_message() {
        let err = CacheError::TypeMismatch {
            key: "answer".to_string(),
            expected: "u32",
            found: "alloc::string::String",
        };

        assert_eq!(
            err.to_string(),
            "Type mismatch for key `answer`: expected u32, found alloc::string::String"
        );
        assert_eq!(err.key(), "answer");
    }

    #[test]
    fn test_producer_failed_keeps_source() {
        let err = CacheError::ProducerFailed {
            key: "report".to_string(),
            source: anyhow::anyhow!("database unavailable"),
        };

        assert_eq!(err.to_string(), "Producer failed for key `report`");
        let source = err.source().expect("source should be attached");
        assert_eq!(source.to_string(), "database unavailable");
    }
}
