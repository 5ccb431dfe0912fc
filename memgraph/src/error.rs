//! Error types for memgraph

use thiserror::Error;

/// Errors that can occur in the memory system
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed namespace/bucket/identifier or an out-of-range argument
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Parallel edge arrays of different lengths
    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// Source node of a graph operation does not exist
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Embedding provider returned no usable vector
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Row or table does not fit the table schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UUID parsing error
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Embedding provider transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// Create an invalid input error for the named field
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an argument mismatch error
    pub fn argument_mismatch(msg: impl Into<String>) -> Self {
        Self::ArgumentMismatch(msg.into())
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an embedding unavailable error
    pub fn embedding_unavailable(msg: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a caller may reasonably retry the failed call.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingUnavailable(_) | Self::Http(_))
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_names_field() {
        let err = MemoryError::invalid_input("namespace", "contains forbidden characters");
        assert_eq!(
            err.to_string(),
            "Invalid namespace: contains forbidden characters"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(MemoryError::embedding_unavailable("no vectors").is_retryable());
        assert!(!MemoryError::not_found("abc").is_retryable());
        assert!(!MemoryError::invalid_input("top_k", "too large").is_retryable());
    }
}
