//! Error types for Recall operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all Recall crates. Uses `thiserror` for derive macros.
//!
//! Schema violations are deliberately absent: they are reported as data
//! (`Vec<String>`) so batch callers can account for partial success.

use thiserror::Error;

/// Errors that can occur in Recall operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The backend cannot be reached or rejected the credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A referenced document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An embedding does not have the dimension the index is bound to.
    #[error("Dimension mismatch for document {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Offending document id (or `<query>` for query vectors).
        id: String,
        /// Dimension the provider is bound to.
        expected: usize,
        /// Dimension that was supplied.
        actual: usize,
    },

    /// Backend-specific failure, wrapped uniformly.
    #[error("Store error: {0}")]
    Store(String),

    /// The provider has not been connected, or has been cleaned up.
    #[error("Provider not initialized: {0}")]
    NotInitialized(String),

    /// No provider is registered under the requested store type.
    #[error("Unsupported vector store type: {0}")]
    UnsupportedType(String),

    /// A provider is already registered under the requested store type.
    #[error("Provider type already registered: {0}")]
    AlreadyRegistered(String),

    /// A provider constructor produced an instance that breaks the contract.
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// A document schema definition is malformed.
    #[error("Invalid schema definition: {0}")]
    SchemaDefinition(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(id: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Create a generic store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a not-initialized error naming the provider.
    pub fn not_initialized(provider: impl Into<String>) -> Self {
        Self::NotInitialized(provider.into())
    }

    /// Create a schema definition error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaDefinition(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Whether retrying the same operation with the same input may succeed.
    ///
    /// Only generic backend and I/O failures qualify. Dimension mismatches,
    /// missing documents and configuration problems are permanent for a
    /// given input, and connection failures are fatal for the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io(_))
    }

    /// Whether this error is the not-found member of the taxonomy.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias using Recall's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message_names_document() {
        let err = Error::dimension_mismatch("doc-7", 4, 3);
        let msg = err.to_string();
        assert!(msg.contains("doc-7"));
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::store("timeout").is_retryable());
        assert!(Error::from(std::io::Error::other("reset")).is_retryable());

        assert!(!Error::connection("bad key").is_retryable());
        assert!(!Error::dimension_mismatch("a", 2, 3).is_retryable());
        assert!(!Error::not_found("a").is_retryable());
        assert!(!Error::not_initialized("memory").is_retryable());
        assert!(!Error::config("x").is_retryable());
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = Error::UnsupportedType("pinecone".to_string());
        assert_eq!(err.to_string(), "Unsupported vector store type: pinecone");
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("doc").is_not_found());
        assert!(!Error::store("doc").is_not_found());
    }
}
