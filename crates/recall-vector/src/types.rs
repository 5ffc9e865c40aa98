//! Common types for the vector store module.
//!
//! These types are shared by every provider and by the ingestion and fusion
//! layers, and are always available regardless of feature flags.

use chrono::{DateTime, Utc};
use recall_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Document metadata: string keys mapped to scalar or structured JSON values.
pub type Metadata = HashMap<String, Value>;

// ============================================================================
// Content
// ============================================================================

/// Document payload: text or raw bytes.
///
/// Serializes untagged, so JSON strings become [`Content::Text`] and JSON
/// arrays of bytes become [`Content::Bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// UTF-8 text.
    Text(String),
    /// Opaque binary payload.
    Bytes(Vec<u8>),
}

impl Content {
    /// The text, if this is text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Raw bytes of the payload (UTF-8 bytes for text).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// The payload as text, replacing invalid UTF-8 sequences.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Short tag naming the variant (`"text"` or `"bytes"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A document stored in (or retrieved from) a vector store.
///
/// Values are owned copies: handing a document to a provider never gives the
/// provider a handle onto the caller's instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Caller-assigned unique identifier.
    pub id: String,

    /// Text or binary payload.
    pub content: Content,

    /// Arbitrary metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,

    /// Embedding vector, once computed by the embedding pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Creation or last-touch instant.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl VectorDocument {
    /// Create a document with empty metadata and no embedding.
    pub fn new(id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            embedding: None,
            timestamp: Utc::now(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata map.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Length of the embedding, if one is attached.
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }
}

/// A retrieved document paired with its similarity score.
///
/// Higher scores are more relevant. The scale is provider-defined but
/// monotonic with the order returned by `query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The retrieved document.
    pub document: VectorDocument,

    /// Similarity score.
    pub score: f32,
}

impl QueryResult {
    /// Create a new query result.
    pub fn new(document: VectorDocument, score: f32) -> Self {
        Self { document, score }
    }

    /// Identifier of the retrieved document.
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

// ============================================================================
// Connection configuration
// ============================================================================

/// Connection parameters handed to `connect`.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Index / collection / table name.
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Embedding dimension the index is bound to.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Backend location (directory path or endpoint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Credential for managed backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Backend-specific extras.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

fn default_index_name() -> String {
    "rag_memory".to_string()
}

fn default_dimension() -> usize {
    1536
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            dimension: default_dimension(),
            uri: None,
            api_key: None,
            options: HashMap::new(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration for the given index and dimension.
    pub fn new(index_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            index_name: index_name.into(),
            dimension,
            ..Default::default()
        }
    }

    /// Set the backend location.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Add a backend-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Check the parts every backend relies on.
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(Error::config("index name must not be empty"));
        }
        if self.dimension == 0 {
            return Err(Error::config("embedding dimension must be greater than zero"));
        }
        if i32::try_from(self.dimension).is_err() {
            return Err(Error::config(format!(
                "embedding dimension {} exceeds {}",
                self.dimension,
                i32::MAX
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("index_name", &self.index_name)
            .field("dimension", &self.dimension)
            .field("uri", &self.uri)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    // ------------------------------------------------------------------------
    // Content tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_content_text_accessors() {
        let content = Content::from("hello");
        assert_eq!(content.as_text(), Some("hello"));
        assert_eq!(content.as_bytes(), b"hello");
        assert_eq!(content.kind(), "text");
        assert_eq!(content.len(), 5);
        assert!(!content.is_empty());
    }

    #[test]
    fn test_content_bytes_accessors() {
        let content = Content::from(vec![0xff_u8, 0x00]);
        assert!(content.as_text().is_none());
        assert_eq!(content.kind(), "bytes");
        assert_eq!(content.to_text_lossy(), "\u{fffd}\u{0}");
    }

    #[test]
    fn test_content_untagged_serde() {
        let text: Content = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(text, Content::Text("abc".to_string()));

        let bytes: Content = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(bytes, Content::Bytes(vec![1, 2, 3]));
    }

    // ------------------------------------------------------------------------
    // VectorDocument tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_vector_document_builder() {
        let doc = VectorDocument::new("doc-1", "component notes")
            .with_metadata("component_type", "service")
            .with_metadata("priority", 3)
            .with_embedding(vec![0.1, 0.2]);

        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.metadata["component_type"], json!("service"));
        assert_eq!(doc.metadata["priority"], json!(3));
        assert_eq!(doc.embedding_dimension(), Some(2));
    }

    #[test]
    fn test_vector_document_deserialize_defaults() {
        let doc: VectorDocument =
            serde_json::from_value(json!({"id": "a", "content": "text"})).unwrap();
        assert!(doc.metadata.is_empty());
        assert!(doc.embedding.is_none());
    }

    #[test]
    fn test_vector_document_serialization_skips_empty() {
        let doc = VectorDocument::new("doc-1", "text");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("metadata"));
        assert!(!json.contains("embedding"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_query_result_id() {
        let result = QueryResult::new(VectorDocument::new("x", "y"), 0.5);
        assert_eq!(result.id(), "x");
    }

    // ------------------------------------------------------------------------
    // StoreConfig tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.index_name, "rag_memory");
        assert_eq!(config.dimension, 1536);
        assert!(config.uri.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_config_validate() {
        assert!(StoreConfig::new("idx", 0).validate().is_err());
        assert!(StoreConfig::new("  ", 8).validate().is_err());
        assert!(StoreConfig::new("idx", 8).validate().is_ok());
    }

    #[test]
    fn test_store_config_validate_rejects_oversized_dimension() {
        let oversized = usize::try_from(i64::from(i32::MAX) + 1).unwrap();
        let err = StoreConfig::new("idx", oversized).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(StoreConfig::new("idx", i32::MAX as usize).validate().is_ok());
    }

    #[test]
    fn test_store_config_debug_redacts_key() {
        let config = StoreConfig::new("idx", 4).with_api_key("secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_store_config_deserialization_with_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"dimension": 8}"#).unwrap();
        assert_eq!(config.index_name, "rag_memory");
        assert_eq!(config.dimension, 8);
    }
}
