//! The vector store provider contract.
//!
//! [`VectorStoreProvider`] is the interface every backend implements so that
//! callers can stay backend-agnostic. Conformance is structural: a backend
//! only has to implement the trait, there is no shared base type.
//!
//! The free functions in this module are the pieces of the contract that
//! every backend needs in the same form (dimension checks, exact-match
//! filters, distance-to-score conversion, result ranking).

use async_trait::async_trait;
use recall_core::{Error, Result};
use std::cmp::Ordering;

use crate::schema::DocumentSchema;
use crate::types::{Metadata, QueryResult, StoreConfig, VectorDocument};

/// Id reported in dimension errors raised for query vectors.
pub const QUERY_ID: &str = "<query>";

/// Operations every vector store backend supports.
///
/// All operations are asynchronous. Before `connect` and after `cleanup`,
/// every operation other than `name`, `is_connected` and `dimension` fails
/// with [`Error::NotInitialized`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; concurrent writes to disjoint ids
/// are safe, writes to the same id must be serialized by the caller.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Store-type identifier for diagnostics.
    fn name(&self) -> &str;

    /// Whether the provider is currently bound to an index.
    async fn is_connected(&self) -> bool;

    /// The bound embedding dimension, if connected.
    async fn dimension(&self) -> Option<usize>;

    /// Connect to the backend and bind to `config.index_name`.
    ///
    /// Calling this on a connected provider re-binds it (with a warning)
    /// instead of failing.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] if the backend is unreachable or rejects the
    /// credentials, [`Error::Config`] if the configuration is invalid.
    async fn connect(&self, config: &StoreConfig) -> Result<()>;

    /// Write documents in sub-batches of `batch_size`.
    ///
    /// Returns the stored ids in input order. Existing ids are replaced.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] naming the first document whose embedding
    /// is missing or has the wrong length; nothing from the call is written.
    async fn add_documents(
        &self,
        documents: &[VectorDocument],
        batch_size: usize,
    ) -> Result<Vec<String>>;

    /// Nearest-neighbour search.
    ///
    /// Returns at most `limit` results with `score >= min_score`, ordered by
    /// descending score. When `filter` is given, only documents whose
    /// metadata equals every filter entry are candidates.
    async fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&Metadata>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<QueryResult>>;

    /// Remove documents by id. Unknown ids are ignored.
    async fn delete_documents(&self, ids: &[String]) -> Result<()>;

    /// Merge `metadata` into an existing document's metadata.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no document has this id.
    async fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()>;

    /// Fetch a document; `Ok(None)` when it does not exist.
    async fn get_document(&self, id: &str) -> Result<Option<VectorDocument>>;

    /// Validate a document against a schema.
    ///
    /// Violations are returned as data; only infrastructure problems (such
    /// as an unconnected provider) are errors.
    async fn validate_schema(
        &self,
        schema: &DocumentSchema,
        document: &VectorDocument,
    ) -> Result<Vec<String>> {
        if !self.is_connected().await {
            return Err(Error::not_initialized(self.name()));
        }
        Ok(schema.validate(document))
    }

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;

    /// Release connections and resources. Safe to call repeatedly.
    async fn cleanup(&self) -> Result<()>;
}

// ============================================================================
// Shared contract helpers
// ============================================================================

/// Check that every document carries an embedding of `expected` length.
///
/// Fails on the first offending document so that callers can reject the
/// whole write before touching the backend.
pub fn check_dimensions(documents: &[VectorDocument], expected: usize) -> Result<()> {
    for doc in documents {
        let actual = doc.embedding_dimension().unwrap_or(0);
        if actual != expected {
            return Err(Error::dimension_mismatch(&doc.id, expected, actual));
        }
    }
    Ok(())
}

/// Check a query vector against the bound dimension.
pub fn check_query_dimension(query_embedding: &[f32], expected: usize) -> Result<()> {
    if query_embedding.len() != expected {
        return Err(Error::dimension_mismatch(
            QUERY_ID,
            expected,
            query_embedding.len(),
        ));
    }
    Ok(())
}

/// Sub-batch size for a write; `0` means "everything in one batch".
pub fn effective_batch_size(batch_size: usize, total: usize) -> usize {
    if batch_size == 0 {
        total.max(1)
    } else {
        batch_size
    }
}

/// Exact-match metadata filter: every filter entry must be present and equal.
pub fn matches_filter(metadata: &Metadata, filter: Option<&Metadata>) -> bool {
    filter.is_none_or(|filter| {
        filter
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    })
}

/// Euclidean (L2) distance between two vectors of equal length.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Convert a distance into a "higher is better" score in `(0, 1]`.
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Apply `min_score`, order by descending score (ties by id), truncate to `limit`.
pub fn rank_results(
    mut results: Vec<QueryResult>,
    limit: usize,
    min_score: f32,
) -> Vec<QueryResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    results.truncate(limit);
    results
}

// ============================================================================
// Tests
// ============================================================================
