//! In-process vector store provider.
//!
//! [`MemoryProvider`] keeps documents in a `HashMap` behind a `tokio` lock and
//! answers queries by brute-force L2 distance, converted to scores with
//! `1 / (1 + d)`. It is always available and is the default store type.
//!
//! Nothing is persisted: state lives for as long as the provider instance.

use async_trait::async_trait;
use log::{debug, info, warn};
use recall_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::embedding::Embedder;
use crate::provider::{
    check_dimensions, check_query_dimension, distance_to_score, effective_batch_size,
    l2_distance, matches_filter, rank_results, VectorStoreProvider,
};
use crate::types::{Metadata, QueryResult, StoreConfig, VectorDocument};

/// Store-type identifier of the in-process provider.
pub const MEMORY_STORE: &str = "memory";

struct MemoryState {
    index_name: String,
    dimension: usize,
    documents: HashMap<String, VectorDocument>,
}

/// In-process vector store.
///
/// # Example
///
/// ```rust,ignore
/// use recall_vector::{MemoryProvider, StoreConfig, VectorStoreProvider};
///
/// let provider = MemoryProvider::new();
/// provider.connect(&StoreConfig::new("notes", 384)).await?;
/// let ids = provider.add_documents(&documents, 100).await?;
/// ```
#[derive(Default)]
pub struct MemoryProvider {
    state: RwLock<Option<MemoryState>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MemoryProvider {
    /// Create an unconnected provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an embedder, enabling [`query_text`](Self::query_text).
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Query with raw text, embedding it through the attached embedder.
    ///
    /// This is a convenience of this backend; portable callers should embed
    /// the query themselves and use [`VectorStoreProvider::query`].
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if no embedder is attached, and
    /// [`Error::DimensionMismatch`] if the embedder's output does not match
    /// the bound dimension.
    pub async fn query_text(
        &self,
        text: &str,
        filter: Option<&Metadata>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<QueryResult>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::config("memory provider has no embedder for text queries"))?;

        let embedding = embedder.embed(text).await?;
        self.query(&embedding, filter, limit, min_score).await
    }

    fn not_initialized() -> Error {
        Error::not_initialized(MEMORY_STORE)
    }
}

#[async_trait]
impl VectorStoreProvider for MemoryProvider {
    fn name(&self) -> &str {
        MEMORY_STORE
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    async fn dimension(&self) -> Option<usize> {
        self.state.read().await.as_ref().map(|s| s.dimension)
    }

    async fn connect(&self, config: &StoreConfig) -> Result<()> {
        config.validate()?;

        let mut state = self.state.write().await;
        if let Some(current) = state.as_mut() {
            warn!(
                "Re-binding memory provider from '{}' (dim {}) to '{}' (dim {})",
                current.index_name, current.dimension, config.index_name, config.dimension
            );
            if current.index_name == config.index_name && current.dimension == config.dimension {
                return Ok(());
            }
        }

        *state = Some(MemoryState {
            index_name: config.index_name.clone(),
            dimension: config.dimension,
            documents: HashMap::new(),
        });
        info!(
            "Initialized memory index '{}' (dim {})",
            config.index_name, config.dimension
        );
        Ok(())
    }

    async fn add_documents(
        &self,
        documents: &[VectorDocument],
        batch_size: usize,
    ) -> Result<Vec<String>> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(Self::not_initialized)?;

        check_dimensions(documents, state.dimension)?;

        let chunk = effective_batch_size(batch_size, documents.len());
        let mut ids = Vec::with_capacity(documents.len());
        for batch in documents.chunks(chunk) {
            for doc in batch {
                state.documents.insert(doc.id.clone(), doc.clone());
                ids.push(doc.id.clone());
            }
            debug!("Wrote sub-batch of {} documents", batch.len());
        }

        info!(
            "Added {} documents to memory index '{}'",
            ids.len(),
            state.index_name
        );
        Ok(ids)
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&Metadata>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<QueryResult>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;

        check_query_dimension(query_embedding, state.dimension)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let candidates: Vec<QueryResult> = state
            .documents
            .values()
            .filter(|doc| matches_filter(&doc.metadata, filter))
            .filter_map(|doc| {
                let embedding = doc.embedding.as_deref()?;
                let score = distance_to_score(l2_distance(query_embedding, embedding));
                Some(QueryResult::new(doc.clone(), score))
            })
            .collect();

        let results = rank_results(candidates, limit, min_score);
        debug!("Memory query returned {} results", results.len());
        Ok(results)
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(Self::not_initialized)?;

        let removed = ids
            .iter()
            .filter(|id| state.documents.remove(id.as_str()).is_some())
            .count();
        info!(
            "Deleted {removed} of {} requested documents from memory index",
            ids.len()
        );
        Ok(())
    }

    async fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(Self::not_initialized)?;

        let doc = state
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        doc.metadata.extend(metadata);
        debug!("Updated metadata for document: {id}");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<VectorDocument>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;
        Ok(state.documents.get(id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;
        Ok(state.documents.len())
    }

    async fn cleanup(&self) -> Result<()> {
        if self.state.write().await.take().is_some() {
            info!("Cleaned up memory provider");
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
