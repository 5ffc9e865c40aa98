//! LanceDB vector store provider.
//!
//! Persists documents in an embedded LanceDB table, an Arrow/Lance based
//! vector database living in a local directory (`StoreConfig::uri`).
//!
//! # Schema
//!
//! | Column | Type | Purpose |
//! |--------|------|---------|
//! | `id` | Utf8 | Unique document identifier |
//! | `content` | Binary | Payload bytes |
//! | `content_kind` | Utf8 | `"text"` or `"bytes"` |
//! | `metadata` | Utf8 | JSON-serialized metadata plus `_timestamp` |
//! | `vector` | FixedSizeList<Float32> | Embedding vector |
//!
//! The document timestamp travels inside the metadata JSON under
//! [`TIMESTAMP_KEY`] (RFC 3339) and is stripped again on read.
//!
//! # Feature Gate
//!
//! This module requires the `vector-lancedb` feature.

use arrow_array::{
    Array, BinaryArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use log::{debug, info, warn};
use recall_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::provider::{
    check_dimensions, check_query_dimension, distance_to_score, effective_batch_size,
    matches_filter, rank_results, VectorStoreProvider,
};
use crate::types::{Content, Metadata, QueryResult, StoreConfig, VectorDocument};

/// Store-type identifier of the LanceDB provider.
pub const LANCEDB_STORE: &str = "lancedb";

/// Reserved metadata key carrying the document timestamp.
pub const TIMESTAMP_KEY: &str = "_timestamp";

struct LanceState {
    table: lancedb::Table,
    index_name: String,
    dimension: usize,
}

/// LanceDB-backed vector store.
#[derive(Default)]
pub struct LancedbProvider {
    state: RwLock<Option<LanceState>>,
}

impl LancedbProvider {
    /// Create an unconnected provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn not_initialized() -> Error {
        Error::not_initialized(LANCEDB_STORE)
    }

    async fn open_or_create(config: &StoreConfig) -> Result<lancedb::Table> {
        let uri = config
            .uri
            .as_deref()
            .ok_or_else(|| Error::config("lancedb store requires a uri (database directory)"))?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to LanceDB at {uri}: {e}")))?;

        let tables = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::connection(format!("Failed to list tables: {e}")))?;

        if tables.contains(&config.index_name) {
            let table = connection
                .open_table(&config.index_name)
                .execute()
                .await
                .map_err(|e| Error::connection(format!("Failed to open table: {e}")))?;

            let schema = table
                .schema()
                .await
                .map_err(|e| Error::store(format!("Failed to read table schema: {e}")))?;
            let width = vector_width(&schema)
                .ok_or_else(|| Error::invalid_data("table has no 'vector' column"))?;
            if width != config.dimension {
                return Err(Error::dimension_mismatch(
                    &config.index_name,
                    config.dimension,
                    width,
                ));
            }
            info!("Opened LanceDB table '{}'", config.index_name);
            Ok(table)
        } else {
            let table = connection
                .create_empty_table(&config.index_name, make_schema(list_size(config.dimension)?))
                .execute()
                .await
                .map_err(|e| Error::connection(format!("Failed to create table: {e}")))?;
            info!(
                "Created LanceDB table '{}' (dim {})",
                config.index_name, config.dimension
            );
            Ok(table)
        }
    }

    async fn fetch(table: &lancedb::Table, id: &str) -> Result<Option<VectorDocument>> {
        let mut stream = table
            .query()
            .only_if(id_predicate(std::slice::from_ref(&id.to_string())))
            .limit(1)
            .execute()
            .await
            .map_err(|e| Error::store(format!("Failed to query document: {e}")))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| Error::store(format!("Failed to fetch document: {e}")))?
        {
            if let Some((doc, _)) = parse_rows(&batch)?.into_iter().next() {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Upsert rows keyed by `id` in one merge-insert.
    ///
    /// Later duplicates of an id within `documents` win.
    async fn write(table: &lancedb::Table, documents: &[VectorDocument], dimension: usize) -> Result<()> {
        let mut last = HashMap::new();
        for (i, doc) in documents.iter().enumerate() {
            last.insert(doc.id.as_str(), i);
        }
        let unique: Vec<VectorDocument> = documents
            .iter()
            .enumerate()
            .filter(|(i, doc)| last.get(doc.id.as_str()) == Some(i))
            .map(|(_, doc)| doc.clone())
            .collect();

        let batch = build_record_batch(&unique, list_size(dimension)?)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .map_err(|e| Error::store(format!("Failed to upsert rows: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStoreProvider for LancedbProvider {
    fn name(&self) -> &str {
        LANCEDB_STORE
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    async fn dimension(&self) -> Option<usize> {
        self.state.read().await.as_ref().map(|s| s.dimension)
    }

    async fn connect(&self, config: &StoreConfig) -> Result<()> {
        config.validate()?;
        if config.api_key.is_some() {
            debug!("Ignoring api_key for embedded LanceDB");
        }

        let mut state = self.state.write().await;
        if let Some(current) = state.as_ref() {
            warn!(
                "Re-binding LanceDB provider from '{}' to '{}'",
                current.index_name, config.index_name
            );
        }

        let table = Self::open_or_create(config).await?;
        *state = Some(LanceState {
            table,
            index_name: config.index_name.clone(),
            dimension: config.dimension,
        });
        Ok(())
    }

    async fn add_documents(
        &self,
        documents: &[VectorDocument],
        batch_size: usize,
    ) -> Result<Vec<String>> {
        let guard = self.state.write().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;

        check_dimensions(documents, state.dimension)?;

        let chunk = effective_batch_size(batch_size, documents.len());
        for batch in documents.chunks(chunk) {
            Self::write(&state.table, batch, state.dimension).await?;
            debug!("Wrote sub-batch of {} documents", batch.len());
        }

        info!(
            "Added {} documents to LanceDB table '{}'",
            documents.len(),
            state.index_name
        );
        Ok(documents.iter().map(|d| d.id.clone()).collect())
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

        let rows = state
            .table
            .count_rows(None)
            .await
            .map_err(|e| Error::store(format!("Failed to count rows: {e}")))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        // Filters are evaluated on decoded rows, so they need every candidate.
        let candidates = if filter.is_some_and(|f| !f.is_empty()) {
            rows
        } else {
            limit
        };

        let mut stream = state
            .table
            .vector_search(query_embedding.to_vec())
            .map_err(|e| Error::store(format!("Failed to create vector search: {e}")))?
            .distance_type(DistanceType::L2)
            .limit(candidates)
            .execute()
            .await
            .map_err(|e| Error::store(format!("Vector search failed: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| Error::store(format!("Failed to fetch results: {e}")))?
        {
            for (doc, distance) in parse_rows(&batch)? {
                if matches_filter(&doc.metadata, filter) {
                    results.push(QueryResult::new(doc, distance_to_score(euclidean(distance))));
                }
            }
        }

        let results = rank_results(results, limit, min_score);
        debug!("LanceDB query returned {} results", results.len());
        Ok(results)
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<()> {
        let guard = self.state.write().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;
        if ids.is_empty() {
            return Ok(());
        }

        state
            .table
            .delete(&id_predicate(ids))
            .await
            .map_err(|e| Error::store(format!("Failed to delete documents: {e}")))?;
        info!("Deleted up to {} documents from LanceDB", ids.len());
        Ok(())
    }

    async fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        let guard = self.state.write().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;

        let mut doc = Self::fetch(&state.table, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        doc.metadata.extend(metadata);

        Self::write(&state.table, std::slice::from_ref(&doc), state.dimension).await?;
        debug!("Updated metadata for document: {id}");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<VectorDocument>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;
        Self::fetch(&state.table, id).await
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialized)?;
        state
            .table
            .count_rows(None)
            .await
            .map_err(|e| Error::store(format!("Failed to count rows: {e}")))
    }

    async fn cleanup(&self) -> Result<()> {
        if let Some(state) = self.state.write().await.take() {
            info!("Closed LanceDB table '{}'", state.index_name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LancedbProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LancedbProvider").finish_non_exhaustive()
    }
}

// ============================================================================
// Arrow schema and batch construction
// ============================================================================

/// Create the Arrow schema for the vector table.
fn make_schema(dimension: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content", DataType::Binary, false),
        Field::new("content_kind", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ]))
}

/// Arrow list size for a vector dimension.
fn list_size(dimension: usize) -> Result<i32> {
    i32::try_from(dimension)
        .map_err(|_| Error::config(format!("embedding dimension {dimension} exceeds {}", i32::MAX)))
}

/// LanceDB's L2 metric reports squared distances.
fn euclidean(squared: f32) -> f32 {
    squared.max(0.0).sqrt()
}

fn vector_width(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
        _ => None,
    }
}

/// SQL predicate matching any of `ids`.
fn id_predicate(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect();
    format!("id IN ({})", quoted.join(", "))
}

fn encode_metadata(doc: &VectorDocument) -> Result<String> {
    let mut map: serde_json::Map<String, Value> = doc
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    map.insert(
        TIMESTAMP_KEY.to_string(),
        Value::String(doc.timestamp.to_rfc3339()),
    );
    serde_json::to_string(&map)
        .map_err(|e| Error::serialization(format!("metadata of {}: {e}", doc.id)))
}

fn decode_metadata(raw: &str) -> Result<(Metadata, DateTime<Utc>)> {
    let mut metadata: Metadata = serde_json::from_str(raw)
        .map_err(|e| Error::serialization(format!("stored metadata: {e}")))?;
    let timestamp = metadata
        .remove(TIMESTAMP_KEY)
        .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default();
    Ok((metadata, timestamp))
}

/// Build an Arrow RecordBatch from documents whose dimensions were checked.
fn build_record_batch(documents: &[VectorDocument], dimension: i32) -> Result<RecordBatch> {
    let schema = make_schema(dimension);

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    let contents: Vec<&[u8]> = documents.iter().map(|d| d.content.as_bytes()).collect();
    let kinds: Vec<&str> = documents.iter().map(|d| d.content.kind()).collect();
    let metadata = documents
        .iter()
        .map(encode_metadata)
        .collect::<Result<Vec<String>>>()?;
    let metadata_refs: Vec<&str> = metadata.iter().map(String::as_str).collect();

    let all_values: Vec<f32> = documents
        .iter()
        .flat_map(|d| d.embedding.iter().flatten().copied())
        .collect();

    let vector_array = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension,
        Arc::new(Float32Array::from(all_values)),
        None,
    )
    .map_err(|e| Error::store(format!("Failed to create vector array: {e}")))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(BinaryArray::from_vec(contents)),
            Arc::new(StringArray::from(kinds)),
            Arc::new(StringArray::from(metadata_refs)),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| Error::store(format!("Failed to create RecordBatch: {e}")))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::invalid_data(format!("Missing '{name}' column in results")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::invalid_data(format!("'{name}' column has an unexpected type")))
}

/// Decode rows into documents paired with their `_distance` (0 if absent).
fn parse_rows(batch: &RecordBatch) -> Result<Vec<(VectorDocument, f32)>> {
    let id_col = column::<StringArray>(batch, "id")?;
    let content_col = column::<BinaryArray>(batch, "content")?;
    let kind_col = column::<StringArray>(batch, "content_kind")?;
    let metadata_col = column::<StringArray>(batch, "metadata")?;
    let vector_col = column::<FixedSizeListArray>(batch, "vector")?;
    let distance_col = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let id = id_col.value(i).to_string();

        let bytes = content_col.value(i).to_vec();
        let content = match kind_col.value(i) {
            "text" => Content::Text(String::from_utf8(bytes).map_err(|e| {
                Error::invalid_data(format!("text content of {id} is not UTF-8: {e}"))
            })?),
            _ => Content::Bytes(bytes),
        };

        let (metadata, timestamp) = decode_metadata(metadata_col.value(i))?;

        let vector = vector_col.value(i);
        let embedding = vector
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|values| values.values().to_vec())
            .ok_or_else(|| Error::invalid_data(format!("vector of {id} is not Float32")))?;

        let distance = distance_col.map(|c| c.value(i)).unwrap_or(0.0);

        let doc = VectorDocument {
            id,
            content,
            metadata,
            embedding: Some(embedding),
            timestamp,
        };
        rows.push((doc, distance));
    }

    Ok(rows)
}

// ============================================================================
// Tests
// ============================================================================
