//! Handler functions for the store commands.
//!
//! Handlers return data; printing happens in [`crate::app`].

use recall_core::{Error, Result};
use recall_ingest::{BatchConfig, BatchProcessor, StreamProgress, StreamSummary};
use recall_vector::{
    DocumentSchema, Metadata, ProviderRegistry, QueryResult, SchemaCatalog, VectorDocument,
    VectorStoreProvider,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use uuid::Uuid;

use crate::config::{RecallConfig, StoreSettings};

// ============================================================================
// Output views
// ============================================================================

/// A query hit as printed by `recall query`.
#[derive(Debug, Serialize)]
pub struct HitView {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Metadata,
}

impl From<QueryResult> for HitView {
    fn from(result: QueryResult) -> Self {
        Self {
            score: result.score,
            content: result.document.content.to_text_lossy().into_owned(),
            id: result.document.id,
            metadata: result.document.metadata,
        }
    }
}

/// A document as printed by `recall get`.
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub content: String,
    pub content_kind: &'static str,
    pub metadata: Metadata,
    pub timestamp: String,
    pub dimension: Option<usize>,
}

impl From<VectorDocument> for DocumentView {
    fn from(doc: VectorDocument) -> Self {
        Self {
            content: doc.content.to_text_lossy().into_owned(),
            content_kind: doc.content.kind(),
            timestamp: doc.timestamp.to_rfc3339(),
            dimension: doc.embedding_dimension(),
            id: doc.id,
            metadata: doc.metadata,
        }
    }
}

/// Output of `recall stats`.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub store_type: String,
    pub index_name: String,
    pub dimension: Option<usize>,
    pub documents: usize,
}

// ============================================================================
// Provider setup
// ============================================================================

/// Look up the configured store type and connect it.
pub async fn create_provider(
    registry: &ProviderRegistry,
    settings: &StoreSettings,
) -> Result<Arc<dyn VectorStoreProvider>> {
    let provider: Arc<dyn VectorStoreProvider> =
        Arc::from(registry.get_provider(&settings.store_type)?);
    provider.connect(&settings.to_store_config()).await?;
    Ok(provider)
}

/// Load a named schema from the configured schema directory.
pub fn load_schema(config: &RecallConfig, name: &str) -> Result<DocumentSchema> {
    let dir = config
        .schema_dir
        .as_deref()
        .ok_or_else(|| Error::config("no schema_dir configured"))?;
    let catalog = SchemaCatalog::load_dir(Path::new(dir))?;

    catalog.get(name).cloned().ok_or_else(|| {
        Error::not_found(format!(
            "schema '{name}' in {dir} (available: {})",
            catalog.names().join(", ")
        ))
    })
}

// ============================================================================
// Input parsing
// ============================================================================

/// Open a JSON Lines file for line-by-line reading.
pub async fn open_jsonl(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).await?;
    Ok(BufReader::new(file).lines())
}

/// Lazily decode documents from JSON Lines.
///
/// Blank lines are skipped. Lines that fail to decode are skipped too and
/// reported into `errors` as `"{path}:{line}: {error}"`. A read error ends
/// the stream.
pub fn jsonl_documents<'a>(
    lines: Lines<BufReader<File>>,
    path: &'a Path,
    errors: &'a mut Vec<String>,
) -> impl Stream<Item = VectorDocument> + 'a {
    stream::unfold(
        (lines, 0_usize, errors),
        move |(mut lines, mut number, errors)| async move {
            loop {
                number += 1;
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => return None,
                    Err(e) => {
                        errors.push(format!("{}:{number}: {e}", path.display()));
                        return None;
                    }
                };
                match parse_record(&line) {
                    Ok(Some(doc)) => return Some((doc, (lines, number, errors))),
                    Ok(None) => {}
                    Err(e) => errors.push(format!("{}:{number}: {e}", path.display())),
                }
            }
        },
    )
}

/// Decode one JSON Lines record. Records without an `id` get a random UUID.
fn parse_record(line: &str) -> Result<Option<VectorDocument>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut value: Value =
        serde_json::from_str(line).map_err(|e| Error::serialization(e.to_string()))?;
    let record = value
        .as_object_mut()
        .ok_or_else(|| Error::invalid_data("expected a JSON object"))?;
    record
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::invalid_data(e.to_string()))
}

/// Parse a comma-separated vector such as `"0.1, -0.2, 0.3"`.
pub fn parse_embedding(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| Error::invalid_data(format!("embedding component '{part}': {e}")))
        })
        .collect()
}

/// Parse `key=value` filters. Values that parse as JSON keep their type.
pub fn parse_filters(raw: &[String]) -> Result<Option<Metadata>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let mut filter = Metadata::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::invalid_data(format!("filter '{entry}' is not key=value")))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        filter.insert(key.trim().to_string(), value);
    }
    Ok(Some(filter))
}

// ============================================================================
// Commands
// ============================================================================

/// Stream a JSON Lines file through a batch processor.
///
/// Undecodable lines count as rejected and their messages are appended to
/// the summary errors.
pub async fn ingest_file(
    provider: Arc<dyn VectorStoreProvider>,
    schema: DocumentSchema,
    config: BatchConfig,
    path: &Path,
    progress: Option<&mut (dyn FnMut(&StreamProgress) + Send)>,
) -> Result<StreamSummary> {
    let processor = BatchProcessor::new(provider, schema, config)?;
    let lines = open_jsonl(path).await?;

    let mut decode_errors = Vec::new();
    let mut summary = processor
        .process_stream(jsonl_documents(lines, path, &mut decode_errors), progress)
        .await;

    if !decode_errors.is_empty() {
        log::warn!("Skipped {} undecodable lines in {}", decode_errors.len(), path.display());
        summary.total_rejected += decode_errors.len();
        summary.total_errors += decode_errors.len();
        summary.errors.extend(decode_errors);
    }
    Ok(summary)
}

/// Run a query and convert the hits for printing.
pub async fn query(
    provider: &dyn VectorStoreProvider,
    embedding: &str,
    filters: &[String],
    limit: usize,
    min_score: f32,
) -> Result<Vec<HitView>> {
    let embedding = parse_embedding(embedding)?;
    let filter = parse_filters(filters)?;
    let results = provider
        .query(&embedding, filter.as_ref(), limit, min_score)
        .await?;
    Ok(results.into_iter().map(HitView::from).collect())
}

/// Collect store statistics.
pub async fn stats(
    provider: &dyn VectorStoreProvider,
    settings: &StoreSettings,
) -> Result<StoreStats> {
    Ok(StoreStats {
        store_type: provider.name().to_string(),
        index_name: settings.index_name.clone(),
        dimension: provider.dimension().await,
        documents: provider.count().await?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn memory_settings(dimension: usize) -> StoreSettings {
        StoreSettings {
            dimension,
            ..Default::default()
        }
    }

    fn write_schema_dir(dir: &Path) {
        std::fs::write(
            dir.join("components.json"),
            json!({
                "fields": {
                    "component_type": {"required": true, "type": "string"}
                }
            })
            .to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_parse_embedding() {
        assert_eq!(parse_embedding("0.5, -1,2").unwrap(), vec![0.5, -1.0, 2.0]);
        assert!(parse_embedding("0.5,abc").is_err());
    }

    #[test]
    fn test_parse_filters() {
        assert!(parse_filters(&[]).unwrap().is_none());

        let filter = parse_filters(&["kind=service".to_string(), "priority=2".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(filter["kind"], json!("service"));
        assert_eq!(filter["priority"], json!(2));

        assert!(parse_filters(&["no-equals".to_string()]).is_err());
    }

    async fn read_all(path: &Path) -> (Vec<VectorDocument>, Vec<String>) {
        let lines = open_jsonl(path).await.unwrap();
        let mut errors = Vec::new();
        let docs = jsonl_documents(lines, path, &mut errors)
            .collect::<Vec<_>>()
            .await;
        (docs, errors)
    }

    fn jsonl_component(id: &str, kind: &str, embedding: [f32; 2]) -> String {
        json!({
            "id": id,
            "content": format!("{kind} {id}"),
            "metadata": {"component_type": kind},
            "embedding": embedding,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_jsonl_documents_assigns_missing_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docs.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id": "a", "content": "first", "embedding": [0.0, 1.0]}"#,
                "\n\n",
                r#"{"content": "second", "metadata": {"k": "v"}}"#,
                "\n"
            ),
        )
        .unwrap();

        let (docs, errors) = read_all(&path).await;
        assert!(errors.is_empty());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].embedding_dimension(), Some(2));
        assert!(Uuid::parse_str(&docs[1].id).is_ok());
        assert_eq!(docs[1].metadata["k"], json!("v"));
    }

    #[tokio::test]
    async fn test_jsonl_documents_skips_bad_lines_with_location() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"id\": \"a\", \"content\": \"x\"}\n[1, 2]\nnot json\n{\"id\": \"b\", \"content\": \"y\"}\n",
        )
        .unwrap();

        let (docs, errors) = read_all(&path).await;
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("bad.jsonl:2"));
        assert!(errors[1].contains("bad.jsonl:3"));
    }

    #[tokio::test]
    async fn test_open_jsonl_missing_file() {
        let result = open_jsonl(Path::new("/nonexistent/recall/docs.jsonl")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_ingest_file_reports_progress_per_batch() {
        let provider = create_provider(&ProviderRegistry::with_defaults(), &memory_settings(2))
            .await
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        write_schema_dir(dir.path());
        let config = RecallConfig {
            schema_dir: Some(dir.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let schema = load_schema(&config, "components").unwrap();

        let path = dir.path().join("components.jsonl");
        let mut lines: Vec<String> = (0..5)
            .map(|i| jsonl_component(&format!("svc-{i}"), "service", [1.0, i as f32]))
            .collect();
        lines.insert(2, "{broken".to_string());
        std::fs::write(&path, lines.join("\n")).unwrap();

        let mut seen = Vec::new();
        let mut record = |p: &StreamProgress| seen.push((p.batches, p.seen, p.processed));
        let summary = ingest_file(
            provider.clone(),
            schema,
            config.ingest.to_batch_config().with_batch_size(2),
            &path,
            Some(&mut record),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![(1, 2, 2), (2, 4, 4), (3, 5, 5)]);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.total_processed, 5);
        assert_eq!(summary.total_rejected, 1);
        assert!(summary.errors.iter().any(|e| e.contains("components.jsonl:3")));
        assert_eq!(provider.count().await.unwrap(), 5);
    }

    #[test]
    fn test_load_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        write_schema_dir(dir.path());
        let config = RecallConfig {
            schema_dir: Some(dir.path().to_string_lossy().to_string()),
            ..Default::default()
        };

        let schema = load_schema(&config, "components").unwrap();
        assert_eq!(schema.name(), "components");
        assert!(load_schema(&config, "missing").unwrap_err().is_not_found());
        assert!(matches!(
            load_schema(&RecallConfig::default(), "components"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_create_provider_unknown_type() {
        let settings = StoreSettings {
            store_type: "pinecone".into(),
            ..Default::default()
        };
        let result = create_provider(&ProviderRegistry::with_defaults(), &settings).await;
        assert!(matches!(result, Err(Error::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_ingest_query_and_stats() {
        let registry = ProviderRegistry::with_defaults();
        let settings = memory_settings(2);
        let provider = create_provider(&registry, &settings).await.unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        write_schema_dir(dir.path());
        let config = RecallConfig {
            schema_dir: Some(dir.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let schema = load_schema(&config, "components").unwrap();

        let path = dir.path().join("docs.jsonl");
        let lines = [
            jsonl_component("api", "service", [1.0, 0.0]),
            jsonl_component("db", "database", [0.0, 1.0]),
            json!({"id": "orphan", "content": "no type", "embedding": [0.5, 0.5]}).to_string(),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let summary = ingest_file(
            provider.clone(),
            schema,
            config.ingest.to_batch_config(),
            &path,
            None,
        )
        .await
        .unwrap();
        assert_eq!(summary.total_processed, 2);
        assert_eq!(summary.total_rejected, 1);

        let hits = query(
            provider.as_ref(),
            "1.0,0.0",
            &["component_type=service".to_string()],
            5,
            0.0,
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "api");
        assert_eq!(hits[0].content, "service api");

        let stats = stats(provider.as_ref(), &settings).await.unwrap();
        assert_eq!(stats.store_type, "memory");
        assert_eq!(stats.dimension, Some(2));
        assert_eq!(stats.documents, 2);

        let view = DocumentView::from(provider.get_document("db").await.unwrap().unwrap());
        assert_eq!(view.content_kind, "text");
        assert_eq!(view.dimension, Some(2));
    }
}
