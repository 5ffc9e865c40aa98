//! Ingestion pipeline for Recall.
//!
//! Documents are validated against a [`DocumentSchema`](recall_vector::DocumentSchema)
//! and written to a [`VectorStoreProvider`](recall_vector::VectorStoreProvider)
//! in bounded batches. Backend writes are retried with exponential backoff;
//! invalid documents are rejected individually and never abort a batch.
//!
//! ```rust,ignore
//! use recall_ingest::{BatchConfig, BatchProcessor};
//!
//! let processor = BatchProcessor::new(provider, schema, BatchConfig::default())?;
//! let summary = processor.process_stream(futures::stream::iter(docs), None).await;
//! println!("{} written, {} failed", summary.total_processed, summary.total_failed);
//! ```

pub mod batch;

pub use batch::{BatchConfig, BatchOutcome, BatchProcessor, BatchStatus, StreamProgress, StreamSummary};
