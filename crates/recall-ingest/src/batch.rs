//! Batch processor.
//!
//! Each batch moves through `Validating → Writing → {Succeeded,
//! PartiallyFailed, Failed}`. Validation excludes individual documents;
//! the write of the valid subset is retried as a whole.

use backon::{ExponentialBuilder, Retryable};
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use recall_core::{Error, Result};
use recall_vector::{DocumentSchema, VectorDocument, VectorStoreProvider};
use serde::{Deserialize, Serialize};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

/// Batching and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Documents per batch (and per backend sub-batch).
    pub batch_size: usize,

    /// Total write attempts per batch, including the first.
    pub max_retries: usize,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,

    /// Upper bound on a single retry delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BatchConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the total number of write attempts.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the retry delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Reject settings the processor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be at least 1"));
        }
        if self.max_delay < self.base_delay {
            return Err(Error::config("max_delay must not be shorter than base_delay"));
        }
        Ok(())
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries.saturating_sub(1))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Final state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every document was written.
    Succeeded,
    /// Some documents were written, others rejected or failed.
    PartiallyFailed,
    /// Nothing was written although documents were submitted.
    Failed,
}

/// Result of one [`BatchProcessor::process_batch`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Documents written.
    pub success: usize,
    /// Valid documents whose write failed.
    pub failed: usize,
    /// Documents excluded by schema validation.
    pub rejected: usize,
    /// Validation violations and write errors, in order of occurrence.
    pub errors: Vec<String>,
    /// Final state.
    pub status: BatchStatus,
}

impl BatchOutcome {
    fn new(success: usize, failed: usize, rejected: usize, errors: Vec<String>) -> Self {
        let status = if failed == 0 && rejected == 0 {
            BatchStatus::Succeeded
        } else if success == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartiallyFailed
        };
        Self {
            success,
            failed,
            rejected,
            errors,
            status,
        }
    }

    /// Documents submitted in the batch.
    pub fn total(&self) -> usize {
        self.success + self.failed + self.rejected
    }
}

/// Running totals reported after each streamed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamProgress {
    /// Batches completed.
    pub batches: usize,
    /// Documents written so far.
    pub processed: usize,
    /// Documents whose write failed so far.
    pub failed: usize,
    /// Documents rejected by validation so far.
    pub rejected: usize,
    /// Documents consumed from the stream so far.
    pub seen: usize,
}

/// Totals for a whole stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Documents written.
    pub total_processed: usize,
    /// Valid documents whose write failed.
    pub total_failed: usize,
    /// Documents rejected by validation.
    pub total_rejected: usize,
    /// Number of error messages recorded.
    pub total_errors: usize,
    /// Error messages from every batch, in order.
    pub errors: Vec<String>,
    /// Batches processed.
    pub batches: usize,
}

impl StreamSummary {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.total_processed += outcome.success;
        self.total_failed += outcome.failed;
        self.total_rejected += outcome.rejected;
        self.total_errors += outcome.errors.len();
        self.errors.extend(outcome.errors);
    }

    fn progress(&self, seen: usize) -> StreamProgress {
        StreamProgress {
            batches: self.batches,
            processed: self.total_processed,
            failed: self.total_failed,
            rejected: self.total_rejected,
            seen,
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Validates documents against a schema and writes them with retries.
///
/// A processor holds no mutable state; every call accumulates its own
/// results, so several processors (or calls) may run concurrently.
pub struct BatchProcessor {
    provider: Arc<dyn VectorStoreProvider>,
    schema: DocumentSchema,
    config: BatchConfig,
}

impl BatchProcessor {
    /// Create a processor.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `config` fails [`BatchConfig::validate`].
    pub fn new(
        provider: Arc<dyn VectorStoreProvider>,
        schema: DocumentSchema,
        config: BatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            schema,
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// The schema documents are validated against.
    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    /// Validate and write one batch.
    pub async fn process_batch(&self, documents: Vec<VectorDocument>) -> BatchOutcome {
        if documents.is_empty() {
            return BatchOutcome::new(0, 0, 0, Vec::new());
        }

        debug!("Batch of {} documents: validating", documents.len());
        let mut errors = Vec::new();
        let mut rejected = 0;
        let mut valid = Vec::with_capacity(documents.len());
        for doc in documents {
            match self.provider.validate_schema(&self.schema, &doc).await {
                Ok(violations) if violations.is_empty() => valid.push(doc),
                Ok(violations) => {
                    rejected += 1;
                    errors.extend(violations.into_iter().map(|v| format!("{}: {v}", doc.id)));
                }
                Err(e) => {
                    rejected += 1;
                    errors.push(format!("{}: {e}", doc.id));
                }
            }
        }

        if valid.is_empty() {
            debug!("Batch rejected entirely; skipping write");
            return BatchOutcome::new(0, 0, rejected, errors);
        }

        debug!("Batch: writing {} valid documents", valid.len());
        let written = (|| self.provider.add_documents(&valid, self.config.batch_size))
            .retry(self.config.backoff())
            .when(Error::is_retryable)
            .notify(|err: &Error, delay: Duration| {
                warn!("Batch write failed: {err}; retrying in {delay:?}");
            })
            .await;

        let outcome = match written {
            Ok(ids) => BatchOutcome::new(ids.len(), 0, rejected, errors),
            Err(e) => {
                error!("Batch write of {} documents failed: {e}", valid.len());
                errors.push(format!("batch write failed: {e}"));
                BatchOutcome::new(0, valid.len(), rejected, errors)
            }
        };
        debug!("Batch finished: {:?}", outcome.status);
        outcome
    }

    /// Consume a document stream in batches of `batch_size`.
    ///
    /// The final partial batch is flushed when the stream ends. `progress`
    /// is called after every batch with the running totals.
    pub async fn process_stream<S>(
        &self,
        documents: S,
        mut progress: Option<&mut (dyn FnMut(&StreamProgress) + Send)>,
    ) -> StreamSummary
    where
        S: Stream<Item = VectorDocument>,
    {
        let mut summary = StreamSummary::default();
        let mut seen = 0;
        let mut batches = pin!(documents.chunks(self.config.batch_size));

        while let Some(batch) = batches.next().await {
            seen += batch.len();
            let outcome = self.process_batch(batch).await;
            info!(
                "Batch {}: {} written, {} failed, {} rejected",
                summary.batches + 1,
                outcome.success,
                outcome.failed,
                outcome.rejected
            );
            summary.absorb(outcome);

            if let Some(callback) = progress.as_deref_mut() {
                callback(&summary.progress(seen));
            }
        }

        info!(
            "Stream complete: {} batches, {} written, {} failed, {} rejected",
            summary.batches, summary.total_processed, summary.total_failed, summary.total_rejected
        );
        summary
    }
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("provider", &self.provider.name())
            .field("schema", &self.schema.name())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
