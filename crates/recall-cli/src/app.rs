//! RecallCli application.
//!
//! Loads configuration, connects the configured store and dispatches
//! commands to [`crate::handlers`]. Command output is printed as JSON.

use crate::cli::{CliArgs, Command};
use crate::config::RecallConfig;
use crate::{config_handlers, handlers};
use recall_core::{Error, Result};
use recall_ingest::StreamProgress;
use recall_vector::{ProviderRegistry, VectorStoreProvider};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// RecallCli
// ============================================================================

/// The `recall` application: configuration plus a provider registry.
pub struct RecallCli {
    config: RecallConfig,
    registry: ProviderRegistry,
    version: String,
}

impl RecallCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = RecallConfig::load(args.config.as_deref())?;
        Ok(Self::new(config))
    }

    /// Create with the built-in store types registered.
    pub fn new(config: RecallConfig) -> Self {
        Self {
            config,
            registry: ProviderRegistry::with_defaults(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Replace the provider registry.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Ignore error if a subscriber is already set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run one command.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);

        let Some(command) = args.command else {
            println!("recall {} (use --help for usage)", self.version);
            return Ok(());
        };

        match command {
            Command::Types => print_json(&self.registry.list_supported_types()),
            Command::Config(config_cmd) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            command => {
                let provider =
                    handlers::create_provider(&self.registry, &self.config.store).await?;
                let result = self.dispatch(provider.clone(), command).await;
                if let Err(e) = provider.cleanup().await {
                    tracing::warn!("Store cleanup failed: {e}");
                }
                result
            }
        }
    }

    /// Commands that need a connected store.
    async fn dispatch(&self, provider: Arc<dyn VectorStoreProvider>, command: Command) -> Result<()> {
        tracing::debug!("Using {} store '{}'", provider.name(), self.config.store.index_name);

        match command {
            Command::Ingest { file, schema } => {
                let schema = handlers::load_schema(&self.config, &schema)?;
                tracing::info!("Ingesting documents from {file}");
                let mut report = |p: &StreamProgress| {
                    tracing::info!(
                        "Ingest progress: {} documents read, {} written, {} failed, {} rejected",
                        p.seen,
                        p.processed,
                        p.failed,
                        p.rejected
                    );
                };
                let summary = handlers::ingest_file(
                    provider,
                    schema,
                    self.config.ingest.to_batch_config(),
                    Path::new(&file),
                    Some(&mut report),
                )
                .await?;
                print_json(&summary)
            }
            Command::Query {
                embedding,
                filters,
                limit,
                min_score,
            } => {
                let hits =
                    handlers::query(provider.as_ref(), &embedding, &filters, limit, min_score)
                        .await?;
                print_json(&hits)
            }
            Command::Get { id } => match provider.get_document(&id).await? {
                Some(doc) => print_json(&handlers::DocumentView::from(doc)),
                None => Err(Error::not_found(format!("document '{id}'"))),
            },
            Command::Delete { ids } => {
                provider.delete_documents(&ids).await?;
                print_json(&serde_json::json!({ "deleted": ids }))
            }
            Command::Stats => {
                print_json(&handlers::stats(provider.as_ref(), &self.config.store).await?)
            }
            Command::Types | Command::Config(_) => Ok(()),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| Error::serialization(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn test_cli() -> RecallCli {
        let mut config = RecallConfig::default();
        config.store.dimension = 3;
        RecallCli::new(config)
    }

    #[test]
    fn test_recall_cli_new() {
        let cli = test_cli();
        assert_eq!(cli.config().store.store_type, "memory");
        assert_eq!(cli.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_run_no_command() {
        let args = CliArgs::parse_from(["recall"]);
        assert!(test_cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_types_command() {
        let args = CliArgs::parse_from(["recall", "types"]);
        assert!(test_cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_stats_command() {
        let args = CliArgs::parse_from(["recall", "stats"]);
        assert!(test_cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_query_empty_store() {
        let args = CliArgs::parse_from(["recall", "query", "-e", "1,0,0"]);
        assert!(test_cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_query_wrong_dimension() {
        let args = CliArgs::parse_from(["recall", "query", "-e", "1,0"]);
        let result = test_cli().run(args).await;
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_run_get_missing_document() {
        let args = CliArgs::parse_from(["recall", "get", "nope"]);
        let result = test_cli().run(args).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_run_unsupported_store_type() {
        let mut config = RecallConfig::default();
        config.store.store_type = "weaviate".into();
        let args = CliArgs::parse_from(["recall", "stats"]);
        let result = RecallCli::new(config).run(args).await;
        assert!(matches!(result, Err(Error::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_run_ingest_without_schema_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("docs.jsonl");
        std::fs::write(&file, "{\"id\": \"a\", \"content\": \"x\"}\n").unwrap();

        let args = CliArgs::parse_from([
            "recall",
            "ingest",
            file.to_str().unwrap(),
            "--schema",
            "components",
        ]);
        let result = test_cli().run(args).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_init_logging_modes() {
        let cli = test_cli();
        cli.init_logging(false, false);
        cli.init_logging(true, false);
        cli.init_logging(false, true);
    }
}
