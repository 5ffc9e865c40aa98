//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Semantic memory store: ingest, query and inspect vector documents.
#[derive(Parser, Debug)]
#[command(name = "recall", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "RECALL_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered vector store types.
    Types,

    /// Validate and write documents from a JSON Lines file.
    Ingest {
        /// JSON Lines file, one document per line.
        file: String,

        /// Schema name from the configured schema directory.
        #[arg(short, long)]
        schema: String,
    },

    /// Nearest-neighbour search with a precomputed embedding.
    Query {
        /// Comma-separated query vector, e.g. "0.1,0.2,0.3".
        #[arg(short, long, allow_hyphen_values = true)]
        embedding: String,

        /// Exact-match metadata filter as key=value (repeatable).
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Maximum number of results.
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum score for a result to be returned.
        #[arg(long, default_value = "0.0")]
        min_score: f32,
    },

    /// Fetch one document by id.
    Get {
        /// Document id.
        id: String,
    },

    /// Delete documents by id.
    Delete {
        /// Document ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show store statistics.
    Stats,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration as TOML.
    Show,

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
