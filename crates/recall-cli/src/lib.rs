//! Command-line front end for the Recall memory store.
//!
//! # Key Abstractions
//!
//! - [`RecallCli`]: loads [`RecallConfig`], connects the configured store and
//!   runs one command
//! - [`CliArgs`]: clap definitions for `types`, `ingest`, `query`, `get`,
//!   `delete`, `stats` and `config`

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod handlers;

pub use app::RecallCli;
pub use cli::{CliArgs, Command, ConfigAction, ConfigCommand};
pub use config::{IngestSettings, RecallConfig, StoreSettings};
