//! Configuration for the Recall CLI.
//!
//! Provides the [`RecallConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `RECALL_CONFIG` environment variable
//! 3. XDG default: `~/.config/recall/config.toml`
//! 4. Built-in defaults
//!
//! String values may be overridden per section with `RECALL_STORE_*` and
//! `RECALL_INGEST_*` environment variables.

use confyg::{env, Confygery};
use recall_core::{Error, Result};
use recall_ingest::BatchConfig;
use recall_vector::{StoreConfig, MEMORY_STORE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "RECALL_CONFIG";

const ENV_PREFIX: &str = "RECALL";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the Recall CLI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Directory of `*.json` document schemas.
    pub schema_dir: Option<String>,

    /// Vector store selection and connection.
    pub store: StoreSettings,

    /// Batch ingestion tuning.
    pub ingest: IngestSettings,
}

/// Vector store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Registered store type (`memory`, `lancedb`, ...).
    pub store_type: String,

    /// Index / table name.
    pub index_name: String,

    /// Embedding dimension.
    pub dimension: usize,

    /// Backend location.
    pub uri: Option<String>,

    /// Backend credential.
    pub api_key: Option<String>,
}

/// Ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Documents per batch.
    pub batch_size: usize,

    /// Total write attempts per batch.
    pub max_retries: usize,

    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,

    /// Retry delay cap in milliseconds.
    pub max_delay_ms: u64,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for StoreSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            store_type: MEMORY_STORE.to_string(),
            index_name: store.index_name,
            dimension: store.dimension,
            uri: None,
            api_key: None,
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        let batch = BatchConfig::default();
        Self {
            batch_size: batch.batch_size,
            max_retries: batch.max_retries,
            base_delay_ms: duration_ms(batch.base_delay),
            max_delay_ms: duration_ms(batch.max_delay),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Conversions
// ============================================================================

impl StoreSettings {
    /// Connection parameters for the selected provider.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            index_name: self.index_name.clone(),
            dimension: self.dimension,
            uri: self.uri.clone(),
            api_key: self.api_key.clone(),
            ..Default::default()
        }
    }
}

impl IngestSettings {
    /// Batch processor settings.
    pub fn to_batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl RecallConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        env_opts.add_section("store");
        env_opts.add_section("ingest");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("recall").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `RECALL_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// Helper: flatten TOML to env vars
// ============================================================================

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// RAII guard for env var manipulation in tests.
    struct EnvGuard {
        key: String,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn new(key: &str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: test-only; each guard owns a variable no other test touches.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                prev,
            }
        }

        fn remove(key: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: see `new`.
            unsafe { std::env::remove_var(key) };
            Self {
                key: key.to_string(),
                prev,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: see `new`.
            unsafe {
                match &self.prev {
                    Some(val) => std::env::set_var(&self.key, val),
                    None => std::env::remove_var(&self.key),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Defaults and conversions
    // ------------------------------------------------------------------------

    #[test]
    fn test_recall_config_default() {
        let config = RecallConfig::default();
        assert!(config.schema_dir.is_none());
        assert_eq!(config.store.store_type, "memory");
        assert_eq!(config.store.index_name, "rag_memory");
        assert_eq!(config.store.dimension, 1536);
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.ingest.max_retries, 3);
        assert_eq!(config.ingest.base_delay_ms, 1000);
        assert_eq!(config.ingest.max_delay_ms, 30_000);
    }

    #[test]
    fn test_settings_conversions() {
        let config = RecallConfig::default();
        assert_eq!(config.ingest.to_batch_config(), BatchConfig::default());

        let store = StoreSettings {
            uri: Some("/data/lance".into()),
            dimension: 384,
            ..Default::default()
        }
        .to_store_config();
        assert_eq!(store.dimension, 384);
        assert_eq!(store.uri.as_deref(), Some("/data/lance"));
        assert!(store.validate().is_ok());
    }

    // ------------------------------------------------------------------------
    // Serialization tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_recall_config_from_toml() {
        let toml_str = r#"
            schema_dir = "/etc/recall/schemas"

            [store]
            store_type = "lancedb"
            index_name = "architecture"
            dimension = 384
            uri = "/var/lib/recall"

            [ingest]
            batch_size = 50
            base_delay_ms = 200
        "#;

        let config: RecallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schema_dir.as_deref(), Some("/etc/recall/schemas"));
        assert_eq!(config.store.store_type, "lancedb");
        assert_eq!(config.store.dimension, 384);
        assert_eq!(config.ingest.batch_size, 50);
        assert_eq!(config.ingest.base_delay_ms, 200);
        assert_eq!(config.ingest.max_retries, 3);
    }

    #[test]
    fn test_recall_config_to_toml() {
        let config = RecallConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("store_type = \"memory\""));
        assert!(toml_str.contains("batch_size = 100"));

        let parsed: RecallConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    // ------------------------------------------------------------------------
    // Loading tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_recall_config_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [store]
                index_name = "loaded"
                dimension = 8
            "#,
        )
        .unwrap();

        let config = RecallConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.store.index_name, "loaded");
        assert_eq!(config.store.dimension, 8);
        assert_eq!(config.ingest.batch_size, 100);
    }

    #[test]
    fn test_recall_config_load_missing_file_uses_defaults() {
        let config = RecallConfig::load(Some("/nonexistent/recall.toml")).unwrap();
        assert_eq!(config.store.store_type, "memory");
        assert_eq!(config.store.dimension, 1536);
    }

    #[test]
    fn test_recall_config_load_env_overlay() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [store]
                uri = "/from/file"
            "#,
        )
        .unwrap();

        // confyg passes env values as strings, so only string fields are overridden here.
        let _guard = EnvGuard::new("RECALL_STORE_URI", "/from/env");
        let config = RecallConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.store.uri.as_deref(), Some("/from/env"));
    }

    // ------------------------------------------------------------------------
    // resolve_config_path tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_config_path_explicit() {
        let path = RecallConfig::resolve_config_path(Some("/explicit/config.toml"));
        assert_eq!(path, Some(PathBuf::from("/explicit/config.toml")));
    }

    #[test]
    fn test_resolve_config_path_env_then_default() {
        {
            let _guard = EnvGuard::new(CONFIG_ENV, "/env/config.toml");
            let path = RecallConfig::resolve_config_path(None);
            assert_eq!(path, Some(PathBuf::from("/env/config.toml")));
        }

        let _guard = EnvGuard::remove(CONFIG_ENV);
        let path = RecallConfig::resolve_config_path(None).unwrap();
        let text = path.to_string_lossy();
        assert!(text.contains("recall"));
        assert!(text.ends_with("config.toml"));
    }

    // ------------------------------------------------------------------------
    // to_env_vars tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_recall_config_to_env_vars() {
        let config = RecallConfig {
            schema_dir: Some("/schemas".into()),
            ..Default::default()
        };
        let vars = config.to_env_vars().unwrap();
        let map: HashMap<_, _> = vars.into_iter().collect();
        assert_eq!(map.get("RECALL_SCHEMA_DIR").unwrap(), "/schemas");
        assert_eq!(map.get("RECALL_STORE_STORE_TYPE").unwrap(), "memory");
        assert_eq!(map.get("RECALL_STORE_DIMENSION").unwrap(), "1536");
        assert_eq!(map.get("RECALL_INGEST_MAX_RETRIES").unwrap(), "3");
        assert!(!map.contains_key("RECALL_STORE_API_KEY"));
    }

    #[test]
    fn test_recall_config_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecallConfig>();
    }
}
