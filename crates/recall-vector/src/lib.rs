//! Vector storage for Recall.
//!
//! This crate defines the provider-agnostic vector store contract, the
//! document and schema model shared by every backend, the built-in backends,
//! and the fusion of keyword and vector result lists.
//!
//! # Features
//!
//! - `vector-lancedb`: Enable the LanceDB-backed provider
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     recall-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorDocument / QueryResult / StoreConfig                 │
//! │  DocumentSchema + SchemaCatalog (validation rules)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStoreProvider trait                                  │
//! │  ├── MemoryProvider (always available)                      │
//! │  └── LancedbProvider (feature: vector-lancedb)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ProviderRegistry (store type -> constructor)               │
//! │  Embedder trait + HashEmbedder                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Hybrid fusion (reciprocal rank / simple score sum)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use recall_vector::{ProviderRegistry, StoreConfig, VectorDocument};
//!
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.get_provider("memory")?;
//! provider.connect(&StoreConfig::new("design_notes", 3)).await?;
//!
//! let doc = VectorDocument::new("n-1", "queue retries use backoff")
//!     .with_metadata("component_type", "service")
//!     .with_embedding(vec![0.1, 0.7, 0.2]);
//! provider.add_documents(&[doc], 100).await?;
//!
//! for hit in provider.query(&[0.1, 0.6, 0.3], None, 5, 0.0).await? {
//!     println!("{}: {:.3}", hit.id(), hit.score);
//! }
//! ```

// Core modules (always available)
pub mod embedding;
pub mod provider;
pub mod schema;
pub mod types;

// Backends and lookup
pub mod memory;
pub mod registry;

// Result fusion
pub mod hybrid;

// Feature-gated backend modules
#[cfg(feature = "vector-lancedb")]
pub mod lancedb;

// Re-exports: core types
pub use types::{Content, Metadata, QueryResult, StoreConfig, VectorDocument};
pub use schema::{DocumentSchema, FieldDefinition, FieldType, SchemaCatalog, SchemaDefinition};

// Re-exports: traits
pub use embedding::{Embedder, HashEmbedder};
pub use provider::VectorStoreProvider;

// Re-exports: backends and registry
pub use memory::{MemoryProvider, MEMORY_STORE};
pub use registry::{ProviderConstructor, ProviderRegistry};

// Re-exports: fusion
pub use hybrid::{
    combine_results, FusionMethod, HitSource, HybridFusion, HybridResult, KeywordHit, RankedHit,
    DEFAULT_TOP_N,
};

// Feature-gated re-exports
#[cfg(feature = "vector-lancedb")]
pub use lancedb::{LancedbProvider, LANCEDB_STORE};
