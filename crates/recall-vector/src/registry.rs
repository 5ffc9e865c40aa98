//! Store-type registry.
//!
//! Maps a store-type name (`"memory"`, `"lancedb"`, ...) to a constructor
//! producing fresh, unconnected providers. The registry is an ordinary value
//! owned by the caller; there is no process-wide instance.

use log::{debug, info};
use recall_core::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::memory::{MemoryProvider, MEMORY_STORE};
use crate::provider::VectorStoreProvider;

#[cfg(feature = "vector-lancedb")]
use crate::lancedb::{LancedbProvider, LANCEDB_STORE};

/// Constructor producing a fresh, unconnected provider.
pub type ProviderConstructor = Arc<dyn Fn() -> Box<dyn VectorStoreProvider> + Send + Sync>;

/// Registry of available vector store types.
pub struct ProviderRegistry {
    constructors: RwLock<HashMap<String, ProviderConstructor>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the built-in store types.
    pub fn with_defaults() -> Self {
        let mut constructors: HashMap<String, ProviderConstructor> = HashMap::new();
        constructors.insert(
            MEMORY_STORE.to_string(),
            Arc::new(|| Box::new(MemoryProvider::new()) as Box<dyn VectorStoreProvider>),
        );
        #[cfg(feature = "vector-lancedb")]
        constructors.insert(
            LANCEDB_STORE.to_string(),
            Arc::new(|| Box::new(LancedbProvider::new()) as Box<dyn VectorStoreProvider>),
        );
        Self {
            constructors: RwLock::new(constructors),
        }
    }

    /// Instantiate an unconnected provider of the given type.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`] if `store_type` is not registered.
    pub fn get_provider(&self, store_type: &str) -> Result<Box<dyn VectorStoreProvider>> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::UnsupportedType(store_type.to_string()))?;

        debug!("Creating provider for store type '{store_type}'");
        Ok(constructor())
    }

    /// Register a new store type.
    ///
    /// The constructor is called once to probe its product: a provider that
    /// is already connected or reports an empty name is rejected.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] if the name is taken (the existing entry
    /// is kept), [`Error::InvalidProvider`] if the probe fails.
    pub async fn register_provider(
        &self,
        store_type: impl Into<String>,
        constructor: ProviderConstructor,
    ) -> Result<()> {
        let store_type = store_type.into();
        if self.is_registered(&store_type) {
            return Err(Error::AlreadyRegistered(store_type));
        }

        let probe = constructor();
        if probe.name().trim().is_empty() {
            return Err(Error::InvalidProvider(format!(
                "provider for '{store_type}' reports an empty name"
            )));
        }
        if probe.is_connected().await {
            return Err(Error::InvalidProvider(format!(
                "provider for '{store_type}' is connected before connect()"
            )));
        }

        let mut constructors = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if constructors.contains_key(&store_type) {
            return Err(Error::AlreadyRegistered(store_type));
        }
        info!("Registered vector store type '{store_type}'");
        constructors.insert(store_type, constructor);
        Ok(())
    }

    /// Whether a store type is registered.
    pub fn is_registered(&self, store_type: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(store_type)
    }

    /// Registered store-type names, sorted.
    pub fn list_supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("types", &self.list_supported_types())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Metadata, QueryResult, StoreConfig, VectorDocument};
    use async_trait::async_trait;

    /// Provider whose reported name and connection state are fixed.
    struct StubProvider {
        name: &'static str,
        connected: bool,
    }

    #[async_trait]
    impl VectorStoreProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }
        async fn is_connected(&self) -> bool {
            self.connected
        }
        async fn dimension(&self) -> Option<usize> {
            None
        }
        async fn connect(&self, _config: &StoreConfig) -> Result<()> {
            Ok(())
        }
        async fn add_documents(&self, docs: &[VectorDocument], _: usize) -> Result<Vec<String>> {
            Ok(docs.iter().map(|d| d.id.clone()).collect())
        }
        async fn query(
            &self,
            _: &[f32],
            _: Option<&Metadata>,
            _: usize,
            _: f32,
        ) -> Result<Vec<QueryResult>> {
            Ok(Vec::new())
        }
        async fn delete_documents(&self, _: &[String]) -> Result<()> {
            Ok(())
        }
        async fn update_metadata(&self, id: &str, _: Metadata) -> Result<()> {
            Err(Error::not_found(id))
        }
        async fn get_document(&self, _: &str) -> Result<Option<VectorDocument>> {
            Ok(None)
        }
        async fn count(&self) -> Result<usize> {
            Ok(0)
        }
        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    fn stub(name: &'static str, connected: bool) -> ProviderConstructor {
        Arc::new(move || Box::new(StubProvider { name, connected }) as Box<dyn VectorStoreProvider>)
    }

    #[test]
    fn test_defaults_include_memory() {
        let registry = ProviderRegistry::default();
        let types = registry.list_supported_types();
        assert!(types.contains(&"memory".to_string()));
        #[cfg(feature = "vector-lancedb")]
        assert!(types.contains(&"lancedb".to_string()));
    }

    #[test]
    fn test_new_registry_is_empty() {
        assert!(ProviderRegistry::new().list_supported_types().is_empty());
    }

    #[tokio::test]
    async fn test_get_provider_returns_fresh_unconnected_instances() {
        let registry = ProviderRegistry::with_defaults();
        let first = registry.get_provider("memory").unwrap();
        first.connect(&StoreConfig::new("a", 2)).await.unwrap();

        let second = registry.get_provider("memory").unwrap();
        assert_eq!(second.name(), "memory");
        assert!(!second.is_connected().await);
        assert!(first.is_connected().await);
    }

    #[test]
    fn test_get_provider_unknown_type() {
        let registry = ProviderRegistry::with_defaults();
        match registry.get_provider("pinecone") {
            Err(Error::UnsupportedType(name)) => assert_eq!(name, "pinecone"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected unsupported type"),
        }
    }

    #[tokio::test]
    async fn test_register_provider() {
        let registry = ProviderRegistry::with_defaults();
        registry
            .register_provider("stub", stub("stub", false))
            .await
            .unwrap();

        assert!(registry.is_registered("stub"));
        assert_eq!(registry.get_provider("stub").unwrap().name(), "stub");

        let types = registry.list_supported_types();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_existing() {
        let registry = ProviderRegistry::with_defaults();
        let result = registry
            .register_provider("memory", stub("stub", false))
            .await;

        assert!(matches!(result, Err(Error::AlreadyRegistered(ref t)) if t == "memory"));
        assert_eq!(registry.get_provider("memory").unwrap().name(), "memory");
    }

    #[test]
    fn test_register_rejects_invalid_products() {
        let registry = ProviderRegistry::new();

        let connected =
            tokio_test::block_on(registry.register_provider("eager", stub("eager", true)));
        assert!(matches!(connected, Err(Error::InvalidProvider(_))));

        let unnamed = tokio_test::block_on(registry.register_provider("blank", stub("", false)));
        assert!(matches!(unnamed, Err(Error::InvalidProvider(_))));

        assert!(registry.list_supported_types().is_empty());
    }
}
