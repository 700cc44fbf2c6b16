use crate::config::{DatabaseVendor, ServerConfiguration};
use crate::error::{DataError, Result};
use crate::traits::DatabaseClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Factory trait for creating database clients from configurations
#[async_trait]
pub trait DatabaseClientFactory: Send + Sync {
    /// Get the backend this factory handles
    fn vendor(&self) -> DatabaseVendor;

    /// Create a client bound to `config`
    async fn create_client(&self, config: ServerConfiguration) -> Result<Arc<dyn DatabaseClient>>;
}

/// Registry of client factories and of the clients they produced
///
/// Hands out exactly one shared client per server configuration.
pub struct ClientRegistry {
    factories: Arc<RwLock<HashMap<DatabaseVendor, Arc<dyn DatabaseClientFactory>>>>,
    clients: Arc<RwLock<HashMap<String, Arc<dyn DatabaseClient>>>>,
    // Serializes creation so two views racing on the same server share one client
    creation: Mutex<()>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
            clients: Arc::new(RwLock::new(HashMap::new())),
            creation: Mutex::new(()),
        }
    }

    /// Register a factory for a backend
    pub async fn register_factory(&self, factory: Arc<dyn DatabaseClientFactory>) {
        let vendor = factory.vendor();
        let mut factories = self.factories.write().await;

        if factories.contains_key(&vendor) {
            warn!("Overwriting existing factory for backend: {}", vendor);
        }

        factories.insert(vendor, factory);
        debug!("Registered factory for backend: {}", vendor);
    }

    /// Get the client for `config`, creating it on first use
    pub async fn client_for(&self, config: &ServerConfiguration) -> Result<Arc<dyn DatabaseClient>> {
        let key = config.cache_key();

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let _guard = self.creation.lock().await;

        // Another caller may have created it while we waited
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        config.validate()?;

        let factory = self
            .factories
            .read()
            .await
            .get(&config.vendor)
            .cloned()
            .ok_or_else(|| {
                DataError::InvalidConfiguration(format!(
                    "No factory registered for backend: {}",
                    config.vendor
                ))
            })?;

        debug!("Creating client for {}", key);

        let client = factory.create_client(config.clone()).await?;

        self.clients.write().await.insert(key, client.clone());

        Ok(client)
    }

    /// Get a cached client without creating one
    pub async fn get_client(&self, config: &ServerConfiguration) -> Option<Arc<dyn DatabaseClient>> {
        self.clients.read().await.get(&config.cache_key()).cloned()
    }

    /// Close and forget the client of a server
    pub async fn remove_client(&self, config: &ServerConfiguration) -> Result<()> {
        let removed = self.clients.write().await.remove(&config.cache_key());

        if let Some(client) = removed {
            debug!("Closing client: {}", config.connection_string());
            client.close().await?;
        }

        Ok(())
    }

    /// Close every client
    pub async fn clear_clients(&self) {
        let drained: Vec<_> = self.clients.write().await.drain().collect();

        for (key, client) in drained {
            if let Err(e) = client.close().await {
                warn!("Failed to close client {}: {}", key, e);
            }
        }
    }

    /// List registered backends
    pub async fn list_vendors(&self) -> Vec<DatabaseVendor> {
        self.factories.read().await.keys().copied().collect()
    }

    /// Check if a backend is registered
    pub async fn has_vendor(&self, vendor: DatabaseVendor) -> bool {
        self.factories.read().await.contains_key(&vendor)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
