//! Server → database → collection hierarchy shown in the explorer

use crate::config::ServerConfiguration;
use crate::error::{DataError, Result};
use crate::traits::DatabaseClient;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error};

/// A collection (MongoDB collection, Couchbase scope.collection)
///
/// Only created through [`Database::add_collection`] or by an adapter for a
/// named database, so it belongs to exactly one database for its lifetime.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct Collection {
    name: String,
    database: String,
}

impl Collection {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

/// A database. Folder databases own the collections discovered in them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Database {
    name: String,
    collections: Option<Vec<Collection>>,
}

impl Database {
    /// Database without collections (Redis database, Elasticsearch index)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: None,
        }
    }

    /// Database that holds collections
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Some(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_folder(&self) -> bool {
        self.collections.is_some()
    }

    pub fn collections(&self) -> &[Collection] {
        self.collections.as_deref().unwrap_or(&[])
    }

    /// Add a collection discovered in this database
    pub fn add_collection(&mut self, name: impl Into<String>) -> Result<&Collection> {
        let db_name = self.name.clone();
        let collections = self.collections.as_mut().ok_or_else(|| {
            DataError::operation_not_supported(format!(
                "Database '{}' does not hold collections",
                db_name
            ))
        })?;

        let name = name.into();
        if let Some(pos) = collections.iter().position(|c| c.name == name) {
            return Ok(&collections[pos]);
        }

        collections.push(Collection::new(db_name, name));
        Ok(&collections[collections.len() - 1])
    }

    /// Forget a dropped collection
    pub fn remove_collection(&mut self, name: &str) -> Option<Collection> {
        let collections = self.collections.as_mut()?;
        let pos = collections.iter().position(|c| c.name == name)?;
        Some(collections.remove(pos))
    }
}

/// Discovery state of a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ServerStatus {
    NotLoaded,
    Loading,
    Ok,
    Error(String),
}

/// A configured server and what was discovered on it
#[derive(Debug, Clone)]
pub struct DatabaseServer {
    configuration: ServerConfiguration,
    databases: Vec<Database>,
    status: ServerStatus,
}

impl DatabaseServer {
    pub fn new(configuration: ServerConfiguration) -> Self {
        Self {
            configuration,
            databases: Vec::new(),
            status: ServerStatus::NotLoaded,
        }
    }

    pub fn configuration(&self) -> &ServerConfiguration {
        &self.configuration
    }

    pub fn databases(&self) -> &[Database] {
        &self.databases
    }

    pub fn database(&self, name: &str) -> Option<&Database> {
        self.databases.iter().find(|db| db.name == name)
    }

    pub fn database_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.databases.iter_mut().find(|db| db.name == name)
    }

    pub fn status(&self) -> &ServerStatus {
        &self.status
    }

    pub fn set_databases(&mut self, databases: Vec<Database>) {
        self.databases = databases;
    }

    pub fn remove_database(&mut self, name: &str) -> Option<Database> {
        let pos = self.databases.iter().position(|db| db.name == name)?;
        Some(self.databases.remove(pos))
    }

    /// Discover databases and, for folder databases, their collections.
    ///
    /// Replaces whatever was discovered before. On failure the previous
    /// databases are cleared and the status records the error.
    pub async fn load(&mut self, client: &dyn DatabaseClient) -> Result<()> {
        debug!("Loading server {}", self.configuration.connection_string());
        self.status = ServerStatus::Loading;

        match Self::discover(client).await {
            Ok(databases) => {
                debug!(
                    "Loaded {} databases from {}",
                    databases.len(),
                    self.configuration.connection_string()
                );
                self.databases = databases;
                self.status = ServerStatus::Ok;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to load server {}: {}",
                    self.configuration.connection_string(),
                    e
                );
                self.databases.clear();
                self.status = ServerStatus::Error(e.to_string());
                Err(e)
            }
        }
    }

    async fn discover(client: &dyn DatabaseClient) -> Result<Vec<Database>> {
        let mut databases = client.list_databases().await?;

        for database in databases.iter_mut().filter(|db| db.is_folder()) {
            let collections = client.list_collections(database.name()).await?;
            for collection in collections {
                database.add_collection(collection.name)?;
            }
        }

        Ok(databases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseVendor;
    use crate::types::{Capability, Document, QueryContext, QueryOptions, SearchResult};
    use async_trait::async_trait;

    /// Server with one folder database, one plain database, or no answer at all
    struct ExplorerClient {
        reachable: bool,
    }

    #[async_trait]
    impl DatabaseClient for ExplorerClient {
        fn vendor(&self) -> DatabaseVendor {
            DatabaseVendor::MongoDb
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Collections]
        }

        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn list_databases(&self) -> Result<Vec<Database>> {
            if !self.reachable {
                return Err(DataError::ConnectionFailed("connection refused".to_string()));
            }
            Ok(vec![Database::folder("shop"), Database::new("cache")])
        }

        async fn list_collections(&self, database: &str) -> Result<Vec<Collection>> {
            assert_eq!(database, "shop");
            Ok(vec![
                Collection::new(database, "orders"),
                Collection::new(database, "users"),
            ])
        }

        async fn execute_query(
            &self,
            context: &QueryContext,
            _options: &QueryOptions,
        ) -> Result<SearchResult> {
            Ok(SearchResult::new(context.target_name()))
        }

        async fn find_document(
            &self,
            _context: &QueryContext,
            _id: &str,
        ) -> Result<Option<Document>> {
            Ok(None)
        }

        async fn update(&self, _context: &QueryContext, _document: &Document) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _context: &QueryContext, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn drop_collection(&self, _collection: &Collection) -> Result<()> {
            Ok(())
        }

        async fn drop_database(&self, _database: &str) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_discovers_folders() {
        let mut server = DatabaseServer::new(ServerConfiguration::new(DatabaseVendor::MongoDb));
        assert_eq!(server.status(), &ServerStatus::NotLoaded);

        server.load(&ExplorerClient { reachable: true }).await.unwrap();
        assert_eq!(server.status(), &ServerStatus::Ok);

        let shop = server.database("shop").unwrap();
        let names: Vec<&str> = shop.collections().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["orders", "users"]);
        assert!(server.database("cache").unwrap().collections().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_clears_databases() {
        let mut server = DatabaseServer::new(ServerConfiguration::new(DatabaseVendor::MongoDb));
        server.load(&ExplorerClient { reachable: true }).await.unwrap();

        let err = server
            .load(&ExplorerClient { reachable: false })
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
        assert!(server.databases().is_empty());
        assert!(matches!(server.status(), ServerStatus::Error(_)));
    }

    #[test]
    fn test_folder_owns_collections() {
        let mut db = Database::folder("shop");
        let added = db.add_collection("orders").unwrap();
        assert_eq!(added.database(), "shop");
        db.add_collection("users").unwrap();
        db.add_collection("orders").unwrap();

        let names: Vec<&str> = db.collections().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["orders", "users"]);
    }

    #[test]
    fn test_plain_database_rejects_collections() {
        let mut db = Database::new("0");
        assert!(!db.is_folder());
        assert!(db.add_collection("keys").is_err());
        assert!(db.collections().is_empty());
    }

    #[test]
    fn test_dropped_collection_is_removed() {
        let mut db = Database::folder("shop");
        db.add_collection("orders").unwrap();
        let removed = db.remove_collection("orders").unwrap();
        assert_eq!(removed.to_string(), "shop.orders");
        assert!(db.collections().is_empty());
        assert!(db.remove_collection("orders").is_none());
    }
}
