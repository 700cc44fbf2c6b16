use crate::config::DatabaseVendor;
use crate::error::Result;
use crate::model::{Collection, Database};
use crate::types::*;
use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};

/// Adapter every backend implements
///
/// One instance is bound to one server configuration and shared by every
/// result view connected to that server, so implementations must tolerate
/// concurrent calls. They rely on the driver's own pooling rather than any
/// shared mutable cursor.
#[async_trait]
pub trait DatabaseClient: DowncastSync {
    /// Backend served by this client
    fn vendor(&self) -> DatabaseVendor;

    /// Get all capabilities supported by this client
    fn capabilities(&self) -> Vec<Capability>;

    /// Check if a specific capability is supported
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Probe the server. Fails with `ConnectionFailed` or `AuthenticationFailed`.
    async fn connect(&self) -> Result<()>;

    /// List databases, or only the configured user database
    async fn list_databases(&self) -> Result<Vec<Database>>;

    /// List collections of one database. Empty for backends without collections.
    async fn list_collections(&self, database: &str) -> Result<Vec<Collection>>;

    /// Run a backend-native query.
    ///
    /// Partial backend failures are returned inside the result; only a total
    /// failure is an `Err(QueryFailed)`.
    async fn execute_query(
        &self,
        context: &QueryContext,
        options: &QueryOptions,
    ) -> Result<SearchResult>;

    /// Point lookup. A missing document is `Ok(None)`.
    async fn find_document(&self, context: &QueryContext, id: &str) -> Result<Option<Document>>;

    /// Write a document. Retrying with the same document state must succeed.
    async fn update(&self, context: &QueryContext, document: &Document) -> Result<()>;

    /// Delete a document. Deleting an absent document is not an error.
    async fn delete(&self, context: &QueryContext, id: &str) -> Result<()>;

    /// Drop a collection. A refusal is `PermissionDenied`, never `WriteFailed`.
    async fn drop_collection(&self, collection: &Collection) -> Result<()>;

    /// Drop a database. A refusal is `PermissionDenied`, never `WriteFailed`.
    async fn drop_database(&self, database: &str) -> Result<()>;

    /// Close the connection gracefully
    async fn close(&self) -> Result<()>;
}

impl_downcast!(sync DatabaseClient);
