//! # nosql-query
//!
//! Core abstractions for browsing and querying NoSQL servers.
//!
//! Every backend is reached through one adapter contract and every result
//! is reduced to one value model, so a single tree builder can render the
//! output of any of them:
//! - MongoDB (documents)
//! - Redis (key-value)
//! - Elasticsearch (search indices)
//! - Couchbase (buckets and N1QL)
//! - Solr (cores)
//!
//! ## Architecture
//!
//! - **DatabaseClient**: adapter trait each backend implements
//! - **DatabaseClientFactory**: creates a client from a `ServerConfiguration`
//! - **ClientRegistry**: one shared client per configured server
//! - **DatabaseElement / ObjectWrapper**: backend-neutral values and records
//! - **SearchResult**: named records plus partial errors
//! - **build_tree / NodeDescriptorFactory**: result tree with one descriptor per node
//! - **ResultView**: runs queries in the background, newest query wins
//!
//! ## Example
//!
//! ```rust,no_run
//! use nosql_query::{
//!     ClientRegistry, DatabaseVendor, QueryContext, QueryOptions, ResultView,
//!     ServerConfiguration,
//! };
//!
//! # async fn example() -> nosql_query::Result<()> {
//! let registry = ClientRegistry::new();
//! // registry.register_factory(...).await;
//!
//! let config = ServerConfiguration::new(DatabaseVendor::MongoDb)
//!     .with_host("localhost")
//!     .with_username("admin")
//!     .with_password("secret");
//!
//! let client = registry.client_for(&config).await?;
//! let view = ResultView::new(client, QueryContext::new("shop").with_collection("orders"));
//! let outcome = view
//!     .execute_query(QueryOptions::default().with_query(r#"{"status": "open"}"#))
//!     .wait()
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Backend Implementation
//!
//! 1. Create a struct that implements `DatabaseClient`
//! 2. Wrap native records in an `ObjectWrapper` and classify native values
//!    into `DatabaseElement`
//! 3. Create a `DatabaseClientFactory` implementation
//! 4. Register the factory with `ClientRegistry`

pub mod config;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod model;
pub mod registry;
pub mod traits;
pub mod tree;
pub mod types;
pub mod view;
pub mod wrapper;

// Re-export commonly used items
pub use config::{DatabaseVendor, ServerConfiguration};
pub use descriptor::{
    value_kind, DatabaseNodeDescriptorFactory, Descriptor, IndexedValueDescriptor,
    KeyValueDescriptor, NodeDescriptor, NodeDescriptorFactory, ResultDescriptor, TypeIcon,
    ValueKind,
};
pub use element::{
    classify_json, DatabaseElement, DatabasePrimitive, Number, ObjectValue, OpaqueValue,
    PrimitiveKind,
};
pub use error::{DataError, Result};
pub use model::{Collection, Database, DatabaseServer, ServerStatus};
pub use registry::{ClientRegistry, DatabaseClientFactory};
pub use traits::DatabaseClient;
pub use tree::{build_tree, NodeId, NodeShape, ResultTree, TreeNode};
pub use types::{Capability, Document, QueryContext, QueryOptions, RecordError, SearchResult};
pub use view::{Displayed, QueryHandle, QueryOutcome, ResultView, ViewSnapshot};
pub use wrapper::{JsonObjectWrapper, ObjectWrapper, Record};
