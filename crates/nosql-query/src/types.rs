use crate::wrapper::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capabilities supported by a database client
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    /// Document-based (MongoDB, Couchbase)
    Document,
    /// Key-value pairs (Redis)
    KeyValue,
    /// Full-text search index (Elasticsearch)
    TextSearch,
    /// Databases own collections that can be listed and dropped
    Collections,
    /// Point lookup, update and delete of single documents
    DocumentEdit,
    /// Aggregation pipelines
    Aggregation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Document => write!(f, "document"),
            Capability::KeyValue => write!(f, "key-value"),
            Capability::TextSearch => write!(f, "text-search"),
            Capability::Collections => write!(f, "collections"),
            Capability::DocumentEdit => write!(f, "document-edit"),
            Capability::Aggregation => write!(f, "aggregation"),
        }
    }
}

/// Where a query or document operation runs
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    /// Database, index, bucket or Redis database number
    pub database: String,
    /// Collection within the database, for backends that have them
    pub collection: Option<String>,
}

impl QueryContext {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Name shown for the result root: the collection if any, else the database
    pub fn target_name(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.database)
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(collection) => write!(f, "{}.{}", self.database, collection),
            None => write!(f, "{}", self.database),
        }
    }
}

/// Query options for controlling result behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Backend-native query text (JSON filter or pipeline, query DSL, N1QL,
    /// key pattern). `None` runs the backend's "everything" query.
    pub query: Option<String>,
    /// Projection (MongoDB JSON)
    pub projection: Option<String>,
    /// Sort document (MongoDB JSON)
    pub sort: Option<String>,
    /// Maximum records to return
    pub limit: usize,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl QueryOptions {
    pub const DEFAULT_LIMIT: usize = 300;

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Query text with blank input treated as absent
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            query: None,
            projection: None,
            sort: None,
            limit: Self::DEFAULT_LIMIT,
            timeout_ms: Some(30000),
        }
    }
}

/// Vendor-neutral document exchanged by find/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key (`_id`, Redis key, document key)
    pub id: String,
    /// Document content
    pub body: serde_json::Value,
    /// Backend revision token used for optimistic concurrency, if any
    pub revision: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            body,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// Non-fatal failure reported by the backend for part of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    /// Backend message
    pub message: String,
    /// Backend error code, if it reports one
    pub code: Option<String>,
    /// Raw error payload as the backend sent it
    pub raw: serde_json::Value,
}

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Normalized outcome of one query execution
///
/// Records are appended while the backend response is parsed; after that the
/// result is only read. Zero records and zero errors is a valid empty result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    name: String,
    records: Vec<Record>,
    errors: Vec<RecordError>,
}

impl SearchResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Append one wrapped record
    pub fn add(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Append a native batch, preserving source order
    pub fn add_all(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    /// Record partial failures without discarding the records already added
    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = RecordError>) {
        self.errors.extend(errors);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn errors(&self) -> &[RecordError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
