//! MongoDB implementation of the nosql-query DatabaseClient trait
//!
//! This crate provides MongoDB access through the generic query interface.
//!
//! ## Hierarchy
//!
//! MongoDB uses a simple 2-level hierarchy:
//! - Databases (folders)
//! - Collections in each database
//!
//! ## Queries
//!
//! The query text is JSON. An object is a `find` filter (combined with the
//! projection, sort and limit options); an array is an aggregation pipeline.
//! No query text finds every document of the collection.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nosql_query::{DatabaseClient, DatabaseVendor, ServerConfiguration};
//! use nosql_query_mongodb::MongoDbClient;
//!
//! # async fn example() -> nosql_query::Result<()> {
//! let config = ServerConfiguration::new(DatabaseVendor::MongoDb).with_host("localhost");
//! let client = MongoDbClient::new(config).await?;
//!
//! let databases = client.list_databases().await?;
//! let collections = client.list_collections("mydb").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document as BsonDocument},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::ClientOptions,
    Client, Cursor,
};
use nosql_query::{
    Capability, Collection, DataError, Database, DatabaseClient, DatabaseClientFactory,
    DatabaseElement, DatabaseVendor, Document, ObjectWrapper, QueryContext, QueryOptions,
    Record, Result, SearchResult, ServerConfiguration,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Server error codes with a dedicated meaning
const UNAUTHORIZED: i32 = 13;
const WRITE_CONFLICT: i32 = 112;
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Read access to one BSON document
#[derive(Debug, Clone)]
pub struct MongoObjectWrapper {
    document: BsonDocument,
}

impl MongoObjectWrapper {
    pub fn new(document: BsonDocument) -> Self {
        Self { document }
    }

    pub fn into_record(self) -> Record {
        Arc::new(self)
    }

    pub fn document(&self) -> &BsonDocument {
        &self.document
    }
}

impl ObjectWrapper for MongoObjectWrapper {
    fn names(&self) -> Vec<String> {
        self.document.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<DatabaseElement> {
        self.document.get(name).map(classify_bson)
    }
}

/// Classify a BSON value. Values without a dedicated mapping become opaque.
pub fn classify_bson(value: &Bson) -> DatabaseElement {
    match value {
        Bson::Double(f) => DatabaseElement::number(*f),
        Bson::Int32(i) => DatabaseElement::number(*i),
        Bson::Int64(i) => DatabaseElement::number(*i),
        Bson::String(s) => DatabaseElement::string(s.clone()),
        Bson::Boolean(b) => DatabaseElement::boolean(*b),
        Bson::Null | Bson::Undefined => DatabaseElement::null(),
        Bson::DateTime(dt) => {
            match chrono::DateTime::from_timestamp_millis(dt.timestamp_millis()) {
                Some(date) => DatabaseElement::date(date),
                None => DatabaseElement::opaque("date", dt.to_string()),
            }
        }
        Bson::Timestamp(ts) => match chrono::DateTime::from_timestamp(i64::from(ts.time), 0) {
            Some(date) => DatabaseElement::date(date),
            None => DatabaseElement::opaque("timestamp", value.to_string()),
        },
        Bson::Document(document) => {
            DatabaseElement::record(MongoObjectWrapper::new(document.clone()).into_record())
        }
        Bson::Array(items) => DatabaseElement::Array(items.iter().map(classify_bson).collect()),
        Bson::ObjectId(oid) => DatabaseElement::opaque("objectId", oid.to_hex()),
        other => DatabaseElement::opaque(bson_type_name(other), other.to_string()),
    }
}

fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Binary(_) => "binary",
        Bson::RegularExpression(_) => "regex",
        Bson::Decimal128(_) => "decimal128",
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::DbPointer(_) => "dbPointer",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
        _ => "bson",
    }
}

/// Parsed query text
#[derive(Debug, Clone, PartialEq)]
pub enum MongoQuery {
    Find(BsonDocument),
    Aggregate(Vec<BsonDocument>),
}

/// Parse the query text: an object is a filter, an array a pipeline
pub fn parse_query(text: Option<&str>) -> Result<MongoQuery> {
    let Some(text) = text else {
        return Ok(MongoQuery::Find(BsonDocument::new()));
    };

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| DataError::QueryFailed(format!("Invalid query JSON: {}", e)))?;

    match value {
        serde_json::Value::Object(_) => Ok(MongoQuery::Find(json_to_document(value)?)),
        serde_json::Value::Array(stages) => stages
            .into_iter()
            .map(json_to_document)
            .collect::<Result<Vec<_>>>()
            .map(MongoQuery::Aggregate),
        other => Err(DataError::QueryFailed(format!(
            "Query must be a JSON object or an array of pipeline stages, got: {}",
            other
        ))),
    }
}

fn parse_document_option(text: Option<&str>, what: &str) -> Result<Option<BsonDocument>> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(text) => {
            let value: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| DataError::QueryFailed(format!("Invalid {} JSON: {}", what, e)))?;
            json_to_document(value).map(Some)
        }
    }
}

/// Convert (extended) JSON to a BSON document
fn json_to_document(value: serde_json::Value) -> Result<BsonDocument> {
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(DataError::SerializationError(format!(
            "Expected a JSON object, got: {}",
            other
        ))),
        Err(e) => Err(DataError::SerializationError(format!(
            "Invalid extended JSON: {}",
            e
        ))),
    }
}

fn document_to_json(document: BsonDocument) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

/// `_id` value for an id typed by the user: an ObjectId when it parses as one
fn id_value(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}

/// Filter matching `id` as an ObjectId or as a plain string
fn id_filter(id: &str) -> BsonDocument {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [Bson::ObjectId(oid), Bson::String(id.to_string())] } },
        Err(_) => doc! { "_id": id },
    }
}

/// Textual id of a fetched document
fn id_text(value: Option<&Bson>) -> Option<String> {
    match value? {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build the driver connection string for a configuration
pub fn build_uri(config: &ServerConfiguration) -> String {
    if let Some(uri) = config.option("uri") {
        return uri.to_string();
    }

    let mut uri = String::from("mongodb://");

    if let Some((username, password)) = config.credentials() {
        uri.push_str(&urlencoding::encode(username));
        if !password.is_empty() {
            uri.push(':');
            uri.push_str(&urlencoding::encode(password));
        }
        uri.push('@');
    }

    // A host list already carries its ports
    if config.host.contains(',') {
        uri.push_str(&config.host);
    } else {
        uri.push_str(&format!("{}:{}", config.host, config.port_or_default()));
    }
    uri.push('/');

    let mut params: Vec<(String, String)> = Vec::new();
    if let Some(auth_db) = config.auth_database.as_deref().filter(|db| !db.is_empty()) {
        params.push(("authSource".to_string(), auth_db.to_string()));
    }
    if config.tls {
        params.push(("tls".to_string(), "true".to_string()));
    }

    let mut extra: Vec<_> = config
        .options
        .iter()
        .filter(|(key, _)| key.as_str() != "uri")
        .collect();
    extra.sort();
    for (key, value) in extra {
        params.push((key.clone(), value.clone()));
    }

    if !params.is_empty() {
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        uri.push('?');
        uri.push_str(&query.join("&"));
    }

    uri
}

/// Map a driver error onto the shared error kinds.
///
/// `fallback` is used for failures with no more specific meaning.
fn map_mongo_error(e: &MongoError, fallback: fn(String) -> DataError) -> DataError {
    let message = e.to_string();

    match e.kind.as_ref() {
        ErrorKind::Authentication { .. } => DataError::AuthenticationFailed(message),
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => DataError::ConnectionFailed(message),
        ErrorKind::Command(command) => match command.code {
            UNAUTHORIZED => DataError::PermissionDenied(message),
            WRITE_CONFLICT => DataError::Conflict(message),
            NAMESPACE_NOT_FOUND => DataError::NotFound(message),
            _ => fallback(message),
        },
        ErrorKind::Write(WriteFailure::WriteError(write)) => match write.code {
            UNAUTHORIZED => DataError::PermissionDenied(message),
            WRITE_CONFLICT => DataError::Conflict(message),
            _ => fallback(message),
        },
        _ => fallback(message),
    }
}

/// MongoDB client implementation
pub struct MongoDbClient {
    client: Client,
    config: ServerConfiguration,
}

impl MongoDbClient {
    /// Create a client for `config`. The driver connects lazily.
    pub async fn new(config: ServerConfiguration) -> Result<Self> {
        let uri = build_uri(&config);
        debug!("Creating MongoDB client for {}", config.connection_string());

        let client_options = ClientOptions::parse(&uri).await.map_err(|e| {
            error!("Failed to parse MongoDB URL: {}", e);
            DataError::InvalidConfiguration(format!("Failed to parse MongoDB URL: {}", e))
        })?;

        let client = Client::with_options(client_options).map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            DataError::ConnectionFailed(format!("Failed to create MongoDB client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    fn collection_of(&self, context: &QueryContext) -> Result<mongodb::Collection<BsonDocument>> {
        let name = context.collection.as_deref().ok_or_else(|| {
            DataError::QueryFailed(format!(
                "No collection selected in database {}",
                context.database
            ))
        })?;
        Ok(self.client.database(&context.database).collection(name))
    }

    async fn drain(
        mut cursor: Cursor<BsonDocument>,
        limit: usize,
        result: &mut SearchResult,
    ) -> Result<()> {
        while result.len() < limit {
            let next = cursor.try_next().await.map_err(|e| {
                error!("Failed to read query results: {}", e);
                map_mongo_error(&e, DataError::QueryFailed)
            })?;
            match next {
                Some(document) => result.add(MongoObjectWrapper::new(document).into_record()),
                None => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseClient for MongoDbClient {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::MongoDb
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Document,
            Capability::Collections,
            Capability::DocumentEdit,
            Capability::Aggregation,
        ]
    }

    async fn connect(&self) -> Result<()> {
        let database = self.config.user_database().unwrap_or("admin");
        debug!("Pinging MongoDB at {}", self.config.connection_string());

        self.client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| {
                error!("Failed to connect to MongoDB: {}", e);
                map_mongo_error(&e, DataError::ConnectionFailed)
            })?;

        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<Database>> {
        if let Some(database) = self.config.user_database() {
            debug!("Restricting MongoDB discovery to database {}", database);
            return Ok(vec![Database::folder(database)]);
        }

        debug!("Listing MongoDB databases");

        let mut names = self.client.list_database_names().await.map_err(|e| {
            error!("Failed to list databases: {}", e);
            map_mongo_error(&e, DataError::ConnectionFailed)
        })?;
        names.sort();

        debug!("Found {} databases", names.len());
        Ok(names.into_iter().map(Database::folder).collect())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<Collection>> {
        debug!("Listing collections in database: {}", database);

        let mut names = self
            .client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| {
                error!("Failed to list collections in database {}: {}", database, e);
                map_mongo_error(&e, DataError::ConnectionFailed)
            })?;
        names.sort();

        debug!("Found {} collections in database {}", names.len(), database);
        Ok(names
            .into_iter()
            .map(|name| Collection::new(database, name))
            .collect())
    }

    async fn execute_query(
        &self,
        context: &QueryContext,
        options: &QueryOptions,
    ) -> Result<SearchResult> {
        let collection = self.collection_of(context)?;
        let query = parse_query(options.query_text())?;
        let mut result = SearchResult::new(context.target_name());

        debug!("Running MongoDB query on {}: {:?}", context, query);

        let cursor = match query {
            MongoQuery::Find(filter) => {
                let mut find = collection.find(filter);
                if let Some(projection) =
                    parse_document_option(options.projection.as_deref(), "projection")?
                {
                    find = find.projection(projection);
                }
                if let Some(sort) = parse_document_option(options.sort.as_deref(), "sort")? {
                    find = find.sort(sort);
                }
                if let Some(limit) = find_limit(options.limit) {
                    find = find.limit(limit);
                }
                find.await
            }
            MongoQuery::Aggregate(pipeline) => collection.aggregate(pipeline).await,
        }
        .map_err(|e| {
            error!("MongoDB query on {} failed: {}", context, e);
            map_mongo_error(&e, DataError::QueryFailed)
        })?;

        let limit = if options.limit == 0 { usize::MAX } else { options.limit };
        Self::drain(cursor, limit, &mut result).await?;

        debug!("MongoDB query on {} returned {} documents", context, result.len());
        Ok(result)
    }

    async fn find_document(&self, context: &QueryContext, id: &str) -> Result<Option<Document>> {
        let collection = self.collection_of(context)?;
        debug!("Finding document {} in {}", id, context);

        let found = collection.find_one(id_filter(id)).await.map_err(|e| {
            error!("Failed to find document {} in {}: {}", id, context, e);
            map_mongo_error(&e, DataError::QueryFailed)
        })?;

        Ok(found.map(|document| {
            let id = id_text(document.get("_id")).unwrap_or_else(|| id.to_string());
            Document::new(id, document_to_json(document))
        }))
    }

    async fn update(&self, context: &QueryContext, document: &Document) -> Result<()> {
        let collection = self.collection_of(context)?;
        let mut replacement = json_to_document(document.body.clone())?;

        let id = replacement
            .remove("_id")
            .unwrap_or_else(|| id_value(&document.id));

        debug!("Replacing document {} in {}", document.id, context);

        collection
            .replace_one(doc! { "_id": id }, replacement)
            .upsert(true)
            .await
            .map_err(|e| {
                error!("Failed to update document {} in {}: {}", document.id, context, e);
                map_mongo_error(&e, DataError::WriteFailed)
            })?;

        Ok(())
    }

    async fn delete(&self, context: &QueryContext, id: &str) -> Result<()> {
        let collection = self.collection_of(context)?;

        let deleted = collection.delete_one(id_filter(id)).await.map_err(|e| {
            error!("Failed to delete document {} in {}: {}", id, context, e);
            map_mongo_error(&e, DataError::WriteFailed)
        })?;

        debug!(
            "Deleted {} document(s) with id {} in {}",
            deleted.deleted_count, id, context
        );
        Ok(())
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<()> {
        debug!("Dropping collection {}", collection);

        self.client
            .database(collection.database())
            .collection::<BsonDocument>(collection.name())
            .drop()
            .await
            .map_err(|e| {
                error!("Failed to drop collection {}: {}", collection, e);
                map_mongo_error(&e, DataError::WriteFailed)
            })
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        debug!("Dropping database {}", database);

        self.client.database(database).drop().await.map_err(|e| {
            error!("Failed to drop database {}: {}", database, e);
            map_mongo_error(&e, DataError::WriteFailed)
        })
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing MongoDB client");
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Factory registered for [`DatabaseVendor::MongoDb`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoDbClientFactory;

#[async_trait]
impl DatabaseClientFactory for MongoDbClientFactory {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::MongoDb
    }

    async fn create_client(
        &self,
        config: ServerConfiguration,
    ) -> Result<Arc<dyn DatabaseClient>> {
        Ok(Arc::new(MongoDbClient::new(config).await?))
    }
}

/// Server-side limit of a find, `None` when unbounded
fn find_limit(limit: usize) -> Option<i64> {
    (limit > 0).then(|| i64::try_from(limit).unwrap_or(i64::MAX))
}
