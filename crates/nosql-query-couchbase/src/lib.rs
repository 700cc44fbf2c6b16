//! Couchbase implementation of the nosql-query DatabaseClient trait
//!
//! Uses two REST services with `reqwest`:
//! - the cluster manager (port 8091) for buckets, scopes and collections
//! - the Query service (port 8093) for N1QL statements
//!
//! ## Hierarchy
//!
//! - Buckets (folders)
//! - `scope.collection` pairs of each bucket
//!
//! ## Queries
//!
//! The query text is a N1QL statement. Without one the client runs
//! `SELECT * FROM <keyspace> LIMIT <limit>`. A `fatal` statement (syntax
//! error, unknown keyspace) fails with `QueryFailed`; errors reported next
//! to rows come back as partial errors.

use async_trait::async_trait;
use nosql_query::{
    Capability, Collection, DataError, Database, DatabaseClient, DatabaseClientFactory,
    DatabaseVendor, Document, JsonObjectWrapper, QueryContext, QueryOptions, RecordError, Result,
    SearchResult, ServerConfiguration,
};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_QUERY_PORT: u16 = 8093;

/// Field name given to unnamed projections, as the Query service does
const UNNAMED_FIELD: &str = "$1";

/// Query service error codes with a dedicated meaning
const CAS_MISMATCH: i64 = 12009;
const NO_CREDENTIALS: i64 = 13014;

#[derive(Debug, Deserialize)]
struct BucketInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScopesResponse {
    #[serde(default)]
    scopes: Vec<ScopeInfo>,
}

#[derive(Debug, Deserialize)]
struct ScopeInfo {
    name: String,
    #[serde(default)]
    collections: Vec<CollectionInfo>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    name: String,
}

/// Response of the Query service
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    status: Option<String>,
    /// Whether the service answered with a 2xx status
    #[serde(skip)]
    http_success: bool,
}

impl QueryResponse {
    /// The statement failed as a whole: `fatal`, or an HTTP error without rows
    fn is_total_failure(&self) -> bool {
        if self.errors.is_empty() {
            return false;
        }
        self.status.as_deref() == Some("fatal") || (!self.http_success && self.results.is_empty())
    }

    fn record_errors(&self) -> Vec<RecordError> {
        self.errors
            .iter()
            .map(|e| {
                let message = e.get("msg").and_then(Value::as_str).unwrap_or("query error");
                let mut record_error = RecordError::new(message).with_raw(e.clone());
                if let Some(code) = e.get("code") {
                    record_error = record_error.with_code(code.to_string());
                }
                record_error
            })
            .collect()
    }

    /// Turn reported errors into a failure of a single-statement operation
    fn into_failure(self, fallback: fn(String) -> DataError) -> Result<Vec<Value>> {
        let Some(first) = self.errors.first() else {
            return Ok(self.results);
        };

        let message = self
            .record_errors()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        Err(match first.get("code").and_then(Value::as_i64) {
            Some(CAS_MISMATCH) => DataError::Conflict(message),
            Some(NO_CREDENTIALS) => DataError::PermissionDenied(message),
            _ => fallback(message),
        })
    }
}

/// Keyspace of a context: `` `bucket` `` or `` `bucket`.`scope`.`collection` ``
fn keyspace(context: &QueryContext) -> String {
    match context.collection.as_deref() {
        None => format!("`{}`", context.database),
        Some(collection) => {
            let (scope, name) = collection.split_once('.').unwrap_or(("_default", collection));
            format!("`{}`.`{}`.`{}`", context.database, scope, name)
        }
    }
}

/// Couchbase client implementation
pub struct CouchbaseClient {
    client: Client,
    config: ServerConfiguration,
    manager_url: String,
    query_url: String,
}

impl CouchbaseClient {
    pub fn new(config: ServerConfiguration) -> Result<Self> {
        let manager_url = config
            .option("url")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| config.http_base_url(config.port_or_default()));

        let query_url = match config.option("query_url") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let port = match config.option("query_port") {
                    Some(port) => port.parse().map_err(|_| {
                        DataError::invalid_configuration(format!("Invalid query port: {}", port))
                    })?,
                    None => DEFAULT_QUERY_PORT,
                };
                config.http_base_url(port)
            }
        };

        Self::with_base_urls(config, manager_url, query_url)
    }

    /// Create a client for explicit service URLs (proxies, tests)
    pub fn with_base_urls(
        config: ServerConfiguration,
        manager_url: impl Into<String>,
        query_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(75))
            .build()
            .map_err(|e| {
                DataError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        debug!("Creating Couchbase client for {}", config.connection_string());

        Ok(Self {
            client,
            config,
            manager_url: manager_url.into(),
            query_url: query_url.into(),
        })
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match self.config.credentials() {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    /// Call the cluster manager and read its JSON answer
    async fn manage(
        &self,
        method: Method,
        path: &str,
        fallback: fn(String) -> DataError,
    ) -> Result<Option<Value>> {
        debug!("Couchbase management request: {} {}", method, path);

        let response = self
            .request(method, format!("{}{}", self.manager_url, path))
            .send()
            .await
            .map_err(|e| {
                error!("Couchbase management request {} failed: {}", path, e);
                DataError::ConnectionFailed(format!("Request to {} failed: {}", path, e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            DataError::ConnectionFailed(format!("Failed to read response: {}", e))
        })?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            error!("Couchbase returned {} for {}: {}", status, path, text);
            return Err(DataError::from_http_status(status.as_u16(), text, fallback));
        }
        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }

        serde_json::from_str(&text).map(Some).map_err(|e| {
            DataError::SerializationError(format!("Failed to parse response: {} - Body: {}", e, text))
        })
    }

    /// Run one N1QL statement with named arguments
    async fn query(
        &self,
        statement: &str,
        args: Map<String, Value>,
        timeout_ms: Option<u64>,
    ) -> Result<QueryResponse> {
        let mut body = Map::new();
        body.insert("statement".to_string(), Value::String(statement.to_string()));
        if let Some(timeout) = timeout_ms {
            body.insert("timeout".to_string(), json!(format!("{}ms", timeout)));
        }
        for (name, value) in args {
            body.insert(format!("${}", name), value);
        }

        debug!("Running N1QL: {}", statement);

        let response = self
            .request(Method::POST, format!("{}/query/service", self.query_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Couchbase query request failed: {}", e);
                DataError::ConnectionFailed(format!("Query service unreachable: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            DataError::ConnectionFailed(format!("Failed to read response: {}", e))
        })?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(DataError::from_http_status(status.as_u16(), text, DataError::QueryFailed));
        }

        // Statement errors arrive with a non-success status and a JSON body
        match serde_json::from_str::<QueryResponse>(&text) {
            Ok(mut parsed) => {
                parsed.http_success = status.is_success();
                Ok(parsed)
            }
            Err(_) if !status.is_success() => {
                error!("Couchbase query service returned {}: {}", status, text);
                Err(DataError::from_http_status(status.as_u16(), text, DataError::QueryFailed))
            }
            Err(e) => Err(DataError::SerializationError(format!(
                "Failed to parse query response: {} - Body: {}",
                e, text
            ))),
        }
    }

    fn id_args(id: &str) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("id".to_string(), Value::String(id.to_string()));
        args
    }
}

#[async_trait]
impl DatabaseClient for CouchbaseClient {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::Couchbase
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Document,
            Capability::Collections,
            Capability::DocumentEdit,
        ]
    }

    async fn connect(&self) -> Result<()> {
        let path = match self.config.user_database() {
            Some(bucket) => format!("/pools/default/buckets/{}", urlencoding::encode(bucket)),
            None => "/pools".to_string(),
        };

        match self.manage(Method::GET, &path, DataError::ConnectionFailed).await? {
            Some(_) => Ok(()),
            None => Err(DataError::not_found(format!("Couchbase resource {} not found", path))),
        }
    }

    async fn list_databases(&self) -> Result<Vec<Database>> {
        if let Some(bucket) = self.config.user_database() {
            debug!("Restricting Couchbase discovery to bucket {}", bucket);

            let path = format!("/pools/default/buckets/{}", urlencoding::encode(bucket));
            let info = self
                .manage(Method::GET, &path, DataError::ConnectionFailed)
                .await?
                .ok_or_else(|| DataError::not_found(format!("Bucket {} not found", bucket)))?;
            let bucket: BucketInfo = serde_json::from_value(info)?;
            return Ok(vec![Database::folder(bucket.name)]);
        }

        debug!("Listing Couchbase buckets");

        let body = self
            .manage(Method::GET, "/pools/default/buckets", DataError::ConnectionFailed)
            .await?
            .unwrap_or_else(|| json!([]));
        let buckets: Vec<BucketInfo> = serde_json::from_value(body)?;

        let mut names: Vec<String> = buckets.into_iter().map(|b| b.name).collect();
        names.sort();

        debug!("Found {} buckets", names.len());
        Ok(names.into_iter().map(Database::folder).collect())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<Collection>> {
        let path = format!("/pools/default/buckets/{}/scopes", urlencoding::encode(database));

        // Servers without collections have no scopes endpoint
        let Some(body) = self.manage(Method::GET, &path, DataError::ConnectionFailed).await? else {
            return Ok(Vec::new());
        };
        let response: ScopesResponse = serde_json::from_value(body)?;

        let mut collections: Vec<Collection> = response
            .scopes
            .into_iter()
            .flat_map(|scope| {
                let scope_name = scope.name;
                scope.collections.into_iter().map(move |collection| {
                    Collection::new(database, format!("{}.{}", scope_name, collection.name))
                })
            })
            .collect();
        collections.sort_by(|a, b| a.name().cmp(b.name()));

        debug!("Found {} collections in bucket {}", collections.len(), database);
        Ok(collections)
    }

    async fn execute_query(
        &self,
        context: &QueryContext,
        options: &QueryOptions,
    ) -> Result<SearchResult> {
        let statement = match options.query_text() {
            Some(text) => text.to_string(),
            None if options.limit > 0 => {
                format!("SELECT * FROM {} LIMIT {}", keyspace(context), options.limit)
            }
            None => format!("SELECT * FROM {}", keyspace(context)),
        };

        let response = self.query(&statement, Map::new(), options.timeout_ms).await?;
        if response.is_total_failure() {
            error!("N1QL on {} failed: {:?}", context, response.errors);
            return Err(response
                .into_failure(DataError::QueryFailed)
                .err()
                .unwrap_or_else(|| DataError::QueryFailed(statement)));
        }
        let mut result = SearchResult::new(context.target_name());

        let errors = response.record_errors();
        if !errors.is_empty() {
            warn!(
                "N1QL on {} reported {} errors (status {:?})",
                context,
                errors.len(),
                response.status
            );
        }

        for row in response.results.into_iter() {
            if options.limit > 0 && result.len() >= options.limit {
                break;
            }
            result.add(JsonObjectWrapper::from_value(row, UNNAMED_FIELD).into_record());
        }
        result.add_errors(errors);

        debug!("N1QL on {} returned {} rows", context, result.len());
        Ok(result)
    }

    async fn find_document(&self, context: &QueryContext, id: &str) -> Result<Option<Document>> {
        let statement = format!(
            "SELECT META(d).cas AS cas, d AS body FROM {} AS d USE KEYS $id",
            keyspace(context)
        );

        let rows = self
            .query(&statement, Self::id_args(id), None)
            .await?
            .into_failure(DataError::QueryFailed)?;

        Ok(rows.into_iter().next().map(|mut row| {
            let body = row.get_mut("body").map(Value::take).unwrap_or(Value::Null);
            let document = Document::new(id, body);
            match row.get("cas") {
                Some(cas) if !cas.is_null() => document.with_revision(cas.to_string()),
                _ => document,
            }
        }))
    }

    async fn update(&self, context: &QueryContext, document: &Document) -> Result<()> {
        let statement = format!(
            "UPSERT INTO {} (KEY, VALUE) VALUES ($id, $body)",
            keyspace(context)
        );

        let mut args = Self::id_args(&document.id);
        args.insert("body".to_string(), document.body.clone());

        debug!("Upserting document {} into {}", document.id, context);

        self.query(&statement, args, None)
            .await?
            .into_failure(DataError::WriteFailed)
            .map(|_| ())
            .map_err(|e| {
                error!("Failed to upsert document {}: {}", document.id, e);
                e
            })
    }

    async fn delete(&self, context: &QueryContext, id: &str) -> Result<()> {
        let statement = format!("DELETE FROM {} USE KEYS $id", keyspace(context));

        let deleted = self
            .query(&statement, Self::id_args(id), None)
            .await?
            .into_failure(DataError::WriteFailed)?;

        debug!("Deleted {} document(s) with key {} in {}", deleted.len(), id, context);
        Ok(())
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<()> {
        let context = QueryContext::new(collection.database()).with_collection(collection.name());
        let statement = format!("DROP COLLECTION {}", keyspace(&context));

        debug!("Dropping collection {}", collection);

        self.query(&statement, Map::new(), None)
            .await?
            .into_failure(DataError::WriteFailed)
            .map(|_| ())
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        debug!("Deleting bucket {}", database);

        let path = format!("/pools/default/buckets/{}", urlencoding::encode(database));
        match self.manage(Method::DELETE, &path, DataError::WriteFailed).await? {
            Some(_) => Ok(()),
            None => Err(DataError::not_found(format!("Bucket {} not found", database))),
        }
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing Couchbase client");
        Ok(())
    }
}

/// Factory registered for [`DatabaseVendor::Couchbase`]
#[derive(Debug, Default, Clone, Copy)]
pub struct CouchbaseClientFactory;

#[async_trait]
impl DatabaseClientFactory for CouchbaseClientFactory {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::Couchbase
    }

    async fn create_client(
        &self,
        config: ServerConfiguration,
    ) -> Result<Arc<dyn DatabaseClient>> {
        Ok(Arc::new(CouchbaseClient::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_client(mock_server: &MockServer) -> CouchbaseClient {
        let config = ServerConfiguration::new(DatabaseVendor::Couchbase)
            .with_username("Administrator")
            .with_password("password");
        CouchbaseClient::with_base_urls(config, mock_server.uri(), mock_server.uri()).unwrap()
    }

    fn travel() -> QueryContext {
        QueryContext::new("travel-sample")
    }

    #[test]
    fn test_keyspace() {
        assert_eq!(keyspace(&travel()), "`travel-sample`");
        assert_eq!(
            keyspace(&travel().with_collection("inventory.airline")),
            "`travel-sample`.`inventory`.`airline`"
        );
        assert_eq!(
            keyspace(&travel().with_collection("airline")),
            "`travel-sample`.`_default`.`airline`"
        );
    }

    #[test]
    fn test_query_port_option() {
        let config = ServerConfiguration::new(DatabaseVendor::Couchbase)
            .with_host("cb.local")
            .with_option("query_port", "18093");
        let client = CouchbaseClient::new(config).unwrap();
        assert_eq!(client.manager_url, "http://cb.local:8091");
        assert_eq!(client.query_url, "http://cb.local:18093");

        let bad = ServerConfiguration::new(DatabaseVendor::Couchbase).with_option("query_port", "x");
        assert!(matches!(
            CouchbaseClient::new(bad),
            Err(DataError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_list_databases() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pools/default/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "travel-sample", "bucketType": "membase"},
                {"name": "beer-sample", "bucketType": "membase"}
            ])))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let databases = client.list_databases().await.unwrap();
        let names: Vec<&str> = databases.iter().map(|db| db.name()).collect();
        assert_eq!(names, vec!["beer-sample", "travel-sample"]);
    }

    #[tokio::test]
    async fn test_user_bucket_must_exist() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pools/default/buckets/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested resource not found."))
            .mount(&mock_server)
            .await;

        let config = ServerConfiguration::new(DatabaseVendor::Couchbase).with_user_database("missing");
        let client =
            CouchbaseClient::with_base_urls(config, mock_server.uri(), mock_server.uri()).unwrap();
        let err = client.list_databases().await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_collections() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pools/default/buckets/travel-sample/scopes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uid": "1",
                "scopes": [
                    {"name": "inventory", "collections": [{"name": "route"}, {"name": "airline"}]},
                    {"name": "_default", "collections": [{"name": "_default"}]}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let collections = client.list_collections("travel-sample").await.unwrap();
        let names: Vec<&str> = collections.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["_default._default", "inventory.airline", "inventory.route"]
        );
    }

    #[tokio::test]
    async fn test_default_query_and_rows() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({
                "statement": "SELECT * FROM `travel-sample` LIMIT 300"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [
                    {"travel-sample": {"type": "airline", "name": "40-Mile Air"}},
                    {"travel-sample": {"type": "airport", "name": "Calais Dunkerque"}}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let result = client
            .execute_query(&travel(), &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.name(), "travel-sample");
        assert_eq!(result.len(), 2);
        assert!(!result.has_errors());
    }

    #[tokio::test]
    async fn test_unnamed_projection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [{"$1": 31591}, 7]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let result = client
            .execute_query(
                &travel(),
                &QueryOptions::default().with_query("SELECT COUNT(*) FROM `travel-sample`"),
            )
            .await
            .unwrap();

        assert_eq!(result.records()[0].names(), vec!["$1"]);
        assert_eq!(result.records()[1].get("$1").unwrap().to_json(), json!(7));
    }

    #[tokio::test]
    async fn test_malformed_statement_is_query_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "fatal",
                "errors": [{"code": 3000, "msg": "syntax error - at FORM"}]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let err = client
            .execute_query(&travel(), &QueryOptions::default().with_query("SELECT * FORM x"))
            .await
            .unwrap_err();

        match err {
            DataError::QueryFailed(message) => assert!(message.contains("syntax error - at FORM")),
            other => panic!("expected QueryFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_errors_next_to_rows_are_partial() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "errors",
                "results": [{"travel-sample": {"name": "40-Mile Air"}}],
                "errors": [{"code": 5010, "msg": "Error evaluating projection"}]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let result = client
            .execute_query(&travel(), &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.has_errors());
        assert_eq!(result.errors()[0].message, "Error evaluating projection");
        assert_eq!(result.errors()[0].code.as_deref(), Some("5010"));
    }

    #[tokio::test]
    async fn test_service_failure_is_query_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let err = client
            .execute_query(&travel(), &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_find_document() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"$id": "airline_10"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [{"cas": 1700000000000_i64, "body": {"name": "40-Mile Air"}}]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"$id": "nope"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": []
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;

        let document = client.find_document(&travel(), "airline_10").await.unwrap().unwrap();
        assert_eq!(document.body, json!({"name": "40-Mile Air"}));
        assert_eq!(document.revision.as_deref(), Some("1700000000000"));

        assert!(client.find_document(&travel(), "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({
                "statement": "UPSERT INTO `travel-sample` (KEY, VALUE) VALUES ($id, $body)",
                "$id": "k1",
                "$body": {"n": 1}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({
                "statement": "DELETE FROM `travel-sample` USE KEYS $id"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": []
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        let document = Document::new("k1", json!({"n": 1}));
        client.update(&travel(), &document).await.unwrap();
        client.update(&travel(), &document).await.unwrap();

        client.delete(&travel(), "k1").await.unwrap();
        client.delete(&travel(), "k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"$id": "locked"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "errors",
                "errors": [{"code": 12009, "msg": "DML Error, possible causes include CAS mismatch"}]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"statement": "DROP COLLECTION `travel-sample`.`inventory`.`route`"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "errors",
                "errors": [{"code": 13014, "msg": "User does not have credentials to run DROP COLLECTION"}]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;

        let err = client
            .update(&travel(), &Document::new("locked", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Conflict(_)));

        let mut bucket = Database::folder("travel-sample");
        let route = bucket.add_collection("inventory.route").unwrap().clone();
        let err = client.drop_collection(&route).await.unwrap_err();
        assert!(matches!(err, DataError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_drop_bucket() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/pools/default/buckets/beer-sample"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/pools/default/buckets/travel-sample"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "Forbidden. User needs the following permissions",
                "permissions": ["cluster.bucket[travel-sample].settings!write"]
            })))
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server).await;
        client.drop_database("beer-sample").await.unwrap();

        let err = client.drop_database("travel-sample").await.unwrap_err();
        assert!(matches!(err, DataError::PermissionDenied(_)));
    }
}
