//! Solr implementation of the nosql-query DatabaseClient trait
//!
//! Talks to the HTTP API with `reqwest`.
//!
//! ## Hierarchy
//!
//! - Cores (leaves, no collections below them)
//!
//! ## Queries
//!
//! Plain query text is sent as the `q` parameter of `/select`; text starting
//! with `{` is a JSON Request API body. Facets come back as an extra record,
//! and a search cut short by `timeAllowed` reports a partial error next to
//! the documents it did return.

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

/// Field Solr uses for optimistic concurrency
const VERSION_FIELD: &str = "_version_";

#[derive(Debug, Deserialize)]
struct CoreStatus {
    #[serde(default)]
    status: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DocList {
    #[serde(default)]
    docs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    #[serde(rename = "responseHeader", default)]
    header: Value,
    #[serde(default)]
    response: DocList,
    facet_counts: Option<Value>,
    facets: Option<Value>,
}

/// Solr client implementation
pub struct SolrClient {
    client: Client,
    config: ServerConfiguration,
    base_url: String,
}

impl SolrClient {
    pub fn new(config: ServerConfiguration) -> Result<Self> {
        let base_url = match config.option("url") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}/solr", config.http_base_url(config.port_or_default())),
        };
        Self::with_base_url(config, base_url)
    }

    /// Create a client for an explicit base URL, including the `/solr` context path
    pub fn with_base_url(config: ServerConfiguration, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DataError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        debug!("Creating Solr client for {}", config.connection_string());

        Ok(Self {
            client,
            config,
            base_url: base_url.into(),
        })
    }

    /// Send a request; transport failures are connection failures
    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Solr request: {} {}", method, path);

        let mut request = self.client.request(method, &url).query(&[("wt", "json")]);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some((username, password)) = self.config.credentials() {
            request = request.basic_auth(username, Some(password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            error!("Solr request {} failed: {}", path, e);
            DataError::ConnectionFailed(format!("Request to {} failed: {}", url, e))
        })
    }

    /// Read a JSON body, mapping non-success statuses through `fallback`.
    /// An unknown core answers 404.
    async fn read_json(
        response: reqwest::Response,
        fallback: fn(String) -> DataError,
    ) -> Result<Value> {
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            DataError::ConnectionFailed(format!("Failed to read response: {}", e))
        })?;

        if status == StatusCode::NOT_FOUND {
            error!("Solr returned {}: {}", status, text);
            return Err(DataError::not_found(error_message(&text)));
        }
        if !status.is_success() {
            error!("Solr returned {}: {}", status, text);
            return Err(DataError::from_http_status(
                status.as_u16(),
                error_message(&text),
                fallback,
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            DataError::SerializationError(format!("Failed to parse response: {} - Body: {}", e, text))
        })
    }

    fn core_path(core: &str, handler: &str) -> String {
        format!("/{}/{}", urlencoding::encode(core), handler)
    }

    async fn cores(&self) -> Result<Vec<String>> {
        let response = self
            .send(
                Method::GET,
                "/admin/cores",
                &[("action", "STATUS".to_string())],
                None,
            )
            .await?;
        let body = Self::read_json(response, DataError::ConnectionFailed).await?;

        let status: CoreStatus = serde_json::from_value(body)?;
        let mut names: Vec<String> = status.status.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn post_update(&self, core: &str, body: &Value) -> Result<Value> {
        let response = self
            .send(
                Method::POST,
                &Self::core_path(core, "update"),
                &[("commit", "true".to_string())],
                Some(body),
            )
            .await?;
        Self::read_json(response, DataError::WriteFailed).await
    }
}

/// Readable message of an error body: `error.msg` when present
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| {
            body.pointer("/error/msg")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string())
}

/// Request of one select: URL parameters, or a JSON Request API body
#[derive(Debug, PartialEq)]
enum SelectRequest {
    Params(Vec<(&'static str, String)>),
    Json(Value),
}

fn select_request(options: &QueryOptions) -> Result<SelectRequest> {
    match options.query_text() {
        Some(text) if text.starts_with('{') => {
            let mut body: Value = serde_json::from_str(text)
                .map_err(|e| DataError::QueryFailed(format!("Invalid query JSON: {}", e)))?;
            let object = body.as_object_mut().ok_or_else(|| {
                DataError::QueryFailed("Query must be a JSON object".to_string())
            })?;
            if options.limit > 0 && !object.contains_key("limit") {
                object.insert("limit".to_string(), json!(options.limit));
            }
            if let Some(ms) = options.timeout_ms {
                let params = object
                    .entry("params")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Some(params) = params.as_object_mut() {
                    params.entry("timeAllowed").or_insert(json!(ms));
                }
            }
            Ok(SelectRequest::Json(body))
        }
        text => {
            let mut params = vec![("q", text.unwrap_or("*:*").to_string())];
            if options.limit > 0 {
                params.push(("rows", options.limit.to_string()));
            }
            if let Some(ms) = options.timeout_ms {
                params.push(("timeAllowed", ms.to_string()));
            }
            Ok(SelectRequest::Params(params))
        }
    }
}

/// Split a stored document into its body and `_version_` revision
fn split_version(mut doc: Value) -> (Value, Option<String>) {
    let revision = doc
        .as_object_mut()
        .and_then(|fields| fields.remove(VERSION_FIELD))
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });
    (doc, revision)
}

/// Body of an add: the document fields with `id` and the expected version
fn update_body(document: &Document) -> Result<Value> {
    let Value::Object(mut fields) = document.body.clone() else {
        return Err(DataError::WriteFailed(format!(
            "Document {} must be a JSON object",
            document.id
        )));
    };
    fields.insert("id".to_string(), json!(document.id));
    fields.remove(VERSION_FIELD);
    if let Some(revision) = &document.revision {
        let version = revision
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| json!(revision));
        fields.insert(VERSION_FIELD.to_string(), version);
    }
    Ok(Value::Array(vec![Value::Object(fields)]))
}

#[async_trait]
impl DatabaseClient for SolrClient {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::Solr
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Document,
            Capability::TextSearch,
            Capability::DocumentEdit,
        ]
    }

    async fn connect(&self) -> Result<()> {
        let cores = self.cores().await?;
        debug!("Connected to Solr with {} cores", cores.len());
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<Database>> {
        if let Some(core) = self.config.user_database() {
            debug!("Restricting Solr discovery to core {}", core);
            return Ok(vec![Database::new(core)]);
        }

        debug!("Listing Solr cores");
        let cores = self.cores().await?;
        debug!("Found {} cores", cores.len());
        Ok(cores.into_iter().map(Database::new).collect())
    }

    async fn list_collections(&self, _database: &str) -> Result<Vec<Collection>> {
        Ok(Vec::new())
    }

    async fn execute_query(
        &self,
        context: &QueryContext,
        options: &QueryOptions,
    ) -> Result<SearchResult> {
        let path = Self::core_path(&context.database, "select");
        debug!("Running Solr select on {}", context);

        let response = match select_request(options)? {
            SelectRequest::Params(params) => self.send(Method::GET, &path, &params, None).await?,
            SelectRequest::Json(body) => self.send(Method::POST, &path, &[], Some(&body)).await?,
        };
        let body = Self::read_json(response, DataError::QueryFailed).await?;
        let response: SelectResponse = serde_json::from_value(body)?;

        let mut result = SearchResult::new(context.target_name());
        result.add_all(
            response
                .response
                .docs
                .into_iter()
                .map(|doc| JsonObjectWrapper::from_value(doc, "value").into_record()),
        );

        for (name, facets) in [("facet_counts", response.facet_counts), ("facets", response.facets)] {
            if let Some(facets) = facets {
                let mut fields = Map::new();
                fields.insert(name.to_string(), facets);
                result.add(JsonObjectWrapper::new(fields).into_record());
            }
        }

        if response.header.get("partialResults") == Some(&Value::Bool(true)) {
            warn!("Solr query on {} returned partial results", context);
            result.add_errors(vec![RecordError::new("search hit its time limit")
                .with_code("partialResults")
                .with_raw(response.header.clone())]);
        }

        debug!("Solr query on {} returned {} records", context, result.len());
        Ok(result)
    }

    async fn find_document(&self, context: &QueryContext, id: &str) -> Result<Option<Document>> {
        debug!("Fetching document {} from {}", id, context);

        let response = self
            .send(
                Method::GET,
                &Self::core_path(&context.database, "get"),
                &[("id", id.to_string())],
                None,
            )
            .await?;
        let body = Self::read_json(response, DataError::QueryFailed).await?;

        Ok(match body.get("doc") {
            Some(doc) if !doc.is_null() => {
                let (body, revision) = split_version(doc.clone());
                let document = Document::new(id, body);
                Some(match revision {
                    Some(revision) => document.with_revision(revision),
                    None => document,
                })
            }
            _ => None,
        })
    }

    async fn update(&self, context: &QueryContext, document: &Document) -> Result<()> {
        debug!("Adding document {} to {}", document.id, context);

        let body = update_body(document)?;
        match self.post_update(&context.database, &body).await {
            Ok(_) => Ok(()),
            Err(DataError::Conflict(message)) => {
                warn!("Version conflict on document {}", document.id);
                Err(DataError::Conflict(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, context: &QueryContext, id: &str) -> Result<()> {
        // Delete by id succeeds whether or not the document exists
        self.post_update(&context.database, &json!({ "delete": { "id": id } }))
            .await?;
        debug!("Deleted document {} from {}", id, context);
        Ok(())
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<()> {
        Err(DataError::operation_not_supported(format!(
            "Solr cores have no collections: {}",
            collection
        )))
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        debug!("Unloading core {} and deleting its index", database);

        let response = self
            .send(
                Method::GET,
                "/admin/cores",
                &[
                    ("action", "UNLOAD".to_string()),
                    ("core", database.to_string()),
                    ("deleteIndex", "true".to_string()),
                ],
                None,
            )
            .await?;
        Self::read_json(response, DataError::WriteFailed).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing Solr client");
        Ok(())
    }
}

/// Factory registered for [`DatabaseVendor::Solr`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SolrClientFactory;

#[async_trait]
impl DatabaseClientFactory for SolrClientFactory {
    fn vendor(&self) -> DatabaseVendor {
        DatabaseVendor::Solr
    }

    async fn create_client(
        &self,
        config: ServerConfiguration,
    ) -> Result<Arc<dyn DatabaseClient>> {
        Ok(Arc::new(SolrClient::new(config)?))
    }
}
