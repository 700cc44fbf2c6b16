use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supported backends. Selects the client factory at configuration time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseVendor {
    MongoDb,
    Redis,
    Elasticsearch,
    Couchbase,
    Solr,
}

impl DatabaseVendor {
    pub const ALL: [DatabaseVendor; 5] = [
        DatabaseVendor::MongoDb,
        DatabaseVendor::Redis,
        DatabaseVendor::Elasticsearch,
        DatabaseVendor::Couchbase,
        DatabaseVendor::Solr,
    ];

    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseVendor::MongoDb => 27017,
            DatabaseVendor::Redis => 6379,
            DatabaseVendor::Elasticsearch => 9200,
            DatabaseVendor::Couchbase => 8091,
            DatabaseVendor::Solr => 8983,
        }
    }

    /// Default "host:port" for a fresh configuration
    pub fn default_url(&self) -> String {
        format!("localhost:{}", self.default_port())
    }
}

impl fmt::Display for DatabaseVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseVendor::MongoDb => write!(f, "mongodb"),
            DatabaseVendor::Redis => write!(f, "redis"),
            DatabaseVendor::Elasticsearch => write!(f, "elasticsearch"),
            DatabaseVendor::Couchbase => write!(f, "couchbase"),
            DatabaseVendor::Solr => write!(f, "solr"),
        }
    }
}

impl FromStr for DatabaseVendor {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(DatabaseVendor::MongoDb),
            "redis" => Ok(DatabaseVendor::Redis),
            "elasticsearch" | "elastic" => Ok(DatabaseVendor::Elasticsearch),
            "couchbase" => Ok(DatabaseVendor::Couchbase),
            "solr" => Ok(DatabaseVendor::Solr),
            other => Err(DataError::invalid_configuration(format!(
                "Unknown database vendor: {}",
                other
            ))),
        }
    }
}

/// Connection parameters for one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    /// Backend type
    pub vendor: DatabaseVendor,
    /// Display label
    pub label: Option<String>,
    /// Host or comma-separated host list
    pub host: String,
    /// Port number; the vendor default when absent
    pub port: Option<u16>,
    /// Username
    pub username: Option<String>,
    /// Password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Restricts discovery to this database
    pub user_database: Option<String>,
    /// Database holding the user's credentials (MongoDB authSource)
    pub auth_database: Option<String>,
    /// Use TLS
    #[serde(default)]
    pub tls: bool,
    /// Additional vendor-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl ServerConfiguration {
    pub fn new(vendor: DatabaseVendor) -> Self {
        Self {
            vendor,
            label: None,
            host: "localhost".to_string(),
            port: None,
            username: None,
            password: None,
            user_database: None,
            auth_database: None,
            tls: false,
            options: HashMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_user_database(mut self, database: impl Into<String>) -> Self {
        self.user_database = Some(database.into());
        self
    }

    pub fn with_auth_database(mut self, database: impl Into<String>) -> Self {
        self.auth_database = Some(database.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.vendor.default_port())
    }

    /// Configured user database, ignoring blank values
    pub fn user_database(&self) -> Option<&str> {
        self.user_database
            .as_deref()
            .map(str::trim)
            .filter(|db| !db.is_empty())
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Credentials pair when a username is set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| (u, self.password.as_deref().unwrap_or("")))
    }

    /// Base URL for REST backends
    pub fn http_base_url(&self, port: u16) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DataError::invalid_configuration("server host is not set"));
        }
        if self.port == Some(0) {
            return Err(DataError::invalid_configuration("port must not be 0"));
        }
        Ok(())
    }

    /// Get connection string for display purposes (without password)
    pub fn connection_string(&self) -> String {
        let mut parts = vec![format!("{}://", self.vendor)];

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            parts.push(format!("{}@", username));
        }

        parts.push(self.host.clone());
        parts.push(format!(":{}", self.port_or_default()));

        if let Some(database) = self.user_database() {
            parts.push(format!("/{}", database));
        }

        parts.join("")
    }

    /// Identity of the server for sharing one client across result views.
    ///
    /// Covers every field a client binds at creation, so a reconfigured
    /// server gets a fresh client. The password only enters as a digest.
    pub fn cache_key(&self) -> String {
        let mut key = self.connection_string();

        if let Some(auth_database) = self.auth_database.as_deref().filter(|db| !db.is_empty()) {
            key.push_str(&format!("?auth={}", auth_database));
        }
        if self.tls {
            key.push_str("?tls");
        }
        if let Some(password) = &self.password {
            let digest = Sha256::digest(password.as_bytes());
            key.push_str(&format!("?pw={}", &hex::encode(digest)[..16]));
        }

        let mut options: Vec<_> = self.options.iter().collect();
        options.sort();
        for (name, value) in options {
            key.push_str(&format!("&{}={}", name, value));
        }

        if let Some(label) = &self.label {
            key.push_str(&format!("#{}", label));
        }
        key
    }
}
