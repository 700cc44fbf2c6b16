use clap::Args;
use nosql_query::{ClientRegistry, DatabaseClient, DatabaseVendor, ServerConfiguration};
use nosql_query_couchbase::CouchbaseClientFactory;
use nosql_query_elasticsearch::ElasticsearchClientFactory;
use nosql_query_mongodb::MongoDbClientFactory;
use nosql_query_redis::RedisClientFactory;
use nosql_query_solr::SolrClientFactory;
use std::sync::Arc;
use tracing::debug;

/// Server to talk to, shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Backend type (mongodb, redis, elasticsearch, couchbase, solr)
    #[arg(long, env = "NOSQL_VENDOR", default_value = "mongodb", global = true)]
    pub vendor: String,

    /// Server host
    #[arg(long, env = "NOSQL_HOST", default_value = "localhost", global = true)]
    pub host: String,

    /// Server port, the backend default when omitted
    #[arg(long, env = "NOSQL_PORT", global = true)]
    pub port: Option<u16>,

    /// Username
    #[arg(long, short = 'u', env = "NOSQL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password
    #[arg(long, env = "NOSQL_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Restrict discovery to one database
    #[arg(long, env = "NOSQL_USER_DATABASE", global = true)]
    pub user_database: Option<String>,

    /// Database holding the credentials (MongoDB authSource)
    #[arg(long, env = "NOSQL_AUTH_DATABASE", global = true)]
    pub auth_database: Option<String>,

    /// Connect with TLS
    #[arg(long, env = "NOSQL_TLS", global = true)]
    pub tls: bool,

    /// Backend specific option, repeatable
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE", global = true)]
    pub options: Vec<String>,
}

impl ConnectionArgs {
    pub fn to_configuration(&self) -> anyhow::Result<ServerConfiguration> {
        let vendor: DatabaseVendor = self.vendor.parse()?;

        let mut config = ServerConfiguration::new(vendor).with_host(&self.host);
        config.port = self.port;
        config.username = self.username.clone();
        config.password = self.password.clone();
        config.user_database = self.user_database.clone();
        config.auth_database = self.auth_database.clone();
        config.tls = self.tls;

        for option in &self.options {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Option '{}' is not KEY=VALUE", option))?;
            config = config.with_option(key.trim(), value.trim());
        }

        config.validate()?;
        Ok(config)
    }
}

/// Registry with every backend this binary ships
pub async fn registry() -> ClientRegistry {
    let registry = ClientRegistry::new();
    registry.register_factory(Arc::new(MongoDbClientFactory)).await;
    registry.register_factory(Arc::new(RedisClientFactory)).await;
    registry
        .register_factory(Arc::new(ElasticsearchClientFactory))
        .await;
    registry
        .register_factory(Arc::new(CouchbaseClientFactory))
        .await;
    registry.register_factory(Arc::new(SolrClientFactory)).await;
    registry
}

/// Create the client for `config` and make sure the server answers
pub async fn connect(
    registry: &ClientRegistry,
    config: &ServerConfiguration,
) -> anyhow::Result<Arc<dyn DatabaseClient>> {
    debug!("Connecting to {}", config.connection_string());

    let client = registry.client_for(config).await?;
    client.connect().await?;
    Ok(client)
}
