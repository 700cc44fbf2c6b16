//! nosql - browse and query NoSQL servers from the terminal
//!
//! Wires a server configuration into the client registry, runs one
//! operation and prints the result tree.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    CollectionsCommand, ConnectionArgs, DatabasesCommand, DeleteCommand, GetCommand, QueryCommand,
};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "NOSQL_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "NOSQL_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List databases and their collections
    Databases(DatabasesCommand),
    /// List the collections of one database
    Collections(CollectionsCommand),
    /// Run a query and print the result tree
    Query(QueryCommand),
    /// Fetch one document by id
    Get(GetCommand),
    /// Delete one document by id
    Delete(DeleteCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise apply the log level to
    // our crates and keep driver noise at warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "nosql={level},\
             nosql_cli={level},\
             nosql_query={level},\
             nosql_query_mongodb={level},\
             nosql_query_redis={level},\
             nosql_query_elasticsearch={level},\
             nosql_query_couchbase={level},\
             nosql_query_solr={level},\
             mongodb=warn,\
             redis=warn,\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    let config = cli.connection.to_configuration()?;

    match cli.command {
        Commands::Databases(cmd) => cmd.execute(config),
        Commands::Collections(cmd) => cmd.execute(config),
        Commands::Query(cmd) => cmd.execute(config),
        Commands::Get(cmd) => cmd.execute(config),
        Commands::Delete(cmd) => cmd.execute(config),
    }
}
