use super::connection::{connect, registry};
use clap::Args;
use colored::Colorize;
use nosql_query::{Database, DatabaseServer, ServerConfiguration};
use tracing::info;

#[derive(Args)]
pub struct DatabasesCommand {
    /// Only print database names
    #[arg(long)]
    pub names_only: bool,
}

#[derive(Args)]
pub struct CollectionsCommand {
    /// Database to list
    pub database: String,
}

/// Lines of the explorer tree for discovered databases
fn render_databases(databases: &[Database], names_only: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for database in databases {
        if database.is_folder() {
            lines.push(format!(
                "{} {}",
                database.name().bright_white().bold(),
                format!("({})", database.collections().len()).dimmed()
            ));
        } else {
            lines.push(database.name().bright_white().to_string());
        }

        if names_only {
            continue;
        }
        for collection in database.collections() {
            lines.push(format!("  {}", collection.name().bright_cyan()));
        }
    }

    lines
}

impl DatabasesCommand {
    pub fn execute(self, config: ServerConfiguration) -> anyhow::Result<()> {
        info!("Loading databases from {}", config.connection_string());

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let registry = registry().await;
            let client = connect(&registry, &config).await?;

            let mut server = DatabaseServer::new(config);
            let loaded = server.load(client.as_ref()).await;
            registry.clear_clients().await;
            loaded?;

            if server.databases().is_empty() {
                println!("{}", "No databases found".bright_yellow());
            }
            for line in render_databases(server.databases(), self.names_only) {
                println!("{}", line);
            }
            Ok(())
        })
    }
}

impl CollectionsCommand {
    pub fn execute(self, config: ServerConfiguration) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let registry = registry().await;
            let client = connect(&registry, &config).await?;

            let collections = client.list_collections(&self.database).await;
            registry.clear_clients().await;

            for collection in collections? {
                println!("{}", collection.name());
            }
            Ok(())
        })
    }
}
