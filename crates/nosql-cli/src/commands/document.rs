use super::connection::{connect, registry};
use clap::Args;
use colored::Colorize;
use nosql_query::{Document, QueryContext, ServerConfiguration};
use tracing::info;

/// Database, collection and id of one document
#[derive(Args)]
pub struct DocumentTarget {
    /// Database (index, bucket, Redis database number)
    pub database: String,

    /// Document id (Redis key)
    pub id: String,

    /// Collection inside the database
    #[arg(long, short = 'c')]
    pub collection: Option<String>,
}

impl DocumentTarget {
    fn context(&self) -> QueryContext {
        let context = QueryContext::new(&self.database);
        match &self.collection {
            Some(collection) => context.with_collection(collection),
            None => context,
        }
    }
}

#[derive(Args)]
pub struct GetCommand {
    #[command(flatten)]
    pub target: DocumentTarget,
}

#[derive(Args)]
pub struct DeleteCommand {
    #[command(flatten)]
    pub target: DocumentTarget,
}

fn render_document(document: &Document) -> anyhow::Result<String> {
    let mut out = String::new();
    if let Some(revision) = &document.revision {
        out.push_str(&format!("{} {}\n", "revision:".dimmed(), revision));
    }
    out.push_str(&serde_json::to_string_pretty(&document.body)?);
    Ok(out)
}

impl GetCommand {
    pub fn execute(self, config: ServerConfiguration) -> anyhow::Result<()> {
        let context = self.target.context();
        info!("Fetching {} from {}", self.target.id, context);

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let registry = registry().await;
            let client = connect(&registry, &config).await?;

            let found = client.find_document(&context, &self.target.id).await;
            registry.clear_clients().await;

            match found? {
                Some(document) => println!("{}", render_document(&document)?),
                None => {
                    return Err(anyhow::anyhow!(
                        "Document {} not found in {}",
                        self.target.id,
                        context
                    ))
                }
            }
            Ok(())
        })
    }
}

impl DeleteCommand {
    pub fn execute(self, config: ServerConfiguration) -> anyhow::Result<()> {
        let context = self.target.context();
        info!("Deleting {} from {}", self.target.id, context);

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let registry = registry().await;
            let client = connect(&registry, &config).await?;

            let deleted = client.delete(&context, &self.target.id).await;
            registry.clear_clients().await;
            deleted?;

            println!(
                "{} {}",
                "✅ Deleted".bright_green(),
                self.target.id.bright_white().bold()
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_context() {
        let target = DocumentTarget {
            database: "travel-sample".to_string(),
            id: "airline_10".to_string(),
            collection: Some("inventory.airline".to_string()),
        };
        let context = target.context();
        assert_eq!(context.database, "travel-sample");
        assert_eq!(context.collection.as_deref(), Some("inventory.airline"));
    }

    #[test]
    fn test_render_document() {
        colored::control::set_override(false);

        let document = Document::new("k", json!({"name": "a"})).with_revision("5:1");
        let text = render_document(&document).unwrap();
        assert!(text.starts_with("revision: 5:1\n"));
        assert!(text.contains("\"name\": \"a\""));

        let plain = render_document(&Document::new("k", json!(1))).unwrap();
        assert_eq!(plain, "1");
    }
}
