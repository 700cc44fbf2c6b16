use super::connection::{connect, registry};
use clap::Args;
use colored::Colorize;
use nosql_query::{
    DatabaseElement, Descriptor, QueryContext, QueryOptions, QueryOutcome, ResultTree,
    ResultView, SearchResult, ServerConfiguration, TypeIcon, ValueKind,
};
use tracing::{debug, info};

#[derive(Args)]
pub struct QueryCommand {
    /// Database (index, bucket, Redis database number)
    pub database: String,

    /// Query text in the backend's own language
    pub query: Option<String>,

    /// Collection inside the database
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Maximum number of records
    #[arg(long, default_value_t = QueryOptions::DEFAULT_LIMIT)]
    pub limit: usize,

    /// Query timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the records as JSON instead of a tree
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,
}

fn paint(text: String, kind: Option<&ValueKind>) -> String {
    match kind {
        Some(ValueKind::String) => text.green().to_string(),
        Some(ValueKind::Number) => text.yellow().to_string(),
        Some(ValueKind::Boolean) => text.magenta().to_string(),
        Some(ValueKind::Date) => text.blue().to_string(),
        Some(ValueKind::Default) => text.dimmed().to_string(),
        Some(ValueKind::Typed(TypeIcon::Other(_))) => text.bright_black().to_string(),
        Some(ValueKind::Typed(_)) | None => text,
    }
}

/// One line per tree node, children indented under their parent
pub fn render_tree(tree: &ResultTree) -> Vec<String> {
    let mut lines = Vec::with_capacity(tree.len());

    for (id, depth) in tree.walk() {
        let Some(node) = tree.get(id) else {
            continue;
        };
        let descriptor = node.descriptor();
        let indent = "  ".repeat(depth);
        let key = descriptor.formatted_key();

        let line = match descriptor.kind() {
            None => key.bright_white().bold().to_string(),
            Some(ValueKind::Typed(TypeIcon::Object)) => {
                format!("{}{} {{{}}}", indent, key.bright_cyan(), node.children().len())
            }
            Some(ValueKind::Typed(TypeIcon::Array)) => {
                format!("{}{} [{}]", indent, key.bright_cyan(), node.children().len())
            }
            kind => format!(
                "{}{}: {}",
                indent,
                key.bright_cyan(),
                paint(descriptor.formatted_value(), kind)
            ),
        };
        lines.push(line);
    }

    lines
}

fn render_errors(result: &SearchResult) -> Vec<String> {
    result
        .errors()
        .iter()
        .map(|e| format!("{} {}", "error:".bright_red().bold(), e))
        .collect()
}

fn records_json(result: &SearchResult) -> serde_json::Value {
    serde_json::Value::Array(
        result
            .records()
            .iter()
            .map(|record| DatabaseElement::record(record.clone()).to_json())
            .collect(),
    )
}

impl QueryCommand {
    pub fn execute(self, config: ServerConfiguration) -> anyhow::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }

        let mut context = QueryContext::new(&self.database);
        if let Some(collection) = &self.collection {
            context = context.with_collection(collection);
        }

        let mut options = QueryOptions::default().with_limit(self.limit);
        if let Some(query) = &self.query {
            options = options.with_query(query);
        }
        if self.timeout_ms.is_some() {
            options.timeout_ms = self.timeout_ms;
        }

        info!("Querying {} on {}", context, config.connection_string());

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let registry = registry().await;
            let client = connect(&registry, &config).await?;

            let view = ResultView::new(client, context);
            let outcome = view.execute_query(options).wait().await;
            let snapshot = view.snapshot();
            view.close();
            registry.clear_clients().await;

            let result = match outcome? {
                QueryOutcome::Applied(result) => result,
                QueryOutcome::Superseded => {
                    debug!("Query was superseded before it finished");
                    return Ok(());
                }
            };

            if self.json {
                println!("{}", serde_json::to_string_pretty(&records_json(&result))?);
            } else if let Some(displayed) = snapshot.displayed {
                for line in render_tree(&displayed.tree) {
                    println!("{}", line);
                }
                println!("{}", format!("{} record(s)", result.len()).dimmed());
            }

            for line in render_errors(&result) {
                eprintln!("{}", line);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosql_query::{build_tree, DatabaseNodeDescriptorFactory, JsonObjectWrapper, RecordError};
    use serde_json::json;

    fn result() -> SearchResult {
        let mut result = SearchResult::new("orders");
        result.add(
            JsonObjectWrapper::from_value(
                json!({"id": 7, "paid": true, "tags": ["a", "b"], "note": null}),
                "value",
            )
            .into_record(),
        );
        result.add_errors(vec![RecordError::new("shard 2 timed out").with_code("timeout")]);
        result
    }

    #[test]
    fn test_render_tree() {
        colored::control::set_override(false);

        let tree = build_tree(&result(), &DatabaseNodeDescriptorFactory);
        let lines = render_tree(&tree);

        assert_eq!(
            lines,
            vec![
                "results of 'orders'",
                "  id: 7",
                "  paid: true",
                "  tags [2]",
                "    [0]: \"a\"",
                "    [1]: \"b\"",
                "  note: null",
            ]
        );
    }

    #[test]
    fn test_render_errors_and_json() {
        colored::control::set_override(false);

        let result = result();
        let errors = render_errors(&result);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("error: "));
        assert!(errors[0].contains("shard 2 timed out"));

        let records = records_json(&result);
        assert_eq!(records[0]["tags"], json!(["a", "b"]));
    }
}
