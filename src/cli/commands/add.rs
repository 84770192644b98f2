//! Add command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};

use crate::cli::commands::search::open_searcher;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Record key; an existing record with this key is replaced
    #[arg(long)]
    pub key: String,

    /// Text to embed and store
    #[arg(long)]
    pub text: String,

    /// Extra metadata as a JSON object
    #[arg(long, value_parser = parse_metadata)]
    pub metadata: Option<Map<String, Value>>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,

    /// Target table (overrides vector_store.table)
    #[arg(long)]
    pub table: Option<String>,
}

fn parse_metadata(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("metadata must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid metadata JSON: {}", e)),
    }
}

impl AddArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.db_url {
            config.vector_store.url = url.clone();
        }
        if let Some(ref table) = self.table {
            config.vector_store.table = table.clone();
        }
    }
}

pub async fn handle_add(args: AddArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    args.apply(&mut config);
    let formatter = get_formatter(format);

    let searcher = open_searcher(&config).await?;
    searcher
        .add(&args.key, &args.text, args.metadata.unwrap_or_default())
        .await
        .with_context(|| format!("failed to add {}", args.key))?;

    print!("{}", formatter.format_message(&format!("Added {}", args.key.trim())));
    Ok(())
}
