use anyhow::Result;
use clap::Args;

use crate::cli::output::{StatusInfo, get_formatter, redact_url};
use crate::models::{Config, OutputFormat};
use crate::services::create_backend;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,
}

pub async fn handle_status(args: StatusArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Some(url) = args.db_url {
        config.vector_store.url = url;
    }
    let formatter = get_formatter(format);

    let (connected, table_exists, records) = match create_backend(&config.vector_store).await {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let info = if connected {
                store.get_collection_info().await.ok().flatten()
            } else {
                None
            };
            (connected, info.is_some(), info.map_or(0, |i| i.records_count))
        }
        Err(e) => {
            tracing::debug!(error = %e, "vector store unreachable");
            (false, false, 0)
        }
    };

    let status = StatusInfo {
        store_url: redact_url(&config.vector_store.url),
        table: config.vector_store.qualified_table_name(),
        store_connected: connected,
        table_exists,
        records,
        embedding_provider: config.embedding.provider.to_string(),
        models_dir: config.server.models_dir.display().to_string(),
        models_dir_exists: config.server.models_dir.is_dir(),
    };

    print!("{}", formatter.format_status(&status));

    if !connected {
        eprintln!();
        eprintln!("Warning: PostgreSQL not accessible. Check --db-url or DATABASE_URL.");
    } else if !table_exists {
        eprintln!();
        eprintln!(
            "Warning: table '{}' does not exist yet. Create it before indexing.",
            status.table
        );
    }

    Ok(())
}
