//! Search command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{Searcher, create_backend, create_embedder};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to rank stored records against
    pub query: String,

    /// Maximum number of hits
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    /// Minimum similarity (0.0 to 1.0)
    #[arg(long, short = 't')]
    pub threshold: Option<f32>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,

    /// Table to search (overrides vector_store.table)
    #[arg(long)]
    pub table: Option<String>,
}

impl SearchArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.db_url {
            config.vector_store.url = url.clone();
        }
        if let Some(ref table) = self.table {
            config.vector_store.table = table.clone();
        }
    }
}

/// Open the store and embedder described by `config` behind a [`Searcher`].
pub(crate) async fn open_searcher(config: &Config) -> Result<Searcher> {
    let store = create_backend(&config.vector_store)
        .await
        .context("failed to connect to vector store")?;
    let embedder = create_embedder(&config.embedding).context("failed to load embedder")?;
    Ok(Searcher::new(
        Arc::from(embedder),
        Arc::from(store),
        config.search.clone(),
        config.indexing.source_label.clone(),
    ))
}

pub async fn handle_search(args: SearchArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    args.apply(&mut config);
    let formatter = get_formatter(format);

    let searcher = open_searcher(&config).await?;
    let results = searcher
        .search(&args.query, args.top_k, args.threshold)
        .await
        .context("search failed")?;

    print!("{}", formatter.format_search_results(&results));
    Ok(())
}
