//! Index command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{BatchIndexer, create_backend, create_embedder};

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,

    /// Newline-delimited text file, one record per line
    #[arg(long, required = true)]
    pub data_source: PathBuf,

    /// Lines embedded and committed together
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Target table (overrides vector_store.table)
    #[arg(long)]
    pub table: Option<String>,
}

impl IndexArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.db_url {
            config.vector_store.url = url.clone();
        }
        if let Some(ref table) = self.table {
            config.vector_store.table = table.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.indexing.batch_size = batch_size;
        }
    }
}

pub async fn handle_index(
    args: IndexArgs,
    mut config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    args.apply(&mut config);
    let formatter = get_formatter(format);

    let store = create_backend(&config.vector_store)
        .await
        .context("failed to connect to vector store")?;
    let embedder = create_embedder(&config.embedding).context("failed to load embedder")?;

    let pb = if format == OutputFormat::Text {
        ProgressBar::new(0)
    } else {
        ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden())
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})")?
            .progress_chars("#>-"),
    );

    let indexer = BatchIndexer::new(embedder.as_ref(), store.as_ref(), &config.indexing);
    let summary = indexer
        .index_file(&args.data_source, config.indexing.batch_size, &pb)
        .await;
    pb.finish_and_clear();
    let summary = summary?;

    print!("{}", formatter.format_index_summary(&summary, verbose));

    if let Some(ref reason) = summary.aborted {
        anyhow::bail!(
            "indexing aborted at batch {} ({}): {}",
            reason.batch,
            reason.kind,
            reason.message
        );
    }

    Ok(())
}
