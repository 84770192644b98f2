use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::models::Config;
use crate::server::run_server;
use crate::services::{Searcher, create_embedder, create_shared_backend};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on (host:port)
    #[arg(long, env = "SIMPLISEARCH_BIND")]
    pub bind: Option<String>,

    /// Directory holding the served artifacts
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Bytes per streamed chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Also serve POST /api/search and /api/add
    #[arg(long)]
    pub search_api: bool,

    /// PostgreSQL connection URL for the search API
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,
}

impl ServeArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(ref dir) = self.models_dir {
            config.server.models_dir = dir.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.server.chunk_size = chunk_size;
        }
        if self.search_api {
            config.server.search_api = true;
        }
        if let Some(ref url) = self.db_url {
            config.vector_store.url = url.clone();
        }
    }
}

async fn build_searcher(config: &Config) -> Result<Arc<Searcher>> {
    let store = create_shared_backend(&config.vector_store, config.server.api_connections)
        .await
        .context("failed to connect to vector store")?;
    let embedder = create_embedder(&config.embedding).context("failed to load embedder")?;
    Ok(Arc::new(Searcher::new(
        Arc::from(embedder),
        store,
        config.search.clone(),
        config.indexing.source_label.clone(),
    )))
}

pub async fn handle_serve(args: ServeArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    if !config.server.models_dir.is_dir() {
        tracing::warn!(
            models_dir = %config.server.models_dir.display(),
            "models directory does not exist; every artifact request will return 404"
        );
    }

    let searcher = if config.server.search_api {
        Some(build_searcher(&config).await?)
    } else {
        None
    };

    run_server(&config.server, searcher)
        .await
        .with_context(|| format!("model server on {} failed", config.server.bind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_server_config() {
        let args = ServeArgs {
            bind: Some("127.0.0.1:9100".to_string()),
            models_dir: Some(PathBuf::from("/srv/models")),
            chunk_size: Some(4096),
            search_api: true,
            db_url: Some("postgresql://db/search".to_string()),
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.server.bind, "127.0.0.1:9100");
        assert_eq!(config.server.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.server.chunk_size, 4096);
        assert!(config.server.search_api);
        assert_eq!(config.vector_store.url, "postgresql://db/search");
    }

    #[test]
    fn test_search_api_flag_does_not_disable_config() {
        let args = ServeArgs {
            bind: None,
            models_dir: None,
            chunk_size: None,
            search_api: false,
            db_url: None,
        };
        let mut config = Config::default();
        config.server.search_api = true;
        args.apply(&mut config);

        assert!(config.server.search_api);
        assert_eq!(config.vector_store.url, crate::models::DEFAULT_DATABASE_URL);
    }
}
