use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use simplisearch::cli::commands::{
    handle_add, handle_index, handle_search, handle_serve, handle_status,
};
use simplisearch::cli::{Cli, Commands};
use simplisearch::models::Config;
use simplisearch::server::shutdown_signal;

/// Detect ONNX Runtime library path and set ORT_DYLIB_PATH if not already set.
/// Must be called before any ort code runs.
fn detect_and_set_ort_path() {
    if std::env::var("ORT_DYLIB_PATH")
        .map(|p| Path::new(&p).exists())
        .unwrap_or(false)
    {
        return;
    }

    let home = std::env::var("HOME").unwrap_or_default();

    let found = if cfg!(target_os = "macos") {
        [
            format!("{home}/.local/lib/simplisearch/libonnxruntime.dylib"),
            "/opt/homebrew/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
            "/usr/local/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else if cfg!(target_os = "linux") {
        [
            format!("{home}/.local/lib/simplisearch/libonnxruntime.so"),
            "/usr/lib/libonnxruntime.so".into(),
            "/usr/local/lib/libonnxruntime.so".into(),
            "/usr/lib/x86_64-linux-gnu/libonnxruntime.so".into(),
            "/usr/lib/aarch64-linux-gnu/libonnxruntime.so".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else {
        None
    };

    if let Some(path) = found {
        // SAFETY: runs first in main, before any task reads the environment.
        unsafe {
            std::env::set_var("ORT_DYLIB_PATH", path);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info,sqlx=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    detect_and_set_ort_path();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let format = cli.format.unwrap_or_default();
    let verbose = cli.verbose;

    match cli.command {
        // the server installs its own graceful shutdown
        Commands::Serve(args) => handle_serve(args, config).await,
        Commands::Index(args) => {
            tokio::select! {
                result = handle_index(args, config, format, verbose) => result,
                _ = shutdown_signal() => {
                    tracing::warn!("interrupted; the uncommitted batch is discarded");
                    anyhow::bail!("indexing interrupted")
                }
            }
        }
        Commands::Search(args) => handle_search(args, config, format).await,
        Commands::Add(args) => handle_add(args, config, format).await,
        Commands::Status(args) => handle_status(args, config, format).await,
    }
}
