//! CLI module for simplisearch.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Batch embedding indexer and model artifact server.
#[derive(Debug, Parser)]
#[command(name = "simplisearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "SIMPLISEARCH_CONFIG",
        help = "Path to a config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed a newline-delimited text file into the vector table
    Index(commands::IndexArgs),

    /// Rank indexed records by similarity to a query
    Search(commands::SearchArgs),

    /// Embed and store a single record
    Add(commands::AddArgs),

    /// Serve model artifacts over HTTP with byte-range support
    Serve(commands::ServeArgs),

    /// Check vector store connectivity and record count
    Status(commands::StatusArgs),
}
