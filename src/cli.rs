// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// archive-search - semantic search over a record catalogue
///
/// Embeds catalogue records with a sentence-encoding model, answers
/// nearest-neighbour queries, and serves search and analytics over HTTP.
#[derive(Parser, Debug)]
#[command(name = "archive-search")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .archive-search.toml, then ~/.config/archive-search/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalogue database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Vector collection path
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Aggregate reports
#[derive(Subcommand, Debug)]
pub enum AnalyticsCommands {
    /// Record count per difficulty level
    Difficulty,

    /// Record count per genre
    Genre,

    /// Group records into k-means clusters over their embeddings
    Clusters {
        /// Number of clusters
        #[arg(short = 'n', long)]
        n: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip syncing the collection before serving
        #[arg(long)]
        no_ingest: bool,
    },

    /// Embed catalogue records into the vector collection
    Ingest {
        /// Drop stored vectors and re-embed everything
        #[arg(short, long)]
        force: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Semantic search over embedded records
    #[command(visible_alias = "s")]
    Search {
        /// Natural-language query
        query: String,

        /// Number of results
        #[arg(short = 'k', long = "top-k")]
        k: Option<usize>,

        /// Metadata filter as JSON, e.g. '{"genre": "Fantasy"}'
        #[arg(long)]
        filter: Option<String>,
    },

    /// List every catalogue record
    List,

    /// Show one record
    Show {
        /// Record id
        id: i64,
    },

    /// Substring search on a single catalogue field
    Find {
        /// Field: genre, title, difficulty, summary, file_hash or file_cid
        field: String,

        /// Text to look for
        needle: String,
    },

    /// Add a record to the catalogue and embed it
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        genre: String,

        #[arg(long)]
        difficulty: String,

        #[arg(long, default_value = "")]
        summary: String,

        /// File to hash with blake3 for the record's file_hash
        #[arg(long, conflicts_with = "file_hash")]
        file: Option<PathBuf>,

        /// Precomputed content hash
        #[arg(long)]
        file_hash: Option<String>,

        /// Content identifier of the stored file
        #[arg(long)]
        cid: Option<String>,
    },

    /// Aggregate reports over the collection
    Analytics {
        #[command(subcommand)]
        report: AnalyticsCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
