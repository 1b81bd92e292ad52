// SPDX-License-Identifier: MIT OR Apache-2.0

//! archive-search - semantic search over a record catalogue
//!
//! Embeds catalogue records into a local vector collection and serves
//! search and analytics from the command line or over HTTP.

mod cli;
mod indexer;
mod query;

use anyhow::Result;
use archive_search::catalog::NewRecord;
use archive_search::config::Config;
use archive_search::embedding::create_provider;
use archive_search::server::{self, AppState};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ARCHIVE_SEARCH_LOG=debug archive-search search "query"
    let default_level = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ARCHIVE_SEARCH_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_file(path)?,
        None => Config::load(),
    }
    .with_overrides(cli.db, cli.store);
    let format = cli.format;
    let compact = cli.compact;

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_ingest,
        } => {
            let mut config = config;
            if host.is_some() {
                config.server.host = host;
            }
            if port.is_some() {
                config.server.port = port;
            }
            if no_ingest {
                config.server.ingest_on_start = Some(false);
            }
            let provider = create_provider(&config.embeddings)?;
            server::serve(AppState::new(config, provider))?;
        }
        Commands::Ingest { force, quiet } => {
            indexer::ingest::run(&config, force, quiet, format, compact)?;
        }
        Commands::Search { query, k, filter } => {
            query::search::run(&config, &query, k, filter.as_deref(), format, compact)?;
        }
        Commands::List => {
            query::records::list(&config, format, compact)?;
        }
        Commands::Show { id } => {
            query::records::show(&config, id, format, compact)?;
        }
        Commands::Find { field, needle } => {
            query::records::find(&config, &field, &needle, format, compact)?;
        }
        Commands::Add {
            title,
            genre,
            difficulty,
            summary,
            file,
            file_hash,
            cid,
        } => {
            let record = NewRecord {
                genre,
                title,
                difficulty,
                summary,
                file_hash: file_hash.unwrap_or_default(),
                file_cid: cid.unwrap_or_default(),
            };
            indexer::add::run(&config, record, file.as_deref(), format, compact)?;
        }
        Commands::Analytics { report } => {
            query::analytics::run(&config, report, format, compact)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "archive-search", &mut std::io::stdout());
        }
    }

    Ok(())
}
