// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalogue → collection ingest command

use anyhow::Result;
use colored::Colorize;
use std::io::IsTerminal;

use crate::cli::OutputFormat;
use archive_search::catalog::Catalog;
use archive_search::config::Config;
use archive_search::embedding::{create_provider, Collection};
use archive_search::ingest::{sync, SyncOptions};
use archive_search::output::print_json;

/// Run the ingest command
pub fn run(
    config: &Config,
    force: bool,
    quiet: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let catalog = Catalog::open(config.catalog.path())?;
    let mut collection = Collection::open(config.collection.path(), config.collection.name())?;
    let mut provider = create_provider(&config.embeddings)?;

    let options = SyncOptions {
        force,
        progress: !quiet && format == OutputFormat::Text && std::io::stderr().is_terminal(),
    };
    let summary = sync(&catalog, &mut collection, provider.as_mut(), options)?;

    match format {
        OutputFormat::Json => print_json(&summary, compact)?,
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "{} Ingested {} records ({} embedded, {} unchanged, {} removed)",
                    "✓".green(),
                    summary.total.to_string().cyan(),
                    summary.embedded,
                    summary.unchanged,
                    summary.removed
                );
            }
        }
    }

    Ok(())
}
