// SPDX-License-Identifier: MIT OR Apache-2.0

//! Add a record to the catalogue and embed it

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::cli::OutputFormat;
use archive_search::catalog::{Catalog, NewRecord};
use archive_search::config::Config;
use archive_search::embedding::{create_provider, Collection};
use archive_search::ingest::add_record;
use archive_search::output::{format_record_line, print_json, use_colors};

/// blake3 hex digest of a file's contents
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Run the add command
pub fn run(
    config: &Config,
    mut record: NewRecord,
    file: Option<&Path>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    if let Some(path) = file {
        record.file_hash = hash_file(path)?;
    }

    let catalog = Catalog::open(config.catalog.path())?;
    let mut collection = Collection::open(config.collection.path(), config.collection.name())?;
    let mut provider = create_provider(&config.embeddings)?;
    let record = add_record(&catalog, &mut collection, provider.as_mut(), record)?;

    match format {
        OutputFormat::Json => print_json(&record, compact)?,
        OutputFormat::Text => {
            println!(
                "{} Added {}",
                "✓".green(),
                format_record_line(&record, use_colors())
            );
        }
    }
    Ok(())
}
