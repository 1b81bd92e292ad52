// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalogue lookups: list, show and per-field substring search

use anyhow::Result;
use colored::Colorize;

use crate::cli::OutputFormat;
use archive_search::catalog::{ArchiveRecord, Catalog, SearchField};
use archive_search::config::Config;
use archive_search::errors::ArchiveError;
use archive_search::output::{colorize_detail, format_record_line, print_json, use_colors};

fn print_records(records: &[ArchiveRecord], format: OutputFormat, compact: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(records, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            for record in records {
                println!("{}", format_record_line(record, use_color));
            }
        }
    }
    Ok(())
}

/// Run the list command
pub fn list(config: &Config, format: OutputFormat, compact: bool) -> Result<()> {
    let catalog = Catalog::open(config.catalog.path())?;
    let records = catalog.list_all()?;
    if records.is_empty() && format == OutputFormat::Text {
        println!("{} Catalogue is empty", "✗".red());
        return Ok(());
    }
    print_records(&records, format, compact)
}

/// Run the show command
pub fn show(config: &Config, id: i64, format: OutputFormat, compact: bool) -> Result<()> {
    let catalog = Catalog::open(config.catalog.path())?;
    let record = catalog.get(id)?.ok_or(ArchiveError::NotFound(id))?;

    match format {
        OutputFormat::Json => print_json(&record, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            println!("{}", format_record_line(&record, use_color));
            for (label, value) in [
                ("summary", &record.summary),
                ("file_hash", &record.file_hash),
                ("file_cid", &record.file_cid),
            ] {
                if !value.is_empty() {
                    println!("  {:<10} {}", colorize_detail(label, use_color), value);
                }
            }
        }
    }
    Ok(())
}

/// Run the find command
pub fn find(
    config: &Config,
    field: &str,
    needle: &str,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let field: SearchField = field.parse()?;
    let catalog = Catalog::open(config.catalog.path())?;
    let records = catalog.search_field(field, needle)?;
    if records.is_empty() && format == OutputFormat::Text {
        println!(
            "{} No records with {} containing: {}",
            "✗".red(),
            field,
            needle.yellow()
        );
        return Ok(());
    }
    print_records(&records, format, compact)
}
