// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic search command

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use crate::cli::OutputFormat;
use archive_search::config::Config;
use archive_search::embedding::{create_provider, Collection};
use archive_search::output::{colorize_detail, colorize_distance, format_record_line, print_json, use_colors};
use archive_search::search::{semantic_search, PreparedQuery, SearchRequest};

/// Run the search command
pub fn run(
    config: &Config,
    query: &str,
    k: Option<usize>,
    filter: Option<&str>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let filters = filter
        .map(|raw| serde_json::from_str::<Value>(raw).context("--filter is not valid JSON"))
        .transpose()?;
    let request = SearchRequest {
        query: query.to_string(),
        k,
        filters,
    };

    // Reject bad input before paying for model start-up.
    PreparedQuery::prepare(&request, &config.search)?;

    let collection = Collection::open(config.collection.path(), config.collection.name())?;
    if collection.count()? == 0 {
        tracing::warn!(
            "collection at {} is empty; run `archive-search ingest` first",
            collection.path().display()
        );
    }

    let mut provider = create_provider(&config.embeddings)?;
    let result = semantic_search(&collection, provider.as_mut(), &request, &config.search)?;

    match format {
        OutputFormat::Json => print_json(&result, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            let hits = result.metadatas.first().into_iter().flatten();
            let distances = result.distances.first().into_iter().flatten();

            if result.is_empty() {
                println!("{} No matches for: {}", "✗".red(), query.yellow());
                return Ok(());
            }

            println!("\n{} Results for: {}\n", "🔍".cyan(), query.yellow());
            for (rank, (record, distance)) in hits.zip(distances).enumerate() {
                println!(
                    "  {:>2}. {}  {}",
                    rank + 1,
                    format_record_line(record, use_color),
                    colorize_distance(*distance, use_color)
                );
                if !record.summary.is_empty() {
                    println!("      {}", colorize_detail(&record.summary, use_color));
                }
            }
            println!();
        }
    }

    Ok(())
}
