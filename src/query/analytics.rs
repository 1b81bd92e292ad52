// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distribution and clustering reports

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;

use crate::cli::{AnalyticsCommands, OutputFormat};
use archive_search::analytics::{cluster_records, difficulty_distribution, genre_distribution};
use archive_search::config::Config;
use archive_search::embedding::Collection;
use archive_search::output::{format_record_line, print_json, use_colors};

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("\n{} {}\n", "📊".cyan(), title.bold());
    let width = counts.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, count) in counts {
        println!("  {:<width$}  {}", key, count.to_string().yellow(), width = width);
    }
    println!();
}

/// Run an analytics report
pub fn run(
    config: &Config,
    report: AnalyticsCommands,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let collection = Collection::open(config.collection.path(), config.collection.name())?;

    match report {
        AnalyticsCommands::Difficulty | AnalyticsCommands::Genre => {
            let (title, counts) = if matches!(report, AnalyticsCommands::Difficulty) {
                ("Records by difficulty", difficulty_distribution(&collection)?)
            } else {
                ("Records by genre", genre_distribution(&collection)?)
            };
            match format {
                OutputFormat::Json => print_json(&counts, compact)?,
                OutputFormat::Text => print_counts(title, &counts),
            }
        }
        AnalyticsCommands::Clusters { n } => {
            let n = n.unwrap_or_else(|| config.analytics.default_clusters());
            let clusters = cluster_records(&collection, n, &config.analytics)?;
            match format {
                OutputFormat::Json => print_json(&clusters, compact)?,
                OutputFormat::Text => {
                    let use_color = use_colors();
                    for (label, members) in &clusters {
                        println!(
                            "\n{} ({} records)",
                            format!("Cluster {}", label).bold(),
                            members.len()
                        );
                        for record in members {
                            println!("  {}", format_record_line(record, use_color));
                        }
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}
