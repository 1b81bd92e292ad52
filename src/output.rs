// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::catalog::ArchiveRecord;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a value as JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

/// Colorize record id (yellow)
pub fn colorize_id(id: i64, use_color: bool) -> String {
    let text = format!("#{}", id);
    if use_color {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Colorize record title (bold)
pub fn colorize_title(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize genre and difficulty tags (green)
pub fn colorize_tag(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a cosine distance (cyan)
pub fn colorize_distance(distance: f32, use_color: bool) -> String {
    let text = format!("{:.4}", distance);
    if use_color {
        text.cyan().to_string()
    } else {
        text
    }
}

/// Colorize secondary details (dimmed)
pub fn colorize_detail(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// One-line summary of a record: `#id title [genre/difficulty]`
pub fn format_record_line(record: &ArchiveRecord, use_color: bool) -> String {
    format!(
        "{} {} [{}/{}]",
        colorize_id(record.id, use_color),
        colorize_title(&record.title, use_color),
        colorize_tag(&record.genre, use_color),
        colorize_tag(&record.difficulty, use_color)
    )
}
