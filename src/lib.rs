// SPDX-License-Identifier: MIT OR Apache-2.0

//! archive-search - semantic search and analytics over a record catalogue
//!
//! Shared modules for the archive-search CLI and HTTP API.

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod filters;
pub mod ingest;
pub mod kmeans;
pub mod output;
pub mod search;
pub mod server;
