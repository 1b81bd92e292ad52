// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain errors that callers need to tell apart.
//!
//! Most library functions return `anyhow::Result`; these variants travel
//! inside the `anyhow::Error` and are recovered with `downcast_ref` where the
//! distinction matters (HTTP status codes, CLI exit messages).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No catalogue record with this id
    #[error("Record not found: {0}")]
    NotFound(i64),

    /// Column is not in the searchable whitelist
    #[error("field '{0}' is not searchable")]
    UnsearchableField(String),

    /// Malformed `where` filter
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Cluster count outside `1..=entries`
    #[error("Invalid cluster count {requested}: collection holds {available} entries")]
    InvalidClusterCount { requested: usize, available: usize },

    /// Result count outside `1..=max`
    #[error("Invalid result count {requested}: must be between 1 and {max}")]
    InvalidResultCount { requested: usize, max: usize },

    /// Search query was blank
    #[error("Query must not be empty")]
    EmptyQuery,

    /// Required request parameter was absent or blank
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Vector length differs from the collection's dimension
    #[error("Embedding dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider failed or returned the wrong number of vectors
    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl ArchiveError {
    /// Create an invalid filter error
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Whether the error was caused by bad caller input rather than a failure
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Embedding(_) | Self::DimensionMismatch { .. })
    }
}
