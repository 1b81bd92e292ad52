// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for archive-search
//!
//! Loads configuration from .archive-search.toml in current directory or
//! ~/.config/archive-search/config.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = ".archive-search.toml";

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// fastembed running all-MiniLM-L6-v2 in-process
    #[default]
    Builtin,
    Command,
    Dummy,
}

/// Catalogue (relational table) configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the SQLite file holding the `archive` table
    pub path: Option<PathBuf>,
}

impl CatalogConfig {
    /// Get catalogue path (defaults to "archive.db")
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from("archive.db"))
    }
}

/// Vector collection configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Path to the SQLite file holding the embeddings
    pub path: Option<PathBuf>,
    /// Collection name recorded in the store metadata
    pub name: Option<String>,
}

impl CollectionConfig {
    /// Get collection path (defaults to ".archive-search/collection.sqlite")
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".archive-search").join("collection.sqlite"))
    }

    /// Get collection name (defaults to "records_collection")
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("records_collection")
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, dummy)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector dimension for the dummy provider
    pub dimension: Option<usize>,
    /// Number of texts sent to the provider at once
    pub batch_size: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "all-MiniLM-L6-v2")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("all-MiniLM-L6-v2")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get dummy dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension.filter(|d| *d > 0).unwrap_or(384)
    }

    /// Get batch size (defaults to 64)
    pub fn batch_size(&self) -> usize {
        self.batch_size.filter(|b| *b > 0).unwrap_or(64)
    }
}

/// Semantic search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when a request does not say
    pub default_k: Option<usize>,
    /// Upper bound on results per request
    pub max_k: Option<usize>,
}

impl SearchConfig {
    /// Get default k (defaults to 3)
    pub fn default_k(&self) -> usize {
        self.default_k.unwrap_or(3)
    }

    /// Get max k (defaults to 100)
    pub fn max_k(&self) -> usize {
        self.max_k.unwrap_or(100)
    }
}

/// Analytics configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub default_clusters: Option<usize>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f32>,
}

impl AnalyticsConfig {
    /// Get default cluster count (defaults to 3)
    pub fn default_clusters(&self) -> usize {
        self.default_clusters.unwrap_or(3)
    }

    /// Get k-means iteration cap (defaults to 300)
    pub fn max_iterations(&self) -> usize {
        self.max_iterations.filter(|m| *m > 0).unwrap_or(300)
    }

    /// Get k-means convergence tolerance (defaults to 1e-4)
    pub fn tolerance(&self) -> f32 {
        self.tolerance
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(1e-4)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Worker threads (defaults to actix-web's choice)
    pub workers: Option<usize>,
    /// Sync the collection from the catalogue before accepting requests
    pub ingest_on_start: Option<bool>,
}

impl ServerConfig {
    /// Get host (defaults to "127.0.0.1")
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    /// Get port (defaults to 5000)
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5000)
    }

    /// Get ingest-on-start (defaults to true)
    pub fn ingest_on_start(&self) -> bool {
        self.ingest_on_start.unwrap_or(true)
    }
}

/// Configuration loaded from .archive-search.toml or
/// ~/.config/archive-search/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub collection: CollectionConfig,
    pub embeddings: EmbeddingConfig,
    pub search: SearchConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .archive-search.toml in current directory
    /// 2. ~/.config/archive-search/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(LOCAL_CONFIG_FILE)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home
                .join(".config")
                .join("archive-search")
                .join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load an explicitly requested file; unlike `load`, a missing or broken
    /// file is an error.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::parse(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Apply CLI path overrides (CLI wins)
    pub fn with_overrides(mut self, db: Option<PathBuf>, store: Option<PathBuf>) -> Self {
        if db.is_some() {
            self.catalog.path = db;
        }
        if store.is_some() {
            self.collection.path = store;
        }
        self
    }
}
