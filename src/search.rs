// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic search over the record collection.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SearchConfig;
use crate::embedding::{Collection, EmbeddingProvider, QueryResult};
use crate::errors::ArchiveError;
use crate::filters::Filter;

/// Body of a semantic search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Number of neighbours to return
    #[serde(default)]
    pub k: Option<usize>,
    /// Metadata filter, e.g. `{"genre": "Fantasy"}`
    #[serde(default)]
    pub filters: Option<Value>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Validated form of a request
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub text: String,
    pub k: usize,
    pub filter: Option<Filter>,
}

impl PreparedQuery {
    /// Check bounds and parse filters before anything gets embedded.
    pub fn prepare(request: &SearchRequest, limits: &SearchConfig) -> Result<Self, ArchiveError> {
        let text = request.query.trim();
        if text.is_empty() {
            return Err(ArchiveError::EmptyQuery);
        }

        let k = request.k.unwrap_or_else(|| limits.default_k());
        if k == 0 || k > limits.max_k() {
            return Err(ArchiveError::InvalidResultCount {
                requested: k,
                max: limits.max_k(),
            });
        }

        let filter = request.filters.as_ref().map(Filter::parse).transpose()?;

        Ok(Self {
            text: text.to_string(),
            k,
            filter,
        })
    }
}

/// Embed the text of a prepared query.
pub fn embed_query(
    provider: &mut dyn EmbeddingProvider,
    prepared: &PreparedQuery,
) -> Result<Vec<f32>> {
    provider.embed_one(&prepared.text)
}

/// Nearest records to an already embedded query.
pub fn query_embedding(
    collection: &Collection,
    prepared: &PreparedQuery,
    embedding: Vec<f32>,
) -> Result<QueryResult> {
    let result = collection.query(&[embedding], prepared.k, prepared.filter.as_ref())?;
    tracing::debug!(
        query = %prepared.text,
        k = prepared.k,
        hits = result.len(),
        "semantic search"
    );
    Ok(result)
}

/// Embed the query and return its nearest records.
pub fn semantic_search(
    collection: &Collection,
    provider: &mut dyn EmbeddingProvider,
    request: &SearchRequest,
    limits: &SearchConfig,
) -> Result<QueryResult> {
    let prepared = PreparedQuery::prepare(request, limits)?;
    let embedding = embed_query(provider, &prepared)?;
    query_embedding(collection, &prepared, embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, NewRecord};
    use crate::embedding::DummyProvider;
    use crate::ingest::{sync, SyncOptions};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_prepare_defaults_and_bounds() {
        let limits = SearchConfig::default();
        let prepared = PreparedQuery::prepare(&SearchRequest::new("  dune "), &limits).unwrap();
        assert_eq!(prepared.text, "dune");
        assert_eq!(prepared.k, 3);
        assert!(prepared.filter.is_none());

        let err = PreparedQuery::prepare(&SearchRequest::new("dune").with_k(0), &limits).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidResultCount { requested: 0, .. }));

        let err =
            PreparedQuery::prepare(&SearchRequest::new("dune").with_k(101), &limits).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidResultCount { max: 100, .. }));
    }

    #[test]
    fn test_prepare_rejects_blank_query_and_bad_filter() {
        let limits = SearchConfig::default();
        assert!(matches!(
            PreparedQuery::prepare(&SearchRequest::new("   "), &limits),
            Err(ArchiveError::EmptyQuery)
        ));
        let request = SearchRequest::new("x").with_filters(json!({"colour": "red"}));
        assert!(matches!(
            PreparedQuery::prepare(&request, &limits),
            Err(ArchiveError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_request_deserializes_optional_fields() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "ml"}"#).unwrap();
        assert_eq!(request, SearchRequest::new("ml"));
    }

    #[test]
    fn test_exact_document_text_ranks_first() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("archive.db")).unwrap();
        let mut collection =
            Collection::open(dir.path().join("collection.sqlite"), "records_collection").unwrap();
        for (title, genre) in [("Dune", "Fantasy"), ("Calculus", "Math"), ("Emma", "Classics")] {
            catalog
                .insert(&NewRecord {
                    title: title.into(),
                    genre: genre.into(),
                    difficulty: "Beginner".into(),
                    ..Default::default()
                })
                .unwrap();
        }
        let mut provider = DummyProvider::new(32);
        sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();

        let request = SearchRequest::new("Calculus - Beginner - Math").with_k(2);
        let result =
            semantic_search(&collection, &mut provider, &request, &SearchConfig::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.metadatas[0][0].title, "Calculus");
        assert!(result.distances[0][0].abs() < 1e-4);

        let filtered = SearchRequest::new("Calculus - Beginner - Math")
            .with_filters(json!({"genre": {"$ne": "Math"}}));
        let result =
            semantic_search(&collection, &mut provider, &filtered, &SearchConfig::default())
                .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.metadatas[0].iter().all(|m| m.genre != "Math"));
    }

    #[test]
    fn test_query_stage_needs_no_provider() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("archive.db")).unwrap();
        let mut collection =
            Collection::open(dir.path().join("collection.sqlite"), "records_collection").unwrap();
        catalog
            .insert(&NewRecord {
                title: "Emma".into(),
                genre: "Classics".into(),
                difficulty: "Intermediate".into(),
                ..Default::default()
            })
            .unwrap();
        let mut provider = DummyProvider::new(16);
        sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();

        let request = SearchRequest::new("Emma - Intermediate - Classics");
        let limits = SearchConfig::default();
        let expected = semantic_search(&collection, &mut provider, &request, &limits).unwrap();

        let prepared = PreparedQuery::prepare(&request, &limits).unwrap();
        let embedding = embed_query(&mut provider, &prepared).unwrap();
        drop(provider);

        let result = query_embedding(&collection, &prepared, embedding).unwrap();
        assert_eq!(result, expected);
        assert_eq!(result.ids[0], vec!["1"]);
    }
}
