// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns record text into vectors and stores them
//!
//! `provider` wraps the sentence encoder; `storage` is the vector collection
//! that serves nearest-neighbour queries over the embedded records.

pub mod provider;
pub mod storage;

pub use provider::{
    create_provider, CommandProvider, DummyProvider, EmbeddingProvider, EmbeddingProviderConfig,
    FastEmbedder,
};
pub use storage::{Collection, CollectionEntry, QueryResult, DEFAULT_EMBEDDING_DIM};
