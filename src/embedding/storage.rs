// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector collection for archive records.
//!
//! Each entry pairs a record's embedding with its document text and the
//! record metadata. Queries are brute-force cosine distance over every
//! stored vector, which is exact and fast enough for catalogue-sized data.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::ArchiveRecord;
use crate::errors::ArchiveError;
use crate::filters::Filter;

/// Embedding dimension of sentence-transformers/all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

const SCHEMA_VERSION: &str = "1";
const ENTRY_COLUMNS: &str = "record_id, document, genre, title, difficulty, summary, \
                             file_hash, file_cid, content_hash, embedding";

/// One embedded record.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    /// Catalogue record id
    pub id: i64,
    /// Text that was embedded
    pub document: String,
    pub metadata: ArchiveRecord,
    pub embedding: Vec<f32>,
    /// Hash of the embedded content for change detection
    pub content_hash: String,
}

/// Nearest-neighbour results, one inner list per query embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<ArchiveRecord>>,
    /// Cosine distance (`1 - cosine similarity`), ascending
    pub distances: Vec<Vec<f32>>,
}

impl QueryResult {
    /// Number of hits for the first query
    pub fn len(&self) -> usize {
        self.ids.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Persistent vector collection.
///
/// Stores entries in `.archive-search/collection.sqlite` by default.
pub struct Collection {
    conn: Connection,
    path: PathBuf,
    name: String,
}

impl Collection {
    /// Opens or creates the collection at the specified path.
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open collection: {}", path.display()))?;

        let collection = Self {
            conn,
            path,
            name: name.to_string(),
        };
        collection.init_schema()?;
        Ok(collection)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS record_embeddings (
                record_id INTEGER PRIMARY KEY,
                document TEXT NOT NULL,
                genre TEXT NOT NULL,
                title TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                summary TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                file_cid TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
            )
            .context("Failed to initialize collection schema")?;

        self.set_meta_if_absent("schema_version", SCHEMA_VERSION)?;
        self.set_meta_if_absent("collection", &self.name)?;
        self.set_meta_if_absent("space", "cosine")?;
        Ok(())
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model that produced the stored vectors, if any were written.
    pub fn model(&self) -> Result<Option<String>> {
        self.get_meta("model")
    }

    pub fn set_model(&self, model: &str) -> Result<()> {
        self.set_meta("model", model)
    }

    /// Vector dimension fixed by the first upsert.
    pub fn dimension(&self) -> Result<Option<usize>> {
        match self.get_meta("dimension")? {
            Some(raw) => Ok(Some(
                raw.parse()
                    .with_context(|| format!("Corrupt dimension in meta: {}", raw))?,
            )),
            None => Ok(None),
        }
    }

    /// Inserts or replaces entries in a single transaction.
    pub fn upsert(&mut self, entries: &[CollectionEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let expected = match self.dimension()? {
            Some(dim) => dim,
            None => entries[0].embedding.len(),
        };
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
            bail!(ArchiveError::DimensionMismatch {
                expected,
                actual: bad.embedding.len(),
            });
        }

        let created_at = unix_now();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO record_embeddings (
                    record_id, document, genre, title, difficulty, summary,
                    file_hash, file_cid, content_hash, embedding, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(record_id) DO UPDATE SET
                    document = excluded.document,
                    genre = excluded.genre,
                    title = excluded.title,
                    difficulty = excluded.difficulty,
                    summary = excluded.summary,
                    file_hash = excluded.file_hash,
                    file_cid = excluded.file_cid,
                    content_hash = excluded.content_hash,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )?;

            for entry in entries {
                let meta = &entry.metadata;
                stmt.execute(params![
                    entry.id,
                    entry.document,
                    meta.genre,
                    meta.title,
                    meta.difficulty,
                    meta.summary,
                    meta.file_hash,
                    meta.file_cid,
                    entry.content_hash,
                    embedding_to_blob(&entry.embedding),
                    created_at
                ])?;
            }
        }
        tx.execute(
            r#"
            INSERT INTO meta (key, value) VALUES ('dimension', ?1)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![expected.to_string()],
        )?;
        tx.commit()?;

        tracing::debug!(count = entries.len(), "upserted collection entries");
        Ok(())
    }

    /// Every entry, ordered by record id.
    pub fn get_all(&self) -> Result<Vec<CollectionEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM record_embeddings ORDER BY record_id"
        ))?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read collection")?;
        Ok(entries)
    }

    /// Retrieves one entry by record id.
    pub fn get(&self, id: i64) -> Result<Option<CollectionEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM record_embeddings WHERE record_id = ?1"),
                params![id],
                row_to_entry,
            )
            .optional()
            .context("Failed to query collection entry")?;
        Ok(entry)
    }

    /// Metadata of every entry without decoding embeddings.
    pub fn metadatas(&self) -> Result<Vec<ArchiveRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT record_id, genre, title, difficulty, summary, file_hash, file_cid
            FROM record_embeddings
            ORDER BY record_id
            "#,
        )?;
        let metadatas = stmt
            .query_map([], |row| {
                Ok(ArchiveRecord {
                    id: row.get(0)?,
                    genre: row.get(1)?,
                    title: row.get(2)?,
                    difficulty: row.get(3)?,
                    summary: row.get(4)?,
                    file_hash: row.get(5)?,
                    file_cid: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read collection metadata")?;
        Ok(metadatas)
    }

    /// Content hash per record id, for incremental sync.
    pub fn content_hashes(&self) -> Result<HashMap<i64, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record_id, content_hash FROM record_embeddings")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Nearest neighbours for each query embedding.
    ///
    /// Entries failing `filter` are skipped before ranking. Equal distances
    /// are ordered by record id.
    pub fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<QueryResult> {
        let entries: Vec<CollectionEntry> = self
            .get_all()?
            .into_iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .collect();

        if let Some(dim) = self.dimension()? {
            if let Some(query) = query_embeddings.iter().find(|q| q.len() != dim) {
                bail!(ArchiveError::DimensionMismatch {
                    expected: dim,
                    actual: query.len(),
                });
            }
        }

        let mut result = QueryResult::default();
        for query in query_embeddings {
            let mut scored: Vec<(f32, &CollectionEntry)> = entries
                .par_iter()
                .map(|entry| (cosine_distance(query, &entry.embedding), entry))
                .collect();

            scored.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.id.cmp(&b.1.id))
            });
            scored.truncate(n_results);

            result
                .ids
                .push(scored.iter().map(|(_, e)| e.id.to_string()).collect());
            result
                .documents
                .push(scored.iter().map(|(_, e)| e.document.clone()).collect());
            result
                .metadatas
                .push(scored.iter().map(|(_, e)| e.metadata.clone()).collect());
            result
                .distances
                .push(scored.iter().map(|(d, _)| *d).collect());
        }

        Ok(result)
    }

    /// Counts stored entries.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM record_embeddings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Deletes entries by record id, returning how many existed.
    pub fn delete(&mut self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM record_embeddings WHERE record_id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Deletes every entry and forgets the model and dimension.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            DELETE FROM record_embeddings;
            DELETE FROM meta WHERE key IN ('model', 'dimension');
            "#,
            )
            .context("Failed to clear collection")?;
        Ok(())
    }

    /// Gets metadata value by key.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to get meta")?;
        Ok(value)
    }

    /// Sets metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO meta (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn set_meta_if_absent(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CollectionEntry> {
    let id: i64 = row.get(0)?;
    let embedding_blob: Vec<u8> = row.get(9)?;
    Ok(CollectionEntry {
        id,
        document: row.get(1)?,
        metadata: ArchiveRecord {
            id,
            genre: row.get(2)?,
            title: row.get(3)?,
            difficulty: row.get(4)?,
            summary: row.get(5)?,
            file_hash: row.get(6)?,
            file_cid: row.get(7)?,
        },
        content_hash: row.get(8)?,
        embedding: blob_to_embedding(&embedding_blob),
    })
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Converts an embedding vector to a compact blob.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Converts a blob back to an embedding vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Computes cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
