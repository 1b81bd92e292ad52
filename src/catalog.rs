// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite catalogue of archive records.
//!
//! The catalogue is the source of truth: a single `archive` table scanned
//! flat when the vector collection is (re)built and queried directly for the
//! metadata endpoints.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::ArchiveError;

const RECORD_COLUMNS: &str = "id, genre, title, difficulty, summary, file_hash, file_cid";

/// A stored catalogue record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: i64,
    pub genre: String,
    pub title: String,
    pub difficulty: String,
    pub summary: String,
    /// Content hash of the archived file
    pub file_hash: String,
    /// Content identifier of the archived file
    pub file_cid: String,
}

/// Fields for a record that has not been inserted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub genre: String,
    pub title: String,
    pub difficulty: String,
    pub summary: String,
    #[serde(default)]
    pub file_hash: String,
    #[serde(default)]
    pub file_cid: String,
}

impl NewRecord {
    /// Attach the generated id
    pub fn into_record(self, id: i64) -> ArchiveRecord {
        ArchiveRecord {
            id,
            genre: self.genre,
            title: self.title,
            difficulty: self.difficulty,
            summary: self.summary,
            file_hash: self.file_hash,
            file_cid: self.file_cid,
        }
    }
}

/// Columns that may be used for substring search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Genre,
    Title,
    Difficulty,
    Summary,
    FileHash,
    FileCid,
}

impl SearchField {
    pub const ALL: [SearchField; 6] = [
        SearchField::Genre,
        SearchField::Title,
        SearchField::Difficulty,
        SearchField::Summary,
        SearchField::FileHash,
        SearchField::FileCid,
    ];

    /// Column name in the `archive` table
    pub fn column(self) -> &'static str {
        match self {
            SearchField::Genre => "genre",
            SearchField::Title => "title",
            SearchField::Difficulty => "difficulty",
            SearchField::Summary => "summary",
            SearchField::FileHash => "file_hash",
            SearchField::FileCid => "file_cid",
        }
    }
}

impl std::fmt::Display for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SearchField {
    type Err = ArchiveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SearchField::ALL
            .into_iter()
            .find(|field| field.column() == s)
            .ok_or_else(|| ArchiveError::UnsearchableField(s.to_string()))
    }
}

/// Handle on the catalogue database.
pub struct Catalog {
    conn: Connection,
    path: PathBuf,
}

impl Catalog {
    /// Opens or creates the catalogue at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open catalogue: {}", path.display()))?;
        let catalog = Self { conn, path };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS archive (
                id INTEGER PRIMARY KEY,
                genre TEXT NOT NULL,
                title TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                summary TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                file_cid TEXT NOT NULL
            );
            "#,
            )
            .context("Failed to initialize catalogue schema")
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a new row. Duplicates are allowed; every call creates a record.
    pub fn insert(&self, record: &NewRecord) -> Result<i64> {
        self.conn
            .execute(
                r#"
            INSERT INTO archive (genre, title, difficulty, summary, file_hash, file_cid)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
                params![
                    record.genre,
                    record.title,
                    record.difficulty,
                    record.summary,
                    record.file_hash,
                    record.file_cid
                ],
            )
            .context("Failed to insert record")?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, title = %record.title, "inserted catalogue record");
        Ok(id)
    }

    /// Flat scan of every record, ordered by id.
    pub fn list_all(&self) -> Result<Vec<ArchiveRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM archive ORDER BY id"))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list records")?;
        Ok(records)
    }

    /// Retrieves a record by id.
    pub fn get(&self, id: i64) -> Result<Option<ArchiveRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM archive WHERE id = ?1"),
                params![id],
                Self::row_to_record,
            )
            .optional()
            .context("Failed to query record")?;
        Ok(record)
    }

    /// Substring match on one whitelisted column.
    pub fn search_field(&self, field: SearchField, needle: &str) -> Result<Vec<ArchiveRecord>> {
        // Column names cannot be bound; `field` only yields whitelisted names.
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM archive WHERE {} LIKE ?1 ORDER BY id",
            field.column()
        );
        let pattern = format!("%{}%", needle);

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![pattern], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to search field {}", field))?;
        Ok(records)
    }

    /// Counts catalogue records.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM archive", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Distinct genres, sorted.
    pub fn genres(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT genre FROM archive ORDER BY genre")?;
        let genres = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list genres")?;
        Ok(genres)
    }

    /// Deletes a record, returning whether it existed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM archive WHERE id = ?1", params![id])
            .context("Failed to delete record")?;
        Ok(deleted > 0)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ArchiveRecord> {
        Ok(ArchiveRecord {
            id: row.get(0)?,
            genre: row.get(1)?,
            title: row.get(2)?,
            difficulty: row.get(3)?,
            summary: row.get(4)?,
            file_hash: row.get(5)?,
            file_cid: row.get(6)?,
        })
    }
}
