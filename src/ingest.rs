// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalogue → collection synchronisation.
//!
//! Records are re-embedded only when their content hash changes, and entries
//! for records that left the catalogue are removed. A model change or a
//! forced sync rebuilds the collection from scratch.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{ArchiveRecord, Catalog, NewRecord};
use crate::embedding::{Collection, CollectionEntry, EmbeddingProvider};
use crate::errors::ArchiveError;

/// Options for a sync run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Drop every stored vector and re-embed the whole catalogue
    pub force: bool,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

/// Outcome of a sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Records in the catalogue
    pub total: usize,
    /// Records embedded during this run
    pub embedded: usize,
    /// Records whose stored vector was still current
    pub unchanged: usize,
    /// Collection entries removed because their record is gone
    pub removed: usize,
}

/// Text that gets embedded for a record.
pub fn document_text(record: &ArchiveRecord) -> String {
    format!("{} - {} - {}", record.title, record.difficulty, record.genre)
}

/// Change-detection hash over everything stored alongside the vector.
pub fn content_hash(record: &ArchiveRecord) -> String {
    let document = document_text(record);
    let mut hasher = blake3::Hasher::new();
    for part in [
        document.as_str(),
        record.summary.as_str(),
        record.file_hash.as_str(),
        record.file_cid.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex()[..32].to_string()
}

/// Embed `records` and build collection entries, one provider batch at a time.
pub fn embed_records(
    records: &[ArchiveRecord],
    provider: &mut dyn EmbeddingProvider,
    progress: Option<&ProgressBar>,
) -> Result<Vec<CollectionEntry>> {
    let batch_size = provider.batch_size().max(1);
    let mut entries = Vec::with_capacity(records.len());

    for batch in records.chunks(batch_size) {
        let documents: Vec<String> = batch.iter().map(document_text).collect();
        let embeddings = provider.embed_texts(&documents)?;
        if embeddings.len() != batch.len() {
            return Err(ArchiveError::embedding(format!(
                "provider returned {} vectors for {} records",
                embeddings.len(),
                batch.len()
            ))
            .into());
        }

        for ((record, document), embedding) in batch.iter().zip(documents).zip(embeddings) {
            entries.push(CollectionEntry {
                id: record.id,
                document,
                metadata: record.clone(),
                embedding,
                content_hash: content_hash(record),
            });
        }

        if let Some(pb) = progress {
            pb.inc(batch.len() as u64);
        }
    }

    Ok(entries)
}

/// Bring the collection in line with the catalogue.
pub fn sync(
    catalog: &Catalog,
    collection: &mut Collection,
    provider: &mut dyn EmbeddingProvider,
    options: SyncOptions,
) -> Result<IngestSummary> {
    let records = catalog.list_all()?;

    let stored_model = collection.model()?;
    let model_changed = stored_model
        .as_deref()
        .is_some_and(|model| model != provider.model_id());
    if options.force || model_changed {
        if model_changed {
            tracing::info!(
                from = stored_model.as_deref().unwrap_or_default(),
                to = provider.model_id(),
                "embedding model changed; rebuilding collection"
            );
        }
        collection.clear()?;
    }

    let stored = collection.content_hashes()?;
    let live: HashSet<i64> = records.iter().map(|r| r.id).collect();
    let stale: Vec<i64> = stored
        .keys()
        .filter(|id| !live.contains(id))
        .copied()
        .collect();

    let pending: Vec<ArchiveRecord> = records
        .iter()
        .filter(|record| stored.get(&record.id) != Some(&content_hash(record)))
        .cloned()
        .collect();

    let progress = if options.progress && !pending.is_empty() {
        let pb = ProgressBar::new(pending.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} records | Embedding")
        {
            pb.set_style(style.progress_chars("##."));
        }
        Some(pb)
    } else {
        None
    };

    let entries = embed_records(&pending, provider, progress.as_ref())?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    collection.upsert(&entries)?;
    let removed = collection.delete(&stale)?;
    collection.set_model(provider.model_id())?;

    let summary = IngestSummary {
        total: records.len(),
        embedded: entries.len(),
        unchanged: records.len() - pending.len(),
        removed,
    };
    tracing::info!(
        total = summary.total,
        embedded = summary.embedded,
        unchanged = summary.unchanged,
        removed = summary.removed,
        "collection synced"
    );
    Ok(summary)
}

/// Insert a record and bring the collection up to date.
///
/// The catalogue row is deleted again when indexing fails, so the caller can
/// retry without leaving a duplicate behind.
pub fn add_record(
    catalog: &Catalog,
    collection: &mut Collection,
    provider: &mut dyn EmbeddingProvider,
    record: NewRecord,
) -> Result<ArchiveRecord> {
    let id = catalog.insert(&record)?;
    if let Err(err) = sync(catalog, collection, provider, SyncOptions::default()) {
        match catalog.delete(id) {
            Ok(_) => tracing::warn!(id, "indexing failed; record insert rolled back"),
            Err(rollback) => {
                tracing::error!(id, "failed to roll back record insert: {:#}", rollback)
            }
        }
        return Err(err.context(format!("Failed to index record {}", id)));
    }

    tracing::debug!(id, title = %record.title, "record added");
    Ok(record.into_record(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{CommandProvider, DummyProvider};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Catalog, Collection) {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("archive.db")).unwrap();
        let collection =
            Collection::open(dir.path().join("collection.sqlite"), "records_collection").unwrap();
        (dir, catalog, collection)
    }

    fn add(catalog: &Catalog, title: &str, genre: &str) -> i64 {
        catalog
            .insert(&NewRecord {
                genre: genre.to_string(),
                title: title.to_string(),
                difficulty: "Beginner".to_string(),
                summary: "summary".to_string(),
                file_hash: "abc".to_string(),
                file_cid: "cid".to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_document_text() {
        let record = NewRecord {
            genre: "Fantasy".into(),
            title: "Dune".into(),
            difficulty: "Beginner".into(),
            ..Default::default()
        }
        .into_record(1);
        assert_eq!(document_text(&record), "Dune - Beginner - Fantasy");
    }

    #[test]
    fn test_content_hash_tracks_metadata() {
        let base = NewRecord {
            title: "Dune".into(),
            summary: "a".into(),
            ..Default::default()
        }
        .into_record(1);
        let mut edited = base.clone();
        edited.summary = "b".into();
        assert_ne!(content_hash(&base), content_hash(&edited));

        let mut renumbered = base.clone();
        renumbered.id = 2;
        assert_eq!(content_hash(&base), content_hash(&renumbered));
    }

    #[test]
    fn test_sync_embeds_then_skips_unchanged() {
        let (_dir, catalog, mut collection) = setup();
        add(&catalog, "Dune", "Fantasy");
        add(&catalog, "Calculus", "Math");
        let mut provider = DummyProvider::new(8);

        let first = sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();
        assert_eq!(
            first,
            IngestSummary {
                total: 2,
                embedded: 2,
                unchanged: 0,
                removed: 0
            }
        );
        assert_eq!(collection.model().unwrap().as_deref(), Some("dummy"));

        let second = sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();
        assert_eq!(second.embedded, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_sync_removes_deleted_records() {
        let (_dir, catalog, mut collection) = setup();
        let gone = add(&catalog, "Dune", "Fantasy");
        add(&catalog, "Calculus", "Math");
        let mut provider = DummyProvider::new(8);
        sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();

        catalog.delete(gone).unwrap();
        let summary =
            sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(collection.count().unwrap(), 1);
        assert!(collection.get(gone).unwrap().is_none());
    }

    #[test]
    fn test_force_reembeds_everything() {
        let (_dir, catalog, mut collection) = setup();
        add(&catalog, "Dune", "Fantasy");
        let mut provider = DummyProvider::new(8);
        sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();

        let forced = sync(
            &catalog,
            &mut collection,
            &mut provider,
            SyncOptions {
                force: true,
                progress: false,
            },
        )
        .unwrap();
        assert_eq!(forced.embedded, 1);
        assert_eq!(forced.unchanged, 0);
    }

    #[test]
    fn test_model_change_rebuilds() {
        let (_dir, catalog, mut collection) = setup();
        add(&catalog, "Dune", "Fantasy");
        let mut provider = DummyProvider::new(8);
        sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();
        collection.set_model("some-other-model").unwrap();

        let mut wider = DummyProvider::new(16);
        let summary = sync(&catalog, &mut collection, &mut wider, SyncOptions::default()).unwrap();
        assert_eq!(summary.embedded, 1);
        assert_eq!(collection.dimension().unwrap(), Some(16));
    }

    #[test]
    fn test_sync_empty_catalog() {
        let (_dir, catalog, mut collection) = setup();
        let mut provider = DummyProvider::new(8);
        let summary = sync(&catalog, &mut collection, &mut provider, SyncOptions::default()).unwrap();
        assert_eq!(summary, IngestSummary::default());
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_add_record_embeds_new_row() {
        let (_dir, catalog, mut collection) = setup();
        let mut provider = DummyProvider::new(8);
        let record = add_record(
            &catalog,
            &mut collection,
            &mut provider,
            NewRecord {
                title: "Dune".into(),
                genre: "Fantasy".into(),
                difficulty: "Beginner".into(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(catalog.get(1).unwrap(), Some(record));
        assert_eq!(collection.count().unwrap(), 1);
    }

    #[test]
    fn test_add_record_rolls_back_when_indexing_fails() {
        let (_dir, catalog, mut collection) = setup();
        let mut failing =
            CommandProvider::new("cat > /dev/null; exit 1".to_string(), "ext".to_string());

        let err = add_record(
            &catalog,
            &mut collection,
            &mut failing,
            NewRecord {
                title: "Dune".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::Embedding(_))
        ));
        assert_eq!(catalog.count().unwrap(), 0);
        assert_eq!(collection.count().unwrap(), 0);
    }
}
