// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate statistics and clustering over the record collection.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::catalog::ArchiveRecord;
use crate::config::AnalyticsConfig;
use crate::embedding::Collection;
use crate::errors::ArchiveError;
use crate::kmeans::{self, KMeansConfig};

/// Count of records per difficulty level
pub fn difficulty_distribution(collection: &Collection) -> Result<BTreeMap<String, usize>> {
    let metadatas = collection.metadatas()?;
    Ok(count_by(&metadatas, |record| &record.difficulty))
}

/// Count of records per genre
pub fn genre_distribution(collection: &Collection) -> Result<BTreeMap<String, usize>> {
    let metadatas = collection.metadatas()?;
    Ok(count_by(&metadatas, |record| &record.genre))
}

fn count_by<F>(records: &[ArchiveRecord], key: F) -> BTreeMap<String, usize>
where
    F: Fn(&ArchiveRecord) -> &String,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(key(record).clone()).or_insert(0) += 1;
    }
    counts
}

/// Group the collection into `n_clusters` k-means clusters.
///
/// Keys are cluster labels; values are the member records in id order.
/// Clusters that end up empty are omitted.
pub fn cluster_records(
    collection: &Collection,
    n_clusters: usize,
    config: &AnalyticsConfig,
) -> Result<BTreeMap<usize, Vec<ArchiveRecord>>> {
    let entries = collection.get_all()?;
    if entries.is_empty() {
        return Ok(BTreeMap::new());
    }
    if n_clusters == 0 || n_clusters > entries.len() {
        return Err(ArchiveError::InvalidClusterCount {
            requested: n_clusters,
            available: entries.len(),
        }
        .into());
    }

    let kmeans_config =
        KMeansConfig::new(n_clusters, config.max_iterations(), config.tolerance())?;
    let vectors: Vec<Vec<f32>> = entries.iter().map(|e| e.embedding.clone()).collect();
    let result = kmeans::fit(&vectors, &kmeans_config)?;

    let mut clusters: BTreeMap<usize, Vec<ArchiveRecord>> = BTreeMap::new();
    for (entry, label) in entries.into_iter().zip(result.assignments) {
        clusters.entry(label).or_default().push(entry.metadata);
    }

    tracing::debug!(
        requested = n_clusters,
        non_empty = clusters.len(),
        iterations = result.iterations,
        "clustered collection"
    );
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::CollectionEntry;
    use tempfile::{tempdir, TempDir};

    fn entry(id: i64, genre: &str, difficulty: &str, embedding: Vec<f32>) -> CollectionEntry {
        CollectionEntry {
            id,
            document: String::new(),
            metadata: ArchiveRecord {
                id,
                genre: genre.to_string(),
                title: format!("t{}", id),
                difficulty: difficulty.to_string(),
                summary: String::new(),
                file_hash: String::new(),
                file_cid: String::new(),
            },
            embedding,
            content_hash: String::new(),
        }
    }

    fn populated() -> (TempDir, Collection) {
        let dir = tempdir().unwrap();
        let mut collection =
            Collection::open(dir.path().join("collection.sqlite"), "records_collection").unwrap();
        collection
            .upsert(&[
                entry(1, "Fantasy", "Beginner", vec![1.0, 0.0]),
                entry(2, "Fantasy", "Advanced", vec![0.98, 0.05]),
                entry(3, "Math", "Advanced", vec![0.0, 1.0]),
                entry(4, "Math", "Advanced", vec![0.05, 0.97]),
                entry(5, "Poetry", "Intermediate", vec![0.02, 0.99]),
            ])
            .unwrap();
        (dir, collection)
    }

    #[test]
    fn test_distributions() {
        let (_dir, collection) = populated();

        let difficulty = difficulty_distribution(&collection).unwrap();
        assert_eq!(difficulty.get("Advanced"), Some(&3));
        assert_eq!(difficulty.get("Beginner"), Some(&1));
        assert_eq!(difficulty.get("Intermediate"), Some(&1));

        let genre = genre_distribution(&collection).unwrap();
        assert_eq!(
            genre.into_iter().collect::<Vec<_>>(),
            vec![
                ("Fantasy".to_string(), 2),
                ("Math".to_string(), 2),
                ("Poetry".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_empty_collection() {
        let dir = tempdir().unwrap();
        let collection =
            Collection::open(dir.path().join("collection.sqlite"), "records_collection").unwrap();
        assert!(difficulty_distribution(&collection).unwrap().is_empty());
        assert!(cluster_records(&collection, 3, &AnalyticsConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cluster_records_groups_neighbours() {
        let (_dir, collection) = populated();
        let clusters = cluster_records(&collection, 2, &AnalyticsConfig::default()).unwrap();
        assert_eq!(clusters.len(), 2);

        let ids: Vec<Vec<i64>> = clusters
            .values()
            .map(|members| members.iter().map(|m| m.id).collect())
            .collect();
        assert!(ids.contains(&vec![1, 2]));
        assert!(ids.contains(&vec![3, 4, 5]));
    }

    #[test]
    fn test_cluster_count_validation() {
        let (_dir, collection) = populated();
        for n in [0, 6] {
            let err = cluster_records(&collection, n, &AnalyticsConfig::default()).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ArchiveError>(),
                Some(ArchiveError::InvalidClusterCount { available: 5, .. })
            ));
        }
    }
}
