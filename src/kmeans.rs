// SPDX-License-Identifier: MIT OR Apache-2.0

//! Standard k-means (Lloyd's algorithm) over embedding vectors.
//!
//! Seeding is the deterministic farthest-point variant of k-means++: the
//! first vector, then repeatedly the vector farthest from its nearest chosen
//! centroid. Identical input always yields identical labels.

use anyhow::{bail, Result};

/// Parameters for a k-means run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,
    /// Iteration cap
    pub max_iterations: usize,
    /// Stop once no centroid moves farther than this
    pub tolerance: f32,
}

impl KMeansConfig {
    /// Create a validated configuration
    pub fn new(k: usize, max_iterations: usize, tolerance: f32) -> Result<Self> {
        if k == 0 {
            bail!("k must be > 0");
        }
        if max_iterations == 0 {
            bail!("max_iterations must be > 0");
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            bail!("tolerance must be a finite positive number");
        }
        Ok(Self {
            k,
            max_iterations,
            tolerance,
        })
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// Result of a k-means run
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster label per input vector
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub iterations: usize,
    pub converged: bool,
    /// Within-cluster sum of squared distances
    pub inertia: f32,
}

impl KMeansResult {
    /// Number of vectors per cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.assignments {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Partition `vectors` into `config.k` clusters.
///
/// All vectors must share one dimension and `k` must not exceed the number
/// of vectors.
pub fn fit(vectors: &[Vec<f32>], config: &KMeansConfig) -> Result<KMeansResult> {
    if vectors.is_empty() {
        bail!("cannot cluster an empty set of vectors");
    }
    if config.k > vectors.len() {
        bail!(
            "k ({}) must be <= number of vectors ({})",
            config.k,
            vectors.len()
        );
    }
    let dim = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dim) {
        bail!("all vectors must have the same dimension");
    }

    let mut centroids = farthest_point_init(vectors, config.k);
    let mut assignments = vec![0usize; vectors.len()];
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        for (label, vector) in assignments.iter_mut().zip(vectors) {
            *label = nearest_centroid(vector, &centroids);
        }

        let new_centroids = compute_centroids(vectors, &assignments, &centroids);
        let max_movement = centroids
            .iter()
            .zip(&new_centroids)
            .map(|(old, new)| squared_distance(old, new).sqrt())
            .fold(0.0f32, f32::max);
        centroids = new_centroids;

        if max_movement < config.tolerance {
            converged = true;
            break;
        }
    }

    // Final assignment against the settled centroids.
    for (label, vector) in assignments.iter_mut().zip(vectors) {
        *label = nearest_centroid(vector, &centroids);
    }

    let inertia: f32 = vectors
        .iter()
        .zip(&assignments)
        .map(|(v, &label)| squared_distance(v, &centroids[label]))
        .sum();

    tracing::debug!(
        k = config.k,
        n = vectors.len(),
        iterations,
        converged,
        inertia,
        "k-means finished"
    );

    Ok(KMeansResult {
        assignments,
        centroids,
        iterations,
        converged,
        inertia,
    })
}

fn farthest_point_init(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(vectors[0].clone());
    let mut min_distances = vec![f32::MAX; vectors.len()];

    while centroids.len() < k {
        let last = &centroids[centroids.len() - 1];
        for (i, vector) in vectors.iter().enumerate() {
            min_distances[i] = min_distances[i].min(squared_distance(vector, last));
        }

        // Strict `>` keeps the lowest index on ties. When every point already
        // coincides with a centroid this re-picks a duplicate, which just
        // leaves an empty cluster.
        let mut best = 0;
        for (i, &d) in min_distances.iter().enumerate() {
            if d > min_distances[best] {
                best = i;
            }
        }
        centroids.push(vectors[best].clone());
    }

    centroids
}

fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (j, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(vector, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

/// Mean of assigned vectors; an empty cluster keeps its previous centroid.
fn compute_centroids(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dim = previous[0].len();
    let mut sums = vec![vec![0.0f32; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (vector, &label) in vectors.iter().zip(assignments) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(vector) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((mut sum, count), prev)| {
            if count == 0 {
                return prev.clone();
            }
            for s in sum.iter_mut() {
                *s /= count as f32;
            }
            sum
        })
        .collect()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    #[test]
    fn test_separates_two_blobs() {
        let config = KMeansConfig::new(2, 100, 1e-6).unwrap();
        let result = fit(&blobs(), &config).unwrap();

        assert!(result.converged);
        assert_eq!(result.assignments[0], result.assignments[1]);
        assert_eq!(result.assignments[0], result.assignments[2]);
        assert_eq!(result.assignments[3], result.assignments[4]);
        assert_ne!(result.assignments[0], result.assignments[3]);
        assert_eq!(result.cluster_sizes(), vec![3, 3]);
        assert!(result.inertia < 0.1);
    }

    #[test]
    fn test_deterministic() {
        let config = KMeansConfig::new(3, 50, 1e-6).unwrap();
        let a = fit(&blobs(), &config).unwrap();
        let b = fit(&blobs(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_equals_n() {
        let data = vec![vec![1.0], vec![2.0], vec![3.0]];
        let config = KMeansConfig::new(3, 10, 1e-6).unwrap();
        let result = fit(&data, &config).unwrap();
        let mut labels = result.assignments.clone();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn test_duplicate_points_leave_empty_cluster() {
        let data = vec![vec![1.0, 1.0]; 4];
        let config = KMeansConfig::new(2, 10, 1e-6).unwrap();
        let result = fit(&data, &config).unwrap();
        assert_eq!(result.centroids.len(), 2);
        assert!(result.assignments.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = KMeansConfig::new(2, 10, 1e-6).unwrap();
        assert!(fit(&[], &config).is_err());
        assert!(fit(&[vec![1.0]], &config).is_err());
        assert!(fit(&[vec![1.0], vec![1.0, 2.0]], &config).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(KMeansConfig::new(0, 10, 1e-4).is_err());
        assert!(KMeansConfig::new(2, 0, 1e-4).is_err());
        assert!(KMeansConfig::new(2, 10, 0.0).is_err());
        assert!(KMeansConfig::new(2, 10, f32::NAN).is_err());
    }
}
