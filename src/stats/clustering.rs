// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Zonal Analytics Foundation
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

//! Similarity clustering of zones by their extracted feature vectors.
//!
//! Feature-vector composition: the sorted union of finite feature keys
//! across the batch, with absent values zero-imputed and every dimension
//! min-max normalized. K-means runs with a seeded generator so repeated
//! runs over identical input produce identical assignments.

use std::collections::HashMap;

use nalgebra::DVector;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extraction::FeatureRecord;

/// Configuration for zone clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Upper bound on the number of clusters
    pub max_clusters: usize,

    /// Iteration cap for the assign/update loop
    pub max_iterations: usize,

    /// Seed for centroid initialization
    pub seed: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_clusters: 3,
            max_iterations: 100,
            seed: 7,
        }
    }
}

/// Zone→cluster assignment produced by a clusterer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Number of non-empty clusters
    pub cluster_count: usize,

    /// Cluster index per zone id
    pub assignments: HashMap<u64, usize>,

    /// Feature keys composing the vectors, in dimension order
    pub feature_keys: Vec<String>,
}

/// Groups zones into at most k clusters by feature similarity.
pub trait ZoneClusterer: Send + Sync {
    /// Cluster the records. `None` when the batch is too small to cluster.
    fn cluster(&self, records: &[FeatureRecord]) -> Option<ClusterAssignment>;
}

/// K-means clusterer over normalized feature vectors.
pub struct KMeansClusterer {
    config: ClusteringConfig,
}

impl KMeansClusterer {
    /// Create a clusterer with default configuration.
    pub fn new() -> Self {
        Self {
            config: ClusteringConfig::default(),
        }
    }

    /// Create a clusterer with explicit configuration.
    pub fn with_config(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Sorted union of finite feature keys across the batch.
    fn feature_keys(records: &[FeatureRecord]) -> Vec<String> {
        let mut keys: Vec<String> = records
            .iter()
            .flat_map(|r| {
                r.values
                    .iter()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(k, _)| k.clone())
            })
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Zero-imputed, min-max normalized vectors in record order.
    fn build_vectors(records: &[FeatureRecord], keys: &[String]) -> Vec<DVector<f64>> {
        let mut vectors: Vec<DVector<f64>> = records
            .iter()
            .map(|record| {
                DVector::from_iterator(
                    keys.len(),
                    keys.iter().map(|key| {
                        record
                            .values
                            .get(key)
                            .copied()
                            .filter(|v| v.is_finite())
                            .unwrap_or(0.0)
                    }),
                )
            })
            .collect();

        for dim in 0..keys.len() {
            let min = vectors
                .iter()
                .map(|v| v[dim])
                .fold(f64::INFINITY, f64::min);
            let max = vectors
                .iter()
                .map(|v| v[dim])
                .fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            if span > 0.0 {
                for vector in vectors.iter_mut() {
                    vector[dim] = (vector[dim] - min) / span;
                }
            } else {
                for vector in vectors.iter_mut() {
                    vector[dim] = 0.0;
                }
            }
        }

        vectors
    }
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneClusterer for KMeansClusterer {
    fn cluster(&self, records: &[FeatureRecord]) -> Option<ClusterAssignment> {
        let k = self.config.max_clusters;
        if k == 0 || records.len() < k {
            debug!(
                zones = records.len(),
                k, "Skipping clustering: fewer zones than clusters"
            );
            return None;
        }

        let keys = Self::feature_keys(records);
        if keys.is_empty() {
            debug!("Skipping clustering: no finite feature values");
            return None;
        }

        let vectors = Self::build_vectors(records, &keys);

        // Choose k distinct observations as initial centroids.
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut selected_indices = Vec::new();
        while selected_indices.len() < k {
            let idx = rng.gen_range(0..vectors.len());
            if !selected_indices.contains(&idx) {
                selected_indices.push(idx);
            }
        }
        let mut centroids: Vec<DVector<f64>> = selected_indices
            .iter()
            .map(|&idx| vectors[idx].clone())
            .collect();

        // Assign each observation to its nearest centroid, then move the
        // centroids, until assignments stop changing.
        let mut assignments = vec![0usize; vectors.len()];
        for iteration in 0..self.config.max_iterations {
            let mut changed = false;

            for (i, vector) in vectors.iter().enumerate() {
                let mut best = 0usize;
                let mut best_distance = f64::INFINITY;
                for (c, centroid) in centroids.iter().enumerate() {
                    let distance = (vector - centroid).norm_squared();
                    if distance < best_distance {
                        best_distance = distance;
                        best = c;
                    }
                }
                if assignments[i] != best {
                    assignments[i] = best;
                    changed = true;
                }
            }

            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&DVector<f64>> = vectors
                    .iter()
                    .zip(assignments.iter())
                    .filter(|(_, &a)| a == c)
                    .map(|(v, _)| v)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let mut sum = DVector::zeros(keys.len());
                for member in &members {
                    sum += *member;
                }
                *centroid = sum / members.len() as f64;
            }

            if !changed {
                debug!(iteration, "K-means converged");
                break;
            }
        }

        let mut occupied: Vec<usize> = assignments.clone();
        occupied.sort_unstable();
        occupied.dedup();

        let assignment_map: HashMap<u64, usize> = records
            .iter()
            .zip(assignments.iter())
            .map(|(record, &cluster)| (record.zone_id, cluster))
            .collect();

        info!(
            zones = records.len(),
            clusters = occupied.len(),
            dimensions = keys.len(),
            "Clustering complete"
        );
        Some(ClusterAssignment {
            cluster_count: occupied.len(),
            assignments: assignment_map,
            feature_keys: keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, skew: f64, ratio: f64) -> FeatureRecord {
        let mut values = HashMap::new();
        values.insert("shape_skewness".to_string(), skew);
        values.insert("volume_spike_ratio".to_string(), ratio);
        FeatureRecord {
            zone_id: id,
            category: "bull".to_string(),
            duration: 10,
            values,
            missing: HashMap::new(),
        }
    }

    fn two_blob_records() -> Vec<FeatureRecord> {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(record(i, 0.1 + 0.01 * i as f64, 1.0));
        }
        for i in 5..10 {
            records.push(record(i, 5.0 + 0.01 * i as f64, 9.0));
        }
        records
    }

    #[test]
    fn test_every_zone_assigned_within_bound() {
        let clusterer = KMeansClusterer::with_config(ClusteringConfig {
            max_clusters: 2,
            ..ClusteringConfig::default()
        });

        let assignment = clusterer.cluster(&two_blob_records()).unwrap();

        assert!(assignment.cluster_count <= 2);
        assert_eq!(assignment.assignments.len(), 10);
        for cluster in assignment.assignments.values() {
            assert!(*cluster < 2);
        }
    }

    #[test]
    fn test_separated_blobs_split() {
        let clusterer = KMeansClusterer::with_config(ClusteringConfig {
            max_clusters: 2,
            ..ClusteringConfig::default()
        });

        let assignment = clusterer.cluster(&two_blob_records()).unwrap();

        let low = assignment.assignments[&0];
        for id in 1..5 {
            assert_eq!(assignment.assignments[&id], low);
        }
        let high = assignment.assignments[&5];
        assert_ne!(low, high);
        for id in 6..10 {
            assert_eq!(assignment.assignments[&id], high);
        }
    }

    #[test]
    fn test_skipped_when_too_few_zones() {
        let clusterer = KMeansClusterer::with_config(ClusteringConfig {
            max_clusters: 5,
            ..ClusteringConfig::default()
        });
        let records: Vec<FeatureRecord> = (0..3).map(|i| record(i, 0.0, 1.0)).collect();

        assert!(clusterer.cluster(&records).is_none());
    }

    #[test]
    fn test_deterministic_across_runs() {
        let records = two_blob_records();
        let clusterer = KMeansClusterer::new();

        let first = clusterer.cluster(&records).unwrap();
        let second = clusterer.cluster(&records).unwrap();
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.feature_keys, second.feature_keys);
    }
}
