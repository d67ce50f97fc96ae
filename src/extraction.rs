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

//! Feature extraction engine: runs every enabled metric strategy over every
//! zone, resolving signal columns from each zone's self-description
//! metadata.
//!
//! Failures are isolated per zone per metric: a metric that cannot compute
//! is recorded as absent with a diagnostic reason and the batch keeps
//! moving. When a zone's metadata does not resolve to a column actually
//! present in the series, a generic fallback picks the first numeric column
//! outside a small, fixed, domain-neutral exclusion set; there is no
//! per-indicator special-casing anywhere in this engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{
    DivergenceMetric, ShapeMetric, SwingMetric, VolatilityMetric, VolumeMetric, ZoneMetric,
};
use crate::series::{
    Series, COLUMN_CLOSE, COLUMN_HIGH, COLUMN_LOW, COLUMN_OPEN, COLUMN_VOLUME,
};
use crate::zone::Zone;

/// Structural columns never chosen as a fallback signal.
static FALLBACK_EXCLUDED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        COLUMN_OPEN,
        COLUMN_HIGH,
        COLUMN_LOW,
        COLUMN_CLOSE,
        COLUMN_VOLUME,
        "adj_close",
    ]
    .into_iter()
    .collect()
});

/// Extracted features of one zone: the signal-agnostic record the
/// statistical layer consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Id of the zone the features belong to
    pub zone_id: u64,

    /// Category label of the zone
    pub category: String,

    /// Zone duration in samples
    pub duration: usize,

    /// Namespaced metric values, e.g. `shape_skewness`
    pub values: HashMap<String, f64>,

    /// Metrics that could not compute, keyed by metric name with the reason
    pub missing: HashMap<String, String>,
}

/// Abstraction over the extraction engine so the orchestrator can swap it.
pub trait FeatureEngine: Send + Sync {
    /// Extract features for a batch of zones, writing each zone's feature
    /// map and returning the per-zone records.
    fn extract(&self, zones: &mut [Zone], series: &Series) -> Vec<FeatureRecord>;
}

/// Default extraction engine over a configurable set of metric strategies.
pub struct FeatureExtractor {
    metrics: Vec<Arc<dyn ZoneMetric>>,
}

impl FeatureExtractor {
    /// Create an extractor with the five standard metrics enabled.
    pub fn new() -> Self {
        Self {
            metrics: vec![
                Arc::new(ShapeMetric::new()),
                Arc::new(DivergenceMetric::new()),
                Arc::new(VolumeMetric::new()),
                Arc::new(VolatilityMetric::new()),
                Arc::new(SwingMetric::new()),
            ],
        }
    }

    /// Create an extractor with an explicit metric set.
    pub fn with_metrics(metrics: Vec<Arc<dyn ZoneMetric>>) -> Self {
        Self { metrics }
    }

    /// Add one more metric strategy.
    pub fn add_metric(&mut self, metric: Arc<dyn ZoneMetric>) {
        self.metrics.push(metric);
    }

    /// The generic fallback: first numeric column, in sorted name order,
    /// outside the structural exclusion set. `None` when the series only
    /// has structural columns.
    fn fallback_signal_column<'a>(series: &'a Series) -> Option<&'a str> {
        series
            .column_names()
            .into_iter()
            .find(|name| !FALLBACK_EXCLUDED.contains(*name))
    }

    /// Resolve the signal column for a zone: metadata first, fallback
    /// heuristic second, structural close as the last resort.
    fn resolve_primary<'a>(zone: &'a Zone, series: &'a Series) -> Option<&'a str> {
        if let Some(column) = zone.resolve_primary_column() {
            if series.has_column(column) {
                return Some(column);
            }
            warn!(
                zone_id = zone.id,
                column,
                "Zone metadata names a column absent from the series; falling back"
            );
        }

        if let Some(column) = Self::fallback_signal_column(series) {
            return Some(column);
        }
        if series.has_column(COLUMN_CLOSE) {
            return Some(COLUMN_CLOSE);
        }
        None
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine for FeatureExtractor {
    fn extract(&self, zones: &mut [Zone], series: &Series) -> Vec<FeatureRecord> {
        let mut records = Vec::with_capacity(zones.len());

        for zone in zones.iter_mut() {
            let mut values: HashMap<String, f64> = HashMap::new();
            let mut missing: HashMap<String, String> = HashMap::new();

            let window = match zone.window(series) {
                Ok(window) => window,
                Err(e) => {
                    warn!(zone_id = zone.id, error = %e, "Zone span is outside the series");
                    records.push(FeatureRecord {
                        zone_id: zone.id,
                        category: zone.category.clone(),
                        duration: zone.duration(),
                        values,
                        missing: self
                            .metrics
                            .iter()
                            .map(|m| (m.name().to_string(), e.to_string()))
                            .collect(),
                    });
                    continue;
                }
            };

            let primary = Self::resolve_primary(zone, series);
            let secondary = zone
                .resolve_secondary_column()
                .filter(|column| series.has_column(*column));

            // Structural return of the zone, independent of any metric.
            if let Some(closes) = window.column(COLUMN_CLOSE) {
                let first = closes[0];
                let last = closes[closes.len() - 1];
                if first != 0.0 {
                    values.insert("zone_return".to_string(), (last - first) / first);
                }
            }

            match primary {
                Some(primary) => {
                    for metric in &self.metrics {
                        match metric.compute(&window, primary, secondary) {
                            Ok(record) => {
                                for (key, value) in record.namespaced_values() {
                                    values.insert(key, value);
                                }
                            }
                            Err(e) => {
                                debug!(
                                    zone_id = zone.id,
                                    metric = metric.name(),
                                    error = %e,
                                    "Metric unavailable for zone"
                                );
                                missing.insert(metric.name().to_string(), e.to_string());
                            }
                        }
                    }
                }
                None => {
                    for metric in &self.metrics {
                        missing.insert(
                            metric.name().to_string(),
                            "no usable signal column in series".to_string(),
                        );
                    }
                }
            }

            zone.attach_features(values.clone());
            records.push(FeatureRecord {
                zone_id: zone.id,
                category: zone.category.clone(),
                duration: zone.duration(),
                values,
                missing,
            });
        }

        info!(
            zones = records.len(),
            metrics = self.metrics.len(),
            "Feature extraction complete"
        );
        records
    }
}
