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

//! Metric strategies: pluggable per-zone feature computers.
//!
//! Each strategy receives a zone's read-only window plus the resolved
//! primary (and optional secondary) column name and returns one
//! [`MetricRecord`]. A missing named column is an error; a window too short
//! for a meaningful statistic yields a well-defined minimal record instead,
//! so batches keep moving.

pub mod divergence;
pub mod shape;
pub mod swing;
pub mod volatility;
pub mod volume;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::SeriesWindow;

pub use divergence::DivergenceMetric;
pub use shape::ShapeMetric;
pub use swing::{SwingMetric, SwingScanner};
pub use volatility::VolatilityMetric;
pub use volume::VolumeMetric;

/// Error types for metric computations
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Column not found in window: {0}")]
    MissingColumn(String),

    #[error("Degenerate input: {0}")]
    Degenerate(String),

    #[error("Invalid metric configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for metric computations
pub type MetricResult<T> = Result<T, MetricError>;

/// Values produced by one metric strategy for one zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Name of the producing metric, used as the value namespace
    pub metric: String,

    /// Computed values keyed by short local names
    pub values: HashMap<String, f64>,
}

impl MetricRecord {
    /// Create an empty record for a metric.
    pub fn new(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            values: HashMap::new(),
        }
    }

    /// Insert one value, returning the record for chained setup.
    pub fn with_value(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Insert one value.
    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    /// The record's values with the metric name prefixed, e.g.
    /// `shape_skewness`. This is the namespaced form stored on zones.
    pub fn namespaced_values(&self) -> impl Iterator<Item = (String, f64)> + '_ {
        self.values
            .iter()
            .map(|(key, value)| (format!("{}_{}", self.metric, key), *value))
    }

    /// The minimal record returned when a window is too short: it carries
    /// only the observed sample count.
    pub fn minimal(metric: &str, sample_count: usize) -> Self {
        Self::new(metric).with_value("sample_count", sample_count as f64)
    }
}

/// Trait implemented by every metric strategy.
///
/// Implementations are pure functions over the read-only window; they hold
/// no mutable state, which keeps per-zone extraction trivially
/// parallelizable.
pub trait ZoneMetric: Send + Sync {
    /// Namespace name of the metric.
    fn name(&self) -> &'static str;

    /// Compute the metric over one zone window.
    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        primary_column: &str,
        secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord>;
}

/// Fetch a required column from a window.
pub(crate) fn require_column<'a>(
    window: &SeriesWindow<'a>,
    name: &str,
) -> MetricResult<&'a [f64]> {
    window
        .column(name)
        .ok_or_else(|| MetricError::MissingColumn(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_values() {
        let record = MetricRecord::new("shape")
            .with_value("skewness", 0.25)
            .with_value("kurtosis", -1.0);

        let mut namespaced: Vec<(String, f64)> = record.namespaced_values().collect();
        namespaced.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            namespaced,
            vec![
                ("shape_kurtosis".to_string(), -1.0),
                ("shape_skewness".to_string(), 0.25),
            ]
        );
    }

    #[test]
    fn test_minimal_record() {
        let record = MetricRecord::minimal("swing", 2);
        assert_eq!(record.values.get("sample_count").copied(), Some(2.0));
        assert_eq!(record.values.len(), 1);
    }
}
