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

//! Volume metric: spike ratio of in-zone volume against a baseline, and
//! correlation between volume and the named primary signal.

use crate::metrics::{require_column, MetricError, MetricRecord, MetricResult, ZoneMetric};
use crate::series::{SeriesWindow, COLUMN_VOLUME};
use crate::stats::{mean, pearson_correlation};

/// Computes volume spike ratios and the volume↔signal correlation.
///
/// The baseline is either supplied at construction or computed as the
/// series-wide mean volume. The correlation partner is whatever column the
/// zone's metadata resolved as primary; the metric never assumes a
/// specific indicator.
#[derive(Debug, Clone)]
pub struct VolumeMetric {
    /// Name of the volume column
    volume_column: String,

    /// Externally supplied baseline; series-wide mean when absent
    baseline: Option<f64>,

    /// Fewest samples needed for a meaningful correlation
    min_samples: usize,
}

impl Default for VolumeMetric {
    fn default() -> Self {
        Self {
            volume_column: COLUMN_VOLUME.to_string(),
            baseline: None,
            min_samples: 3,
        }
    }
}

impl VolumeMetric {
    /// Create a volume metric with the structural volume column and a
    /// computed baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a differently named volume column.
    pub fn with_volume_column(mut self, name: &str) -> Self {
        self.volume_column = name.to_string();
        self
    }

    /// Supply a fixed baseline instead of the series-wide mean.
    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = Some(baseline);
        self
    }
}

impl ZoneMetric for VolumeMetric {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        primary_column: &str,
        _secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord> {
        let volume = require_column(window, &self.volume_column)?;
        let signal = require_column(window, primary_column)?;

        if volume.len() < self.min_samples {
            return Ok(MetricRecord::minimal(self.name(), volume.len()));
        }

        let baseline = match self.baseline {
            Some(value) => value,
            None => {
                let full = window
                    .series()
                    .column(&self.volume_column)
                    .ok_or_else(|| MetricError::MissingColumn(self.volume_column.clone()))?;
                mean(full)
            }
        };
        if baseline <= 0.0 {
            return Err(MetricError::Degenerate(
                "volume baseline is not positive".to_string(),
            ));
        }

        let window_mean = mean(volume);
        let window_max = volume.iter().cloned().fold(f64::MIN, f64::max);

        Ok(MetricRecord::new(self.name())
            .with_value("sample_count", volume.len() as f64)
            .with_value("spike_ratio", window_mean / baseline)
            .with_value("max_spike_ratio", window_max / baseline)
            .with_value(
                "signal_correlation",
                pearson_correlation(volume, signal),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use chrono::{TimeZone, Utc};

    fn volume_series(volume: Vec<f64>, signal: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..volume.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column(COLUMN_VOLUME, volume)
            .unwrap()
            .with_column("sig", signal)
            .unwrap()
    }

    #[test]
    fn test_spike_ratio_against_series_baseline() {
        // Series-wide mean volume is 250; the window holds the heavy half.
        let series = volume_series(
            vec![100.0, 100.0, 400.0, 400.0],
            vec![1.0, 1.0, 2.0, 2.0],
        );
        let window = series.window(2, 3).unwrap();

        let record = VolumeMetric::new().compute(&window, "sig", None).unwrap();
        // With min_samples = 3 the two-sample window is minimal; widen it.
        assert_eq!(record.values.get("sample_count").copied(), Some(2.0));

        let window = series.window(1, 3).unwrap();
        let record = VolumeMetric::new().compute(&window, "sig", None).unwrap();
        assert!((record.values.get("spike_ratio").unwrap() - 300.0 / 250.0).abs() < 1e-9);
        assert!((record.values.get("max_spike_ratio").unwrap() - 400.0 / 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_supplied_baseline_and_correlation() {
        let series = volume_series(
            vec![10.0, 20.0, 30.0, 40.0],
            vec![1.0, 2.0, 3.0, 4.0],
        );
        let window = series.window(0, 3).unwrap();

        let record = VolumeMetric::new()
            .with_baseline(25.0)
            .compute(&window, "sig", None)
            .unwrap();

        assert!((record.values.get("spike_ratio").unwrap() - 1.0).abs() < 1e-9);
        assert!((record.values.get("signal_correlation").unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_volume_column_is_error() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..4)
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        let series = Series::new(timestamps)
            .unwrap()
            .with_column("sig", vec![1.0; 4])
            .unwrap();
        let window = series.window(0, 3).unwrap();

        let err = VolumeMetric::new().compute(&window, "sig", None).unwrap_err();
        assert!(matches!(err, MetricError::MissingColumn(_)));
    }

    #[test]
    fn test_zero_baseline_is_degenerate() {
        let series = volume_series(vec![0.0; 4], vec![1.0; 4]);
        let window = series.window(0, 3).unwrap();

        let err = VolumeMetric::new().compute(&window, "sig", None).unwrap_err();
        assert!(matches!(err, MetricError::Degenerate(_)));
    }
}
