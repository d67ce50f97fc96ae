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

//! Volatility metric: range expansion or contraction of a zone relative to
//! the series-wide average range.

use crate::metrics::{MetricError, MetricRecord, MetricResult, ZoneMetric};
use crate::series::{SeriesWindow, COLUMN_HIGH, COLUMN_LOW};
use crate::stats::mean;

/// Computes the high-low range expansion ratio of a zone.
///
/// Per-sample range is `high - low`, or the values of a configured
/// range-like column. The expansion ratio compares the window's mean range
/// against the series-wide mean range; `range_trend` compares the second
/// half of the window against the first, flagging whether volatility was
/// still expanding inside the zone.
#[derive(Debug, Clone)]
pub struct VolatilityMetric {
    /// Optional pre-computed range column; high-low when absent
    range_column: Option<String>,

    /// Fewest samples needed for a meaningful ratio
    min_samples: usize,
}

impl Default for VolatilityMetric {
    fn default() -> Self {
        Self {
            range_column: None,
            min_samples: 2,
        }
    }
}

impl VolatilityMetric {
    /// Create a volatility metric using the high-low range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a pre-computed range-like column instead of high-low.
    pub fn with_range_column(mut self, name: &str) -> Self {
        self.range_column = Some(name.to_string());
        self
    }

    /// Per-sample ranges over an arbitrary index span of the series.
    fn ranges(
        &self,
        window: &SeriesWindow<'_>,
        whole_series: bool,
    ) -> MetricResult<Vec<f64>> {
        match &self.range_column {
            Some(name) => {
                let values = if whole_series {
                    window
                        .series()
                        .column(name)
                        .ok_or_else(|| MetricError::MissingColumn(name.clone()))?
                } else {
                    window
                        .column(name)
                        .ok_or_else(|| MetricError::MissingColumn(name.clone()))?
                };
                Ok(values.to_vec())
            }
            None => {
                let (high, low) = if whole_series {
                    let series = window.series();
                    (
                        series
                            .column(COLUMN_HIGH)
                            .ok_or_else(|| MetricError::MissingColumn(COLUMN_HIGH.to_string()))?,
                        series
                            .column(COLUMN_LOW)
                            .ok_or_else(|| MetricError::MissingColumn(COLUMN_LOW.to_string()))?,
                    )
                } else {
                    (
                        window
                            .column(COLUMN_HIGH)
                            .ok_or_else(|| MetricError::MissingColumn(COLUMN_HIGH.to_string()))?,
                        window
                            .column(COLUMN_LOW)
                            .ok_or_else(|| MetricError::MissingColumn(COLUMN_LOW.to_string()))?,
                    )
                };
                Ok(high.iter().zip(low.iter()).map(|(h, l)| h - l).collect())
            }
        }
    }
}

impl ZoneMetric for VolatilityMetric {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        _primary_column: &str,
        _secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord> {
        let window_ranges = self.ranges(window, false)?;

        if window_ranges.len() < self.min_samples {
            return Ok(MetricRecord::minimal(self.name(), window_ranges.len()));
        }

        let series_ranges = self.ranges(window, true)?;
        let series_mean = mean(&series_ranges);
        if series_mean <= 0.0 {
            return Err(MetricError::Degenerate(
                "series-wide mean range is not positive".to_string(),
            ));
        }

        let window_mean = mean(&window_ranges);
        let half = window_ranges.len() / 2;
        let first_half = mean(&window_ranges[..half.max(1)]);
        let second_half = mean(&window_ranges[half..]);
        let range_trend = if first_half > 0.0 {
            second_half / first_half
        } else {
            1.0
        };

        Ok(MetricRecord::new(self.name())
            .with_value("sample_count", window_ranges.len() as f64)
            .with_value("mean_range", window_mean)
            .with_value("expansion_ratio", window_mean / series_mean)
            .with_value("range_trend", range_trend))
    }
}
