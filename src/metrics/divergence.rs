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

//! Divergence metric: compares the direction of price extrema against the
//! direction of primary-signal extrema within a zone.
//!
//! Regular divergence: price makes a higher high while the signal makes a
//! lower high (bearish), or price makes a lower low while the signal makes
//! a higher low (bullish). Hidden divergence is the mirrored case. Extrema
//! of price and signal are located independently, so the metric never
//! assumes which indicator produced the signal.

use crate::metrics::{require_column, MetricRecord, MetricResult, ZoneMetric};
use crate::series::{SeriesWindow, COLUMN_CLOSE};

/// Computes regular/hidden divergence flags between price and the primary
/// signal, plus extrema counts. An optional secondary column contributes a
/// companion-line agreement ratio.
#[derive(Debug, Clone)]
pub struct DivergenceMetric {
    /// Neighbor count on each side when locating local extrema
    extrema_window: usize,

    /// Fewest samples needed for a meaningful comparison
    min_samples: usize,
}

impl Default for DivergenceMetric {
    fn default() -> Self {
        Self {
            extrema_window: 1,
            min_samples: 5,
        }
    }
}

impl DivergenceMetric {
    /// Create a divergence metric with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the extrema neighborhood size.
    pub fn with_extrema_window(mut self, extrema_window: usize) -> Self {
        self.extrema_window = extrema_window.max(1);
        self
    }

    /// Indices of local maxima: samples strictly above their k neighbors
    /// on both sides.
    fn local_maxima(&self, values: &[f64]) -> Vec<usize> {
        self.local_extrema(values, |center, neighbor| center > neighbor)
    }

    /// Indices of local minima.
    fn local_minima(&self, values: &[f64]) -> Vec<usize> {
        self.local_extrema(values, |center, neighbor| center < neighbor)
    }

    fn local_extrema(&self, values: &[f64], beats: fn(f64, f64) -> bool) -> Vec<usize> {
        let k = self.extrema_window;
        if values.len() < 2 * k + 1 {
            return Vec::new();
        }

        (k..values.len() - k)
            .filter(|&i| {
                (1..=k).all(|offset| {
                    beats(values[i], values[i - offset]) && beats(values[i], values[i + offset])
                })
            })
            .collect()
    }

    /// Direction of the first→last extremum move, if at least two extrema.
    fn extrema_direction(values: &[f64], extrema: &[usize]) -> Option<f64> {
        if extrema.len() < 2 {
            return None;
        }
        let first = values[extrema[0]];
        let last = values[extrema[extrema.len() - 1]];
        Some(last - first)
    }
}

impl ZoneMetric for DivergenceMetric {
    fn name(&self) -> &'static str {
        "divergence"
    }

    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        primary_column: &str,
        secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord> {
        let price = require_column(window, COLUMN_CLOSE)?;
        let signal = require_column(window, primary_column)?;

        if price.len() < self.min_samples {
            return Ok(MetricRecord::minimal(self.name(), price.len()));
        }

        let price_peaks = self.local_maxima(price);
        let price_troughs = self.local_minima(price);
        let signal_peaks = self.local_maxima(signal);
        let signal_troughs = self.local_minima(signal);

        let mut record = MetricRecord::new(self.name())
            .with_value("sample_count", price.len() as f64)
            .with_value("price_peak_count", price_peaks.len() as f64)
            .with_value("price_trough_count", price_troughs.len() as f64)
            .with_value("signal_peak_count", signal_peaks.len() as f64)
            .with_value("signal_trough_count", signal_troughs.len() as f64);

        let mut regular_bearish = 0.0;
        let mut hidden_bearish = 0.0;
        if let (Some(price_dir), Some(signal_dir)) = (
            Self::extrema_direction(price, &price_peaks),
            Self::extrema_direction(signal, &signal_peaks),
        ) {
            if price_dir > 0.0 && signal_dir < 0.0 {
                regular_bearish = 1.0;
            }
            if price_dir < 0.0 && signal_dir > 0.0 {
                hidden_bearish = 1.0;
            }
        }

        let mut regular_bullish = 0.0;
        let mut hidden_bullish = 0.0;
        if let (Some(price_dir), Some(signal_dir)) = (
            Self::extrema_direction(price, &price_troughs),
            Self::extrema_direction(signal, &signal_troughs),
        ) {
            if price_dir < 0.0 && signal_dir > 0.0 {
                regular_bullish = 1.0;
            }
            if price_dir > 0.0 && signal_dir < 0.0 {
                hidden_bullish = 1.0;
            }
        }

        record.insert("regular_bearish", regular_bearish);
        record.insert("regular_bullish", regular_bullish);
        record.insert("hidden_bearish", hidden_bearish);
        record.insert("hidden_bullish", hidden_bullish);
        record.insert(
            "divergence_detected",
            if regular_bearish + regular_bullish + hidden_bearish + hidden_bullish > 0.0 {
                1.0
            } else {
                0.0
            },
        );

        if let Some(companion_name) = secondary_column {
            if let Some(companion) = window.column(companion_name) {
                if let (Some(&signal_last), Some(&companion_last)) =
                    (signal.last(), companion.last())
                {
                    let closing_side = signal_last > companion_last;
                    let agree = signal
                        .iter()
                        .zip(companion.iter())
                        .filter(|(s, c)| (**s > **c) == closing_side)
                        .count();
                    record.insert(
                        "companion_agreement",
                        agree as f64 / signal.len() as f64,
                    );
                }
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use chrono::{TimeZone, Utc};

    fn price_signal_series(price: Vec<f64>, signal: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..price.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column(COLUMN_CLOSE, price)
            .unwrap()
            .with_column("osc", signal)
            .unwrap()
    }

    #[test]
    fn test_regular_bearish_divergence() {
        // Price peaks rise (10 -> 12) while signal peaks fall (5 -> 3).
        let price = vec![9.0, 10.0, 9.0, 11.0, 12.0, 11.0, 10.0];
        let signal = vec![4.0, 5.0, 2.0, 2.5, 3.0, 2.0, 1.0];
        let series = price_signal_series(price, signal);
        let window = series.window(0, 6).unwrap();

        let record = DivergenceMetric::new().compute(&window, "osc", None).unwrap();
        assert_eq!(record.values.get("regular_bearish").copied(), Some(1.0));
        assert_eq!(record.values.get("divergence_detected").copied(), Some(1.0));
    }

    #[test]
    fn test_agreement_has_no_divergence() {
        // Price and signal peaks move the same way.
        let price = vec![9.0, 10.0, 9.0, 11.0, 12.0, 11.0, 10.0];
        let signal = vec![1.0, 2.0, 1.0, 3.0, 4.0, 3.0, 2.0];
        let series = price_signal_series(price, signal);
        let window = series.window(0, 6).unwrap();

        let record = DivergenceMetric::new().compute(&window, "osc", None).unwrap();
        assert_eq!(record.values.get("regular_bearish").copied(), Some(0.0));
        assert_eq!(record.values.get("divergence_detected").copied(), Some(0.0));
    }

    #[test]
    fn test_companion_agreement_ratio() {
        let price = vec![9.0, 10.0, 9.0, 11.0, 12.0, 11.0, 10.0];
        let signal = vec![1.0, 2.0, 1.0, 3.0, 4.0, 3.0, 2.0];
        let mut series = price_signal_series(price, signal);
        // Companion sits below the signal on every sample, so the window
        // agrees with its closing side throughout.
        series
            .insert_column("osc_signal", vec![0.0, 1.0, 0.0, 2.0, 3.0, 2.0, 1.0])
            .unwrap();
        let window = series.window(0, 6).unwrap();

        let record = DivergenceMetric::new()
            .compute(&window, "osc", Some("osc_signal"))
            .unwrap();
        assert_eq!(record.values.get("companion_agreement").copied(), Some(1.0));
    }

    #[test]
    fn test_short_window_minimal_record() {
        let series = price_signal_series(vec![1.0, 2.0], vec![1.0, 2.0]);
        let window = series.window(0, 1).unwrap();

        let record = DivergenceMetric::new().compute(&window, "osc", None).unwrap();
        assert_eq!(record.values.len(), 1);
        assert_eq!(record.values.get("sample_count").copied(), Some(2.0));
    }

    #[test]
    fn test_missing_price_column_is_error() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..6)
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        let series = Series::new(timestamps)
            .unwrap()
            .with_column("osc", vec![1.0; 6])
            .unwrap();
        let window = series.window(0, 5).unwrap();

        let err = DivergenceMetric::new().compute(&window, "osc", None).unwrap_err();
        assert!(matches!(err, crate::metrics::MetricError::MissingColumn(_)));
    }
}
