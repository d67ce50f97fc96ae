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

//! Swing metric: local peak/trough structure of price inside a zone.
//!
//! Computed purely from price (close by default, high/low for the extrema
//! scan), independent of which signal triggered the zone. Two scanners are
//! supported and selectable by name: a simple local-extrema scan and a
//! deviation-threshold zigzag scan.

use serde::{Deserialize, Serialize};

use crate::metrics::{require_column, MetricError, MetricRecord, MetricResult, ZoneMetric};
use crate::series::{SeriesWindow, COLUMN_CLOSE};
use crate::stats::mean;

/// A detected swing point
#[derive(Debug, Clone, Copy, PartialEq)]
enum SwingKind {
    High,
    Low,
}

/// Selectable swing scanning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SwingScanner {
    /// Samples strictly above/below their immediate neighborhood
    LocalExtrema {
        /// Neighbor count on each side
        window: usize,
    },

    /// Pivot reversal once price retraces a minimum percentage
    ZigZag {
        /// Reversal threshold as a fraction (0.05 = 5%)
        deviation: f64,
    },
}

impl SwingScanner {
    /// Resolve a scanner from its registry spelling.
    pub fn by_name(name: &str) -> MetricResult<Self> {
        match name {
            "local_extrema" => Ok(SwingScanner::LocalExtrema { window: 1 }),
            "zigzag" => Ok(SwingScanner::ZigZag { deviation: 0.03 }),
            other => Err(MetricError::InvalidConfiguration(format!(
                "unknown swing scanner {:?}",
                other
            ))),
        }
    }
}

/// Computes swing counts, retracement depth and swing timing from price.
#[derive(Debug, Clone)]
pub struct SwingMetric {
    scanner: SwingScanner,

    /// Fewest samples needed for a meaningful scan
    min_samples: usize,
}

impl Default for SwingMetric {
    fn default() -> Self {
        Self {
            scanner: SwingScanner::LocalExtrema { window: 1 },
            min_samples: 5,
        }
    }
}

impl SwingMetric {
    /// Create a swing metric with the local-extrema scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a swing metric with an explicit scanner.
    pub fn with_scanner(scanner: SwingScanner) -> Self {
        Self {
            scanner,
            ..Self::default()
        }
    }

    /// Create a swing metric with a scanner resolved by name.
    pub fn with_scanner_name(name: &str) -> MetricResult<Self> {
        Ok(Self::with_scanner(SwingScanner::by_name(name)?))
    }

    /// Swing points as (index, price, kind), ordered by index.
    fn scan(&self, closes: &[f64]) -> Vec<(usize, f64, SwingKind)> {
        match self.scanner {
            SwingScanner::LocalExtrema { window } => Self::scan_local_extrema(closes, window),
            SwingScanner::ZigZag { deviation } => Self::scan_zigzag(closes, deviation),
        }
    }

    fn scan_local_extrema(closes: &[f64], k: usize) -> Vec<(usize, f64, SwingKind)> {
        let k = k.max(1);
        if closes.len() < 2 * k + 1 {
            return Vec::new();
        }

        let mut swings = Vec::new();
        for i in k..closes.len() - k {
            let is_high = (1..=k)
                .all(|offset| closes[i] > closes[i - offset] && closes[i] > closes[i + offset]);
            let is_low = (1..=k)
                .all(|offset| closes[i] < closes[i - offset] && closes[i] < closes[i + offset]);
            if is_high {
                swings.push((i, closes[i], SwingKind::High));
            } else if is_low {
                swings.push((i, closes[i], SwingKind::Low));
            }
        }
        swings
    }

    fn scan_zigzag(closes: &[f64], deviation: f64) -> Vec<(usize, f64, SwingKind)> {
        if closes.len() < 2 {
            return Vec::new();
        }

        let mut swings = Vec::new();
        let mut pivot_index = 0usize;
        let mut pivot_price = closes[0];
        // Direction is unknown until the first move exceeds the deviation.
        let mut rising: Option<bool> = None;

        for (i, &price) in closes.iter().enumerate().skip(1) {
            match rising {
                None => {
                    if pivot_price > 0.0 && (price - pivot_price).abs() / pivot_price >= deviation {
                        rising = Some(price > pivot_price);
                        pivot_index = i;
                        pivot_price = price;
                    }
                }
                Some(true) => {
                    if price > pivot_price {
                        pivot_index = i;
                        pivot_price = price;
                    } else if pivot_price > 0.0
                        && (pivot_price - price) / pivot_price >= deviation
                    {
                        swings.push((pivot_index, pivot_price, SwingKind::High));
                        rising = Some(false);
                        pivot_index = i;
                        pivot_price = price;
                    }
                }
                Some(false) => {
                    if price < pivot_price {
                        pivot_index = i;
                        pivot_price = price;
                    } else if pivot_price > 0.0
                        && (price - pivot_price) / pivot_price >= deviation
                    {
                        swings.push((pivot_index, pivot_price, SwingKind::Low));
                        rising = Some(true);
                        pivot_index = i;
                        pivot_price = price;
                    }
                }
            }
        }

        swings
    }
}

impl ZoneMetric for SwingMetric {
    fn name(&self) -> &'static str {
        "swing"
    }

    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        _primary_column: &str,
        _secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord> {
        let closes = require_column(window, COLUMN_CLOSE)?;

        if closes.len() < self.min_samples {
            return Ok(MetricRecord::minimal(self.name(), closes.len()));
        }

        let swings = self.scan(closes);
        let high_count = swings
            .iter()
            .filter(|(_, _, kind)| *kind == SwingKind::High)
            .count();
        let low_count = swings.len() - high_count;

        let mut record = MetricRecord::new(self.name())
            .with_value("sample_count", closes.len() as f64)
            .with_value("swing_high_count", high_count as f64)
            .with_value("swing_low_count", low_count as f64);

        // Retracement: how far each leg gives back the previous leg.
        let mut retracements = Vec::new();
        for legs in swings.windows(3) {
            let (_, first, _) = legs[0];
            let (_, second, _) = legs[1];
            let (_, third, _) = legs[2];
            let leg = (second - first).abs();
            if leg > 0.0 {
                retracements.push((third - second).abs() / leg * 100.0);
            }
        }
        if !retracements.is_empty() {
            record.insert("avg_retracement_pct", mean(&retracements));
        }

        if let Some((last_index, _, _)) = swings.last() {
            record.insert(
                "last_swing_position",
                *last_index as f64 / (closes.len() - 1) as f64,
            );
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use chrono::{TimeZone, Utc};

    fn close_series(closes: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..closes.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column(COLUMN_CLOSE, closes)
            .unwrap()
    }

    #[test]
    fn test_local_extrema_counts() {
        let series = close_series(vec![1.0, 3.0, 2.0, 4.0, 1.5, 5.0, 2.0]);
        let window = series.window(0, 6).unwrap();

        let record = SwingMetric::new().compute(&window, "sig", None).unwrap();
        assert_eq!(record.values.get("swing_high_count").copied(), Some(3.0));
        assert_eq!(record.values.get("swing_low_count").copied(), Some(2.0));
        assert!(record.values.contains_key("avg_retracement_pct"));
        assert!(*record.values.get("last_swing_position").unwrap() <= 1.0);
    }

    #[test]
    fn test_zigzag_ignores_small_wiggles() {
        // 1% wiggles around 100 then a 10% leg down; only the big reversal
        // should register with a 3% deviation threshold.
        let series = close_series(vec![
            100.0, 101.0, 100.0, 101.0, 100.5, 110.0, 99.0, 98.0, 97.0,
        ]);
        let window = series.window(0, 8).unwrap();

        let record = SwingMetric::with_scanner_name("zigzag")
            .unwrap()
            .compute(&window, "sig", None)
            .unwrap();

        assert_eq!(record.values.get("swing_high_count").copied(), Some(1.0));
        assert_eq!(record.values.get("swing_low_count").copied(), Some(0.0));
    }

    #[test]
    fn test_unknown_scanner_name_rejected() {
        let err = SwingMetric::with_scanner_name("fractal").unwrap_err();
        assert!(matches!(err, MetricError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_short_window_minimal_record() {
        let series = close_series(vec![1.0, 2.0, 3.0]);
        let window = series.window(0, 2).unwrap();

        let record = SwingMetric::new().compute(&window, "sig", None).unwrap();
        assert_eq!(record.values.len(), 1);
    }
}
