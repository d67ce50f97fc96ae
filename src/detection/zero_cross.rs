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

//! Zero-crossing detection: segments by the sign of one configured column.

use tracing::info;

use crate::detection::segmenter::zones_from_states;
use crate::detection::{DetectionConfig, DetectionError, DetectionResult, ZoneDetector};
use crate::series::Series;
use crate::zone::Zone;

/// Registry name of the zero-crossing strategy
pub const STRATEGY_NAME: &str = "zero_cross";

/// Segments a series by the sign of one column.
///
/// Rule parameters:
/// - `column` (required): the signal column whose sign is evaluated
/// - `positive_category` (default "bull"): label for positive samples
/// - `negative_category` (default "bear"): label for negative samples
///
/// Samples that are exactly zero or NaN carry no sign and are treated as
/// gaps.
#[derive(Debug, Clone, Default)]
pub struct ZeroCrossDetector;

impl ZeroCrossDetector {
    /// Create a new zero-crossing detector.
    pub fn new() -> Self {
        Self
    }
}

impl ZoneDetector for ZeroCrossDetector {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>> {
        let column = config.require_rule_str("column")?;
        let positive = config.rule_str_or("positive_category", "bull");
        let negative = config.rule_str_or("negative_category", "bear");

        if series.is_empty() {
            return Ok(Vec::new());
        }

        let values = series
            .column(column)
            .ok_or_else(|| DetectionError::MissingColumn(column.to_string()))?;

        let states: Vec<Option<String>> = values
            .iter()
            .map(|&v| {
                if v > 0.0 {
                    Some(positive.to_string())
                } else if v < 0.0 {
                    Some(negative.to_string())
                } else {
                    None
                }
            })
            .collect();

        let zones = zones_from_states(series, &states, config, STRATEGY_NAME, column, None, &[]);
        info!(
            strategy = STRATEGY_NAME,
            column,
            zones = zones.len(),
            "Detection complete"
        );
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn series_with(column: &str, values: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column(column, values)
            .unwrap()
    }

    #[test]
    fn test_alternating_signs() {
        let series = series_with("osc", vec![1.0, 2.0, -1.0, -2.0, 3.0, 4.0]);
        let config = DetectionConfig::default().with_rule("column", json!("osc"));

        let zones = ZeroCrossDetector::new().detect(&series, &config).unwrap();

        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].category, "bull");
        assert_eq!(zones[1].category, "bear");
        assert_eq!(zones[2].category, "bull");
        assert_eq!((zones[1].start_index, zones[1].end_index), (2, 3));
    }

    #[test]
    fn test_zero_samples_are_gaps() {
        let series = series_with("osc", vec![1.0, 0.0, 1.0]);
        let config = DetectionConfig::default().with_rule("column", json!("osc"));

        let zones = ZeroCrossDetector::new().detect(&series, &config).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!((zones[0].start_index, zones[0].end_index), (0, 0));
        assert_eq!((zones[1].start_index, zones[1].end_index), (2, 2));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let series = series_with("osc", vec![1.0]);
        let config = DetectionConfig::default().with_rule("column", json!("other"));

        let err = ZeroCrossDetector::new().detect(&series, &config).unwrap_err();
        assert!(matches!(err, DetectionError::MissingColumn(_)));
    }

    #[test]
    fn test_missing_parameter_is_fatal() {
        let series = series_with("osc", vec![1.0]);
        let config = DetectionConfig::default();

        let err = ZeroCrossDetector::new().detect(&series, &config).unwrap_err();
        assert!(matches!(err, DetectionError::MissingParameter(_)));
    }

    #[test]
    fn test_empty_series_returns_empty_list() {
        let series = Series::new(Vec::new()).unwrap();
        let config = DetectionConfig::default().with_rule("column", json!("osc"));

        let zones = ZeroCrossDetector::new().detect(&series, &config).unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn test_custom_categories() {
        let series = series_with("osc", vec![1.0, -1.0]);
        let config = DetectionConfig::default()
            .with_rule("column", json!("osc"))
            .with_rule("positive_category", json!("up"))
            .with_rule("negative_category", json!("down"));

        let zones = ZeroCrossDetector::new().detect(&series, &config).unwrap();
        assert_eq!(zones[0].category, "up");
        assert_eq!(zones[1].category, "down");
    }
}
