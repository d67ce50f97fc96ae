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

//! Threshold detection: segments by bucket membership against one or two
//! configured bounds, supporting three-category banded setups such as
//! overbought / neutral / oversold.

use tracing::info;

use crate::detection::segmenter::zones_from_states;
use crate::detection::{DetectionConfig, DetectionError, DetectionResult, ZoneDetector};
use crate::series::Series;
use crate::zone::Zone;

/// Registry name of the threshold strategy
pub const STRATEGY_NAME: &str = "threshold";

/// Segments a series by bucket membership against one or two thresholds.
///
/// Rule parameters:
/// - `column` (required): the signal column bucketed
/// - `upper` / `lower`: threshold bounds; at least one is required, and
///   when both are given `upper` must exceed `lower`
/// - `upper_category` (default "overbought"): label for values above `upper`
/// - `middle_category` (default "neutral"): label for values between bounds
/// - `lower_category` (default "oversold"): label for values below `lower`
///
/// With a single bound the output degenerates to two buckets (above/below
/// resolve to the middle label on the open side). NaN samples are gaps.
/// The configured bounds are recorded as metadata extras on every zone.
#[derive(Debug, Clone, Default)]
pub struct ThresholdDetector;

impl ThresholdDetector {
    /// Create a new threshold detector.
    pub fn new() -> Self {
        Self
    }
}

impl ZoneDetector for ThresholdDetector {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>> {
        let column = config.require_rule_str("column")?;
        let upper = config.rule_f64("upper");
        let lower = config.rule_f64("lower");
        let upper_category = config.rule_str_or("upper_category", "overbought");
        let middle_category = config.rule_str_or("middle_category", "neutral");
        let lower_category = config.rule_str_or("lower_category", "oversold");

        if upper.is_none() && lower.is_none() {
            return Err(DetectionError::MissingParameter(
                "upper or lower".to_string(),
            ));
        }
        if let (Some(u), Some(l)) = (upper, lower) {
            if u <= l {
                return Err(DetectionError::InvalidParameter {
                    name: "upper".to_string(),
                    reason: format!("upper bound {} must exceed lower bound {}", u, l),
                });
            }
        }

        if series.is_empty() {
            return Ok(Vec::new());
        }

        let values = series
            .column(column)
            .ok_or_else(|| DetectionError::MissingColumn(column.to_string()))?;

        let states: Vec<Option<String>> = values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    return None;
                }
                if let Some(u) = upper {
                    if v > u {
                        return Some(upper_category.to_string());
                    }
                }
                if let Some(l) = lower {
                    if v < l {
                        return Some(lower_category.to_string());
                    }
                }
                Some(middle_category.to_string())
            })
            .collect();

        let mut extras = Vec::new();
        if let Some(u) = upper {
            extras.push(("upper_threshold".to_string(), u.to_string()));
        }
        if let Some(l) = lower {
            extras.push(("lower_threshold".to_string(), l.to_string()));
        }

        let zones = zones_from_states(series, &states, config, STRATEGY_NAME, column, None, &extras);
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

    fn series_with(values: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column("rsi", values)
            .unwrap()
    }

    fn banded_config() -> DetectionConfig {
        DetectionConfig::default()
            .with_rule("column", json!("rsi"))
            .with_rule("upper", json!(70.0))
            .with_rule("lower", json!(30.0))
    }

    #[test]
    fn test_three_band_sequence() {
        // Rises above 70, falls below 30, settles between the bounds.
        let series = series_with(vec![75.0, 80.0, 25.0, 20.0, 50.0, 50.0]);

        let zones = ThresholdDetector::new().detect(&series, &banded_config()).unwrap();

        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].category, "overbought");
        assert_eq!(zones[1].category, "oversold");
        assert_eq!(zones[2].category, "neutral");
    }

    #[test]
    fn test_every_sample_bucketed_consistently() {
        let values = vec![10.0, 45.0, 72.0, 69.9, 30.1, 29.9, 88.0];
        let series = series_with(values.clone());

        let zones = ThresholdDetector::new().detect(&series, &banded_config()).unwrap();

        for zone in &zones {
            for i in zone.start_index..=zone.end_index {
                let v = values[i];
                let expected = if v > 70.0 {
                    "overbought"
                } else if v < 30.0 {
                    "oversold"
                } else {
                    "neutral"
                };
                assert_eq!(zone.category, expected, "sample {} value {}", i, v);
            }
        }
    }

    #[test]
    fn test_threshold_extras_recorded() {
        let series = series_with(vec![80.0, 80.0]);

        let zones = ThresholdDetector::new().detect(&series, &banded_config()).unwrap();
        assert_eq!(
            zones[0].metadata.get("upper_threshold").map(|s| s.as_str()),
            Some("70")
        );
        assert_eq!(
            zones[0].metadata.get("lower_threshold").map(|s| s.as_str()),
            Some("30")
        );
    }

    #[test]
    fn test_single_bound() {
        let series = series_with(vec![80.0, 50.0]);
        let config = DetectionConfig::default()
            .with_rule("column", json!("rsi"))
            .with_rule("upper", json!(70.0));

        let zones = ThresholdDetector::new().detect(&series, &config).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].category, "overbought");
        assert_eq!(zones[1].category, "neutral");
    }

    #[test]
    fn test_missing_bounds_is_configuration_error() {
        let series = series_with(vec![1.0]);
        let config = DetectionConfig::default().with_rule("column", json!("rsi"));

        let err = ThresholdDetector::new().detect(&series, &config).unwrap_err();
        assert!(matches!(err, DetectionError::MissingParameter(_)));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let series = series_with(vec![1.0]);
        let config = DetectionConfig::default()
            .with_rule("column", json!("rsi"))
            .with_rule("upper", json!(30.0))
            .with_rule("lower", json!(70.0));

        let err = ThresholdDetector::new().detect(&series, &config).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { .. }));
    }
}
