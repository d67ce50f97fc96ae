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

//! Line-crossing detection: segments by the relative order of two columns,
//! the classic main-line versus signal-line setup.

use tracing::info;

use crate::detection::segmenter::zones_from_states;
use crate::detection::{DetectionConfig, DetectionError, DetectionResult, ZoneDetector};
use crate::series::Series;
use crate::zone::Zone;

/// Registry name of the line-crossing strategy
pub const STRATEGY_NAME: &str = "line_cross";

/// Segments a series by the relative order of two columns.
///
/// Rule parameters:
/// - `column` (required): the main line
/// - `signal_column` (required): the companion line compared against
/// - `above_category` (default "bull"): label while main > companion
/// - `below_category` (default "bear"): label while main < companion
///
/// Samples where the two lines are exactly equal, or either value is NaN,
/// are gaps. The companion line is recorded as the zone's secondary signal
/// column.
#[derive(Debug, Clone, Default)]
pub struct LineCrossDetector;

impl LineCrossDetector {
    /// Create a new line-crossing detector.
    pub fn new() -> Self {
        Self
    }
}

impl ZoneDetector for LineCrossDetector {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>> {
        let column = config.require_rule_str("column")?;
        let signal_column = config.require_rule_str("signal_column")?;
        let above = config.rule_str_or("above_category", "bull");
        let below = config.rule_str_or("below_category", "bear");

        if series.is_empty() {
            return Ok(Vec::new());
        }

        let main = series
            .column(column)
            .ok_or_else(|| DetectionError::MissingColumn(column.to_string()))?;
        let companion = series
            .column(signal_column)
            .ok_or_else(|| DetectionError::MissingColumn(signal_column.to_string()))?;

        let states: Vec<Option<String>> = main
            .iter()
            .zip(companion.iter())
            .map(|(&a, &b)| {
                if a.is_nan() || b.is_nan() {
                    None
                } else if a > b {
                    Some(above.to_string())
                } else if a < b {
                    Some(below.to_string())
                } else {
                    None
                }
            })
            .collect();

        let zones = zones_from_states(
            series,
            &states,
            config,
            STRATEGY_NAME,
            column,
            Some(signal_column),
            &[],
        );
        info!(
            strategy = STRATEGY_NAME,
            column,
            signal_column,
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

    fn two_line_series(main: Vec<f64>, companion: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..main.len())
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column("fast_line", main)
            .unwrap()
            .with_column("slow_line", companion)
            .unwrap()
    }

    fn cross_config() -> DetectionConfig {
        DetectionConfig::default()
            .with_rule("column", json!("fast_line"))
            .with_rule("signal_column", json!("slow_line"))
    }

    #[test]
    fn test_cross_over_and_under() {
        let series = two_line_series(
            vec![1.0, 2.0, 3.0, 1.0, 0.5],
            vec![2.0, 2.5, 2.0, 2.0, 2.0],
        );

        let zones = LineCrossDetector::new().detect(&series, &cross_config()).unwrap();

        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].category, "bear");
        assert_eq!(zones[1].category, "bull");
        assert_eq!(zones[2].category, "bear");
        assert_eq!((zones[1].start_index, zones[1].end_index), (2, 2));
    }

    #[test]
    fn test_secondary_column_recorded() {
        let series = two_line_series(vec![3.0, 3.0], vec![1.0, 1.0]);

        let zones = LineCrossDetector::new().detect(&series, &cross_config()).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].resolve_primary_column(), Some("fast_line"));
        assert_eq!(zones[0].resolve_secondary_column(), Some("slow_line"));
    }

    #[test]
    fn test_missing_signal_column_is_fatal() {
        let series = two_line_series(vec![1.0], vec![1.0]);
        let config = DetectionConfig::default()
            .with_rule("column", json!("fast_line"))
            .with_rule("signal_column", json!("absent"));

        let err = LineCrossDetector::new().detect(&series, &config).unwrap_err();
        assert!(matches!(err, DetectionError::MissingColumn(_)));
    }
}
