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

//! Combined-rules detection: segments by a logical AND/OR combination of
//! injected boolean predicates over the series.

use std::sync::Arc;

use tracing::info;

use crate::detection::segmenter::zones_from_states;
use crate::detection::{DetectionConfig, DetectionError, DetectionResult, ZoneDetector};
use crate::series::Series;
use crate::zone::Zone;

/// Registry name of the combined-rules strategy
pub const STRATEGY_NAME: &str = "combined";

/// A boolean condition evaluated per sample of a series.
pub trait ZonePredicate: Send + Sync {
    /// Descriptive name of the predicate.
    fn name(&self) -> &str;

    /// The column the predicate reads.
    fn column(&self) -> &str;

    /// Evaluate the predicate at one sample position.
    fn evaluate(&self, series: &Series, index: usize) -> bool;
}

/// Comparison operator for [`ComparisonPredicate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl CompareOp {
    /// Parse an operator from its rule spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gt" | ">" => Some(CompareOp::GreaterThan),
            "lt" | "<" => Some(CompareOp::LessThan),
            "ge" | ">=" => Some(CompareOp::GreaterOrEqual),
            "le" | "<=" => Some(CompareOp::LessOrEqual),
            _ => None,
        }
    }

    fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::GreaterThan => left > right,
            CompareOp::LessThan => left < right,
            CompareOp::GreaterOrEqual => left >= right,
            CompareOp::LessOrEqual => left <= right,
        }
    }
}

/// Predicate comparing one column against a constant.
#[derive(Debug, Clone)]
pub struct ComparisonPredicate {
    name: String,
    column: String,
    op: CompareOp,
    value: f64,
}

impl ComparisonPredicate {
    /// Create a comparison predicate over a named column.
    pub fn new(column: &str, op: CompareOp, value: f64) -> Self {
        Self {
            name: format!("{}_{:?}_{}", column, op, value),
            column: column.to_string(),
            op,
            value,
        }
    }
}

impl ZonePredicate for ComparisonPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn evaluate(&self, series: &Series, index: usize) -> bool {
        series
            .value(&self.column, index)
            .map(|v| !v.is_nan() && self.op.apply(v, self.value))
            .unwrap_or(false)
    }
}

/// How predicate results combine into one per-sample decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    /// Every predicate must hold (logical AND)
    All,

    /// At least one predicate must hold (logical OR)
    Any,
}

/// Segments a series by an AND/OR combination of boolean predicates.
///
/// Predicates are injected at construction, or built from rules when the
/// detector comes out of the registry. Rule parameters:
/// - `predicates`: array of `{column, op, value}` comparison specs
///   (required only when no predicates were injected)
/// - `mode` (default "all"): "all" or "any"
/// - `match_category` (default "active"): label while the combination holds
/// - `no_match_category` (optional): label while it does not; when absent,
///   non-matching samples are gaps
///
/// The first predicate's column is recorded as the zone's primary signal
/// column.
#[derive(Clone, Default)]
pub struct CombinedRulesDetector {
    predicates: Vec<Arc<dyn ZonePredicate>>,
}

impl CombinedRulesDetector {
    /// Create a detector with no injected predicates; they must then come
    /// from the `predicates` rule parameter.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Create a detector around injected predicates.
    pub fn with_predicates(predicates: Vec<Arc<dyn ZonePredicate>>) -> Self {
        Self { predicates }
    }

    fn parse_mode(config: &DetectionConfig) -> DetectionResult<CombineMode> {
        match config.rule_str_or("mode", "all") {
            "all" => Ok(CombineMode::All),
            "any" => Ok(CombineMode::Any),
            other => Err(DetectionError::InvalidParameter {
                name: "mode".to_string(),
                reason: format!("expected \"all\" or \"any\", got {:?}", other),
            }),
        }
    }

    /// Build comparison predicates from the `predicates` rule array.
    fn predicates_from_rules(
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<Arc<dyn ZonePredicate>>> {
        let specs = config
            .rules
            .get("predicates")
            .and_then(|v| v.as_array())
            .ok_or_else(|| DetectionError::MissingParameter("predicates".to_string()))?;

        let mut predicates: Vec<Arc<dyn ZonePredicate>> = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let column = spec
                .get("column")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DetectionError::MissingParameter(format!("predicates[{}].column", i)))?;
            let op_name = spec
                .get("op")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DetectionError::MissingParameter(format!("predicates[{}].op", i)))?;
            let value = spec
                .get("value")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| DetectionError::MissingParameter(format!("predicates[{}].value", i)))?;
            let op = CompareOp::from_name(op_name).ok_or_else(|| DetectionError::InvalidParameter {
                name: format!("predicates[{}].op", i),
                reason: format!("unknown operator {:?}", op_name),
            })?;

            predicates.push(Arc::new(ComparisonPredicate::new(column, op, value)));
        }

        Ok(predicates)
    }
}

impl ZoneDetector for CombinedRulesDetector {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>> {
        let mode = Self::parse_mode(config)?;
        let match_category = config.rule_str_or("match_category", "active");
        let no_match_category = config.rule_str("no_match_category");

        let predicates = if self.predicates.is_empty() {
            Self::predicates_from_rules(config)?
        } else {
            self.predicates.clone()
        };
        if predicates.is_empty() {
            return Err(DetectionError::MissingParameter("predicates".to_string()));
        }

        // Every referenced column must exist before any sample is evaluated.
        for predicate in &predicates {
            if !series.has_column(predicate.column()) && !series.is_empty() {
                return Err(DetectionError::MissingColumn(predicate.column().to_string()));
            }
        }

        if series.is_empty() {
            return Ok(Vec::new());
        }

        let states: Vec<Option<String>> = (0..series.len())
            .map(|index| {
                let holds = match mode {
                    CombineMode::All => predicates.iter().all(|p| p.evaluate(series, index)),
                    CombineMode::Any => predicates.iter().any(|p| p.evaluate(series, index)),
                };
                if holds {
                    Some(match_category.to_string())
                } else {
                    no_match_category.map(|c| c.to_string())
                }
            })
            .collect();

        let primary_column = predicates[0].column().to_string();
        let extras = vec![
            ("combine_mode".to_string(), format!("{:?}", mode).to_lowercase()),
            ("predicate_count".to_string(), predicates.len().to_string()),
        ];

        let zones = zones_from_states(
            series,
            &states,
            config,
            STRATEGY_NAME,
            &primary_column,
            None,
            &extras,
        );
        info!(
            strategy = STRATEGY_NAME,
            predicates = predicates.len(),
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

    fn two_column_series() -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..5)
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        Series::new(timestamps)
            .unwrap()
            .with_column("trend", vec![1.0, 1.0, 1.0, -1.0, -1.0])
            .unwrap()
            .with_column("strength", vec![10.0, 60.0, 70.0, 80.0, 5.0])
            .unwrap()
    }

    fn injected_predicates() -> Vec<Arc<dyn ZonePredicate>> {
        vec![
            Arc::new(ComparisonPredicate::new("trend", CompareOp::GreaterThan, 0.0)),
            Arc::new(ComparisonPredicate::new(
                "strength",
                CompareOp::GreaterOrEqual,
                50.0,
            )),
        ]
    }

    #[test]
    fn test_all_mode_requires_every_predicate() {
        let series = two_column_series();
        let detector = CombinedRulesDetector::with_predicates(injected_predicates());
        let config = DetectionConfig::default();

        let zones = detector.detect(&series, &config).unwrap();

        // Only samples 1 and 2 satisfy both conditions.
        assert_eq!(zones.len(), 1);
        assert_eq!((zones[0].start_index, zones[0].end_index), (1, 2));
        assert_eq!(zones[0].category, "active");
        assert_eq!(zones[0].resolve_primary_column(), Some("trend"));
    }

    #[test]
    fn test_any_mode_with_else_category() {
        let series = two_column_series();
        let detector = CombinedRulesDetector::with_predicates(injected_predicates());
        let config = DetectionConfig::default()
            .with_rule("mode", json!("any"))
            .with_rule("no_match_category", json!("idle"));

        let zones = detector.detect(&series, &config).unwrap();

        // Samples 0..=3 satisfy at least one condition, sample 4 neither.
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].category, "active");
        assert_eq!((zones[0].start_index, zones[0].end_index), (0, 3));
        assert_eq!(zones[1].category, "idle");
    }

    #[test]
    fn test_predicates_from_rules() {
        let series = two_column_series();
        let detector = CombinedRulesDetector::new();
        let config = DetectionConfig::default().with_rule(
            "predicates",
            json!([{"column": "strength", "op": "gt", "value": 50.0}]),
        );

        let zones = detector.detect(&series, &config).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!((zones[0].start_index, zones[0].end_index), (1, 3));
    }

    #[test]
    fn test_missing_predicate_column_is_fatal() {
        let series = two_column_series();
        let detector = CombinedRulesDetector::with_predicates(vec![Arc::new(
            ComparisonPredicate::new("absent", CompareOp::GreaterThan, 0.0),
        )]);

        let err = detector.detect(&series, &DetectionConfig::default()).unwrap_err();
        assert!(matches!(err, DetectionError::MissingColumn(_)));
    }

    #[test]
    fn test_no_predicates_is_configuration_error() {
        let series = two_column_series();
        let detector = CombinedRulesDetector::new();

        let err = detector.detect(&series, &DetectionConfig::default()).unwrap_err();
        assert!(matches!(err, DetectionError::MissingParameter(_)));
    }
}
