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

//! Detection strategies: pluggable segmentation of a series into zones.
//!
//! Each strategy implements [`ZoneDetector`] and is reachable through the
//! open [`DetectorRegistry`] by name. Rule parameters travel as an opaque
//! string-keyed JSON map; only the chosen strategy interprets its keys.

pub mod combined;
pub mod line_cross;
pub mod preloaded;
pub mod segmenter;
pub mod threshold;
pub mod zero_cross;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::series::Series;
use crate::zone::Zone;

pub use combined::{CombineMode, CombinedRulesDetector, CompareOp, ComparisonPredicate, ZonePredicate};
pub use line_cross::LineCrossDetector;
pub use preloaded::{PreloadedZoneDetector, ZoneImportRecord, ZoneImportTable};
pub use threshold::ThresholdDetector;
pub use zero_cross::ZeroCrossDetector;

/// Error types for detection operations
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Unknown detection strategy: {0}")]
    UnknownStrategy(String),

    #[error("Missing required rule parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid rule parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Column not found in series: {0}")]
    MissingColumn(String),

    #[error("Import validation failed: {0}")]
    ImportValidation(String),
}

/// Result type for detection operations
pub type DetectionResult<T> = Result<T, DetectionError>;

/// Configuration shared by all detection strategies.
///
/// `rules` is an open string-keyed map passed through opaquely; the config
/// object itself never interprets a rule key. `categories` is the set of
/// permitted labels: empty means unrestricted; when non-empty, zones with
/// an unlisted category are dropped after segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Zones shorter than this (in samples) are discarded, not merged
    pub min_duration: usize,

    /// Permitted category labels; empty means any label is allowed
    pub categories: Vec<String>,

    /// Freeform rule parameters, interpreted only by the chosen strategy
    pub rules: serde_json::Map<String, Value>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_duration: 1,
            categories: Vec::new(),
            rules: serde_json::Map::new(),
        }
    }
}

impl DetectionConfig {
    /// Set the minimum zone duration, returning the config for chained setup.
    pub fn with_min_duration(mut self, min_duration: usize) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// Restrict the permitted category labels.
    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Attach one rule parameter.
    pub fn with_rule(mut self, name: &str, value: Value) -> Self {
        self.rules.insert(name.to_string(), value);
        self
    }

    /// True when the label is permitted under the configured category set.
    pub fn permits_category(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == category)
    }

    /// String rule parameter, if present and a string.
    pub fn rule_str(&self, name: &str) -> Option<&str> {
        self.rules.get(name).and_then(|v| v.as_str())
    }

    /// String rule parameter with a default.
    pub fn rule_str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.rule_str(name).unwrap_or(default)
    }

    /// Required string rule parameter.
    pub fn require_rule_str(&self, name: &str) -> DetectionResult<&str> {
        self.rule_str(name)
            .ok_or_else(|| DetectionError::MissingParameter(name.to_string()))
    }

    /// Numeric rule parameter, if present and numeric.
    pub fn rule_f64(&self, name: &str) -> Option<f64> {
        self.rules.get(name).and_then(|v| v.as_f64())
    }

    /// Required numeric rule parameter.
    pub fn require_rule_f64(&self, name: &str) -> DetectionResult<f64> {
        self.rule_f64(name)
            .ok_or_else(|| DetectionError::MissingParameter(name.to_string()))
    }

    /// Boolean rule parameter with a default.
    pub fn rule_bool_or(&self, name: &str, default: bool) -> bool {
        self.rules
            .get(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// The rules serialized for traceability metadata.
    pub fn serialized_rules(&self) -> String {
        serde_json::to_string(&self.rules).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Trait implemented by every detection strategy.
///
/// Contract: every returned zone is time-ordered, non-overlapping, at least
/// `config.min_duration` samples long, and carries self-description
/// metadata: `strategy_name` plus a `primary_signal_column` that names a
/// column actually present in the source series.
pub trait ZoneDetector: Send + Sync {
    /// Registry name of the strategy.
    fn name(&self) -> &'static str;

    /// Segment the series into an ordered list of zones.
    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>>;
}

/// Factory closure producing a boxed detector.
///
/// A closure (rather than a fn pointer) so stateful strategies such as the
/// preloaded importer can be registered with their captured input.
pub type DetectorFactory = Arc<dyn Fn() -> Box<dyn ZoneDetector> + Send + Sync>;

/// Open name→factory registry of detection strategies.
///
/// New strategies register without touching existing code; unknown names
/// surface as [`DetectionError::UnknownStrategy`]. The registry itself is
/// plain owned state; there is no process-global instance.
pub struct DetectorRegistry {
    factories: HashMap<String, DetectorFactory>,
}

impl DetectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in rule strategies registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(zero_cross::STRATEGY_NAME, Arc::new(|| {
            Box::new(ZeroCrossDetector::new()) as Box<dyn ZoneDetector>
        }));
        registry.register(line_cross::STRATEGY_NAME, Arc::new(|| {
            Box::new(LineCrossDetector::new()) as Box<dyn ZoneDetector>
        }));
        registry.register(threshold::STRATEGY_NAME, Arc::new(|| {
            Box::new(ThresholdDetector::new()) as Box<dyn ZoneDetector>
        }));
        registry.register(combined::STRATEGY_NAME, Arc::new(|| {
            Box::new(CombinedRulesDetector::new()) as Box<dyn ZoneDetector>
        }));
        registry
    }

    /// Register (or replace) a strategy factory under a name.
    pub fn register(&mut self, name: &str, factory: DetectorFactory) {
        debug!(strategy = name, "Registering detection strategy");
        self.factories.insert(name.to_string(), factory);
    }

    /// True when a strategy with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered strategy names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate a strategy by name.
    pub fn create(&self, name: &str) -> DetectionResult<Box<dyn ZoneDetector>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| DetectionError::UnknownStrategy(name.to_string()))
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
