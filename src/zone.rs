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

//! Zone record and the self-description metadata contract.
//!
//! A zone is one contiguous, categorized span of a source series. Its
//! structural fields are set once at detection time and never mutated; the
//! feature map is written exactly once by the extraction engine. Every
//! detection strategy is contractually required to attach metadata naming
//! itself ([`META_STRATEGY_NAME`]) and the column it decided on
//! ([`META_PRIMARY_COLUMN`]). Downstream consumers resolve columns through
//! [`Zone::resolve_primary_column`] / [`Zone::resolve_secondary_column`]
//! instead of guessing column names, which is what keeps the rest of the
//! pipeline signal-agnostic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::series::{Series, SeriesResult, SeriesWindow};

/// Required metadata key: name of the detection strategy that produced the zone
pub const META_STRATEGY_NAME: &str = "strategy_name";

/// Required metadata key: column the strategy used to decide the category
pub const META_PRIMARY_COLUMN: &str = "primary_signal_column";

/// Optional metadata key: companion column (e.g. a signal line)
pub const META_SECONDARY_COLUMN: &str = "secondary_signal_column";

/// Optional metadata key: serialized originating rule parameters
pub const META_RULE_PARAMETERS: &str = "raw_rule_parameters";

/// One detected zone: a contiguous categorized span of the source series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier, unique within one detection run
    pub id: u64,

    /// Open-string category label (e.g. "bull", "overbought")
    pub category: String,

    /// First sample position of the span (inclusive)
    pub start_index: usize,

    /// Last sample position of the span (inclusive)
    pub end_index: usize,

    /// Timestamp of the first sample
    pub start_time: DateTime<Utc>,

    /// Timestamp of the last sample
    pub end_time: DateTime<Utc>,

    /// Self-description metadata attached by the producing strategy
    pub metadata: HashMap<String, String>,

    /// Extracted features, populated exactly once by the extraction engine
    features: Option<HashMap<String, f64>>,
}

impl Zone {
    /// Create a new zone. Metadata starts empty; the producing detection
    /// strategy is responsible for filling the required keys.
    pub fn new(
        id: u64,
        category: &str,
        start_index: usize,
        end_index: usize,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            category: category.to_string(),
            start_index,
            end_index,
            start_time,
            end_time,
            metadata: HashMap::new(),
            features: None,
        }
    }

    /// Attach one metadata entry, returning the zone for chained setup.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Insert one metadata entry.
    pub fn insert_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Number of samples covered by the zone.
    pub fn duration(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Name of the strategy that produced this zone, if recorded.
    pub fn strategy_name(&self) -> Option<&str> {
        self.metadata.get(META_STRATEGY_NAME).map(|s| s.as_str())
    }

    /// Primary signal column recorded by the producing strategy.
    ///
    /// Never fails; absence of the key yields `None`.
    pub fn resolve_primary_column(&self) -> Option<&str> {
        self.metadata.get(META_PRIMARY_COLUMN).map(|s| s.as_str())
    }

    /// Secondary (companion) signal column, if the strategy recorded one.
    pub fn resolve_secondary_column(&self) -> Option<&str> {
        self.metadata.get(META_SECONDARY_COLUMN).map(|s| s.as_str())
    }

    /// The read-only series view covering this zone's span.
    pub fn window<'a>(&self, series: &'a Series) -> SeriesResult<SeriesWindow<'a>> {
        series.window(self.start_index, self.end_index)
    }

    /// Extracted feature values, if extraction has run.
    pub fn features(&self) -> Option<&HashMap<String, f64>> {
        self.features.as_ref()
    }

    /// Write the extracted feature map. The map is write-once: a second
    /// attach is ignored and reported, so structural zone state can never
    /// be silently rewritten after extraction.
    ///
    /// Returns true when the features were stored.
    pub fn attach_features(&mut self, features: HashMap<String, f64>) -> bool {
        if self.features.is_some() {
            warn!(zone_id = self.id, "Ignoring second feature attach for zone");
            return false;
        }

        self.features = Some(features);
        true
    }
}
