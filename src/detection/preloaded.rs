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

//! Preloaded-import detection: instead of computing per-sample state, this
//! strategy ingests an externally supplied tabular description of zones and
//! aligns each declared span against the actual series by nearest-timestamp
//! matching within a configurable tolerance.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::detection::{DetectionConfig, DetectionError, DetectionResult, ZoneDetector};
use crate::series::{Series, COLUMN_CLOSE};
use crate::zone::{
    Zone, META_PRIMARY_COLUMN, META_RULE_PARAMETERS, META_STRATEGY_NAME,
};

/// Registry name of the preloaded-import strategy
pub const STRATEGY_NAME: &str = "preloaded";

/// One externally declared zone span.
#[derive(Debug, Clone)]
pub struct ZoneImportRecord {
    /// Identifier from the external source, kept as metadata
    pub region_id: String,

    /// Category label of the declared span
    pub category: String,

    /// Declared start timestamp
    pub start_time: DateTime<Utc>,

    /// Declared end timestamp
    pub end_time: DateTime<Utc>,

    /// Extra columns from the import, copied verbatim into zone metadata
    pub extras: HashMap<String, String>,
}

/// An externally supplied tabular description of zones.
///
/// The required columns are `region_id`, `category`, `start_time` and
/// `end_time`; anything else is an optional extra carried through to zone
/// metadata. A row missing a required column is a hard validation error at
/// import time.
#[derive(Debug, Clone, Default)]
pub struct ZoneImportTable {
    records: Vec<ZoneImportRecord>,
}

impl ZoneImportTable {
    /// Build a table from already-validated records.
    pub fn from_records(records: Vec<ZoneImportRecord>) -> Self {
        Self { records }
    }

    /// Parse a table from a JSON array of row objects.
    pub fn from_json(raw: &str) -> DetectionResult<Self> {
        let rows: Vec<serde_json::Map<String, Value>> = serde_json::from_str(raw)
            .map_err(|e| DetectionError::ImportValidation(format!("malformed JSON: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            records.push(Self::record_from_row(i, row)?);
        }

        Ok(Self { records })
    }

    fn record_from_row(
        index: usize,
        row: &serde_json::Map<String, Value>,
    ) -> DetectionResult<ZoneImportRecord> {
        let required_str = |key: &str| -> DetectionResult<String> {
            row.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    DetectionError::ImportValidation(format!(
                        "row {} is missing required column {:?}",
                        index, key
                    ))
                })
        };
        let required_time = |key: &str| -> DetectionResult<DateTime<Utc>> {
            let raw = required_str(key)?;
            raw.parse::<DateTime<Utc>>().map_err(|e| {
                DetectionError::ImportValidation(format!(
                    "row {} column {:?} is not a valid timestamp: {}",
                    index, key, e
                ))
            })
        };

        let region_id = required_str("region_id")?;
        let category = required_str("category")?;
        let start_time = required_time("start_time")?;
        let end_time = required_time("end_time")?;
        if end_time < start_time {
            return Err(DetectionError::ImportValidation(format!(
                "row {} ends before it starts",
                index
            )));
        }

        let mut extras = HashMap::new();
        for (key, value) in row {
            if matches!(key.as_str(), "region_id" | "category" | "start_time" | "end_time") {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            extras.insert(key.clone(), rendered);
        }

        Ok(ZoneImportRecord {
            region_id,
            category,
            start_time,
            end_time,
            extras,
        })
    }

    /// Number of declared spans.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The declared spans.
    pub fn records(&self) -> &[ZoneImportRecord] {
        &self.records
    }
}

/// Imports externally detected zones and aligns them to the series.
///
/// Rule parameters:
/// - `tolerance_seconds` (default 60): maximum distance between a declared
///   timestamp and its nearest series sample
/// - `strict` (default false): when true, a span that cannot be aligned
///   (or overlaps a previously aligned span) is a hard error instead of
///   being skipped
/// - `primary_column` (default "close"): column recorded as the zone's
///   primary signal column; must exist in the series
#[derive(Debug, Clone, Default)]
pub struct PreloadedZoneDetector {
    table: ZoneImportTable,
}

impl PreloadedZoneDetector {
    /// Create a detector around an import table.
    pub fn new(table: ZoneImportTable) -> Self {
        Self { table }
    }

    fn align_endpoint(
        series: &Series,
        target: DateTime<Utc>,
        tolerance_seconds: f64,
    ) -> Option<usize> {
        let index = series.nearest_index(target)?;
        let matched = series.timestamps()[index];
        let distance = (matched - target).num_milliseconds().abs() as f64 / 1000.0;
        if distance <= tolerance_seconds {
            Some(index)
        } else {
            None
        }
    }
}

impl ZoneDetector for PreloadedZoneDetector {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn detect(&self, series: &Series, config: &DetectionConfig) -> DetectionResult<Vec<Zone>> {
        let tolerance_seconds = config.rule_f64("tolerance_seconds").unwrap_or(60.0);
        let strict = config.rule_bool_or("strict", false);
        let primary_column = config.rule_str_or("primary_column", COLUMN_CLOSE);

        if series.is_empty() {
            return Ok(Vec::new());
        }
        if !series.has_column(primary_column) {
            return Err(DetectionError::MissingColumn(primary_column.to_string()));
        }

        let serialized_rules = config.serialized_rules();
        let min_duration = config.min_duration.max(1);

        // Records sorted by declared start so ids and overlap checks follow
        // series order regardless of import row order.
        let mut ordered: Vec<&ZoneImportRecord> = self.table.records().iter().collect();
        ordered.sort_by_key(|r| r.start_time);

        let mut zones: Vec<Zone> = Vec::new();
        let mut skipped = 0usize;
        for record in ordered {
            let aligned = Self::align_endpoint(series, record.start_time, tolerance_seconds)
                .zip(Self::align_endpoint(series, record.end_time, tolerance_seconds));

            let (start_index, end_index) = match aligned {
                Some(span) => span,
                None => {
                    if strict {
                        return Err(DetectionError::ImportValidation(format!(
                            "span {:?} has no series data within {}s tolerance",
                            record.region_id, tolerance_seconds
                        )));
                    }
                    warn!(
                        region_id = %record.region_id,
                        "Skipping imported span with no matching data"
                    );
                    skipped += 1;
                    continue;
                }
            };

            if let Some(previous) = zones.last() {
                if start_index <= previous.end_index {
                    if strict {
                        return Err(DetectionError::ImportValidation(format!(
                            "span {:?} overlaps a previously aligned span",
                            record.region_id
                        )));
                    }
                    warn!(region_id = %record.region_id, "Skipping overlapping imported span");
                    skipped += 1;
                    continue;
                }
            }

            let duration = end_index - start_index + 1;
            if duration < min_duration || !config.permits_category(&record.category) {
                skipped += 1;
                continue;
            }

            let mut zone = Zone::new(
                zones.len() as u64,
                &record.category,
                start_index,
                end_index,
                series.timestamps()[start_index],
                series.timestamps()[end_index],
            )
            .with_metadata(META_STRATEGY_NAME, STRATEGY_NAME)
            .with_metadata(META_PRIMARY_COLUMN, primary_column)
            .with_metadata(META_RULE_PARAMETERS, &serialized_rules)
            .with_metadata("import_region_id", &record.region_id);

            for (key, value) in &record.extras {
                zone.insert_metadata(key, value);
            }

            zones.push(zone);
        }

        info!(
            strategy = STRATEGY_NAME,
            imported = zones.len(),
            skipped,
            "Import alignment complete"
        );
        Ok(zones)
    }
}
