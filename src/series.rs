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

//! Time-indexed numeric series consumed by the detection and metric layers.
//! A series is a read-only table: one ascending timestamp index plus any
//! number of named f64 columns. Nothing in this crate mutates a series after
//! construction; zones and metric computations only ever hold index-range
//! views into it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural column name for the open price
pub const COLUMN_OPEN: &str = "open";

/// Structural column name for the high price
pub const COLUMN_HIGH: &str = "high";

/// Structural column name for the low price
pub const COLUMN_LOW: &str = "low";

/// Structural column name for the close price
pub const COLUMN_CLOSE: &str = "close";

/// Structural column name for the traded volume
pub const COLUMN_VOLUME: &str = "volume";

/// Error types for series construction and access
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("Column {name} has {actual} values, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Timestamps must be in ascending order (violation at index {0})")]
    UnorderedTimestamps(usize),

    #[error("Invalid span [{start}, {end}] for series of length {len}")]
    InvalidSpan {
        start: usize,
        end: usize,
        len: usize,
    },
}

/// Result type for series operations
pub type SeriesResult<T> = Result<T, SeriesError>;

/// A time-indexed numeric table with named f64 columns.
///
/// The timestamp index is validated to be ascending at construction time so
/// nearest-timestamp lookups can binary search. Columns are an open set of
/// names; no component of this crate assumes any column beyond the
/// structural OHLCV names exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// Ascending timestamp index
    timestamps: Vec<DateTime<Utc>>,

    /// Named numeric columns, each the same length as the index
    columns: HashMap<String, Vec<f64>>,
}

impl Series {
    /// Create a new series from an ascending timestamp index.
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> SeriesResult<Self> {
        for i in 1..timestamps.len() {
            if timestamps[i] < timestamps[i - 1] {
                return Err(SeriesError::UnorderedTimestamps(i));
            }
        }

        Ok(Self {
            timestamps,
            columns: HashMap::new(),
        })
    }

    /// Add a column, consuming and returning the series for chained setup.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> SeriesResult<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a column. The column length must match the index.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) -> SeriesResult<()> {
        if values.len() != self.timestamps.len() {
            return Err(SeriesError::LengthMismatch {
                name: name.to_string(),
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }

        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Number of samples in the series.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The full timestamp index.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Timestamp at a sample position, if in range.
    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(index).copied()
    }

    /// Full values of a named column, if present.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// True when a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Single value of a named column at a sample position.
    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.get(index)).copied()
    }

    /// All column names in sorted order.
    ///
    /// Sorted so that any iteration-order-sensitive consumer (the fallback
    /// column heuristic, clustering feature composition) is deterministic.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// A read-only view over the inclusive sample span `[start, end]`.
    pub fn window(&self, start: usize, end: usize) -> SeriesResult<SeriesWindow<'_>> {
        if start > end || end >= self.timestamps.len() {
            return Err(SeriesError::InvalidSpan {
                start,
                end,
                len: self.timestamps.len(),
            });
        }

        Ok(SeriesWindow {
            series: self,
            start,
            end,
        })
    }

    /// Index of the sample whose timestamp is nearest to `target`.
    ///
    /// Returns `None` on an empty series. Ties between equally distant
    /// neighbors resolve to the earlier sample.
    pub fn nearest_index(&self, target: DateTime<Utc>) -> Option<usize> {
        if self.timestamps.is_empty() {
            return None;
        }

        let pos = self.timestamps.partition_point(|ts| *ts < target);
        if pos == 0 {
            return Some(0);
        }
        if pos == self.timestamps.len() {
            return Some(self.timestamps.len() - 1);
        }

        let before = (target - self.timestamps[pos - 1]).num_milliseconds().abs();
        let after = (self.timestamps[pos] - target).num_milliseconds().abs();
        if before <= after {
            Some(pos - 1)
        } else {
            Some(pos)
        }
    }
}

/// A read-only view over an inclusive index span of a [`Series`].
///
/// The view borrows the series; it never copies column data. Metric
/// strategies receive windows, so a zone's feature computation can also
/// reach the full underlying series for series-wide baselines.
#[derive(Debug, Clone, Copy)]
pub struct SeriesWindow<'a> {
    series: &'a Series,
    start: usize,
    end: usize,
}

impl<'a> SeriesWindow<'a> {
    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A window always spans at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// First sample position in the underlying series.
    pub fn start_index(&self) -> usize {
        self.start
    }

    /// Last sample position in the underlying series.
    pub fn end_index(&self) -> usize {
        self.end
    }

    /// The underlying full series.
    pub fn series(&self) -> &'a Series {
        self.series
    }

    /// Values of a named column restricted to the window span.
    pub fn column(&self, name: &str) -> Option<&'a [f64]> {
        self.series
            .column(name)
            .map(|values| &values[self.start..=self.end])
    }

    /// True when the underlying series has this column.
    pub fn has_column(&self, name: &str) -> bool {
        self.series.has_column(name)
    }

    /// Timestamps restricted to the window span.
    pub fn timestamps(&self) -> &'a [DateTime<Utc>] {
        &self.series.timestamps()[self.start..=self.end]
    }

    /// Timestamp of the first sample in the window.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.series.timestamps()[self.start]
    }

    /// Timestamp of the last sample in the window.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.series.timestamps()[self.end]
    }
}
