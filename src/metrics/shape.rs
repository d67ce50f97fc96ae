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

//! Shape metric: distribution moments of the primary signal within a zone.

use crate::metrics::{require_column, MetricError, MetricRecord, MetricResult, ZoneMetric};
use crate::series::SeriesWindow;
use crate::stats::{mean, std_dev};

/// Computes skewness, excess kurtosis and smoothness of the primary column.
///
/// Smoothness is the standard deviation of the first difference: a jagged
/// signal differs sample-to-sample more than a smooth one of the same
/// range. Windows shorter than `min_samples` yield the minimal record.
#[derive(Debug, Clone)]
pub struct ShapeMetric {
    /// Fewest samples needed for meaningful moments
    min_samples: usize,
}

impl Default for ShapeMetric {
    fn default() -> Self {
        Self { min_samples: 4 }
    }
}

impl ShapeMetric {
    /// Create a shape metric with the default minimum sample count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the minimum sample count.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples.max(2);
        self
    }
}

impl ZoneMetric for ShapeMetric {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn compute(
        &self,
        window: &SeriesWindow<'_>,
        primary_column: &str,
        _secondary_column: Option<&str>,
    ) -> MetricResult<MetricRecord> {
        let values = require_column(window, primary_column)?;

        if values.len() < self.min_samples {
            return Ok(MetricRecord::minimal(self.name(), values.len()));
        }

        let m = mean(values);
        let sd = std_dev(values);
        if sd <= f64::EPSILON {
            return Err(MetricError::Degenerate(format!(
                "column {:?} has zero variance over the window",
                primary_column
            )));
        }

        let n = values.len() as f64;
        let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
        let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
        let skewness = m3 / sd.powi(3);
        let kurtosis = m4 / sd.powi(4) - 3.0;

        let mut record = MetricRecord::new(self.name())
            .with_value("sample_count", n)
            .with_value("skewness", skewness)
            .with_value("kurtosis", kurtosis);

        if values.len() >= 3 {
            let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
            record.insert("smoothness", std_dev(&diffs));
        }

        Ok(record)
    }
}
