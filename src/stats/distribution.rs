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

//! Distribution statistics over extracted feature records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::extraction::FeatureRecord;
use crate::stats::{mean, median, std_dev};

/// Five-number-style summary of one sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of observations
    pub count: usize,

    /// Arithmetic mean
    pub mean: f64,

    /// Population standard deviation
    pub std_dev: f64,

    /// Smallest observation
    pub min: f64,

    /// Largest observation
    pub max: f64,

    /// Median observation
    pub median: f64,
}

impl SummaryStats {
    /// Summarize a sample. `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        Some(Self {
            count: values.len(),
            mean: mean(values),
            std_dev: std_dev(values),
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            median: median(values),
        })
    }
}

/// Distribution statistics of one zone batch, signal-agnostic: everything
/// here derives from feature records alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionStats {
    /// Total number of zones
    pub total_zones: usize,

    /// Zone counts per category
    pub category_counts: HashMap<String, usize>,

    /// Duration summary across all zones
    pub duration: Option<SummaryStats>,

    /// Duration summary per category
    pub duration_by_category: HashMap<String, SummaryStats>,

    /// Zone-return summary across all zones with a return value
    pub returns: Option<SummaryStats>,

    /// Zone-return summary per category
    pub returns_by_category: HashMap<String, SummaryStats>,
}

impl DistributionStats {
    /// Compute distribution statistics from feature records.
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let mut category_counts: HashMap<String, usize> = HashMap::new();
        let mut durations: Vec<f64> = Vec::with_capacity(records.len());
        let mut durations_by: HashMap<String, Vec<f64>> = HashMap::new();
        let mut returns: Vec<f64> = Vec::new();
        let mut returns_by: HashMap<String, Vec<f64>> = HashMap::new();

        for record in records {
            *category_counts.entry(record.category.clone()).or_insert(0) += 1;
            durations.push(record.duration as f64);
            durations_by
                .entry(record.category.clone())
                .or_default()
                .push(record.duration as f64);

            if let Some(&ret) = record.values.get("zone_return") {
                returns.push(ret);
                returns_by
                    .entry(record.category.clone())
                    .or_default()
                    .push(ret);
            }
        }

        let summarize = |groups: HashMap<String, Vec<f64>>| {
            groups
                .into_iter()
                .filter_map(|(category, values)| {
                    SummaryStats::from_values(&values).map(|s| (category, s))
                })
                .collect::<HashMap<String, SummaryStats>>()
        };

        Self {
            total_zones: records.len(),
            category_counts,
            duration: SummaryStats::from_values(&durations),
            duration_by_category: summarize(durations_by),
            returns: SummaryStats::from_values(&returns),
            returns_by_category: summarize(returns_by),
        }
    }

    /// Observed category labels in sorted order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> =
            self.category_counts.keys().map(|k| k.as_str()).collect();
        categories.sort_unstable();
        categories
    }
}
