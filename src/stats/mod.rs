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

//! Statistical and aggregation layer over extracted feature records, plus
//! the scalar helpers shared with the metric strategies.

pub mod clustering;
pub mod distribution;
pub mod hypothesis;
pub mod sequence;

pub use clustering::{ClusterAssignment, ClusteringConfig, KMeansClusterer, ZoneClusterer};
pub use distribution::{DistributionStats, SummaryStats};
pub use hypothesis::{DefaultTestSuite, HypothesisConfig, TestOutcome, TestSuite};
pub use sequence::{
    CategoryPattern, SequenceAnalyzer, SequenceConfig, SequenceSummary, TransitionSequenceAnalyzer,
};

/// Arithmetic mean. Zero for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance around the mean. Zero for fewer than two values.
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator). Zero for fewer than two values.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Median of a sample. Zero for an empty slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns zero for mismatched or empty input and for zero-variance input,
/// and clamps the result into [-1, 1].
pub(crate) fn pearson_correlation(series1: &[f64], series2: &[f64]) -> f64 {
    if series1.len() != series2.len() || series1.is_empty() {
        return 0.0;
    }

    let n = series1.len() as f64;
    let mean1 = series1.iter().sum::<f64>() / n;
    let mean2 = series2.iter().sum::<f64>() / n;

    let variance1 = series1.iter().map(|&x| (x - mean1).powi(2)).sum::<f64>() / n;
    let variance2 = series2.iter().map(|&x| (x - mean2).powi(2)).sum::<f64>() / n;

    let covariance = series1
        .iter()
        .zip(series2.iter())
        .map(|(&x, &y)| (x - mean1) * (y - mean2))
        .sum::<f64>()
        / n;

    if variance1 <= 0.0 || variance2 <= 0.0 {
        return 0.0;
    }

    (covariance / (variance1.sqrt() * variance2.sqrt())).clamp(-1.0, 1.0)
}
