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

//! Hypothesis test suite over extracted feature records.
//!
//! Each named test is evaluated independently: a numerical failure in one
//! test becomes an error marker on its outcome and never suppresses the
//! remaining tests. Distribution functions (normal, Student t, chi-square)
//! are implemented here directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extraction::FeatureRecord;
use crate::stats::{mean, sample_variance};

/// Outcome of one hypothesis test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Name of the test
    pub name: String,

    /// Test statistic, absent when the test failed or was skipped
    pub statistic: Option<f64>,

    /// Two-sided p-value, absent when the test failed or was skipped
    pub p_value: Option<f64>,

    /// True when the p-value is below the configured significance level
    pub significant: bool,

    /// Human-readable description of what was compared
    pub detail: String,

    /// Error marker when the test could not run
    pub error: Option<String>,
}

impl TestOutcome {
    fn success(name: &str, statistic: f64, p_value: f64, alpha: f64, detail: String) -> Self {
        Self {
            name: name.to_string(),
            statistic: Some(statistic),
            p_value: Some(p_value),
            significant: p_value < alpha,
            detail,
            error: None,
        }
    }

    fn failure(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            statistic: None,
            p_value: None,
            significant: false,
            detail: String::new(),
            error: Some(reason),
        }
    }
}

/// Configuration for the hypothesis test suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisConfig {
    /// Significance level for the `significant` flag
    pub significance_level: f64,

    /// Fewest observations each compared group must contribute
    pub min_group_size: usize,
}

impl Default for HypothesisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            min_group_size: 5,
        }
    }
}

/// A named suite of independently evaluated hypothesis tests.
pub trait TestSuite: Send + Sync {
    /// Run every test over the records, one outcome per test.
    fn run(&self, records: &[FeatureRecord]) -> Vec<TestOutcome>;
}

/// The standard five-test suite.
pub struct DefaultTestSuite {
    config: HypothesisConfig,
}

impl DefaultTestSuite {
    /// Create a suite with default configuration.
    pub fn new() -> Self {
        Self {
            config: HypothesisConfig::default(),
        }
    }

    /// Create a suite with explicit configuration.
    pub fn with_config(config: HypothesisConfig) -> Self {
        Self { config }
    }

    /// The two most frequent categories, most frequent first.
    fn dominant_categories(records: &[FeatureRecord]) -> Option<(String, String)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.category.as_str()).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        // Count-descending, name-ascending so ties break deterministically.
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        if ranked.len() < 2 {
            return None;
        }
        Some((ranked[0].0.to_string(), ranked[1].0.to_string()))
    }

    fn group_values<F>(records: &[FeatureRecord], category: &str, value: F) -> Vec<f64>
    where
        F: Fn(&FeatureRecord) -> Option<f64>,
    {
        records
            .iter()
            .filter(|r| r.category == category)
            .filter_map(value)
            .collect()
    }

    fn welch_t_test(
        &self,
        name: &str,
        records: &[FeatureRecord],
        value: impl Fn(&FeatureRecord) -> Option<f64>,
        what: &str,
    ) -> TestOutcome {
        let (first, second) = match Self::dominant_categories(records) {
            Some(pair) => pair,
            None => return TestOutcome::failure(name, "fewer than two categories".to_string()),
        };

        let group1 = Self::group_values(records, &first, &value);
        let group2 = Self::group_values(records, &second, &value);
        if group1.len() < self.config.min_group_size || group2.len() < self.config.min_group_size {
            return TestOutcome::failure(
                name,
                format!(
                    "group sizes {}/{} below the floor of {}",
                    group1.len(),
                    group2.len(),
                    self.config.min_group_size
                ),
            );
        }

        let (n1, n2) = (group1.len() as f64, group2.len() as f64);
        let (v1, v2) = (sample_variance(&group1), sample_variance(&group2));
        let pooled = v1 / n1 + v2 / n2;
        if pooled <= 0.0 {
            return TestOutcome::failure(name, "zero variance in both groups".to_string());
        }

        let t = (mean(&group1) - mean(&group2)) / pooled.sqrt();
        // Welch-Satterthwaite degrees of freedom.
        let df = pooled.powi(2)
            / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));
        if !t.is_finite() || !df.is_finite() || df <= 0.0 {
            return TestOutcome::failure(name, "degenerate test statistic".to_string());
        }

        let p = 2.0 * (1.0 - student_t_cdf(t.abs(), df));
        TestOutcome::success(
            name,
            t,
            p.clamp(0.0, 1.0),
            self.config.significance_level,
            format!("{} of {:?} vs {:?}", what, first, second),
        )
    }

    fn one_sample_t_test(&self, records: &[FeatureRecord]) -> TestOutcome {
        let name = "return_one_sample_t";
        let returns: Vec<f64> = records
            .iter()
            .filter_map(|r| r.values.get("zone_return").copied())
            .collect();

        if returns.len() < self.config.min_group_size {
            return TestOutcome::failure(
                name,
                format!(
                    "{} returns below the floor of {}",
                    returns.len(),
                    self.config.min_group_size
                ),
            );
        }

        let n = returns.len() as f64;
        let variance = sample_variance(&returns);
        if variance <= 0.0 {
            return TestOutcome::failure(name, "zero variance in returns".to_string());
        }

        let t = mean(&returns) / (variance / n).sqrt();
        let p = 2.0 * (1.0 - student_t_cdf(t.abs(), n - 1.0));
        TestOutcome::success(
            name,
            t,
            p.clamp(0.0, 1.0),
            self.config.significance_level,
            "mean zone return vs zero".to_string(),
        )
    }

    fn mann_whitney_test(&self, records: &[FeatureRecord]) -> TestOutcome {
        let name = "duration_mann_whitney";
        let (first, second) = match Self::dominant_categories(records) {
            Some(pair) => pair,
            None => return TestOutcome::failure(name, "fewer than two categories".to_string()),
        };

        let group1 = Self::group_values(records, &first, |r| Some(r.duration as f64));
        let group2 = Self::group_values(records, &second, |r| Some(r.duration as f64));
        if group1.len() < self.config.min_group_size || group2.len() < self.config.min_group_size {
            return TestOutcome::failure(
                name,
                format!(
                    "group sizes {}/{} below the floor of {}",
                    group1.len(),
                    group2.len(),
                    self.config.min_group_size
                ),
            );
        }

        // Rank-sum with midranks for ties.
        let mut combined: Vec<(f64, usize)> = group1
            .iter()
            .map(|&v| (v, 0))
            .chain(group2.iter().map(|&v| (v, 1)))
            .collect();
        combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut ranks = vec![0.0; combined.len()];
        let mut i = 0;
        while i < combined.len() {
            let mut j = i;
            while j + 1 < combined.len() && combined[j + 1].0 == combined[i].0 {
                j += 1;
            }
            let midrank = (i + j) as f64 / 2.0 + 1.0;
            for rank in ranks.iter_mut().take(j + 1).skip(i) {
                *rank = midrank;
            }
            i = j + 1;
        }

        let rank_sum1: f64 = combined
            .iter()
            .zip(ranks.iter())
            .filter(|((_, group), _)| *group == 0)
            .map(|(_, rank)| rank)
            .sum();

        let (n1, n2) = (group1.len() as f64, group2.len() as f64);
        let u1 = rank_sum1 - n1 * (n1 + 1.0) / 2.0;
        let mean_u = n1 * n2 / 2.0;
        let std_u = (n1 * n2 * (n1 + n2 + 1.0) / 12.0).sqrt();
        if std_u <= 0.0 {
            return TestOutcome::failure(name, "degenerate rank variance".to_string());
        }

        let z = (u1 - mean_u) / std_u;
        let p = 2.0 * (1.0 - normal_cdf(z.abs()));
        TestOutcome::success(
            name,
            z,
            p.clamp(0.0, 1.0),
            self.config.significance_level,
            format!("duration ranks of {:?} vs {:?}", first, second),
        )
    }

    fn transition_chi_square(&self, records: &[FeatureRecord]) -> TestOutcome {
        let name = "transition_chi_square";

        let mut categories: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();
        categories.dedup();
        let mut labels: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();

        if labels.len() < 2 || categories.len() < self.config.min_group_size {
            return TestOutcome::failure(
                name,
                "not enough categories or transitions".to_string(),
            );
        }

        let index: HashMap<&str, usize> =
            labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let k = labels.len();
        let mut observed = vec![vec![0.0; k]; k];
        for pair in records.windows(2) {
            let from = index[pair[0].category.as_str()];
            let to = index[pair[1].category.as_str()];
            observed[from][to] += 1.0;
        }

        let total: f64 = observed.iter().flatten().sum();
        if total <= 0.0 {
            return TestOutcome::failure(name, "no transitions observed".to_string());
        }

        let row_sums: Vec<f64> = observed.iter().map(|row| row.iter().sum()).collect();
        let col_sums: Vec<f64> =
            (0..k).map(|j| observed.iter().map(|row| row[j]).sum()).collect();

        let mut chi_square = 0.0;
        for i in 0..k {
            for j in 0..k {
                let expected = row_sums[i] * col_sums[j] / total;
                if expected > 0.0 {
                    chi_square += (observed[i][j] - expected).powi(2) / expected;
                }
            }
        }

        let df = ((k - 1) * (k - 1)) as f64;
        let p = 1.0 - chi_square_cdf(chi_square, df);
        TestOutcome::success(
            name,
            chi_square,
            p.clamp(0.0, 1.0),
            self.config.significance_level,
            format!("independence of consecutive categories over {} labels", k),
        )
    }
}

impl Default for DefaultTestSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSuite for DefaultTestSuite {
    fn run(&self, records: &[FeatureRecord]) -> Vec<TestOutcome> {
        let outcomes = vec![
            self.welch_t_test("duration_welch_t", records, |r| Some(r.duration as f64), "duration"),
            self.welch_t_test(
                "return_welch_t",
                records,
                |r| r.values.get("zone_return").copied(),
                "zone return",
            ),
            self.one_sample_t_test(records),
            self.mann_whitney_test(records),
            self.transition_chi_square(records),
        ];

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        info!(
            tests = outcomes.len(),
            failed,
            "Hypothesis suite complete"
        );
        for outcome in outcomes.iter().filter(|o| o.error.is_some()) {
            debug!(test = %outcome.name, error = ?outcome.error, "Test could not run");
        }
        outcomes
    }
}

/// Standard normal CDF via the Abramowitz-Stegun erf approximation.
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    // Abramowitz & Stegun 7.1.26, max absolute error 1.5e-7.
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t
            + 0.254829592)
            * t
            * (-x * x).exp();
    sign * y
}

/// Student t CDF via the regularized incomplete beta function.
fn student_t_cdf(t: f64, df: f64) -> f64 {
    if !t.is_finite() || df <= 0.0 {
        return f64::NAN;
    }
    let x = df / (df + t * t);
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Regularized incomplete beta I_x(a, b), continued-fraction evaluation.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // Symmetry keeps the continued fraction in its fast-converging region.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - incomplete_beta(b, a, 1.0 - x)
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 200;
    const EPSILON: f64 = 1e-12;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h
}

/// Chi-square CDF via the regularized lower incomplete gamma function.
fn chi_square_cdf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    lower_incomplete_gamma(df / 2.0, x / 2.0)
}

/// Regularized lower incomplete gamma P(a, x).
fn lower_incomplete_gamma(a: f64, x: f64) -> f64 {
    if x < a + 1.0 {
        // Series representation.
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut n = a;
        for _ in 0..200 {
            n += 1.0;
            term *= x / n;
            sum += term;
            if term.abs() < sum.abs() * 1e-12 {
                break;
            }
        }
        sum * (-x + a * x.ln() - ln_gamma(a)).exp()
    } else {
        // Continued fraction for the upper tail.
        const TINY: f64 = 1e-300;
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..200 {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < 1e-12 {
                break;
            }
        }
        1.0 - h * (-x + a * x.ln() - ln_gamma(a)).exp()
    }
}

/// Lanczos approximation of ln Γ(x).
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000000000190015;
    for coefficient in COEFFICIENTS {
        y += 1.0;
        series += coefficient / y;
    }
    -tmp + (2.5066282746310005 * series / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, category: &str, duration: usize, ret: f64) -> FeatureRecord {
        let mut values = HashMap::new();
        values.insert("zone_return".to_string(), ret);
        FeatureRecord {
            zone_id: id,
            category: category.to_string(),
            duration,
            values,
            missing: HashMap::new(),
        }
    }

    fn alternating_records() -> Vec<FeatureRecord> {
        // Bull zones are long with positive returns, bear zones short with
        // negative returns; a clear separation.
        let mut records = Vec::new();
        for i in 0..12 {
            if i % 2 == 0 {
                records.push(record(i, "bull", 20 + (i as usize % 3), 0.05 + 0.001 * i as f64));
            } else {
                records.push(record(i, "bear", 4 + (i as usize % 3), -0.04 - 0.001 * i as f64));
            }
        }
        records
    }

    #[test]
    fn test_normal_cdf_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.9750).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.0250).abs() < 1e-3);
    }

    #[test]
    fn test_student_t_cdf_reference_values() {
        // t = 2.228, df = 10 is the two-sided 5% critical point.
        let p = 2.0 * (1.0 - student_t_cdf(2.228, 10.0));
        assert!((p - 0.05).abs() < 0.002);
        // Large df approaches the normal distribution.
        assert!((student_t_cdf(1.96, 1000.0) - 0.9750).abs() < 0.002);
    }

    #[test]
    fn test_chi_square_cdf_reference_values() {
        // Critical value 3.841 at df = 1 leaves 5% in the tail.
        assert!((chi_square_cdf(3.841, 1.0) - 0.95).abs() < 0.002);
        assert!((chi_square_cdf(9.488, 4.0) - 0.95).abs() < 0.002);
    }

    #[test]
    fn test_separated_groups_are_significant() {
        let outcomes = DefaultTestSuite::new().run(&alternating_records());
        let by_name: HashMap<&str, &TestOutcome> =
            outcomes.iter().map(|o| (o.name.as_str(), o)).collect();

        let duration = by_name["duration_welch_t"];
        assert!(duration.error.is_none());
        assert!(duration.significant, "p = {:?}", duration.p_value);

        let returns = by_name["return_welch_t"];
        assert!(returns.error.is_none());
        assert!(returns.significant);

        let ranks = by_name["duration_mann_whitney"];
        assert!(ranks.error.is_none());
        assert!(ranks.significant);
    }

    #[test]
    fn test_failing_test_does_not_suppress_others() {
        // Identical durations force a zero-variance failure in the Welch
        // test while the return tests still run.
        let records: Vec<FeatureRecord> = (0..12)
            .map(|i| {
                record(
                    i,
                    if i % 2 == 0 { "bull" } else { "bear" },
                    10,
                    if i % 2 == 0 { 0.05 } else { -0.05 },
                )
            })
            .collect();

        let outcomes = DefaultTestSuite::new().run(&records);
        assert_eq!(outcomes.len(), 5);

        let duration = outcomes.iter().find(|o| o.name == "duration_welch_t").unwrap();
        assert!(duration.error.is_some());

        let returns = outcomes.iter().find(|o| o.name == "return_welch_t").unwrap();
        assert!(returns.error.is_none());
        assert!(returns.p_value.is_some());
    }

    #[test]
    fn test_small_batch_yields_floor_failures() {
        let records = vec![record(0, "bull", 5, 0.01), record(1, "bear", 6, -0.01)];
        let outcomes = DefaultTestSuite::new().run(&records);

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.error.is_some()));
    }
}
