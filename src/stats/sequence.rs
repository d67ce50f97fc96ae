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

//! Sequence analysis: category-to-category transition frequencies and
//! repeated category subsequences across consecutive zones.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extraction::FeatureRecord;

/// Configuration for sequence analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Shortest pattern length mined
    pub min_pattern_len: usize,

    /// Longest pattern length mined
    pub max_pattern_len: usize,

    /// Fewest occurrences for a pattern to be reported
    pub min_support: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            min_pattern_len: 2,
            max_pattern_len: 4,
            min_support: 2,
        }
    }
}

/// A repeated category subsequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPattern {
    /// The category sequence
    pub sequence: Vec<String>,

    /// How many (possibly overlapping) times it occurs
    pub occurrences: usize,
}

/// Transition and pattern summary of one zone batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSummary {
    /// Transition counts: from-category → (to-category → count)
    pub transition_counts: HashMap<String, HashMap<String, usize>>,

    /// Row-normalized transition probabilities
    pub transition_probabilities: HashMap<String, HashMap<String, f64>>,

    /// Repeating patterns at or above the support threshold, most frequent
    /// first; empty when nothing repeats
    pub patterns: Vec<CategoryPattern>,
}

/// Builds transition tables and mines repeated category subsequences.
pub trait SequenceAnalyzer: Send + Sync {
    /// Analyze the category sequence of consecutive zones.
    fn analyze(&self, records: &[FeatureRecord]) -> SequenceSummary;
}

/// Default transition/pattern analyzer.
pub struct TransitionSequenceAnalyzer {
    config: SequenceConfig,
}

impl TransitionSequenceAnalyzer {
    /// Create an analyzer with default configuration.
    pub fn new() -> Self {
        Self {
            config: SequenceConfig::default(),
        }
    }

    /// Create an analyzer with explicit configuration.
    pub fn with_config(config: SequenceConfig) -> Self {
        Self { config }
    }
}

impl Default for TransitionSequenceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceAnalyzer for TransitionSequenceAnalyzer {
    fn analyze(&self, records: &[FeatureRecord]) -> SequenceSummary {
        let categories: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();

        let mut transition_counts: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (from, to) in categories.iter().tuple_windows() {
            *transition_counts
                .entry(from.to_string())
                .or_default()
                .entry(to.to_string())
                .or_insert(0) += 1;
        }

        let transition_probabilities = transition_counts
            .iter()
            .map(|(from, row)| {
                let total: usize = row.values().sum();
                let normalized = row
                    .iter()
                    .map(|(to, &count)| (to.clone(), count as f64 / total as f64))
                    .collect();
                (from.clone(), normalized)
            })
            .collect();

        let mut pattern_counts: HashMap<Vec<String>, usize> = HashMap::new();
        let min_len = self.config.min_pattern_len.max(2);
        for len in min_len..=self.config.max_pattern_len {
            if categories.len() < len {
                break;
            }
            for window in categories.windows(len) {
                let key: Vec<String> = window.iter().map(|c| c.to_string()).collect();
                *pattern_counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut patterns: Vec<CategoryPattern> = pattern_counts
            .into_iter()
            .filter(|(_, occurrences)| *occurrences >= self.config.min_support)
            .map(|(sequence, occurrences)| CategoryPattern {
                sequence,
                occurrences,
            })
            .collect();
        patterns.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then(a.sequence.cmp(&b.sequence))
        });

        info!(
            zones = records.len(),
            patterns = patterns.len(),
            "Sequence analysis complete"
        );
        SequenceSummary {
            transition_counts,
            transition_probabilities,
            patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records_from(categories: &[&str]) -> Vec<FeatureRecord> {
        categories
            .iter()
            .enumerate()
            .map(|(i, category)| FeatureRecord {
                zone_id: i as u64,
                category: category.to_string(),
                duration: 5,
                values: HashMap::new(),
                missing: HashMap::new(),
            })
            .collect()
    }

    #[test]
    fn test_transition_counts_and_probabilities() {
        let records = records_from(&["bull", "bear", "bull", "bear", "bull"]);
        let summary = TransitionSequenceAnalyzer::new().analyze(&records);

        assert_eq!(summary.transition_counts["bull"]["bear"], 2);
        assert_eq!(summary.transition_counts["bear"]["bull"], 2);
        assert!((summary.transition_probabilities["bull"]["bear"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_repeating_pattern_found() {
        let records = records_from(&["bull", "bear", "bull", "bear", "bull", "bear"]);
        let summary = TransitionSequenceAnalyzer::new().analyze(&records);

        let top = &summary.patterns[0];
        assert_eq!(top.sequence, vec!["bull".to_string(), "bear".to_string()]);
        assert_eq!(top.occurrences, 3);
    }

    #[test]
    fn test_no_repeats_yields_empty_patterns() {
        let records = records_from(&["a", "b", "c", "d"]);
        let summary = TransitionSequenceAnalyzer::new().analyze(&records);
        assert!(summary.patterns.is_empty());
    }

    #[test]
    fn test_support_threshold() {
        let config = SequenceConfig {
            min_support: 4,
            ..SequenceConfig::default()
        };
        let records = records_from(&["bull", "bear", "bull", "bear", "bull", "bear"]);
        let summary = TransitionSequenceAnalyzer::with_config(config).analyze(&records);
        assert!(summary.patterns.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let summary = TransitionSequenceAnalyzer::new().analyze(&[]);
        assert!(summary.transition_counts.is_empty());
        assert!(summary.patterns.is_empty());
    }
}
