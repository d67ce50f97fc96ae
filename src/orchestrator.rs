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

//! Analysis orchestrator: the pure coordinator that sequences feature
//! extraction and the statistical layer into one report.
//!
//! The orchestrator owns no business logic. It sequences stages, applies
//! configured data-size floors, and assembles the result; every stage is an
//! injected component and can be swapped at construction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::detection::{DetectionConfig, DetectionResult, ZoneDetector};
use crate::extraction::{FeatureEngine, FeatureExtractor, FeatureRecord};
use crate::series::Series;
use crate::stats::{
    ClusterAssignment, DefaultTestSuite, DistributionStats, KMeansClusterer, SequenceAnalyzer,
    SequenceSummary, TestOutcome, TestSuite, TransitionSequenceAnalyzer, ZoneClusterer,
};
use crate::zone::Zone;

/// Stage flags and data-size floors for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Run the hypothesis test suite
    pub run_hypothesis_tests: bool,

    /// Run similarity clustering
    pub run_clustering: bool,

    /// Run transition/pattern sequence analysis
    pub run_sequence_analysis: bool,

    /// Fewest zones before the test suite runs
    pub min_zones_for_tests: usize,

    /// Fewest zones before sequence analysis runs
    pub min_zones_for_sequence: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            run_hypothesis_tests: true,
            run_clustering: true,
            run_sequence_analysis: true,
            min_zones_for_tests: 4,
            min_zones_for_sequence: 3,
        }
    }
}

/// Run metadata attached to every report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique id of the analysis run
    pub run_id: String,

    /// When the report was assembled
    pub generated_at: DateTime<Utc>,

    /// Number of zones analyzed
    pub zone_count: usize,

    /// Observed category labels in sorted order
    pub categories: Vec<String>,
}

/// The assembled result of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The analyzed zones, feature maps populated
    pub zones: Vec<Zone>,

    /// Per-zone feature records as consumed by the statistical layer
    pub features: Vec<FeatureRecord>,

    /// Distribution statistics
    pub distribution: DistributionStats,

    /// Per-test hypothesis outcomes; empty when the stage was skipped
    pub hypothesis_tests: Vec<TestOutcome>,

    /// Zone→cluster assignment; `None` when skipped
    pub clustering: Option<ClusterAssignment>,

    /// Transition/pattern summary; `None` when skipped
    pub sequence: Option<SequenceSummary>,

    /// Run metadata
    pub metadata: RunMetadata,
}

/// Coordinates extraction and the statistical layer into one report.
pub struct ZoneAnalyzer {
    feature_engine: Arc<dyn FeatureEngine>,
    test_suite: Arc<dyn TestSuite>,
    clusterer: Arc<dyn ZoneClusterer>,
    sequence_analyzer: Arc<dyn SequenceAnalyzer>,
    config: AnalysisConfig,
}

impl ZoneAnalyzer {
    /// Create an analyzer with the default component set.
    pub fn new() -> Self {
        Self {
            feature_engine: Arc::new(FeatureExtractor::new()),
            test_suite: Arc::new(DefaultTestSuite::new()),
            clusterer: Arc::new(KMeansClusterer::new()),
            sequence_analyzer: Arc::new(TransitionSequenceAnalyzer::new()),
            config: AnalysisConfig::default(),
        }
    }

    /// Create an analyzer with explicit components, enabling substitution
    /// of any stage for testing or extension.
    pub fn with_components(
        feature_engine: Arc<dyn FeatureEngine>,
        test_suite: Arc<dyn TestSuite>,
        clusterer: Arc<dyn ZoneClusterer>,
        sequence_analyzer: Arc<dyn SequenceAnalyzer>,
    ) -> Self {
        Self {
            feature_engine,
            test_suite,
            clusterer,
            sequence_analyzer,
            config: AnalysisConfig::default(),
        }
    }

    /// Override the stage configuration.
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Detect zones with the given strategy, then analyze them.
    pub fn detect_and_analyze(
        &self,
        detector: &dyn ZoneDetector,
        series: &Series,
        detection_config: &DetectionConfig,
    ) -> DetectionResult<AnalysisReport> {
        let zones = detector.detect(series, detection_config)?;
        Ok(self.analyze(zones, series))
    }

    /// Analyze already-detected zones against their source series.
    pub fn analyze(&self, mut zones: Vec<Zone>, series: &Series) -> AnalysisReport {
        let features = self.feature_engine.extract(&mut zones, series);
        let distribution = DistributionStats::from_records(&features);

        let hypothesis_tests = if self.config.run_hypothesis_tests
            && features.len() >= self.config.min_zones_for_tests
        {
            self.test_suite.run(&features)
        } else {
            debug!(
                zones = features.len(),
                floor = self.config.min_zones_for_tests,
                "Skipping hypothesis tests"
            );
            Vec::new()
        };

        let clustering = if self.config.run_clustering {
            self.clusterer.cluster(&features)
        } else {
            None
        };

        let sequence = if self.config.run_sequence_analysis
            && features.len() >= self.config.min_zones_for_sequence
        {
            Some(self.sequence_analyzer.analyze(&features))
        } else {
            debug!(
                zones = features.len(),
                floor = self.config.min_zones_for_sequence,
                "Skipping sequence analysis"
            );
            None
        };

        let categories = distribution
            .categories()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        let metadata = RunMetadata {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            zone_count: zones.len(),
            categories,
        };

        info!(
            run_id = %metadata.run_id,
            zones = metadata.zone_count,
            tests = hypothesis_tests.len(),
            clustered = clustering.is_some(),
            "Analysis run complete"
        );
        AnalysisReport {
            zones,
            features,
            distribution,
            hypothesis_tests,
            clustering,
            sequence,
            metadata,
        }
    }
}

impl Default for ZoneAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an analyzer with the default component set.
pub fn create_zone_analyzer() -> ZoneAnalyzer {
    ZoneAnalyzer::new()
}

/// Create an analyzer with the default components and custom stage config.
pub fn create_zone_analyzer_with_config(config: AnalysisConfig) -> ZoneAnalyzer {
    ZoneAnalyzer::new().with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ZeroCrossDetector;
    use crate::series::{COLUMN_CLOSE, COLUMN_HIGH, COLUMN_LOW, COLUMN_VOLUME};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;

    fn oscillating_series(len: usize) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..len)
            .map(|i| base + chrono::Duration::minutes(i as i64))
            .collect();
        let closes: Vec<f64> = (0..len)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0)
            .collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let volume: Vec<f64> = (0..len).map(|i| 1000.0 + (i % 5) as f64 * 80.0).collect();
        let osc: Vec<f64> = (0..len).map(|i| (i as f64 * 0.4).sin()).collect();
        Series::new(timestamps)
            .unwrap()
            .with_column(COLUMN_CLOSE, closes)
            .unwrap()
            .with_column(COLUMN_HIGH, highs)
            .unwrap()
            .with_column(COLUMN_LOW, lows)
            .unwrap()
            .with_column(COLUMN_VOLUME, volume)
            .unwrap()
            .with_column("osc", osc)
            .unwrap()
    }

    #[test]
    fn test_detect_and_analyze_end_to_end() {
        let series = oscillating_series(200);
        let detection_config = DetectionConfig::default()
            .with_rule("column", json!("osc"))
            .with_min_duration(3);

        let report = ZoneAnalyzer::new()
            .detect_and_analyze(&ZeroCrossDetector::new(), &series, &detection_config)
            .unwrap();

        assert!(report.zones.len() > 4);
        assert_eq!(report.zones.len(), report.features.len());
        assert_eq!(report.metadata.zone_count, report.zones.len());
        assert_eq!(report.metadata.categories, vec!["bear", "bull"]);
        assert!(!report.hypothesis_tests.is_empty());
        assert!(report.sequence.is_some());
        for zone in &report.zones {
            assert!(zone.features().is_some());
        }
    }

    #[test]
    fn test_stage_flags_disable_stages() {
        let series = oscillating_series(200);
        let detection_config = DetectionConfig::default()
            .with_rule("column", json!("osc"))
            .with_min_duration(3);
        let analyzer = ZoneAnalyzer::new().with_config(AnalysisConfig {
            run_hypothesis_tests: false,
            run_clustering: false,
            run_sequence_analysis: false,
            ..AnalysisConfig::default()
        });

        let report = analyzer
            .detect_and_analyze(&ZeroCrossDetector::new(), &series, &detection_config)
            .unwrap();

        assert!(report.hypothesis_tests.is_empty());
        assert!(report.clustering.is_none());
        assert!(report.sequence.is_none());
    }

    #[test]
    fn test_empty_zone_list_yields_degenerate_report() {
        let series = oscillating_series(20);
        let report = ZoneAnalyzer::new().analyze(Vec::new(), &series);

        assert!(report.zones.is_empty());
        assert_eq!(report.distribution.total_zones, 0);
        assert!(report.hypothesis_tests.is_empty());
        assert!(report.clustering.is_none());
        assert!(report.sequence.is_none());
    }

    #[test]
    fn test_component_substitution() {
        struct FixedSuite;
        impl TestSuite for FixedSuite {
            fn run(&self, _records: &[FeatureRecord]) -> Vec<TestOutcome> {
                Vec::new()
            }
        }

        struct NoopEngine;
        impl FeatureEngine for NoopEngine {
            fn extract(&self, zones: &mut [Zone], _series: &Series) -> Vec<FeatureRecord> {
                zones
                    .iter()
                    .map(|zone| FeatureRecord {
                        zone_id: zone.id,
                        category: zone.category.clone(),
                        duration: zone.duration(),
                        values: HashMap::new(),
                        missing: HashMap::new(),
                    })
                    .collect()
            }
        }

        let analyzer = ZoneAnalyzer::with_components(
            Arc::new(NoopEngine),
            Arc::new(FixedSuite),
            Arc::new(KMeansClusterer::new()),
            Arc::new(TransitionSequenceAnalyzer::new()),
        );

        let series = oscillating_series(50);
        let detection_config = DetectionConfig::default().with_rule("column", json!("osc"));
        let report = analyzer
            .detect_and_analyze(&ZeroCrossDetector::new(), &series, &detection_config)
            .unwrap();

        assert!(report.hypothesis_tests.is_empty());
        assert!(report.features.iter().all(|f| f.values.is_empty()));
    }

    #[test]
    fn test_report_serializes() {
        let series = oscillating_series(120);
        let detection_config = DetectionConfig::default()
            .with_rule("column", json!("osc"))
            .with_min_duration(3);

        let report = ZoneAnalyzer::new()
            .detect_and_analyze(&ZeroCrossDetector::new(), &series, &detection_config)
            .unwrap();

        let rendered = serde_json::to_string(&report).unwrap();
        assert!(rendered.contains("\"zones\""));
        assert!(rendered.contains("\"distribution\""));
    }
}
