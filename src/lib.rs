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

//! Core zone detection and analytics for the Zonal framework.
//!
//! The pipeline segments a numeric time series into labeled contiguous
//! zones with pluggable detection strategies, extracts per-zone features
//! with pluggable metric strategies, and aggregates the results into
//! distribution statistics, hypothesis tests, similarity clusters and
//! category-sequence analysis. Every zone carries self-description
//! metadata naming the signal columns that produced it, so no downstream
//! component ever hardcodes which indicator is being analyzed.

pub mod detection;
pub mod extraction;
pub mod metrics;
pub mod orchestrator;
pub mod series;
pub mod stats;
pub mod zone;

#[cfg(test)]
mod tests;

// Re-export common types
pub use series::{
    Series, SeriesError, SeriesResult, SeriesWindow, COLUMN_CLOSE, COLUMN_HIGH, COLUMN_LOW,
    COLUMN_OPEN, COLUMN_VOLUME,
};
pub use zone::{
    Zone, META_PRIMARY_COLUMN, META_RULE_PARAMETERS, META_SECONDARY_COLUMN, META_STRATEGY_NAME,
};
pub use detection::{
    CombineMode, CombinedRulesDetector, CompareOp, ComparisonPredicate, DetectionConfig,
    DetectionError, DetectionResult, DetectorFactory, DetectorRegistry, LineCrossDetector,
    PreloadedZoneDetector, ThresholdDetector, ZeroCrossDetector, ZoneDetector, ZoneImportRecord,
    ZoneImportTable, ZonePredicate,
};
pub use metrics::{
    DivergenceMetric, MetricError, MetricRecord, MetricResult, ShapeMetric, SwingMetric,
    SwingScanner, VolatilityMetric, VolumeMetric, ZoneMetric,
};
pub use extraction::{FeatureEngine, FeatureExtractor, FeatureRecord};
pub use stats::{
    CategoryPattern, ClusterAssignment, ClusteringConfig, DefaultTestSuite, DistributionStats,
    HypothesisConfig, KMeansClusterer, SequenceAnalyzer, SequenceConfig, SequenceSummary,
    SummaryStats, TestOutcome, TestSuite, TransitionSequenceAnalyzer, ZoneClusterer,
};
pub use orchestrator::{
    create_zone_analyzer, create_zone_analyzer_with_config, AnalysisConfig, AnalysisReport,
    RunMetadata, ZoneAnalyzer,
};
