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

//! Shared segmentation state machine for the rule-based strategies.
//!
//! A strategy computes one optional discrete state per sample; this module
//! collects maximal runs of equal states and turns them into zones.
//! Boundary convention: a state change closes the previous run at the prior
//! sample and the transition sample starts the new run. `None` states are
//! gaps: they close the current run and belong to no zone. Runs shorter
//! than the configured minimum duration are discarded, never merged, so
//! dropped runs simply leave gaps in coverage.

use tracing::debug;

use crate::detection::DetectionConfig;
use crate::series::Series;
use crate::zone::{
    Zone, META_PRIMARY_COLUMN, META_RULE_PARAMETERS, META_SECONDARY_COLUMN, META_STRATEGY_NAME,
};

/// One maximal run of equal per-sample states.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StateRun {
    /// First sample position of the run (inclusive)
    pub start: usize,

    /// Last sample position of the run (inclusive)
    pub end: usize,

    /// The state (category label) shared by every sample in the run
    pub state: String,
}

/// Collect maximal equal-state runs from a per-sample state sequence.
pub(crate) fn collect_runs(states: &[Option<String>]) -> Vec<StateRun> {
    let mut runs = Vec::new();
    let mut current: Option<StateRun> = None;

    for (index, state) in states.iter().enumerate() {
        match state {
            Some(label) => match current.as_mut() {
                Some(run) if run.state == *label => {
                    run.end = index;
                }
                Some(_) | None => {
                    // Transition sample starts the new run.
                    if let Some(finished) = current.take() {
                        runs.push(finished);
                    }
                    current = Some(StateRun {
                        start: index,
                        end: index,
                        state: label.clone(),
                    });
                }
            },
            None => {
                if let Some(finished) = current.take() {
                    runs.push(finished);
                }
            }
        }
    }

    if let Some(finished) = current.take() {
        runs.push(finished);
    }

    runs
}

/// Turn a per-sample state sequence into ordered zones with the required
/// self-description metadata attached.
///
/// Applies the minimum-duration filter and the permitted-category filter,
/// then assigns sequential ids so detection output is deterministic.
pub(crate) fn zones_from_states(
    series: &Series,
    states: &[Option<String>],
    config: &DetectionConfig,
    strategy_name: &str,
    primary_column: &str,
    secondary_column: Option<&str>,
    extras: &[(String, String)],
) -> Vec<Zone> {
    let runs = collect_runs(states);
    let total_runs = runs.len();
    let min_duration = config.min_duration.max(1);
    let serialized_rules = config.serialized_rules();

    let mut zones = Vec::new();
    for run in runs {
        let duration = run.end - run.start + 1;
        if duration < min_duration {
            debug!(
                start = run.start,
                duration,
                min_duration,
                "Dropping short run"
            );
            continue;
        }
        if !config.permits_category(&run.state) {
            debug!(category = %run.state, "Dropping run with unpermitted category");
            continue;
        }

        let mut zone = Zone::new(
            zones.len() as u64,
            &run.state,
            run.start,
            run.end,
            series.timestamps()[run.start],
            series.timestamps()[run.end],
        )
        .with_metadata(META_STRATEGY_NAME, strategy_name)
        .with_metadata(META_PRIMARY_COLUMN, primary_column)
        .with_metadata(META_RULE_PARAMETERS, &serialized_rules);

        if let Some(secondary) = secondary_column {
            zone.insert_metadata(META_SECONDARY_COLUMN, secondary);
        }
        for (key, value) in extras {
            zone.insert_metadata(key, value);
        }

        zones.push(zone);
    }

    debug!(
        strategy = strategy_name,
        runs = total_runs,
        zones = zones.len(),
        "Segmented state sequence"
    );
    zones
}
