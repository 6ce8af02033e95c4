//! Missing-data policy
//!
//! Undefined metrics are handled by one policy per batch:
//!
//! - [`MissingDataPolicy::Exclude`] drops every record carrying an undefined
//!   metric. Use it when "undefined" means nothing was attempted.
//! - [`MissingDataPolicy::Substitute`] fills undefined metrics from explicit
//!   per-metric defaults. Use it to count total failures, e.g. a receive rate
//!   of 0 % and a round count or latency ceiling above the plotted range.
//!
//! Under `Substitute`, metrics without a configured default stay undefined
//! and the aggregator leaves their statistics undefined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{Metric, Observation};
use crate::units::Measurement;

/// Per-metric replacement values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricDefaults {
    values: BTreeMap<Metric, Measurement>,
}

impl MetricDefaults {
    /// Create an empty default table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default for `metric`.
    ///
    /// The measurement's unit must match the unit the records are in when
    /// the policy is applied (after normalization).
    #[must_use]
    pub fn with(mut self, metric: Metric, default: Measurement) -> Self {
        self.values.insert(metric, default);
        self
    }

    /// Default for `metric`, if configured.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<Measurement> {
        self.values.get(&metric).copied()
    }

    /// Iterate over configured defaults.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Measurement)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }
}

/// How undefined metrics are treated for a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy", content = "defaults")]
pub enum MissingDataPolicy {
    /// Drop records with any undefined metric
    #[default]
    Exclude,
    /// Replace undefined metrics with the configured defaults
    Substitute(MetricDefaults),
}

/// Records surviving the policy, with the number dropped or filled.
#[derive(Debug, Clone)]
pub struct PolicyOutcome<O> {
    /// Records to aggregate
    pub records: Vec<O>,
    /// Records dropped by `Exclude`
    pub excluded: usize,
    /// Records that had at least one value filled by `Substitute`
    pub substituted: usize,
}

impl MissingDataPolicy {
    /// Apply the policy to every record of a batch.
    #[must_use]
    pub fn apply<O: Observation>(&self, records: Vec<O>) -> PolicyOutcome<O> {
        let total = records.len();
        let outcome = match self {
            Self::Exclude => {
                let kept: Vec<O> = records
                    .into_iter()
                    .filter(|r| r.metrics().is_complete())
                    .collect();
                PolicyOutcome {
                    excluded: total - kept.len(),
                    records: kept,
                    substituted: 0,
                }
            }
            Self::Substitute(defaults) => {
                let mut substituted = 0;
                let records = records
                    .into_iter()
                    .map(|record| match Self::fill(&record, defaults) {
                        Some(filled) => {
                            substituted += 1;
                            filled
                        }
                        None => record,
                    })
                    .collect();
                PolicyOutcome {
                    records,
                    excluded: 0,
                    substituted,
                }
            }
        };
        debug!(
            total,
            excluded = outcome.excluded,
            substituted = outcome.substituted,
            "applied missing-data policy"
        );
        outcome
    }

    // Filled copy of `record`, or None when nothing was replaced.
    fn fill<O: Observation>(record: &O, defaults: &MetricDefaults) -> Option<O> {
        let mut metrics = record.metrics().clone();
        let mut changed = false;
        for (metric, slot) in metrics.iter_mut() {
            if slot.is_none() {
                if let Some(default) = defaults.get(metric) {
                    *slot = Some(default);
                    changed = true;
                }
            }
        }
        changed.then(|| record.with_metrics(metrics))
    }
}
