//! Analysis pipeline
//!
//! Runs the stages in order over one or more experiment directories:
//!
//! ```text
//! discover → load → (summary | links) → normalize → missing-data policy
//!          → aggregate → [overhead vs baseline] → report
//! ```
//!
//! Each stage returns a new record set; nothing is mutated in place.
//! Reports carry the per-stage counts (skipped, filtered, excluded,
//! substituted) next to the groups so a plot never hides dropped data.

use std::path::PathBuf;

use arrow::array::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{aggregate, ConfigGroup, GroupKey};
use crate::artifact::Artifact;
use crate::batch::{LoadReport, SkippedArtifact};
use crate::config::AnalysisConfig;
use crate::config_key::{ConfigurationKey, KeySource};
use crate::delivery::{delivery_rates, DeliveryRate};
use crate::overhead::{compute_overhead, OverheadReport};
use crate::record::{ExperimentRecord, Observation, PairwiseLink};
use crate::{table, Result};

/// One experiment directory and where its configuration key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSource {
    /// Directory searched recursively for artifacts
    pub dir: PathBuf,
    /// Key resolution for artifacts under `dir`
    pub key_source: KeySource,
}

impl ExperimentSource {
    /// Directory whose artifact paths carry `round-`/`echo-` tags.
    #[must_use]
    pub fn decode(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key_source: KeySource::Decode,
        }
    }

    /// Directory whose artifacts all share `key`.
    #[must_use]
    pub fn fixed(dir: impl Into<PathBuf>, key: ConfigurationKey) -> Self {
        Self {
            dir: dir.into(),
            key_source: KeySource::Fixed(key),
        }
    }

    /// Directory holding baseline (non-protocol) runs.
    #[must_use]
    pub fn baseline(dir: impl Into<PathBuf>) -> Self {
        Self::fixed(dir, ConfigurationKey::Baseline)
    }
}

/// How pairwise links are partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkGrouping {
    /// By (configuration key, payload size, locality)
    #[default]
    Locality,
    /// By (configuration key, payload size, locality, destination peer)
    Destination,
}

impl LinkGrouping {
    fn key(self) -> fn(&PairwiseLink) -> GroupKey {
        match self {
            Self::Locality => GroupKey::locality,
            Self::Destination => GroupKey::destination,
        }
    }
}

/// Aggregated groups plus everything that was left out on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Groups sorted by key
    pub groups: Vec<ConfigGroup>,
    /// Message delivery totals (summary analysis only)
    pub delivery: Vec<DeliveryRate>,
    /// Artifacts that failed to load or expand
    pub skipped: Vec<SkippedArtifact>,
    /// Artifacts dropped by the payload ceiling
    pub filtered: usize,
    /// Records dropped by the `Exclude` policy
    pub excluded: usize,
    /// Records filled by the `Substitute` policy
    pub substituted: usize,
    /// Records that reached the aggregator
    pub record_count: usize,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Group statistics as an Arrow table.
    ///
    /// # Errors
    ///
    /// Returns `Arrow` if the batch cannot be assembled.
    pub fn stats_batch(&self) -> Result<RecordBatch> {
        table::group_stats_batch(&self.groups)
    }

    /// Delivery totals as an Arrow table.
    ///
    /// # Errors
    ///
    /// Returns `Arrow` if the batch cannot be assembled.
    pub fn delivery_batch(&self) -> Result<RecordBatch> {
        table::delivery_batch(&self.delivery)
    }
}

/// Baseline comparison with the reports of both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverheadAnalysis {
    /// Aligned overhead rows and dropped keys
    pub overhead: OverheadReport,
    /// Link groups of the baseline runs
    pub baseline: AnalysisReport,
    /// Link groups of the treatment runs
    pub treatment: AnalysisReport,
}

impl OverheadAnalysis {
    /// Overhead rows as an Arrow table.
    ///
    /// # Errors
    ///
    /// Returns `Arrow` if the batch cannot be assembled.
    pub fn overhead_batch(&self) -> Result<RecordBatch> {
        table::overhead_batch(&self.overhead.rows)
    }
}

/// Analysis runner bound to a validated configuration.
#[derive(Debug, Clone)]
pub struct Analysis {
    config: AnalysisConfig,
}

impl Analysis {
    /// Validate `config` and build a runner.
    ///
    /// # Errors
    ///
    /// Returns the first validation error.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load every source, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `Io` for an unreadable experiment directory, or the first per-artifact
    /// error in strict mode.
    pub fn load(&self, sources: &[ExperimentSource]) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for source in sources {
            let loaded = self
                .config
                .loader(source.key_source)
                .load_dir(&source.dir, &self.config.artifact_prefix)?;
            report.merge(loaded);
        }
        Ok(report)
    }

    /// Protocol-level summary: one record per artifact, grouped by
    /// (configuration key, payload size).
    ///
    /// # Errors
    ///
    /// Propagates load errors (see [`Analysis::load`]) and computation
    /// errors from normalization and aggregation.
    pub fn summarize(&self, sources: &[ExperimentSource]) -> Result<AnalysisReport> {
        let loaded = self.load(sources)?;
        let records: Vec<ExperimentRecord> =
            loaded.artifacts.iter().map(Artifact::summary).collect();
        let delivery = delivery_rates(&loaded.artifacts);

        let mut report = self.reduce(&records, GroupKey::protocol, loaded)?;
        report.delivery = delivery;
        Ok(report)
    }

    /// Link-level analysis: every artifact expanded into directed links.
    ///
    /// # Errors
    ///
    /// Propagates load and link-building errors in strict mode, and
    /// computation errors from normalization and aggregation.
    pub fn links(
        &self,
        sources: &[ExperimentSource],
        grouping: LinkGrouping,
    ) -> Result<AnalysisReport> {
        let mut loaded = self.load(sources)?;
        let expanded = self
            .config
            .loader(KeySource::Decode)
            .expand_links(&loaded.artifacts, &self.config.peer_table)?;
        loaded.skipped.extend(expanded.skipped);
        self.reduce(&expanded.links, grouping.key(), loaded)
    }

    /// Compare treatment link groups against baseline link groups, aligned
    /// by (payload size, locality).
    ///
    /// The treatment sources must hold a single configuration key.
    ///
    /// # Errors
    ///
    /// - errors of [`Analysis::links`] for either side
    /// - `DuplicateGroupKey` if a side holds several configuration keys
    /// - `OverheadAlignmentGap` if `require_aligned` is set and the key sets
    ///   differ
    pub fn compare(
        &self,
        baseline: &[ExperimentSource],
        treatment: &[ExperimentSource],
    ) -> Result<OverheadAnalysis> {
        let baseline = self.links(baseline, LinkGrouping::Locality)?;
        let treatment = self.links(treatment, LinkGrouping::Locality)?;
        let overhead = compute_overhead(&baseline.groups, &treatment.groups)?;
        if self.config.require_aligned {
            overhead.require_aligned()?;
        }
        Ok(OverheadAnalysis {
            overhead,
            baseline,
            treatment,
        })
    }

    // normalize → policy → aggregate
    fn reduce<O, F>(&self, records: &[O], key_fn: F, loaded: LoadReport) -> Result<AnalysisReport>
    where
        O: Observation,
        F: Fn(&O) -> GroupKey,
    {
        let normalized = self.config.normalizer.normalize_all(records)?;
        let outcome = self.config.missing_data.apply(normalized);
        let groups = aggregate(&outcome.records, key_fn)?;

        let report = AnalysisReport {
            groups,
            delivery: Vec::new(),
            skipped: loaded.skipped,
            filtered: loaded.filtered,
            excluded: outcome.excluded,
            substituted: outcome.substituted,
            record_count: outcome.records.len(),
            generated_at: Utc::now(),
        };
        info!(
            groups = report.groups.len(),
            records = report.record_count,
            skipped = report.skipped.len(),
            filtered = report.filtered,
            excluded = report.excluded,
            substituted = report.substituted,
            "analysis complete"
        );
        Ok(report)
    }
}
