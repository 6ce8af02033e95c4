//! Baseline-relative overhead
//!
//! Pairs baseline and treatment groups by (payload size, locality) and
//! reports, for keys present on both sides:
//!
//! ```text
//! throughput_overhead_pct = -100 × (treatment − baseline) / baseline
//! latency_overhead_abs    = treatment − baseline
//! ```
//!
//! A positive throughput overhead means the treatment delivered less. Keys
//! found on one side only, and pairs whose overhead is undefined (zero
//! baseline throughput, undefined means), are dropped and listed in the
//! report instead of being imputed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::ConfigGroup;
use crate::record::{Locality, Metric};
use crate::units::Unit;
use crate::{Error, Result};

/// Alignment key of an overhead comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverheadKey {
    /// Payload size in bytes
    pub payload_size: u64,
    /// Locality class, `None` for protocol-level groups
    pub locality: Option<Locality>,
}

impl OverheadKey {
    fn of(group: &ConfigGroup) -> Self {
        Self {
            payload_size: group.key().payload_size,
            locality: group.key().locality,
        }
    }
}

impl fmt::Display for OverheadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload={}", self.payload_size)?;
        if let Some(locality) = self.locality {
            write!(f, " {locality}")?;
        }
        Ok(())
    }
}

/// Overhead of the treatment over the baseline for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineOverhead {
    /// Key both groups share
    pub key: OverheadKey,
    /// Relative throughput loss in percent (positive = treatment slower)
    pub throughput_overhead_pct: f64,
    /// Signed latency difference (treatment − baseline)
    pub latency_overhead_abs: f64,
    /// Unit of `latency_overhead_abs`
    pub latency_unit: Unit,
}

/// Result of a baseline comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverheadReport {
    /// Overhead rows, sorted by key
    pub rows: Vec<BaselineOverhead>,
    /// Keys present only in the baseline
    pub baseline_only: Vec<OverheadKey>,
    /// Keys present only in the treatment
    pub treatment_only: Vec<OverheadKey>,
    /// Keys present on both sides whose overhead is undefined
    pub undefined: Vec<OverheadKey>,
}

impl OverheadReport {
    /// Whether both inputs covered exactly the same keys.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.baseline_only.is_empty() && self.treatment_only.is_empty()
    }

    /// Fail if any key was present on one side only.
    ///
    /// # Errors
    ///
    /// Returns `OverheadAlignmentGap` with the per-side counts.
    pub fn require_aligned(&self) -> Result<()> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(Error::OverheadAlignmentGap {
                baseline_only: self.baseline_only.len(),
                treatment_only: self.treatment_only.len(),
            })
        }
    }
}

fn index<'a>(
    groups: &'a [ConfigGroup],
    side: &'static str,
) -> Result<BTreeMap<OverheadKey, &'a ConfigGroup>> {
    let mut indexed = BTreeMap::new();
    for group in groups {
        let key = OverheadKey::of(group);
        if indexed.insert(key, group).is_some() {
            return Err(Error::DuplicateGroupKey {
                side,
                key: key.to_string(),
            });
        }
    }
    Ok(indexed)
}

// (baseline mean, treatment mean, shared unit), or None when either side is
// undefined.
fn paired_means(
    base: &ConfigGroup,
    treat: &ConfigGroup,
    metric: Metric,
) -> Result<Option<(f64, f64, Unit)>> {
    let defined = |group: &ConfigGroup| {
        let stats = group.stats(metric)?;
        Some((stats.mean()?, stats.unit()?))
    };
    let (Some((base_mean, base_unit)), Some((treat_mean, treat_unit))) =
        (defined(base), defined(treat))
    else {
        return Ok(None);
    };
    if base_unit != treat_unit {
        return Err(Error::UnitMismatch {
            metric,
            left: base_unit,
            right: treat_unit,
        });
    }
    Ok(Some((base_mean, treat_mean, base_unit)))
}

/// Compare treatment groups against baseline groups.
///
/// Each side must hold at most one group per (payload size, locality); group
/// the treatment by a single configuration key before calling.
///
/// # Errors
///
/// - `DuplicateGroupKey` if one side has two groups for the same key
/// - `UnitMismatch` if throughput or latency units differ across sides
pub fn compute_overhead(
    baseline: &[ConfigGroup],
    treatment: &[ConfigGroup],
) -> Result<OverheadReport> {
    let baseline = index(baseline, "baseline")?;
    let treatment = index(treatment, "treatment")?;
    let mut report = OverheadReport::default();

    for (key, base) in &baseline {
        let Some(treat) = treatment.get(key) else {
            report.baseline_only.push(*key);
            continue;
        };

        let throughput = paired_means(base, treat, Metric::Throughput)?;
        let latency = paired_means(base, treat, Metric::Latency)?;
        let overhead = throughput.zip(latency).and_then(|(tp, lat)| {
            relative_throughput_overhead(tp.0, tp.1).map(|pct| (pct, lat))
        });
        let Some((throughput_overhead_pct, (base_lat, treat_lat, latency_unit))) = overhead else {
            report.undefined.push(*key);
            continue;
        };
        report.rows.push(BaselineOverhead {
            key: *key,
            throughput_overhead_pct,
            latency_overhead_abs: treat_lat - base_lat,
            latency_unit,
        });
    }

    report.treatment_only = treatment
        .keys()
        .filter(|key| !baseline.contains_key(*key))
        .copied()
        .collect();

    if !report.is_aligned() || !report.undefined.is_empty() {
        warn!(
            baseline_only = report.baseline_only.len(),
            treatment_only = report.treatment_only.len(),
            undefined = report.undefined.len(),
            "dropped overhead keys"
        );
    }
    info!(rows = report.rows.len(), "computed baseline overhead");
    Ok(report)
}

/// `-100 × (treatment − baseline) / baseline`, undefined for a zero or
/// non-finite baseline.
///
/// ```rust
/// use rb_bench_analysis::overhead::relative_throughput_overhead;
///
/// assert_eq!(relative_throughput_overhead(100.0, 80.0), Some(20.0));
/// assert_eq!(relative_throughput_overhead(0.0, 80.0), None);
/// ```
#[must_use]
pub fn relative_throughput_overhead(baseline: f64, treatment: f64) -> Option<f64> {
    if baseline == 0.0 || !baseline.is_finite() {
        return None;
    }
    Some(-100.0 * (treatment - baseline) / baseline)
}
