//! Grouped statistics
//!
//! Records are grouped by a [`GroupKey`] and each metric is summarized as
//! sample mean and unbiased (N−1) standard deviation.
//!
//! Conventions:
//! - A group with one defined sample has an undefined standard deviation
//!   (`None`), never NaN.
//! - A metric whose every sample is undefined has undefined statistics and a
//!   `sample_count` of zero; it is never reported as zero.
//! - Groups come out sorted by key (configuration key, payload size,
//!   locality, peer) regardless of input order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config_key::ConfigurationKey;
use crate::record::{Locality, Metric, Observation, PairwiseLink};
use crate::units::Unit;
use crate::{Error, Result};

/// Arithmetic mean, `None` for no values.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Unbiased sample standard deviation, `None` for fewer than two values.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values.iter().copied())?;
    let squares: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((squares / (values.len() - 1) as f64).sqrt())
}

/// Statistics of one metric within one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    unit: Option<Unit>,
    mean: Option<f64>,
    std_dev: Option<f64>,
    sample_count: usize,
}

impl MetricStats {
    /// Summarize defined samples of `metric`, all in `unit`.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedMetric` when `samples` is empty.
    pub fn from_samples(metric: Metric, unit: Unit, samples: &[f64]) -> Result<Self> {
        let mean = mean(samples.iter().copied()).ok_or_else(|| Error::UndefinedMetric {
            metric,
            context: "no defined samples".to_string(),
        })?;
        Ok(Self {
            unit: Some(unit),
            mean: Some(mean),
            std_dev: sample_std_dev(samples),
            sample_count: samples.len(),
        })
    }

    /// Statistics of a metric with no defined samples.
    #[must_use]
    pub const fn undefined() -> Self {
        Self {
            unit: None,
            mean: None,
            std_dev: None,
            sample_count: 0,
        }
    }

    /// Get the unit of the samples, if any were defined.
    #[must_use]
    pub const fn unit(&self) -> Option<Unit> {
        self.unit
    }

    /// Get the sample mean.
    #[must_use]
    pub const fn mean(&self) -> Option<f64> {
        self.mean
    }

    /// Get the sample standard deviation (undefined for one sample).
    #[must_use]
    pub const fn std_dev(&self) -> Option<f64> {
        self.std_dev
    }

    /// Get the number of defined samples.
    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Mean, or `UndefinedMetric` if there were no defined samples.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedMetric` naming `metric`.
    pub fn require_mean(&self, metric: Metric) -> Result<f64> {
        self.mean.ok_or_else(|| Error::UndefinedMetric {
            metric,
            context: "mean requested over undefined samples".to_string(),
        })
    }
}

/// Grouping key. Field order is the output sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Protocol parameters
    pub configuration_key: ConfigurationKey,
    /// Payload size in bytes
    pub payload_size: u64,
    /// Locality class, for link-level groups
    pub locality: Option<Locality>,
    /// Destination peer, for per-peer link groups
    pub peer: Option<String>,
}

impl GroupKey {
    /// Protocol-level key: (configuration key, payload size).
    #[must_use]
    pub fn protocol<O: Observation>(observation: &O) -> Self {
        Self {
            configuration_key: observation.configuration_key(),
            payload_size: observation.payload_size(),
            locality: None,
            peer: None,
        }
    }

    /// Link-level key partitioned by locality.
    #[must_use]
    pub fn locality(link: &PairwiseLink) -> Self {
        Self {
            locality: Some(link.locality()),
            ..Self::protocol(link)
        }
    }

    /// Link-level key partitioned by destination peer and locality.
    #[must_use]
    pub fn destination(link: &PairwiseLink) -> Self {
        Self {
            peer: Some(link.to_peer().to_string()),
            ..Self::locality(link)
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} payload={}", self.configuration_key, self.payload_size)?;
        if let Some(locality) = self.locality {
            write!(f, " {locality}")?;
        }
        if let Some(peer) = &self.peer {
            write!(f, " peer={peer}")?;
        }
        Ok(())
    }
}

/// One group of records and its per-metric statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroup {
    key: GroupKey,
    record_count: usize,
    metrics: BTreeMap<Metric, MetricStats>,
}

impl ConfigGroup {
    /// Get the group key.
    #[must_use]
    pub const fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Get the number of records in the group (always ≥ 1).
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Statistics for `metric`, if any record carried it.
    #[must_use]
    pub fn stats(&self, metric: Metric) -> Option<&MetricStats> {
        self.metrics.get(&metric)
    }

    /// Iterate over metric statistics in table order.
    pub fn metrics(&self) -> impl Iterator<Item = (Metric, &MetricStats)> + '_ {
        self.metrics.iter().map(|(m, s)| (*m, s))
    }
}

/// Group `records` with `key_fn` and summarize every metric.
///
/// # Errors
///
/// Returns `UnitMismatch` when samples of one metric in one group carry
/// different units.
///
/// # Example
///
/// ```rust
/// use rb_bench_analysis::aggregate::{aggregate, GroupKey};
/// use rb_bench_analysis::config_key::ConfigurationKey;
/// use rb_bench_analysis::record::{ExperimentRecord, Metric, Metrics};
/// use rb_bench_analysis::units::{Measurement, Unit};
///
/// let records: Vec<_> = [10.0, 20.0, 30.0]
///     .into_iter()
///     .map(|ms| {
///         let metrics = Metrics::new()
///             .with(Metric::Latency, Some(Measurement::new(ms, Unit::Milliseconds)));
///         ExperimentRecord::new(0, 128, ConfigurationKey::protocol(50, 20), metrics)
///     })
///     .collect();
///
/// let groups = aggregate(&records, GroupKey::protocol)?;
/// let latency = groups[0].stats(Metric::Latency).unwrap();
/// assert_eq!(latency.mean(), Some(20.0));
/// assert_eq!(latency.std_dev(), Some(10.0));
/// assert_eq!(latency.sample_count(), 3);
/// # Ok::<(), rb_bench_analysis::Error>(())
/// ```
pub fn aggregate<O, F>(records: &[O], key_fn: F) -> Result<Vec<ConfigGroup>>
where
    O: Observation,
    F: Fn(&O) -> GroupKey,
{
    let mut grouped: BTreeMap<GroupKey, Vec<&O>> = BTreeMap::new();
    for record in records {
        grouped.entry(key_fn(record)).or_default().push(record);
    }

    let groups = grouped
        .into_iter()
        .map(|(key, members)| summarize_group(key, &members))
        .collect::<Result<Vec<_>>>()?;

    info!(
        records = records.len(),
        groups = groups.len(),
        "aggregated records"
    );
    Ok(groups)
}

fn summarize_group<O: Observation>(key: GroupKey, members: &[&O]) -> Result<ConfigGroup> {
    let mut samples: BTreeMap<Metric, (Option<Unit>, Vec<f64>)> = BTreeMap::new();
    for record in members {
        for (metric, value) in record.metrics().iter() {
            let (unit, values) = samples.entry(metric).or_default();
            let Some(measurement) = value else {
                continue;
            };
            match *unit {
                Some(existing) if existing != measurement.unit() => {
                    return Err(Error::UnitMismatch {
                        metric,
                        left: existing,
                        right: measurement.unit(),
                    });
                }
                Some(_) => {}
                None => *unit = Some(measurement.unit()),
            }
            values.push(measurement.value());
        }
    }

    let metrics = samples
        .into_iter()
        .map(|(metric, (unit, values))| {
            let stats = match unit {
                Some(unit) => MetricStats::from_samples(metric, unit, &values)?,
                None => MetricStats::undefined(),
            };
            Ok((metric, stats))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(ConfigGroup {
        key,
        record_count: members.len(),
        metrics,
    })
}
