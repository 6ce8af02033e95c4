//! Metric names and the per-observation metric map

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units::{Measurement, Unit};

/// Metrics reported by benchmark artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Average delivery latency
    Latency,
    /// Delivery throughput
    Throughput,
    /// Fraction of expected messages received
    ReceiveRate,
    /// Average reliable-broadcast rounds per message
    RbRounds,
}

impl Metric {
    /// Every metric, in table order.
    pub const ALL: [Self; 4] = [
        Self::Latency,
        Self::Throughput,
        Self::ReceiveRate,
        Self::RbRounds,
    ];

    /// Column name used in output tables and configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
            Self::ReceiveRate => "receive_rate",
            Self::RbRounds => "rb_rounds",
        }
    }

    /// Unit values arrive in from artifacts.
    #[must_use]
    pub const fn raw_unit(self) -> Unit {
        match self {
            Self::Latency => Unit::Milliseconds,
            Self::Throughput => Unit::MsgsPerSec,
            Self::ReceiveRate => Unit::Ratio,
            Self::RbRounds => Unit::Rounds,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric values of one observation.
///
/// A metric stored as `None` is *undefined*: the observation should carry it
/// but no value could be computed (e.g. latency over an empty result vector).
/// A metric missing from the map does not apply to the observation at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    values: BTreeMap<Metric, Option<Measurement>>,
}

impl Metrics {
    /// Create an empty metric map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or mark undefined) a metric.
    pub fn set(&mut self, metric: Metric, value: Option<Measurement>) {
        self.values.insert(metric, value);
    }

    /// Builder-style [`Metrics::set`].
    #[must_use]
    pub fn with(mut self, metric: Metric, value: Option<Measurement>) -> Self {
        self.set(metric, value);
        self
    }

    /// Defined value of `metric`, if any.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<Measurement> {
        self.values.get(&metric).copied().flatten()
    }

    /// Whether the observation carries `metric` (defined or not).
    #[must_use]
    pub fn contains(&self, metric: Metric) -> bool {
        self.values.contains_key(&metric)
    }

    /// Whether `metric` is carried but undefined.
    #[must_use]
    pub fn is_undefined(&self, metric: Metric) -> bool {
        matches!(self.values.get(&metric), Some(None))
    }

    /// Metrics that are carried but undefined.
    pub fn undefined(&self) -> impl Iterator<Item = Metric> + '_ {
        self.values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(m, _)| *m)
    }

    /// Whether every carried metric has a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.undefined().next().is_none()
    }

    /// Iterate over carried metrics in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<Measurement>)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }

    /// Mutable iteration over carried metrics.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Metric, &mut Option<Measurement>)> + '_ {
        self.values.iter_mut().map(|(m, v)| (*m, v))
    }
}
