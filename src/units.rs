//! Unit-tagged measurements and the unit normalizer
//!
//! Every metric value travels with its [`Unit`]. The loader produces values in
//! their raw units (msg/s, ms, ratio, rounds); [`Normalizer`] converts them
//! once into the units an analysis reports in. Re-normalizing a value that
//! already left its raw unit fails with [`Error::AlreadyNormalized`], so a
//! double conversion cannot happen silently.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{Metric, Observation};
use crate::{Error, Result};

/// Bytes per MiB
pub const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Physical dimension of a unit; conversions only happen within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Data rate
    Throughput,
    /// Elapsed time
    Latency,
    /// Fraction of expected messages delivered
    Rate,
    /// Plain count
    Count,
}

/// Measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Messages per second (raw throughput)
    MsgsPerSec,
    /// Bytes per second
    BytesPerSec,
    /// MiB per second
    MibPerSec,
    /// Milliseconds (raw latency)
    Milliseconds,
    /// Seconds
    Seconds,
    /// Fraction in `0..=1` (raw receive rate)
    Ratio,
    /// Percent in `0..=100`
    Percent,
    /// Reliable-broadcast rounds
    Rounds,
}

impl Unit {
    /// Dimension of the unit.
    #[must_use]
    pub const fn dimension(self) -> Dimension {
        match self {
            Self::MsgsPerSec | Self::BytesPerSec | Self::MibPerSec => Dimension::Throughput,
            Self::Milliseconds | Self::Seconds => Dimension::Latency,
            Self::Ratio | Self::Percent => Dimension::Rate,
            Self::Rounds => Dimension::Count,
        }
    }

    /// Short symbol used in table output.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::MsgsPerSec => "msg/s",
            Self::BytesPerSec => "B/s",
            Self::MibPerSec => "MiB/s",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Ratio => "ratio",
            Self::Percent => "%",
            Self::Rounds => "rounds",
        }
    }

    /// Whether artifacts report values in this unit.
    #[must_use]
    pub const fn is_raw(self) -> bool {
        matches!(
            self,
            Self::MsgsPerSec | Self::Milliseconds | Self::Ratio | Self::Rounds
        )
    }

    // Multiplier from this unit into the dimension's base unit
    // (bytes/s, seconds, ratio, rounds).
    #[allow(clippy::cast_precision_loss)]
    fn base_factor(self, payload_size: u64) -> f64 {
        match self {
            Self::MsgsPerSec => payload_size as f64,
            Self::BytesPerSec | Self::Seconds | Self::Ratio | Self::Rounds => 1.0,
            Self::MibPerSec => BYTES_PER_MIB,
            Self::Milliseconds => 1e-3,
            Self::Percent => 1e-2,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A value tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    value: f64,
    unit: Unit,
}

impl Measurement {
    /// Create a measurement.
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the unit.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Convert into `target`.
    ///
    /// Message-rate conversions need the payload size of the observation.
    ///
    /// # Errors
    ///
    /// Returns `UnitConversion` when the units have different dimensions, or
    /// when a msg/s conversion is requested with a zero payload size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rb_bench_analysis::units::{Measurement, Unit};
    ///
    /// let raw = Measurement::new(2048.0, Unit::MsgsPerSec);
    /// let mib = raw.convert_to(Unit::MibPerSec, 512)?;
    /// assert!((mib.value() - 1.0).abs() < 1e-12);
    /// # Ok::<(), rb_bench_analysis::Error>(())
    /// ```
    pub fn convert_to(self, target: Unit, payload_size: u64) -> Result<Self> {
        if self.unit == target {
            return Ok(self);
        }
        let mismatch = || Error::UnitConversion {
            from: self.unit,
            to: target,
        };
        if self.unit.dimension() != target.dimension() {
            return Err(mismatch());
        }
        let involves_msgs = self.unit == Unit::MsgsPerSec || target == Unit::MsgsPerSec;
        if involves_msgs && payload_size == 0 {
            return Err(mismatch());
        }

        let base = self.value * self.unit.base_factor(payload_size);
        Ok(Self::new(base / target.base_factor(payload_size), target))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Target units for one analysis.
///
/// The default reports throughput in MiB/s, latency in milliseconds and
/// receive rate in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalizer {
    /// Throughput unit (msg/s, B/s or MiB/s)
    pub throughput: Unit,
    /// Latency unit (ms or s)
    pub latency: Unit,
    /// Receive-rate unit (ratio or percent)
    pub receive_rate: Unit,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            throughput: Unit::MibPerSec,
            latency: Unit::Milliseconds,
            receive_rate: Unit::Percent,
        }
    }
}

impl Normalizer {
    /// Normalizer that keeps every metric in its raw unit.
    #[must_use]
    pub const fn raw() -> Self {
        Self {
            throughput: Unit::MsgsPerSec,
            latency: Unit::Milliseconds,
            receive_rate: Unit::Ratio,
        }
    }

    /// Set the throughput target.
    #[must_use]
    pub const fn with_throughput(mut self, unit: Unit) -> Self {
        self.throughput = unit;
        self
    }

    /// Set the latency target.
    #[must_use]
    pub const fn with_latency(mut self, unit: Unit) -> Self {
        self.latency = unit;
        self
    }

    /// Set the receive-rate target.
    #[must_use]
    pub const fn with_receive_rate(mut self, unit: Unit) -> Self {
        self.receive_rate = unit;
        self
    }

    /// Check that every target belongs to its metric's dimension.
    ///
    /// # Errors
    ///
    /// Returns `UnitConversion` for the first target of the wrong dimension.
    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            let raw = metric.raw_unit();
            let target = self.target(metric);
            if raw.dimension() != target.dimension() {
                return Err(Error::UnitConversion {
                    from: raw,
                    to: target,
                });
            }
        }
        Ok(())
    }

    /// Target unit for `metric`.
    #[must_use]
    pub const fn target(&self, metric: Metric) -> Unit {
        match metric {
            Metric::Throughput => self.throughput,
            Metric::Latency => self.latency,
            Metric::ReceiveRate => self.receive_rate,
            Metric::RbRounds => Unit::Rounds,
        }
    }

    /// Return a copy of `observation` with every defined metric converted.
    ///
    /// Undefined metrics stay undefined.
    ///
    /// # Errors
    ///
    /// - `AlreadyNormalized` if a value is not in its raw unit and the target
    ///   differs from its current unit
    /// - `UnitConversion` if a target has the wrong dimension
    pub fn normalize<O: Observation>(&self, observation: &O) -> Result<O> {
        let payload_size = observation.payload_size();
        let mut metrics = observation.metrics().clone();
        for (metric, slot) in metrics.iter_mut() {
            let Some(measurement) = slot else {
                continue;
            };
            let target = self.target(metric);
            if measurement.unit() == target {
                continue;
            }
            if !measurement.unit().is_raw() {
                return Err(Error::AlreadyNormalized {
                    metric,
                    unit: measurement.unit(),
                });
            }
            *slot = Some(measurement.convert_to(target, payload_size)?);
        }
        Ok(observation.with_metrics(metrics))
    }

    /// Normalize every observation of a batch.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`Normalizer::normalize`].
    pub fn normalize_all<O: Observation>(&self, observations: &[O]) -> Result<Vec<O>> {
        self.validate()?;
        observations.iter().map(|o| self.normalize(o)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_key::ConfigurationKey;
    use crate::record::{ExperimentRecord, Metrics};

    fn record(throughput: f64, latency: f64) -> ExperimentRecord {
        let mut metrics = Metrics::new();
        metrics.set(Metric::Throughput, Some(Measurement::new(throughput, Unit::MsgsPerSec)));
        metrics.set(Metric::Latency, Some(Measurement::new(latency, Unit::Milliseconds)));
        metrics.set(Metric::ReceiveRate, None);
        ExperimentRecord::new(0, 1024, ConfigurationKey::protocol(50, 20), metrics)
    }

    #[test]
    fn test_throughput_to_bytes_and_mib() {
        let m = Measurement::new(10.0, Unit::MsgsPerSec);
        let bytes = m.convert_to(Unit::BytesPerSec, 1024).unwrap();
        assert!((bytes.value() - 10_240.0).abs() < 1e-9);

        let mib = Measurement::new(1024.0, Unit::MsgsPerSec)
            .convert_to(Unit::MibPerSec, 1024)
            .unwrap();
        assert!((mib.value() - 1.0).abs() < 1e-12);
        assert_eq!(mib.unit(), Unit::MibPerSec);
    }

    #[test]
    fn test_latency_to_seconds() {
        let s = Measurement::new(250.0, Unit::Milliseconds)
            .convert_to(Unit::Seconds, 1)
            .unwrap();
        assert!((s.value() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cross_dimension_rejected() {
        let err = Measurement::new(1.0, Unit::Milliseconds)
            .convert_to(Unit::MibPerSec, 1)
            .unwrap_err();
        assert!(matches!(err, Error::UnitConversion { .. }));
    }

    #[test]
    fn test_zero_payload_rejected_for_message_rates() {
        let err = Measurement::new(1.0, Unit::MsgsPerSec)
            .convert_to(Unit::BytesPerSec, 0)
            .unwrap_err();
        assert!(matches!(err, Error::UnitConversion { .. }));
    }

    #[test]
    fn test_normalize_keeps_undefined() {
        let normalizer = Normalizer::default().with_latency(Unit::Seconds);
        let out = normalizer.normalize(&record(2048.0, 100.0)).unwrap();

        let tp = out.metrics().get(Metric::Throughput).unwrap();
        assert_eq!(tp.unit(), Unit::MibPerSec);
        assert!((tp.value() - 2.0).abs() < 1e-12);
        let lat = out.metrics().get(Metric::Latency).unwrap();
        assert!((lat.value() - 0.1).abs() < 1e-12);
        assert!(out.metrics().is_undefined(Metric::ReceiveRate));
    }

    #[test]
    fn test_double_normalization_rejected() {
        let normalizer = Normalizer::default().with_latency(Unit::Seconds);
        let once = normalizer.normalize(&record(1.0, 1.0)).unwrap();
        // Same targets: nothing left to convert.
        assert!(normalizer.normalize(&once).is_ok());

        let other = normalizer.with_throughput(Unit::BytesPerSec);
        let err = other.normalize(&once).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyNormalized {
                metric: Metric::Throughput,
                unit: Unit::MibPerSec
            }
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_dimension() {
        let bad = Normalizer::default().with_latency(Unit::Percent);
        assert!(bad.validate().is_err());
        assert!(Normalizer::raw().validate().is_ok());
    }
}
