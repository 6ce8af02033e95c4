//! Experiment Record - peer-scoped summary observation

use serde::{Deserialize, Serialize};

use super::{Metrics, Observation};
use crate::config_key::ConfigurationKey;

/// One peer's summary of one benchmark run.
///
/// Created by the loader from one artifact. Unit conversion and default
/// substitution return new records instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    peer_id: usize,
    payload_size: u64,
    configuration_key: ConfigurationKey,
    metrics: Metrics,
}

impl ExperimentRecord {
    /// Create a new experiment record.
    ///
    /// # Arguments
    ///
    /// * `peer_id` - Index of the reporting peer
    /// * `payload_size` - Payload size in bytes
    /// * `configuration_key` - Protocol parameters of the run
    /// * `metrics` - Metric values (possibly undefined)
    #[must_use]
    pub const fn new(
        peer_id: usize,
        payload_size: u64,
        configuration_key: ConfigurationKey,
        metrics: Metrics,
    ) -> Self {
        Self {
            peer_id,
            payload_size,
            configuration_key,
            metrics,
        }
    }

    /// Get the reporting peer index.
    #[must_use]
    pub const fn peer_id(&self) -> usize {
        self.peer_id
    }
}

impl Observation for ExperimentRecord {
    fn payload_size(&self) -> u64 {
        self.payload_size
    }

    fn configuration_key(&self) -> ConfigurationKey {
        self.configuration_key
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn with_metrics(&self, metrics: Metrics) -> Self {
        Self {
            metrics,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Metric;
    use crate::units::{Measurement, Unit};

    #[test]
    fn test_with_metrics_keeps_identity() {
        let record = ExperimentRecord::new(
            3,
            256,
            ConfigurationKey::protocol(50, 20),
            Metrics::new().with(Metric::Latency, None),
        );
        let filled = record.with_metrics(
            Metrics::new().with(Metric::Latency, Some(Measurement::new(1.0, Unit::Milliseconds))),
        );

        assert_eq!(filled.peer_id(), 3);
        assert_eq!(filled.payload_size(), 256);
        assert_eq!(filled.configuration_key(), record.configuration_key());
        assert!(record.metrics().is_undefined(Metric::Latency));
        assert!(filled.metrics().get(Metric::Latency).is_some());
    }
}
