//! Pairwise Link - directed publisher → subscriber observation

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Metric, Metrics, Observation};
use crate::config_key::ConfigurationKey;
use crate::units::{Measurement, Unit};

/// Whether a link stays inside one host group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// Both peers share a locality group
    Local,
    /// Peers sit in different locality groups
    Cross,
}

impl Locality {
    /// Locality from the `is_local` flag.
    #[must_use]
    pub const fn from_is_local(is_local: bool) -> Self {
        if is_local {
            Self::Local
        } else {
            Self::Cross
        }
    }

    /// Label used in tables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cross => "cross",
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Throughput and latency observed from one remote peer at one subscriber.
///
/// `from_peer` published, `to_peer` (the artifact's own peer) received.
/// Self-links are never constructed by the link builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseLink {
    from_peer: String,
    to_peer: String,
    payload_size: u64,
    configuration_key: ConfigurationKey,
    is_local: bool,
    metrics: Metrics,
}

impl PairwiseLink {
    /// Create a link from raw artifact values (msg/s and ms).
    #[must_use]
    pub fn new(
        from_peer: impl Into<String>,
        to_peer: impl Into<String>,
        payload_size: u64,
        configuration_key: ConfigurationKey,
        is_local: bool,
        throughput_msgs_per_sec: f64,
        latency_ms: f64,
    ) -> Self {
        let metrics = Metrics::new()
            .with(
                Metric::Throughput,
                Some(Measurement::new(throughput_msgs_per_sec, Unit::MsgsPerSec)),
            )
            .with(
                Metric::Latency,
                Some(Measurement::new(latency_ms, Unit::Milliseconds)),
            );
        Self {
            from_peer: from_peer.into(),
            to_peer: to_peer.into(),
            payload_size,
            configuration_key,
            is_local,
            metrics,
        }
    }

    /// Get the publishing peer name.
    #[must_use]
    pub fn from_peer(&self) -> &str {
        &self.from_peer
    }

    /// Get the receiving peer name.
    #[must_use]
    pub fn to_peer(&self) -> &str {
        &self.to_peer
    }

    /// Locality class of the link.
    #[must_use]
    pub const fn locality(&self) -> Locality {
        Locality::from_is_local(self.is_local)
    }
}

impl Observation for PairwiseLink {
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
