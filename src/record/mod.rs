//! Observation records
//!
//! ## Schema Overview
//!
//! ```text
//! artifact (exp_sub_*.json)
//!     ├── ExperimentRecord (1)     peer-scoped summary
//!     └── PairwiseLink (≤ N-1)     one per remote peer, self-links dropped
//! ```
//!
//! Both kinds implement [`Observation`], which is what the normalizer, the
//! missing-data policy and the aggregator operate on.

mod experiment_record;
mod metric;
mod pairwise_link;

pub use experiment_record::ExperimentRecord;
pub use metric::{Metric, Metrics};
pub use pairwise_link::{Locality, PairwiseLink};

use crate::config_key::ConfigurationKey;

/// Common view over everything that can be normalized and aggregated.
pub trait Observation: Clone {
    /// Payload size in bytes.
    fn payload_size(&self) -> u64;

    /// Protocol parameters of the run.
    fn configuration_key(&self) -> ConfigurationKey;

    /// Metric values carried by the observation.
    fn metrics(&self) -> &Metrics;

    /// Copy of the observation with `metrics` swapped in.
    #[must_use]
    fn with_metrics(&self, metrics: Metrics) -> Self;
}
