//! Delivery rollup
//!
//! Sums received and expected message counts of every peer in a run, giving
//! one delivery ratio per (configuration key, payload size). Unlike the mean
//! of per-peer receive rates, peers that expected more messages weigh more.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::GroupKey;
use crate::artifact::Artifact;

/// Message totals of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRate {
    key: GroupKey,
    received: u64,
    expected: u64,
    artifacts: usize,
}

impl DeliveryRate {
    /// Get the group key.
    #[must_use]
    pub const fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Get the total number of received messages.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Get the total number of expected messages.
    #[must_use]
    pub const fn expected(&self) -> u64 {
        self.expected
    }

    /// Get the number of artifacts that reported counts.
    #[must_use]
    pub const fn artifacts(&self) -> usize {
        self.artifacts
    }

    /// `received / expected`, undefined when nothing was expected.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> Option<f64> {
        (self.expected > 0).then(|| self.received as f64 / self.expected as f64)
    }
}

/// Roll up message counts per (configuration key, payload size).
///
/// Artifacts that do not report both counts are left out. Output is sorted
/// by key.
#[must_use]
pub fn delivery_rates(artifacts: &[Artifact]) -> Vec<DeliveryRate> {
    let mut totals: BTreeMap<GroupKey, DeliveryRate> = BTreeMap::new();
    for artifact in artifacts {
        let Some((received, expected)) = artifact.delivery_counts() else {
            continue;
        };
        let key = GroupKey {
            configuration_key: artifact.configuration_key(),
            payload_size: artifact.payload_size(),
            locality: None,
            peer: None,
        };
        let entry = totals
            .entry(key.clone())
            .or_insert_with(|| DeliveryRate {
                key,
                received: 0,
                expected: 0,
                artifacts: 0,
            });
        entry.received += received;
        entry.expected += expected;
        entry.artifacts += 1;
    }
    totals.into_values().collect()
}
