//! Pairwise link reconstruction
//!
//! Each artifact's `result_vec` is what one subscriber saw from every
//! publisher. Expanding it gives directed `from → to` links. Peer names come
//! from an ordered [`PeerTable`]; the part of a name before the first `-` is
//! its locality group (`"2-1"` .. `"2-6"` share group `"2"`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::record::PairwiseLink;
use crate::{Error, Result};

/// Peer names of the benchmark farm, indexed by peer id.
const DEFAULT_PEERS: [&str; 12] = [
    "2-1", "2-2", "2-3", "2-4", "2-5", "2-6", "3-1", "3-2", "3-3", "3-4", "3-5", "3-6",
];

/// Locality group of a structured peer name.
///
/// ```rust
/// use rb_bench_analysis::links::locality_group;
///
/// assert_eq!(locality_group("2-5"), "2");
/// assert_eq!(locality_group("solo"), "solo");
/// ```
#[must_use]
pub fn locality_group(peer: &str) -> &str {
    peer.split('-').next().unwrap_or(peer)
}

/// Whether two peers share a locality group. Symmetric.
#[must_use]
pub fn is_local(a: &str, b: &str) -> bool {
    locality_group(a) == locality_group(b)
}

/// Ordered table mapping peer indices to names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerTable {
    names: Vec<String>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new(DEFAULT_PEERS)
    }
}

impl PeerTable {
    /// Create a table from names in peer-id order.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of peer `index`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeerIndex` when `index` is past the end of the table.
    pub fn name(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(Error::UnknownPeerIndex {
                index,
                table_len: self.names.len(),
            })
    }

    /// Number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check that names are unique and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(Error::Config("peer table is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for name in &self.names {
            if name.is_empty() {
                return Err(Error::Config("peer table contains an empty name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!("duplicate peer name '{name}'")));
            }
        }
        Ok(())
    }
}

/// Expand an artifact's result vector into directed links.
///
/// `to_peer` is the artifact's own peer, `from_peer` the publisher named by
/// the last `/` segment of each `key_expr`. The self-link entry is dropped.
///
/// # Errors
///
/// - `UnknownPeerIndex` if any index (own or remote) is outside the table
/// - `ArtifactSchema` if a `key_expr` does not end in an integer, or the same
///   publisher appears twice
pub fn build_links(artifact: &Artifact, peers: &PeerTable) -> Result<Vec<PairwiseLink>> {
    let to_peer = peers.name(artifact.peer_id())?;
    let mut seen = HashSet::new();
    let mut links = Vec::with_capacity(artifact.result_vec().len().saturating_sub(1));

    for entry in artifact.result_vec() {
        let index = entry.remote_index().ok_or_else(|| {
            Error::schema(
                artifact.source(),
                format!("key_expr '{}' does not end in a peer index", entry.key_expr()),
            )
        })?;
        let from_peer = peers.name(index)?;
        if !seen.insert(index) {
            return Err(Error::schema(
                artifact.source(),
                format!("duplicate result entry for peer '{from_peer}'"),
            ));
        }
        if from_peer == to_peer {
            continue;
        }

        links.push(PairwiseLink::new(
            from_peer,
            to_peer,
            artifact.payload_size(),
            artifact.configuration_key(),
            is_local(from_peer, to_peer),
            entry.throughput(),
            entry.average_latency_ms(),
        ));
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_key::ConfigurationKey;
    use crate::record::{Locality, Observation};

    fn artifact(peer_id: usize, remotes: &[usize]) -> Artifact {
        let entries: Vec<String> = remotes
            .iter()
            .map(|r| {
                format!(r#"{{"key_expr": "/rb/{r}", "throughput": 10.0, "average_latency_ms": 5.0}}"#)
            })
            .collect();
        let json = format!(
            r#"{{"short_config": {{"peer_id": {peer_id}, "payload_size": 512}}, "result_vec": [{}]}}"#,
            entries.join(",")
        );
        Artifact::from_json("exp_sub.json", &json, ConfigurationKey::protocol(50, 20)).unwrap()
    }

    #[test]
    fn test_build_links_drops_self_link() {
        let links = build_links(&artifact(0, &[0, 1, 6]), &PeerTable::default()).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.from_peer() != l.to_peer()));
        assert!(links.iter().all(|l| l.to_peer() == "2-1"));
    }

    #[test]
    fn test_locality_classification() {
        let links = build_links(&artifact(0, &[1, 6]), &PeerTable::default()).unwrap();
        assert_eq!(links[0].from_peer(), "2-2");
        assert_eq!(links[0].locality(), Locality::Local);
        assert_eq!(links[1].from_peer(), "3-1");
        assert_eq!(links[1].locality(), Locality::Cross);
        assert_eq!(links[1].payload_size(), 512);
    }

    #[test]
    fn test_unknown_peer_index_is_an_error() {
        let err = build_links(&artifact(0, &[12]), &PeerTable::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPeerIndex {
                index: 12,
                table_len: 12
            }
        ));

        let err = build_links(&artifact(40, &[1]), &PeerTable::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownPeerIndex { index: 40, .. }));
    }

    #[test]
    fn test_duplicate_publisher_rejected() {
        let err = build_links(&artifact(0, &[1, 1]), &PeerTable::default()).unwrap_err();
        assert!(matches!(err, Error::ArtifactSchema { .. }));
    }

    #[test]
    fn test_is_local_symmetric() {
        assert!(is_local("2-1", "2-6"));
        assert!(!is_local("2-1", "3-1"));
        assert_eq!(is_local("3-2", "2-2"), is_local("2-2", "3-2"));
    }

    #[test]
    fn test_peer_table_validate() {
        assert!(PeerTable::default().validate().is_ok());
        assert!(PeerTable::new(Vec::<String>::new()).validate().is_err());
        assert!(PeerTable::new(["a-1", "a-1"]).validate().is_err());
        assert_eq!(PeerTable::default().len(), 12);
    }
}
