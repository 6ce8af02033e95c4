//! Artifact loading
//!
//! One artifact is the JSON file a benchmark peer writes at the end of a run
//! (`exp_sub_<peer>.json`):
//!
//! ```json
//! {
//!   "short_config": { "peer_id": 0, "payload_size": 1024 },
//!   "peer_id": 0,
//!   "result_vec": [
//!     { "key_expr": "/rb/bench/3", "throughput": 812.5, "average_latency_ms": 14.2 }
//!   ],
//!   "receive_rate": 0.98,
//!   "average_rb_rounds": 2.4
//! }
//! ```
//!
//! `result_vec` holds one entry per remote (publishing) peer. The summary
//! record averages those entries; an empty vector leaves latency and
//! throughput undefined rather than zero. The top-level `peer_id` is an
//! optional mirror of `short_config.peer_id` and must agree with it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::mean;
use crate::config_key::{ConfigurationKey, KeySource};
use crate::record::{ExperimentRecord, Metric, Metrics};
use crate::units::{Measurement, Unit};
use crate::{Error, Result};

/// One `result_vec` entry: what the artifact's peer saw from one publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerResult {
    key_expr: String,
    throughput: f64,
    average_latency_ms: f64,
}

impl PeerResult {
    /// Create a result entry (msg/s, ms).
    #[must_use]
    pub fn new(key_expr: impl Into<String>, throughput: f64, average_latency_ms: f64) -> Self {
        Self {
            key_expr: key_expr.into(),
            throughput,
            average_latency_ms,
        }
    }

    /// Get the key expression the publisher wrote to.
    #[must_use]
    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    /// Get the throughput in messages per second.
    #[must_use]
    pub const fn throughput(&self) -> f64 {
        self.throughput
    }

    /// Get the average latency in milliseconds.
    #[must_use]
    pub const fn average_latency_ms(&self) -> f64 {
        self.average_latency_ms
    }

    /// Publisher index: the final `/` segment of the key expression.
    #[must_use]
    pub fn remote_index(&self) -> Option<usize> {
        self.key_expr.rsplit('/').next()?.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct RawShortConfig {
    peer_id: Option<usize>,
    payload_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    short_config: Option<RawShortConfig>,
    #[serde(default)]
    peer_id: Option<usize>,
    #[serde(default)]
    result_vec: Option<Vec<PeerResult>>,
    #[serde(default)]
    receive_rate: Option<f64>,
    #[serde(default)]
    average_rb_rounds: Option<f64>,
    #[serde(default)]
    recvd_msg_num: Option<u64>,
    #[serde(default)]
    expected_msg_num: Option<u64>,
}

/// A validated benchmark artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    source: PathBuf,
    peer_id: usize,
    payload_size: u64,
    configuration_key: ConfigurationKey,
    result_vec: Vec<PeerResult>,
    receive_rate: Option<f64>,
    average_rb_rounds: Option<f64>,
    recvd_msg_num: Option<u64>,
    expected_msg_num: Option<u64>,
}

impl Artifact {
    /// Read and validate the artifact at `path`.
    ///
    /// The configuration key is resolved from the full path, so tags in
    /// parent directory names are picked up. A `payload-<int>` tag in the
    /// path must match `short_config.payload_size`.
    ///
    /// # Errors
    ///
    /// - `MalformedKey` if the key cannot be decoded from the path
    /// - `ArtifactRead` if the file cannot be read
    /// - `ArtifactSchema` if required fields are missing or malformed, or the
    ///   payload tag disagrees with the artifact
    pub fn load(path: impl AsRef<Path>, key_source: KeySource) -> Result<Self> {
        let path = path.as_ref();
        let params = key_source.resolve(&path.to_string_lossy())?;
        let text = std::fs::read_to_string(path).map_err(|source| Error::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = Self::from_json(path, &text, params.configuration_key)?;
        if let Some(tagged) = params.payload_size.filter(|&p| p != artifact.payload_size) {
            return Err(Error::schema(
                path,
                format!(
                    "path tag 'payload-{tagged}' disagrees with 'short_config.payload_size' {}",
                    artifact.payload_size
                ),
            ));
        }
        Ok(artifact)
    }

    /// Validate an artifact from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactSchema` if required fields are missing or malformed.
    pub fn from_json(
        source: impl Into<PathBuf>,
        json: &str,
        configuration_key: ConfigurationKey,
    ) -> Result<Self> {
        let source = source.into();
        let raw: RawArtifact =
            serde_json::from_str(json).map_err(|e| Error::schema(&source, e.to_string()))?;

        let short_config = raw
            .short_config
            .ok_or_else(|| Error::schema(&source, "missing field 'short_config'"))?;
        let peer_id = short_config
            .peer_id
            .ok_or_else(|| Error::schema(&source, "missing field 'short_config.peer_id'"))?;
        if let Some(mirror) = raw.peer_id.filter(|&m| m != peer_id) {
            return Err(Error::schema(
                &source,
                format!("'peer_id' {mirror} disagrees with 'short_config.peer_id' {peer_id}"),
            ));
        }
        let payload_size = short_config
            .payload_size
            .ok_or_else(|| Error::schema(&source, "missing field 'short_config.payload_size'"))?;
        if payload_size == 0 {
            return Err(Error::schema(
                &source,
                "'short_config.payload_size' must be greater than zero",
            ));
        }

        let has_scalars = raw.receive_rate.is_some() || raw.average_rb_rounds.is_some();
        if raw.result_vec.is_none() && !has_scalars {
            return Err(Error::schema(
                &source,
                "expected 'result_vec' or scalar summary fields \
                 ('receive_rate', 'average_rb_rounds')",
            ));
        }

        Ok(Self {
            source,
            peer_id,
            payload_size,
            configuration_key,
            result_vec: raw.result_vec.unwrap_or_default(),
            receive_rate: raw.receive_rate,
            average_rb_rounds: raw.average_rb_rounds,
            recvd_msg_num: raw.recvd_msg_num,
            expected_msg_num: raw.expected_msg_num,
        })
    }

    /// Get the path the artifact was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Get the reporting peer index.
    #[must_use]
    pub const fn peer_id(&self) -> usize {
        self.peer_id
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub const fn payload_size(&self) -> u64 {
        self.payload_size
    }

    /// Get the configuration key.
    #[must_use]
    pub const fn configuration_key(&self) -> ConfigurationKey {
        self.configuration_key
    }

    /// Get the per-publisher results.
    #[must_use]
    pub fn result_vec(&self) -> &[PeerResult] {
        &self.result_vec
    }

    /// Received and expected message totals, when both are reported.
    #[must_use]
    pub const fn delivery_counts(&self) -> Option<(u64, u64)> {
        match (self.recvd_msg_num, self.expected_msg_num) {
            (Some(recvd), Some(expected)) => Some((recvd, expected)),
            _ => None,
        }
    }

    /// Peer-scoped summary record.
    ///
    /// Latency and throughput are means over `result_vec` (undefined when it
    /// is empty). Protocol runs always carry `receive_rate` and `rb_rounds`,
    /// undefined when absent; baseline runs carry them only when reported.
    #[must_use]
    pub fn summary(&self) -> ExperimentRecord {
        let latency = mean(self.result_vec.iter().map(PeerResult::average_latency_ms));
        let throughput = mean(self.result_vec.iter().map(PeerResult::throughput));

        let mut metrics = Metrics::new()
            .with(
                Metric::Latency,
                latency.map(|v| Measurement::new(v, Unit::Milliseconds)),
            )
            .with(
                Metric::Throughput,
                throughput.map(|v| Measurement::new(v, Unit::MsgsPerSec)),
            );

        let protocol_run = !self.configuration_key.is_baseline();
        if protocol_run || self.receive_rate.is_some() {
            metrics.set(
                Metric::ReceiveRate,
                self.receive_rate.map(|v| Measurement::new(v, Unit::Ratio)),
            );
        }
        if protocol_run || self.average_rb_rounds.is_some() {
            metrics.set(
                Metric::RbRounds,
                self.average_rb_rounds
                    .map(|v| Measurement::new(v, Unit::Rounds)),
            );
        }

        ExperimentRecord::new(
            self.peer_id,
            self.payload_size,
            self.configuration_key,
            metrics,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Observation;

    const KEY: ConfigurationKey = ConfigurationKey::protocol(50, 20);

    fn parse(json: &str) -> Result<Artifact> {
        Artifact::from_json("exp_sub_0.json", json, KEY)
    }

    #[test]
    fn test_summary_means_over_result_vec() {
        let artifact = parse(
            r#"{
                "short_config": {"peer_id": 1, "payload_size": 128, "round_timeout": 100},
                "result_vec": [
                    {"key_expr": "/a/0", "throughput": 100.0, "average_latency_ms": 10.0},
                    {"key_expr": "/a/2", "throughput": 300.0, "average_latency_ms": 30.0}
                ],
                "receive_rate": 0.5,
                "average_rb_rounds": 3.0
            }"#,
        )
        .unwrap();

        let record = artifact.summary();
        assert_eq!(record.peer_id(), 1);
        assert_eq!(record.payload_size(), 128);
        let metrics = record.metrics();
        assert!((metrics.get(Metric::Latency).unwrap().value() - 20.0).abs() < 1e-12);
        assert!((metrics.get(Metric::Throughput).unwrap().value() - 200.0).abs() < 1e-12);
        assert_eq!(metrics.get(Metric::ReceiveRate).unwrap().unit(), Unit::Ratio);
        assert!((metrics.get(Metric::RbRounds).unwrap().value() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_result_vec_is_undefined_not_zero() {
        let artifact = parse(
            r#"{"short_config": {"peer_id": 0, "payload_size": 64},
                "result_vec": [], "receive_rate": 0.0}"#,
        )
        .unwrap();
        let record = artifact.summary();
        assert!(record.metrics().is_undefined(Metric::Latency));
        assert!(record.metrics().is_undefined(Metric::Throughput));
        assert!(record.metrics().is_undefined(Metric::RbRounds));
        assert_eq!(record.metrics().get(Metric::ReceiveRate).unwrap().value(), 0.0);
    }

    #[test]
    fn test_baseline_summary_omits_protocol_metrics() {
        let artifact = Artifact::from_json(
            "exp_sub_0.json",
            r#"{"short_config": {"peer_id": 0, "payload_size": 64},
                "result_vec": [{"key_expr": "k/1", "throughput": 1.0, "average_latency_ms": 2.0}]}"#,
            ConfigurationKey::Baseline,
        )
        .unwrap();
        let metrics = artifact.summary().metrics().clone();
        assert!(!metrics.contains(Metric::ReceiveRate));
        assert!(!metrics.contains(Metric::RbRounds));
        assert!(metrics.is_complete());
    }

    #[test]
    fn test_missing_required_fields() {
        let cases = [
            (r#"{"result_vec": []}"#, "short_config"),
            (r#"{"short_config": {"payload_size": 1}, "result_vec": []}"#, "peer_id"),
            (r#"{"short_config": {"peer_id": 1}, "result_vec": []}"#, "payload_size"),
            (
                r#"{"short_config": {"peer_id": 1, "payload_size": 0}, "result_vec": []}"#,
                "greater than zero",
            ),
            (
                r#"{"short_config": {"peer_id": 1, "payload_size": 8}}"#,
                "result_vec",
            ),
            (
                r#"{"short_config": {"peer_id": "x", "payload_size": 8}, "result_vec": []}"#,
                "invalid type",
            ),
            ("not json", "expected"),
        ];
        for (json, needle) in cases {
            let err = parse(json).unwrap_err();
            assert!(
                matches!(err, Error::ArtifactSchema { .. }),
                "expected schema error for {json}"
            );
            assert!(err.to_string().contains(needle), "{err} should mention {needle}");
        }
    }

    #[test]
    fn test_null_scalar_is_undefined() {
        let artifact = parse(
            r#"{"short_config": {"peer_id": 0, "payload_size": 64},
                "receive_rate": null, "average_rb_rounds": 4.0}"#,
        )
        .unwrap();
        assert!(artifact.result_vec().is_empty());
        let record = artifact.summary();
        assert!(record.metrics().is_undefined(Metric::ReceiveRate));
    }

    #[test]
    fn test_remote_index_parsing() {
        assert_eq!(PeerResult::new("/rb/3", 0.0, 0.0).remote_index(), Some(3));
        assert_eq!(PeerResult::new("11", 0.0, 0.0).remote_index(), Some(11));
        assert_eq!(PeerResult::new("/rb/x", 0.0, 0.0).remote_index(), None);
        assert_eq!(PeerResult::new("/rb/", 0.0, 0.0).remote_index(), None);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = Artifact::load(
            "/nonexistent/round-50_echo-20/exp_sub_0.json",
            KeySource::Decode,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ArtifactRead { .. }));
    }

    #[test]
    fn test_peer_id_mirror_must_agree() {
        let agreeing = parse(
            r#"{"short_config": {"peer_id": 4, "payload_size": 64}, "peer_id": 4, "result_vec": []}"#,
        )
        .unwrap();
        assert_eq!(agreeing.peer_id(), 4);

        let err = parse(
            r#"{"short_config": {"peer_id": 4, "payload_size": 64}, "peer_id": 5, "result_vec": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ArtifactSchema { .. }));
        assert!(err.to_string().contains("'peer_id' 5"));
    }

    #[test]
    fn test_load_checks_payload_tag() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("round-50_echo-20");
        let body = r#"{"short_config": {"peer_id": 0, "payload_size": 128}, "result_vec": []}"#;
        for payload in [128, 256] {
            let sub = run.join(format!("payload-{payload}"));
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join("exp_sub_0.json"), body).unwrap();
        }

        let matching = Artifact::load(run.join("payload-128/exp_sub_0.json"), KeySource::Decode)
            .unwrap();
        assert_eq!(matching.payload_size(), 128);
        assert_eq!(matching.configuration_key(), KEY);

        let err = Artifact::load(run.join("payload-256/exp_sub_0.json"), KeySource::Decode)
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactSchema { .. }));
        assert!(err.to_string().contains("payload-256"));
    }

    #[test]
    fn test_delivery_counts() {
        let artifact = parse(
            r#"{"short_config": {"peer_id": 0, "payload_size": 64}, "result_vec": [],
                "recvd_msg_num": 90, "expected_msg_num": 100}"#,
        )
        .unwrap();
        assert_eq!(artifact.delivery_counts(), Some((90, 100)));
    }
}
