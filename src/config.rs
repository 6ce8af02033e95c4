//! Analysis configuration
//!
//! Every knob of a run in one serde struct. Missing fields take their
//! defaults, so a config file only needs to name what it changes:
//!
//! ```json
//! {
//!   "max_payload_size": 8192,
//!   "missing_data": {
//!     "strategy": "substitute",
//!     "defaults": {
//!       "receive_rate": { "value": 0.0, "unit": "percent" },
//!       "rb_rounds": { "value": 100.0, "unit": "rounds" }
//!     }
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::{ArtifactLoader, ErrorMode};
use crate::config_key::KeySource;
use crate::discovery::DEFAULT_ARTIFACT_PREFIX;
use crate::links::PeerTable;
use crate::missing::MissingDataPolicy;
use crate::units::Normalizer;
use crate::{Error, Result};

/// Configuration of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Peer names indexed by peer id
    pub peer_table: PeerTable,
    /// Target units per metric
    pub normalizer: Normalizer,
    /// Handling of undefined metrics
    pub missing_data: MissingDataPolicy,
    /// Handling of per-artifact failures
    pub error_mode: ErrorMode,
    /// File name prefix of artifact files
    pub artifact_prefix: String,
    /// Artifacts with a larger payload (bytes) are filtered out
    pub max_payload_size: Option<u64>,
    /// Fail overhead comparisons whose key sets differ
    pub require_aligned: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            peer_table: PeerTable::default(),
            normalizer: Normalizer::default(),
            missing_data: MissingDataPolicy::default(),
            error_mode: ErrorMode::default(),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            max_payload_size: None,
            require_aligned: false,
        }
    }
}

impl AnalysisConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the peer table.
    #[must_use]
    pub fn with_peer_table(mut self, peer_table: PeerTable) -> Self {
        self.peer_table = peer_table;
        self
    }

    /// Set the normalization targets.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Set the missing-data policy.
    #[must_use]
    pub fn with_missing_data(mut self, policy: MissingDataPolicy) -> Self {
        self.missing_data = policy;
        self
    }

    /// Set the error mode.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Set the artifact file name prefix.
    #[must_use]
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artifact_prefix = prefix.into();
        self
    }

    /// Set the payload ceiling.
    #[must_use]
    pub fn with_max_payload_size(mut self, max: Option<u64>) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Require baseline and treatment to cover the same keys.
    #[must_use]
    pub fn with_require_aligned(mut self, require: bool) -> Self {
        self.require_aligned = require;
        self
    }

    /// Loader configured from this config.
    #[must_use]
    pub fn loader(&self, key_source: KeySource) -> ArtifactLoader {
        ArtifactLoader::new()
            .with_key_source(key_source)
            .with_error_mode(self.error_mode)
            .with_max_payload_size(self.max_payload_size)
    }

    /// Check the configuration for contradictions.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.peer_table.validate()?;
        self.normalizer.validate()?;

        if self.artifact_prefix.is_empty() {
            return Err(Error::Config("artifact_prefix must not be empty".to_string()));
        }
        if self.max_payload_size == Some(0) {
            return Err(Error::Config("max_payload_size must be > 0".to_string()));
        }

        if let MissingDataPolicy::Substitute(defaults) = &self.missing_data {
            for (metric, default) in defaults.iter() {
                let target = self.normalizer.target(metric);
                if default.unit() != target {
                    return Err(Error::Config(format!(
                        "default for '{metric}' is in {}, but {metric} is normalized to {target}",
                        default.unit()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `Json` if it is not a valid config
    /// - `Config` if validation fails
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` on failure.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::missing::MetricDefaults;
    use crate::record::Metric;
    use crate::units::{Measurement, Unit};

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.artifact_prefix, "exp_sub_");
        assert_eq!(config.missing_data, MissingDataPolicy::Exclude);
        assert_eq!(config.error_mode, ErrorMode::Skip);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"max_payload_size": 8192, "error_mode": "strict"}"#).unwrap();
        assert_eq!(config.max_payload_size, Some(8192));
        assert_eq!(config.error_mode, ErrorMode::Strict);
        assert_eq!(config.peer_table.len(), 12);
    }

    #[test]
    fn test_substitute_units_must_match_targets() {
        let wrong =
            MetricDefaults::new().with(Metric::ReceiveRate, Measurement::new(0.0, Unit::Ratio));
        let config = AnalysisConfig::new().with_missing_data(MissingDataPolicy::Substitute(wrong));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let right =
            MetricDefaults::new().with(Metric::ReceiveRate, Measurement::new(0.0, Unit::Percent));
        let config = config.with_missing_data(MissingDataPolicy::Substitute(right));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AnalysisConfig::new().with_artifact_prefix("").validate().is_err());
        assert!(AnalysisConfig::new().with_max_payload_size(Some(0)).validate().is_err());
        assert!(AnalysisConfig::new()
            .with_peer_table(PeerTable::new(["a", "a"]))
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        let config = AnalysisConfig::new()
            .with_max_payload_size(Some(8192))
            .with_require_aligned(true);
        config.save_json(&path).unwrap();
        assert_eq!(AnalysisConfig::load_json(&path).unwrap(), config);
    }
}
