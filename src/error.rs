//! Error types for rb-bench-analysis
//!
//! Per-artifact failures (`MalformedKey`, `ArtifactRead`, `ArtifactSchema`,
//! `UnknownPeerIndex`, `DirectoryWalk`) are caught at the batch loader
//! boundary. Everything
//! raised by the pure computation stages propagates to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::Metric;
use crate::units::Unit;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// rb-bench-analysis error types
#[derive(Error, Debug)]
pub enum Error {
    /// Artifact identifier does not carry a required `<tag>-<int>` parameter
    #[error("Malformed configuration key in '{identifier}': missing '{tag}<int>'")]
    MalformedKey {
        /// Identifier that was decoded
        identifier: String,
        /// Tag that could not be located
        tag: String,
    },

    /// Artifact file could not be read
    #[error("Failed to read artifact {}: {source}", path.display())]
    ArtifactRead {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An entry below an experiment directory could not be listed or followed
    #[error("Failed to walk {}: {source}", path.display())]
    DirectoryWalk {
        /// Entry that could not be read
        path: PathBuf,
        /// Underlying walk error
        #[source]
        source: walkdir::Error,
    },

    /// Artifact is missing a required field or a field has the wrong type
    #[error("Invalid artifact {}: {reason}", path.display())]
    ArtifactSchema {
        /// Artifact path
        path: PathBuf,
        /// What was wrong with the artifact
        reason: String,
    },

    /// Peer index points past the end of the peer-name table
    #[error("Unknown peer index {index}: peer table has {table_len} entries")]
    UnknownPeerIndex {
        /// Index found in the artifact
        index: usize,
        /// Number of names in the peer table
        table_len: usize,
    },

    /// A statistic was requested over no defined samples
    #[error("Metric '{metric}' is undefined: {context}")]
    UndefinedMetric {
        /// Metric that has no defined value
        metric: Metric,
        /// Where the undefined value was requested
        context: String,
    },

    /// Baseline and treatment groups do not cover the same keys
    #[error(
        "Overhead alignment gap: {baseline_only} key(s) only in baseline, \
         {treatment_only} key(s) only in treatment"
    )]
    OverheadAlignmentGap {
        /// Keys present only on the baseline side
        baseline_only: usize,
        /// Keys present only on the treatment side
        treatment_only: usize,
    },

    /// Conversion between units of different dimensions
    #[error("Cannot convert {from} to {to}")]
    UnitConversion {
        /// Source unit
        from: Unit,
        /// Requested unit
        to: Unit,
    },

    /// Normalization applied to a value that is no longer in its raw unit
    #[error("Metric '{metric}' is already normalized (unit {unit})")]
    AlreadyNormalized {
        /// Metric being normalized
        metric: Metric,
        /// Unit the value currently carries
        unit: Unit,
    },

    /// Values that must share a unit do not
    #[error("Unit mismatch for metric '{metric}': {left} vs {right}")]
    UnitMismatch {
        /// Metric being combined
        metric: Metric,
        /// First unit seen
        left: Unit,
        /// Conflicting unit
        right: Unit,
    },

    /// The same group key appears twice on one side of a comparison
    #[error("Duplicate group key on {side} side: {key}")]
    DuplicateGroupKey {
        /// Which input carried the duplicate
        side: &'static str,
        /// Rendered key
        key: String,
    },

    /// Invalid analysis configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error outside artifact decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    /// Whether the error belongs to a single artifact and may be skipped in
    /// batch mode.
    #[must_use]
    pub const fn is_per_artifact(&self) -> bool {
        matches!(
            self,
            Self::MalformedKey { .. }
                | Self::ArtifactRead { .. }
                | Self::ArtifactSchema { .. }
                | Self::UnknownPeerIndex { .. }
                | Self::DirectoryWalk { .. }
        )
    }

    pub(crate) fn schema(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
