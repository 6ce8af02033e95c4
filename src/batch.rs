//! Batch artifact loading
//!
//! Loads every artifact of an experiment, in parallel when the `parallel`
//! feature is enabled. Failures that concern a single artifact (unreadable
//! file, unlistable subdirectory, malformed key, schema violation, unknown
//! peer index) are handled
//! according to [`ErrorMode`]:
//!
//! - `Skip` (default): log a warning, record the artifact in the report and
//!   keep going
//! - `Strict`: abort the batch with the first failure in discovery order
//!
//! Any other error always aborts.
//!
//! ```rust,no_run
//! use rb_bench_analysis::batch::{ArtifactLoader, ErrorMode};
//!
//! let report = ArtifactLoader::new()
//!     .with_error_mode(ErrorMode::Skip)
//!     .with_max_payload_size(Some(8192))
//!     .load_dir("results/round-50_echo-20", "exp_sub_")?;
//! println!("{} loaded, {} skipped", report.artifacts.len(), report.skipped.len());
//! # Ok::<(), rb_bench_analysis::Error>(())
//! ```

use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::config_key::KeySource;
use crate::discovery::discover_artifacts;
use crate::links::{build_links, PeerTable};
use crate::record::PairwiseLink;
use crate::{Error, Result};

/// How per-artifact failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Record the failure and continue with the remaining artifacts
    #[default]
    Skip,
    /// Abort on the first failure
    Strict,
}

/// An artifact left out of the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArtifact {
    /// Artifact path
    pub path: PathBuf,
    /// Error message
    pub error: String,
}

impl SkippedArtifact {
    fn new(path: &Path, error: &Error) -> Self {
        Self {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }
}

/// Skip `error` under `Skip` mode, or return it.
fn absorb(
    mode: ErrorMode,
    path: &Path,
    error: Error,
    skipped: &mut Vec<SkippedArtifact>,
) -> Result<()> {
    if mode == ErrorMode::Strict || !error.is_per_artifact() {
        return Err(error);
    }
    warn!(path = %path.display(), error = %error, "skipping artifact");
    skipped.push(SkippedArtifact::new(path, &error));
    Ok(())
}

/// Loaded artifacts and what was left out.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Artifacts that loaded and passed the payload filter, in discovery order
    pub artifacts: Vec<Artifact>,
    /// Artifacts that failed to load
    pub skipped: Vec<SkippedArtifact>,
    /// Artifacts dropped by the payload ceiling
    pub filtered: usize,
}

impl LoadReport {
    /// Append another report.
    pub fn merge(&mut self, other: Self) {
        self.artifacts.extend(other.artifacts);
        self.skipped.extend(other.skipped);
        self.filtered += other.filtered;
    }
}

/// Links of a batch and the artifacts whose links could not be built.
#[derive(Debug, Clone, Default)]
pub struct LinkBatch {
    /// Links of every artifact that expanded cleanly
    pub links: Vec<PairwiseLink>,
    /// Artifacts whose result vector could not be expanded
    pub skipped: Vec<SkippedArtifact>,
}

/// Loads artifacts with a shared key source, error mode and payload ceiling.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLoader {
    key_source: KeySource,
    error_mode: ErrorMode,
    max_payload_size: Option<u64>,
}

impl ArtifactLoader {
    /// Loader that decodes keys from paths, skips failures and keeps every
    /// payload size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how configuration keys are obtained.
    #[must_use]
    pub const fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    /// Set the error mode.
    #[must_use]
    pub const fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Drop artifacts whose payload exceeds `max` bytes.
    #[must_use]
    pub const fn with_max_payload_size(mut self, max: Option<u64>) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Discover and load every artifact under `dir`.
    ///
    /// Entries that could not be walked are reported before the artifacts'
    /// own failures.
    ///
    /// # Errors
    ///
    /// - `Io` if `dir` itself cannot be read
    /// - the first per-artifact error in `Strict` mode
    pub fn load_dir(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<LoadReport> {
        let discovery = discover_artifacts(dir, prefix)?;
        let mut skipped = Vec::new();
        for (path, error) in discovery.unreadable {
            absorb(self.error_mode, &path, error, &mut skipped)?;
        }

        let mut report = self.load_paths(&discovery.artifacts)?;
        skipped.append(&mut report.skipped);
        report.skipped = skipped;
        Ok(report)
    }

    /// Load the given artifact files. Output order follows `paths`.
    ///
    /// # Errors
    ///
    /// Returns the first per-artifact error in `Strict` mode.
    pub fn load_paths<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Result<LoadReport> {
        let load = |path: &P| Artifact::load(path, self.key_source);

        #[cfg(feature = "parallel")]
        let loaded: Vec<Result<Artifact>> = paths.par_iter().map(load).collect();
        #[cfg(not(feature = "parallel"))]
        let loaded: Vec<Result<Artifact>> = paths.iter().map(load).collect();

        let mut report = LoadReport::default();
        for (path, result) in paths.iter().zip(loaded) {
            let path = path.as_ref();
            match result {
                Ok(artifact) if self.exceeds_ceiling(&artifact) => {
                    debug!(
                        path = %path.display(),
                        payload_size = artifact.payload_size(),
                        "payload above ceiling"
                    );
                    report.filtered += 1;
                }
                Ok(artifact) => report.artifacts.push(artifact),
                Err(error) => absorb(self.error_mode, path, error, &mut report.skipped)?,
            }
        }

        info!(
            loaded = report.artifacts.len(),
            skipped = report.skipped.len(),
            filtered = report.filtered,
            "loaded artifacts"
        );
        Ok(report)
    }

    /// Expand every artifact into pairwise links.
    ///
    /// # Errors
    ///
    /// Returns the first link-building error in `Strict` mode.
    pub fn expand_links(&self, artifacts: &[Artifact], peers: &PeerTable) -> Result<LinkBatch> {
        let mut batch = LinkBatch::default();
        for artifact in artifacts {
            match build_links(artifact, peers) {
                Ok(links) => batch.links.extend(links),
                Err(error) => {
                    absorb(self.error_mode, artifact.source(), error, &mut batch.skipped)?;
                }
            }
        }
        Ok(batch)
    }

    fn exceeds_ceiling(&self, artifact: &Artifact) -> bool {
        self.max_payload_size
            .is_some_and(|max| artifact.payload_size() > max)
    }
}
