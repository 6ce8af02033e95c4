//! Artifact discovery
//!
//! Walks an experiment directory for artifact files (`<prefix>*.json`) and
//! returns them in a deterministic order: by the integer runs in the file
//! name (so `exp_sub_2` sorts before `exp_sub_10`), then by full path.
//!
//! Symbolic links are followed. Entries below the root that cannot be listed
//! or followed are returned alongside the artifacts so the loader can skip
//! them; only an unreadable root aborts discovery.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Default artifact file name prefix.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "exp_sub_";

const ARTIFACT_EXTENSION: &str = "json";

/// Integer runs of `name`, in order. Runs too long for `u64` saturate.
///
/// ```rust
/// use rb_bench_analysis::discovery::integer_runs;
///
/// assert_eq!(integer_runs("exp_sub_10.json"), vec![10]);
/// assert_eq!(integer_runs("p3-run12"), vec![3, 12]);
/// assert!(integer_runs("none").is_empty());
/// ```
#[must_use]
pub fn integer_runs(name: &str) -> Vec<u64> {
    let mut runs = Vec::new();
    let mut current: Option<u64> = None;
    for c in name.chars() {
        match c.to_digit(10) {
            Some(d) => {
                let value = current.unwrap_or(0);
                current = Some(value.saturating_mul(10).saturating_add(u64::from(d)));
            }
            None => {
                if let Some(value) = current.take() {
                    runs.push(value);
                }
            }
        }
    }
    runs.extend(current);
    runs
}

fn sort_key(path: &Path) -> (Vec<u64>, PathBuf) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (integer_runs(&name), path.to_path_buf())
}

fn is_artifact(path: &Path, prefix: &str) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix));
    let extension_matches = path
        .extension()
        .is_some_and(|ext| ext == ARTIFACT_EXTENSION);
    name_matches && extension_matches
}

/// Artifacts found under one experiment directory.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Artifact paths in discovery order
    pub artifacts: Vec<PathBuf>,
    /// Entries below the root that could not be read, as `DirectoryWalk` errors
    pub unreadable: Vec<(PathBuf, Error)>,
}

/// Find every artifact under `dir`, recursively.
///
/// # Errors
///
/// Returns `Io` if `dir` itself cannot be read.
pub fn discover_artifacts(dir: impl AsRef<Path>, prefix: &str) -> Result<Discovery> {
    let dir = dir.as_ref();
    let mut discovery = Discovery::default();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_artifact(entry.path(), prefix) {
                    discovery.artifacts.push(entry.into_path());
                }
            }
            Err(error) if error.depth() == 0 => return Err(Error::Io(io::Error::from(error))),
            Err(error) => {
                let path = error.path().unwrap_or(dir).to_path_buf();
                debug!(path = %path.display(), error = %error, "unreadable entry");
                discovery.unreadable.push((
                    path.clone(),
                    Error::DirectoryWalk {
                        path,
                        source: error,
                    },
                ));
            }
        }
    }
    discovery.artifacts.sort_by_cached_key(|path| sort_key(path));
    debug!(
        dir = %dir.display(),
        artifacts = discovery.artifacts.len(),
        unreadable = discovery.unreadable.len(),
        "discovered artifacts"
    );
    Ok(discovery)
}
