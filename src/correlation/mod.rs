//! Timestamp correlation between controller positions and image directories.
//!
//! The vision subsystem writes one directory per capture into a shared root
//! and names it after its own wall clock. The only link between a unit and
//! its images is therefore time. Two interchangeable policies are provided
//! behind [`Correlator`]:
//!
//! - [`NearestTimestamp`]: pick the directory whose encoded instant is
//!   closest to the target (names `YYYY-MM-DD_HH-MM-SS-<digits>`).
//! - [`ExactName`]: require a directory named exactly
//!   `YYYY-MM-DD_HH-MM-SS` after the target.
//!
//! Neither policy applies a distance cutoff unless one is configured, so a
//! far-away "best" directory is still returned when no image set belongs to
//! the unit. Callers log the delta so such matches can be audited.
//!
//! The image listener may still be writing into a directory while it is
//! scanned; [`settle::wait_until_settled`] is an optional guard for that.

pub mod dirname;
pub mod exact;
pub mod nearest;
pub mod settle;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TraceResult;

pub use dirname::{format_exact_name, parse_dir_name};
pub use exact::ExactName;
pub use nearest::NearestTimestamp;

/// Selectable matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Closest encoded instant wins.
    #[default]
    Nearest,
    /// Directory name must equal the formatted instant.
    Exact,
}

impl MatchPolicy {
    /// Build the correlator for this policy.
    ///
    /// `max_delta_secs` only applies to [`MatchPolicy::Nearest`].
    pub fn correlator(self, max_delta_secs: Option<f64>) -> Box<dyn Correlator> {
        match self {
            MatchPolicy::Nearest => Box::new(NearestTimestamp::new(max_delta_secs)),
            MatchPolicy::Exact => Box::new(ExactName),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Nearest => write!(f, "nearest"),
            MatchPolicy::Exact => write!(f, "exact"),
        }
    }
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(MatchPolicy::Nearest),
            "exact" => Ok(MatchPolicy::Exact),
            other => Err(format!(
                "Invalid match policy '{}'. Must be one of: nearest, exact",
                other
            )),
        }
    }
}

/// Outcome of one correlation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Policy that produced this result.
    pub policy: MatchPolicy,
    /// Matched directory, `None` when nothing matched.
    pub path: Option<PathBuf>,
    /// Absolute distance between target and match, in seconds.
    pub delta_secs: Option<f64>,
    /// Sub-directories inspected.
    pub scanned: usize,
    /// Entries whose names were usable by the policy.
    pub parsed: usize,
}

impl MatchResult {
    /// A result without a match.
    pub fn no_match(policy: MatchPolicy, scanned: usize, parsed: usize) -> Self {
        Self {
            policy,
            path: None,
            delta_secs: None,
            scanned,
            parsed,
        }
    }

    /// True when a directory was selected.
    pub fn is_match(&self) -> bool {
        self.path.is_some()
    }
}

/// Finds the image directory belonging to a controller instant.
pub trait Correlator: Send + Sync {
    /// Policy implemented by this correlator.
    fn policy(&self) -> MatchPolicy;

    /// Scan `root` for the directory corresponding to `target`.
    ///
    /// A missing root or zero usable entries is a soft miss
    /// (`Ok` with no path); other I/O failures are returned.
    fn find_match(&self, target: NaiveDateTime, root: &Path) -> TraceResult<MatchResult>;

    /// True when one directory holds the images of every position, keyed
    /// by a single instant per unit.
    fn single_point(&self) -> bool {
        false
    }
}

/// List the sub-directories of `root` in directory order.
///
/// Returns `Ok(None)` when `root` is not a directory.
pub(crate) fn list_dirs(root: &Path) -> TraceResult<Option<Vec<(String, PathBuf)>>> {
    if !root.is_dir() {
        return Ok(None);
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        // Names that are not valid UTF-8 cannot match either contract.
        if let Ok(name) = entry.file_name().into_string() {
            dirs.push((name, path));
        }
    }
    Ok(Some(dirs))
}
