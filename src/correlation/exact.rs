//! Exact-name matching.

use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::dirname::format_exact_name;
use super::{list_dirs, Correlator, MatchPolicy, MatchResult};
use crate::error::TraceResult;

/// Requires a directory named exactly `YYYY-MM-DD_HH-MM-SS` after the target.
///
/// Names are compared byte for byte, also on case-insensitive filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactName;

impl Correlator for ExactName {
    fn policy(&self) -> MatchPolicy {
        MatchPolicy::Exact
    }

    fn find_match(&self, target: NaiveDateTime, root: &Path) -> TraceResult<MatchResult> {
        let Some(dirs) = list_dirs(root)? else {
            warn!(root = %root.display(), "Image source directory does not exist");
            return Ok(MatchResult::no_match(self.policy(), 0, 0));
        };

        let expected = format_exact_name(target);
        let scanned = dirs.len();

        match dirs.into_iter().find(|(name, _)| *name == expected) {
            Some((_, path)) => {
                info!(path = %path.display(), target = %target, "Matched image directory by name");
                Ok(MatchResult {
                    policy: self.policy(),
                    path: Some(path),
                    delta_secs: None,
                    scanned,
                    parsed: 1,
                })
            }
            None => {
                warn!(
                    root = %root.display(),
                    expected = %expected,
                    scanned,
                    "No image directory with the expected name"
                );
                Ok(MatchResult::no_match(self.policy(), scanned, 0))
            }
        }
    }

    fn single_point(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn target() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_micro_opt(11, 6, 39, 250_000)
            .unwrap()
    }

    #[test]
    fn test_matches_identical_name() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("2026-02-10_11-06-39")).unwrap();

        let result = ExactName.find_match(target(), root.path()).unwrap();
        assert_eq!(result.path, Some(root.path().join("2026-02-10_11-06-39")));
        assert_eq!(result.policy, MatchPolicy::Exact);
    }

    #[test]
    fn test_one_character_off_never_matches() {
        let root = tempfile::tempdir().unwrap();
        for name in [
            "2026-02-10_11-06-38",
            "2026-02-10_11-06-40",
            "2026-02-10_11-06-39 ",
            "2026-02-10_11-06-39-1234",
            "2026-02-10-11-06-39",
        ] {
            fs::create_dir(root.path().join(name)).unwrap();
        }

        let result = ExactName.find_match(target(), root.path()).unwrap();
        assert!(!result.is_match());
        assert_eq!(result.scanned, 5);
    }

    #[test]
    fn test_file_with_expected_name_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("2026-02-10_11-06-39"), b"").unwrap();

        let result = ExactName.find_match(target(), root.path()).unwrap();
        assert!(!result.is_match());
    }
}
