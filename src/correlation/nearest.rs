//! Nearest-timestamp matching.

use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::dirname::parse_dir_name;
use super::{list_dirs, Correlator, MatchPolicy, MatchResult};
use crate::error::TraceResult;

/// Selects the directory whose encoded instant is closest to the target.
///
/// Ties go to whichever directory the filesystem lists first. Without
/// `max_delta_secs` any parseable directory can win, however far away.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestTimestamp {
    max_delta_secs: Option<f64>,
}

impl NearestTimestamp {
    /// Create the policy with an optional distance cutoff in seconds.
    pub fn new(max_delta_secs: Option<f64>) -> Self {
        Self { max_delta_secs }
    }
}

/// Absolute distance between two instants in fractional seconds.
pub fn delta_secs(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    let delta = a - b;
    match delta.num_microseconds() {
        Some(us) => (us as f64 / 1_000_000.0).abs(),
        // beyond ~292k years; only the ordering matters here
        None => (delta.num_seconds() as f64).abs(),
    }
}

impl Correlator for NearestTimestamp {
    fn policy(&self) -> MatchPolicy {
        MatchPolicy::Nearest
    }

    fn find_match(&self, target: NaiveDateTime, root: &Path) -> TraceResult<MatchResult> {
        let Some(dirs) = list_dirs(root)? else {
            warn!(root = %root.display(), "Image source directory does not exist");
            return Ok(MatchResult::no_match(self.policy(), 0, 0));
        };

        let scanned = dirs.len();
        let mut parsed = 0usize;
        let mut best: Option<(f64, std::path::PathBuf)> = None;

        for (name, path) in dirs {
            let Some(dir_ts) = parse_dir_name(&name) else {
                debug!(entry = %name, "Skipping entry, cannot parse as timestamp");
                continue;
            };
            parsed += 1;
            let delta = delta_secs(dir_ts, target);
            debug!(entry = %name, delta_secs = delta, "Candidate directory");

            if best.as_ref().map_or(true, |(best_delta, _)| delta < *best_delta) {
                best = Some((delta, path));
            }
        }

        let Some((delta, path)) = best else {
            warn!(
                root = %root.display(),
                target = %target,
                scanned,
                parsed,
                "No parseable image directory found"
            );
            return Ok(MatchResult::no_match(self.policy(), scanned, parsed));
        };

        if let Some(max) = self.max_delta_secs {
            if delta > max {
                warn!(
                    path = %path.display(),
                    target = %target,
                    delta_secs = delta,
                    max_delta_secs = max,
                    "Nearest image directory is beyond the configured cutoff"
                );
                return Ok(MatchResult::no_match(self.policy(), scanned, parsed));
            }
        }

        info!(
            path = %path.display(),
            target = %target,
            delta_secs = delta,
            "Matched image directory"
        );
        Ok(MatchResult {
            policy: self.policy(),
            path: Some(path),
            delta_secs: Some(delta),
            scanned,
            parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::fs;

    fn target() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_micro_opt(11, 6, 39, 0)
            .unwrap()
    }

    fn dir_name(ts: NaiveDateTime) -> String {
        ts.format("%Y-%m-%d_%H-%M-%S-%6f").to_string()
    }

    #[test]
    fn test_selects_smallest_delta() {
        let root = tempfile::tempdir().unwrap();
        for offset in [100, 5, 1] {
            fs::create_dir(root.path().join(dir_name(target() + Duration::seconds(offset))))
                .unwrap();
        }

        let result = NearestTimestamp::default()
            .find_match(target(), root.path())
            .unwrap();
        let expected = root.path().join(dir_name(target() + Duration::seconds(1)));
        assert_eq!(result.path, Some(expected));
        assert_eq!(result.delta_secs, Some(1.0));
        assert_eq!(result.parsed, 3);
    }

    #[test]
    fn test_past_and_future_are_symmetric() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join(dir_name(target() - Duration::milliseconds(300)))).unwrap();
        fs::create_dir(root.path().join(dir_name(target() + Duration::milliseconds(400)))).unwrap();

        let result = NearestTimestamp::default()
            .find_match(target(), root.path())
            .unwrap();
        assert_eq!(
            result.path,
            Some(root.path().join(dir_name(target() - Duration::milliseconds(300))))
        );
    }

    #[test]
    fn test_zero_parseable_is_no_match() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("incoming")).unwrap();
        fs::create_dir(root.path().join("2026-02-10_11-06-39")).unwrap();
        fs::write(root.path().join("2026-02-10_11-06-39-1234"), b"file, not dir").unwrap();

        let result = NearestTimestamp::default()
            .find_match(target(), root.path())
            .unwrap();
        assert!(!result.is_match());
        assert_eq!(result.scanned, 2);
        assert_eq!(result.parsed, 0);
    }

    #[test]
    fn test_empty_and_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(!NearestTimestamp::default()
            .find_match(target(), root.path())
            .unwrap()
            .is_match());
        assert!(!NearestTimestamp::default()
            .find_match(target(), &root.path().join("missing"))
            .unwrap()
            .is_match());
    }

    #[test]
    fn test_distant_match_still_returned_without_cutoff() {
        let root = tempfile::tempdir().unwrap();
        let far = target() + Duration::days(3);
        fs::create_dir(root.path().join(dir_name(far))).unwrap();

        let result = NearestTimestamp::default()
            .find_match(target(), root.path())
            .unwrap();
        assert!(result.is_match());
        assert_eq!(result.delta_secs, Some(3.0 * 86_400.0));
    }

    #[test]
    fn test_cutoff_rejects_distant_match() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join(dir_name(target() + Duration::seconds(30)))).unwrap();

        let result = NearestTimestamp::new(Some(10.0))
            .find_match(target(), root.path())
            .unwrap();
        assert!(!result.is_match());
        assert_eq!(result.parsed, 1);
    }

    #[test]
    fn test_delta_secs_fractional() {
        let a = target();
        let b = a + Duration::microseconds(1_500_000);
        assert_eq!(delta_secs(a, b), 1.5);
        assert_eq!(delta_secs(b, a), 1.5);
    }
}
