//! Directory stability check.
//!
//! The image listener exposes no "transfer complete" signal, so a matched
//! directory may still be receiving files. A directory counts as settled
//! once two listings taken `settle` apart are identical in names, sizes
//! and modification times.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::TraceResult;

type Snapshot = Vec<(std::ffi::OsString, u64, Option<SystemTime>)>;

fn snapshot(dir: &Path) -> TraceResult<Snapshot> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        entries.push((entry.file_name(), meta.len(), meta.modified().ok()));
    }
    entries.sort();
    Ok(entries)
}

/// Wait until `dir` stops changing, for at most `timeout`.
///
/// Returns `true` when the directory settled and `false` on timeout. A zero
/// `settle` returns immediately without touching the filesystem.
pub async fn wait_until_settled(
    dir: &Path,
    settle: Duration,
    timeout: Duration,
) -> TraceResult<bool> {
    if settle.is_zero() {
        return Ok(true);
    }

    let started = Instant::now();
    let mut previous = snapshot(dir)?;
    loop {
        tokio::time::sleep(settle).await;
        let current = snapshot(dir)?;
        if current == previous {
            debug!(dir = %dir.display(), waited_ms = started.elapsed().as_millis() as u64, "Directory settled");
            return Ok(true);
        }
        if started.elapsed() >= timeout {
            warn!(
                dir = %dir.display(),
                timeout_ms = timeout.as_millis() as u64,
                "Directory still changing after settle timeout"
            );
            return Ok(false);
        }
        previous = current;
    }
}
