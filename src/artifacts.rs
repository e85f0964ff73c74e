//! Transfer of position images into a unit folder.
//!
//! Every regular file in the matched directory whose name starts with
//! `POZ{position}` is transferred into `<destination>/images/`. The prefix
//! match is deliberate: `POZ3` also selects `POZ3a…` and `POZ3_…`. Existing
//! files at the destination are overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TraceResult;

/// Name of the per-unit image sub-directory.
pub const IMAGES_DIR: &str = "images";

/// How files leave the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Copy and keep the source. Re-running is harmless.
    #[default]
    Copy,
    /// Copy, delete the source file, and remove the source directory once
    /// it is empty.
    Move,
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(TransferMode::Copy),
            "move" => Ok(TransferMode::Move),
            other => Err(format!(
                "Invalid transfer mode '{}'. Must be one of: copy, move",
                other
            )),
        }
    }
}

/// File-name prefix for a 1-based position number.
pub fn position_prefix(position: usize) -> String {
    format!("POZ{position}")
}

/// Moves or copies position images into unit folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactMover {
    mode: TransferMode,
}

impl ArtifactMover {
    /// Create a mover with the given transfer mode.
    pub fn new(mode: TransferMode) -> Self {
        Self { mode }
    }

    /// Configured transfer mode.
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Transfer the files of `position` from `source` to `destination/images`.
    ///
    /// Returns the number of files transferred; zero is a normal outcome.
    pub fn transfer(&self, source: &Path, position: usize, destination: &Path) -> TraceResult<usize> {
        let prefix = position_prefix(position);
        let images_dir = destination.join(IMAGES_DIR);
        fs::create_dir_all(&images_dir)?;

        let candidates = matching_files(source, &prefix)?;
        let mut count = 0usize;
        for (name, src) in candidates {
            let dst = images_dir.join(&name);
            fs::copy(&src, &dst)?;
            if self.mode == TransferMode::Move {
                fs::remove_file(&src)?;
            }
            debug!(src = %src.display(), dst = %dst.display(), "Transferred image");
            count += 1;
        }

        if count == 0 {
            warn!(
                prefix = %prefix,
                source = %source.display(),
                "No image files with prefix found"
            );
        } else {
            info!(
                position,
                count,
                mode = ?self.mode,
                source = %source.display(),
                destination = %images_dir.display(),
                "Transferred position images"
            );
        }

        if self.mode == TransferMode::Move {
            remove_if_empty(source);
        }

        Ok(count)
    }
}

fn matching_files(source: &Path, prefix: &str) -> TraceResult<Vec<(std::ffi::OsString, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        let matches = name.to_str().is_some_and(|n| n.starts_with(prefix));
        if matches && entry.file_type()?.is_file() {
            files.push((name, entry.path()));
        }
    }
    Ok(files)
}

fn remove_if_empty(dir: &Path) {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if !is_empty {
        return;
    }
    match fs::remove_dir(dir) {
        Ok(()) => debug!(dir = %dir.display(), "Removed empty source directory"),
        Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove empty source directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn test_prefix_selects_variants_only_for_position() {
        let source = source_with(&["POZ2_a.jpg", "POZ2b.jpg", "POZ3_x.jpg"]);
        let dest = tempfile::tempdir().unwrap();

        let count = ArtifactMover::new(TransferMode::Copy)
            .transfer(source.path(), 2, dest.path())
            .unwrap();

        assert_eq!(count, 2);
        let images = dest.path().join(IMAGES_DIR);
        assert!(images.join("POZ2_a.jpg").is_file());
        assert!(images.join("POZ2b.jpg").is_file());
        assert!(!images.join("POZ3_x.jpg").exists());
        // copy mode keeps everything at the source
        assert!(source.path().join("POZ2_a.jpg").is_file());
        assert!(source.path().join("POZ3_x.jpg").is_file());
    }

    #[test]
    fn test_move_deletes_sources_and_keeps_others() {
        let source = source_with(&["POZ2_a.jpg", "POZ2b.jpg", "POZ3_x.jpg"]);
        let dest = tempfile::tempdir().unwrap();

        let count = ArtifactMover::new(TransferMode::Move)
            .transfer(source.path(), 2, dest.path())
            .unwrap();

        assert_eq!(count, 2);
        assert!(!source.path().join("POZ2_a.jpg").exists());
        assert!(!source.path().join("POZ2b.jpg").exists());
        assert!(source.path().join("POZ3_x.jpg").is_file());
        assert!(source.path().is_dir());
    }

    #[test]
    fn test_move_removes_emptied_source_dir() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("2026-02-10_11-06-39-1234");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("POZ1_a.jpg"), b"a").unwrap();
        let dest = tempfile::tempdir().unwrap();

        let count = ArtifactMover::new(TransferMode::Move)
            .transfer(&source, 1, dest.path())
            .unwrap();

        assert_eq!(count, 1);
        assert!(!source.exists());
    }

    #[test]
    fn test_zero_matches_is_ok_and_creates_images_dir() {
        let source = source_with(&["POZ3_x.jpg"]);
        let dest = tempfile::tempdir().unwrap();

        let count = ArtifactMover::default()
            .transfer(source.path(), 1, dest.path())
            .unwrap();
        assert_eq!(count, 0);
        assert!(dest.path().join(IMAGES_DIR).is_dir());
    }

    #[test]
    fn test_subdirectories_are_not_transferred() {
        let source = source_with(&["POZ1_a.jpg"]);
        fs::create_dir(source.path().join("POZ1_thumbs")).unwrap();
        let dest = tempfile::tempdir().unwrap();

        let count = ArtifactMover::default()
            .transfer(source.path(), 1, dest.path())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_collision_overwrites() {
        let source = source_with(&["POZ1_a.jpg"]);
        let dest = tempfile::tempdir().unwrap();
        let images = dest.path().join(IMAGES_DIR);
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("POZ1_a.jpg"), b"old").unwrap();

        ArtifactMover::default()
            .transfer(source.path(), 1, dest.path())
            .unwrap();
        assert_eq!(fs::read(images.join("POZ1_a.jpg")).unwrap(), b"POZ1_a.jpg");
    }

    #[test]
    fn test_transfer_mode_parse() {
        assert_eq!("move".parse::<TransferMode>().unwrap(), TransferMode::Move);
        assert_eq!("Copy".parse::<TransferMode>().unwrap(), TransferMode::Copy);
        assert!("rename".parse::<TransferMode>().is_err());
    }
}
