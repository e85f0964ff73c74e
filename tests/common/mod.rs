//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use trace_daq::measurement::{decode_block, encode_block, Record, BLOCK_SIZE};

/// 2026-02-10 at the given time of day.
pub fn at(hour: u32, minute: u32, second: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 10)
        .unwrap()
        .and_hms_micro_opt(hour, minute, second, micro)
        .unwrap()
}

/// Record for `identifier` with the given position timestamps, starting at position 1.
pub fn unit(identifier: &str, timestamps: &[Option<NaiveDateTime>]) -> Record {
    let mut record = decode_block(&[0u8; BLOCK_SIZE]);
    record.id = 1;
    record.presence = !identifier.is_empty();
    record.identifier = identifier.to_string();
    for (position, ts) in record.positions.iter_mut().zip(timestamps) {
        position.result = 1;
        position.timestamp = *ts;
    }
    record
}

/// Wire bytes of [`unit`].
pub fn unit_block(identifier: &str, timestamps: &[Option<NaiveDateTime>]) -> Vec<u8> {
    encode_block(&unit(identifier, timestamps)).to_vec()
}

/// Block with an empty station.
pub fn empty_block() -> Vec<u8> {
    vec![0u8; BLOCK_SIZE]
}

/// Create `root/name` holding the given files.
pub fn image_dir(root: &Path, name: &str, files: &[&str]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::write(dir.join(file), file.as_bytes()).unwrap();
    }
    dir
}

/// Nearest-policy directory name for an instant, with a 4-digit suffix.
pub fn nearest_name(ts: NaiveDateTime) -> String {
    use chrono::Timelike;
    format!(
        "{}-{:04}",
        ts.format("%Y-%m-%d_%H-%M-%S"),
        ts.nanosecond() / 100_000
    )
}

/// Sorted file names under `dir`, empty if it does not exist.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
