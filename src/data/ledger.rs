//! Append-only per-unit CSV ledger.
//!
//! Layout: `<base_dir>/<YYYY-MM-DD>/<sanitized identifier>/data.csv`. The
//! folder is the durable key for a unit; the CSV under it only ever grows.
//! The header row is written when, and only when, the call creates the file.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error::TraceResult;
use crate::measurement::{Record, MEASUREMENT_COUNT, POSITION_COUNT};

/// File name of the per-unit ledger.
pub const LEDGER_FILE: &str = "data.csv";

/// Folder name used when the record carries no identifier.
pub const UNKNOWN_IDENTIFIER: &str = "UNKNOWN";

const FORBIDDEN: [char; 9] = [':', '\\', '/', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are illegal in directory names with `_`.
///
/// Names made only of dots would resolve to the current or parent directory
/// and are replaced entirely.
pub fn sanitize_identifier(identifier: &str) -> String {
    let sanitized: String = identifier
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    if !sanitized.is_empty() && sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len());
    }
    sanitized
}

/// Fixed column set, in write order.
pub fn csv_header() -> Vec<String> {
    let mut header: Vec<String> = ["timestamp", "id", "presence", "result_total", "ean"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend((1..=MEASUREMENT_COUNT).map(|i| format!("ljs_{i}")));
    for pos in 1..=POSITION_COUNT {
        header.push(format!("pos{pos}_result"));
        header.push(format!("pos{pos}_timestamp"));
    }
    header
}

/// Format a position timestamp for the ledger; `None` becomes empty.
pub fn format_timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}

fn format_measurement(value: f32) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f32::INFINITY {
        "inf".to_string()
    } else if value == f32::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:.6}", f64::from(value))
    }
}

/// Flatten a record into one ledger row.
pub fn csv_row(record: &Record, written_at: NaiveDateTime) -> Vec<String> {
    let mut row = Vec::with_capacity(5 + MEASUREMENT_COUNT + 2 * POSITION_COUNT);
    row.push(written_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
    row.push(record.id.to_string());
    row.push(u8::from(record.presence).to_string());
    row.push(record.result_total.to_string());
    row.push(record.identifier.clone());
    row.extend(record.measurements.iter().copied().map(format_measurement));
    for position in &record.positions {
        row.push(position.result.to_string());
        row.push(format_timestamp(position.timestamp));
    }
    row
}

/// Per-day, per-identifier CSV ledger rooted at a base directory.
#[derive(Debug, Clone)]
pub struct Ledger {
    base_dir: PathBuf,
}

impl Ledger {
    /// Create a ledger rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root directory of all unit folders.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Folder for `record` on `date`, without touching the filesystem.
    pub fn unit_folder(&self, record: &Record, date: NaiveDate) -> PathBuf {
        let identifier = if record.identifier.is_empty() {
            UNKNOWN_IDENTIFIER
        } else {
            record.identifier.as_str()
        };
        self.base_dir
            .join(date.format("%Y-%m-%d").to_string())
            .join(sanitize_identifier(identifier))
    }

    /// Derive and create the unit folder. Idempotent.
    pub fn prepare_folder(&self, record: &Record, now: NaiveDateTime) -> TraceResult<PathBuf> {
        let folder = self.unit_folder(record, now.date());
        fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    /// Append one row for `record`, written at `now`. Returns the unit folder.
    pub fn append(&self, record: &Record, now: NaiveDateTime) -> TraceResult<PathBuf> {
        let folder = self.prepare_folder(record, now)?;
        let csv_path = folder.join(LEDGER_FILE);
        let is_new = !csv_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(csv_header())?;
            debug!(path = %csv_path.display(), "Created ledger with header");
        }
        writer.write_record(csv_row(record, now))?;
        writer.flush()?;

        info!(
            identifier = %record.identifier,
            path = %csv_path.display(),
            "Ledger row appended"
        );
        Ok(folder)
    }
}
