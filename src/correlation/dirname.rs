//! Directory-name timestamp formats written by the vision subsystem.

use chrono::{NaiveDateTime, Timelike};

/// Second-resolution pattern shared by both naming contracts.
pub const DIR_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Parse a `YYYY-MM-DD_HH-MM-SS-<digits>` directory name.
///
/// The digits after the last hyphen are positional: they are right-padded
/// with `0` to six characters and truncated to six, so `1234` means
/// 123400 microseconds. Returns `None` for anything that does not fit.
pub fn parse_dir_name(name: &str) -> Option<NaiveDateTime> {
    let (base, fraction) = name.rsplit_once('-')?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let base = NaiveDateTime::parse_from_str(base, DIR_TIME_FORMAT).ok()?;

    let micros: u32 = format!("{fraction:0<6}").get(..6)?.parse().ok()?;
    base.with_nanosecond(micros * 1000)
}

/// Format an instant as the exact-name directory key, `YYYY-MM-DD_HH-MM-SS`.
pub fn format_exact_name(ts: NaiveDateTime) -> String {
    ts.format(DIR_TIME_FORMAT).to_string()
}
