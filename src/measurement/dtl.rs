//! DTL (date and time long) decoding.
//!
//! Wire layout, big-endian, 12 bytes:
//!
//! | offset | type | field |
//! |---|---|---|
//! | 0 | u16 | year |
//! | 2 | u8 | month |
//! | 3 | u8 | day |
//! | 4 | u8 | weekday (ignored) |
//! | 5 | u8 | hour |
//! | 6 | u8 | minute |
//! | 7 | u8 | second |
//! | 8 | i32 | nanosecond |

use bytes::Buf;
use chrono::{NaiveDate, NaiveDateTime};

/// Years a timestamp may carry; anything else is treated as garbage.
pub const VALID_YEARS: std::ops::RangeInclusive<u16> = 1..=9999;

/// Encoded size of one DTL structure.
pub const DTL_SIZE: usize = 12;

/// Raw DTL fields as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DtlFields {
    /// Calendar year.
    pub year: u16,
    /// Month 1-12.
    pub month: u8,
    /// Day of month 1-31.
    pub day: u8,
    /// Day of week 1-7, not used for the instant.
    pub weekday: u8,
    /// Hour 0-23.
    pub hour: u8,
    /// Minute 0-59.
    pub minute: u8,
    /// Second 0-59.
    pub second: u8,
    /// Sub-second part in nanoseconds.
    pub nanosecond: i32,
}

impl DtlFields {
    /// Read the fields from a 12-byte chunk.
    pub fn read(chunk: &[u8; DTL_SIZE]) -> Self {
        let mut buf = &chunk[..];
        Self {
            year: buf.get_u16(),
            month: buf.get_u8(),
            day: buf.get_u8(),
            weekday: buf.get_u8(),
            hour: buf.get_u8(),
            minute: buf.get_u8(),
            second: buf.get_u8(),
            nanosecond: buf.get_i32(),
        }
    }

    /// Encode back to wire form.
    pub fn to_bytes(&self) -> [u8; DTL_SIZE] {
        let mut out = [0u8; DTL_SIZE];
        out[0..2].copy_from_slice(&self.year.to_be_bytes());
        out[2] = self.month;
        out[3] = self.day;
        out[4] = self.weekday;
        out[5] = self.hour;
        out[6] = self.minute;
        out[7] = self.second;
        out[8..12].copy_from_slice(&self.nanosecond.to_be_bytes());
        out
    }

    /// All-zero date fields mean "no timestamp recorded".
    pub fn is_unset(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }

    /// Convert to an instant at microsecond resolution.
    ///
    /// Returns `None` for unset fields and for any out-of-range calendar or
    /// clock value, including a year outside [`VALID_YEARS`] and a negative
    /// or >= 1s nanosecond field.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if self.is_unset() || !VALID_YEARS.contains(&self.year) {
            return None;
        }
        if !(0..1_000_000_000).contains(&self.nanosecond) {
            return None;
        }
        let micros = (self.nanosecond / 1000) as u32;
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_micro_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
                micros,
            )
    }
}

/// Decode a 12-byte DTL chunk, degrading to `None` instead of failing.
pub fn parse_dtl(chunk: &[u8; DTL_SIZE]) -> Option<NaiveDateTime> {
    DtlFields::read(chunk).to_datetime()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn fields(year: u16, month: u8, day: u8, nanosecond: i32) -> DtlFields {
        DtlFields {
            year,
            month,
            day,
            weekday: 3,
            hour: 11,
            minute: 6,
            second: 39,
            nanosecond,
        }
    }

    #[test]
    fn test_zero_bytes_decode_to_none() {
        assert_eq!(parse_dtl(&[0u8; DTL_SIZE]), None);
    }

    #[test]
    fn test_nanoseconds_truncate_to_micros() {
        let chunk = fields(2026, 2, 10, 123_000_000).to_bytes();
        let ts = parse_dtl(&chunk).unwrap();
        assert_eq!(
            ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            "2026-02-10 11:06:39.123000"
        );
        assert_eq!(ts.nanosecond() / 1000, 123_000);

        let chunk = fields(2026, 2, 10, 999).to_bytes();
        assert_eq!(parse_dtl(&chunk).unwrap().nanosecond(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let chunk = fields(2026, 2, 10, 1_000).to_bytes();
        assert_eq!(&chunk[0..2], &[0x07, 0xEA]);
        assert_eq!(&chunk[8..12], &[0x00, 0x00, 0x03, 0xE8]);
    }

    #[test]
    fn test_invalid_calendar_degrades_to_none() {
        // 30 February
        assert_eq!(parse_dtl(&fields(2026, 2, 30, 0).to_bytes()), None);
        // month 13
        assert_eq!(parse_dtl(&fields(2026, 13, 1, 0).to_bytes()), None);
        // year set, month and day zero
        assert_eq!(parse_dtl(&fields(2026, 0, 0, 0).to_bytes()), None);
        // year zero and years past 9999 are representable but not accepted
        assert_eq!(parse_dtl(&fields(0, 1, 1, 0).to_bytes()), None);
        assert_eq!(parse_dtl(&fields(10_000, 1, 1, 0).to_bytes()), None);
        assert_eq!(parse_dtl(&fields(12_000, 1, 1, 0).to_bytes()), None);
        assert_eq!(parse_dtl(&fields(u16::MAX, 12, 31, 0).to_bytes()), None);
    }

    #[test]
    fn test_year_bounds_are_inclusive() {
        assert!(parse_dtl(&fields(1, 1, 1, 0).to_bytes()).is_some());
        assert!(parse_dtl(&fields(9999, 12, 31, 0).to_bytes()).is_some());
    }

    #[test]
    fn test_invalid_clock_degrades_to_none() {
        let mut f = fields(2026, 2, 10, 0);
        f.hour = 24;
        assert_eq!(f.to_datetime(), None);

        let mut f = fields(2026, 2, 10, 0);
        f.minute = 60;
        assert_eq!(f.to_datetime(), None);

        assert_eq!(fields(2026, 2, 10, -5_000).to_datetime(), None);
        assert_eq!(fields(2026, 2, 10, -1).to_datetime(), None);
        assert_eq!(fields(2026, 2, 10, 1_000_000_000).to_datetime(), None);
    }

    #[test]
    fn test_weekday_is_ignored() {
        let mut a = fields(2026, 2, 10, 0);
        let mut b = a;
        a.weekday = 1;
        b.weekday = 7;
        assert_eq!(a.to_datetime(), b.to_datetime());
    }
}
