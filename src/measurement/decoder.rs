//! Telemetry block decoder.
//!
//! The block is a bit-exact contract with the controller program. All
//! multi-byte fields are big-endian.
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 1 | id (i8) |
//! | 1 | 1 | presence (nonzero = true) |
//! | 2 | 1 | result_total (i8) |
//! | 4 | 127 | identifier, ASCII, NUL/space padded |
//! | 132 | 63 x 4 | measurements (f32) |
//! | 384 | 7 x 14 | positions: result (i8), pad, DTL |
//!
//! Malformed sub-fields degrade (identifier bytes outside ASCII become
//! U+FFFD, invalid DTL becomes `None`); decoding a full block never fails.

use bytes::Buf;
use chrono::{Datelike, NaiveDateTime, Timelike};

use super::dtl::{parse_dtl, DtlFields, DTL_SIZE};
use super::record::{Position, Record, BLOCK_SIZE, MEASUREMENT_COUNT, POSITION_COUNT};
use crate::error::{TraceError, TraceResult};

const ID_OFFSET: usize = 0;
const PRESENCE_OFFSET: usize = 1;
const RESULT_TOTAL_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const IDENTIFIER_LEN: usize = 127;
const MEASUREMENTS_OFFSET: usize = 132;
const POSITIONS_OFFSET: usize = 384;
const POSITION_STRIDE: usize = 14;
const POSITION_DTL_OFFSET: usize = 2;

/// Decode a full telemetry block.
pub fn decode_block(block: &[u8; BLOCK_SIZE]) -> Record {
    let mut measurements = [0f32; MEASUREMENT_COUNT];
    let mut buf = &block[MEASUREMENTS_OFFSET..POSITIONS_OFFSET];
    for value in measurements.iter_mut() {
        *value = buf.get_f32();
    }

    let positions = std::array::from_fn(|index| decode_position(block, index));

    Record {
        id: block[ID_OFFSET] as i8,
        presence: block[PRESENCE_OFFSET] != 0,
        result_total: block[RESULT_TOTAL_OFFSET] as i8,
        identifier: decode_identifier(
            &block[IDENTIFIER_OFFSET..IDENTIFIER_OFFSET + IDENTIFIER_LEN],
        ),
        measurements,
        positions,
    }
}

/// Decode a block handed over by the transport.
///
/// The transport returns a plain byte vector; anything other than exactly
/// [`BLOCK_SIZE`] bytes is rejected before decoding.
pub fn decode_slice(data: &[u8]) -> TraceResult<Record> {
    let block: &[u8; BLOCK_SIZE] = data.try_into().map_err(|_| TraceError::BlockSize {
        expected: BLOCK_SIZE,
        actual: data.len(),
    })?;
    Ok(decode_block(block))
}

/// Encode a record into wire form.
///
/// Identifiers longer than the field are truncated and non-ASCII characters
/// are written as `?`. A `None` timestamp is written as an all-zero DTL.
pub fn encode_block(record: &Record) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[ID_OFFSET] = record.id as u8;
    block[PRESENCE_OFFSET] = u8::from(record.presence);
    block[RESULT_TOTAL_OFFSET] = record.result_total as u8;

    for (slot, ch) in block[IDENTIFIER_OFFSET..IDENTIFIER_OFFSET + IDENTIFIER_LEN]
        .iter_mut()
        .zip(record.identifier.chars())
    {
        *slot = if ch.is_ascii() { ch as u8 } else { b'?' };
    }

    for (index, value) in record.measurements.iter().enumerate() {
        let offset = MEASUREMENTS_OFFSET + index * 4;
        block[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    for (index, position) in record.positions.iter().enumerate() {
        let base = POSITIONS_OFFSET + index * POSITION_STRIDE;
        block[base] = position.result as u8;
        let dtl = position.timestamp.map(dtl_fields).unwrap_or_default();
        block[base + POSITION_DTL_OFFSET..base + POSITION_DTL_OFFSET + DTL_SIZE]
            .copy_from_slice(&dtl.to_bytes());
    }

    block
}

fn decode_position(block: &[u8; BLOCK_SIZE], index: usize) -> Position {
    debug_assert!(index < POSITION_COUNT);
    let base = POSITIONS_OFFSET + index * POSITION_STRIDE;
    let dtl_start = base + POSITION_DTL_OFFSET;
    let mut chunk = [0u8; DTL_SIZE];
    chunk.copy_from_slice(&block[dtl_start..dtl_start + DTL_SIZE]);

    Position {
        result: block[base] as i8,
        timestamp: parse_dtl(&chunk),
    }
}

fn decode_identifier(raw: &[u8]) -> String {
    let text: String = raw
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect();
    text.trim_end_matches(['\0', ' ']).to_string()
}

fn dtl_fields(ts: NaiveDateTime) -> DtlFields {
    DtlFields {
        year: u16::try_from(ts.year()).unwrap_or(0),
        month: ts.month() as u8,
        day: ts.day() as u8,
        weekday: ts.weekday().number_from_sunday() as u8,
        hour: ts.hour() as u8,
        minute: ts.minute() as u8,
        second: ts.second() as u8,
        nanosecond: (ts.nanosecond() / 1000 * 1000) as i32,
    }
}
