//! Integration tests for the telemetry block decoder
//!
//! Blocks are built byte by byte here, independent of `encode_block`, so the
//! offsets are checked against the wire contract rather than against
//! themselves.

mod common;

use common::at;
use trace_daq::measurement::{
    decode_block, decode_slice, BLOCK_SIZE, MEASUREMENT_COUNT, POSITION_COUNT,
};
use trace_daq::TraceError;

const POSITIONS_OFFSET: usize = 384;
const POSITION_STRIDE: usize = 14;

fn write_dtl(block: &mut [u8; BLOCK_SIZE], index: usize, fields: (u16, u8, u8, u8, u8, u8, i32)) {
    let (year, month, day, hour, minute, second, nanos) = fields;
    let base = POSITIONS_OFFSET + index * POSITION_STRIDE + 2;
    block[base..base + 2].copy_from_slice(&year.to_be_bytes());
    block[base + 2] = month;
    block[base + 3] = day;
    block[base + 4] = 3; // weekday, ignored
    block[base + 5] = hour;
    block[base + 6] = minute;
    block[base + 7] = second;
    block[base + 8..base + 12].copy_from_slice(&nanos.to_be_bytes());
}

/// Deterministic pseudo-random bytes.
fn noise(seed: u32) -> [u8; BLOCK_SIZE] {
    let mut state = seed;
    let mut block = [0u8; BLOCK_SIZE];
    for byte in block.iter_mut() {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        *byte = (state >> 24) as u8;
    }
    block
}

#[test]
fn test_any_block_has_fixed_shape() {
    let mut blocks = vec![[0u8; BLOCK_SIZE], [0xFFu8; BLOCK_SIZE]];
    blocks.extend((1..50).map(noise));

    for block in &blocks {
        let record = decode_block(block);
        assert_eq!(record.measurements.len(), MEASUREMENT_COUNT);
        assert_eq!(record.positions.len(), POSITION_COUNT);
    }
}

#[test]
fn test_header_fields() {
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = 0xFE;
    block[1] = 7;
    block[2] = 0x81;

    let record = decode_block(&block);
    assert_eq!(record.id, -2);
    assert!(record.presence);
    assert_eq!(record.result_total, -127);
}

#[test]
fn test_identifier_trimmed_of_nul_and_space() {
    let mut block = [0u8; BLOCK_SIZE];
    let text = b"5901234123457  \0 \0";
    block[4..4 + text.len()].copy_from_slice(text);

    assert_eq!(decode_block(&block).identifier, "5901234123457");
}

#[test]
fn test_identifier_field_bounds() {
    let mut block = [b' '; BLOCK_SIZE];
    block[4] = b'A';
    block[130] = b'Z';
    // byte 131 is outside the 127-byte field
    block[131] = b'!';

    let identifier = decode_block(&block).identifier;
    assert_eq!(identifier.len(), 127);
    assert!(identifier.starts_with('A'));
    assert!(identifier.ends_with('Z'));
}

#[test]
fn test_measurements_are_big_endian_f32() {
    let mut block = [0u8; BLOCK_SIZE];
    block[132..136].copy_from_slice(&1.5f32.to_be_bytes());
    block[380..384].copy_from_slice(&(-2.25f32).to_be_bytes());

    let record = decode_block(&block);
    assert_eq!(record.measurements[0], 1.5);
    assert_eq!(record.measurements[62], -2.25);
    assert!(record.measurements[1..62].iter().all(|v| *v == 0.0));
}

#[test]
fn test_zero_dtl_is_null() {
    let record = decode_block(&[0u8; BLOCK_SIZE]);
    assert!(record.positions.iter().all(|p| p.timestamp.is_none()));
}

#[test]
fn test_dtl_nanoseconds_become_microseconds() {
    let mut block = [0u8; BLOCK_SIZE];
    block[POSITIONS_OFFSET] = 1;
    write_dtl(&mut block, 0, (2026, 2, 10, 11, 6, 39, 123_000_000));

    let position = decode_block(&block).positions[0];
    assert_eq!(position.result, 1);
    assert_eq!(position.timestamp, Some(at(11, 6, 39, 123_000)));
}

#[test]
fn test_invalid_date_is_null_without_affecting_neighbours() {
    let mut block = [0u8; BLOCK_SIZE];
    write_dtl(&mut block, 0, (2026, 13, 10, 11, 6, 39, 0));
    write_dtl(&mut block, 1, (2026, 2, 30, 11, 6, 39, 0));
    write_dtl(&mut block, 2, (2026, 2, 10, 25, 6, 39, 0));
    write_dtl(&mut block, 3, (2026, 2, 10, 11, 6, 39, 0));
    write_dtl(&mut block, 6, (2026, 2, 10, 11, 6, 40, 999_999_999));

    let record = decode_block(&block);
    assert_eq!(record.positions[0].timestamp, None);
    assert_eq!(record.positions[1].timestamp, None);
    assert_eq!(record.positions[2].timestamp, None);
    assert_eq!(record.positions[3].timestamp, Some(at(11, 6, 39, 0)));
    assert_eq!(record.positions[6].timestamp, Some(at(11, 6, 40, 999_999)));
}

#[test]
fn test_decode_slice_rejects_wrong_length() {
    for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE + 1] {
        let err = decode_slice(&vec![0u8; len]).unwrap_err();
        assert!(matches!(
            err,
            TraceError::BlockSize { expected: BLOCK_SIZE, actual } if actual == len
        ));
    }
    assert!(decode_slice(&[0u8; BLOCK_SIZE]).is_ok());
}

#[test]
fn test_record_serializes_to_json() {
    let mut block = [0u8; BLOCK_SIZE];
    block[4..7].copy_from_slice(b"ABC");
    write_dtl(&mut block, 0, (2026, 2, 10, 11, 6, 39, 123_000_000));

    let json = serde_json::to_value(decode_block(&block)).unwrap();
    assert_eq!(json["identifier"], "ABC");
    assert_eq!(json["measurements"].as_array().unwrap().len(), 63);
    assert_eq!(json["positions"].as_array().unwrap().len(), 7);
    assert!(json["positions"][1]["timestamp"].is_null());
}
