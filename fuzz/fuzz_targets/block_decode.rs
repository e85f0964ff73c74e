//! Fuzz target for the telemetry block decoder.
//!
//! Tests:
//! - Arbitrary slices never panic, wrong lengths are rejected
//! - Any full-size block yields 63 measurements and 7 positions
//! - Re-encoding a decoded block keeps the fields the decoder reads

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trace_daq::measurement::{
    decode_block, decode_slice, encode_block, BLOCK_SIZE, MEASUREMENT_COUNT, POSITION_COUNT,
};

#[derive(Debug, Arbitrary)]
struct DecodeInput {
    block: [u8; BLOCK_SIZE],
    /// Extra bytes used to probe the length check
    tail: Vec<u8>,
}

fuzz_target!(|input: DecodeInput| {
    let record = decode_block(&input.block);
    assert_eq!(record.measurements.len(), MEASUREMENT_COUNT);
    assert_eq!(record.positions.len(), POSITION_COUNT);

    let again = decode_block(&encode_block(&record));
    assert_eq!(again.id, record.id);
    assert_eq!(again.presence, record.presence);
    assert_eq!(again.result_total, record.result_total);
    for (a, b) in again.positions.iter().zip(record.positions.iter()) {
        assert_eq!(a.result, b.result);
        assert_eq!(a.timestamp, b.timestamp);
    }

    let mut raw = input.block.to_vec();
    raw.extend_from_slice(&input.tail);
    assert_eq!(decode_slice(&raw).is_ok(), input.tail.is_empty());
});
