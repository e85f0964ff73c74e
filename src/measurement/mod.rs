//! Controller telemetry block: wire format and typed record.
//!
//! - [`record`]: the decoded [`Record`] and block constants.
//! - [`dtl`]: the 12-byte date-time structure used for position timestamps.
//! - [`decoder`]: block to record (and back) conversion.

pub mod decoder;
pub mod dtl;
pub mod record;

pub use decoder::{decode_block, decode_slice, encode_block};
pub use record::{
    Position, Record, BLOCK_SIZE, DEFAULT_DB_NUMBER, MEASUREMENT_COUNT, POSITION_COUNT,
};
