//! Typed view of one controller telemetry block.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Size in bytes of the telemetry block read from the controller.
pub const BLOCK_SIZE: usize = 482;

/// Data block number holding the inspection results.
pub const DEFAULT_DB_NUMBER: u16 = 90;

/// Number of `f32` measurement values carried by every block.
pub const MEASUREMENT_COUNT: usize = 63;

/// Number of inspection position entries carried by every block.
pub const POSITION_COUNT: usize = 7;

/// Result code and completion instant of one inspection position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Pass/fail code reported by the controller.
    pub result: i8,
    /// Controller wall-clock time, `None` when the DTL fields were zero or invalid.
    pub timestamp: Option<NaiveDateTime>,
}

/// One decoded telemetry block.
///
/// `measurements` and `positions` are fixed-size arrays so their lengths
/// are part of the type rather than a runtime invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Controller-side record id.
    pub id: i8,
    /// Part presence sensor.
    pub presence: bool,
    /// Overall pass/fail code.
    pub result_total: i8,
    /// Product code (EAN). Empty when no unit is at the station.
    pub identifier: String,
    /// Measurement values in wire order.
    #[serde(with = "serde_measurements")]
    pub measurements: [f32; MEASUREMENT_COUNT],
    /// Inspection positions 1..=7 in wire order.
    pub positions: [Position; POSITION_COUNT],
}

impl Record {
    /// True when the identifier field carries a unit.
    pub fn has_unit(&self) -> bool {
        !self.identifier.is_empty()
    }

    /// Look up a position by its 1-based number.
    pub fn position(&self, number: usize) -> Option<&Position> {
        number
            .checked_sub(1)
            .and_then(|index| self.positions.get(index))
    }
}

// serde only derives array impls up to 32 elements.
mod serde_measurements {
    use super::MEASUREMENT_COUNT;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(values: &[f32; MEASUREMENT_COUNT], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[f32; MEASUREMENT_COUNT], D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        let len = values.len();
        values.try_into().map_err(|_| {
            D::Error::invalid_length(len, &"exactly 63 measurement values")
        })
    }
}
