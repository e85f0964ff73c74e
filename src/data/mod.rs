//! Persistence of detected units.
pub mod ledger;

pub use ledger::{sanitize_identifier, Ledger, LEDGER_FILE};
