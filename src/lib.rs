//! # trace_daq
//!
//! Acquisition of per-unit inspection results from a programmable controller,
//! correlated with images written by an independent vision subsystem.
//!
//! The controller exposes the current unit as a fixed 482-byte data block.
//! The library polls that block, detects when a new unit arrives, finds the
//! image directories whose names encode the instants at which each position
//! was inspected, moves the images next to the unit and appends one row to a
//! per-day, per-unit CSV ledger.
//!
//! ## Crate Structure
//!
//! - **`measurement`**: Wire format of the data block and the decoded `Record`.
//! - **`detector`**: `ChangeDetector`, turning the identifier level into new-unit edges.
//! - **`correlation`**: Timestamp matching policies (`NearestTimestamp`, `ExactName`)
//!   behind the `Correlator` trait, plus the optional directory settle check.
//! - **`artifacts`**: `ArtifactMover`, copying or moving `POZ{n}` files into a unit folder.
//! - **`data`**: The append-only CSV `Ledger`.
//! - **`scheduler`**: `PollScheduler`, the poll loop state machine, and `ShutdownFlag`.
//! - **`hardware`**: The `BlockTransport` trait, the ISO-on-TCP client and a scripted mock.
//! - **`config`**: Layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`error`**: The `TraceError` enum shared by all modules.
//! - **`validation`**: Helpers used by configuration checks.

pub mod artifacts;
pub mod config;
pub mod correlation;
pub mod data;
pub mod detector;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod measurement;
pub mod scheduler;
pub mod validation;

pub use error::{TraceError, TraceResult};
