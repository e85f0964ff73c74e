//! Controller transports
//!
//! Raw block access to the programmable controller. `S7Transport` talks
//! ISO-on-TCP to real hardware; `MockTransport` replays scripted outcomes.

pub mod adapter;
pub mod mock;
pub mod s7;

pub use adapter::{BlockTransport, TransportError};
pub use mock::{MockCounters, MockTransport, ReadRequest};
pub use s7::{S7Transport, S7TransportBuilder};
