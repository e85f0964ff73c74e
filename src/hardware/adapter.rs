//! Transport seam between the poll loop and the controller.

use async_trait::async_trait;

/// An error that can occur while talking to the controller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No session is open, or it was closed by `disconnect`.
    #[error("Not connected")]
    NotConnected,

    /// TCP connect or ISO handshake failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed frame or a negative controller reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No reply within the timeout, in milliseconds.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw access to a controller data block.
///
/// The poll loop owns exactly one transport and calls it from a single task,
/// so implementations only need to be `Send`.
#[async_trait]
pub trait BlockTransport: Send {
    /// Read `size` bytes starting at `offset` of data block `db_number`.
    async fn read_block(
        &mut self,
        db_number: u16,
        offset: u32,
        size: usize,
    ) -> Result<Vec<u8>, TransportError>;

    /// Close the connection. Calling it twice is not an error.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
