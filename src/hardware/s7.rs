//! ISO-on-TCP client for S7 controllers
//!
//! Implements the subset of the protocol needed to read a data block:
//!
//! 1. TPKT/COTP connection request (RFC 1006) carrying the rack/slot TSAP
//! 2. S7 "setup communication" to negotiate the PDU size
//! 3. "read var" requests for the DB area, split to fit the negotiated PDU
//!
//! Every request/response exchange is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::adapter::{BlockTransport, TransportError};

/// Default ISO-on-TCP port.
pub const DEFAULT_PORT: u16 = 102;

const TPKT_HEADER_LEN: usize = 4;
const COTP_CONNECT_CONFIRM: u8 = 0xD0;
const REQUESTED_PDU_SIZE: u16 = 480;
/// Bytes of a read response that are not payload.
const READ_OVERHEAD: usize = 18;
const READ_DATA_OFFSET: usize = 25;
const AREA_DB: u8 = 0x84;
const RETURN_CODE_OK: u8 = 0xFF;

/// Builder for [`S7Transport`].
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), trace_daq::hardware::TransportError> {
/// use std::time::Duration;
/// use trace_daq::hardware::S7TransportBuilder;
///
/// let transport = S7TransportBuilder::new("192.168.11.1")
///     .with_rack_slot(0, 1)
///     .with_timeout(Duration::from_secs(2))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S7TransportBuilder {
    address: String,
    port: u16,
    rack: u8,
    slot: u8,
    timeout: Duration,
}

impl S7TransportBuilder {
    /// Create a builder for the controller at `address`.
    ///
    /// Defaults: port 102, rack 0, slot 1, timeout 2 s.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
            rack: 0,
            slot: 1,
            timeout: Duration::from_secs(2),
        }
    }

    /// TCP port, 102 unless the controller is behind a forwarder.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Rack and slot of the CPU, encoded into the called TSAP.
    pub fn with_rack_slot(mut self, rack: u8, slot: u8) -> Self {
        self.rack = rack;
        self.slot = slot;
        self
    }

    /// Per-exchange timeout, also applied to the TCP connect.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the TCP connection and run the ISO and S7 handshakes.
    pub async fn connect(self) -> Result<S7Transport, TransportError> {
        let mut transport = S7Transport {
            peer: format!("{}:{}", self.address, self.port),
            params: self,
            stream: None,
            pdu_size: REQUESTED_PDU_SIZE,
            pdu_ref: 0,
            closed: false,
        };
        transport.handshake().await?;
        Ok(transport)
    }
}

/// ISO-on-TCP session.
///
/// A failed exchange drops the stream; the next read reconnects with the
/// original parameters. Only [`BlockTransport::disconnect`] closes the
/// session for good.
#[derive(Debug)]
pub struct S7Transport {
    params: S7TransportBuilder,
    stream: Option<TcpStream>,
    peer: String,
    pdu_size: u16,
    pdu_ref: u16,
    closed: bool,
}

impl S7Transport {
    /// PDU size agreed with the controller.
    pub fn pdu_size(&self) -> u16 {
        self.pdu_size
    }

    /// Largest payload a single read request can return.
    pub fn max_read_chunk(&self) -> usize {
        usize::from(self.pdu_size) - READ_OVERHEAD
    }

    /// True while a handshaken stream is held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn handshake(&mut self) -> Result<(), TransportError> {
        let timeout = self.params.timeout;
        let (rack, slot) = (self.params.rack, self.params.slot);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.peer))
            .await
            .map_err(|_| TransportError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {e}", self.peer)))?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        let confirm = self.exchange(&connection_request(rack, slot)).await?;
        if confirm.get(5) != Some(&COTP_CONNECT_CONFIRM) {
            self.stream = None;
            return Err(TransportError::ConnectionFailed(format!(
                "{}: ISO connection refused (rack {rack}, slot {slot})",
                self.peer
            )));
        }

        let setup = self.exchange(&setup_communication()).await?;
        if let Err(e) = check_header(&setup, 27) {
            self.stream = None;
            return Err(e);
        }
        let negotiated = u16::from_be_bytes([setup[25], setup[26]]);
        if usize::from(negotiated) <= READ_OVERHEAD {
            self.stream = None;
            return Err(TransportError::Protocol(format!(
                "negotiated PDU size {negotiated} is too small"
            )));
        }
        self.pdu_size = negotiated;

        info!(
            peer = %self.peer,
            rack,
            slot,
            pdu_size = negotiated,
            "Connected to controller"
        );
        Ok(())
    }

    /// Re-run the handshake if a previous exchange dropped the stream.
    async fn ensure_connected(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if self.closed {
            return Err(TransportError::NotConnected);
        }
        warn!(peer = %self.peer, "Controller link lost, reconnecting");
        self.handshake().await
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let timeout = self.params.timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let result = tokio::time::timeout(timeout, async {
            stream.write_all(request).await?;
            read_tpkt(stream).await
        })
        .await;

        match result {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => {
                // the stream position is unknown after a failed exchange
                self.stream = None;
                Err(e)
            }
            Err(_) => {
                self.stream = None;
                Err(TransportError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    fn next_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }
}

#[async_trait]
impl BlockTransport for S7Transport {
    async fn read_block(
        &mut self,
        db_number: u16,
        offset: u32,
        size: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected().await?;
        let chunk = self.max_read_chunk();
        let mut data = Vec::with_capacity(size);

        while data.len() < size {
            let count = chunk.min(size - data.len());
            let start = offset + data.len() as u32;
            let pdu_ref = self.next_ref();
            let response = self
                .exchange(&read_request(pdu_ref, db_number, start, count as u16))
                .await?;

            check_header(&response, READ_DATA_OFFSET)?;
            let return_code = response[21];
            if return_code != RETURN_CODE_OK {
                return Err(TransportError::Protocol(format!(
                    "read of DB{db_number} at {start} rejected with return code 0x{return_code:02X}"
                )));
            }
            let payload = response
                .get(READ_DATA_OFFSET..READ_DATA_OFFSET + count)
                .ok_or_else(|| {
                    TransportError::Protocol(format!(
                        "short read response: {} bytes for {count} requested",
                        response.len()
                    ))
                })?;
            data.extend_from_slice(payload);
        }

        debug!(db_number, offset, size, "Read data block");
        Ok(data)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            info!(peer = %self.peer, "Disconnected from controller");
        }
        Ok(())
    }
}

async fn read_tpkt(stream: &mut TcpStream) -> Result<Vec<u8>, TransportError> {
    let mut frame = vec![0u8; TPKT_HEADER_LEN];
    stream.read_exact(&mut frame).await?;
    if frame[0] != 0x03 {
        return Err(TransportError::Protocol(format!(
            "unexpected TPKT version {}",
            frame[0]
        )));
    }
    let length = usize::from(u16::from_be_bytes([frame[2], frame[3]]));
    if length < TPKT_HEADER_LEN {
        return Err(TransportError::Protocol(format!(
            "invalid TPKT length {length}"
        )));
    }
    frame.resize(length, 0);
    stream.read_exact(&mut frame[TPKT_HEADER_LEN..]).await?;
    Ok(frame)
}

/// Verify minimum length and the S7 error class/code of an ack frame.
fn check_header(frame: &[u8], min_len: usize) -> Result<(), TransportError> {
    if frame.len() < min_len {
        return Err(TransportError::Protocol(format!(
            "response too short: {} bytes, expected at least {min_len}",
            frame.len()
        )));
    }
    let (class, code) = (frame[17], frame[18]);
    if class != 0 || code != 0 {
        return Err(TransportError::Protocol(format!(
            "controller error class 0x{class:02X} code 0x{code:02X}"
        )));
    }
    Ok(())
}

fn connection_request(rack: u8, slot: u8) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(22);
    buf.put_slice(&[0x03, 0x00, 0x00, 0x16]);
    buf.put_slice(&[0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00]);
    // TPDU size 1024
    buf.put_slice(&[0xC0, 0x01, 0x0A]);
    // calling TSAP
    buf.put_slice(&[0xC1, 0x02, 0x01, 0x00]);
    // called TSAP: connection type PG, rack and slot
    buf.put_slice(&[0xC2, 0x02, 0x01, (rack << 5) | (slot & 0x1F)]);
    buf.to_vec()
}

fn setup_communication() -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(25);
    buf.put_slice(&[0x03, 0x00, 0x00, 0x19]);
    buf.put_slice(&[0x02, 0xF0, 0x80]);
    buf.put_slice(&[0x32, 0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x08, 0x00, 0x00]);
    buf.put_slice(&[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01]);
    buf.put_u16(REQUESTED_PDU_SIZE);
    buf.to_vec()
}

fn read_request(pdu_ref: u16, db_number: u16, start: u32, count: u16) -> Vec<u8> {
    let bit_address = start * 8;
    let mut buf = BytesMut::with_capacity(31);
    buf.put_slice(&[0x03, 0x00, 0x00, 0x1F]);
    buf.put_slice(&[0x02, 0xF0, 0x80]);
    buf.put_slice(&[0x32, 0x01, 0x00, 0x00]);
    buf.put_u16(pdu_ref);
    // parameter length 14, data length 0
    buf.put_slice(&[0x00, 0x0E, 0x00, 0x00]);
    // read var, one item
    buf.put_slice(&[0x04, 0x01]);
    buf.put_slice(&[0x12, 0x0A, 0x10, 0x02]);
    buf.put_u16(count);
    buf.put_u16(db_number);
    buf.put_u8(AREA_DB);
    buf.put_slice(&bit_address.to_be_bytes()[1..]);
    buf.to_vec()
}
