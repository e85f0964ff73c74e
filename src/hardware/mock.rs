//! Scripted transport for tests and dry runs
//!
//! `MockTransport` replays a queue of read outcomes, one per `read_block`
//! call. Once the script is exhausted every further read fails with
//! `NotConnected`, which the poll loop treats like a dropped link.
//!
//! # Example
//!
//! ```rust
//! # async fn example() {
//! use trace_daq::hardware::{BlockTransport, MockTransport};
//!
//! let mut transport = MockTransport::new().with_block(vec![0u8; 482]);
//! let counters = transport.counters();
//! assert_eq!(transport.read_block(90, 0, 482).await.unwrap().len(), 482);
//! assert_eq!(counters.reads(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::adapter::{BlockTransport, TransportError};

/// One `read_block` call as seen by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Data block number.
    pub db_number: u16,
    /// Start byte.
    pub offset: u32,
    /// Requested length.
    pub size: usize,
}

/// Call counters shared between a [`MockTransport`] and the test holding it.
#[derive(Debug, Clone, Default)]
pub struct MockCounters {
    reads: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ReadRequest>>>,
}

impl MockCounters {
    /// Number of `read_block` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Arguments of every read so far, in call order.
    pub fn requests(&self) -> Vec<ReadRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Transport that replays scripted outcomes.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: VecDeque<Result<Vec<u8>, TransportError>>,
    counters: MockCounters,
    fail_disconnect: bool,
}

impl MockTransport {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful read returning `block`.
    pub fn with_block(mut self, block: impl Into<Vec<u8>>) -> Self {
        self.push_block(block);
        self
    }

    /// Queue a failed read.
    pub fn with_failure(mut self, error: TransportError) -> Self {
        self.push_failure(error);
        self
    }

    /// Make `disconnect` report an error.
    pub fn with_failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// Queue a successful read on a mock already in use.
    pub fn push_block(&mut self, block: impl Into<Vec<u8>>) {
        self.script.push_back(Ok(block.into()));
    }

    /// Queue a failed read on a mock already in use.
    pub fn push_failure(&mut self, error: TransportError) {
        self.script.push_back(Err(error));
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Handle to the call counters, valid after the mock is moved.
    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl BlockTransport for MockTransport {
    async fn read_block(
        &mut self,
        db_number: u16,
        offset: u32,
        size: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.counters.requests.lock() {
            requests.push(ReadRequest {
                db_number,
                offset,
                size,
            });
        }

        let outcome = self
            .script
            .pop_front()
            .unwrap_or(Err(TransportError::NotConnected));
        debug!(db_number, offset, size, ok = outcome.is_ok(), "Mock read");
        outcome
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(TransportError::ConnectionFailed(
                "mock disconnect failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_is_replayed_in_order() {
        let mut transport = MockTransport::new()
            .with_block(vec![1u8; 4])
            .with_failure(TransportError::Timeout(10))
            .with_block(vec![2u8; 4]);

        assert_eq!(transport.read_block(90, 0, 4).await.unwrap(), vec![1u8; 4]);
        assert!(matches!(
            transport.read_block(90, 0, 4).await,
            Err(TransportError::Timeout(10))
        ));
        assert_eq!(transport.read_block(90, 0, 4).await.unwrap(), vec![2u8; 4]);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.read_block(90, 0, 482).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_counters_survive_move() {
        let transport = MockTransport::new().with_block(vec![0u8; 8]);
        let counters = transport.counters();

        let mut boxed: Box<dyn BlockTransport> = Box::new(transport);
        boxed.read_block(90, 0, 8).await.unwrap();
        boxed.disconnect().await.unwrap();

        assert_eq!(counters.reads(), 1);
        assert_eq!(counters.disconnects(), 1);
        assert_eq!(
            counters.requests(),
            vec![ReadRequest {
                db_number: 90,
                offset: 0,
                size: 8
            }]
        );
    }

    #[tokio::test]
    async fn test_failing_disconnect() {
        let mut transport = MockTransport::new().with_failing_disconnect();
        assert!(transport.disconnect().await.is_err());
        assert_eq!(transport.counters().disconnects(), 1);
    }
}
