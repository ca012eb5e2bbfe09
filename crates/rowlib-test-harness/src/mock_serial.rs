//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. When the engine sends a request that matches
//! the next expectation, the paired response bytes become readable.
//!
//! Because the S4 also pushes frames nobody asked for (`PING`, `SS`, pulse
//! counts), the mock keeps a [`MockHandle`] that stays with the test after
//! the transport itself has been moved into an IO task. The handle can
//! inject lines at any time, simulate a lost connection, and inspect what
//! was written.
//!
//! # Example
//!
//! ```
//! use rowlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect(b"IRD055\r\n", b"IDD0550064\r\n");
//! let handle = mock.handle();
//! handle.push_line("PING");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rowlib_core::error::{Error, Result};
use rowlib_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes that become readable once the request is seen.
    response: Vec<u8>,
}

#[derive(Debug)]
struct Shared {
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    inbound: VecDeque<u8>,
    connected: bool,
    /// Accept sends that match no expectation instead of failing them.
    lenient: bool,
    sent_log: Vec<Vec<u8>>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. A send that does not match the next
/// expectation fails with [`Error::Protocol`] unless the mock is
/// [lenient](MockTransport::lenient), in which case it is only recorded.
#[derive(Debug, Clone)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle to a [`MockTransport`] that has been moved elsewhere.
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Arc<Mutex<Shared>>) -> MutexGuard<'_, Shared> {
    // A panicking test thread poisons the lock; the data is still usable.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Create a new strict mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            shared: Arc::new(Mutex::new(Shared {
                expectations: VecDeque::new(),
                inbound: VecDeque::new(),
                connected: true,
                lenient: false,
                sent_log: Vec::new(),
            })),
        }
    }

    /// Create a mock that records every send without requiring expectations.
    pub fn lenient() -> Self {
        let mock = Self::new();
        lock(&mock.shared).lenient = true;
        mock
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response`
    /// is appended to the readable bytes. An empty response simulates a
    /// monitor that stays silent.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        lock(&self.shared).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue bytes that are readable immediately, without any send.
    pub fn unsolicited(&mut self, data: &[u8]) {
        lock(&self.shared).inbound.extend(data.iter().copied());
    }

    /// Obtain a handle that outlives moving the transport into a task.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Return all data that has been sent through this transport.
    ///
    /// Each element is the byte slice from one `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.shared).sent_log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.shared).expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        lock(&self.shared).connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Make one CR LF terminated line readable.
    pub fn push_line(&self, line: &str) {
        let mut shared = lock(&self.shared);
        shared.inbound.extend(line.bytes());
        shared.inbound.extend(b"\r\n".iter().copied());
    }

    /// Make raw bytes readable (for partial-line and noise tests).
    pub fn push_bytes(&self, data: &[u8]) {
        lock(&self.shared).inbound.extend(data.iter().copied());
    }

    /// Simulate the device disappearing from the bus.
    pub fn disconnect(&self) {
        lock(&self.shared).connected = false;
    }

    /// Everything written so far, decoded as text with line endings trimmed.
    pub fn sent_lines(&self) -> Vec<String> {
        lock(&self.shared)
            .sent_log
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end().to_string())
            .collect()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.shared).expectations.len()
    }

    /// Whether the transport still reports itself connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut shared = lock(&self.shared);
        if !shared.connected {
            return Err(Error::NotConnected);
        }

        shared.sent_log.push(data.to_vec());

        let matches_next = shared
            .expectations
            .front()
            .is_some_and(|exp| exp.request.as_slice() == data);

        if matches_next {
            if let Some(expectation) = shared.expectations.pop_front() {
                shared.inbound.extend(expectation.response);
            }
            return Ok(());
        }

        if shared.lenient {
            return Ok(());
        }

        match shared.expectations.pop_front() {
            Some(expectation) => Err(Error::Protocol(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            ))),
            None => Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut shared = lock(&self.shared);
        if !shared.connected {
            return Err(Error::NotConnected);
        }
        if shared.inbound.is_empty() {
            return Err(Error::Timeout);
        }

        let n = shared.inbound.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(shared.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.connected = false;
        shared.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"IRD055\r\n", b"IDD0550064\r\n");

        mock.send(b"IRD055\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"IDD0550064\r\n");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"USB\r\n", b"_WR_\r\n");
        mock.expect(b"RESET\r\n", b"");

        mock.send(b"USB\r\n").await.unwrap();
        mock.send(b"RESET\r\n").await.unwrap();

        let sent = mock.sent_data();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"USB\r\n");
        assert_eq!(sent[1], b"RESET\r\n");
        assert_eq!(mock.handle().sent_lines(), vec!["USB", "RESET"]);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"USB\r\n", b"_WR_\r\n");

        let result = mock.send(b"RESET\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"USB\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn lenient_mock_records_without_expectations() {
        let mut mock = MockTransport::lenient();
        mock.send(b"IRD14A\r\n").await.unwrap();
        mock.send(b"IRS1E1\r\n").await.unwrap();
        assert_eq!(mock.handle().sent_lines(), vec!["IRD14A", "IRS1E1"]);
    }

    #[tokio::test]
    async fn receive_without_data_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn handle_injects_lines_after_move() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut transport: Box<dyn Transport> = Box::new(mock);

        handle.push_line("PING");
        handle.push_line("SS");

        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"PING\r\nSS\r\n");
    }

    #[tokio::test]
    async fn handle_disconnect_fails_io() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.disconnect();

        assert!(!mock.is_connected());
        let result = mock.send(b"USB\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn close_disconnects() {
        let mut mock = MockTransport::new();
        mock.unsolicited(b"PING\r\n");
        mock.close().await.unwrap();
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn partial_receive() {
        let mut mock = MockTransport::new();
        mock.unsolicited(b"SE\r\n");

        let mut buf = [0u8; 2];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"SE");

        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"\r\n");
    }

    #[tokio::test]
    async fn remaining_expectations_counts_down() {
        let mut mock = MockTransport::new();
        mock.expect(b"USB\r\n", b"");
        mock.expect(b"RESET\r\n", b"");
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(b"USB\r\n").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);
    }
}
