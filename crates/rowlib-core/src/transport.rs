//! Transport trait for monitor communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the rowing
//! monitor. The S4 presents itself as a USB virtual COM port, so the
//! production implementation is `SerialTransport` from `rowlib-transport`;
//! tests use `MockTransport` from `rowlib-test-harness`.
//!
//! Protocol engines operate on a `Transport` rather than directly on a
//! serial port, so line framing and command correlation can be tested
//! deterministically without hardware.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a monitor.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Line framing and command structure belong to the protocol engine
/// that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the monitor.
    ///
    /// Implementations should not return until every byte has been handed
    /// to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the monitor into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data and
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
