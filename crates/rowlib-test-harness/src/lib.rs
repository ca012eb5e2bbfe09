//! rowlib-test-harness: Test utilities and mock transports for rowlib.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! protocol engines without a rowing machine attached, and [`MockHandle`]
//! for injecting unsolicited frames into a transport that an IO task owns.

pub mod mock_serial;

pub use mock_serial::{MockHandle, MockTransport};
