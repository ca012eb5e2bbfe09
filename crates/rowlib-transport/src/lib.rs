//! Transport implementations for rowlib.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](rowlib_core::Transport) trait used to reach an S4
//! monitor over its USB virtual COM port.

pub mod serial;

pub use serial::{DEFAULT_BAUD_RATE, SerialConfig, SerialTransport};
