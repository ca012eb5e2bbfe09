//! Error types for rowlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, incoming frame
//! decode failures, outgoing command validation failures, and poll outcomes
//! are all captured here.

use crate::types::Width;

/// The error type for all rowlib operations.
///
/// Incoming-data variants ([`UnknownAddress`](Error::UnknownAddress),
/// [`MalformedHex`](Error::MalformedHex), [`WidthMismatch`](Error::WidthMismatch))
/// are per-frame and never stop the IO task. Command variants
/// ([`UnknownField`](Error::UnknownField), [`InvalidUnits`](Error::InvalidUnits),
/// [`InvalidOption`](Error::InvalidOption), [`ValueOutOfRange`](Error::ValueOutOfRange))
/// are returned before anything reaches the transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open failure, bad settings).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected bytes, mock expectation mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for bytes from the transport.
    #[error("timeout waiting for data")]
    Timeout,

    /// The transport has been closed or was never opened.
    #[error("not connected")]
    NotConnected,

    /// The connection to the monitor was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A data-value frame referenced an address absent from the registry.
    #[error("unknown memory address: {0}")]
    UnknownAddress(String),

    /// A data-value frame carried an empty or non-hex payload.
    #[error("malformed hex value: {0:?}")]
    MalformedHex(String),

    /// A data-value frame declared a width different from the registry's.
    #[error("width mismatch at address {address}: registry has {expected}, frame has {actual}")]
    WidthMismatch {
        /// The 3-hex-digit memory address.
        address: String,
        /// Width recorded in the registry.
        expected: Width,
        /// Width declared by the frame.
        actual: Width,
    },

    /// A command or poll named a field that is not in the registry.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A display or workout unit could not be mapped to a device code.
    #[error("invalid units: {0}")]
    InvalidUnits(String),

    /// A display option could not be mapped to a device code.
    #[error("invalid display option: {0}")]
    InvalidOption(String),

    /// A numeric command argument does not fit the fixed hex field.
    #[error("value {value} out of range for {field} (1..={max})")]
    ValueOutOfRange {
        /// Which argument was rejected (e.g. `"distance"`).
        field: &'static str,
        /// The rejected value.
        value: u32,
        /// Largest accepted value.
        max: u32,
    },

    /// No matching reading arrived before the poll deadline.
    #[error("poll timed out waiting for {0}")]
    PollTimeout(String),

    /// The monitor was closed or the transport went away.
    #[error("disconnected")]
    Disconnected,

    /// A registry table was rejected (duplicate name or address, bad address).
    #[error("invalid registry: {0}")]
    InvalidRegistry(String),

    /// A configuration file or value was rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error means the transport is gone and the
    /// IO task should shut down.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::NotConnected | Error::ConnectionLost | Error::Disconnected | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
