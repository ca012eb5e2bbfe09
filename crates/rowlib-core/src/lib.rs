//! rowlib-core: Core traits, types, and error definitions for rowlib.
//!
//! This crate defines the device-agnostic pieces every rowlib protocol crate
//! builds on. Applications depend on these types without pulling in the
//! serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Reading`] / [`Width`] -- decoded memory values
//! - [`MonitorEvent`], [`StrokeEvent`], [`Marker`] -- broadcast event payloads
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use rowlib_core::*`.
pub use error::{Error, Result};
pub use events::{Marker, MonitorEvent, StrokeEvent};
pub use transport::Transport;
pub use types::{Reading, Width};
