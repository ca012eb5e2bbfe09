//! WaterRower S4 protocol backend for rowlib.
//!
//! The S4 rowing monitor speaks a line-oriented ASCII protocol over USB
//! serial. It pushes some frames on its own (heartbeats, pulse counts,
//! stroke boundaries) and reports its counters only when asked, by memory
//! address. This crate provides:
//!
//! - **Registry** ([`registry`]) -- the named memory map: field name to
//!   3-hex-digit address and value width.
//! - **Protocol codec** ([`protocol`]) -- line splitting, outbound line
//!   termination, and classification of inbound lines into [`Frame`]s.
//! - **Value decoder** ([`decoder`]) -- turns data-value frames into
//!   [`Reading`](rowlib_core::Reading)s checked against the registry.
//! - **Command encoder** ([`commands`]) -- typed [`Command`]s rendered to
//!   their wire payloads.
//! - **Live state** ([`state`]) -- last known value of every field.
//! - **IO task** ([`io`]) -- single owner of the transport; correlates
//!   polls with the values that answer them.
//! - **Refresh driver** ([`refresh`]) -- polls hot fields on an interval.
//! - **Monitor** ([`monitor`], [`builder`], [`config`]) -- the public handle,
//!   its builder, and TOML configuration.
//!
//! # Example
//!
//! ```
//! use rowlib_s4::commands::Command;
//! use rowlib_s4::decoder::decode_frame;
//! use rowlib_s4::protocol::{classify, encode_line};
//! use rowlib_s4::registry::Registry;
//!
//! let registry = Registry::s4();
//!
//! // Ask for the current speed.
//! let payload = Command::RequestDataPoint("speed".into()).encode(&registry).unwrap();
//! assert_eq!(encode_line(&payload), b"IRD14A\r\n");
//!
//! // Decode the monitor's answer.
//! let frame = classify("IDD14A0120");
//! let reading = decode_frame(&registry, &frame).unwrap().unwrap();
//! assert_eq!(reading.name, "speed");
//! assert_eq!(reading.value, 0x120);
//! ```

pub mod builder;
pub mod commands;
pub mod config;
pub mod decoder;
pub mod io;
pub mod monitor;
pub mod protocol;
pub mod refresh;
pub mod registry;
pub mod state;

// Re-export the primary types for ergonomic `use rowlib_s4::*`.
pub use builder::S4Builder;
pub use commands::{Command, IntensityOption, Units};
pub use config::MonitorConfig;
pub use io::PollHandle;
pub use monitor::S4Monitor;
pub use protocol::Frame;
pub use registry::{Registry, RegistryEntry};
pub use state::{FieldState, LiveState};
