//! # rowlib -- WaterRower S4 Monitor Driver
//!
//! `rowlib` is an asynchronous Rust library for talking to the WaterRower
//! S4 rowing monitor over its USB serial interface. It turns the monitor's
//! line-oriented ASCII stream into typed readings and stroke events, and
//! turns typed commands into the monitor's wire format.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rowlib::s4::S4Builder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let monitor = S4Builder::new()
//!         .serial_port("/dev/ttyACM0")
//!         .build()
//!         .await?;
//!
//!     let distance = monitor.read("distance").await?;
//!     println!("distance: {distance} m");
//!
//!     monitor.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `rowlib-core`         | [`Transport`] trait, events, [`Reading`], errors |
//! | `rowlib-transport`    | Serial transport implementation                  |
//! | `rowlib-s4`           | S4 protocol, polling, live state                 |
//! | **`rowlib`**          | This facade crate -- re-exports everything       |
//!
//! ## Live State and Events
//!
//! By default the monitor polls a handful of hot fields (distance, speed,
//! elapsed time) every 200 ms. The latest values are always available
//! through [`S4Monitor::value`](s4::S4Monitor::value) and
//! [`S4Monitor::state`](s4::S4Monitor::state). Frames the monitor pushes on
//! its own arrive on per-category channels:
//!
//! ```no_run
//! use rowlib::StrokeEvent;
//! # async fn example(monitor: &rowlib::s4::S4Monitor) {
//! let mut strokes = monitor.subscribe_strokes();
//! while let Ok(event) = strokes.recv().await {
//!     if event == StrokeEvent::End {
//!         println!("stroke");
//!     }
//! }
//! # }
//! ```

pub use rowlib_core::*;

/// WaterRower S4 protocol backend.
///
/// Provides [`S4Monitor`](s4::S4Monitor) and [`S4Builder`](s4::S4Builder),
/// the memory-map [`Registry`](s4::Registry), and the typed
/// [`Command`](s4::Command) encoder.
pub mod s4 {
    pub use rowlib_s4::*;
}

/// Transport implementations.
pub mod transport {
    pub use rowlib_transport::*;
}
