//! Asynchronous monitor event types.
//!
//! Events are delivered through [`tokio::sync::broadcast`] channels, one
//! per frame category, so a consumer interested only in strokes never sees
//! data-value traffic. Delivery is best effort: slow consumers may lag and
//! miss events under heavy load.

use std::time::Instant;

/// Connection lifecycle of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The initialization sequence completed and polling may begin.
    Connected,

    /// The transport was closed or lost. All pending polls have failed.
    Disconnected,
}

/// Stroke boundary reported by the monitor (`SS` / `SE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeEvent {
    /// The paddle started accelerating (`SS`).
    Start,
    /// The paddle stopped accelerating (`SE`).
    End,
}

/// A timestamped frame with no payload of its own (`PING`, `ERROR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// When the IO task classified the frame.
    pub at: Instant,
}

impl Marker {
    /// A marker stamped with the current time.
    pub fn now() -> Self {
        Marker { at: Instant::now() }
    }
}
