//! S4Monitor -- the public handle to a connected WaterRower S4.
//!
//! This module ties the IO task ([`io`](crate::io)), the command encoder
//! ([`commands`](crate::commands)) and the refresh driver
//! ([`refresh`](crate::refresh)) together. A monitor is created by
//! [`S4Builder`](crate::builder::S4Builder), which runs the initialization
//! sequence before handing it out.

use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use rowlib_core::error::{Error, Result};
use rowlib_core::events::{Marker, MonitorEvent, StrokeEvent};
use rowlib_core::transport::Transport;
use rowlib_core::types::Reading;

use crate::commands::{Command, IntensityOption, Units};
use crate::io::{FrameChannels, IoConfig, MonitorIo, MonitorShared, PollHandle, spawn_io_task};
use crate::refresh::{RefreshConfig, RefreshDriver};
use crate::registry::Registry;
use crate::state::LiveState;

/// Everything [`S4Monitor::start`] needs besides the transport.
#[derive(Debug, Clone)]
pub(crate) struct MonitorOptions {
    pub registry: Registry,
    pub io: IoConfig,
    pub refresh: RefreshConfig,
    pub display_units: Units,
    pub auto_refresh: bool,
    pub channel_capacity: usize,
}

/// A connected S4 monitor.
///
/// All wire traffic goes through a single IO task. Dropping the monitor
/// stops that task and the refresh driver; [`close`](Self::close) does the
/// same but also fails pending polls and closes the transport in order.
pub struct S4Monitor {
    io: MonitorIo,
    task: JoinHandle<()>,
    shared: MonitorShared,
    poll_timeout: Duration,
    refresh_config: RefreshConfig,
    refresh: Mutex<Option<RefreshDriver>>,
}

impl Drop for S4Monitor {
    fn drop(&mut self) {
        if let Some(driver) = self.refresh_slot().take() {
            driver.stop();
        }
        self.io.cancel();
        self.task.abort();
    }
}

impl S4Monitor {
    /// Spawn the IO task and run the initialization sequence:
    /// `USB`, then the display units, then `RESET`. Only after all three
    /// are written is the monitor marked open, `Connected` emitted, and
    /// the refresh driver started.
    pub(crate) async fn start(
        transport: Box<dyn Transport>,
        options: MonitorOptions,
    ) -> Result<Self> {
        let shared = MonitorShared::new(
            std::sync::Arc::new(options.registry),
            FrameChannels::new(options.channel_capacity),
        );
        let (io, task) = spawn_io_task(transport, options.io, shared.clone());

        let monitor = S4Monitor {
            io,
            task,
            shared,
            poll_timeout: options.refresh.poll_timeout,
            refresh_config: options.refresh,
            refresh: Mutex::new(None),
        };

        for command in [
            Command::Initialize,
            Command::SetDisplayUnits(options.display_units),
            Command::Reset,
        ] {
            if let Err(e) = monitor.send(command).await {
                debug!(error = %e, "initialization failed");
                let _ = monitor.io.shutdown().await;
                return Err(e);
            }
        }

        monitor.shared.open.store(true, Ordering::SeqCst);
        let _ = monitor.shared.channels.lifecycle.send(MonitorEvent::Connected);
        info!(units = %options.display_units, "S4 monitor initialized");

        if options.auto_refresh {
            monitor.start_refresh()?;
        }

        Ok(monitor)
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<RefreshDriver>> {
        self.refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------

    /// Encode and write one command.
    ///
    /// Encoding errors are returned before anything reaches the wire.
    pub async fn send(&self, command: Command) -> Result<()> {
        let payload = command.encode(&self.shared.registry)?;
        self.io.send(payload).await
    }

    /// Reset the monitor.
    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    /// Select display distance units.
    pub async fn set_display_units(&self, units: Units) -> Result<()> {
        self.send(Command::SetDisplayUnits(units)).await
    }

    /// Select the intensity readout.
    pub async fn set_intensity_display(&self, option: IntensityOption) -> Result<()> {
        self.send(Command::SetIntensityDisplay(option)).await
    }

    /// Select the average intensity readout.
    pub async fn set_average_intensity_display(&self, option: IntensityOption) -> Result<()> {
        self.send(Command::SetAverageIntensityDisplay(option)).await
    }

    /// Program a distance workout.
    pub async fn define_distance_workout(&self, distance: u32, units: Units) -> Result<()> {
        self.send(Command::DefineDistanceWorkout { distance, units }).await
    }

    /// Program a duration workout.
    pub async fn define_duration_workout(&self, seconds: u32) -> Result<()> {
        self.send(Command::DefineDurationWorkout { seconds }).await
    }

    // ---------------------------------------------------------------
    // Polling and state
    // ---------------------------------------------------------------

    /// Request `name` from the monitor.
    ///
    /// An unknown name fails with [`Error::UnknownField`] and nothing is
    /// written. The returned handle resolves to the value, or to
    /// [`Error::PollTimeout`] once `timeout` passes without a reply.
    pub async fn poll(&self, name: &str, timeout: Duration) -> Result<PollHandle> {
        let payload = Command::RequestDataPoint(name.to_string()).encode(&self.shared.registry)?;
        self.io.poll(name, payload, timeout).await
    }

    /// [`poll`](Self::poll) with the configured default timeout.
    pub async fn poll_default(&self, name: &str) -> Result<PollHandle> {
        self.poll(name, self.poll_timeout).await
    }

    /// Poll `name` and wait for the result.
    pub async fn read(&self, name: &str) -> Result<u32> {
        self.poll_default(name).await?.await
    }

    /// Last known value of `name`, `None` until the first reading.
    pub fn value(&self, name: &str) -> Result<Option<u32>> {
        self.shared.registry.require(name)?;
        let live = self
            .shared
            .live
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(live.get(name))
    }

    /// Snapshot of every field.
    pub fn state(&self) -> LiveState {
        self.shared.snapshot()
    }

    /// The memory map this monitor decodes against.
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Default timeout used by [`poll_default`](Self::poll_default).
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Whether initialization completed and the monitor has not been
    /// closed or lost.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst) && !self.io.is_closed()
    }

    // ---------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------

    /// `PING` heartbeats.
    pub fn subscribe_pings(&self) -> broadcast::Receiver<Marker> {
        self.shared.channels.pings.subscribe()
    }

    /// Pulse counts.
    pub fn subscribe_pulses(&self) -> broadcast::Receiver<u8> {
        self.shared.channels.pulses.subscribe()
    }

    /// Device `ERROR` frames.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Marker> {
        self.shared.channels.errors.subscribe()
    }

    /// Stroke start/end.
    pub fn subscribe_strokes(&self) -> broadcast::Receiver<StrokeEvent> {
        self.shared.channels.strokes.subscribe()
    }

    /// Every decoded reading, polled or not.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<Reading> {
        self.shared.channels.readings.subscribe()
    }

    /// Connection lifecycle.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.shared.channels.lifecycle.subscribe()
    }

    // ---------------------------------------------------------------
    // Refresh and lifecycle
    // ---------------------------------------------------------------

    /// Start the refresh driver if it is not already running.
    pub fn start_refresh(&self) -> Result<()> {
        let mut slot = self.refresh_slot();
        if slot.as_ref().is_some_and(RefreshDriver::is_running) {
            return Ok(());
        }
        if self.io.is_closed() {
            return Err(Error::NotConnected);
        }
        let driver = RefreshDriver::spawn(
            self.io.clone(),
            self.shared.clone(),
            self.refresh_config.clone(),
        )?;
        *slot = Some(driver);
        Ok(())
    }

    /// Stop the refresh driver. No-op if it is not running.
    pub fn stop_refresh(&self) {
        if let Some(driver) = self.refresh_slot().take() {
            driver.stop();
        }
    }

    /// Whether the refresh driver is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_slot()
            .as_ref()
            .is_some_and(RefreshDriver::is_running)
    }

    /// Stop refreshing, fail every pending poll with
    /// [`Error::Disconnected`], and close the transport.
    pub async fn close(&self) -> Result<()> {
        self.stop_refresh();
        self.shared.open.store(false, Ordering::SeqCst);
        let result = self.io.shutdown().await;
        info!("S4 monitor closed");
        result
    }
}
