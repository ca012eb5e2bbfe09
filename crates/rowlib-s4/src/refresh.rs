//! Periodic refresh of hot fields.
//!
//! The S4 only reports memory values when asked. The refresh driver asks
//! for a fixed set of fields on every tick so [`LiveState`](crate::state::LiveState)
//! stays current without callers polling by hand. Results land in live
//! state through the IO task; the driver itself only logs outcomes.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use rowlib_core::error::{Error, Result};

use crate::commands::Command;
use crate::io::{MonitorIo, MonitorShared};
use crate::registry::{DISTANCE, ELAPSED_HOURS, ELAPSED_MINUTES, ELAPSED_SECONDS, SPEED};

/// Default tick period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// Fields polled every tick unless configured otherwise.
pub const DEFAULT_HOT_FIELDS: &[&str] = &[
    DISTANCE,
    SPEED,
    ELAPSED_SECONDS,
    ELAPSED_MINUTES,
    ELAPSED_HOURS,
];

/// Refresh driver settings.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Timeout for each hot-field poll.
    pub poll_timeout: Duration,
    /// Fields to poll every tick.
    pub hot_fields: Vec<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            interval: DEFAULT_REFRESH_INTERVAL,
            poll_timeout: Duration::from_millis(200),
            hot_fields: DEFAULT_HOT_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A running refresh task.
#[derive(Debug)]
pub struct RefreshDriver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshDriver {
    /// Start polling the hot fields through `io`.
    ///
    /// Every hot field is checked against the registry up front; an unknown
    /// name fails with [`Error::UnknownField`] and nothing is spawned.
    pub fn spawn(io: MonitorIo, shared: MonitorShared, config: RefreshConfig) -> Result<Self> {
        let hot = config
            .hot_fields
            .iter()
            .map(|name| {
                let payload = Command::RequestDataPoint(name.clone()).encode(&shared.registry)?;
                Ok((name.clone(), payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(refresh_loop(
            io,
            shared,
            hot,
            config.interval,
            config.poll_timeout,
            cancel.clone(),
        ));

        Ok(RefreshDriver { cancel, task })
    }

    /// Stop the driver. Polls already in flight still complete.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the driver task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn refresh_loop(
    io: MonitorIo,
    shared: MonitorShared,
    hot: Vec<(String, String)>,
    interval: Duration,
    poll_timeout: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("refresh driver stopped");
                return;
            }

            _ = ticker.tick() => {
                if io.is_closed() {
                    debug!("monitor closed, refresh driver exiting");
                    return;
                }
                if !shared.open.load(Ordering::SeqCst) {
                    continue;
                }
                for (name, payload) in &hot {
                    let handle = match io.poll(name, payload.clone(), poll_timeout).await {
                        Ok(handle) => handle,
                        Err(_) => {
                            debug!("monitor closed, refresh driver exiting");
                            return;
                        }
                    };
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        let name = handle.name().to_string();
                        match handle.await {
                            Ok(value) => trace!(name, value, "refreshed"),
                            Err(Error::Disconnected) => {
                                debug!(name, "refresh poll disconnected, halting");
                                cancel.cancel();
                            }
                            Err(e) => debug!(name, error = %e, "refresh poll failed"),
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rowlib_test_harness::MockTransport;

    use crate::io::{FrameChannels, IoConfig, spawn_io_task};
    use crate::registry::Registry;

    fn spawn_io(mock: MockTransport) -> (MonitorIo, MonitorShared) {
        let shared = MonitorShared::new(Arc::new(Registry::s4()), FrameChannels::default());
        let (io, _task) = spawn_io_task(Box::new(mock), IoConfig::default(), shared.clone());
        (io, shared)
    }

    #[test]
    fn default_hot_fields() {
        let config = RefreshConfig::default();
        assert_eq!(
            config.hot_fields,
            vec![
                "distance",
                "speed",
                "elapsed_seconds",
                "elapsed_minutes",
                "elapsed_hours"
            ]
        );
        assert_eq!(config.interval, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn unknown_hot_field_rejected() {
        let (io, shared) = spawn_io(MockTransport::lenient());
        let config = RefreshConfig {
            hot_fields: vec!["wattage".into()],
            ..RefreshConfig::default()
        };
        let err = RefreshDriver::spawn(io, shared, config).unwrap_err();
        assert!(matches!(err, Error::UnknownField(name) if name == "wattage"));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_poll_every_hot_field() {
        let mock = MockTransport::lenient();
        let handle = mock.handle();
        let (io, shared) = spawn_io(mock);
        shared.open.store(true, Ordering::SeqCst);

        let config = RefreshConfig {
            hot_fields: vec!["distance".into(), "speed".into()],
            ..RefreshConfig::default()
        };
        let driver = RefreshDriver::spawn(io, shared, config).unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        driver.stop();

        let sent = handle.sent_lines();
        // Ticks at 0, 200 and 400 ms.
        assert_eq!(sent.len(), 6);
        assert_eq!(&sent[..2], &["IRD055".to_string(), "IRD14A".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_ticks_while_not_open() {
        let mock = MockTransport::lenient();
        let handle = mock.handle();
        let (io, shared) = spawn_io(mock);

        let driver = RefreshDriver::spawn(io, shared.clone(), RefreshConfig::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.sent_lines().is_empty());
        assert!(driver.is_running());

        shared.open.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!handle.sent_lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn halts_when_monitor_closes() {
        let mock = MockTransport::lenient();
        let (io, shared) = spawn_io(mock);
        shared.open.store(true, Ordering::SeqCst);

        let driver = RefreshDriver::spawn(io.clone(), shared, RefreshConfig::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        io.shutdown().await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!driver.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn halts_when_poll_reports_disconnected() {
        let mock = MockTransport::lenient();
        let handle = mock.handle();
        let (io, shared) = spawn_io(mock);
        shared.open.store(true, Ordering::SeqCst);

        // Long interval: only the first tick runs, so nothing but the
        // failed polls can stop the driver.
        let config = RefreshConfig {
            interval: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(30),
            hot_fields: vec!["distance".into(), "speed".into()],
        };
        let driver = RefreshDriver::spawn(io, shared, config).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.sent_lines().len(), 2);
        assert!(driver.is_running());

        handle.disconnect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!driver.is_running());
    }
}
