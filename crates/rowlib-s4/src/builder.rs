//! S4Builder -- fluent builder for constructing [`S4Monitor`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial parameters, poll timing, and the memory map before the
//! transport is opened and the initialization sequence runs.
//!
//! # Example
//!
//! ```no_run
//! use rowlib_s4::builder::S4Builder;
//! use rowlib_s4::commands::Units;
//! use std::time::Duration;
//!
//! # async fn example() -> rowlib_core::Result<()> {
//! let monitor = S4Builder::new()
//!     .serial_port("/dev/ttyACM0")
//!     .poll_timeout(Duration::from_millis(250))
//!     .display_units(Units::Meters)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rowlib_core::error::{Error, Result};
use rowlib_core::transport::Transport;
use rowlib_transport::{DEFAULT_BAUD_RATE, SerialTransport};

use crate::commands::Units;
use crate::config::MonitorConfig;
use crate::io::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_SWEEP_INTERVAL, IoConfig};
use crate::monitor::{MonitorOptions, S4Monitor};
use crate::refresh::{DEFAULT_HOT_FIELDS, DEFAULT_REFRESH_INTERVAL, RefreshConfig};
use crate::registry::Registry;

/// Fluent builder for [`S4Monitor`].
pub struct S4Builder {
    serial_port: Option<String>,
    baud_rate: u32,
    poll_timeout: Duration,
    refresh_interval: Duration,
    sweep_interval: Duration,
    display_units: Units,
    hot_fields: Vec<String>,
    registry: Registry,
    auto_refresh: bool,
    channel_capacity: usize,
}

impl Default for S4Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl S4Builder {
    /// Create a builder with the stock S4 defaults.
    pub fn new() -> Self {
        S4Builder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_timeout: Duration::from_millis(200),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            display_units: Units::Meters,
            hot_fields: DEFAULT_HOT_FIELDS.iter().map(|s| s.to_string()).collect(),
            registry: Registry::s4(),
            auto_refresh: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Start from a parsed [`MonitorConfig`].
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let mut builder = S4Builder::new()
            .baud_rate(config.baud_rate)
            .poll_timeout(Duration::from_millis(config.poll_timeout_ms))
            .refresh_interval(Duration::from_millis(config.refresh_interval_ms))
            .sweep_interval(Duration::from_millis(config.sweep_interval_ms))
            .display_units(config.display_units)
            .auto_refresh(config.auto_refresh)
            .registry(config.build_registry()?);
        if let Some(port) = &config.port {
            builder = builder.serial_port(port);
        }
        match &config.hot_fields {
            Some(fields) => builder = builder.hot_fields(fields.iter().map(String::as_str)),
            None => {
                // Keep the stock fields a custom map still has.
                let registry = &builder.registry;
                let fields: Vec<String> = DEFAULT_HOT_FIELDS
                    .iter()
                    .filter(|name| registry.by_name(name).is_some())
                    .map(|name| name.to_string())
                    .collect();
                builder.hot_fields = fields;
            }
        }
        Ok(builder)
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate (default: 19200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Default timeout for [`S4Monitor::poll_default`] and the refresh
    /// driver (default: 200ms).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Refresh driver tick period (default: 200ms).
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Expired-poll sweep period (default: 10ms).
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Units selected during initialization (default: meters).
    pub fn display_units(mut self, units: Units) -> Self {
        self.display_units = units;
        self
    }

    /// Fields polled on every refresh tick. Checked against the registry
    /// when the refresh driver starts.
    pub fn hot_fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.hot_fields = fields.into_iter().map(str::to_string).collect();
        self
    }

    /// Replace the built-in memory map.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Start the refresh driver once initialized (default: true).
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Capacity of each event channel (default: 256).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Build an [`S4Monitor`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `rowlib-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<S4Monitor> {
        if self.sweep_interval.is_zero() {
            return Err(Error::Config("sweep_interval must be non-zero".into()));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::Config("refresh_interval must be non-zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be non-zero".into()));
        }
        if self.auto_refresh {
            for name in &self.hot_fields {
                self.registry.require(name)?;
            }
        }

        let options = MonitorOptions {
            registry: self.registry,
            io: IoConfig {
                sweep_interval: self.sweep_interval,
                ..IoConfig::default()
            },
            refresh: RefreshConfig {
                interval: self.refresh_interval,
                poll_timeout: self.poll_timeout,
                hot_fields: self.hot_fields,
            },
            display_units: self.display_units,
            auto_refresh: self.auto_refresh,
            channel_capacity: self.channel_capacity,
        };

        S4Monitor::start(transport, options).await
    }

    /// Build an [`S4Monitor`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<S4Monitor> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::Config("serial_port is required for build()".into()))?;

        let transport = SerialTransport::open(port, self.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowlib_test_harness::MockTransport;

    fn init_mock() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect(b"USB\r\n", b"_WR_\r\n");
        mock.expect(b"DDME\r\n", b"");
        mock.expect(b"RESET\r\n", b"");
        mock
    }

    #[test]
    fn builder_defaults() {
        let builder = S4Builder::new();
        assert!(builder.serial_port.is_none());
        assert_eq!(builder.baud_rate, 19_200);
        assert_eq!(builder.poll_timeout, Duration::from_millis(200));
        assert_eq!(builder.refresh_interval, Duration::from_millis(200));
        assert_eq!(builder.sweep_interval, Duration::from_millis(10));
        assert_eq!(builder.display_units, Units::Meters);
        assert_eq!(builder.hot_fields.len(), 5);
        assert!(builder.auto_refresh);
    }

    #[test]
    fn builder_from_config() {
        let config = MonitorConfig::from_toml_str(
            r#"
            port = "/dev/ttyACM0"
            poll_timeout_ms = 400
            display_units = "miles"
            hot_fields = ["speed"]
            auto_refresh = false
            "#,
        )
        .unwrap();

        let builder = S4Builder::from_config(&config).unwrap();
        assert_eq!(builder.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(builder.poll_timeout, Duration::from_millis(400));
        assert_eq!(builder.display_units, Units::Miles);
        assert_eq!(builder.hot_fields, vec!["speed".to_string()]);
        assert!(!builder.auto_refresh);
    }

    #[test]
    fn from_config_custom_registry_keeps_known_hot_fields() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [[registry]]
            name = "distance"
            address = "055"
            width = "D"

            [[registry]]
            name = "heart_rate"
            address = "1A0"
            width = "S"
            "#,
        )
        .unwrap();

        let builder = S4Builder::from_config(&config).unwrap();
        assert_eq!(builder.hot_fields, vec!["distance".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_registry_without_hot_fields_builds() {
        let config = MonitorConfig::from_toml_str(
            r#"
            auto_refresh = false

            [[registry]]
            name = "heart_rate"
            address = "1A0"
            width = "S"
            "#,
        )
        .unwrap();

        let mock = init_mock();
        let handle = mock.handle();
        let monitor = S4Builder::from_config(&config)
            .unwrap()
            .hot_fields(["speed"])
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert!(monitor.is_open());
        assert_eq!(handle.remaining_expectations(), 0);
        assert!(matches!(
            monitor.start_refresh(),
            Err(Error::UnknownField(name)) if name == "speed"
        ));
    }

    #[tokio::test]
    async fn build_without_port_fails() {
        let result = S4Builder::new().build().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unknown_hot_field_fails_before_io() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let result = S4Builder::new()
            .hot_fields(["wattage"])
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::UnknownField(_))));
        assert!(handle.sent_lines().is_empty());
    }

    #[tokio::test]
    async fn zero_sweep_interval_rejected() {
        let result = S4Builder::new()
            .sweep_interval(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn build_with_transport_initializes() {
        let mock = init_mock();
        let handle = mock.handle();
        let monitor = S4Builder::new()
            .auto_refresh(false)
            .poll_timeout(Duration::from_millis(300))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert!(monitor.is_open());
        assert_eq!(monitor.poll_timeout(), Duration::from_millis(300));
        assert_eq!(handle.remaining_expectations(), 0);
    }
}
