//! TOML configuration for an S4 monitor.
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baud_rate = 19200
//! poll_timeout_ms = 200
//! refresh_interval_ms = 200
//! display_units = "meters"
//! hot_fields = ["distance", "speed"]
//!
//! # Optional: replaces the built-in S4 memory map.
//! [[registry]]
//! name = "distance"
//! address = "055"
//! width = "D"
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::Deserialize;

use rowlib_core::error::{Error, Result};
use rowlib_core::types::Width;
use rowlib_transport::DEFAULT_BAUD_RATE;

use crate::commands::Units;
use crate::registry::{Registry, RegistryEntry};

/// Monitor settings as read from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Serial port path. Required for [`S4Builder::build`](crate::builder::S4Builder::build).
    pub port: Option<String>,
    /// Line speed (default: 19200).
    pub baud_rate: u32,
    /// Default poll timeout in milliseconds (default: 200).
    pub poll_timeout_ms: u64,
    /// Refresh driver tick period in milliseconds (default: 200).
    pub refresh_interval_ms: u64,
    /// Expired-poll sweep period in milliseconds (default: 10).
    pub sweep_interval_ms: u64,
    /// Units selected during initialization (default: meters).
    pub display_units: Units,
    /// Fields polled on every refresh tick. When unset, the stock hot
    /// fields present in the registry.
    pub hot_fields: Option<Vec<String>>,
    /// Start the refresh driver once initialized (default: true).
    pub auto_refresh: bool,
    /// Custom memory map. Empty means the built-in S4 table.
    pub registry: Vec<RegistryEntryConfig>,
}

/// One `[[registry]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntryConfig {
    /// Field name used by `poll` and `value`.
    pub name: String,
    /// Three hex digits, e.g. `"055"`.
    pub address: String,
    /// `S`, `D` or `T`.
    pub width: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_timeout_ms: 200,
            refresh_interval_ms: 200,
            sweep_interval_ms: 10,
            display_units: Units::Meters,
            hot_fields: None,
            auto_refresh: true,
            registry: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Build the registry this configuration describes.
    pub fn build_registry(&self) -> Result<Registry> {
        if self.registry.is_empty() {
            return Ok(Registry::s4());
        }

        let entries = self
            .registry
            .iter()
            .map(|entry| {
                let width = parse_width(&entry.width).ok_or_else(|| {
                    Error::InvalidRegistry(format!(
                        "width {:?} for {} is not S, D or T",
                        entry.width, entry.name
                    ))
                })?;
                Ok(RegistryEntry::new(&entry.name, &entry.address, width))
            })
            .collect::<Result<Vec<_>>>()?;

        Registry::new(entries)
    }
}

fn parse_width(s: &str) -> Option<Width> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Width::from_letter(c.to_ascii_uppercase()),
        _ => None,
    }
}
