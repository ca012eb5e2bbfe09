//! Named memory locations of the S4 monitor.
//!
//! The S4 exposes its counters as numbered memory slots. A [`Registry`]
//! maps each slot's 3-hex-digit address to a semantic field name and the
//! slot's byte width. Both names and addresses are unique; the registry is
//! immutable once built and shared behind an `Arc`.

use std::collections::HashMap;

use rowlib_core::{Error, Result, Width};

/// Field name: metres rowed, whole part.
pub const DISTANCE: &str = "distance";
/// Field name: current speed in cm/s.
pub const SPEED: &str = "speed";
/// Field name: elapsed seconds (0-59) on the display clock.
pub const ELAPSED_SECONDS: &str = "elapsed_seconds";
/// Field name: elapsed minutes (0-59) on the display clock.
pub const ELAPSED_MINUTES: &str = "elapsed_minutes";
/// Field name: elapsed hours on the display clock.
pub const ELAPSED_HOURS: &str = "elapsed_hours";

/// One named memory location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Semantic field name.
    pub name: String,
    /// Three uppercase hex digits, e.g. `"055"`.
    pub address: String,
    /// Encoded width of the stored value.
    pub width: Width,
}

impl RegistryEntry {
    /// Create an entry. The address is normalized to uppercase.
    pub fn new(name: &str, address: &str, width: Width) -> Self {
        RegistryEntry {
            name: name.to_string(),
            address: address.to_ascii_uppercase(),
            width,
        }
    }
}

/// The built-in S4 memory map: `(name, address, width)`.
const S4_TABLE: &[(&str, &str, Width)] = &[
    ("distance_dec", "054", Width::Single),
    (DISTANCE, "055", Width::Double),
    ("total_distance", "057", Width::Double),
    ("kcal_watts", "088", Width::Double),
    ("total_kcal", "08A", Width::Triple),
    ("tank_volume", "0A9", Width::Single),
    ("strokes", "140", Width::Double),
    ("stroke_average", "142", Width::Single),
    ("stroke_pull", "143", Width::Single),
    ("total_speed", "148", Width::Double),
    (SPEED, "14A", Width::Double),
    ("heart_rate", "1A0", Width::Single),
    ("stroke_rate", "1A9", Width::Single),
    ("elapsed_seconds_dec", "1E0", Width::Single),
    (ELAPSED_SECONDS, "1E1", Width::Single),
    (ELAPSED_MINUTES, "1E2", Width::Single),
    (ELAPSED_HOURS, "1E3", Width::Single),
];

/// Immutable name/address/width table.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names, duplicate addresses and
    /// addresses that are not exactly three hex digits.
    pub fn new(entries: Vec<RegistryEntry>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_address = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            if !is_address(&entry.address) {
                return Err(Error::InvalidRegistry(format!(
                    "address {:?} for {} is not three hex digits",
                    entry.address, entry.name
                )));
            }
            if entry.name.is_empty() {
                return Err(Error::InvalidRegistry(format!(
                    "empty name at address {}",
                    entry.address
                )));
            }
            if by_name.insert(entry.name.clone(), index).is_some() {
                return Err(Error::InvalidRegistry(format!(
                    "duplicate name {}",
                    entry.name
                )));
            }
            if by_address.insert(entry.address.clone(), index).is_some() {
                return Err(Error::InvalidRegistry(format!(
                    "duplicate address {}",
                    entry.address
                )));
            }
        }

        Ok(Registry {
            entries,
            by_name,
            by_address,
        })
    }

    /// The S4 memory map shipped with the crate.
    pub fn s4() -> Self {
        let entries = S4_TABLE
            .iter()
            .map(|(name, address, width)| RegistryEntry::new(name, address, *width))
            .collect();
        // The built-in table is covered by `s4_table_is_valid`.
        match Registry::new(entries) {
            Ok(registry) => registry,
            Err(e) => unreachable!("built-in S4 table is invalid: {e}"),
        }
    }

    /// Look up an entry by field name.
    pub fn by_name(&self, name: &str) -> Option<&RegistryEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Look up an entry by address (case-insensitive).
    pub fn by_address(&self, address: &str) -> Option<&RegistryEntry> {
        self.by_address
            .get(&address.to_ascii_uppercase())
            .map(|&i| &self.entries[i])
    }

    /// Look up an entry by name, failing with [`Error::UnknownField`].
    pub fn require(&self, name: &str) -> Result<&RegistryEntry> {
        self.by_name(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// All entries in table order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// All field names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::s4()
    }
}

fn is_address(address: &str) -> bool {
    address.len() == 3 && address.bytes().all(|b| b.is_ascii_hexdigit())
}
