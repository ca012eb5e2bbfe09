//! Last-known value of every registry field.
//!
//! The IO task is the only writer. Every registry name has an entry from
//! construction onward, holding `None` until the first reading arrives;
//! names outside the registry are never inserted.

use std::collections::HashMap;
use std::time::Duration;

use rowlib_core::Reading;
use tokio::time::Instant;

use crate::registry::Registry;

/// Current value of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldState {
    /// Last decoded value, `None` until the first reading.
    pub value: Option<u32>,
    /// When the value was last written.
    pub updated_at: Option<Instant>,
}

/// Snapshot table of field name to [`FieldState`].
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    fields: HashMap<String, FieldState>,
}

impl LiveState {
    /// Create a table with an unknown entry for every registry field.
    pub fn new(registry: &Registry) -> Self {
        LiveState {
            fields: registry
                .names()
                .map(|name| (name.to_string(), FieldState::default()))
                .collect(),
        }
    }

    /// Record a reading, overwriting the previous value.
    ///
    /// Returns `false` (and changes nothing) if the reading names a field
    /// this table does not track.
    pub fn apply(&mut self, reading: &Reading) -> bool {
        match self.fields.get_mut(&reading.name) {
            Some(field) => {
                field.value = Some(reading.value);
                field.updated_at = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    /// Last value of `name`, if known.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.fields.get(name).and_then(|f| f.value)
    }

    /// Full state of `name`, `None` if the field is not tracked.
    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    /// Whether `name` has no value or was last updated more than `max_age` ago.
    pub fn is_stale(&self, name: &str, max_age: Duration) -> bool {
        match self.fields.get(name).and_then(|f| f.updated_at) {
            Some(at) => at.elapsed() > max_age,
            None => true,
        }
    }

    /// Iterate over all tracked fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldState)> {
        self.fields.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Number of tracked fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are tracked.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
