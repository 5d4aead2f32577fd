use crate::geocoding::Coordinates;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Joins titles that share a location inside a popup
pub const LABEL_SEPARATOR: &str = "<br>";

/// Accumulated labels per resolved location.
///
/// Locations are keyed on the exact bit pattern of both coordinates, so two
/// lookups only merge when the geocoder returned identical floats.
#[derive(Debug, Default)]
pub struct LocationIndex {
    labels: HashMap<(u64, u64), String>,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `label` to the location and returns everything accumulated there
    /// so far, including `label` itself
    pub fn merge(&mut self, coords: Coordinates, label: &str) -> &str {
        match self.labels.entry(key(coords)) {
            Entry::Occupied(entry) => {
                let accumulated = entry.into_mut();
                accumulated.push_str(LABEL_SEPARATOR);
                accumulated.push_str(label);
                accumulated.as_str()
            }
            Entry::Vacant(entry) => entry.insert(label.to_string()).as_str(),
        }
    }

    /// Number of distinct locations
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn key(coords: Coordinates) -> (u64, u64) {
    (coords.latitude.to_bits(), coords.longitude.to_bits())
}
