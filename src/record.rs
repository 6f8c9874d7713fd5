//! The persisted location record.

use std::fmt;

use chrono::{DateTime, Utc};

/// Provenance tag stored with every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    NrfCloud,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::NrfCloud => "nrf-cloud",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single location fix as stored in the `locationlogs` collection.
///
/// Webhook records may lack a device ID; polled records always carry one
/// because `(device_id, timestamp)` is their upsert key. Documents are
/// written by the store, which owns the field names.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub device_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
    pub source: Source,
    /// The full message the record was derived from
    pub raw: serde_json::Value,
}

impl LocationRecord {
    /// Natural key used by the poll path's upsert
    pub fn key(&self) -> (Option<&str>, DateTime<Utc>) {
        (self.device_id.as_deref(), self.timestamp)
    }
}
