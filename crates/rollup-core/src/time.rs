// crates/rollup-core/src/time.rs
// ============================================================================
// Module: Rollup Engine Timestamps
// Description: UTC timestamp wrapper with the ISO-8601 wire form pinned by
//              spec.md §6.
// Purpose: Give every timestamped record one unambiguous, serializable time
//          type instead of raw `DateTime<Utc>` scattered through the crate.
// Dependencies: chrono, serde
// ============================================================================

//! ## Overview
//! [`Timestamp`] wraps `chrono::DateTime<Utc>` and always serializes to the
//! millisecond-precision ISO-8601 form shown in `spec.md` §6
//! (`"2024-01-15T10:30:00.000Z"`).

use std::fmt;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// A UTC point in time with millisecond-precision ISO-8601 serialization.
///
/// # Invariants
/// - Always UTC; never carries an offset other than `Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Wraps an existing UTC `DateTime`.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Returns the wrapped `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the number of whole seconds elapsed since `self`.
    #[must_use]
    pub fn elapsed_since(&self, now: Timestamp) -> chrono::Duration {
        now.0 - self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self(parsed.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn serializes_with_millisecond_precision_and_z_suffix() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single().expect("valid");
        let ts = Timestamp::new(at);
        assert_eq!(ts.to_string(), "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn round_trips_through_json() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single().expect("valid");
        let ts = Timestamp::new(at);
        let json = serde_json::to_string(&ts).expect("serialize");
        let back: Timestamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ts, back);
    }
}
