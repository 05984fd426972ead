//! Measurement record model.
//!
//! # Responsibility
//! - Define the typed record stored as one CSV row.
//! - Own the canonical timestamp text format.
//!
//! # Invariants
//! - `(person_id, timestamp)` is the record identity.
//! - `notes == Some("")` is never produced by constructors; blank notes are `None`.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Canonical persisted timestamp format (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Short entry format (`YYYY-MM-DD HH:MM`), accepted on input only.
pub const SHORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parses a timestamp in canonical format only.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

/// Parses a timestamp in canonical format, falling back to the short form.
///
/// Short-form values get `:00` seconds.
pub fn parse_entry_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    parse_timestamp(trimmed)
        .or_else(|| NaiveDateTime::parse_from_str(trimmed, SHORT_TIMESTAMP_FORMAT).ok())
}

/// Formats a timestamp in canonical format.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Unique identity of one measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub person_id: String,
    #[serde(with = "canonical_timestamp")]
    pub timestamp: NaiveDateTime,
}

impl RecordKey {
    pub fn new(person_id: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            person_id: person_id.into(),
            timestamp,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` at {}",
            self.person_id,
            format_timestamp(&self.timestamp)
        )
    }
}

/// One circadian measurement entry.
///
/// Field order matches the persisted column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Case-sensitive person identifier.
    pub person_id: String,
    /// Measurement time, second precision, serialized in canonical format.
    #[serde(with = "canonical_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Beats per minute.
    pub heart_rate: i32,
    /// mmHg.
    pub systolic_bp: i32,
    /// mmHg. Must stay below `systolic_bp`.
    pub diastolic_bp: i32,
    /// Subjective 1-10 scale.
    pub energy_level: i32,
    pub notes: Option<String>,
}

impl MeasurementRecord {
    /// Creates a record without notes.
    ///
    /// Does not validate; callers go through `validation::validate` or the store.
    pub fn new(
        person_id: impl Into<String>,
        timestamp: NaiveDateTime,
        heart_rate: i32,
        systolic_bp: i32,
        diastolic_bp: i32,
        energy_level: i32,
    ) -> Self {
        Self {
            person_id: person_id.into(),
            timestamp,
            heart_rate,
            systolic_bp,
            diastolic_bp,
            energy_level,
            notes: None,
        }
    }

    /// Sets notes; blank input clears them.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = normalize_notes(notes.into());
        self
    }

    /// Returns this record's identity.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.person_id.clone(), self.timestamp)
    }

    pub fn has_key(&self, key: &RecordKey) -> bool {
        self.person_id == key.person_id && self.timestamp == key.timestamp
    }

    /// Hour of day (0-23) the measurement was taken.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// Maps empty notes to `None`, keeps everything else verbatim.
pub(crate) fn normalize_notes(notes: String) -> Option<String> {
    if notes.is_empty() {
        None
    } else {
        Some(notes)
    }
}

/// Serde adapter writing timestamps in canonical text form.
pub mod canonical_timestamp {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "timestamp `{raw}` is not in YYYY-MM-DD HH:MM:SS format"
            ))
        })
    }
}
