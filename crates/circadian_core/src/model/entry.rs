//! Raw entry form submitted by data-entry collaborators.

use crate::model::record::{format_timestamp, MeasurementRecord};
use serde::{Deserialize, Serialize};

/// Unparsed form input, one string per persisted column.
///
/// Every field is kept verbatim; parsing and validation happen in
/// `validation::parse_entry`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub person_id: String,
    pub timestamp: String,
    pub heart_rate: String,
    pub systolic_bp: String,
    pub diastolic_bp: String,
    pub energy_level: String,
    #[serde(default)]
    pub notes: String,
}

impl From<&MeasurementRecord> for RawEntry {
    fn from(record: &MeasurementRecord) -> Self {
        Self {
            person_id: record.person_id.clone(),
            timestamp: format_timestamp(&record.timestamp),
            heart_rate: record.heart_rate.to_string(),
            systolic_bp: record.systolic_bp.to_string(),
            diastolic_bp: record.diastolic_bp.to_string(),
            energy_level: record.energy_level.to_string(),
            notes: record.notes.clone().unwrap_or_default(),
        }
    }
}
