//! Filter options shared by query, export and aggregation callers.

use crate::model::record::MeasurementRecord;
use chrono::{NaiveDate, NaiveDateTime};

/// Person selector for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PersonFilter {
    #[default]
    All,
    /// Case-sensitive exact match.
    Exact(String),
}

impl PersonFilter {
    /// Builds a filter from UI input where `all` (any case) selects everyone.
    pub fn from_selection(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Exact(trimmed.to_string())
        }
    }

    fn matches(&self, person_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(expected) => expected == person_id,
        }
    }
}

/// Inclusive integer range for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricRange {
    pub min: i32,
    pub max: i32,
}

impl MetricRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Record filter. Every unset criterion matches all records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementQuery {
    pub person: PersonFilter,
    /// Inclusive lower timestamp bound.
    pub from: Option<NaiveDateTime>,
    /// Inclusive upper timestamp bound.
    pub to: Option<NaiveDateTime>,
    pub heart_rate: Option<MetricRange>,
    pub systolic_bp: Option<MetricRange>,
    pub diastolic_bp: Option<MetricRange>,
    pub energy_level: Option<MetricRange>,
    /// Case-insensitive substring of `notes`.
    pub notes_contains: Option<String>,
    /// Case-insensitive substring of `person_id` or `notes`.
    pub search: Option<String>,
}

impl MeasurementQuery {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_person(person_id: impl Into<String>) -> Self {
        Self {
            person: PersonFilter::Exact(person_id.into()),
            ..Self::default()
        }
    }

    /// Restricts to whole calendar days, `start` 00:00:00 through `end` 23:59:59.
    pub fn between_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.from = start.and_hms_opt(0, 0, 0);
        self.to = end.and_hms_opt(23, 59, 59);
        self
    }

    pub fn matches(&self, record: &MeasurementRecord) -> bool {
        if !self.person.matches(&record.person_id) {
            return false;
        }
        if self.from.is_some_and(|from| record.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.timestamp > to) {
            return false;
        }

        let metrics = [
            (self.heart_rate, record.heart_rate),
            (self.systolic_bp, record.systolic_bp),
            (self.diastolic_bp, record.diastolic_bp),
            (self.energy_level, record.energy_level),
        ];
        if metrics
            .iter()
            .any(|(range, value)| range.is_some_and(|range| !range.contains(*value)))
        {
            return false;
        }

        let notes = record.notes.as_deref();
        if let Some(needle) = active_needle(self.notes_contains.as_deref()) {
            if !notes.is_some_and(|notes| contains_folded(notes, &needle)) {
                return false;
            }
        }
        match active_needle(self.search.as_deref()) {
            Some(needle) => {
                contains_folded(&record.person_id, &needle)
                    || notes.is_some_and(|notes| contains_folded(notes, &needle))
            }
            None => true,
        }
    }
}

/// Lowercased search text, or `None` when blank.
fn active_needle(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|needle| !needle.is_empty())
        .map(str::to_lowercase)
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
