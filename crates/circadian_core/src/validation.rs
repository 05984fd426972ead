//! Record validation rules.
//!
//! # Responsibility
//! - Decide whether a candidate record may be persisted.
//! - Parse raw entry strings into typed records with field-level errors.
//! - Derive advisory (non-blocking) warnings for accepted readings.
//!
//! # Invariants
//! - Validation is free of side effects and independent of storage state.
//! - Every violated constraint is reported; checks never stop at the first.
//! - The diastolic/systolic ordering check is reported separately from the
//!   per-field range checks.

use crate::model::entry::RawEntry;
use crate::model::record::{
    parse_entry_timestamp, parse_timestamp, MeasurementRecord, TIMESTAMP_FORMAT,
};
use chrono::{Months, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

pub const HEART_RATE_RANGE: RangeInclusive<i32> = 30..=200;
pub const SYSTOLIC_RANGE: RangeInclusive<i32> = 70..=250;
pub const DIASTOLIC_RANGE: RangeInclusive<i32> = 40..=150;
pub const ENERGY_RANGE: RangeInclusive<i32> = 1..=10;

const PERSON_ID_MIN_CHARS: usize = 2;
const PERSON_ID_MAX_CHARS: usize = 50;
const NOTES_MAX_CHARS: usize = 500;
const MAX_RECORD_AGE_MONTHS: u32 = 120;

static PERSON_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid person id regex"));

/// Record field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    PersonId,
    Timestamp,
    HeartRate,
    SystolicBp,
    DiastolicBp,
    EnergyLevel,
    Notes,
    /// Cross-field systolic/diastolic relation.
    BloodPressure,
}

impl RecordField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonId => "person_id",
            Self::Timestamp => "timestamp",
            Self::HeartRate => "heart_rate",
            Self::SystolicBp => "systolic_bp",
            Self::DiastolicBp => "diastolic_bp",
            Self::EnergyLevel => "energy_level",
            Self::Notes => "notes",
            Self::BloodPressure => "blood_pressure",
        }
    }
}

/// Machine-readable reason for a field error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    Missing,
    /// Value could not be parsed into the field type.
    Malformed(String),
    OutOfRange {
        value: i32,
        min: i32,
        max: i32,
    },
    TooShort {
        min: usize,
    },
    TooLong {
        max: usize,
    },
    InvalidCharacters,
    DiastolicNotBelowSystolic {
        systolic: i32,
        diastolic: i32,
    },
    /// Timestamp carries a fractional second the CSV form cannot hold.
    FractionalSeconds,
    InFuture,
    TooOld,
}

/// One violated constraint with user-facing correction guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: RecordField,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(field: RecordField, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            message: message.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

/// Complete list of violations for one candidate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns whether any error refers to `field`.
    pub fn has_field(&self, field: RecordField) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    /// User-facing messages, one per violation.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|error| error.message.clone()).collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "invalid record: {joined}")
    }
}

impl Error for ValidationErrors {}

/// Non-blocking observation about an accepted reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationWarning {
    LowBloodPressure,
    HighBloodPressure,
    HighEnergyLowHeartRate,
    LowEnergyHighHeartRate,
}

impl ValidationWarning {
    pub fn message(self) -> &'static str {
        match self {
            Self::LowBloodPressure => "Blood pressure is in the low range",
            Self::HighBloodPressure => "Blood pressure is in the high range",
            Self::HighEnergyLowHeartRate => {
                "High energy level with low heart rate - please verify readings"
            }
            Self::LowEnergyHighHeartRate => {
                "Low energy with high heart rate - consider medical consultation"
            }
        }
    }
}

impl Display for ValidationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of validating one typed record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts into warnings on acceptance, or the collected errors.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

/// Optional checks that depend on an explicitly supplied clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationPolicy {
    /// When set, timestamps after this instant or more than ten years
    /// before it are rejected.
    pub reference_time: Option<NaiveDateTime>,
}

impl ValidationPolicy {
    pub fn with_time_window(reference_time: NaiveDateTime) -> Self {
        Self {
            reference_time: Some(reference_time),
        }
    }
}

/// Validates a typed record with the default policy.
pub fn validate(record: &MeasurementRecord) -> ValidationReport {
    validate_with_policy(record, &ValidationPolicy::default())
}

/// Validates a typed record against every field and cross-field rule.
pub fn validate_with_policy(
    record: &MeasurementRecord,
    policy: &ValidationPolicy,
) -> ValidationReport {
    let mut errors = Vec::new();
    errors.extend(check_person_id(&record.person_id));
    errors.extend(check_timestamp_precision(record.timestamp));
    errors.extend(check_timestamp_window(record.timestamp, policy));
    errors.extend(check_metrics(
        Some(record.heart_rate),
        Some(record.systolic_bp),
        Some(record.diastolic_bp),
        Some(record.energy_level),
    ));
    errors.extend(check_notes(record.notes.as_deref()));

    let warnings = if errors.is_empty() {
        advisory_warnings(record)
    } else {
        Vec::new()
    };

    ValidationReport { errors, warnings }
}

/// Parses and validates a raw entry with the default policy.
///
/// Accepts both canonical and short (`YYYY-MM-DD HH:MM`) timestamps.
pub fn parse_entry(raw: &RawEntry) -> Result<MeasurementRecord, ValidationErrors> {
    parse_entry_with_policy(raw, &ValidationPolicy::default())
}

/// Parses and validates a raw entry, reporting every failure together.
pub fn parse_entry_with_policy(
    raw: &RawEntry,
    policy: &ValidationPolicy,
) -> Result<MeasurementRecord, ValidationErrors> {
    parse_fields(raw, policy, TimestampInput::AllowShort)
}

/// Timestamp forms accepted by [`parse_fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimestampInput {
    CanonicalOnly,
    AllowShort,
}

pub(crate) fn parse_fields(
    raw: &RawEntry,
    policy: &ValidationPolicy,
    timestamp_input: TimestampInput,
) -> Result<MeasurementRecord, ValidationErrors> {
    let mut errors = Vec::new();

    let person_id = raw.person_id.trim();
    errors.extend(check_person_id(person_id));

    let timestamp = parse_required_timestamp(&raw.timestamp, timestamp_input);
    let timestamp = match timestamp {
        Ok(value) => {
            errors.extend(check_timestamp_window(value, policy));
            Some(value)
        }
        Err(err) => {
            errors.push(err);
            None
        }
    };

    let heart_rate = parse_integer(RecordField::HeartRate, &raw.heart_rate, &mut errors);
    let systolic_bp = parse_integer(RecordField::SystolicBp, &raw.systolic_bp, &mut errors);
    let diastolic_bp = parse_integer(RecordField::DiastolicBp, &raw.diastolic_bp, &mut errors);
    let energy_level = parse_integer(RecordField::EnergyLevel, &raw.energy_level, &mut errors);
    errors.extend(check_metrics(
        heart_rate,
        systolic_bp,
        diastolic_bp,
        energy_level,
    ));

    let notes = if raw.notes.is_empty() {
        None
    } else {
        Some(raw.notes.clone())
    };
    errors.extend(check_notes(notes.as_deref()));

    match (
        timestamp,
        heart_rate,
        systolic_bp,
        diastolic_bp,
        energy_level,
    ) {
        (
            Some(timestamp),
            Some(heart_rate),
            Some(systolic_bp),
            Some(diastolic_bp),
            Some(energy_level),
        ) if errors.is_empty() => Ok(MeasurementRecord {
            person_id: person_id.to_string(),
            timestamp,
            heart_rate,
            systolic_bp,
            diastolic_bp,
            energy_level,
            notes,
        }),
        _ => Err(ValidationErrors { errors }),
    }
}

fn check_person_id(person_id: &str) -> Option<FieldError> {
    if person_id.trim().is_empty() {
        return Some(FieldError::new(
            RecordField::PersonId,
            FieldErrorKind::Missing,
            "Person ID is required",
        ));
    }

    let chars = person_id.chars().count();
    if chars < PERSON_ID_MIN_CHARS {
        return Some(FieldError::new(
            RecordField::PersonId,
            FieldErrorKind::TooShort {
                min: PERSON_ID_MIN_CHARS,
            },
            format!("Person ID must be at least {PERSON_ID_MIN_CHARS} characters long"),
        ));
    }
    if chars > PERSON_ID_MAX_CHARS {
        return Some(FieldError::new(
            RecordField::PersonId,
            FieldErrorKind::TooLong {
                max: PERSON_ID_MAX_CHARS,
            },
            format!("Person ID must be {PERSON_ID_MAX_CHARS} characters or less"),
        ));
    }
    if !PERSON_ID_RE.is_match(person_id) {
        return Some(FieldError::new(
            RecordField::PersonId,
            FieldErrorKind::InvalidCharacters,
            "Person ID can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    None
}

fn parse_required_timestamp(
    value: &str,
    timestamp_input: TimestampInput,
) -> Result<NaiveDateTime, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(
            RecordField::Timestamp,
            FieldErrorKind::Missing,
            "Timestamp is required",
        ));
    }

    let parsed = match timestamp_input {
        TimestampInput::CanonicalOnly => parse_timestamp(trimmed),
        TimestampInput::AllowShort => parse_entry_timestamp(trimmed),
    };
    parsed.ok_or_else(|| {
        FieldError::new(
            RecordField::Timestamp,
            FieldErrorKind::Malformed(trimmed.to_string()),
            format!("Invalid timestamp `{trimmed}`; use YYYY-MM-DD HH:MM:SS"),
        )
    })
}

/// Keys compare at full precision but rows store whole seconds.
fn check_timestamp_precision(timestamp: NaiveDateTime) -> Option<FieldError> {
    if timestamp.nanosecond() == 0 {
        return None;
    }
    Some(FieldError::new(
        RecordField::Timestamp,
        FieldErrorKind::FractionalSeconds,
        "Timestamp must be whole seconds (YYYY-MM-DD HH:MM:SS)",
    ))
}

fn check_timestamp_window(
    timestamp: NaiveDateTime,
    policy: &ValidationPolicy,
) -> Option<FieldError> {
    let reference = policy.reference_time?;
    if timestamp > reference {
        return Some(FieldError::new(
            RecordField::Timestamp,
            FieldErrorKind::InFuture,
            "Timestamp cannot be in the future",
        ));
    }

    let oldest = reference
        .date()
        .checked_sub_months(Months::new(MAX_RECORD_AGE_MONTHS))
        .and_then(|date| date.and_hms_opt(0, 0, 0));
    match oldest {
        Some(oldest) if timestamp < oldest => Some(FieldError::new(
            RecordField::Timestamp,
            FieldErrorKind::TooOld,
            format!(
                "Timestamp cannot be earlier than {}",
                oldest.format(TIMESTAMP_FORMAT)
            ),
        )),
        _ => None,
    }
}

fn parse_integer(field: RecordField, value: &str, errors: &mut Vec<FieldError>) -> Option<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(
            field,
            FieldErrorKind::Missing,
            format!("{} is required", field_label(field)),
        ));
        return None;
    }

    match trimmed.parse::<i32>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(FieldError::new(
                field,
                FieldErrorKind::Malformed(trimmed.to_string()),
                format!(
                    "{} must be a whole number, got `{trimmed}`",
                    field_label(field)
                ),
            ));
            None
        }
    }
}

fn check_metrics(
    heart_rate: Option<i32>,
    systolic_bp: Option<i32>,
    diastolic_bp: Option<i32>,
    energy_level: Option<i32>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let ranged = [
        (RecordField::HeartRate, heart_rate, HEART_RATE_RANGE, " BPM"),
        (RecordField::SystolicBp, systolic_bp, SYSTOLIC_RANGE, " mmHg"),
        (RecordField::DiastolicBp, diastolic_bp, DIASTOLIC_RANGE, " mmHg"),
        (RecordField::EnergyLevel, energy_level, ENERGY_RANGE, ""),
    ];
    for (field, value, range, unit) in ranged {
        if let Some(value) = value {
            errors.extend(check_range(field, value, &range, unit));
        }
    }

    if let (Some(systolic), Some(diastolic)) = (systolic_bp, diastolic_bp) {
        if diastolic >= systolic {
            errors.push(FieldError::new(
                RecordField::BloodPressure,
                FieldErrorKind::DiastolicNotBelowSystolic {
                    systolic,
                    diastolic,
                },
                format!(
                    "Diastolic pressure ({diastolic}) must be lower than systolic pressure ({systolic})"
                ),
            ));
        }
    }

    errors
}

fn check_range(
    field: RecordField,
    value: i32,
    range: &RangeInclusive<i32>,
    unit: &str,
) -> Option<FieldError> {
    if range.contains(&value) {
        return None;
    }

    let (min, max) = (*range.start(), *range.end());
    let message = if value < min {
        format!("{} too low (minimum {min}{unit}), got {value}", field_label(field))
    } else {
        format!("{} too high (maximum {max}{unit}), got {value}", field_label(field))
    };
    Some(FieldError::new(
        field,
        FieldErrorKind::OutOfRange { value, min, max },
        message,
    ))
}

fn check_notes(notes: Option<&str>) -> Option<FieldError> {
    let notes = notes?;
    if notes.chars().count() > NOTES_MAX_CHARS {
        return Some(FieldError::new(
            RecordField::Notes,
            FieldErrorKind::TooLong {
                max: NOTES_MAX_CHARS,
            },
            format!("Notes must be {NOTES_MAX_CHARS} characters or less"),
        ));
    }
    None
}

fn advisory_warnings(record: &MeasurementRecord) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    if record.systolic_bp < 90 && record.diastolic_bp < 60 {
        warnings.push(ValidationWarning::LowBloodPressure);
    } else if record.systolic_bp >= 140 || record.diastolic_bp >= 90 {
        warnings.push(ValidationWarning::HighBloodPressure);
    }
    if record.energy_level >= 8 && record.heart_rate < 60 {
        warnings.push(ValidationWarning::HighEnergyLowHeartRate);
    }
    if record.energy_level <= 3 && record.heart_rate > 100 {
        warnings.push(ValidationWarning::LowEnergyHighHeartRate);
    }
    warnings
}

fn field_label(field: RecordField) -> &'static str {
    match field {
        RecordField::PersonId => "Person ID",
        RecordField::Timestamp => "Timestamp",
        RecordField::HeartRate => "Heart rate",
        RecordField::SystolicBp => "Systolic pressure",
        RecordField::DiastolicBp => "Diastolic pressure",
        RecordField::EnergyLevel => "Energy level",
        RecordField::Notes => "Notes",
        RecordField::BloodPressure => "Blood pressure",
    }
}
