//! Canonical CSV layout and row codec.
//!
//! # Responsibility
//! - Own the seven-column persisted schema.
//! - Map header names to column positions so reordered or extended files
//!   still decode.
//! - Decode one row strictly into a typed record or a structured error.
//!
//! # Invariants
//! - Written files always use `CSV_HEADER` in its declared order.
//! - Decoding never trusts positions blindly: the row width must match the
//!   header width.

use crate::model::entry::RawEntry;
use crate::model::record::{format_timestamp, MeasurementRecord};
use crate::repo::{StoreError, StoreResult};
use crate::validation::{parse_fields, TimestampInput, ValidationErrors, ValidationPolicy};
use csv::{ByteRecord, ReaderBuilder, Terminator, WriterBuilder};
use std::fmt::{Display, Formatter};
use std::io::Write;

/// Persisted column names in canonical order.
pub const CSV_HEADER: [&str; 7] = [
    "person_id",
    "timestamp",
    "heart_rate",
    "systolic_bp",
    "diastolic_bp",
    "energy_level",
    "notes",
];

const REQUIRED_COLUMNS: [&str; 6] = [
    "person_id",
    "timestamp",
    "heart_rate",
    "systolic_bp",
    "diastolic_bp",
    "energy_level",
];

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnMap {
    person_id: usize,
    timestamp: usize,
    heart_rate: usize,
    systolic_bp: usize,
    diastolic_bp: usize,
    energy_level: usize,
    notes: Option<usize>,
    width: usize,
}

impl ColumnMap {
    pub(crate) fn canonical() -> Self {
        Self {
            person_id: 0,
            timestamp: 1,
            heart_rate: 2,
            systolic_bp: 3,
            diastolic_bp: 4,
            energy_level: 5,
            notes: Some(6),
            width: CSV_HEADER.len(),
        }
    }

    /// Resolves columns by name.
    ///
    /// Extra columns are ignored and `notes` may be absent. Returns the
    /// missing required column names otherwise.
    pub(crate) fn from_header(header: &ByteRecord) -> Result<Self, Vec<&'static str>> {
        let names = header
            .iter()
            .map(|field| {
                String::from_utf8_lossy(field)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect::<Vec<_>>();
        let position = |name: &str| names.iter().position(|candidate| candidate == name);

        let missing = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| position(*name).is_none())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(missing);
        }

        let required = |name: &'static str| position(name).ok_or_else(|| vec![name]);
        Ok(Self {
            person_id: required("person_id")?,
            timestamp: required("timestamp")?,
            heart_rate: required("heart_rate")?,
            systolic_bp: required("systolic_bp")?,
            diastolic_bp: required("diastolic_bp")?,
            energy_level: required("energy_level")?,
            notes: position("notes"),
            width: names.len(),
        })
    }

    pub(crate) fn is_canonical(&self) -> bool {
        *self == Self::canonical()
    }

    /// Rewrites an undecodable row for a file that will carry `CSV_HEADER`.
    ///
    /// A row that matches this header's width is moved field by field into
    /// canonical order. Any other row keeps its fields but never ends up
    /// exactly canonical width, so it stays undecodable after the header
    /// changes.
    pub(crate) fn realign(&self, row: &ByteRecord) -> ByteRecord {
        if self.is_canonical() {
            return row.clone();
        }
        if row.len() != self.width {
            let mut kept = row.clone();
            if kept.len() == CSV_HEADER.len() {
                kept.push_field(b"");
            }
            return kept;
        }

        let field = |index: usize| row.get(index).unwrap_or_default();
        let mut aligned = ByteRecord::with_capacity(row.as_slice().len(), CSV_HEADER.len());
        for index in [
            self.person_id,
            self.timestamp,
            self.heart_rate,
            self.systolic_bp,
            self.diastolic_bp,
            self.energy_level,
        ] {
            aligned.push_field(field(index));
        }
        aligned.push_field(self.notes.map(field).unwrap_or_default());
        aligned
    }
}

/// Why one data row could not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowParseError {
    ColumnCount { expected: usize, actual: usize },
    Encoding { column: &'static str },
    Invalid(ValidationErrors),
}

impl RowParseError {
    /// Stable short code for log events; never includes row content.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::ColumnCount { .. } => "column_count",
            Self::Encoding { .. } => "encoding",
            Self::Invalid(_) => "invalid_field",
        }
    }
}

impl Display for RowParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { expected, actual } => {
                write!(f, "expected {expected} columns, found {actual}")
            }
            Self::Encoding { column } => write!(f, "column `{column}` is not valid UTF-8"),
            Self::Invalid(errors) => {
                let messages = errors
                    .errors()
                    .iter()
                    .map(|error| error.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                f.write_str(&messages)
            }
        }
    }
}

/// Decodes one data row into a validated record.
pub(crate) fn decode_row(
    row: &ByteRecord,
    columns: &ColumnMap,
    policy: &ValidationPolicy,
    timestamp_input: TimestampInput,
) -> Result<MeasurementRecord, RowParseError> {
    if row.len() != columns.width {
        return Err(RowParseError::ColumnCount {
            expected: columns.width,
            actual: row.len(),
        });
    }

    let text = |index: usize, column: &'static str| -> Result<String, RowParseError> {
        let bytes = row.get(index).unwrap_or_default();
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| RowParseError::Encoding { column })
    };

    let raw = RawEntry {
        person_id: text(columns.person_id, "person_id")?,
        timestamp: text(columns.timestamp, "timestamp")?,
        heart_rate: text(columns.heart_rate, "heart_rate")?,
        systolic_bp: text(columns.systolic_bp, "systolic_bp")?,
        diastolic_bp: text(columns.diastolic_bp, "diastolic_bp")?,
        energy_level: text(columns.energy_level, "energy_level")?,
        notes: match columns.notes {
            Some(index) => text(index, "notes")?,
            None => String::new(),
        },
    };

    parse_fields(&raw, policy, timestamp_input).map_err(RowParseError::Invalid)
}

/// Encodes a record as one canonical row.
pub(crate) fn encode_record(record: &MeasurementRecord) -> ByteRecord {
    ByteRecord::from(vec![
        record.person_id.clone(),
        format_timestamp(&record.timestamp),
        record.heart_rate.to_string(),
        record.systolic_bp.to_string(),
        record.diastolic_bp.to_string(),
        record.energy_level.to_string(),
        record.notes.clone().unwrap_or_default(),
    ])
}

pub(crate) fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).flexible(true);
    builder
}

pub(crate) fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder.flexible(true).terminator(Terminator::Any(b'\n'));
    builder
}

/// Writes the canonical header followed by `rows`.
pub(crate) fn write_rows<'a, W: Write>(
    sink: W,
    rows: impl IntoIterator<Item = &'a ByteRecord>,
) -> Result<W, csv::Error> {
    let mut writer = writer_builder().from_writer(sink);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_byte_record(row)?;
    }
    writer.into_inner().map_err(|err| csv::Error::from(err.into_error()))
}

/// Serializes records into canonical CSV text, header included.
pub fn records_to_csv<'a>(
    records: impl IntoIterator<Item = &'a MeasurementRecord>,
) -> StoreResult<String> {
    let rows = records.into_iter().map(encode_record).collect::<Vec<_>>();
    let bytes = write_rows(Vec::new(), rows.iter()).map_err(StoreError::Csv)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Canonical header line as written to disk.
pub fn header_line() -> String {
    format!("{}\n", CSV_HEADER.join(","))
}
