//! Data store abstractions and the CSV-backed implementation.
//!
//! # Responsibility
//! - Define the use-case oriented measurement store contract.
//! - Keep CSV layout and file handling inside the persistence boundary.
//!
//! # Invariants
//! - Store writes run the validator before touching the file.
//! - Store APIs return semantic errors (`DuplicateKey`, `NotFound`) distinct
//!   from file-system failures.
//! - Rows that fail decoding are skipped on read, never reported as errors.

pub mod csv_codec;
pub mod import;
pub mod measurement_repo;
pub mod query;

use crate::model::record::RecordKey;
use crate::validation::ValidationErrors;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for measurement store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Candidate record violates domain constraints.
    Validation(ValidationErrors),
    /// A row with the same `(person_id, timestamp)` already exists.
    DuplicateKey(RecordKey),
    NotFound(RecordKey),
    RowIndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// File header lacks required columns.
    Schema {
        path: PathBuf,
        missing: Vec<&'static str>,
    },
    /// Import payload cannot be processed as a whole.
    InvalidImport(String),
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Csv(csv::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKey(key) => write!(
                f,
                "a record for {key} already exists; choose another timestamp or edit the existing record"
            ),
            Self::NotFound(key) => write!(f, "no record found for {key}"),
            Self::RowIndexOutOfRange { index, len } => {
                write!(f, "record index {index} is out of range (store has {len} records)")
            }
            Self::Schema { path, missing } => write!(
                f,
                "data file `{}` is missing required columns: {}",
                path.display(),
                missing.join(", ")
            ),
            Self::InvalidImport(message) => write!(f, "import rejected: {message}"),
            Self::Io {
                action,
                path,
                source,
            } => write!(f, "failed to {action} `{}`: {source}", path.display()),
            Self::Csv(err) => write!(f, "csv error: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Csv(err) => Some(err),
            Self::DuplicateKey(_)
            | Self::NotFound(_)
            | Self::RowIndexOutOfRange { .. }
            | Self::Schema { .. }
            | Self::InvalidImport(_) => None,
        }
    }
}

impl From<ValidationErrors> for StoreError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<csv::Error> for StoreError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl StoreError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Stable short code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::NotFound(_) => "not_found",
            Self::RowIndexOutOfRange { .. } => "index_out_of_range",
            Self::Schema { .. } => "schema_mismatch",
            Self::InvalidImport(_) => "invalid_import",
            Self::Io { .. } => "io_failed",
            Self::Csv(_) => "csv_failed",
        }
    }

    /// Returns whether the caller can correct the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::DuplicateKey(_)
                | Self::NotFound(_)
                | Self::RowIndexOutOfRange { .. }
                | Self::InvalidImport(_)
        )
    }
}
