//! Import outcome reporting.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Why one import row was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportRejection {
    /// Row failed parsing or validation.
    Invalid,
    /// Row key already exists in the store or earlier in the same import.
    Duplicate,
}

/// One rejected import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    /// 1-based data row number, header excluded.
    pub row: usize,
    pub rejection: ImportRejection,
    pub reason: String,
}

impl Display for ImportIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row, self.reason)
    }
}

/// Outcome of one `import_records` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_invalid: usize,
    pub skipped_duplicate: usize,
    /// Rejected rows in input order.
    pub issues: Vec<ImportIssue>,
}

impl ImportReport {
    pub(crate) fn reject(&mut self, row: usize, rejection: ImportRejection, reason: String) {
        match rejection {
            ImportRejection::Invalid => self.skipped_invalid += 1,
            ImportRejection::Duplicate => self.skipped_duplicate += 1,
        }
        self.issues.push(ImportIssue {
            row,
            rejection,
            reason,
        });
    }

    /// Total data rows seen in the payload.
    pub fn total_rows(&self) -> usize {
        self.imported + self.skipped_invalid + self.skipped_duplicate
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Display for ImportReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "imported {} of {} rows ({} invalid, {} duplicate)",
            self.imported,
            self.total_rows(),
            self.skipped_invalid,
            self.skipped_duplicate
        )
    }
}
