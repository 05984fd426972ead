//! Measurement use-case service.
//!
//! # Responsibility
//! - Turn raw collaborator input into validated store writes.
//! - Provide summary and hourly aggregates over filtered views.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or uniqueness checks.
//! - Service layer stays storage-agnostic.

use crate::model::entry::RawEntry;
use crate::model::record::{MeasurementRecord, RecordKey};
use crate::repo::measurement_repo::MeasurementRepository;
use crate::repo::query::MeasurementQuery;
use crate::repo::StoreError;
use crate::service::stats::{hourly_profile, summarize, HourlyAverage, SummaryStats};
use crate::validation::{
    parse_entry_with_policy, validate_with_policy, ValidationErrors, ValidationPolicy,
    ValidationWarning,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for measurement use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed parsing or validation; messages are user-facing.
    Validation(ValidationErrors),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(errors) => Self::Validation(errors),
            other => Self::Store(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

/// Stored record plus advisory warnings for the entry surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReceipt {
    pub record: MeasurementRecord,
    pub warnings: Vec<ValidationWarning>,
}

/// Use-case service wrapper over a measurement repository.
pub struct MeasurementService<R: MeasurementRepository> {
    repo: R,
    policy: ValidationPolicy,
}

impl<R: MeasurementRepository> MeasurementService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_policy(repo, ValidationPolicy::default())
    }

    /// Creates a service that parses raw input with `policy`.
    pub fn with_policy(repo: R, policy: ValidationPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Parses, validates and appends one raw form entry.
    ///
    /// # Contract
    /// - Every field error is reported together in `ServiceError::Validation`.
    /// - A duplicate `(person_id, timestamp)` returns the store's
    ///   `DuplicateKey` error unchanged.
    pub fn submit_entry(&self, raw: &RawEntry) -> ServiceResult<EntryReceipt> {
        let record = parse_entry_with_policy(raw, &self.policy)?;
        let warnings = validate_with_policy(&record, &self.policy).into_result()?;
        self.repo.append(&record)?;
        Ok(EntryReceipt { record, warnings })
    }

    /// Replaces the record at `key` with a raw form entry.
    pub fn edit_entry(&self, key: &RecordKey, raw: &RawEntry) -> ServiceResult<EntryReceipt> {
        let record = parse_entry_with_policy(raw, &self.policy)?;
        let warnings = validate_with_policy(&record, &self.policy).into_result()?;
        self.repo.update(key, &record)?;
        Ok(EntryReceipt { record, warnings })
    }

    /// Summarizes one person's records, or everyone's when `person_id` is `None`.
    pub fn summary(&self, person_id: Option<&str>) -> ServiceResult<Option<SummaryStats>> {
        let query = match person_id {
            Some(person_id) => MeasurementQuery::for_person(person_id),
            None => MeasurementQuery::all(),
        };
        let records = self.repo.query(&query)?;
        Ok(summarize(&records))
    }

    /// Hour-of-day averages over a filtered view.
    pub fn hourly_profile(&self, query: &MeasurementQuery) -> ServiceResult<Vec<HourlyAverage>> {
        let records = self.repo.query(query)?;
        Ok(hourly_profile(&records))
    }
}
