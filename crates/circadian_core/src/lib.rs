//! Core data layer for circadian health measurements.
//! This crate is the single source of truth for record validation and
//! CSV persistence.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validation;

pub use config::{LogConfig, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::RawEntry;
pub use model::record::{MeasurementRecord, RecordKey};
pub use repo::import::{ImportIssue, ImportRejection, ImportReport};
pub use repo::measurement_repo::{CsvMeasurementRepository, MeasurementRepository};
pub use repo::query::{MeasurementQuery, MetricRange, PersonFilter};
pub use repo::{StoreError, StoreResult};
pub use service::measurement_service::{
    EntryReceipt, MeasurementService, ServiceError, ServiceResult,
};
pub use service::stats::{HourlyAverage, MetricSummary, SummaryStats};
pub use validation::{
    parse_entry, validate, ValidationErrors, ValidationPolicy, ValidationReport,
    ValidationWarning,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
