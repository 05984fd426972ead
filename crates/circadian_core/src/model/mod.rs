//! Domain model for circadian measurements.
//!
//! # Responsibility
//! - Define the canonical measurement record persisted by the store.
//! - Define the raw (string) entry shape collaborators submit.
//!
//! # Invariants
//! - Every record is identified by its `RecordKey` (person + timestamp).
//! - Timestamps have second precision and one canonical text form.

pub mod entry;
pub mod record;
