//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validator and repository calls into use-case level APIs.
//! - Keep entry, visualization and management surfaces decoupled from
//!   storage details.

pub mod measurement_service;
pub mod stats;
