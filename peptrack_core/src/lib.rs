#![forbid(unsafe_code)]

//! Core domain model and business logic for peptrack.
//!
//! This crate provides:
//! - Domain types (frequency codes, dosing definitions, schedule events, dose records)
//! - Dosing definition construction from stored protocol fields
//! - Schedule resolution (fixed, titration, cycling)
//! - Adherence statistics
//! - Store contracts and file-backed stores (catalog, dose log)
//! - CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod definition;
pub mod cycle;
pub mod resolver;
pub mod adherence;
pub mod store;
pub mod dose_log;
pub mod service;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use cycle::{cycle_position_of, week_index_of, CyclePosition};
pub use resolver::resolve;
pub use store::{AccessPolicy, ClinicScope, DoseStore, FileCatalog, PatientDirectory, ProtocolStore};
pub use dose_log::{DoseLog, DoseSink};
pub use service::{adherence_stats, protocol_schedule, WindowQuery};
pub use export::write_schedule_csv;
