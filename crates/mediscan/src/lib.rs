//! `mediscan` - A local record store for patients and their diagnostic scans
//!
//! This library keeps three collections (accounts, patients, scans) and a
//! current-session slot in an embedded `SQLite` key-value store. Two roles
//! share one account record: `Admin` manages accounts, `Doctor` reviews scans.
//!
//! Password digests are demo-grade and are not a security boundary; see
//! [`credential`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod logging;
pub mod records;
pub mod report;
pub mod storage;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use records::{
    Admin, AdminPatch, Gender, NewPatient, NewScan, Patient, PatientPatch, Role, Scan, ScanPatch,
    ScanStatus, ScanType, Session,
};
pub use report::{DashboardStats, ScanReport};
pub use storage::{Storage, StorageStats, StoreKey};
pub use store::RecordStore;
