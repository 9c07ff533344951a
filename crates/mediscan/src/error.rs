//! Error types for mediscan.
//!
//! This module defines all error types used throughout the mediscan crate.
//! Lookups that miss return `None`/`false` rather than an error; the variants
//! here cover storage failures, rejected writes, and caller-level checks.

use std::path::PathBuf;
use thiserror::Error;

use crate::records::Role;

/// The main error type for mediscan operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("corrupt record under key '{key}': {source}")]
    CorruptRecord {
        /// The store key holding the value.
        key: &'static str,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Record Errors ===
    /// A write would break a uniqueness rule.
    #[error("{entity} '{value}' already exists")]
    Conflict {
        /// Kind of record, e.g. "username".
        entity: &'static str,
        /// The duplicated value.
        value: String,
    },

    /// A record the caller asked for does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The id or name that missed.
        id: String,
    },

    /// Authentication failed. Unknown user and wrong password look the same.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// No one is logged in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The current session lacks the required role.
    #[error("this action requires the {required} role")]
    Forbidden {
        /// The role the action needs.
        required: Role,
    },

    /// Caller input failed a required-field or format check.
    #[error("validation failed: {0}")]
    Validation(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for mediscan operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a uniqueness conflict error.
    #[must_use]
    pub fn conflict(entity: &'static str, value: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            value: value.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this error is a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this error is an authentication or authorization failure.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::NotLoggedIn | Self::Forbidden { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid username or password");

        let err = Error::validation("username is required");
        assert_eq!(err.to_string(), "validation failed: username is required");
    }

    #[test]
    fn test_conflict_error() {
        let err = Error::conflict("username", "admin");
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "username 'admin' already exists");
        assert!(!Error::InvalidCredentials.is_conflict());
    }

    #[test]
    fn test_not_found_error() {
        let err = Error::not_found("patient", "PAT-1");
        assert_eq!(err.to_string(), "patient not found: PAT-1");
    }

    #[test]
    fn test_forbidden_error_display() {
        let err = Error::Forbidden {
            required: Role::Admin,
        };
        assert_eq!(err.to_string(), "this action requires the Admin role");
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(Error::InvalidCredentials.is_auth_error());
        assert!(Error::NotLoggedIn.is_auth_error());
        assert!(!Error::validation("x").is_auth_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_corrupt_record_display() {
        let source = serde_json::from_str::<Vec<i32>>("not json").unwrap_err();
        let err = Error::CorruptRecord {
            key: "patients",
            source,
        };
        assert!(err.to_string().contains("patients"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "min_password_length must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("min_password_length"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
