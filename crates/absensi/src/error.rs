//! Error types for absensi.
//!
//! This module defines all error types used throughout the absensi crate.
//! Constraint violations carry messages meant to be shown to the operator
//! as-is; storage failures carry the underlying `SQLite` error.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::AttendanceStatus;

/// The main error type for absensi operations.
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

    // === Attendance Errors ===
    /// A check-in was attempted for a tuple that already has a present record.
    #[error("student is already checked in for this subject on the selected date")]
    AlreadyCheckedIn,

    /// A scan was attempted for a tuple already marked sick or permission.
    #[error("student is already marked '{status}' and cannot be scanned")]
    AlreadyMarked {
        /// The manual status already on record.
        status: AttendanceStatus,
    },

    /// A check-out was attempted without a prior check-in.
    #[error("student has not checked in for this subject on the selected date")]
    NotCheckedIn,

    /// A second check-out was attempted.
    #[error("student has already checked out for this subject on the selected date")]
    AlreadyCheckedOut,

    /// A manual status would overwrite a confirmed present record.
    #[error("cannot save: student is already recorded as present")]
    PresentRecordLocked,

    /// QR attendance is switched off for the school.
    #[error("attendance is disabled for school '{school}'")]
    AttendanceDisabled {
        /// The school whose attendance flag is off.
        school: String,
    },

    /// The on-time deadline could not be parsed.
    #[error("invalid deadline '{value}': expected HH:MM")]
    InvalidDeadline {
        /// The rejected value.
        value: String,
    },

    /// A report was requested for a month that does not exist.
    #[error("invalid report period {year}-{month:02}")]
    InvalidPeriod {
        /// Requested year.
        year: i32,
        /// Requested month (1-12).
        month: u32,
    },

    // === Directory Errors ===
    /// Another student in the same school already uses this NIS.
    #[error("NIS '{nis}' is already used in school '{school}'")]
    DuplicateNis {
        /// School the NIS belongs to.
        school: String,
        /// The duplicated number.
        nis: String,
    },

    /// An operator with this username already exists for the school.
    #[error("username '{username}' already exists for school '{school}'")]
    DuplicateOperator {
        /// The duplicated username.
        username: String,
        /// The school the operator is bound to.
        school: String,
    },

    /// A school name is already registered.
    #[error("school '{0}' is already registered")]
    SchoolAlreadyRegistered(String),

    /// A record addressed by id or key does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The id or key used for the lookup.
        id: String,
    },

    // === Settings Errors ===
    /// A setting that has a typed operation was written through the
    /// generic setter.
    #[error("setting '{key}' cannot be written directly")]
    ReservedSetting {
        /// The rejected key.
        key: String,
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

/// A specialized Result type for absensi operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a not-found error for the given entity kind.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Check if this error is a user-correctable constraint violation.
    ///
    /// No data is mutated when one of these is returned.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyCheckedIn
                | Self::AlreadyMarked { .. }
                | Self::NotCheckedIn
                | Self::AlreadyCheckedOut
                | Self::PresentRecordLocked
                | Self::DuplicateNis { .. }
                | Self::DuplicateOperator { .. }
                | Self::SchoolAlreadyRegistered(_)
                | Self::ReservedSetting { .. }
        )
    }

    /// Check if this error indicates a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error leaves the session without a usable store.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. } | Self::DatabaseMigration { .. } | Self::DirectoryCreate { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyCheckedOut;
        assert_eq!(
            err.to_string(),
            "student has already checked out for this subject on the selected date"
        );

        let err = Error::not_found("student", "student-1");
        assert_eq!(err.to_string(), "student not found: student-1");
    }

    #[test]
    fn test_already_marked_display() {
        let err = Error::AlreadyMarked {
            status: AttendanceStatus::Sick,
        };
        assert!(err.to_string().contains("sick"));

        let err = Error::AlreadyMarked {
            status: AttendanceStatus::Permission,
        };
        assert!(err.to_string().contains("permission"));
    }

    #[test]
    fn test_constraint_violations() {
        assert!(Error::AlreadyCheckedIn.is_constraint_violation());
        assert!(Error::NotCheckedIn.is_constraint_violation());
        assert!(Error::PresentRecordLocked.is_constraint_violation());
        assert!(Error::DuplicateNis {
            school: "A".to_string(),
            nis: "1".to_string(),
        }
        .is_constraint_violation());
        assert!(!Error::not_found("teacher", "x").is_constraint_violation());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("operator", "op-1").is_not_found());
        assert!(!Error::AlreadyCheckedIn.is_not_found());
    }

    #[test]
    fn test_is_fatal() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!Error::AlreadyCheckedIn.is_fatal());
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
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_attendance_disabled_display() {
        let err = Error::AttendanceDisabled {
            school: "SMA 1".to_string(),
        };
        assert!(err.to_string().contains("SMA 1"));
    }

    #[test]
    fn test_invalid_deadline_display() {
        let err = Error::InvalidDeadline {
            value: "7.30".to_string(),
        };
        assert!(err.to_string().contains("7.30"));
        assert!(err.to_string().contains("HH:MM"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
        assert!(err.is_fatal());
    }
}
