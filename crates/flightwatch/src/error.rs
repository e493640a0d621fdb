//! Error types for flightwatch.
//!
//! This module defines all error types used throughout the flightwatch crate.
//! Snapshot problems are reported as [`ValidationError`] before any diffing
//! or tracking happens; everything else is an [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// A snapshot that cannot be diffed or tracked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A row carries no value for the key column.
    #[error("row {row} has no value for key column '{column}'")]
    MissingKey {
        /// Zero-based row index within the snapshot.
        row: usize,
        /// Name of the key column.
        column: String,
    },

    /// Two rows in one snapshot share a key.
    #[error("duplicate key '{key}' at rows {first_row} and {row}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
        /// Row index of the first occurrence.
        first_row: usize,
        /// Row index of the repeated occurrence.
        row: usize,
    },
}

/// The main error type for flightwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Snapshot Errors ===
    /// A snapshot failed boundary validation.
    #[error("invalid snapshot: {0}")]
    Validation(#[from] ValidationError),

    /// A snapshot source could not produce a snapshot.
    #[error("snapshot source '{name}' failed: {message}")]
    Source {
        /// Name of the snapshot source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to read a CSV snapshot file.
    #[error("failed to read CSV at {path}: {source}")]
    CsvRead {
        /// Path to the CSV file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: csv::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Storage Errors ===
    /// Failed to open or create the journal database.
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

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flightwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new snapshot source error.
    #[must_use]
    pub fn source_failed(name: &'static str, message: impl Into<String>) -> Self {
        Self::Source {
            name,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error is a snapshot validation failure.
    ///
    /// Callers driving a polling loop use this to skip a tick instead of
    /// halting.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_display() {
        let err = ValidationError::MissingKey {
            row: 3,
            column: "title".to_string(),
        };
        assert_eq!(err.to_string(), "row 3 has no value for key column 'title'");
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = ValidationError::DuplicateKey {
            key: "Alpha".to_string(),
            first_row: 0,
            row: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("Alpha"));
        assert!(msg.contains("rows 0 and 4"));
    }

    #[test]
    fn test_validation_wraps_into_error() {
        let err: Error = ValidationError::DuplicateKey {
            key: "Bravo".to_string(),
            first_row: 1,
            row: 2,
        }
        .into();
        assert!(err.is_validation_error());
        assert!(err.to_string().starts_with("invalid snapshot:"));
    }

    #[test]
    fn test_source_error() {
        let err = Error::source_failed("csv", "file vanished");
        let msg = err.to_string();
        assert!(msg.contains("csv"));
        assert!(msg.contains("file vanished"));
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("invalid interval");
        assert!(err.to_string().contains("invalid interval"));
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
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
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

    #[test]
    fn test_csv_read_error_display() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader("a,b\n1,2,3\n".as_bytes());
        let csv_err = reader
            .records()
            .find_map(std::result::Result::err)
            .expect("ragged row should fail");
        let err = Error::CsvRead {
            path: PathBuf::from("/data/schedule.csv"),
            source: csv_err,
        };
        assert!(err.to_string().contains("/data/schedule.csv"));
    }
}
