//! Error types for ensign.
//!
//! Storage backends raise [`Error::NotFound`] and [`Error::DuplicateName`];
//! the flag abstraction translates a missing name at construction time into
//! [`Error::FlagDoesNotExist`], so callers of [`crate::Flag`] only ever match
//! on one "absent" condition.

use std::path::PathBuf;
use thiserror::Error;

use crate::flag::FlagType;

/// The main error type for ensign operations.
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

    /// The storage backend holds no record with this name.
    #[error("flag '{name}' not found in storage")]
    NotFound {
        /// The flag name that was looked up.
        name: String,
    },

    /// A flag with this name already exists.
    #[error("flag '{name}' already exists")]
    DuplicateName {
        /// The colliding flag name.
        name: String,
    },

    /// A thread panicked while holding the storage lock.
    #[error("storage lock poisoned")]
    StoragePoisoned,

    /// A persisted timestamp could not be parsed.
    #[error("invalid timestamp in storage: {value}")]
    InvalidTimestamp {
        /// The raw stored text.
        value: String,
    },

    /// The persisted `type` column holds a tag no [`FlagType`] claims.
    #[error("flag '{name}' has unknown type '{tag}'")]
    UnknownFlagType {
        /// The flag name.
        name: String,
        /// The raw stored tag.
        tag: String,
    },

    // === Flag Errors ===
    /// Attempted to attach a handle to a flag that was never created.
    #[error("flag '{name}' does not exist")]
    FlagDoesNotExist {
        /// The requested flag name.
        name: String,
    },

    /// A handle of one kind was requested for a flag of another.
    #[error("flag '{name}' is a {found} flag, not {expected}")]
    KindMismatch {
        /// The flag name.
        name: String,
        /// The kind the caller asked for.
        expected: FlagType,
        /// The kind the flag was created with.
        found: FlagType,
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

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for ensign operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a storage not-found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a duplicate-name error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if storage reported a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if a handle was requested for a flag that was never created.
    #[must_use]
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::FlagDoesNotExist { .. })
    }

    /// Check if a create collided with an existing name.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }
}
