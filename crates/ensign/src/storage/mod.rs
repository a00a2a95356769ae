//! Storage layer for ensign.
//!
//! [`FlagStore`] is the capability the flag abstraction consumes. Two
//! backends implement it:
//! - [`SqliteStore`], durable storage in a `SQLite` database
//! - [`MemoryStore`], an in-process fake with identical semantics
//!
//! Every backend stamps a flag's `used` time as part of [`FlagStore::load`],
//! atomically with the value read, and never as part of [`FlagStore::store`].

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::fmt::Debug;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::flag::{FlagType, FlagValue};

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StorageStats};

/// Optional columns populated when a flag is created.
///
/// Tests use `value_binary` and `used` to seed a flag in a known state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFlag {
    /// Human-readable label.
    pub label: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Free-form tags, conventionally comma separated.
    pub tags: Option<String>,
    /// Initial value of a binary flag.
    pub value_binary: Option<bool>,
    /// Initial last-used time.
    pub used: Option<DateTime<Utc>>,
}

impl NewFlag {
    /// Set the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Seed the binary value.
    #[must_use]
    pub fn value_binary(mut self, value: bool) -> Self {
        self.value_binary = Some(value);
        self
    }

    /// Seed the last-used time.
    #[must_use]
    pub fn used(mut self, used: DateTime<Utc>) -> Self {
        self.used = Some(used);
        self
    }
}

/// A flag's descriptive record exactly as persisted.
///
/// Absent metadata stays `None` here; normalisation is the flag
/// abstraction's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRecord {
    /// Unique flag name.
    pub name: String,
    /// Human-readable label.
    pub label: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Free-form tags.
    pub tags: Option<String>,
}

/// A name-keyed store of flag records.
///
/// Implementations must be safe to share between request handlers and must
/// make [`load`](FlagStore::load) atomic: the value read and the `used`
/// stamp are applied as one unit.
pub trait FlagStore: Send + Sync + Debug {
    /// Insert a new flag record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if the name is taken.
    fn create(&self, name: &str, kind: FlagType, extra: NewFlag) -> Result<()>;

    /// Check whether a flag record exists. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend itself fails.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Read a flag's value and stamp its `used` time to now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is unknown.
    fn load(&self, name: &str, kind: FlagType) -> Result<FlagValue>;

    /// Write a flag's value into the column of the value's kind.
    /// Leaves `used` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is unknown.
    fn store(&self, name: &str, value: FlagValue) -> Result<()>;

    /// Read the kind a flag was created with. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is unknown.
    fn kind(&self, name: &str) -> Result<FlagType>;

    /// Read a flag's last-used time without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is unknown.
    fn used(&self, name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Read a flag's descriptive record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name is unknown.
    fn info(&self, name: &str) -> Result<FlagRecord>;

    /// List every flag name.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend itself fails.
    fn all(&self) -> Result<Vec<String>>;
}

/// Format a timestamp the way every backend persists it.
///
/// Fixed precision and a `Z` suffix keep the text sortable.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a persisted timestamp.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if the text is not RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// The stamp a read leaves behind: never earlier than the previous one.
pub(crate) fn next_stamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |prev| prev.max(now))
}
