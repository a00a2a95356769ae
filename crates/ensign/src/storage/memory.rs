//! In-memory flag storage.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::flag::{FlagType, FlagValue};

use super::{next_stamp, FlagRecord, FlagStore, NewFlag};

#[derive(Debug, Clone)]
struct Entry {
    kind: FlagType,
    value_binary: Option<bool>,
    label: Option<String>,
    description: Option<String>,
    tags: Option<String>,
    used: Option<DateTime<Utc>>,
}

/// A process-local [`FlagStore`].
///
/// Behaves like [`super::SqliteStore`] in every observable way except
/// durability. [`FlagStore::all`] returns names in lexical order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>> {
        self.entries.lock().map_err(|_| Error::StoragePoisoned)
    }
}

impl FlagStore for MemoryStore {
    fn create(&self, name: &str, kind: FlagType, extra: NewFlag) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.contains_key(name) {
            return Err(Error::duplicate(name));
        }

        entries.insert(
            name.to_string(),
            Entry {
                kind,
                value_binary: extra.value_binary,
                label: extra.label,
                description: extra.description,
                tags: extra.tags,
                used: extra.used,
            },
        );
        debug!(flag = name, kind = %kind, "Created flag in memory");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(name))
    }

    fn load(&self, name: &str, kind: FlagType) -> Result<FlagValue> {
        let mut entries = self.lock()?;
        let entry = entries.get_mut(name).ok_or_else(|| Error::not_found(name))?;

        let value = match kind {
            FlagType::Binary => FlagValue::Binary(entry.value_binary),
        };
        entry.used = Some(next_stamp(entry.used, Utc::now()));
        Ok(value)
    }

    fn store(&self, name: &str, value: FlagValue) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = entries.get_mut(name).ok_or_else(|| Error::not_found(name))?;

        match value {
            FlagValue::Binary(v) => entry.value_binary = v,
        }
        Ok(())
    }

    fn kind(&self, name: &str) -> Result<FlagType> {
        self.lock()?
            .get(name)
            .map(|entry| entry.kind)
            .ok_or_else(|| Error::not_found(name))
    }

    fn used(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        self.lock()?
            .get(name)
            .map(|entry| entry.used)
            .ok_or_else(|| Error::not_found(name))
    }

    fn info(&self, name: &str) -> Result<FlagRecord> {
        self.lock()?
            .get(name)
            .map(|entry| FlagRecord {
                name: name.to_string(),
                label: entry.label.clone(),
                description: entry.description.clone(),
                tags: entry.tags.clone(),
            })
            .ok_or_else(|| Error::not_found(name))
    }

    fn all(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
