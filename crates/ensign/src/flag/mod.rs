//! Storage-backed feature flags.
//!
//! A [`Flag`] is a transient handle: a name, a kind and a borrowed
//! [`FlagStore`]. It caches nothing, so every value read goes to storage and
//! stamps the flag's last-used time.
//!
//! ```no_run
//! use ensign::{Flag, MemoryStore, NewFlag};
//!
//! # fn main() -> ensign::Result<()> {
//! let store = MemoryStore::new();
//! let flag = Flag::create_binary(&store, "new_checkout", NewFlag::default())?;
//! flag.set()?;
//!
//! let checkout = flag.guard(|total: u32| total * 2);
//! # let _ = checkout;
//! # Ok(())
//! # }
//! ```

mod activity;
mod kind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::{FlagStore, NewFlag};

pub use activity::{Activity, DAYS_INACTIVE};
pub use kind::{FlagType, FlagValue};

/// Descriptive metadata of a flag with absent fields as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagInfo {
    /// Unique flag name.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Longer description.
    pub description: String,
    /// Free-form tags.
    pub tags: String,
}

/// A handle on one named flag in a [`FlagStore`].
#[derive(Debug, Clone)]
pub struct Flag<'s> {
    name: String,
    kind: FlagType,
    store: &'s dyn FlagStore,
}

impl<'s> Flag<'s> {
    /// Attach to an existing flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlagDoesNotExist`] if the store has no such flag.
    /// Nothing is written to the store in that case. Returns
    /// [`Error::KindMismatch`] if the flag was created as another kind.
    pub fn open(store: &'s dyn FlagStore, name: impl Into<String>, kind: FlagType) -> Result<Self> {
        let name = name.into();
        if !store.exists(&name)? {
            return Err(Error::FlagDoesNotExist { name });
        }
        let found = store.kind(&name)?;
        if found != kind {
            return Err(Error::KindMismatch {
                name,
                expected: kind,
                found,
            });
        }
        Ok(Self { name, kind, store })
    }

    /// Attach to an existing binary flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlagDoesNotExist`] if the store has no such flag.
    pub fn binary(store: &'s dyn FlagStore, name: impl Into<String>) -> Result<Self> {
        Self::open(store, name, FlagType::Binary)
    }

    /// Create a flag in the store and return a handle on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if the name is already taken.
    pub fn create(
        store: &'s dyn FlagStore,
        name: impl Into<String>,
        kind: FlagType,
        extra: NewFlag,
    ) -> Result<Self> {
        let name = name.into();
        store.create(&name, kind, extra)?;
        Self::open(store, name, kind)
    }

    /// Create a binary flag in the store and return a handle on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if the name is already taken.
    pub fn create_binary(
        store: &'s dyn FlagStore,
        name: impl Into<String>,
        extra: NewFlag,
    ) -> Result<Self> {
        Self::create(store, name, FlagType::Binary, extra)
    }

    /// A handle for every flag in the store, in the store's order.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails or a flag vanishes mid-listing.
    pub fn all(store: &'s dyn FlagStore, kind: FlagType) -> Result<Vec<Self>> {
        store
            .all()?
            .into_iter()
            .map(|name| Self::open(store, name, kind))
            .collect()
    }

    /// The flag's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The flag's kind.
    #[must_use]
    pub fn kind(&self) -> FlagType {
        self.kind
    }

    /// Read the stored value, stamping the flag as used.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn value(&self) -> Result<FlagValue> {
        self.store.load(&self.name, self.kind)
    }

    /// Write a new value. Does not count as a use.
    ///
    /// # Errors
    ///
    /// Returns an error if the value's kind differs from the flag's, or if
    /// the storage write fails.
    pub fn set_value(&self, value: impl Into<FlagValue>) -> Result<()> {
        let value = value.into();
        if value.kind() != self.kind {
            return Err(Error::internal(format!(
                "cannot store a {} value in {} flag '{}'",
                value.kind(),
                self.kind,
                self.name
            )));
        }
        debug!(flag = %self.name, %value, "Setting flag value");
        self.store.store(&self.name, value)
    }

    /// Evaluate the flag: whether the feature it guards is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn check(&self) -> Result<bool> {
        let value = self.value()?;
        Ok(match self.kind {
            FlagType::Binary => value.is_on(),
        })
    }

    /// Both flags are on. Reads both, so both are stamped as used.
    ///
    /// # Errors
    ///
    /// Returns an error if either read fails.
    pub fn and(&self, other: &Flag<'_>) -> Result<bool> {
        let left = self.check()?;
        let right = other.check()?;
        Ok(left && right)
    }

    /// Either flag is on. Reads both, so both are stamped as used.
    ///
    /// # Errors
    ///
    /// Returns an error if either read fails.
    pub fn or(&self, other: &Flag<'_>) -> Result<bool> {
        let left = self.check()?;
        let right = other.check()?;
        Ok(left || right)
    }

    /// Exactly one of the flags is on.
    ///
    /// # Errors
    ///
    /// Returns an error if either read fails.
    pub fn xor(&self, other: &Flag<'_>) -> Result<bool> {
        let left = self.check()?;
        let right = other.check()?;
        Ok(left ^ right)
    }

    /// The flag is off.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn negate(&self) -> Result<bool> {
        Ok(!self.check()?)
    }

    /// Turn a binary flag on.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn set(&self) -> Result<()> {
        self.set_value(true)
    }

    /// Turn a binary flag off.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn unset(&self) -> Result<()> {
        self.set_value(false)
    }

    /// When the flag was last read.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn used(&self) -> Result<Option<DateTime<Utc>>> {
        self.store.used(&self.name)
    }

    /// Classify the flag's activity as of now. Does not count as a use.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn active(&self) -> Result<Activity> {
        self.active_at(Utc::now())
    }

    /// Classify the flag's activity as seen at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn active_at(&self, now: DateTime<Utc>) -> Result<Activity> {
        Ok(Activity::classify(self.used()?, now))
    }

    /// Descriptive metadata, with absent fields as empty strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn info(&self) -> Result<FlagInfo> {
        let record = self.store.info(&self.name)?;
        Ok(FlagInfo {
            name: record.name,
            label: record.label.unwrap_or_default(),
            description: record.description.unwrap_or_default(),
            tags: record.tags.unwrap_or_default(),
        })
    }

    /// Render as `<Flag(name=value)>`. Reads the value.
    ///
    /// A never-set value renders as `unset`, e.g. `<Flag(beta=unset)>`,
    /// not as a null literal.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn describe(&self) -> Result<String> {
        Ok(format!("<Flag({}={})>", self.name, self.value()?))
    }

    /// Call `f` only if the flag is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails; `f` is not called then.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Result<Option<R>> {
        if self.check()? {
            Ok(Some(f()))
        } else {
            Ok(None)
        }
    }

    /// Wrap `f` so that each call first evaluates this flag. See [`guard`].
    #[must_use]
    pub fn guard<A, R, F>(&self, f: F) -> impl FnMut(A) -> Result<Option<R>> + 's
    where
        A: 's,
        R: 's,
        F: FnMut(A) -> R + 's,
    {
        guard(self.clone(), f)
    }
}

/// Wrap `f` so that it only runs while `flag` is on.
///
/// Every call of the returned function evaluates the flag first. When the
/// flag is on, `f` runs and its result is returned as `Some`; when it is off,
/// `f` is not called and the result is `None`. Multiple arguments are passed
/// as a tuple.
#[must_use]
pub fn guard<'s, A, R, F>(flag: Flag<'s>, mut f: F) -> impl FnMut(A) -> Result<Option<R>> + 's
where
    A: 's,
    R: 's,
    F: FnMut(A) -> R + 's,
{
    move |args: A| -> Result<Option<R>> {
        if flag.check()? {
            Ok(Some(f(args)))
        } else {
            Ok(None)
        }
    }
}
