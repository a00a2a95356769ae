//! `ensign` - Feature flags backed by shared storage
//!
//! This library provides named boolean flags persisted in a pluggable store,
//! with every read stamping a last-used time so stale flags can be found, and
//! an HTTP resource API over the same store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod flag;
pub mod logging;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use flag::{guard, Activity, Flag, FlagInfo, FlagType, FlagValue};
pub use logging::init_logging;
pub use storage::{FlagRecord, FlagStore, MemoryStore, NewFlag, SqliteStore, StorageStats};
