//! `SQLite`-backed flag storage.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::flag::{FlagType, FlagValue};

use super::{
    format_timestamp, migrations, next_stamp, parse_timestamp, FlagRecord, FlagStore, NewFlag,
};

/// Default time a connection waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable flag storage in a `SQLite` database.
///
/// The single connection sits behind a mutex, which serialises every
/// operation issued through one store. Separate processes sharing the file
/// are serialised by `SQLite`'s own locking; [`FlagStore::load`] takes the
/// write lock up front so its read and stamp commit together.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a flag database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a flag database, waiting up to `busy_timeout` whenever
    /// another connection holds the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store, discarded on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.lock()?;

        let total_flags: i64 = conn.query_row("SELECT COUNT(*) FROM flags", [], |row| row.get(0))?;
        let last_used: Option<String> =
            conn.query_row("SELECT MAX(used) FROM flags", [], |row| row.get(0))?;
        let last_used = last_used.as_deref().map(parse_timestamp).transpose()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_flags,
            last_used,
            db_size_bytes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StoragePoisoned)
    }
}

impl FlagStore for SqliteStore {
    fn create(&self, name: &str, kind: FlagType, extra: NewFlag) -> Result<()> {
        let conn = self.lock()?;
        let used = extra.used.map(format_timestamp);

        conn.execute(
            r"
            INSERT INTO flags (name, type, value_binary, label, description, tags, used)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                name,
                kind.as_str(),
                extra.value_binary,
                extra.label,
                extra.description,
                extra.tags,
                used,
            ],
        )
        .map_err(|err| {
            if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
                Error::duplicate(name)
            } else {
                err.into()
            }
        })?;

        info!(flag = name, kind = %kind, "Created flag");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM flags WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn load(&self, name: &str, kind: FlagType) -> Result<FlagValue> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let select = format!("SELECT {}, used FROM flags WHERE name = ?1", kind.value_column());
        let row = tx
            .query_row(&select, [name], |row| {
                let value = match kind {
                    FlagType::Binary => FlagValue::Binary(row.get(0)?),
                };
                let used: Option<String> = row.get(1)?;
                Ok((value, used))
            })
            .optional()?;
        let (value, previous) = row.ok_or_else(|| Error::not_found(name))?;

        let previous = previous.as_deref().map(parse_timestamp).transpose()?;
        let stamp = next_stamp(previous, Utc::now());
        tx.execute(
            "UPDATE flags SET used = ?1 WHERE name = ?2",
            params![format_timestamp(stamp), name],
        )?;
        tx.commit()?;

        debug!(flag = name, %value, "Loaded flag");
        Ok(value)
    }

    fn store(&self, name: &str, value: FlagValue) -> Result<()> {
        let conn = self.lock()?;
        let update = format!(
            "UPDATE flags SET {} = ?1 WHERE name = ?2",
            value.kind().value_column()
        );

        let affected = match value {
            FlagValue::Binary(v) => conn.execute(&update, params![v, name])?,
        };
        if affected == 0 {
            return Err(Error::not_found(name));
        }

        debug!(flag = name, %value, "Stored flag");
        Ok(())
    }

    fn kind(&self, name: &str) -> Result<FlagType> {
        let conn = self.lock()?;
        let tag: String = conn
            .query_row("SELECT type FROM flags WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| Error::not_found(name))?;

        FlagType::from_tag(&tag).ok_or_else(|| Error::UnknownFlagType {
            name: name.to_string(),
            tag,
        })
    }

    fn used(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let used: Option<Option<String>> = conn
            .query_row("SELECT used FROM flags WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;

        used.ok_or_else(|| Error::not_found(name))?
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }

    fn info(&self, name: &str) -> Result<FlagRecord> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT name, label, description, tags FROM flags WHERE name = ?1",
            [name],
            |row| {
                Ok(FlagRecord {
                    name: row.get(0)?,
                    label: row.get(1)?,
                    description: row.get(2)?,
                    tags: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::not_found(name))
    }

    fn all(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM flags ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

/// Statistics about the flag database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of flags stored.
    pub total_flags: i64,
    /// Most recent read of any flag.
    pub last_used: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn temp_db_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ensign_{tag}_{}.db", std::process::id()))
    }

    fn remove_db(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
        assert_eq!(store.unwrap().path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_exists() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        assert!(store.exists("flag0").unwrap());
        assert!(!store.exists("flag1").unwrap());
    }

    #[test]
    fn test_create_duplicate_name() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        let err = store
            .create("flag0", FlagType::Binary, NewFlag::default().label("again"))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.all().unwrap().len(), 1);
        assert_eq!(store.info("flag0").unwrap().label, None);
    }

    #[test]
    fn test_kind_reads_persisted_tag() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        assert_eq!(store.kind("flag0").unwrap(), FlagType::Binary);
        assert!(store.kind("flag1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unknown_tag_blocks_handle() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();
        store
            .lock()
            .unwrap()
            .execute("UPDATE flags SET type = 'percentage' WHERE name = 'flag0'", [])
            .unwrap();

        let err = crate::Flag::binary(&store, "flag0").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownFlagType { ref tag, .. } if tag == "percentage"
        ));
        assert!(store.used("flag0").unwrap().is_none());
    }

    #[test]
    fn test_load_store() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        store.store("flag0", FlagValue::from(true)).unwrap();
        assert_eq!(
            store.load("flag0", FlagType::Binary).unwrap(),
            FlagValue::Binary(Some(true))
        );

        store.store("flag0", FlagValue::from(false)).unwrap();
        assert_eq!(
            store.load("flag0", FlagType::Binary).unwrap(),
            FlagValue::Binary(Some(false))
        );
    }

    #[test]
    fn test_fresh_flag_is_unset() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        assert!(store.load("flag0", FlagType::Binary).unwrap().is_unset());
    }

    #[test]
    fn test_create_with_initial_value() {
        let store = create_test_store();
        store
            .create(
                "flag0",
                FlagType::Binary,
                NewFlag::default().value_binary(true),
            )
            .unwrap();

        assert!(store.load("flag0", FlagType::Binary).unwrap().is_on());
    }

    #[test]
    fn test_load_stamps_used() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();
        assert!(store.used("flag0").unwrap().is_none());

        let before = Utc::now();
        store.load("flag0", FlagType::Binary).unwrap();

        let used = store.used("flag0").unwrap().expect("load should stamp used");
        assert!(used.timestamp_micros() >= before.timestamp_micros());
    }

    #[test]
    fn test_store_does_not_stamp_used() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        store.store("flag0", FlagValue::from(true)).unwrap();
        assert!(store.used("flag0").unwrap().is_none());

        store.load("flag0", FlagType::Binary).unwrap();
        let stamped = store.used("flag0").unwrap();
        store.store("flag0", FlagValue::from(false)).unwrap();
        assert_eq!(store.used("flag0").unwrap(), stamped);
    }

    #[test]
    fn test_used_seeded_at_create() {
        let store = create_test_store();
        let used = Utc::now() - ChronoDuration::days(3);
        store
            .create("flag0", FlagType::Binary, NewFlag::default().used(used))
            .unwrap();

        let stored = store.used("flag0").unwrap().unwrap();
        assert_eq!(stored.timestamp_micros(), used.timestamp_micros());
    }

    #[test]
    fn test_load_never_moves_used_backwards() {
        let store = create_test_store();
        let future = Utc::now() + ChronoDuration::hours(2);
        store
            .create("flag0", FlagType::Binary, NewFlag::default().used(future))
            .unwrap();

        store.load("flag0", FlagType::Binary).unwrap();

        let used = store.used("flag0").unwrap().unwrap();
        assert_eq!(used.timestamp_micros(), future.timestamp_micros());
    }

    #[test]
    fn test_info_keeps_nulls() {
        let store = create_test_store();
        store
            .create("flag0", FlagType::Binary, NewFlag::default().label("Fake flag"))
            .unwrap();

        let record = store.info("flag0").unwrap();
        assert_eq!(record.name, "flag0");
        assert_eq!(record.label.as_deref(), Some("Fake flag"));
        assert!(record.description.is_none());
        assert!(record.tags.is_none());
    }

    #[test]
    fn test_get_all() {
        let store = create_test_store();
        let names = ["flag0", "flag1", "flag2"];
        for name in names {
            store
                .create(name, FlagType::Binary, NewFlag::default())
                .unwrap();
        }

        assert_eq!(store.all().unwrap(), names);
    }

    #[test]
    fn test_missing_name_is_not_found() {
        let store = create_test_store();

        assert!(store.load("ghost", FlagType::Binary).unwrap_err().is_not_found());
        assert!(store
            .store("ghost", FlagValue::from(true))
            .unwrap_err()
            .is_not_found());
        assert!(store.used("ghost").unwrap_err().is_not_found());
        assert!(store.info("ghost").unwrap_err().is_not_found());
        assert!(!store.exists("ghost").unwrap());
    }

    #[test]
    fn test_failed_load_leaves_no_row() {
        let store = create_test_store();
        let _ = store.load("ghost", FlagType::Binary);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let store = create_test_store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_flags, 0);
        assert!(stats.last_used.is_none());
        assert_eq!(stats.db_size_bytes, 0);

        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();
        store
            .create("flag1", FlagType::Binary, NewFlag::default())
            .unwrap();
        store.load("flag1", FlagType::Binary).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_flags, 2);
        assert!(stats.last_used.is_some());
    }

    #[test]
    fn test_concurrent_loads_keep_used_monotonic() {
        let store = Arc::new(create_test_store());
        store
            .create("flag0", FlagType::Binary, NewFlag::default().value_binary(true))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut last = None;
                    for _ in 0..25 {
                        assert!(store.load("flag0", FlagType::Binary).unwrap().is_on());
                        let used = store.used("flag0").unwrap();
                        assert!(used.is_some());
                        assert!(used >= last);
                        last = used;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_open_file_based() {
        let db_path = temp_db_path("open");
        remove_db(&db_path);

        let store = SqliteStore::open(&db_path).unwrap();
        store
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();
        store.store("flag0", FlagValue::from(true)).unwrap();
        assert_eq!(store.path(), db_path);
        assert!(store.stats().unwrap().db_size_bytes > 0);
        drop(store);

        let reopened = SqliteStore::open(&db_path).unwrap();
        assert!(reopened.load("flag0", FlagType::Binary).unwrap().is_on());

        drop(reopened);
        remove_db(&db_path);
    }

    #[test]
    fn test_two_connections_share_one_file() {
        let db_path = temp_db_path("shared");
        remove_db(&db_path);

        let writer = SqliteStore::open(&db_path).unwrap();
        let reader = SqliteStore::open(&db_path).unwrap();
        writer
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap();

        writer.store("flag0", FlagValue::from(true)).unwrap();
        assert!(reader.load("flag0", FlagType::Binary).unwrap().is_on());
        assert!(writer.used("flag0").unwrap().is_some());
        assert!(reader
            .create("flag0", FlagType::Binary, NewFlag::default())
            .unwrap_err()
            .is_duplicate());

        drop(writer);
        drop(reader);
        remove_db(&db_path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("ensign_test_{}", std::process::id()));
        let nested_path = root.join("nested/flags.db");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }
}
