//! `SQLite` schema definitions for ensign.

/// SQL statement to create the flags table.
///
/// One nullable `value_<type>` column exists per flag kind.
pub const CREATE_FLAGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL,
    value_binary INTEGER,
    label TEXT,
    description TEXT,
    tags TEXT,
    used TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `used` for activity queries.
pub const CREATE_USED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flags_used ON flags(used)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FLAGS_TABLE,
    CREATE_USED_INDEX,
    CREATE_METADATA_TABLE,
];
