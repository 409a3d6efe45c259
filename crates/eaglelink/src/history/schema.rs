//! `SQLite` schema for the upload history.

/// One row per completed upload.
pub const CREATE_UPLOADS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    provider TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    delete_url TEXT
)
";

/// Newest-first listing and age pruning.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_uploads_timestamp ON uploads(timestamp DESC)
";

/// Dedupe lookups.
pub const CREATE_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_uploads_hash ON uploads(content_hash)
";

/// Key-value store; holds `schema_version`.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Statements run on every open, in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_UPLOADS_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_HASH_INDEX,
    CREATE_METADATA_TABLE,
];
