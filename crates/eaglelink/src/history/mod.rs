//! Upload history.
//!
//! Every completed upload is recorded in `SQLite` together with the BLAKE3
//! hash of its contents, so that uploading the same bytes again can reuse
//! the earlier URL instead of hitting the network.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::upload::{ProviderKind, UploadOutcome};

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, provider, file_name, content_hash, url, delete_url FROM uploads";

/// One completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    /// Row id.
    pub id: i64,
    /// When the upload finished.
    pub timestamp: DateTime<Utc>,
    /// Provider that accepted the file.
    pub provider: ProviderKind,
    /// Name the file was uploaded under.
    pub file_name: String,
    /// BLAKE3 hash of the contents, hex encoded.
    pub content_hash: String,
    /// Public URL.
    pub url: String,
    /// Delete URL, when the provider returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
}

impl UploadRecord {
    /// The record as an upload result.
    #[must_use]
    pub fn to_outcome(&self) -> UploadOutcome {
        UploadOutcome {
            provider: self.provider,
            url: self.url.clone(),
            delete_url: self.delete_url.clone(),
        }
    }
}

/// Summary of the history database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Number of recorded uploads.
    pub total: i64,
    /// Upload count per provider, busiest first.
    pub by_provider: Vec<(ProviderKind, i64)>,
    /// Oldest record.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest record.
    pub newest: Option<DateTime<Utc>>,
    /// Database file size in bytes (0 in memory).
    pub db_size_bytes: u64,
}

/// `SQLite` store of completed uploads.
#[derive(Debug)]
pub struct History {
    path: PathBuf,
    conn: Connection,
}

fn timestamp_string(at: DateTime<Utc>) -> String {
    // Fixed width so that text comparison orders by time.
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl History {
    /// Open or create the history database.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or the schema cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening history database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self { path, conn })
    }

    /// Open a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self { path, conn })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a completed upload, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record(
        &self,
        outcome: &UploadOutcome,
        file_name: &str,
        content_hash: &str,
    ) -> Result<i64> {
        self.record_at(outcome, file_name, content_hash, Utc::now())
    }

    fn record_at(
        &self,
        outcome: &UploadOutcome,
        file_name: &str,
        content_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO uploads (timestamp, provider, file_name, content_hash, url, delete_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                timestamp_string(at),
                outcome.provider.to_string(),
                file_name,
                content_hash,
                outcome.url,
                outcome.delete_url,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, provider = %outcome.provider, "Recorded upload");
        Ok(id)
    }

    /// Most recent upload with the given content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_by_hash(&self, content_hash: &str) -> Result<Option<UploadRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE content_hash = ?1 ORDER BY timestamp DESC, id DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, [content_hash], Self::row_to_record)
            .optional()?)
    }

    /// Newest uploads first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<UploadRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([limit_param(limit)], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Case-insensitive substring search over file name and URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<UploadRecord>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let sql = format!(
            "{SELECT_COLUMNS} WHERE file_name LIKE ?1 ESCAPE '\\' OR url LIKE ?1 ESCAPE '\\' \
             ORDER BY timestamp DESC, id DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![pattern, limit_param(limit)], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Number of recorded uploads.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM uploads", [], |row| row.get(0))?)
    }

    /// Delete one record. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM uploads WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Delete records older than `max_age`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn prune_older_than(&self, max_age: std::time::Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| Error::internal(format!("prune age out of range: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let affected = self.conn.execute(
            "DELETE FROM uploads WHERE timestamp < ?1",
            [timestamp_string(cutoff)],
        )?;
        if affected > 0 {
            info!("Pruned {} old upload records", affected);
        }
        Ok(affected)
    }

    /// Totals, per-provider counts, and the covered time range.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<HistoryStats> {
        let total = self.count()?;

        let mut stmt = self.conn.prepare(
            "SELECT provider, COUNT(*) AS n FROM uploads GROUP BY provider ORDER BY n DESC, provider",
        )?;
        let by_provider = stmt
            .query_map([], |row| {
                let provider: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((provider, count))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(provider, count)| provider.parse().ok().map(|kind| (kind, count)))
            .collect();

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM uploads",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.as_os_str() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map_or(0, |m| m.len())
        };

        Ok(HistoryStats {
            total,
            by_provider,
            oldest: oldest.as_deref().and_then(parse_timestamp),
            newest: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<UploadRecord> {
        let timestamp: String = row.get(1)?;
        let provider: String = row.get(2)?;

        let timestamp = parse_timestamp(&timestamp).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("invalid timestamp: {timestamp}").into(),
            )
        })?;
        let provider = provider.parse::<ProviderKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.to_string().into())
        })?;

        Ok(UploadRecord {
            id: row.get(0)?,
            timestamp,
            provider,
            file_name: row.get(3)?,
            content_hash: row.get(4)?,
            url: row.get(5)?,
            delete_url: row.get(6)?,
        })
    }
}
