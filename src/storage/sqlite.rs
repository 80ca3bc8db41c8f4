//! SqliteStore: a `PasteStore` backed by SQLite.
//!
//! Counter mutations are single statements (`UPDATE ... WHERE ... RETURNING`
//! and `INSERT ... ON CONFLICT DO UPDATE ... WHERE ... RETURNING`), so they
//! stay atomic when several processes or connections share one database file.
//!
//! Schema:
//! - pastes: (id TEXT PRIMARY KEY, content, iv, language, password_hash,
//!   created_at, expires_at, remaining_views)
//! - password_attempts: (paste_id, client_key) PRIMARY KEY, attempts,
//!   locked_until
//!
//! Timestamps are Unix milliseconds.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::error::StorageError;
use crate::types::{AttemptRecord, AttemptUpsert, BurnUpdate, EncryptedBlob, Paste};

use super::traits::{AttemptRule, PasteStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pastes (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    iv TEXT NOT NULL,
    language TEXT NOT NULL,
    password_hash TEXT,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    remaining_views INTEGER CHECK (remaining_views IS NULL OR remaining_views >= 0)
);
CREATE TABLE IF NOT EXISTS password_attempts (
    paste_id TEXT NOT NULL,
    client_key TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    locked_until INTEGER,
    PRIMARY KEY (paste_id, client_key)
);
";

/// One connection per store. Open several stores on the same file to model
/// several workers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {ms}")))
}

fn views_from_column(value: Option<i64>) -> Result<Option<u32>, StorageError> {
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| StorageError::Corrupt(format!("remaining_views: {v}")))
        })
        .transpose()
}

/// Raw column values for one paste row.
struct PasteRow {
    id: String,
    content: String,
    iv: String,
    language: String,
    password_hash: Option<String>,
    created_at: i64,
    expires_at: Option<i64>,
    remaining_views: Option<i64>,
}

impl PasteRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            iv: row.get(2)?,
            language: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: row.get(5)?,
            expires_at: row.get(6)?,
            remaining_views: row.get(7)?,
        })
    }

    fn into_paste(self) -> Result<Paste, StorageError> {
        let encrypted_body = EncryptedBlob::decode(&self.content, &self.iv)
            .map_err(|e| StorageError::Corrupt(format!("paste {}: {e}", self.id)))?;
        Ok(Paste {
            encrypted_body,
            language: self.language,
            password_hash: self.password_hash,
            created_at: from_millis(self.created_at)?,
            expires_at: self.expires_at.map(from_millis).transpose()?,
            remaining_views: views_from_column(self.remaining_views)?,
            id: self.id,
        })
    }
}

fn attempt_from_columns(
    attempts: i64,
    locked_until: Option<i64>,
) -> Result<AttemptRecord, StorageError> {
    Ok(AttemptRecord {
        attempts: u32::try_from(attempts)
            .map_err(|_| StorageError::Corrupt(format!("attempts: {attempts}")))?,
        locked_until: locked_until.map(from_millis).transpose()?,
    })
}

impl PasteStore for SqliteStore {
    fn insert_paste(&self, paste: &Paste) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO pastes
                (id, content, iv, language, password_hash, created_at, expires_at, remaining_views)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO NOTHING",
            params![
                paste.id,
                paste.encrypted_body.encode_body(),
                paste.encrypted_body.encode_nonce(),
                paste.language,
                paste.password_hash,
                to_millis(paste.created_at),
                paste.expires_at.map(to_millis),
                paste.remaining_views.map(i64::from),
            ],
        )?;
        if inserted == 0 {
            return Err(StorageError::Duplicate(paste.id.clone()));
        }
        Ok(())
    }

    fn get_paste(&self, id: &str) -> Result<Option<Paste>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, content, iv, language, password_hash, created_at, expires_at,
                        remaining_views
                 FROM pastes WHERE id = ?1",
                params![id],
                PasteRow::read,
            )
            .optional()?;
        row.map(PasteRow::into_paste).transpose()
    }

    fn delete_paste(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM pastes WHERE id = ?1", params![id])? > 0)
    }

    fn conditional_decrement_burn(&self, id: &str) -> Result<BurnUpdate, StorageError> {
        let conn = self.conn.lock();
        let updated: Option<i64> = conn
            .query_row(
                "UPDATE pastes SET remaining_views = MAX(0, remaining_views - 1)
                 WHERE id = ?1 AND remaining_views > 0
                 RETURNING remaining_views",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(remaining) = updated {
            let remaining = views_from_column(Some(remaining))?.unwrap_or(0);
            return Ok(BurnUpdate::Decremented(remaining));
        }

        // No row changed. The counter only ever moves towards zero, so this
        // classification read cannot race with a later decrement.
        let current: Option<Option<i64>> = conn
            .query_row(
                "SELECT remaining_views FROM pastes WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match current {
            None => BurnUpdate::NotFound,
            Some(None) => BurnUpdate::Unlimited,
            Some(Some(v)) => {
                debug!(paste_id = id, remaining = v, "burn decrement was a no-op");
                BurnUpdate::AlreadyZero
            }
        })
    }

    fn get_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        let conn = self.conn.lock();
        let row: Option<(i64, Option<i64>)> = conn
            .query_row(
                "SELECT attempts, locked_until FROM password_attempts
                 WHERE paste_id = ?1 AND client_key = ?2",
                params![paste_id, client_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(attempts, locked)| attempt_from_columns(attempts, locked))
            .transpose()
    }

    fn upsert_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
        rule: &AttemptRule,
    ) -> Result<AttemptUpsert, StorageError> {
        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front, so the locked-row read
        // below sees the same state the refused upsert saw.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let counted: Option<(i64, Option<i64>)> = tx
            .query_row(
                "INSERT INTO password_attempts (paste_id, client_key, attempts, locked_until)
                 VALUES (?1, ?2, 1, CASE WHEN 1 >= ?3 THEN ?4 ELSE NULL END)
                 ON CONFLICT(paste_id, client_key) DO UPDATE SET
                    attempts = attempts + 1,
                    locked_until = CASE WHEN attempts + 1 >= ?3 THEN ?4 ELSE locked_until END
                 WHERE locked_until IS NULL OR locked_until <= ?5
                 RETURNING attempts, locked_until",
                params![
                    paste_id,
                    client_key,
                    i64::from(rule.threshold),
                    to_millis(rule.lock_until),
                    to_millis(rule.now)
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match counted {
            Some((attempts, locked_until)) => {
                AttemptUpsert::Counted(attempt_from_columns(attempts, locked_until)?)
            }
            None => {
                let (attempts, locked_until): (i64, Option<i64>) = tx.query_row(
                    "SELECT attempts, locked_until FROM password_attempts
                     WHERE paste_id = ?1 AND client_key = ?2",
                    params![paste_id, client_key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                AttemptUpsert::Locked(attempt_from_columns(attempts, locked_until)?)
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    fn reset_attempt(&self, paste_id: &str, client_key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE password_attempts SET attempts = 0, locked_until = NULL
             WHERE paste_id = ?1 AND client_key = ?2",
            params![paste_id, client_key],
        )?;
        Ok(())
    }
}
