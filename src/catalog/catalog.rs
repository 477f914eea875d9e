//! `rusqlite`-backed implementation of the catalog

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::CatalogError;
use crate::store::is_portable_hash;
use crate::types::{CatalogRecord, Device, Keep, TimeValue};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of an `insert` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// `(time_value, device)` already had a row.
    Conflict,
    /// `hash` was empty, or one of its slash-delimited components was not
    /// a portable filename; no row was written.
    Rejected,
}

/// Persistent index of `(time_value, device) -> (hash, size, keep)`.
///
/// Every method opens a fresh connection, does its work, and drops the
/// connection — this lets the index file be removed and recreated
/// externally between calls without leaving a stale file descriptor behind,
/// which is the crash-tolerance property this design is built around.
pub struct Catalog {
    db_path: PathBuf,
}

impl Catalog {
    /// `store_root/index_filename` is the on-disk location of the index.
    pub fn new(store_root: &Path, index_filename: &str) -> Self {
        Self {
            db_path: store_root.join(index_filename),
        }
    }

    fn connect(&self) -> Result<Connection, CatalogError> {
        let conn = Connection::open(&self.db_path).map_err(|e| CatalogError::from_rusqlite(&e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| CatalogError::from_rusqlite(&e))?;
        Ok(conn)
    }

    fn ensure_table(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS indexed_data (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                time_value  INTEGER NOT NULL,
                device      INTEGER NOT NULL,
                hash        TEXT NOT NULL,
                size        INTEGER NOT NULL,
                keep        INTEGER NOT NULL,
                UNIQUE(time_value, device) ON CONFLICT ROLLBACK
            )",
        )
        .map_err(|e| CatalogError::from_rusqlite(&e))
    }

    /// No-op if `hash` is empty or not portable. Fails with a conflict
    /// outcome (no row written, no error raised) on a `(time_value, device)`
    /// uniqueness violation.
    pub fn insert(
        &self,
        time_value: TimeValue,
        device: Device,
        hash: &str,
        size: u64,
        keep: Keep,
    ) -> Result<InsertOutcome, CatalogError> {
        if !is_portable_hash(hash) {
            debug!(hash, "rejecting non-portable hash on insert");
            return Ok(InsertOutcome::Rejected);
        }

        let conn = self.connect()?;
        Self::ensure_table(&conn)?;

        let result = conn.execute(
            "INSERT INTO indexed_data (time_value, device, hash, size, keep) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![time_value as i64, device, hash, size as i64, keep.priority()],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) => {
                let err = CatalogError::from_rusqlite(&e);
                if err.is_conflict() {
                    Ok(InsertOutcome::Conflict)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// No-op for an empty hash. Removes all rows matching `hash`.
    pub fn delete(&self, hash: &str) -> Result<(), CatalogError> {
        if hash.is_empty() {
            return Ok(());
        }
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM indexed_data WHERE hash = ?1",
            rusqlite::params![hash],
        )
        .map_err(|e| CatalogError::from_rusqlite(&e))?;
        Ok(())
    }

    /// Atomic over the set of hashes.
    pub fn bulk_delete(&self, hashes: &[String]) -> Result<(), CatalogError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(|e| CatalogError::from_rusqlite(&e))?;
        for hash in hashes {
            if hash.is_empty() {
                continue;
            }
            tx.execute(
                "DELETE FROM indexed_data WHERE hash = ?1",
                rusqlite::params![hash],
            )
            .map_err(|e| CatalogError::from_rusqlite(&e))?;
        }
        tx.commit().map_err(|e| CatalogError::from_rusqlite(&e))?;
        Ok(())
    }

    /// Empty when `(time_value, device)` is absent.
    pub fn find_hash(&self, time_value: TimeValue, device: Device) -> Result<String, CatalogError> {
        use rusqlite::OptionalExtension;

        let conn = self.connect()?;
        let result = conn
            .query_row(
                "SELECT hash FROM indexed_data WHERE time_value = ?1 AND device = ?2",
                rusqlite::params![time_value as i64, device],
                |row| row.get::<_, String>(0),
            )
            .optional();

        match result {
            Ok(opt) => Ok(opt.unwrap_or_default()),
            Err(e) => {
                let err = CatalogError::from_rusqlite(&e);
                if err.is_no_table() { Ok(String::new()) } else { Err(err) }
            }
        }
    }

    /// Rows with `keep < PRESERVE_RECORD`, ordered by `keep` ascending then
    /// `time_value` ascending — the eviction policy, lowest-priority first
    /// with oldest-first as the tiebreak.
    pub fn get_lowest_deletable_hashes(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.connect()?;
        let mut stmt = match conn.prepare(
            "SELECT hash FROM indexed_data WHERE keep < ?1 ORDER BY keep ASC, time_value ASC",
        ) {
            Ok(s) => s,
            Err(e) => {
                let err = CatalogError::from_rusqlite(&e);
                return if err.is_no_table() { Ok(Vec::new()) } else { Err(err) };
            }
        };
        let rows = stmt
            .query_map(rusqlite::params![Keep::PreserveRecord.priority()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| CatalogError::from_rusqlite(&e))?;

        let mut hashes = Vec::new();
        for row in rows {
            hashes.push(row.map_err(|e| CatalogError::from_rusqlite(&e))?);
        }
        Ok(hashes)
    }

    /// All rows, ordered by `device` ascending then `time_value` ascending.
    pub fn select_all(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let conn = self.connect()?;
        let mut stmt = match conn.prepare(
            "SELECT time_value, device, hash, size, keep FROM indexed_data ORDER BY device ASC, time_value ASC",
        ) {
            Ok(s) => s,
            Err(e) => {
                let err = CatalogError::from_rusqlite(&e);
                return if err.is_no_table() { Ok(Vec::new()) } else { Err(err) };
            }
        };
        let rows = stmt
            .query_map([], |row| {
                let time_value: i64 = row.get(0)?;
                let size: i64 = row.get(3)?;
                let keep_priority: u32 = row.get(4)?;
                Ok(CatalogRecord {
                    time_value: time_value as u64,
                    device: row.get(1)?,
                    hash: row.get(2)?,
                    size: size as u64,
                    keep: Keep::from_priority(keep_priority).unwrap_or(Keep::AttemptKeep),
                })
            })
            .map_err(|e| CatalogError::from_rusqlite(&e))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| CatalogError::from_rusqlite(&e))?);
        }
        Ok(records)
    }

    /// Updates the row for `(time_value, device)`. Returns `true` iff a row
    /// matching the key existed.
    pub fn set_keep(
        &self,
        time_value: TimeValue,
        device: Device,
        keep: Keep,
    ) -> Result<bool, CatalogError> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                "UPDATE indexed_data SET keep = ?1 WHERE time_value = ?2 AND device = ?3",
                rusqlite::params![keep.priority(), time_value as i64, device],
            )
            .map_err(|e| CatalogError::from_rusqlite(&e))
            .or_else(|e| if e.is_no_table() { Ok(0) } else { Err(e) })?;
        Ok(affected > 0)
    }

    /// `true` on an empty `time_values` set (vacuous success). Otherwise
    /// updates all matching rows atomically and returns `true` iff at least
    /// one row existed with `device` among `time_values`.
    pub fn bulk_set_keep(
        &self,
        time_values: &[TimeValue],
        device: Device,
        keep: Keep,
    ) -> Result<bool, CatalogError> {
        if time_values.is_empty() {
            return Ok(true);
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(|e| CatalogError::from_rusqlite(&e))?;
        Self::ensure_table(&tx).or_else(|e| if e.is_no_table() { Ok(()) } else { Err(e) })?;

        let mut total_affected = 0usize;
        for time_value in time_values {
            let affected = tx
                .execute(
                    "UPDATE indexed_data SET keep = ?1 WHERE time_value = ?2 AND device = ?3",
                    rusqlite::params![keep.priority(), *time_value as i64, device],
                )
                .map_err(|e| CatalogError::from_rusqlite(&e))?;
            total_affected += affected;
        }
        tx.commit().map_err(|e| CatalogError::from_rusqlite(&e))?;
        Ok(total_affected > 0)
    }
}
