// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch journal — append-only SQLite log of every sync command attempt.
//
// Schema:
//   dispatch_log(
//     id         INTEGER PRIMARY KEY AUTOINCREMENT,
//     wave       TEXT    NOT NULL,   -- wave UUID
//     timestamp  TEXT    NOT NULL,   -- RFC 3339
//     master_id  INTEGER NOT NULL,
//     slave_id   INTEGER NOT NULL,
//     command    TEXT    NOT NULL,   -- wire form, e.g. "^NM LOT42"
//     success    INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     detail     TEXT                -- response or error text
//   )
//
// Sync itself never reads this back; it exists so an operator can see which
// slave missed which command.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::{DispatchRecord, PrinterId};

/// File name of the journal database inside the data directory.
pub const JOURNAL_FILE: &str = "journal.db";

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS dispatch_log (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    wave       TEXT    NOT NULL,
    timestamp  TEXT    NOT NULL,
    master_id  INTEGER NOT NULL,
    slave_id   INTEGER NOT NULL,
    command    TEXT    NOT NULL,
    success    INTEGER NOT NULL,
    detail     TEXT
);
CREATE INDEX IF NOT EXISTS dispatch_log_master ON dispatch_log (master_id);";

const SELECT_COLUMNS: &str =
    "SELECT id, wave, timestamp, master_id, slave_id, command, success, detail FROM dispatch_log";

fn db_err(e: rusqlite::Error) -> InkwerkError {
    InkwerkError::Database(e.to_string())
}

/// One journal row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub wave: String,
    pub timestamp: String,
    pub master_id: PrinterId,
    pub slave_id: PrinterId,
    pub command: String,
    pub success: bool,
    pub detail: Option<String>,
}

impl JournalEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            wave: row.get(1)?,
            timestamp: row.get(2)?,
            master_id: PrinterId(row.get(3)?),
            slave_id: PrinterId(row.get(4)?),
            command: row.get(5)?,
            success: row.get::<_, i32>(6)? != 0,
            detail: row.get(7)?,
        })
    }
}

/// Append-only dispatch log backed by SQLite.
pub struct DispatchJournal {
    conn: Connection,
}

impl DispatchJournal {
    /// Open (or create) the journal at `path`, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        debug!("dispatch journal opened");
        Ok(Self { conn })
    }

    /// Open an in-memory journal (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        debug!("in-memory dispatch journal opened");
        Ok(Self { conn })
    }

    pub fn record(&self, record: &DispatchRecord) -> Result<()> {
        let success_int: i32 = if record.success { 1 } else { 0 };
        self.conn
            .execute(
                "INSERT INTO dispatch_log (wave, timestamp, master_id, slave_id, command, success, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.wave.to_string(),
                    record.at.to_rfc3339(),
                    record.master_id.0,
                    record.slave_id.0,
                    record.command,
                    success_int,
                    record.detail,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )
    }

    /// Entries dispatched on behalf of `master_id`, oldest first.
    pub fn for_master(&self, master_id: PrinterId) -> Result<Vec<JournalEntry>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE master_id = ?1 ORDER BY id ASC"),
            params![master_id.0],
        )
    }

    /// Failed attempts against `slave_id`, oldest first.
    pub fn failures_for(&self, slave_id: PrinterId) -> Result<Vec<JournalEntry>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE slave_id = ?1 AND success = 0 ORDER BY id ASC"),
            params![slave_id.0],
        )
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM dispatch_log", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params, JournalEntry::from_row)
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }
}

/// Copy dispatch records into the journal until the sender side closes.
///
/// Records the receiver fell behind on are counted and skipped.
pub fn spawn_recorder(
    journal: Arc<Mutex<DispatchJournal>>,
    mut records: broadcast::Receiver<DispatchRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match records.recv().await {
                Ok(record) => {
                    let guard = journal.lock().unwrap_or_else(|e| e.into_inner());
                    if let Err(e) = guard.record(&record) {
                        error!(error = %e, "failed to journal dispatch record");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "dispatch journal fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("dispatch recorder stopped");
    })
}
