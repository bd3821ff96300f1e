//! Result log kept in a local SQLite database.
//!
//! The sheet only keeps the latest status of each row. The result log keeps the
//! story: one `runs` row per invocation and one `validation_log` row per
//! unprocessed response handled by the run, with the original submission timestamp so a response can be traced
//! back to its form entry. A deferred response is logged with an empty status
//! and the reason it was left unprocessed.

use common::jobs::RunSummary;
use common::model::response::FormResponse;
use common::model::status::ResponseStatus;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("result log error: {0}")]
pub struct HistoryError(#[from] rusqlite::Error);

/// One entry of the `validation_log` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub run_id: String,
    pub logged_at: String,
    pub row_index: usize,
    pub original_timestamp: String,
    pub username: String,
    pub status: ResponseStatus,
    pub message: String,
}

pub struct ResultLog {
    conn: Connection,
}

impl ResultLog {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                run_id      TEXT PRIMARY KEY,
                started_at  TEXT NOT NULL DEFAULT (datetime('now')),
                finished_at TEXT,
                examined    INTEGER,
                resolved    INTEGER,
                deferred    INTEGER,
                dry_run     INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS validation_log (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id             TEXT NOT NULL REFERENCES runs(run_id),
                logged_at          TEXT NOT NULL DEFAULT (datetime('now')),
                row_index          INTEGER NOT NULL,
                original_timestamp TEXT NOT NULL,
                username           TEXT NOT NULL,
                status             TEXT NOT NULL,
                message            TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    pub fn start_run(&self, run_id: &str, dry_run: bool) -> Result<(), HistoryError> {
        self.conn.execute(
            "INSERT INTO runs (run_id, dry_run) VALUES (?1, ?2)",
            params![run_id, dry_run],
        )?;
        Ok(())
    }

    pub fn record(
        &self,
        run_id: &str,
        response: &FormResponse,
        status: &ResponseStatus,
        message: &str,
    ) -> Result<(), HistoryError> {
        self.conn.execute(
            "INSERT INTO validation_log
                (run_id, row_index, original_timestamp, username, status, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                response.row_index as i64,
                response.timestamp,
                response.username,
                status.as_cell(),
                message
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, summary: &RunSummary) -> Result<(), HistoryError> {
        self.conn.execute(
            "UPDATE runs
                SET finished_at = datetime('now'), examined = ?1, resolved = ?2, deferred = ?3
              WHERE run_id = ?4",
            params![
                summary.examined as i64,
                summary.resolved_total() as i64,
                summary.deferred as i64,
                summary.run_id
            ],
        )?;
        Ok(())
    }

    pub fn entries_for_run(&self, run_id: &str) -> Result<Vec<LogEntry>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, logged_at, row_index, original_timestamp, username, status, message
               FROM validation_log
              WHERE run_id = ?1
              ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(LogEntry {
                    run_id: row.get(0)?,
                    logged_at: row.get(1)?,
                    row_index: row.get::<_, i64>(2)? as usize,
                    original_timestamp: row.get(3)?,
                    username: row.get(4)?,
                    status: ResponseStatus::from_cell(&row.get::<_, String>(5)?),
                    message: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// `(examined, resolved, deferred)` of a finished run, `None` while it is running.
    pub fn run_totals(&self, run_id: &str) -> Result<Option<(usize, usize, usize)>, HistoryError> {
        let totals = self.conn.query_row(
            "SELECT examined, resolved, deferred FROM runs WHERE run_id = ?1",
            params![run_id],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        );
        match totals {
            Ok((Some(examined), Some(resolved), Some(deferred))) => {
                Ok(Some((examined as usize, resolved as usize, deferred as usize)))
            }
            Ok(_) | Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::jobs::RowOutcome;

    #[test]
    fn records_are_listed_per_run_in_order() {
        let log = ResultLog::in_memory().unwrap();
        log.start_run("run-a", false).unwrap();
        log.start_run("run-b", true).unwrap();

        let alice = FormResponse::new(0, "alice", ResponseStatus::Unprocessed)
            .with_timestamp("1/2/2025 10:00:00");
        let bob = FormResponse::new(1, "bob", ResponseStatus::Unprocessed);
        log.record("run-a", &alice, &ResponseStatus::Valid, "invitation sent")
            .unwrap();
        log.record("run-b", &bob, &ResponseStatus::InvalidUsername, "")
            .unwrap();
        log.record("run-a", &bob, &ResponseStatus::NotRegistered, "notice sent")
            .unwrap();

        let entries = log.entries_for_run("run-a").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "alice");
        assert_eq!(entries[0].original_timestamp, "1/2/2025 10:00:00");
        assert_eq!(entries[0].status, ResponseStatus::Valid);
        assert_eq!(entries[0].message, "invitation sent");
        assert!(!entries[0].logged_at.is_empty());
        assert_eq!(entries[1].row_index, 1);
        assert_eq!(entries[1].status, ResponseStatus::NotRegistered);
    }

    #[test]
    fn finish_run_stores_totals() {
        let log = ResultLog::in_memory().unwrap();
        log.start_run("run-a", false).unwrap();
        assert_eq!(log.run_totals("run-a").unwrap(), None);

        let mut summary = RunSummary::new("run-a", false);
        summary.examined = 4;
        summary.record(&RowOutcome::Resolved(ResponseStatus::Valid));
        summary.record(&RowOutcome::Deferred("timeout".into()));
        log.finish_run(&summary).unwrap();

        assert_eq!(log.run_totals("run-a").unwrap(), Some((4, 1, 1)));
        assert_eq!(log.run_totals("missing").unwrap(), None);
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite");
        {
            let log = ResultLog::open(&path).unwrap();
            log.start_run("run-a", false).unwrap();
        }
        let reopened = ResultLog::open(&path).unwrap();
        assert!(reopened.entries_for_run("run-a").unwrap().is_empty());
        assert!(path.exists());
    }
}
