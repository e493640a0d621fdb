//! Tick journal.
//!
//! `SQLite`-backed history of `watch` runs: one row per run, one row per
//! successful tick, and the run's tracking table as of its latest tick. The
//! journal is write-only from the watch loop's point of view; the `history`
//! and `tracking` commands read it back.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::diff::DiffSummary;
use crate::error::{Error, Result};
use crate::source::SourceKind;
use crate::tracking::{TrackingRecord, TrackingState};
use crate::watcher::TickReport;

const MEMORY_PATH: &str = ":memory:";

/// One recorded `watch` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunEntry {
    /// Row id.
    pub id: i64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Source kind the run polled.
    pub source: String,
}

/// One recorded tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickEntry {
    /// The run this tick belongs to.
    pub run_id: i64,
    /// One-based tick number within the run.
    pub tick: u64,
    /// When the snapshot was observed.
    pub observed_at: DateTime<Utc>,
    /// Snapshot digest.
    pub digest: String,
    /// Per-status counts.
    pub summary: DiffSummary,
    /// Whether the snapshot matched the previous tick's.
    pub unchanged: bool,
}

/// Journal-wide counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    /// Number of runs.
    pub total_runs: i64,
    /// Number of ticks across all runs.
    pub total_ticks: i64,
    /// Oldest tick still in the journal.
    pub oldest_tick: Option<DateTime<Utc>>,
    /// Newest tick.
    pub newest_tick: Option<DateTime<Utc>>,
    /// Size of the database file in bytes (0 in memory).
    pub db_size_bytes: u64,
}

/// The tick journal.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    conn: Connection,
}

impl Journal {
    /// Open or create a journal at `path`, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created or the
    /// schema cannot be initialized.
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

        debug!(path = %path.display(), "opening journal");
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!(path = %path.display(), "journal opened");
        Ok(Self { path, conn })
    }

    /// Create an in-memory journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(MEMORY_PATH),
            conn,
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the start of a run and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn start_run(&self, source: SourceKind, started_at: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, source) VALUES (?1, ?2)",
            params![format_time(started_at), source.to_string()],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(run_id = id, %source, "run started");
        Ok(id)
    }

    /// Record one tick and replace the run's tracking rows with `tracking`,
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written
    /// in that case.
    pub fn record_tick(
        &mut self,
        run_id: i64,
        report: &TickReport,
        tracking: &TrackingState,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r"
            INSERT INTO ticks
                (run_id, tick, observed_at, digest, additions, removals, existing, unchanged)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                run_id,
                to_sql_int(report.tick),
                format_time(report.observed_at),
                report.digest,
                to_sql_int(report.summary.additions),
                to_sql_int(report.summary.removals),
                to_sql_int(report.summary.existing),
                report.unchanged,
            ],
        )?;

        tx.execute("DELETE FROM tracking WHERE run_id = ?1", [run_id])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO tracking (run_id, key, seq, entry, exit, updates)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            for (key, history) in tracking.histories() {
                for (seq, record) in history.iter().enumerate() {
                    stmt.execute(params![
                        run_id,
                        key,
                        to_sql_int(seq),
                        format_time(record.entry),
                        record.exit.map(format_time),
                        to_sql_int(record.updates),
                    ])?;
                }
            }
        }

        tx.commit()?;
        debug!(run_id, tick = report.tick, "tick journaled");
        Ok(())
    }

    /// The most recent ticks across all runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_ticks(&self, limit: usize) -> Result<Vec<TickEntry>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT run_id, tick, observed_at, digest, additions, removals, existing, unchanged
            FROM ticks ORDER BY id DESC LIMIT ?1
            ",
        )?;

        let ticks = stmt
            .query_map([to_sql_int(limit)], Self::row_to_tick)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ticks)
    }

    /// The most recently started run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_run(&self) -> Result<Option<RunEntry>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, source FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunEntry {
                        id: row.get(0)?,
                        started_at: parse_time(1, &row.get::<_, String>(1)?)?,
                        source: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// The tracking table stored for `run_id`, ordered by key and then age.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tracking_for_run(&self, run_id: i64) -> Result<Vec<TrackingRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT key, entry, exit, updates
            FROM tracking WHERE run_id = ?1 ORDER BY key, seq
            ",
        )?;

        let records = stmt
            .query_map([run_id], |row| {
                let exit: Option<String> = row.get(2)?;
                Ok(TrackingRecord {
                    key: row.get(0)?,
                    entry: parse_time(1, &row.get::<_, String>(1)?)?,
                    exit: exit.map(|s| parse_time(2, &s)).transpose()?,
                    updates: from_sql_int(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// The latest run and its tracking table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_tracking(&self) -> Result<Option<(RunEntry, Vec<TrackingRecord>)>> {
        match self.latest_run()? {
            Some(run) => {
                let records = self.tracking_for_run(run.id)?;
                Ok(Some((run, records)))
            }
            None => Ok(None),
        }
    }

    /// Count ticks across all runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tick_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete all but the `keep_count` most recent ticks, then every run
    /// left without ticks along with its tracking rows. The newest run is
    /// kept even before its first tick. Returns the number of ticks deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_keep_recent(&mut self, keep_count: usize) -> Result<usize> {
        const EMPTY_RUNS: &str = r"
            SELECT id FROM runs
            WHERE id NOT IN (SELECT DISTINCT run_id FROM ticks)
              AND id < (SELECT MAX(id) FROM runs)
        ";

        let tx = self.conn.transaction()?;
        let affected = tx.execute(
            r"
            DELETE FROM ticks WHERE id NOT IN (
                SELECT id FROM ticks ORDER BY id DESC LIMIT ?1
            )
            ",
            [to_sql_int(keep_count)],
        )?;
        tx.execute(
            &format!("DELETE FROM tracking WHERE run_id IN ({EMPTY_RUNS})"),
            [],
        )?;
        let runs = tx.execute(&format!("DELETE FROM runs WHERE id IN ({EMPTY_RUNS})"), [])?;
        tx.commit()?;

        if affected > 0 {
            info!(pruned = affected, runs, keep = keep_count, "pruned journal ticks");
        }
        Ok(affected)
    }

    /// Journal statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<JournalStats> {
        let total_runs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        let total_ticks = self.tick_count()?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(observed_at), MAX(observed_at) FROM ticks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(JournalStats {
            total_runs,
            total_ticks,
            oldest_tick: oldest.and_then(|s| parse_time(0, &s).ok()),
            newest_tick: newest.and_then(|s| parse_time(0, &s).ok()),
            db_size_bytes,
        })
    }

    fn row_to_tick(row: &rusqlite::Row) -> rusqlite::Result<TickEntry> {
        let observed_at: String = row.get(2)?;
        Ok(TickEntry {
            run_id: row.get(0)?,
            tick: from_sql_int(row.get(1)?),
            observed_at: parse_time(2, &observed_at)?,
            digest: row.get(3)?,
            summary: DiffSummary {
                additions: from_sql_int(row.get(4)?),
                removals: from_sql_int(row.get(5)?),
                existing: from_sql_int(row.get(6)?),
            },
            unchanged: row.get(7)?,
        })
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

fn to_sql_int<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn from_sql_int<T: TryFrom<i64> + Default>(value: i64) -> T {
    T::try_from(value).unwrap_or_default()
}
