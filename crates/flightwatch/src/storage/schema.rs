//! `SQLite` schema for the tick journal.

/// One row per `watch` invocation.
pub const CREATE_RUNS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    source TEXT NOT NULL
)
";

/// One row per successful tick.
pub const CREATE_TICKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    tick INTEGER NOT NULL,
    observed_at TEXT NOT NULL,
    digest TEXT NOT NULL,
    additions INTEGER NOT NULL,
    removals INTEGER NOT NULL,
    existing INTEGER NOT NULL,
    unchanged INTEGER NOT NULL,
    UNIQUE (run_id, tick)
)
";

/// The tracking table as of a run's latest tick. `seq` orders the records of
/// one key when a key was reopened.
pub const CREATE_TRACKING_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tracking (
    run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    entry TEXT NOT NULL,
    exit TEXT,
    updates INTEGER NOT NULL,
    PRIMARY KEY (run_id, key, seq)
)
";

/// Ticks are listed newest first.
pub const CREATE_TICKS_OBSERVED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_ticks_observed ON ticks(observed_at DESC)
";

/// Key-value store for journal metadata such as the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RUNS_TABLE,
    CREATE_TICKS_TABLE,
    CREATE_TRACKING_TABLE,
    CREATE_TICKS_OBSERVED_INDEX,
    CREATE_METADATA_TABLE,
];
