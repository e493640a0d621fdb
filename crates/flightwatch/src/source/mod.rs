//! Snapshot sources.
//!
//! A source produces one [`Snapshot`] per tick. Two are provided:
//!
//! - [`CsvSource`]: re-reads a CSV table from disk on every fetch.
//! - [`SyntheticSource`]: a random plane-movement generator that evolves its
//!   previous output a little on every fetch.

mod csv_file;
mod synthetic;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::snapshot::Snapshot;

pub use csv_file::{read_snapshot, snapshot_from_reader, write_snapshot, CsvSource};
pub use synthetic::{SyntheticSource, PLANE_TITLES, PLANE_TYPES};

/// The kinds of snapshot source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A CSV file on disk.
    #[default]
    Csv,
    /// The in-memory plane-movement generator.
    Synthetic,
}

impl SourceKind {
    /// Tick interval used when none is configured.
    #[must_use]
    pub fn default_interval_secs(self) -> u64 {
        match self {
            Self::Csv => 10,
            Self::Synthetic => 5,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Something that can be polled for the current snapshot.
pub trait SnapshotSource: Send {
    /// The name of this source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// The kind of this source.
    fn kind(&self) -> SourceKind;

    /// Produce the snapshot for the current tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying data cannot be read.
    fn fetch(&mut self) -> Result<Snapshot>;
}

/// Build the source selected by `config`.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn SnapshotSource> {
    match config.source.kind {
        SourceKind::Csv => Box::new(CsvSource::new(
            config.source.csv_path.clone(),
            config.source.key_column.clone(),
        )),
        SourceKind::Synthetic => Box::new(SyntheticSource::from_config(&config.synthetic)),
    }
}
