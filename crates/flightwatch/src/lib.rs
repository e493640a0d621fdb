//! `flightwatch` - snapshot differencing for flight-schedule dashboards
//!
//! Each tick, a source produces a [`Snapshot`]: a set of records keyed by a
//! designated column. [`diff`] labels every key in the previous and current
//! snapshots as existing, added or removed, and [`TrackingState`] keeps a
//! per-key record of when each flight entered and left the board. A
//! [`Watcher`] carries that state from one tick to the next.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod render;
pub mod snapshot;
pub mod source;
pub mod storage;
pub mod tracking;
pub mod watcher;

pub use config::Config;
pub use diff::{diff, DiffSummary, LabeledRecord, Status};
pub use error::{Error, Result, ValidationError};
pub use logging::init_logging;
pub use snapshot::{Record, Snapshot, Value};
pub use source::{CsvSource, SnapshotSource, SourceKind, SyntheticSource};
pub use storage::{Journal, JournalStats};
pub use tracking::{track, ReentryPolicy, TrackingRecord, TrackingState};
pub use watcher::{drive, LoopOptions, LoopSummary, TickReport, WatchHandle, Watcher};
