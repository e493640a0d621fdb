//! Snapshot differencing.
//!
//! Compares the previous tick's snapshot against the current one by key and
//! labels every key in the union as [`Status::Existing`],
//! [`Status::Addition`] or [`Status::Removal`]. Attribute changes on a key
//! that is present in both snapshots are not reported.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{Record, Snapshot};

/// Classification of a record relative to the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Present in both snapshots (or in the first snapshot of a run).
    Existing,
    /// Present only in the current snapshot.
    Addition,
    /// Present only in the previous snapshot.
    Removal,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Addition => write!(f, "addition"),
            Self::Removal => write!(f, "removal"),
        }
    }
}

/// A record together with its status label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    /// How the record relates to the previous snapshot.
    pub status: Status,
    /// The record itself. Removals carry the previous snapshot's attributes.
    pub record: Record,
}

impl LabeledRecord {
    /// Key of the underlying record.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.record.key
    }
}

/// Per-status counts for one diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Records labeled `existing`.
    pub existing: usize,
    /// Records labeled `addition`.
    pub additions: usize,
    /// Records labeled `removal`.
    pub removals: usize,
}

impl DiffSummary {
    /// Count the labels in a diff result.
    #[must_use]
    pub fn from_labeled(rows: &[LabeledRecord]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, row| {
            match row.status {
                Status::Existing => summary.existing += 1,
                Status::Addition => summary.additions += 1,
                Status::Removal => summary.removals += 1,
            }
            summary
        })
    }

    /// Check whether any key was added or removed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.additions > 0 || self.removals > 0
    }

    /// Total number of labeled rows.
    #[must_use]
    pub fn total(&self) -> usize {
        self.existing + self.additions + self.removals
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} existing, {} added, {} removed",
            self.existing, self.additions, self.removals
        )
    }
}

/// Label the union of `previous` and `current` by key.
///
/// Current records are `existing` when their key is also in `previous`,
/// otherwise `addition`; previous records whose key is gone from `current`
/// are `removal`. An empty `previous` marks the first tick of a run, and every
/// current record is then labeled `existing` rather than `addition`.
///
/// The result is sorted by key; rows with equal keys keep their relative
/// order. Both snapshots are expected to have passed
/// [`Snapshot::validate`].
#[must_use]
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<LabeledRecord> {
    let mut rows: Vec<LabeledRecord> = Vec::with_capacity(previous.len() + current.len());

    if previous.is_empty() {
        rows.extend(current.records().iter().map(|record| LabeledRecord {
            status: Status::Existing,
            record: record.clone(),
        }));
    } else {
        let previous_keys: HashSet<&str> = previous.keys().collect();
        let current_keys: HashSet<&str> = current.keys().collect();

        rows.extend(current.records().iter().map(|record| {
            let status = if previous_keys.contains(record.key.as_str()) {
                Status::Existing
            } else {
                Status::Addition
            };
            LabeledRecord {
                status,
                record: record.clone(),
            }
        }));

        rows.extend(
            previous
                .records()
                .iter()
                .filter(|record| !current_keys.contains(record.key.as_str()))
                .map(|record| LabeledRecord {
                    status: Status::Removal,
                    record: record.clone(),
                }),
        );
    }

    rows.sort_by(|a, b| a.record.key.cmp(&b.record.key));
    rows
}
