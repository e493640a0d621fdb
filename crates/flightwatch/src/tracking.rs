//! Longitudinal per-key tracking.
//!
//! Each key seen during a run gets a [`TrackingRecord`] holding when it was
//! first observed, when it disappeared, and how many ticks it was present
//! for. What happens when a key comes back after disappearing is governed by
//! [`ReentryPolicy`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::snapshot::Snapshot;

/// What to do when a key reappears after being marked absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Reuse the key's last record: clear its exit, keep its entry, and keep
    /// counting updates across the gap.
    #[default]
    Resume,
    /// Open a fresh record with a new entry time and one update, keeping the
    /// earlier record as history.
    Reopen,
}

impl fmt::Display for ReentryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Reopen => write!(f, "reopen"),
        }
    }
}

/// Bookkeeping for one stretch of a key's presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// The tracked key.
    pub key: String,
    /// When the key was first observed.
    pub entry: DateTime<Utc>,
    /// When the key was observed absent; `None` while present.
    pub exit: Option<DateTime<Utc>>,
    /// Number of ticks the key was observed present.
    pub updates: u64,
}

impl TrackingRecord {
    fn open(key: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            entry: now,
            exit: None,
            updates: 1,
        }
    }

    /// Check whether the key is currently present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.exit.is_none()
    }
}

/// Counts of what one call to [`TrackingState::track`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackOutcome {
    /// Records opened for keys never seen before (or reopened).
    pub opened: usize,
    /// Present keys whose update count was bumped.
    pub updated: usize,
    /// Absent keys brought back under [`ReentryPolicy::Resume`].
    pub resumed: usize,
    /// Keys that disappeared this tick.
    pub closed: usize,
}

/// Tracking records for every key seen in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingState {
    policy: ReentryPolicy,
    // Per key, oldest record first. Never holds an empty Vec.
    records: BTreeMap<String, Vec<TrackingRecord>>,
}

impl TrackingState {
    /// Create empty tracking state.
    #[must_use]
    pub fn new(policy: ReentryPolicy) -> Self {
        Self {
            policy,
            records: BTreeMap::new(),
        }
    }

    /// The re-entry policy in effect.
    #[must_use]
    pub fn policy(&self) -> ReentryPolicy {
        self.policy
    }

    /// Fold one tick's snapshot into the state.
    ///
    /// Present keys with an open record get one more update; unseen keys get
    /// a new record stamped `now`; keys that were present but are missing
    /// from `current` get `exit = now`.
    pub fn track(&mut self, current: &Snapshot, now: DateTime<Utc>) -> TrackOutcome {
        let mut outcome = TrackOutcome::default();

        for key in current.keys() {
            let Some(history) = self.records.get_mut(key) else {
                self.records
                    .insert(key.to_string(), vec![TrackingRecord::open(key, now)]);
                outcome.opened += 1;
                continue;
            };

            let reopen = match history.last_mut() {
                Some(latest) if latest.is_present() => {
                    latest.updates += 1;
                    outcome.updated += 1;
                    false
                }
                Some(latest) if self.policy == ReentryPolicy::Resume => {
                    trace!(key, entry = %latest.entry, "resuming tracking record");
                    latest.exit = None;
                    latest.updates += 1;
                    outcome.resumed += 1;
                    false
                }
                _ => true,
            };
            if reopen {
                trace!(key, "opening new tracking record");
                history.push(TrackingRecord::open(key, now));
                outcome.opened += 1;
            }
        }

        let present: HashSet<&str> = current.keys().collect();
        for (key, history) in &mut self.records {
            if present.contains(key.as_str()) {
                continue;
            }
            if let Some(latest) = history.last_mut() {
                if latest.is_present() {
                    latest.exit = Some(now);
                    outcome.closed += 1;
                }
            }
        }

        outcome
    }

    /// The most recent record for `key`.
    #[must_use]
    pub fn latest(&self, key: &str) -> Option<&TrackingRecord> {
        self.records.get(key).and_then(|history| history.last())
    }

    /// Every record for `key`, oldest first.
    #[must_use]
    pub fn history(&self, key: &str) -> &[TrackingRecord] {
        self.records.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// All records, ordered by key and then age.
    pub fn records(&self) -> impl Iterator<Item = &TrackingRecord> {
        self.records.values().flatten()
    }

    /// Every key with its records, ordered by key.
    pub fn histories(&self) -> impl Iterator<Item = (&str, &[TrackingRecord])> {
        self.records
            .iter()
            .map(|(key, history)| (key.as_str(), history.as_slice()))
    }

    /// The most recent record of every key, ordered by key.
    pub fn latest_records(&self) -> impl Iterator<Item = &TrackingRecord> {
        self.records.values().filter_map(|history| history.last())
    }

    /// Number of distinct keys ever tracked.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.records.len()
    }

    /// Number of keys currently present.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.latest_records().filter(|r| r.is_present()).count()
    }

    /// Check whether nothing has been tracked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Functional form of [`TrackingState::track`].
#[must_use]
pub fn track(mut state: TrackingState, current: &Snapshot, now: DateTime<Utc>) -> TrackingState {
    state.track(current, now);
    state
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::snapshot::Record;

    fn snapshot(keys: &[&str]) -> Snapshot {
        keys.iter().map(|k| Record::new(*k)).collect()
    }

    fn t(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(5 * n)
    }

    #[test]
    fn test_reentry_policy_default_and_display() {
        assert_eq!(ReentryPolicy::default(), ReentryPolicy::Resume);
        assert_eq!(ReentryPolicy::Resume.to_string(), "resume");
        assert_eq!(ReentryPolicy::Reopen.to_string(), "reopen");
    }

    #[test]
    fn test_first_appearance_opens_record() {
        let mut state = TrackingState::default();
        let outcome = state.track(&snapshot(&["Alpha"]), t(1));

        assert_eq!(outcome.opened, 1);
        let record = state.latest("Alpha").unwrap();
        assert_eq!(record.entry, t(1));
        assert_eq!(record.exit, None);
        assert_eq!(record.updates, 1);
    }

    #[test]
    fn test_consecutive_ticks_accumulate_updates() {
        let mut state = TrackingState::default();
        for n in 1..=7 {
            state.track(&snapshot(&["Alpha"]), t(n));
        }
        let record = state.latest("Alpha").unwrap();
        assert_eq!(record.updates, 7);
        assert_eq!(record.entry, t(1));
        assert!(record.is_present());
    }

    #[test]
    fn test_present_present_absent_scenario() {
        let mut state = TrackingState::default();
        state.track(&snapshot(&["A"]), t(1));
        state.track(&snapshot(&["A"]), t(2));
        let outcome = state.track(&snapshot(&[]), t(3));

        assert_eq!(outcome.closed, 1);
        let record = state.latest("A").unwrap();
        assert_eq!(record.entry, t(1));
        assert_eq!(record.exit, Some(t(3)));
        assert_eq!(record.updates, 2);
    }

    #[test]
    fn test_exit_only_set_once() {
        let mut state = TrackingState::default();
        state.track(&snapshot(&["A"]), t(1));
        state.track(&snapshot(&[]), t(2));
        let outcome = state.track(&snapshot(&[]), t(3));

        assert_eq!(outcome.closed, 0);
        assert_eq!(state.latest("A").unwrap().exit, Some(t(2)));
    }

    #[test]
    fn test_appear_then_vanish_next_tick() {
        let mut state = TrackingState::default();
        state.track(&snapshot(&["Golf"]), t(1));
        state.track(&snapshot(&["Hotel"]), t(2));

        let golf = state.latest("Golf").unwrap();
        assert_eq!(golf.entry, t(1));
        assert_eq!(golf.exit, Some(t(2)));
        assert_eq!(golf.updates, 1);
        assert_eq!(state.present_count(), 1);
    }

    #[test]
    fn test_resume_does_not_reset_updates() {
        let mut state = TrackingState::new(ReentryPolicy::Resume);
        state.track(&snapshot(&["A"]), t(1));
        state.track(&snapshot(&["A"]), t(2));
        state.track(&snapshot(&[]), t(3));
        let outcome = state.track(&snapshot(&["A"]), t(4));

        assert_eq!(outcome.resumed, 1);
        assert_eq!(state.history("A").len(), 1);
        let record = state.latest("A").unwrap();
        assert_eq!(record.entry, t(1));
        assert_eq!(record.exit, None);
        assert_eq!(record.updates, 3);
    }

    #[test]
    fn test_reopen_starts_fresh_record() {
        let mut state = TrackingState::new(ReentryPolicy::Reopen);
        state.track(&snapshot(&["A"]), t(1));
        state.track(&snapshot(&["A"]), t(2));
        state.track(&snapshot(&[]), t(3));
        let outcome = state.track(&snapshot(&["A"]), t(4));

        assert_eq!(outcome.opened, 1);
        let history = state.history("A");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].exit, Some(t(3)));
        assert_eq!(history[0].updates, 2);
        assert_eq!(history[1].entry, t(4));
        assert_eq!(history[1].exit, None);
        assert_eq!(history[1].updates, 1);
    }

    #[test]
    fn test_records_ordering_and_counts() {
        let mut state = TrackingState::new(ReentryPolicy::Reopen);
        state.track(&snapshot(&["Charlie", "Alpha"]), t(1));
        state.track(&snapshot(&["Bravo"]), t(2));
        state.track(&snapshot(&["Alpha", "Bravo"]), t(3));

        let keys: Vec<&str> = state.records().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "Alpha", "Bravo", "Charlie"]);
        assert_eq!(state.key_count(), 3);
        assert_eq!(state.present_count(), 2);
        assert_eq!(state.latest_records().count(), 3);
    }

    #[test]
    fn test_unknown_key() {
        let state = TrackingState::default();
        assert!(state.is_empty());
        assert!(state.latest("nobody").is_none());
        assert!(state.history("nobody").is_empty());
    }

    #[test]
    fn test_functional_track() {
        let state = track(TrackingState::default(), &snapshot(&["A", "B"]), t(1));
        let state = track(state, &snapshot(&["B"]), t(2));
        assert_eq!(state.latest("A").unwrap().exit, Some(t(2)));
        assert_eq!(state.latest("B").unwrap().updates, 2);
    }
}
