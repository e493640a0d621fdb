//! Per-run watch state.
//!
//! A [`Watcher`] owns everything that must survive from one tick to the
//! next: the previous snapshot and the tracking state. It never sleeps and
//! never loops; whoever owns it decides when the next tick happens and calls
//! [`Watcher::tick`] once per tick. [`drive`] is the timer-driven owner used
//! by the `watch` command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::diff::{diff, DiffSummary, LabeledRecord};
use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::source::SnapshotSource;
use crate::tracking::{ReentryPolicy, TrackOutcome, TrackingState};

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// One-based tick number within the run.
    pub tick: u64,
    /// When the snapshot was observed.
    pub observed_at: DateTime<Utc>,
    /// The labeled union of the previous and current snapshots, sorted by key.
    pub rows: Vec<LabeledRecord>,
    /// Per-status counts of `rows`.
    pub summary: DiffSummary,
    /// What tracking changed.
    pub tracked: TrackOutcome,
    /// Digest of the current snapshot.
    pub digest: String,
    /// Whether the current snapshot is identical to the previous one.
    pub unchanged: bool,
}

/// Diff and tracking state for one run.
#[derive(Debug, Clone, Default)]
pub struct Watcher {
    previous: Snapshot,
    previous_digest: Option<String>,
    tracking: TrackingState,
    ticks: u64,
}

impl Watcher {
    /// Create a watcher with empty state.
    #[must_use]
    pub fn new(policy: ReentryPolicy) -> Self {
        Self {
            tracking: TrackingState::new(policy),
            ..Self::default()
        }
    }

    /// Run one diff/track cycle against `current`.
    ///
    /// The snapshot is validated first. On success `current` becomes the
    /// previous snapshot for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if `current` has a missing or
    /// duplicate key. The watcher's state is left untouched in that case.
    pub fn tick(&mut self, current: Snapshot, now: DateTime<Utc>) -> Result<TickReport> {
        current.validate()?;

        let rows = diff(&self.previous, &current);
        let summary = DiffSummary::from_labeled(&rows);
        let tracked = self.tracking.track(&current, now);
        let digest = current.digest();
        let unchanged = self.previous_digest.as_deref() == Some(digest.as_str());

        self.ticks += 1;
        debug!(
            tick = self.ticks,
            records = current.len(),
            %summary,
            unchanged,
            "tick complete"
        );

        self.previous = current;
        self.previous_digest = Some(digest.clone());

        Ok(TickReport {
            tick: self.ticks,
            observed_at: now,
            rows,
            summary,
            tracked,
            digest,
            unchanged,
        })
    }

    /// The snapshot the next tick will be diffed against.
    #[must_use]
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Tracking state accumulated so far.
    #[must_use]
    pub fn tracking(&self) -> &TrackingState {
        &self.tracking
    }

    /// Number of successful ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// A cloneable stop signal for whatever drives a [`Watcher`].
#[derive(Debug, Clone, Default)]
pub struct WatchHandle {
    stop_signal: Arc<AtomicBool>,
}

impl WatchHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the driver to stop after the current tick.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// How often [`drive`] checks the stop signal while waiting for a tick.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Timing for [`drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    /// Time between polls. The first poll happens immediately.
    pub interval: Duration,
    /// Stop after this many polls, successful or skipped.
    pub max_polls: Option<u64>,
}

/// What a [`drive`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Polls that produced a tick.
    pub ticks: u64,
    /// Polls skipped because the source failed or the snapshot was invalid.
    pub skipped: u64,
}

impl LoopSummary {
    /// Total polls attempted.
    #[must_use]
    pub fn polls(&self) -> u64 {
        self.ticks + self.skipped
    }
}

/// Poll `source` on a timer and feed each snapshot to `watcher`.
///
/// Every successful tick is handed to `on_tick` together with the watcher's
/// updated state. A fetch failure or an invalid snapshot is logged and the
/// poll is skipped; the watcher is not touched. The loop ends when `handle`
/// is stopped or after `options.max_polls` polls.
///
/// # Errors
///
/// Returns the first error produced by `on_tick`.
pub async fn drive<F>(
    source: &mut dyn SnapshotSource,
    watcher: &mut Watcher,
    options: LoopOptions,
    handle: &WatchHandle,
    mut on_tick: F,
) -> Result<LoopSummary>
where
    F: FnMut(&TickReport, &Watcher) -> Result<()>,
{
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = LoopSummary::default();

    info!(
        source = source.name(),
        interval_ms = u64::try_from(options.interval.as_millis()).unwrap_or(u64::MAX),
        "watch loop started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = wait_for_stop(handle) => {}
        }
        if handle.should_stop() {
            break;
        }

        let outcome = source
            .fetch()
            .and_then(|snapshot| watcher.tick(snapshot, Utc::now()));
        match outcome {
            Ok(report) => {
                summary.ticks += 1;
                on_tick(&report, watcher)?;
            }
            Err(err) => {
                summary.skipped += 1;
                warn!(source = source.name(), error = %err, "skipping tick");
            }
        }

        if options.max_polls.is_some_and(|max| summary.polls() >= max) {
            break;
        }
    }

    info!(
        ticks = summary.ticks,
        skipped = summary.skipped,
        "watch loop stopped"
    );
    Ok(summary)
}

async fn wait_for_stop(handle: &WatchHandle) {
    while !handle.should_stop() {
        tokio::time::sleep(STOP_POLL).await;
    }
}
