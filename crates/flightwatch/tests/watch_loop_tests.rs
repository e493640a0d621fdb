//! The timer-driven loop over the synthetic source.

use std::time::Duration;

use flightwatch::config::SyntheticConfig;
use flightwatch::source::PLANE_TITLES;
use flightwatch::{
    drive, DiffSummary, Journal, LoopOptions, SnapshotSource, SyntheticSource, WatchHandle,
    Watcher,
};

fn source(seed: u64) -> SyntheticSource {
    SyntheticSource::from_config(&SyntheticConfig {
        seed: Some(seed),
        change_rate: 0.3,
        initial_min: 3,
    })
}

fn options(max_polls: u64) -> LoopOptions {
    LoopOptions {
        interval: Duration::from_millis(5),
        max_polls: Some(max_polls),
    }
}

#[tokio::test]
async fn test_synthetic_loop_produces_consistent_ticks() {
    let mut source = source(21);
    let mut watcher = Watcher::default();
    let mut summaries: Vec<DiffSummary> = Vec::new();

    let result = drive(
        &mut source,
        &mut watcher,
        options(8),
        &WatchHandle::new(),
        |report, watcher| {
            summaries.push(report.summary);
            // The rows cover the union of previous and current keys.
            assert_eq!(
                report.summary.existing + report.summary.additions,
                watcher.previous().len()
            );
            assert!(watcher.tracking().present_count() <= PLANE_TITLES.len());
            Ok(())
        },
    )
    .await
    .unwrap();

    assert_eq!(result.ticks, 8);
    assert_eq!(result.skipped, 0);
    assert_eq!(summaries[0].additions + summaries[0].removals, 0);
    assert!(summaries[1..].iter().any(DiffSummary::has_changes));
}

#[tokio::test]
async fn test_loop_journals_every_tick() {
    let mut source = source(4);
    let mut watcher = Watcher::default();
    let mut journal = Journal::open_in_memory().unwrap();
    let run_id = journal
        .start_run(source.kind(), chrono::Utc::now())
        .unwrap();

    drive(
        &mut source,
        &mut watcher,
        options(5),
        &WatchHandle::new(),
        |report, watcher| journal.record_tick(run_id, report, watcher.tracking()),
    )
    .await
    .unwrap();

    assert_eq!(journal.tick_count().unwrap(), 5);
    let (_, records) = journal.latest_tracking().unwrap().unwrap();
    let present = records.iter().filter(|r| r.is_present()).count();
    assert_eq!(present, watcher.previous().len());
}
