//! Property-based tests for auto-save debouncing
//!
//! Each case drives a paused-clock runtime, so simulated seconds cost nothing.

use caresync::client::sync::{AutoSaveCoordinator, AutoSaveTarget, AutoSaveTiming};
use caresync::shared::error::SyncError;
use caresync::shared::WriteAck;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const COMMIT_DELAY: Duration = Duration::from_millis(3_000);

/// Records when each commit happened
struct CommitLog {
    started: Instant,
    commits: Mutex<Vec<Duration>>,
    server: Mutex<u32>,
}

impl AutoSaveTarget<u32> for CommitLog {
    fn commit(&self, model: u32) -> BoxFuture<'static, Vec<Result<WriteAck, SyncError>>> {
        self.commits.lock().unwrap().push(self.started.elapsed());
        *self.server.lock().unwrap() = model;
        async { vec![Ok(WriteAck::default())] }.boxed()
    }

    fn refresh(&self) -> BoxFuture<'static, Result<u32, SyncError>> {
        let value = *self.server.lock().unwrap();
        async move { Ok(value) }.boxed()
    }
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Run `gaps` (ms between edits, each edit a new value) and return commit times
fn run_edits(gaps: Vec<u64>) -> (Vec<Duration>, Duration) {
    paused_runtime().block_on(async move {
        let log = Arc::new(CommitLog {
            started: Instant::now(),
            commits: Mutex::new(Vec::new()),
            server: Mutex::new(0),
        });
        let autosave = AutoSaveCoordinator::new(
            "counter",
            0u32,
            Arc::clone(&log) as Arc<dyn AutoSaveTarget<u32>>,
            AutoSaveTiming {
                commit_delay: COMMIT_DELAY,
                settle_delay: Duration::from_millis(200),
            },
        )
        .unwrap();

        let mut last_edit = Duration::ZERO;
        for gap in gaps {
            tokio::time::sleep(Duration::from_millis(gap)).await;
            autosave.edit(|value| *value += 1);
            last_edit = log.started.elapsed();
        }
        tokio::time::sleep(COMMIT_DELAY * 3).await;

        let commits = log.commits.lock().unwrap().clone();
        (commits, last_edit)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_burst_within_quiet_period_commits_once(gaps in prop::collection::vec(1u64..2_999, 1..12)) {
        let (commits, last_edit) = run_edits(gaps);

        prop_assert_eq!(commits.len(), 1);
        let due = last_edit + COMMIT_DELAY;
        // Timer wheel resolution is one millisecond
        prop_assert!(commits[0] >= due && commits[0] <= due + Duration::from_millis(1));
    }

    #[test]
    fn test_spaced_edits_commit_each(gaps in prop::collection::vec(3_500u64..10_000, 1..6)) {
        let edits = gaps.len();
        let (commits, _) = run_edits(gaps);

        prop_assert_eq!(commits.len(), edits);
    }
}
