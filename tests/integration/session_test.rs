//! Session token scheduler lifecycle under paused time

use crate::common::*;
use caresync::client::api::CredentialRenewer;
use caresync::client::auth::SessionEvent;
use caresync::client::sync::{RefreshOutcome, SchedulerState, SessionTokenScheduler, SkipReason};
use caresync::client::AuthStore;
use caresync::shared::error::SyncError;
use chrono::Duration as ChronoDuration;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const LEAD: Duration = Duration::from_secs(300);

fn scheduler_with(auth: &AuthStore, renewer: &Arc<ScriptedRenewer>) -> SessionTokenScheduler {
    SessionTokenScheduler::new(
        auth.clone(),
        Arc::clone(renewer) as Arc<dyn CredentialRenewer>,
        LEAD,
    )
}

#[tokio::test(start_paused = true)]
async fn test_timer_fire_and_manual_trigger_share_one_call() {
    let auth = AuthStore::new();
    let renewer = Arc::new(ScriptedRenewer::succeeding(
        &auth,
        Duration::from_secs(2),
        ChronoDuration::minutes(15),
    ));
    // Due one second from now
    sign_in(&auth, ChronoDuration::seconds(301));
    let scheduler = scheduler_with(&auth, &renewer);
    scheduler.start();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(scheduler.state(), SchedulerState::Refreshing);

    assert_eq!(
        scheduler.refresh_now().await,
        RefreshOutcome::Skipped(SkipReason::InFlight)
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(renewer.calls(), 1);
    assert_eq!(renewer.seen()[0].refresh_token, "refresh-token-1");
    assert_eq!(auth.credential().unwrap().refresh_token, "refresh-token-2");
}

#[tokio::test(start_paused = true)]
async fn test_renewal_chain_keeps_session_alive() {
    let auth = AuthStore::new();
    let renewer = Arc::new(ScriptedRenewer::succeeding(
        &auth,
        Duration::from_millis(100),
        ChronoDuration::minutes(15),
    ));
    sign_in(&auth, ChronoDuration::minutes(15));
    let scheduler = scheduler_with(&auth, &renewer);
    scheduler.start();

    // Renewals at 10m, ~20m, ~30m
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;

    assert_eq!(renewer.calls(), 3);
    assert!(auth.is_authenticated());
    let credential = auth.credential().unwrap();
    let now = auth.clock().now();
    assert!(!credential.is_within_renewal_window(now, LEAD));
    match scheduler.state() {
        SchedulerState::Scheduled { fire_at } => {
            crate::assert_close_in_time!(fire_at, credential.expires_at - ChronoDuration::minutes(5), 1);
        }
        other => panic!("Expected Scheduled, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_success_is_terminal() {
    let auth = AuthStore::new();
    let renewer = Arc::new(
        ScriptedRenewer::succeeding(&auth, Duration::from_millis(100), ChronoDuration::minutes(10))
            .then(Ok(()))
            .then(Err(SyncError::rejected("Refresh token revoked"))),
    );
    sign_in(&auth, ChronoDuration::minutes(10));
    let mut events = auth.events();
    let scheduler = scheduler_with(&auth, &renewer);
    scheduler.start();

    // First renewal at 5m succeeds, second at ~10m fails
    tokio::time::sleep(Duration::from_secs(11 * 60)).await;

    assert_eq!(renewer.calls(), 2);
    assert_eq!(scheduler.state(), SchedulerState::LoggedOut);
    assert!(!auth.is_authenticated());

    let mut logouts = 0;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::LoggedOut {
            logouts += 1;
        }
    }
    assert_eq!(logouts, 1);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(renewer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_is_ignored_after_external_renewal() {
    let auth = AuthStore::new();
    let renewer = Arc::new(ScriptedRenewer::succeeding(
        &auth,
        Duration::from_millis(100),
        ChronoDuration::minutes(15),
    ));
    let credential = sign_in(&auth, ChronoDuration::minutes(6));
    let scheduler = scheduler_with(&auth, &renewer);

    // Timer armed without the session watcher, so nothing replaces it
    scheduler.schedule_refresh(&credential);
    sign_in(&auth, ChronoDuration::minutes(60));

    tokio::time::sleep(Duration::from_secs(2 * 60)).await;
    assert_eq!(renewer.calls(), 0);
    assert_eq!(
        scheduler.refresh_now().await,
        RefreshOutcome::Skipped(SkipReason::NotDue)
    );
}

#[tokio::test(start_paused = true)]
async fn test_mount_with_expired_credential_renews_immediately() {
    let auth = AuthStore::new();
    let renewer = Arc::new(ScriptedRenewer::succeeding(
        &auth,
        Duration::from_millis(100),
        ChronoDuration::minutes(15),
    ));
    sign_in(&auth, ChronoDuration::minutes(-1));
    let scheduler = scheduler_with(&auth, &renewer);

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(renewer.calls(), 1);
    assert!(auth.is_authenticated());
}
