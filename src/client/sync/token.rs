//! # Session Token Scheduler
//!
//! Renews the access token shortly before it expires.
//!
//! ```text
//! Idle -> Scheduled -> Refreshing -> Scheduled (renewed)
//!                                 -> LoggedOut (terminal)
//! ```
//!
//! Timer fires, manual triggers and the mount check all enter the same guarded
//! routine. The guard is a real atomic flag, so at most one renewal call is ever in
//! flight and concurrent triggers return [`SkipReason::InFlight`] instead of queuing.
//!
//! A failed renewal signs the user out. The scheduler does not retry and does not
//! schedule again; a new login gets a new scheduler.
//!
//! A renewal only lands if the pair it sent is still the held credential when the
//! answer arrives. A logout or a fresh login during the call wins over the result.

use crate::client::api::CredentialRenewer;
use crate::client::auth::{compute_fire_delay, AuthStore, Credential, SessionEvent};
use crate::client::task::TaskSlot;
use crate::shared::envelope::TokenPair;
use crate::shared::error::SyncError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

/// Default renewal lead time before expiry
pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled { fire_at: DateTime<Utc> },
    Refreshing,
    LoggedOut,
}

/// Why a refresh attempt was a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another renewal is in flight
    InFlight,
    /// No credential, or one token half is empty
    MissingTokens,
    /// The credential is not inside its renewal window yet
    NotDue,
    /// The session already ended
    Terminated,
    /// A new login replaced the credential while the renewal was in flight
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Renewed { expires_at: DateTime<Utc> },
    Skipped(SkipReason),
    LoggedOut,
}

/// Holds the single-flight flag; cleared on drop whatever the outcome
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SchedulerInner {
    auth: AuthStore,
    renewer: Arc<dyn CredentialRenewer>,
    lead_time: Duration,
    in_flight: AtomicBool,
    terminated: AtomicBool,
    state: watch::Sender<SchedulerState>,
    timer: TaskSlot,
    watcher: Mutex<Option<AbortHandle>>,
}

/// Proactive credential renewal; cheap to clone
#[derive(Clone)]
pub struct SessionTokenScheduler {
    inner: Arc<SchedulerInner>,
}

impl SessionTokenScheduler {
    pub fn new(auth: AuthStore, renewer: Arc<dyn CredentialRenewer>, lead_time: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            inner: Arc::new(SchedulerInner {
                auth,
                renewer,
                lead_time,
                in_flight: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                state,
                timer: TaskSlot::new("token-refresh"),
                watcher: Mutex::new(None),
            }),
        }
    }

    pub fn lead_time(&self) -> Duration {
        self.inner.lead_time
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    /// Whether a renewal call is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Mount: watch the session and schedule against the current credential.
    ///
    /// A credential already inside its renewal window is renewed right away.
    pub fn start(&self) {
        let events = self.inner.auth.events();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(watch_session(weak, events)).abort_handle();
        if let Some(previous) = self.inner.lock_watcher().replace(handle) {
            previous.abort();
        }

        if let Some(credential) = self.inner.auth.credential() {
            self.inner.schedule_refresh(&credential);
        }
    }

    /// Replace any pending renewal with one timed for `credential`
    pub fn schedule_refresh(&self, credential: &Credential) -> Option<DateTime<Utc>> {
        self.inner.schedule_refresh(credential)
    }

    /// Manual trigger
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.inner.refresh().await
    }

    /// Teardown: cancel the pending renewal and stop watching the session
    pub fn stop(&self) {
        self.inner.timer.cancel();
        if let Some(watcher) = self.inner.lock_watcher().take() {
            watcher.abort();
        }
        self.inner.publish_idle_unless_armed();
    }
}

impl std::fmt::Debug for SessionTokenScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenScheduler")
            .field("lead_time", &self.inner.lead_time)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl SchedulerInner {
    fn lock_watcher(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_refresh(self: &Arc<Self>, credential: &Credential) -> Option<DateTime<Utc>> {
        if self.terminated.load(Ordering::Acquire) {
            return None;
        }

        let clock = self.auth.clock();
        let now = clock.now();
        let delay = compute_fire_delay(credential.expires_at, now, self.lead_time);
        let fire_at = now + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::MAX);

        let weak = Arc::downgrade(self);
        self.timer.schedule(delay, async move {
            if let Some(inner) = weak.upgrade() {
                inner.refresh().await;
            }
        });

        tracing::debug!("[SESSION] Renewal scheduled in {:?} (at {})", delay, fire_at);
        self.state
            .send_replace(SchedulerState::Scheduled { fire_at });
        Some(fire_at)
    }

    async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        if self.terminated.load(Ordering::Acquire) {
            return RefreshOutcome::Skipped(SkipReason::Terminated);
        }

        let Some(_guard) = RefreshGuard::acquire(&self.in_flight) else {
            tracing::debug!("[SESSION] Renewal already in flight, skipping");
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        };

        let credential = match self.auth.credential() {
            Some(credential) if credential.has_both_tokens() => credential,
            _ => {
                tracing::debug!("[SESSION] No complete token pair, skipping renewal");
                self.publish_idle_unless_armed();
                return RefreshOutcome::Skipped(SkipReason::MissingTokens);
            }
        };

        let now = self.auth.clock().now();
        if !credential.is_within_renewal_window(now, self.lead_time) {
            tracing::debug!(
                "[SESSION] Credential not due until {}, skipping renewal",
                credential.expires_at
            );
            // A stale timer may have fired; re-arm against the held credential
            self.schedule_refresh(&credential);
            return RefreshOutcome::Skipped(SkipReason::NotDue);
        }

        self.state.send_replace(SchedulerState::Refreshing);
        tracing::info!("[SESSION] Renewing credential expiring at {}", credential.expires_at);

        let sent = credential.token_pair();
        let renewed = self.renewer.renew(sent.clone()).await.and_then(|tokens| {
            self.auth
                .replace_credential(&sent, tokens.access_token, tokens.refresh_token)
        });

        match renewed {
            Ok(Some(credential)) => {
                self.schedule_refresh(&credential);
                RefreshOutcome::Renewed {
                    expires_at: credential.expires_at,
                }
            }
            Ok(None) => self.session_moved_on(),
            Err(_) if !self.still_holds(&sent) => self.session_moved_on(),
            Err(e) => {
                self.sign_out(&e);
                RefreshOutcome::LoggedOut
            }
        }
    }

    fn still_holds(&self, sent: &TokenPair) -> bool {
        self.auth.credential().is_some_and(|held| {
            held.access_token == sent.access_token && held.refresh_token == sent.refresh_token
        })
    }

    /// The credential changed under an in-flight renewal; its result no longer applies
    fn session_moved_on(self: &Arc<Self>) -> RefreshOutcome {
        match self.auth.credential() {
            Some(current) if !self.terminated.load(Ordering::Acquire) => {
                tracing::info!("[SESSION] Credential replaced during renewal, discarding result");
                self.schedule_refresh(&current);
                RefreshOutcome::Skipped(SkipReason::Superseded)
            }
            _ => {
                tracing::info!("[SESSION] Session ended during renewal, discarding result");
                self.tear_down();
                // Covers a teardown that ran before `Refreshing` was published
                self.state.send_replace(SchedulerState::LoggedOut);
                RefreshOutcome::Skipped(SkipReason::Terminated)
            }
        }
    }

    /// `Scheduled` is only published while a timer is actually pending
    fn publish_idle_unless_armed(&self) {
        if self.timer.is_pending() {
            return;
        }
        self.state.send_if_modified(|state| {
            if matches!(state, SchedulerState::Scheduled { .. }) {
                *state = SchedulerState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Renewal failed: end the session exactly once
    fn sign_out(&self, error: &SyncError) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!("[SESSION] Renewal failed, signing out: {}", error);
        self.timer.cancel();
        self.state.send_replace(SchedulerState::LoggedOut);
        self.auth.logout();
    }

    /// Session ended elsewhere
    fn tear_down(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.timer.cancel();
        self.state.send_replace(SchedulerState::LoggedOut);
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(watcher) = self.lock_watcher().take() {
            watcher.abort();
        }
    }
}

async fn watch_session(weak: Weak<SchedulerInner>, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = events.recv().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };

        match event {
            Ok(SessionEvent::CredentialChanged { .. }) => {
                if let Some(credential) = inner.auth.credential() {
                    inner.schedule_refresh(&credential);
                }
            }
            Ok(SessionEvent::LoggedOut) => {
                inner.tear_down();
                return;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("[SESSION] Missed {} session events, resyncing", skipped);
                match inner.auth.credential() {
                    Some(credential) => {
                        inner.schedule_refresh(&credential);
                    }
                    None => {
                        inner.tear_down();
                        return;
                    }
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
