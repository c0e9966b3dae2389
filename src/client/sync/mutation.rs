//! # Optimistic Mutations
//!
//! A [`MutationCoordinator`] owns the local copy of one domain aggregate (clinic
//! info, schedule, service prices, ...) and writes to it optimistically: the new
//! value is visible to subscribers before the backend has answered, and is rolled
//! back to the pre-call snapshot if the write fails.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use caresync::client::sync::MutationCoordinator;
//! use caresync::shared::envelope::WriteAck;
//!
//! # async fn example() {
//! let prices = MutationCoordinator::new("service-prices", 100u64);
//! let result = prices
//!     .apply(150, |price| async move {
//!         // backend.put("/api/services/price", &price).await
//!         Ok(WriteAck::with_message(format!("Price set to {}", price)))
//!     })
//!     .await;
//! # }
//! ```
//!
//! ## Overlapping writes
//!
//! Under [`ApplyPolicy::Concurrent`] a second `apply` may start while the first is
//! in flight. Its snapshot is then the first call's unconfirmed value, so its
//! rollback restores that value rather than the last confirmed one.
//! [`ApplyPolicy::Serialized`] queues applies per aggregate instead.

use crate::client::clock::MonotonicClock;
use crate::client::task::TaskSlot;
use crate::shared::envelope::WriteAck;
use crate::shared::error::SyncError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Shown when the backend confirms a write without a message
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Changes saved";
pub const DEFAULT_SUCCESS_TTL: Duration = Duration::from_secs(3);

/// Immutable pre-write copy of an aggregate, used only for rollback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T>(T);

impl<T> Snapshot<T> {
    pub fn capture(value: T) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Transient confirmation text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessMessage {
    pub text: String,
    pub expires_at: DateTime<Utc>,
}

/// What the UI renders for one aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationState<T> {
    pub value: T,
    pub pending: bool,
    pub error: Option<SyncError>,
    pub success_message: Option<SuccessMessage>,
}

impl<T> MutationState<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            pending: false,
            error: None,
            success_message: None,
        }
    }
}

/// How overlapping `apply` calls on one aggregate interact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyPolicy {
    /// Applies run concurrently; a rollback may restore an unconfirmed value
    #[default]
    Concurrent,
    /// Applies run one at a time; rollback always restores a confirmed value
    Serialized,
}

struct MutationInner<T> {
    name: &'static str,
    state: watch::Sender<MutationState<T>>,
    in_flight: std::sync::Mutex<usize>,
    serial: Option<Mutex<()>>,
    message_slot: TaskSlot,
    success_ttl: Duration,
    clock: MonotonicClock,
}

/// Owner of one aggregate's authoritative local copy; cheap to clone
pub struct MutationCoordinator<T> {
    inner: Arc<MutationInner<T>>,
}

impl<T> Clone for MutationCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> MutationCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, initial: T) -> Self {
        Self::with_options(name, initial, ApplyPolicy::default(), DEFAULT_SUCCESS_TTL)
    }

    pub fn with_options(name: &'static str, initial: T, policy: ApplyPolicy, success_ttl: Duration) -> Self {
        let (state, _) = watch::channel(MutationState::new(initial));
        Self {
            inner: Arc::new(MutationInner {
                name,
                state,
                in_flight: std::sync::Mutex::new(0),
                serial: (policy == ApplyPolicy::Serialized).then(|| Mutex::new(())),
                message_slot: TaskSlot::new("success-message"),
                success_ttl,
                clock: MonotonicClock::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn state(&self) -> MutationState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn value(&self) -> T {
        self.inner.state.borrow().value.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().pending
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState<T>> {
        self.inner.state.subscribe()
    }

    /// Replace the value with one the backend has confirmed (load or refetch)
    pub fn set_confirmed(&self, value: T) {
        self.inner.state.send_modify(|state| {
            state.value = value;
            state.error = None;
        });
    }

    /// Adopt a refetched server value, keeping the last write's error or message visible
    pub fn refresh_value(&self, value: T) {
        self.inner.state.send_modify(|state| state.value = value);
    }

    /// Record a failure that did not come from `apply`, such as a failed load
    pub fn record_error(&self, error: SyncError) {
        self.inner.state.send_modify(|state| state.error = Some(error));
    }

    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Optimistically replace the aggregate and run `write` against the backend.
    ///
    /// The value is visible immediately. On failure it is restored to the value
    /// held when this call started and the error is recorded in the state. If the
    /// returned future is dropped before the write settles, the value is restored
    /// the same way, without an error.
    pub async fn apply<F, Fut>(&self, new_value: T, write: F) -> Result<WriteAck, SyncError>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<WriteAck, SyncError>>,
    {
        let _serial = match &self.inner.serial {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let pending = PendingWrite::begin(self, new_value.clone());
        let result = write(new_value).await;
        pending.settle(&result);
        result
    }

    fn begin(&self, new_value: T) {
        let in_flight = self.adjust_in_flight(1);
        self.inner.state.send_modify(|state| {
            state.value = new_value;
            state.pending = in_flight > 0;
            state.error = None;
        });
    }

    fn confirm(&self, ack: &WriteAck) {
        let in_flight = self.adjust_in_flight(-1);
        let text = ack
            .message
            .clone()
            .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string());
        let message = SuccessMessage {
            text,
            expires_at: self.inner.clock.now()
                + chrono::Duration::from_std(self.inner.success_ttl).unwrap_or(chrono::Duration::MAX),
        };

        tracing::info!("[SYNC] {} write confirmed: {}", self.inner.name, message.text);
        self.inner.state.send_modify(|state| {
            state.pending = in_flight > 0;
            state.success_message = Some(message.clone());
        });
        self.schedule_message_clear(message);
    }

    fn rollback(&self, snapshot: Snapshot<T>, error: SyncError) {
        let in_flight = self.adjust_in_flight(-1);
        tracing::warn!(
            "[SYNC] {} write rejected, rolled back: {}",
            self.inner.name,
            error
        );
        self.inner.state.send_modify(|state| {
            state.value = snapshot.into_inner();
            state.pending = in_flight > 0;
            state.error = Some(error);
        });
    }

    /// The write was abandoned before it settled
    fn abandon(&self, snapshot: Snapshot<T>) {
        let in_flight = self.adjust_in_flight(-1);
        tracing::warn!("[SYNC] {} write cancelled, rolled back", self.inner.name);
        self.inner.state.send_modify(|state| {
            state.value = snapshot.into_inner();
            state.pending = in_flight > 0;
        });
    }

    fn schedule_message_clear(&self, message: SuccessMessage) {
        let weak: Weak<MutationInner<T>> = Arc::downgrade(&self.inner);
        self.inner.message_slot.schedule(self.inner.success_ttl, async move {
            if let Some(inner) = weak.upgrade() {
                inner.state.send_if_modified(|state| {
                    if state.success_message.as_ref() == Some(&message) {
                        state.success_message = None;
                        true
                    } else {
                        false
                    }
                });
            }
        });
    }

    fn adjust_in_flight(&self, delta: isize) -> usize {
        let mut count = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *count = count.saturating_add_signed(delta);
        *count
    }
}

/// Snapshot of an in-flight `apply`; restores it if dropped unsettled
struct PendingWrite<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    coordinator: &'a MutationCoordinator<T>,
    snapshot: Option<Snapshot<T>>,
}

impl<'a, T> PendingWrite<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn begin(coordinator: &'a MutationCoordinator<T>, new_value: T) -> Self {
        let snapshot = Snapshot::capture(coordinator.value());
        coordinator.begin(new_value);
        Self {
            coordinator,
            snapshot: Some(snapshot),
        }
    }

    /// Confirm or roll back according to the write's outcome
    fn settle(mut self, result: &Result<WriteAck, SyncError>) {
        if let Some(snapshot) = self.snapshot.take() {
            match result {
                Ok(ack) => self.coordinator.confirm(ack),
                Err(error) => self.coordinator.rollback(snapshot, error.clone()),
            }
        }
    }
}

impl<T> Drop for PendingWrite<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.coordinator.abandon(snapshot);
        }
    }
}
