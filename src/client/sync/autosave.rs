//! # Debounced Auto-Save
//!
//! An [`AutoSaveCoordinator`] owns an editable form model and commits it to the
//! backend after a quiet period, without a save button.
//!
//! ## Cycle
//!
//! 1. Every change to the model is compared (serialized) against the last
//!    confirmed snapshot. Equal means nothing to save.
//! 2. A real change (re)arms the commit timer; bursts of edits collapse into one
//!    commit scheduled from the last edit.
//! 3. On fire, the [`AutoSaveTarget`] commits its sub-resources, usually one
//!    [`MutationCoordinator::apply`](super::MutationCoordinator::apply) each. At
//!    least one successful sub-write counts as success.
//! 4. After success the target refetches server truth, which is written back into
//!    the model. The suppression flag is raised for the duration of that refresh
//!    plus a settle delay, so the write-back is not mistaken for a user edit.
//! 5. After failure the snapshot is left untouched; the next edit retries.

use crate::client::task::TaskSlot;
use crate::shared::envelope::WriteAck;
use crate::shared::error::SyncError;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Backend side of an auto-saved form
pub trait AutoSaveTarget<M>: Send + Sync + 'static {
    /// Write what changed in the model, one outcome per sub-resource written
    fn commit(&self, model: M) -> BoxFuture<'static, Vec<Result<WriteAck, SyncError>>>;

    /// Fetch the canonical server value of the model
    fn refresh(&self) -> BoxFuture<'static, Result<M, SyncError>>;
}

/// Delays governing the save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveTiming {
    /// Quiet period after the last edit
    pub commit_delay: Duration,
    /// How long suppression outlives the post-save refresh
    pub settle_delay: Duration,
}

impl Default for AutoSaveTiming {
    fn default() -> Self {
        Self {
            commit_delay: Duration::from_secs(3),
            settle_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveStatus {
    Idle,
    /// A commit is armed
    Scheduled,
    Saving,
    /// Last commit succeeded; carries the number of sub-writes that failed
    Saved { failed_parts: usize },
    Failed(SyncError),
}

struct AutoSaveInner<M> {
    name: &'static str,
    model: watch::Sender<M>,
    status: watch::Sender<AutoSaveStatus>,
    last_confirmed: Mutex<String>,
    suppressed: AtomicBool,
    target: Arc<dyn AutoSaveTarget<M>>,
    timing: AutoSaveTiming,
    commit_slot: TaskSlot,
    settle_slot: TaskSlot,
}

/// Debounced auto-save over one editable model; cheap to clone
pub struct AutoSaveCoordinator<M> {
    inner: Arc<AutoSaveInner<M>>,
}

impl<M> Clone for AutoSaveCoordinator<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> AutoSaveCoordinator<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    /// Start from a model loaded from the server; it becomes the confirmed snapshot.
    pub fn new(
        name: &'static str,
        initial: M,
        target: Arc<dyn AutoSaveTarget<M>>,
        timing: AutoSaveTiming,
    ) -> Result<Self, SyncError> {
        let snapshot = serialize(&initial)?;
        let (model, _) = watch::channel(initial);
        let (status, _) = watch::channel(AutoSaveStatus::Idle);
        Ok(Self {
            inner: Arc::new(AutoSaveInner {
                name,
                model,
                status,
                last_confirmed: Mutex::new(snapshot),
                suppressed: AtomicBool::new(false),
                target,
                timing,
                commit_slot: TaskSlot::new("autosave-commit"),
                settle_slot: TaskSlot::new("autosave-settle"),
            }),
        })
    }

    pub fn model(&self) -> M {
        self.inner.model.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<M> {
        self.inner.model.subscribe()
    }

    pub fn status(&self) -> AutoSaveStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AutoSaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.suppressed.load(Ordering::Acquire)
    }

    /// Whether a commit timer is armed
    pub fn is_scheduled(&self) -> bool {
        self.inner.commit_slot.is_pending()
    }

    /// Apply a user edit to the model
    pub fn edit(&self, change: impl FnOnce(&mut M)) {
        self.inner.model.send_modify(change);
        self.inner.observe();
    }

    /// Replace the whole model as a user edit
    pub fn replace(&self, model: M) {
        self.inner.model.send_replace(model);
        self.inner.observe();
    }

    /// Load a new confirmed model without saving it (e.g. after navigation)
    pub fn reset(&self, model: M) -> Result<(), SyncError> {
        let snapshot = serialize(&model)?;
        self.inner.commit_slot.cancel();
        *self.inner.lock_confirmed() = snapshot;
        self.inner.model.send_replace(model);
        self.inner.status.send_replace(AutoSaveStatus::Idle);
        Ok(())
    }

    /// Commit now instead of waiting for the quiet period
    pub async fn flush(&self) {
        self.inner.commit_slot.cancel();
        AutoSaveInner::run_commit(Arc::clone(&self.inner)).await;
    }

    /// Cancel pending timers (view teardown)
    pub fn shutdown(&self) {
        self.inner.commit_slot.cancel();
        self.inner.settle_slot.cancel();
    }
}

impl<M> AutoSaveInner<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    fn lock_confirmed(&self) -> std::sync::MutexGuard<'_, String> {
        self.last_confirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialized model differs from the confirmed snapshot
    fn has_unsaved_changes(&self, model: &M) -> Result<bool, SyncError> {
        let current = serialize(model)?;
        Ok(*self.lock_confirmed() != current)
    }

    fn observe(self: &Arc<Self>) {
        if self.suppressed.load(Ordering::Acquire) {
            tracing::trace!("[AUTOSAVE] {} change ignored while suppressed", self.name);
            return;
        }

        let model = self.model.borrow().clone();
        match self.has_unsaved_changes(&model) {
            Ok(false) => {}
            Ok(true) => {
                let weak = Arc::downgrade(self);
                self.commit_slot
                    .schedule(self.timing.commit_delay, Self::fire(weak));
                self.status.send_replace(AutoSaveStatus::Scheduled);
            }
            Err(e) => tracing::warn!("[AUTOSAVE] {} could not serialize model: {}", self.name, e),
        }
    }

    async fn fire(weak: Weak<Self>) {
        if let Some(inner) = weak.upgrade() {
            Self::run_commit(inner).await;
        }
    }

    async fn run_commit(self: Arc<Self>) {
        let model = self.model.borrow().clone();
        match self.has_unsaved_changes(&model) {
            Ok(true) => {}
            Ok(false) => {
                self.status.send_if_modified(|status| {
                    if *status == AutoSaveStatus::Scheduled {
                        *status = AutoSaveStatus::Idle;
                        true
                    } else {
                        false
                    }
                });
                return;
            }
            Err(e) => {
                self.status.send_replace(AutoSaveStatus::Failed(e));
                return;
            }
        }

        self.status.send_replace(AutoSaveStatus::Saving);
        let committed = model.clone();
        let outcomes = self.target.commit(model).await;

        let total = outcomes.len();
        let mut first_error = None;
        let mut failed_parts = 0;
        for outcome in outcomes {
            if let Err(e) = outcome {
                failed_parts += 1;
                first_error.get_or_insert(e);
            }
        }

        if failed_parts == total {
            let error = first_error.unwrap_or(SyncError::NothingCommitted);
            tracing::warn!("[AUTOSAVE] {} save failed: {}", self.name, error);
            self.status.send_replace(AutoSaveStatus::Failed(error));
            return;
        }
        if failed_parts > 0 {
            tracing::warn!(
                "[AUTOSAVE] {} saved with {}/{} sub-writes failing",
                self.name,
                failed_parts,
                total
            );
        }

        self.suppressed.store(true, Ordering::Release);
        match self.target.refresh().await {
            Ok(refreshed) => match serialize(&refreshed) {
                Ok(snapshot) => {
                    *self.lock_confirmed() = snapshot;
                    self.model.send_replace(refreshed);
                }
                Err(e) => {
                    tracing::warn!("[AUTOSAVE] {} could not serialize refreshed model: {}", self.name, e)
                }
            },
            Err(e) => {
                tracing::warn!("[AUTOSAVE] {} refresh after save failed: {}", self.name, e);
                if failed_parts == 0 {
                    if let Ok(snapshot) = serialize(&committed) {
                        *self.lock_confirmed() = snapshot;
                    }
                }
            }
        }

        let weak = Arc::downgrade(&self);
        self.settle_slot.schedule(self.timing.settle_delay, async move {
            if let Some(inner) = weak.upgrade() {
                inner.suppressed.store(false, Ordering::Release);
            }
        });

        tracing::info!("[AUTOSAVE] {} saved", self.name);
        self.status
            .send_replace(AutoSaveStatus::Saved { failed_parts });
    }
}

fn serialize<M: Serialize>(model: &M) -> Result<String, SyncError> {
    Ok(serde_json::to_string(model)?)
}
