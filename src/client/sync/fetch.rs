//! Partial-failure-tolerant parallel fetch.
//!
//! Each resource lives in its own [`ResourceSlot`]. A [`FetchJob`] loads one slot;
//! [`FetchAggregator::fetch_all`] runs every job to completion through
//! [`join_settled`] and reports the failures without touching the slots that loaded.

use crate::client::join::{join_settled, FetchResult};
use crate::shared::error::SyncError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Render state of one fetched resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<SyncError>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
        }
    }
}

/// Observable `{ value, loading, error }` cell for one resource; cheap to clone
pub struct ResourceSlot<T> {
    name: &'static str,
    state: Arc<watch::Sender<ResourceState<T>>>,
}

impl<T> Clone for ResourceSlot<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> ResourceSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(ResourceState::default());
        Self {
            name,
            state: Arc::new(state),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    pub fn value(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }

    pub fn error(&self) -> Option<SyncError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    /// Replace the value and settle the slot, abandoning any load still running
    pub fn reset(&self, value: T) {
        self.state.send_modify(|state| {
            state.value = Some(value);
            state.loading = false;
            state.error = None;
        });
    }

    /// Await `fetch` and record its outcome in this slot.
    ///
    /// A failure keeps the previously loaded value.
    pub async fn load<F>(&self, fetch: F) -> Result<(), SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        self.begin_load();
        let outcome = fetch.await;
        self.record(outcome)
    }

    /// Like [`load`](Self::load), but the outcome is dropped if `is_current`
    /// turns false while `fetch` runs. Returns `None` for a dropped outcome; the
    /// newer load owns the slot from then on.
    pub async fn load_latest<F, C>(&self, fetch: F, is_current: C) -> Option<Result<(), SyncError>>
    where
        F: Future<Output = Result<T, SyncError>>,
        C: Fn() -> bool,
    {
        self.begin_load();
        let outcome = fetch.await;
        if !is_current() {
            tracing::trace!("[FETCH] {} dropping superseded result", self.name);
            return None;
        }
        Some(self.record(outcome))
    }

    fn begin_load(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    fn record(&self, outcome: Result<T, SyncError>) -> Result<(), SyncError> {
        let result = outcome.as_ref().map(|_| ()).map_err(Clone::clone);
        self.state.send_modify(|state| {
            state.loading = false;
            match outcome {
                Ok(value) => state.value = Some(value),
                Err(e) => state.error = Some(e),
            }
        });
        result
    }

    /// Build a labelled job that loads this slot
    pub fn job<F>(&self, fetch: F) -> FetchJob
    where
        F: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let slot = self.clone();
        FetchJob::new(self.name, async move { slot.load(fetch).await })
    }
}

/// One labelled unit of work for the aggregator
pub struct FetchJob {
    label: &'static str,
    future: BoxFuture<'static, Result<(), SyncError>>,
}

impl FetchJob {
    pub fn new<F>(label: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        Self {
            label,
            future: future.boxed(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Outcome of a `fetch_all` round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub succeeded: usize,
    pub failures: Vec<(&'static str, SyncError)>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_labels(&self) -> Vec<&'static str> {
        self.failures.iter().map(|(label, _)| *label).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchAggregator;

impl FetchAggregator {
    /// Run every job concurrently and wait for all of them to settle
    pub async fn fetch_all(jobs: Vec<FetchJob>) -> FetchReport {
        let labels: Vec<&'static str> = jobs.iter().map(FetchJob::label).collect();
        let outcomes = join_settled(jobs.into_iter().map(|job| job.future)).await;

        let mut report = FetchReport::default();
        for (label, outcome) in labels.into_iter().zip(outcomes) {
            match outcome {
                FetchResult::Fulfilled(()) => report.succeeded += 1,
                FetchResult::Rejected(e) => {
                    tracing::warn!("[FETCH] {} failed: {}", label, e);
                    report.failures.push((label, e));
                }
            }
        }

        if !report.is_complete() {
            tracing::info!(
                "[FETCH] {}/{} resources loaded",
                report.succeeded,
                report.succeeded + report.failures.len()
            );
        }
        report
    }
}
