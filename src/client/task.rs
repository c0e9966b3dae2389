//! # Scheduled Tasks
//!
//! Cancellable, single-shot delayed callbacks.
//!
//! A [`TaskSlot`] holds at most one pending [`ScheduledTask`]. Scheduling into an
//! occupied slot cancels the previous task and installs the new one under the same
//! lock, so a superseded callback can never run. Once a task fires it leaves the
//! slot, which means a later `schedule` or `cancel` will not abort a callback that is
//! already executing. Dropping the slot cancels whatever is still pending.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use caresync::client::task::TaskSlot;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let slot = TaskSlot::new("autosave");
//! slot.schedule(Duration::from_secs(3), async { /* commit */ });
//! // A new edit arrives: the previous commit timer is replaced.
//! slot.schedule(Duration::from_secs(3), async { /* commit */ });
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Handle to one pending delayed callback
#[derive(Debug)]
pub struct ScheduledTask {
    fire_at: Instant,
    generation: u64,
    handle: AbortHandle,
}

impl ScheduledTask {
    pub fn fire_at(&self) -> Instant {
        self.fire_at
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    pending: Option<ScheduledTask>,
}

/// A named slot holding at most one pending task
#[derive(Debug)]
pub struct TaskSlot {
    name: &'static str,
    state: Arc<Mutex<SlotState>>,
}

impl TaskSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `callback` after `delay`, replacing any task pending in this slot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Instant
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, callback)
    }

    pub fn schedule_at<F>(&self, fire_at: Instant, callback: F) -> Instant
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = lock(&self.state);
        if let Some(previous) = state.pending.take() {
            tracing::trace!("[TASK] {} superseded task #{}", self.name, previous.generation);
            previous.cancel();
        }

        state.generation += 1;
        let generation = state.generation;
        let slot = Arc::clone(&self.state);
        let name = self.name;

        let join = tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            {
                let mut state = lock(&slot);
                if state.generation != generation {
                    return;
                }
                state.pending = None;
            }
            tracing::trace!("[TASK] {} firing task #{}", name, generation);
            callback.await;
        });

        state.pending = Some(ScheduledTask {
            fire_at,
            generation,
            handle: join.abort_handle(),
        });
        fire_at
    }

    /// Cancel the pending task, if any. Returns whether one was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.state);
        state.generation += 1;
        match state.pending.take() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Fire time of the pending task
    pub fn fire_at(&self) -> Option<Instant> {
        lock(&self.state).pending.as_ref().map(ScheduledTask::fire_at)
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.state).pending.take() {
            task.cancel();
        }
    }
}

fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
