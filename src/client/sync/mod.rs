//! # Client State Sync
//!
//! Coordinators that keep UI-facing state consistent with the backend:
//!
//! - **[`mutation`]**: optimistic writes with snapshot rollback
//! - **[`autosave`]**: debounced auto-save with feedback-loop suppression
//! - **[`fetch`]**: parallel loading that tolerates partial failure
//! - **[`token`]**: single-flight credential renewal ahead of expiry
//!
//! Every coordinator publishes its state through a `tokio::sync::watch` channel and
//! resolves each async operation into an explicit outcome instead of propagating
//! errors past its own boundary.

pub mod autosave;
pub mod fetch;
pub mod mutation;
pub mod token;

pub use autosave::{AutoSaveCoordinator, AutoSaveStatus, AutoSaveTarget, AutoSaveTiming};
pub use fetch::{FetchAggregator, FetchJob, FetchReport, ResourceSlot, ResourceState};
pub use mutation::{ApplyPolicy, MutationCoordinator, MutationState, Snapshot, SuccessMessage};
pub use token::{RefreshOutcome, SchedulerState, SessionTokenScheduler, SkipReason};
