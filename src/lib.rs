//! CareSync - Client State Sync
//!
//! Client-side state synchronization for a healthcare platform's clinic and
//! practitioner dashboards. The backend is the source of truth; this crate keeps
//! the UI-facing copies of that state consistent with it.
//!
//! # Overview
//!
//! - Optimistic mutations that roll back to a snapshot when a write fails
//! - Debounced auto-save that does not re-trigger on its own refresh
//! - Parallel loading where one failing resource does not block the rest
//! - Proactive, single-flight renewal of the session credential
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types, config, errors
//!   - Response envelope and token pair
//!   - Clinic, schedule, pricing and profile resources
//!   - `SyncError` and its user-facing messages
//!
//! - **`client`** - Async runtime pieces (tokio)
//!   - HTTP backend client and authentication store
//!   - Sync coordinators and the stores built on them
//!
//! # Concurrency
//!
//! All coordinators are cheap to clone handles over `Arc`-shared state and publish
//! changes through `tokio::sync::watch`. Guard flags are atomics, so the
//! single-flight and suppression guarantees hold on a multi-threaded runtime.
//!
//! # Error Handling
//!
//! Every async operation resolves to an explicit outcome. Write failures roll back,
//! fetch failures stay in the failing resource's slot, and renewal failures end the
//! session.

/// Shared types and data structures
pub mod shared;

/// Client runtime: backend access and sync coordinators
pub mod client;
