//! # Client Runtime
//!
//! Everything that runs in the front-end process:
//!
//! - **[`api`]**: HTTP access to the backend and the response taxonomy
//! - **[`auth`]**: the session credential and its change notifications
//! - **[`sync`]**: optimistic mutations, auto-save, parallel fetch, token renewal
//! - **[`stores`]**: clinic, doctor profile and pharmacy search state
//! - **[`task`]** / **[`join`]** / **[`clock`]**: scheduling and concurrency primitives
//!
//! ## Usage
//!
//! ```rust,no_run
//! use caresync::client::{api::HttpBackend, auth::AuthStore, config::Config};
//! use caresync::client::stores::ClinicStore;
//! use caresync::client::sync::SessionTokenScheduler;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! caresync::client::logging::init_tracing();
//! let config = Config::from_env()?;
//! let lead_time = config.refresh_lead_time();
//! let auth = AuthStore::new();
//! let backend = HttpBackend::new(config, auth.clone())?;
//!
//! backend.login("clinic@example.com", "secret").await?;
//! let scheduler = SessionTokenScheduler::new(auth, Arc::new(backend.clone()), lead_time);
//! scheduler.start();
//!
//! let clinic = ClinicStore::new(backend);
//! let report = clinic.refresh_all().await;
//! println!("{} resources failed to load", report.failures.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod join;
pub mod logging;
pub mod stores;
pub mod sync;
pub mod task;

pub use api::{CredentialRenewer, HttpBackend};
pub use auth::{AuthStore, Credential, SessionEvent};
pub use config::Config;
