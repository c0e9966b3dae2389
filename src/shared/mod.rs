//! Shared Module
//!
//! Wire types, configuration and the error taxonomy. Nothing here performs I/O
//! apart from reading a config file.

/// Sync error taxonomy
pub mod error;

/// Backend response envelope
pub mod envelope;

/// Application configuration
pub mod config;

/// Clinic and doctor resources
pub mod clinic;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use envelope::{ApiEnvelope, TokenPair, WriteAck};
pub use error::{ErrorKind, SyncError};
