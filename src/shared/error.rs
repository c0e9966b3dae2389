//! Shared Error Types
//!
//! This module defines the error type every coordinator resolves into. Errors are
//! `Clone` so they can be stored inside observable state and rendered by the UI.
//!
//! # Error Categories
//!
//! - `Transport` / `Server` - transient write failures (network, 5xx)
//! - `Validation` - 4xx responses carrying field-level messages
//! - `Unauthorized` / `NotAuthenticated` - authorization failures
//! - `Rejected` - a well-formed envelope with `isSuccess: false`
//! - `Serialization` / `MissingData` / `InvalidToken` - decode failures
//!
//! # Usage
//!
//! ```rust
//! use caresync::shared::error::SyncError;
//!
//! let error = SyncError::validation("Price must be positive", Default::default());
//! assert_eq!(error.user_message(), "Price must be positive");
//! ```
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to the list of messages the server reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message shown when the server gave no usable detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors produced by the synchronization layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The request never produced an HTTP response (connect, timeout, body read)
    #[error("Network error: {message}")]
    Transport {
        /// Human-readable error message
        message: String,
    },

    /// The server answered with a 5xx (or otherwise unclassified) status
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Server-provided or synthesized message
        message: String,
    },

    /// The server refused the input with field-level detail
    #[error("Validation error: {message}")]
    Validation {
        /// Top-level message
        message: String,
        /// Per-field messages
        fields: FieldErrors,
    },

    /// 401/403 from the server
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Human-readable error message
        message: String,
    },

    /// HTTP success carrying `isSuccess: false`
    #[error("Request rejected: {message}")]
    Rejected {
        /// Server-provided message
        message: String,
        /// Per-field messages, when present
        fields: FieldErrors,
    },

    /// A successful envelope without the expected `data`
    #[error("Response did not contain data")]
    MissingData,

    /// No credential is held
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The access token has no decodable expiry claim
    #[error("Invalid access token: {message}")]
    InvalidToken {
        /// Decoder message
        message: String,
    },

    /// JSON encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Every sub-write of a commit failed without a more specific error
    #[error("No changes could be saved")]
    NothingCommitted,
}

/// Coarse classification used for logging and UI treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or server failure; user may retry
    TransientWrite,
    /// Input refused by the server
    Validation,
    /// Missing or refused credentials
    Authorization,
    /// Response could not be understood
    Decode,
}

impl SyncError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, fields: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    /// Create a rejection for an `isSuccess: false` envelope
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Server { .. } | Self::NothingCommitted => {
                ErrorKind::TransientWrite
            }
            Self::Validation { .. } | Self::Rejected { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } | Self::NotAuthenticated | Self::InvalidToken { .. } => {
                ErrorKind::Authorization
            }
            Self::MissingData | Self::Serialization { .. } => ErrorKind::Decode,
        }
    }

    /// Whether a retry after re-editing could plausibly succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientWrite
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } | Self::Rejected { fields, .. } if !fields.is_empty() => {
                Some(fields)
            }
            _ => None,
        }
    }

    /// Text to surface to the user.
    ///
    /// Field-level detail wins when the server supplied it, then the server's own
    /// message, then a generic fallback.
    pub fn user_message(&self) -> String {
        if let Some(fields) = self.field_errors() {
            let detail = fields
                .iter()
                .flat_map(|(field, messages)| {
                    messages.iter().map(move |m| format!("{}: {}", field, m))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !detail.is_empty() {
                return detail;
            }
        }

        let message = match self {
            Self::Validation { message, .. }
            | Self::Rejected { message, .. }
            | Self::Unauthorized { message, .. } => message.trim(),
            Self::Transport { .. } => "Network error. Check your connection and try again.",
            Self::NotAuthenticated => "Your session has ended. Please sign in again.",
            _ => "",
        };

        if message.is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message.to_string()
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::serialization(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}
