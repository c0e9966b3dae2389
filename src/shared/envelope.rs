//! Backend Response Envelope
//!
//! Every backend endpoint answers with the same wrapper:
//!
//! ```json
//! { "isSuccess": true, "message": "Saved", "data": { ... }, "errors": null }
//! ```
//!
//! `errors` is loosely typed on the wire. It is either an object mapping field
//! names to a message or list of messages, or a plain list of messages.

use crate::shared::error::{FieldErrors, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope returned by every backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Value>,
}

/// Acknowledgement of a successful write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteAck {
    /// Server-provided message, if any
    pub message: Option<String>,
}

impl WriteAck {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Access/refresh token pair as sent to and returned by the renewal endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl<T> ApiEnvelope<T> {
    /// Build a successful envelope
    pub fn success(data: T, message: Option<String>) -> Self {
        Self {
            is_success: true,
            message,
            data: Some(data),
            errors: None,
        }
    }

    /// Flatten `errors` into field -> messages.
    ///
    /// List-shaped errors are filed under the empty field name.
    pub fn field_errors(&self) -> FieldErrors {
        flatten_errors(self.errors.as_ref())
    }

    /// Turn an `isSuccess: false` envelope into a `Rejected` error
    pub fn check(self) -> Result<Self, SyncError> {
        if self.is_success {
            return Ok(self);
        }
        let fields = self.field_errors();
        Err(SyncError::Rejected {
            message: self.message.unwrap_or_default(),
            fields,
        })
    }

    /// Unwrap the payload of a successful envelope
    pub fn into_data(self) -> Result<T, SyncError> {
        self.check()?.data.ok_or(SyncError::MissingData)
    }

    /// Acknowledge a successful write, discarding the payload
    pub fn ack(self) -> Result<WriteAck, SyncError> {
        let envelope = self.check()?;
        Ok(WriteAck {
            message: envelope.message.filter(|m| !m.trim().is_empty()),
        })
    }
}

pub(crate) fn flatten_errors(errors: Option<&Value>) -> FieldErrors {
    let mut fields = FieldErrors::new();
    match errors {
        Some(Value::Object(map)) => {
            for (field, value) in map {
                let messages = match value {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(items) => items.iter().filter_map(value_to_message).collect(),
                    other => value_to_message(other).into_iter().collect(),
                };
                if !messages.is_empty() {
                    fields.insert(field.clone(), messages);
                }
            }
        }
        Some(Value::Array(items)) => {
            let messages: Vec<String> = items.iter().filter_map(value_to_message).collect();
            if !messages.is_empty() {
                fields.insert(String::new(), messages);
            }
        }
        Some(Value::String(s)) if !s.is_empty() => {
            fields.insert(String::new(), vec![s.clone()]);
        }
        _ => {}
    }
    fields
}

fn value_to_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
