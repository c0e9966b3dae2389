//! Authentication Store
//!
//! Holds the process-wide session credential. Every backend call reads it; only
//! login, logout and the session token scheduler write it.
//!
//! Changes are published two ways: a `watch` channel carrying the current
//! credential, and a `broadcast` of [`SessionEvent`]s so dependents learn about
//! sign-out even if they only subscribe to events.

use crate::client::clock::MonotonicClock;
use crate::shared::envelope::TokenPair;
use crate::shared::error::SyncError;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Short-lived access token, its refresh token and the access token's expiry
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Build a credential, reading the expiry from the access token's `exp` claim
    pub fn from_tokens(access_token: String, refresh_token: String) -> Result<Self, SyncError> {
        let expires_at = expiry_claim(&access_token)?;
        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    pub fn token_pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    pub fn has_both_tokens(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether renewal is due: the expiry is no further away than `lead`
    pub fn is_within_renewal_window(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        compute_fire_delay(self.expires_at, now, lead).is_zero()
    }
}

/// Delay until a renewal should fire: `max(0, (expires_at - now) - lead)`
pub fn compute_fire_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>, lead: Duration) -> Duration {
    let lead = ChronoDuration::from_std(lead).unwrap_or(ChronoDuration::MAX);
    (expires_at - now)
        .checked_sub(&lead)
        .and_then(|d| d.to_std().ok())
        .unwrap_or(Duration::ZERO)
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim without verifying the signature.
///
/// The client cannot verify tokens; it only needs to know when to renew.
fn expiry_claim(token: &str) -> Result<DateTime<Utc>, SyncError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| SyncError::InvalidToken {
        message: e.to_string(),
    })?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| SyncError::InvalidToken {
            message: e.to_string(),
        })?;

    Utc.timestamp_opt(data.claims.exp, 0)
        .single()
        .ok_or_else(|| SyncError::InvalidToken {
            message: format!("exp claim out of range: {}", data.claims.exp),
        })
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new credential was stored (login or renewal)
    CredentialChanged { expires_at: DateTime<Utc> },
    /// The session ended
    LoggedOut,
}

const EVENT_CAPACITY: usize = 32;

#[derive(Debug)]
struct AuthInner {
    credential: watch::Sender<Option<Credential>>,
    events: broadcast::Sender<SessionEvent>,
    clock: MonotonicClock,
}

/// Process-wide credential holder; cheap to clone
#[derive(Debug, Clone)]
pub struct AuthStore {
    inner: Arc<AuthInner>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }

    pub fn with_clock(clock: MonotonicClock) -> Self {
        let (credential, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(AuthInner {
                credential,
                events,
                clock,
            }),
        }
    }

    pub fn clock(&self) -> MonotonicClock {
        self.inner.clock
    }

    /// Current credential (getCredential)
    pub fn credential(&self) -> Option<Credential> {
        self.inner.credential.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.credential.borrow().is_some()
    }

    /// Access token for the `Authorization` header
    pub fn bearer(&self) -> Option<String> {
        self.inner
            .credential
            .borrow()
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Store a new token pair (setCredential)
    pub fn set_credential(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Credential, SyncError> {
        let credential = Credential::from_tokens(access_token.into(), refresh_token.into())?;
        tracing::info!("[AUTH] Credential stored, expires at {}", credential.expires_at);
        self.inner.credential.send_replace(Some(credential.clone()));
        let _ = self.inner.events.send(SessionEvent::CredentialChanged {
            expires_at: credential.expires_at,
        });
        Ok(credential)
    }

    /// Store a renewed token pair, but only while `expected` is still the held pair.
    ///
    /// Returns `Ok(None)` when the session ended or a new login replaced the pair
    /// while the renewal was in flight.
    pub fn replace_credential(
        &self,
        expected: &TokenPair,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Option<Credential>, SyncError> {
        let credential = Credential::from_tokens(access_token.into(), refresh_token.into())?;
        let replaced = self.inner.credential.send_if_modified(|current| match current {
            Some(held)
                if held.access_token == expected.access_token
                    && held.refresh_token == expected.refresh_token =>
            {
                *current = Some(credential.clone());
                true
            }
            _ => false,
        });
        if !replaced {
            tracing::debug!("[AUTH] Renewed credential discarded, session changed meanwhile");
            return Ok(None);
        }

        tracing::info!("[AUTH] Credential renewed, expires at {}", credential.expires_at);
        let _ = self.inner.events.send(SessionEvent::CredentialChanged {
            expires_at: credential.expires_at,
        });
        Ok(Some(credential))
    }

    /// End the session and notify dependents
    pub fn logout(&self) {
        let previous = self.inner.credential.send_replace(None);
        if previous.is_some() {
            tracing::info!("[AUTH] Session cleared");
        }
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.inner.credential.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}
