//! Access tokens for tests
//!
//! The client never verifies signatures, so any HS256 token with an `exp` claim
//! will do.

use caresync::client::auth::{AuthStore, Credential};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

#[derive(Serialize)]
struct Claims {
    sub: String,
    email: String,
    exp: i64,
}

/// Signed token expiring at `expires_at`
pub fn access_token(expires_at: DateTime<Utc>) -> String {
    let claims = Claims {
        sub: "7d1c5a8e-clinic-admin".to_string(),
        email: "clinic@example.com".to_string(),
        exp: expires_at.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .expect("Failed to sign test token")
}

/// Token expiring `valid_for` after the store's clock
pub fn access_token_for(auth: &AuthStore, valid_for: Duration) -> String {
    access_token(auth.clock().now() + valid_for)
}

/// Store a credential valid for `valid_for`, as a login would
pub fn sign_in(auth: &AuthStore, valid_for: Duration) -> Credential {
    auth.set_credential(access_token_for(auth, valid_for), "refresh-token-1")
        .expect("Failed to store test credential")
}
