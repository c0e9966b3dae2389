//! Backend API Client
//!
//! Thin async HTTP client over the backend's resource endpoints. The endpoint
//! catalog itself is opaque to this crate: callers pass paths, and every response
//! is decoded through the shared [`ApiEnvelope`].
//!
//! # Status classification
//!
//! | Response | Error |
//! |---|---|
//! | 2xx with `isSuccess: false` | `Rejected` |
//! | 400, 409, 422 | `Validation` |
//! | 401, 403 | `Unauthorized` |
//! | anything else non-2xx | `Server` |
//! | no response | `Transport` |
//!
//! # Timeouts
//!
//! `reqwest` applies no total request timeout by default, and that default is kept
//! unless `request_timeout_ms` is configured.

use crate::client::auth::{AuthStore, Credential};
use crate::client::config::Config;
use crate::shared::envelope::{flatten_errors, ApiEnvelope, TokenPair, WriteAck};
use crate::shared::error::SyncError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Calls the credential-renewal endpoint.
///
/// This is the only backend call the session token scheduler depends on.
pub trait CredentialRenewer: Send + Sync + 'static {
    fn renew(&self, tokens: TokenPair) -> BoxFuture<'static, Result<TokenPair, SyncError>>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client for the healthcare backend; cheap to clone
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: Arc<Config>,
    auth: AuthStore,
}

impl HttpBackend {
    pub fn new(config: Config, auth: AuthStore) -> Result<Self, SyncError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GET a resource and unwrap its `data`
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let request = self.authorized(Method::GET, path)?;
        let envelope: ApiEnvelope<T> = self.execute(request).await?;
        envelope.into_data()
    }

    /// GET with URL-encoded query parameters
    pub async fn fetch_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, SyncError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.authorized(Method::GET, path)?.query(query);
        let envelope: ApiEnvelope<T> = self.execute(request).await?;
        envelope.into_data()
    }

    /// Send a JSON body and acknowledge the write
    pub async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<WriteAck, SyncError> {
        let request = self.authorized(method, path)?.json(body);
        let envelope: ApiEnvelope<Value> = self.execute(request).await?;
        envelope.ack()
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<WriteAck, SyncError> {
        self.write(Method::PUT, path, body).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<WriteAck, SyncError> {
        self.write(Method::POST, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<WriteAck, SyncError> {
        let request = self.authorized(Method::DELETE, path)?;
        let envelope: ApiEnvelope<Value> = self.execute(request).await?;
        envelope.ack()
    }

    /// Exchange email and password for a token pair and store it
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential, SyncError> {
        let url = self.config.api_url(self.config.login_path());
        let request = self.client.post(&url).json(&LoginRequest { email, password });
        let envelope: ApiEnvelope<TokenPair> = self.execute(request).await?;
        let tokens = envelope.into_data()?;
        self.auth.set_credential(tokens.access_token, tokens.refresh_token)
    }

    /// Call the renewal endpoint with the current pair
    pub async fn renew_tokens(&self, tokens: &TokenPair) -> Result<TokenPair, SyncError> {
        let url = self.config.api_url(self.config.refresh_path());
        let request = self.client.post(&url).json(tokens);
        let envelope: ApiEnvelope<TokenPair> = self.execute(request).await?;
        envelope.into_data()
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, SyncError> {
        let token = self.auth.bearer().ok_or(SyncError::NotAuthenticated)?;
        let url = self.config.api_url(path);
        Ok(self.client.request(method, &url).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<ApiEnvelope<T>, SyncError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("[HTTP] Request failed before a response: {}", e);
            SyncError::transport(e.to_string())
        })?;
        decode_response(response).await
    }
}

impl CredentialRenewer for HttpBackend {
    fn renew(&self, tokens: TokenPair) -> BoxFuture<'static, Result<TokenPair, SyncError>> {
        let backend = self.clone();
        async move { backend.renew_tokens(&tokens).await }.boxed()
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<ApiEnvelope<T>, SyncError> {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response
        .bytes()
        .await
        .map_err(|e| SyncError::transport(format!("Failed to read response body: {}", e)))?;

    if status.is_success() {
        // 204 and other bodiless successes
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ApiEnvelope {
                is_success: true,
                message: None,
                data: None,
                errors: None,
            });
        }
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
        return Ok(envelope);
    }

    let error = classify_failure(status, &body);
    tracing::debug!("[HTTP] {} {} -> {}", status.as_u16(), url, error);
    Err(error)
}

/// Map a non-2xx response onto the error taxonomy
pub(crate) fn classify_failure(status: StatusCode, body: &[u8]) -> SyncError {
    let envelope: Option<ApiEnvelope<Value>> = serde_json::from_slice(body).ok();
    let message = envelope
        .as_ref()
        .and_then(|e| e.message.clone())
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty() && text.len() <= 200).then_some(text)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
    let fields = flatten_errors(envelope.as_ref().and_then(|e| e.errors.as_ref()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Validation { message, fields }
        }
        _ => SyncError::Server {
            status: status.as_u16(),
            message,
        },
    }
}
