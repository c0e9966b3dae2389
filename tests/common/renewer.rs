//! Scripted credential renewer for scheduler tests under paused time

use super::tokens::access_token_for;
use caresync::client::api::CredentialRenewer;
use caresync::client::AuthStore;
use caresync::shared::error::SyncError;
use caresync::shared::TokenPair;
use chrono::Duration as ChronoDuration;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Answers each renewal after `latency` with the next scripted outcome
pub struct ScriptedRenewer {
    auth: AuthStore,
    latency: Duration,
    lifetime: ChronoDuration,
    script: Mutex<Vec<Result<(), SyncError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<TokenPair>>,
}

impl ScriptedRenewer {
    /// Always succeeds with a token valid for `lifetime`
    pub fn succeeding(auth: &AuthStore, latency: Duration, lifetime: ChronoDuration) -> Self {
        Self {
            auth: auth.clone(),
            latency,
            lifetime,
            script: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue outcomes; once exhausted, renewals succeed
    pub fn then(self, outcome: Result<(), SyncError>) -> Self {
        self.script.lock().unwrap().insert(0, outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<TokenPair> {
        self.seen.lock().unwrap().clone()
    }
}

impl CredentialRenewer for ScriptedRenewer {
    fn renew(&self, tokens: TokenPair) -> BoxFuture<'static, Result<TokenPair, SyncError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(tokens);
        let outcome = self.script.lock().unwrap().pop().unwrap_or(Ok(()));
        let access_token = access_token_for(&self.auth, self.lifetime);
        let latency = self.latency;

        async move {
            tokio::time::sleep(latency).await;
            outcome.map(|()| TokenPair {
                access_token,
                refresh_token: format!("refresh-token-{}", call + 1),
            })
        }
        .boxed()
    }
}
