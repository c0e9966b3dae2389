//! Debounced pharmacy search
//!
//! Each keystroke replaces the pending search; only the query that stays unchanged
//! for the quiet period reaches the backend. Results of a superseded query that
//! arrive late are dropped.

use super::paths;
use crate::client::api::HttpBackend;
use crate::client::sync::fetch::ResourceSlot;
use crate::client::task::TaskSlot;
use crate::shared::clinic::PharmacySummary;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(400);

pub struct PharmacySearch {
    backend: HttpBackend,
    results: ResourceSlot<Vec<PharmacySummary>>,
    debounce: TaskSlot,
    latest: Arc<AtomicU64>,
    delay: Duration,
}

impl PharmacySearch {
    pub fn new(backend: HttpBackend) -> Self {
        Self::with_delay(backend, SEARCH_DEBOUNCE)
    }

    pub fn with_delay(backend: HttpBackend, delay: Duration) -> Self {
        Self {
            backend,
            results: ResourceSlot::new("pharmacy-search"),
            debounce: TaskSlot::new("pharmacy-search"),
            latest: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    pub fn results(&self) -> &ResourceSlot<Vec<PharmacySummary>> {
        &self.results
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Update the query; a blank query clears the results without a request
    pub fn set_query(&self, query: &str) {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let query = query.trim().to_string();

        if query.is_empty() {
            self.debounce.cancel();
            self.results.reset(Vec::new());
            return;
        }

        let backend = self.backend.clone();
        let results = self.results.clone();
        let latest = Arc::clone(&self.latest);
        self.debounce.schedule(self.delay, async move {
            tracing::debug!("[FETCH] Searching pharmacies for {:?}", query);
            let params = [("q", query.as_str())];
            let request = backend.fetch_with_query::<Vec<PharmacySummary>, _>(paths::PHARMACY_SEARCH, &params);
            // Failure is recorded in the slot
            let _ = results
                .load_latest(request, || latest.load(Ordering::Acquire) == generation)
                .await;
        });
    }
}
