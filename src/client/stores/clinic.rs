//! Clinic dashboard store
//!
//! Three editable aggregates (info, schedule, service prices) each behind a
//! [`MutationCoordinator`], and two read-only lists (partner suggestions, reviews)
//! in [`ResourceSlot`]s. All five load together through the [`FetchAggregator`].

use super::paths;
use crate::client::api::HttpBackend;
use crate::client::sync::fetch::{FetchAggregator, FetchJob, FetchReport, ResourceSlot};
use crate::client::sync::mutation::{ApplyPolicy, MutationCoordinator};
use crate::shared::clinic::{
    ClinicInfo, PartnerSuggestion, Review, ScheduleSlot, ServicePrice, WeeklySchedule,
};
use crate::shared::envelope::WriteAck;
use crate::shared::error::{FieldErrors, SyncError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct PriceUpdate {
    price: u64,
}

#[derive(Clone)]
pub struct ClinicStore {
    backend: HttpBackend,
    info: MutationCoordinator<ClinicInfo>,
    schedule: MutationCoordinator<WeeklySchedule>,
    prices: MutationCoordinator<Vec<ServicePrice>>,
    partners: ResourceSlot<Vec<PartnerSuggestion>>,
    reviews: ResourceSlot<Vec<Review>>,
}

impl ClinicStore {
    pub fn new(backend: HttpBackend) -> Self {
        let ttl = backend.config().success_message_ttl();
        let policy = ApplyPolicy::default();
        Self {
            info: MutationCoordinator::with_options("clinic-info", ClinicInfo::default(), policy, ttl),
            schedule: MutationCoordinator::with_options(
                "clinic-schedule",
                WeeklySchedule::default(),
                policy,
                ttl,
            ),
            prices: MutationCoordinator::with_options("service-prices", Vec::new(), policy, ttl),
            partners: ResourceSlot::new("partner-suggestions"),
            reviews: ResourceSlot::new("reviews"),
            backend,
        }
    }

    pub fn info(&self) -> &MutationCoordinator<ClinicInfo> {
        &self.info
    }

    pub fn schedule(&self) -> &MutationCoordinator<WeeklySchedule> {
        &self.schedule
    }

    pub fn prices(&self) -> &MutationCoordinator<Vec<ServicePrice>> {
        &self.prices
    }

    pub fn partners(&self) -> &ResourceSlot<Vec<PartnerSuggestion>> {
        &self.partners
    }

    pub fn reviews(&self) -> &ResourceSlot<Vec<Review>> {
        &self.reviews
    }

    /// Load every resource; one failing does not affect the others
    pub async fn refresh_all(&self) -> FetchReport {
        let backend = &self.backend;
        let jobs = vec![
            coordinator_job(&self.info, backend, paths::CLINIC_INFO),
            coordinator_job(&self.schedule, backend, paths::CLINIC_SCHEDULE),
            coordinator_job(&self.prices, backend, paths::CLINIC_SERVICES),
            self.partners.job(fetch_owned(backend, paths::PARTNER_SUGGESTIONS)),
            self.reviews.job(fetch_owned(backend, paths::CLINIC_REVIEWS)),
        ];
        FetchAggregator::fetch_all(jobs).await
    }

    pub async fn update_info(&self, edit: impl FnOnce(&mut ClinicInfo)) -> Result<WriteAck, SyncError> {
        let mut next = self.info.value();
        edit(&mut next);
        let backend = self.backend.clone();
        self.info
            .apply(next, |info| async move { backend.put(paths::CLINIC_INFO, &info).await })
            .await
    }

    pub async fn update_schedule(
        &self,
        edit: impl FnOnce(&mut WeeklySchedule),
    ) -> Result<WriteAck, SyncError> {
        let mut next = self.schedule.value();
        edit(&mut next);
        let backend = self.backend.clone();
        self.schedule
            .apply(next, |schedule| async move {
                backend.put(paths::CLINIC_SCHEDULE, &schedule).await
            })
            .await
    }

    pub async fn set_schedule_slot(&self, slot: ScheduleSlot) -> Result<WriteAck, SyncError> {
        self.update_schedule(|schedule| schedule.upsert_slot(slot)).await
    }

    /// Change the price of one listed service
    pub async fn set_service_price(&self, service_id: Uuid, price: u64) -> Result<WriteAck, SyncError> {
        let mut next = self.prices.value();
        let Some(service) = next.iter_mut().find(|s| s.service_id == service_id) else {
            return Err(SyncError::validation(
                format!("Unknown service {}", service_id),
                FieldErrors::new(),
            ));
        };
        service.price = price;

        let backend = self.backend.clone();
        let path = paths::service_price(&service_id);
        self.prices
            .apply(next, |_| async move {
                backend.put(&path, &PriceUpdate { price }).await
            })
            .await
    }
}

fn fetch_owned<T>(
    backend: &HttpBackend,
    path: &'static str,
) -> impl std::future::Future<Output = Result<T, SyncError>> + Send + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    let backend = backend.clone();
    async move { backend.fetch(path).await }
}

/// Load an aggregate into its coordinator; the error lands in the coordinator state
fn coordinator_job<T>(
    coordinator: &MutationCoordinator<T>,
    backend: &HttpBackend,
    path: &'static str,
) -> FetchJob
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let coordinator = coordinator.clone();
    let fetch = fetch_owned::<T>(backend, path);
    FetchJob::new(coordinator.name(), async move {
        match fetch.await {
            Ok(value) => {
                coordinator.set_confirmed(value);
                Ok(())
            }
            Err(e) => {
                coordinator.record_error(e.clone());
                Err(e)
            }
        }
    })
}
