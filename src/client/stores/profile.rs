//! Doctor profile auto-save
//!
//! The backend stores a doctor's profile as separate resources: the profile
//! fields, the specialty and the uploaded documents. Each has its own
//! [`MutationCoordinator`] holding the last confirmed server value, so a commit
//! only writes the parts that differ from it and a failed document upload rolls
//! back on its own without undoing a saved bio.

use super::paths;
use crate::client::api::HttpBackend;
use crate::client::join::{join_settled, FetchResult};
use crate::client::sync::autosave::{AutoSaveCoordinator, AutoSaveTarget, AutoSaveTiming};
use crate::client::sync::MutationCoordinator;
use crate::shared::clinic::{DoctorProfileFields, DoctorProfileForm, DocumentRef};
use crate::shared::envelope::WriteAck;
use crate::shared::error::SyncError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct SpecialtyUpdate {
    specialty: String,
}

type SubWrite = BoxFuture<'static, Result<WriteAck, SyncError>>;

#[derive(Clone)]
pub struct DoctorProfileTarget {
    backend: HttpBackend,
    profile: MutationCoordinator<DoctorProfileFields>,
    specialty: MutationCoordinator<Option<String>>,
    documents: MutationCoordinator<Vec<DocumentRef>>,
}

impl DoctorProfileTarget {
    /// `confirmed` is the profile as last loaded from the server
    pub fn new(backend: HttpBackend, confirmed: &DoctorProfileForm) -> Self {
        Self {
            backend,
            profile: MutationCoordinator::new("doctor-profile", confirmed.profile.clone()),
            specialty: MutationCoordinator::new("doctor-specialty", confirmed.specialty.clone()),
            documents: MutationCoordinator::new("doctor-documents", confirmed.documents.clone()),
        }
    }

    pub fn profile(&self) -> &MutationCoordinator<DoctorProfileFields> {
        &self.profile
    }

    pub fn specialty(&self) -> &MutationCoordinator<Option<String>> {
        &self.specialty
    }

    pub fn documents(&self) -> &MutationCoordinator<Vec<DocumentRef>> {
        &self.documents
    }

    /// Take a server value as the confirmed state of every part
    fn adopt(&self, form: &DoctorProfileForm) {
        self.profile.refresh_value(form.profile.clone());
        self.specialty.refresh_value(form.specialty.clone());
        self.documents.refresh_value(form.documents.clone());
    }

    /// One optimistic apply per part that differs from its confirmed value
    fn sub_writes(&self, form: DoctorProfileForm) -> Vec<SubWrite> {
        let DoctorProfileForm {
            profile,
            specialty,
            documents,
        } = form;
        let mut writes = Vec::with_capacity(3);

        if profile != self.profile.value() {
            let coordinator = self.profile.clone();
            let backend = self.backend.clone();
            writes.push(
                async move {
                    coordinator
                        .apply(profile, |fields| async move {
                            backend.put(paths::DOCTOR_PROFILE, &fields).await
                        })
                        .await
                }
                .boxed(),
            );
        }

        if specialty != self.specialty.value() {
            match specialty.clone() {
                Some(name) => {
                    let coordinator = self.specialty.clone();
                    let backend = self.backend.clone();
                    writes.push(
                        async move {
                            coordinator
                                .apply(specialty, |_| async move {
                                    backend
                                        .put(paths::DOCTOR_SPECIALTY, &SpecialtyUpdate { specialty: name })
                                        .await
                                })
                                .await
                        }
                        .boxed(),
                    );
                }
                None => tracing::debug!("[AUTOSAVE] Specialty cleared locally, nothing to write"),
            }
        }

        let confirmed = self.documents.value();
        let added: Vec<DocumentRef> = documents
            .iter()
            .filter(|document| !confirmed.contains(document))
            .cloned()
            .collect();
        let removed: Vec<String> = confirmed
            .iter()
            .filter(|document| !documents.contains(document))
            .map(|document| document.kind.clone())
            .collect();
        if !added.is_empty() || !removed.is_empty() {
            let coordinator = self.documents.clone();
            let backend = self.backend.clone();
            writes.push(
                async move {
                    coordinator
                        .apply(documents, |_| sync_documents(backend, added, removed))
                        .await
                }
                .boxed(),
            );
        }

        writes
    }
}

/// Upload new documents and delete removed ones concurrently.
///
/// Fails with the first error if any request failed; the refresh that follows a
/// partly successful save picks up whatever did land.
async fn sync_documents(
    backend: HttpBackend,
    added: Vec<DocumentRef>,
    removed: Vec<String>,
) -> Result<WriteAck, SyncError> {
    let mut requests: Vec<SubWrite> = Vec::with_capacity(added.len() + removed.len());
    for document in added {
        let backend = backend.clone();
        requests.push(async move { backend.post(paths::DOCTOR_DOCUMENTS, &document).await }.boxed());
    }
    for kind in removed {
        let backend = backend.clone();
        requests.push(async move { backend.delete(&paths::doctor_document(&kind)).await }.boxed());
    }

    let mut last_ack = WriteAck::default();
    for outcome in join_settled(requests).await {
        match outcome {
            FetchResult::Fulfilled(ack) => last_ack = ack,
            FetchResult::Rejected(e) => return Err(e),
        }
    }
    Ok(last_ack)
}

impl AutoSaveTarget<DoctorProfileForm> for DoctorProfileTarget {
    fn commit(&self, form: DoctorProfileForm) -> BoxFuture<'static, Vec<Result<WriteAck, SyncError>>> {
        let writes = self.sub_writes(form);
        async move {
            join_settled(writes)
                .await
                .into_iter()
                .map(FetchResult::into_result)
                .collect()
        }
        .boxed()
    }

    fn refresh(&self) -> BoxFuture<'static, Result<DoctorProfileForm, SyncError>> {
        let target = self.clone();
        async move {
            let form: DoctorProfileForm = target.backend.fetch(paths::DOCTOR_PROFILE).await?;
            target.adopt(&form);
            Ok(form)
        }
        .boxed()
    }
}

/// An auto-saved profile form plus the per-part write state behind it
pub struct ProfileEditor {
    form: AutoSaveCoordinator<DoctorProfileForm>,
    parts: Arc<DoctorProfileTarget>,
}

impl ProfileEditor {
    pub fn form(&self) -> &AutoSaveCoordinator<DoctorProfileForm> {
        &self.form
    }

    /// Pending, error and success message of each sub-resource
    pub fn parts(&self) -> &DoctorProfileTarget {
        &self.parts
    }
}

/// Load the profile and wrap it in an auto-save coordinator timed from config
pub async fn open_profile_editor(backend: &HttpBackend) -> Result<ProfileEditor, SyncError> {
    let initial: DoctorProfileForm = backend.fetch(paths::DOCTOR_PROFILE).await?;
    let timing = AutoSaveTiming {
        commit_delay: backend.config().commit_delay(),
        settle_delay: backend.config().settle_delay(),
    };
    let parts = Arc::new(DoctorProfileTarget::new(backend.clone(), &initial));
    let target: Arc<dyn AutoSaveTarget<DoctorProfileForm>> = parts.clone();
    let form = AutoSaveCoordinator::new("doctor-profile", initial, target, timing)?;
    Ok(ProfileEditor { form, parts })
}
