//! Per-resource stores built on the sync coordinators.

pub mod clinic;
pub mod pharmacy;
pub mod profile;

pub use clinic::ClinicStore;
pub use pharmacy::PharmacySearch;
pub use profile::{open_profile_editor, DoctorProfileTarget, ProfileEditor};

/// Backend resource paths used by the stores
pub mod paths {
    pub const CLINIC_INFO: &str = "/api/clinic/info";
    pub const CLINIC_SCHEDULE: &str = "/api/clinic/schedule";
    pub const CLINIC_SERVICES: &str = "/api/clinic/services";
    pub const PARTNER_SUGGESTIONS: &str = "/api/clinic/partners/suggestions";
    pub const CLINIC_REVIEWS: &str = "/api/clinic/reviews";

    pub const DOCTOR_PROFILE: &str = "/api/doctor/profile";
    pub const DOCTOR_SPECIALTY: &str = "/api/doctor/specialty";
    pub const DOCTOR_DOCUMENTS: &str = "/api/doctor/documents";

    pub const PHARMACY_SEARCH: &str = "/api/pharmacies/search";

    pub fn service_price(service_id: &uuid::Uuid) -> String {
        format!("{}/{}/price", CLINIC_SERVICES, service_id)
    }

    pub fn doctor_document(kind: &str) -> String {
        format!("{}/{}", DOCTOR_DOCUMENTS, kind)
    }
}
