//! Clinic and practitioner resources
//!
//! Wire shapes of the aggregates the client keeps in sync. Field names follow the
//! backend's camelCase JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of a clinic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Day of the week, serialized the way the backend spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Opening hours for one day, as "HH:MM" strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: Weekday,
    pub opens_at: String,
    pub closes_at: String,
    #[serde(default)]
    pub is_closed: bool,
}

/// The clinic's appointment schedule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub slots: Vec<ScheduleSlot>,
    /// Appointment length in minutes
    pub appointment_minutes: u32,
}

impl WeeklySchedule {
    /// Replace the slot for `slot.day`, or add it if the day has none
    pub fn upsert_slot(&mut self, slot: ScheduleSlot) {
        match self.slots.iter_mut().find(|s| s.day == slot.day) {
            Some(existing) => *existing = slot,
            None => {
                self.slots.push(slot);
                self.slots.sort_by_key(|s| s.day);
            }
        }
    }
}

/// Price of one service offered by the clinic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrice {
    pub service_id: Uuid,
    pub name: String,
    /// Price in minor currency units
    pub price: u64,
}

/// Pharmacy or laboratory suggested as a partner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSuggestion {
    pub id: Uuid,
    pub name: String,
    pub kind: PartnerKind,
    #[serde(default)]
    pub is_linked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerKind {
    Pharmacy,
    Laboratory,
}

/// Patient review of the clinic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub author: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Pharmacy search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacySummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
}

/// Editable doctor profile, split into the sub-resources the backend stores separately
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfileForm {
    pub profile: DoctorProfileFields,
    pub specialty: Option<String>,
    pub documents: Vec<DocumentRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfileFields {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Reference to an uploaded credential document (license, diploma, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub kind: String,
    pub url: String,
}
