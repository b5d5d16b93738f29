use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

/// Canonical appointment time labels offered across all doctors, in chronological order.
pub const SLOT_CATALOG: [&str; 12] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30",
    "14:00", "14:30", "15:00", "15:30", "16:00", "16:30",
];

pub const SPECIALTIES: [&str; 12] = [
    "Cardiology",
    "Dermatology",
    "Endocrinology",
    "Gastroenterology",
    "Neurology",
    "Orthopedics",
    "Pediatrics",
    "Psychiatry",
    "General Medicine",
    "Gynecology",
    "Ophthalmology",
    "ENT",
];

pub const QUALIFICATIONS: [&str; 6] = ["MBBS", "MD", "MS", "DNB", "FRCS", "MRCP"];

pub const CITIES: [&str; 8] = [
    "Mumbai", "Delhi", "Bangalore", "Chennai", "Kolkata", "Hyderabad", "Pune", "Ahmedabad",
];

pub const DEFAULT_RATING: f64 = 4.5;
pub const DEFAULT_ADDRESS: &str = "To be updated";
pub const REQUIRED_FIELDS_MISSING: &str = "Please fill out all required fields.";
pub const NO_DATES_SELECTED: &str = "Please select at least one date.";

pub const DOCTORS_COLLECTION: &str = "doctors";
pub const DOCTOR_DASHBOARD_ROUTE: &str = "/doctor/dashboard";

/// A time label drawn from `SLOT_CATALOG`. Lexicographic order is chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotLabel(String);

impl SlotLabel {
    pub fn parse(label: &str) -> Result<Self, AvailabilityError> {
        let label = label.trim();
        if SLOT_CATALOG.contains(&label) {
            Ok(SlotLabel(label.to_string()))
        } else {
            Err(AvailabilityError::UnknownSlot(label.to_string()))
        }
    }

    pub fn catalog() -> Vec<SlotLabel> {
        SLOT_CATALOG.iter().map(|s| SlotLabel(s.to_string())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SlotLabel {
    type Error = AvailabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SlotLabel::parse(&value)
    }
}

impl From<SlotLabel> for String {
    fn from(label: SlotLabel) -> Self {
        label.0
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    pub date: NaiveDate,
    pub slots: Vec<SlotLabel>,
}

/// Per-doctor mapping from calendar date to open slots, kept in date order.
///
/// A staged ledger may hold empty days; `pruned()` drops them before persisting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AvailabilityEntry>", into = "Vec<AvailabilityEntry>")]
pub struct AvailabilityLedger {
    entries: Vec<AvailabilityEntry>,
}

impl AvailabilityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<AvailabilityEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            ledger.upsert(entry.date, entry.slots);
        }
        ledger
    }

    pub fn entries(&self) -> &[AvailabilityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn slots_for(&self, date: NaiveDate) -> Option<&[SlotLabel]> {
        self.entries
            .iter()
            .find(|entry| entry.date == date)
            .map(|entry| entry.slots.as_slice())
    }

    pub fn has_slot(&self, date: NaiveDate, slot: &SlotLabel) -> bool {
        self.slots_for(date).is_some_and(|slots| slots.contains(slot))
    }

    /// Replace the slots for `date` with a sorted, deduplicated copy of `slots`.
    pub fn upsert(&mut self, date: NaiveDate, slots: Vec<SlotLabel>) {
        let mut slots = slots;
        slots.sort();
        slots.dedup();

        match self.entries.binary_search_by_key(&date, |entry| entry.date) {
            Ok(index) => self.entries[index].slots = slots,
            Err(index) => self.entries.insert(index, AvailabilityEntry { date, slots }),
        }
    }

    pub fn pruned(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| !entry.slots.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// The ledger with `slot` removed from `date`; a day left empty is dropped.
    pub fn without_slot(&self, date: NaiveDate, slot: &SlotLabel) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.iter_mut().find(|entry| entry.date == date) {
            entry.slots.retain(|s| s != slot);
        }
        next.entries.retain(|entry| entry.date != date || !entry.slots.is_empty());
        next
    }
}

impl From<Vec<AvailabilityEntry>> for AvailabilityLedger {
    fn from(entries: Vec<AvailabilityEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<AvailabilityLedger> for Vec<AvailabilityEntry> {
    fn from(ledger: AvailabilityLedger) -> Self {
        ledger.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub name: String,
    pub address: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub qualification: String,
    pub specialty: String,
    pub experience: u32,
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    pub consultation_fee: u32,
    pub profile_image: String,
    pub bio: String,
    pub clinic: Clinic,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub professional_memberships: Vec<String>,
    #[serde(default)]
    pub availability: AvailabilityLedger,
}

impl DoctorProfile {
    /// Document body as stored under `doctors/{id}`; the id lives in the key.
    pub fn to_document(&self) -> Result<serde_json::Value, DoctorError> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| DoctorError::Internal(e.to_string()))?;
        if let Some(fields) = value.as_object_mut() {
            fields.remove("id");
        }
        Ok(value)
    }
}

fn default_qualification() -> String {
    "MBBS".to_string()
}

fn default_specialty() -> String {
    "General Medicine".to_string()
}

fn default_experience() -> u32 {
    5
}

fn default_city() -> String {
    "Mumbai".to_string()
}

fn default_fee() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingRequest {
    #[serde(default = "default_qualification")]
    pub qualification: String,
    #[serde(default = "default_specialty")]
    pub specialty: String,
    #[serde(default = "default_experience")]
    pub experience: u32,
    #[serde(default)]
    pub workplace: String,
    #[serde(default = "default_city")]
    pub city: String,
    /// Comma-separated free text.
    #[serde(default)]
    pub skills: String,
    #[serde(default = "default_fee")]
    pub consultation_fee: u32,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Rating,
    Experience,
    Fee,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub city: Option<String>,
    pub max_fee: Option<u32>,
    pub min_rating: Option<f64>,
    pub min_experience: Option<u32>,
    pub sort_by: SortBy,
    pub search_clinic: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewAvailabilityRequest {
    #[serde(default)]
    pub availability: AvailabilityLedger,
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub slots: Vec<SlotLabel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAvailabilityRequest {
    pub availability: AvailabilityLedger,
    pub expected_version: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub doctor_id: String,
    pub availability: AvailabilityLedger,
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Only doctors can manage a doctor profile")]
    NotADoctor,

    #[error("Failed to create profile. Please try again.")]
    ProfileWriteFailed,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::Validation(msg) => AppError::ValidationError(msg),
            DoctorError::NotADoctor => AppError::Forbidden(err.to_string()),
            DoctorError::ProfileWriteFailed => AppError::Database(err.to_string()),
            DoctorError::Internal(msg) => AppError::Internal(msg),
            DoctorError::Store(e) => e.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("{}", NO_DATES_SELECTED)]
    NoDatesSelected,

    #[error("Unknown time slot '{0}'")]
    UnknownSlot(String),

    #[error("Doctor profile not found")]
    DoctorNotFound,

    #[error("Availability was changed elsewhere; reload and try again")]
    VersionConflict,

    #[error("Failed to save availability: {0}")]
    SaveFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::NoDatesSelected | AvailabilityError::UnknownSlot(_) => {
                AppError::ValidationError(err.to_string())
            }
            AvailabilityError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AvailabilityError::VersionConflict => AppError::Conflict(err.to_string()),
            AvailabilityError::SaveFailed(_) => AppError::Database(err.to_string()),
            AvailabilityError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn slots(labels: &[&str]) -> Vec<SlotLabel> {
        labels.iter().map(|l| SlotLabel::parse(l).unwrap()).collect()
    }

    #[test]
    fn slot_labels_must_come_from_catalog() {
        assert!(SlotLabel::parse("09:30").is_ok());
        assert!(matches!(SlotLabel::parse("12:00"), Err(AvailabilityError::UnknownSlot(_))));
        assert!(serde_json::from_str::<SlotLabel>("\"13:15\"").is_err());
    }

    #[test]
    fn catalog_order_is_chronological() {
        let mut catalog = SlotLabel::catalog();
        let original = catalog.clone();
        catalog.sort();
        assert_eq!(catalog, original);
    }

    #[test]
    fn upsert_keeps_dates_ordered_and_slots_unique() {
        let mut ledger = AvailabilityLedger::new();
        ledger.upsert(date("2025-06-02"), slots(&["10:00"]));
        ledger.upsert(date("2025-06-01"), slots(&["14:00", "09:00", "14:00"]));

        let dates: Vec<NaiveDate> = ledger.entries().iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date("2025-06-01"), date("2025-06-02")]);
        assert_eq!(
            ledger.slots_for(date("2025-06-01")).unwrap(),
            slots(&["09:00", "14:00"]).as_slice()
        );
    }

    #[test]
    fn without_slot_drops_emptied_day() {
        let ledger = AvailabilityLedger::from_entries(vec![
            AvailabilityEntry {
                date: date("2025-06-01"),
                slots: slots(&["09:00"]),
            },
            AvailabilityEntry {
                date: date("2025-06-02"),
                slots: slots(&["09:00", "09:30"]),
            },
        ]);

        let next = ledger.without_slot(date("2025-06-01"), &slots(&["09:00"])[0]);
        assert_eq!(next.len(), 1);
        assert!(next.slots_for(date("2025-06-01")).is_none());

        let next = ledger.without_slot(date("2025-06-02"), &slots(&["09:30"])[0]);
        assert_eq!(next.slots_for(date("2025-06-02")).unwrap(), slots(&["09:00"]).as_slice());
    }

    #[test]
    fn ledger_serializes_as_entry_list() {
        let ledger = AvailabilityLedger::from_entries(vec![AvailabilityEntry {
            date: date("2025-06-01"),
            slots: slots(&["09:00"]),
        }]);
        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(value, serde_json::json!([{"date": "2025-06-01", "slots": ["09:00"]}]));
    }
}
