use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, error, info, warn};

use shared_database::{Document, DocumentStore, StoreError};
use shared_utils::AppState;

use crate::models::{
    AvailabilityError, AvailabilityLedger, AvailabilityResponse, PreviewAvailabilityRequest,
    SlotLabel, DOCTORS_COLLECTION,
};

/// Stage `template` onto every date in `dates`. An empty template clears those days;
/// dates outside the selection are left alone.
pub fn apply_template_to_dates(
    dates: &[NaiveDate],
    template: &[SlotLabel],
    current: &AvailabilityLedger,
) -> Result<AvailabilityLedger, AvailabilityError> {
    if dates.is_empty() {
        return Err(AvailabilityError::NoDatesSelected);
    }

    let mut next = current.clone();
    for date in dates {
        next.upsert(*date, template.to_vec());
    }
    Ok(next)
}

pub(crate) fn ledger_from_document(doc: &Document) -> Result<AvailabilityLedger, StoreError> {
    match doc.field("availability") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Serialization(format!("{} availability: {}", doc.id, e))),
        _ => Ok(AvailabilityLedger::new()),
    }
}

/// One doctor's editing session: the ledger as loaded, the staged edits on top of it
/// and the version the commit will be conditioned on.
pub struct AvailabilityEditor {
    store: Arc<dyn DocumentStore>,
    doctor_id: String,
    version: u64,
    ledger: AvailabilityLedger,
}

impl AvailabilityEditor {
    pub async fn load(
        store: Arc<dyn DocumentStore>,
        doctor_id: &str,
    ) -> Result<Self, AvailabilityError> {
        debug!("Loading availability for doctor: {}", doctor_id);

        let doc = store
            .get(DOCTORS_COLLECTION, doctor_id)
            .await?
            .ok_or(AvailabilityError::DoctorNotFound)?;
        let ledger = ledger_from_document(&doc)?;

        Ok(Self {
            store,
            doctor_id: doctor_id.to_string(),
            version: doc.version,
            ledger,
        })
    }

    /// Resume an edit made elsewhere (e.g. a client-held draft) against a known version.
    pub fn resume(
        store: Arc<dyn DocumentStore>,
        doctor_id: &str,
        version: u64,
        ledger: AvailabilityLedger,
    ) -> Self {
        Self {
            store,
            doctor_id: doctor_id.to_string(),
            version,
            ledger,
        }
    }

    pub fn ledger(&self) -> &AvailabilityLedger {
        &self.ledger
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn apply(
        &mut self,
        dates: &[NaiveDate],
        template: &[SlotLabel],
    ) -> Result<&AvailabilityLedger, AvailabilityError> {
        self.ledger = apply_template_to_dates(dates, template, &self.ledger)?;
        Ok(&self.ledger)
    }

    /// Prune empty days and overwrite the stored ledger, provided nobody else wrote
    /// the profile since it was loaded. On failure the staged ledger is kept as is.
    pub async fn commit(&mut self) -> Result<AvailabilityLedger, AvailabilityError> {
        let pruned = self.ledger.pruned();
        let patch = json!({ "availability": pruned });

        let doc = self
            .store
            .update(DOCTORS_COLLECTION, &self.doctor_id, patch, Some(self.version))
            .await
            .map_err(|e| match e {
                StoreError::VersionConflict { expected, actual } => {
                    warn!(
                        "Availability for doctor {} changed concurrently (expected v{}, found {:?})",
                        self.doctor_id, expected, actual
                    );
                    AvailabilityError::VersionConflict
                }
                StoreError::NotFound(_) => AvailabilityError::DoctorNotFound,
                other => {
                    error!("Failed to save availability for doctor {}: {}", self.doctor_id, other);
                    AvailabilityError::SaveFailed(other.to_string())
                }
            })?;

        self.version = doc.version;
        self.ledger = pruned;
        info!(
            "Committed {} availability days for doctor {} (v{})",
            self.ledger.len(),
            self.doctor_id,
            self.version
        );
        Ok(self.ledger.clone())
    }
}

pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn get(&self, doctor_id: &str) -> Result<AvailabilityResponse, AvailabilityError> {
        let editor = AvailabilityEditor::load(self.store.clone(), doctor_id).await?;
        Ok(AvailabilityResponse {
            doctor_id: doctor_id.to_string(),
            availability: editor.ledger().clone(),
            version: editor.version(),
        })
    }

    pub fn preview(
        &self,
        request: &PreviewAvailabilityRequest,
    ) -> Result<AvailabilityLedger, AvailabilityError> {
        apply_template_to_dates(&request.dates, &request.slots, &request.availability)
    }

    pub async fn commit(
        &self,
        doctor_id: &str,
        ledger: AvailabilityLedger,
        expected_version: u64,
    ) -> Result<AvailabilityResponse, AvailabilityError> {
        let mut editor =
            AvailabilityEditor::resume(self.store.clone(), doctor_id, expected_version, ledger);
        let availability = editor.commit().await?;

        Ok(AvailabilityResponse {
            doctor_id: doctor_id.to_string(),
            availability,
            version: editor.version(),
        })
    }
}
