use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{DoctorProfile, SlotLabel, DOCTORS_COLLECTION};
use shared_database::{DocumentStore, Query, StoreError, WriteOp};
use shared_models::auth::User;
use shared_utils::AppState;

use crate::models::{
    AppointmentError, AppointmentRecord, AppointmentStatus, BookingRequest, BookingResponse,
    APPOINTMENTS_COLLECTION, MAX_BOOKING_ATTEMPTS, PATIENT_DASHBOARD_ROUTE, SELECT_DATE_AND_TIME,
};

/// A validated booking request.
#[derive(Debug, Clone)]
struct SlotClaim {
    doctor_id: String,
    date: NaiveDate,
    time: SlotLabel,
}

impl SlotClaim {
    fn from_request(request: &BookingRequest) -> Result<Self, AppointmentError> {
        let missing = || AppointmentError::Validation(SELECT_DATE_AND_TIME.to_string());

        let date = request.date.ok_or_else(missing)?;
        let time = request
            .time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(missing)?;
        let time = SlotLabel::parse(time).map_err(|e| AppointmentError::Validation(e.to_string()))?;

        if request.doctor_id.trim().is_empty() {
            return Err(AppointmentError::Validation("A doctor must be selected.".to_string()));
        }

        Ok(Self {
            doctor_id: request.doctor_id.trim().to_string(),
            date,
            time,
        })
    }
}

/// Turns a slot selection into an appointment while claiming the slot from the
/// doctor's availability in the same write.
pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    redirect_delay_ms: u64,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            redirect_delay_ms: state.config.booking_redirect_delay_ms,
        }
    }

    pub async fn book(
        &self,
        patient: &User,
        request: BookingRequest,
    ) -> Result<BookingResponse, AppointmentError> {
        let claim = SlotClaim::from_request(&request)?;
        debug!(
            "Booking {} {} with doctor {} for patient {}",
            claim.date, claim.time, claim.doctor_id, patient.id
        );

        let mut attempt = 1;
        let appointment = loop {
            match self.try_book(patient, &claim, &request).await {
                Ok(record) => break record,
                Err(AppointmentError::Store(StoreError::VersionConflict { .. }))
                    if attempt < MAX_BOOKING_ATTEMPTS =>
                {
                    warn!(
                        "Doctor {} changed during booking (attempt {}), re-checking the slot",
                        claim.doctor_id, attempt
                    );
                    attempt += 1;
                }
                Err(AppointmentError::Store(StoreError::VersionConflict { .. })) => {
                    warn!(
                        "Giving up on doctor {} after {} contended attempts",
                        claim.doctor_id, attempt
                    );
                    return Err(AppointmentError::BookingFailed);
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "Booked appointment {} ({} {}) with doctor {}",
            appointment.id, appointment.date, appointment.time, appointment.doctor_id
        );

        Ok(BookingResponse {
            appointment,
            redirect_to: PATIENT_DASHBOARD_ROUTE.to_string(),
            redirect_after_ms: self.redirect_delay_ms,
        })
    }

    async fn try_book(
        &self,
        patient: &User,
        claim: &SlotClaim,
        request: &BookingRequest,
    ) -> Result<AppointmentRecord, AppointmentError> {
        let doc = self
            .store
            .get(DOCTORS_COLLECTION, &claim.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;
        let doctor: DoctorProfile = doc.decode()?;

        if !doctor.availability.has_slot(claim.date, &claim.time) {
            warn!(
                "Slot {} {} is not open for doctor {}",
                claim.date, claim.time, claim.doctor_id
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        if self.slot_taken(claim).await? {
            warn!(
                "Slot {} {} for doctor {} already has a scheduled appointment",
                claim.date, claim.time, claim.doctor_id
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        let record = AppointmentRecord {
            id: Uuid::new_v4().to_string(),
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            doctor_specialty: doctor.specialty.clone(),
            patient_id: patient.id.clone(),
            patient_name: patient.display_name().unwrap_or_else(|| "Patient".to_string()),
            date: claim.date,
            time: claim.time.clone(),
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            fee: doctor.consultation_fee,
            created_at: None,
        };

        let remaining = doctor.availability.without_slot(claim.date, &claim.time);
        let ops = vec![
            WriteOp::Update {
                collection: DOCTORS_COLLECTION.to_string(),
                id: doctor.id.clone(),
                patch: json!({ "availability": remaining }),
                expected_version: Some(doc.version),
            },
            WriteOp::Create {
                collection: APPOINTMENTS_COLLECTION.to_string(),
                id: Some(record.id.clone()),
                data: record_document(&record)?,
            },
        ];

        let written = self.store.commit_batch(ops).await.map_err(|e| match e {
            StoreError::VersionConflict { .. } => AppointmentError::Store(e),
            StoreError::NotFound(_) => AppointmentError::DoctorNotFound,
            other => {
                error!("Booking write rejected for doctor {}: {}", claim.doctor_id, other);
                AppointmentError::BookingFailed
            }
        })?;

        if let Some(doc) = written.iter().find(|d| d.id == record.id) {
            return Ok(doc.decode()?);
        }

        // Some backends acknowledge a batch without echoing rows
        match self.store.get(APPOINTMENTS_COLLECTION, &record.id).await? {
            Some(doc) => Ok(doc.decode()?),
            None => {
                warn!("Appointment {} was not readable after booking", record.id);
                Ok(record)
            }
        }
    }

    async fn slot_taken(&self, claim: &SlotClaim) -> Result<bool, AppointmentError> {
        let query = Query::new()
            .where_eq("doctor_id", claim.doctor_id.as_str())
            .where_eq("date", claim.date.to_string())
            .where_eq("time", claim.time.as_str())
            .where_eq("status", AppointmentStatus::Scheduled.as_str());

        let existing = self.store.query(APPOINTMENTS_COLLECTION, &query).await?;
        Ok(!existing.is_empty())
    }
}

/// Document body for `appointments/{id}`: no id, `created_at` left for the store to stamp.
fn record_document(record: &AppointmentRecord) -> Result<Value, AppointmentError> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| AppointmentError::Store(StoreError::Serialization(e.to_string())))?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("id");
        fields.insert("created_at".to_string(), Value::Null);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(date: Option<&str>, time: Option<&str>) -> BookingRequest {
        BookingRequest {
            doctor_id: "d-1".to_string(),
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            time: time.map(str::to_string),
            appointment_type: Default::default(),
            notes: None,
        }
    }

    #[test]
    fn claim_requires_date_and_time() {
        assert_matches!(
            SlotClaim::from_request(&request(None, Some("09:00"))),
            Err(AppointmentError::Validation(msg)) if msg == SELECT_DATE_AND_TIME
        );
        assert_matches!(
            SlotClaim::from_request(&request(Some("2025-06-01"), Some(" "))),
            Err(AppointmentError::Validation(_))
        );
    }

    #[test]
    fn claim_rejects_labels_outside_catalog() {
        assert_matches!(
            SlotClaim::from_request(&request(Some("2025-06-01"), Some("13:00"))),
            Err(AppointmentError::Validation(_))
        );
        let claim = SlotClaim::from_request(&request(Some("2025-06-01"), Some("09:00"))).unwrap();
        assert_eq!(claim.time.as_str(), "09:00");
    }

    #[test]
    fn record_document_leaves_timestamp_to_store() {
        let record = AppointmentRecord {
            id: "a-1".to_string(),
            doctor_id: "d-1".to_string(),
            doctor_name: "Dr. Rao".to_string(),
            doctor_specialty: "Cardiology".to_string(),
            patient_id: "p-1".to_string(),
            patient_name: "Asha".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: SlotLabel::parse("09:00").unwrap(),
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: None,
            fee: 700,
            created_at: None,
        };

        let doc = record_document(&record).unwrap();
        assert!(doc.get("id").is_none());
        assert!(doc["created_at"].is_null());
        assert_eq!(doc["status"], "scheduled");
        assert_eq!(doc["date"], "2025-06-01");
    }
}
