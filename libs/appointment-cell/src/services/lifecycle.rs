use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use shared_database::DocumentStore;
use shared_models::auth::User;
use shared_utils::AppState;

use crate::models::{
    AppointmentError, AppointmentRecord, AppointmentStatus, APPOINTMENTS_COLLECTION,
};

/// Whether an appointment in `current` may be marked completed.
///
/// The appointment date is deliberately not consulted; doctors decide when a visit is done.
pub fn validate_completion(current: AppointmentStatus) -> Result<(), AppointmentError> {
    match current {
        AppointmentStatus::Scheduled | AppointmentStatus::Completed => Ok(()),
        AppointmentStatus::Cancelled | AppointmentStatus::NoShow => {
            warn!("Invalid status transition attempted: {} -> completed", current);
            Err(AppointmentError::InvalidStatusTransition(current))
        }
    }
}

pub struct LifecycleService {
    store: Arc<dyn DocumentStore>,
}

impl LifecycleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn mark_completed(
        &self,
        doctor: &User,
        appointment_id: &str,
    ) -> Result<AppointmentRecord, AppointmentError> {
        debug!("Marking appointment {} completed", appointment_id);

        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        let record: AppointmentRecord = doc.decode()?;

        if record.doctor_id != doctor.id {
            return Err(AppointmentError::NotYourAppointment);
        }
        validate_completion(record.status)?;

        if record.status == AppointmentStatus::Completed {
            debug!("Appointment {} already completed", appointment_id);
            return Ok(record);
        }

        let updated = self
            .store
            .update(
                APPOINTMENTS_COLLECTION,
                appointment_id,
                json!({ "status": AppointmentStatus::Completed }),
                Some(doc.version),
            )
            .await?;

        info!("Appointment {} marked completed", appointment_id);
        Ok(updated.decode()?)
    }
}
