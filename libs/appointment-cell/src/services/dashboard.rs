use std::sync::Arc;

use tracing::{debug, warn};

use shared_database::{Direction, DocumentStore, Query};
use shared_utils::AppState;

use crate::models::{
    AppointmentDashboard, AppointmentError, AppointmentRecord, APPOINTMENTS_COLLECTION,
};

/// Split records already sorted soonest-first: scheduled ones stay in order,
/// everything else (completed, cancelled) is shown most recent first.
pub fn partition(records: Vec<AppointmentRecord>) -> AppointmentDashboard {
    let (upcoming, mut past): (Vec<_>, Vec<_>) =
        records.into_iter().partition(AppointmentRecord::is_upcoming);
    past.reverse();

    AppointmentDashboard { upcoming, past }
}

pub struct DashboardService {
    store: Arc<dyn DocumentStore>,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn for_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<AppointmentDashboard, AppointmentError> {
        self.load("doctor_id", doctor_id).await
    }

    pub async fn for_patient(
        &self,
        patient_id: &str,
    ) -> Result<AppointmentDashboard, AppointmentError> {
        self.load("patient_id", patient_id).await
    }

    async fn load(&self, field: &str, id: &str) -> Result<AppointmentDashboard, AppointmentError> {
        let query = Query::new()
            .where_eq(field, id)
            .order_by("date", Direction::Asc)
            .order_by("time", Direction::Asc);

        let docs = self.store.query(APPOINTMENTS_COLLECTION, &query).await?;
        let records: Vec<AppointmentRecord> = docs
            .iter()
            .filter_map(|doc| match doc.decode() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable appointment: {}", e);
                    None
                }
            })
            .collect();

        debug!("Loaded {} appointments where {} = {}", records.len(), field, id);
        Ok(partition(records))
    }
}
