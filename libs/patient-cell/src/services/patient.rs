use std::sync::Arc;

use tracing::{debug, warn};

use appointment_cell::services::DashboardService;
use shared_database::DocumentStore;
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{PatientDashboard, PatientError, PatientProfile, USERS_COLLECTION};

pub struct PatientService {
    store: Arc<dyn DocumentStore>,
    dashboards: DashboardService,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            dashboards: DashboardService::new(state),
        }
    }

    /// The signed-in patient's identity fields from `users/{uid}`.
    pub async fn get_profile(&self, user: &User) -> Result<PatientProfile, PatientError> {
        debug!("Fetching patient profile: {}", user.id);

        let doc = self
            .store
            .get(USERS_COLLECTION, &user.id)
            .await?
            .ok_or(PatientError::NotFound)?;
        let profile: PatientProfile = doc.decode()?;

        if profile.role != Role::Patient {
            warn!("User {} with role {} asked for a patient profile", user.id, profile.role);
            return Err(PatientError::Unauthorized);
        }

        Ok(profile)
    }

    pub async fn get_dashboard(&self, user: &User) -> Result<PatientDashboard, PatientError> {
        let profile = self.get_profile(user).await?;
        let appointments = self.dashboards.for_patient(&profile.id).await?;

        Ok(PatientDashboard {
            profile,
            appointments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_utils::test_utils::{TestConfig, TestUser};

    async fn state_with_user(user: &TestUser) -> AppState {
        let state = AppState::in_memory(TestConfig::default().to_app_config());
        state
            .store
            .create(
                USERS_COLLECTION,
                Some(&user.id),
                json!({"name": user.name, "email": user.email, "role": user.role, "created_at": null}),
            )
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn profile_comes_from_role_document() {
        let user = TestUser::patient("asha@example.com").named("Asha Nair");
        let service = PatientService::new(&state_with_user(&user).await);

        let profile = service.get_profile(&user.to_user()).await.unwrap();
        assert_eq!(profile.name, "Asha Nair");
        assert_eq!(profile.role, Role::Patient);
        assert!(profile.created_at.is_some());
    }

    #[tokio::test]
    async fn doctors_have_no_patient_profile() {
        let user = TestUser::doctor("rao@example.com");
        let service = PatientService::new(&state_with_user(&user).await);

        assert_matches!(
            service.get_profile(&user.to_user()).await,
            Err(PatientError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn missing_role_document_is_not_found() {
        let state = AppState::in_memory(TestConfig::default().to_app_config());
        let service = PatientService::new(&state);
        let user = TestUser::patient("ghost@example.com").to_user();

        assert_matches!(service.get_profile(&user).await, Err(PatientError::NotFound));
    }

    #[tokio::test]
    async fn new_patient_has_empty_dashboard() {
        let user = TestUser::patient("asha@example.com");
        let service = PatientService::new(&state_with_user(&user).await);

        let dashboard = service.get_dashboard(&user.to_user()).await.unwrap();
        assert!(dashboard.appointments.upcoming.is_empty());
        assert!(dashboard.appointments.past.is_empty());
    }
}
