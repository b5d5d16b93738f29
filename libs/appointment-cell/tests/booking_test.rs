use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    AppointmentError, AppointmentStatus, BookingRequest, BookingService, DashboardService,
    LifecycleService,
};
use doctor_cell::models::{AvailabilityLedger, SlotLabel, DOCTORS_COLLECTION};
use doctor_cell::services::{apply_template_to_dates, DoctorService};
use shared_database::{Document, DocumentStore, Query, StoreError, Subscription, WriteOp};
use shared_models::auth::User;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};
use shared_utils::AppState;

const DOCTOR_ID: &str = "doctor-001";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn slots(labels: &[&str]) -> Vec<SlotLabel> {
    labels.iter().map(|l| SlotLabel::parse(l).unwrap()).collect()
}

/// In-memory state with one doctor open on 2025-06-01 at 09:00 and 09:30.
async fn state_with_doctor() -> Arc<AppState> {
    let state = TestConfig::default().to_state();
    let ledger = apply_template_to_dates(
        &[date("2025-06-01")],
        &slots(&["09:00", "09:30"]),
        &AvailabilityLedger::new(),
    )
    .unwrap();

    let availability = serde_json::to_value(&ledger).unwrap();
    let mut row = MockSupabaseResponses::doctor_row(DOCTOR_ID, availability);
    if let Some(fields) = row.as_object_mut() {
        fields.remove("id");
        fields.remove("version");
    }
    state.store.set(DOCTORS_COLLECTION, DOCTOR_ID, row).await.unwrap();
    state
}

fn booking(time: &str) -> BookingRequest {
    BookingRequest {
        doctor_id: DOCTOR_ID.to_string(),
        date: Some(date("2025-06-01")),
        time: Some(time.to_string()),
        appointment_type: Default::default(),
        notes: None,
    }
}

#[tokio::test]
async fn booked_slot_shows_on_both_dashboards() {
    let state = state_with_doctor().await;
    let patient = TestUser::patient("asha@example.com").named("Asha Nair").to_user();

    let response = BookingService::new(&state)
        .book(&patient, booking("09:00"))
        .await
        .unwrap();

    let appointment = &response.appointment;
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.patient_name, "Asha Nair");
    assert_eq!(appointment.doctor_name, "Dr. Test Doctor");
    assert_eq!(appointment.fee, 800);
    assert!(appointment.created_at.is_some());
    assert_eq!(response.redirect_to, "/dashboard");
    assert_eq!(response.redirect_after_ms, 0);

    let dashboards = DashboardService::new(&state);
    let patient_view = dashboards.for_patient(&patient.id).await.unwrap();
    let doctor_view = dashboards.for_doctor(DOCTOR_ID).await.unwrap();
    assert_eq!(patient_view.upcoming, vec![appointment.clone()]);
    assert_eq!(doctor_view.upcoming, vec![appointment.clone()]);
    assert!(patient_view.past.is_empty());

    // The claimed slot leaves the doctor's availability
    let doctor = DoctorService::new(&state).get_doctor(DOCTOR_ID).await.unwrap();
    assert!(!doctor.availability.has_slot(date("2025-06-01"), &slots(&["09:00"])[0]));
    assert!(doctor.availability.has_slot(date("2025-06-01"), &slots(&["09:30"])[0]));
}

#[tokio::test]
async fn completed_appointment_moves_to_past() {
    let state = state_with_doctor().await;
    let patient = TestUser::patient("asha@example.com").to_user();
    let mut doctor = TestUser::doctor("doctor@example.com");
    doctor.id = DOCTOR_ID.to_string();
    let doctor = doctor.to_user();

    let booked = BookingService::new(&state)
        .book(&patient, booking("09:30"))
        .await
        .unwrap()
        .appointment;

    let lifecycle = LifecycleService::new(&state);
    let completed = lifecycle.mark_completed(&doctor, &booked.id).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    // A second call is harmless
    let again = lifecycle.mark_completed(&doctor, &booked.id).await.unwrap();
    assert_eq!(again.status, AppointmentStatus::Completed);

    let view = DashboardService::new(&state).for_doctor(DOCTOR_ID).await.unwrap();
    assert!(view.upcoming.is_empty());
    assert_eq!(view.past.len(), 1);
    assert_eq!(view.past[0].id, booked.id);
}

#[tokio::test]
async fn only_the_owning_doctor_completes() {
    let state = state_with_doctor().await;
    let patient = TestUser::patient("asha@example.com").to_user();
    let booked = BookingService::new(&state)
        .book(&patient, booking("09:00"))
        .await
        .unwrap()
        .appointment;

    let stranger = TestUser::doctor("other@example.com").to_user();
    let result = LifecycleService::new(&state).mark_completed(&stranger, &booked.id).await;
    assert_matches!(result, Err(AppointmentError::NotYourAppointment));
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_admit_exactly_one() {
    let state = state_with_doctor().await;
    let first = TestUser::patient("one@example.com").to_user();
    let second = TestUser::patient("two@example.com").to_user();

    let service_a = BookingService::new(&state);
    let service_b = BookingService::new(&state);
    let (a, b) = tokio::join!(
        service_a.book(&first, booking("09:00")),
        service_b.book(&second, booking("09:00")),
    );

    let outcomes = [a, b];
    let booked = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppointmentError::SlotUnavailable))));

    let view = DashboardService::new(&state).for_doctor(DOCTOR_ID).await.unwrap();
    assert_eq!(view.upcoming.len(), 1);
}

/// Store that lets a rival booking of 09:00 land just before the first batch commits.
struct RivalBooksFirst {
    inner: Arc<AppState>,
    rival: User,
    raced: AtomicBool,
    batches: AtomicUsize,
}

#[async_trait]
impl DocumentStore for RivalBooksFirst {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.store.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.store.list(collection).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.store.query(collection, query).await
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document, StoreError> {
        self.inner.store.create(collection, id, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        self.inner.store.set(collection, id, data).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_version: Option<u64>,
    ) -> Result<Document, StoreError> {
        self.inner.store.update(collection, id, patch, expected_version).await
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Document>, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if !self.raced.swap(true, Ordering::SeqCst) {
            BookingService::new(&self.inner)
                .book(&self.rival, booking("09:00"))
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;
        }
        self.inner.store.commit_batch(ops).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Subscription<Option<Document>>, StoreError> {
        self.inner.store.subscribe(collection, id).await
    }
}

#[tokio::test]
async fn booking_that_loses_the_race_rechecks_and_reports_slot_unavailable() {
    let inner = state_with_doctor().await;
    let rival = TestUser::patient("rival@example.com").to_user();
    let racing = Arc::new(RivalBooksFirst {
        inner: inner.clone(),
        rival: rival.clone(),
        raced: AtomicBool::new(false),
        batches: AtomicUsize::new(0),
    });
    let store: Arc<dyn DocumentStore> = racing.clone();
    let state = AppState::new(inner.config.clone(), store);

    let patient = TestUser::patient("late@example.com").to_user();
    let result = BookingService::new(&state).book(&patient, booking("09:00")).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));

    // The stale write was rejected and the re-read stopped before writing again
    assert_eq!(racing.batches.load(Ordering::SeqCst), 1);

    let view = DashboardService::new(&inner).for_doctor(DOCTOR_ID).await.unwrap();
    assert_eq!(view.upcoming.len(), 1);
    assert_eq!(view.upcoming[0].patient_id, rival.id);
}

#[tokio::test]
async fn slot_outside_availability_is_unavailable() {
    let state = state_with_doctor().await;
    let patient = TestUser::patient("asha@example.com").to_user();

    let result = BookingService::new(&state).book(&patient, booking("16:30")).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));

    let mut wrong_day = booking("09:00");
    wrong_day.date = Some(date("2025-06-02"));
    let result = BookingService::new(&state).book(&patient, wrong_day).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn unknown_doctor_cannot_be_booked() {
    let state = TestConfig::default().to_state();
    let patient = TestUser::patient("asha@example.com").to_user();

    let result = BookingService::new(&state).book(&patient, booking("09:00")).await;
    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn hosted_booking_claims_slot_through_batch() {
    let mock_server = MockServer::start().await;
    let availability = json!([{"date": "2025-06-01", "slots": ["09:00", "09:30"]}]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", "eq.doctor-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(DOCTOR_ID, availability)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    let patient = TestUser::patient("asha@example.com").to_user();

    // The batch acknowledges without rows, so the booking reads the record back
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                "a-hosted",
                &patient.id,
                DOCTOR_ID,
                "2025-06-01",
                "09:30",
                "scheduled",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase(&mock_server.uri()).to_state();

    let response = BookingService::new(&state)
        .book(&patient, booking("09:30"))
        .await
        .unwrap();
    assert_eq!(response.appointment.id, "a-hosted");
    assert_eq!(response.appointment.time.as_str(), "09:30");
    assert_eq!(response.appointment.doctor_specialty, "Cardiology");
    assert!(response.appointment.created_at.is_some());
}

#[tokio::test]
async fn hosted_dashboard_reads_patient_rows_in_date_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", "eq.patient-7"))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                "a-1",
                "patient-7",
                DOCTOR_ID,
                "2025-05-01",
                "09:00",
                "completed",
            ),
            MockSupabaseResponses::appointment_row(
                "a-2",
                "patient-7",
                DOCTOR_ID,
                "2025-05-20",
                "10:00",
                "cancelled",
            ),
            MockSupabaseResponses::appointment_row(
                "a-3",
                "patient-7",
                DOCTOR_ID,
                "2025-06-01",
                "09:30",
                "scheduled",
            ),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase(&mock_server.uri()).to_state();
    let view = DashboardService::new(&state).for_patient("patient-7").await.unwrap();

    let upcoming: Vec<&str> = view.upcoming.iter().map(|a| a.id.as_str()).collect();
    let past: Vec<&str> = view.past.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(upcoming, vec!["a-3"]);
    assert_eq!(past, vec!["a-2", "a-1"]);
}

#[tokio::test]
async fn hosted_booking_gives_up_after_repeated_conflicts() {
    let mock_server = MockServer::start().await;
    let availability = json!([{"date": "2025-06-01", "slots": ["09:00"]}]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(DOCTOR_ID, availability)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_batch"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("version mismatch", "40001"),
        ))
        .expect(3)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase(&mock_server.uri()).to_state();
    let patient = TestUser::patient("asha@example.com").to_user();

    let result = BookingService::new(&state).book(&patient, booking("09:00")).await;
    assert_matches!(result, Err(AppointmentError::BookingFailed));
}
