use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use doctor_cell::models::DOCTORS_COLLECTION;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_booking_requires_sign_in() {
    let app = appointment_routes(TestConfig::default().to_state());

    let response = app
        .oneshot(request(
            "POST",
            "/",
            None,
            Some(json!({"doctor_id": "doctor-001", "date": "2025-06-01", "time": "09:00"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["redirect_to"], "/auth/login");
}

#[tokio::test]
async fn test_booking_without_time_is_a_validation_error() {
    let config = TestConfig::default();
    let app = appointment_routes(config.to_state());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let response = app
        .oneshot(request(
            "POST",
            "/",
            Some(&token),
            Some(json!({"doctor_id": "doctor-001", "date": "2025-06-01"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Please select a date and time.");
}

#[tokio::test]
async fn test_book_then_complete_over_http() {
    let config = TestConfig::default();
    let state = config.to_state();

    let mut doctor = TestUser::doctor("doctor@example.com");
    doctor.id = "doctor-001".to_string();
    let patient = TestUser::patient("asha@example.com");

    let mut row = MockSupabaseResponses::doctor_row(
        &doctor.id,
        json!([{"date": "2025-06-01", "slots": ["09:00"]}]),
    );
    if let Some(fields) = row.as_object_mut() {
        fields.remove("id");
    }
    state.store.set(DOCTORS_COLLECTION, &doctor.id, row).await.unwrap();

    let app = appointment_routes(state);
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/",
            Some(&patient_token),
            Some(json!({"doctor_id": "doctor-001", "date": "2025-06-01", "time": "09:00", "type": "follow-up"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let booked = body_json(response).await;
    assert_eq!(booked["appointment"]["status"], "scheduled");
    assert_eq!(booked["appointment"]["type"], "follow-up");
    assert_eq!(booked["redirect_to"], "/dashboard");
    let appointment_id = booked["appointment"]["id"].as_str().unwrap().to_string();

    // Same slot again
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/",
            Some(&patient_token),
            Some(json!({"doctor_id": "doctor-001", "date": "2025-06-01", "time": "09:00"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(request("GET", "/doctor", Some(&patient_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/{}/complete", appointment_id),
            Some(&doctor_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let completed = body_json(response).await;
    assert_eq!(completed["appointment"]["status"], "completed");
    assert_eq!(completed["dashboard"]["upcoming"], json!([]));
    assert_eq!(completed["dashboard"]["past"][0]["id"], appointment_id.as_str());

    let response = app
        .oneshot(request("GET", "/patient", Some(&patient_token), None))
        .await
        .unwrap();
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["past"].as_array().unwrap().len(), 1);
}
