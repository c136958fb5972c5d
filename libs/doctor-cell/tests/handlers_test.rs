use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::{doctor_routes, DoctorCellState, InMemoryPhysicianDirectory, Physician};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct Harness {
    app: Router,
    secret: String,
    physician: TestUser,
}

async fn harness() -> Harness {
    let config = TestConfig::default();
    let physician = TestUser::doctor("doc@example.com");

    let directory = Arc::new(InMemoryPhysicianDirectory::new());
    directory
        .upsert_physician(Physician {
            id: physician.uuid(),
            display_name: "Dr. Handler".to_string(),
            consultation_duration_minutes: 30,
            buffer_minutes: 10,
            consultation_price_cents: None,
            accepts_new_patients: true,
        })
        .await;

    let app = doctor_routes(config.to_arc(), DoctorCellState { directory });
    Harness { app, secret: config.jwt_secret, physician }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_rules(uri: String, bearer: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = bearer {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn physician_profile_is_public() {
    let h = harness().await;
    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{}", h.physician.uuid()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["display_name"], "Dr. Handler");
}

#[tokio::test]
async fn unknown_physician_is_404() {
    let h = harness().await;
    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{}/availability", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn physician_replaces_own_rules() {
    let h = harness().await;
    let rules = json!({
        "rules": [
            { "day_of_week": 2, "start_time": "09:00:00", "end_time": "12:00:00" },
            { "day_of_week": 4, "start_time": "14:00:00", "end_time": "18:00:00" }
        ]
    });

    let response = h
        .app
        .clone()
        .oneshot(put_rules(
            format!("/{}/availability", h.physician.uuid()),
            Some(JwtTestUtils::bearer(&h.physician, &h.secret)),
            rules,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listed = h
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/{}/availability", h.physician.uuid()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(listed).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["rules"][0]["day_of_week"], 2);
}

#[tokio::test]
async fn overlapping_rules_are_a_bad_request() {
    let h = harness().await;
    let rules = json!({
        "rules": [
            { "day_of_week": 2, "start_time": "09:00:00", "end_time": "12:00:00" },
            { "day_of_week": 2, "start_time": "11:30:00", "end_time": "13:00:00" }
        ]
    });

    let response = h
        .app
        .oneshot(put_rules(
            format!("/{}/availability", h.physician.uuid()),
            Some(JwtTestUtils::bearer(&h.physician, &h.secret)),
            rules,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_users_cannot_edit_availability() {
    let h = harness().await;
    let patient = TestUser::patient("p@example.com");
    let other_doctor = TestUser::doctor("other@example.com");
    let body = json!({ "rules": [] });

    for intruder in [&patient, &other_doctor] {
        let response = h
            .app
            .clone()
            .oneshot(put_rules(
                format!("/{}/availability", h.physician.uuid()),
                Some(JwtTestUtils::bearer(intruder, &h.secret)),
                body.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let anonymous = h
        .app
        .oneshot(put_rules(format!("/{}/availability", h.physician.uuid()), None, body))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
