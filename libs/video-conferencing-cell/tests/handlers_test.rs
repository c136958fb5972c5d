mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use video_conferencing_cell::{session_routes, SessionCellState};

use common::{fixture, tuesday_at, Fixture};

struct Api {
    app: Router,
    secret: String,
}

fn api(f: &Fixture) -> Api {
    let config = TestConfig::default();
    Api {
        app: session_routes(
            config.to_arc(),
            SessionCellState {
                controller: f.controller.clone(),
            },
        ),
        secret: config.jwt_secret,
    }
}

impl Api {
    async fn call(&self, method: Method, uri: &str, user: &TestUser) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, JwtTestUtils::bearer(user, &self.secret))
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn consultation_over_http() {
    let f = fixture().await;
    let api = api(&f);
    f.clock.set(tuesday_at(8, 55));

    let doctor = TestUser::with_id(f.physician.id, "doctor");
    let patient = TestUser::with_id(f.patient.id, "patient");
    let id = f.appointment_id;

    let started = api.call(Method::POST, &format!("/{}/start", id), &doctor).await;
    assert_eq!(started.status(), StatusCode::OK);
    let body = json_body(started).await;
    assert_eq!(body["session"]["status"], "in_progress");
    let room = body["session"]["room_id"].as_str().unwrap().to_string();

    let joined = api.call(Method::POST, &format!("/{}/start", id), &patient).await;
    let body = json_body(joined).await;
    assert_eq!(body["session"]["room_id"], room.as_str());
    assert_eq!(body["session"]["presence"]["physician"], true);
    assert_eq!(body["session"]["presence"]["patient"], true);

    let beat = api.call(Method::POST, &format!("/{}/heartbeat", id), &patient).await;
    assert_eq!(beat.status(), StatusCode::OK);
    assert_eq!(json_body(beat).await["session"]["heartbeat_interval_seconds"], 15);

    let ended = api.call(Method::POST, &format!("/{}/end", id), &doctor).await;
    assert_eq!(ended.status(), StatusCode::OK);

    let again = api.call(Method::POST, &format!("/{}/end", id), &doctor).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let status = api.call(Method::GET, &format!("/{}", id), &patient).await;
    assert_eq!(json_body(status).await["session"]["status"], "completed");
}

#[tokio::test]
async fn early_start_and_strangers_are_rejected() {
    let f = fixture().await;
    let api = api(&f);
    let id = f.appointment_id;

    let stranger = TestUser::patient("stranger@example.com");
    let response = api.call(Method::POST, &format!("/{}/start", id), &stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Still Monday noon.
    let patient = TestUser::with_id(f.patient.id, "patient");
    let response = api.call(Method::POST, &format!("/{}/start", id), &patient).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let unknown = api
        .call(Method::GET, &format!("/{}", uuid::Uuid::new_v4()), &patient)
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
