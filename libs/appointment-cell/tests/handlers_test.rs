mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::{appointment_routes, AppointmentCellState};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::fixture;

struct Api {
    app: Router,
    secret: String,
    physician_id: uuid::Uuid,
}

async fn api() -> Api {
    let f = fixture().await;
    let config = TestConfig::default();
    let app = appointment_routes(
        config.to_arc(),
        AppointmentCellState {
            ledger: f.ledger.clone(),
            pricing: f.pricing.clone(),
        },
    );
    Api {
        app,
        secret: config.jwt_secret,
        physician_id: f.physician.id,
    }
}

impl Api {
    async fn call(&self, method: Method, uri: &str, user: &TestUser, body: Option<Value>) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, JwtTestUtils::bearer(user, &self.secret));
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn reservation(api: &Api, time: &str) -> Value {
    json!({
        "physician_id": api.physician_id,
        "date": "2026-03-03",
        "time": time,
        "kind": "first_visit"
    })
}

#[tokio::test]
async fn slots_reserve_and_quote_flow() {
    let api = api().await;
    let patient = TestUser::patient("p@example.com");

    let slots = api
        .call(
            Method::GET,
            &format!("/slots?physician_id={}&date=2026-03-03", api.physician_id),
            &patient,
            None,
        )
        .await;
    assert_eq!(slots.status(), StatusCode::OK);
    let body = json_body(slots).await;
    assert_eq!(body["slots"].as_array().unwrap().len(), 5);
    assert_eq!(body["slots"][4]["time"], "11:40:00");

    let created = api
        .call(Method::POST, "/", &patient, Some(reservation(&api, "09:40:00")))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = json_body(created).await;
    assert_eq!(body["appointment"]["status"], "reserved");
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let quote = api.call(Method::GET, &format!("/{}/quote", id), &patient, None).await;
    assert_eq!(quote.status(), StatusCode::OK);
    let body = json_body(quote).await;
    assert_eq!(body["quote"]["amount_cents"], 14900);
    assert_eq!(body["quote"]["source"]["type"], "platform_default");
}

#[tokio::test]
async fn second_reservation_of_a_slot_conflicts() {
    let api = api().await;
    let first = TestUser::patient("a@example.com");
    let second = TestUser::patient("b@example.com");

    let ok = api.call(Method::POST, "/", &first, Some(reservation(&api, "09:00:00"))).await;
    assert_eq!(ok.status(), StatusCode::CREATED);

    let taken = api.call(Method::POST, "/", &second, Some(reservation(&api, "09:00:00"))).await;
    assert_eq!(taken.status(), StatusCode::CONFLICT);
    let body = json_body(taken).await;
    assert!(body["error"].as_str().unwrap().contains("no longer available"));
}

#[tokio::test]
async fn strangers_cannot_read_or_cancel() {
    let api = api().await;
    let owner = TestUser::patient("owner@example.com");
    let stranger = TestUser::patient("stranger@example.com");

    let created = api.call(Method::POST, "/", &owner, Some(reservation(&api, "10:20:00"))).await;
    let id = json_body(created).await["appointment"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let read = api.call(Method::GET, &format!("/{}", id), &stranger, None).await;
    assert_eq!(read.status(), StatusCode::FORBIDDEN);

    let cancel = api.call(Method::POST, &format!("/{}/cancel", id), &stranger, None).await;
    assert_eq!(cancel.status(), StatusCode::FORBIDDEN);

    let cancel = api.call(Method::POST, &format!("/{}/cancel", id), &owner, None).await;
    assert_eq!(cancel.status(), StatusCode::OK);

    let again = api.call(Method::POST, &format!("/{}/cancel", id), &owner, None).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let mine = api.call(Method::GET, "/mine", &owner, None).await;
    let body = json_body(mine).await;
    assert_eq!(body["past"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn past_dates_are_rejected() {
    let api = api().await;
    let patient = TestUser::patient("p@example.com");
    let response = api
        .call(
            Method::GET,
            &format!("/slots?physician_id={}&date=2026-02-01", api.physician_id),
            &patient,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
