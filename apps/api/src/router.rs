use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::{appointment_routes, AppointmentCellState};
use doctor_cell::{doctor_routes, DoctorCellState};
use patient_cell::{patient_routes, PatientCellState};
use payment_cell::{payment_routes, PaymentCellState};
use video_conferencing_cell::{session_routes, SessionCellState};

use crate::state::AppServices;

pub fn create_router(services: &AppServices) -> Router {
    let config = services.config.clone();
    let storage = format!("{:?}", config.storage_backend).to_lowercase();

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route(
            "/health",
            get(move || async move { Json(json!({ "status": "ok", "storage": storage })) }),
        )
        .nest(
            "/doctors",
            doctor_routes(
                config.clone(),
                DoctorCellState {
                    directory: services.directory.clone(),
                },
            ),
        )
        .nest(
            "/patients",
            patient_routes(
                config.clone(),
                PatientCellState {
                    subscriptions: services.subscriptions.clone(),
                },
            ),
        )
        .nest(
            "/appointments",
            appointment_routes(
                config.clone(),
                AppointmentCellState {
                    ledger: services.ledger.clone(),
                    pricing: services.pricing.clone(),
                },
            ),
        )
        .nest(
            "/payments",
            payment_routes(
                config.clone(),
                PaymentCellState {
                    gate: services.gate.clone(),
                },
            ),
        )
        .nest(
            "/sessions",
            session_routes(
                config,
                SessionCellState {
                    controller: services.sessions.clone(),
                },
            ),
        )
}
