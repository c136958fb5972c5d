// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(config: Arc<AppConfig>, state: AppointmentCellState) -> Router {
    Router::new()
        .route("/slots", get(handlers::list_slots))
        .route("/", post(handlers::reserve_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/quote", get(handlers::quote_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
