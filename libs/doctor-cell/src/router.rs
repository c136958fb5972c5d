use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DoctorCellState};

pub fn doctor_routes(config: Arc<AppConfig>, state: DoctorCellState) -> Router {
    let public_routes = Router::new()
        .route("/{physician_id}", get(handlers::get_physician))
        .route("/{physician_id}/availability", get(handlers::get_availability));

    let protected_routes = Router::new()
        .route("/{physician_id}/availability", put(handlers::replace_availability))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
