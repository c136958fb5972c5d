// libs/video-conferencing-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, SessionCellState};

pub fn session_routes(config: Arc<AppConfig>, state: SessionCellState) -> Router {
    Router::new()
        .route("/{appointment_id}", get(handlers::get_session))
        .route("/{appointment_id}/start", post(handlers::start_session))
        .route("/{appointment_id}/heartbeat", post(handlers::heartbeat))
        .route("/{appointment_id}/end", post(handlers::end_session))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
