use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{get_my_plan, PatientCellState};

pub fn patient_routes(config: Arc<AppConfig>, state: PatientCellState) -> Router {
    Router::new()
        .route("/me/plan", get(get_my_plan))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
