// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, PaymentCellState};

pub fn payment_routes(config: Arc<AppConfig>, state: PaymentCellState) -> Router {
    let protected = Router::new()
        .route(
            "/appointments/{appointment_id}/charge",
            post(handlers::initiate_charge),
        )
        .route("/charges/{charge_id}/status", get(handlers::charge_status))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    // The provider can't present a user token.
    let public = Router::new().route("/webhook", post(handlers::provider_webhook));

    protected.merge(public).with_state(state)
}
