// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::Actor;

use crate::models::WebhookNotification;
use crate::services::PaymentGate;

#[derive(Clone)]
pub struct PaymentCellState {
    pub gate: Arc<PaymentGate>,
}

pub async fn initiate_charge(
    State(state): State<PaymentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let ticket = state.gate.initiate_charge(appointment_id, &actor).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "charge": ticket
        })),
    ))
}

pub async fn charge_status(
    State(state): State<PaymentCellState>,
    Path(charge_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let view = state.gate.poll_status_for(charge_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "charge": view
    })))
}

/// Provider callback. Always acknowledged once the payload parses so the
/// provider stops retrying; the status itself comes from a provider lookup.
pub async fn provider_webhook(
    State(state): State<PaymentCellState>,
    Json(notification): Json<WebhookNotification>,
) -> Result<Json<Value>, AppError> {
    debug!("Payment webhook for {}", notification.external_id);
    let view = state.gate.handle_webhook(&notification.external_id).await?;

    Ok(Json(json!({
        "success": true,
        "charge": view
    })))
}
