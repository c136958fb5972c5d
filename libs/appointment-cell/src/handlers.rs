// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::Actor;

use crate::models::{ReserveAppointmentRequest, SlotQuery};
use crate::services::{BookingLedger, PricingEngine};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub ledger: Arc<BookingLedger>,
    pub pricing: Arc<PricingEngine>,
}

pub async fn list_slots(
    State(state): State<AppointmentCellState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .ledger
        .available_slots(query.physician_id, query.date)
        .await?;

    Ok(Json(json!({
        "physician_id": query.physician_id,
        "date": query.date,
        "slots": slots
    })))
}

pub async fn reserve_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state
        .ledger
        .reserve(request.physician_id, &actor, request.date, request.time, request.kind)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

pub async fn list_my_appointments(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let listing = state.ledger.list_for_actor(&actor).await?;
    Ok(Json(json!(listing)))
}

pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.ledger.get_for_actor(appointment_id, &actor).await?;
    Ok(Json(json!(appointment)))
}

pub async fn quote_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.ledger.get_for_actor(appointment_id, &actor).await?;
    let quote = state.pricing.quote_for(&appointment).await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "quote": quote
    })))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.ledger.cancel(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
