// libs/video-conferencing-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::Actor;

use crate::services::SessionController;

#[derive(Clone)]
pub struct SessionCellState {
    pub controller: Arc<SessionController>,
}

pub async fn start_session(
    State(state): State<SessionCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let session = state.controller.start(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

pub async fn heartbeat(
    State(state): State<SessionCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let session = state.controller.heartbeat(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

pub async fn end_session(
    State(state): State<SessionCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let session = state.controller.end(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

pub async fn get_session(
    State(state): State<SessionCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let session = state.controller.presence(appointment_id, &actor).await?;

    Ok(Json(json!({ "session": session })))
}
