use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::{Actor, ActorRole};

use crate::models::ReplaceAvailabilityRequest;
use crate::services::PhysicianDirectory;

#[derive(Clone)]
pub struct DoctorCellState {
    pub directory: Arc<dyn PhysicianDirectory>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn get_physician(
    State(state): State<DoctorCellState>,
    Path(physician_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let physician = state.directory.require_physician(physician_id).await?;
    Ok(Json(json!(physician)))
}

pub async fn get_availability(
    State(state): State<DoctorCellState>,
    Path(physician_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.directory.require_physician(physician_id).await?;
    let rules = state.directory.rules(physician_id).await?;

    Ok(Json(json!({
        "physician_id": physician_id,
        "rules": rules,
        "total": rules.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

pub async fn replace_availability(
    State(state): State<DoctorCellState>,
    Path(physician_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ReplaceAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    if actor.role != ActorRole::Physician || actor.id != physician_id {
        return Err(AppError::Forbidden(
            "Only the physician can change their own availability".to_string(),
        ));
    }

    let rules = state.directory.replace_rules(physician_id, request.rules).await?;
    info!("Physician {} published {} availability rules", physician_id, rules.len());

    Ok(Json(json!({
        "success": true,
        "rules": rules
    })))
}
