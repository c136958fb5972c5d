use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::{Actor, ActorRole};

use crate::services::SubscriptionDirectory;

#[derive(Clone)]
pub struct PatientCellState {
    pub subscriptions: Arc<dyn SubscriptionDirectory>,
}

pub async fn get_my_plan(
    State(state): State<PatientCellState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    if actor.role != ActorRole::Patient {
        return Err(AppError::Forbidden("Only patients have subscription plans".to_string()));
    }

    let plan = state.subscriptions.active_plan_for(actor.id, Utc::now()).await?;

    Ok(Json(json!({
        "patient_id": actor.id,
        "active": plan.is_some(),
        "plan": plan
    })))
}
