use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::auth::User;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[serde(alias = "doctor")]
    Physician,
    Patient,
    /// Background tasks (expiry and no-show sweeps).
    System,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Physician => write!(f, "physician"),
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

/// An already-authenticated caller of a scheduling operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn physician(id: Uuid) -> Self {
        Self { id, role: ActorRole::Physician }
    }

    pub fn patient(id: Uuid) -> Self {
        Self { id, role: ActorRole::Patient }
    }

    pub fn system() -> Self {
        Self { id: Uuid::nil(), role: ActorRole::System }
    }

    pub fn is_system(&self) -> bool {
        self.role == ActorRole::System
    }

    /// Resolve the actor from the JWT user. Only physicians and patients
    /// can act on appointments through the API.
    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

        match user.role.as_deref() {
            Some("doctor") | Some("physician") => Ok(Self::physician(id)),
            Some("patient") => Ok(Self::patient(id)),
            other => Err(AppError::Forbidden(format!(
                "Role {:?} cannot act on appointments",
                other.unwrap_or("none")
            ))),
        }
    }
}
