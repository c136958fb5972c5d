use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{AvailabilityRule, DoctorError, NewAvailabilityRule, Physician};
use crate::services::availability::validate_rules;
use crate::services::directory::PhysicianDirectory;

/// Physician directory backed by the `physicians` and `availability_rules`
/// tables.
pub struct SupabasePhysicianDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePhysicianDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PhysicianDirectory for SupabasePhysicianDirectory {
    async fn physician(&self, physician_id: Uuid) -> Result<Option<Physician>, DoctorError> {
        let path = format!("/rest/v1/physicians?id=eq.{}&limit=1", physician_id);
        let mut rows: Vec<Physician> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.pop())
    }

    async fn rules(&self, physician_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let path = format!(
            "/rest/v1/availability_rules?physician_id=eq.{}&order=day_of_week.asc,start_time.asc",
            physician_id
        );
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn rules_for_day(
        &self,
        physician_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        debug!("Fetching day {} rules for physician {}", day_of_week, physician_id);
        let path = format!(
            "/rest/v1/availability_rules?physician_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            physician_id, day_of_week
        );
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn replace_rules(
        &self,
        physician_id: Uuid,
        rules: Vec<NewAvailabilityRule>,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        self.require_physician(physician_id).await?;
        let validated = validate_rules(physician_id, rules)?;

        // Delete + insert happen inside one database function.
        let body = json!({
            "p_physician_id": physician_id,
            "p_rules": validated,
        });
        let stored: Vec<AvailabilityRule> = self
            .supabase
            .request(Method::POST, "/rest/v1/rpc/replace_availability_rules", None, Some(body))
            .await?;

        info!("Replaced availability of physician {} with {} rules", physician_id, stored.len());
        Ok(stored)
    }
}
