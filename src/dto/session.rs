use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{SessionEntity, Timestamp},
    dto::validation::validate_name,
    state::steps::StepView,
    sync::timer::TimerView,
};

/// Session header with the derived step and countdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub step: StepView,
    pub timer: TimerView,
}

/// Session header without live state, used by recaps.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionHeader {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl From<SessionEntity> for SessionHeader {
    fn from(entity: SessionEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}

/// Payload entered on the participant landing page.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(range(min = 1))]
    pub team: u32,
}

/// Identity minted for a participant; sent back on every later call.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub voter_id: Uuid,
    pub nickname: String,
    pub team: u32,
    /// Label shown next to the participant's team messages.
    pub team_label: String,
    /// Shareable link to the participant's personal recap.
    pub recap_link: String,
}

/// Target step of a facilitator jump.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StepRequest {
    /// Index into the step sequence; clamped into range.
    pub step: i64,
}
