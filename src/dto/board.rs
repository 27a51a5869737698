use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::validation::{validate_board_message, validate_team_message},
    sync::board::{BoardMessage, BoardSnapshot},
};

/// Optional team filter of board listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TeamFilter {
    /// Only list messages of this team.
    pub team: Option<u32>,
}

/// Message posted on the FirstMe or Proud board.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BoardMessageRequest {
    #[validate(custom(function = "validate_board_message"))]
    pub message: String,
}

/// Message posted under the conflict poll.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamMessageRequest {
    #[validate(custom(function = "validate_team_message"))]
    pub message: String,
}

/// Board contents plus whether the caller's form is hidden.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoardResponse {
    #[serde(flatten)]
    pub snapshot: BoardSnapshot,
    pub form_hidden: bool,
}

/// Stored message and how long the caller's form stays hidden.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoardSubmitResponse {
    pub message: BoardMessage,
    /// `None` when the form stays hidden for the rest of the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_hidden_for_ms: Option<u64>,
}
