use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::Emoji,
    dto::validation::validate_keyword,
    state::conflict::RevealPhase,
    sync::{
        board::BoardMessage,
        keywords::KeywordCloud,
        tally::{ConflictTally, MoodTally},
    },
};

/// Mood selected on the condition step.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoodVoteRequest {
    pub emoji: Emoji,
}

/// Settled mood selection of the caller plus the fresh distribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct MoodVoteResponse {
    pub selected: Option<Emoji>,
    /// Whether a write was issued; re-selecting the current mood is a no-op.
    pub changed: bool,
    pub tally: MoodTally,
}

/// Caller's stored mood, if any.
#[derive(Debug, Serialize, ToSchema)]
pub struct MyMoodResponse {
    pub emoji: Option<Emoji>,
}

/// Answer to "did your team have a conflict?".
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConflictVoteRequest {
    pub has_conflict: bool,
}

/// Conflict poll as seen by the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictResponse {
    pub phase: RevealPhase,
    /// Present once the caller's results are revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<ConflictTally>,
    pub team_messages: Vec<BoardMessage>,
    pub team_message_submitted: bool,
}

/// Problem keyword typed on the "why" step.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct KeywordRequest {
    #[validate(custom(function = "validate_keyword"))]
    pub keyword: String,
}

/// Keyword cloud plus the caller's submission flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeywordResponse {
    #[serde(flatten)]
    pub cloud: KeywordCloud,
    pub submitted: bool,
}

/// Number of cheers sent so far.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheerResponse {
    pub count: u64,
}
