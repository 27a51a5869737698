use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::Timestamp,
    dto::session::SessionHeader,
    sync::{
        board::BoardMessage,
        keywords::KeywordCloud,
        tally::{ConflictTally, MoodTally},
    },
};

/// Everything the session produced, for the closing screen.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionRecap {
    pub session: SessionHeader,
    pub mood: MoodTally,
    pub conflict: ConflictTally,
    pub first_me: Vec<BoardMessage>,
    pub proud: Vec<BoardMessage>,
    pub team_messages: Vec<BoardMessage>,
    pub keywords: KeywordCloud,
    pub cheers: u64,
}

/// Identity given in a shared personal recap link.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecapQuery {
    pub name: Option<String>,
    pub team: Option<u32>,
}

/// Raw keyword as listed on a personal recap.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecapKeyword {
    pub keyword: String,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<Timestamp>,
}

/// What one participant wrote during the session.
#[derive(Debug, Serialize, ToSchema)]
pub struct PersonalRecap {
    pub session: SessionHeader,
    pub name: String,
    pub team: u32,
    pub first_me: Vec<BoardMessage>,
    pub proud: Vec<BoardMessage>,
    /// Messages of the participant's team.
    pub team_messages: Vec<BoardMessage>,
    /// Most recent raw keywords of the whole session, newest first.
    pub recent_keywords: Vec<RecapKeyword>,
    pub keyword_total: u64,
    pub share_link: String,
}
