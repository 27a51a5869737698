use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{Emoji, Timestamp},
    state::conflict::RevealPhase,
    sync::{
        board::{BoardMessage, BoardSnapshot},
        keywords::KeywordCloud,
        tally::{ConflictTally, MoodTally},
    },
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name; `None` sends an unnamed message.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`participant` or `display`).
    pub stream: String,
    /// Session the stream mirrors.
    pub session_id: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// First event of a display stream, carrying the credential for facilitator writes.
pub struct FacilitatorHandshake {
    /// Value for the `X-Facilitator-Token` header, valid while the stream is open.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once per start instant when the countdown reaches zero.
pub struct TimerCompleteEvent {
    /// Start instant of the countdown that completed.
    #[schema(value_type = String, format = DateTime)]
    pub started_at: Timestamp,
}

#[derive(Debug, Serialize, ToSchema)]
/// Mood distribution plus the viewer's own selection.
pub struct MoodEvent {
    pub tally: MoodTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_vote: Option<Emoji>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Board contents plus whether the viewer's form is hidden.
pub struct BoardEvent {
    #[serde(flatten)]
    pub snapshot: BoardSnapshot,
    pub form_hidden: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Conflict poll as seen by one viewer; results stay hidden until revealed.
pub struct ConflictEvent {
    pub phase: RevealPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<ConflictTally>,
    pub team_messages: Vec<BoardMessage>,
    pub team_message_submitted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Keyword cloud plus whether the viewer already submitted.
pub struct KeywordEvent {
    #[serde(flatten)]
    pub cloud: KeywordCloud,
    pub submitted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Number of cheers sent so far.
pub struct CheerEvent {
    pub count: u64,
}
