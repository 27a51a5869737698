use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// RFC 3339 timestamp as stored in the remote store's `timestamptz` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

impl Timestamp {
    /// Current wall-clock instant in UTC.
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wrapped instant.
    pub fn instant(self) -> OffsetDateTime {
        self.0
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

/// The four moods a participant can report during the condition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Emoji {
    /// Tired.
    #[serde(rename = "😴")]
    Sleepy,
    /// Struggling.
    #[serde(rename = "😵")]
    Dizzy,
    /// On fire.
    #[serde(rename = "🔥")]
    Fire,
    /// Confident.
    #[serde(rename = "💪")]
    Strong,
}

impl Emoji {
    /// Fixed display order used by every aggregate.
    pub const ALL: [Emoji; 4] = [Emoji::Sleepy, Emoji::Dizzy, Emoji::Fire, Emoji::Strong];

    /// Glyph stored in the `emoji` column.
    pub fn glyph(self) -> &'static str {
        match self {
            Emoji::Sleepy => "😴",
            Emoji::Dizzy => "😵",
            Emoji::Fire => "🔥",
            Emoji::Strong => "💪",
        }
    }
}

/// The two free-text boards sharing the [`BoardMessageEntity`] shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Board {
    /// Messages to one's past self ("처음의 나에게").
    FirstMe,
    /// Anticipated proud moments.
    Proud,
}

impl Board {
    /// Suffix of the board's SSE event name.
    pub fn slug(self) -> &'static str {
        match self {
            Board::FirstMe => "first_me",
            Board::Proud => "proud",
        }
    }
}

/// Row of the `sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key, also the URL path segment.
    pub id: String,
    /// Display name of the session.
    pub name: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Whether the session is still running.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Index of the facilitator's current step.
    #[serde(default)]
    pub current_step: Option<i64>,
    /// Outer `None`: column absent from the row. Inner `None`: timer idle.
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timer_started_at: Option<Option<Timestamp>>,
}

fn default_active() -> bool {
    true
}

/// Row of the `condition_votes` table, unique on `(session_id, voter_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionVoteEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Selected mood.
    pub emoji: Emoji,
    /// Anonymous participant identifier.
    #[serde(default)]
    pub voter_id: Option<Uuid>,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Row of the `conflict_votes` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictVoteEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Whether the participant experienced a team conflict.
    pub has_conflict: bool,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Row of the `first_me_messages` and `proud_moments` tables.
///
/// Both boards share a shape; `is_highlighted` only exists on the first and
/// `hearts` only on the second, so both are optional here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardMessageEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Author nickname (never empty once stored).
    pub nickname: String,
    /// Message body.
    pub message: String,
    /// Author's team, when known.
    #[serde(default)]
    pub team_number: Option<u32>,
    /// Highlight flag of the "first me" board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_highlighted: Option<bool>,
    /// Display-only heart counter of the proud board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hearts: Option<u32>,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Row of the `team_messages` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMessageEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Author nickname.
    pub nickname: String,
    /// Message body.
    pub message: String,
    /// Team the message belongs to.
    #[serde(default)]
    pub team_number: Option<u32>,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Row of the `problem_keywords` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemKeywordEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Raw keyword as typed (trimmed).
    pub keyword: String,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Row of the `cheers` table; only its existence matters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheerEntity {
    /// Row identifier assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Timestamp assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_distinguishes_missing_and_null_timer() {
        let missing: SessionEntity = serde_json::from_value(json!({
            "id": "s1",
            "name": "Kickoff",
            "created_at": "2025-03-01T09:00:00Z",
        }))
        .unwrap();
        assert_eq!(missing.timer_started_at, None);
        assert!(missing.is_active);

        let idle: SessionEntity = serde_json::from_value(json!({
            "id": "s1",
            "name": "Kickoff",
            "created_at": "2025-03-01T09:00:00Z",
            "timer_started_at": null,
        }))
        .unwrap();
        assert_eq!(idle.timer_started_at, Some(None));

        let running: SessionEntity = serde_json::from_value(json!({
            "id": "s1",
            "name": "Kickoff",
            "created_at": "2025-03-01T09:00:00Z",
            "timer_started_at": "2025-03-01T09:05:00.250+00:00",
        }))
        .unwrap();
        assert!(matches!(running.timer_started_at, Some(Some(_))));
    }

    #[test]
    fn emoji_uses_glyph_on_the_wire() {
        let value = serde_json::to_value(Emoji::Fire).unwrap();
        assert_eq!(value, json!("🔥"));
        let parsed: Emoji = serde_json::from_value(json!("😵")).unwrap();
        assert_eq!(parsed, Emoji::Dizzy);
    }
}
