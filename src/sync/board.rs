use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{BoardMessageEntity, TeamMessageEntity, Timestamp};

/// Message as rendered on any board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoardMessage {
    pub id: Option<String>,
    pub nickname: String,
    pub message: String,
    pub team_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_highlighted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hearts: Option<u32>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<Timestamp>,
}

impl From<BoardMessageEntity> for BoardMessage {
    fn from(entity: BoardMessageEntity) -> Self {
        Self {
            id: entity.id,
            nickname: entity.nickname,
            message: entity.message,
            team_number: entity.team_number,
            is_highlighted: entity.is_highlighted,
            hearts: entity.hearts,
            created_at: entity.created_at,
        }
    }
}

impl From<TeamMessageEntity> for BoardMessage {
    fn from(entity: TeamMessageEntity) -> Self {
        Self {
            id: entity.id,
            nickname: entity.nickname,
            message: entity.message,
            team_number: entity.team_number,
            is_highlighted: None,
            hearts: None,
            created_at: entity.created_at,
        }
    }
}

/// Number of messages posted by one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamCount {
    /// Team number as chosen on join.
    pub team: u32,
    pub count: u64,
}

/// Board contents as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoardSnapshot {
    /// Messages newest first, restricted to the selected team when one is set.
    pub messages: Vec<BoardMessage>,
    /// Messages on the whole board.
    pub total: u64,
    /// Teams that posted, ascending, with their message counts.
    pub teams: Vec<TeamCount>,
    /// Team the messages were filtered by.
    pub selected_team: Option<u32>,
    /// Messages posted by the viewer's team.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_team_count: Option<u64>,
}

/// Per-team message counts, ascending by team. Untagged messages are skipped.
pub fn team_counts(messages: &[BoardMessage]) -> Vec<TeamCount> {
    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    for team in messages.iter().filter_map(|message| message.team_number) {
        *counts.entry(team).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(team, count)| TeamCount { team, count })
        .collect()
}

/// Build the viewer's snapshot from the full, newest-first message list.
pub fn board_snapshot(
    messages: Vec<BoardMessage>,
    selected_team: Option<u32>,
    my_team: Option<u32>,
) -> BoardSnapshot {
    let teams = team_counts(&messages);
    let total = messages.len() as u64;
    let my_team_count = my_team.map(|team| {
        teams
            .iter()
            .find(|entry| entry.team == team)
            .map(|entry| entry.count)
            .unwrap_or(0)
    });
    let messages = match selected_team {
        Some(team) => messages
            .into_iter()
            .filter(|message| message.team_number == Some(team))
            .collect(),
        None => messages,
    };

    BoardSnapshot {
        messages,
        total,
        teams,
        selected_team,
        my_team_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, team: Option<u32>) -> BoardMessage {
        BoardMessage {
            id: None,
            nickname: "mina".into(),
            message: text.into(),
            team_number: team,
            is_highlighted: None,
            hearts: None,
            created_at: None,
        }
    }

    #[test]
    fn snapshot_filters_by_team_and_counts_all() {
        let snapshot = board_snapshot(
            vec![
                message("c", Some(3)),
                message("b", None),
                message("a", Some(1)),
                message("z", Some(3)),
            ],
            Some(3),
            Some(1),
        );

        let texts: Vec<_> = snapshot.messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["c", "z"]);
        assert_eq!(snapshot.total, 4);
        assert_eq!(
            snapshot.teams,
            vec![
                TeamCount { team: 1, count: 1 },
                TeamCount { team: 3, count: 2 },
            ]
        );
        assert_eq!(snapshot.my_team_count, Some(1));
    }

    #[test]
    fn unfiltered_snapshot_keeps_every_message() {
        let snapshot = board_snapshot(vec![message("a", None)], None, Some(7));
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.teams.is_empty());
        assert_eq!(snapshot.my_team_count, Some(0));
    }
}
