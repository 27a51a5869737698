use tokio::time::Instant;
use tracing::info;

use crate::{
    dao::models::{Board, BoardMessageEntity, TeamMessageEntity},
    dto::board::{BoardMessageRequest, BoardResponse, BoardSubmitResponse, TeamMessageRequest},
    error::ServiceError,
    services::session_service::load_session,
    state::{SharedState, identity::ClientIdentity},
    sync::board::{BoardMessage, board_snapshot},
};

/// Messages of `board`, optionally restricted to one team.
pub async fn board(
    state: &SharedState,
    session_id: &str,
    board: Board,
    team: Option<u32>,
    viewer: Option<&ClientIdentity>,
) -> Result<BoardResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let rows = repository.list_board_messages(board, session_id).await?;
    let messages = rows.into_iter().map(BoardMessage::from).collect();
    let form_hidden = viewer.is_some_and(|identity| {
        state
            .clients()
            .snapshot(session_id, identity.voter_id)
            .board_cooling_down(board, Instant::now())
    });

    Ok(BoardResponse {
        snapshot: board_snapshot(messages, team, viewer.and_then(|identity| identity.team)),
        form_hidden,
    })
}

/// Append a message to `board` and hide the caller's form for the cooldown.
pub async fn post_board_message(
    state: &SharedState,
    session_id: &str,
    board: Board,
    identity: &ClientIdentity,
    request: BoardMessageRequest,
) -> Result<BoardSubmitResponse, ServiceError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServiceError::InvalidInput("message must not be blank".into()));
    }

    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    let entity = BoardMessageEntity {
        id: None,
        session_id: session_id.to_string(),
        nickname: identity.display_nickname().to_string(),
        message: message.to_string(),
        team_number: identity.team,
        is_highlighted: None,
        hearts: None,
        created_at: None,
    };
    let stored = repository.insert_board_message(board, &entity).await?;

    let cooldown = state.config().board_cooldown;
    state.clients().start_board_cooldown(
        session_id,
        identity.voter_id,
        board,
        Instant::now() + cooldown,
    );
    info!(
        session = session_id,
        board = board.slug(),
        team = ?identity.team,
        "board message posted"
    );

    Ok(BoardSubmitResponse {
        message: stored.into(),
        form_hidden_for_ms: Some(cooldown.as_millis() as u64),
    })
}

/// Team messages of the conflict step, optionally restricted to one team.
pub async fn team_messages(
    state: &SharedState,
    session_id: &str,
    team: Option<u32>,
    viewer: Option<&ClientIdentity>,
) -> Result<BoardResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let rows = repository.list_team_messages(session_id).await?;
    let messages = rows.into_iter().map(BoardMessage::from).collect();
    let form_hidden = viewer.is_some_and(|identity| {
        state
            .clients()
            .snapshot(session_id, identity.voter_id)
            .team_message_submitted
    });

    Ok(BoardResponse {
        snapshot: board_snapshot(messages, team, viewer.and_then(|identity| identity.team)),
        form_hidden,
    })
}

/// Append a team message signed with the caller's team label. Requires a nickname.
pub async fn post_team_message(
    state: &SharedState,
    session_id: &str,
    identity: &ClientIdentity,
    request: TeamMessageRequest,
) -> Result<BoardSubmitResponse, ServiceError> {
    if identity.nickname.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "a nickname is required to post team messages".into(),
        ));
    }
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServiceError::InvalidInput("message must not be blank".into()));
    }

    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    let entity = TeamMessageEntity {
        id: None,
        session_id: session_id.to_string(),
        nickname: identity.team_label(),
        message: message.to_string(),
        team_number: identity.team,
        created_at: None,
    };
    let stored = repository.insert_team_message(&entity).await?;
    state
        .clients()
        .mark_team_message_submitted(session_id, identity.voter_id);
    info!(session = session_id, team = ?identity.team, "team message posted");

    Ok(BoardSubmitResponse {
        message: stored.into(),
        form_hidden_for_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::remote_store::{Query, RemoteStore, Table},
        services::test_support::state_with_session,
    };
    use std::time::Duration;

    fn request(message: &str) -> BoardMessageRequest {
        BoardMessageRequest {
            message: message.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn board_form_reopens_after_cooldown() {
        let (state, _store) = state_with_session("s1").await;
        let author = ClientIdentity::mint("", Some(2));

        let posted = post_board_message(&state, "s1", Board::FirstMe, &author, request("  hi  "))
            .await
            .unwrap();
        assert_eq!(posted.message.nickname, "익명");
        assert_eq!(posted.message.message, "hi");
        assert_eq!(posted.form_hidden_for_ms, Some(3_000));

        let listed = board(&state, "s1", Board::FirstMe, None, Some(&author))
            .await
            .unwrap();
        assert!(listed.form_hidden);
        assert_eq!(listed.snapshot.my_team_count, Some(1));

        tokio::time::advance(Duration::from_secs(3)).await;
        let listed = board(&state, "s1", Board::FirstMe, None, Some(&author))
            .await
            .unwrap();
        assert!(!listed.form_hidden);

        let proud = board(&state, "s1", Board::Proud, None, None).await.unwrap();
        assert_eq!(proud.snapshot.total, 0);
    }

    #[tokio::test]
    async fn team_filter_keeps_totals() {
        let (state, _store) = state_with_session("s1").await;
        for (name, team) in [("a", 1), ("b", 2), ("c", 2)] {
            let author = ClientIdentity::mint(name, Some(team));
            post_board_message(&state, "s1", Board::Proud, &author, request(name))
                .await
                .unwrap();
        }

        let filtered = board(&state, "s1", Board::Proud, Some(2), None)
            .await
            .unwrap();
        assert_eq!(filtered.snapshot.messages.len(), 2);
        assert_eq!(filtered.snapshot.total, 3);
        assert_eq!(filtered.snapshot.teams.len(), 2);
    }

    #[tokio::test]
    async fn team_messages_need_a_nickname_and_are_labelled() {
        let (state, _store) = state_with_session("s1").await;
        let anonymous = ClientIdentity::mint(" ", Some(4));
        let rejected = post_team_message(
            &state,
            "s1",
            &anonymous,
            TeamMessageRequest {
                message: "hello".into(),
            },
        )
        .await;
        assert!(matches!(rejected, Err(ServiceError::InvalidInput(_))));

        let author = ClientIdentity::mint("민아", Some(4));
        let posted = post_team_message(
            &state,
            "s1",
            &author,
            TeamMessageRequest {
                message: "고마워요".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(posted.message.nickname, "4조 민아");
        assert_eq!(posted.form_hidden_for_ms, None);

        let listed = team_messages(&state, "s1", None, Some(&author))
            .await
            .unwrap();
        assert!(listed.form_hidden);
        assert_eq!(listed.snapshot.messages.len(), 1);
    }

    #[tokio::test]
    async fn posts_to_unknown_sessions_are_refused() {
        let (state, store) = state_with_session("s1").await;
        let author = ClientIdentity::mint("민아", Some(1));

        let board_post =
            post_board_message(&state, "ghost", Board::FirstMe, &author, request("hi")).await;
        assert!(matches!(board_post, Err(ServiceError::SessionNotFound(id)) if id == "ghost"));

        let team_post = post_team_message(
            &state,
            "ghost",
            &author,
            TeamMessageRequest {
                message: "hi".into(),
            },
        )
        .await;
        assert!(matches!(team_post, Err(ServiceError::SessionNotFound(_))));
        assert!(!state.clients().snapshot("ghost", author.voter_id).team_message_submitted);

        let stored = store
            .select(Table::FirstMeMessages, Query::default())
            .await
            .unwrap();
        assert!(stored.is_empty());
    }
}
