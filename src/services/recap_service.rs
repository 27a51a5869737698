use futures::try_join;

use crate::{
    dao::models::{Board, BoardMessageEntity},
    dto::recap::{PersonalRecap, RecapKeyword, SessionRecap},
    error::ServiceError,
    services::session_service::load_session,
    state::SharedState,
    sync::{
        board::BoardMessage,
        keywords::keyword_cloud,
        tally::{tally_conflicts, tally_moods},
    },
};

/// Relative link opening the personal recap of `(name, team)`.
pub fn share_link(session_id: &str, name: &str, team: u32) -> String {
    format!(
        "/session/{}/my-recap?name={}&team={team}",
        urlencoding::encode(session_id),
        urlencoding::encode(name),
    )
}

/// Everything the session produced.
pub async fn session_recap(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionRecap, ServiceError> {
    let repository = state.require_repository().await?;
    let session = load_session(&repository, session_id).await?;

    let (moods, conflicts, first_me, proud, team_messages, keywords, cheers) = try_join!(
        repository.list_condition_votes(session_id),
        repository.list_conflict_votes(session_id),
        repository.list_board_messages(Board::FirstMe, session_id),
        repository.list_board_messages(Board::Proud, session_id),
        repository.list_team_messages(session_id),
        repository.list_keywords(session_id),
        repository.count_cheers(session_id),
    )?;

    Ok(SessionRecap {
        session: session.into(),
        mood: tally_moods(&moods),
        conflict: tally_conflicts(&conflicts),
        first_me: first_me.into_iter().map(BoardMessage::from).collect(),
        proud: proud.into_iter().map(BoardMessage::from).collect(),
        team_messages: team_messages.into_iter().map(BoardMessage::from).collect(),
        keywords: keyword_cloud(&keywords, state.config().keyword_limit),
        cheers,
    })
}

/// What `(name, team)` wrote, plus the session's latest keywords.
pub async fn personal_recap(
    state: &SharedState,
    session_id: &str,
    name: &str,
    team: u32,
) -> Result<PersonalRecap, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be blank".into()));
    }

    let repository = state.require_repository().await?;
    let session = load_session(&repository, session_id).await?;

    let limit = state.config().recap_keyword_limit;
    let (first_me, proud, team_messages, recent, keyword_total) = try_join!(
        repository.list_board_messages(Board::FirstMe, session_id),
        repository.list_board_messages(Board::Proud, session_id),
        repository.list_team_messages(session_id),
        repository.recent_keywords(session_id, limit),
        repository.count_keywords(session_id),
    )?;

    let authored =
        |message: &BoardMessage| message.nickname == name && message.team_number == Some(team);
    let mine = |rows: Vec<BoardMessageEntity>| -> Vec<BoardMessage> {
        rows.into_iter()
            .map(BoardMessage::from)
            .filter(|message| authored(message))
            .collect()
    };

    Ok(PersonalRecap {
        session: session.into(),
        name: name.to_string(),
        team,
        first_me: mine(first_me),
        proud: mine(proud),
        team_messages: team_messages
            .into_iter()
            .map(BoardMessage::from)
            .filter(|message| message.team_number == Some(team))
            .collect(),
        recent_keywords: recent
            .into_iter()
            .map(|row| RecapKeyword {
                keyword: row.keyword,
                created_at: row.created_at,
            })
            .collect(),
        keyword_total,
        share_link: share_link(session_id, name, team),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::Emoji,
        dto::{board::BoardMessageRequest, vote::KeywordRequest},
        services::{board_service, test_support::state_with_session, vote_service},
        state::identity::ClientIdentity,
    };

    #[test]
    fn share_link_encodes_the_name() {
        assert_eq!(
            share_link("s1", "김 민아", 3),
            "/session/s1/my-recap?name=%EA%B9%80%20%EB%AF%BC%EC%95%84&team=3"
        );
    }

    #[tokio::test]
    async fn recaps_collect_session_and_personal_output() {
        let (state, _store) = state_with_session("s1").await;
        let mina = ClientIdentity::mint("민아", Some(3));
        let other = ClientIdentity::mint("준", Some(5));

        vote_service::cast_mood(&state, "s1", &mina, Emoji::Fire)
            .await
            .unwrap();
        for (author, text) in [(&mina, "처음"), (&other, "남의 글")] {
            board_service::post_board_message(
                &state,
                "s1",
                Board::FirstMe,
                author,
                BoardMessageRequest {
                    message: text.into(),
                },
            )
            .await
            .unwrap();
        }
        vote_service::submit_keyword(
            &state,
            "s1",
            &other,
            KeywordRequest {
                keyword: "소통".into(),
            },
        )
        .await
        .unwrap();
        vote_service::cheer(&state, "s1").await.unwrap();

        let recap = session_recap(&state, "s1").await.unwrap();
        assert_eq!(recap.mood.total, 1);
        assert_eq!(recap.first_me.len(), 2);
        assert_eq!(recap.keywords.total, 1);
        assert_eq!(recap.cheers, 1);

        let personal = personal_recap(&state, "s1", "민아", 3).await.unwrap();
        assert_eq!(personal.first_me.len(), 1);
        assert_eq!(personal.first_me[0].message, "처음");
        assert!(personal.proud.is_empty());
        assert_eq!(personal.keyword_total, 1);
        assert_eq!(personal.recent_keywords[0].keyword, "소통");
    }
}
