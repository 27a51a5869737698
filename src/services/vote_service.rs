use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::Emoji,
    dto::vote::{
        CheerResponse, ConflictResponse, KeywordRequest, KeywordResponse, MoodVoteResponse,
        MyMoodResponse,
    },
    error::ServiceError,
    services::session_service::load_session,
    state::{
        SharedState,
        conflict::{ConflictReveal, RevealEvent, RevealPhase},
        identity::{ClientIdentity, MoodSelection},
    },
    sync::{
        board::BoardMessage,
        keywords::keyword_cloud,
        tally::{MoodTally, tally_conflicts, tally_moods},
    },
};

/// Current mood distribution of the session.
pub async fn mood_tally(state: &SharedState, session_id: &str) -> Result<MoodTally, ServiceError> {
    let repository = state.require_repository().await?;
    let votes = repository.list_condition_votes(session_id).await?;
    Ok(tally_moods(&votes))
}

/// Stored mood of `voter_id`, adopted as the client's selection when it has none yet.
pub async fn my_mood(
    state: &SharedState,
    session_id: &str,
    voter_id: Uuid,
) -> Result<MyMoodResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let stored = repository
        .find_condition_vote(session_id, voter_id)
        .await?
        .map(|vote| vote.emoji);
    if let Some(emoji) = stored {
        state
            .clients()
            .adopt_stored_mood(session_id, voter_id, emoji);
    }
    Ok(MyMoodResponse { emoji: stored })
}

/// Select `emoji` optimistically and upsert it, restoring the previous selection on failure.
///
/// Cancelling the returned future while the write is in flight also restores it.
pub async fn cast_mood(
    state: &SharedState,
    session_id: &str,
    identity: &ClientIdentity,
    emoji: Emoji,
) -> Result<MoodVoteResponse, ServiceError> {
    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    let clients = state.clients();
    let voter_id = identity.voter_id;

    let changed = match clients.begin_mood_vote(session_id, voter_id, emoji)? {
        MoodSelection::Unchanged => false,
        MoodSelection::Pending(claim) => {
            if let Err(err) = repository
                .upsert_condition_vote(session_id, voter_id, emoji)
                .await
            {
                drop(claim);
                warn!(
                    session = session_id,
                    %voter_id,
                    restored = ?clients.snapshot(session_id, voter_id).mood,
                    error = %err,
                    "mood vote failed; selection reverted"
                );
                return Err(err.into());
            }
            claim.commit();
            info!(session = session_id, %voter_id, emoji = emoji.glyph(), "mood vote recorded");
            true
        }
    };

    let votes = repository.list_condition_votes(session_id).await?;
    Ok(MoodVoteResponse {
        selected: clients.snapshot(session_id, voter_id).mood,
        changed,
        tally: tally_moods(&votes),
    })
}

/// Conflict poll as seen by `viewer`; `None` views it as the facilitator display.
pub async fn conflict_view(
    state: &SharedState,
    session_id: &str,
    viewer: Option<&ClientIdentity>,
) -> Result<ConflictResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let votes = repository.list_conflict_votes(session_id).await?;
    let messages = repository.list_team_messages(session_id).await?;

    let (phase, team_message_submitted) = match viewer {
        None => (ConflictReveal::revealed().phase(), false),
        Some(identity) => {
            let clients = state.clients();
            let phase = clients
                .apply_conflict(
                    session_id,
                    identity.voter_id,
                    RevealEvent::Tick {
                        now: Instant::now(),
                        delay: state.config().reveal_delay,
                    },
                )
                .unwrap_or_else(|err| err.from);
            let flags = clients.snapshot(session_id, identity.voter_id);
            (phase, flags.team_message_submitted)
        }
    };

    Ok(ConflictResponse {
        phase,
        tally: (phase == RevealPhase::Revealed).then(|| tally_conflicts(&votes)),
        team_messages: messages.into_iter().map(BoardMessage::from).collect(),
        team_message_submitted,
    })
}

/// Record the caller's conflict answer; one answer per client.
pub async fn cast_conflict(
    state: &SharedState,
    session_id: &str,
    identity: &ClientIdentity,
    has_conflict: bool,
) -> Result<ConflictResponse, ServiceError> {
    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    let claim = state
        .clients()
        .begin_conflict_vote(session_id, identity.voter_id)?;

    repository
        .insert_conflict_vote(session_id, has_conflict)
        .await?;
    claim.commit();
    info!(
        session = session_id,
        voter_id = %identity.voter_id,
        has_conflict,
        "conflict vote recorded"
    );

    conflict_view(state, session_id, Some(identity)).await
}

/// Keyword cloud plus the caller's submission flag.
pub async fn keywords(
    state: &SharedState,
    session_id: &str,
    viewer: Option<&ClientIdentity>,
) -> Result<KeywordResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let rows = repository.list_keywords(session_id).await?;
    let submitted = viewer.is_some_and(|identity| {
        state
            .clients()
            .snapshot(session_id, identity.voter_id)
            .keyword_submitted
    });

    Ok(KeywordResponse {
        cloud: keyword_cloud(&rows, state.config().keyword_limit),
        submitted,
    })
}

/// Store a trimmed keyword; the submitted flag is only set once the write succeeds.
pub async fn submit_keyword(
    state: &SharedState,
    session_id: &str,
    identity: &ClientIdentity,
    request: KeywordRequest,
) -> Result<KeywordResponse, ServiceError> {
    let keyword = request.keyword.trim();
    if keyword.is_empty() {
        return Err(ServiceError::InvalidInput("keyword must not be blank".into()));
    }

    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    repository.insert_keyword(session_id, keyword).await?;
    state
        .clients()
        .mark_keyword_submitted(session_id, identity.voter_id);
    info!(session = session_id, voter_id = %identity.voter_id, "keyword submitted");

    keywords(state, session_id, Some(identity)).await
}

pub async fn cheer_count(state: &SharedState, session_id: &str) -> Result<CheerResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let count = repository.count_cheers(session_id).await?;
    Ok(CheerResponse { count })
}

/// Send one cheer. Unlimited per client.
pub async fn cheer(state: &SharedState, session_id: &str) -> Result<CheerResponse, ServiceError> {
    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;
    repository.insert_cheer(session_id).await?;
    let count = repository.count_cheers(session_id).await?;
    Ok(CheerResponse { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::remote_store::{Query, RemoteStore, Table},
        services::test_support::{state_with_gated_session, state_with_session},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn mood_votes_are_tallied_in_fixed_order() {
        let (state, _store) = state_with_session("s1").await;
        let first = ClientIdentity::mint("a", Some(1));
        let second = ClientIdentity::mint("b", Some(1));
        let third = ClientIdentity::mint("c", Some(2));

        cast_mood(&state, "s1", &first, Emoji::Sleepy).await.unwrap();
        let response = cast_mood(&state, "s1", &second, Emoji::Fire).await.unwrap();
        assert_eq!(response.tally.total, 2);
        assert_eq!(response.tally.counts[0].percentage, 50);
        assert_eq!(response.tally.counts[2].percentage, 50);

        let response = cast_mood(&state, "s1", &third, Emoji::Strong).await.unwrap();
        assert_eq!(response.tally.total, 3);
        let shares: Vec<u8> = response
            .tally
            .counts
            .iter()
            .map(|count| count.percentage)
            .collect();
        assert_eq!(shares, vec![33, 0, 33, 33]);
    }

    #[tokio::test]
    async fn changed_mood_overwrites_and_reselect_is_a_noop() {
        let (state, _store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", None);

        cast_mood(&state, "s1", &voter, Emoji::Sleepy).await.unwrap();
        let changed = cast_mood(&state, "s1", &voter, Emoji::Strong).await.unwrap();
        assert!(changed.changed);
        assert_eq!(changed.tally.total, 1);
        assert_eq!(changed.selected, Some(Emoji::Strong));

        let same = cast_mood(&state, "s1", &voter, Emoji::Strong).await.unwrap();
        assert!(!same.changed);

        let mine = my_mood(&state, "s1", voter.voter_id).await.unwrap();
        assert_eq!(mine.emoji, Some(Emoji::Strong));
    }

    #[tokio::test]
    async fn failed_mood_write_restores_previous_selection() {
        let (state, store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", None);
        cast_mood(&state, "s1", &voter, Emoji::Dizzy).await.unwrap();

        store.set_offline(true);
        let failed = cast_mood(&state, "s1", &voter, Emoji::Fire).await;
        assert!(matches!(failed, Err(ServiceError::Store(_))));
        let flags = state.clients().snapshot("s1", voter.voter_id);
        assert_eq!(flags.mood, Some(Emoji::Dizzy));
        assert!(!flags.mood_in_flight);
    }

    #[tokio::test]
    async fn cancelled_mood_vote_releases_the_selection() {
        let (state, _store, gated) = state_with_gated_session("s1").await;
        let voter = ClientIdentity::mint("a", None);

        let stalled = tokio::time::timeout(
            Duration::from_millis(50),
            cast_mood(&state, "s1", &voter, Emoji::Fire),
        )
        .await;
        assert!(stalled.is_err());
        let flags = state.clients().snapshot("s1", voter.voter_id);
        assert!(!flags.mood_in_flight);
        assert_eq!(flags.mood, None);

        gated.open();
        let retried = cast_mood(&state, "s1", &voter, Emoji::Fire).await.unwrap();
        assert!(retried.changed);
        assert_eq!(retried.selected, Some(Emoji::Fire));
        assert_eq!(retried.tally.total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_results_reveal_after_the_delay() {
        let (state, _store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", Some(1));

        let before = conflict_view(&state, "s1", Some(&voter)).await.unwrap();
        assert_eq!(before.phase, RevealPhase::NotVoted);
        assert!(before.tally.is_none());

        let voted = cast_conflict(&state, "s1", &voter, true).await.unwrap();
        assert_eq!(voted.phase, RevealPhase::VotedAwaitingReveal);

        tokio::time::advance(Duration::from_millis(600)).await;
        let after = conflict_view(&state, "s1", Some(&voter)).await.unwrap();
        assert_eq!(after.phase, RevealPhase::Revealed);
        assert_eq!(after.tally.map(|tally| tally.yes), Some(1));

        let again = cast_conflict(&state, "s1", &voter, false).await;
        assert!(matches!(again, Err(ServiceError::Duplicate(_))));
    }

    #[tokio::test]
    async fn failed_conflict_write_leaves_the_flag_unset() {
        let (state, store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", Some(1));

        store.set_offline(true);
        assert!(cast_conflict(&state, "s1", &voter, true).await.is_err());
        store.set_offline(false);
        assert!(cast_conflict(&state, "s1", &voter, true).await.is_ok());
    }

    #[tokio::test]
    async fn keyword_flag_follows_successful_writes() {
        let (state, store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", None);

        store.set_offline(true);
        let failed = submit_keyword(
            &state,
            "s1",
            &voter,
            KeywordRequest {
                keyword: "역할분담".into(),
            },
        )
        .await;
        assert!(failed.is_err());
        assert!(!state.clients().snapshot("s1", voter.voter_id).keyword_submitted);

        store.set_offline(false);
        let response = submit_keyword(
            &state,
            "s1",
            &voter,
            KeywordRequest {
                keyword: " 역할분담 ".into(),
            },
        )
        .await
        .unwrap();
        assert!(response.submitted);
        assert_eq!(response.cloud.keywords[0].keyword, "역할분담");
    }

    #[tokio::test]
    async fn cheers_accumulate() {
        let (state, _store) = state_with_session("s1").await;
        cheer(&state, "s1").await.unwrap();
        let response = cheer(&state, "s1").await.unwrap();
        assert_eq!(response.count, 2);
        assert_eq!(cheer_count(&state, "s1").await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn concurrent_conflict_votes_write_once() {
        let (state, store, gated) = state_with_gated_session("s1").await;
        let voter = ClientIdentity::mint("a", Some(1));

        let first = cast_conflict(&state, "s1", &voter, true);
        let second = async {
            while !state.clients().snapshot("s1", voter.voter_id).conflict_in_flight {
                tokio::task::yield_now().await;
            }
            let result = cast_conflict(&state, "s1", &voter, false).await;
            gated.open();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().phase, RevealPhase::VotedAwaitingReveal);
        assert!(matches!(second, Err(ServiceError::Duplicate(_))));
        let rows = store
            .select(Table::ConflictVotes, Query::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_conflict_vote_can_be_retried() {
        let (state, _store, gated) = state_with_gated_session("s1").await;
        let voter = ClientIdentity::mint("a", Some(1));

        let stalled = tokio::time::timeout(
            Duration::from_millis(50),
            cast_conflict(&state, "s1", &voter, true),
        )
        .await;
        assert!(stalled.is_err());
        assert!(!state.clients().snapshot("s1", voter.voter_id).conflict_in_flight);

        gated.open();
        assert!(cast_conflict(&state, "s1", &voter, true).await.is_ok());
    }

    #[tokio::test]
    async fn writes_to_unknown_sessions_are_refused() {
        let (state, _store) = state_with_session("s1").await;
        let voter = ClientIdentity::mint("a", Some(1));

        let mood = cast_mood(&state, "ghost", &voter, Emoji::Fire).await;
        assert!(matches!(mood, Err(ServiceError::SessionNotFound(id)) if id == "ghost"));
        let conflict = cast_conflict(&state, "ghost", &voter, true).await;
        assert!(matches!(conflict, Err(ServiceError::SessionNotFound(_))));
        let keyword = submit_keyword(
            &state,
            "ghost",
            &voter,
            KeywordRequest {
                keyword: "소통".into(),
            },
        )
        .await;
        assert!(matches!(keyword, Err(ServiceError::SessionNotFound(_))));
        assert!(matches!(
            cheer(&state, "ghost").await,
            Err(ServiceError::SessionNotFound(_))
        ));

        assert_eq!(state.clients().tracked(), 0);
    }
}
