use time::OffsetDateTime;
use tracing::info;

use crate::{
    dao::{
        models::{SessionEntity, Timestamp},
        repository::SessionRepository,
    },
    dto::session::{JoinRequest, JoinResponse, SessionResponse},
    error::ServiceError,
    services::recap_service,
    state::{
        SharedState,
        identity::ClientIdentity,
        steps::{Step, StepView},
    },
    sync::timer::{TimerView, timer_view},
};

/// Fetch a session row or report it missing.
pub(crate) async fn load_session(
    repository: &SessionRepository,
    session_id: &str,
) -> Result<SessionEntity, ServiceError> {
    repository
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
}

/// Session header with its current step and derived countdown.
pub async fn get_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionResponse, ServiceError> {
    let repository = state.require_repository().await?;
    let session = load_session(&repository, session_id).await?;
    let step = Step::from_stored(session.current_step);
    let timer = timer_view(
        state.config().timer_duration,
        session.timer_started_at.flatten(),
        OffsetDateTime::now_utc(),
    );

    Ok(SessionResponse {
        id: session.id,
        name: session.name,
        is_active: session.is_active,
        created_at: session.created_at,
        step: step.into(),
        timer,
    })
}

/// Mint a participant identity for an existing session.
pub async fn join(
    state: &SharedState,
    session_id: &str,
    request: JoinRequest,
) -> Result<JoinResponse, ServiceError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be blank".into()));
    }
    if request.team == 0 {
        return Err(ServiceError::InvalidInput("team must be at least 1".into()));
    }

    let repository = state.require_repository().await?;
    load_session(&repository, session_id).await?;

    let identity = ClientIdentity::mint(name, Some(request.team));
    info!(
        session = session_id,
        voter_id = %identity.voter_id,
        team = request.team,
        "participant joined"
    );

    Ok(JoinResponse {
        voter_id: identity.voter_id,
        nickname: identity.nickname.clone(),
        team: request.team,
        team_label: identity.team_label(),
        recap_link: recap_service::share_link(session_id, name, request.team),
    })
}

/// Jump to step `index`, clamped into the sequence.
pub async fn go_to_step(
    state: &SharedState,
    session_id: &str,
    index: i64,
) -> Result<StepView, ServiceError> {
    let repository = state.require_repository().await?;
    write_step(&repository, session_id, Step::clamped(index)).await
}

/// Advance one step; stays on the last step.
pub async fn next_step(state: &SharedState, session_id: &str) -> Result<StepView, ServiceError> {
    let repository = state.require_repository().await?;
    let session = load_session(&repository, session_id).await?;
    let step = Step::from_stored(session.current_step).next();
    write_step(&repository, session_id, step).await
}

/// Go back one step; stays on the first step.
pub async fn prev_step(state: &SharedState, session_id: &str) -> Result<StepView, ServiceError> {
    let repository = state.require_repository().await?;
    let session = load_session(&repository, session_id).await?;
    let step = Step::from_stored(session.current_step).prev();
    write_step(&repository, session_id, step).await
}

async fn write_step(
    repository: &SessionRepository,
    session_id: &str,
    step: Step,
) -> Result<StepView, ServiceError> {
    if !repository.set_current_step(session_id, step.index()).await? {
        return Err(ServiceError::SessionNotFound(session_id.to_string()));
    }
    info!(session = session_id, ?step, "facilitator moved to step");
    Ok(step.into())
}

/// Start the shared countdown now. Restarting overwrites the previous start.
pub async fn start_timer(state: &SharedState, session_id: &str) -> Result<TimerView, ServiceError> {
    let repository = state.require_repository().await?;
    let now = Timestamp::now();
    if !repository.set_timer_started_at(session_id, Some(now)).await? {
        return Err(ServiceError::SessionNotFound(session_id.to_string()));
    }
    info!(session = session_id, "timer started");
    Ok(timer_view(
        state.config().timer_duration,
        Some(now),
        now.instant(),
    ))
}

/// Put the shared countdown back to idle.
pub async fn reset_timer(state: &SharedState, session_id: &str) -> Result<TimerView, ServiceError> {
    let repository = state.require_repository().await?;
    if !repository.set_timer_started_at(session_id, None).await? {
        return Err(ServiceError::SessionNotFound(session_id.to_string()));
    }
    info!(session = session_id, "timer reset");
    Ok(timer_view(
        state.config().timer_duration,
        None,
        OffsetDateTime::now_utc(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::test_support::state_with_session, sync::timer::TimerStatus};

    #[tokio::test]
    async fn step_writes_are_clamped_and_mirrored() {
        let (state, _store) = state_with_session("s1").await;

        let view = go_to_step(&state, "s1", 42).await.unwrap();
        assert_eq!(view.step, Step::Cheer);
        assert!(view.is_last);

        let session = get_session(&state, "s1").await.unwrap();
        assert_eq!(session.step.index, 6);

        assert_eq!(next_step(&state, "s1").await.unwrap().step, Step::Cheer);
        assert_eq!(prev_step(&state, "s1").await.unwrap().step, Step::Proud);
        assert_eq!(go_to_step(&state, "s1", -3).await.unwrap().step, Step::Condition);
    }

    #[tokio::test]
    async fn missing_step_counts_as_first() {
        let (state, _store) = state_with_session("s1").await;
        assert_eq!(next_step(&state, "s1").await.unwrap().step, Step::Reset);
    }

    #[tokio::test]
    async fn timer_start_and_reset_round_trip_through_the_row() {
        let (state, _store) = state_with_session("s1").await;

        let started = start_timer(&state, "s1").await.unwrap();
        assert_eq!(started.status, TimerStatus::Running);
        assert_eq!(started.remaining_secs, 60);

        let session = get_session(&state, "s1").await.unwrap();
        assert_eq!(session.timer.status, TimerStatus::Running);

        let reset = reset_timer(&state, "s1").await.unwrap();
        assert_eq!(reset.status, TimerStatus::Idle);
        let session = get_session(&state, "s1").await.unwrap();
        assert_eq!(session.timer.status, TimerStatus::Idle);
        assert_eq!(session.timer.remaining_secs, 60);
    }

    #[tokio::test]
    async fn join_validates_input_and_session() {
        let (state, _store) = state_with_session("s1").await;

        let joined = join(
            &state,
            "s1",
            JoinRequest {
                name: "  민아 ".into(),
                team: 3,
            },
        )
        .await
        .unwrap();
        assert_eq!(joined.nickname, "민아");
        assert_eq!(joined.team_label, "3조 민아");
        assert!(joined.recap_link.starts_with("/session/s1/my-recap?name="));

        let blank = join(
            &state,
            "s1",
            JoinRequest {
                name: " ".into(),
                team: 1,
            },
        )
        .await;
        assert!(matches!(blank, Err(ServiceError::InvalidInput(_))));

        let missing = join(
            &state,
            "nope",
            JoinRequest {
                name: "a".into(),
                team: 1,
            },
        )
        .await;
        assert!(matches!(missing, Err(ServiceError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn writes_on_unknown_session_report_not_found() {
        let (state, _store) = state_with_session("s1").await;
        assert!(matches!(
            start_timer(&state, "other").await,
            Err(ServiceError::SessionNotFound(_))
        ));
    }
}
