use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    routes::identity,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

/// Participant identity in the query string; `EventSource` cannot send headers.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParticipantStreamQuery {
    /// Voter id returned by join.
    pub voter_id: String,
    /// URL-encoded nickname.
    pub nickname: Option<String>,
    pub team: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sse/session/{id}",
    tag = "sse",
    params(("id" = String, Path, description = "Session identifier"), ParticipantStreamQuery),
    responses((status = 200, description = "Participant live stream", content_type = "text/event-stream", body = String))
)]
/// Mirror the session for one participant.
pub async fn participant_stream(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(query): Query<ParticipantStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let participant = identity::identity_from_parts(
        &query.voter_id,
        query.nickname.as_deref(),
        query.team.as_deref(),
    )?;
    let subscription =
        sse_service::subscribe_participant(&state, &session_id, participant).await?;
    info!(session = %session_id, voter_id = %query.voter_id, "New participant SSE connection");
    Ok(sse_service::to_sse_stream(
        subscription,
        StreamKind::Participant { session_id },
    ))
}

/// Display credentials in the query string.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DisplayStreamQuery {
    /// Shared display secret, required when the server configures one.
    pub secret: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sse/session/{id}/display",
    tag = "sse",
    params(("id" = String, Path, description = "Session identifier"), DisplayStreamQuery),
    responses(
        (status = 200, description = "Display live stream; first event carries the facilitator token", content_type = "text/event-stream", body = String),
        (status = 401, description = "Display secret missing or wrong")
    )
)]
/// Mirror the session for a facilitator display and issue its write token.
pub async fn display_stream(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(query): Query<DisplayStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (subscription, facilitator_token) =
        sse_service::subscribe_display(&state, &session_id, query.secret.as_deref()).await?;
    info!(session = %session_id, "New display SSE connection");
    Ok(sse_service::to_sse_stream(
        subscription,
        StreamKind::Display {
            state,
            session_id,
            facilitator_token,
        },
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/session/{id}", get(participant_stream))
        .route("/sse/session/{id}/display", get(display_stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::remote_store::{Table, memory::MemoryStore},
        state::AppState,
    };
    use axum::{body::Body, http::{Request, StatusCode}};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn display_request(query: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/sse/session/s1/display{query}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn display_stream_requires_the_configured_secret() {
        let state = AppState::new(AppConfig {
            display_secret: Some("s3cret".into()),
            ..AppConfig::default()
        });
        let store = Arc::new(MemoryStore::new());
        store.seed(
            Table::Sessions,
            json!({"id": "s1", "name": "Kickoff", "is_active": true}),
        );
        state.install_store(store).await;
        let app = router().with_state(state);

        let missing = app.clone().oneshot(display_request("")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(display_request("?secret=nope"))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let allowed = app.oneshot(display_request("?secret=s3cret")).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
