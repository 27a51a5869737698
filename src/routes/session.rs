use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::Board,
    dto::{
        board::{
            BoardMessageRequest, BoardResponse, BoardSubmitResponse, TeamFilter,
            TeamMessageRequest,
        },
        session::{JoinRequest, JoinResponse, SessionResponse},
        vote::{
            CheerResponse, ConflictResponse, ConflictVoteRequest, KeywordRequest,
            KeywordResponse, MoodVoteRequest, MoodVoteResponse, MyMoodResponse,
        },
    },
    error::AppError,
    routes::identity,
    services::{board_service, session_service, vote_service},
    state::SharedState,
    sync::tally::MoodTally,
};

/// Participant endpoints: joining, polls, boards, keywords and cheers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session/{id}", get(get_session))
        .route("/session/{id}/join", post(join_session))
        .route("/session/{id}/mood", get(get_mood).post(cast_mood))
        .route("/session/{id}/mood/mine", get(get_my_mood))
        .route("/session/{id}/conflict", get(get_conflict).post(cast_conflict))
        .route(
            "/session/{id}/team-messages",
            get(get_team_messages).post(post_team_message),
        )
        .route(
            "/session/{id}/boards/{board}",
            get(get_board).post(post_board_message),
        )
        .route(
            "/session/{id}/keywords",
            get(get_keywords).post(submit_keyword),
        )
        .route("/session/{id}/cheers", get(get_cheers).post(send_cheer))
}

#[utoipa::path(
    get,
    path = "/session/{id}",
    tag = "session",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session with its current step and timer", body = SessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 503, description = "Remote store unavailable")
    )
)]
/// Return the session header, current step and derived countdown.
pub async fn get_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::get_session(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/join",
    tag = "session",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Participant identity", body = JoinResponse),
        (status = 400, description = "Blank name or invalid team"),
        (status = 404, description = "Unknown session")
    )
)]
/// Mint a voter id for a participant entering the session.
pub async fn join_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(session_service::join(&state, &session_id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/session/{id}/mood",
    tag = "polls",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Mood distribution", body = MoodTally))
)]
pub async fn get_mood(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<MoodTally>, AppError> {
    Ok(Json(vote_service::mood_tally(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/mood",
    tag = "polls",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join")
    ),
    request_body = MoodVoteRequest,
    responses(
        (status = 200, description = "Vote recorded or unchanged", body = MoodVoteResponse),
        (status = 409, description = "Another vote of this client is in flight"),
        (status = 503, description = "Write failed; selection reverted")
    )
)]
/// Select a mood; changing it overwrites the previous vote.
pub async fn cast_mood(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<MoodVoteRequest>,
) -> Result<Json<MoodVoteResponse>, AppError> {
    let voter = identity::participant(&headers)?;
    let response = vote_service::cast_mood(&state, &session_id, &voter, payload.emoji).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/session/{id}/mood/mine",
    tag = "polls",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join")
    ),
    responses((status = 200, description = "Caller's stored mood", body = MyMoodResponse))
)]
pub async fn get_my_mood(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MyMoodResponse>, AppError> {
    let voter = identity::participant(&headers)?;
    Ok(Json(
        vote_service::my_mood(&state, &session_id, voter.voter_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/session/{id}/conflict",
    tag = "polls",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = Option<String>, Header, description = "Voter id; omitted by displays")
    ),
    responses((status = 200, description = "Conflict poll as seen by the caller", body = ConflictResponse))
)]
pub async fn get_conflict(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConflictResponse>, AppError> {
    let viewer = identity::optional_participant(&headers)?;
    let response = vote_service::conflict_view(&state, &session_id, viewer.as_ref()).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/session/{id}/conflict",
    tag = "polls",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join")
    ),
    request_body = ConflictVoteRequest,
    responses(
        (status = 200, description = "Vote recorded; results reveal shortly", body = ConflictResponse),
        (status = 409, description = "This client already voted")
    )
)]
/// Answer the conflict poll once.
pub async fn cast_conflict(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ConflictVoteRequest>,
) -> Result<Json<ConflictResponse>, AppError> {
    let voter = identity::participant(&headers)?;
    let response =
        vote_service::cast_conflict(&state, &session_id, &voter, payload.has_conflict).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/session/{id}/team-messages",
    tag = "boards",
    params(("id" = String, Path, description = "Session identifier"), TeamFilter),
    responses((status = 200, description = "Team messages, newest first", body = BoardResponse))
)]
pub async fn get_team_messages(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(filter): Query<TeamFilter>,
    headers: HeaderMap,
) -> Result<Json<BoardResponse>, AppError> {
    let viewer = identity::optional_participant(&headers)?;
    let response =
        board_service::team_messages(&state, &session_id, filter.team, viewer.as_ref()).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/session/{id}/team-messages",
    tag = "boards",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join"),
        ("X-Nickname" = String, Header, description = "URL-encoded nickname"),
        ("X-Team" = Option<u32>, Header, description = "Team number")
    ),
    request_body = TeamMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = BoardSubmitResponse),
        (status = 400, description = "Blank or too long message, or no nickname")
    )
)]
/// Leave a message for one's team under the conflict poll.
pub async fn post_team_message(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<TeamMessageRequest>>,
) -> Result<Json<BoardSubmitResponse>, AppError> {
    let author = identity::participant(&headers)?;
    let response =
        board_service::post_team_message(&state, &session_id, &author, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/session/{id}/boards/{board}",
    tag = "boards",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("board" = Board, Path, description = "`first-me` or `proud`"),
        TeamFilter
    ),
    responses((status = 200, description = "Board messages, newest first", body = BoardResponse))
)]
pub async fn get_board(
    State(state): State<SharedState>,
    Path((session_id, board)): Path<(String, Board)>,
    Query(filter): Query<TeamFilter>,
    headers: HeaderMap,
) -> Result<Json<BoardResponse>, AppError> {
    let viewer = identity::optional_participant(&headers)?;
    let response =
        board_service::board(&state, &session_id, board, filter.team, viewer.as_ref()).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/session/{id}/boards/{board}",
    tag = "boards",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("board" = Board, Path, description = "`first-me` or `proud`"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join"),
        ("X-Nickname" = Option<String>, Header, description = "URL-encoded nickname; anonymous when absent"),
        ("X-Team" = Option<u32>, Header, description = "Team number")
    ),
    request_body = BoardMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = BoardSubmitResponse),
        (status = 400, description = "Blank or too long message")
    )
)]
/// Post a message on the FirstMe or Proud board.
pub async fn post_board_message(
    State(state): State<SharedState>,
    Path((session_id, board)): Path<(String, Board)>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<BoardMessageRequest>>,
) -> Result<Json<BoardSubmitResponse>, AppError> {
    let author = identity::participant(&headers)?;
    let response =
        board_service::post_board_message(&state, &session_id, board, &author, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/session/{id}/keywords",
    tag = "polls",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Keyword cloud", body = KeywordResponse))
)]
pub async fn get_keywords(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<KeywordResponse>, AppError> {
    let viewer = identity::optional_participant(&headers)?;
    let response = vote_service::keywords(&state, &session_id, viewer.as_ref()).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/session/{id}/keywords",
    tag = "polls",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Voter-Id" = String, Header, description = "Voter id returned by join")
    ),
    request_body = KeywordRequest,
    responses(
        (status = 200, description = "Keyword stored", body = KeywordResponse),
        (status = 400, description = "Blank or too long keyword")
    )
)]
pub async fn submit_keyword(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<KeywordRequest>>,
) -> Result<Json<KeywordResponse>, AppError> {
    let voter = identity::participant(&headers)?;
    let response = vote_service::submit_keyword(&state, &session_id, &voter, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/session/{id}/cheers",
    tag = "polls",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Cheer count", body = CheerResponse))
)]
pub async fn get_cheers(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<CheerResponse>, AppError> {
    Ok(Json(vote_service::cheer_count(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/cheers",
    tag = "polls",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Cheer sent", body = CheerResponse))
)]
pub async fn send_cheer(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<CheerResponse>, AppError> {
    Ok(Json(vote_service::cheer(&state, &session_id).await?))
}
