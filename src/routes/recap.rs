use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
};

use crate::{
    dto::recap::{PersonalRecap, RecapQuery, SessionRecap},
    error::AppError,
    routes::identity,
    services::recap_service,
    state::SharedState,
};

/// Closing-screen recaps.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session/{id}/recap", get(get_session_recap))
        .route("/session/{id}/my-recap", get(get_personal_recap))
}

#[utoipa::path(
    get,
    path = "/session/{id}/recap",
    tag = "recap",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Whole-session recap", body = SessionRecap),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session_recap(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionRecap>, AppError> {
    Ok(Json(
        recap_service::session_recap(&state, &session_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/session/{id}/my-recap",
    tag = "recap",
    params(
        ("id" = String, Path, description = "Session identifier"),
        RecapQuery,
        ("X-Nickname" = Option<String>, Header, description = "Used when the query lacks `name`"),
        ("X-Team" = Option<u32>, Header, description = "Used when the query lacks `team`")
    ),
    responses(
        (status = 200, description = "Personal recap", body = PersonalRecap),
        (status = 400, description = "No identity in the query or headers")
    )
)]
/// Personal recap of the shared link's identity, or of the caller.
pub async fn get_personal_recap(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(query): Query<RecapQuery>,
    headers: HeaderMap,
) -> Result<Json<PersonalRecap>, AppError> {
    let (name, team) = match (query.name, query.team) {
        (Some(name), Some(team)) => (name, team),
        _ => {
            let caller = identity::optional_participant(&headers)?;
            match caller {
                Some(identity) if !identity.nickname.trim().is_empty() => {
                    let team = identity.team.ok_or_else(|| {
                        AppError::BadRequest("a team is required for a personal recap".into())
                    })?;
                    (identity.nickname, team)
                }
                _ => {
                    return Err(AppError::BadRequest(
                        "personal recap needs `name` and `team`".into(),
                    ));
                }
            }
        }
    };

    let recap = recap_service::personal_recap(&state, &session_id, &name, team).await?;
    Ok(Json(recap))
}
