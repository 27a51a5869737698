use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};

use crate::{
    dto::session::StepRequest,
    error::AppError,
    services::session_service,
    state::{SharedState, steps::StepView},
    sync::timer::TimerView,
};

const FACILITATOR_TOKEN_HEADER: &str = "x-facilitator-token";

/// Facilitator-only endpoints driving step progression and the shared timer.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/session/{id}/display/step", post(go_to_step))
        .route("/session/{id}/display/next", post(next_step))
        .route("/session/{id}/display/prev", post(prev_step))
        .route("/session/{id}/display/timer/start", post(start_timer))
        .route("/session/{id}/display/timer/reset", post(reset_timer))
        .route_layer(middleware::from_fn_with_state(
            state,
            require_facilitator_token,
        ))
}

#[utoipa::path(
    post,
    path = "/session/{id}/display/step",
    tag = "display",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Facilitator-Token" = String, Header, description = "Token issued by the display stream")
    ),
    request_body = StepRequest,
    responses(
        (status = 200, description = "Step stored", body = StepView),
        (status = 401, description = "Missing or unknown facilitator token")
    )
)]
/// Jump to a step; out-of-range indices are clamped.
pub async fn go_to_step(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(payload): Json<StepRequest>,
) -> Result<Json<StepView>, AppError> {
    Ok(Json(
        session_service::go_to_step(&state, &session_id, payload.step).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/session/{id}/display/next",
    tag = "display",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Facilitator-Token" = String, Header, description = "Token issued by the display stream")
    ),
    responses((status = 200, description = "Step stored", body = StepView))
)]
pub async fn next_step(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<StepView>, AppError> {
    Ok(Json(session_service::next_step(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/display/prev",
    tag = "display",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Facilitator-Token" = String, Header, description = "Token issued by the display stream")
    ),
    responses((status = 200, description = "Step stored", body = StepView))
)]
pub async fn prev_step(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<StepView>, AppError> {
    Ok(Json(session_service::prev_step(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/display/timer/start",
    tag = "display",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Facilitator-Token" = String, Header, description = "Token issued by the display stream")
    ),
    responses((status = 200, description = "Countdown running", body = TimerView))
)]
/// Start (or restart) the shared countdown.
pub async fn start_timer(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    Ok(Json(session_service::start_timer(&state, &session_id).await?))
}

#[utoipa::path(
    post,
    path = "/session/{id}/display/timer/reset",
    tag = "display",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("X-Facilitator-Token" = String, Header, description = "Token issued by the display stream")
    ),
    responses((status = 200, description = "Countdown idle", body = TimerView))
)]
pub async fn reset_timer(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    Ok(Json(session_service::reset_timer(&state, &session_id).await?))
}

async fn require_facilitator_token(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(FACILITATOR_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized(
                "missing facilitator token header `X-Facilitator-Token`".into(),
            )
        })?;

    if state.is_facilitator(&session_id, provided) {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized(
            "facilitator token not issued for this session".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::state_with_session;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn step_request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/session/s1/display/next");
        if let Some(token) = token {
            builder = builder.header(FACILITATOR_TOKEN_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn writes_require_a_token_for_the_session() {
        let (state, _store) = state_with_session("s1").await;
        let app = router(state.clone()).with_state(state.clone());

        let missing = app.clone().oneshot(step_request(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let foreign = state.issue_facilitator_token("s2");
        let wrong = app.clone().oneshot(step_request(Some(&foreign))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let token = state.issue_facilitator_token("s1");
        let allowed = app.oneshot(step_request(Some(&token))).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
