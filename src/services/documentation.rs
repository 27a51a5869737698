use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Huddle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::participant_stream,
        crate::routes::sse::display_stream,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::get_mood,
        crate::routes::session::cast_mood,
        crate::routes::session::get_my_mood,
        crate::routes::session::get_conflict,
        crate::routes::session::cast_conflict,
        crate::routes::session::get_team_messages,
        crate::routes::session::post_team_message,
        crate::routes::session::get_board,
        crate::routes::session::post_board_message,
        crate::routes::session::get_keywords,
        crate::routes::session::submit_keyword,
        crate::routes::session::get_cheers,
        crate::routes::session::send_cheer,
        crate::routes::display::go_to_step,
        crate::routes::display::next_step,
        crate::routes::display::prev_step,
        crate::routes::display::start_timer,
        crate::routes::display::reset_timer,
        crate::routes::recap::get_session_recap,
        crate::routes::recap::get_personal_recap,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::session::SessionResponse,
            crate::dto::session::SessionHeader,
            crate::dto::session::JoinRequest,
            crate::dto::session::JoinResponse,
            crate::dto::session::StepRequest,
            crate::dto::vote::MoodVoteRequest,
            crate::dto::vote::MoodVoteResponse,
            crate::dto::vote::MyMoodResponse,
            crate::dto::vote::ConflictVoteRequest,
            crate::dto::vote::ConflictResponse,
            crate::dto::vote::KeywordRequest,
            crate::dto::vote::KeywordResponse,
            crate::dto::vote::CheerResponse,
            crate::dto::board::BoardMessageRequest,
            crate::dto::board::TeamMessageRequest,
            crate::dto::board::BoardResponse,
            crate::dto::board::BoardSubmitResponse,
            crate::dto::recap::SessionRecap,
            crate::dto::recap::PersonalRecap,
            crate::dto::recap::RecapKeyword,
            crate::dto::sse::Handshake,
            crate::dto::sse::FacilitatorHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::TimerCompleteEvent,
            crate::dto::sse::MoodEvent,
            crate::dto::sse::BoardEvent,
            crate::dto::sse::ConflictEvent,
            crate::dto::sse::KeywordEvent,
            crate::dto::sse::CheerEvent,
            crate::state::steps::StepView,
            crate::state::conflict::RevealPhase,
            crate::sync::timer::TimerView,
            crate::sync::tally::MoodTally,
            crate::sync::tally::ConflictTally,
            crate::sync::keywords::KeywordCloud,
            crate::sync::board::BoardSnapshot,
            crate::dao::models::Emoji,
            crate::dao::models::Board,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams mirroring a session"),
        (name = "session", description = "Session view and participant join"),
        (name = "polls", description = "Mood and conflict polls, keywords and cheers"),
        (name = "boards", description = "FirstMe, Proud and team message boards"),
        (name = "display", description = "Facilitator step and timer controls"),
        (name = "recap", description = "Session and personal recaps"),
    )
)]
pub struct ApiDoc;
