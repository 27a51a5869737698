/// FirstMe, Proud and team message boards.
pub mod board_service;
/// Eviction of idle advisory client flags.
pub mod client_sweeper;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Session and personal recaps.
pub mod recap_service;
/// Session view, step navigation and the shared timer.
pub mod session_service;
/// Server-Sent Events streams backed by live views.
pub mod sse_service;
/// Remote store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Mood and conflict polls, keywords and cheers.
pub mod vote_service;
