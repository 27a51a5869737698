use serde::Serialize;
use utoipa::ToSchema;

/// Overall backend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// No usable remote store; store-backed routes answer 503.
    Degraded,
}

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Whether the remote store answered the ping made for this request.
    pub store_reachable: bool,
}
