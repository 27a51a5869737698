use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Ping the remote store and combine the result with the supervisor's degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store_reachable = match state.repository().await {
        Some(repository) => match repository.store().health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "remote store health check failed");
                false
            }
        },
        None => {
            warn!("remote store unavailable (degraded mode)");
            false
        }
    };

    let status = if store_reachable && !state.is_degraded() {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };
    HealthResponse {
        status,
        store_reachable,
    }
}
