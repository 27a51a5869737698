use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::SharedState;

/// Periodically forget advisory flags of clients idle for longer than the configured TTL.
pub async fn run(state: SharedState) {
    let ttl = state.config().client_idle_ttl;
    let mut ticker = interval(state.config().client_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let evicted = state.clients().evict_idle(Instant::now(), ttl);
        if evicted > 0 {
            info!(evicted, remaining = state.clients().tracked(), "evicted idle clients");
        } else {
            debug!(remaining = state.clients().tracked(), "no idle clients to evict");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn idle_clients_are_swept_on_schedule() {
        let state = AppState::new(AppConfig {
            client_idle_ttl: Duration::from_secs(60),
            client_sweep_interval: Duration::from_secs(30),
            ..AppConfig::default()
        });
        state.clients().mark_keyword_submitted("s1", Uuid::new_v4());
        let sweeper = tokio::spawn(run(state.clone()));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(state.clients().tracked(), 1);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(state.clients().tracked(), 0);
        sweeper.abort();
    }
}
