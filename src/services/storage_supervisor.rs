use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{remote_store::RemoteStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECHECK_ATTEMPTS: u32 = 3;

/// Connect to the remote store and keep the shared state in degraded mode while it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RemoteStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("remote store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("remote store healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "remote store health check failed; entering degraded mode");
                            state.update_degraded(true);

                            if recheck(store.as_ref()).await {
                                info!("remote store recovered after health check failure");
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }

                            warn!("exhausted remote store health checks; reconnecting");
                            state.clear_store().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "remote store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Retry the health check with exponential backoff; `true` once it passes.
async fn recheck(store: &dyn RemoteStore) -> bool {
    let mut retry_delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECHECK_ATTEMPTS {
        sleep(retry_delay).await;
        match store.health_check().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "remote store health recheck failed");
                retry_delay = (retry_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::remote_store::memory::MemoryStore, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn outage_toggles_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryStore::new());
        let connected = store.clone();
        tokio::spawn(run(state.clone(), move || {
            let store: Arc<dyn RemoteStore> = connected.clone();
            async move { Ok(store) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());

        store.set_offline(true);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded());

        store.set_offline(false);
        sleep(INITIAL_DELAY * 2).await;
        assert!(!state.is_degraded());
    }
}
