pub mod conflict;
pub mod identity;
pub mod steps;

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{remote_store::RemoteStore, repository::SessionRepository},
    error::ServiceError,
};

use self::identity::ClientRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state: store handle, configuration and per-client bookkeeping.
pub struct AppState {
    repository: RwLock<Option<SessionRepository>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    clients: ClientRegistry,
    facilitator_tokens: DashSet<(String, String)>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            repository: RwLock::new(None),
            degraded: degraded_tx,
            config,
            clients: ClientRegistry::new(),
            facilitator_tokens: DashSet::new(),
        })
    }

    /// Repository over the installed store, if any.
    pub async fn repository(&self) -> Option<SessionRepository> {
        let guard = self.repository.read().await;
        guard.as_ref().cloned()
    }

    /// Repository over the installed store, or [`ServiceError::Degraded`].
    pub async fn require_repository(&self) -> Result<SessionRepository, ServiceError> {
        self.repository().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn RemoteStore>) {
        {
            let mut guard = self.repository.write().await;
            *guard = Some(SessionRepository::new(store));
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.repository.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Advisory flags of every participant.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Whether `provided` matches the configured display secret.
    /// Always true when no secret is configured.
    pub fn accepts_display_secret(&self, provided: Option<&str>) -> bool {
        match (&self.config.display_secret, provided) {
            (None, _) => true,
            (Some(expected), Some(provided)) => secrets_match(expected, provided),
            (Some(_), None) => false,
        }
    }

    /// Mint a token allowing its holder to drive `session_id`.
    pub fn issue_facilitator_token(&self, session_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.facilitator_tokens
            .insert((session_id.to_string(), token.clone()));
        token
    }

    /// Forget a token once its display stream is gone.
    pub fn revoke_facilitator_token(&self, session_id: &str, token: &str) {
        self.facilitator_tokens
            .remove(&(session_id.to_string(), token.to_string()));
    }

    /// Whether `token` was issued for `session_id` and is still live.
    pub fn is_facilitator(&self, session_id: &str, token: &str) -> bool {
        self.facilitator_tokens
            .contains(&(session_id.to_string(), token.to_string()))
    }
}

/// Compare without short-circuiting on the first differing byte.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    expected.len() == provided.len()
        && expected
            .iter()
            .zip(provided)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::remote_store::memory::MemoryStore;

    #[tokio::test]
    async fn store_installation_toggles_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_repository().await,
            Err(ServiceError::Degraded)
        ));

        state.install_store(Arc::new(MemoryStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_repository().await.is_ok());

        state.clear_store().await;
        assert!(state.is_degraded());
    }

    #[test]
    fn facilitator_tokens_are_scoped_and_revocable() {
        let state = AppState::new(AppConfig::default());
        let first = state.issue_facilitator_token("s1");
        let second = state.issue_facilitator_token("s1");

        assert!(state.is_facilitator("s1", &first));
        assert!(state.is_facilitator("s1", &second));
        assert!(!state.is_facilitator("s2", &first));

        state.revoke_facilitator_token("s1", &first);
        assert!(!state.is_facilitator("s1", &first));
        assert!(state.is_facilitator("s1", &second));
    }

    #[test]
    fn display_secret_gates_only_when_configured() {
        let open = AppState::new(AppConfig::default());
        assert!(open.accepts_display_secret(None));

        let gated = AppState::new(AppConfig {
            display_secret: Some("s3cret".into()),
            ..AppConfig::default()
        });
        assert!(gated.accepts_display_secret(Some("s3cret")));
        assert!(!gated.accepts_display_secret(Some("s3cre")));
        assert!(!gated.accepts_display_secret(Some("s3creT")));
        assert!(!gated.accepts_display_secret(None));
    }
}
