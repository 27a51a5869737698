//! Huddle Back binary entrypoint wiring REST, SSE, and the remote store supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle_back::{
    config::AppConfig,
    dao::{
        remote_store::{RemoteStore, Table, memory::MemoryStore},
        storage::StorageError,
    },
    routes,
    services::{client_sweeper, storage_supervisor},
    state::{AppState, SharedState},
};

/// Selects the remote store implementation: `rest` (default) or `memory`.
const STORE_BACKEND_ENV: &str = "STORE_BACKEND";
/// Session seeded into the in-memory backend.
const MEMORY_SESSION_ENV: &str = "STORE_MEMORY_SESSION";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    #[cfg(feature = "rest-store")]
    let change_poll_interval = config.change_poll_interval;
    let app_state = AppState::new(config);
    tokio::spawn(client_sweeper::run(app_state.clone()));

    let backend = env::var(STORE_BACKEND_ENV).unwrap_or_else(|_| "rest".into());
    match backend.as_str() {
        "memory" => {
            let store = seeded_memory_store();
            tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "rest-store")]
        "rest" => {
            use huddle_back::dao::remote_store::rest::{RestConfig, RestStore};

            let rest_config = RestConfig::from_env()
                .context("reading remote store settings")?
                .with_change_poll_interval(change_poll_interval);
            tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
                let rest_config = rest_config.clone();
                async move {
                    let store = RestStore::connect(rest_config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok::<Arc<dyn RemoteStore>, StorageError>(Arc::new(store))
                }
            }));
        }
        other => anyhow::bail!("unsupported {STORE_BACKEND_ENV} `{other}`"),
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, %backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// In-memory backend holding a single active session for local runs.
fn seeded_memory_store() -> Arc<dyn RemoteStore> {
    let session_id = env::var(MEMORY_SESSION_ENV).unwrap_or_else(|_| "local".into());
    let store = MemoryStore::new();
    store.seed(
        Table::Sessions,
        json!({
            "id": session_id,
            "name": "Local session",
            "is_active": true,
            "current_step": 0,
            "timer_started_at": null,
        }),
    );
    info!(session = %session_id, "seeded in-memory store");
    Arc::new(store)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
