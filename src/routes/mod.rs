use axum::Router;

use crate::state::SharedState;

pub mod display;
pub mod docs;
pub mod health;
pub mod identity;
pub mod recap;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(session::router())
        .merge(recap::router())
        .merge(display::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
