use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    dto::sse::{FacilitatorHandshake, Handshake, ServerEvent},
    error::ServiceError,
    services::session_service::load_session,
    state::{SharedState, identity::ClientIdentity},
    sync::live::{EVENT_INFO, LiveView, Publisher, Viewer},
};

/// Events buffered between a live view and its HTTP response.
const EVENT_BUFFER: usize = 32;
const EVENT_FACILITATOR_TOKEN: &str = "facilitator_token";

/// Live view attached to a freshly opened stream.
pub struct Subscription {
    pub receiver: mpsc::Receiver<ServerEvent>,
    pub token: CancellationToken,
}

/// Identifies the stream so teardown can perform stream-specific bookkeeping.
#[derive(Clone)]
pub enum StreamKind {
    Participant { session_id: String },
    /// Carries the state so the facilitator token is revoked once the stream ends.
    Display {
        state: SharedState,
        session_id: String,
        facilitator_token: String,
    },
}

/// Start a participant live view for `identity`.
pub async fn subscribe_participant(
    state: &SharedState,
    session_id: &str,
    identity: ClientIdentity,
) -> Result<Subscription, ServiceError> {
    ensure_session(state, session_id).await?;
    let (tx, receiver) = mpsc::channel(EVENT_BUFFER);
    let publisher = Publisher::new(tx);

    publisher
        .publish(EVENT_INFO, &handshake(state, "participant", session_id))
        .await;

    let token = CancellationToken::new();
    LiveView::new(
        state.clone(),
        session_id,
        Viewer::Participant(identity),
        publisher,
        token.clone(),
    )
    .spawn();
    Ok(Subscription { receiver, token })
}

/// Start a facilitator live view, issuing the token that authorizes its writes.
///
/// When a display secret is configured, `secret` must match it.
pub async fn subscribe_display(
    state: &SharedState,
    session_id: &str,
    secret: Option<&str>,
) -> Result<(Subscription, String), ServiceError> {
    if !state.accepts_display_secret(secret) {
        warn!(session = session_id, "display stream refused: secret mismatch");
        return Err(ServiceError::Unauthorized(
            "display secret missing or wrong".into(),
        ));
    }
    ensure_session(state, session_id).await?;
    let (tx, receiver) = mpsc::channel(EVENT_BUFFER);
    let publisher = Publisher::new(tx);

    let facilitator_token = state.issue_facilitator_token(session_id);
    publisher
        .publish(
            EVENT_FACILITATOR_TOKEN,
            &FacilitatorHandshake {
                token: facilitator_token.clone(),
            },
        )
        .await;
    publisher
        .publish(EVENT_INFO, &handshake(state, "display", session_id))
        .await;

    let token = CancellationToken::new();
    LiveView::new(
        state.clone(),
        session_id,
        Viewer::Facilitator,
        publisher,
        token.clone(),
    )
    .spawn();
    Ok((Subscription { receiver, token }, facilitator_token))
}

/// Unknown sessions are refused; while degraded the stream opens and reports it.
async fn ensure_session(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    if let Some(repository) = state.repository().await {
        load_session(&repository, session_id).await?;
    }
    Ok(())
}

fn handshake(state: &SharedState, stream: &str, session_id: &str) -> Handshake {
    Handshake {
        stream: stream.to_string(),
        session_id: session_id.to_string(),
        message: format!("{stream} stream connected"),
        degraded: state.is_degraded(),
    }
}

/// Convert a live view's events into an SSE response, stopping the view and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        token,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = receiver.recv() => {
                    let Some(payload) = received else {
                        break;
                    };
                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        token.cancel();
        match kind {
            StreamKind::Participant { session_id } => {
                info!(session = %session_id, "participant SSE stream disconnected")
            }
            StreamKind::Display {
                state,
                session_id,
                facilitator_token,
            } => {
                state.revoke_facilitator_token(&session_id, &facilitator_token);
                info!(session = %session_id, "display SSE stream disconnected")
            }
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::remote_store::memory::MemoryStore,
        services::test_support::state_with_session, state::AppState,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn display_stream_opens_with_its_token() {
        let (state, _store) = state_with_session("s1").await;
        let (mut subscription, token) = subscribe_display(&state, "s1", None).await.unwrap();
        assert!(state.is_facilitator("s1", &token));

        let first = subscription.receiver.recv().await.unwrap();
        assert_eq!(first.event.as_deref(), Some(EVENT_FACILITATOR_TOKEN));
        assert!(first.data.contains(&token));
        subscription.token.cancel();
    }

    #[tokio::test]
    async fn unknown_session_is_refused() {
        let (state, _store) = state_with_session("s1").await;
        let identity = ClientIdentity::mint("a", Some(1));
        let refused = subscribe_participant(&state, "nope", identity).await;
        assert!(matches!(refused, Err(ServiceError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn configured_secret_guards_facilitator_tokens() {
        let state = AppState::new(AppConfig {
            display_secret: Some("s3cret".into()),
            ..AppConfig::default()
        });
        state.install_store(Arc::new(MemoryStore::new())).await;

        for secret in [None, Some("guess")] {
            let refused = subscribe_display(&state, "s1", secret).await;
            assert!(matches!(refused, Err(ServiceError::Unauthorized(_))));
        }

        // the secret is checked before the session lookup
        let accepted = subscribe_display(&state, "s1", Some("s3cret")).await;
        assert!(matches!(accepted, Err(ServiceError::SessionNotFound(_))));
    }
}
