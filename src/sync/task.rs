//! Cancellable repeating tasks backing every live view.
//!
//! Ticks are interval scheduled rather than chained: each tick spawns its own
//! fetch, so a slow store can have several requests of the same component in
//! flight. [`Latest`] keeps only the newest-issued response.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use futures::StreamExt;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dao::remote_store::ChangeStream;

/// Monotonic ticket dispenser discarding out-of-order responses.
#[derive(Debug, Default)]
pub struct Latest {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl Latest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request about to be sent.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether the response of `ticket` is newer than every response applied so far.
    pub fn accept(&self, ticket: u64) -> bool {
        self.applied.fetch_max(ticket, Ordering::SeqCst) < ticket
    }

    /// Refuse every response still in flight.
    pub fn close(&self) {
        self.applied.store(u64::MAX, Ordering::SeqCst);
    }
}

/// Stop handle of one repeating task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `tick` immediately and then every `period` until stopped or `parent` is cancelled.
pub fn spawn_poll<F, Fut>(
    name: &'static str,
    period: Duration,
    parent: &CancellationToken,
    mut tick: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = parent.child_token();
    let stopped = token.clone();

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stopped.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::spawn(tick());
                }
            }
        }
        debug!(task = name, "poll task stopped");
    });

    TaskHandle { name, token }
}

/// Run `on_change` for every event of `changes` until stopped or the feed ends.
pub fn spawn_on_change<F, Fut>(
    name: &'static str,
    mut changes: ChangeStream,
    parent: &CancellationToken,
    mut on_change: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = parent.child_token();
    let stopped = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stopped.cancelled() => break,
                next = changes.next() => match next {
                    Some(_) => {
                        tokio::spawn(on_change());
                    }
                    None => break,
                },
            }
        }
        // dropping the stream unsubscribes
        debug!(task = name, "change subscription stopped");
    });

    TaskHandle { name, token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn newest_issued_response_wins() {
        let latest = Latest::new();
        let first = latest.issue();
        let second = latest.issue();

        assert!(latest.accept(second));
        assert!(!latest.accept(first));

        let third = latest.issue();
        latest.close();
        assert!(!latest.accept(third));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_ticks_until_stopped() {
        let parent = CancellationToken::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = spawn_poll("test", Duration::from_secs(1), &parent, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_parent_stops_children() {
        let parent = CancellationToken::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let _handle = spawn_poll("test", Duration::from_secs(1), &parent, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn change_task_runs_per_event() {
        let parent = CancellationToken::new();
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let changes = tokio_stream::wrappers::ReceiverStream::new(rx).boxed();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(4);

        let _handle = spawn_on_change("test", changes, &parent, move || {
            let done_tx = done_tx.clone();
            async move {
                let _ = done_tx.send(()).await;
            }
        });

        for _ in 0..2 {
            tx.send(crate::dao::remote_store::ChangeEvent {
                table: crate::dao::remote_store::Table::Cheers,
                kind: crate::dao::remote_store::ChangeKind::Insert,
                row: Default::default(),
            })
            .await
            .unwrap();
        }

        done_rx.recv().await.unwrap();
        done_rx.recv().await.unwrap();
    }
}
