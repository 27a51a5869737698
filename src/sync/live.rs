//! Server-side live views: one per SSE connection, acting as that browser.
//!
//! A view mirrors the session's current step and only polls the components of
//! that step. Each component re-reads the store, derives its aggregate and
//! publishes it as one SSE event. Read failures are logged and skipped; the
//! viewer keeps its last state until the next successful tick.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::Board, remote_store::Table, repository::SessionRepository,
        storage::{StorageError, StorageResult},
    },
    dto::sse::{
        BoardEvent, CheerEvent, ConflictEvent, KeywordEvent, MoodEvent, ServerEvent, SystemStatus,
        TimerCompleteEvent,
    },
    config::PollIntervals,
    state::{
        SharedState,
        conflict::{ConflictReveal, RevealEvent, RevealPhase},
        identity::{ClientFlags, ClientIdentity},
        steps::{Component, Step, StepView},
    },
    sync::{
        board::{BoardMessage, board_snapshot},
        keywords::keyword_cloud,
        tally::{tally_conflicts, tally_moods},
        task::{Latest, TaskHandle, spawn_on_change, spawn_poll},
        timer::TimerTracker,
    },
};

pub const EVENT_STEP: &str = "step";
pub const EVENT_TIMER: &str = "timer";
pub const EVENT_TIMER_COMPLETE: &str = "timer.complete";
pub const EVENT_MOOD: &str = "mood";
pub const EVENT_CONFLICT: &str = "conflict";
pub const EVENT_KEYWORDS: &str = "keywords";
pub const EVENT_CHEERS: &str = "cheers";
pub const EVENT_INFO: &str = "info";

/// Shortest period of the conflict reveal check.
const MIN_REVEAL_CHECK: Duration = Duration::from_millis(50);

/// SSE event name of a board.
pub fn board_event(board: Board) -> String {
    format!("board.{}", board.slug())
}

/// Role a live view acts as.
#[derive(Debug, Clone)]
pub enum Viewer {
    /// Display screen driving the session.
    Facilitator,
    /// Attendee device.
    Participant(ClientIdentity),
}

impl Viewer {
    pub fn is_facilitator(&self) -> bool {
        matches!(self, Viewer::Facilitator)
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        match self {
            Viewer::Facilitator => None,
            Viewer::Participant(identity) => Some(identity),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Viewer::Facilitator => "facilitator",
            Viewer::Participant(_) => "participant",
        }
    }
}

/// Sending half of one SSE connection.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<ServerEvent>,
}

impl Publisher {
    pub fn new(tx: mpsc::Sender<ServerEvent>) -> Self {
        Self { tx }
    }

    /// Serialise `payload` and queue it under `event`.
    pub async fn publish<T: Serialize>(&self, event: &str, payload: &T) {
        match ServerEvent::json(Some(event.to_string()), payload) {
            Ok(message) => {
                if self.tx.send(message).await.is_err() {
                    debug!(event, "live view sink closed; dropping event");
                }
            }
            Err(err) => warn!(event, error = %err, "failed to serialise live event"),
        }
    }
}

#[derive(Clone)]
struct Context {
    state: SharedState,
    session_id: Arc<str>,
    viewer: Arc<Viewer>,
    publisher: Publisher,
    intervals: PollIntervals,
}

impl Context {
    /// Run `read` against the installed repository, logging and swallowing failures.
    async fn fetch<T, F, Fut>(&self, component: &'static str, read: F) -> Option<T>
    where
        F: FnOnce(SessionRepository, Arc<str>) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let Some(repository) = self.state.repository().await else {
            debug!(session = %self.session_id, component, "no store installed; skipping tick");
            return None;
        };
        match read(repository, self.session_id.clone()).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    session = %self.session_id,
                    component,
                    error = %err,
                    "live view read failed; keeping previous state"
                );
                None
            }
        }
    }

    /// Advisory flags of the participant; `None` for facilitators.
    fn flags(&self) -> Option<ClientFlags> {
        self.viewer
            .identity()
            .map(|identity| self.state.clients().snapshot(&self.session_id, identity.voter_id))
    }
}

/// Tasks of the components of the step currently shown.
#[derive(Default)]
struct RunningStep {
    tasks: Vec<TaskHandle>,
    tickets: Vec<Arc<Latest>>,
}

impl RunningStep {
    fn ticket(&mut self) -> Arc<Latest> {
        let latest = Arc::new(Latest::new());
        self.tickets.push(latest.clone());
        latest
    }
}

impl Drop for RunningStep {
    fn drop(&mut self) {
        for task in &self.tasks {
            debug!(task = task.name(), "stopping component task");
            task.stop();
        }
        // responses still in flight are refused
        for latest in &self.tickets {
            latest.close();
        }
    }
}

/// One connection's server-side mirror of the session.
pub struct LiveView {
    ctx: Context,
    token: CancellationToken,
}

impl LiveView {
    /// Build a view publishing to `publisher` until `token` is cancelled.
    pub fn new(
        state: SharedState,
        session_id: &str,
        viewer: Viewer,
        publisher: Publisher,
        token: CancellationToken,
    ) -> Self {
        let intervals = state.config().intervals(viewer.is_facilitator());
        Self {
            ctx: Context {
                state,
                session_id: Arc::from(session_id),
                viewer: Arc::new(viewer),
                publisher,
                intervals,
            },
            token,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Mirror the session step and keep the matching components running.
    pub async fn run(self) {
        let (step_tx, mut step_rx) = watch::channel(None);
        let _step_task = self.mirror_step(step_tx);
        let mut degraded_rx = self.ctx.state.degraded_watcher();
        let mut running: Option<RunningStep> = None;
        let mut current: Option<Step> = None;

        info!(
            session = %self.ctx.session_id,
            viewer = self.ctx.viewer.label(),
            "live view started"
        );

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                changed = step_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let mirrored = *step_rx.borrow_and_update();
                    let Some(step) = mirrored else {
                        continue;
                    };
                    drop(running.take());
                    debug!(session = %self.ctx.session_id, ?step, "mirrored step changed");
                    self.ctx.publisher.publish(EVENT_STEP, &StepView::from(step)).await;
                    current = Some(step);
                    running = Some(self.start_step(step).await);
                }
                changed = degraded_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let degraded = *degraded_rx.borrow_and_update();
                    self.ctx.publisher.publish(EVENT_INFO, &SystemStatus { degraded }).await;
                    // subscriptions may point at a replaced store or none at all
                    if let (false, Some(step)) = (degraded, current) {
                        drop(running.take());
                        debug!(session = %self.ctx.session_id, ?step, "store recovered; restarting step");
                        running = Some(self.start_step(step).await);
                    }
                }
            }
        }

        drop(running);
        info!(
            session = %self.ctx.session_id,
            viewer = self.ctx.viewer.label(),
            "live view stopped"
        );
    }

    /// Poll the session row and forward `current_step` whenever it differs.
    fn mirror_step(&self, step_tx: watch::Sender<Option<Step>>) -> TaskHandle {
        let ctx = self.ctx.clone();
        let latest = Arc::new(Latest::new());
        let step_tx = Arc::new(step_tx);

        spawn_poll("step", self.ctx.intervals.step, &self.token, move || {
            let ctx = ctx.clone();
            let latest = latest.clone();
            let step_tx = step_tx.clone();
            async move {
                let ticket = latest.issue();
                let Some(found) = ctx
                    .fetch("step", |repo, id| async move { repo.find_session(&id).await })
                    .await
                else {
                    return;
                };
                let Some(session) = found else {
                    warn!(session = %ctx.session_id, "session row not found");
                    return;
                };
                if !latest.accept(ticket) {
                    return;
                }

                let step = Step::from_stored(session.current_step);
                step_tx.send_if_modified(|current| {
                    if *current == Some(step) {
                        return false;
                    }
                    *current = Some(step);
                    true
                });
            }
        })
    }

    async fn start_step(&self, step: Step) -> RunningStep {
        let mut running = RunningStep::default();
        let aggregates = self.ctx.intervals.aggregates;

        for component in step.components() {
            match component {
                Component::Mood => self.poll("mood", aggregates, &mut running, refresh_mood),
                Component::Timer => self.start_timer(&mut running),
                Component::FirstMeBoard => {
                    self.poll("board.first_me", aggregates, &mut running, |ctx, latest| {
                        refresh_board(ctx, latest, Board::FirstMe)
                    })
                }
                Component::ProudBoard => {
                    self.poll("board.proud", aggregates, &mut running, |ctx, latest| {
                        refresh_board(ctx, latest, Board::Proud)
                    })
                }
                Component::Conflict => self.start_conflict(&mut running).await,
                Component::Keywords => {
                    self.poll("keywords", aggregates, &mut running, refresh_keywords)
                }
                Component::Cheers => {
                    self.watch_changes("cheers", &[Table::Cheers], &mut running, refresh_cheers)
                        .await;
                }
            }
        }

        running
    }

    fn poll<F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        running: &mut RunningStep,
        refresh: F,
    ) where
        F: Fn(Context, Arc<Latest>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let latest = running.ticket();
        let ctx = self.ctx.clone();
        running.tasks.push(spawn_poll(name, period, &self.token, move || {
            refresh(ctx.clone(), latest.clone())
        }));
    }

    /// Refresh once, then on every change of `tables`, plus the role's fallback poll.
    async fn watch_changes<F, Fut>(
        &self,
        name: &'static str,
        tables: &[Table],
        running: &mut RunningStep,
        refresh: F,
    ) -> Arc<Latest>
    where
        F: Fn(Context, Arc<Latest>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let latest = running.ticket();
        tokio::spawn(refresh(self.ctx.clone(), latest.clone()));

        match self.ctx.state.repository().await {
            Some(repository) => {
                for table in tables {
                    let changes = repository.subscribe(*table, &self.ctx.session_id);
                    let ctx = self.ctx.clone();
                    let latest = latest.clone();
                    let refresh = refresh.clone();
                    running.tasks.push(spawn_on_change(name, changes, &self.token, move || {
                        refresh(ctx.clone(), latest.clone())
                    }));
                }
            }
            None => warn!(
                session = %self.ctx.session_id,
                component = name,
                "no store installed; change notifications unavailable"
            ),
        }

        if let Some(period) = self.ctx.intervals.realtime_fallback {
            let ctx = self.ctx.clone();
            let latest = latest.clone();
            running.tasks.push(spawn_poll(name, period, &self.token, move || {
                refresh(ctx.clone(), latest.clone())
            }));
        }

        latest
    }

    fn start_timer(&self, running: &mut RunningStep) {
        let publisher = self.ctx.publisher.clone();
        let tracker = TimerTracker::new(self.ctx.state.config().timer_duration).on_complete(
            move |started_at| {
                // fires once per start: queue it even when the sink is full
                let publisher = publisher.clone();
                tokio::spawn(async move {
                    publisher
                        .publish(EVENT_TIMER_COMPLETE, &TimerCompleteEvent { started_at })
                        .await;
                });
            },
        );
        let tracker = Arc::new(Mutex::new(tracker));

        self.poll("timer", self.ctx.intervals.timer, running, move |ctx, latest| {
            refresh_timer(ctx, latest, tracker.clone())
        });
    }

    async fn start_conflict(&self, running: &mut RunningStep) {
        if let Some(identity) = self.ctx.viewer.identity() {
            // a vote cast before this view attached is revealed right away
            if let Err(err) = self.ctx.state.clients().apply_conflict(
                &self.ctx.session_id,
                identity.voter_id,
                RevealEvent::Reconnected,
            ) {
                debug!(error = ?err, "conflict reveal unchanged on attach");
            }
        }

        let latest = self
            .watch_changes(
                "conflict",
                &[Table::ConflictVotes, Table::TeamMessages],
                running,
                refresh_conflict,
            )
            .await;

        if !self.ctx.viewer.is_facilitator() {
            let period = (self.ctx.state.config().reveal_delay / 2).max(MIN_REVEAL_CHECK);
            let ctx = self.ctx.clone();
            running
                .tasks
                .push(spawn_poll("conflict.reveal", period, &self.token, move || {
                    advance_reveal(ctx.clone(), latest.clone())
                }));
        }
    }
}

async fn refresh_mood(ctx: Context, latest: Arc<Latest>) {
    let ticket = latest.issue();
    let Some(votes) = ctx
        .fetch("mood", |repo, id| async move {
            repo.list_condition_votes(&id).await
        })
        .await
    else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }

    let mut my_vote = None;
    if let Some(identity) = ctx.viewer.identity() {
        let voter_id = identity.voter_id;
        my_vote = ctx.flags().and_then(|flags| flags.mood);
        if my_vote.is_none() {
            // first sight of this voter: adopt what the store remembers
            if let Some(stored) = votes.iter().find(|vote| vote.voter_id == Some(voter_id)) {
                ctx.state
                    .clients()
                    .adopt_stored_mood(&ctx.session_id, voter_id, stored.emoji);
                my_vote = Some(stored.emoji);
            }
        }
    }

    let payload = MoodEvent {
        tally: tally_moods(&votes),
        my_vote,
    };
    ctx.publisher.publish(EVENT_MOOD, &payload).await;
}

async fn refresh_timer(ctx: Context, latest: Arc<Latest>, tracker: Arc<Mutex<TimerTracker>>) {
    let ticket = latest.issue();
    let Some(found) = ctx
        .fetch("timer", |repo, id| async move { repo.find_session(&id).await })
        .await
    else {
        return;
    };
    let Some(session) = found else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }

    let view = {
        let mut tracker = tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tracker.observe(session.timer_started_at);
        tracker.tick(OffsetDateTime::now_utc())
    };
    ctx.publisher.publish(EVENT_TIMER, &view).await;
}

async fn refresh_board(ctx: Context, latest: Arc<Latest>, board: Board) {
    let ticket = latest.issue();
    let Some(rows) = ctx
        .fetch("board", |repo, id| async move {
            repo.list_board_messages(board, &id).await
        })
        .await
    else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }

    let messages: Vec<BoardMessage> = rows.into_iter().map(BoardMessage::from).collect();
    let my_team = ctx.viewer.identity().and_then(|identity| identity.team);
    let form_hidden = ctx
        .flags()
        .is_some_and(|flags| flags.board_cooling_down(board, Instant::now()));
    let payload = BoardEvent {
        snapshot: board_snapshot(messages, None, my_team),
        form_hidden,
    };
    ctx.publisher.publish(&board_event(board), &payload).await;
}

async fn refresh_conflict(ctx: Context, latest: Arc<Latest>) {
    let ticket = latest.issue();
    let Some((votes, messages)) = ctx
        .fetch("conflict", |repo, id| async move {
            let votes = repo.list_conflict_votes(&id).await?;
            let messages = repo.list_team_messages(&id).await?;
            Ok::<_, StorageError>((votes, messages))
        })
        .await
    else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }

    let (phase, team_message_submitted) = match ctx.viewer.identity() {
        None => (ConflictReveal::revealed().phase(), false),
        Some(identity) => {
            let phase = ctx
                .state
                .clients()
                .apply_conflict(
                    &ctx.session_id,
                    identity.voter_id,
                    RevealEvent::Tick {
                        now: Instant::now(),
                        delay: ctx.state.config().reveal_delay,
                    },
                )
                .unwrap_or_else(|err| err.from);
            let submitted = ctx
                .flags()
                .is_some_and(|flags| flags.team_message_submitted);
            (phase, submitted)
        }
    };

    let payload = ConflictEvent {
        phase,
        tally: (phase == RevealPhase::Revealed).then(|| tally_conflicts(&votes)),
        team_messages: messages.into_iter().map(BoardMessage::from).collect(),
        team_message_submitted,
    };
    ctx.publisher.publish(EVENT_CONFLICT, &payload).await;
}

/// Reveal the results once the delay since the viewer's vote has passed.
async fn advance_reveal(ctx: Context, latest: Arc<Latest>) {
    let Some(identity) = ctx.viewer.identity() else {
        return;
    };
    let awaiting = ctx
        .flags()
        .is_some_and(|flags| flags.conflict.phase() == RevealPhase::VotedAwaitingReveal);
    if !awaiting {
        return;
    }

    let phase = ctx.state.clients().apply_conflict(
        &ctx.session_id,
        identity.voter_id,
        RevealEvent::Tick {
            now: Instant::now(),
            delay: ctx.state.config().reveal_delay,
        },
    );
    if phase == Ok(RevealPhase::Revealed) {
        refresh_conflict(ctx, latest).await;
    }
}

async fn refresh_keywords(ctx: Context, latest: Arc<Latest>) {
    let ticket = latest.issue();
    let Some(rows) = ctx
        .fetch("keywords", |repo, id| async move { repo.list_keywords(&id).await })
        .await
    else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }

    let payload = KeywordEvent {
        cloud: keyword_cloud(&rows, ctx.state.config().keyword_limit),
        submitted: ctx.flags().is_some_and(|flags| flags.keyword_submitted),
    };
    ctx.publisher.publish(EVENT_KEYWORDS, &payload).await;
}

async fn refresh_cheers(ctx: Context, latest: Arc<Latest>) {
    let ticket = latest.issue();
    let Some(count) = ctx
        .fetch("cheers", |repo, id| async move { repo.count_cheers(&id).await })
        .await
    else {
        return;
    };
    if !latest.accept(ticket) {
        return;
    }
    ctx.publisher.publish(EVENT_CHEERS, &CheerEvent { count }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::remote_store::memory::MemoryStore,
        state::AppState,
    };
    use serde_json::{Value, json};

    const WAIT: Duration = Duration::from_secs(5);

    fn seeded_store(step: i64, timer_started_at: Option<&str>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            Table::Sessions,
            json!({
                "id": "s1",
                "name": "Kickoff",
                "is_active": true,
                "current_step": step,
                "timer_started_at": timer_started_at,
            }),
        );
        store
    }

    async fn seeded_state(step: i64) -> (SharedState, Arc<MemoryStore>) {
        let state = AppState::new(AppConfig::default());
        let store = seeded_store(step, None);
        state.install_store(store.clone()).await;
        (state, store)
    }

    async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>, name: &str) -> Value {
        loop {
            let event = rx.recv().await.expect("live view closed");
            if event.event.as_deref() == Some(name) {
                return serde_json::from_str(&event.data).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn participant_mirrors_step_and_receives_mood_tally() {
        let (state, store) = seeded_state(0).await;
        for emoji in ["😴", "🔥"] {
            store.seed(
                Table::ConditionVotes,
                json!({
                    "session_id": "s1",
                    "voter_id": uuid::Uuid::new_v4(),
                    "emoji": emoji,
                }),
            );
        }

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let viewer = Viewer::Participant(ClientIdentity::mint("mina", Some(2)));
        LiveView::new(state, "s1", viewer, Publisher::new(tx), token.clone()).spawn();

        let step = next_event(&mut rx, EVENT_STEP).await;
        assert_eq!(step["step"], "condition");
        assert_eq!(step["index"], 0);

        let mood = next_event(&mut rx, EVENT_MOOD).await;
        assert_eq!(mood["tally"]["total"], 2);
        assert_eq!(mood["tally"]["counts"][0]["percentage"], 50);
        assert_eq!(mood["tally"]["counts"][2]["percentage"], 50);
        token.cancel();
    }

    #[tokio::test]
    async fn facilitator_sees_conflict_results_without_voting() {
        let (state, store) = seeded_state(3).await;
        store.seed(
            Table::ConflictVotes,
            json!({"session_id": "s1", "has_conflict": true}),
        );

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        LiveView::new(state, "s1", Viewer::Facilitator, Publisher::new(tx), token.clone())
            .spawn();

        let conflict = next_event(&mut rx, EVENT_CONFLICT).await;
        assert_eq!(conflict["phase"], "revealed");
        assert_eq!(conflict["tally"]["yes"], 1);
        assert_eq!(conflict["tally"]["yes_percentage"], 100);
        token.cancel();
    }

    #[tokio::test]
    async fn participant_results_stay_hidden_before_voting() {
        let (state, _store) = seeded_state(3).await;

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let viewer = Viewer::Participant(ClientIdentity::mint("mina", None));
        LiveView::new(state, "s1", viewer, Publisher::new(tx), token.clone()).spawn();

        let conflict = next_event(&mut rx, EVENT_CONFLICT).await;
        assert_eq!(conflict["phase"], "not_voted");
        assert!(conflict.get("tally").is_none());
        token.cancel();
    }

    #[tokio::test]
    async fn timer_step_pushes_idle_countdown() {
        let (state, _store) = seeded_state(1).await;

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        LiveView::new(state, "s1", Viewer::Facilitator, Publisher::new(tx), token.clone())
            .spawn();

        let timer = next_event(&mut rx, EVENT_TIMER).await;
        assert_eq!(timer["status"], "idle");
        assert_eq!(timer["remaining_secs"], 60);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn participant_follows_facilitator_step_changes() {
        let (state, _store) = seeded_state(0).await;

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let viewer = Viewer::Participant(ClientIdentity::mint("mina", Some(2)));
        LiveView::new(state.clone(), "s1", viewer, Publisher::new(tx), token.clone()).spawn();
        assert_eq!(next_event(&mut rx, EVENT_STEP).await["index"], 0);

        crate::services::session_service::go_to_step(&state, "s1", 6)
            .await
            .unwrap();

        let step = next_event(&mut rx, EVENT_STEP).await;
        assert_eq!(step["index"], 6);
        assert_eq!(step["is_last"], true);
        let cheers = next_event(&mut rx, EVENT_CHEERS).await;
        assert_eq!(cheers["count"], 0);
        token.cancel();
    }

    #[tokio::test]
    async fn change_notifications_resume_on_a_replacement_store() {
        let (state, _store) = seeded_state(6).await;

        let (tx, mut rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let viewer = Viewer::Participant(ClientIdentity::mint("mina", None));
        LiveView::new(state.clone(), "s1", viewer, Publisher::new(tx), token.clone()).spawn();
        let first = tokio::time::timeout(WAIT, next_event(&mut rx, EVENT_CHEERS))
            .await
            .unwrap();
        assert_eq!(first["count"], 0);

        state.clear_store().await;
        state.install_store(seeded_store(6, None)).await;
        let recovered = tokio::time::timeout(WAIT, async {
            loop {
                if next_event(&mut rx, EVENT_INFO).await["degraded"] == false {
                    return next_event(&mut rx, EVENT_CHEERS).await;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(recovered["count"], 0);

        crate::services::vote_service::cheer(&state, "s1")
            .await
            .unwrap();
        let pushed = tokio::time::timeout(WAIT, next_event(&mut rx, EVENT_CHEERS))
            .await
            .unwrap();
        assert_eq!(pushed["count"], 1);
        token.cancel();
    }

    #[tokio::test]
    async fn timer_completion_survives_a_full_sink() {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(seeded_store(1, Some("2025-03-01T09:05:00+00:00")))
            .await;

        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        LiveView::new(state, "s1", Viewer::Facilitator, Publisher::new(tx), token.clone())
            .spawn();
        // let the view run against a full buffer before draining it
        tokio::time::sleep(Duration::from_millis(300)).await;

        let complete = tokio::time::timeout(WAIT, next_event(&mut rx, EVENT_TIMER_COMPLETE))
            .await
            .unwrap();
        assert!(complete["started_at"].is_string());
        token.cancel();
    }
}
