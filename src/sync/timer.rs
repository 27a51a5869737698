//! Shared countdown derived from the session's stored start instant.
//!
//! Nothing ticks in the store: every viewer recomputes the remaining time from
//! `timer_started_at` on each poll, so all viewers converge on the same value
//! within one poll interval of a facilitator write.

use std::{fmt, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::dao::models::Timestamp;

/// Lifecycle of the shared countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Not started, or reset.
    Idle,
    /// Started with time left.
    Running,
    /// Reached zero; stays here until reset.
    Complete,
}

/// Derived countdown state pushed to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimerView {
    pub status: TimerStatus,
    /// Whole seconds left, the full duration while idle.
    pub remaining_secs: u64,
    /// Configured countdown length.
    pub duration_secs: u64,
    /// Stored start instant, `None` while idle.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<Timestamp>,
}

/// `max(0, duration - floor(elapsed))`, counting a start in the future as no elapsed time.
pub fn remaining_secs(duration: Duration, started_at: OffsetDateTime, now: OffsetDateTime) -> u64 {
    let elapsed = (now - started_at).whole_seconds().max(0) as u64;
    duration.as_secs().saturating_sub(elapsed)
}

/// Derive the countdown state for a stored start instant.
pub fn timer_view(
    duration: Duration,
    started_at: Option<Timestamp>,
    now: OffsetDateTime,
) -> TimerView {
    let duration_secs = duration.as_secs();
    match started_at {
        None => TimerView {
            status: TimerStatus::Idle,
            remaining_secs: duration_secs,
            duration_secs,
            started_at: None,
        },
        Some(started) => {
            let remaining = remaining_secs(duration, started.instant(), now);
            TimerView {
                status: if remaining == 0 {
                    TimerStatus::Complete
                } else {
                    TimerStatus::Running
                },
                remaining_secs: remaining,
                duration_secs,
                started_at: Some(started),
            }
        }
    }
}

type CompletionCallback = Box<dyn FnMut(Timestamp) + Send>;

/// Per-viewer countdown mirror firing a completion callback once per start instant.
pub struct TimerTracker {
    duration: Duration,
    started_at: Option<Timestamp>,
    completed_for: Option<Timestamp>,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for TimerTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTracker")
            .field("duration", &self.duration)
            .field("started_at", &self.started_at)
            .field("completed_for", &self.completed_for)
            .finish_non_exhaustive()
    }
}

impl TimerTracker {
    /// Idle tracker for a countdown of `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: None,
            completed_for: None,
            on_complete: None,
        }
    }

    /// Register the callback invoked when the countdown reaches zero.
    pub fn on_complete(mut self, callback: impl FnMut(Timestamp) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Mirror the stored column.
    ///
    /// The outer `None` means the row lacked the column entirely, in which case
    /// the previous state is kept.
    pub fn observe(&mut self, column: Option<Option<Timestamp>>) {
        let Some(started_at) = column else {
            return;
        };
        if started_at.is_none() {
            self.completed_for = None;
        }
        self.started_at = started_at;
    }

    /// Current countdown state; fires the completion callback on the first
    /// evaluation that reaches zero for the mirrored start instant.
    pub fn tick(&mut self, now: OffsetDateTime) -> TimerView {
        let view = timer_view(self.duration, self.started_at, now);
        if view.status != TimerStatus::Complete {
            return view;
        }
        if let Some(started) = self.started_at.filter(|s| self.completed_for != Some(*s)) {
            self.completed_for = Some(started);
            if let Some(callback) = self.on_complete.as_mut() {
                callback(started);
            }
        }
        view
    }
}
