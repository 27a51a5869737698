use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;

/// Visible phase of the conflict poll for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RevealPhase {
    /// Vote buttons are shown.
    NotVoted,
    /// Vote recorded; results are about to be revealed.
    VotedAwaitingReveal,
    /// Results and team messages are shown. Never left once entered.
    Revealed,
}

/// Inputs driving [`ConflictReveal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEvent {
    /// The viewer's vote was written.
    Voted { at: Instant },
    /// A new live view attached for a viewer whose vote flag is already set.
    Reconnected,
    /// Periodic check against the reveal delay.
    Tick { now: Instant, delay: Duration },
}

/// Event that cannot be applied from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidReveal {
    /// Phase the viewer was in.
    pub from: RevealPhase,
    /// Event that was rejected.
    pub event: RevealEvent,
}

/// Per-viewer poll-then-reveal state machine of the conflict step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictReveal {
    voted_at: Option<Instant>,
    revealed: bool,
}

impl ConflictReveal {
    /// Facilitator displays skip the vote and always show results.
    pub fn revealed() -> Self {
        Self {
            voted_at: None,
            revealed: true,
        }
    }

    pub fn phase(&self) -> RevealPhase {
        match (self.revealed, self.voted_at) {
            (true, _) => RevealPhase::Revealed,
            (false, Some(_)) => RevealPhase::VotedAwaitingReveal,
            (false, None) => RevealPhase::NotVoted,
        }
    }

    /// Whether the viewer has cast a vote (the advisory flag).
    pub fn has_voted(&self) -> bool {
        self.voted_at.is_some()
    }

    /// Apply `event`, returning the resulting phase.
    pub fn apply(&mut self, event: RevealEvent) -> Result<RevealPhase, InvalidReveal> {
        let from = self.phase();
        match (from, event) {
            (RevealPhase::NotVoted, RevealEvent::Voted { at }) => {
                self.voted_at = Some(at);
            }
            (RevealPhase::VotedAwaitingReveal, RevealEvent::Reconnected) => {
                self.revealed = true;
            }
            (RevealPhase::VotedAwaitingReveal, RevealEvent::Tick { now, delay }) => {
                if self
                    .voted_at
                    .is_some_and(|voted_at| now.saturating_duration_since(voted_at) >= delay)
                {
                    self.revealed = true;
                }
            }
            (RevealPhase::NotVoted | RevealPhase::Revealed, RevealEvent::Tick { .. })
            | (RevealPhase::NotVoted | RevealPhase::Revealed, RevealEvent::Reconnected) => {}
            (from, event) => return Err(InvalidReveal { from, event }),
        }
        Ok(self.phase())
    }
}
