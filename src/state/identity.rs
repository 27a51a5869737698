//! Anonymous participant identity and the advisory per-client flags that hide
//! already-used forms.
//!
//! None of these flags are enforced against the store: a participant holding a
//! fresh identity can always submit again.

use std::{collections::HashMap, time::Duration};

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    dao::models::{Board, Emoji},
    state::conflict::{ConflictReveal, InvalidReveal, RevealEvent, RevealPhase},
};

/// Nickname stored when a participant leaves it empty.
pub const ANONYMOUS_NICKNAME: &str = "익명";

/// Identity a participant presents on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Random identifier minted once per participant.
    pub voter_id: Uuid,
    /// Display name, possibly empty.
    pub nickname: String,
    /// Team number chosen when joining.
    pub team: Option<u32>,
}

impl ClientIdentity {
    /// Mint a new identity with a random voter id.
    pub fn mint(nickname: impl Into<String>, team: Option<u32>) -> Self {
        Self {
            voter_id: Uuid::new_v4(),
            nickname: nickname.into(),
            team,
        }
    }

    /// Nickname as stored on board messages.
    pub fn display_nickname(&self) -> &str {
        let trimmed = self.nickname.trim();
        if trimmed.is_empty() {
            ANONYMOUS_NICKNAME
        } else {
            trimmed
        }
    }

    /// Nickname prefixed with the team, as shown next to team messages.
    pub fn team_label(&self) -> String {
        match self.team {
            Some(team) => format!("{team}조 {}", self.display_nickname()),
            None => self.display_nickname().to_string(),
        }
    }
}

/// Why a vote of a client was refused before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteClaimError {
    /// Another vote of the same client has not settled yet.
    #[error("a vote is already in flight")]
    InFlight,
    /// The client already answered this poll.
    #[error("vote already cast")]
    AlreadyCast,
}

/// Outcome of starting an optimistic mood selection.
#[derive(Debug)]
pub enum MoodSelection<'a> {
    /// The emoji is already selected; nothing to write.
    Unchanged,
    /// The selection was applied optimistically and must be committed.
    Pending(VoteClaim<'a>),
}

#[derive(Debug, Clone, Copy)]
enum ClaimKind {
    Mood { previous: Option<Emoji> },
    Conflict,
}

/// Optimistic state of one vote whose write is in flight.
///
/// Dropping the claim without [`VoteClaim::commit`] rolls the state back, so a
/// cancelled request never leaves the client stuck in flight.
#[must_use = "dropping the claim rolls the vote back"]
#[derive(Debug)]
pub struct VoteClaim<'a> {
    registry: &'a ClientRegistry,
    session_id: String,
    voter_id: Uuid,
    kind: ClaimKind,
    settled: bool,
}

impl VoteClaim<'_> {
    /// Keep the optimistic state; the write reached the store.
    pub fn commit(mut self) {
        self.settle(true);
    }

    fn settle(&mut self, succeeded: bool) {
        if std::mem::replace(&mut self.settled, true) {
            return;
        }
        let now = Instant::now();
        let kind = self.kind;
        self.registry
            .with_flags(&self.session_id, self.voter_id, |flags| match kind {
                ClaimKind::Mood { previous } => {
                    flags.mood_in_flight = false;
                    if !succeeded {
                        flags.mood = previous;
                    }
                }
                ClaimKind::Conflict => {
                    flags.conflict_in_flight = false;
                    if succeeded {
                        // cannot fail: the claim was refused for clients that voted
                        let _ = flags.conflict.apply(RevealEvent::Voted { at: now });
                    }
                }
            });
    }
}

impl Drop for VoteClaim<'_> {
    fn drop(&mut self) {
        self.settle(false);
    }
}

/// Advisory state of one client within one session.
#[derive(Debug, Clone, Default)]
pub struct ClientFlags {
    /// Currently displayed mood selection.
    pub mood: Option<Emoji>,
    /// Whether a mood write is in flight.
    pub mood_in_flight: bool,
    /// Conflict poll reveal state.
    pub conflict: ConflictReveal,
    /// Whether a conflict write is in flight.
    pub conflict_in_flight: bool,
    /// One team message per client.
    pub team_message_submitted: bool,
    /// One keyword per client.
    pub keyword_submitted: bool,
    /// Board forms hidden until the given instant.
    pub board_cooldowns: HashMap<Board, Instant>,
}

impl ClientFlags {
    /// Whether the form of `board` is hidden at `now`.
    pub fn board_cooling_down(&self, board: Board, now: Instant) -> bool {
        self.board_cooldowns
            .get(&board)
            .is_some_and(|until| now < *until)
    }

    fn in_flight(&self) -> bool {
        self.mood_in_flight || self.conflict_in_flight
    }
}

#[derive(Debug)]
struct Tracked {
    flags: ClientFlags,
    last_seen: Instant,
}

/// Registry of advisory client flags keyed by session and voter id.
///
/// Entries are created by writes only; reads of unknown clients see defaults.
/// Clients idle for longer than the configured TTL are dropped by
/// [`ClientRegistry::evict_idle`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    flags: DashMap<(String, Uuid), Tracked>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the client's flags; defaults for unknown clients.
    pub fn snapshot(&self, session_id: &str, voter_id: Uuid) -> ClientFlags {
        self.flags
            .get_mut(&(session_id.to_string(), voter_id))
            .map(|mut entry| {
                entry.last_seen = Instant::now();
                entry.flags.clone()
            })
            .unwrap_or_default()
    }

    fn with_flags<T>(
        &self,
        session_id: &str,
        voter_id: Uuid,
        f: impl FnOnce(&mut ClientFlags) -> T,
    ) -> T {
        let now = Instant::now();
        let mut entry = self
            .flags
            .entry((session_id.to_string(), voter_id))
            .or_insert_with(|| Tracked {
                flags: ClientFlags::default(),
                last_seen: now,
            });
        entry.last_seen = now;
        f(&mut entry.flags)
    }

    fn claim(
        &self,
        session_id: &str,
        voter_id: Uuid,
        kind: ClaimKind,
    ) -> VoteClaim<'_> {
        VoteClaim {
            registry: self,
            session_id: session_id.to_string(),
            voter_id,
            kind,
            settled: false,
        }
    }

    /// Apply `emoji` optimistically unless it is already selected or a vote is in flight.
    pub fn begin_mood_vote(
        &self,
        session_id: &str,
        voter_id: Uuid,
        emoji: Emoji,
    ) -> Result<MoodSelection<'_>, VoteClaimError> {
        let previous = self.with_flags(session_id, voter_id, |flags| {
            if flags.mood_in_flight {
                return Err(VoteClaimError::InFlight);
            }
            if flags.mood == Some(emoji) {
                return Ok(None);
            }
            let previous = flags.mood.replace(emoji);
            flags.mood_in_flight = true;
            Ok(Some(previous))
        })?;

        Ok(match previous {
            None => MoodSelection::Unchanged,
            Some(previous) => MoodSelection::Pending(self.claim(
                session_id,
                voter_id,
                ClaimKind::Mood { previous },
            )),
        })
    }

    /// Reserve the client's single conflict answer until the write settles.
    pub fn begin_conflict_vote(
        &self,
        session_id: &str,
        voter_id: Uuid,
    ) -> Result<VoteClaim<'_>, VoteClaimError> {
        self.with_flags(session_id, voter_id, |flags| {
            if flags.conflict.has_voted() {
                return Err(VoteClaimError::AlreadyCast);
            }
            if flags.conflict_in_flight {
                return Err(VoteClaimError::InFlight);
            }
            flags.conflict_in_flight = true;
            Ok(())
        })?;
        Ok(self.claim(session_id, voter_id, ClaimKind::Conflict))
    }

    /// Adopt the stored vote as the current selection when nothing is selected yet.
    pub fn adopt_stored_mood(&self, session_id: &str, voter_id: Uuid, stored: Emoji) {
        self.with_flags(session_id, voter_id, |flags| {
            if flags.mood.is_none() && !flags.mood_in_flight {
                flags.mood = Some(stored);
            }
        });
    }

    /// Drive the conflict reveal state machine of a known client.
    ///
    /// Unknown clients are answered from a default state without being tracked.
    pub fn apply_conflict(
        &self,
        session_id: &str,
        voter_id: Uuid,
        event: RevealEvent,
    ) -> Result<RevealPhase, InvalidReveal> {
        match self.flags.get_mut(&(session_id.to_string(), voter_id)) {
            Some(mut entry) => {
                entry.last_seen = Instant::now();
                entry.flags.conflict.apply(event)
            }
            None => ConflictReveal::default().apply(event),
        }
    }

    pub fn mark_team_message_submitted(&self, session_id: &str, voter_id: Uuid) {
        self.with_flags(session_id, voter_id, |flags| {
            flags.team_message_submitted = true;
        });
    }

    pub fn mark_keyword_submitted(&self, session_id: &str, voter_id: Uuid) {
        self.with_flags(session_id, voter_id, |flags| flags.keyword_submitted = true);
    }

    /// Hide the board form until `until`.
    pub fn start_board_cooldown(
        &self,
        session_id: &str,
        voter_id: Uuid,
        board: Board,
        until: Instant,
    ) {
        self.with_flags(session_id, voter_id, |flags| {
            flags.board_cooldowns.insert(board, until);
        });
    }

    /// Drop clients untouched for `ttl`, keeping those with a write in flight.
    /// Returns how many were dropped.
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.flags.len();
        self.flags.retain(|_, tracked| {
            tracked.flags.in_flight() || now.saturating_duration_since(tracked.last_seen) < ttl
        });
        before.saturating_sub(self.flags.len())
    }

    /// Number of tracked clients across all sessions.
    pub fn tracked(&self) -> usize {
        self.flags.len()
    }
}
