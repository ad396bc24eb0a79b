//! Shared data model: members, turns, rounds, status, scheduler output.
//!
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable member identifier supplied by the surrounding application.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// MEMBER
// =============================================================================

/// A session participant. Never created inside the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Stable identifier
    pub id: PlayerId,
    /// Name shown to other members
    pub display_name: String,
    /// Display colour chosen by the application
    pub color: String,
}

impl Member {
    /// Create a member.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            display_name: display_name.into(),
            color: color.into(),
        }
    }
}

/// Member ids in seat order.
pub fn member_ids(members: &[Member]) -> Vec<PlayerId> {
    members.iter().map(|m| m.id.clone()).collect()
}

/// Seat position of a member.
pub fn seat_of(members: &[Member], player_id: &PlayerId) -> Option<usize> {
    members.iter().position(|m| &m.id == player_id)
}

// =============================================================================
// TURNS AND ROUNDS
// =============================================================================

/// One member's submitted action for one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn<T> {
    /// Author
    pub player_id: PlayerId,
    /// Round the turn belongs to
    pub round_index: u32,
    /// Game-specific payload
    pub data: T,
    /// When the host accepted it; only delayed scheduling reads this
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl<T> Turn<T> {
    /// Create an untimestamped turn.
    pub fn new(player_id: impl Into<PlayerId>, round_index: u32, data: T) -> Self {
        Self {
            player_id: player_id.into(),
            round_index,
            data,
            submitted_at: None,
        }
    }

    /// Attach a submission time.
    pub fn at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(submitted_at);
        self
    }
}

/// All turns collected for one round index. Insertion order is irrelevant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round<T> {
    /// Round index
    pub round_index: u32,
    /// At most one turn per player
    pub turns: Vec<Turn<T>>,
}

impl<T> Round<T> {
    /// Empty round.
    pub fn new(round_index: u32) -> Self {
        Self {
            round_index,
            turns: Vec::new(),
        }
    }

    /// Build a round from turns, keeping the last turn per player.
    pub fn from_turns(round_index: u32, turns: impl IntoIterator<Item = Turn<T>>) -> Self {
        let mut round = Self::new(round_index);
        for turn in turns {
            round.upsert(turn);
        }
        round
    }

    /// Insert or replace the author's turn. Returns the replaced turn.
    pub fn upsert(&mut self, turn: Turn<T>) -> Option<Turn<T>> {
        match self.turns.iter_mut().find(|t| t.player_id == turn.player_id) {
            Some(existing) => Some(std::mem::replace(existing, turn)),
            None => {
                self.turns.push(turn);
                None
            }
        }
    }

    /// The turn submitted by `player_id`.
    pub fn turn_of(&self, player_id: &PlayerId) -> Option<&Turn<T>> {
        self.turns.iter().find(|t| &t.player_id == player_id)
    }

    /// Whether `player_id` has submitted.
    pub fn has_turn(&self, player_id: &PlayerId) -> bool {
        self.turn_of(player_id).is_some()
    }

    /// Turns ordered by player id.
    pub fn sorted_turns(&self) -> Vec<&Turn<T>> {
        let mut turns: Vec<_> = self.turns.iter().collect();
        turns.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        turns
    }

    /// Latest submission time among the turns.
    pub fn filled_at(&self) -> Option<DateTime<Utc>> {
        self.turns.iter().filter_map(|t| t.submitted_at).max()
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turns were collected.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<T: Clone> Round<T> {
    /// Copy with turns in player-id order.
    pub fn canonical(&self) -> Self {
        let mut round = self.clone();
        round.turns.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        round
    }
}

/// Complete turn history of a session, keyed by round index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnHistory<T> {
    rounds: BTreeMap<u32, Round<T>>,
}

impl<T> Default for TurnHistory<T> {
    fn default() -> Self {
        Self {
            rounds: BTreeMap::new(),
        }
    }
}

impl<T> TurnHistory<T> {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert keyed by `(player_id, round_index)`. Returns the replaced turn.
    pub fn upsert(&mut self, turn: Turn<T>) -> Option<Turn<T>> {
        self.rounds
            .entry(turn.round_index)
            .or_insert_with(|| Round::new(turn.round_index))
            .upsert(turn)
    }

    /// Round at `round_index`, if any turn was collected.
    pub fn round(&self, round_index: u32) -> Option<&Round<T>> {
        self.rounds.get(&round_index)
    }

    /// Highest round index with at least one turn.
    pub fn last_index(&self) -> Option<u32> {
        self.rounds.keys().next_back().copied()
    }

    /// Iterate rounds in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Round<T>> {
        self.rounds.values()
    }

    /// Total number of stored turns.
    pub fn turn_count(&self) -> usize {
        self.rounds.values().map(Round::len).sum()
    }
}

impl<T: Clone> TurnHistory<T> {
    /// Round at `round_index`, empty when nothing was submitted.
    pub fn round_or_empty(&self, round_index: u32) -> Round<T> {
        self.rounds
            .get(&round_index)
            .cloned()
            .unwrap_or_else(|| Round::new(round_index))
    }

    /// Rounds `0..end` with gaps filled by empty rounds.
    pub fn rounds_before(&self, end: u32) -> Vec<Round<T>> {
        (0..end).map(|i| self.round_or_empty(i)).collect()
    }
}

impl<T> FromIterator<Turn<T>> for TurnHistory<T> {
    fn from_iter<I: IntoIterator<Item = Turn<T>>>(iter: I) -> Self {
        let mut history = Self::new();
        for turn in iter {
            history.upsert(turn);
        }
        history
    }
}

// =============================================================================
// STATUS AND SCHEDULING
// =============================================================================

/// Session status. Monotonic once `Complete`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GameStatus {
    /// Not started
    Pending,
    /// In play
    Active,
    /// Finished; an empty winner list is a draw
    #[serde(rename_all = "camelCase")]
    Complete {
        /// Winning members
        winner_ids: Vec<PlayerId>,
    },
}

impl GameStatus {
    /// Complete with the given winners, sorted for stable output.
    pub fn complete(mut winner_ids: Vec<PlayerId>) -> Self {
        winner_ids.sort();
        winner_ids.dedup();
        Self::Complete { winner_ids }
    }

    /// Whether the game is over.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Winners when complete.
    pub fn winners(&self) -> &[PlayerId] {
        match self {
            Self::Complete { winner_ids } => winner_ids,
            _ => &[],
        }
    }

    /// Wire label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Complete { .. } => "complete",
        }
    }
}

/// Scheduler output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundIndexDecision {
    /// Current (open) round
    pub round_index: u32,
    /// Members whose turn is awaited this round
    pub pending_player_ids: Vec<PlayerId>,
    /// Re-check the schedule at this time (soft timer)
    pub check_again_at: Option<DateTime<Utc>>,
}

impl RoundIndexDecision {
    /// Decision with no timer.
    pub fn new(round_index: u32, pending_player_ids: Vec<PlayerId>) -> Self {
        Self {
            round_index,
            pending_player_ids,
            check_again_at: None,
        }
    }

    /// Whether `player_id` owes a turn.
    pub fn is_pending(&self, player_id: &PlayerId) -> bool {
        self.pending_player_ids.contains(player_id)
    }
}

/// Narrative line emitted when a round closes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    /// Message text
    pub text: String,
    /// Member the message is about, if any
    pub player_id: Option<PlayerId>,
}

impl SystemMessage {
    /// Message about the whole table.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            player_id: None,
        }
    }

    /// Message about one member.
    pub fn about(player_id: PlayerId, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            player_id: Some(player_id),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
