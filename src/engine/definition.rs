//! The contract every game implements.
//!
//! A game is a set of pure functions over its own associated types. The
//! engine owns scheduling, caching, and ordering; the game never sees a
//! clock and only draws randomness through the [`DeterministicRng`] it is
//! handed.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::rng::DeterministicRng;
use crate::engine::errors::{ContractViolation, EngineError, ValidationResult};
use crate::engine::scheduler;
use crate::engine::types::{
    GameStatus, Member, PlayerId, Round, RoundIndexDecision, SystemMessage, Turn, TurnHistory,
};

/// How rounds advance once every active member has submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundFormat {
    /// The next round opens as soon as the current one is full.
    Sync,
    /// A full round stays open until `delay` has elapsed since its last
    /// submission.
    Delayed {
        /// Cooldown after the round fills
        delay: Duration,
    },
}

// =============================================================================
// CONTEXTS
// =============================================================================

/// Input to initial state construction.
pub struct SetupContext<'a> {
    /// Members in seat order
    pub members: &'a [Member],
    /// Setup stream derived from the session seed
    pub rng: &'a mut DeterministicRng,
}

/// Input to the reducer.
pub struct ReduceContext<'a, G: GameDefinition> {
    /// State at the start of the round
    pub state: &'a G::GlobalState,
    /// Turns sorted by player id
    pub round: &'a Round<G::TurnData>,
    /// Members in seat order
    pub members: &'a [Member],
    /// Stream for this round
    pub rng: &'a mut DeterministicRng,
}

/// Input to turn validation.
pub struct ValidateContext<'a, G: GameDefinition> {
    /// The author's projected state
    pub player_state: &'a G::PlayerState,
    /// Author
    pub player_id: &'a PlayerId,
    /// Proposed payload
    pub data: &'a G::TurnData,
    /// Open round
    pub round_index: u32,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to player projection.
pub struct PlayerStateContext<'a, G: GameDefinition> {
    /// State at the start of `round_index`
    pub state: &'a G::GlobalState,
    /// Viewer
    pub player_id: &'a PlayerId,
    /// Open round
    pub round_index: u32,
    /// Turns already collected for the open round
    pub open_round: Option<&'a Round<G::TurnData>>,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to optimistic projection of an unsubmitted draft.
pub struct ProspectiveContext<'a, G: GameDefinition> {
    /// Viewer's current projection
    pub player_state: &'a G::PlayerState,
    /// Viewer
    pub player_id: &'a PlayerId,
    /// Draft payload
    pub data: &'a G::TurnData,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to public turn redaction.
pub struct PublicTurnContext<'a, G: GameDefinition> {
    /// The closed turn
    pub turn: &'a Turn<G::TurnData>,
    /// State at the start of the turn's round
    pub state: &'a G::GlobalState,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to status resolution.
pub struct StatusContext<'a, G: GameDefinition> {
    /// State after the last closed round
    pub state: &'a G::GlobalState,
    /// Number of closed rounds
    pub closed_rounds: u32,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to round-change narration.
pub struct RoundChangeContext<'a, G: GameDefinition> {
    /// State before the round
    pub previous: &'a G::GlobalState,
    /// State after the round
    pub next: &'a G::GlobalState,
    /// The round that closed
    pub round: &'a Round<G::TurnData>,
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to the pending-member query for the frontier round.
pub struct PendingContext<'a, G: GameDefinition> {
    /// State at the start of the round
    pub state: &'a G::GlobalState,
    /// Turns collected so far
    pub round: &'a Round<G::TurnData>,
    /// Members expected to act this round, in seat order
    pub active: &'a [PlayerId],
    /// Members in seat order
    pub members: &'a [Member],
}

/// Input to the scheduler.
pub struct ScheduleContext<'a, G: GameDefinition> {
    /// Every accepted turn
    pub history: &'a TurnHistory<G::TurnData>,
    /// Members in seat order
    pub members: &'a [Member],
    /// Session start, if scheduled
    pub started_at: Option<DateTime<Utc>>,
    /// Host clock
    pub now: DateTime<Utc>,
    /// Effective round format
    pub format: RoundFormat,
    /// First round not yet filled by its active members
    pub frontier_index: u32,
    /// State at the start of the frontier round
    pub frontier_state: &'a G::GlobalState,
    /// Members expected to act in the frontier round
    pub frontier_active: &'a [PlayerId],
    /// Whether the frontier state is terminal
    pub complete: bool,
}

// =============================================================================
// GAME DEFINITION
// =============================================================================

/// A deterministic, round-based game.
///
/// Implementors supply rules only. Everything here must be a pure function
/// of its inputs: no clock, no I/O, no hash-ordered iteration.
pub trait GameDefinition: Sized + Send + Sync + 'static {
    /// Authoritative state shared by all members.
    type GlobalState: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    /// What one member may see.
    type PlayerState: Clone + Debug + PartialEq + Serialize + Send + Sync;
    /// Payload of a submitted turn.
    type TurnData: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    /// Redacted payload shown to everyone once the round closes.
    type PublicTurnData: Clone + Debug + PartialEq + Serialize + Send + Sync;

    /// Short name used in logs and faults.
    const NAME: &'static str;
    /// Fewest members supported.
    const MIN_PLAYERS: usize;
    /// Most members supported.
    const MAX_PLAYERS: usize;

    /// Pacing of rounds.
    fn round_format(&self) -> RoundFormat {
        RoundFormat::Sync
    }

    /// Members expected to submit in a round starting from `state`.
    fn active_players(&self, _state: &Self::GlobalState, members: &[Member]) -> Vec<PlayerId> {
        members.iter().map(|m| m.id.clone()).collect()
    }

    /// Members still owed a turn in the frontier round.
    ///
    /// Defaults to every active member without a turn. Games that take
    /// turns one seat at a time narrow this to a single member.
    fn pending_players(&self, ctx: &PendingContext<'_, Self>) -> Result<Vec<PlayerId>, EngineError> {
        Ok(ctx
            .active
            .iter()
            .filter(|id| !ctx.round.has_turn(id))
            .cloned()
            .collect())
    }

    /// Current round and pending members.
    fn round_index(&self, ctx: &ScheduleContext<'_, Self>) -> Result<RoundIndexDecision, EngineError> {
        scheduler::standard_round_index(self, ctx)
    }

    /// Cheap checks for an in-progress draft. Must accept any turn that
    /// [`GameDefinition::validate_turn`] accepts.
    fn validate_partial_turn(&self, _ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        Ok(())
    }

    /// Full legality check for a submission.
    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult;

    /// State before round 0.
    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<Self::GlobalState, ContractViolation>;

    /// Projection of `state` for one member.
    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> Self::PlayerState;

    /// Projection as if `data` had already been applied for this member only.
    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> Self::PlayerState;

    /// Apply one closed round.
    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<Self::GlobalState, ContractViolation>;

    /// Redacted view of a closed turn.
    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> Self::PublicTurnData;

    /// Lifecycle status after `closed_rounds` rounds.
    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus;

    /// Narrative lines for a round that just closed.
    fn round_change_messages(&self, _ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        Vec::new()
    }
}
