//! Round Engine
//!
//! Generic over one [`GameDefinition`], chosen when a session is created.
//! Every entry point is a synchronous computation over plain data; hosts own
//! persistence and clocks.
//!
//! ## Module Structure
//!
//! - `types`: members, turns, rounds, status, scheduler output
//! - `definition`: the game contract and its context structs
//! - `scheduler`: open round and pending members
//! - `validator`: structural and game-level turn checks
//! - `reducer`: folding rounds into state
//! - `conflict`: shared simultaneous-action rules
//! - `projector`: player, optimistic and public views
//! - `status`: status resolution and the monotonic guard
//! - `cache`: memoized round-boundary states

pub mod cache;
pub mod conflict;
pub mod definition;
pub mod errors;
pub mod projector;
pub mod reducer;
pub mod scheduler;
pub mod status;
pub mod types;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};

use crate::core::hash::{compute_state_hash, StateHash};

pub use cache::{CacheStats, StateCache};
pub use definition::{GameDefinition, RoundFormat, ScheduleContext};
pub use errors::{ContractViolation, EngineError, ValidationError, ValidationResult};
pub use types::{
    GameStatus, Member, PlayerId, Round, RoundIndexDecision, SystemMessage, Turn, TurnHistory,
};

/// Scheduler output plus the state the open round starts from.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule<S> {
    /// Open round and pending members
    pub decision: RoundIndexDecision,
    /// State at the start of the open round
    pub state: S,
    /// Whether `state` is terminal
    pub complete: bool,
}

/// Entry points consumed by hosts.
#[derive(Debug)]
pub struct Engine<G: GameDefinition> {
    game: G,
    format_override: Option<RoundFormat>,
}

impl<G: GameDefinition> Engine<G> {
    /// Engine for `game` with the game's own pacing.
    pub fn new(game: G) -> Self {
        Self {
            game,
            format_override: None,
        }
    }

    /// Override the game's pacing, e.g. for daily-cadence deployments.
    pub fn with_round_format(mut self, format: RoundFormat) -> Self {
        self.format_override = Some(format);
        self
    }

    /// The game rules.
    pub fn game(&self) -> &G {
        &self.game
    }

    /// Effective pacing.
    pub fn round_format(&self) -> RoundFormat {
        self.format_override
            .unwrap_or_else(|| self.game.round_format())
    }

    /// State before round 0. Rejects unsupported member lists.
    pub fn initialize_session(
        &self,
        members: &[Member],
        seed: &str,
    ) -> Result<G::GlobalState, EngineError> {
        reducer::initial_state(&self.game, members, seed)
    }

    /// Fresh cache holding the initial state.
    pub fn new_cache(&self, members: &[Member], seed: &str) -> Result<StateCache<G>, EngineError> {
        Ok(StateCache::new(seed, self.initialize_session(members, seed)?))
    }

    /// Open round, pending members, and the state that round starts from.
    pub fn schedule(
        &self,
        cache: &mut StateCache<G>,
        history: &TurnHistory<G::TurnData>,
        members: &[Member],
        started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Schedule<G::GlobalState>, EngineError> {
        let format = self.round_format();
        let frontier = scheduler::find_frontier(&self.game, cache, history, members, format, now)?;

        let decision = self.game.round_index(&ScheduleContext {
            history,
            members,
            started_at,
            now,
            format,
            frontier_index: frontier.index,
            frontier_state: &frontier.state,
            frontier_active: &frontier.active,
            complete: frontier.complete,
        })?;

        if decision.round_index == frontier.index {
            return Ok(Schedule {
                decision,
                state: frontier.state,
                complete: frontier.complete,
            });
        }

        // Cooling down (frontier - 1) or not yet started (0)
        if decision.round_index > frontier.index {
            return Err(EngineError::SchedulingAmbiguity {
                round_index: decision.round_index,
                reason: format!(
                    "scheduler opened round {} past the first unfilled round {}",
                    decision.round_index, frontier.index
                ),
            });
        }
        let state = cache.state_at(
            &self.game,
            history,
            members,
            decision.round_index,
            decision.round_index,
        )?;
        Ok(Schedule {
            decision,
            state,
            complete: false,
        })
    }

    /// Open round and pending members.
    pub fn pending_round(
        &self,
        cache: &mut StateCache<G>,
        history: &TurnHistory<G::TurnData>,
        members: &[Member],
        started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<RoundIndexDecision, EngineError> {
        self.schedule(cache, history, members, started_at, now)
            .map(|schedule| schedule.decision)
    }

    /// Full game-level validation of a submission for `round_index`.
    pub fn validate(
        &self,
        player_state: &G::PlayerState,
        turn: &Turn<G::TurnData>,
        round_index: u32,
        members: &[Member],
    ) -> ValidationResult {
        validator::validate_full(&self.game, player_state, turn, round_index, members)
    }

    /// Cheap validation of a draft.
    pub fn validate_partial(
        &self,
        player_state: &G::PlayerState,
        turn: &Turn<G::TurnData>,
        round_index: u32,
        members: &[Member],
    ) -> ValidationResult {
        validator::validate_draft(&self.game, player_state, turn, round_index, members)
    }

    /// Apply one closed round.
    pub fn commit_round(
        &self,
        state: &G::GlobalState,
        round: &Round<G::TurnData>,
        seed: &str,
        members: &[Member],
    ) -> Result<G::GlobalState, EngineError> {
        reducer::reduce_round(&self.game, state, round, seed, members)
    }

    /// Fold `rounds` from scratch.
    pub fn replay(
        &self,
        members: &[Member],
        seed: &str,
        rounds: &[Round<G::TurnData>],
    ) -> Result<G::GlobalState, EngineError> {
        reducer::replay(&self.game, members, seed, rounds)
    }

    /// One member's view of `state` at the start of `round_index`.
    pub fn player_view(
        &self,
        state: &G::GlobalState,
        player_id: &PlayerId,
        round_index: u32,
        open_round: Option<&Round<G::TurnData>>,
        members: &[Member],
    ) -> G::PlayerState {
        projector::player_view(&self.game, state, player_id, round_index, open_round, members)
    }

    /// View with an unsubmitted draft applied.
    pub fn optimistic_view(
        &self,
        player_state: &G::PlayerState,
        draft: &G::TurnData,
        player_id: &PlayerId,
        members: &[Member],
    ) -> G::PlayerState {
        projector::optimistic_view(&self.game, player_state, draft, player_id, members)
    }

    /// Status after the closed `rounds`.
    pub fn status(
        &self,
        state: &G::GlobalState,
        rounds: &[Round<G::TurnData>],
        members: &[Member],
    ) -> GameStatus {
        status::resolve(&self.game, state, rounds.len() as u32, members)
    }

    /// Redacted view of a closed turn. `state` is the state its round
    /// started from.
    pub fn public_turn(
        &self,
        turn: &Turn<G::TurnData>,
        state: &G::GlobalState,
        members: &[Member],
    ) -> G::PublicTurnData {
        projector::public_turn(&self.game, turn, state, members)
    }

    /// Narrative lines for a closed round.
    pub fn round_change_messages(
        &self,
        previous: &G::GlobalState,
        next: &G::GlobalState,
        round: &Round<G::TurnData>,
        members: &[Member],
    ) -> Vec<SystemMessage> {
        self.game
            .round_change_messages(&definition::RoundChangeContext {
                previous,
                next,
                round,
                members,
            })
    }

    /// Canonical hash of the state at the start of `round_index`.
    pub fn state_hash(
        &self,
        round_index: u32,
        seed: &str,
        state: &G::GlobalState,
    ) -> Result<StateHash, EngineError> {
        Ok(compute_state_hash(round_index, seed, state)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
