//! State Reducer
//!
//! Folds rounds into global state. Every round is canonicalised (turns sorted
//! by player id) before the game sees it, so collection order never changes
//! the result.
//!
//! A game that fails inside `apply_round` has produced or been fed an
//! impossible state. That is reported as a fatal fault, never papered over.

use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::core::rng::DeterministicRng;
use crate::engine::definition::{GameDefinition, ReduceContext, SetupContext};
use crate::engine::errors::{ContractViolation, EngineError};
use crate::engine::types::{Member, Round};

/// Reject member lists the game cannot seat.
pub fn check_members<G: GameDefinition>(members: &[Member]) -> Result<(), EngineError> {
    let count = members.len();
    if count < G::MIN_PLAYERS || count > G::MAX_PLAYERS {
        return Err(EngineError::PlayerCount {
            game: G::NAME,
            count,
            min: G::MIN_PLAYERS,
            max: G::MAX_PLAYERS,
        });
    }

    let mut seen = BTreeSet::new();
    for member in members {
        if !seen.insert(&member.id) {
            return Err(EngineError::DuplicateMember(member.id.clone()));
        }
    }
    Ok(())
}

/// Build the state before round 0 from the setup stream.
pub fn initial_state<G: GameDefinition>(
    game: &G,
    members: &[Member],
    seed: &str,
) -> Result<G::GlobalState, EngineError> {
    check_members::<G>(members)?;

    let mut rng = DeterministicRng::for_setup(seed);
    game.initial_global_state(SetupContext {
        members,
        rng: &mut rng,
    })
    .map_err(|violation| fault::<G>(None, violation))
}

/// Apply one round to `state`.
pub fn reduce_round<G: GameDefinition>(
    game: &G,
    state: &G::GlobalState,
    round: &Round<G::TurnData>,
    seed: &str,
    members: &[Member],
) -> Result<G::GlobalState, EngineError> {
    let round = round.canonical();
    let round_index = round.round_index;

    // At most one turn per member, and only from members
    for pair in round.turns.windows(2) {
        if pair[0].player_id == pair[1].player_id {
            return Err(fault::<G>(
                Some(round_index),
                ContractViolation::new(format!("two turns from {}", pair[0].player_id)),
            ));
        }
    }
    if let Some(turn) = round
        .turns
        .iter()
        .find(|t| !members.iter().any(|m| m.id == t.player_id))
    {
        return Err(fault::<G>(
            Some(round_index),
            ContractViolation::new(format!("turn from non-member {}", turn.player_id)),
        ));
    }
    if let Some(turn) = round.turns.iter().find(|t| t.round_index != round_index) {
        return Err(fault::<G>(
            Some(round_index),
            ContractViolation::new(format!(
                "turn for round {} filed under round {}",
                turn.round_index, round_index
            )),
        ));
    }

    let mut rng = DeterministicRng::for_round(seed, round_index);
    let next = game
        .apply_round(ReduceContext {
            state,
            round: &round,
            members,
            rng: &mut rng,
        })
        .map_err(|violation| fault::<G>(Some(round_index), violation))?;

    debug!(game = G::NAME, round_index, turns = round.turns.len(), "round reduced");
    Ok(next)
}

/// Fold `rounds` from the initial state, with no cache.
pub fn replay<G: GameDefinition>(
    game: &G,
    members: &[Member],
    seed: &str,
    rounds: &[Round<G::TurnData>],
) -> Result<G::GlobalState, EngineError> {
    let mut state = initial_state(game, members, seed)?;
    for round in rounds {
        state = reduce_round(game, &state, round, seed, members)?;
    }
    Ok(state)
}

fn fault<G: GameDefinition>(round_index: Option<u32>, violation: ContractViolation) -> EngineError {
    error!(
        game = G::NAME,
        ?round_index,
        "contract violation: {}",
        violation.message
    );
    EngineError::ContractViolation {
        game: G::NAME,
        round_index,
        violation,
    }
}

// =============================================================================
// TESTS
// =============================================================================
