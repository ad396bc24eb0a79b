//! Round Scheduler
//!
//! Decides the open round and who still owes a turn. Pure apart from
//! memoizing settled boundaries in the cache.
//!
//! ```text
//!  round:    0      1      2      3
//!           full   full   partial  -
//!                          ^ frontier
//! ```
//!
//! The frontier is the first round that its active members have not all
//! filled. With `Sync` pacing it is the open round. With `Delayed` pacing the
//! round before it stays open until its cooldown has passed.

use chrono::{DateTime, Utc};

use crate::engine::cache::StateCache;
use crate::engine::definition::{
    GameDefinition, PendingContext, RoundFormat, ScheduleContext, StatusContext,
};
use crate::engine::errors::EngineError;
use crate::engine::reducer;
use crate::engine::types::{Member, PlayerId, Round, RoundIndexDecision, TurnHistory};

/// First round not filled by its active members.
#[derive(Clone, Debug, PartialEq)]
pub struct Frontier<S> {
    /// Round index
    pub index: u32,
    /// State at the start of the round
    pub state: S,
    /// Members expected to act
    pub active: Vec<PlayerId>,
    /// Whether `state` is terminal
    pub complete: bool,
}

/// When a filled round stops accepting replacements.
pub fn round_closes_at<T>(round: &Round<T>, format: RoundFormat) -> Option<DateTime<Utc>> {
    match format {
        RoundFormat::Sync => None,
        RoundFormat::Delayed { delay } => round.filled_at().map(|t| t + delay),
    }
}

/// Whether a filled round is past any cooldown at `now`.
pub fn round_settled<T>(round: &Round<T>, format: RoundFormat, now: DateTime<Utc>) -> bool {
    round_closes_at(round, format).map_or(true, |at| now >= at)
}

/// Walk filled rounds forward from the latest memoized boundary.
pub fn find_frontier<G: GameDefinition>(
    game: &G,
    cache: &mut StateCache<G>,
    history: &TurnHistory<G::TurnData>,
    members: &[Member],
    format: RoundFormat,
    now: DateTime<Utc>,
) -> Result<Frontier<G::GlobalState>, EngineError> {
    let (mut index, state) = cache.latest();
    let mut state = state.clone();

    loop {
        check_authors(history, index, members)?;

        let complete = game
            .status(&StatusContext {
                state: &state,
                closed_rounds: index,
                members,
            })
            .is_complete();
        let active = game.active_players(&state, members);
        let round = history.round(index);
        let filled = !complete
            && !active.is_empty()
            && active.iter().all(|id| round.is_some_and(|r| r.has_turn(id)));

        if !filled {
            if let Some(last) = history.last_index() {
                if last > index {
                    return Err(EngineError::SchedulingAmbiguity {
                        round_index: index,
                        reason: format!("turns recorded for round {last} beyond the open round"),
                    });
                }
            }
            return Ok(Frontier {
                index,
                state,
                active,
                complete,
            });
        }

        let round = history.round_or_empty(index);
        state = reducer::reduce_round(game, &state, &round, cache.seed(), members)?;
        cache.record_reduction();
        index += 1;
        if round_settled(&round, format, now) {
            cache.memoize(index, state.clone());
        }
    }
}

/// Default scheduling policy.
///
/// - Before `started_at`: round 0, nobody pending, re-check at the start.
/// - Terminal state: nobody pending.
/// - Delayed pacing: a filled round keeps the table until its cooldown ends.
/// - Otherwise the frontier round, pending per the game.
pub fn standard_round_index<G: GameDefinition>(
    game: &G,
    ctx: &ScheduleContext<'_, G>,
) -> Result<RoundIndexDecision, EngineError> {
    if let Some(started_at) = ctx.started_at {
        if ctx.now < started_at {
            return Ok(RoundIndexDecision {
                round_index: 0,
                pending_player_ids: Vec::new(),
                check_again_at: Some(started_at),
            });
        }
    }

    if ctx.complete {
        return Ok(RoundIndexDecision::new(ctx.frontier_index, Vec::new()));
    }

    if let Some(previous) = ctx.frontier_index.checked_sub(1) {
        if let Some(closes_at) = ctx
            .history
            .round(previous)
            .and_then(|round| round_closes_at(round, ctx.format))
        {
            if ctx.now < closes_at {
                return Ok(RoundIndexDecision {
                    round_index: previous,
                    pending_player_ids: Vec::new(),
                    check_again_at: Some(closes_at),
                });
            }
        }
    }

    let round = ctx.history.round_or_empty(ctx.frontier_index);
    let pending = game.pending_players(&PendingContext {
        state: ctx.frontier_state,
        round: &round,
        active: ctx.frontier_active,
        members: ctx.members,
    })?;
    Ok(RoundIndexDecision::new(ctx.frontier_index, pending))
}

fn check_authors<T>(
    history: &TurnHistory<T>,
    round_index: u32,
    members: &[Member],
) -> Result<(), EngineError> {
    let Some(round) = history.round(round_index) else {
        return Ok(());
    };
    match round
        .turns
        .iter()
        .find(|t| !members.iter().any(|m| m.id == t.player_id))
    {
        Some(turn) => Err(EngineError::SchedulingAmbiguity {
            round_index,
            reason: format!("turn from non-member {}", turn.player_id),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
