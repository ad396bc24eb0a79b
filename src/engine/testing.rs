//! Minimal game used by engine and host tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{GameStatus, Member, PlayerId, SystemMessage};

/// Members `p0..p{n-1}`.
pub fn members(n: usize) -> Vec<Member> {
    (0..n)
        .map(|i| Member::new(format!("p{i}"), format!("Player {i}"), "#888888"))
        .collect()
}

/// Everyone adds an amount each round; first to 20 wins.
pub struct Counter;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    pub totals: BTreeMap<PlayerId, i64>,
    pub draws: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CounterView {
    pub mine: i64,
    pub submitted: Option<i64>,
}

impl GameDefinition for Counter {
    type GlobalState = CounterState;
    type PlayerState = CounterView;
    type TurnData = i64;
    type PublicTurnData = i64;

    const NAME: &'static str = "counter";
    const MIN_PLAYERS: usize = 2;
    const MAX_PLAYERS: usize = 4;

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        if *ctx.data < 0 {
            return Err("amount must not be negative".into());
        }
        Ok(())
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        if *ctx.data > 10 {
            return Err(ValidationError::new("TOO_LARGE", "at most 10 per round"));
        }
        Ok(())
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<CounterState, ContractViolation> {
        Ok(CounterState {
            totals: ctx.members.iter().map(|m| (m.id.clone(), 0)).collect(),
            draws: vec![ctx.rng.next_u64()],
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> CounterView {
        CounterView {
            mine: ctx.state.totals.get(ctx.player_id).copied().unwrap_or(0),
            submitted: ctx
                .open_round
                .and_then(|r| r.turn_of(ctx.player_id))
                .map(|t| t.data),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> CounterView {
        CounterView {
            mine: ctx.player_state.mine + ctx.data,
            submitted: Some(*ctx.data),
        }
    }

    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<CounterState, ContractViolation> {
        let mut next = ctx.state.clone();
        for turn in &ctx.round.turns {
            if turn.data < 0 {
                return Err(ContractViolation::new("negative amount reached the reducer"));
            }
            *next.totals.entry(turn.player_id.clone()).or_insert(0) += turn.data;
        }
        next.draws.push(ctx.rng.next_u64());
        Ok(next)
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> i64 {
        ctx.turn.data
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        let best = ctx.state.totals.values().copied().max().unwrap_or(0);
        if best >= 20 {
            GameStatus::complete(
                ctx.state
                    .totals
                    .iter()
                    .filter(|(_, total)| **total == best)
                    .map(|(id, _)| id.clone())
                    .collect(),
            )
        } else {
            GameStatus::Active
        }
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        vec![SystemMessage::new(format!(
            "round {} closed",
            ctx.round.round_index
        ))]
    }
}
