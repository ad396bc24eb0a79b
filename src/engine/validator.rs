//! Turn Validator
//!
//! Two phases. Drafts get the game's cheap partial check; submissions first
//! pass the engine's structural checks, then the game's full check. A member
//! replacing their own turn in the open round is no longer pending, so
//! replacements skip only that check.

use tracing::debug;

use crate::engine::definition::{GameDefinition, ValidateContext};
use crate::engine::errors::{codes, ValidationError, ValidationResult};
use crate::engine::types::{Member, RoundIndexDecision, Turn};

/// Engine-level checks that do not depend on game rules.
pub fn check_structure<T>(
    decision: &RoundIndexDecision,
    turn: &Turn<T>,
    members: &[Member],
    complete: bool,
) -> ValidationResult {
    check_replacement(decision, turn, members, complete)?;
    if !decision.is_pending(&turn.player_id) {
        return Err(ValidationError::new(
            codes::NOT_YOUR_TURN,
            "no turn is owed from you right now",
        ));
    }
    Ok(())
}

/// Structural checks for a member replacing their stored turn in the open
/// round: membership, completion and round, but not pending.
pub fn check_replacement<T>(
    decision: &RoundIndexDecision,
    turn: &Turn<T>,
    members: &[Member],
    complete: bool,
) -> ValidationResult {
    if !members.iter().any(|m| m.id == turn.player_id) {
        return Err(ValidationError::new(
            codes::NOT_A_MEMBER,
            format!("{} is not seated at this table", turn.player_id),
        ));
    }
    if complete {
        return Err(ValidationError::new(
            codes::GAME_COMPLETE,
            "the game is over",
        ));
    }
    if turn.round_index != decision.round_index {
        return Err(ValidationError::new(
            codes::WRONG_ROUND,
            format!(
                "round {} is open, not round {}",
                decision.round_index, turn.round_index
            ),
        )
        .with_data(serde_json::json!({ "openRound": decision.round_index })));
    }
    Ok(())
}

/// Full validation of a submission against the author's projected state.
pub fn validate_full<G: GameDefinition>(
    game: &G,
    player_state: &G::PlayerState,
    turn: &Turn<G::TurnData>,
    round_index: u32,
    members: &[Member],
) -> ValidationResult {
    let result = game.validate_turn(&ValidateContext {
        player_state,
        player_id: &turn.player_id,
        data: &turn.data,
        round_index,
        members,
    });
    if let Err(err) = &result {
        debug!(
            game = G::NAME,
            player = %turn.player_id,
            round_index,
            code = %err.code,
            "turn rejected"
        );
    }
    result
}

/// Partial validation of a draft.
pub fn validate_draft<G: GameDefinition>(
    game: &G,
    player_state: &G::PlayerState,
    turn: &Turn<G::TurnData>,
    round_index: u32,
    members: &[Member],
) -> ValidationResult {
    game.validate_partial_turn(&ValidateContext {
        player_state,
        player_id: &turn.player_id,
        data: &turn.data,
        round_index,
        members,
    })
}
