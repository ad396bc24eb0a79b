//! Player View Projector
//!
//! Restricted views of global state. The optimistic view overlays a local
//! draft on a confirmed projection and is thrown away when the draft is.

use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext,
};
use crate::engine::types::{Member, PlayerId, Round, Turn};

/// Projection of `state` (the start of `round_index`) for one member.
pub fn player_view<G: GameDefinition>(
    game: &G,
    state: &G::GlobalState,
    player_id: &PlayerId,
    round_index: u32,
    open_round: Option<&Round<G::TurnData>>,
    members: &[Member],
) -> G::PlayerState {
    game.player_state(&PlayerStateContext {
        state,
        player_id,
        round_index,
        open_round,
        members,
    })
}

/// Projection with an unsubmitted draft applied for its author only.
pub fn optimistic_view<G: GameDefinition>(
    game: &G,
    player_state: &G::PlayerState,
    draft: &G::TurnData,
    player_id: &PlayerId,
    members: &[Member],
) -> G::PlayerState {
    game.prospective_player_state(&ProspectiveContext {
        player_state,
        player_id,
        data: draft,
        members,
    })
}

/// Redacted view of a turn from a closed round.
pub fn public_turn<G: GameDefinition>(
    game: &G,
    turn: &Turn<G::TurnData>,
    state: &G::GlobalState,
    members: &[Member],
) -> G::PublicTurnData {
    game.public_turn(&PublicTurnContext {
        turn,
        state,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reducer;
    use crate::engine::testing::{members, Counter};

    #[test]
    fn test_open_round_shows_own_turn_only() {
        let members = members(2);
        let state = reducer::initial_state(&Counter, &members, "seed").unwrap();
        let open = Round::from_turns(0, vec![Turn::new("p0", 0, 4), Turn::new("p1", 0, 7)]);

        let view = player_view(&Counter, &state, &PlayerId::from("p0"), 0, Some(&open), &members);
        assert_eq!(view.submitted, Some(4));
        assert_eq!(view.mine, 0);
    }

    #[test]
    fn test_optimistic_view_leaves_input_untouched() {
        let members = members(2);
        let state = reducer::initial_state(&Counter, &members, "seed").unwrap();
        let player = PlayerId::from("p1");
        let confirmed = player_view(&Counter, &state, &player, 0, None, &members);
        let snapshot = confirmed.clone();

        let draft = optimistic_view(&Counter, &confirmed, &3, &player, &members);
        assert_eq!(draft.mine, 3);
        assert_eq!(confirmed, snapshot);

        // Abandoning the draft is just dropping the value
        drop(draft);
        assert_eq!(player_view(&Counter, &state, &player, 0, None, &members), snapshot);
    }
}
