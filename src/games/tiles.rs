//! Tiles
//!
//! A colour and shape matching game on an open board. Every member holds six
//! tiles and each round either places a straight run of tiles, swaps tiles
//! with the bag, or passes. Placements from all members resolve together:
//!
//! 1. Tiles from different members on one cell destroy each other
//! 2. Remaining placements apply in player-id order against the board as it
//!    grows; a placement no longer legal returns to its owner's hand
//! 3. Hands refill from the bag in player-id order using the round stream
//!
//! A line scores its length, plus six for completing a line of six.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::coord::{entries, Coord};
use crate::core::rng::DeterministicRng;
use crate::engine::conflict::{resolve_arrivals, Landing};
use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{GameStatus, PlayerId, SystemMessage};

/// Distinct colours.
pub const COLORS: u8 = 6;
/// Distinct shapes.
pub const SHAPES: u8 = 6;
/// Copies of each tile in the bag.
pub const COPIES: usize = 3;
/// Tiles held per member.
pub const HAND_SIZE: usize = 6;
/// Longest legal line, and the bonus for completing one.
pub const MAX_LINE: usize = 6;

// =============================================================================
// TYPES
// =============================================================================

/// Rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tiles;

/// A tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    /// 0..COLORS
    pub color: u8,
    /// 0..SHAPES
    pub shape: u8,
}

impl Tile {
    /// Create a tile.
    pub const fn new(color: u8, shape: u8) -> Self {
        Self { color, shape }
    }
}

/// Full bag contents, unshuffled.
pub fn full_bag() -> Vec<Tile> {
    let mut bag = Vec::with_capacity(COLORS as usize * SHAPES as usize * COPIES);
    for _ in 0..COPIES {
        for color in 0..COLORS {
            for shape in 0..SHAPES {
                bag.push(Tile::new(color, shape));
            }
        }
    }
    bag
}

/// One tile placed on one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Cell
    pub at: Coord,
    /// Tile from hand
    pub tile: Tile,
}

/// A submitted turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TilesTurn {
    /// Lay a straight run
    Place {
        /// Tiles and cells
        placements: Vec<Placement>,
    },
    /// Trade tiles with the bag
    Swap {
        /// Tiles returned
        tiles: Vec<Tile>,
    },
    /// Do nothing
    Pass,
}

/// What happened to placements in the last closed round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReport {
    /// Cells where tiles from several members met
    pub destroyed: Vec<Coord>,
    /// Members whose placement went back to hand
    pub bounced: Vec<PlayerId>,
    /// Points scored per member
    pub scored: BTreeMap<PlayerId, u32>,
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesState {
    /// Placed tiles
    #[serde(with = "entries")]
    pub board: BTreeMap<Coord, Tile>,
    /// Undrawn tiles
    pub bag: Vec<Tile>,
    /// Tiles held per member
    pub hands: BTreeMap<PlayerId, Vec<Tile>>,
    /// Running totals
    pub scores: BTreeMap<PlayerId, u32>,
    /// Whether every member passed in the last round
    pub all_passed: bool,
    /// Outcome of the last round
    pub last_round: RoundReport,
}

/// Turn as the table sees it. Swapped tiles stay private.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicTilesTurn {
    /// Tiles laid
    Placed {
        /// Tiles and cells
        placements: Vec<Placement>,
    },
    /// Tiles traded
    Swapped {
        /// How many
        count: usize,
    },
    /// Nothing
    Passed,
}

/// One member's view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesView {
    /// Placed tiles, with any draft overlaid
    #[serde(with = "entries")]
    pub board: BTreeMap<Coord, Tile>,
    /// Own tiles
    pub hand: Vec<Tile>,
    /// Tiles held per member
    pub hand_counts: BTreeMap<PlayerId, usize>,
    /// Tiles left in the bag
    pub bag_count: usize,
    /// Running totals
    pub scores: BTreeMap<PlayerId, u32>,
    /// Outcome of the last round
    pub last_round: RoundReport,
    /// Own turn for the open round, submitted or drafted
    pub pending: Option<TilesTurn>,
}

// =============================================================================
// RULES
// =============================================================================

/// Contiguous tiles through `at` along `step`, `at` included.
fn line_through(board: &BTreeMap<Coord, Tile>, at: Coord, step: (i32, i32)) -> Vec<Tile> {
    let mut start = at;
    while board.contains_key(&start.offset(-step.0, -step.1)) {
        start = start.offset(-step.0, -step.1);
    }
    let mut tiles = Vec::new();
    let mut cursor = start;
    while let Some(tile) = board.get(&cursor) {
        tiles.push(*tile);
        cursor = cursor.offset(step.0, step.1);
    }
    tiles
}

/// One shared attribute, the other all different, at most six long.
fn valid_line(tiles: &[Tile]) -> bool {
    if tiles.len() > MAX_LINE {
        return false;
    }
    if tiles.len() < 2 {
        return true;
    }
    let colors: BTreeSet<u8> = tiles.iter().map(|t| t.color).collect();
    let shapes: BTreeSet<u8> = tiles.iter().map(|t| t.shape).collect();
    (colors.len() == 1 && shapes.len() == tiles.len())
        || (shapes.len() == 1 && colors.len() == tiles.len())
}

fn line_score(tiles: &[Tile]) -> u32 {
    match tiles.len() {
        0 | 1 => 0,
        n if n == MAX_LINE => (n + MAX_LINE) as u32,
        n => n as u32,
    }
}

/// Check a run against `board` and score it.
pub fn score_placement(board: &BTreeMap<Coord, Tile>, placements: &[Placement]) -> Result<u32, ValidationError> {
    let Some(first) = placements.first() else {
        return Err(ValidationError::new("EMPTY_PLACEMENT", "place at least one tile"));
    };

    let cells: BTreeSet<Coord> = placements.iter().map(|p| p.at).collect();
    if cells.len() != placements.len() {
        return Err(ValidationError::new("SAME_CELL", "two tiles on one cell"));
    }
    if let Some(taken) = cells.iter().find(|c| board.contains_key(*c)) {
        return Err(ValidationError::new("CELL_TAKEN", format!("{taken} is already filled")));
    }

    let same_row = placements.iter().all(|p| p.at.y == first.at.y);
    let same_col = placements.iter().all(|p| p.at.x == first.at.x);
    if !same_row && !same_col {
        return Err(ValidationError::new("NOT_IN_LINE", "tiles must share a row or column"));
    }

    let mut trial = board.clone();
    trial.extend(placements.iter().map(|p| (p.at, p.tile)));

    let main: (i32, i32) = if same_row { (1, 0) } else { (0, 1) };
    let cross = (main.1, main.0);
    let (lo, hi) = (cells.iter().next(), cells.iter().next_back());
    if let (Some(lo), Some(hi)) = (lo, hi) {
        let mut cursor = *lo;
        while cursor != *hi {
            cursor = cursor.offset(main.0, main.1);
            if !trial.contains_key(&cursor) {
                return Err(ValidationError::new("GAP", format!("{cursor} leaves a gap in the run")));
            }
        }
    }

    if board.is_empty() {
        if !cells.contains(&Coord::new(0, 0)) {
            return Err(ValidationError::new("MUST_COVER_ORIGIN", "the first run must cover (0, 0)"));
        }
    } else {
        let touches = cells
            .iter()
            .flat_map(|c| c.neighbors4())
            .any(|n| board.contains_key(&n));
        if !touches {
            return Err(ValidationError::new("NOT_CONNECTED", "the run must touch placed tiles"));
        }
    }

    let mut lines = vec![line_through(&trial, first.at, main)];
    lines.extend(placements.iter().map(|p| line_through(&trial, p.at, cross)));
    if let Some(bad) = lines.iter().find(|line| !valid_line(line)) {
        return Err(ValidationError::new(
            "BAD_LINE",
            format!("a line of {} tiles does not match", bad.len()),
        ));
    }

    let score: u32 = lines.iter().map(|line| line_score(line)).sum();
    Ok(score.max(1))
}

/// Remove `tiles` from `hand` as a multiset. False leaves `hand` unchanged.
fn take_tiles(hand: &mut Vec<Tile>, tiles: &[Tile]) -> bool {
    let mut remaining = hand.clone();
    for tile in tiles {
        match remaining.iter().position(|t| t == tile) {
            Some(i) => {
                remaining.remove(i);
            }
            None => return false,
        }
    }
    *hand = remaining;
    true
}

fn draw(bag: &mut Vec<Tile>, rng: &mut DeterministicRng) -> Option<Tile> {
    if bag.is_empty() {
        return None;
    }
    let i = rng.next_below(bag.len() as u64) as usize;
    Some(bag.swap_remove(i))
}

fn turn_tiles(turn: &TilesTurn) -> Vec<Tile> {
    match turn {
        TilesTurn::Place { placements } => placements.iter().map(|p| p.tile).collect(),
        TilesTurn::Swap { tiles } => tiles.clone(),
        TilesTurn::Pass => Vec::new(),
    }
}

impl GameDefinition for Tiles {
    type GlobalState = TilesState;
    type PlayerState = TilesView;
    type TurnData = TilesTurn;
    type PublicTurnData = PublicTilesTurn;

    const NAME: &'static str = "tiles";
    const MIN_PLAYERS: usize = 2;
    const MAX_PLAYERS: usize = 4;

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        let mut hand = ctx.player_state.hand.clone();
        if !take_tiles(&mut hand, &turn_tiles(ctx.data)) {
            return Err(ValidationError::new("NOT_IN_HAND", "those tiles are not all in your hand"));
        }
        if let TilesTurn::Place { placements } = ctx.data {
            if let Some(p) = placements.iter().find(|p| ctx.player_state.board.contains_key(&p.at)) {
                return Err(ValidationError::new("CELL_TAKEN", format!("{} is already filled", p.at)));
            }
        }
        Ok(())
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        match ctx.data {
            TilesTurn::Place { placements } => score_placement(&ctx.player_state.board, placements).map(|_| ()),
            TilesTurn::Swap { tiles } => {
                if tiles.is_empty() {
                    return Err(ValidationError::new("EMPTY_SWAP", "swap at least one tile"));
                }
                if tiles.len() > ctx.player_state.bag_count {
                    return Err(ValidationError::new(
                        "BAG_TOO_SMALL",
                        format!("only {} tiles left in the bag", ctx.player_state.bag_count),
                    )
                    .with_data(serde_json::json!({ "bagCount": ctx.player_state.bag_count })));
                }
                Ok(())
            }
            TilesTurn::Pass => Ok(()),
        }
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<TilesState, ContractViolation> {
        let mut bag = full_bag();
        ctx.rng.shuffle(&mut bag);

        let mut hands = BTreeMap::new();
        for member in ctx.members {
            let split = bag.len().saturating_sub(HAND_SIZE);
            let mut hand = bag.split_off(split);
            hand.sort();
            hands.insert(member.id.clone(), hand);
        }
        Ok(TilesState {
            board: BTreeMap::new(),
            bag,
            hands,
            scores: ctx.members.iter().map(|m| (m.id.clone(), 0)).collect(),
            all_passed: false,
            last_round: RoundReport::default(),
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> TilesView {
        let state = ctx.state;
        TilesView {
            board: state.board.clone(),
            hand: state.hands.get(ctx.player_id).cloned().unwrap_or_default(),
            hand_counts: state.hands.iter().map(|(id, h)| (id.clone(), h.len())).collect(),
            bag_count: state.bag.len(),
            scores: state.scores.clone(),
            last_round: state.last_round.clone(),
            pending: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.clone()),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> TilesView {
        let mut view = ctx.player_state.clone();
        take_tiles(&mut view.hand, &turn_tiles(ctx.data));
        if let TilesTurn::Place { placements } = ctx.data {
            for p in placements {
                view.board.entry(p.at).or_insert(p.tile);
            }
        }
        view.pending = Some(ctx.data.clone());
        view
    }

    /// Turns apply in player-id order, so when two runs conflict the lower
    /// id scores and the later run goes back to its hand.
    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<TilesState, ContractViolation> {
        let mut next = ctx.state.clone();
        let mut report = RoundReport::default();

        for turn in &ctx.round.turns {
            let hand = next
                .hands
                .get_mut(&turn.player_id)
                .ok_or_else(|| ContractViolation::new(format!("{} has no hand", turn.player_id)))?;
            if !take_tiles(hand, &turn_tiles(&turn.data)) {
                return Err(ContractViolation::new(format!(
                    "{} used tiles they do not hold",
                    turn.player_id
                )));
            }
        }

        // Same-cell placements from different members
        let arrivals = ctx.round.turns.iter().flat_map(|turn| match &turn.data {
            TilesTurn::Place { placements } => placements
                .iter()
                .map(|p| (turn.player_id.clone(), p.at))
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        });
        let resolution = resolve_arrivals(arrivals, |_| None, |_| 0u8);
        let destroyed: BTreeSet<Coord> = resolution
            .landings
            .iter()
            .filter(|(_, landing)| matches!(landing, Landing::Destroyed { .. }))
            .map(|(at, _)| *at)
            .collect();
        report.destroyed = destroyed.iter().copied().collect();

        for turn in &ctx.round.turns {
            let TilesTurn::Place { placements } = &turn.data else {
                continue;
            };
            let surviving: Vec<Placement> = placements
                .iter()
                .filter(|p| !destroyed.contains(&p.at))
                .cloned()
                .collect();
            if surviving.is_empty() {
                continue;
            }
            match score_placement(&next.board, &surviving) {
                Ok(points) => {
                    next.board.extend(surviving.iter().map(|p| (p.at, p.tile)));
                    *next.scores.entry(turn.player_id.clone()).or_insert(0) += points;
                    report.scored.insert(turn.player_id.clone(), points);
                }
                Err(_) => {
                    if let Some(hand) = next.hands.get_mut(&turn.player_id) {
                        hand.extend(surviving.iter().map(|p| p.tile));
                    }
                    report.bounced.push(turn.player_id.clone());
                }
            }
        }

        // Swaps draw before their tiles go back in the bag
        for turn in &ctx.round.turns {
            if let TilesTurn::Swap { tiles } = &turn.data {
                let mut drawn = Vec::with_capacity(tiles.len());
                for _ in tiles {
                    drawn.extend(draw(&mut next.bag, ctx.rng));
                }
                if let Some(hand) = next.hands.get_mut(&turn.player_id) {
                    hand.extend(drawn);
                }
                next.bag.extend(tiles.iter().copied());
            }
        }

        for (_, hand) in next.hands.iter_mut() {
            while hand.len() < HAND_SIZE {
                match draw(&mut next.bag, ctx.rng) {
                    Some(tile) => hand.push(tile),
                    None => break,
                }
            }
            hand.sort();
        }

        // Emptying a hand once the bag is dry ends the game with a bonus
        if next.bag.is_empty() {
            for (id, hand) in &next.hands {
                if hand.is_empty() && !ctx.state.hands.get(id).is_some_and(Vec::is_empty) {
                    *next.scores.entry(id.clone()).or_insert(0) += MAX_LINE as u32;
                }
            }
        }

        next.all_passed = !ctx.round.turns.is_empty()
            && ctx.round.turns.iter().all(|t| t.data == TilesTurn::Pass);
        next.last_round = report;
        Ok(next)
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> PublicTilesTurn {
        match &ctx.turn.data {
            TilesTurn::Place { placements } => PublicTilesTurn::Placed {
                placements: placements.clone(),
            },
            TilesTurn::Swap { tiles } => PublicTilesTurn::Swapped { count: tiles.len() },
            TilesTurn::Pass => PublicTilesTurn::Passed,
        }
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        let state = ctx.state;
        let out = state.bag.is_empty() && state.hands.values().any(Vec::is_empty);
        if !out && !state.all_passed {
            return GameStatus::Active;
        }
        let best = state.scores.values().copied().max();
        GameStatus::complete(
            state
                .scores
                .iter()
                .filter(|(_, score)| Some(**score) == best)
                .map(|(id, _)| id.clone())
                .collect(),
        )
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        let report = &ctx.next.last_round;
        let mut messages: Vec<SystemMessage> = report
            .destroyed
            .iter()
            .map(|at| SystemMessage::new(format!("tiles collided at {at}")))
            .collect();
        messages.extend(report.bounced.iter().map(|id| {
            SystemMessage::about(id.clone(), format!("{id}'s tiles no longer fit and returned to hand"))
        }));
        messages
    }
}

// =============================================================================
// TESTS
// =============================================================================
