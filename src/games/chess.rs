//! Simultaneous Chess
//!
//! Two members, one move each per round, both revealed and resolved at once.
//! Seat 0 plays White from rows 0 and 1; seat 1 plays Black from rows 6
//! and 7.
//!
//! Resolution:
//! 1. Sliding paths that cross stop at their first shared cell
//! 2. Two pieces landing on one cell destroy each other
//! 3. A piece landing on a stationary enemy captures it; an enemy that moved
//!    away is not captured
//! 4. Pawns reaching the far rank promote
//!
//! Capturing the enemy king wins. Both kings falling in one round is a draw.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::coord::{entries, Coord};
use crate::engine::conflict::{resolve_arrivals, truncate_paths, Capture, Landing};
use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{seat_of, GameStatus, Member, PlayerId, SystemMessage};

/// Board side length.
pub const BOARD_SIZE: i32 = 8;

const BACK_RANK: [Kind; 8] = [
    Kind::Rook,
    Kind::Knight,
    Kind::Bishop,
    Kind::Queen,
    Kind::King,
    Kind::Bishop,
    Kind::Knight,
    Kind::Rook,
];

// =============================================================================
// TYPES
// =============================================================================

/// Rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chess {
    /// Rounds before the game is called a draw
    pub max_rounds: u32,
}

impl Default for Chess {
    fn default() -> Self {
        Self { max_rounds: 150 }
    }
}

/// Army colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    /// Seat 0
    White,
    /// Seat 1
    Black,
}

impl Side {
    /// Side played from `seat`.
    pub fn of_seat(seat: usize) -> Option<Self> {
        match seat {
            0 => Some(Self::White),
            1 => Some(Self::Black),
            _ => None,
        }
    }

    fn seat(self) -> usize {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }

    fn forward(self) -> i32 {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    fn back_rank(self) -> i32 {
        match self {
            Self::White => 0,
            Self::Black => BOARD_SIZE - 1,
        }
    }

    fn pawn_rank(self) -> i32 {
        self.back_rank() + self.forward()
    }

    fn promotion_rank(self) -> i32 {
        match self {
            Self::White => BOARD_SIZE - 1,
            Self::Black => 0,
        }
    }
}

/// Piece type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    /// Pawn
    Pawn,
    /// Knight
    Knight,
    /// Bishop
    Bishop,
    /// Rook
    Rook,
    /// Queen
    Queen,
    /// King
    King,
}

/// A piece with a stable identity for capture credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Assigned at setup, never reused
    pub id: u32,
    /// Owner colour
    pub side: Side,
    /// Current type; pawns change on promotion
    pub kind: Kind,
}

/// One move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Origin square
    pub from: Coord,
    /// Destination square
    pub to: Coord,
    /// Promotion choice; queen when omitted
    #[serde(default)]
    pub promotion: Option<Kind>,
}

impl Move {
    /// Move without promotion.
    pub fn new(from: Coord, to: Coord) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessState {
    /// Occupied squares
    #[serde(with = "entries")]
    pub board: BTreeMap<Coord, Piece>,
    /// Capture credits by piece id, oldest round first
    pub captures: Vec<Capture<u32>>,
    /// Pieces removed from the board, oldest first
    pub taken: Vec<Piece>,
    /// Rounds closed so far
    pub rounds_played: u32,
}

impl ChessState {
    fn has_king(&self, side: Side) -> bool {
        self.board
            .values()
            .any(|p| p.side == side && p.kind == Kind::King)
    }
}

/// What one member sees. The board is public; only the pending move is
/// private.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessView {
    /// Viewer's colour
    pub side: Option<Side>,
    /// Occupied squares
    #[serde(with = "entries")]
    pub board: BTreeMap<Coord, Piece>,
    /// Pieces removed so far
    pub taken: Vec<Piece>,
    /// Rounds closed so far
    pub rounds_played: u32,
    /// Own move for the open round, submitted or drafted
    pub pending_move: Option<Move>,
}

// =============================================================================
// RULES
// =============================================================================

fn on_board(at: Coord) -> bool {
    (0..BOARD_SIZE).contains(&at.x) && (0..BOARD_SIZE).contains(&at.y)
}

fn side_of(members: &[Member], player_id: &PlayerId) -> Option<Side> {
    seat_of(members, player_id).and_then(Side::of_seat)
}

/// Whether `piece` can geometrically travel from `from` to `to`, ignoring
/// other pieces.
fn reaches(piece: &Piece, from: Coord, to: Coord) -> bool {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    match piece.kind {
        Kind::Pawn => {
            let f = piece.side.forward();
            (dx == 0 && dy == f)
                || (dx == 0 && dy == 2 * f && from.y == piece.side.pawn_rank())
                || (dx.abs() == 1 && dy == f)
        }
        Kind::Knight => matches!((dx.abs(), dy.abs()), (1, 2) | (2, 1)),
        Kind::Bishop => dx != 0 && dx.abs() == dy.abs(),
        Kind::Rook => (dx == 0) != (dy == 0),
        Kind::Queen => from.straight_step(to).is_some(),
        Kind::King => from.chebyshev(to) == 1,
    }
}

/// Squares entered on the way, destination last.
fn travel_path(kind: Kind, from: Coord, to: Coord) -> Vec<Coord> {
    match kind {
        Kind::Knight => vec![to],
        _ => from.line_to(to),
    }
}

fn promoted_kind(piece: &Piece, to: Coord, choice: Option<Kind>) -> Kind {
    if piece.kind == Kind::Pawn && to.y == piece.side.promotion_rank() {
        choice.unwrap_or(Kind::Queen)
    } else {
        piece.kind
    }
}

fn piece_name(piece: &Piece) -> String {
    format!("{:?} {:?}", piece.side, piece.kind).to_lowercase()
}

impl GameDefinition for Chess {
    type GlobalState = ChessState;
    type PlayerState = ChessView;
    type TurnData = Move;
    type PublicTurnData = Move;

    const NAME: &'static str = "chess";
    const MIN_PLAYERS: usize = 2;
    const MAX_PLAYERS: usize = 2;

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        let mv = ctx.data;
        let side = ctx
            .player_state
            .side
            .ok_or_else(|| ValidationError::new("NO_SIDE", "you are not playing a colour"))?;
        if !on_board(mv.from) || !on_board(mv.to) || mv.from == mv.to {
            return Err(ValidationError::new(
                "OFF_BOARD",
                format!("{} to {} is not a move on the board", mv.from, mv.to),
            ));
        }
        let piece = match ctx.player_state.board.get(&mv.from) {
            Some(piece) if piece.side == side => piece,
            _ => {
                return Err(ValidationError::new(
                    "NOT_YOUR_PIECE",
                    format!("you have no piece on {}", mv.from),
                ))
            }
        };
        if !reaches(piece, mv.from, mv.to) {
            return Err(ValidationError::new(
                "ILLEGAL_MOVE",
                format!("a {:?} cannot move from {} to {}", piece.kind, mv.from, mv.to),
            ));
        }
        let promotes = piece.kind == Kind::Pawn && mv.to.y == side.promotion_rank();
        match mv.promotion {
            Some(_) if !promotes => Err(ValidationError::new(
                "BAD_PROMOTION",
                "only a pawn reaching the far rank promotes",
            )),
            Some(Kind::Pawn | Kind::King) => Err(ValidationError::new(
                "BAD_PROMOTION",
                "promote to a knight, bishop, rook or queen",
            )),
            _ => Ok(()),
        }
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        let mv = ctx.data;
        let board = &ctx.player_state.board;
        let Some(piece) = board.get(&mv.from) else {
            return Err(ValidationError::new("NOT_YOUR_PIECE", "no piece to move"));
        };

        let path = travel_path(piece.kind, mv.from, mv.to);
        if let Some(blocker) = path[..path.len().saturating_sub(1)]
            .iter()
            .find(|cell| board.contains_key(*cell))
        {
            return Err(ValidationError::new(
                "PATH_BLOCKED",
                format!("{blocker} is in the way"),
            ));
        }

        let target = board.get(&mv.to);
        if target.is_some_and(|t| t.side == piece.side) {
            return Err(ValidationError::new(
                "OWN_PIECE",
                format!("your own piece stands on {}", mv.to),
            ));
        }
        if piece.kind == Kind::Pawn {
            let diagonal = mv.from.x != mv.to.x;
            if diagonal && target.is_none() {
                return Err(ValidationError::new(
                    "PAWN_CAPTURE",
                    "pawns move diagonally only to capture",
                ));
            }
            if !diagonal && target.is_some() {
                return Err(ValidationError::new(
                    "PAWN_CAPTURE",
                    "pawns cannot capture straight ahead",
                ));
            }
        }
        Ok(())
    }

    fn initial_global_state(&self, _ctx: SetupContext<'_>) -> Result<ChessState, ContractViolation> {
        let mut board = BTreeMap::new();
        let mut next_id = 0;
        for side in [Side::White, Side::Black] {
            for (x, kind) in BACK_RANK.iter().enumerate() {
                let x = x as i32;
                board.insert(Coord::new(x, side.back_rank()), Piece {
                    id: next_id,
                    side,
                    kind: *kind,
                });
                board.insert(Coord::new(x, side.pawn_rank()), Piece {
                    id: next_id + 1,
                    side,
                    kind: Kind::Pawn,
                });
                next_id += 2;
            }
        }
        Ok(ChessState {
            board,
            captures: Vec::new(),
            taken: Vec::new(),
            rounds_played: 0,
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> ChessView {
        ChessView {
            side: side_of(ctx.members, ctx.player_id),
            board: ctx.state.board.clone(),
            taken: ctx.state.taken.clone(),
            rounds_played: ctx.state.rounds_played,
            pending_move: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.clone()),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> ChessView {
        let mut view = ctx.player_state.clone();
        let mv = ctx.data;
        if let Some(mut piece) = view.board.remove(&mv.from) {
            piece.kind = promoted_kind(&piece, mv.to, mv.promotion);
            view.board.insert(mv.to, piece);
        }
        view.pending_move = Some(mv.clone());
        view
    }

    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<ChessState, ContractViolation> {
        let state = ctx.state;
        let mut movers: BTreeMap<u32, (Piece, &Move)> = BTreeMap::new();
        let mut paths = BTreeMap::new();

        for turn in &ctx.round.turns {
            let mv = &turn.data;
            let side = side_of(ctx.members, &turn.player_id).ok_or_else(|| {
                ContractViolation::new(format!("{} has no colour", turn.player_id))
            })?;
            let piece = state
                .board
                .get(&mv.from)
                .filter(|p| p.side == side)
                .ok_or_else(|| {
                    ContractViolation::new(format!(
                        "{} moved from {} without a piece there",
                        turn.player_id, mv.from
                    ))
                })?;
            let path = travel_path(piece.kind, mv.from, mv.to);
            if path.is_empty() {
                return Err(ContractViolation::new(format!(
                    "{} to {} is not a line",
                    mv.from, mv.to
                )));
            }
            paths.insert(piece.id, path);
            movers.insert(piece.id, (*piece, mv));
        }

        let paths = truncate_paths(&paths);
        let arrivals = paths
            .iter()
            .filter_map(|(id, path)| path.last().map(|dest| (*id, *dest)));
        let resolution = resolve_arrivals(
            arrivals,
            |dest| {
                state
                    .board
                    .get(dest)
                    .filter(|p| !movers.contains_key(&p.id))
                    .map(|p| p.id)
            },
            |_| 0u8,
        );

        let mut next = state.clone();
        for (_, mv) in movers.values() {
            next.board.remove(&mv.from);
        }

        for (dest, landing) in &resolution.landings {
            let displaced = match landing {
                Landing::Claimed { displaced, .. } | Landing::Destroyed { displaced, .. } => {
                    *displaced
                }
            };
            if displaced.is_some() {
                if let Some(victim) = next.board.remove(dest) {
                    next.taken.push(victim);
                }
            }
            match landing {
                Landing::Claimed { by, .. } => {
                    if let Some((piece, mv)) = movers.get(by) {
                        let mut piece = *piece;
                        piece.kind = promoted_kind(&piece, *dest, mv.promotion);
                        next.board.insert(*dest, piece);
                    }
                }
                Landing::Destroyed { arrivals, .. } => {
                    next.taken
                        .extend(arrivals.iter().filter_map(|id| movers.get(id).map(|(p, _)| *p)));
                }
            }
        }

        next.captures.extend(resolution.captures);
        next.rounds_played += 1;
        Ok(next)
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> Move {
        ctx.turn.data.clone()
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        let state = ctx.state;
        let player = |side: Side| ctx.members.get(side.seat()).map(|m| m.id.clone());

        match (state.has_king(Side::White), state.has_king(Side::Black)) {
            (false, false) => GameStatus::complete(Vec::new()),
            (true, false) => GameStatus::complete(player(Side::White).into_iter().collect()),
            (false, true) => GameStatus::complete(player(Side::Black).into_iter().collect()),
            (true, true) if state.rounds_played >= self.max_rounds => {
                GameStatus::complete(Vec::new())
            }
            (true, true) => GameStatus::Active,
        }
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        let mut messages: Vec<SystemMessage> = ctx
            .next
            .taken
            .get(ctx.previous.taken.len()..)
            .unwrap_or_default()
            .iter()
            .map(|piece| SystemMessage::new(format!("{} was taken", piece_name(piece))))
            .collect();

        let before: BTreeMap<u32, Kind> = ctx.previous.board.values().map(|p| (p.id, p.kind)).collect();
        let promoted: BTreeSet<String> = ctx
            .next
            .board
            .values()
            .filter(|p| before.get(&p.id).is_some_and(|kind| *kind != p.kind))
            .map(|p| format!("{:?} pawn promoted to {:?}", p.side, p.kind).to_lowercase())
            .collect();
        messages.extend(promoted.into_iter().map(SystemMessage::new));
        messages
    }
}

// =============================================================================
// TESTS
// =============================================================================
