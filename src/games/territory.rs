//! Territory
//!
//! Members deploy power onto a grid simultaneously. Contiguous cells owned by
//! one member form a territory. Deploying onto a cell someone else holds, or
//! onto the same cell as another member, starts a power battle:
//!
//! 1. Each side's power is its deployment plus its supporting territory
//!    (the territory containing the cell, or its territories next to it).
//! 2. Every side loses one unit per pass until at most one has power.
//! 3. Drained cells are cleared; the survivor gains one unit at the cell.
//!
//! Battles resolve in coordinate order against the board as it evolves.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::coord::{Coord, Grid};
use crate::engine::conflict::{resolve_power_battle, Contender};
use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{GameStatus, PlayerId, SystemMessage};

/// Power each member holds in reserve at the start.
pub const STARTING_RESERVE: u32 = 3;

/// Power added to every reserve after each round.
pub const INCOME_PER_ROUND: u32 = 1;

/// Reserve cap.
pub const MAX_RESERVE: u32 = 6;

// =============================================================================
// TYPES
// =============================================================================

/// Rules and board size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Territory {
    /// Board width
    pub width: i32,
    /// Board height
    pub height: i32,
    /// Rounds played before scoring
    pub max_rounds: u32,
}

impl Default for Territory {
    fn default() -> Self {
        Self {
            width: 6,
            height: 6,
            max_rounds: 12,
        }
    }
}

impl Territory {
    /// Custom board.
    pub fn new(width: i32, height: i32, max_rounds: u32) -> Self {
        Self {
            width,
            height,
            max_rounds,
        }
    }
}

/// One board cell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Owner, `None` when neutral
    pub player_id: Option<PlayerId>,
    /// Power stationed here
    pub power: u32,
}

impl Cell {
    /// Owned cell.
    pub fn owned(player_id: PlayerId, power: u32) -> Self {
        Self {
            player_id: Some(player_id),
            power,
        }
    }

    /// Neutral empty cell.
    pub fn empty() -> Self {
        Self::default()
    }

    fn owner(&self) -> Option<&PlayerId> {
        self.player_id.as_ref().filter(|_| self.power > 0)
    }
}

/// Deploy `power` from reserve onto `at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Target cell
    pub at: Coord,
    /// Units deployed
    pub power: u32,
}

/// Record of one contested cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleReport {
    /// Contested cell
    pub at: Coord,
    /// Sides involved, sorted
    pub contenders: Vec<PlayerId>,
    /// Side left holding the cell
    pub survivor: Option<PlayerId>,
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryState {
    /// Board cells
    pub board: Grid<Cell>,
    /// Undeployed power per member
    pub reserves: BTreeMap<PlayerId, u32>,
    /// Battles fought in the last closed round
    pub last_battles: Vec<BattleReport>,
}

impl TerritoryState {
    /// Total power held on the board per member.
    pub fn power_by_owner(&self) -> BTreeMap<PlayerId, u32> {
        let mut totals = BTreeMap::new();
        for (_, cell) in self.board.iter() {
            if let Some(owner) = cell.owner() {
                *totals.entry(owner.clone()).or_insert(0) += cell.power;
            }
        }
        totals
    }
}

/// What one member sees. The board is public.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryView {
    /// Board cells
    pub board: Grid<Cell>,
    /// Every member's reserve
    pub reserves: BTreeMap<PlayerId, u32>,
    /// Own reserve
    pub reserve: u32,
    /// Own placement for the open round, submitted or drafted
    pub placement: Option<Placement>,
    /// Open round
    pub round_index: u32,
}

// =============================================================================
// RULES
// =============================================================================

/// Cells of `owner`'s territory containing `start`.
fn component(board: &Grid<Cell>, owner: &PlayerId, start: Coord) -> BTreeMap<Coord, u32> {
    let mut found = BTreeMap::new();
    let mut stack = vec![start];
    while let Some(at) = stack.pop() {
        if found.contains_key(&at) {
            continue;
        }
        match board.get(at) {
            Some(cell) if cell.owner() == Some(owner) => {
                found.insert(at, cell.power);
                stack.extend(at.neighbors4());
            }
            _ => {}
        }
    }
    found
}

/// Supporting cells for `owner` fighting over `at`.
fn support(board: &Grid<Cell>, owner: &PlayerId, at: Coord) -> BTreeMap<Coord, u32> {
    let mut cells = component(board, owner, at);
    for neighbor in at.neighbors4() {
        for (cell, power) in component(board, owner, neighbor) {
            cells.insert(cell, power);
        }
    }
    cells
}

/// Resolve every deployment at one cell.
fn resolve_cell(
    board: &mut Grid<Cell>,
    at: Coord,
    claims: &BTreeMap<PlayerId, u32>,
) -> Option<BattleReport> {
    let occupant = board.get(at).and_then(|c| c.owner().cloned());

    let mut sides: BTreeSet<PlayerId> = claims.keys().cloned().collect();
    sides.extend(occupant.iter().cloned());

    if sides.len() == 1 {
        let owner = sides.into_iter().next()?;
        let deployed = claims.get(&owner).copied().unwrap_or(0);
        let power = board.get(at).map_or(0, |c| c.power) + deployed;
        board.set(at, Cell::owned(owner, power));
        return None;
    }

    let contenders: Vec<Contender<PlayerId>> = sides
        .iter()
        .map(|owner| Contender {
            owner: owner.clone(),
            reinforcement: claims.get(owner).copied().unwrap_or(0),
            cells: support(board, owner, at),
        })
        .collect();

    let outcome = resolve_power_battle(contenders);

    for contender in &outcome.contenders {
        for (cell, power) in &contender.cells {
            let next = if *power == 0 {
                Cell::empty()
            } else {
                Cell::owned(contender.owner.clone(), *power)
            };
            board.set(*cell, next);
        }
    }

    let captured = match &outcome.survivor {
        Some(survivor) => {
            let held = board
                .get(at)
                .filter(|c| c.owner() == Some(survivor))
                .map_or(0, |c| c.power);
            Cell::owned(survivor.clone(), held + 1)
        }
        None => Cell::empty(),
    };
    board.set(at, captured);

    Some(BattleReport {
        at,
        contenders: sides.into_iter().collect(),
        survivor: outcome.survivor,
    })
}

impl GameDefinition for Territory {
    type GlobalState = TerritoryState;
    type PlayerState = TerritoryView;
    type TurnData = Placement;
    type PublicTurnData = Placement;

    const NAME: &'static str = "territory";
    const MIN_PLAYERS: usize = 2;
    const MAX_PLAYERS: usize = 6;

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        if !ctx.player_state.board.contains(ctx.data.at) {
            return Err(ValidationError::new("OFF_BOARD", format!("{} is off the board", ctx.data.at)));
        }
        if ctx.data.power == 0 {
            return Err(ValidationError::new("NO_POWER", "deploy at least one unit"));
        }
        Ok(())
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        if ctx.data.power > ctx.player_state.reserve {
            return Err(ValidationError::new(
                "RESERVE_EXCEEDED",
                format!("only {} units in reserve", ctx.player_state.reserve),
            )
            .with_data(serde_json::json!({ "reserve": ctx.player_state.reserve })));
        }
        Ok(())
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<TerritoryState, ContractViolation> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ContractViolation::new("board must have at least one cell"));
        }
        Ok(TerritoryState {
            board: Grid::filled(self.width, self.height, Cell::empty()),
            reserves: ctx
                .members
                .iter()
                .map(|m| (m.id.clone(), STARTING_RESERVE))
                .collect(),
            last_battles: Vec::new(),
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> TerritoryView {
        TerritoryView {
            board: ctx.state.board.clone(),
            reserves: ctx.state.reserves.clone(),
            reserve: ctx.state.reserves.get(ctx.player_id).copied().unwrap_or(0),
            placement: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.clone()),
            round_index: ctx.round_index,
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> TerritoryView {
        let mut view = ctx.player_state.clone();
        view.placement = Some(ctx.data.clone());
        view
    }

    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<TerritoryState, ContractViolation> {
        let mut board = ctx.state.board.clone();
        let mut reserves = ctx.state.reserves.clone();

        let mut claims: BTreeMap<Coord, BTreeMap<PlayerId, u32>> = BTreeMap::new();
        for turn in &ctx.round.turns {
            let placement = &turn.data;
            if !board.contains(placement.at) {
                return Err(ContractViolation::new(format!(
                    "placement at {} is off the board",
                    placement.at
                )));
            }
            let reserve = reserves.get_mut(&turn.player_id).ok_or_else(|| {
                ContractViolation::new(format!("no reserve for {}", turn.player_id))
            })?;
            *reserve = reserve.checked_sub(placement.power).ok_or_else(|| {
                ContractViolation::new(format!("{} deployed beyond reserve", turn.player_id))
            })?;
            claims
                .entry(placement.at)
                .or_default()
                .insert(turn.player_id.clone(), placement.power);
        }

        let mut battles = Vec::new();
        for (at, cell_claims) in &claims {
            if let Some(report) = resolve_cell(&mut board, *at, cell_claims) {
                battles.push(report);
            }
        }

        for reserve in reserves.values_mut() {
            *reserve = (*reserve + INCOME_PER_ROUND).min(MAX_RESERVE);
        }

        Ok(TerritoryState {
            board,
            reserves,
            last_battles: battles,
        })
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> Placement {
        ctx.turn.data.clone()
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        let owners: BTreeSet<&PlayerId> = ctx
            .state
            .board
            .iter()
            .map(|(_, cell)| cell.owner())
            .collect::<Option<BTreeSet<_>>>()
            .unwrap_or_default();
        let board_taken = owners.len() == 1;

        if ctx.closed_rounds < self.max_rounds && !board_taken {
            return GameStatus::Active;
        }

        let totals = ctx.state.power_by_owner();
        let best = totals.values().copied().max().unwrap_or(0);
        GameStatus::complete(
            totals
                .into_iter()
                .filter(|(_, power)| *power == best && best > 0)
                .map(|(id, _)| id)
                .collect(),
        )
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        ctx.next
            .last_battles
            .iter()
            .map(|battle| match &battle.survivor {
                Some(survivor) => SystemMessage::about(
                    survivor.clone(),
                    format!("{} holds {} after a battle", survivor, battle.at),
                ),
                None => SystemMessage::new(format!("{} was wiped out", battle.at)),
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
