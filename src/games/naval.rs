//! Naval
//!
//! Two to four admirals. Round 0 is deployment: every member places a
//! hidden fleet. From round 1 on, every member still afloat fires one shot
//! at a rival's waters each round, all shots landing at once. A member
//! whose every ship is sunk leaves the rotation. The last fleet afloat wins;
//! fleets that sink in the same final round share the win.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::coord::Coord;
use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{GameStatus, Member, PlayerId, SystemMessage};

// =============================================================================
// TYPES
// =============================================================================

/// Rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Naval {
    /// Side length of each member's waters
    pub size: i32,
    /// Ship lengths every fleet must contain
    pub fleet: Vec<u32>,
}

impl Default for Naval {
    fn default() -> Self {
        Self {
            size: 8,
            fleet: vec![4, 3, 3, 2],
        }
    }
}

/// Round phase, a pure function of the round index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Round 0
    Deploy,
    /// Every later round
    Fire,
}

impl Phase {
    /// Phase of `round_index`.
    pub fn of(round_index: u32) -> Self {
        if round_index == 0 {
            Self::Deploy
        } else {
            Self::Fire
        }
    }
}

/// A ship anchored at its bow.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ship {
    /// Top-left cell
    pub bow: Coord,
    /// Cells occupied
    pub length: u32,
    /// Extends along x when true, along y otherwise
    pub horizontal: bool,
}

impl Ship {
    /// Create a ship.
    pub fn new(x: i32, y: i32, length: u32, horizontal: bool) -> Self {
        Self {
            bow: Coord::new(x, y),
            length,
            horizontal,
        }
    }

    /// Occupied cells, bow first.
    pub fn cells(&self) -> Vec<Coord> {
        (0..self.length as i32)
            .map(|i| {
                if self.horizontal {
                    self.bow.offset(i, 0)
                } else {
                    self.bow.offset(0, i)
                }
            })
            .collect()
    }
}

/// A member's ships and the hits taken.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    /// Ships as deployed
    pub ships: Vec<Ship>,
    /// Cells hit so far
    pub hits: BTreeSet<Coord>,
}

impl Fleet {
    /// Whether a shot at `at` strikes a ship.
    pub fn occupies(&self, at: Coord) -> bool {
        self.ships.iter().any(|ship| ship.cells().contains(&at))
    }

    /// Ships with every cell hit.
    pub fn sunk(&self) -> Vec<Ship> {
        self.ships
            .iter()
            .filter(|ship| ship.cells().iter().all(|c| self.hits.contains(c)))
            .cloned()
            .collect()
    }

    /// Deployed and not fully sunk.
    pub fn afloat(&self) -> bool {
        !self.ships.is_empty() && self.sunk().len() < self.ships.len()
    }
}

/// A submitted order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Order {
    /// Round 0: place the fleet
    Deploy {
        /// Ships to place
        ships: Vec<Ship>,
    },
    /// Later rounds: one shot
    Fire {
        /// Rival fired upon
        target: PlayerId,
        /// Cell in the rival's waters
        at: Coord,
    },
}

/// A resolved shot. Public once its round closes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    /// Who fired
    pub shooter: PlayerId,
    /// Whose waters
    pub target: PlayerId,
    /// Cell
    pub at: Coord,
    /// Whether it struck a ship
    pub hit: bool,
    /// Round fired in
    pub round_index: u32,
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavalState {
    /// Fleets per member; empty until deployment closes
    pub fleets: BTreeMap<PlayerId, Fleet>,
    /// Every shot fired, oldest first
    pub shots: Vec<Shot>,
    /// Round each eliminated member went down in
    pub eliminated: BTreeMap<PlayerId, u32>,
    /// Whether deployment has closed
    pub deployed: bool,
}

/// Order as the table sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicOrder {
    /// A fleet was placed; positions stay hidden
    Deployed,
    /// A shot and its result
    Fired {
        /// Rival fired upon
        target: PlayerId,
        /// Cell
        at: Coord,
        /// Whether it struck a ship
        hit: bool,
    },
}

/// One member's view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavalView {
    /// Phase of the open round
    pub phase: Phase,
    /// Side length of each member's waters
    pub size: i32,
    /// Ship lengths required at deployment
    pub fleet_lengths: Vec<u32>,
    /// Own fleet with hits taken
    pub own_fleet: Fleet,
    /// Every resolved shot
    pub shots: Vec<Shot>,
    /// Rival ships revealed by sinking
    pub sunk: BTreeMap<PlayerId, Vec<Ship>>,
    /// Members out of the game
    pub eliminated: Vec<PlayerId>,
    /// Own order for the open round, submitted or drafted
    pub pending_order: Option<Order>,
}

// =============================================================================
// RULES
// =============================================================================

impl Naval {
    fn in_waters(&self, at: Coord) -> bool {
        at.x >= 0 && at.y >= 0 && at.x < self.size && at.y < self.size
    }

    fn check_ship_bounds(&self, ships: &[Ship]) -> ValidationResult {
        for ship in ships {
            if ship.length == 0 || ship.cells().iter().any(|c| !self.in_waters(*c)) {
                return Err(ValidationError::new(
                    "OUT_OF_WATERS",
                    format!("ship at {} leaves the grid", ship.bow),
                ));
            }
        }
        Ok(())
    }
}

impl GameDefinition for Naval {
    type GlobalState = NavalState;
    type PlayerState = NavalView;
    type TurnData = Order;
    type PublicTurnData = PublicOrder;

    const NAME: &'static str = "naval";
    const MIN_PLAYERS: usize = 2;
    const MAX_PLAYERS: usize = 4;

    fn active_players(&self, state: &NavalState, members: &[Member]) -> Vec<PlayerId> {
        members
            .iter()
            .filter(|m| !state.deployed || !state.eliminated.contains_key(&m.id))
            .map(|m| m.id.clone())
            .collect()
    }

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        match ctx.data {
            Order::Deploy { ships } => self.check_ship_bounds(ships),
            Order::Fire { target, at } => {
                if target == ctx.player_id {
                    return Err(ValidationError::new("OWN_WATERS", "pick a rival to fire on"));
                }
                if !self.in_waters(*at) {
                    return Err(ValidationError::new(
                        "OUT_OF_WATERS",
                        format!("{at} is outside the grid"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        let view = ctx.player_state;

        match (Phase::of(ctx.round_index), ctx.data) {
            (Phase::Deploy, Order::Deploy { ships }) => {
                let mut lengths: Vec<u32> = ships.iter().map(|s| s.length).collect();
                let mut required = self.fleet.clone();
                lengths.sort_unstable();
                required.sort_unstable();
                if lengths != required {
                    return Err(ValidationError::new(
                        "FLEET_MISMATCH",
                        format!("deploy ships of lengths {:?}", self.fleet),
                    ));
                }
                let mut occupied = BTreeSet::new();
                for cell in ships.iter().flat_map(Ship::cells) {
                    if !occupied.insert(cell) {
                        return Err(ValidationError::new(
                            "OVERLAP",
                            format!("two ships share {cell}"),
                        ));
                    }
                }
                Ok(())
            }
            (Phase::Fire, Order::Fire { target, at }) => {
                if !ctx.members.iter().any(|m| &m.id == target) {
                    return Err(ValidationError::new("UNKNOWN_TARGET", format!("{target} is not playing")));
                }
                if view.eliminated.contains(target) {
                    return Err(ValidationError::new(
                        "TARGET_SUNK",
                        format!("{target}'s fleet is already sunk"),
                    ));
                }
                let repeated = view
                    .shots
                    .iter()
                    .any(|s| &s.shooter == ctx.player_id && &s.target == target && s.at == *at);
                if repeated {
                    return Err(ValidationError::new(
                        "REPEATED_SHOT",
                        format!("you already fired at {at} in {target}'s waters"),
                    ));
                }
                Ok(())
            }
            (phase, _) => Err(ValidationError::new(
                "WRONG_PHASE",
                format!("this round expects a {phase:?} order"),
            )),
        }
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<NavalState, ContractViolation> {
        if self.fleet.is_empty() {
            return Err(ContractViolation::new("fleet has no ships"));
        }
        Ok(NavalState {
            fleets: ctx
                .members
                .iter()
                .map(|m| (m.id.clone(), Fleet::default()))
                .collect(),
            shots: Vec::new(),
            eliminated: BTreeMap::new(),
            deployed: false,
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> NavalView {
        let state = ctx.state;
        NavalView {
            phase: Phase::of(ctx.round_index),
            size: self.size,
            fleet_lengths: self.fleet.clone(),
            own_fleet: state.fleets.get(ctx.player_id).cloned().unwrap_or_default(),
            shots: state.shots.clone(),
            sunk: state
                .fleets
                .iter()
                .filter(|(id, _)| *id != ctx.player_id)
                .map(|(id, fleet)| (id.clone(), fleet.sunk()))
                .filter(|(_, ships)| !ships.is_empty())
                .collect(),
            eliminated: state.eliminated.keys().cloned().collect(),
            pending_order: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.clone()),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> NavalView {
        let mut view = ctx.player_state.clone();
        if let Order::Deploy { ships } = ctx.data {
            view.own_fleet.ships = ships.clone();
        }
        view.pending_order = Some(ctx.data.clone());
        view
    }

    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<NavalState, ContractViolation> {
        let mut next = ctx.state.clone();
        let round_index = ctx.round.round_index;

        if !ctx.state.deployed {
            for turn in &ctx.round.turns {
                let Order::Deploy { ships } = &turn.data else {
                    return Err(ContractViolation::new(format!(
                        "{} fired before deploying",
                        turn.player_id
                    )));
                };
                next.fleets.insert(
                    turn.player_id.clone(),
                    Fleet {
                        ships: ships.clone(),
                        hits: BTreeSet::new(),
                    },
                );
            }
            if let Some((id, _)) = next.fleets.iter().find(|(_, f)| f.ships.is_empty()) {
                return Err(ContractViolation::new(format!("{id} has no fleet")));
            }
            next.deployed = true;
            return Ok(next);
        }

        // All shots resolve against the fleets as they stood
        let mut landed = Vec::new();
        for turn in &ctx.round.turns {
            let Order::Fire { target, at } = &turn.data else {
                return Err(ContractViolation::new(format!(
                    "{} redeployed after deployment",
                    turn.player_id
                )));
            };
            if ctx.state.eliminated.contains_key(&turn.player_id) {
                return Err(ContractViolation::new(format!(
                    "{} fired after elimination",
                    turn.player_id
                )));
            }
            let fleet = ctx.state.fleets.get(target).ok_or_else(|| {
                ContractViolation::new(format!("{} fired at unknown {target}", turn.player_id))
            })?;
            landed.push(Shot {
                shooter: turn.player_id.clone(),
                target: target.clone(),
                at: *at,
                hit: fleet.occupies(*at),
                round_index,
            });
        }

        for shot in &landed {
            if shot.hit {
                if let Some(fleet) = next.fleets.get_mut(&shot.target) {
                    fleet.hits.insert(shot.at);
                }
            }
        }
        next.shots.extend(landed);

        for (id, fleet) in &next.fleets {
            if !fleet.afloat() && !next.eliminated.contains_key(id) {
                next.eliminated.insert(id.clone(), round_index);
            }
        }
        Ok(next)
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> PublicOrder {
        match &ctx.turn.data {
            Order::Deploy { .. } => PublicOrder::Deployed,
            Order::Fire { target, at } => PublicOrder::Fired {
                target: target.clone(),
                at: *at,
                hit: ctx
                    .state
                    .fleets
                    .get(target)
                    .is_some_and(|fleet| fleet.occupies(*at)),
            },
        }
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        let state = ctx.state;
        if !state.deployed {
            return GameStatus::Active;
        }
        let afloat: Vec<PlayerId> = ctx
            .members
            .iter()
            .filter(|m| !state.eliminated.contains_key(&m.id))
            .map(|m| m.id.clone())
            .collect();

        match afloat.len() {
            0 => {
                let last = state.eliminated.values().copied().max();
                GameStatus::complete(
                    state
                        .eliminated
                        .iter()
                        .filter(|(_, round)| Some(**round) == last)
                        .map(|(id, _)| id.clone())
                        .collect(),
                )
            }
            1 => GameStatus::complete(afloat),
            _ => GameStatus::Active,
        }
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        let mut messages = Vec::new();
        for (id, fleet) in &ctx.next.fleets {
            let before = ctx.previous.fleets.get(id).map_or(0, |f| f.sunk().len());
            let after = fleet.sunk().len();
            if after > before {
                messages.push(SystemMessage::about(
                    id.clone(),
                    format!("{id} lost {} ship(s)", after - before),
                ));
            }
            if ctx.next.eliminated.contains_key(id) && !ctx.previous.eliminated.contains_key(id) {
                messages.push(SystemMessage::about(id.clone(), format!("{id}'s fleet is sunk")));
            }
        }
        messages
    }
}

// =============================================================================
// TESTS
// =============================================================================
