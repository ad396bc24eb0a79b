//! Hearts
//!
//! Three to five members. Each hand opens with a passing round (every member
//! passes three cards at once) unless the hand holds, followed by one round
//! per trick. Within a trick round members play one at a time in seat order
//! from the leader, so only one seat is pending.
//!
//! ```text
//!  4 members:  hand 0        hand 1        hand 2        hand 3
//!              P T T .. T    P T T .. T    P T T .. T    T T .. T
//!              left          right         across        hold
//! ```
//!
//! Phase depends only on the round index and the member count. Hearts score
//! one point each and the queen of spades thirteen; taking all of them
//! shoots the moon. Play ends once a score reaches the target, and the lowest
//! score wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::rng::DeterministicRng;
use crate::engine::definition::{
    GameDefinition, PendingContext, PlayerStateContext, ProspectiveContext, PublicTurnContext,
    ReduceContext, RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, EngineError, ValidationError, ValidationResult};
use crate::engine::types::{seat_of, GameStatus, Member, PlayerId, SystemMessage};

/// Cards passed in a passing round.
pub const PASS_COUNT: usize = 3;

/// Points available in one hand.
pub const POINTS_PER_HAND: u32 = 26;

// =============================================================================
// CARDS
// =============================================================================

/// Suit, in sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Suit {
    /// Clubs
    Clubs,
    /// Diamonds
    Diamonds,
    /// Spades
    Spades,
    /// Hearts
    Hearts,
}

const SUITS: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Spades, Suit::Hearts];

/// A card. Ranks run 2..=14 with the ace high.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    /// Suit
    pub suit: Suit,
    /// Rank, 11 = jack through 14 = ace
    pub rank: u8,
}

impl Card {
    /// Create a card.
    pub const fn new(suit: Suit, rank: u8) -> Self {
        Self { suit, rank }
    }

    /// Penalty points.
    pub fn points(&self) -> u32 {
        match (self.suit, self.rank) {
            (Suit::Hearts, _) => 1,
            (Suit::Spades, 12) => 13,
            _ => 0,
        }
    }
}

/// Opening lead of every hand.
pub const TWO_OF_CLUBS: Card = Card::new(Suit::Clubs, 2);

/// Deck for `member_count` members, low cards removed so it deals evenly.
pub fn deck(member_count: usize) -> Vec<Card> {
    let removed: &[Card] = match member_count {
        3 => &[Card::new(Suit::Diamonds, 2)],
        5 => &[Card::new(Suit::Diamonds, 2), Card::new(Suit::Spades, 2)],
        _ => &[],
    };
    SUITS
        .iter()
        .flat_map(|suit| (2..=14).map(move |rank| Card::new(*suit, rank)))
        .filter(|card| !removed.contains(card))
        .collect()
}

/// Cards per hand, which is also tricks per hand.
pub fn hand_size(member_count: usize) -> usize {
    deck(member_count).len() / member_count.max(1)
}

/// Shuffle and deal round-robin from seat 0. Hands come back sorted.
pub fn deal(members: &[Member], rng: &mut DeterministicRng) -> BTreeMap<PlayerId, Vec<Card>> {
    if members.is_empty() {
        return BTreeMap::new();
    }
    let mut cards = deck(members.len());
    rng.shuffle(&mut cards);

    let mut hands: BTreeMap<PlayerId, Vec<Card>> =
        members.iter().map(|m| (m.id.clone(), Vec::new())).collect();
    for (i, card) in cards.into_iter().enumerate() {
        if let Some(hand) = hands.get_mut(&members[i % members.len()].id) {
            hand.push(card);
        }
    }
    for hand in hands.values_mut() {
        hand.sort();
    }
    hands
}

// =============================================================================
// PHASES
// =============================================================================

/// Where passed cards go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassDirection {
    /// Next seat
    Left,
    /// Previous seat
    Right,
    /// Two seats on; four members only
    Across,
    /// No passing this hand
    Hold,
}

impl PassDirection {
    /// Direction for hand number `hand`.
    pub fn for_hand(hand: u32, member_count: usize) -> Self {
        if member_count == 4 {
            [Self::Left, Self::Right, Self::Across, Self::Hold][(hand % 4) as usize]
        } else {
            [Self::Left, Self::Right, Self::Hold][(hand % 3) as usize]
        }
    }

    fn target_seat(self, seat: usize, member_count: usize) -> usize {
        match self {
            Self::Left => (seat + 1) % member_count,
            Self::Right => (seat + member_count - 1) % member_count,
            Self::Across => (seat + 2) % member_count,
            Self::Hold => seat,
        }
    }
}

/// What a round is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Everyone passes at once
    #[serde(rename_all = "camelCase")]
    Pass {
        /// Hand number
        hand: u32,
        /// Where cards go
        direction: PassDirection,
    },
    /// One trick, played seat by seat
    #[serde(rename_all = "camelCase")]
    Trick {
        /// Hand number
        hand: u32,
        /// Trick within the hand
        trick: u32,
    },
}

impl Phase {
    /// Phase of `round_index` for `member_count` members.
    pub fn of(round_index: u32, member_count: usize) -> Self {
        let tricks = hand_size(member_count).max(1) as u32;
        let mut start = 0;
        let mut hand = 0;
        loop {
            let direction = PassDirection::for_hand(hand, member_count);
            let passing = u32::from(direction != PassDirection::Hold);
            if round_index < start + passing + tricks {
                let offset = round_index - start;
                return if offset < passing {
                    Self::Pass { hand, direction }
                } else {
                    Self::Trick {
                        hand,
                        trick: offset - passing,
                    }
                };
            }
            start += passing + tricks;
            hand += 1;
        }
    }

    fn hand(self) -> u32 {
        match self {
            Self::Pass { hand, .. } | Self::Trick { hand, .. } => hand,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hearts {
    /// Score that ends the game
    pub target_score: u32,
}

impl Default for Hearts {
    fn default() -> Self {
        Self { target_score: 100 }
    }
}

/// A submitted turn. The shape must match the round's phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeartsTurn {
    /// Passing round
    Pass {
        /// Cards handed on
        cards: Vec<Card>,
    },
    /// Trick round
    Play {
        /// Card played
        card: Card,
    },
}

/// Card played to a trick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    /// Who played
    pub player_id: PlayerId,
    /// What
    pub card: Card,
}

/// A finished trick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrickRecord {
    /// Plays in seat order from the leader
    pub plays: Vec<Play>,
    /// Highest card of the led suit
    pub winner: PlayerId,
    /// Points taken
    pub points: u32,
}

/// Scoring of a finished hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandResult {
    /// Points added per member
    pub added: BTreeMap<PlayerId, u32>,
    /// Member who took every point, if any
    pub moon: Option<PlayerId>,
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartsState {
    /// Cards held, sorted
    pub hands: BTreeMap<PlayerId, Vec<Card>>,
    /// Current hand number
    pub hand_number: u32,
    /// Leads the next trick; unset until passing is done
    pub leader: Option<PlayerId>,
    /// Whether a heart has been played this hand
    pub hearts_broken: bool,
    /// Points taken this hand
    pub hand_points: BTreeMap<PlayerId, u32>,
    /// Running totals
    pub scores: BTreeMap<PlayerId, u32>,
    /// Most recent trick
    pub last_trick: Option<TrickRecord>,
    /// Every scored hand
    pub hand_history: Vec<HandResult>,
}

/// Turn as the table sees it. Passed cards stay private.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicHeartsTurn {
    /// Some cards were passed
    Passed,
    /// A card was played face up
    Played {
        /// Card
        card: Card,
    },
}

/// One member's view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartsView {
    /// Phase of the open round
    pub phase: Phase,
    /// Own cards
    pub hand: Vec<Card>,
    /// Cards left per member
    pub hand_counts: BTreeMap<PlayerId, usize>,
    /// Current trick so far, in play order
    pub trick: Vec<Play>,
    /// Leader of the current trick
    pub leader: Option<PlayerId>,
    /// Whether a heart has been played this hand
    pub hearts_broken: bool,
    /// Points taken this hand
    pub hand_points: BTreeMap<PlayerId, u32>,
    /// Running totals
    pub scores: BTreeMap<PlayerId, u32>,
    /// Most recent finished trick
    pub last_trick: Option<TrickRecord>,
    /// Own turn for the open round, submitted or drafted
    pub pending: Option<HeartsTurn>,
}

// =============================================================================
// RULES
// =============================================================================

/// Members in seat order starting from `leader`.
fn order_from(members: &[Member], leader: &PlayerId) -> Vec<PlayerId> {
    let start = seat_of(members, leader).unwrap_or(0);
    (0..members.len())
        .map(|k| members[(start + k) % members.len()].id.clone())
        .collect()
}

fn holder_of(hands: &BTreeMap<PlayerId, Vec<Card>>, card: Card) -> Option<PlayerId> {
    hands
        .iter()
        .find(|(_, hand)| hand.contains(&card))
        .map(|(id, _)| id.clone())
}

fn remove_card(hand: &mut Vec<Card>, card: Card) -> bool {
    match hand.iter().position(|c| *c == card) {
        Some(i) => {
            hand.remove(i);
            true
        }
        None => false,
    }
}

impl Hearts {
    /// Start hand `hand_number` with freshly dealt cards.
    fn begin_hand(&self, state: &mut HeartsState, members: &[Member], rng: &mut DeterministicRng) {
        state.hands = deal(members, rng);
        state.hearts_broken = false;
        state.hand_points = members.iter().map(|m| (m.id.clone(), 0)).collect();
        state.leader = match PassDirection::for_hand(state.hand_number, members.len()) {
            PassDirection::Hold => holder_of(&state.hands, TWO_OF_CLUBS),
            _ => None,
        };
    }

    fn game_over(&self, state: &HeartsState) -> bool {
        state.scores.values().any(|s| *s >= self.target_score)
    }

    fn apply_pass(
        &self,
        state: &HeartsState,
        ctx: &ReduceContext<'_, Self>,
        direction: PassDirection,
    ) -> Result<HeartsState, ContractViolation> {
        let mut next = state.clone();
        let count = ctx.members.len();

        let mut received: BTreeMap<PlayerId, Vec<Card>> = BTreeMap::new();
        for (seat, member) in ctx.members.iter().enumerate() {
            let turn = ctx.round.turn_of(&member.id).ok_or_else(|| {
                ContractViolation::new(format!("{} did not pass", member.id))
            })?;
            let HeartsTurn::Pass { cards } = &turn.data else {
                return Err(ContractViolation::new(format!("{} played during passing", member.id)));
            };
            let hand = next
                .hands
                .get_mut(&member.id)
                .ok_or_else(|| ContractViolation::new(format!("{} has no hand", member.id)))?;
            for card in cards {
                if !remove_card(hand, *card) {
                    return Err(ContractViolation::new(format!(
                        "{} passed {card:?} without holding it",
                        member.id
                    )));
                }
            }
            let target = &ctx.members[direction.target_seat(seat, count)].id;
            received.entry(target.clone()).or_default().extend(cards);
        }

        for (id, cards) in received {
            if let Some(hand) = next.hands.get_mut(&id) {
                hand.extend(cards);
                hand.sort();
            }
        }
        next.leader = holder_of(&next.hands, TWO_OF_CLUBS);
        Ok(next)
    }

    fn apply_trick(
        &self,
        state: &HeartsState,
        ctx: &mut ReduceContext<'_, Self>,
    ) -> Result<HeartsState, ContractViolation> {
        let mut next = state.clone();
        let leader = state
            .leader
            .clone()
            .ok_or_else(|| ContractViolation::new("trick played with no leader"))?;

        let mut plays = Vec::with_capacity(ctx.members.len());
        for id in order_from(ctx.members, &leader) {
            let turn = ctx
                .round
                .turn_of(&id)
                .ok_or_else(|| ContractViolation::new(format!("{id} did not play")))?;
            let HeartsTurn::Play { card } = turn.data else {
                return Err(ContractViolation::new(format!("{id} passed during a trick")));
            };
            let hand = next
                .hands
                .get_mut(&id)
                .ok_or_else(|| ContractViolation::new(format!("{id} has no hand")))?;
            if !remove_card(hand, card) {
                return Err(ContractViolation::new(format!("{id} played {card:?} without holding it")));
            }
            plays.push(Play {
                player_id: id,
                card,
            });
        }

        let led = plays[0].card.suit;
        let winner = plays
            .iter()
            .filter(|p| p.card.suit == led)
            .max_by_key(|p| p.card.rank)
            .map(|p| p.player_id.clone())
            .ok_or_else(|| ContractViolation::new("empty trick"))?;
        let points: u32 = plays.iter().map(|p| p.card.points()).sum();

        next.hearts_broken |= plays.iter().any(|p| p.card.suit == Suit::Hearts);
        *next.hand_points.entry(winner.clone()).or_insert(0) += points;
        next.leader = Some(winner.clone());
        next.last_trick = Some(TrickRecord {
            plays,
            winner,
            points,
        });

        if next.hands.values().all(Vec::is_empty) {
            self.finish_hand(&mut next, ctx);
        }
        Ok(next)
    }

    fn finish_hand(&self, state: &mut HeartsState, ctx: &mut ReduceContext<'_, Self>) {
        let moon = state
            .hand_points
            .iter()
            .find(|(_, points)| **points == POINTS_PER_HAND)
            .map(|(id, _)| id.clone());

        let added: BTreeMap<PlayerId, u32> = ctx
            .members
            .iter()
            .map(|m| {
                let taken = state.hand_points.get(&m.id).copied().unwrap_or(0);
                let points = match &moon {
                    Some(shooter) if *shooter == m.id => 0,
                    Some(_) => POINTS_PER_HAND,
                    None => taken,
                };
                (m.id.clone(), points)
            })
            .collect();
        for (id, points) in &added {
            *state.scores.entry(id.clone()).or_insert(0) += points;
        }
        state.hand_history.push(HandResult { added, moon });
        state.hand_number += 1;
        state.leader = None;

        if !self.game_over(state) {
            self.begin_hand(state, ctx.members, ctx.rng);
        }
    }
}

impl GameDefinition for Hearts {
    type GlobalState = HeartsState;
    type PlayerState = HeartsView;
    type TurnData = HeartsTurn;
    type PublicTurnData = PublicHeartsTurn;

    const NAME: &'static str = "hearts";
    const MIN_PLAYERS: usize = 3;
    const MAX_PLAYERS: usize = 5;

    fn pending_players(&self, ctx: &PendingContext<'_, Self>) -> Result<Vec<PlayerId>, EngineError> {
        let round_index = ctx.round.round_index;
        if let Phase::Pass { .. } = Phase::of(round_index, ctx.members.len()) {
            return Ok(ctx
                .active
                .iter()
                .filter(|id| !ctx.round.has_turn(id))
                .cloned()
                .collect());
        }

        let leader = ctx.state.leader.as_ref().ok_or_else(|| EngineError::SchedulingAmbiguity {
            round_index,
            reason: "trick round with no leader".into(),
        })?;
        let order = order_from(ctx.members, leader);
        let played = ctx.round.len();
        if let Some(skipped) = order.iter().take(played).find(|id| !ctx.round.has_turn(id)) {
            return Err(EngineError::SchedulingAmbiguity {
                round_index,
                reason: format!("cards played out of seat order; {skipped} was skipped"),
            });
        }
        Ok(order.get(played).cloned().into_iter().collect())
    }

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        let hand = &ctx.player_state.hand;
        let cards: Vec<Card> = match ctx.data {
            HeartsTurn::Pass { cards } => cards.clone(),
            HeartsTurn::Play { card } => vec![*card],
        };
        for (i, card) in cards.iter().enumerate() {
            if !hand.contains(card) {
                return Err(ValidationError::new(
                    "NOT_IN_HAND",
                    format!("{card:?} is not in your hand"),
                ));
            }
            if cards[..i].contains(card) {
                return Err(ValidationError::new("DUPLICATE_CARD", format!("{card:?} listed twice")));
            }
        }
        Ok(())
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        let view = ctx.player_state;

        match (view.phase, ctx.data) {
            (Phase::Pass { .. }, HeartsTurn::Pass { cards }) => {
                if cards.len() != PASS_COUNT {
                    return Err(ValidationError::new(
                        "PASS_COUNT",
                        format!("pass exactly {PASS_COUNT} cards"),
                    )
                    .with_data(serde_json::json!({ "required": PASS_COUNT })));
                }
                Ok(())
            }
            (Phase::Trick { trick, .. }, HeartsTurn::Play { card }) => {
                // The view holds the other seats' cards, so a member changing
                // their card after the next seat followed sees a longer trick
                if let Some(leader) = &view.leader {
                    let seat = order_from(ctx.members, leader)
                        .iter()
                        .position(|id| id == ctx.player_id);
                    if seat != Some(view.trick.len()) {
                        return Err(ValidationError::new(
                            "OUT_OF_TURN",
                            "cards are played in seat order from the leader",
                        ));
                    }
                }
                let holds = |suit: Suit| view.hand.iter().any(|c| c.suit == suit);
                match view.trick.first() {
                    None if trick == 0 && view.hand.contains(&TWO_OF_CLUBS) && *card != TWO_OF_CLUBS => {
                        Err(ValidationError::new(
                            "MUST_LEAD_TWO_OF_CLUBS",
                            "the first trick opens with the two of clubs",
                        ))
                    }
                    None if card.suit == Suit::Hearts
                        && !view.hearts_broken
                        && view.hand.iter().any(|c| c.suit != Suit::Hearts) =>
                    {
                        Err(ValidationError::new(
                            "HEARTS_NOT_BROKEN",
                            "hearts cannot lead until one has been played",
                        ))
                    }
                    Some(lead) if card.suit != lead.card.suit && holds(lead.card.suit) => {
                        Err(ValidationError::new(
                            "MUST_FOLLOW_SUIT",
                            format!("follow {:?}", lead.card.suit),
                        ))
                    }
                    _ => Ok(()),
                }
            }
            (phase, _) => Err(ValidationError::new(
                "WRONG_PHASE",
                format!("this round is {phase:?}"),
            )),
        }
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<HeartsState, ContractViolation> {
        let mut state = HeartsState {
            hands: BTreeMap::new(),
            hand_number: 0,
            leader: None,
            hearts_broken: false,
            hand_points: BTreeMap::new(),
            scores: ctx.members.iter().map(|m| (m.id.clone(), 0)).collect(),
            last_trick: None,
            hand_history: Vec::new(),
        };
        self.begin_hand(&mut state, ctx.members, ctx.rng);
        Ok(state)
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> HeartsView {
        let state = ctx.state;
        let phase = Phase::of(ctx.round_index, ctx.members.len());

        // Trick cards are face up as they land; passes stay private
        let trick = match (phase, ctx.open_round, &state.leader) {
            (Phase::Trick { .. }, Some(round), Some(leader)) => order_from(ctx.members, leader)
                .into_iter()
                .filter_map(|id| match round.turn_of(&id).map(|t| &t.data) {
                    Some(HeartsTurn::Play { card }) => Some(Play {
                        player_id: id,
                        card: *card,
                    }),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        HeartsView {
            phase,
            hand: state.hands.get(ctx.player_id).cloned().unwrap_or_default(),
            hand_counts: state.hands.iter().map(|(id, h)| (id.clone(), h.len())).collect(),
            trick,
            leader: state.leader.clone(),
            hearts_broken: state.hearts_broken,
            hand_points: state.hand_points.clone(),
            scores: state.scores.clone(),
            last_trick: state.last_trick.clone(),
            pending: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.clone()),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> HeartsView {
        let mut view = ctx.player_state.clone();
        match ctx.data {
            HeartsTurn::Pass { cards } => view.hand.retain(|c| !cards.contains(c)),
            HeartsTurn::Play { card } => {
                remove_card(&mut view.hand, *card);
                view.trick.push(Play {
                    player_id: ctx.player_id.clone(),
                    card: *card,
                });
            }
        }
        view.pending = Some(ctx.data.clone());
        view
    }

    fn apply_round(&self, mut ctx: ReduceContext<'_, Self>) -> Result<HeartsState, ContractViolation> {
        let state = ctx.state;
        let phase = Phase::of(ctx.round.round_index, ctx.members.len());
        if phase.hand() != state.hand_number {
            return Err(ContractViolation::new(format!(
                "round {} belongs to hand {} but hand {} is in play",
                ctx.round.round_index,
                phase.hand(),
                state.hand_number
            )));
        }
        match phase {
            Phase::Pass { direction, .. } => self.apply_pass(state, &ctx, direction),
            Phase::Trick { .. } => self.apply_trick(state, &mut ctx),
        }
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> PublicHeartsTurn {
        match &ctx.turn.data {
            HeartsTurn::Pass { .. } => PublicHeartsTurn::Passed,
            HeartsTurn::Play { card } => PublicHeartsTurn::Played { card: *card },
        }
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        if !self.game_over(ctx.state) {
            return GameStatus::Active;
        }
        let low = ctx.state.scores.values().copied().min();
        GameStatus::complete(
            ctx.state
                .scores
                .iter()
                .filter(|(_, score)| Some(**score) == low)
                .map(|(id, _)| id.clone())
                .collect(),
        )
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        let mut messages = Vec::new();
        if ctx.next.last_trick != ctx.previous.last_trick {
            if let Some(trick) = &ctx.next.last_trick {
                if trick.points > 0 {
                    messages.push(SystemMessage::about(
                        trick.winner.clone(),
                        format!("{} took {} point(s)", trick.winner, trick.points),
                    ));
                }
            }
        }
        if ctx.next.hand_number > ctx.previous.hand_number {
            if let Some(shooter) = ctx.next.hand_history.last().and_then(|h| h.moon.clone()) {
                messages.push(SystemMessage::about(shooter.clone(), format!("{shooter} shot the moon")));
            }
            messages.push(SystemMessage::new(format!("hand {} scored", ctx.previous.hand_number + 1)));
        }
        messages
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Round, Turn, TurnHistory};
    use crate::engine::Engine;
    use chrono::{TimeZone, Utc};

    fn members(n: usize) -> Vec<Member> {
        ["ada", "bea", "cy", "dee", "eli"][..n]
            .iter()
            .map(|id| Member::new(*id, id.to_uppercase(), "#aa0000"))
            .collect()
    }

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn play(player: &str, round: u32, suit: Suit, rank: u8) -> Turn<HeartsTurn> {
        Turn::new(player, round, HeartsTurn::Play {
            card: Card::new(suit, rank),
        })
    }

    /// Three members mid-hand, ada to lead, round 1 being trick 0 of hand 0.
    fn midhand(hands: [&[Card]; 3]) -> HeartsState {
        let names = ["ada", "bea", "cy"];
        HeartsState {
            hands: names.iter().zip(hands).map(|(n, h)| (id(n), h.to_vec())).collect(),
            hand_number: 0,
            leader: Some(id("ada")),
            hearts_broken: false,
            hand_points: names.iter().map(|n| (id(n), 0)).collect(),
            scores: names.iter().map(|n| (id(n), 0)).collect(),
            last_trick: None,
            hand_history: Vec::new(),
        }
    }

    #[test]
    fn test_deal_conserves_filtered_deck() {
        for (n, expected) in [(3, 51), (4, 52), (5, 50)] {
            let engine = Engine::new(Hearts::default());
            let state = engine.initialize_session(&members(n), "deal").unwrap();

            let mut all: Vec<Card> = state.hands.values().flatten().copied().collect();
            assert_eq!(all.len(), expected);
            all.sort();
            all.dedup();
            assert_eq!(all.len(), expected);
            assert!(state.hands.values().all(|h| h.len() == hand_size(n)));
        }
    }

    #[test]
    fn test_phase_layout() {
        assert_eq!(Phase::of(0, 4), Phase::Pass { hand: 0, direction: PassDirection::Left });
        assert_eq!(Phase::of(13, 4), Phase::Trick { hand: 0, trick: 12 });
        assert_eq!(Phase::of(14, 4), Phase::Pass { hand: 1, direction: PassDirection::Right });
        assert_eq!(Phase::of(28, 4), Phase::Pass { hand: 2, direction: PassDirection::Across });
        // Hold hand has no passing round
        assert_eq!(Phase::of(42, 4), Phase::Trick { hand: 3, trick: 0 });
        assert_eq!(Phase::of(55, 4), Phase::Pass { hand: 4, direction: PassDirection::Left });

        assert_eq!(Phase::of(36, 3), Phase::Trick { hand: 2, trick: 0 });
        assert_eq!(Phase::of(53, 3), Phase::Pass { hand: 3, direction: PassDirection::Left });
    }

    #[test]
    fn test_pass_round_moves_cards_left() {
        let engine = Engine::new(Hearts::default());
        let members = members(4);
        let state = engine.initialize_session(&members, "pass").unwrap();

        let passed: BTreeMap<PlayerId, Vec<Card>> = state
            .hands
            .iter()
            .map(|(id, hand)| (id.clone(), hand[..3].to_vec()))
            .collect();
        let turns = members.iter().map(|m| {
            Turn::new(m.id.clone(), 0, HeartsTurn::Pass {
                cards: passed[&m.id].clone(),
            })
        });
        let next = engine.commit_round(&state, &Round::from_turns(0, turns), "pass", &members).unwrap();

        // bea sits left of ada
        for card in &passed[&id("ada")] {
            assert!(next.hands[&id("bea")].contains(card));
            assert!(!next.hands[&id("ada")].contains(card));
        }
        assert!(next.hands.values().all(|h| h.len() == 13));
        let leader = next.leader.clone().unwrap();
        assert!(next.hands[&leader].contains(&TWO_OF_CLUBS));
    }

    #[test]
    fn test_one_seat_pending_during_tricks() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let mut cache = engine.new_cache(&members, "seat").unwrap();
        let state = engine.initialize_session(&members, "seat").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut history: TurnHistory<HeartsTurn> = members
            .iter()
            .map(|m| {
                Turn::new(m.id.clone(), 0, HeartsTurn::Pass {
                    cards: state.hands[&m.id][14..].to_vec(),
                })
            })
            .collect();

        let schedule = engine.schedule(&mut cache, &history, &members, None, now).unwrap();
        let leader = schedule.state.leader.clone().unwrap();
        assert_eq!(schedule.decision.round_index, 1);
        assert_eq!(schedule.decision.pending_player_ids, vec![leader.clone()]);

        history.upsert(Turn::new(leader.clone(), 1, HeartsTurn::Play { card: TWO_OF_CLUBS }));
        let next_seat = order_from(&members, &leader)[1].clone();
        let decision = engine.pending_round(&mut cache, &history, &members, None, now).unwrap();
        assert_eq!(decision.pending_player_ids, vec![next_seat]);

        // A card from the wrong seat makes the history inconsistent
        let mut skipped = history.clone();
        let last_seat = order_from(&members, &leader)[2].clone();
        skipped.upsert(Turn::new(last_seat, 1, HeartsTurn::Play { card: TWO_OF_CLUBS }));
        let mut fresh = engine.new_cache(&members, "seat").unwrap();
        let err = engine.pending_round(&mut fresh, &skipped, &members, None, now).unwrap_err();
        assert!(matches!(err, EngineError::SchedulingAmbiguity { round_index: 1, .. }));
    }

    #[test]
    fn test_play_validation() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let base = HeartsView {
            phase: Phase::Trick { hand: 0, trick: 0 },
            hand: vec![
                TWO_OF_CLUBS,
                Card::new(Suit::Clubs, 9),
                Card::new(Suit::Spades, 4),
                Card::new(Suit::Hearts, 10),
            ],
            hand_counts: BTreeMap::new(),
            trick: Vec::new(),
            leader: Some(id("ada")),
            hearts_broken: false,
            hand_points: BTreeMap::new(),
            scores: BTreeMap::new(),
            last_trick: None,
            pending: None,
        };
        let check = |view: &HeartsView, turn: Turn<HeartsTurn>| {
            engine.validate(view, &turn, 1, &members).err().map(|e| e.code)
        };

        assert_eq!(check(&base, play("ada", 1, Suit::Clubs, 9)).as_deref(), Some("MUST_LEAD_TWO_OF_CLUBS"));
        assert_eq!(check(&base, play("ada", 1, Suit::Clubs, 2)), None);
        assert_eq!(check(&base, play("ada", 1, Suit::Diamonds, 5)).as_deref(), Some("NOT_IN_HAND"));

        let later = HeartsView {
            phase: Phase::Trick { hand: 0, trick: 3 },
            ..base.clone()
        };
        assert_eq!(check(&later, play("ada", 4, Suit::Hearts, 10)).as_deref(), Some("HEARTS_NOT_BROKEN"));

        let following = HeartsView {
            trick: vec![Play {
                player_id: id("cy"),
                card: Card::new(Suit::Spades, 9),
            }],
            leader: Some(id("cy")),
            ..later.clone()
        };
        assert_eq!(check(&following, play("ada", 4, Suit::Clubs, 9)).as_deref(), Some("MUST_FOLLOW_SUIT"));
        assert_eq!(check(&following, play("ada", 4, Suit::Spades, 4)), None);

        let pass = Turn::new("ada", 4, HeartsTurn::Pass {
            cards: vec![TWO_OF_CLUBS],
        });
        assert_eq!(check(&following, pass).as_deref(), Some("WRONG_PHASE"));

        let passing = HeartsView {
            phase: Phase::Pass { hand: 0, direction: PassDirection::Left },
            ..base
        };
        let short = Turn::new("ada", 0, HeartsTurn::Pass {
            cards: vec![TWO_OF_CLUBS, Card::new(Suit::Clubs, 9)],
        });
        assert_eq!(check(&passing, short).as_deref(), Some("PASS_COUNT"));
    }

    #[test]
    fn test_card_is_fixed_once_followed() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let view = HeartsView {
            phase: Phase::Trick { hand: 0, trick: 2 },
            hand: vec![Card::new(Suit::Spades, 4), Card::new(Suit::Spades, 12)],
            hand_counts: BTreeMap::new(),
            trick: Vec::new(),
            leader: Some(id("ada")),
            hearts_broken: false,
            hand_points: BTreeMap::new(),
            scores: BTreeMap::new(),
            last_trick: None,
            pending: Some(HeartsTurn::Play {
                card: Card::new(Suit::Spades, 4),
            }),
        };
        let check = |view: &HeartsView, turn: Turn<HeartsTurn>| {
            engine.validate(view, &turn, 3, &members).err().map(|e| e.code)
        };

        // Nobody has followed yet, so the leader may swap cards
        assert_eq!(check(&view, play("ada", 3, Suit::Spades, 12)), None);

        let followed = HeartsView {
            trick: vec![Play {
                player_id: id("bea"),
                card: Card::new(Suit::Spades, 9),
            }],
            ..view
        };
        assert_eq!(check(&followed, play("ada", 3, Suit::Spades, 12)).as_deref(), Some("OUT_OF_TURN"));
    }

    #[test]
    fn test_trick_winner_takes_queen() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let state = midhand([
            &[Card::new(Suit::Clubs, 10), Card::new(Suit::Clubs, 3)],
            &[Card::new(Suit::Clubs, 13), Card::new(Suit::Hearts, 4)],
            &[Card::new(Suit::Spades, 12), Card::new(Suit::Diamonds, 8)],
        ]);
        let round = Round::from_turns(1, vec![
            play("ada", 1, Suit::Clubs, 10),
            play("bea", 1, Suit::Clubs, 13),
            play("cy", 1, Suit::Spades, 12),
        ]);
        let next = engine.commit_round(&state, &round, "t", &members).unwrap();

        assert_eq!(next.leader, Some(id("bea")));
        assert_eq!(next.hand_points[&id("bea")], 13);
        assert!(!next.hearts_broken);
        assert_eq!(next.hands[&id("cy")], vec![Card::new(Suit::Diamonds, 8)]);

        let messages = engine.round_change_messages(&state, &next, &round, &members);
        assert_eq!(messages, vec![SystemMessage::about(id("bea"), "bea took 13 point(s)")]);
    }

    #[test]
    fn test_moon_shot_ends_game() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let mut state = midhand([
            &[Card::new(Suit::Hearts, 14)],
            &[Card::new(Suit::Hearts, 2)],
            &[Card::new(Suit::Clubs, 5)],
        ]);
        state.hearts_broken = true;
        state.hand_points.insert(id("ada"), 24);
        state.scores.insert(id("bea"), 80);
        state.scores.insert(id("cy"), 75);

        let round = Round::from_turns(1, vec![
            play("ada", 1, Suit::Hearts, 14),
            play("bea", 1, Suit::Hearts, 2),
            play("cy", 1, Suit::Clubs, 5),
        ]);
        let next = engine.commit_round(&state, &round, "m", &members).unwrap();

        assert_eq!(next.hand_history[0].moon, Some(id("ada")));
        assert_eq!(next.scores[&id("ada")], 0);
        assert_eq!(next.scores[&id("bea")], 106);
        assert!(next.hands.values().all(Vec::is_empty));
        assert_eq!(engine.status(&next, &[], &members), GameStatus::complete(vec![id("ada")]));

        let messages = engine.round_change_messages(&state, &next, &round, &members);
        assert!(messages.contains(&SystemMessage::about(id("ada"), "ada shot the moon")));
    }

    #[test]
    fn test_finished_hand_deals_again() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let state = midhand([
            &[Card::new(Suit::Clubs, 14)],
            &[Card::new(Suit::Hearts, 2)],
            &[Card::new(Suit::Clubs, 5)],
        ]);
        let round = Round::from_turns(1, vec![
            play("ada", 1, Suit::Clubs, 14),
            play("bea", 1, Suit::Hearts, 2),
            play("cy", 1, Suit::Clubs, 5),
        ]);
        let next = engine.commit_round(&state, &round, "again", &members).unwrap();

        assert_eq!(next.hand_number, 1);
        assert_eq!(next.scores[&id("ada")], 1);
        assert_eq!(next.hands.values().map(Vec::len).sum::<usize>(), 51);
        // Hand 1 passes right, so nobody leads yet
        assert_eq!(next.leader, None);
        assert_eq!(engine.status(&next, &[], &members), GameStatus::Active);
    }

    #[test]
    fn test_public_turn_hides_passes() {
        let engine = Engine::new(Hearts::default());
        let members = members(3);
        let state = engine.initialize_session(&members, "p").unwrap();
        let pass = Turn::new("ada", 0, HeartsTurn::Pass {
            cards: state.hands[&id("ada")][..3].to_vec(),
        });
        assert_eq!(engine.public_turn(&pass, &state, &members), PublicHeartsTurn::Passed);

        let card = Turn::new("ada", 1, HeartsTurn::Play { card: TWO_OF_CLUBS });
        assert_eq!(
            engine.public_turn(&card, &state, &members),
            PublicHeartsTurn::Played { card: TWO_OF_CLUBS }
        );
    }
}
