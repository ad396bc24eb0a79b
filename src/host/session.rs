//! Session
//!
//! One game table: members, seed, the turn history, and the caches derived
//! from it. Every read first brings the table up to date, so a delayed round
//! whose cooldown has passed closes on whichever call notices it first.
//!
//! A fatal engine fault poisons the session. It keeps its history for
//! inspection but refuses all further work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::hash::short_hex;
use crate::engine::errors::codes;
use crate::engine::status::{self as status_resolver, StatusTracker};
use crate::engine::validator;
use crate::engine::{
    CacheStats, Engine, EngineError, GameDefinition, GameStatus, Member, PlayerId,
    RoundIndexDecision, Round, Schedule, StateCache, Turn, TurnHistory, ValidationError,
    ValidationResult,
};
use crate::host::config::SessionConfig;
use crate::host::events::SessionEvent;
use crate::host::protocol::{GameRoundSummary, RoundSummary, TurnSummary};
use crate::host::transcript::{Checkpoint, Transcript, TranscriptError, VerifyReport, TRANSCRIPT_VERSION};

/// Host-level failures. Rule violations are [`SubmitOutcome::Rejected`]
/// instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No session with this id.
    #[error("unknown session {0}")]
    UnknownSession(Uuid),

    /// Caller is not seated at the table.
    #[error("{0} is not a member of this session")]
    NotAMember(PlayerId),

    /// Turn addressed to a round that already closed.
    #[error("round {round_index} is closed; round {open_round} is open")]
    RoundClosed {
        /// Round the turn named
        round_index: u32,
        /// Currently open round
        open_round: u32,
    },

    /// The session was poisoned by an earlier fault.
    #[error("session is faulted: {0}")]
    Faulted(String),

    /// Member count outside the game's range.
    #[error("{game} supports {min}..={max} players, got {count}")]
    PlayerCount {
        /// Game name
        game: &'static str,
        /// Members supplied
        count: usize,
        /// Minimum
        min: usize,
        /// Maximum
        max: usize,
    },

    /// Hotseat submit without a draft.
    #[error("{0} has no draft to submit")]
    NoDraft(PlayerId),

    /// Engine failure.
    #[error(transparent)]
    Engine(EngineError),

    /// Transcript failure.
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::PlayerCount {
                game,
                count,
                min,
                max,
            } => Self::PlayerCount {
                game,
                count,
                min,
                max,
            },
            other => Self::Engine(other),
        }
    }
}

/// Result of a submission that reached the rules.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Stored.
    Accepted {
        /// Round the turn was stored in
        round_index: u32,
        /// Whether an earlier turn was replaced
        replaced: bool,
    },
    /// Refused; nothing stored.
    Rejected(ValidationError),
}

impl SubmitOutcome {
    /// Whether the turn was stored.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// A member's projected state together with the schedule it was taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot<S> {
    /// Open round and pending members
    pub decision: RoundIndexDecision,
    /// Whether the game is over
    pub complete: bool,
    /// Projected state
    pub state: S,
}

/// One game table.
pub struct Session<G: GameDefinition> {
    id: Uuid,
    engine: Arc<Engine<G>>,
    config: SessionConfig,
    members: Vec<Member>,
    seed: String,
    started_at: Option<DateTime<Utc>>,
    history: TurnHistory<G::TurnData>,
    cache: StateCache<G>,
    tracker: StatusTracker,
    closed_rounds: u32,
    checkpoints: Vec<Checkpoint>,
    fault: Option<String>,
    events: Vec<SessionEvent>,
}

impl<G: GameDefinition> Session<G> {
    /// New table. Fails when the member list does not suit the game.
    pub fn new(
        engine: Arc<Engine<G>>,
        members: Vec<Member>,
        seed: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let seed = seed.into();
        let cache = engine.new_cache(&members, &seed)?;
        let initial_hash = engine.state_hash(0, &seed, cache.initial())?;
        let id = Uuid::new_v4();

        info!(
            session = %id,
            game = G::NAME,
            members = members.len(),
            hash = %short_hex(&initial_hash),
            "session created"
        );

        Ok(Self {
            id,
            engine,
            config,
            members,
            seed,
            started_at: None,
            history: TurnHistory::new(),
            cache,
            tracker: StatusTracker::new(),
            closed_rounds: 0,
            checkpoints: vec![Checkpoint {
                boundary: 0,
                state_hash: initial_hash,
            }],
            fault: None,
            events: Vec::new(),
        })
    }

    /// Rebuild a table from a verified transcript.
    pub fn restore(
        engine: Arc<Engine<G>>,
        transcript: &Transcript<G::TurnData>,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        transcript.verify(&*engine)?;
        let mut session = Self::new(
            engine,
            transcript.members.clone(),
            transcript.seed.clone(),
            config,
        )?;
        session.id = transcript.session_id;
        for round in &transcript.rounds {
            for turn in &round.turns {
                session.history.upsert(turn.clone());
            }
        }
        session.refresh(now)?;
        session.events.clear();
        info!(
            session = %session.id,
            rounds = session.closed_rounds,
            "session restored"
        );
        Ok(session)
    }

    /// Turns are refused before `started_at`.
    pub fn with_start(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Members in seat order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Session seed.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// All stored turns.
    pub fn history(&self) -> &TurnHistory<G::TurnData> {
        &self.history
    }

    /// Rounds closed so far.
    pub fn closed_rounds(&self) -> u32 {
        self.closed_rounds
    }

    /// Hash checkpoints taken so far.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Latest observed status, without bringing the table up to date.
    pub fn current_status(&self) -> &GameStatus {
        self.tracker.current()
    }

    /// Whether a fatal fault poisoned the session.
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Open round and pending members at `now`.
    pub fn pending_round(&mut self, now: DateTime<Utc>) -> Result<RoundIndexDecision, SessionError> {
        Ok(self.refresh(now)?.decision)
    }

    /// Store a member's turn for the open round.
    ///
    /// Resubmitting an identical turn is a no-op. A changed turn replaces the
    /// member's earlier one for as long as the round stays open.
    pub fn submit_turn(
        &mut self,
        turn: Turn<G::TurnData>,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SessionError> {
        self.require_member(&turn.player_id)?;
        let schedule = self.refresh(now)?;
        let decision = &schedule.decision;

        if turn.round_index < decision.round_index {
            return Err(SessionError::RoundClosed {
                round_index: turn.round_index,
                open_round: decision.round_index,
            });
        }
        if self.started_at.is_some_and(|start| now < start) {
            return Ok(self.reject(
                &turn,
                ValidationError::new(codes::NOT_STARTED, "the game has not started yet"),
            ));
        }

        let same_round = turn.round_index == decision.round_index;
        let existing = self
            .history
            .round(decision.round_index)
            .and_then(|round| round.turn_of(&turn.player_id))
            .filter(|_| same_round);
        if existing.is_some_and(|prior| prior.data == turn.data) {
            return Ok(SubmitOutcome::Accepted {
                round_index: decision.round_index,
                replaced: false,
            });
        }

        let structure = if existing.is_some() {
            validator::check_replacement(decision, &turn, &self.members, schedule.complete)
        } else {
            validator::check_structure(decision, &turn, &self.members, schedule.complete)
        };
        if let Err(reason) = structure {
            return Ok(self.reject(&turn, reason));
        }

        let others = self.others_in_open_round(decision.round_index, &turn.player_id);
        let view = self.engine.player_view(
            &schedule.state,
            &turn.player_id,
            decision.round_index,
            others.as_ref(),
            &self.members,
        );
        if let Err(reason) = self
            .engine
            .validate(&view, &turn, decision.round_index, &self.members)
        {
            return Ok(self.reject(&turn, reason));
        }

        let round_index = turn.round_index;
        let player_id = turn.player_id.clone();
        let replaced = self.history.upsert(turn.at(now)).is_some();
        debug!(
            session = %self.id,
            player = %player_id,
            round = round_index,
            replaced,
            "turn accepted"
        );
        self.events.push(SessionEvent::TurnSubmitted {
            session_id: self.id,
            player_id,
            round_index,
            replaced,
        });

        self.refresh(now)?;
        Ok(SubmitOutcome::Accepted {
            round_index,
            replaced,
        })
    }

    /// Cheap check of a draft against the open round. Nothing is stored.
    pub fn validate_draft(
        &mut self,
        turn: &Turn<G::TurnData>,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, SessionError> {
        self.require_member(&turn.player_id)?;
        let schedule = self.refresh(now)?;
        let round_index = schedule.decision.round_index;
        let others = self.others_in_open_round(round_index, &turn.player_id);
        let view = self.engine.player_view(
            &schedule.state,
            &turn.player_id,
            round_index,
            others.as_ref(),
            &self.members,
        );
        Ok(self
            .engine
            .validate_partial(&view, turn, round_index, &self.members))
    }

    /// A member's view of the open round.
    pub fn player_view(
        &mut self,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<PlayerSnapshot<G::PlayerState>, SessionError> {
        self.require_member(player_id)?;
        let schedule = self.refresh(now)?;
        let round_index = schedule.decision.round_index;
        let state = self.engine.player_view(
            &schedule.state,
            player_id,
            round_index,
            self.history.round(round_index),
            &self.members,
        );
        Ok(PlayerSnapshot {
            decision: schedule.decision,
            complete: schedule.complete,
            state,
        })
    }

    /// A member's view with `draft` applied for them alone.
    pub fn optimistic_view(
        &mut self,
        player_id: &PlayerId,
        draft: &G::TurnData,
        now: DateTime<Utc>,
    ) -> Result<PlayerSnapshot<G::PlayerState>, SessionError> {
        let mut snapshot = self.player_view(player_id, now)?;
        snapshot.state =
            self.engine
                .optimistic_view(&snapshot.state, draft, player_id, &self.members);
        Ok(snapshot)
    }

    /// Every round up to the open one, as `player_id` may see it.
    pub fn round_summaries(
        &mut self,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameRoundSummary<G>>, SessionError> {
        self.require_member(player_id)?;
        let schedule = self.refresh(now)?;
        let closed = self.closed_rounds;
        let mut summaries = Vec::with_capacity(closed as usize + 1);

        for index in 0..closed {
            let state = self.state_at(index)?;
            let round = self.history.round(index);
            let turns = self
                .seated_turns(round)
                .map(|turn| TurnSummary {
                    player_id: turn.player_id.clone(),
                    data: Some(self.engine.public_turn(turn, &state, &self.members)),
                })
                .collect();
            summaries.push(RoundSummary {
                round_index: index,
                turns,
                your_turn_data: round
                    .and_then(|r| r.turn_of(player_id))
                    .map(|t| t.data.clone()),
                initial_player_state: self.engine.player_view(
                    &state,
                    player_id,
                    index,
                    None,
                    &self.members,
                ),
            });
        }

        if !schedule.complete {
            let index = schedule.decision.round_index;
            let round = self.history.round(index);
            summaries.push(RoundSummary {
                round_index: index,
                turns: self
                    .seated_turns(round)
                    .map(|turn| TurnSummary {
                        player_id: turn.player_id.clone(),
                        data: None,
                    })
                    .collect(),
                your_turn_data: round
                    .and_then(|r| r.turn_of(player_id))
                    .map(|t| t.data.clone()),
                initial_player_state: self.engine.player_view(
                    &schedule.state,
                    player_id,
                    index,
                    None,
                    &self.members,
                ),
            });
        }

        Ok(summaries)
    }

    /// Lifecycle status at `now`.
    pub fn status(&mut self, now: DateTime<Utc>) -> Result<GameStatus, SessionError> {
        self.refresh(now)?;
        if self.started_at.is_some_and(|start| now < start) {
            return Ok(GameStatus::Pending);
        }
        Ok(self.tracker.current().clone())
    }

    /// Everything needed to rebuild the closed part of the session.
    pub fn transcript(&self) -> Transcript<G::TurnData> {
        Transcript {
            version: TRANSCRIPT_VERSION,
            game: G::NAME.to_string(),
            session_id: self.id,
            seed: self.seed.clone(),
            members: self.members.clone(),
            rounds: self
                .history
                .rounds_before(self.closed_rounds)
                .iter()
                .map(Round::canonical)
                .collect(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    /// Replay the closed rounds from scratch and compare every checkpoint.
    pub fn verify_replay(&self) -> Result<VerifyReport, SessionError> {
        Ok(self.transcript().verify(&*self.engine)?)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn require_member(&self, player_id: &PlayerId) -> Result<(), SessionError> {
        if self.members.iter().any(|m| &m.id == player_id) {
            Ok(())
        } else {
            Err(SessionError::NotAMember(player_id.clone()))
        }
    }

    fn reject(&self, turn: &Turn<G::TurnData>, reason: ValidationError) -> SubmitOutcome {
        debug!(
            session = %self.id,
            player = %turn.player_id,
            round = turn.round_index,
            code = %reason.code,
            "turn rejected"
        );
        SubmitOutcome::Rejected(reason)
    }

    /// Open round minus `player_id`'s own turn.
    fn others_in_open_round(
        &self,
        round_index: u32,
        player_id: &PlayerId,
    ) -> Option<Round<G::TurnData>> {
        self.history.round(round_index).map(|round| {
            Round::from_turns(
                round_index,
                round
                    .turns
                    .iter()
                    .filter(|t| &t.player_id != player_id)
                    .cloned(),
            )
        })
    }

    /// Turns of `round` in seat order.
    fn seated_turns<'a>(
        &'a self,
        round: Option<&'a Round<G::TurnData>>,
    ) -> impl Iterator<Item = &'a Turn<G::TurnData>> + 'a {
        self.members
            .iter()
            .filter_map(move |m| round.and_then(|r| r.turn_of(&m.id)))
    }

    fn state_at(&mut self, boundary: u32) -> Result<G::GlobalState, SessionError> {
        let settled = self.closed_rounds;
        match self.cache.state_at(
            self.engine.game(),
            &self.history,
            &self.members,
            boundary,
            settled,
        ) {
            Ok(state) => Ok(state),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Bring the table up to `now`: close finished rounds, queue their
    /// events, and track status.
    fn refresh(&mut self, now: DateTime<Utc>) -> Result<Schedule<G::GlobalState>, SessionError> {
        if let Some(reason) = &self.fault {
            return Err(SessionError::Faulted(reason.clone()));
        }

        let schedule = match self.engine.schedule(
            &mut self.cache,
            &self.history,
            &self.members,
            self.started_at,
            now,
        ) {
            Ok(schedule) => schedule,
            Err(err) => return Err(self.fail(err)),
        };

        while self.closed_rounds < schedule.decision.round_index {
            if let Err(err) = self.close_round(self.closed_rounds) {
                return Err(self.fail(err));
            }
        }

        if !self.started_at.is_some_and(|start| now < start) {
            self.observe_status()?;
        }
        Ok(schedule)
    }

    fn close_round(&mut self, index: u32) -> Result<(), EngineError> {
        let boundary = index + 1;
        let game = self.engine.game();
        let previous = self
            .cache
            .state_at(game, &self.history, &self.members, index, boundary)?;
        let next = self
            .cache
            .state_at(game, &self.history, &self.members, boundary, boundary)?;
        let round = self.history.round_or_empty(index).canonical();

        let state_hash = if self.config.is_checkpoint(boundary) {
            let hash = self.engine.state_hash(boundary, &self.seed, &next)?;
            self.checkpoints.push(Checkpoint {
                boundary,
                state_hash: hash,
            });
            Some(hex::encode(hash))
        } else {
            None
        };

        debug!(
            session = %self.id,
            game = G::NAME,
            round = index,
            turns = round.len(),
            hash = state_hash.as_deref().unwrap_or("-"),
            "round closed"
        );
        self.events.push(SessionEvent::RoundClosed {
            session_id: self.id,
            round_index: index,
            state_hash,
        });
        for message in self
            .engine
            .round_change_messages(&previous, &next, &round, &self.members)
        {
            self.events.push(SessionEvent::SystemMessage {
                session_id: self.id,
                round_index: index,
                message,
            });
        }
        self.closed_rounds = boundary;
        Ok(())
    }

    fn observe_status(&mut self) -> Result<(), SessionError> {
        let boundary = self.closed_rounds;
        let state = self.state_at(boundary)?;
        let status =
            status_resolver::resolve(self.engine.game(), &state, boundary, &self.members);
        let changed = match self.tracker.observe(status.clone()) {
            Ok(changed) => changed,
            Err(err) => return Err(self.fail(err)),
        };
        if !changed {
            return Ok(());
        }

        info!(session = %self.id, status = status.label(), rounds = boundary, "status changed");
        let complete = status.is_complete();
        self.events.push(SessionEvent::StatusChanged {
            session_id: self.id,
            status,
        });

        if complete && self.config.verify_replay {
            if let Err(err) = self.verify_replay() {
                self.poison(err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    fn fail(&mut self, err: EngineError) -> SessionError {
        if err.is_fatal() {
            self.poison(err.to_string());
        }
        SessionError::from(err)
    }

    fn poison(&mut self, reason: String) {
        error!(session = %self.id, game = G::NAME, reason = %reason, "session faulted");
        self.events.push(SessionEvent::Faulted {
            session_id: self.id,
            reason: reason.clone(),
        });
        self.fault = Some(reason);
    }
}

impl<G: GameDefinition> std::fmt::Debug for Session<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("game", &G::NAME)
            .field("members", &self.members.len())
            .field("closed_rounds", &self.closed_rounds)
            .field("faulted", &self.fault.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{members, Counter};
    use crate::engine::RoundFormat;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
    }

    fn session_with(engine: Engine<Counter>, config: SessionConfig) -> Session<Counter> {
        Session::new(Arc::new(engine), members(2), "session-seed", config).unwrap()
    }

    fn session() -> Session<Counter> {
        session_with(Engine::new(Counter), SessionConfig::default())
    }

    fn kinds(events: &[SessionEvent]) -> Vec<&'static str> {
        events.iter().map(SessionEvent::kind).collect()
    }

    fn play(session: &mut Session<Counter>, round: u32, a: i64, b: i64) {
        for (player, amount) in [("p0", a), ("p1", b)] {
            let outcome = session
                .submit_turn(Turn::new(player, round, amount), t0())
                .unwrap();
            assert!(outcome.is_accepted(), "{player} round {round}: {outcome:?}");
        }
    }

    #[test]
    fn test_round_closes_when_everyone_submits() {
        let mut session = session();

        let first = session.submit_turn(Turn::new("p0", 0, 5), t0()).unwrap();
        assert_eq!(
            first,
            SubmitOutcome::Accepted {
                round_index: 0,
                replaced: false
            }
        );
        assert_eq!(kinds(&session.take_events()), ["status_changed", "turn_submitted"]);
        assert_eq!(session.closed_rounds(), 0);

        session.submit_turn(Turn::new("p1", 0, 3), t0()).unwrap();
        let events = session.take_events();
        assert_eq!(kinds(&events), ["turn_submitted", "round_closed", "system_message"]);
        assert!(matches!(
            &events[1],
            SessionEvent::RoundClosed { round_index: 0, state_hash: Some(_), .. }
        ));

        assert_eq!(session.closed_rounds(), 1);
        assert_eq!(session.checkpoints().len(), 2);
        assert_eq!(session.pending_round(t0()).unwrap().round_index, 1);
    }

    #[test]
    fn test_rule_violations_are_rejections() {
        let mut session = session();

        let too_large = session.submit_turn(Turn::new("p0", 0, 11), t0()).unwrap();
        assert!(matches!(too_large, SubmitOutcome::Rejected(ref e) if e.code == "TOO_LARGE"));

        let future = session.submit_turn(Turn::new("p0", 1, 1), t0()).unwrap();
        assert!(matches!(future, SubmitOutcome::Rejected(ref e) if e.code == codes::WRONG_ROUND));

        assert!(matches!(
            session.submit_turn(Turn::new("zz", 0, 1), t0()),
            Err(SessionError::NotAMember(_))
        ));
        assert_eq!(session.history().turn_count(), 0);
    }

    #[test]
    fn test_resubmission_is_idempotent_and_changes_replace() {
        let mut session = session();
        session.submit_turn(Turn::new("p0", 0, 5), t0()).unwrap();

        let again = session.submit_turn(Turn::new("p0", 0, 5), t0()).unwrap();
        assert_eq!(
            again,
            SubmitOutcome::Accepted {
                round_index: 0,
                replaced: false
            }
        );

        let changed = session.submit_turn(Turn::new("p0", 0, 6), t0()).unwrap();
        assert_eq!(
            changed,
            SubmitOutcome::Accepted {
                round_index: 0,
                replaced: true
            }
        );
        assert_eq!(session.history().turn_count(), 1);
        let stored = session.history().round(0).and_then(|r| r.turn_of(&PlayerId::from("p0")));
        assert_eq!(stored.map(|t| t.data), Some(6));
        assert_eq!(session.closed_rounds(), 0);

        // Replacements still face the game's rules
        let illegal = session.submit_turn(Turn::new("p0", 0, 11), t0()).unwrap();
        assert!(matches!(illegal, SubmitOutcome::Rejected(ref e) if e.code == "TOO_LARGE"));
        let stored = session.history().round(0).and_then(|r| r.turn_of(&PlayerId::from("p0")));
        assert_eq!(stored.map(|t| t.data), Some(6));

        session.submit_turn(Turn::new("p1", 0, 1), t0()).unwrap();
        let view = session.player_view(&PlayerId::from("p0"), t0()).unwrap();
        assert_eq!(view.state.mine, 6);
    }

    #[test]
    fn test_closed_round_is_a_host_error() {
        let mut session = session();
        play(&mut session, 0, 1, 1);
        let settled = session.player_view(&PlayerId::from("p0"), t0()).unwrap();
        assert!(matches!(
            session.submit_turn(Turn::new("p0", 0, 2), t0()),
            Err(SessionError::RoundClosed {
                round_index: 0,
                open_round: 1
            })
        ));

        // Settled history and its memoized boundaries are untouched
        let stored = session.history().round(0).and_then(|r| r.turn_of(&PlayerId::from("p0")));
        assert_eq!(stored.map(|t| t.data), Some(1));
        assert_eq!(session.player_view(&PlayerId::from("p0"), t0()).unwrap(), settled);
    }

    #[test]
    fn test_delayed_round_accepts_replacement_until_cooldown_ends() {
        let engine = Engine::new(Counter).with_round_format(RoundFormat::Delayed {
            delay: Duration::hours(1),
        });
        let mut session = session_with(engine, SessionConfig::default());
        play(&mut session, 0, 5, 3);

        let cooling = session.pending_round(t0()).unwrap();
        assert_eq!(cooling.round_index, 0);
        assert!(cooling.pending_player_ids.is_empty());
        assert_eq!(session.closed_rounds(), 0);

        let replaced = session
            .submit_turn(Turn::new("p1", 0, 4), t0() + Duration::minutes(10))
            .unwrap();
        assert_eq!(
            replaced,
            SubmitOutcome::Accepted {
                round_index: 0,
                replaced: true
            }
        );

        // Replacement restarted the cooldown
        assert_eq!(session.pending_round(t0() + Duration::minutes(65)).unwrap().round_index, 0);

        let later = t0() + Duration::hours(2);
        let view = session.player_view(&PlayerId::from("p1"), later).unwrap();
        assert_eq!(view.decision.round_index, 1);
        assert_eq!(view.state.mine, 4);
        assert_eq!(session.closed_rounds(), 1);
    }

    #[test]
    fn test_not_started_session_refuses_turns() {
        let mut session = session().with_start(t0() + Duration::hours(1));
        let early = session.submit_turn(Turn::new("p0", 0, 1), t0()).unwrap();
        assert!(matches!(early, SubmitOutcome::Rejected(ref e) if e.code == codes::NOT_STARTED));
        assert_eq!(session.status(t0()).unwrap(), GameStatus::Pending);

        let started = t0() + Duration::hours(2);
        assert!(session
            .submit_turn(Turn::new("p0", 0, 1), started)
            .unwrap()
            .is_accepted());
        assert_eq!(session.status(started).unwrap(), GameStatus::Active);
    }

    #[test]
    fn test_completion_freezes_the_table() {
        let config = SessionConfig {
            verify_replay: true,
            ..SessionConfig::default()
        };
        let mut session = session_with(Engine::new(Counter), config);
        play(&mut session, 0, 10, 1);
        play(&mut session, 1, 10, 1);

        assert_eq!(
            session.status(t0()).unwrap(),
            GameStatus::complete(vec![PlayerId::from("p0")])
        );
        assert!(!session.is_faulted());

        let late = session.submit_turn(Turn::new("p1", 2, 1), t0()).unwrap();
        assert!(matches!(late, SubmitOutcome::Rejected(ref e) if e.code == codes::GAME_COMPLETE));
    }

    #[test]
    fn test_contract_violation_poisons_session() {
        let mut session = session();
        // Bypasses validation the way a corrupted store would
        session.history.upsert(Turn::new("p0", 0, -1));
        session.history.upsert(Turn::new("p1", 0, 1));

        assert!(matches!(
            session.status(t0()),
            Err(SessionError::Engine(EngineError::ContractViolation { .. }))
        ));
        assert!(session.is_faulted());
        assert!(kinds(&session.take_events()).contains(&"faulted"));
        assert!(matches!(
            session.submit_turn(Turn::new("p0", 1, 1), t0()),
            Err(SessionError::Faulted(_))
        ));
    }

    #[test]
    fn test_summaries_hide_open_round_payloads() {
        let mut session = session();
        play(&mut session, 0, 2, 7);
        session.submit_turn(Turn::new("p0", 1, 4), t0()).unwrap();

        let p1 = session.round_summaries(&PlayerId::from("p1"), t0()).unwrap();
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].turns[0].data, Some(2));
        assert_eq!(p1[0].your_turn_data, Some(7));
        assert_eq!(p1[1].turns.len(), 1);
        assert_eq!(p1[1].turns[0].data, None);
        assert_eq!(p1[1].your_turn_data, None);
        assert_eq!(p1[1].initial_player_state.mine, 7);

        let p0 = session.round_summaries(&PlayerId::from("p0"), t0()).unwrap();
        assert_eq!(p0[1].your_turn_data, Some(4));
    }

    #[test]
    fn test_transcript_restores_session() {
        let mut session = session();
        play(&mut session, 0, 3, 4);
        play(&mut session, 1, 2, 2);

        let transcript = session.transcript();
        assert_eq!(transcript.round_count(), 2);
        let report = session.verify_replay().unwrap();
        assert_eq!(report.checkpoints_checked, 3);

        let restored = Session::restore(
            Arc::new(Engine::new(Counter)),
            &transcript,
            SessionConfig::default(),
            t0(),
        )
        .unwrap();
        assert_eq!(restored.id(), session.id());
        assert_eq!(restored.closed_rounds(), 2);
        assert_eq!(restored.checkpoints(), session.checkpoints());
    }

    #[test]
    fn test_player_count_checked() {
        let err = Session::new(
            Arc::new(Engine::new(Counter)),
            members(1),
            "seed",
            SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::PlayerCount { count: 1, min: 2, .. }));
    }
}
