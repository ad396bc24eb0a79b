//! Protocol Messages
//!
//! JSON wire shapes exchanged with clients. Field names are camelCase.
//! Transport is up to the embedding application; [`dispatch`] maps one
//! client message onto a session and builds the reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{GameDefinition, GameStatus, PlayerId, Turn, ValidationError};
use crate::host::events::SessionEvent;
use crate::host::session::{Session, SessionError, SubmitOutcome};

// =============================================================================
// SHARED SHAPES
// =============================================================================

/// A turn as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTurn<T> {
    /// Author
    pub player_id: PlayerId,
    /// Round it is meant for
    pub round_index: u32,
    /// Game payload
    pub data: T,
}

impl<T> WireTurn<T> {
    /// Engine turn, untimestamped. The host stamps it on acceptance.
    pub fn into_turn(self) -> Turn<T> {
        Turn::new(self.player_id, self.round_index, self.data)
    }
}

impl<T> From<Turn<T>> for WireTurn<T> {
    fn from(turn: Turn<T>) -> Self {
        Self {
            player_id: turn.player_id,
            round_index: turn.round_index,
            data: turn.data,
        }
    }
}

/// One member's slot in a round summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSummary<P> {
    /// Author
    pub player_id: PlayerId,
    /// Public turn once the round has closed, otherwise null
    pub data: Option<P>,
}

/// What a member may see about one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary<T, P, S> {
    /// Round index
    pub round_index: u32,
    /// Submitted turns in seat order
    pub turns: Vec<TurnSummary<P>>,
    /// The requesting member's own payload, if submitted
    pub your_turn_data: Option<T>,
    /// The requesting member's view at the start of the round
    pub initial_player_state: S,
}

/// Round summary typed for a game.
pub type GameRoundSummary<G> = RoundSummary<
    <G as GameDefinition>::TurnData,
    <G as GameDefinition>::PublicTurnData,
    <G as GameDefinition>::PlayerState,
>;

// =============================================================================
// CLIENT -> HOST
// =============================================================================

/// Requests a member can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage<T> {
    /// Submit a turn.
    #[serde(rename_all = "camelCase")]
    SubmitTurn {
        /// The turn
        turn: WireTurn<T>,
    },

    /// Check a draft without storing it.
    #[serde(rename_all = "camelCase")]
    ValidateDraft {
        /// The draft
        turn: WireTurn<T>,
    },

    /// View with a draft applied locally.
    #[serde(rename_all = "camelCase")]
    PreviewDraft {
        /// Requesting member
        player_id: PlayerId,
        /// Draft payload
        data: T,
    },

    /// Current view of the open round.
    #[serde(rename_all = "camelCase")]
    RequestView {
        /// Requesting member
        player_id: PlayerId,
    },

    /// Per-round history as the member may see it.
    #[serde(rename_all = "camelCase")]
    RequestSummaries {
        /// Requesting member
        player_id: PlayerId,
    },

    /// Lifecycle status.
    RequestStatus,
}

impl<T> ClientMessage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// HOST -> CLIENT
// =============================================================================

/// Replies and pushes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage<T, P, S> {
    /// Turn stored.
    #[serde(rename_all = "camelCase")]
    TurnAccepted {
        /// Round it was stored in
        round_index: u32,
        /// Whether it replaced an earlier turn
        replaced: bool,
    },

    /// Turn refused; nothing stored.
    #[serde(rename_all = "camelCase")]
    TurnRejected {
        /// Reason
        error: ValidationError,
    },

    /// Draft check result; `error` is null when the draft is acceptable.
    #[serde(rename_all = "camelCase")]
    DraftChecked {
        /// Reason, if any
        error: Option<ValidationError>,
    },

    /// The member's view of the open round.
    #[serde(rename_all = "camelCase")]
    View {
        /// Open round
        round_index: u32,
        /// Members still owed a turn
        pending_player_ids: Vec<PlayerId>,
        /// When to ask again, if the table is waiting on time
        check_again_at: Option<DateTime<Utc>>,
        /// Projected state
        state: S,
    },

    /// Round history.
    #[serde(rename_all = "camelCase")]
    Summaries {
        /// Rounds in order
        rounds: Vec<RoundSummary<T, P, S>>,
    },

    /// Lifecycle status.
    #[serde(rename_all = "camelCase")]
    Status {
        /// Current status
        status: GameStatus,
    },

    /// Pushed session event.
    #[serde(rename_all = "camelCase")]
    Event {
        /// The event
        event: SessionEvent,
    },

    /// Host-level failure.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Description
        message: String,
    },
}

/// Server message typed for a game.
pub type GameServerMessage<G> = ServerMessage<
    <G as GameDefinition>::TurnData,
    <G as GameDefinition>::PublicTurnData,
    <G as GameDefinition>::PlayerState,
>;

impl<T: Serialize, P: Serialize, S: Serialize> ServerMessage<T, P, S> {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T, P, S> From<SessionError> for ServerMessage<T, P, S> {
    fn from(err: SessionError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Apply one client message to `session` and build the reply.
pub fn dispatch<G: GameDefinition>(
    session: &mut Session<G>,
    message: ClientMessage<G::TurnData>,
    now: DateTime<Utc>,
) -> GameServerMessage<G> {
    let reply = match message {
        ClientMessage::SubmitTurn { turn } => {
            session
                .submit_turn(turn.into_turn(), now)
                .map(|outcome| match outcome {
                    SubmitOutcome::Accepted {
                        round_index,
                        replaced,
                    } => ServerMessage::TurnAccepted {
                        round_index,
                        replaced,
                    },
                    SubmitOutcome::Rejected(error) => ServerMessage::TurnRejected { error },
                })
        }
        ClientMessage::ValidateDraft { turn } => session
            .validate_draft(&turn.into_turn(), now)
            .map(|result| ServerMessage::DraftChecked { error: result.err() }),
        ClientMessage::PreviewDraft { player_id, data } => session
            .optimistic_view(&player_id, &data, now)
            .map(|snapshot| ServerMessage::View {
                round_index: snapshot.decision.round_index,
                pending_player_ids: snapshot.decision.pending_player_ids,
                check_again_at: snapshot.decision.check_again_at,
                state: snapshot.state,
            }),
        ClientMessage::RequestView { player_id } => {
            session
                .player_view(&player_id, now)
                .map(|snapshot| ServerMessage::View {
                    round_index: snapshot.decision.round_index,
                    pending_player_ids: snapshot.decision.pending_player_ids,
                    check_again_at: snapshot.decision.check_again_at,
                    state: snapshot.state,
                })
        }
        ClientMessage::RequestSummaries { player_id } => session
            .round_summaries(&player_id, now)
            .map(|rounds| ServerMessage::Summaries { rounds }),
        ClientMessage::RequestStatus => session
            .status(now)
            .map(|status| ServerMessage::Status { status }),
    };
    reply.unwrap_or_else(ServerMessage::from)
}

// =============================================================================
// TESTS
// =============================================================================
