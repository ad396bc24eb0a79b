//! Session events for downstream collaborators (chat, notifications,
//! persistence). Hosts queue them as rounds advance; the manager fans them
//! out over a broadcast channel.

use serde::Serialize;
use uuid::Uuid;

use crate::engine::{GameStatus, PlayerId, SystemMessage};

/// Something observable happened in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A member's turn was stored.
    #[serde(rename_all = "camelCase")]
    TurnSubmitted {
        /// Session
        session_id: Uuid,
        /// Author
        player_id: PlayerId,
        /// Round the turn belongs to
        round_index: u32,
        /// Whether an earlier turn for the same round was replaced
        replaced: bool,
    },

    /// A round closed and its result is now part of the game.
    #[serde(rename_all = "camelCase")]
    RoundClosed {
        /// Session
        session_id: Uuid,
        /// The closed round
        round_index: u32,
        /// Hex state hash after the round, when a checkpoint was taken
        state_hash: Option<String>,
    },

    /// Lifecycle status moved.
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        /// Session
        session_id: Uuid,
        /// New status
        status: GameStatus,
    },

    /// Narrative line produced by a closed round.
    #[serde(rename_all = "camelCase")]
    SystemMessage {
        /// Session
        session_id: Uuid,
        /// Round that produced it
        round_index: u32,
        /// The line
        message: SystemMessage,
    },

    /// The session hit a fatal fault and refuses further work.
    #[serde(rename_all = "camelCase")]
    Faulted {
        /// Session
        session_id: Uuid,
        /// Fault description
        reason: String,
    },
}

impl SessionEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::TurnSubmitted { session_id, .. }
            | Self::RoundClosed { session_id, .. }
            | Self::StatusChanged { session_id, .. }
            | Self::SystemMessage { session_id, .. }
            | Self::Faulted { session_id, .. } => *session_id,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TurnSubmitted { .. } => "turn_submitted",
            Self::RoundClosed { .. } => "round_closed",
            Self::StatusChanged { .. } => "status_changed",
            Self::SystemMessage { .. } => "system_message",
            Self::Faulted { .. } => "faulted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let id = Uuid::new_v4();
        let event = SessionEvent::RoundClosed {
            session_id: id,
            round_index: 3,
            state_hash: Some("ab".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "roundClosed");
        assert_eq!(json["roundIndex"], 3);
        assert_eq!(json["stateHash"], "ab");
        assert_eq!(event.session_id(), id);
        assert_eq!(event.kind(), "round_closed");
    }

    #[test]
    fn test_status_event_nests_status() {
        let event = SessionEvent::StatusChanged {
            session_id: Uuid::nil(),
            status: GameStatus::complete(vec![PlayerId::new("p1")]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"]["status"], "complete");
        assert_eq!(json["status"]["winnerIds"][0], "p1");
    }
}
