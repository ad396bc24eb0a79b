//! Engine faults and rule-violation results.
//!
//! Two channels, never mixed:
//! - [`ValidationError`] is returned as data when a member proposes an
//!   illegal turn. Nothing is stored and the session carries on.
//! - [`EngineError`] is a fault. Contract violations inside a game's
//!   reducer are fatal and stop the session from advancing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::types::PlayerId;

// =============================================================================
// VALIDATION
// =============================================================================

/// Rejection of a proposed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable code, e.g. `"NOT_YOUR_TURN"`
    pub code: String,
    /// Human-readable explanation
    pub message: String,
    /// Optional structured context
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ValidationError {
    /// Create a rejection.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured context.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Plain message strings become `INVALID_TURN` rejections.
impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(codes::INVALID_TURN, message)
    }
}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(codes::INVALID_TURN, message)
    }
}

/// Outcome of validating a turn or draft.
pub type ValidationResult = Result<(), ValidationError>;

/// Codes produced by the engine itself. Games add their own.
pub mod codes {
    /// Generic rejection
    pub const INVALID_TURN: &str = "INVALID_TURN";
    /// Author is not a session member
    pub const NOT_A_MEMBER: &str = "NOT_A_MEMBER";
    /// Turn targets a round other than the open one
    pub const WRONG_ROUND: &str = "WRONG_ROUND";
    /// Author is not among the pending members
    pub const NOT_YOUR_TURN: &str = "NOT_YOUR_TURN";
    /// Session already complete
    pub const GAME_COMPLETE: &str = "GAME_COMPLETE";
    /// Session has not started
    pub const NOT_STARTED: &str = "NOT_STARTED";
}

// =============================================================================
// FAULTS
// =============================================================================

/// A game's reducer or setup hit an impossible state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ContractViolation {
    /// What went wrong
    pub message: String,
}

impl ContractViolation {
    /// Create a violation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Engine faults.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Member count outside the game's supported range.
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

    /// Two members share an id.
    #[error("duplicate member id {0}")]
    DuplicateMember(PlayerId),

    /// Game code violated its own invariants.
    #[error("contract violation in {game} (round {round_index:?}): {violation}")]
    ContractViolation {
        /// Game name
        game: &'static str,
        /// Round being reduced; `None` during setup
        round_index: Option<u32>,
        /// Details
        violation: ContractViolation,
    },

    /// History does not map to a single open round.
    #[error("ambiguous schedule at round {round_index}: {reason}")]
    SchedulingAmbiguity {
        /// Round being scheduled
        round_index: u32,
        /// Details
        reason: String,
    },

    /// Status moved backwards from complete.
    #[error("status regressed from complete to {to}")]
    StatusRegression {
        /// Label of the offending status
        to: &'static str,
    },

    /// State could not be encoded for hashing.
    #[error("state encoding failed: {0}")]
    Encoding(String),
}

impl EngineError {
    /// Fatal faults poison the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContractViolation { .. }
                | Self::SchedulingAmbiguity { .. }
                | Self::StatusRegression { .. }
                | Self::Encoding(_)
        )
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
