//! Session Transcripts
//!
//! A transcript is everything needed to rebuild a session: seed, members,
//! the closed rounds, and state hash checkpoints taken while the session
//! ran. [`Transcript::verify`] replays from scratch and reports the first
//! boundary whose hash differs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::hash::{short_hex, StateHash};
use crate::engine::{Engine, EngineError, GameDefinition, Member, Round};

/// Current transcript format version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// State hash at a round boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Closed rounds before this boundary
    pub boundary: u32,
    /// Canonical state hash at the boundary
    pub state_hash: StateHash,
}

impl Checkpoint {
    /// Hash as lowercase hex.
    pub fn hex(&self) -> String {
        hex::encode(self.state_hash)
    }
}

/// Recorded session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript<T> {
    /// Format version
    pub version: u8,
    /// Game name, from [`GameDefinition::NAME`]
    pub game: String,
    /// Session id
    pub session_id: Uuid,
    /// Session seed
    pub seed: String,
    /// Members in seat order
    pub members: Vec<Member>,
    /// Closed rounds `0..n`, canonical order
    pub rounds: Vec<Round<T>>,
    /// Hash checkpoints in boundary order
    pub checkpoints: Vec<Checkpoint>,
}

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    /// Rounds folded
    pub rounds_replayed: u32,
    /// Checkpoints compared
    pub checkpoints_checked: usize,
    /// Hash of the final state
    pub final_hash: StateHash,
}

/// Transcript failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranscriptError {
    /// Bytes did not decode.
    #[error("transcript decoding failed: {0}")]
    Decoding(String),

    /// Transcript could not be encoded.
    #[error("transcript encoding failed: {0}")]
    Encoding(String),

    /// Written by an incompatible version.
    #[error("transcript version {got} is not supported (expected {expected})")]
    VersionMismatch {
        /// Supported version
        expected: u8,
        /// Version found
        got: u8,
    },

    /// Recorded for a different game.
    #[error("transcript is for {found}, not {expected}")]
    GameMismatch {
        /// Game verifying
        expected: String,
        /// Game recorded
        found: String,
    },

    /// Rounds are not the contiguous sequence `0..n`.
    #[error("round at position {position} has index {round_index}")]
    RoundGap {
        /// Position in the list
        position: usize,
        /// Index found there
        round_index: u32,
    },

    /// Replay produced a different state than the one recorded.
    #[error("state diverged after round {round_index:?}: recorded {expected}, replayed {actual}")]
    Divergence {
        /// Last round folded before the mismatching boundary; `None` for setup
        round_index: Option<u32>,
        /// Recorded hash, hex
        expected: String,
        /// Replayed hash, hex
        actual: String,
    },

    /// The engine faulted during replay.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl<T> Transcript<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Serialize with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranscriptError> {
        bincode::serialize(self).map_err(|e| TranscriptError::Encoding(e.to_string()))
    }

    /// Deserialize and check the version.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        let transcript: Self =
            bincode::deserialize(data).map_err(|e| TranscriptError::Decoding(e.to_string()))?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::VersionMismatch {
                expected: TRANSCRIPT_VERSION,
                got: transcript.version,
            });
        }
        Ok(transcript)
    }

    /// Number of recorded rounds.
    pub fn round_count(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Last checkpoint, if any.
    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }
}

impl<T: Clone> Transcript<T> {
    /// Replay every round from the seed and compare each checkpoint.
    pub fn verify<G>(&self, engine: &Engine<G>) -> Result<VerifyReport, TranscriptError>
    where
        G: GameDefinition<TurnData = T>,
    {
        if self.game != G::NAME {
            return Err(TranscriptError::GameMismatch {
                expected: G::NAME.to_string(),
                found: self.game.clone(),
            });
        }
        for (position, round) in self.rounds.iter().enumerate() {
            if round.round_index as usize != position {
                return Err(TranscriptError::RoundGap {
                    position,
                    round_index: round.round_index,
                });
            }
        }

        let mut checkpoints = self.checkpoints.iter().peekable();
        let mut checked = 0;
        let mut state = engine.initialize_session(&self.members, &self.seed)?;
        let mut boundary = 0u32;

        loop {
            while let Some(checkpoint) = checkpoints.next_if(|c| c.boundary <= boundary) {
                if checkpoint.boundary < boundary {
                    continue;
                }
                let actual = engine.state_hash(boundary, &self.seed, &state)?;
                if actual != checkpoint.state_hash {
                    warn!(
                        game = G::NAME,
                        session = %self.session_id,
                        boundary,
                        expected = %short_hex(&checkpoint.state_hash),
                        actual = %short_hex(&actual),
                        "replay diverged"
                    );
                    return Err(TranscriptError::Divergence {
                        round_index: boundary.checked_sub(1),
                        expected: checkpoint.hex(),
                        actual: hex::encode(actual),
                    });
                }
                checked += 1;
            }

            let Some(round) = self.rounds.get(boundary as usize) else {
                break;
            };
            state = engine.commit_round(&state, round, &self.seed, &self.members)?;
            boundary += 1;
        }

        let final_hash = engine.state_hash(boundary, &self.seed, &state)?;
        debug!(
            game = G::NAME,
            session = %self.session_id,
            rounds = boundary,
            checkpoints = checked,
            hash = %short_hex(&final_hash),
            "transcript verified"
        );
        Ok(VerifyReport {
            rounds_replayed: boundary,
            checkpoints_checked: checked,
            final_hash,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
