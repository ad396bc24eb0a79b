//! Host Configuration
//!
//! Both structs read `ROUNDTABLE_*` environment variables. Unset variables
//! fall back to the defaults; malformed ones are reported rather than
//! silently ignored.

use chrono::Duration;

use crate::engine::{Engine, GameDefinition, RoundFormat};

/// Seconds a full round stays open before the next one starts.
pub const ENV_ROUND_DELAY_SECS: &str = "ROUNDTABLE_ROUND_DELAY_SECS";
/// Rounds between state hash checkpoints.
pub const ENV_CHECKPOINT_INTERVAL: &str = "ROUNDTABLE_CHECKPOINT_INTERVAL";
/// Replay from scratch when a session completes.
pub const ENV_VERIFY_REPLAY: &str = "ROUNDTABLE_VERIFY_REPLAY";

/// Malformed configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable did not parse.
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What was expected
        expected: &'static str,
        /// Raw value
        value: String,
    },

    /// Checkpoints every zero rounds.
    #[error("ROUNDTABLE_CHECKPOINT_INTERVAL must be at least 1")]
    ZeroCheckpointInterval,
}

/// Engine-wide settings shared by every session of one deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Overrides the game's pacing with a cooldown when set.
    pub round_delay: Option<Duration>,
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let round_delay = match lookup(ENV_ROUND_DELAY_SECS) {
            Some(raw) => {
                let secs: i64 = parse(ENV_ROUND_DELAY_SECS, "a number of seconds", &raw)?;
                if secs < 0 {
                    return Err(ConfigError::Invalid {
                        var: ENV_ROUND_DELAY_SECS,
                        expected: "a number of seconds",
                        value: raw,
                    });
                }
                Some(Duration::seconds(secs))
            }
            None => None,
        };
        Ok(Self { round_delay })
    }

    /// Pacing override, if any.
    pub fn round_format(&self) -> Option<RoundFormat> {
        self.round_delay.map(|delay| RoundFormat::Delayed { delay })
    }

    /// Engine for `game` with this configuration applied.
    pub fn build<G: GameDefinition>(&self, game: G) -> Engine<G> {
        match self.round_format() {
            Some(format) => Engine::new(game).with_round_format(format),
            None => Engine::new(game),
        }
    }
}

/// Per-session host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Record a state hash every this many closed rounds.
    pub checkpoint_interval: u32,
    /// Replay the full history and compare hashes on completion.
    pub verify_replay: bool,
    /// Capacity of the manager's event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1,
            verify_replay: false,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_CHECKPOINT_INTERVAL) {
            config.checkpoint_interval = parse(ENV_CHECKPOINT_INTERVAL, "a positive integer", &raw)?;
            if config.checkpoint_interval == 0 {
                return Err(ConfigError::ZeroCheckpointInterval);
            }
        }
        if let Some(raw) = lookup(ENV_VERIFY_REPLAY) {
            config.verify_replay = match raw.as_str() {
                "true" | "1" => true,
                "false" | "0" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_VERIFY_REPLAY,
                        expected: "true, false, 1 or 0",
                        value: raw,
                    })
                }
            };
        }
        Ok(config)
    }

    /// Whether the boundary after `closed_rounds` rounds gets a checkpoint.
    pub fn is_checkpoint(&self, closed_rounds: u32) -> bool {
        closed_rounds % self.checkpoint_interval.max(1) == 0
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
    raw: &str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value: raw.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
