//! State Hashing for Verification
//!
//! Provides deterministic hashing of game state for:
//! - Parity checks between the authoritative host and offline devices
//! - Transcript checkpoints
//! - Replay validation

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256. Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for global state snapshots.
    pub fn for_global_state() -> Self {
        Self::new(b"ROUNDTABLE_STATE_V1")
    }

    /// Create hasher for round content.
    pub fn for_round() -> Self {
        Self::new(b"ROUNDTABLE_ROUND_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
    }

    /// Update with the canonical binary encoding of a value.
    ///
    /// State types use `BTreeMap`/`Vec` only, so the encoding is stable.
    pub fn update_serialized<T: Serialize>(&mut self, value: &T) -> Result<(), bincode::Error> {
        let bytes = bincode::serialize(value)?;
        self.update_u64(bytes.len() as u64);
        self.hasher.update(&bytes);
        Ok(())
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a simple hash of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the canonical hash of a global state at a round boundary.
pub fn compute_state_hash<S: Serialize>(
    round_index: u32,
    seed: &str,
    state: &S,
) -> Result<StateHash, bincode::Error> {
    let mut hasher = StateHasher::for_global_state();

    // Always hash boundary and seed first
    hasher.update_u32(round_index);
    hasher.update_str(seed);
    hasher.update_serialized(state)?;

    Ok(hasher.finalize())
}

/// Short hex prefix of a hash for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

// =============================================================================
// TESTS
// =============================================================================
