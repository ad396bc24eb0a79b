//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism: no floats, no hash-ordered maps, no clocks.

pub mod coord;
pub mod hash;
pub mod rng;

// Re-export core types
pub use coord::{Coord, Grid};
pub use hash::{compute_state_hash, short_hex, StateHash, StateHasher};
pub use rng::DeterministicRng;
