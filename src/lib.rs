//! # Roundtable
//!
//! Deterministic engine for round-based multiplayer games played
//! asynchronously or on one shared device.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ROUNDTABLE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── rng.rs      - Seeded Xorshift128+ with round streams   │
//! │  ├── hash.rs     - Canonical state hashing                  │
//! │  └── coord.rs    - Board coordinates and grids              │
//! │                                                             │
//! │  engine/         - Pure fold over rounds (deterministic)    │
//! │  ├── definition  - The game contract                        │
//! │  ├── scheduler   - Open round and pending members           │
//! │  ├── validator   - Structural and game checks               │
//! │  ├── reducer     - Canonical round application              │
//! │  ├── conflict    - Simultaneous-move resolution helpers     │
//! │  ├── projector   - Per-member views and drafts              │
//! │  ├── status      - Monotonic lifecycle status               │
//! │  └── cache       - Memoized round boundaries                │
//! │                                                             │
//! │  games/          - chess, hearts, naval, territory, tiles,  │
//! │                    words                                    │
//! │                                                             │
//! │  host/           - Sessions (non-deterministic edge)        │
//! │  ├── session.rs  - One table: history, caches, events       │
//! │  ├── manager.rs  - Authoritative async host                 │
//! │  ├── hotseat.rs  - Offline single-device host               │
//! │  ├── protocol.rs - JSON wire shapes                         │
//! │  └── transcript  - Recorded sessions and replay checks      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! `core/`, `engine/` and `games/` are deterministic:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No clock reads; time only enters through the scheduler's `now`
//! - All randomness from the session seed, one stream per round
//!
//! The same seed, members and turns produce the same state and the same
//! state hash on every host.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod engine;
pub mod games;
pub mod host;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::{Coord, StateHash};
pub use engine::{
    Engine, EngineError, GameDefinition, GameStatus, Member, PlayerId, Round, RoundFormat,
    RoundIndexDecision, Turn, TurnHistory, ValidationError,
};
pub use host::{HotseatSession, Session, SessionError, SessionManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
