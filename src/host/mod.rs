//! Hosts
//!
//! Two ways to run the engine:
//!
//! - [`SessionManager`]: authoritative, many concurrent tables, one lock per
//!   table, events fanned out over a broadcast channel.
//! - [`HotseatSession`]: offline, one device passed from seat to seat, with
//!   local drafts and previews.
//!
//! Both sit on [`Session`], which owns a table's history and derived caches.

pub mod config;
pub mod events;
pub mod hotseat;
pub mod manager;
pub mod protocol;
pub mod session;
pub mod transcript;

pub use config::{ConfigError, EngineConfig, SessionConfig};
pub use events::SessionEvent;
pub use hotseat::HotseatSession;
pub use manager::SessionManager;
pub use protocol::{ClientMessage, RoundSummary, ServerMessage, TurnSummary, WireTurn};
pub use session::{PlayerSnapshot, Session, SessionError, SubmitOutcome};
pub use transcript::{Checkpoint, Transcript, TranscriptError, VerifyReport};
