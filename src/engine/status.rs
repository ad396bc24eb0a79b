//! Status Resolver
//!
//! Wraps the game's status function with a monotonic guard: once a session
//! is complete, any later answer other than the same completion is a fault.

use crate::engine::definition::{GameDefinition, StatusContext};
use crate::engine::errors::EngineError;
use crate::engine::types::{GameStatus, Member};

/// Status after `closed_rounds` rounds.
pub fn resolve<G: GameDefinition>(
    game: &G,
    state: &G::GlobalState,
    closed_rounds: u32,
    members: &[Member],
) -> GameStatus {
    game.status(&StatusContext {
        state,
        closed_rounds,
        members,
    })
}

/// Remembers the latest status and rejects regressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusTracker {
    current: GameStatus,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self {
            current: GameStatus::Pending,
        }
    }
}

impl StatusTracker {
    /// Tracker starting at `Pending`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest status.
    pub fn current(&self) -> &GameStatus {
        &self.current
    }

    /// Record a newly computed status. Returns true when it changed.
    pub fn observe(&mut self, next: GameStatus) -> Result<bool, EngineError> {
        if self.current.is_complete() {
            if next != self.current {
                return Err(EngineError::StatusRegression { to: next.label() });
            }
            return Ok(false);
        }
        if next == GameStatus::Pending && self.current == GameStatus::Active {
            return Err(EngineError::StatusRegression { to: next.label() });
        }
        let changed = next != self.current;
        self.current = next;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::PlayerId;

    #[test]
    fn test_tracker_progression() {
        let mut tracker = StatusTracker::new();
        assert_eq!(tracker.current(), &GameStatus::Pending);

        assert!(tracker.observe(GameStatus::Active).unwrap());
        assert!(!tracker.observe(GameStatus::Active).unwrap());

        let done = GameStatus::complete(vec![PlayerId::from("p0")]);
        assert!(tracker.observe(done.clone()).unwrap());
        assert!(!tracker.observe(done).unwrap());
    }

    #[test]
    fn test_complete_never_reverts() {
        let mut tracker = StatusTracker::new();
        tracker
            .observe(GameStatus::complete(vec![PlayerId::from("p1")]))
            .unwrap();

        assert!(matches!(
            tracker.observe(GameStatus::Active),
            Err(EngineError::StatusRegression { to: "active" })
        ));
        assert!(tracker.observe(GameStatus::Pending).is_err());
        // A different winner set is also a regression
        assert!(tracker
            .observe(GameStatus::complete(vec![PlayerId::from("p0")]))
            .is_err());
        assert!(tracker.current().is_complete());
    }
}
