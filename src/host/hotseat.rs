//! Hotseat Host
//!
//! Offline play on one device. The device is handed from seat to seat;
//! each member builds a local draft, previews it, and submits. Drafts live
//! only here and never reach the turn history until submitted.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::{Engine, GameDefinition, Member, PlayerId, Turn, ValidationResult};
use crate::host::config::SessionConfig;
use crate::host::session::{PlayerSnapshot, Session, SessionError, SubmitOutcome};

/// A session played by every member on the same device.
pub struct HotseatSession<G: GameDefinition> {
    session: Session<G>,
    drafts: BTreeMap<PlayerId, G::TurnData>,
}

impl<G: GameDefinition> HotseatSession<G> {
    /// New offline table.
    pub fn new(
        engine: Arc<Engine<G>>,
        members: Vec<Member>,
        seed: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            session: Session::new(engine, members, seed, config)?,
            drafts: BTreeMap::new(),
        })
    }

    /// Underlying session.
    pub fn session(&self) -> &Session<G> {
        &self.session
    }

    /// Underlying session, mutably.
    pub fn session_mut(&mut self) -> &mut Session<G> {
        &mut self.session
    }

    /// First pending member in seat order: who gets the device next.
    pub fn current_seat(&mut self, now: DateTime<Utc>) -> Result<Option<PlayerId>, SessionError> {
        let decision = self.session.pending_round(now)?;
        Ok(self
            .session
            .members()
            .iter()
            .map(|m| &m.id)
            .find(|id| decision.is_pending(id))
            .cloned())
    }

    /// Current draft of `player_id`.
    pub fn draft(&self, player_id: &PlayerId) -> Option<&G::TurnData> {
        self.drafts.get(player_id)
    }

    /// Store a draft and run the cheap check on it. The draft is kept even
    /// when the check fails so the member can keep editing.
    pub fn set_draft(
        &mut self,
        player_id: &PlayerId,
        data: G::TurnData,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, SessionError> {
        let round_index = self.session.pending_round(now)?.round_index;
        let turn = Turn::new(player_id.clone(), round_index, data);
        let result = self.session.validate_draft(&turn, now)?;
        self.drafts.insert(player_id.clone(), turn.data);
        Ok(result)
    }

    /// Discard a local draft. Submitted turns are unaffected.
    pub fn withdraw_draft(&mut self, player_id: &PlayerId) -> Option<G::TurnData> {
        self.drafts.remove(player_id)
    }

    /// The member's view with their draft applied, or the plain view when
    /// there is none.
    pub fn draft_view(
        &mut self,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<PlayerSnapshot<G::PlayerState>, SessionError> {
        match self.drafts.get(player_id) {
            Some(draft) => self.session.optimistic_view(player_id, draft, now),
            None => self.session.player_view(player_id, now),
        }
    }

    /// Submit the member's draft for the open round. The draft is cleared
    /// once accepted and kept when rejected.
    pub fn submit_draft(
        &mut self,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SessionError> {
        let Some(data) = self.drafts.get(player_id).cloned() else {
            return Err(SessionError::NoDraft(player_id.clone()));
        };
        let round_index = self.session.pending_round(now)?.round_index;
        let outcome = self
            .session
            .submit_turn(Turn::new(player_id.clone(), round_index, data), now)?;
        if outcome.is_accepted() {
            self.drafts.remove(player_id);
            debug!(player = %player_id, round = round_index, "hotseat draft submitted");
        }
        Ok(outcome)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{members, Counter};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 9, 20, 0, 0).unwrap()
    }

    fn table() -> HotseatSession<Counter> {
        HotseatSession::new(
            Arc::new(Engine::new(Counter)),
            members(3),
            "hotseat",
            SessionConfig::default(),
        )
        .unwrap()
    }

    fn id(raw: &str) -> PlayerId {
        PlayerId::from(raw)
    }

    #[test]
    fn test_device_moves_through_seats() {
        let mut table = table();
        for seat in ["p0", "p1", "p2"] {
            assert_eq!(table.current_seat(now()).unwrap(), Some(id(seat)));
            table.set_draft(&id(seat), 2, now()).unwrap().unwrap();
            assert!(table.submit_draft(&id(seat), now()).unwrap().is_accepted());
        }
        assert_eq!(table.session().closed_rounds(), 1);
        assert_eq!(table.current_seat(now()).unwrap(), Some(id("p0")));
    }

    #[test]
    fn test_draft_preview_is_local() {
        let mut table = table();
        table.set_draft(&id("p1"), 6, now()).unwrap().unwrap();

        let preview = table.draft_view(&id("p1"), now()).unwrap();
        assert_eq!(preview.state.mine, 6);
        assert_eq!(preview.state.submitted, Some(6));

        let confirmed = table.session_mut().player_view(&id("p1"), now()).unwrap();
        assert_eq!(confirmed.state.mine, 0);
        assert_eq!(table.session().history().turn_count(), 0);
    }

    #[test]
    fn test_withdraw_draft_leaves_submissions_alone() {
        let mut table = table();
        table.set_draft(&id("p0"), 3, now()).unwrap().unwrap();
        table.submit_draft(&id("p0"), now()).unwrap();

        assert_eq!(table.withdraw_draft(&id("p0")), None);
        assert_eq!(table.session().history().turn_count(), 1);

        table.set_draft(&id("p1"), 4, now()).unwrap().unwrap();
        assert_eq!(table.withdraw_draft(&id("p1")), Some(4));
        assert!(matches!(
            table.submit_draft(&id("p1"), now()),
            Err(SessionError::NoDraft(_))
        ));
    }

    #[test]
    fn test_resubmitted_draft_replaces_turn() {
        let mut table = table();
        table.set_draft(&id("p0"), 3, now()).unwrap().unwrap();
        table.submit_draft(&id("p0"), now()).unwrap();
        assert_eq!(table.current_seat(now()).unwrap(), Some(id("p1")));

        table.set_draft(&id("p0"), 7, now()).unwrap().unwrap();
        let outcome = table.submit_draft(&id("p0"), now()).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                round_index: 0,
                replaced: true
            }
        );
        let stored = table
            .session()
            .history()
            .round(0)
            .and_then(|round| round.turn_of(&id("p0")))
            .map(|turn| turn.data);
        assert_eq!(stored, Some(7));
        assert_eq!(table.session().history().turn_count(), 1);
    }

    #[test]
    fn test_invalid_draft_is_kept_for_editing() {
        let mut table = table();
        let check = table.set_draft(&id("p2"), -3, now()).unwrap();
        assert!(check.is_err());
        assert_eq!(table.draft(&id("p2")), Some(&-3));

        let outcome = table.submit_draft(&id("p2"), now()).unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(table.draft(&id("p2")), Some(&-3));
    }
}
