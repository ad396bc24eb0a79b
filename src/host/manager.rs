//! Session Manager
//!
//! Authoritative host for many concurrent tables of one game. Each session
//! sits behind its own lock, so members of different tables never contend.
//! Round closing happens under the session's write lock, which makes it a
//! single-writer decision.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::{Engine, GameDefinition, GameStatus, Member, PlayerId, Turn};
use crate::host::config::SessionConfig;
use crate::host::events::SessionEvent;
use crate::host::protocol::{self, ClientMessage, GameRoundSummary, GameServerMessage};
use crate::host::session::{PlayerSnapshot, Session, SessionError, SubmitOutcome};
use crate::host::transcript::Transcript;

/// Shared handle to one session.
pub type SessionHandle<G> = Arc<RwLock<Session<G>>>;

/// Manages all sessions of one game.
pub struct SessionManager<G: GameDefinition> {
    engine: Arc<Engine<G>>,
    config: SessionConfig,
    /// Active sessions
    sessions: RwLock<BTreeMap<Uuid, SessionHandle<G>>>,
    /// Member to sessions they are seated in
    member_sessions: RwLock<BTreeMap<PlayerId, BTreeSet<Uuid>>>,
    /// Event broadcast channel
    event_tx: broadcast::Sender<SessionEvent>,
}

impl<G: GameDefinition> SessionManager<G> {
    /// Manager sharing `engine` across its sessions.
    pub fn new(engine: Engine<G>, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            engine: Arc::new(engine),
            config,
            sessions: RwLock::new(BTreeMap::new()),
            member_sessions: RwLock::new(BTreeMap::new()),
            event_tx,
        }
    }

    /// The shared engine.
    pub fn engine(&self) -> &Arc<Engine<G>> {
        &self.engine
    }

    /// Subscribe to events from every session.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Create a session.
    #[instrument(skip(self, members, seed), fields(game = G::NAME, members = members.len()))]
    pub async fn create(
        &self,
        members: Vec<Member>,
        seed: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid, SessionError> {
        let mut session = Session::new(self.engine.clone(), members, seed, self.config.clone())?;
        if let Some(start) = started_at {
            session = session.with_start(start);
        }
        Ok(self.insert(session).await)
    }

    /// Rebuild a session from a transcript.
    #[instrument(skip(self, transcript), fields(game = G::NAME, session = %transcript.session_id))]
    pub async fn restore(&self, transcript: &Transcript<G::TurnData>) -> Result<Uuid, SessionError> {
        let session = Session::restore(
            self.engine.clone(),
            transcript,
            self.config.clone(),
            Utc::now(),
        )?;
        Ok(self.insert(session).await)
    }

    async fn insert(&self, session: Session<G>) -> Uuid {
        let id = session.id();
        {
            let mut index = self.member_sessions.write().await;
            for member in session.members() {
                index.entry(member.id.clone()).or_default().insert(id);
            }
        }
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(session)));
        info!(session = %id, "session registered");
        id
    }

    /// Get a session by id.
    pub async fn get(&self, id: &Uuid) -> Result<SessionHandle<G>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SessionError::UnknownSession(*id))
    }

    /// Sessions a member is seated in.
    pub async fn sessions_for(&self, player_id: &PlayerId) -> Vec<Uuid> {
        self.member_sessions
            .read()
            .await
            .get(player_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Submit a turn and publish whatever it caused.
    #[instrument(skip(self, turn), fields(player = %turn.player_id, round = turn.round_index))]
    pub async fn submit_turn(
        &self,
        id: &Uuid,
        turn: Turn<G::TurnData>,
    ) -> Result<SubmitOutcome, SessionError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        let result = session.submit_turn(turn, Utc::now());
        self.publish(session.take_events());
        result
    }

    /// A member's view of the open round.
    pub async fn player_view(
        &self,
        id: &Uuid,
        player_id: &PlayerId,
    ) -> Result<PlayerSnapshot<G::PlayerState>, SessionError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        let result = session.player_view(player_id, Utc::now());
        self.publish(session.take_events());
        result
    }

    /// Round history as `player_id` may see it.
    pub async fn round_summaries(
        &self,
        id: &Uuid,
        player_id: &PlayerId,
    ) -> Result<Vec<GameRoundSummary<G>>, SessionError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        let result = session.round_summaries(player_id, Utc::now());
        self.publish(session.take_events());
        result
    }

    /// Lifecycle status.
    pub async fn status(&self, id: &Uuid) -> Result<GameStatus, SessionError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        let result = session.status(Utc::now());
        self.publish(session.take_events());
        result
    }

    /// Handle one wire message for a session.
    #[instrument(skip(self, message))]
    pub async fn handle_message(
        &self,
        id: &Uuid,
        message: ClientMessage<G::TurnData>,
    ) -> GameServerMessage<G> {
        let handle = match self.get(id).await {
            Ok(handle) => handle,
            Err(err) => return err.into(),
        };
        let mut session = handle.write().await;
        let reply = protocol::dispatch(&mut *session, message, Utc::now());
        self.publish(session.take_events());
        reply
    }

    /// Transcript of a session's closed rounds.
    pub async fn transcript(&self, id: &Uuid) -> Result<Transcript<G::TurnData>, SessionError> {
        let handle = self.get(id).await?;
        let session = handle.read().await;
        Ok(session.transcript())
    }

    /// Remove a session.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let Some(handle) = self.sessions.write().await.remove(id) else {
            return false;
        };
        let session = handle.read().await;
        let mut index = self.member_sessions.write().await;
        for member in session.members() {
            if let Some(ids) = index.get_mut(&member.id) {
                ids.remove(id);
                if ids.is_empty() {
                    index.remove(&member.id);
                }
            }
        }
        true
    }

    /// Get active session count.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop completed and faulted sessions. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut finished = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, handle) in sessions.iter() {
                let session = handle.read().await;
                if session.is_faulted() || session.current_status().is_complete() {
                    finished.push(*id);
                }
            }
        }

        let mut removed = 0;
        for id in finished {
            if self.remove(&id).await {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up finished sessions");
        }
        removed
    }

    fn publish(&self, events: Vec<SessionEvent>) {
        for event in events {
            if let SessionEvent::Faulted { session_id, reason } = &event {
                warn!(session = %session_id, reason = %reason, "publishing fault");
            }
            // No subscribers is fine
            let _ = self.event_tx.send(event);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{members, Counter};
    use crate::host::protocol::{ServerMessage, WireTurn};

    fn manager() -> SessionManager<Counter> {
        SessionManager::new(Engine::new(Counter), SessionConfig::default())
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let manager = manager();
        let id = manager.create(members(2), "seed-a", None).await.unwrap();

        assert_eq!(manager.count().await, 1);
        assert!(manager.get(&id).await.is_ok());
        assert_eq!(manager.sessions_for(&PlayerId::from("p1")).await, vec![id]);
        assert!(manager.sessions_for(&PlayerId::from("p7")).await.is_empty());

        let missing = Uuid::new_v4();
        assert!(matches!(
            manager.get(&missing).await,
            Err(SessionError::UnknownSession(m)) if m == missing
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_member_count() {
        let manager = manager();
        let err = manager.create(members(5), "seed", None).await.unwrap_err();
        assert!(matches!(err, SessionError::PlayerCount { count: 5, max: 4, .. }));
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let manager = manager();
        let mut rx = manager.subscribe_events();
        let id = manager.create(members(2), "seed-b", None).await.unwrap();

        manager.submit_turn(&id, Turn::new("p0", 0, 4)).await.unwrap();
        manager.submit_turn(&id, Turn::new("p1", 0, 6)).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.session_id(), id);
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            [
                "status_changed",
                "turn_submitted",
                "turn_submitted",
                "round_closed",
                "system_message"
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_submissions_close_one_round() {
        let manager = Arc::new(manager());
        let id = manager.create(members(4), "seed-c", None).await.unwrap();

        let mut tasks = Vec::new();
        for seat in 0..4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager
                    .submit_turn(&id, Turn::new(format!("p{seat}").as_str(), 0, seat))
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_accepted());
        }

        let handle = manager.get(&id).await.unwrap();
        assert_eq!(handle.read().await.closed_rounds(), 1);
        let view = manager.player_view(&id, &PlayerId::from("p3")).await.unwrap();
        assert_eq!(view.decision.round_index, 1);
        assert_eq!(view.state.mine, 3);
    }

    #[tokio::test]
    async fn test_handle_message_and_cleanup() {
        let manager = manager();
        let id = manager.create(members(2), "seed-d", None).await.unwrap();

        for round in 0..2 {
            for (player, amount) in [("p0", 10), ("p1", 1)] {
                let reply = manager
                    .handle_message(
                        &id,
                        ClientMessage::SubmitTurn {
                            turn: WireTurn {
                                player_id: player.into(),
                                round_index: round,
                                data: amount,
                            },
                        },
                    )
                    .await;
                assert!(matches!(reply, ServerMessage::TurnAccepted { .. }), "{reply:?}");
            }
        }

        assert!(manager.status(&id).await.unwrap().is_complete());
        assert_eq!(manager.transcript(&id).await.unwrap().round_count(), 2);
        assert_eq!(manager.cleanup().await, 1);
        assert_eq!(manager.count().await, 0);
        assert!(manager.sessions_for(&PlayerId::from("p0")).await.is_empty());

        let reply = manager
            .handle_message(&id, ClientMessage::RequestStatus)
            .await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }
}
