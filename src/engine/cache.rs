//! Incremental State Cache
//!
//! Entry `i` holds the global state at the start of round `i`. Only
//! boundaries reached through settled rounds are stored; the open round is
//! always recomputed. Extending a settled history by one round costs one
//! reduction.

use crate::engine::definition::GameDefinition;
use crate::engine::errors::EngineError;
use crate::engine::reducer;
use crate::engine::types::{Member, TurnHistory};

/// Hit and reduction counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from memory
    pub hits: u64,
    /// Reducer applications performed
    pub reductions: u64,
}

/// Memoized round-boundary states for one session.
#[derive(Clone, Debug)]
pub struct StateCache<G: GameDefinition> {
    seed: String,
    /// Never empty; `states[0]` is the initial state
    states: Vec<G::GlobalState>,
    stats: CacheStats,
}

impl<G: GameDefinition> StateCache<G> {
    /// Cache seeded with the initial state.
    pub fn new(seed: impl Into<String>, initial: G::GlobalState) -> Self {
        Self {
            seed: seed.into(),
            states: vec![initial],
            stats: CacheStats::default(),
        }
    }

    /// Session seed.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Number of settled rounds memoized.
    pub fn settled_rounds(&self) -> u32 {
        (self.states.len() - 1) as u32
    }

    /// Memoized state at the start of `round_index`.
    pub fn get(&self, round_index: u32) -> Option<&G::GlobalState> {
        self.states.get(round_index as usize)
    }

    /// State before round 0.
    pub fn initial(&self) -> &G::GlobalState {
        &self.states[0]
    }

    /// Highest memoized boundary and its state.
    pub fn latest(&self) -> (u32, &G::GlobalState) {
        let index = self.states.len() - 1;
        (index as u32, &self.states[index])
    }

    /// Store the state at the start of `round_index`. Only the next
    /// contiguous boundary is accepted.
    pub fn memoize(&mut self, round_index: u32, state: G::GlobalState) -> bool {
        if round_index as usize != self.states.len() {
            return false;
        }
        #[cfg(feature = "debug-tracing")]
        tracing::trace!(game = G::NAME, round_index, "memoized boundary");
        self.states.push(state);
        true
    }

    /// State at the start of `round_index`, reducing forward from the latest
    /// memoized boundary. Boundaries at or below `settled` are memoized on
    /// the way.
    pub fn state_at(
        &mut self,
        game: &G,
        history: &TurnHistory<G::TurnData>,
        members: &[Member],
        round_index: u32,
        settled: u32,
    ) -> Result<G::GlobalState, EngineError> {
        if let Some(state) = self.states.get(round_index as usize) {
            self.stats.hits += 1;
            return Ok(state.clone());
        }

        let (mut at, start) = self.latest();
        let mut state = start.clone();
        while at < round_index {
            let round = history.round_or_empty(at);
            state = reducer::reduce_round(game, &state, &round, &self.seed, members)?;
            self.stats.reductions += 1;
            at += 1;
            if at <= settled {
                self.memoize(at, state.clone());
            }
        }
        Ok(state)
    }

    /// Counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub(crate) fn record_reduction(&mut self) {
        self.stats.reductions += 1;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{members, Counter};
    use crate::engine::types::Turn;

    fn history(rounds: u32) -> TurnHistory<i64> {
        (0..rounds)
            .flat_map(|i| vec![Turn::new("p0", i, 1), Turn::new("p1", i, 2)])
            .collect()
    }

    fn cache(members: &[Member]) -> StateCache<Counter> {
        let initial = reducer::initial_state(&Counter, members, "seed").unwrap();
        StateCache::new("seed", initial)
    }

    #[test]
    fn test_cache_matches_replay() {
        let members = members(2);
        let history = history(6);
        let mut cache = cache(&members);

        let cached = cache.state_at(&Counter, &history, &members, 6, 6).unwrap();
        let direct =
            reducer::replay(&Counter, &members, "seed", &history.rounds_before(6)).unwrap();
        assert_eq!(cached, direct);
        assert_eq!(cache.settled_rounds(), 6);
    }

    #[test]
    fn test_extension_costs_one_reduction() {
        let members = members(2);
        let history = history(11);
        let mut cache = cache(&members);

        cache.state_at(&Counter, &history, &members, 10, 10).unwrap();
        let before = cache.stats().reductions;
        cache.state_at(&Counter, &history, &members, 11, 11).unwrap();
        assert_eq!(cache.stats().reductions, before + 1);

        cache.state_at(&Counter, &history, &members, 5, 11).unwrap();
        assert_eq!(cache.stats().reductions, before + 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_open_round_not_memoized() {
        let members = members(2);
        let history = history(3);
        let mut cache = cache(&members);

        // Only two rounds settled; the third boundary is computed but not kept
        cache.state_at(&Counter, &history, &members, 3, 2).unwrap();
        assert_eq!(cache.settled_rounds(), 2);
        assert!(cache.get(3).is_none());
    }

    #[test]
    fn test_memoize_requires_contiguity() {
        let members = members(2);
        let mut cache = cache(&members);
        let state = cache.initial().clone();
        assert!(!cache.memoize(2, state.clone()));
        assert!(cache.memoize(1, state));
        assert_eq!(cache.settled_rounds(), 1);
    }
}
