//! Conflict Resolution
//!
//! Shared rules for simultaneous actions that target the same cell. All
//! helpers take and return ordered collections so results never depend on
//! the order turns were collected in.
//!
//! Rules:
//! 1. Path-blocking: overlapping paths stop at their first shared cell
//! 2. Multiple arrivals with no unique winner destroy each other
//! 3. A sole (or uniquely strongest) arrival claims the cell
//! 4. Power battles drain one unit per contender per pass

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::coord::Coord;

// =============================================================================
// PATH BLOCKING
// =============================================================================

/// Truncate each path at the first cell it shares with any other path.
///
/// Paths list the cells after the origin, destination last. The blocking
/// cell is kept, so the mover ends on it.
pub fn truncate_paths<A: Ord + Clone>(paths: &BTreeMap<A, Vec<Coord>>) -> BTreeMap<A, Vec<Coord>> {
    paths
        .iter()
        .map(|(actor, path)| {
            let stop = path.iter().position(|cell| {
                paths
                    .iter()
                    .any(|(other, other_path)| other != actor && other_path.contains(cell))
            });
            let truncated = match stop {
                Some(i) => path[..=i].to_vec(),
                None => path.clone(),
            };
            (actor.clone(), truncated)
        })
        .collect()
}

// =============================================================================
// ARRIVALS
// =============================================================================

/// Credit for removing a piece.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capture<A> {
    /// Actor credited
    pub by: A,
    /// Piece removed
    pub victim: A,
}

/// What happened at one destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Landing<A> {
    /// One arrival holds the cell.
    Claimed {
        /// Holder
        by: A,
        /// Arrivals beaten by the holder
        beaten: Vec<A>,
        /// Stationary piece removed from the cell
        displaced: Option<A>,
    },
    /// Arrivals destroyed each other; the cell is empty.
    Destroyed {
        /// Every arrival
        arrivals: Vec<A>,
        /// Stationary piece removed from the cell
        displaced: Option<A>,
    },
}

/// Outcome of resolving a set of arrivals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrivalResolution<A, K> {
    /// Per destination, in key order
    pub landings: BTreeMap<K, Landing<A>>,
    /// Capture credits, sorted
    pub captures: Vec<Capture<A>>,
}

impl<A: Clone, K> ArrivalResolution<A, K> {
    /// Actors that survive holding a destination.
    pub fn holders(&self) -> impl Iterator<Item = (&K, &A)> {
        self.landings.iter().filter_map(|(k, landing)| match landing {
            Landing::Claimed { by, .. } => Some((k, by)),
            Landing::Destroyed { .. } => None,
        })
    }
}

/// Resolve simultaneous arrivals.
///
/// `occupant` names a stationary piece already on the destination. `rank`
/// decides contested cells: a unique highest rank claims, otherwise every
/// arrival and the occupant are destroyed, and each arrival is credited
/// with every other arrival and the occupant.
pub fn resolve_arrivals<A, K, R>(
    arrivals: impl IntoIterator<Item = (A, K)>,
    occupant: impl Fn(&K) -> Option<A>,
    rank: impl Fn(&A) -> R,
) -> ArrivalResolution<A, K>
where
    A: Ord + Clone,
    K: Ord + Clone,
    R: Ord,
{
    let mut by_dest: BTreeMap<K, Vec<A>> = BTreeMap::new();
    for (actor, dest) in arrivals {
        by_dest.entry(dest).or_default().push(actor);
    }

    let mut landings = BTreeMap::new();
    let mut captures = Vec::new();

    for (dest, mut actors) in by_dest {
        actors.sort();
        actors.dedup();
        let displaced = occupant(&dest);

        let winner = match actors.as_slice() {
            [only] => Some(only.clone()),
            _ => {
                let best = actors.iter().map(&rank).max();
                let mut top = actors.iter().filter(|a| Some(rank(*a)) == best);
                match (top.next(), top.next()) {
                    (Some(unique), None) => Some(unique.clone()),
                    _ => None,
                }
            }
        };

        let landing = match winner {
            Some(by) => {
                let beaten: Vec<A> = actors.iter().filter(|a| **a != by).cloned().collect();
                for victim in beaten.iter().chain(displaced.iter()) {
                    captures.push(Capture {
                        by: by.clone(),
                        victim: victim.clone(),
                    });
                }
                Landing::Claimed {
                    by,
                    beaten,
                    displaced,
                }
            }
            None => {
                for by in &actors {
                    for victim in actors.iter().filter(|v| *v != by).chain(displaced.iter()) {
                        captures.push(Capture {
                            by: by.clone(),
                            victim: victim.clone(),
                        });
                    }
                }
                Landing::Destroyed {
                    arrivals: actors,
                    displaced,
                }
            }
        };
        landings.insert(dest, landing);
    }

    captures.sort();
    ArrivalResolution { landings, captures }
}

// =============================================================================
// POWER BATTLES
// =============================================================================

/// One owner's stake in a contested cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contender<O> {
    /// Owner
    pub owner: O,
    /// Power deployed onto the contested cell this round
    pub reinforcement: u32,
    /// Supporting territory cells and their power
    pub cells: BTreeMap<Coord, u32>,
}

impl<O> Contender<O> {
    /// Contender with no supporting territory.
    pub fn new(owner: O, reinforcement: u32) -> Self {
        Self {
            owner,
            reinforcement,
            cells: BTreeMap::new(),
        }
    }

    /// Total contending power.
    pub fn power(&self) -> u32 {
        self.reinforcement + self.cells.values().sum::<u32>()
    }

    /// Remove one unit: reinforcement first, then the lowest coordinate
    /// cell that still has power.
    fn lose_one(&mut self) {
        if self.reinforcement > 0 {
            self.reinforcement -= 1;
            return;
        }
        if let Some(power) = self.cells.values_mut().find(|p| **p > 0) {
            *power -= 1;
        }
    }
}

/// Result of a power battle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleOutcome<O> {
    /// Owner left with power, if any
    pub survivor: Option<O>,
    /// Contenders after draining, in owner order
    pub contenders: Vec<Contender<O>>,
    /// Drain passes performed
    pub passes: u32,
}

/// Drain contenders one unit each per pass until at most one has power.
pub fn resolve_power_battle<O: Ord + Clone>(mut contenders: Vec<Contender<O>>) -> BattleOutcome<O> {
    contenders.sort_by(|a, b| a.owner.cmp(&b.owner));

    let mut passes = 0;
    while contenders.iter().filter(|c| c.power() > 0).count() > 1 {
        for contender in contenders.iter_mut().filter(|c| c.power() > 0) {
            contender.lose_one();
        }
        passes += 1;
    }

    let survivor = contenders
        .iter()
        .find(|c| c.power() > 0)
        .map(|c| c.owner.clone());

    BattleOutcome {
        survivor,
        contenders,
        passes,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn test_crossing_paths_truncate_at_intersection() {
        let mut paths = BTreeMap::new();
        // Horizontal slide across row 2, vertical slide down column 2
        paths.insert("rook", vec![c(1, 2), c(2, 2), c(3, 2), c(4, 2)]);
        paths.insert("queen", vec![c(2, 0), c(2, 1), c(2, 2), c(2, 3)]);
        paths.insert("pawn", vec![c(7, 7)]);

        let truncated = truncate_paths(&paths);
        assert_eq!(truncated["rook"], vec![c(1, 2), c(2, 2)]);
        assert_eq!(truncated["queen"], vec![c(2, 0), c(2, 1), c(2, 2)]);
        assert_eq!(truncated["pawn"], vec![c(7, 7)]);
    }

    #[test]
    fn test_single_arrival_claims_and_captures_occupant() {
        let resolution = resolve_arrivals(
            vec![("white", c(4, 4))],
            |k| (*k == c(4, 4)).then_some("black"),
            |_| 0,
        );

        assert_eq!(
            resolution.landings[&c(4, 4)],
            Landing::Claimed {
                by: "white",
                beaten: vec![],
                displaced: Some("black")
            }
        );
        assert_eq!(
            resolution.captures,
            vec![Capture {
                by: "white",
                victim: "black"
            }]
        );
    }

    #[test]
    fn test_multiple_arrivals_destroy_with_mutual_credit() {
        let resolution = resolve_arrivals(
            vec![("b", c(0, 0)), ("a", c(0, 0)), ("c", c(1, 1))],
            |_| None,
            |_| 0,
        );

        assert_eq!(
            resolution.landings[&c(0, 0)],
            Landing::Destroyed {
                arrivals: vec!["a", "b"],
                displaced: None
            }
        );
        assert_eq!(
            resolution.captures,
            vec![
                Capture { by: "a", victim: "b" },
                Capture { by: "b", victim: "a" },
            ]
        );
        assert_eq!(resolution.holders().count(), 1);
    }

    #[test]
    fn test_unique_rank_wins_contested_cell() {
        let resolution = resolve_arrivals(
            vec![("knight", c(3, 3)), ("king", c(3, 3))],
            |_| None,
            |a| if *a == "king" { 2 } else { 1 },
        );

        match &resolution.landings[&c(3, 3)] {
            Landing::Claimed { by, beaten, .. } => {
                assert_eq!(*by, "king");
                assert_eq!(beaten, &vec!["knight"]);
            }
            other => panic!("unexpected landing {other:?}"),
        }
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let forward = resolve_arrivals(
            vec![("a", c(0, 0)), ("b", c(0, 0)), ("c", c(0, 1))],
            |_| None,
            |_| 0,
        );
        let backward = resolve_arrivals(
            vec![("c", c(0, 1)), ("b", c(0, 0)), ("a", c(0, 0))],
            |_| None,
            |_| 0,
        );
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_equal_power_mutual_destruction() {
        let outcome =
            resolve_power_battle(vec![Contender::new("a", 1), Contender::new("b", 1)]);
        assert_eq!(outcome.survivor, None);
        assert!(outcome.contenders.iter().all(|c| c.power() == 0));
        assert_eq!(outcome.passes, 1);
    }

    #[test]
    fn test_territory_drains_lowest_cell_first() {
        let mut defender = Contender::new("defender", 0);
        defender.cells.insert(c(1, 0), 1);
        defender.cells.insert(c(0, 0), 2);
        let attacker = Contender::new("attacker", 1);

        let outcome = resolve_power_battle(vec![defender, attacker]);
        assert_eq!(outcome.survivor, Some("defender"));

        let defender = outcome
            .contenders
            .iter()
            .find(|c| c.owner == "defender")
            .unwrap();
        assert_eq!(defender.power(), 2);
        assert_eq!(defender.cells[&c(0, 0)], 1);
        assert_eq!(defender.cells[&c(1, 0)], 1);
    }

    #[test]
    fn test_round_robin_not_biggest_first() {
        let outcome = resolve_power_battle(vec![
            Contender::new("a", 5),
            Contender::new("b", 2),
            Contender::new("c", 3),
        ]);
        // Three passes remove b and c; a keeps 5 - 3
        assert_eq!(outcome.survivor, Some("a"));
        assert_eq!(outcome.passes, 3);
        assert_eq!(outcome.contenders[0].power(), 2);
    }
}
