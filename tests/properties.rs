//! Property tests for the fold: determinism, order independence, the cache
//! law, monotonic status, and one stored turn per member per round.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use roundtable::core::{Coord, DeterministicRng};
use roundtable::engine::{Engine, GameStatus, Member, PlayerId, Round, Turn, TurnHistory};
use roundtable::games::hearts::{deal, deck, hand_size};
use roundtable::games::territory::{Placement, Territory};
use roundtable::host::{Session, SessionConfig, SubmitOutcome};

const SEED: &str = "property-seed";

fn members(n: usize) -> Vec<Member> {
    (0..n)
        .map(|i| Member::new(format!("m{i}"), format!("Member {i}"), "#123456"))
        .collect()
}

fn engine() -> Engine<Territory> {
    Engine::new(Territory::new(4, 4, 1_000))
}

/// Rounds where every member places one unit; cells are given per seat.
fn rounds_from(cells: &[Vec<(i32, i32)>], members: &[Member]) -> Vec<Round<Placement>> {
    cells
        .iter()
        .enumerate()
        .map(|(index, seats)| {
            Round::from_turns(
                index as u32,
                members.iter().zip(seats).map(|(member, &(x, y))| {
                    Turn::new(
                        member.id.clone(),
                        index as u32,
                        Placement {
                            at: Coord::new(x, y),
                            power: 1,
                        },
                    )
                }),
            )
        })
        .collect()
}

fn cells_strategy(seats: usize) -> impl Strategy<Value = Vec<Vec<(i32, i32)>>> {
    prop::collection::vec(
        prop::collection::vec((0..4i32, 0..4i32), seats..=seats),
        0..12,
    )
}

fn status_rank(status: &GameStatus) -> u8 {
    match status {
        GameStatus::Pending => 0,
        GameStatus::Active => 1,
        GameStatus::Complete { .. } => 2,
    }
}

proptest! {
    #[test]
    fn test_replay_is_deterministic(cells in cells_strategy(3)) {
        let members = members(3);
        let rounds = rounds_from(&cells, &members);
        let engine = engine();

        let first = engine.replay(&members, SEED, &rounds).unwrap();
        let second = engine.replay(&members, SEED, &rounds).unwrap();
        let boundary = rounds.len() as u32;
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            engine.state_hash(boundary, SEED, &first).unwrap(),
            engine.state_hash(boundary, SEED, &second).unwrap()
        );
    }

    #[test]
    fn test_turn_order_within_round_is_irrelevant(
        cells in cells_strategy(3),
        rotation in 0usize..3,
    ) {
        let members = members(3);
        let rounds = rounds_from(&cells, &members);
        let rotated: Vec<Round<Placement>> = rounds
            .iter()
            .map(|round| {
                let mut turns = round.turns.clone();
                let shift = rotation.min(turns.len());
                turns.rotate_left(shift);
                turns.reverse();
                Round::from_turns(round.round_index, turns)
            })
            .collect();

        let engine = engine();
        prop_assert_eq!(
            engine.replay(&members, SEED, &rounds).unwrap(),
            engine.replay(&members, SEED, &rotated).unwrap()
        );
    }

    #[test]
    fn test_cache_agrees_with_fresh_replay(
        cells in cells_strategy(2),
        probes in prop::collection::vec(0usize..13, 1..8),
    ) {
        let members = members(2);
        let rounds = rounds_from(&cells, &members);
        let history: TurnHistory<Placement> = rounds
            .iter()
            .flat_map(|round| round.turns.iter().cloned())
            .collect();
        let engine = engine();
        let mut cache = engine.new_cache(&members, SEED).unwrap();
        let settled = rounds.len() as u32;

        for probe in probes {
            let boundary = probe.min(rounds.len());
            let cached = cache
                .state_at(engine.game(), &history, &members, boundary as u32, settled)
                .unwrap();
            let fresh = engine.replay(&members, SEED, &rounds[..boundary]).unwrap();
            prop_assert_eq!(cached, fresh);
        }
    }

    #[test]
    fn test_status_never_regresses(
        ops in prop::collection::vec((0usize..2, 0..3i32, 0..3i32, 1u32..4), 1..60),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut session = Session::new(
            Arc::new(Engine::new(Territory::new(3, 3, 6))),
            members(2),
            SEED,
            SessionConfig::default(),
        )
        .unwrap();

        let mut previous = session.current_status().clone();
        for (seat, x, y, power) in ops {
            let round = session.pending_round(now).unwrap().round_index;
            let turn = Turn::new(format!("m{seat}").as_str(), round, Placement {
                at: Coord::new(x, y),
                power,
            });
            session.submit_turn(turn, now).unwrap();

            let current = session.current_status().clone();
            prop_assert!(status_rank(&current) >= status_rank(&previous));
            if previous.is_complete() {
                prop_assert_eq!(&current, &previous);
            }
            previous = current;
        }
        prop_assert!(!session.is_faulted());
    }

    #[test]
    fn test_latest_accepted_turn_is_the_one_stored(
        ops in prop::collection::vec((0usize..3, 0u32..3, 0..2i32, 1u32..3), 1..40),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let members = members(2);
        let mut session = Session::new(
            Arc::new(engine()),
            members.clone(),
            SEED,
            SessionConfig::default(),
        )
        .unwrap();

        let mut expected: BTreeMap<(PlayerId, u32), Placement> = BTreeMap::new();
        for (seat, round, x, power) in ops {
            // Seat 2 is not at the table; those calls must fail without storing anything
            let turn = Turn::new(format!("m{seat}").as_str(), round, Placement {
                at: Coord::new(x, 0),
                power,
            });
            let key = (turn.player_id.clone(), turn.round_index);
            let data = turn.data.clone();
            if let Ok(outcome) = session.submit_turn(turn, now) {
                if outcome.is_accepted() {
                    expected.insert(key, data);
                }
            }
        }

        let seated: BTreeSet<_> = members.iter().map(|m| m.id.clone()).collect();
        for round in session.history().iter() {
            let authors: Vec<_> = round.turns.iter().map(|t| t.player_id.clone()).collect();
            let unique: BTreeSet<_> = authors.iter().cloned().collect();
            prop_assert_eq!(authors.len(), unique.len());
            prop_assert!(unique.is_subset(&seated));
            prop_assert!(round.turns.iter().all(|t| t.round_index == round.round_index));
        }

        prop_assert_eq!(session.history().turn_count(), expected.len());
        for ((player_id, round_index), data) in &expected {
            let stored = session
                .history()
                .round(*round_index)
                .and_then(|round| round.turn_of(player_id))
                .map(|turn| &turn.data);
            prop_assert_eq!(stored, Some(data));
        }
    }

    #[test]
    fn test_dealt_cards_are_conserved(seed in "[a-z0-9]{1,16}", count in 3usize..=5) {
        let members = members(count);
        let mut rng = DeterministicRng::for_setup(&seed);
        let hands = deal(&members, &mut rng);

        let mut seen = BTreeSet::new();
        let mut total = 0;
        for hand in hands.values() {
            prop_assert_eq!(hand.len(), hand_size(count));
            total += hand.len();
            seen.extend(hand.iter().copied());
        }
        let full: BTreeSet<_> = deck(count).into_iter().collect();
        prop_assert_eq!(total, full.len());
        prop_assert_eq!(seen, full);
    }
}

#[test]
fn test_changed_placement_replaces_earlier_one() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let members = members(3);
    let mut session = Session::new(Arc::new(engine()), members, SEED, SessionConfig::default()).unwrap();
    let place = |x, y, power| {
        Turn::new("m0", 0, Placement {
            at: Coord::new(x, y),
            power,
        })
    };

    assert!(session.submit_turn(place(0, 0, 1), now).unwrap().is_accepted());
    let second = session.submit_turn(place(3, 3, 2), now).unwrap();
    assert_eq!(
        second,
        SubmitOutcome::Accepted {
            round_index: 0,
            replaced: true
        }
    );

    let stored = session
        .history()
        .round(0)
        .and_then(|round| round.turn_of(&PlayerId::from("m0")))
        .map(|turn| turn.data.clone());
    assert_eq!(
        stored,
        Some(Placement {
            at: Coord::new(3, 3),
            power: 2,
        })
    );
    assert_eq!(session.closed_rounds(), 0);
}
