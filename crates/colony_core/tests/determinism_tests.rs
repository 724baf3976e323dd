//! Determinism and replay tests.
//!
//! The same scenario and command stream must always end in the same state,
//! whether run sequentially, on parallel threads or through a replay.

use colony_core::buildings::{BuildingKind, BuildingType};
use colony_core::commands::Command;
use colony_core::math::Vec2;
use colony_core::replay::{Replay, ReplayPlayer};
use colony_core::resources::ResourceKind;
use colony_core::scenario::EpisodeSnapshot;
use colony_core::simulation::Colony;
use colony_test_utils::determinism::strategies::arb_schedule;
use colony_test_utils::determinism::{
    find_first_divergence, run_parallel_colonies, verify_determinism,
};
use colony_test_utils::fixtures::{settlement_colony, settlement_scenario, snapshot};
use proptest::prelude::*;

fn busy_colony() -> Colony {
    let mut colony = settlement_colony();
    colony.assign_wood(4);
    colony.assign_deposit(ResourceKind::Clay, 1);
    colony.assign_shaft(ResourceKind::Iron, 2);
    let farm = BuildingType::new(BuildingKind::Farm, 1);
    if let Some(site) = colony.start_construction(farm, Some(Vec2::new(2000.0, 3000.0))) {
        colony.assign_builders(Some(site), 2);
    }
    colony
}

fn play(snapshot: &EpisodeSnapshot, schedule: &[(u64, Command)], ticks: u64) -> Replay {
    let mut replay = Replay::new(snapshot, 1.0);
    let mut colony = Colony::new(snapshot);
    let mut pending = schedule.iter().peekable();
    for tick in 0..ticks {
        while let Some(&&(at, command)) = pending.peek() {
            if at > tick {
                break;
            }
            colony.apply(command);
            replay.record_command(tick, command);
            pending.next();
        }
        colony.tick(1.0);
    }
    replay.finalize(colony.tick_count(), colony.state_hash());
    replay
}

#[test]
fn test_repeated_runs_match() {
    let result = verify_determinism(
        3,
        300,
        busy_colony,
        |colony| {
            colony.tick(1.0);
        },
        Colony::state_hash,
    );
    result.assert_deterministic();
    assert_eq!(result.unique_hashes().len(), 1);
}

#[test]
fn test_parallel_runs_match() {
    run_parallel_colonies(busy_colony, 4, 200, 1.0).assert_deterministic();
}

#[test]
fn test_no_divergence_tick_by_tick() {
    assert_eq!(find_first_divergence(busy_colony, 150, 1.0), None);
}

#[test]
fn test_reset_reproduces_initial_state() {
    let mut colony = busy_colony();
    let fresh = settlement_colony().state_hash();
    colony.run(50, 1.0);
    assert_ne!(colony.state_hash(), fresh);
    colony.reset();
    assert_eq!(colony.state_hash(), fresh);
    assert_eq!(colony.tick_count(), 0);
}

#[test]
fn test_different_commands_give_different_hashes() {
    let mut a = settlement_colony();
    let mut b = settlement_colony();
    a.assign_wood(2);
    b.assign_wood(3);
    a.run(20, 1.0);
    b.run(20, 1.0);
    assert_ne!(a.state_hash(), b.state_hash());
}

#[test]
fn test_replay_survives_disk_round_trip() {
    let snapshot = snapshot(settlement_scenario());
    let schedule: [(u64, Command); 5] = [
        (0, Command::AssignWood(3)),
        (5, Command::BuySerf(2)),
        (
            10,
            Command::StartConstruction {
                building: BuildingType::new(BuildingKind::Residence, 1),
                position: None,
            },
        ),
        (
            11,
            Command::AssignBuilders {
                site: None,
                count: 3,
            },
        ),
        (40, Command::RecallWood(1)),
    ];
    let replay = play(&snapshot, &schedule, 120);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settlement.replay");
    replay.save(&path).unwrap();
    let loaded = Replay::load(&path).unwrap();

    let mut player = ReplayPlayer::new(loaded).unwrap();
    player.verify().unwrap();
    assert_eq!(player.current_tick(), 120);
    assert_eq!(player.colony().production().serfs().len(), 12);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_random_schedules_replay_exactly(schedule in arb_schedule(80, 12)) {
        let snapshot = snapshot(settlement_scenario());
        let replay = play(&snapshot, &schedule, 80);
        let mut player = ReplayPlayer::new(replay).unwrap();
        prop_assert!(player.verify().is_ok());
    }
}
