//! Workforce fatigue tests.
//!
//! Drive the worker state machine through whole care cycles and check the
//! bounds that hold for any mix of workers and facilities.

use colony_core::math::Vec2;
use colony_core::workforce::{Employer, WorkerKind, WorkerState, WorkforceSimulator};
use colony_test_utils::determinism::strategies::{arb_dt, arb_position, arb_worker_kind};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn states_seen(workforce: &mut WorkforceSimulator, ticks: u32, dt: f64) -> BTreeSet<WorkerState> {
    let mut seen = BTreeSet::new();
    for _ in 0..ticks {
        workforce.tick(dt, 1.0);
        seen.extend(workforce.workers().map(|w| w.state));
    }
    seen
}

#[test]
fn test_worker_without_facilities_camps_and_returns() {
    let mut workforce = WorkforceSimulator::new(10);
    let site = Vec2::new(1000.0, 1000.0);
    workforce.add_worker(WorkerKind::Miner, site, site, Employer::Other);

    let seen = states_seen(&mut workforce, 60, 1.0);
    assert!(seen.contains(&WorkerState::Camping));
    assert!(!seen.contains(&WorkerState::Eating));
    assert!(!seen.contains(&WorkerState::Resting));
    assert!(seen.contains(&WorkerState::Working));
}

#[test]
fn test_worker_eats_then_rests_then_works() {
    let mut workforce = WorkforceSimulator::new(10);
    let site = Vec2::new(1000.0, 1000.0);
    workforce.add_farm(Vec2::new(1300.0, 1000.0), 1);
    workforce.add_residence(Vec2::new(1000.0, 1300.0), 1);
    let id = workforce
        .add_worker(WorkerKind::Scholar, site, site, Employer::Other)
        .unwrap();

    let mut order = Vec::new();
    for _ in 0..40 {
        workforce.tick(1.0, 1.0);
        let state = workforce.worker(id).unwrap().state;
        if order.last() != Some(&state) {
            order.push(state);
        }
    }

    let eat = order.iter().position(|s| *s == WorkerState::Eating).unwrap();
    let rest = order.iter().position(|s| *s == WorkerState::Resting).unwrap();
    assert!(eat < rest);
    assert!(order[rest..].contains(&WorkerState::Working));
    assert!(workforce.worker(id).unwrap().work_time > 0.0);
}

#[test]
fn test_full_farm_sends_worker_elsewhere() {
    let mut workforce = WorkforceSimulator::new(40);
    let site = Vec2::new(1000.0, 1000.0);
    workforce.add_farm(site, 1);
    for _ in 0..20 {
        workforce.add_worker(WorkerKind::Farmer, site, site, Employer::Other);
    }
    for _ in 0..200 {
        workforce.tick(0.5, 1.0);
        let farm = workforce.farms().next().unwrap();
        assert!(farm.occupants <= farm.capacity());
    }
}

#[test]
fn test_stats_cover_every_worker() {
    let mut workforce = WorkforceSimulator::new(10);
    let site = Vec2::new(500.0, 500.0);
    for kind in [WorkerKind::Miner, WorkerKind::Smith, WorkerKind::Farmer] {
        workforce.add_worker(kind, site, site, Employer::Other);
    }
    workforce.tick(1.0, 1.0);
    let stats = workforce.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_state.values().sum::<u32>(), 3);
    assert_eq!(stats.by_state[&WorkerState::Working], 3);
    assert!((stats.average_efficiency - 1.0).abs() < 1e-12);
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_fatigue_and_seats_stay_bounded(
        kinds in prop::collection::vec(arb_worker_kind(), 1..16),
        farms in prop::collection::vec((arb_position(100, 40.0), 1u8..=3), 0..3),
        residences in prop::collection::vec((arb_position(100, 40.0), 1u8..=3), 0..3),
        workplace in arb_position(100, 40.0),
        dt in arb_dt(),
        morale in 0.25f64..3.0,
        ticks in 1u32..300,
    ) {
        let mut workforce = WorkforceSimulator::new(kinds.len() as u32);
        for &(position, level) in &farms {
            workforce.add_farm(position, level);
        }
        for &(position, level) in &residences {
            workforce.add_residence(position, level);
        }
        for &kind in &kinds {
            workforce.add_worker(kind, workplace, workplace, Employer::Other);
        }

        for _ in 0..ticks {
            workforce.tick(dt, morale);

            for worker in workforce.workers() {
                prop_assert!(worker.work_time >= 0.0);
                prop_assert!(worker.work_time <= worker.params().max_work_time());
                let eff = worker.efficiency();
                prop_assert!((0.0..=1.0).contains(&eff));
            }
            for (facilities, seated) in [
                (workforce.farms().collect::<Vec<_>>(), WorkerState::Eating),
                (workforce.residences().collect::<Vec<_>>(), WorkerState::Resting),
            ] {
                for facility in facilities {
                    let occupants = workforce
                        .workers()
                        .filter(|w| w.state == seated && w.facility == Some(facility.id))
                        .count() as u32;
                    prop_assert!(facility.occupants <= facility.capacity());
                    prop_assert_eq!(facility.occupants, occupants);
                }
            }
        }
    }
}
