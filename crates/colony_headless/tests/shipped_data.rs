//! Checks that the scenario and plan files shipped with this crate load and
//! play.

use std::path::PathBuf;

use colony_core::replay::ReplayPlayer;
use colony_core::resources::ResourceKind;
use colony_core::scenario::EpisodeSnapshot;
use colony_headless::{run_episode, verify_determinism, Plan};

fn data_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn valley() -> EpisodeSnapshot {
    EpisodeSnapshot::load(data_file("scenarios/valley.ron")).unwrap()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_valley_loads() {
    let snapshot = valley();
    assert_eq!(snapshot.scenario.name, "Valley");
    assert_eq!(snapshot.scenario.serfs, 12);
    assert_eq!(snapshot.scenario.buildings.len(), 3);
}

#[test]
fn test_plans_load() {
    for name in ["plans/opening.ron", "plans/builders.ron"] {
        let plan = Plan::load(data_file(name)).unwrap();
        assert_eq!(plan.ticks, 600, "{name}");
        assert!(!plan.commands.is_empty(), "{name}");
        assert!(plan.commands.windows(2).all(|w| w[0].tick <= w[1].tick));
    }
}

// ============================================================================
// Playing
// ============================================================================

#[test]
fn test_opening_plays_and_replays() {
    let snapshot = valley();
    let plan = Plan::load(data_file("plans/opening.ron"))
        .unwrap()
        .with_ticks(150);
    let episode = run_episode(&snapshot, &plan, "opening");

    assert_eq!(episode.metrics.ticks, 150);
    assert!(episode.metrics.commands_applied > 0);
    assert!(episode.metrics.gathered["wood"] > 0.0);
    assert!(episode.metrics.stock(ResourceKind::Gold) >= 0.0);

    let mut player = ReplayPlayer::new(episode.replay).unwrap();
    player.verify().unwrap();
}

#[test]
fn test_builders_deterministic() {
    let snapshot = valley();
    let plan = Plan::load(data_file("plans/builders.ron"))
        .unwrap()
        .with_ticks(120);
    let check = verify_determinism(&snapshot, &plan, 3);
    assert!(check.is_deterministic());
}
