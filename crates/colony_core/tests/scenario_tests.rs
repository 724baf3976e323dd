//! Scenario file tests.

use colony_core::error::SimError;
use colony_core::scenario::{EpisodeSnapshot, Scenario};
use colony_core::simulation::Colony;
use colony_test_utils::fixtures::{settlement_scenario, terrain_rows, write_scenario};

#[test]
fn test_written_scenario_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = settlement_scenario();
    let path = write_scenario(dir.path(), "settlement", &scenario);

    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded, scenario);

    let snapshot = EpisodeSnapshot::load(&path).unwrap();
    let colony = Colony::new(&snapshot);
    assert_eq!(colony.production().serfs().len(), 10);
    assert_eq!(colony.workforce().worker_capacity(), 100);
}

#[test]
fn test_row_terrain_blocks_cells() {
    let dir = tempfile::tempdir().unwrap();
    let mut scenario = settlement_scenario();
    scenario.terrain = terrain_rows(150, 150, &[(0, 0), (149, 149)]);
    scenario.buildings.clear();
    let path = write_scenario(dir.path(), "rows", &scenario);

    let snapshot = EpisodeSnapshot::load(&path).unwrap();
    assert!(!snapshot.terrain.is_walkable((0, 0)));
    assert!(!snapshot.terrain.is_walkable((149, 149)));
    assert!(snapshot.terrain.is_walkable((1, 0)));
}

#[test]
fn test_ragged_rows_are_rejected() {
    let mut scenario = settlement_scenario();
    let mut rows = vec![".".repeat(150); 150];
    rows[3].pop();
    scenario.terrain = colony_core::scenario::TerrainSpec::Rows(rows);
    assert!(matches!(
        EpisodeSnapshot::new(scenario),
        Err(SimError::InvalidScenario(_))
    ));
}

#[test]
fn test_malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "Scenario(name: ").unwrap();
    match Scenario::load(&path) {
        Err(SimError::DataParseError { path: reported, .. }) => {
            assert!(reported.ends_with("broken.ron"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}
