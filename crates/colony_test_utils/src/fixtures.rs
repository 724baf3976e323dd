//! Test fixtures and helpers.
//!
//! Pre-built scenarios and colonies for consistent testing.

use colony_core::buildings::{BuildingKind, BuildingType};
use colony_core::math::Vec2;
use colony_core::pathfinding::{GridScale, StaticTerrain, WalkableGrid};
use colony_core::resources::ResourceKind;
use colony_core::scenario::{
    BuildingPlacement, EpisodeSnapshot, NodePlacement, Scenario, TerrainSpec, TreePlacement,
};
use colony_core::simulation::Colony;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Scale used by most fixtures: 40 world units per cell.
pub const FIXTURE_SCALE: f64 = 40.0;

/// Fully walkable `size`×`size` grid.
#[must_use]
pub fn open_grid(size: u32, scale: f64) -> WalkableGrid {
    WalkableGrid::new(Arc::new(StaticTerrain::open(
        size,
        size,
        GridScale::uniform(scale),
    )))
}

/// 100×100 walkable grid with a 10×10 blocked square in the middle.
#[must_use]
pub fn grid_with_central_block(scale: f64) -> WalkableGrid {
    let rows: Vec<String> = (0..100)
        .map(|y| {
            (0..100)
                .map(|x| {
                    if (45..55).contains(&x) && (45..55).contains(&y) {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect()
        })
        .collect();
    let terrain = StaticTerrain::from_rows(&rows, GridScale::uniform(scale))
        .expect("fixture terrain is well formed");
    WalkableGrid::new(Arc::new(terrain))
}

/// World position of a cell centre at [`FIXTURE_SCALE`].
#[must_use]
pub fn cell_center(x: u32, y: u32) -> Vec2 {
    Vec2::new(
        (f64::from(x) + 0.5) * FIXTURE_SCALE,
        (f64::from(y) + 0.5) * FIXTURE_SCALE,
    )
}

/// Empty 150×150 field with the headquarters in the middle.
#[must_use]
pub fn field_scenario() -> Scenario {
    Scenario::open_field(150, 150, GridScale::uniform(FIXTURE_SCALE))
}

/// Field with a headquarters, trees, deposits and shafts around the centre.
#[must_use]
pub fn settlement_scenario() -> Scenario {
    let mut scenario = field_scenario();
    scenario.name = "Settlement".to_string();
    let hq = scenario.headquarters;
    scenario.serfs = 10;
    scenario.buildings.push(BuildingPlacement {
        building: BuildingType::new(BuildingKind::Headquarters, 1),
        x: hq.x,
        y: hq.y,
    });
    scenario.trees = (0..8)
        .map(|i| TreePlacement {
            x: hq.x - 1500.0 + f64::from(i) * 120.0,
            y: hq.y - 1200.0,
            amount: 75,
        })
        .collect();
    scenario.deposits = vec![
        NodePlacement {
            resource: ResourceKind::Clay,
            x: hq.x + 1200.0,
            y: hq.y,
            amount: Some(60),
        },
        NodePlacement {
            resource: ResourceKind::Stone,
            x: hq.x,
            y: hq.y + 1400.0,
            amount: Some(60),
        },
    ];
    scenario.shafts = vec![NodePlacement {
        resource: ResourceKind::Iron,
        x: hq.x + 1600.0,
        y: hq.y + 1600.0,
        amount: None,
    }];
    scenario.stockpile = vec![
        (ResourceKind::Gold, 500.0),
        (ResourceKind::Wood, 1500.0),
        (ResourceKind::Stone, 1500.0),
        (ResourceKind::Clay, 1500.0),
    ];
    scenario
}

/// Validate a scenario built by a fixture.
///
/// # Panics
///
/// Panics if the scenario does not validate.
#[must_use]
pub fn snapshot(scenario: Scenario) -> EpisodeSnapshot {
    EpisodeSnapshot::new(scenario).expect("fixture scenario is valid")
}

/// Fresh colony from [`settlement_scenario`].
#[must_use]
pub fn settlement_colony() -> Colony {
    Colony::new(&snapshot(settlement_scenario()))
}

/// Terrain rows for a scenario file, walkable except for `blocked` cells.
#[must_use]
pub fn terrain_rows(width: u32, height: u32, blocked: &[(u32, u32)]) -> TerrainSpec {
    TerrainSpec::Rows(
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| if blocked.contains(&(x, y)) { '#' } else { '.' })
                    .collect()
            })
            .collect(),
    )
}

/// Write a scenario as pretty RON into `dir`.
///
/// # Panics
///
/// Panics if serialization or writing fails.
pub fn write_scenario(dir: &Path, name: &str, scenario: &Scenario) -> PathBuf {
    let path = dir.join(format!("{name}.ron"));
    let text = ron::ser::to_string_pretty(scenario, ron::ser::PrettyConfig::default())
        .expect("scenario serializes");
    std::fs::write(&path, text).expect("scenario file is writable");
    path
}
