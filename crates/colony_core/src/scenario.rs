//! Scenario loading.
//!
//! A scenario is the frozen input of an episode: terrain, resource nodes,
//! the headquarters, pre-built buildings, starting serfs and stock. It is
//! read once from RON into an [`EpisodeSnapshot`], from which any number of
//! episodes can be reset.

use crate::buildings::{BlueprintCatalog, BuildingType};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::math::Vec2;
use crate::pathfinding::{GridScale, StaticTerrain};
use crate::resources::{ResourceAmounts, ResourceKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Terrain description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerrainSpec {
    /// Fully walkable rectangle.
    Open {
        /// Cells along x.
        width: u32,
        /// Cells along y.
        height: u32,
    },
    /// Rows of `.` (walkable) and `#` (blocked), top row first.
    Rows(Vec<String>),
}

/// A tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreePlacement {
    /// World x.
    pub x: f64,
    /// World y.
    pub y: f64,
    /// Wood yield.
    pub amount: u32,
}

/// A deposit or shaft.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePlacement {
    /// Resource yielded.
    pub resource: ResourceKind,
    /// World x.
    pub x: f64,
    /// World y.
    pub y: f64,
    /// Yield; shafts fall back to the configured budget.
    #[serde(default)]
    pub amount: Option<u32>,
}

/// A building present from the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Type and level.
    pub building: BuildingType,
    /// World x.
    pub x: f64,
    /// World y.
    pub y: f64,
}

impl BuildingPlacement {
    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Episode input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Walkability layer.
    pub terrain: TerrainSpec,
    /// World units per cell.
    #[serde(default)]
    pub scale: GridScale,
    /// Headquarters position; serfs spawn here.
    pub headquarters: Vec2,
    /// Trees.
    #[serde(default)]
    pub trees: Vec<TreePlacement>,
    /// Surface deposits.
    #[serde(default)]
    pub deposits: Vec<NodePlacement>,
    /// Shafts.
    #[serde(default)]
    pub shafts: Vec<NodePlacement>,
    /// Pre-built buildings, commissioned at reset.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Serfs at start.
    #[serde(default)]
    pub serfs: u32,
    /// Starting stock.
    #[serde(default)]
    pub stockpile: ResourceAmounts,
    /// Tunable overrides.
    #[serde(default)]
    pub config: SimConfig,
}

impl Scenario {
    /// Open field with the headquarters in the middle and nothing else.
    #[must_use]
    pub fn open_field(width: u32, height: u32, scale: GridScale) -> Self {
        Self {
            name: format!("Open field {width}x{height}"),
            description: String::new(),
            terrain: TerrainSpec::Open { width, height },
            scale,
            headquarters: Vec2::new(
                f64::from(width) * scale.x / 2.0,
                f64::from(height) * scale.y / 2.0,
            ),
            trees: Vec::new(),
            deposits: Vec::new(),
            shafts: Vec::new(),
            buildings: Vec::new(),
            serfs: 0,
            stockpile: Vec::new(),
            config: SimConfig::default(),
        }
    }

    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&contents, &path.display().to_string())
    }

    /// Parse a scenario from RON; `label` names the source in errors.
    pub fn from_ron_str(source: &str, label: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| SimError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Build the static terrain layer.
    pub fn build_terrain(&self) -> Result<StaticTerrain> {
        match &self.terrain {
            TerrainSpec::Open { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err(SimError::InvalidScenario("terrain has no cells".into()));
                }
                if !(self.scale.x > 0.0 && self.scale.y > 0.0) {
                    return Err(SimError::InvalidScenario("grid scale must be positive".into()));
                }
                Ok(StaticTerrain::open(*width, *height, self.scale))
            }
            TerrainSpec::Rows(rows) => StaticTerrain::from_rows(rows, self.scale),
        }
    }

    fn validate(&self, terrain: &StaticTerrain, catalog: &BlueprintCatalog) -> Result<()> {
        let inside = |what: &str, pos: Vec2| {
            if terrain.world_to_cell(pos).is_some() {
                Ok(())
            } else {
                Err(SimError::InvalidScenario(format!(
                    "{what} at ({}, {}) is outside the map",
                    pos.x, pos.y
                )))
            }
        };
        inside("headquarters", self.headquarters)?;
        for tree in &self.trees {
            inside("tree", Vec2::new(tree.x, tree.y))?;
        }
        for node in self.deposits.iter().chain(&self.shafts) {
            if !node.resource.is_minable() {
                return Err(SimError::InvalidScenario(format!(
                    "{} cannot be mined",
                    node.resource
                )));
            }
            inside("node", Vec2::new(node.x, node.y))?;
        }
        for building in &self.buildings {
            if catalog.get(building.building).is_none() {
                return Err(SimError::InvalidScenario(format!(
                    "no blueprint for {}",
                    building.building
                )));
            }
            inside("building", building.position())?;
        }
        if let Some((kind, amount)) = self.stockpile.iter().find(|(_, a)| *a < 0.0) {
            return Err(SimError::InvalidScenario(format!(
                "negative starting {kind}: {amount}"
            )));
        }
        self.config.validate().map_err(SimError::InvalidScenario)?;
        catalog.validate().map_err(SimError::InvalidScenario)
    }
}

/// Frozen episode input shared between resets.
#[derive(Debug, Clone)]
pub struct EpisodeSnapshot {
    /// Static terrain.
    pub terrain: Arc<StaticTerrain>,
    /// Scenario content.
    pub scenario: Arc<Scenario>,
    /// Building catalog.
    pub catalog: Arc<BlueprintCatalog>,
}

impl EpisodeSnapshot {
    /// Validate a scenario against the standard catalog.
    pub fn new(scenario: Scenario) -> Result<Self> {
        Self::with_catalog(scenario, BlueprintCatalog::standard())
    }

    /// Validate a scenario against a custom catalog.
    pub fn with_catalog(scenario: Scenario, catalog: BlueprintCatalog) -> Result<Self> {
        let terrain = scenario.build_terrain()?;
        scenario.validate(&terrain, &catalog)?;
        Ok(Self {
            terrain: Arc::new(terrain),
            scenario: Arc::new(scenario),
            catalog: Arc::new(catalog),
        })
    }

    /// Load and validate a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Scenario::load(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingKind;

    const SAMPLE: &str = r#"(
        name: "Sample",
        terrain: Rows([
            "....",
            ".##.",
            "....",
        ]),
        scale: (x: 100.0, y: 100.0),
        headquarters: (x: 50.0, y: 50.0),
        trees: [(x: 350.0, y: 50.0, amount: 75)],
        deposits: [(resource: Clay, x: 50.0, y: 250.0, amount: Some(30))],
        shafts: [(resource: Iron, x: 350.0, y: 250.0)],
        buildings: [(building: (kind: Farm, level: 1), x: 150.0, y: 250.0)],
        serfs: 4,
        stockpile: [(Wood, 100.0)],
        config: (serf_speed: 250.0),
    )"#;

    #[test]
    fn test_parse_sample() {
        let scenario = Scenario::from_ron_str(SAMPLE, "sample").unwrap();
        assert_eq!(scenario.serfs, 4);
        assert_eq!(scenario.shafts[0].amount, None);
        assert_eq!(scenario.config.serf_speed, 250.0);
        assert_eq!(
            scenario.buildings[0].building,
            BuildingType::new(BuildingKind::Farm, 1)
        );

        let snapshot = EpisodeSnapshot::new(scenario).unwrap();
        assert_eq!(snapshot.terrain.width(), 4);
        assert_eq!(snapshot.terrain.height(), 3);
        assert!(!snapshot.terrain.is_walkable((1, 1)));
    }

    #[test]
    fn test_rejects_outside_positions() {
        let mut scenario = Scenario::from_ron_str(SAMPLE, "sample").unwrap();
        scenario.trees.push(TreePlacement {
            x: 5000.0,
            y: 10.0,
            amount: 1,
        });
        assert!(matches!(
            EpisodeSnapshot::new(scenario),
            Err(SimError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_rejects_gold_deposit() {
        let mut scenario = Scenario::open_field(10, 10, GridScale::uniform(10.0));
        scenario.deposits.push(NodePlacement {
            resource: ResourceKind::Gold,
            x: 5.0,
            y: 5.0,
            amount: Some(1),
        });
        assert!(EpisodeSnapshot::new(scenario).is_err());
    }

    #[test]
    fn test_rejects_stalled_serfs() {
        let source = SAMPLE.replace("serf_speed: 250.0", "serf_speed: 0.0");
        let scenario = Scenario::from_ron_str(&source, "sample").unwrap();
        let err = EpisodeSnapshot::new(scenario).unwrap_err();
        assert!(matches!(err, SimError::InvalidScenario(_)));
        assert!(err.to_string().contains("serf_speed"));
    }

    #[test]
    fn test_rejects_instant_blueprint() {
        let scenario = Scenario::from_ron_str(SAMPLE, "sample").unwrap();
        let mut catalog = BlueprintCatalog::standard();
        let farm = BuildingType::new(BuildingKind::Farm, 1);
        let mut blueprint = catalog.get(farm).cloned().unwrap();
        blueprint.build_time = 0.0;
        catalog.register(blueprint);
        assert!(matches!(
            EpisodeSnapshot::with_catalog(scenario, catalog),
            Err(SimError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Scenario::load("/nonexistent/scenario.ron").unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.ron");
        std::fs::write(&path, SAMPLE).unwrap();
        let snapshot = EpisodeSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.scenario.name, "Sample");
    }
}
