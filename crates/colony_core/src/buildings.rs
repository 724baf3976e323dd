//! Building catalog.
//!
//! Every constructible building type and level has a blueprint: footprint,
//! build time, cost, the role the finished building plays in the economy and
//! the staff it brings with it.

use crate::error::{Result, SimError};
use crate::pathfinding::FootprintClass;
use crate::resources::{ResourceAmounts, ResourceKind};
use crate::workforce::WorkerKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Building family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Colony seat; serfs spawn here and refiners fetch supplies here.
    Headquarters,
    /// Raises the worker limit.
    VillageCenter,
    /// Resting place for workers.
    Residence,
    /// Feeding place for workers.
    Farm,
    /// Stone mine.
    StoneMine,
    /// Clay mine.
    ClayMine,
    /// Iron mine.
    IronMine,
    /// Sulfur mine.
    SulfurMine,
    /// Wood refiner.
    Sawmill,
    /// Clay refiner.
    Brickworks,
    /// Stone refiner.
    Stonemason,
    /// Iron refiner.
    Smithy,
    /// Sulfur refiner.
    Alchemist,
    /// Gold refiner.
    Bank,
    /// Research building.
    University,
}

impl BuildingKind {
    /// Mine kind for a minable resource.
    #[must_use]
    pub const fn mine_for(resource: ResourceKind) -> Option<Self> {
        match resource {
            ResourceKind::Stone => Some(Self::StoneMine),
            ResourceKind::Clay => Some(Self::ClayMine),
            ResourceKind::Iron => Some(Self::IronMine),
            ResourceKind::Sulfur => Some(Self::SulfurMine),
            ResourceKind::Gold | ResourceKind::Wood => None,
        }
    }

    /// Resource mined, for mine kinds.
    #[must_use]
    pub const fn mined_resource(self) -> Option<ResourceKind> {
        match self {
            Self::StoneMine => Some(ResourceKind::Stone),
            Self::ClayMine => Some(ResourceKind::Clay),
            Self::IronMine => Some(ResourceKind::Iron),
            Self::SulfurMine => Some(ResourceKind::Sulfur),
            _ => None,
        }
    }
}

/// Highest building level.
pub const MAX_LEVEL: u8 = 3;

/// A building kind at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingType {
    /// Family.
    pub kind: BuildingKind,
    /// Level, starting at 1.
    pub level: u8,
}

impl BuildingType {
    /// Construct a building type.
    #[must_use]
    pub const fn new(kind: BuildingKind, level: u8) -> Self {
        Self { kind, level }
    }
}

impl std::fmt::Display for BuildingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} L{}", self.kind, self.level)
    }
}

/// What a finished building contributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FacilityRole {
    /// Adds to the worker limit.
    Housing {
        /// Extra worker capacity.
        worker_capacity: u32,
    },
    /// Worker feeding place.
    Farm,
    /// Worker resting place.
    Residence,
    /// Tier-1 mine.
    Mine {
        /// Resource mined.
        resource: ResourceKind,
    },
    /// Tier-2 refiner.
    Refiner {
        /// Input drawn from the stockpile.
        input: ResourceKind,
        /// Refined output.
        output: ResourceKind,
        /// Input units per output unit.
        ratio: f64,
    },
    /// Staffed building without modelled output.
    Workshop,
}

/// Construction data for one building type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Type this blueprint describes.
    pub building: BuildingType,
    /// Footprint size class.
    pub footprint: FootprintClass,
    /// Work-seconds needed with a single builder.
    pub build_time: f64,
    /// Resources deducted when construction starts.
    pub cost: ResourceAmounts,
    /// Economic role once finished.
    pub role: FacilityRole,
    /// Profession of the staff.
    pub worker_kind: Option<WorkerKind>,
    /// Staff spawned on completion.
    pub workers: u32,
}

impl Blueprint {
    /// Reject data the simulation cannot make progress with.
    pub fn check(&self) -> std::result::Result<(), String> {
        let building = self.building;
        if building.level == 0 || building.level > MAX_LEVEL {
            return Err(format!("{building} is outside levels 1..={MAX_LEVEL}"));
        }
        if !(self.build_time.is_finite() && self.build_time > 0.0) {
            return Err(format!(
                "{building} build_time must be positive, got {}",
                self.build_time
            ));
        }
        if let FacilityRole::Refiner { ratio, .. } = self.role {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(format!("{building} refiner ratio must be positive, got {ratio}"));
            }
        }
        if self.cost.iter().any(|&(_, amount)| amount < 0.0) {
            return Err(format!("{building} has a negative cost"));
        }
        Ok(())
    }
}

/// Registry of blueprints by building type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintCatalog {
    entries: BTreeMap<BuildingType, Blueprint>,
}

impl Default for BlueprintCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn cost(wood: f64, stone: f64, clay: f64) -> ResourceAmounts {
    [
        (ResourceKind::Wood, wood),
        (ResourceKind::Stone, stone),
        (ResourceKind::Clay, clay),
    ]
    .into_iter()
    .filter(|&(_, amount)| amount > 0.0)
    .collect()
}

impl BlueprintCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) a blueprint.
    pub fn register(&mut self, blueprint: Blueprint) {
        self.entries.insert(blueprint.building, blueprint);
    }

    /// Look up a blueprint.
    #[must_use]
    pub fn get(&self, building: BuildingType) -> Option<&Blueprint> {
        self.entries.get(&building)
    }

    /// Blueprints in type order.
    pub fn iter(&self) -> impl Iterator<Item = &Blueprint> {
        self.entries.values()
    }

    /// Parse a list of blueprints from RON.
    pub fn from_ron(source: &str, label: &str) -> Result<Self> {
        let blueprints: Vec<Blueprint> =
            ron::from_str(source).map_err(|e| SimError::DataParseError {
                path: label.to_string(),
                message: e.to_string(),
            })?;
        let mut catalog = Self::empty();
        for blueprint in blueprints {
            blueprint
                .check()
                .map_err(|message| SimError::DataParseError {
                    path: label.to_string(),
                    message,
                })?;
            catalog.register(blueprint);
        }
        Ok(catalog)
    }

    /// Check every blueprint; the error names the first bad one.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.entries.values().try_for_each(Blueprint::check)
    }

    /// The stock building set.
    #[must_use]
    pub fn standard() -> Self {
        use BuildingKind as K;
        use FootprintClass::{Large, Medium, Small};

        let mut catalog = Self::empty();
        let mut add = |kind: BuildingKind,
                       level: u8,
                       footprint: FootprintClass,
                       build_time: f64,
                       cost: ResourceAmounts,
                       role: FacilityRole,
                       staff: Option<(WorkerKind, u32)>| {
            catalog.register(Blueprint {
                building: BuildingType::new(kind, level),
                footprint,
                build_time,
                cost,
                role,
                worker_kind: staff.map(|(k, _)| k),
                workers: staff.map_or(0, |(_, n)| n),
            });
        };

        let hq = [
            (110.0, cost(500.0, 500.0, 500.0), 100),
            (180.0, cost(800.0, 800.0, 800.0), 150),
            (300.0, cost(1200.0, 1200.0, 1200.0), 200),
        ];
        let village = [
            (100.0, cost(250.0, 200.0, 200.0), 75),
            (150.0, cost(450.0, 400.0, 400.0), 100),
            (220.0, cost(700.0, 600.0, 600.0), 150),
        ];
        for (i, ((hq_time, hq_cost, hq_cap), (vc_time, vc_cost, vc_cap))) in
            hq.into_iter().zip(village).enumerate()
        {
            let level = i as u8 + 1;
            let housing = |worker_capacity| FacilityRole::Housing { worker_capacity };
            add(K::Headquarters, level, Large, hq_time, hq_cost, housing(hq_cap), None);
            add(K::VillageCenter, level, Large, vc_time, vc_cost, housing(vc_cap), None);
        }

        let residences = [
            (60.0, cost(150.0, 100.0, 100.0)),
            (100.0, cost(250.0, 200.0, 200.0)),
            (150.0, cost(400.0, 400.0, 400.0)),
        ];
        for (i, (time, c)) in residences.into_iter().enumerate() {
            add(K::Residence, i as u8 + 1, Small, time, c, FacilityRole::Residence, None);
        }

        let farms = [
            (80.0, cost(200.0, 100.0, 150.0), 2),
            (120.0, cost(350.0, 200.0, 300.0), 4),
            (180.0, cost(550.0, 400.0, 500.0), 6),
        ];
        for (i, (time, c, staff)) in farms.into_iter().enumerate() {
            let staff = Some((WorkerKind::Farmer, staff));
            add(K::Farm, i as u8 + 1, Medium, time, c, FacilityRole::Farm, staff);
        }

        let mines = [
            (K::StoneMine, [cost(300.0, 0.0, 200.0), cost(400.0, 200.0, 300.0), cost(500.0, 300.0, 500.0)]),
            (K::ClayMine, [cost(350.0, 250.0, 0.0), cost(450.0, 350.0, 100.0), cost(550.0, 450.0, 200.0)]),
            (K::IronMine, [cost(300.0, 300.0, 0.0), cost(400.0, 450.0, 200.0), cost(500.0, 600.0, 400.0)]),
            (K::SulfurMine, [cost(300.0, 200.0, 300.0), cost(400.0, 300.0, 400.0), cost(500.0, 400.0, 600.0)]),
        ];
        for (kind, costs) in mines {
            let Some(resource) = kind.mined_resource() else {
                continue;
            };
            for (i, c) in costs.into_iter().enumerate() {
                let level = i as u8 + 1;
                let staff = crate::production::MINE_SLOTS[i];
                add(
                    kind,
                    level,
                    Medium,
                    [120.0, 180.0, 240.0][i],
                    c,
                    FacilityRole::Mine { resource },
                    Some((WorkerKind::Miner, staff)),
                );
            }
        }

        let slots = crate::production::REFINER_SLOTS;
        let refiners: [(BuildingKind, ResourceKind, f64, WorkerKind, Vec<(f64, ResourceAmounts)>); 6] = [
            (K::Sawmill, ResourceKind::Wood, 4.0, WorkerKind::SawmillWorker,
                vec![(100.0, cost(0.0, 300.0, 150.0)), (160.0, cost(200.0, 400.0, 300.0))]),
            (K::Brickworks, ResourceKind::Clay, 4.0, WorkerKind::Brickmaker,
                vec![(110.0, cost(400.0, 300.0, 0.0)), (170.0, cost(500.0, 400.0, 200.0))]),
            (K::Stonemason, ResourceKind::Stone, 4.0, WorkerKind::Stonecutter,
                vec![(110.0, cost(300.0, 0.0, 200.0)), (170.0, cost(400.0, 200.0, 400.0))]),
            (K::Smithy, ResourceKind::Iron, 4.0, WorkerKind::Smith,
                vec![(110.0, cost(400.0, 300.0, 0.0)), (160.0, cost(500.0, 400.0, 200.0)), (220.0, cost(600.0, 500.0, 400.0))]),
            (K::Alchemist, ResourceKind::Sulfur, 3.0, WorkerKind::Alchemist,
                vec![(120.0, cost(300.0, 400.0, 100.0)), (180.0, cost(400.0, 500.0, 300.0))]),
            (K::Bank, ResourceKind::Gold, 2.0, WorkerKind::Treasurer,
                vec![(130.0, cost(500.0, 500.0, 0.0)), (200.0, cost(600.0, 600.0, 200.0))]),
        ];
        for (kind, resource, ratio, worker, levels) in refiners {
            let role = FacilityRole::Refiner {
                input: resource,
                output: resource,
                ratio,
            };
            for (i, (time, c)) in levels.into_iter().enumerate() {
                add(kind, i as u8 + 1, Medium, time, c, role, Some((worker, slots)));
            }
        }

        add(
            K::University,
            1,
            Large,
            90.0,
            cost(200.0, 0.0, 300.0),
            FacilityRole::Workshop,
            Some((WorkerKind::Scholar, 6)),
        );
        let mut upgrade = cost(0.0, 100.0, 100.0);
        upgrade.push((ResourceKind::Gold, 150.0));
        add(
            K::University,
            2,
            Large,
            60.0,
            upgrade,
            FacilityRole::Workshop,
            Some((WorkerKind::Scholar, 8)),
        );

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_contents() {
        let catalog = BlueprintCatalog::standard();
        let farm = catalog.get(BuildingType::new(BuildingKind::Farm, 1)).unwrap();
        assert_eq!(farm.build_time, 80.0);
        assert_eq!(farm.workers, 2);
        assert_eq!(farm.worker_kind, Some(WorkerKind::Farmer));

        let mine = catalog
            .get(BuildingType::new(BuildingKind::IronMine, 2))
            .unwrap();
        assert_eq!(mine.workers, 6);
        assert_eq!(
            mine.role,
            FacilityRole::Mine {
                resource: ResourceKind::Iron
            }
        );

        assert!(catalog
            .get(BuildingType::new(BuildingKind::Sawmill, 3))
            .is_none());
        assert!(catalog
            .get(BuildingType::new(BuildingKind::Smithy, 3))
            .is_some());
    }

    #[test]
    fn test_every_blueprint_is_buildable() {
        for blueprint in BlueprintCatalog::standard().iter() {
            assert!(blueprint.build_time > 0.0, "{}", blueprint.building);
            assert!(!blueprint.cost.is_empty(), "{}", blueprint.building);
            assert_eq!(blueprint.worker_kind.is_some(), blueprint.workers > 0);
        }
    }

    #[test]
    fn test_from_ron() {
        let source = r#"[
            (
                building: (kind: Farm, level: 1),
                footprint: Small,
                build_time: 10.0,
                cost: [(Wood, 5.0)],
                role: Farm,
                worker_kind: Some(Farmer),
                workers: 1,
            ),
        ]"#;
        let catalog = BlueprintCatalog::from_ron(source, "inline").unwrap();
        let farm = catalog.get(BuildingType::new(BuildingKind::Farm, 1)).unwrap();
        assert_eq!(farm.build_time, 10.0);
        assert_eq!(farm.footprint, FootprintClass::Small);
        assert!(BlueprintCatalog::from_ron("[(", "broken").is_err());
    }

    fn farm_ron(level: u8, build_time: f64) -> String {
        format!(
            "[(building: (kind: Farm, level: {level}), footprint: Small, build_time: {build_time:?}, \
             cost: [(Wood, 5.0)], role: Farm, worker_kind: Some(Farmer), workers: 1)]"
        )
    }

    #[test]
    fn test_from_ron_rejects_unbuildable() {
        for (level, build_time) in [(1, 0.0), (1, -5.0), (0, 10.0), (4, 10.0)] {
            let result = BlueprintCatalog::from_ron(&farm_ron(level, build_time), "farms");
            assert!(
                matches!(result, Err(SimError::DataParseError { .. })),
                "level {level} build_time {build_time}"
            );
        }
        assert!(BlueprintCatalog::from_ron(&farm_ron(3, 10.0), "farms").is_ok());
    }

    #[test]
    fn test_from_ron_rejects_free_refiner() {
        let source = r#"[(
            building: (kind: Smithy, level: 1),
            footprint: Medium,
            build_time: 10.0,
            cost: [(Wood, 5.0)],
            role: Refiner(input: Iron, output: Iron, ratio: 0.0),
            worker_kind: Some(Smith),
            workers: 1,
        )]"#;
        let err = BlueprintCatalog::from_ron(source, "smithy").unwrap_err();
        assert!(err.to_string().contains("ratio"));
    }

    #[test]
    fn test_standard_catalog_validates() {
        assert_eq!(BlueprintCatalog::standard().validate(), Ok(()));
    }
}
