//! # Colony Core
//!
//! Deterministic simulation core for a settlement economy.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO outside scenario and replay loading
//! - No system randomness
//!
//! Identical scenarios and command streams produce identical states, which
//! enables batch experiments, replays and determinism testing.
//!
//! ## Crate Structure
//!
//! - [`pathfinding`] - Walkability grid, building footprints and A* routing
//! - [`workforce`] - Worker fatigue state machines, farms and residences
//! - [`production`] - Mines, refiners and the stockpile
//! - [`serfs`] - Direct gatherers and builders
//! - [`nodes`] - Trees, deposits and shafts
//! - [`allocation`] - Serf assignment, depletion and reassignment
//! - [`buildings`] - Building catalog
//! - [`construction`] - Construction sites
//! - [`morale`] - Taxes and blessings
//! - [`simulation`] - The [`simulation::Colony`] orchestrator
//! - [`replay`] - Recording and verification of episodes

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod allocation;
pub mod buildings;
pub mod commands;
pub mod config;
pub mod construction;
pub mod error;
pub mod math;
pub mod morale;
pub mod nodes;
pub mod pathfinding;
pub mod production;
pub mod replay;
pub mod resources;
pub mod scenario;
pub mod serfs;
pub mod simulation;
pub mod workforce;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::allocation::{AllocationConfig, ResourceAllocator, SettlementReport};
    pub use crate::buildings::{
        Blueprint, BlueprintCatalog, BuildingKind, BuildingType, FacilityRole,
    };
    pub use crate::commands::{Command, CommandOutcome};
    pub use crate::config::SimConfig;
    pub use crate::construction::{ConstructionSite, SiteId};
    pub use crate::error::{Result, SimError};
    pub use crate::math::Vec2;
    pub use crate::morale::TaxLevel;
    pub use crate::nodes::{GatherCategory, NodeId, NodeKind};
    pub use crate::pathfinding::{
        BuildingId, FootprintClass, GridScale, PathResult, StaticTerrain, WalkableGrid,
    };
    pub use crate::production::{MineId, ProductionRates, RefinerId};
    pub use crate::resources::{ResourceKind, Stockpile};
    pub use crate::scenario::{EpisodeSnapshot, Scenario};
    pub use crate::serfs::{SerfId, SerfState};
    pub use crate::simulation::{Colony, ColonyStats, TickReport};
    pub use crate::workforce::{WorkerId, WorkerKind, WorkerState, WorkforceSimulator};
}
