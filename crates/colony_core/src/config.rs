//! Simulation tunables.
//!
//! Every constant the simulation uses has a default here. A scenario may
//! override any subset of them in its `config` block.

use crate::allocation::AllocationConfig;
use crate::construction::DEFAULT_BUILDER_FALLOFF;
use crate::morale::MoraleConfig;
use crate::pathfinding::DEFAULT_RING_SEARCH_RADIUS;
use crate::resources::{ResourceKind, ResourceTable};
use crate::serfs::{default_extraction_profiles, ExtractionProfile, SERF_SPEED};
use serde::{Deserialize, Serialize};

/// Default remaining yield given to shafts without an explicit amount.
pub const DEFAULT_SHAFT_BUDGET: u32 = 400;

/// Tunable simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Serf walking speed in world units per second.
    pub serf_speed: f64,
    /// Extraction time and amount per resource.
    pub extraction: ResourceTable<ExtractionProfile>,
    /// Gold cost of one serf.
    pub serf_cost: f64,
    /// Per-builder falloff of construction work.
    pub builder_falloff: f64,
    /// Allocator radii.
    pub allocation: AllocationConfig,
    /// Tax and blessing settings.
    pub morale: MoraleConfig,
    /// Ring search radius for blocked path endpoints, in cells.
    pub ring_search_radius: u32,
    /// Yield of shafts that do not state one.
    pub shaft_budget: u32,
    /// Search radius for automatic building placement, in cells.
    pub placement_radius: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            serf_speed: SERF_SPEED,
            extraction: default_extraction_profiles(),
            serf_cost: 50.0,
            builder_falloff: DEFAULT_BUILDER_FALLOFF,
            allocation: AllocationConfig::default(),
            morale: MoraleConfig::default(),
            ring_search_radius: DEFAULT_RING_SEARCH_RADIUS,
            shaft_budget: DEFAULT_SHAFT_BUDGET,
            placement_radius: 40,
        }
    }
}

impl SimConfig {
    /// Cost of `n` serfs.
    #[must_use]
    pub fn serf_price(&self, n: u32) -> Vec<(ResourceKind, f64)> {
        vec![(ResourceKind::Gold, self.serf_cost * f64::from(n))]
    }

    /// Reject overrides that would stall serfs or construction.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.serf_speed.is_finite() && self.serf_speed > 0.0) {
            return Err(format!("serf_speed must be positive, got {}", self.serf_speed));
        }
        let gathered = std::iter::once(ResourceKind::Wood).chain(ResourceKind::MINABLE);
        for kind in gathered {
            let profile = self.extraction[kind];
            if !(profile.seconds.is_finite() && profile.seconds > 0.0) || profile.amount == 0 {
                return Err(format!(
                    "{kind} extraction needs positive seconds and amount, got {}s x {}",
                    profile.seconds, profile.amount
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.builder_falloff) {
            return Err(format!(
                "builder_falloff must be within [0, 1], got {}",
                self.builder_falloff
            ));
        }
        if !(self.serf_cost.is_finite() && self.serf_cost >= 0.0) {
            return Err(format!("serf_cost must not be negative, got {}", self.serf_cost));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_from_ron() {
        let config: SimConfig = ron::from_str("(serf_speed: 200.0, shaft_budget: 50)").unwrap();
        assert_eq!(config.serf_speed, 200.0);
        assert_eq!(config.shaft_budget, 50);
        assert_eq!(config.builder_falloff, DEFAULT_BUILDER_FALLOFF);
        assert_eq!(config.extraction[ResourceKind::Wood].amount, 2);
    }

    #[test]
    fn test_default_validates() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_stalling_overrides() {
        let still: SimConfig = ron::from_str("(serf_speed: 0.0)").unwrap();
        assert!(still.validate().unwrap_err().contains("serf_speed"));

        let mut config = SimConfig::default();
        config.extraction[ResourceKind::Clay].seconds = 0.0;
        assert!(config.validate().unwrap_err().contains("clay"));

        let mut config = SimConfig::default();
        config.extraction[ResourceKind::Wood].amount = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.builder_falloff = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serf_price() {
        let config = SimConfig::default();
        assert_eq!(config.serf_price(3), vec![(ResourceKind::Gold, 150.0)]);
    }
}
