//! Serializable colony commands.
//!
//! Every mutating operation of [`crate::simulation::Colony`] has a command
//! variant so that plans and replays can be stored as data.

use crate::buildings::BuildingType;
use crate::construction::SiteId;
use crate::math::Vec2;
use crate::morale::TaxLevel;
use crate::production::MineId;
use crate::resources::ResourceKind;
use crate::workforce::WorkerId;
use serde::{Deserialize, Serialize};

/// A request to change the colony.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Send idle serfs to fell trees.
    AssignWood(u32),
    /// Recall woodcutters.
    RecallWood(u32),
    /// Send idle serfs to surface deposits.
    AssignDeposit {
        /// Resource to gather.
        resource: ResourceKind,
        /// Serf count.
        count: u32,
    },
    /// Recall deposit gatherers.
    RecallDeposit {
        /// Resource gathered.
        resource: ResourceKind,
        /// Serf count.
        count: u32,
    },
    /// Send idle serfs to shafts.
    AssignShaft {
        /// Resource to gather.
        resource: ResourceKind,
        /// Serf count.
        count: u32,
    },
    /// Recall shaft gatherers.
    RecallShaft {
        /// Resource gathered.
        resource: ResourceKind,
        /// Serf count.
        count: u32,
    },
    /// Open a construction site.
    StartConstruction {
        /// Type and level.
        building: BuildingType,
        /// Explicit position; placed automatically when absent.
        position: Option<Vec2>,
    },
    /// Send idle serfs to build.
    AssignBuilders {
        /// Target site; the least staffed site when absent.
        site: Option<SiteId>,
        /// Serf count.
        count: u32,
    },
    /// Recall builders.
    RecallBuilders(u32),
    /// Buy serfs with gold.
    BuySerf(u32),
    /// Dismiss idle serfs.
    DismissSerf(u32),
    /// Dismiss a worker.
    DismissWorker(WorkerId),
    /// Raise a mine by one level.
    UpgradeMine(MineId),
    /// Change the tax level.
    SetTaxLevel(TaxLevel),
    /// Start a blessing.
    Bless,
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Applied to this many serfs, workers or levels.
    Applied(u32),
    /// A construction site was opened.
    SiteOpened(SiteId),
    /// Nothing changed.
    Rejected,
}

impl CommandOutcome {
    /// Whether the command changed anything.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        match self {
            Self::Applied(n) => n > 0,
            Self::SiteOpened(_) => true,
            Self::Rejected => false,
        }
    }

    pub(crate) const fn from_count(n: u32) -> Self {
        if n > 0 {
            Self::Applied(n)
        } else {
            Self::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingKind;

    #[test]
    fn test_command_ron_format() {
        let command = Command::StartConstruction {
            building: BuildingType::new(BuildingKind::Farm, 1),
            position: None,
        };
        let text = ron::to_string(&command).unwrap();
        let parsed: Command = ron::from_str(&text).unwrap();
        assert_eq!(parsed, command);

        let parsed: Command =
            ron::from_str("AssignDeposit(resource: Clay, count: 3)").unwrap();
        assert_eq!(
            parsed,
            Command::AssignDeposit {
                resource: ResourceKind::Clay,
                count: 3
            }
        );
    }

    #[test]
    fn test_outcome() {
        assert!(!CommandOutcome::from_count(0).is_applied());
        assert_eq!(CommandOutcome::from_count(2), CommandOutcome::Applied(2));
        assert!(CommandOutcome::SiteOpened(SiteId(0)).is_applied());
    }
}
