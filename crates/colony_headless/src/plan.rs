//! Scripted command plans.
//!
//! A plan lists the commands to apply during an episode and how long the
//! episode runs. Plans are RON files:
//!
//! ```ron
//! (
//!     name: "Opening",
//!     ticks: 600,
//!     dt: 1.0,
//!     commands: [
//!         (tick: 0, command: AssignWood(4)),
//!         (tick: 0, command: AssignDeposit(resource: Clay, count: 2)),
//!         (tick: 30, command: StartConstruction(building: (kind: Farm, level: 1), position: None)),
//!         (tick: 30, command: AssignBuilders(site: None, count: 3)),
//!     ],
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use colony_core::commands::Command;
use colony_core::morale::TaxLevel;

use crate::error::{HeadlessError, Result};

/// Episode length used when a plan does not set one.
pub const DEFAULT_PLAN_TICKS: u64 = 600;

/// Seconds per tick used when a plan does not set one.
pub const DEFAULT_PLAN_DT: f64 = 1.0;

const fn default_ticks() -> u64 {
    DEFAULT_PLAN_TICKS
}

const fn default_dt() -> f64 {
    DEFAULT_PLAN_DT
}

/// A command due at a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCommand {
    /// Applied before this tick runs.
    pub tick: u64,
    /// The command.
    pub command: Command,
}

/// Command schedule for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan name, used in metrics and logs.
    pub name: String,
    /// Ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Seconds per tick.
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Scheduled commands.
    #[serde(default)]
    pub commands: Vec<PlannedCommand>,
}

impl Default for Plan {
    fn default() -> Self {
        Self::idle("idle", DEFAULT_PLAN_TICKS)
    }
}

impl Plan {
    /// A plan with no commands.
    #[must_use]
    pub fn idle(name: &str, ticks: u64) -> Self {
        Self {
            name: name.to_string(),
            ticks,
            dt: DEFAULT_PLAN_DT,
            commands: Vec::new(),
        }
    }

    /// Load and validate a plan file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| HeadlessError::io(path, source))?;
        Self::from_ron_str(&source, &path.display().to_string())
    }

    /// Parse and validate a plan; `label` names the source in errors.
    pub fn from_ron_str(source: &str, label: &str) -> Result<Self> {
        let mut plan: Self = ron::from_str(source).map_err(|e| HeadlessError::PlanParse {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        plan.normalize()?;
        Ok(plan)
    }

    /// Check the plan and sort commands by tick.
    ///
    /// Commands sharing a tick keep their file order.
    pub fn normalize(&mut self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(self.invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if let Some(late) = self.commands.iter().find(|c| c.tick >= self.ticks) {
            return Err(self.invalid(format!(
                "command at tick {} is past the end (tick {})",
                late.tick, self.ticks
            )));
        }
        self.commands.sort_by_key(|c| c.tick);
        Ok(())
    }

    fn invalid(&self, reason: String) -> HeadlessError {
        HeadlessError::InvalidPlan {
            name: self.name.clone(),
            reason,
        }
    }

    /// Override the episode length, dropping commands that no longer fit.
    #[must_use]
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self.commands.retain(|c| c.tick < ticks);
        self
    }

    /// Copy of this plan that sets `level` before anything else runs.
    #[must_use]
    pub fn with_tax_level(&self, level: TaxLevel) -> Self {
        let mut commands = Vec::with_capacity(self.commands.len() + 1);
        commands.push(PlannedCommand {
            tick: 0,
            command: Command::SetTaxLevel(level),
        });
        commands.extend(self.commands.iter().cloned());
        Self {
            name: format!("{} [tax {level:?}]", self.name),
            ticks: self.ticks,
            dt: self.dt,
            commands,
        }
    }

    /// Commands due at `tick`, in order.
    pub fn commands_at(&self, tick: u64) -> impl Iterator<Item = &Command> + '_ {
        let start = self.commands.partition_point(|c| c.tick < tick);
        self.commands[start..]
            .iter()
            .take_while(move |c| c.tick == tick)
            .map(|c| &c.command)
    }

    /// Simulated length in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.ticks as f64 * self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::buildings::{BuildingKind, BuildingType};
    use colony_core::resources::ResourceKind;

    const OPENING: &str = r#"(
        name: "Opening",
        ticks: 120,
        commands: [
            (tick: 30, command: StartConstruction(building: (kind: Farm, level: 1), position: None)),
            (tick: 0, command: AssignWood(4)),
            (tick: 30, command: AssignBuilders(site: None, count: 3)),
            (tick: 0, command: AssignDeposit(resource: Clay, count: 2)),
        ],
    )"#;

    #[test]
    fn test_parse_sorts_by_tick() {
        let plan = Plan::from_ron_str(OPENING, "opening").unwrap();
        assert_eq!(plan.name, "Opening");
        assert_eq!(plan.ticks, 120);
        assert_eq!(plan.dt, DEFAULT_PLAN_DT);

        let ticks: Vec<u64> = plan.commands.iter().map(|c| c.tick).collect();
        assert_eq!(ticks, vec![0, 0, 30, 30]);
        // Stable within a tick
        assert_eq!(plan.commands[0].command, Command::AssignWood(4));
        assert_eq!(
            plan.commands[2].command,
            Command::StartConstruction {
                building: BuildingType::new(BuildingKind::Farm, 1),
                position: None,
            }
        );
    }

    #[test]
    fn test_commands_at() {
        let plan = Plan::from_ron_str(OPENING, "opening").unwrap();
        let at_zero: Vec<&Command> = plan.commands_at(0).collect();
        assert_eq!(
            at_zero,
            vec![
                &Command::AssignWood(4),
                &Command::AssignDeposit {
                    resource: ResourceKind::Clay,
                    count: 2
                }
            ]
        );
        assert_eq!(plan.commands_at(30).count(), 2);
        assert_eq!(plan.commands_at(5).count(), 0);
        assert_eq!(plan.commands_at(500).count(), 0);
    }

    #[test]
    fn test_defaults() {
        let plan = Plan::from_ron_str(r#"(name: "Empty")"#, "empty").unwrap();
        assert_eq!(plan.ticks, DEFAULT_PLAN_TICKS);
        assert_eq!(plan.dt, DEFAULT_PLAN_DT);
        assert!(plan.commands.is_empty());
        assert_eq!(plan.duration_seconds(), 600.0);
    }

    #[test]
    fn test_rejects_late_command() {
        let source = r#"(name: "Late", ticks: 10, commands: [(tick: 10, command: Bless)])"#;
        let err = Plan::from_ron_str(source, "late").unwrap_err();
        assert!(matches!(err, HeadlessError::InvalidPlan { .. }));
        assert!(err.to_string().contains("Late"));
    }

    #[test]
    fn test_rejects_bad_dt() {
        let source = r#"(name: "Frozen", dt: 0.0)"#;
        assert!(matches!(
            Plan::from_ron_str(source, "frozen"),
            Err(HeadlessError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = Plan::from_ron_str("(name: ", "broken.ron").unwrap_err();
        assert!(matches!(err, HeadlessError::PlanParse { .. }));
        assert!(err.to_string().contains("broken.ron"));
    }

    #[test]
    fn test_with_ticks_drops_late_commands() {
        let plan = Plan::from_ron_str(OPENING, "opening").unwrap().with_ticks(20);
        assert_eq!(plan.ticks, 20);
        assert_eq!(plan.commands.len(), 2);
    }

    #[test]
    fn test_with_tax_level_prepends() {
        let plan = Plan::from_ron_str(OPENING, "opening").unwrap();
        let taxed = plan.with_tax_level(TaxLevel::High);
        assert_eq!(taxed.commands.len(), plan.commands.len() + 1);
        assert_eq!(
            taxed.commands_at(0).next(),
            Some(&Command::SetTaxLevel(TaxLevel::High))
        );
        assert!(taxed.name.contains("High"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opening.ron");
        std::fs::write(&path, OPENING).unwrap();
        let plan = Plan::load(&path).unwrap();
        assert_eq!(plan.commands.len(), 4);

        let missing = Plan::load(dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(missing, HeadlessError::Io { .. }));
    }
}
