//! Episode metrics and batch summaries.
//!
//! Metrics use string keys so the JSON output reads naturally and stays
//! stable when resource kinds are added.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use colony_core::commands::{Command, CommandOutcome};
use colony_core::resources::{ResourceKind, ResourceTable};
use colony_core::simulation::{Colony, TickReport};

fn table_map(table: &ResourceTable<f64>) -> BTreeMap<String, f64> {
    table.iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Complete metrics for one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    /// Identifier within a batch.
    pub episode_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Plan name.
    pub plan: String,
    /// Ticks run.
    pub ticks: u64,
    /// Simulated seconds.
    pub simulated_seconds: f64,
    /// State hash at the end.
    pub final_state_hash: u64,

    // === Economy ===
    /// Raw stock at the end.
    pub stockpile: BTreeMap<String, f64>,
    /// Refined stock at the end.
    pub refined: BTreeMap<String, f64>,
    /// Units brought in by serfs.
    pub gathered: BTreeMap<String, f64>,
    /// Units produced by mines.
    pub mined: BTreeMap<String, f64>,
    /// Gold collected as tax.
    pub income: f64,
    /// Resource holding production back, if any.
    pub bottleneck: Option<String>,

    // === Population ===
    /// Serfs at the end.
    pub serfs: u32,
    /// Idle serfs at the end.
    pub idle_serfs: u32,
    /// Workers at the end.
    pub workers: u32,
    /// Worker limit at the end.
    pub worker_capacity: u32,
    /// Mean worker efficiency at the end.
    pub average_efficiency: f64,
    /// Share of exhausted workers at the end.
    pub exhausted_ratio: f64,
    /// Effective morale multiplier at the end.
    pub morale: f64,

    // === Activity ===
    /// Buildings finished during the episode.
    pub buildings_completed: u32,
    /// Buildings standing at the end, pre-built ones included.
    pub buildings_total: usize,
    /// Nodes that ran dry.
    pub nodes_depleted: u32,
    /// Serfs moved to another node after depletion.
    pub serfs_reassigned: u32,
    /// Commands that changed something.
    pub commands_applied: u32,
    /// Commands that were refused.
    pub commands_rejected: u32,
    /// Wall-clock run time in milliseconds.
    pub wall_time_ms: u64,
}

impl EpisodeMetrics {
    /// Sum of raw stock across all resources.
    #[must_use]
    pub fn total_stock(&self) -> f64 {
        self.stockpile.values().sum()
    }

    /// Raw stock of one resource.
    #[must_use]
    pub fn stock(&self, kind: ResourceKind) -> f64 {
        self.stockpile
            .get(&kind.to_string())
            .copied()
            .unwrap_or_default()
    }
}

/// Accumulates tick reports and command outcomes during an episode.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: EpisodeMetrics,
    gathered: ResourceTable<f64>,
    mined: ResourceTable<f64>,
}

impl MetricsCollector {
    /// Collector for a new episode.
    #[must_use]
    pub fn new(episode_id: &str, scenario: &str, plan: &str) -> Self {
        Self {
            metrics: EpisodeMetrics {
                episode_id: episode_id.to_string(),
                scenario: scenario.to_string(),
                plan: plan.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Count a command result.
    pub fn record_command(&mut self, command: &Command, outcome: CommandOutcome) {
        if outcome.is_applied() {
            self.metrics.commands_applied += 1;
        } else {
            tracing::debug!(?command, "Command rejected");
            self.metrics.commands_rejected += 1;
        }
    }

    /// Fold in one tick.
    pub fn record_tick(&mut self, report: &TickReport) {
        self.metrics.income += report.income;
        for (kind, amount) in report.settlement.gathered.iter() {
            self.gathered[kind] += amount;
        }
        for (kind, amount) in report.production.mined.iter() {
            self.mined[kind] += amount;
        }
        self.metrics.nodes_depleted += report.settlement.depleted.len() as u32;
        self.metrics.serfs_reassigned += report.settlement.reassigned;
        self.metrics.buildings_completed += report.completed.len() as u32;
    }

    /// Snapshot the end state and return the finished metrics.
    #[must_use]
    pub fn finish(mut self, colony: &Colony, wall_time_ms: u64) -> EpisodeMetrics {
        let stats = colony.stats();
        let m = &mut self.metrics;
        m.ticks = colony.tick_count();
        m.simulated_seconds = colony.elapsed();
        m.final_state_hash = colony.state_hash();
        m.stockpile = table_map(stats.stockpile.table());
        m.refined = table_map(stats.stockpile.refined_table());
        m.gathered = table_map(&self.gathered);
        m.mined = table_map(&self.mined);
        m.bottleneck = stats.bottleneck.map(|k| k.to_string());
        m.serfs = stats.serfs.total;
        m.idle_serfs = stats.serfs.idle;
        m.workers = stats.workforce.total;
        m.worker_capacity = stats.workforce.worker_capacity;
        m.average_efficiency = stats.workforce.average_efficiency;
        m.exhausted_ratio = stats.workforce.exhausted_ratio;
        m.morale = stats.morale;
        m.buildings_total = stats.buildings;
        m.wall_time_ms = wall_time_ms;
        self.metrics
    }
}

/// Summary statistics across episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Episodes summarised.
    pub total_episodes: u32,
    /// Mean simulated seconds.
    pub avg_simulated_seconds: f64,
    /// Mean raw stock per resource at the end.
    pub avg_stockpile: BTreeMap<String, f64>,
    /// Mean serf-gathered units per resource.
    pub avg_gathered: BTreeMap<String, f64>,
    /// Mean tax income.
    pub avg_income: f64,
    /// Mean share of exhausted workers.
    pub avg_exhausted_ratio: f64,
    /// Mean rejected commands.
    pub avg_commands_rejected: f64,
    /// How often each resource was the bottleneck ("none" when idle).
    pub bottlenecks: BTreeMap<String, u32>,
    /// Episode with the largest raw stock.
    pub richest_episode: Option<String>,
    /// Number of distinct final hashes.
    pub distinct_hashes: usize,
}

impl BatchSummary {
    /// Calculate summary from a list of episode metrics.
    #[must_use]
    pub fn from_episodes(episodes: &[EpisodeMetrics]) -> Self {
        if episodes.is_empty() {
            return Self::default();
        }
        let n = episodes.len() as f64;

        let mut summary = Self {
            total_episodes: episodes.len() as u32,
            ..Default::default()
        };

        let mut hashes = BTreeSet::new();
        for episode in episodes {
            summary.avg_simulated_seconds += episode.simulated_seconds;
            summary.avg_income += episode.income;
            summary.avg_exhausted_ratio += episode.exhausted_ratio;
            summary.avg_commands_rejected += f64::from(episode.commands_rejected);
            for (kind, amount) in &episode.stockpile {
                *summary.avg_stockpile.entry(kind.clone()).or_default() += amount;
            }
            for (kind, amount) in &episode.gathered {
                *summary.avg_gathered.entry(kind.clone()).or_default() += amount;
            }
            let bottleneck = episode.bottleneck.as_deref().unwrap_or("none");
            *summary.bottlenecks.entry(bottleneck.to_string()).or_default() += 1;
            hashes.insert(episode.final_state_hash);
        }

        summary.avg_simulated_seconds /= n;
        summary.avg_income /= n;
        summary.avg_exhausted_ratio /= n;
        summary.avg_commands_rejected /= n;
        for value in summary.avg_stockpile.values_mut() {
            *value /= n;
        }
        for value in summary.avg_gathered.values_mut() {
            *value /= n;
        }

        summary.richest_episode = episodes
            .iter()
            .max_by(|a, b| a.total_stock().total_cmp(&b.total_stock()))
            .map(|e| e.episode_id.clone());
        summary.distinct_hashes = hashes.len();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(id: &str, wood: f64, hash: u64, bottleneck: Option<&str>) -> EpisodeMetrics {
        EpisodeMetrics {
            episode_id: id.to_string(),
            simulated_seconds: 100.0,
            final_state_hash: hash,
            stockpile: [("wood".to_string(), wood), ("gold".to_string(), 10.0)]
                .into_iter()
                .collect(),
            income: wood / 10.0,
            commands_rejected: 2,
            bottleneck: bottleneck.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_episodes(&[]);
        assert_eq!(summary.total_episodes, 0);
        assert!(summary.richest_episode.is_none());
    }

    #[test]
    fn test_summary_averages() {
        let episodes = vec![
            episode("a", 100.0, 1, Some("iron")),
            episode("b", 300.0, 2, None),
            episode("c", 200.0, 1, Some("iron")),
        ];
        let summary = BatchSummary::from_episodes(&episodes);

        assert_eq!(summary.total_episodes, 3);
        assert_eq!(summary.avg_stockpile["wood"], 200.0);
        assert_eq!(summary.avg_stockpile["gold"], 10.0);
        assert_eq!(summary.avg_income, 20.0);
        assert_eq!(summary.avg_commands_rejected, 2.0);
        assert_eq!(summary.bottlenecks["iron"], 2);
        assert_eq!(summary.bottlenecks["none"], 1);
        assert_eq!(summary.richest_episode.as_deref(), Some("b"));
        assert_eq!(summary.distinct_hashes, 2);
    }

    #[test]
    fn test_stock_lookup() {
        let metrics = episode("a", 42.0, 0, None);
        assert_eq!(metrics.stock(ResourceKind::Wood), 42.0);
        assert_eq!(metrics.stock(ResourceKind::Iron), 0.0);
        assert_eq!(metrics.total_stock(), 52.0);
    }

    #[test]
    fn test_collector_counts_commands() {
        let mut collector = MetricsCollector::new("ep", "scenario", "plan");
        collector.record_command(&Command::Bless, CommandOutcome::Applied(1));
        collector.record_command(&Command::AssignWood(3), CommandOutcome::Rejected);
        collector.record_command(&Command::AssignWood(3), CommandOutcome::Applied(0));
        assert_eq!(collector.metrics.commands_applied, 1);
        assert_eq!(collector.metrics.commands_rejected, 2);
    }

    #[test]
    fn test_metrics_json() {
        let metrics = episode("a", 5.0, 7, Some("clay"));
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"bottleneck\":\"clay\""));
        let parsed: EpisodeMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metrics);
    }
}
