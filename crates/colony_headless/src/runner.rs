//! Single-episode execution.
//!
//! Plays a plan against a scenario snapshot, recording every command into a
//! [`Replay`] and folding tick reports into [`EpisodeMetrics`].

use std::time::Instant;
use tracing::{debug, info};

use colony_core::replay::Replay;
use colony_core::scenario::EpisodeSnapshot;
use colony_core::simulation::Colony;

use crate::metrics::{EpisodeMetrics, MetricsCollector};
use crate::plan::Plan;

/// Result of one episode.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Collected metrics.
    pub metrics: EpisodeMetrics,
    /// Replay reproducing the episode.
    pub replay: Replay,
}

/// Run `plan` on a fresh colony built from `snapshot`.
#[must_use]
pub fn run_episode(snapshot: &EpisodeSnapshot, plan: &Plan, episode_id: &str) -> Episode {
    let start = Instant::now();
    let mut colony = Colony::new(snapshot);
    let mut replay = Replay::new(snapshot, plan.dt);
    let mut collector = MetricsCollector::new(episode_id, &snapshot.scenario.name, &plan.name);

    debug!(
        episode = episode_id,
        plan = %plan.name,
        ticks = plan.ticks,
        commands = plan.commands.len(),
        "Episode started"
    );

    let progress_step = (plan.ticks / 10).max(1);
    while colony.tick_count() < plan.ticks {
        let tick = colony.tick_count();
        for &command in plan.commands_at(tick) {
            let outcome = colony.apply(command);
            replay.record_command(tick, command);
            collector.record_command(&command, outcome);
        }

        let report = colony.tick(plan.dt);
        collector.record_tick(&report);

        if report.tick % progress_step == 0 {
            debug!(
                episode = episode_id,
                tick = report.tick,
                hash = colony.state_hash(),
                "Episode progress"
            );
        }
    }

    replay.finalize(colony.tick_count(), colony.state_hash());
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let metrics = collector.finish(&colony, elapsed_ms);

    info!(
        episode = episode_id,
        ticks = metrics.ticks,
        hash = %format!("{:016x}", metrics.final_state_hash),
        rejected = metrics.commands_rejected,
        "Episode finished in {elapsed_ms}ms"
    );

    Episode { metrics, replay }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlannedCommand;
    use colony_core::commands::Command;
    use colony_core::replay::ReplayPlayer;
    use colony_core::resources::ResourceKind;
    use colony_test_utils::fixtures::{settlement_scenario, snapshot};

    fn woodcutting_plan(ticks: u64) -> Plan {
        Plan {
            name: "woodcutting".to_string(),
            ticks,
            dt: 1.0,
            commands: vec![
                PlannedCommand {
                    tick: 0,
                    command: Command::AssignWood(4),
                },
                PlannedCommand {
                    tick: 5,
                    command: Command::RecallBuilders(3),
                },
                PlannedCommand {
                    tick: 10,
                    command: Command::RecallWood(2),
                },
            ],
        }
    }

    #[test]
    fn test_idle_plan_runs_all_ticks() {
        let snap = snapshot(settlement_scenario());
        let episode = run_episode(&snap, &Plan::idle("idle", 25), "idle-0");

        assert_eq!(episode.metrics.ticks, 25);
        assert_eq!(episode.metrics.simulated_seconds, 25.0);
        assert_eq!(episode.metrics.commands_applied, 0);
        assert_eq!(episode.replay.command_count(), 0);
        assert_eq!(episode.replay.duration(), 25);
        assert_eq!(episode.metrics.scenario, snap.scenario.name);
    }

    #[test]
    fn test_commands_counted_and_recorded() {
        let snap = snapshot(settlement_scenario());
        let episode = run_episode(&snap, &woodcutting_plan(60), "wood-0");

        assert_eq!(episode.metrics.commands_applied, 2);
        // No builders to recall
        assert_eq!(episode.metrics.commands_rejected, 1);
        assert_eq!(episode.replay.command_count(), 3);
        assert_eq!(episode.metrics.serfs, 10);
        assert!(episode.metrics.gathered["wood"] > 0.0);
        assert!(episode.metrics.stock(ResourceKind::Wood) > 1500.0);
    }

    #[test]
    fn test_replay_verifies() {
        let snap = snapshot(settlement_scenario());
        let episode = run_episode(&snap, &woodcutting_plan(80), "wood-1");

        let mut player = ReplayPlayer::new(episode.replay.clone()).unwrap();
        player.verify().unwrap();
        assert_eq!(player.colony().state_hash(), episode.metrics.final_state_hash);
    }

    #[test]
    fn test_same_plan_same_hash() {
        let snap = snapshot(settlement_scenario());
        let plan = woodcutting_plan(40);
        let a = run_episode(&snap, &plan, "a");
        let b = run_episode(&snap, &plan, "b");
        assert_eq!(a.metrics.final_state_hash, b.metrics.final_state_hash);
    }
}
