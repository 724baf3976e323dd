//! Recording and playback of episodes.
//!
//! A replay stores the scenario, the building catalog, the step length and
//! the commands issued during an episode. Because the colony is
//! deterministic, this is enough to recreate every tick and to check that
//! the final state hash matches.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::buildings::BlueprintCatalog;
use crate::commands::Command;
use crate::error::{Result, SimError};
use crate::scenario::{EpisodeSnapshot, Scenario};
use crate::simulation::Colony;

/// A command together with the tick it was applied before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Tick count at the time the command was applied.
    pub tick: u64,
    /// The command.
    pub command: Command,
}

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Format version.
    pub version: u32,
    /// Episode input.
    pub scenario: Scenario,
    /// Catalog in effect.
    pub catalog: BlueprintCatalog,
    /// Seconds per tick.
    pub dt: f64,
    /// Commands in tick order.
    pub commands: Vec<ReplayCommand>,
    /// Tick count at the end of recording.
    pub final_tick: u64,
    /// State hash at the end of recording.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay of an episode built from `snapshot`.
    #[must_use]
    pub fn new(snapshot: &EpisodeSnapshot, dt: f64) -> Self {
        Self {
            version: REPLAY_VERSION,
            scenario: (*snapshot.scenario).clone(),
            catalog: (*snapshot.catalog).clone(),
            dt,
            commands: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        }
    }

    /// Record a command applied at `tick`.
    pub fn record_command(&mut self, tick: u64, command: Command) {
        self.commands.push(ReplayCommand { tick, command });
    }

    /// Store the end state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Write the replay as bincode.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(self)
            .map_err(|e| SimError::Replay(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path, bytes).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a replay written by [`Replay::save`].
    ///
    /// # Errors
    /// Returns an error if reading or decoding fails or the version differs.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| SimError::Replay(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(SimError::Replay(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Rebuild the episode input.
    ///
    /// # Errors
    /// Returns an error if the stored scenario no longer validates.
    pub fn snapshot(&self) -> Result<EpisodeSnapshot> {
        EpisodeSnapshot::with_catalog(self.scenario.clone(), self.catalog.clone())
    }

    /// Commands recorded at `tick`.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&ReplayCommand> {
        self.commands.iter().filter(|c| c.tick == tick).collect()
    }

    /// Length in ticks.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// Steps a colony through a replay.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    snapshot: EpisodeSnapshot,
    colony: Colony,
    command_index: usize,
}

impl ReplayPlayer {
    /// Prepare playback from tick 0.
    ///
    /// # Errors
    /// Returns an error if the stored scenario does not validate.
    pub fn new(replay: Replay) -> Result<Self> {
        let snapshot = replay.snapshot()?;
        let colony = Colony::new(&snapshot);
        Ok(Self {
            replay,
            snapshot,
            colony,
            command_index: 0,
        })
    }

    /// Apply the commands due now and run one tick.
    ///
    /// Returns `true` while ticks remain.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let tick = self.colony.tick_count();
        while let Some(entry) = self.replay.commands.get(self.command_index) {
            if entry.tick > tick {
                break;
            }
            self.colony.apply(entry.command);
            self.command_index += 1;
        }
        self.colony.tick(self.replay.dt);
        !self.is_finished()
    }

    /// Restart and play up to `target_tick`.
    pub fn seek(&mut self, target_tick: u64) {
        self.colony = Colony::new(&self.snapshot);
        self.command_index = 0;
        while self.colony.tick_count() < target_tick && self.advance() {}
    }

    /// Ticks played.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.colony.tick_count()
    }

    /// Colony state.
    #[must_use]
    pub const fn colony(&self) -> &Colony {
        &self.colony
    }

    /// The replay.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Whether the end was reached.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.colony.tick_count() >= self.replay.final_tick
    }

    /// Play the whole replay and compare the final hash.
    ///
    /// # Errors
    /// Returns [`SimError::ReplayDiverged`] on a hash mismatch.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick);
        let actual = self.colony.state_hash();
        if actual == self.replay.final_hash {
            Ok(())
        } else {
            Err(SimError::ReplayDiverged {
                tick: self.colony.tick_count(),
                expected: self.replay.final_hash,
                actual,
            })
        }
    }

    /// Playback progress in percent.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.final_tick == 0 {
            100.0
        } else {
            self.current_tick() as f64 / self.replay.final_tick as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::pathfinding::GridScale;
    use crate::scenario::TreePlacement;

    fn snapshot() -> EpisodeSnapshot {
        let mut scenario = Scenario::open_field(60, 60, GridScale::uniform(50.0));
        scenario.serfs = 3;
        scenario.trees = vec![
            TreePlacement {
                x: 1700.0,
                y: 1500.0,
                amount: 20,
            },
            TreePlacement {
                x: 1300.0,
                y: 1600.0,
                amount: 20,
            },
        ];
        scenario.headquarters = Vec2::new(1500.0, 1500.0);
        EpisodeSnapshot::new(scenario).unwrap()
    }

    fn record(snapshot: &EpisodeSnapshot, ticks: u64) -> Replay {
        let mut replay = Replay::new(snapshot, 1.0);
        let mut colony = Colony::new(snapshot);
        for tick in 0..ticks {
            let command = match tick {
                0 => Some(Command::AssignWood(2)),
                20 => Some(Command::RecallWood(1)),
                25 => Some(Command::AssignWood(2)),
                _ => None,
            };
            if let Some(command) = command {
                colony.apply(command);
                replay.record_command(tick, command);
            }
            colony.tick(1.0);
        }
        replay.finalize(colony.tick_count(), colony.state_hash());
        replay
    }

    #[test]
    fn test_record_and_query() {
        let replay = record(&snapshot(), 50);
        assert_eq!(replay.command_count(), 3);
        assert_eq!(replay.commands_at_tick(20).len(), 1);
        assert!(replay.commands_at_tick(7).is_empty());
        assert_eq!(replay.duration(), 50);
    }

    #[test]
    fn test_verify_matches() {
        let replay = record(&snapshot(), 80);
        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(player.verify().is_ok());
        assert!(player.is_finished());
        assert_eq!(player.progress_percent(), 100.0);
    }

    #[test]
    fn test_verify_detects_divergence() {
        let mut replay = record(&snapshot(), 40);
        replay.commands.remove(1);
        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(matches!(
            player.verify(),
            Err(SimError::ReplayDiverged { tick: 40, .. })
        ));
    }

    #[test]
    fn test_save_load() {
        let replay = record(&snapshot(), 30);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.replay");
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.command_count(), 3);
        assert_eq!(loaded.final_hash, replay.final_hash);
        assert!(ReplayPlayer::new(loaded).unwrap().verify().is_ok());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.replay");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        assert!(Replay::load(&path).is_err());
    }
}
