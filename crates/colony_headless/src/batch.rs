//! Batch episode runner.
//!
//! Runs many episodes in parallel using rayon. Each plan may be repeated and
//! optionally swept across every tax level, so a single batch compares
//! openings and checks that repeated runs agree.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use colony_core::morale::TaxLevel;
use colony_core::scenario::EpisodeSnapshot;

use crate::error::{HeadlessError, Result};
use crate::metrics::{BatchSummary, EpisodeMetrics};
use crate::plan::Plan;
use crate::runner::run_episode;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario file
    pub scenario: PathBuf,
    /// Plan files; an idle plan is used when empty
    pub plans: Vec<PathBuf>,
    /// Runs per plan variant
    pub repeats: u32,
    /// Run every plan once per tax level
    pub tax_sweep: bool,
    /// Episode length override
    pub ticks: Option<u64>,
    /// Maximum parallel episodes (0 = use rayon default)
    pub parallel_episodes: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Write a replay file per episode
    pub save_replays: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("crates/colony_headless/scenarios/valley.ron"),
            plans: Vec::new(),
            repeats: 1,
            tax_sweep: false,
            ticks: None,
            parallel_episodes: 0,
            output_dir: PathBuf::from("results"),
            save_replays: false,
        }
    }
}

impl BatchConfig {
    /// Create config for a scenario and plans
    pub fn new(scenario: impl Into<PathBuf>, plans: Vec<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            plans,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set runs per plan variant
    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    /// Sweep tax levels
    pub fn with_tax_sweep(mut self, enabled: bool) -> Self {
        self.tax_sweep = enabled;
        self
    }

    /// Override the episode length
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Save replays next to the results
    pub fn with_replays(mut self, enabled: bool) -> Self {
        self.save_replays = enabled;
        self
    }

    /// Plan variants this config expands `plans` into.
    #[must_use]
    pub fn expand_plans(&self, plans: &[Plan]) -> Vec<Plan> {
        let base: Vec<Plan> = if plans.is_empty() {
            vec![Plan::default()]
        } else {
            plans.to_vec()
        };
        let base = base.into_iter().map(|plan| match self.ticks {
            Some(ticks) => plan.with_ticks(ticks),
            None => plan,
        });
        if self.tax_sweep {
            base.flat_map(|plan| {
                TaxLevel::ALL
                    .iter()
                    .map(|&level| plan.with_tax_level(level))
                    .collect::<Vec<_>>()
            })
            .collect()
        } else {
            base.collect()
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual episode metrics
    pub episodes: Vec<EpisodeMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HeadlessError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| HeadlessError::io(path, e))
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| HeadlessError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Metrics of one episode.
    #[must_use]
    pub fn episode(&self, episode_id: &str) -> Option<&EpisodeMetrics> {
        self.episodes.iter().find(|e| e.episode_id == episode_id)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Episode id
    pub episode_id: String,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total episodes
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed episode; returns the new count
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        self.current() as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_episode = self.start_time.elapsed().as_secs_f64() / completed as f64;
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_episode * remaining as f64)
    }
}

/// Load the scenario and plans named by `config` and run the batch.
///
/// # Errors
/// Returns an error if the scenario or a plan cannot be loaded.
pub fn run_batch(config: BatchConfig) -> Result<BatchResults> {
    let snapshot = EpisodeSnapshot::load(&config.scenario)?;
    let plans = config
        .plans
        .iter()
        .map(Plan::load)
        .collect::<Result<Vec<_>>>()?;
    Ok(run_plans(config, &snapshot, &plans))
}

/// Run already loaded plans against `snapshot`.
pub fn run_plans(config: BatchConfig, snapshot: &EpisodeSnapshot, plans: &[Plan]) -> BatchResults {
    let start = Instant::now();
    let variants = config.expand_plans(plans);
    let repeats = config.repeats.max(1);
    let jobs: Vec<(String, &Plan)> = variants
        .iter()
        .enumerate()
        .flat_map(|(v, plan)| (0..repeats).map(move |r| (format!("episode_{v:03}_{r:02}"), plan)))
        .collect();

    info!(
        "Starting batch run: {} episodes ({} variants x {} repeats) of '{}'",
        jobs.len(),
        variants.len(),
        repeats,
        snapshot.scenario.name
    );

    let progress = BatchProgress::new(jobs.len() as u32);
    let report_every = (jobs.len() as u32 / 10).max(1);
    let replay_dir = config.output_dir.join("replays");

    let run_all = || -> Vec<(EpisodeMetrics, Option<BatchError>)> {
        jobs.par_iter()
            .map(|(id, plan)| {
                let episode = run_episode(snapshot, plan, id);
                let error = if config.save_replays {
                    save_replay(&replay_dir, id, &episode.replay).err()
                } else {
                    None
                };
                let done = progress.record_completion();
                if done % report_every == 0 {
                    info!(
                        "Batch progress: {done}/{} ({:.0}%), eta {}s",
                        progress.total,
                        progress.percentage(),
                        progress.eta().as_secs()
                    );
                }
                (episode.metrics, error)
            })
            .collect()
    };

    let outcomes = if config.parallel_episodes > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_episodes as usize)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!("Falling back to the global thread pool: {e}");
                run_all()
            }
        }
    } else {
        run_all()
    };

    let mut episodes = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for (metrics, error) in outcomes {
        if let Some(error) = error {
            errors.push(error);
        }
        episodes.push(metrics);
    }

    let summary = BatchSummary::from_episodes(&episodes);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} episodes in {:.2}s, {} distinct final hashes",
        episodes.len(),
        duration_seconds,
        summary.distinct_hashes
    );

    BatchResults {
        config,
        episodes,
        summary,
        duration_seconds,
        errors,
    }
}

fn save_replay(
    dir: &Path,
    episode_id: &str,
    replay: &colony_core::replay::Replay,
) -> std::result::Result<(), BatchError> {
    let to_error = |message: String| BatchError {
        episode_id: episode_id.to_string(),
        message,
    };
    std::fs::create_dir_all(dir).map_err(|e| to_error(format!("{}: {e}", dir.display())))?;
    replay
        .save(dir.join(format!("{episode_id}.replay")))
        .map_err(|e| to_error(e.to_string()))
}

/// Final hashes of repeated runs of one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismCheck {
    /// Hash per run.
    pub hashes: Vec<u64>,
}

impl DeterminismCheck {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run `plan` `runs` times in parallel and compare final hashes.
#[must_use]
pub fn verify_determinism(snapshot: &EpisodeSnapshot, plan: &Plan, runs: u32) -> DeterminismCheck {
    let hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|run| {
            run_episode(snapshot, plan, &format!("verify_{run:02}"))
                .metrics
                .final_state_hash
        })
        .collect();
    DeterminismCheck { hashes }
}
