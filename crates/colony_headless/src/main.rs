//! Headless settlement runner.
//!
//! Runs colonies without any frontend. Metrics go to JSON files, summaries
//! and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run one plan
//! cargo run -p colony_headless -- run -s crates/colony_headless/scenarios/valley.ron -p crates/colony_headless/plans/opening.ron
//!
//! # Batch several plans across tax levels
//! cargo run -p colony_headless -- batch -s crates/colony_headless/scenarios/valley.ron -p crates/colony_headless/plans/opening.ron -p crates/colony_headless/plans/builders.ron --tax-sweep
//!
//! # Check that repeated runs agree
//! cargo run -p colony_headless -- verify -s crates/colony_headless/scenarios/valley.ron -p crates/colony_headless/plans/opening.ron --runs 8
//!
//! # Verify a recorded replay
//! cargo run -p colony_headless -- replay results/opening.replay --verify
//! ```
//!
//! `RUST_LOG` overrides the log filter chosen by `--verbose`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colony_core::replay::{Replay, ReplayPlayer};
use colony_core::scenario::EpisodeSnapshot;
use colony_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    metrics::EpisodeMetrics,
    plan::Plan,
    runner::run_episode,
    HeadlessError,
};

#[derive(Parser)]
#[command(name = "colony_headless")]
#[command(about = "Headless settlement economy runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one episode
    Run {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Plan file; the colony idles without one
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Override the episode length
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Write metrics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record a replay file
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Run many episodes in parallel
    Batch {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Plan files (repeatable)
        #[arg(short, long)]
        plan: Vec<PathBuf>,

        /// Runs per plan variant
        #[arg(long, default_value = "1")]
        repeats: u32,

        /// Run every plan once per tax level
        #[arg(long)]
        tax_sweep: bool,

        /// Override the episode length
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Maximum parallel episodes (0 = auto)
        #[arg(long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Write a replay per episode
        #[arg(long)]
        replays: bool,
    },

    /// Run a plan repeatedly and compare final hashes
    Verify {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Plan file; the colony idles without one
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "4")]
        runs: u32,
    },

    /// Play back a recorded replay
    Replay {
        /// Replay file
        file: PathBuf,

        /// Check the final hash instead of showing progress
        #[arg(long)]
        verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            plan,
            ticks,
            output,
            record,
        } => cmd_run(&scenario, plan.as_deref(), ticks, output.as_deref(), record.as_deref()),
        Commands::Batch {
            scenario,
            plan,
            repeats,
            tax_sweep,
            ticks,
            parallel,
            output,
            replays,
        } => {
            let mut config = BatchConfig::new(scenario, plan)
                .with_output(output)
                .with_repeats(repeats)
                .with_tax_sweep(tax_sweep)
                .with_replays(replays);
            config.ticks = ticks;
            config.parallel_episodes = parallel;
            cmd_batch(config)
        }
        Commands::Verify {
            scenario,
            plan,
            runs,
        } => cmd_verify(&scenario, plan.as_deref(), runs),
        Commands::Replay { file, verify } => cmd_replay(&file, verify),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

fn load_inputs(
    scenario: &Path,
    plan: Option<&Path>,
) -> Result<(EpisodeSnapshot, Plan), HeadlessError> {
    let snapshot = EpisodeSnapshot::load(scenario)?;
    let plan = match plan {
        Some(path) => Plan::load(path)?,
        None => Plan::default(),
    };
    Ok((snapshot, plan))
}

fn print_metrics(metrics: &EpisodeMetrics) {
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("EPISODE: {} / {}", metrics.scenario, metrics.plan);
    eprintln!("{}", "=".repeat(50));
    eprintln!(
        "Ticks: {} ({:.0}s simulated, {}ms wall)",
        metrics.ticks, metrics.simulated_seconds, metrics.wall_time_ms
    );
    eprintln!("Final hash: {:016x}", metrics.final_state_hash);
    eprintln!(
        "Commands: {} applied, {} rejected",
        metrics.commands_applied, metrics.commands_rejected
    );
    eprintln!(
        "Serfs: {} ({} idle)  Workers: {}/{}",
        metrics.serfs, metrics.idle_serfs, metrics.workers, metrics.worker_capacity
    );
    eprintln!(
        "Efficiency: {:.2}  Exhausted: {:.0}%  Morale: {:.2}",
        metrics.average_efficiency,
        metrics.exhausted_ratio * 100.0,
        metrics.morale
    );
    eprintln!(
        "Buildings: {} completed, {} standing",
        metrics.buildings_completed, metrics.buildings_total
    );
    eprintln!("\nStockpile:");
    for (kind, amount) in &metrics.stockpile {
        let refined = metrics.refined.get(kind).copied().unwrap_or_default();
        eprintln!("  {kind:<8} {amount:>10.1}  (refined {refined:.1})");
    }
    if let Some(bottleneck) = &metrics.bottleneck {
        eprintln!("\nBottleneck: {bottleneck}");
    }
}

fn cmd_run(
    scenario: &Path,
    plan: Option<&Path>,
    ticks: Option<u64>,
    output: Option<&Path>,
    record: Option<&Path>,
) -> Result<(), HeadlessError> {
    let (snapshot, mut plan) = load_inputs(scenario, plan)?;
    if let Some(ticks) = ticks {
        plan = plan.with_ticks(ticks);
    }

    tracing::info!(
        scenario = %snapshot.scenario.name,
        plan = %plan.name,
        ticks = plan.ticks,
        "Running episode"
    );
    let episode = run_episode(&snapshot, &plan, "run");
    print_metrics(&episode.metrics);

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HeadlessError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&episode.metrics)?;
        std::fs::write(path, json).map_err(|source| HeadlessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        eprintln!("\nMetrics saved to: {}", path.display());
    }
    if let Some(path) = record {
        episode.replay.save(path)?;
        eprintln!("Replay saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_batch(config: BatchConfig) -> Result<(), HeadlessError> {
    let output = config.output_dir.clone();
    tracing::info!(
        scenario = %config.scenario.display(),
        plans = config.plans.len(),
        repeats = config.repeats,
        tax_sweep = config.tax_sweep,
        parallel = config.parallel_episodes,
        output = %output.display(),
        "Batch configuration"
    );

    let results = run_batch(config)?;
    let results_path = output.join("batch.json");
    results.save(&results_path)?;

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!(
        "Episodes: {} in {:.1}s",
        summary.total_episodes, results.duration_seconds
    );
    eprintln!("Distinct final hashes: {}", summary.distinct_hashes);
    eprintln!("Average income: {:.1}", summary.avg_income);
    eprintln!(
        "Average exhausted share: {:.0}%",
        summary.avg_exhausted_ratio * 100.0
    );
    eprintln!("\nAverage stockpile:");
    for (kind, amount) in &summary.avg_stockpile {
        eprintln!("  {kind:<8} {amount:>10.1}");
    }
    eprintln!("\nBottlenecks:");
    for (kind, count) in &summary.bottlenecks {
        eprintln!("  {kind:<8} {count}");
    }
    if let Some(richest) = summary
        .richest_episode
        .as_deref()
        .and_then(|id| results.episode(id))
    {
        eprintln!(
            "\nRichest: {} ({}), {:.0} total stock",
            richest.episode_id,
            richest.plan,
            richest.total_stock()
        );
    }
    for error in &results.errors {
        eprintln!("ERROR {}: {}", error.episode_id, error.message);
    }
    eprintln!("\nResults saved to: {}", results_path.display());
    Ok(())
}

fn cmd_verify(scenario: &Path, plan: Option<&Path>, runs: u32) -> Result<(), HeadlessError> {
    let (snapshot, plan) = load_inputs(scenario, plan)?;
    tracing::info!(plan = %plan.name, runs, "Verifying determinism");

    let check = verify_determinism(&snapshot, &plan, runs);
    if check.is_deterministic() {
        eprintln!("PASS: {} runs agree", check.hashes.len());
        if let Some(hash) = check.hashes.first() {
            eprintln!("  Final hash: {hash:016x}");
        }
    } else {
        eprintln!("FAIL: runs diverged!");
        for (run, hash) in check.hashes.iter().enumerate() {
            eprintln!("  Run {run}: {hash:016x}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_replay(file: &Path, verify: bool) -> Result<(), HeadlessError> {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let replay = Replay::load(file)?;
    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario.name);
    eprintln!("  Step: {}s", replay.dt);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.duration());

    let mut player = ReplayPlayer::new(replay)?;

    if verify {
        eprintln!("Verifying replay...");
        match player.verify() {
            Ok(()) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Expected hash: {:016x}", player.replay().final_hash);
                eprintln!("  Actual hash:   {:016x}", player.colony().state_hash());
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                std::process::exit(1);
            }
        }
    } else {
        let total = player.replay().duration();
        let mut last_percent = 0;

        while player.advance() {
            let percent = (player.current_tick() * 100 / total.max(1)) as u32;
            if percent > last_percent && percent % 10 == 0 {
                eprintln!("Progress: {percent}%");
                last_percent = percent;
            }
        }

        let stats = player.colony().stats();
        eprintln!("Replay complete at tick {}", player.current_tick());
        eprintln!("Final state hash: {:016x}", player.colony().state_hash());
        eprintln!("\nFinal State:");
        eprintln!("  Serfs: {}", stats.serfs.total);
        eprintln!("  Workers: {}", stats.workforce.total);
        eprintln!("  Buildings: {}", stats.buildings);
    }
    Ok(())
}
