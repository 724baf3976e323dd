//! Headless episode runner for the settlement economy.
//!
//! Runs colonies without any frontend. Episodes are described by a scenario
//! file and an optional command plan, both in RON. This enables:
//!
//! - **Scripted experiments**: Replay a fixed opening against a scenario
//! - **Batch comparison**: Run many plans in parallel and summarise them
//! - **CI verification**: Check determinism and re-verify recorded replays
//!
//! # Example
//!
//! ```bash
//! # Run one plan and write metrics
//! cargo run -p colony_headless -- run -s crates/colony_headless/scenarios/valley.ron -p crates/colony_headless/plans/opening.ron -o out/metrics.json
//!
//! # Compare plans across every tax level
//! cargo run -p colony_headless -- batch -s crates/colony_headless/scenarios/valley.ron -p crates/colony_headless/plans/opening.ron --tax-sweep
//!
//! # Verify a recorded replay
//! cargo run -p colony_headless -- replay out/episode.replay --verify
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod metrics;
pub mod plan;
pub mod runner;

pub use batch::{
    run_batch, run_plans, verify_determinism, BatchConfig, BatchResults, DeterminismCheck,
};
pub use error::{HeadlessError, Result};
pub use metrics::{BatchSummary, EpisodeMetrics};
pub use plan::{Plan, PlannedCommand};
pub use runner::{run_episode, Episode};
