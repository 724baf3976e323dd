//! Determinism testing utilities.
//!
//! A colony episode must be reproducible: the same scenario and the same
//! command stream always yield the same state hash. Replays and batch
//! comparisons depend on it.
//!
//! Sources of non-determinism to watch for:
//!
//! - **Map iteration order**: every keyed collection in the core is a
//!   `BTreeMap`, iterated in id order.
//! - **Path cache state**: cached and uncached searches must return the same
//!   route, so a cache hit can never change a result.
//! - **Wall-clock time**: simulation time only advances through `dt`.

use colony_core::simulation::Colony;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct hashes; one for a deterministic colony.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Colony is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Result of colonies run side by side on separate threads.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash per colony.
    pub hashes: Vec<u64>,
    /// Ticks per colony.
    pub ticks: u64,
    /// Number of colonies.
    pub colonies: usize,
}

impl ParallelRunResult {
    /// Whether every colony ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert every colony matched.
    ///
    /// # Panics
    ///
    /// Panics if the colonies diverged.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            panic!(
                "Parallel colonies diverged!\n\
                 Colonies: {}\n\
                 Ticks: {}\n\
                 All hashes: {:?}",
                self.colonies, self.ticks, self.hashes
            );
        }
    }
}

/// Run a simulation several times and compare the final hashes.
///
/// # Example
///
/// ```ignore
/// use colony_test_utils::determinism::verify_determinism;
/// use colony_test_utils::fixtures::settlement_colony;
///
/// let result = verify_determinism(
///     3,
///     200,
///     settlement_colony,
///     |colony| {
///         colony.tick(1.0);
///     },
///     |colony| colony.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Run `colonies` colonies on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a colony thread panics.
pub fn run_parallel_colonies<F>(setup: F, colonies: usize, ticks: u64, dt: f64) -> ParallelRunResult
where
    F: Fn() -> Colony + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..colonies)
            .map(|_| {
                s.spawn(|| {
                    let mut colony = setup();
                    colony.run(ticks, dt);
                    colony.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("colony thread panicked"))
            .collect()
    });

    ParallelRunResult {
        hashes,
        ticks,
        colonies,
    }
}

/// Step two colonies in lockstep and return the first tick at which their
/// hashes differ, or `None` if they never do.
pub fn find_first_divergence<F>(setup: F, ticks: u64, dt: f64) -> Option<u64>
where
    F: Fn() -> Colony,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        a.tick(dt);
        b.tick(dt);
        if a.state_hash() != b.state_hash() {
            tracing::debug!(tick, "colonies diverged");
            return Some(tick);
        }
    }

    None
}

/// Hash any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for colony inputs.
pub mod strategies {
    use colony_core::commands::Command;
    use colony_core::math::Vec2;
    use colony_core::morale::TaxLevel;
    use colony_core::nodes::GatherCategory;
    use colony_core::pathfinding::Cell;
    use colony_core::resources::ResourceKind;
    use colony_core::workforce::WorkerKind;
    use proptest::prelude::*;

    /// A resource that can be gathered from deposits and shafts.
    pub fn arb_minable() -> impl Strategy<Value = ResourceKind> {
        prop::sample::select(ResourceKind::MINABLE.to_vec())
    }

    /// Any gather category.
    pub fn arb_category() -> impl Strategy<Value = GatherCategory> {
        prop_oneof![
            Just(GatherCategory::Wood),
            arb_minable().prop_map(GatherCategory::Deposit),
            arb_minable().prop_map(GatherCategory::Shaft),
        ]
    }

    /// Any worker kind.
    pub fn arb_worker_kind() -> impl Strategy<Value = WorkerKind> {
        prop::sample::select(WorkerKind::ALL.to_vec())
    }

    /// Tick length in seconds.
    pub fn arb_dt() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.25), Just(0.5), Just(1.0), Just(2.0)]
    }

    /// A world position inside a `size`×`size` grid at `scale`.
    pub fn arb_position(size: u32, scale: f64) -> impl Strategy<Value = Vec2> {
        let extent = f64::from(size) * scale;
        (0.0..extent, 0.0..extent).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// A cell inside a `size`×`size` grid.
    pub fn arb_cell(size: u32) -> impl Strategy<Value = Cell> {
        (0..size, 0..size)
    }

    /// Blocked cells in a `size`×`size` grid.
    pub fn arb_obstacles(size: u32, max: usize) -> impl Strategy<Value = Vec<Cell>> {
        prop::collection::vec(arb_cell(size), 0..max)
    }

    /// A gathering, serf or tax command.
    pub fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            (0u32..6).prop_map(Command::AssignWood),
            (0u32..6).prop_map(Command::RecallWood),
            (arb_minable(), 0u32..4)
                .prop_map(|(resource, count)| Command::AssignDeposit { resource, count }),
            (arb_minable(), 0u32..4)
                .prop_map(|(resource, count)| Command::RecallDeposit { resource, count }),
            (arb_minable(), 0u32..4)
                .prop_map(|(resource, count)| Command::AssignShaft { resource, count }),
            (arb_minable(), 0u32..4)
                .prop_map(|(resource, count)| Command::RecallShaft { resource, count }),
            (0u32..3).prop_map(Command::BuySerf),
            (0u32..3).prop_map(Command::DismissSerf),
            (0u8..5).prop_map(|i| Command::SetTaxLevel(TaxLevel::from_index(i).unwrap_or_default())),
            Just(Command::Bless),
        ]
    }

    /// A command stream as `(tick, command)` pairs, sorted by tick.
    pub fn arb_schedule(ticks: u64, max: usize) -> impl Strategy<Value = Vec<(u64, Command)>> {
        prop::collection::vec((0..ticks, arb_command()), 0..max).prop_map(|mut v| {
            v.sort_by_key(|(tick, _)| *tick);
            v
        })
    }
}
