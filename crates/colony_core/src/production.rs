//! Two-tier production: mines and refiners staffed by workers, plus the serf
//! roster and the colony stockpile.
//!
//! Mines output `workers × amount × efficiency / 30 s`. Refiners walk to a
//! supplier and back for each batch, so their cycle length grows with the
//! distance: `2 × distance / speed + processing time`. Refiner input is
//! drawn from the stockpile and output scales down when input runs short.

use crate::buildings::MAX_LEVEL;
use crate::math::Vec2;
use crate::nodes::NodeId;
use crate::resources::{ResourceKind, ResourceTable, Stockpile};
use crate::serfs::{ExtractionProfile, ExtractionRequest, SerfRoster, SerfState};
use crate::workforce::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of a mine work cycle in seconds.
pub const MINE_CYCLE_SECONDS: f64 = 30.0;
/// Mine worker slots by level.
pub const MINE_SLOTS: [u32; 3] = [5, 6, 7];
/// Mine output per worker and cycle by level.
pub const MINE_AMOUNT: [u32; 3] = [4, 5, 6];
/// Refiner processing time per batch in seconds.
pub const REFINER_PROCESSING_SECONDS: f64 = 5.0;
/// Units carried per refiner trip.
pub const REFINER_TRANSPORT: f64 = 5.0;
/// Refiner worker slots.
pub const REFINER_SLOTS: u32 = 4;
/// Refiner worker speed in world units per second.
pub const REFINER_WORKER_SPEED: f64 = 320.0;

/// Unique mine identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MineId(pub u32);

/// Unique refiner identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefinerId(pub u32);

/// Mean efficiency of `workers`; unknown workers count as 0.
fn average_efficiency(workers: &[WorkerId], efficiency: &BTreeMap<WorkerId, f64>) -> f64 {
    if workers.is_empty() {
        return 0.0;
    }
    let sum: f64 = workers
        .iter()
        .map(|w| efficiency.get(w).copied().unwrap_or(0.0))
        .sum();
    sum / workers.len() as f64
}

// ============================================================================
// Mines
// ============================================================================

/// Tier-1 facility with locally working staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mine {
    /// Identifier.
    pub id: MineId,
    /// Resource mined.
    pub resource: ResourceKind,
    /// Position.
    pub position: Vec2,
    /// Level 1..=3.
    pub level: u8,
    /// Node the mine is built on, if any.
    pub node: Option<NodeId>,
    workers: Vec<WorkerId>,
}

impl Mine {
    /// Worker slots at the current level.
    #[must_use]
    pub fn slots(&self) -> u32 {
        MINE_SLOTS[usize::from(self.level - 1)]
    }

    /// Output per worker and cycle at the current level.
    #[must_use]
    pub fn amount_per_cycle(&self) -> u32 {
        MINE_AMOUNT[usize::from(self.level - 1)]
    }

    /// Assigned workers.
    #[must_use]
    pub fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    /// Output per second given the average efficiency of the staff.
    #[must_use]
    pub fn production_rate(&self, average_efficiency: f64) -> f64 {
        self.workers.len() as f64 * f64::from(self.amount_per_cycle()) * average_efficiency
            / MINE_CYCLE_SECONDS
    }
}

// ============================================================================
// Refiners
// ============================================================================

/// Static description of a refiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinerSpec {
    /// Resource drawn from the stockpile.
    pub input: ResourceKind,
    /// Refined resource produced.
    pub output: ResourceKind,
    /// Input units consumed per output unit.
    pub ratio: f64,
    /// Position of the refiner.
    pub position: Vec2,
    /// Position of the supplier the workers walk to.
    pub supplier: Vec2,
}

/// Tier-2 facility converting stockpiled input into refined output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refiner {
    /// Identifier.
    pub id: RefinerId,
    /// Static description.
    pub spec: RefinerSpec,
    /// Units carried per trip.
    pub transport: f64,
    /// Worker walking speed.
    pub worker_speed: f64,
    /// Processing time per batch in seconds.
    pub processing_seconds: f64,
    workers: Vec<WorkerId>,
}

impl Refiner {
    /// Worker slots.
    #[must_use]
    pub const fn slots(&self) -> u32 {
        REFINER_SLOTS
    }

    /// Assigned workers.
    #[must_use]
    pub fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    /// Seconds per batch: round trip to the supplier plus processing.
    #[must_use]
    pub fn cycle_time(&self) -> f64 {
        let distance = self.spec.position.distance(self.spec.supplier);
        distance * 2.0 / self.worker_speed + self.processing_seconds
    }

    /// Output per second given the average efficiency of the staff.
    #[must_use]
    pub fn output_rate(&self, average_efficiency: f64) -> f64 {
        self.workers.len() as f64 * self.transport * average_efficiency / self.cycle_time()
    }

    /// Input consumed per second at full supply.
    #[must_use]
    pub fn input_rate(&self, average_efficiency: f64) -> f64 {
        self.output_rate(average_efficiency) * self.spec.ratio
    }
}

// ============================================================================
// Production system
// ============================================================================

/// Amounts moved during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionReport {
    /// Raw units added by mines.
    pub mined: ResourceTable<f64>,
    /// Raw units consumed by refiners.
    pub consumed: ResourceTable<f64>,
    /// Refined units produced.
    pub refined: ResourceTable<f64>,
}

/// Steady-state rates in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionRates {
    /// Raw production (mines and extracting serfs).
    pub production: ResourceTable<f64>,
    /// Raw consumption by refiners.
    pub consumption: ResourceTable<f64>,
    /// Refined output.
    pub refined: ResourceTable<f64>,
    /// Production minus consumption.
    pub net: ResourceTable<f64>,
}

impl ProductionRates {
    /// Resource with the lowest net rate; `None` when nothing moves.
    ///
    /// Every kind takes part, Gold and untouched kinds included, so a kind
    /// sitting at zero net can win against kinds with surplus. A result is
    /// the weakest flow, not necessarily a shortage; check `net` for a
    /// negative rate before treating it as one.
    #[must_use]
    pub fn bottleneck(&self) -> Option<ResourceKind> {
        if self.net.iter().all(|(_, rate)| rate == 0.0)
            && self.consumption.iter().all(|(_, rate)| rate == 0.0)
        {
            return None;
        }
        self.net
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(kind, _)| kind)
    }
}

/// Owns mines, refiners, serfs and the stockpile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionSystem {
    mines: BTreeMap<MineId, Mine>,
    refiners: BTreeMap<RefinerId, Refiner>,
    serfs: SerfRoster,
    stockpile: Stockpile,
    next_mine_id: u32,
    next_refiner_id: u32,
}

impl ProductionSystem {
    /// Empty system with the given starting stock.
    #[must_use]
    pub fn new(stockpile: Stockpile) -> Self {
        Self {
            mines: BTreeMap::new(),
            refiners: BTreeMap::new(),
            serfs: SerfRoster::new(),
            stockpile,
            next_mine_id: 1,
            next_refiner_id: 1,
        }
    }

    /// Colony stock.
    #[must_use]
    pub const fn stockpile(&self) -> &Stockpile {
        &self.stockpile
    }

    /// Mutable colony stock.
    pub fn stockpile_mut(&mut self) -> &mut Stockpile {
        &mut self.stockpile
    }

    /// Serf roster.
    #[must_use]
    pub const fn serfs(&self) -> &SerfRoster {
        &self.serfs
    }

    /// Mutable serf roster.
    pub fn serfs_mut(&mut self) -> &mut SerfRoster {
        &mut self.serfs
    }

    /// Stockpile and serfs borrowed together.
    pub fn split_mut(&mut self) -> (&mut Stockpile, &mut SerfRoster) {
        (&mut self.stockpile, &mut self.serfs)
    }

    /// Add a mine at level 1..=3.
    pub fn add_mine(&mut self, resource: ResourceKind, position: Vec2, level: u8, node: Option<NodeId>) -> MineId {
        let id = MineId(self.next_mine_id.max(1));
        self.next_mine_id = id.0 + 1;
        self.mines.insert(
            id,
            Mine {
                id,
                resource,
                position,
                level: level.clamp(1, 3),
                node,
                workers: Vec::new(),
            },
        );
        id
    }

    /// Raise a mine's level. Returns `false` if unknown or already at the top level.
    pub fn upgrade_mine(&mut self, id: MineId) -> bool {
        match self.mines.get_mut(&id) {
            Some(mine) if mine.level < MAX_LEVEL => {
                mine.level += 1;
                true
            }
            _ => false,
        }
    }

    /// Add a refiner.
    pub fn add_refiner(&mut self, spec: RefinerSpec) -> RefinerId {
        let id = RefinerId(self.next_refiner_id.max(1));
        self.next_refiner_id = id.0 + 1;
        self.refiners.insert(
            id,
            Refiner {
                id,
                spec,
                transport: REFINER_TRANSPORT,
                worker_speed: REFINER_WORKER_SPEED,
                processing_seconds: REFINER_PROCESSING_SECONDS,
                workers: Vec::new(),
            },
        );
        id
    }

    /// Staff a mine; returns how many of `workers` fit into free slots.
    pub fn assign_mine_workers(&mut self, id: MineId, workers: &[WorkerId]) -> u32 {
        let Some(mine) = self.mines.get_mut(&id) else {
            return 0;
        };
        let free = mine.slots().saturating_sub(mine.workers.len() as u32) as usize;
        let taken = workers.len().min(free);
        mine.workers.extend_from_slice(&workers[..taken]);
        taken as u32
    }

    /// Staff a refiner; returns how many of `workers` fit into free slots.
    pub fn assign_refiner_workers(&mut self, id: RefinerId, workers: &[WorkerId]) -> u32 {
        let Some(refiner) = self.refiners.get_mut(&id) else {
            return 0;
        };
        let free = refiner.slots().saturating_sub(refiner.workers.len() as u32) as usize;
        let taken = workers.len().min(free);
        refiner.workers.extend_from_slice(&workers[..taken]);
        taken as u32
    }

    /// Drop a worker from whichever facility employs it.
    pub fn release_worker(&mut self, worker: WorkerId) {
        for mine in self.mines.values_mut() {
            mine.workers.retain(|w| *w != worker);
        }
        for refiner in self.refiners.values_mut() {
            refiner.workers.retain(|w| *w != worker);
        }
    }

    /// Look up a mine.
    #[must_use]
    pub fn mine(&self, id: MineId) -> Option<&Mine> {
        self.mines.get(&id)
    }

    /// Mines in id order.
    pub fn mines(&self) -> impl Iterator<Item = &Mine> {
        self.mines.values()
    }

    /// Look up a refiner.
    #[must_use]
    pub fn refiner(&self, id: RefinerId) -> Option<&Refiner> {
        self.refiners.get(&id)
    }

    /// Refiners in id order.
    pub fn refiners(&self) -> impl Iterator<Item = &Refiner> {
        self.refiners.values()
    }

    /// Advance mines, refiners and serfs by `dt` seconds.
    ///
    /// `efficiency` is the per-worker snapshot from the start of the tick.
    /// Serf extractions are returned for the allocator to settle against the
    /// nodes; they are not credited here.
    pub fn tick(
        &mut self,
        dt: f64,
        efficiency: &BTreeMap<WorkerId, f64>,
        serf_speed: f64,
        profiles: &ResourceTable<ExtractionProfile>,
    ) -> (ProductionReport, Vec<ExtractionRequest>) {
        let mut report = ProductionReport::default();

        for mine in self.mines.values() {
            let amount = mine.production_rate(average_efficiency(&mine.workers, efficiency)) * dt;
            report.mined[mine.resource] += amount;
            self.stockpile.add(mine.resource, amount);
        }

        for refiner in self.refiners.values() {
            let eff = average_efficiency(&refiner.workers, efficiency);
            let needed = refiner.input_rate(eff) * dt;
            if needed <= 0.0 {
                continue;
            }
            let taken = self.stockpile.take(refiner.spec.input, needed);
            let fulfilled = taken / needed;
            let output = refiner.output_rate(eff) * dt * fulfilled;
            report.consumed[refiner.spec.input] += taken;
            report.refined[refiner.spec.output] += output;
            self.stockpile.add_refined(refiner.spec.output, output);
        }

        let requests = self.serfs.tick(dt, serf_speed, profiles);
        (report, requests)
    }

    /// Steady-state rates for the current staffing and serf activity.
    #[must_use]
    pub fn rates(
        &self,
        efficiency: &BTreeMap<WorkerId, f64>,
        profiles: &ResourceTable<ExtractionProfile>,
    ) -> ProductionRates {
        let mut rates = ProductionRates::default();

        for mine in self.mines.values() {
            rates.production[mine.resource] +=
                mine.production_rate(average_efficiency(&mine.workers, efficiency));
        }
        for refiner in self.refiners.values() {
            let eff = average_efficiency(&refiner.workers, efficiency);
            rates.consumption[refiner.spec.input] += refiner.input_rate(eff);
            rates.refined[refiner.spec.output] += refiner.output_rate(eff);
        }
        for serf in self.serfs.iter() {
            if serf.state == SerfState::Extracting {
                if let Some(category) = serf.category() {
                    let resource = category.resource();
                    rates.production[resource] += profiles[resource].rate();
                }
            }
        }
        for kind in ResourceKind::ALL {
            rates.net[kind] = rates.production[kind] - rates.consumption[kind];
        }
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serfs::default_extraction_profiles;

    fn full_efficiency(ids: &[WorkerId]) -> BTreeMap<WorkerId, f64> {
        ids.iter().map(|&id| (id, 1.0)).collect()
    }

    fn worker_ids(n: u32) -> Vec<WorkerId> {
        (1..=n).map(WorkerId).collect()
    }

    #[test]
    fn test_mine_rate_by_level() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let mine = production.add_mine(ResourceKind::Iron, Vec2::ZERO, 1, None);
        let ids = worker_ids(4);
        assert_eq!(production.assign_mine_workers(mine, &ids), 4);

        let rate = production.mine(mine).unwrap().production_rate(1.0);
        assert!((rate - 16.0 / 30.0).abs() < 1e-12);

        assert!(production.upgrade_mine(mine));
        let rate = production.mine(mine).unwrap().production_rate(1.0);
        assert!((rate - 20.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_mine_slots_cap_assignment() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let mine = production.add_mine(ResourceKind::Stone, Vec2::ZERO, 1, None);
        assert_eq!(production.assign_mine_workers(mine, &worker_ids(8)), 5);
        assert!(production.upgrade_mine(mine));
        assert!(production.upgrade_mine(mine));
        assert!(!production.upgrade_mine(mine));
        assert_eq!(production.mine(mine).unwrap().slots(), 7);
    }

    #[test]
    fn test_mine_tick_adds_to_stock() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let mine = production.add_mine(ResourceKind::Clay, Vec2::ZERO, 1, None);
        let ids = worker_ids(3);
        production.assign_mine_workers(mine, &ids);
        let eff = full_efficiency(&ids);
        let profiles = default_extraction_profiles();
        for _ in 0..30 {
            production.tick(1.0, &eff, 400.0, &profiles);
        }
        assert!((production.stockpile().get(ResourceKind::Clay) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_refiner_cycle_time() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let id = production.add_refiner(RefinerSpec {
            input: ResourceKind::Wood,
            output: ResourceKind::Wood,
            ratio: 4.0,
            position: Vec2::new(1600.0, 0.0),
            supplier: Vec2::ZERO,
        });
        // 2 * 1600 / 320 + 5
        assert!((production.refiner(id).unwrap().cycle_time() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_refiner_without_input_produces_nothing() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let id = production.add_refiner(RefinerSpec {
            input: ResourceKind::Iron,
            output: ResourceKind::Iron,
            ratio: 4.0,
            position: Vec2::new(100.0, 0.0),
            supplier: Vec2::ZERO,
        });
        let ids = worker_ids(4);
        production.assign_refiner_workers(id, &ids);
        let (report, _) = production.tick(
            1.0,
            &full_efficiency(&ids),
            400.0,
            &default_extraction_profiles(),
        );
        assert_eq!(report.refined[ResourceKind::Iron], 0.0);
        assert_eq!(report.consumed[ResourceKind::Iron], 0.0);
        assert_eq!(production.stockpile().refined(ResourceKind::Iron), 0.0);
    }

    #[test]
    fn test_refiner_short_input_scales_output() {
        let stock = Stockpile::with_amounts(&[(ResourceKind::Wood, 1.0)]);
        let mut production = ProductionSystem::new(stock);
        let id = production.add_refiner(RefinerSpec {
            input: ResourceKind::Wood,
            output: ResourceKind::Wood,
            ratio: 4.0,
            position: Vec2::new(1600.0, 0.0),
            supplier: Vec2::ZERO,
        });
        let ids = worker_ids(3);
        production.assign_refiner_workers(id, &ids);
        // output 3 * 5 / 15 = 1/s, input 4/s; only 1 available.
        let (report, _) = production.tick(
            1.0,
            &full_efficiency(&ids),
            400.0,
            &default_extraction_profiles(),
        );
        assert!((report.consumed[ResourceKind::Wood] - 1.0).abs() < 1e-12);
        assert!((report.refined[ResourceKind::Wood] - 0.25).abs() < 1e-12);
        assert_eq!(production.stockpile().get(ResourceKind::Wood), 0.0);
    }

    #[test]
    fn test_rates_and_bottleneck() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let profiles = default_extraction_profiles();
        let empty = BTreeMap::new();
        assert_eq!(production.rates(&empty, &profiles).bottleneck(), None);

        let refiner = production.add_refiner(RefinerSpec {
            input: ResourceKind::Iron,
            output: ResourceKind::Iron,
            ratio: 4.0,
            position: Vec2::new(1600.0, 0.0),
            supplier: Vec2::ZERO,
        });
        let mine = production.add_mine(ResourceKind::Stone, Vec2::ZERO, 1, None);
        production.assign_refiner_workers(refiner, &[WorkerId(1)]);
        production.assign_mine_workers(mine, &[WorkerId(2)]);
        let eff = full_efficiency(&[WorkerId(1), WorkerId(2)]);

        let rates = production.rates(&eff, &profiles);
        assert!(rates.net[ResourceKind::Stone] > 0.0);
        assert!(rates.net[ResourceKind::Iron] < 0.0);
        assert_eq!(rates.bottleneck(), Some(ResourceKind::Iron));
    }

    #[test]
    fn test_bottleneck_without_shortage() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let profiles = default_extraction_profiles();
        let mine = production.add_mine(ResourceKind::Stone, Vec2::ZERO, 1, None);
        production.assign_mine_workers(mine, &[WorkerId(1)]);

        let rates = production.rates(&full_efficiency(&[WorkerId(1)]), &profiles);
        let weakest = rates.bottleneck().unwrap();
        // An untouched kind, not a deficit
        assert_ne!(weakest, ResourceKind::Stone);
        assert_eq!(rates.net[weakest], 0.0);
    }

    #[test]
    fn test_release_worker() {
        let mut production = ProductionSystem::new(Stockpile::new());
        let mine = production.add_mine(ResourceKind::Stone, Vec2::ZERO, 1, None);
        production.assign_mine_workers(mine, &worker_ids(2));
        production.release_worker(WorkerId(1));
        assert_eq!(production.mine(mine).unwrap().workers(), &[WorkerId(2)]);
    }
}
