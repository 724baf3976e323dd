//! Worker fatigue simulation.
//!
//! Each worker carries a bounded work-time (fatigue) value that drains while
//! working and refills at farms, residences or, as a fallback, a camp at the
//! workplace. Output efficiency depends on the state and the remaining work
//! time.
//!
//! ```text
//! Idle -> Working -> WalkingToFeed -> Eating -> WalkingToRest -> Resting -> WalkingToWork -> Working
//!            |                           |
//!            +--> WalkingToCamp -> Camping -> WalkingToWork
//! ```

use crate::math::{Travel, Vec2};
use crate::production::{MineId, RefinerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Work time a freshly spawned worker starts with.
pub const WORK_TIME_START: f64 = 100.0;
/// Work time at or below which a working worker goes looking for food.
pub const HUNGER_THRESHOLD: f64 = 20.0;
/// Work time at or below which a worker counts as exhausted.
pub const EXHAUSTED_THRESHOLD: f64 = 0.0;

/// Default farm capacity by level.
pub const FARM_CAPACITY: [u32; 3] = [8, 10, 12];
/// Default residence capacity by level.
pub const RESIDENCE_CAPACITY: [u32; 3] = [6, 9, 12];

// ============================================================================
// Worker kinds
// ============================================================================

/// Worker profession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    /// Farm hand.
    Farmer,
    /// Mine worker.
    Miner,
    /// Sawmill worker.
    SawmillWorker,
    /// Brickworks worker.
    Brickmaker,
    /// Stonemason worker.
    Stonecutter,
    /// Smithy worker.
    Smith,
    /// Alchemist.
    Alchemist,
    /// Monastery worker.
    Priest,
    /// Market worker.
    Trader,
    /// Bank worker.
    Treasurer,
    /// Foundry worker.
    Smelter,
    /// University worker.
    Scholar,
    /// Engineer.
    Engineer,
    /// Architect.
    MasterBuilder,
    /// Gunsmith.
    Gunsmith,
    /// Mint worker.
    Coiner,
}

/// Fatigue parameters for one worker kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkTimeParams {
    /// Length of one work cycle in milliseconds.
    pub cycle_ms: f64,
    /// Time spent eating in milliseconds.
    pub eat_ms: f64,
    /// Time spent resting in milliseconds.
    pub rest_ms: f64,
    /// Work time change over one full work cycle (negative).
    pub work_change: f64,
    /// Fraction of the gap to `farm_cap` refilled by eating.
    pub farm_fraction: f64,
    /// Fraction of the gap to `residence_cap` refilled by resting.
    pub residence_fraction: f64,
    /// Fraction of the gap to `farm_cap` refilled by camping.
    pub camp_fraction: f64,
    /// Cap reached by eating.
    pub farm_cap: f64,
    /// Cap reached by resting.
    pub residence_cap: f64,
    /// Output multiplier while exhausted.
    pub exhausted_multiplier: f64,
    /// Walking speed in world units per second.
    pub speed: f64,
    /// Search radius for farms and residences.
    pub camper_range: f64,
}

impl WorkTimeParams {
    const BASE: Self = Self {
        cycle_ms: 30_000.0,
        eat_ms: 2000.0,
        rest_ms: 3000.0,
        work_change: -50.0,
        farm_fraction: 0.7,
        residence_fraction: 0.5,
        camp_fraction: 0.1,
        farm_cap: 100.0,
        residence_cap: 400.0,
        exhausted_multiplier: 0.2,
        speed: 320.0,
        camper_range: 5000.0,
    };

    const fn with_cycle(cycle_ms: f64) -> Self {
        Self {
            cycle_ms,
            ..Self::BASE
        }
    }

    /// Upper bound of the work time for this kind.
    #[must_use]
    pub fn max_work_time(&self) -> f64 {
        self.farm_cap.max(self.residence_cap)
    }

    /// Length of a camp stay in milliseconds.
    #[must_use]
    pub fn camp_ms(&self) -> f64 {
        self.eat_ms + self.rest_ms
    }
}

impl WorkerKind {
    /// All kinds.
    pub const ALL: [Self; 16] = [
        Self::Farmer,
        Self::Miner,
        Self::SawmillWorker,
        Self::Brickmaker,
        Self::Stonecutter,
        Self::Smith,
        Self::Alchemist,
        Self::Priest,
        Self::Trader,
        Self::Treasurer,
        Self::Smelter,
        Self::Scholar,
        Self::Engineer,
        Self::MasterBuilder,
        Self::Gunsmith,
        Self::Coiner,
    ];

    /// Fatigue parameters for this kind.
    #[must_use]
    pub const fn params(self) -> WorkTimeParams {
        match self {
            Self::Farmer => WorkTimeParams {
                exhausted_multiplier: 0.1,
                ..WorkTimeParams::with_cycle(4000.0)
            },
            Self::Miner | Self::Brickmaker | Self::Smith => WorkTimeParams::with_cycle(30_000.0),
            Self::SawmillWorker => WorkTimeParams::with_cycle(40_000.0),
            Self::Stonecutter | Self::Treasurer => WorkTimeParams::with_cycle(15_000.0),
            Self::Alchemist | Self::Gunsmith => WorkTimeParams::with_cycle(20_000.0),
            Self::Trader => WorkTimeParams::with_cycle(18_000.0),
            Self::Priest | Self::Scholar | Self::MasterBuilder => {
                WorkTimeParams::with_cycle(4000.0)
            }
            Self::Smelter | Self::Engineer => WorkTimeParams {
                eat_ms: 3000.0,
                rest_ms: 2000.0,
                ..WorkTimeParams::with_cycle(4000.0)
            },
            Self::Coiner => WorkTimeParams {
                cycle_ms: 4000.0,
                eat_ms: 500.0,
                rest_ms: 500.0,
                work_change: -100.0,
                farm_fraction: 0.1,
                residence_fraction: 0.1,
                camp_fraction: 0.2,
                farm_cap: 200.0,
                residence_cap: 200.0,
                exhausted_multiplier: 0.05,
                speed: 320.0,
                camper_range: 2000.0,
            },
        }
    }
}

// ============================================================================
// Facilities
// ============================================================================

/// Identifier shared by farms and residences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FacilityId(pub u32);

/// A feeding or resting facility with level-dependent capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CareFacility {
    /// Identifier.
    pub id: FacilityId,
    /// Entrance position.
    pub position: Vec2,
    /// Level 1..=3.
    pub level: u8,
    /// Workers currently eating or resting here.
    pub occupants: u32,
    capacities: [u32; 3],
}

impl CareFacility {
    fn new(id: FacilityId, position: Vec2, level: u8, capacities: [u32; 3]) -> Self {
        Self {
            id,
            position,
            level: level.clamp(1, 3),
            occupants: 0,
            capacities,
        }
    }

    /// Seats for this level.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacities[usize::from(self.level - 1)]
    }

    /// Whether another worker can be admitted.
    #[must_use]
    pub fn has_space(&self) -> bool {
        self.occupants < self.capacity()
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Unique worker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

/// Facility a worker produces for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Employer {
    /// Staffs a mine.
    Mine(MineId),
    /// Staffs a refiner.
    Refiner(RefinerId),
    /// Works at a facility without modelled output (farm, university, ...).
    Other,
}

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    /// Just spawned.
    Idle,
    /// Producing at the workplace.
    Working,
    /// On the way to a farm.
    WalkingToFeed,
    /// Eating at a farm.
    Eating,
    /// On the way to a residence.
    WalkingToRest,
    /// Resting at a residence.
    Resting,
    /// On the way to the camp at the workplace.
    WalkingToCamp,
    /// Camping.
    Camping,
    /// Returning to the workplace.
    WalkingToWork,
}

impl WorkerState {
    /// All states.
    pub const ALL: [Self; 9] = [
        Self::Idle,
        Self::Working,
        Self::WalkingToFeed,
        Self::Eating,
        Self::WalkingToRest,
        Self::Resting,
        Self::WalkingToCamp,
        Self::Camping,
        Self::WalkingToWork,
    ];

    /// Whether the worker is travelling.
    #[must_use]
    pub const fn is_walking(self) -> bool {
        matches!(
            self,
            Self::WalkingToFeed | Self::WalkingToRest | Self::WalkingToCamp | Self::WalkingToWork
        )
    }
}

/// A fatigue-bound worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Identifier.
    pub id: WorkerId,
    /// Profession.
    pub kind: WorkerKind,
    /// Current position.
    pub position: Vec2,
    /// Where the worker works (and camps).
    pub workplace: Vec2,
    /// Remaining work time.
    pub work_time: f64,
    /// Current state.
    pub state: WorkerState,
    /// Milliseconds spent in the current timed state.
    pub state_timer_ms: f64,
    /// Facility the worker walks to or occupies.
    pub facility: Option<FacilityId>,
    /// Producing facility.
    pub employer: Employer,
    travel: Option<Travel>,
}

impl Worker {
    fn new(id: WorkerId, kind: WorkerKind, position: Vec2, workplace: Vec2, employer: Employer) -> Self {
        Self {
            id,
            kind,
            position,
            workplace,
            work_time: WORK_TIME_START,
            state: WorkerState::Idle,
            state_timer_ms: 0.0,
            facility: None,
            employer,
            travel: None,
        }
    }

    /// Fatigue parameters for this worker.
    #[must_use]
    pub const fn params(&self) -> WorkTimeParams {
        self.kind.params()
    }

    /// Output multiplier: 0 unless working, reduced when exhausted.
    #[must_use]
    pub fn efficiency(&self) -> f64 {
        if self.state != WorkerState::Working {
            0.0
        } else if self.is_exhausted() {
            self.params().exhausted_multiplier
        } else {
            1.0
        }
    }

    /// Whether work time has run out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.work_time <= EXHAUSTED_THRESHOLD
    }

    fn set_work_time(&mut self, value: f64) {
        self.work_time = value.clamp(0.0, self.params().max_work_time());
    }

    fn walk_to(&mut self, target: Vec2, state: WorkerState) {
        self.travel = Some(Travel::straight(self.position, target));
        self.state = state;
        self.state_timer_ms = 0.0;
    }

    fn enter(&mut self, state: WorkerState) {
        self.travel = None;
        self.state = state;
        self.state_timer_ms = 0.0;
    }
}

/// Move `work_time` towards `cap` by `fraction` of the gap, never past it.
fn regenerate(work_time: f64, fraction: f64, cap: f64) -> f64 {
    if work_time >= cap {
        return work_time;
    }
    (work_time + fraction * (cap - work_time)).min(cap)
}

/// Nearest facility with a free seat strictly within `range`; lower id wins ties.
fn nearest_with_space(
    facilities: &BTreeMap<FacilityId, CareFacility>,
    from: Vec2,
    range: f64,
) -> Option<(FacilityId, Vec2)> {
    let mut best: Option<(FacilityId, Vec2, f64)> = None;
    for facility in facilities.values().filter(|f| f.has_space()) {
        let dist = from.distance(facility.position);
        if dist < range && best.map_or(true, |(_, _, d)| dist < d) {
            best = Some((facility.id, facility.position, dist));
        }
    }
    best.map(|(id, pos, _)| (id, pos))
}

// ============================================================================
// Simulator
// ============================================================================

/// Summary of the workforce at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkforceStats {
    /// Number of workers.
    pub total: u32,
    /// Worker count per state.
    pub by_state: BTreeMap<WorkerState, u32>,
    /// Mean efficiency over all workers.
    pub average_efficiency: f64,
    /// Mean work time over all workers.
    pub average_work_time: f64,
    /// Exhausted worker count.
    pub exhausted: u32,
    /// Exhausted workers / total.
    pub exhausted_ratio: f64,
    /// Eating workers / farm seats.
    pub farm_utilization: f64,
    /// Resting workers / residence seats.
    pub residence_utilization: f64,
    /// Worker limit from village centres.
    pub worker_capacity: u32,
}

/// Owns workers, farms and residences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkforceSimulator {
    workers: BTreeMap<WorkerId, Worker>,
    farms: BTreeMap<FacilityId, CareFacility>,
    residences: BTreeMap<FacilityId, CareFacility>,
    worker_capacity: u32,
    next_worker_id: u32,
    next_facility_id: u32,
}

impl WorkforceSimulator {
    /// Empty workforce with the given worker limit.
    #[must_use]
    pub fn new(worker_capacity: u32) -> Self {
        Self {
            worker_capacity,
            next_worker_id: 1,
            next_facility_id: 1,
            ..Self::default()
        }
    }

    /// Worker limit.
    #[must_use]
    pub const fn worker_capacity(&self) -> u32 {
        self.worker_capacity
    }

    /// Raise the worker limit.
    pub fn add_worker_capacity(&mut self, extra: u32) {
        self.worker_capacity = self.worker_capacity.saturating_add(extra);
    }

    /// Whether another worker fits under the limit.
    #[must_use]
    pub fn can_add_worker(&self) -> bool {
        (self.workers.len() as u32) < self.worker_capacity
    }

    /// Spawn a worker. Returns `None` when the worker limit is reached.
    pub fn add_worker(
        &mut self,
        kind: WorkerKind,
        position: Vec2,
        workplace: Vec2,
        employer: Employer,
    ) -> Option<WorkerId> {
        if !self.can_add_worker() {
            return None;
        }
        let id = WorkerId(self.next_worker_id);
        self.next_worker_id += 1;
        self.workers
            .insert(id, Worker::new(id, kind, position, workplace, employer));
        Some(id)
    }

    /// Remove a worker, releasing any seat it holds.
    pub fn remove_worker(&mut self, id: WorkerId) -> Option<Worker> {
        let worker = self.workers.remove(&id)?;
        let seats = match worker.state {
            WorkerState::Eating => Some(&mut self.farms),
            WorkerState::Resting => Some(&mut self.residences),
            _ => None,
        };
        if let (Some(seats), Some(facility)) = (seats, worker.facility) {
            if let Some(f) = seats.get_mut(&facility) {
                f.occupants = f.occupants.saturating_sub(1);
            }
        }
        Some(worker)
    }

    /// Add a farm.
    pub fn add_farm(&mut self, position: Vec2, level: u8) -> FacilityId {
        let id = self.next_facility();
        self.farms
            .insert(id, CareFacility::new(id, position, level, FARM_CAPACITY));
        id
    }

    /// Add a residence.
    pub fn add_residence(&mut self, position: Vec2, level: u8) -> FacilityId {
        let id = self.next_facility();
        self.residences
            .insert(id, CareFacility::new(id, position, level, RESIDENCE_CAPACITY));
        id
    }

    fn next_facility(&mut self) -> FacilityId {
        let id = FacilityId(self.next_facility_id);
        self.next_facility_id += 1;
        id
    }

    /// Look up a worker.
    #[must_use]
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(&id)
    }

    /// Workers in id order.
    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    /// Farms in id order.
    pub fn farms(&self) -> impl Iterator<Item = &CareFacility> {
        self.farms.values()
    }

    /// Residences in id order.
    pub fn residences(&self) -> impl Iterator<Item = &CareFacility> {
        self.residences.values()
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether there are no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Per-worker efficiency, captured before a tick so production can use
    /// the state as it stood at the start of the tick.
    #[must_use]
    pub fn efficiency_snapshot(&self) -> BTreeMap<WorkerId, f64> {
        self.workers
            .iter()
            .map(|(&id, w)| (id, w.efficiency()))
            .collect()
    }

    /// Advance every worker by `dt` seconds. `morale` scales eat/rest regeneration.
    pub fn tick(&mut self, dt: f64, morale: f64) {
        for worker in self.workers.values_mut() {
            Self::tick_worker(worker, &mut self.farms, &mut self.residences, dt, morale);
        }
    }

    fn tick_worker(
        worker: &mut Worker,
        farms: &mut BTreeMap<FacilityId, CareFacility>,
        residences: &mut BTreeMap<FacilityId, CareFacility>,
        dt: f64,
        morale: f64,
    ) {
        let params = worker.params();
        let elapsed_ms = dt * 1000.0;

        match worker.state {
            WorkerState::Idle => worker.enter(WorkerState::Working),
            WorkerState::Working => {
                worker.state_timer_ms += elapsed_ms;
                let drain = params.work_change * elapsed_ms / params.cycle_ms;
                worker.set_work_time(worker.work_time + drain);
                if worker.state_timer_ms >= params.cycle_ms || worker.work_time <= HUNGER_THRESHOLD {
                    Self::seek_farm(worker, farms);
                }
            }
            WorkerState::Eating => {
                worker.state_timer_ms += elapsed_ms;
                if worker.state_timer_ms >= params.eat_ms {
                    let fraction = params.farm_fraction * morale;
                    worker.set_work_time(regenerate(worker.work_time, fraction, params.farm_cap));
                    Self::release(worker, farms);
                    Self::seek_residence(worker, residences);
                }
            }
            WorkerState::Resting => {
                worker.state_timer_ms += elapsed_ms;
                if worker.state_timer_ms >= params.rest_ms {
                    let fraction = params.residence_fraction * morale;
                    worker.set_work_time(regenerate(
                        worker.work_time,
                        fraction,
                        params.residence_cap,
                    ));
                    Self::release(worker, residences);
                    let workplace = worker.workplace;
                    worker.walk_to(workplace, WorkerState::WalkingToWork);
                }
            }
            WorkerState::Camping => {
                worker.state_timer_ms += elapsed_ms;
                if worker.state_timer_ms >= params.camp_ms() {
                    worker.set_work_time(regenerate(
                        worker.work_time,
                        params.camp_fraction,
                        params.farm_cap,
                    ));
                    let workplace = worker.workplace;
                    worker.walk_to(workplace, WorkerState::WalkingToWork);
                }
            }
            WorkerState::WalkingToFeed
            | WorkerState::WalkingToRest
            | WorkerState::WalkingToCamp
            | WorkerState::WalkingToWork => {
                if let Some(travel) = worker.travel.as_mut() {
                    let arrived = travel.advance(params.speed, dt);
                    worker.position = travel.position();
                    if !arrived {
                        return;
                    }
                }
                Self::arrive(worker, farms, residences);
            }
        }
    }

    fn arrive(
        worker: &mut Worker,
        farms: &mut BTreeMap<FacilityId, CareFacility>,
        residences: &mut BTreeMap<FacilityId, CareFacility>,
    ) {
        match worker.state {
            WorkerState::WalkingToFeed => {
                if Self::occupy(worker, farms) {
                    worker.enter(WorkerState::Eating);
                } else {
                    Self::seek_farm(worker, farms);
                }
            }
            WorkerState::WalkingToRest => {
                if Self::occupy(worker, residences) {
                    worker.enter(WorkerState::Resting);
                } else {
                    Self::seek_residence(worker, residences);
                }
            }
            WorkerState::WalkingToCamp => worker.enter(WorkerState::Camping),
            WorkerState::WalkingToWork => worker.enter(WorkerState::Working),
            _ => {}
        }
    }

    /// Take a seat at the target facility if one is still free.
    fn occupy(worker: &mut Worker, facilities: &mut BTreeMap<FacilityId, CareFacility>) -> bool {
        let Some(facility) = worker.facility.and_then(|id| facilities.get_mut(&id)) else {
            worker.facility = None;
            return false;
        };
        if facility.has_space() {
            facility.occupants += 1;
            true
        } else {
            worker.facility = None;
            false
        }
    }

    fn release(worker: &mut Worker, facilities: &mut BTreeMap<FacilityId, CareFacility>) {
        if let Some(facility) = worker.facility.take().and_then(|id| facilities.get_mut(&id)) {
            facility.occupants = facility.occupants.saturating_sub(1);
        }
    }

    fn seek_farm(worker: &mut Worker, farms: &BTreeMap<FacilityId, CareFacility>) {
        match nearest_with_space(farms, worker.position, worker.params().camper_range) {
            Some((id, position)) => {
                worker.facility = Some(id);
                worker.walk_to(position, WorkerState::WalkingToFeed);
            }
            None => Self::go_camp(worker),
        }
    }

    fn seek_residence(worker: &mut Worker, residences: &BTreeMap<FacilityId, CareFacility>) {
        match nearest_with_space(residences, worker.position, worker.params().camper_range) {
            Some((id, position)) => {
                worker.facility = Some(id);
                worker.walk_to(position, WorkerState::WalkingToRest);
            }
            None => Self::go_camp(worker),
        }
    }

    fn go_camp(worker: &mut Worker) {
        worker.facility = None;
        let workplace = worker.workplace;
        worker.walk_to(workplace, WorkerState::WalkingToCamp);
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> WorkforceStats {
        let mut by_state: BTreeMap<WorkerState, u32> =
            WorkerState::ALL.iter().map(|&s| (s, 0)).collect();
        let mut efficiency = 0.0;
        let mut work_time = 0.0;
        let mut exhausted = 0;
        for worker in self.workers.values() {
            *by_state.entry(worker.state).or_insert(0) += 1;
            efficiency += worker.efficiency();
            work_time += worker.work_time;
            if worker.is_exhausted() {
                exhausted += 1;
            }
        }

        let total = self.workers.len() as u32;
        let per_worker = |sum: f64| if total == 0 { 0.0 } else { sum / f64::from(total) };
        let farm_seats: u32 = self.farms.values().map(CareFacility::capacity).sum();
        let residence_seats: u32 = self.residences.values().map(CareFacility::capacity).sum();
        let ratio = |part: u32, whole: u32| {
            if whole == 0 {
                0.0
            } else {
                f64::from(part) / f64::from(whole)
            }
        };

        WorkforceStats {
            total,
            average_efficiency: per_worker(efficiency),
            average_work_time: per_worker(work_time),
            exhausted,
            exhausted_ratio: ratio(exhausted, total),
            farm_utilization: ratio(by_state[&WorkerState::Eating], farm_seats),
            residence_utilization: ratio(by_state[&WorkerState::Resting], residence_seats),
            by_state,
            worker_capacity: self.worker_capacity,
        }
    }
}
