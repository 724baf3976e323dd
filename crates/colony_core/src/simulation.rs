//! The colony orchestrator.
//!
//! [`Colony`] owns every component of one episode and is the only caller of
//! their mutating operations. Each tick runs the components in a fixed
//! order so that identical inputs always produce identical state.
//!
//! # Tick Order
//!
//! 1. **Morale** - tax income and blessing timers; yields the multiplier
//! 2. **Workforce** - fatigue state machines (efficiency snapshot taken first)
//! 3. **Production** - mines, refiners and serf movement/extraction
//! 4. **Depletion** - extractions settled against nodes, reassignment
//! 5. **Construction** - builder work and commissioning of finished sites

use crate::allocation::{ResourceAllocator, SettlementReport};
use crate::buildings::{Blueprint, BlueprintCatalog, BuildingKind, BuildingType, FacilityRole};
use crate::commands::{Command, CommandOutcome};
use crate::config::SimConfig;
use crate::construction::{ConstructionQueue, ConstructionSite, SiteId};
use crate::math::Vec2;
use crate::morale::{Morale, TaxLevel};
use crate::nodes::{GatherCategory, NodeId, NodeKind, NodeStore};
use crate::pathfinding::{BuildingId, FootprintClass, WalkableGrid};
use crate::production::{
    MineId, ProductionRates, ProductionReport, ProductionSystem, RefinerId, RefinerSpec,
};
use crate::resources::{ResourceKind, Stockpile};
use crate::scenario::EpisodeSnapshot;
use crate::serfs::SerfStats;
use crate::workforce::{Employer, WorkerId, WorkforceSimulator, WorkforceStats};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A finished building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletedBuilding {
    /// Type and level.
    pub building: BuildingType,
    /// Centre position.
    pub position: Vec2,
    /// Occupied footprint, if it could be placed on the grid.
    pub grid_building: Option<BuildingId>,
    /// Workers spawned with it.
    pub workers: u32,
}

/// Events from one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number after the step.
    pub tick: u64,
    /// Gold collected as tax.
    pub income: f64,
    /// Mine and refiner output.
    pub production: ProductionReport,
    /// Serf extraction and depletion.
    pub settlement: SettlementReport,
    /// Buildings finished this tick.
    pub completed: Vec<CompletedBuilding>,
}

/// Progress of one construction site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteStats {
    /// Site id.
    pub id: SiteId,
    /// What is being built.
    pub building: BuildingType,
    /// Completed fraction.
    pub progress: f64,
    /// Serfs assigned (walking or building).
    pub builders: u32,
}

/// Colony summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyStats {
    /// Ticks run.
    pub tick: u64,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Worker summary.
    pub workforce: WorkforceStats,
    /// Serf summary.
    pub serfs: SerfStats,
    /// Current stock.
    pub stockpile: Stockpile,
    /// Steady-state rates.
    pub rates: ProductionRates,
    /// Resource with the lowest net rate.
    pub bottleneck: Option<ResourceKind>,
    /// Open sites.
    pub sites: Vec<SiteStats>,
    /// Finished buildings.
    pub buildings: usize,
    /// Effective morale multiplier.
    pub morale: f64,
    /// Tax level.
    pub tax_level: TaxLevel,
}

/// Where a new building would go.
#[derive(Debug, Clone, Copy)]
struct Placement {
    position: Vec2,
    footprint: FootprintClass,
    node: Option<NodeId>,
}

#[derive(Serialize)]
struct HashView<'a> {
    tick: u64,
    elapsed: f64,
    workforce: &'a WorkforceSimulator,
    production: &'a ProductionSystem,
    allocator: &'a ResourceAllocator,
    sites: &'a ConstructionQueue,
    morale: &'a Morale,
    buildings: &'a [CompletedBuilding],
}

/// One episode of the settlement economy.
#[derive(Debug, Clone)]
pub struct Colony {
    snapshot: EpisodeSnapshot,
    config: SimConfig,
    tick: u64,
    elapsed: f64,
    grid: WalkableGrid,
    workforce: WorkforceSimulator,
    production: ProductionSystem,
    allocator: ResourceAllocator,
    sites: ConstructionQueue,
    morale: Morale,
    buildings: Vec<CompletedBuilding>,
}

impl Colony {
    /// Fresh episode from a snapshot.
    #[must_use]
    pub fn new(snapshot: &EpisodeSnapshot) -> Self {
        let scenario = &snapshot.scenario;
        let config = scenario.config.clone();

        let mut grid = WalkableGrid::new(Arc::clone(&snapshot.terrain));
        grid.set_ring_search_radius(config.ring_search_radius);

        let mut nodes = NodeStore::new();
        for tree in &scenario.trees {
            let position = Vec2::new(tree.x, tree.y);
            nodes.add(NodeKind::Tree, ResourceKind::Wood, position, tree.amount);
            grid.add_tree(position);
        }
        for deposit in &scenario.deposits {
            nodes.add(
                NodeKind::Deposit,
                deposit.resource,
                Vec2::new(deposit.x, deposit.y),
                deposit.amount.unwrap_or(0),
            );
        }
        for shaft in &scenario.shafts {
            nodes.add(
                NodeKind::Shaft,
                shaft.resource,
                Vec2::new(shaft.x, shaft.y),
                shaft.amount.unwrap_or(config.shaft_budget),
            );
        }

        let mut production = ProductionSystem::new(Stockpile::with_amounts(&scenario.stockpile));
        for _ in 0..scenario.serfs {
            production.serfs_mut().spawn(scenario.headquarters);
        }

        let mut colony = Self {
            snapshot: snapshot.clone(),
            grid,
            workforce: WorkforceSimulator::new(0),
            production,
            allocator: ResourceAllocator::new(nodes, config.allocation),
            sites: ConstructionQueue::new(),
            morale: Morale::new(config.morale),
            buildings: Vec::new(),
            tick: 0,
            elapsed: 0.0,
            config,
        };

        for placement in &scenario.buildings {
            let position = placement.position();
            let Some(blueprint) = colony.snapshot.catalog.get(placement.building).cloned() else {
                continue;
            };
            let grid_building = colony.grid.add_building(position, blueprint.footprint);
            if grid_building.is_none() {
                tracing::warn!(
                    building = %placement.building,
                    x = position.x,
                    y = position.y,
                    "starting building does not fit the grid"
                );
            }
            let node = blueprint.building.kind.mined_resource().and_then(|resource| {
                colony
                    .allocator
                    .nodes()
                    .mine_site_near(resource, position, |_| false)
                    .filter(|&id| {
                        colony.allocator.nodes().get(id).is_some_and(|n| {
                            n.position.distance(position) <= colony.config.allocation.claim_tolerance
                        })
                    })
            });
            colony.commission(&blueprint, position, grid_building, node);
        }

        tracing::debug!(
            scenario = %scenario.name,
            serfs = scenario.serfs,
            nodes = colony.allocator.nodes().len(),
            "colony reset"
        );
        colony
    }

    /// Discard all dynamic state and start over from the snapshot.
    pub fn reset(&mut self) {
        *self = Self::new(&self.snapshot);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Ticks run since reset.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since reset.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Tunables in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Snapshot this episode was built from.
    #[must_use]
    pub const fn snapshot(&self) -> &EpisodeSnapshot {
        &self.snapshot
    }

    /// Building catalog.
    #[must_use]
    pub fn catalog(&self) -> &BlueprintCatalog {
        &self.snapshot.catalog
    }

    /// Headquarters position.
    #[must_use]
    pub fn headquarters(&self) -> Vec2 {
        self.snapshot.scenario.headquarters
    }

    /// Spatial grid.
    #[must_use]
    pub const fn grid(&self) -> &WalkableGrid {
        &self.grid
    }

    /// Mutable grid for path queries (the path cache is updated).
    pub fn grid_mut(&mut self) -> &mut WalkableGrid {
        &mut self.grid
    }

    /// Workers and their facilities.
    #[must_use]
    pub const fn workforce(&self) -> &WorkforceSimulator {
        &self.workforce
    }

    /// Mines, refiners, serfs and stock.
    #[must_use]
    pub const fn production(&self) -> &ProductionSystem {
        &self.production
    }

    /// Nodes and assignments.
    #[must_use]
    pub const fn allocator(&self) -> &ResourceAllocator {
        &self.allocator
    }

    /// Open construction sites.
    #[must_use]
    pub const fn sites(&self) -> &ConstructionQueue {
        &self.sites
    }

    /// Morale state.
    #[must_use]
    pub const fn morale(&self) -> &Morale {
        &self.morale
    }

    /// Finished buildings in completion order.
    #[must_use]
    pub fn buildings(&self) -> &[CompletedBuilding] {
        &self.buildings
    }

    /// Current stock.
    #[must_use]
    pub const fn stockpile(&self) -> &Stockpile {
        self.production.stockpile()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the colony by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let mut report = TickReport::default();

        // 1. Morale
        report.income = self.morale.tick(dt, self.workforce.len());
        self.production
            .stockpile_mut()
            .add(ResourceKind::Gold, report.income);
        let morale = self.morale.multiplier();

        // 2. Workforce
        let efficiency = self.workforce.efficiency_snapshot();
        self.workforce.tick(dt, morale);

        // 3. Production
        let (production, requests) = self.production.tick(
            dt,
            &efficiency,
            self.config.serf_speed,
            &self.config.extraction,
        );
        report.production = production;

        // 4. Depletion and reassignment
        let (stockpile, serfs) = self.production.split_mut();
        report.settlement = self
            .allocator
            .settle(&requests, serfs, stockpile, &mut self.grid);

        // 5. Construction
        let serfs = self.production.serfs();
        let finished = self
            .sites
            .tick(dt, self.config.builder_falloff, |site| serfs.present_at_site(site));
        for site in finished {
            report.completed.push(self.finish_site(&site));
        }

        self.tick += 1;
        self.elapsed += dt;
        report.tick = self.tick;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Colony state hash");
        }

        report
    }

    /// Run `ticks` steps of `dt` seconds.
    pub fn run(&mut self, ticks: u64, dt: f64) {
        for _ in 0..ticks {
            self.tick(dt);
        }
    }

    fn finish_site(&mut self, site: &ConstructionSite) -> CompletedBuilding {
        let released = self
            .allocator
            .release_site(site.id, self.production.serfs_mut());
        tracing::info!(
            tick = self.tick,
            site = site.id.0,
            building = %site.building,
            released,
            "construction finished"
        );
        match self.snapshot.catalog.get(site.building).cloned() {
            Some(blueprint) => {
                self.commission(&blueprint, site.position, Some(site.grid_building), site.node)
            }
            None => CompletedBuilding {
                building: site.building,
                position: site.position,
                grid_building: Some(site.grid_building),
                workers: 0,
            },
        }
    }

    /// Bring a finished building into the economy.
    fn commission(
        &mut self,
        blueprint: &Blueprint,
        position: Vec2,
        grid_building: Option<BuildingId>,
        node: Option<NodeId>,
    ) -> CompletedBuilding {
        let level = blueprint.building.level;
        let supplier = self.headquarters();
        let employer = match blueprint.role {
            FacilityRole::Housing { worker_capacity } => {
                self.workforce.add_worker_capacity(worker_capacity);
                Employer::Other
            }
            FacilityRole::Farm => {
                self.workforce.add_farm(position, level);
                Employer::Other
            }
            FacilityRole::Residence => {
                self.workforce.add_residence(position, level);
                Employer::Other
            }
            FacilityRole::Mine { resource } => {
                let interrupted = self.allocator.claim_for_mine(
                    resource,
                    position,
                    self.production.serfs_mut(),
                );
                if interrupted > 0 {
                    tracing::debug!(%resource, interrupted, "mine claimed an active node");
                }
                Employer::Mine(self.production.add_mine(resource, position, level, node))
            }
            FacilityRole::Refiner {
                input,
                output,
                ratio,
            } => Employer::Refiner(self.production.add_refiner(RefinerSpec {
                input,
                output,
                ratio,
                position,
                supplier,
            })),
            FacilityRole::Workshop => Employer::Other,
        };

        let mut hired = Vec::new();
        if let Some(kind) = blueprint.worker_kind {
            for _ in 0..blueprint.workers {
                match self.workforce.add_worker(kind, position, position, employer) {
                    Some(id) => hired.push(id),
                    None => break,
                }
            }
        }
        match employer {
            Employer::Mine(id) => {
                self.production.assign_mine_workers(id, &hired);
            }
            Employer::Refiner(id) => {
                self.production.assign_refiner_workers(id, &hired);
            }
            Employer::Other => {}
        }
        if (hired.len() as u32) < blueprint.workers {
            tracing::warn!(
                building = %blueprint.building,
                hired = hired.len(),
                wanted = blueprint.workers,
                "worker limit reached"
            );
        }

        let completed = CompletedBuilding {
            building: blueprint.building,
            position,
            grid_building,
            workers: hired.len() as u32,
        };
        self.buildings.push(completed);
        completed
    }

    // ========================================================================
    // Gathering
    // ========================================================================

    /// Whether `n` serfs could be sent to gather `category`.
    #[must_use]
    pub fn can_assign(&self, category: GatherCategory, n: u32) -> bool {
        self.allocator
            .can_assign(category, n, self.production.serfs())
    }

    /// Whether `n` serfs gathering `category` could be recalled.
    #[must_use]
    pub fn can_recall(&self, category: GatherCategory, n: u32) -> bool {
        self.allocator
            .can_recall(category, n, self.production.serfs())
    }

    /// Send up to `n` idle serfs to gather `category`; returns the number sent.
    pub fn assign(&mut self, category: GatherCategory, n: u32) -> u32 {
        self.allocator.assign(
            category,
            n,
            self.production.serfs_mut(),
            &mut self.grid,
        )
    }

    /// Recall up to `n` serfs gathering `category`; returns the number recalled.
    pub fn recall(&mut self, category: GatherCategory, n: u32) -> u32 {
        self.allocator
            .recall(category, n, self.production.serfs_mut())
    }

    /// Send up to `n` idle serfs to fell trees.
    pub fn assign_wood(&mut self, n: u32) -> u32 {
        self.assign(GatherCategory::Wood, n)
    }

    /// Recall up to `n` woodcutters.
    pub fn recall_wood(&mut self, n: u32) -> u32 {
        self.recall(GatherCategory::Wood, n)
    }

    /// Send up to `n` idle serfs to `resource` deposits.
    pub fn assign_deposit(&mut self, resource: ResourceKind, n: u32) -> u32 {
        self.assign(GatherCategory::Deposit(resource), n)
    }

    /// Recall up to `n` serfs from `resource` deposits.
    pub fn recall_deposit(&mut self, resource: ResourceKind, n: u32) -> u32 {
        self.recall(GatherCategory::Deposit(resource), n)
    }

    /// Send up to `n` idle serfs to `resource` shafts.
    pub fn assign_shaft(&mut self, resource: ResourceKind, n: u32) -> u32 {
        self.assign(GatherCategory::Shaft(resource), n)
    }

    /// Recall up to `n` serfs from `resource` shafts.
    pub fn recall_shaft(&mut self, resource: ResourceKind, n: u32) -> u32 {
        self.recall(GatherCategory::Shaft(resource), n)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    fn plan_placement(&self, blueprint: &Blueprint, position: Option<Vec2>) -> Option<Placement> {
        let footprint = blueprint.footprint;
        if let Some(resource) = blueprint.building.kind.mined_resource() {
            let near = position.unwrap_or_else(|| self.headquarters());
            let nodes = self.allocator.nodes();
            let node = nodes.mine_site_near(resource, near, |id| self.sites.targets_node(id))?;
            let position = nodes.get(node)?.position;
            return self
                .grid
                .can_build_at(position, footprint)
                .then_some(Placement {
                    position,
                    footprint,
                    node: Some(node),
                });
        }

        let position = match position {
            Some(position) => position,
            None => *self
                .grid
                .find_building_spots(footprint, self.headquarters(), self.config.placement_radius, 1)
                .first()?,
        };
        self.grid
            .can_build_at(position, footprint)
            .then_some(Placement {
                position,
                footprint,
                node: None,
            })
    }

    /// Whether `building` could be started now.
    ///
    /// Mines go on the nearest free deposit or shaft of their resource
    /// (searched from `position`, or the headquarters). Other buildings use
    /// `position` when given, or the nearest free spot around the
    /// headquarters.
    #[must_use]
    pub fn can_build(&self, building: BuildingType, position: Option<Vec2>) -> bool {
        self.snapshot.catalog.get(building).is_some_and(|blueprint| {
            self.production.stockpile().can_afford(&blueprint.cost)
                && self.plan_placement(blueprint, position).is_some()
        })
    }

    /// Open a construction site, paying its cost.
    ///
    /// Returns `None` without changing anything when the building is
    /// unknown, unaffordable, or has no valid placement.
    pub fn start_construction(
        &mut self,
        building: BuildingType,
        position: Option<Vec2>,
    ) -> Option<SiteId> {
        let catalog = Arc::clone(&self.snapshot.catalog);
        let Some(blueprint) = catalog.get(building) else {
            tracing::warn!(%building, "no blueprint");
            return None;
        };
        if !self.production.stockpile().can_afford(&blueprint.cost) {
            tracing::warn!(%building, "cannot afford construction");
            return None;
        }
        let Some(placement) = self.plan_placement(blueprint, position) else {
            tracing::warn!(%building, "no valid placement");
            return None;
        };
        let grid_building = self.grid.add_building(placement.position, placement.footprint)?;
        self.production.stockpile_mut().spend(&blueprint.cost);

        let trees = self.grid.trees_blocking(placement.position, placement.footprint);
        let id = self.sites.open(
            building,
            placement.position,
            blueprint.build_time,
            grid_building,
            placement.node,
        );
        tracing::info!(
            tick = self.tick,
            site = id.0,
            %building,
            x = placement.position.x,
            y = placement.position.y,
            blocking_trees = trees.len(),
            "construction started"
        );
        Some(id)
    }

    /// Whether `n` builders could be sent to `site` (any site when `None`).
    #[must_use]
    pub fn can_assign_builders(&self, site: Option<SiteId>, n: u32) -> bool {
        self.allocator
            .can_assign_builders(site, n, self.production.serfs(), &self.sites)
    }

    /// Send up to `n` idle serfs to build; returns the number sent.
    pub fn assign_builders(&mut self, site: Option<SiteId>, n: u32) -> u32 {
        self.allocator.assign_builders(
            site,
            n,
            self.production.serfs_mut(),
            &self.sites,
            &mut self.grid,
        )
    }

    /// Recall up to `n` builders; returns the number recalled.
    pub fn recall_builders(&mut self, n: u32) -> u32 {
        self.allocator
            .recall_builders(n, self.production.serfs_mut())
    }

    // ========================================================================
    // Serfs, workers and mines
    // ========================================================================

    /// Whether `n` serfs could be bought.
    #[must_use]
    pub fn can_buy_serf(&self, n: u32) -> bool {
        n > 0
            && self
                .production
                .stockpile()
                .can_afford(&self.config.serf_price(n))
    }

    /// Buy up to `n` serfs, as many as the gold allows; returns the number bought.
    pub fn buy_serf(&mut self, n: u32) -> u32 {
        let price = self.config.serf_price(1);
        let hq = self.headquarters();
        let mut bought = 0;
        while bought < n && self.production.stockpile_mut().spend(&price) {
            self.production.serfs_mut().spawn(hq);
            bought += 1;
        }
        bought
    }

    /// Whether `n` idle serfs could be dismissed.
    #[must_use]
    pub fn can_dismiss_serf(&self, n: u32) -> bool {
        n > 0 && self.production.serfs().idle_count() >= n as usize
    }

    /// Dismiss up to `n` idle serfs; returns the number dismissed.
    pub fn dismiss_serf(&mut self, n: u32) -> u32 {
        let mut dismissed = 0;
        while dismissed < n && self.production.serfs_mut().dismiss_idle().is_some() {
            dismissed += 1;
        }
        dismissed
    }

    /// Remove a worker from the colony and its employer.
    pub fn dismiss_worker(&mut self, id: WorkerId) -> bool {
        if self.workforce.remove_worker(id).is_none() {
            return false;
        }
        self.production.release_worker(id);
        true
    }

    fn mine_upgrade(&self, id: MineId) -> Option<&Blueprint> {
        let mine = self.production.mine(id)?;
        let kind = BuildingKind::mine_for(mine.resource)?;
        self.snapshot
            .catalog
            .get(BuildingType::new(kind, mine.level + 1))
    }

    /// Whether a mine can be raised one level now.
    #[must_use]
    pub fn can_upgrade_mine(&self, id: MineId) -> bool {
        self.mine_upgrade(id)
            .is_some_and(|blueprint| self.production.stockpile().can_afford(&blueprint.cost))
    }

    /// Raise a mine one level, paying the next level's cost and hiring
    /// miners for the new slots.
    pub fn upgrade_mine(&mut self, id: MineId) -> bool {
        let Some(blueprint) = self.mine_upgrade(id).cloned() else {
            return false;
        };
        if !self.production.stockpile_mut().spend(&blueprint.cost) || !self.production.upgrade_mine(id) {
            return false;
        }
        let Some((position, free)) = self
            .production
            .mine(id)
            .map(|m| (m.position, m.slots().saturating_sub(m.workers().len() as u32)))
        else {
            return true;
        };
        let hired: Vec<WorkerId> = blueprint
            .worker_kind
            .into_iter()
            .flat_map(|kind| std::iter::repeat(kind).take(free as usize))
            .map_while(|kind| {
                self.workforce
                    .add_worker(kind, position, position, Employer::Mine(id))
            })
            .collect();
        self.production.assign_mine_workers(id, &hired);
        true
    }

    // ========================================================================
    // Morale
    // ========================================================================

    /// Change the tax level.
    pub fn set_tax_level(&mut self, level: TaxLevel) {
        self.morale.set_tax_level(level);
    }

    /// Start a blessing; `false` while on cooldown.
    pub fn bless(&mut self) -> bool {
        self.morale.bless()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Whether `command` would change anything.
    #[must_use]
    pub fn can_apply(&self, command: &Command) -> bool {
        match *command {
            Command::AssignWood(n) => self.can_assign(GatherCategory::Wood, n),
            Command::RecallWood(n) => self.can_recall(GatherCategory::Wood, n),
            Command::AssignDeposit { resource, count } => {
                self.can_assign(GatherCategory::Deposit(resource), count)
            }
            Command::RecallDeposit { resource, count } => {
                self.can_recall(GatherCategory::Deposit(resource), count)
            }
            Command::AssignShaft { resource, count } => {
                self.can_assign(GatherCategory::Shaft(resource), count)
            }
            Command::RecallShaft { resource, count } => {
                self.can_recall(GatherCategory::Shaft(resource), count)
            }
            Command::StartConstruction { building, position } => self.can_build(building, position),
            Command::AssignBuilders { site, count } => self.can_assign_builders(site, count),
            Command::RecallBuilders(n) => {
                n > 0 && self.production.serfs().stats().building >= n
            }
            Command::BuySerf(n) => self.can_buy_serf(n),
            Command::DismissSerf(n) => self.can_dismiss_serf(n),
            Command::DismissWorker(id) => self.workforce.worker(id).is_some(),
            Command::UpgradeMine(id) => self.can_upgrade_mine(id),
            Command::SetTaxLevel(level) => level != self.morale.tax_level(),
            Command::Bless => self.morale.can_bless(),
        }
    }

    /// Apply a command.
    pub fn apply(&mut self, command: Command) -> CommandOutcome {
        let outcome = match command {
            Command::AssignWood(n) => CommandOutcome::from_count(self.assign_wood(n)),
            Command::RecallWood(n) => CommandOutcome::from_count(self.recall_wood(n)),
            Command::AssignDeposit { resource, count } => {
                CommandOutcome::from_count(self.assign_deposit(resource, count))
            }
            Command::RecallDeposit { resource, count } => {
                CommandOutcome::from_count(self.recall_deposit(resource, count))
            }
            Command::AssignShaft { resource, count } => {
                CommandOutcome::from_count(self.assign_shaft(resource, count))
            }
            Command::RecallShaft { resource, count } => {
                CommandOutcome::from_count(self.recall_shaft(resource, count))
            }
            Command::StartConstruction { building, position } => self
                .start_construction(building, position)
                .map_or(CommandOutcome::Rejected, CommandOutcome::SiteOpened),
            Command::AssignBuilders { site, count } => {
                CommandOutcome::from_count(self.assign_builders(site, count))
            }
            Command::RecallBuilders(n) => CommandOutcome::from_count(self.recall_builders(n)),
            Command::BuySerf(n) => CommandOutcome::from_count(self.buy_serf(n)),
            Command::DismissSerf(n) => CommandOutcome::from_count(self.dismiss_serf(n)),
            Command::DismissWorker(id) => {
                CommandOutcome::from_count(u32::from(self.dismiss_worker(id)))
            }
            Command::UpgradeMine(id) => CommandOutcome::from_count(u32::from(self.upgrade_mine(id))),
            Command::SetTaxLevel(level) => {
                self.set_tax_level(level);
                CommandOutcome::Applied(1)
            }
            Command::Bless => CommandOutcome::from_count(u32::from(self.bless())),
        };
        tracing::debug!(tick = self.tick, ?command, ?outcome, "command applied");
        outcome
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Steady-state production rates.
    #[must_use]
    pub fn rates(&self) -> ProductionRates {
        self.production.rates(
            &self.workforce.efficiency_snapshot(),
            &self.config.extraction,
        )
    }

    /// Colony summary.
    #[must_use]
    pub fn stats(&self) -> ColonyStats {
        let rates = self.rates();
        let serfs = self.production.serfs();
        ColonyStats {
            tick: self.tick,
            elapsed: self.elapsed,
            workforce: self.workforce.stats(),
            serfs: serfs.stats(),
            stockpile: *self.production.stockpile(),
            bottleneck: rates.bottleneck(),
            rates,
            sites: self
                .sites
                .iter()
                .map(|site| SiteStats {
                    id: site.id,
                    building: site.building,
                    progress: site.progress(),
                    builders: serfs.at_site(site.id).len() as u32,
                })
                .collect(),
            buildings: self.buildings.len(),
            morale: self.morale.multiplier(),
            tax_level: self.morale.tax_level(),
        }
    }

    /// Deterministic hash of all dynamic state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let view = HashView {
            tick: self.tick,
            elapsed: self.elapsed,
            workforce: &self.workforce,
            production: &self.production,
            allocator: &self.allocator,
            sites: &self.sites,
            morale: &self.morale,
            buildings: &self.buildings,
        };
        let mut hasher = DefaultHasher::new();
        match bincode::serialize(&view) {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => self.tick.hash(&mut hasher),
        }
        let mut footprints: Vec<BuildingId> = self.grid.buildings().map(|(id, _)| id).collect();
        footprints.sort_unstable();
        footprints.hash(&mut hasher);
        hasher.finish()
    }

    /// Mine ids in order.
    #[must_use]
    pub fn mine_ids(&self) -> Vec<MineId> {
        self.production.mines().map(|m| m.id).collect()
    }

    /// Refiner ids in order.
    #[must_use]
    pub fn refiner_ids(&self) -> Vec<RefinerId> {
        self.production.refiners().map(|r| r.id).collect()
    }
}
