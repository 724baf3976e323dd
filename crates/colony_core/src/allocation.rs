//! Binding of serfs to harvest nodes and construction sites.
//!
//! The allocator owns the nodes and is the only place that changes who works
//! where: manual assignment and recall, builder dispatch, settlement of
//! extractions against node yield, automatic reassignment when a node runs
//! dry, and interruption when a mine claims a node.

use crate::construction::{ConstructionQueue, SiteId};
use crate::math::Vec2;
use crate::nodes::{GatherCategory, NodeId, NodeKind, NodeStore};
use crate::pathfinding::WalkableGrid;
use crate::resources::{ResourceKind, ResourceTable, Stockpile};
use crate::serfs::{ExtractionRequest, SerfId, SerfRoster};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default search radius for reassignment, measured from the exhausted node.
pub const DEFAULT_REASSIGN_RADIUS: f64 = 4500.0;

/// Default distance within which a mine claims deposits and shafts.
pub const DEFAULT_CLAIM_TOLERANCE: f64 = 500.0;

/// Allocator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Reassignment search radius in world units.
    pub reassign_radius: f64,
    /// Mine claim distance in world units.
    pub claim_tolerance: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            reassign_radius: DEFAULT_REASSIGN_RADIUS,
            claim_tolerance: DEFAULT_CLAIM_TOLERANCE,
        }
    }
}

/// Outcome of settling one tick of extractions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Units credited per resource.
    pub gathered: ResourceTable<f64>,
    /// Nodes that ran dry this tick.
    pub depleted: Vec<NodeId>,
    /// Serfs moved to a new node.
    pub reassigned: u32,
    /// Serfs that found no new node.
    pub idled: u32,
}

/// Serf assignment manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceAllocator {
    nodes: NodeStore,
    config: AllocationConfig,
}

impl ResourceAllocator {
    /// Allocator over a loaded node set.
    #[must_use]
    pub fn new(nodes: NodeStore, config: AllocationConfig) -> Self {
        Self { nodes, config }
    }

    /// The nodes.
    #[must_use]
    pub const fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// Tunables in use.
    #[must_use]
    pub const fn config(&self) -> AllocationConfig {
        self.config
    }

    // ========================================================================
    // Gathering
    // ========================================================================

    /// Whether `n` serfs could be sent to gather `category`.
    #[must_use]
    pub fn can_assign(&self, category: GatherCategory, n: u32, serfs: &SerfRoster) -> bool {
        n > 0 && self.nodes.has_available(category) && serfs.idle_count() >= n as usize
    }

    /// Whether `n` serfs gathering `category` could be recalled.
    #[must_use]
    pub fn can_recall(&self, category: GatherCategory, n: u32, serfs: &SerfRoster) -> bool {
        n > 0 && serfs.gathering(category).len() >= n as usize
    }

    /// Send up to `n` idle serfs to gather `category`.
    ///
    /// Each serf goes to the node with the fewest bound serfs, so a batch
    /// spreads across nodes. Returns the number sent.
    pub fn assign(
        &mut self,
        category: GatherCategory,
        n: u32,
        serfs: &mut SerfRoster,
        grid: &mut WalkableGrid,
    ) -> u32 {
        let mut sent = 0;
        for id in serfs.idle_ids().into_iter().take(n as usize) {
            let Some(position) = serfs.get(id).map(|s| s.position) else {
                continue;
            };
            let Some(node_id) = self.nodes.least_loaded(category, position) else {
                break;
            };
            let route = serf_route(grid, position, &self.nodes, node_id);
            if self.bind(route, id, category, node_id, serfs) {
                sent += 1;
            }
        }
        if sent > 0 {
            tracing::debug!(%category, sent, "serfs assigned");
        }
        sent
    }

    /// Return up to `n` serfs gathering `category` to idle, newest first.
    pub fn recall(&mut self, category: GatherCategory, n: u32, serfs: &mut SerfRoster) -> u32 {
        let mut recalled = 0;
        for id in serfs.gathering(category).into_iter().rev().take(n as usize) {
            self.release_serf(id, serfs);
            recalled += 1;
        }
        recalled
    }

    fn bind(
        &mut self,
        route: Option<(Vec2, f64)>,
        serf: SerfId,
        category: GatherCategory,
        node: NodeId,
        serfs: &mut SerfRoster,
    ) -> bool {
        let (Some((target, length)), Some(s)) = (route, serfs.get_mut(serf)) else {
            return false;
        };
        s.send_to_node(category, node, target, length);
        if let Some(n) = self.nodes.get_mut(node) {
            n.bound_serfs += 1;
        }
        true
    }

    fn unbind(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.bound_serfs = n.bound_serfs.saturating_sub(1);
        }
    }

    /// Return one serf to idle, dropping its binding.
    pub fn release_serf(&mut self, id: SerfId, serfs: &mut SerfRoster) {
        let Some(serf) = serfs.get_mut(id) else {
            return;
        };
        let node = serf.node();
        serf.make_idle();
        if let Some(node) = node {
            self.unbind(node);
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Whether `n` builders could be sent to `site` (or any site when `None`).
    #[must_use]
    pub fn can_assign_builders(
        &self,
        site: Option<SiteId>,
        n: u32,
        serfs: &SerfRoster,
        sites: &ConstructionQueue,
    ) -> bool {
        let target_exists = match site {
            Some(id) => sites.get(id).is_some(),
            None => !sites.is_empty(),
        };
        n > 0 && target_exists && serfs.idle_count() >= n as usize
    }

    /// Send up to `n` idle serfs to build.
    ///
    /// With no explicit site each serf goes to the site with the fewest
    /// builders, ties broken by lowest id. Returns the number sent.
    pub fn assign_builders(
        &mut self,
        site: Option<SiteId>,
        n: u32,
        serfs: &mut SerfRoster,
        sites: &ConstructionQueue,
        grid: &mut WalkableGrid,
    ) -> u32 {
        let mut load: BTreeMap<SiteId, usize> = sites
            .iter()
            .map(|s| (s.id, serfs.at_site(s.id).len()))
            .collect();
        let mut sent = 0;
        for id in serfs.idle_ids().into_iter().take(n as usize) {
            let target = match site {
                Some(site) => sites.get(site),
                None => load
                    .iter()
                    .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
                    .and_then(|(&site, _)| sites.get(site)),
            };
            let Some(target) = target else {
                break;
            };
            let Some(serf) = serfs.get_mut(id) else {
                continue;
            };
            let length = grid.path_distance(serf.position, target.position);
            serf.send_to_site(target.id, target.position, length);
            *load.entry(target.id).or_insert(0) += 1;
            sent += 1;
        }
        sent
    }

    /// Return up to `n` builders to idle, newest first.
    pub fn recall_builders(&mut self, n: u32, serfs: &mut SerfRoster) -> u32 {
        let builders: Vec<SerfId> = serfs
            .iter()
            .filter(|s| s.site().is_some())
            .map(|s| s.id)
            .collect();
        let mut recalled = 0;
        for id in builders.into_iter().rev().take(n as usize) {
            if let Some(serf) = serfs.get_mut(id) {
                serf.make_idle();
                recalled += 1;
            }
        }
        recalled
    }

    /// Release every serf of a finished site.
    pub fn release_site(&mut self, site: SiteId, serfs: &mut SerfRoster) -> u32 {
        let mut released = 0;
        for id in serfs.at_site(site) {
            if let Some(serf) = serfs.get_mut(id) {
                serf.make_idle();
                released += 1;
            }
        }
        released
    }

    // ========================================================================
    // Yield and depletion
    // ========================================================================

    /// Credit extractions against node yield and redirect serfs of exhausted nodes.
    ///
    /// Each request yields `min(remaining, amount)`. Felled trees are removed
    /// from the node set and the grid. Serfs bound to an exhausted node move to
    /// the nearest available node of the same category within the reassignment
    /// radius of that node, or go idle.
    pub fn settle(
        &mut self,
        requests: &[ExtractionRequest],
        serfs: &mut SerfRoster,
        stockpile: &mut Stockpile,
        grid: &mut WalkableGrid,
    ) -> SettlementReport {
        let mut report = SettlementReport::default();

        for request in requests {
            let Some(node) = self.nodes.get_mut(request.node) else {
                continue;
            };
            let was_depleted = node.is_depleted();
            let taken = node.extract(request.amount);
            let resource = node.resource;
            if taken > 0 {
                stockpile.add(resource, f64::from(taken));
                report.gathered[resource] += f64::from(taken);
            }
            if node.is_depleted() && !was_depleted {
                report.depleted.push(request.node);
            }
        }

        for &exhausted in &report.depleted {
            let Some(node) = self.nodes.get(exhausted).copied() else {
                continue;
            };
            if node.kind == NodeKind::Tree {
                self.nodes.remove(exhausted);
                grid.remove_tree(node.position);
            } else if let Some(n) = self.nodes.get_mut(exhausted) {
                n.bound_serfs = 0;
            }

            let category = node.category();
            for id in serfs.bound_to(exhausted) {
                let next = self
                    .nodes
                    .nearest_within(category, node.position, self.config.reassign_radius);
                let position = serfs.get(id).map(|s| s.position);
                let moved = match (next, position) {
                    (Some(next), Some(position)) => {
                        let route = serf_route(grid, position, &self.nodes, next);
                        self.bind(route, id, category, next, serfs)
                    }
                    _ => false,
                };
                if moved {
                    report.reassigned += 1;
                } else if let Some(serf) = serfs.get_mut(id) {
                    serf.make_idle();
                    report.idled += 1;
                }
            }
            tracing::debug!(
                node = exhausted.0,
                %category,
                "node exhausted"
            );
        }

        report
    }

    /// Claim the deposits and shafts a new mine sits on.
    ///
    /// Serfs gathering there are interrupted and go idle. Returns the number
    /// of interrupted serfs.
    pub fn claim_for_mine(
        &mut self,
        resource: ResourceKind,
        position: Vec2,
        serfs: &mut SerfRoster,
    ) -> u32 {
        let claimed = self
            .nodes
            .claim_near(resource, position, self.config.claim_tolerance);
        let mut interrupted = 0;
        for node in claimed {
            for id in serfs.bound_to(node) {
                if let Some(serf) = serfs.get_mut(id) {
                    serf.make_idle();
                    interrupted += 1;
                }
            }
            if let Some(n) = self.nodes.get_mut(node) {
                n.bound_serfs = 0;
            }
        }
        interrupted
    }
}

fn serf_route(
    grid: &mut WalkableGrid,
    from: Vec2,
    nodes: &NodeStore,
    node: NodeId,
) -> Option<(Vec2, f64)> {
    let target = nodes.get(node)?.position;
    Some((target, grid.path_distance(from, target)))
}
