//! Serfs: fatigue-free gatherers and builders.
//!
//! A serf walks to its assigned node, then extracts in fixed-length cycles
//! until it is recalled or its node runs dry. Sent to a construction site it
//! walks there and builds until the site completes.

use crate::construction::SiteId;
use crate::math::{Travel, Vec2};
use crate::nodes::{GatherCategory, NodeId};
use crate::resources::{ResourceKind, ResourceTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default serf walking speed in world units per second.
pub const SERF_SPEED: f64 = 400.0;

/// Time and amount of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionProfile {
    /// Seconds per extraction (delay plus animation).
    pub seconds: f64,
    /// Units per extraction.
    pub amount: u32,
}

impl ExtractionProfile {
    /// Units per second while extracting.
    #[must_use]
    pub fn rate(&self) -> f64 {
        if self.seconds > 0.0 {
            f64::from(self.amount) / self.seconds
        } else {
            0.0
        }
    }
}

/// Default extraction profiles per resource.
#[must_use]
pub fn default_extraction_profiles() -> ResourceTable<ExtractionProfile> {
    let mut table = ResourceTable::filled(ExtractionProfile {
        seconds: 5.0,
        amount: 1,
    });
    table[ResourceKind::Wood] = ExtractionProfile {
        seconds: 5.52,
        amount: 2,
    };
    table[ResourceKind::Iron] = ExtractionProfile {
        seconds: 4.54,
        amount: 1,
    };
    table[ResourceKind::Stone] = ExtractionProfile {
        seconds: 5.54,
        amount: 1,
    };
    table[ResourceKind::Clay] = ExtractionProfile {
        seconds: 5.54,
        amount: 1,
    };
    table[ResourceKind::Sulfur] = ExtractionProfile {
        seconds: 4.54,
        amount: 1,
    };
    table
}

/// Unique serf identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SerfId(pub u32);

/// Serf lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SerfState {
    /// Waiting for orders.
    Idle,
    /// On the way to a node.
    WalkingToResource,
    /// Extracting at a node.
    Extracting,
    /// On the way to a construction site.
    WalkingToBuild,
    /// Working on a construction site.
    Building,
}

/// Current assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerfTask {
    /// Gathering from a node.
    Gather {
        /// Category the serf was assigned under.
        category: GatherCategory,
        /// Node being worked.
        node: NodeId,
    },
    /// Building a site.
    Build {
        /// Site being built.
        site: SiteId,
    },
}

/// Completed extraction cycles reported by a serf during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Serf that finished the cycles.
    pub serf: SerfId,
    /// Node to draw from.
    pub node: NodeId,
    /// Resource drawn.
    pub resource: ResourceKind,
    /// Number of completed cycles.
    pub cycles: u32,
    /// Units requested (cycles × per-cycle amount).
    pub amount: u32,
}

/// A serf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serf {
    /// Identifier.
    pub id: SerfId,
    /// Current position.
    pub position: Vec2,
    /// Current state.
    pub state: SerfState,
    /// Current assignment, `None` when idle.
    pub task: Option<SerfTask>,
    /// Seconds into the current extraction.
    pub extraction_timer: f64,
    travel: Option<Travel>,
}

impl Serf {
    fn new(id: SerfId, position: Vec2) -> Self {
        Self {
            id,
            position,
            state: SerfState::Idle,
            task: None,
            extraction_timer: 0.0,
            travel: None,
        }
    }

    /// Whether the serf has no assignment.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == SerfState::Idle
    }

    /// Node the serf is bound to, if gathering.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self.task {
            Some(SerfTask::Gather { node, .. }) => Some(node),
            _ => None,
        }
    }

    /// Category the serf gathers, if gathering.
    #[must_use]
    pub fn category(&self) -> Option<GatherCategory> {
        match self.task {
            Some(SerfTask::Gather { category, .. }) => Some(category),
            _ => None,
        }
    }

    /// Site the serf builds, if building.
    #[must_use]
    pub fn site(&self) -> Option<SiteId> {
        match self.task {
            Some(SerfTask::Build { site }) => Some(site),
            _ => None,
        }
    }

    /// Head for a node over a route of `route_length` world units.
    pub fn send_to_node(&mut self, category: GatherCategory, node: NodeId, target: Vec2, route_length: f64) {
        self.task = Some(SerfTask::Gather { category, node });
        self.travel = Some(Travel::with_length(self.position, target, route_length));
        self.state = SerfState::WalkingToResource;
        self.extraction_timer = 0.0;
    }

    /// Head for a construction site over a route of `route_length` world units.
    pub fn send_to_site(&mut self, site: SiteId, target: Vec2, route_length: f64) {
        self.task = Some(SerfTask::Build { site });
        self.travel = Some(Travel::with_length(self.position, target, route_length));
        self.state = SerfState::WalkingToBuild;
        self.extraction_timer = 0.0;
    }

    /// Drop the assignment; any unfinished extraction cycle is discarded.
    pub fn make_idle(&mut self) {
        self.task = None;
        self.travel = None;
        self.state = SerfState::Idle;
        self.extraction_timer = 0.0;
    }

    /// Advance by `dt` seconds.
    ///
    /// Returns the completed extraction cycles, if any.
    pub fn tick(
        &mut self,
        dt: f64,
        speed: f64,
        profiles: &ResourceTable<ExtractionProfile>,
    ) -> Option<ExtractionRequest> {
        match self.state {
            SerfState::Idle | SerfState::Building => None,
            SerfState::WalkingToResource | SerfState::WalkingToBuild => {
                let arrived = match self.travel.as_mut() {
                    Some(travel) => {
                        let arrived = travel.advance(speed, dt);
                        self.position = travel.position();
                        arrived
                    }
                    None => true,
                };
                if arrived {
                    self.travel = None;
                    self.extraction_timer = 0.0;
                    self.state = if self.state == SerfState::WalkingToResource {
                        SerfState::Extracting
                    } else {
                        SerfState::Building
                    };
                }
                None
            }
            SerfState::Extracting => {
                let Some(SerfTask::Gather { category, node }) = self.task else {
                    self.make_idle();
                    return None;
                };
                let resource = category.resource();
                let profile = profiles[resource];
                if profile.seconds <= 0.0 {
                    return None;
                }
                self.extraction_timer += dt;
                let mut cycles = 0;
                while self.extraction_timer >= profile.seconds {
                    self.extraction_timer -= profile.seconds;
                    cycles += 1;
                }
                (cycles > 0).then(|| ExtractionRequest {
                    serf: self.id,
                    node,
                    resource,
                    cycles,
                    amount: cycles * profile.amount,
                })
            }
        }
    }
}

/// Serf counts by activity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerfStats {
    /// All serfs.
    pub total: u32,
    /// Serfs without an assignment.
    pub idle: u32,
    /// Serfs gathering (walking or extracting), per category.
    pub gathering: BTreeMap<GatherCategory, u32>,
    /// Serfs assigned to construction.
    pub building: u32,
}

/// All serfs, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerfRoster {
    serfs: BTreeMap<SerfId, Serf>,
    next_id: u32,
}

impl SerfRoster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            serfs: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Spawn an idle serf.
    pub fn spawn(&mut self, position: Vec2) -> SerfId {
        let id = SerfId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.serfs.insert(id, Serf::new(id, position));
        id
    }

    /// Remove the most recently spawned idle serf.
    pub fn dismiss_idle(&mut self) -> Option<SerfId> {
        let id = self.serfs.values().rev().find(|s| s.is_idle())?.id;
        self.serfs.remove(&id);
        Some(id)
    }

    /// Look up a serf.
    #[must_use]
    pub fn get(&self, id: SerfId) -> Option<&Serf> {
        self.serfs.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: SerfId) -> Option<&mut Serf> {
        self.serfs.get_mut(&id)
    }

    /// Serfs in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Serf> {
        self.serfs.values()
    }

    /// Number of serfs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.serfs.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.serfs.is_empty()
    }

    /// Ids of idle serfs in id order.
    #[must_use]
    pub fn idle_ids(&self) -> Vec<SerfId> {
        self.serfs.values().filter(|s| s.is_idle()).map(|s| s.id).collect()
    }

    /// Number of idle serfs.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.serfs.values().filter(|s| s.is_idle()).count()
    }

    /// Ids of serfs gathering `category`, in id order.
    #[must_use]
    pub fn gathering(&self, category: GatherCategory) -> Vec<SerfId> {
        self.serfs
            .values()
            .filter(|s| s.category() == Some(category))
            .map(|s| s.id)
            .collect()
    }

    /// Ids of serfs bound to `node`, in id order.
    #[must_use]
    pub fn bound_to(&self, node: NodeId) -> Vec<SerfId> {
        self.serfs
            .values()
            .filter(|s| s.node() == Some(node))
            .map(|s| s.id)
            .collect()
    }

    /// Ids of serfs assigned to `site`, in id order.
    #[must_use]
    pub fn at_site(&self, site: SiteId) -> Vec<SerfId> {
        self.serfs
            .values()
            .filter(|s| s.site() == Some(site))
            .map(|s| s.id)
            .collect()
    }

    /// Serfs assigned to `site` that have arrived and are building.
    #[must_use]
    pub fn present_at_site(&self, site: SiteId) -> u32 {
        self.serfs
            .values()
            .filter(|s| s.state == SerfState::Building && s.site() == Some(site))
            .count() as u32
    }

    /// Advance every serf; returns completed extractions in serf id order.
    pub fn tick(
        &mut self,
        dt: f64,
        speed: f64,
        profiles: &ResourceTable<ExtractionProfile>,
    ) -> Vec<ExtractionRequest> {
        self.serfs
            .values_mut()
            .filter_map(|serf| serf.tick(dt, speed, profiles))
            .collect()
    }

    /// Counts by activity.
    #[must_use]
    pub fn stats(&self) -> SerfStats {
        let mut stats = SerfStats {
            total: self.serfs.len() as u32,
            ..SerfStats::default()
        };
        for serf in self.serfs.values() {
            match serf.task {
                None => stats.idle += 1,
                Some(SerfTask::Gather { category, .. }) => {
                    *stats.gathering.entry(category).or_insert(0) += 1;
                }
                Some(SerfTask::Build { .. }) => stats.building += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles() -> ResourceTable<ExtractionProfile> {
        default_extraction_profiles()
    }

    #[test]
    fn test_profiles() {
        let p = profiles();
        assert_eq!(p[ResourceKind::Wood].amount, 2);
        assert_eq!(p[ResourceKind::Wood].seconds, 5.52);
        assert_eq!(p[ResourceKind::Iron].seconds, 4.54);
        assert_eq!(p[ResourceKind::Clay].seconds, 5.54);
    }

    #[test]
    fn test_walk_then_extract() {
        let mut roster = SerfRoster::new();
        let id = roster.spawn(Vec2::ZERO);
        roster.get_mut(id).unwrap().send_to_node(
            GatherCategory::Wood,
            NodeId(7),
            Vec2::new(800.0, 0.0),
            800.0,
        );

        assert!(roster.tick(1.0, SERF_SPEED, &profiles()).is_empty());
        assert_eq!(roster.get(id).unwrap().state, SerfState::WalkingToResource);
        assert_eq!(roster.get(id).unwrap().position, Vec2::new(400.0, 0.0));
        roster.tick(1.0, SERF_SPEED, &profiles());
        assert_eq!(roster.get(id).unwrap().state, SerfState::Extracting);

        // 5.52 s per wood extraction: the first lands on the 6th second.
        for _ in 0..5 {
            assert!(roster.tick(1.0, SERF_SPEED, &profiles()).is_empty());
        }
        let done = roster.tick(1.0, SERF_SPEED, &profiles());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].node, NodeId(7));
        assert_eq!(done[0].amount, 2);
        assert_eq!(done[0].resource, ResourceKind::Wood);
    }

    #[test]
    fn test_make_idle_discards_partial_cycle() {
        let mut roster = SerfRoster::new();
        let id = roster.spawn(Vec2::ZERO);
        let serf = roster.get_mut(id).unwrap();
        serf.send_to_node(GatherCategory::Deposit(ResourceKind::Iron), NodeId(1), Vec2::ZERO, 0.0);
        serf.tick(1.0, SERF_SPEED, &profiles());
        serf.tick(3.0, SERF_SPEED, &profiles());
        assert!(serf.extraction_timer > 0.0);
        serf.make_idle();
        assert_eq!(serf.extraction_timer, 0.0);
        assert!(serf.task.is_none());
        assert_eq!(roster.idle_count(), 1);
    }

    #[test]
    fn test_large_step_completes_several_cycles() {
        let mut roster = SerfRoster::new();
        let id = roster.spawn(Vec2::ZERO);
        let serf = roster.get_mut(id).unwrap();
        serf.send_to_node(GatherCategory::Shaft(ResourceKind::Iron), NodeId(1), Vec2::ZERO, 0.0);
        serf.tick(1.0, SERF_SPEED, &profiles());
        let request = serf.tick(10.0, SERF_SPEED, &profiles()).unwrap();
        assert_eq!(request.cycles, 2);
        assert_eq!(request.amount, 2);
    }

    #[test]
    fn test_builder_arrives_and_builds() {
        let mut roster = SerfRoster::new();
        let id = roster.spawn(Vec2::ZERO);
        roster
            .get_mut(id)
            .unwrap()
            .send_to_site(SiteId(3), Vec2::new(100.0, 0.0), 100.0);
        assert_eq!(roster.present_at_site(SiteId(3)), 0);
        roster.tick(1.0, SERF_SPEED, &profiles());
        assert_eq!(roster.present_at_site(SiteId(3)), 1);
        assert_eq!(roster.at_site(SiteId(3)), vec![id]);
    }

    #[test]
    fn test_dismiss_idle_and_stats() {
        let mut roster = SerfRoster::new();
        let a = roster.spawn(Vec2::ZERO);
        let b = roster.spawn(Vec2::ZERO);
        roster
            .get_mut(a)
            .unwrap()
            .send_to_node(GatherCategory::Wood, NodeId(1), Vec2::ZERO, 0.0);
        let stats = roster.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.gathering[&GatherCategory::Wood], 1);

        assert_eq!(roster.dismiss_idle(), Some(b));
        assert_eq!(roster.dismiss_idle(), None);
        assert_eq!(roster.len(), 1);
    }
}
