//! Harvestable resource nodes.
//!
//! Trees, deposits and shafts all hold a finite remaining yield that only
//! ever decreases. Trees disappear when exhausted; deposits and shafts stay
//! in place at zero. A deposit or shaft with a mine built on it is claimed
//! and no longer offered to serfs.

use crate::math::Vec2;
use crate::resources::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Single tree, removed once felled.
    Tree,
    /// Small surface deposit.
    Deposit,
    /// Large-budget shaft; also a mine site.
    Shaft,
}

/// What serfs are sent to gather, used by assign/recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GatherCategory {
    /// Any tree.
    Wood,
    /// Deposits of one resource.
    Deposit(ResourceKind),
    /// Shafts of one resource.
    Shaft(ResourceKind),
}

impl GatherCategory {
    /// Resource produced by this category.
    #[must_use]
    pub const fn resource(self) -> ResourceKind {
        match self {
            Self::Wood => ResourceKind::Wood,
            Self::Deposit(kind) | Self::Shaft(kind) => kind,
        }
    }

    /// Node kind this category draws from.
    #[must_use]
    pub const fn node_kind(self) -> NodeKind {
        match self {
            Self::Wood => NodeKind::Tree,
            Self::Deposit(_) => NodeKind::Deposit,
            Self::Shaft(_) => NodeKind::Shaft,
        }
    }
}

impl std::fmt::Display for GatherCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wood => write!(f, "wood"),
            Self::Deposit(kind) => write!(f, "{kind} deposit"),
            Self::Shaft(kind) => write!(f, "{kind} shaft"),
        }
    }
}

/// A resource node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvestNode {
    /// Identifier.
    pub id: NodeId,
    /// Shape.
    pub kind: NodeKind,
    /// Resource yielded.
    pub resource: ResourceKind,
    /// World position.
    pub position: Vec2,
    /// Yield at load time.
    pub initial: u32,
    /// Remaining yield.
    pub remaining: u32,
    /// Serfs currently bound to this node.
    pub bound_serfs: u32,
    /// A mine has been built on this node.
    pub claimed: bool,
}

impl HarvestNode {
    /// Gather category of this node.
    #[must_use]
    pub const fn category(&self) -> GatherCategory {
        match self.kind {
            NodeKind::Tree => GatherCategory::Wood,
            NodeKind::Deposit => GatherCategory::Deposit(self.resource),
            NodeKind::Shaft => GatherCategory::Shaft(self.resource),
        }
    }

    /// Whether the node is used up.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.remaining == 0
    }

    /// Whether serfs may be sent here.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !self.is_depleted() && !self.claimed
    }

    /// Take up to `requested`, returning the amount actually taken.
    pub fn extract(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.remaining);
        self.remaining -= extracted;
        extracted
    }
}

/// All nodes of one episode, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStore {
    nodes: BTreeMap<NodeId, HarvestNode>,
    next_id: u32,
}

impl NodeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Add a node. Trees always yield wood.
    pub fn add(&mut self, kind: NodeKind, resource: ResourceKind, position: Vec2, amount: u32) -> NodeId {
        let id = NodeId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        let resource = if kind == NodeKind::Tree {
            ResourceKind::Wood
        } else {
            resource
        };
        self.nodes.insert(
            id,
            HarvestNode {
                id,
                kind,
                resource,
                position,
                initial: amount,
                remaining: amount,
                bound_serfs: 0,
                claimed: false,
            },
        );
        id
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&HarvestNode> {
        self.nodes.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut HarvestNode> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node (felled tree).
    pub fn remove(&mut self, id: NodeId) -> Option<HarvestNode> {
        self.nodes.remove(&id)
    }

    /// Nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &HarvestNode> {
        self.nodes.values()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Available nodes of a category.
    pub fn available(&self, category: GatherCategory) -> impl Iterator<Item = &HarvestNode> {
        self.nodes
            .values()
            .filter(move |n| n.category() == category && n.is_available())
    }

    /// Whether any node of the category can take serfs.
    #[must_use]
    pub fn has_available(&self, category: GatherCategory) -> bool {
        self.available(category).next().is_some()
    }

    /// Least-loaded available node, ties broken by distance from `from`, then id.
    #[must_use]
    pub fn least_loaded(&self, category: GatherCategory, from: Vec2) -> Option<NodeId> {
        self.available(category)
            .min_by(|a, b| {
                a.bound_serfs
                    .cmp(&b.bound_serfs)
                    .then(
                        a.position
                            .distance_squared(from)
                            .total_cmp(&b.position.distance_squared(from)),
                    )
                    .then(a.id.cmp(&b.id))
            })
            .map(|n| n.id)
    }

    /// Nearest available node within `radius` of `from`, ties broken by id.
    #[must_use]
    pub fn nearest_within(&self, category: GatherCategory, from: Vec2, radius: f64) -> Option<NodeId> {
        self.available(category)
            .filter(|n| n.position.distance(from) <= radius)
            .min_by(|a, b| {
                a.position
                    .distance_squared(from)
                    .total_cmp(&b.position.distance_squared(from))
                    .then(a.id.cmp(&b.id))
            })
            .map(|n| n.id)
    }

    /// Nearest unclaimed deposit or shaft of `resource` to `from`, preferring shafts.
    ///
    /// Nodes for which `reserved` returns `true` are skipped.
    #[must_use]
    pub fn mine_site_near(
        &self,
        resource: ResourceKind,
        from: Vec2,
        reserved: impl Fn(NodeId) -> bool,
    ) -> Option<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.kind != NodeKind::Tree && n.resource == resource && !n.claimed)
            .filter(|n| !reserved(n.id))
            .min_by(|a, b| {
                let rank = |n: &HarvestNode| u8::from(n.kind != NodeKind::Shaft);
                rank(a)
                    .cmp(&rank(b))
                    .then(
                        a.position
                            .distance_squared(from)
                            .total_cmp(&b.position.distance_squared(from)),
                    )
                    .then(a.id.cmp(&b.id))
            })
            .map(|n| n.id)
    }

    /// Claim every unclaimed deposit/shaft of `resource` within `tolerance` of `position`.
    ///
    /// Returns the newly claimed node ids.
    pub fn claim_near(&mut self, resource: ResourceKind, position: Vec2, tolerance: f64) -> Vec<NodeId> {
        let mut claimed = Vec::new();
        for node in self.nodes.values_mut() {
            if node.kind != NodeKind::Tree
                && node.resource == resource
                && !node.claimed
                && node.position.distance(position) <= tolerance
            {
                node.claimed = true;
                claimed.push(node.id);
            }
        }
        claimed
    }

    /// Total remaining yield of a category (available nodes only).
    #[must_use]
    pub fn remaining(&self, category: GatherCategory) -> u64 {
        self.available(category).map(|n| u64::from(n.remaining)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_never_negative() {
        let mut store = NodeStore::new();
        let id = store.add(NodeKind::Tree, ResourceKind::Stone, Vec2::ZERO, 3);
        let node = store.get_mut(id).unwrap();
        assert_eq!(node.resource, ResourceKind::Wood);
        assert_eq!(node.extract(2), 2);
        assert_eq!(node.extract(2), 1);
        assert_eq!(node.extract(2), 0);
        assert_eq!(node.remaining, 0);
        assert!(!node.is_available());
    }

    #[test]
    fn test_least_loaded_spreads() {
        let mut store = NodeStore::new();
        let near = store.add(NodeKind::Tree, ResourceKind::Wood, Vec2::new(10.0, 0.0), 75);
        let far = store.add(NodeKind::Tree, ResourceKind::Wood, Vec2::new(50.0, 0.0), 75);
        assert_eq!(store.least_loaded(GatherCategory::Wood, Vec2::ZERO), Some(near));
        store.get_mut(near).unwrap().bound_serfs = 1;
        assert_eq!(store.least_loaded(GatherCategory::Wood, Vec2::ZERO), Some(far));
    }

    #[test]
    fn test_nearest_within_radius() {
        let mut store = NodeStore::new();
        let a = store.add(NodeKind::Deposit, ResourceKind::Iron, Vec2::new(100.0, 0.0), 10);
        store.add(NodeKind::Deposit, ResourceKind::Iron, Vec2::new(5000.0, 0.0), 10);
        store.add(NodeKind::Deposit, ResourceKind::Clay, Vec2::new(1.0, 0.0), 10);
        let cat = GatherCategory::Deposit(ResourceKind::Iron);
        assert_eq!(store.nearest_within(cat, Vec2::ZERO, 4500.0), Some(a));
        store.get_mut(a).unwrap().remaining = 0;
        assert_eq!(store.nearest_within(cat, Vec2::ZERO, 4500.0), None);
    }

    #[test]
    fn test_claim_near_blocks_node() {
        let mut store = NodeStore::new();
        let shaft = store.add(NodeKind::Shaft, ResourceKind::Stone, Vec2::new(1000.0, 1000.0), 400);
        let cat = GatherCategory::Shaft(ResourceKind::Stone);
        assert!(store.has_available(cat));
        assert_eq!(store.mine_site_near(ResourceKind::Stone, Vec2::ZERO, |_| false), Some(shaft));
        let claimed = store.claim_near(ResourceKind::Stone, Vec2::new(1200.0, 1000.0), 500.0);
        assert_eq!(claimed, vec![shaft]);
        assert!(!store.has_available(cat));
        assert_eq!(store.mine_site_near(ResourceKind::Stone, Vec2::ZERO, |_| false), None);
    }

    #[test]
    fn test_mine_site_prefers_shaft() {
        let mut store = NodeStore::new();
        let deposit = store.add(NodeKind::Deposit, ResourceKind::Iron, Vec2::new(10.0, 0.0), 10);
        let shaft = store.add(NodeKind::Shaft, ResourceKind::Iron, Vec2::new(900.0, 0.0), 400);
        assert_eq!(store.mine_site_near(ResourceKind::Iron, Vec2::ZERO, |_| false), Some(shaft));
        assert_eq!(
            store.mine_site_near(ResourceKind::Iron, Vec2::ZERO, |id| id == shaft),
            Some(deposit)
        );
    }
}
