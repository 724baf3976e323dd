//! Pending construction sites.
//!
//! A site accumulates builder work until its remaining work reaches zero.
//! Builders have diminishing returns: with `k` serfs present the site gains
//! `1 + f + f² + … + f^(k-1)` work-seconds per second.

use crate::buildings::BuildingType;
use crate::math::Vec2;
use crate::nodes::NodeId;
use crate::pathfinding::BuildingId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default falloff applied to each additional builder.
pub const DEFAULT_BUILDER_FALLOFF: f64 = 0.75;

/// Remaining work below which a site counts as finished.
const WORK_EPSILON: f64 = 1e-9;

/// Unique construction site identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

/// Work-seconds per second contributed by `builders` serfs.
#[must_use]
pub fn work_rate(builders: u32, falloff: f64) -> f64 {
    if builders == 0 {
        return 0.0;
    }
    if (1.0 - falloff).abs() < f64::EPSILON {
        return f64::from(builders);
    }
    let exponent = i32::try_from(builders).unwrap_or(i32::MAX);
    (1.0 - falloff.powi(exponent)) / (1.0 - falloff)
}

/// A building under construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionSite {
    /// Identifier.
    pub id: SiteId,
    /// What is being built.
    pub building: BuildingType,
    /// Centre of the footprint.
    pub position: Vec2,
    /// Work needed in total.
    pub total_work: f64,
    /// Work still outstanding.
    pub remaining_work: f64,
    /// Footprint reserved on the grid.
    pub grid_building: BuildingId,
    /// Node a mine will sit on.
    pub node: Option<NodeId>,
}

impl ConstructionSite {
    /// Completed fraction in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total_work <= 0.0 {
            return 1.0;
        }
        (1.0 - self.remaining_work / self.total_work).clamp(0.0, 1.0)
    }

    /// Whether no work remains.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining_work <= WORK_EPSILON
    }

    /// Apply `dt` seconds of work from `builders` serfs.
    ///
    /// Returns `true` when the site finished during this call.
    pub fn advance(&mut self, dt: f64, builders: u32, falloff: f64) -> bool {
        if self.is_complete() {
            return false;
        }
        self.remaining_work = (self.remaining_work - dt * work_rate(builders, falloff)).max(0.0);
        self.is_complete()
    }
}

/// All open construction sites, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionQueue {
    sites: BTreeMap<SiteId, ConstructionSite>,
    next_id: u32,
}

impl ConstructionQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new site.
    pub fn open(
        &mut self,
        building: BuildingType,
        position: Vec2,
        work: f64,
        grid_building: BuildingId,
        node: Option<NodeId>,
    ) -> SiteId {
        let id = SiteId(self.next_id);
        self.next_id += 1;
        self.sites.insert(
            id,
            ConstructionSite {
                id,
                building,
                position,
                total_work: work,
                remaining_work: work,
                grid_building,
                node,
            },
        );
        id
    }

    /// Look up a site.
    #[must_use]
    pub fn get(&self, id: SiteId) -> Option<&ConstructionSite> {
        self.sites.get(&id)
    }

    /// Sites in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ConstructionSite> {
        self.sites.values()
    }

    /// Number of open sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no site is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Whether some open site will occupy `node`.
    #[must_use]
    pub fn targets_node(&self, node: NodeId) -> bool {
        self.sites.values().any(|s| s.node == Some(node))
    }

    /// Advance every site; `builders` reports the serfs present at a site.
    ///
    /// Finished sites are removed and returned in id order, including sites
    /// that were opened with no work left.
    pub fn tick(
        &mut self,
        dt: f64,
        falloff: f64,
        builders: impl Fn(SiteId) -> u32,
    ) -> Vec<ConstructionSite> {
        let finished: Vec<SiteId> = self
            .sites
            .values_mut()
            .filter_map(|site| {
                site.advance(dt, builders(site.id), falloff);
                site.is_complete().then_some(site.id)
            })
            .collect();
        finished
            .into_iter()
            .filter_map(|id| self.sites.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingKind;

    fn queue_with_site(work: f64) -> (ConstructionQueue, SiteId) {
        let mut queue = ConstructionQueue::new();
        let id = queue.open(
            BuildingType::new(BuildingKind::Farm, 1),
            Vec2::new(100.0, 100.0),
            work,
            BuildingId(0),
            None,
        );
        (queue, id)
    }

    #[test]
    fn test_zero_work_site_finishes_on_first_tick() {
        let (mut queue, id) = queue_with_site(0.0);
        let done = queue.tick(1.0, DEFAULT_BUILDER_FALLOFF, |_| 3);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
        assert!(queue.is_empty());

        // Finishes even with nobody on site
        let (mut queue, _) = queue_with_site(0.0);
        assert_eq!(queue.tick(1.0, DEFAULT_BUILDER_FALLOFF, |_| 0).len(), 1);
    }

    #[test]
    fn test_work_rate() {
        assert_eq!(work_rate(0, 0.75), 0.0);
        assert_eq!(work_rate(1, 0.75), 1.0);
        assert!((work_rate(2, 0.75) - 1.75).abs() < 1e-12);
        assert!((work_rate(3, 0.75) - 2.3125).abs() < 1e-12);
        assert_eq!(work_rate(4, 1.0), 4.0);
        assert!(work_rate(50, 0.75) < 4.0);
    }

    #[test]
    fn test_single_builder_takes_full_time() {
        let (mut queue, id) = queue_with_site(120.0);
        let mut ticks = 0;
        loop {
            ticks += 1;
            let done = queue.tick(1.0, DEFAULT_BUILDER_FALLOFF, |_| 1);
            if !done.is_empty() {
                assert_eq!(done[0].id, id);
                break;
            }
            assert!(ticks < 1000);
        }
        assert_eq!(ticks, 120);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_three_builders_diminishing_returns() {
        let (mut queue, _) = queue_with_site(120.0);
        let mut ticks = 0;
        while queue.tick(1.0, DEFAULT_BUILDER_FALLOFF, |_| 3).is_empty() {
            ticks += 1;
        }
        ticks += 1;
        assert!(ticks < 60, "took {ticks}");
        assert!(ticks > 40, "took {ticks}");
    }

    #[test]
    fn test_no_builders_no_progress() {
        let (mut queue, id) = queue_with_site(10.0);
        for _ in 0..100 {
            assert!(queue.tick(1.0, DEFAULT_BUILDER_FALLOFF, |_| 0).is_empty());
        }
        assert_eq!(queue.get(id).map(ConstructionSite::progress), Some(0.0));
    }

    #[test]
    fn test_progress_fraction() {
        let (mut queue, id) = queue_with_site(10.0);
        queue.tick(5.0, DEFAULT_BUILDER_FALLOFF, |_| 1);
        let site = queue.get(id).unwrap();
        assert!((site.progress() - 0.5).abs() < 1e-12);
        assert!(!site.is_complete());
    }
}
