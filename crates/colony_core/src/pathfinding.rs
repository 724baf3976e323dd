//! Occupancy grid and A* pathfinding.
//!
//! The grid has three layers:
//! - a static terrain layer, loaded once and shared between episodes via [`Arc`]
//! - a building layer, mutated as structures are placed and removed
//! - a vegetation layer, mutated as trees are felled
//!
//! A cell is walkable when the terrain allows it and neither dynamic layer
//! occupies it. Searches use 8-directional movement with octile costs and no
//! corner cutting. Results are cached per (start, goal) cell pair; every grid
//! mutation clears the cache.

use crate::error::{Result, SimError};
use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

/// Grid cell coordinates `(x, y)`.
pub type Cell = (u32, u32);

/// Cost of an orthogonal step.
pub const COST_STRAIGHT: u32 = 10;
/// Cost of a diagonal step.
pub const COST_DIAGONAL: u32 = 14;
/// Default radius (in cells) searched for a walkable substitute endpoint.
pub const DEFAULT_RING_SEARCH_RADIUS: u32 = 10;

const MAX_CACHED_PATHS: usize = 10_000;

/// World units per grid cell along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridScale {
    /// World units per cell along x.
    pub x: f64,
    /// World units per cell along y.
    pub y: f64,
}

impl GridScale {
    /// Same scale on both axes.
    #[must_use]
    pub const fn uniform(scale: f64) -> Self {
        Self { x: scale, y: scale }
    }

    /// Mean of both axes; converts grid cost to world distance.
    #[must_use]
    pub fn mean(self) -> f64 {
        (self.x + self.y) / 2.0
    }
}

impl Default for GridScale {
    fn default() -> Self {
        Self { x: 33.5, y: 33.8 }
    }
}

// ============================================================================
// Static terrain
// ============================================================================

/// Terrain walkability, immutable once shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTerrain {
    width: u32,
    height: u32,
    walkable: Vec<bool>,
    scale: GridScale,
}

impl StaticTerrain {
    /// Fully walkable terrain.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn open(width: u32, height: u32, scale: GridScale) -> Self {
        assert!(width > 0, "terrain width must be positive");
        assert!(height > 0, "terrain height must be positive");
        Self {
            width,
            height,
            walkable: vec![true; (width as usize) * (height as usize)],
            scale,
        }
    }

    /// Parse terrain rows: `.` walkable, `#` blocked. Row 0 is `y = 0`.
    pub fn from_rows(rows: &[String], scale: GridScale) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.chars().count());
        if width == 0 || height == 0 {
            return Err(SimError::InvalidScenario("terrain has no cells".into()));
        }
        if !(scale.x > 0.0 && scale.y > 0.0) {
            return Err(SimError::InvalidScenario(format!(
                "grid scale must be positive, got {} x {}",
                scale.x, scale.y
            )));
        }

        let mut walkable = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(SimError::InvalidScenario(format!(
                    "terrain row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, c) in row.chars().enumerate() {
                match c {
                    '.' => walkable.push(true),
                    '#' => walkable.push(false),
                    other => {
                        return Err(SimError::InvalidScenario(format!(
                            "unknown terrain symbol '{other}' at ({x}, {y})"
                        )))
                    }
                }
            }
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            walkable,
            scale,
        })
    }

    /// Mark a terrain cell blocked. Only meaningful before the terrain is shared.
    pub fn set_blocked(&mut self, cell: Cell, blocked: bool) -> bool {
        if !self.in_bounds(cell) {
            return false;
        }
        let index = self.index(cell);
        self.walkable[index] = !blocked;
        true
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// World units per cell.
    #[must_use]
    pub const fn scale(&self) -> GridScale {
        self.scale
    }

    /// Check if a cell is within bounds.
    #[must_use]
    pub fn in_bounds(&self, (x, y): Cell) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    fn index(&self, (x, y): Cell) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Terrain walkability; out-of-bounds cells are not walkable.
    #[must_use]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.walkable[self.index(cell)]
    }

    /// Convert a world position to its cell, `None` if outside the grid.
    #[must_use]
    pub fn world_to_cell(&self, pos: Vec2) -> Option<Cell> {
        if pos.x < 0.0 || pos.y < 0.0 {
            return None;
        }
        let x = (pos.x / self.scale.x).floor();
        let y = (pos.y / self.scale.y).floor();
        if x < f64::from(self.width) && y < f64::from(self.height) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    /// Convert a world position to a cell, clamping to the grid edge.
    #[must_use]
    pub fn clamp_to_cell(&self, pos: Vec2) -> Cell {
        let max_x = f64::from(self.width - 1);
        let max_y = f64::from(self.height - 1);
        let x = (pos.x / self.scale.x).floor().clamp(0.0, max_x);
        let y = (pos.y / self.scale.y).floor().clamp(0.0, max_y);
        (x as u32, y as u32)
    }

    /// Centre of a cell in world units.
    #[must_use]
    pub fn cell_to_world(&self, (x, y): Cell) -> Vec2 {
        Vec2::new(
            (f64::from(x) + 0.5) * self.scale.x,
            (f64::from(y) + 0.5) * self.scale.y,
        )
    }
}

// ============================================================================
// Footprints
// ============================================================================

/// Building size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FootprintClass {
    /// 400 world units across.
    Small,
    /// 600 world units across.
    Medium,
    /// 800 world units across.
    Large,
}

impl FootprintClass {
    /// Edge length in world units.
    #[must_use]
    pub const fn world_size(self) -> f64 {
        match self {
            Self::Small => 400.0,
            Self::Medium => 600.0,
            Self::Large => 800.0,
        }
    }
}

/// Rectangular cell range `[min, max)` covered by a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Inclusive lower corner.
    pub min: Cell,
    /// Exclusive upper corner.
    pub max: Cell,
}

impl Footprint {
    /// Iterate covered cells in row-major order.
    pub fn cells(self) -> impl Iterator<Item = Cell> {
        (self.min.1..self.max.1).flat_map(move |y| (self.min.0..self.max.0).map(move |x| (x, y)))
    }

    /// Number of covered cells.
    #[must_use]
    pub fn area(self) -> u32 {
        (self.max.0 - self.min.0) * (self.max.1 - self.min.1)
    }
}

/// Identifier of a building placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

// ============================================================================
// Path results
// ============================================================================

/// Outcome of a path query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// Whether a route was found.
    pub found: bool,
    /// Visited cells from start to goal (empty when not found).
    pub cells: Vec<Cell>,
    /// Accumulated step cost (10 straight, 14 diagonal).
    pub grid_cost: u32,
    /// Route length in world units.
    pub world_distance: f64,
}

impl PathResult {
    fn not_found() -> Self {
        Self {
            found: false,
            cells: Vec::new(),
            grid_cost: 0,
            world_distance: 0.0,
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    index: usize,
    f_score: u32,
    /// Lower coordinates first when f-scores tie.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour on a max-heap.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Octile distance heuristic; admissible and consistent for 10/14 costs.
#[inline]
fn octile_heuristic((x1, y1): Cell, (x2, y2): Cell) -> u32 {
    let dx = x1.abs_diff(x2);
    let dy = y1.abs_diff(y2);
    COST_STRAIGHT * dx.max(dy) + (COST_DIAGONAL - COST_STRAIGHT) * dx.min(dy)
}

#[inline]
fn tie_breaker((x, y): Cell) -> u64 {
    (u64::from(y) << 32) | u64::from(x)
}

// ============================================================================
// Walkable grid
// ============================================================================

/// Per-episode occupancy grid over a shared terrain.
#[derive(Debug, Clone)]
pub struct WalkableGrid {
    terrain: Arc<StaticTerrain>,
    building_layer: Vec<u16>,
    tree_layer: Vec<u16>,
    buildings: BTreeMap<BuildingId, Footprint>,
    next_building_id: u32,
    ring_search_radius: u32,
    cache: HashMap<(Cell, Cell), PathResult>,
}

impl WalkableGrid {
    /// Fresh dynamic layers over the given terrain.
    #[must_use]
    pub fn new(terrain: Arc<StaticTerrain>) -> Self {
        let cells = (terrain.width() as usize) * (terrain.height() as usize);
        Self {
            terrain,
            building_layer: vec![0; cells],
            tree_layer: vec![0; cells],
            buildings: BTreeMap::new(),
            next_building_id: 1,
            ring_search_radius: DEFAULT_RING_SEARCH_RADIUS,
            cache: HashMap::new(),
        }
    }

    /// Override the substitute-endpoint search radius.
    pub fn set_ring_search_radius(&mut self, radius: u32) {
        self.ring_search_radius = radius;
        self.cache.clear();
    }

    /// Shared terrain layer.
    #[must_use]
    pub fn terrain(&self) -> &Arc<StaticTerrain> {
        &self.terrain
    }

    /// World units per cell.
    #[must_use]
    pub fn scale(&self) -> GridScale {
        self.terrain.scale()
    }

    /// Number of cached path results.
    #[must_use]
    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    /// Placed buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, Footprint)> + '_ {
        self.buildings.iter().map(|(&id, &fp)| (id, fp))
    }

    /// Whether a cell can be walked on.
    #[must_use]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        if !self.terrain.is_walkable(cell) {
            return false;
        }
        let index = self.terrain.index(cell);
        self.building_layer[index] == 0 && self.tree_layer[index] == 0
    }

    /// Whether a cell holds at least one tree.
    #[must_use]
    pub fn has_tree(&self, cell: Cell) -> bool {
        self.terrain.in_bounds(cell) && self.tree_layer[self.terrain.index(cell)] > 0
    }

    /// Cell range a building of `class` centred at `pos` would cover.
    ///
    /// Returns `None` if any part of it lies outside the grid.
    #[must_use]
    pub fn footprint_at(&self, pos: Vec2, class: FootprintClass) -> Option<Footprint> {
        let (cx, cy) = self.terrain.world_to_cell(pos)?;
        let scale = self.terrain.scale();
        let side_x = ((class.world_size() / scale.x).round() as i64).max(1);
        let side_y = ((class.world_size() / scale.y).round() as i64).max(1);
        let x0 = i64::from(cx) - side_x / 2;
        let y0 = i64::from(cy) - side_y / 2;
        let x1 = x0 + side_x;
        let y1 = y0 + side_y;
        if x0 < 0
            || y0 < 0
            || x1 > i64::from(self.terrain.width())
            || y1 > i64::from(self.terrain.height())
        {
            return None;
        }
        Some(Footprint {
            min: (x0 as u32, y0 as u32),
            max: (x1 as u32, y1 as u32),
        })
    }

    /// Placement check: in bounds, walkable terrain, no other building.
    ///
    /// Trees do not block placement; see [`WalkableGrid::trees_blocking`].
    #[must_use]
    pub fn can_build_at(&self, pos: Vec2, class: FootprintClass) -> bool {
        self.footprint_at(pos, class).is_some_and(|fp| {
            fp.cells().all(|cell| {
                self.terrain.is_walkable(cell) && self.building_layer[self.terrain.index(cell)] == 0
            })
        })
    }

    /// Cells inside the footprint that hold trees which would have to be cleared.
    #[must_use]
    pub fn trees_blocking(&self, pos: Vec2, class: FootprintClass) -> Vec<Cell> {
        self.footprint_at(pos, class)
            .map(|fp| fp.cells().filter(|&c| self.has_tree(c)).collect())
            .unwrap_or_default()
    }

    /// Occupy the footprint. Returns `None` (and changes nothing) if placement is invalid.
    pub fn add_building(&mut self, pos: Vec2, class: FootprintClass) -> Option<BuildingId> {
        if !self.can_build_at(pos, class) {
            return None;
        }
        let footprint = self.footprint_at(pos, class)?;
        for cell in footprint.cells() {
            let index = self.terrain.index(cell);
            self.building_layer[index] += 1;
        }
        let id = BuildingId(self.next_building_id);
        self.next_building_id += 1;
        self.buildings.insert(id, footprint);
        self.cache.clear();
        Some(id)
    }

    /// Free a building's footprint. Returns `false` if the id is unknown.
    pub fn remove_building(&mut self, id: BuildingId) -> bool {
        let Some(footprint) = self.buildings.remove(&id) else {
            return false;
        };
        for cell in footprint.cells() {
            let index = self.terrain.index(cell);
            self.building_layer[index] = self.building_layer[index].saturating_sub(1);
        }
        self.cache.clear();
        true
    }

    /// Mark a tree at a world position. Returns `false` if outside the grid.
    pub fn add_tree(&mut self, pos: Vec2) -> bool {
        let Some(cell) = self.terrain.world_to_cell(pos) else {
            return false;
        };
        let index = self.terrain.index(cell);
        self.tree_layer[index] += 1;
        self.cache.clear();
        true
    }

    /// Remove a tree at a world position. Returns `false` if no tree was there.
    pub fn remove_tree(&mut self, pos: Vec2) -> bool {
        let Some(cell) = self.terrain.world_to_cell(pos) else {
            return false;
        };
        let index = self.terrain.index(cell);
        if self.tree_layer[index] == 0 {
            return false;
        }
        self.tree_layer[index] -= 1;
        self.cache.clear();
        true
    }

    /// Nearest walkable cell within the ring-search radius, `cell` itself first.
    #[must_use]
    pub fn nearest_walkable(&self, cell: Cell) -> Option<Cell> {
        if self.is_walkable(cell) {
            return Some(cell);
        }
        let (cx, cy) = (i64::from(cell.0), i64::from(cell.1));
        for r in 1..=i64::from(self.ring_search_radius) {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let (x, y) = (cx + dx, cy + dy);
                    if x < 0 || y < 0 {
                        continue;
                    }
                    let candidate = (x as u32, y as u32);
                    if self.is_walkable(candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    /// Find a route between two world positions, consulting the cache first.
    pub fn find_path(&mut self, from: Vec2, to: Vec2) -> PathResult {
        let start = self.terrain.clamp_to_cell(from);
        let goal = self.terrain.clamp_to_cell(to);
        if let Some(hit) = self.cache.get(&(start, goal)) {
            return hit.clone();
        }
        let result = self.search(start, goal);
        if self.cache.len() >= MAX_CACHED_PATHS {
            self.cache.clear();
        }
        self.cache.insert((start, goal), result.clone());
        result
    }

    /// Route length between two positions in world units.
    ///
    /// Falls back to the straight-line distance when no route exists, and is
    /// never shorter than the straight line.
    pub fn path_distance(&mut self, from: Vec2, to: Vec2) -> f64 {
        let straight = from.distance(to);
        let result = self.find_path(from, to);
        if result.found {
            result.world_distance.max(straight)
        } else {
            straight
        }
    }

    /// Uncached A* search between two cells.
    #[must_use]
    pub fn search(&self, start: Cell, goal: Cell) -> PathResult {
        let (Some(start), Some(goal)) = (self.nearest_walkable(start), self.nearest_walkable(goal))
        else {
            return PathResult::not_found();
        };

        let cell_count = self.building_layer.len();
        let mut g_score = vec![u32::MAX; cell_count];
        let mut came_from = vec![usize::MAX; cell_count];
        let mut open_set = BinaryHeap::new();

        let start_index = self.terrain.index(start);
        let goal_index = self.terrain.index(goal);
        g_score[start_index] = 0;
        open_set.push(AStarNode {
            index: start_index,
            f_score: octile_heuristic(start, goal),
            tie_breaker: tie_breaker(start),
        });

        while let Some(current) = open_set.pop() {
            if current.index == goal_index {
                return self.reconstruct(&came_from, goal_index, g_score[goal_index]);
            }
            let current_cell = self.cell_of(current.index);
            let current_g = g_score[current.index];
            // Stale heap entry.
            if current.f_score > current_g.saturating_add(octile_heuristic(current_cell, goal)) {
                continue;
            }

            for &(dx, dy) in &DIRECTIONS {
                let nx = i64::from(current_cell.0) + dx;
                let ny = i64::from(current_cell.1) + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let neighbor = (nx as u32, ny as u32);
                if !self.is_walkable(neighbor) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && !(self.is_walkable((neighbor.0, current_cell.1))
                        && self.is_walkable((current_cell.0, neighbor.1)))
                {
                    continue;
                }

                let step = if diagonal { COST_DIAGONAL } else { COST_STRAIGHT };
                let tentative = current_g + step;
                let neighbor_index = self.terrain.index(neighbor);
                if tentative < g_score[neighbor_index] {
                    g_score[neighbor_index] = tentative;
                    came_from[neighbor_index] = current.index;
                    open_set.push(AStarNode {
                        index: neighbor_index,
                        f_score: tentative + octile_heuristic(neighbor, goal),
                        tie_breaker: tie_breaker(neighbor),
                    });
                }
            }
        }

        PathResult::not_found()
    }

    fn cell_of(&self, index: usize) -> Cell {
        let width = self.terrain.width() as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    fn reconstruct(&self, came_from: &[usize], goal_index: usize, cost: u32) -> PathResult {
        let mut cells = vec![self.cell_of(goal_index)];
        let mut current = goal_index;
        while came_from[current] != usize::MAX {
            current = came_from[current];
            cells.push(self.cell_of(current));
        }
        cells.reverse();
        PathResult {
            found: true,
            cells,
            grid_cost: cost,
            world_distance: f64::from(cost) * self.terrain.scale().mean() / f64::from(COST_STRAIGHT),
        }
    }

    /// Candidate building positions near `near`, searched in rings out to
    /// `radius` cells.
    ///
    /// Ordered by the number of trees that would need clearing, then by
    /// distance. At most `max_results` positions are returned.
    #[must_use]
    pub fn find_building_spots(
        &self,
        class: FootprintClass,
        near: Vec2,
        radius: u32,
        max_results: usize,
    ) -> Vec<Vec2> {
        let center = self.terrain.clamp_to_cell(near);
        let (cx, cy) = (i64::from(center.0), i64::from(center.1));
        let mut candidates: Vec<(usize, f64, Cell, Vec2)> = Vec::new();

        for r in 0..=i64::from(radius) {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let (x, y) = (cx + dx, cy + dy);
                    if x < 0 || y < 0 {
                        continue;
                    }
                    let cell = (x as u32, y as u32);
                    if !self.terrain.in_bounds(cell) {
                        continue;
                    }
                    let pos = self.terrain.cell_to_world(cell);
                    if self.can_build_at(pos, class) {
                        let trees = self.trees_blocking(pos, class).len();
                        candidates.push((trees, pos.distance(near), cell, pos));
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(tie_breaker(a.2).cmp(&tie_breaker(b.2)))
        });
        candidates
            .into_iter()
            .take(max_results)
            .map(|(_, _, _, pos)| pos)
            .collect()
    }
}
