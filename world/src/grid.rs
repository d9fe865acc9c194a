//! Wall map, congestion cost field, and the time-bounded path cache.

use std::sync::Arc;
use std::time::Duration;

use crowdflow_core::{AgentBody, CellCoord};
use dashmap::DashMap;

use crate::search;

/// Dense occupancy grid shared by the pathfinder and the steering phase.
///
/// Walls are static after setup. The congestion field is rebuilt from scratch
/// once per sub-step. The path cache is the one piece of state mutated while
/// the grid is otherwise frozen for concurrent readers: entries are inserted
/// through a sharded concurrent map, so simultaneous misses on different keys
/// never serialize against each other, and a duplicate computation of the
/// same key resolves as last-write-wins with an equivalent path.
#[derive(Debug, Default)]
pub(crate) struct Grid {
    width: u32,
    height: u32,
    walls: Vec<bool>,
    wall_list: Vec<CellCoord>,
    cost: Vec<f32>,
    cache: DashMap<(u32, u32), CacheEntry>,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    path: Arc<[CellCoord]>,
    stamp: Duration,
}

impl Grid {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        let capacity_u64 = u64::from(width) * u64::from(height);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            width,
            height,
            walls: vec![false; capacity],
            wall_list: Vec::new(),
            cost: vec![0.0; capacity],
            cache: DashMap::new(),
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.walls.len()
    }

    /// Linear row-major index of the cell, or `None` outside the grid.
    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        let x = u32::try_from(cell.x()).ok()?;
        let y = u32::try_from(cell.y()).ok()?;
        if x < self.width && y < self.height {
            let row = usize::try_from(y).ok()?;
            let column = usize::try_from(x).ok()?;
            let stride = usize::try_from(self.width).ok()?;
            Some(row * stride + column)
        } else {
            None
        }
    }

    pub(crate) fn coord(&self, index: usize) -> CellCoord {
        let stride = usize::try_from(self.width).unwrap_or(1).max(1);
        CellCoord::new((index % stride) as i32, (index / stride) as i32)
    }

    /// Reports whether the cell is blocked; out-of-bounds cells count as
    /// blocked so the edge generator never walks off the grid.
    pub(crate) fn has_wall(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .map_or(true, |index| self.walls[index])
    }

    /// Marks a cell blocked and invalidates every cached path.
    ///
    /// Returns false without side effects when the cell is out of bounds or
    /// already walled, keeping the wall list free of duplicates.
    pub(crate) fn add_wall(&mut self, cell: CellCoord) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        if self.walls[index] {
            return false;
        }
        self.walls[index] = true;
        self.wall_list.push(cell);
        self.cache.clear();
        true
    }

    /// Insertion-ordered occupied cells, for wall-repulsion queries.
    pub(crate) fn wall_list(&self) -> &[CellCoord] {
        &self.wall_list
    }

    pub(crate) fn walls(&self) -> &[bool] {
        &self.walls
    }

    pub(crate) fn cost_cells(&self) -> &[f32] {
        &self.cost
    }

    /// Congestion penalty for entering the cell; zero outside the grid.
    pub(crate) fn cost(&self, cell: CellCoord) -> f32 {
        self.index(cell).map_or(0.0, |index| self.cost[index])
    }

    /// Rebuilds the congestion field from current agent occupancy.
    ///
    /// The field is zeroed and re-accumulated on every call, so congestion
    /// reflects only the present positions and never compounds across
    /// sub-steps. Agents outside the grid are ignored.
    pub(crate) fn update_cost(&mut self, bodies: &[AgentBody], increment: f32) {
        self.cost.fill(0.0);
        for body in bodies {
            if let Some(index) = self.index(body.cell()) {
                self.cost[index] += increment;
            }
        }
    }

    /// Cache-aware shortest-path search from `src` to `dst` inclusive.
    ///
    /// A cached entry stamped within `ttl` of `now` is returned verbatim even
    /// though the congestion field may have moved on; recomputing a full
    /// search per agent per sub-step is deliberately traded away. A miss or
    /// expired entry triggers a fresh search stamped with `now`.
    pub(crate) fn search(
        &self,
        src: CellCoord,
        dst: CellCoord,
        now: Duration,
        ttl: Duration,
    ) -> Arc<[CellCoord]> {
        let (Some(src_index), Some(dst_index)) = (self.index(src), self.index(dst)) else {
            return Vec::new().into();
        };
        let key = (src_index as u32, dst_index as u32);
        if let Some(entry) = self.cache.get(&key) {
            if now.saturating_sub(entry.stamp) <= ttl {
                return Arc::clone(&entry.path);
            }
        }
        let path: Arc<[CellCoord]> = search::astar(self, src, dst).into();
        let _ = self.cache.insert(
            key,
            CacheEntry {
                path: Arc::clone(&path),
                stamp: now,
            },
        );
        path
    }

    /// Number of live cache entries, for inspection in tests.
    #[cfg(test)]
    pub(crate) fn cached_paths(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wall_dedupes_and_clears_cache() {
        let mut grid = Grid::new(4, 4);
        let src = CellCoord::new(0, 0);
        let dst = CellCoord::new(3, 3);
        let _ = grid.search(src, dst, Duration::ZERO, Duration::from_secs(1));
        assert_eq!(grid.cached_paths(), 1);

        assert!(grid.add_wall(CellCoord::new(1, 1)));
        assert_eq!(grid.cached_paths(), 0);
        assert!(!grid.add_wall(CellCoord::new(1, 1)));
        assert!(!grid.add_wall(CellCoord::new(7, 1)));
        assert_eq!(grid.wall_list(), &[CellCoord::new(1, 1)]);
    }

    #[test]
    fn out_of_bounds_cells_count_as_walls() {
        let grid = Grid::new(2, 2);
        assert!(grid.has_wall(CellCoord::new(-1, 0)));
        assert!(grid.has_wall(CellCoord::new(0, 2)));
        assert!(!grid.has_wall(CellCoord::new(1, 1)));
    }

    #[test]
    fn update_cost_reflects_only_current_occupancy() {
        let mut grid = Grid::new(4, 4);
        let body = |x: f32, y: f32| AgentBody {
            position: glam::Vec2::new(x, y),
            target: glam::Vec2::ZERO,
            direction: glam::Vec2::ZERO,
            pointer: glam::Vec2::ZERO,
            padding: 0.2,
            speed: 0.0,
            reverse: false,
        };

        grid.update_cost(&[body(1.2, 0.9), body(0.8, 1.1), body(-5.0, 0.0)], 0.5);
        assert_eq!(grid.cost(CellCoord::new(1, 1)), 1.0);

        grid.update_cost(&[body(2.0, 2.0)], 0.5);
        assert_eq!(grid.cost(CellCoord::new(1, 1)), 0.0);
        assert_eq!(grid.cost(CellCoord::new(2, 2)), 0.5);
    }

    #[test]
    fn coord_inverts_index() {
        let grid = Grid::new(5, 3);
        for (x, y) in [(0, 0), (4, 2), (3, 1)] {
            let cell = CellCoord::new(x, y);
            let index = grid.index(cell).expect("in bounds");
            assert_eq!(grid.coord(index), cell);
        }
    }
}
