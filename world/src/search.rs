//! Congestion-aware A* over the 8-connected cell graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crowdflow_core::CellCoord;
use ordered_float::OrderedFloat;

use crate::grid::Grid;

const AXIS_STEP: f32 = 1.0;
const DIAGONAL_STEP: f32 = std::f32::consts::SQRT_2;

/// Shortest path from `src` to `dst` inclusive, or an empty vector when no
/// path exists.
///
/// Edge cost is the Euclidean step length plus the destination cell's
/// congestion penalty; the straight-line heuristic is admissible and
/// consistent for that metric. Diagonal steps are rejected when either
/// flanking axis-aligned cell is walled, so paths never cut a wall corner.
/// Open-set ties order by priority then node index, which keeps the result
/// deterministic for a fixed wall and congestion snapshot.
pub(crate) fn astar(grid: &Grid, src: CellCoord, dst: CellCoord) -> Vec<CellCoord> {
    let (Some(start), Some(goal)) = (grid.index(src), grid.index(dst)) else {
        return Vec::new();
    };
    if grid.has_wall(src) {
        return Vec::new();
    }
    if start == goal {
        return vec![src];
    }

    let cells = grid.cell_count();
    let mut best_cost = vec![f32::INFINITY; cells];
    let mut came_from = vec![usize::MAX; cells];
    let mut settled = vec![false; cells];
    let mut open = BinaryHeap::new();

    best_cost[start] = 0.0;
    open.push(Reverse((
        OrderedFloat(src.euclidean_distance(dst)),
        start,
    )));

    while let Some(Reverse((_, node))) = open.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        if node == goal {
            return reconstruct(grid, &came_from, start, goal);
        }

        let cell = grid.coord(node);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let neighbor = CellCoord::new(cell.x() + dx, cell.y() + dy);
                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };
                if grid.has_wall(neighbor) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 {
                    if grid.has_wall(CellCoord::new(cell.x() + dx, cell.y()))
                        || grid.has_wall(CellCoord::new(cell.x(), cell.y() + dy))
                    {
                        continue;
                    }
                    DIAGONAL_STEP
                } else {
                    AXIS_STEP
                };

                let tentative = best_cost[node] + step + grid.cost(neighbor);
                if tentative < best_cost[neighbor_index] {
                    best_cost[neighbor_index] = tentative;
                    came_from[neighbor_index] = node;
                    open.push(Reverse((
                        OrderedFloat(tentative + neighbor.euclidean_distance(dst)),
                        neighbor_index,
                    )));
                }
            }
        }
    }

    Vec::new()
}

fn reconstruct(grid: &Grid, came_from: &[usize], start: usize, goal: usize) -> Vec<CellCoord> {
    let mut path = vec![grid.coord(goal)];
    let mut node = goal;
    while node != start {
        node = came_from[node];
        path.push(grid.coord(node));
    }
    path.reverse();
    path
}
