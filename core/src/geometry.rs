//! Discrete cell addressing and conversions to continuous space.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Address of a single grid cell.
///
/// Cells are centered on integer coordinates: cell `(x, y)` covers the unit
/// square `[x - 0.5, x + 0.5] × [y - 0.5, y + 0.5]` in continuous space.
/// Coordinates are signed because they are derived from continuous agent
/// positions, which may round below zero near the grid edge.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct CellCoord {
    x: i32,
    y: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal cell index.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical cell index.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the cell whose unit square contains the provided point.
    ///
    /// Rounds half away from zero on both axes, matching the convention that
    /// cells are centered on integer coordinates.
    #[must_use]
    pub fn containing(point: Vec2) -> Self {
        Self {
            x: point.x.round() as i32,
            y: point.y.round() as i32,
        }
    }

    /// Center of the cell in continuous space.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Chebyshev (king-move) distance between two cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx.max(dy)
    }

    /// Straight-line distance between the centers of two cells.
    #[must_use]
    pub fn euclidean_distance(self, other: CellCoord) -> f32 {
        self.center().distance(other.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_rounds_to_nearest_center() {
        assert_eq!(CellCoord::containing(Vec2::new(1.4, 2.6)), CellCoord::new(1, 3));
        assert_eq!(CellCoord::containing(Vec2::new(0.5, -0.5)), CellCoord::new(1, -1));
        assert_eq!(CellCoord::containing(Vec2::new(-1.2, -1.8)), CellCoord::new(-1, -2));
    }

    #[test]
    fn center_round_trips_through_containing() {
        let cell = CellCoord::new(7, -3);
        assert_eq!(CellCoord::containing(cell.center()), cell);
    }

    #[test]
    fn chebyshev_distance_takes_dominant_axis() {
        let origin = CellCoord::new(1, 1);
        assert_eq!(origin.chebyshev_distance(CellCoord::new(14, 14)), 13);
        assert_eq!(origin.chebyshev_distance(CellCoord::new(4, 2)), 3);
        assert_eq!(origin.chebyshev_distance(origin), 0);
    }

    #[test]
    fn euclidean_distance_matches_expectation() {
        let distance = CellCoord::new(0, 0).euclidean_distance(CellCoord::new(3, 4));
        assert!((distance - 5.0).abs() < f32::EPSILON);
    }
}
