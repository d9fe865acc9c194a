#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Crowdflow engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.

use std::time::Duration;

use glam::Vec2;

mod geometry;

pub use geometry::CellCoord;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Configures the occupancy grid, discarding walls, agents, and clock.
    ConfigureGrid {
        /// Number of cell columns.
        width: u32,
        /// Number of cell rows.
        height: u32,
    },
    /// Marks a cell permanently blocked. Setup time only; invalidates every
    /// cached path.
    AddWall {
        /// Cell to block.
        cell: CellCoord,
    },
    /// Introduces a new agent into the simulation.
    SpawnAgent {
        /// Initial continuous position.
        position: Vec2,
        /// Destination the agent should steer toward.
        target: Vec2,
        /// Effective interaction radius of the agent.
        padding: f32,
        /// Scalar speed multiplier applied to the steering vector.
        speed: f32,
    },
    /// Reassigns an agent's destination, re-arming its arrival latch.
    AssignTarget {
        /// Identifier of the agent to retarget.
        agent: AgentId,
        /// New destination.
        target: Vec2,
    },
    /// Advances the simulation clock by the provided delta time, subdividing
    /// into bounded fixed-size sub-steps internally.
    Advance {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the occupancy grid was reconfigured.
    GridConfigured {
        /// Number of cell columns.
        width: u32,
        /// Number of cell rows.
        height: u32,
    },
    /// Confirms that a cell was marked as a wall.
    WallAdded {
        /// Cell that became blocked.
        cell: CellCoord,
    },
    /// Confirms that an agent entered the simulation.
    AgentSpawned {
        /// Identifier assigned to the new agent.
        agent: AgentId,
        /// Cell containing the agent's initial position.
        cell: CellCoord,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Reports that an agent crossed into its target's arrival radius.
    ///
    /// Emitted exactly once per crossing: the agent must leave the radius or
    /// be retargeted before another arrival can fire.
    TargetReached {
        /// Identifier of the arriving agent.
        agent: AgentId,
        /// Destination that was reached.
        target: Vec2,
    },
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Kinematic state of a single agent.
///
/// Bodies live in index-aligned storage inside the world; the steering system
/// reads the full slice during the parallel resolution phase. `position` is
/// mutated only by the driver's integration step, `direction` and `pointer`
/// only by the driver's smoothing step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentBody {
    /// Continuous position.
    pub position: Vec2,
    /// Destination the agent steers toward.
    pub target: Vec2,
    /// Exponentially smoothed steering vector used for integration.
    pub direction: Vec2,
    /// Exponentially smoothed facing vector for presentation.
    pub pointer: Vec2,
    /// Effective interaction radius; always positive.
    pub padding: f32,
    /// Scalar speed multiplier; never negative.
    pub speed: f32,
    /// True while repulsion pushes the agent against its desired direction.
    pub reverse: bool,
}

impl AgentBody {
    /// Cell containing the agent's current position.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        CellCoord::containing(self.position)
    }

    /// Cell containing the agent's target.
    #[must_use]
    pub fn target_cell(&self) -> CellCoord {
        CellCoord::containing(self.target)
    }

    /// Straight-line distance from the current position to the target.
    #[must_use]
    pub fn distance_to_target(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Immutable representation of a single agent's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Continuous position.
    pub position: Vec2,
    /// Current destination.
    pub target: Vec2,
    /// Smoothed facing vector for drawing an orientation indicator.
    pub pointer: Vec2,
    /// Effective interaction radius.
    pub padding: f32,
    /// True while the agent is being pushed against its intended path.
    pub reverse: bool,
}

/// Read-only snapshot describing all agents in the simulation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Number of agents captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Read-only view into the dense wall bitmap.
#[derive(Clone, Copy, Debug)]
pub struct WallView<'a> {
    cells: &'a [bool],
    width: u32,
    height: u32,
}

impl<'a> WallView<'a> {
    /// Captures a new wall view backed by the provided cell slice.
    #[must_use]
    pub fn new(cells: &'a [bool], width: u32, height: u32) -> Self {
        Self {
            cells,
            width,
            height,
        }
    }

    /// Reports whether the cell is blocked; cells outside the grid count as
    /// blocked.
    #[must_use]
    pub fn has_wall(&self, cell: CellCoord) -> bool {
        dense_index(cell, self.width, self.height)
            .map_or(true, |index| self.cells.get(index).copied().unwrap_or(true))
    }

    /// Returns an iterator over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + 'a {
        self.cells.iter().copied()
    }

    /// Provides the dimensions of the underlying grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Read-only view into the dense congestion cost field.
#[derive(Clone, Copy, Debug)]
pub struct CostView<'a> {
    cells: &'a [f32],
    width: u32,
    height: u32,
}

impl<'a> CostView<'a> {
    /// Captures a new cost view backed by the provided cell slice.
    #[must_use]
    pub fn new(cells: &'a [f32], width: u32, height: u32) -> Self {
        Self {
            cells,
            width,
            height,
        }
    }

    /// Congestion penalty recorded for the cell; zero outside the grid.
    #[must_use]
    pub fn cost(&self, cell: CellCoord) -> f32 {
        dense_index(cell, self.width, self.height)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(0.0)
    }

    /// Returns an iterator over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f32> + 'a {
        self.cells.iter().copied()
    }

    /// Provides the dimensions of the underlying grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn dense_index(cell: CellCoord, width: u32, height: u32) -> Option<usize> {
    let x = u32::try_from(cell.x()).ok()?;
    let y = u32::try_from(cell.y()).ok()?;
    if x < width && y < height {
        let row = usize::try_from(y).ok()?;
        let column = usize::try_from(x).ok()?;
        let stride = usize::try_from(width).ok()?;
        Some(row * stride + column)
    } else {
        None
    }
}
