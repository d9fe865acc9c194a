#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative crowd state and the sub-stepped simulation driver.
//!
//! The world owns the occupancy grid and every agent body. Adapters and
//! systems mutate it exclusively through [`apply`], and observe it through
//! the read-only constructors in [`query`]. `Command::Advance` runs the
//! simulation pipeline: each sub-step resolves every agent's steering force
//! in parallel against a frozen snapshot, then sequentially smooths, moves,
//! and re-measures congestion.

use std::time::Duration;

use crowdflow_core::{AgentBody, AgentId, CellCoord, Command, Event};
use crowdflow_system_steering::{self as steering, Resolution};
use glam::Vec2;
use rayon::prelude::*;
use thiserror::Error;

mod grid;
mod search;

pub use crowdflow_system_steering::ForceTuning;

/// Tuning for the sub-step cadence, smoothing, and arrival detection.
#[derive(Clone, Debug)]
pub struct StepTuning {
    /// Sub-steps per simulated second. At the default agent speed this keeps
    /// the per-sub-step displacement well under one cell, so agents cannot
    /// tunnel through walls on large ticks.
    pub substep_rate: f32,
    /// Upper bound on sub-steps a single `Advance` may run.
    pub max_substeps: u32,
    /// Exponential blend factor pulling `direction` and `pointer` toward the
    /// freshly resolved vectors each sub-step.
    pub smoothing: f32,
    /// Arrival radius expressed as a multiple of agent padding.
    pub arrival_factor: f32,
}

impl Default for StepTuning {
    fn default() -> Self {
        Self {
            substep_rate: 60.0,
            max_substeps: 240,
            smoothing: 0.08,
            arrival_factor: 3.75,
        }
    }
}

/// Tuning for the congestion field and the path cache.
#[derive(Clone, Debug)]
pub struct FieldTuning {
    /// Congestion added to a cell for each agent currently occupying it.
    pub occupancy_cost: f32,
    /// Maximum age at which a cached path is still served, measured on the
    /// simulation clock.
    pub cache_ttl: Duration,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            occupancy_cost: 0.5,
            cache_ttl: Duration::from_secs(1),
        }
    }
}

/// Aggregated tuning surface for the simulation.
#[derive(Clone, Debug, Default)]
pub struct SimTuning {
    /// Repulsion force model parameters.
    pub force: ForceTuning,
    /// Sub-step cadence and smoothing parameters.
    pub step: StepTuning,
    /// Congestion field and cache parameters.
    pub field: FieldTuning,
}

/// Errors raised by setup-phase grid queries.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// The grid has no cells; configure non-zero dimensions first.
    #[error("grid has zero area")]
    DegenerateGrid,
    /// Rejection sampling found no empty cell within the attempt budget.
    #[error("no empty cell found after {attempts} samples")]
    NoEmptyCell {
        /// Number of uniform samples drawn before giving up.
        attempts: u32,
    },
}

/// Represents the authoritative Crowdflow world state.
#[derive(Debug, Default)]
pub struct World {
    grid: grid::Grid,
    bodies: Vec<AgentBody>,
    metas: Vec<AgentMeta>,
    tuning: SimTuning,
    clock: Duration,
    targets_reached: u64,
    next_agent: u32,
}

#[derive(Clone, Copy, Debug)]
struct AgentMeta {
    id: AgentId,
    arrived: bool,
}

impl World {
    /// Creates an empty world with default tuning and a zero-area grid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tuning(SimTuning::default())
    }

    /// Creates an empty world with the provided tuning surface.
    #[must_use]
    pub fn with_tuning(tuning: SimTuning) -> Self {
        Self {
            grid: grid::Grid::new(0, 0),
            bodies: Vec::new(),
            metas: Vec::new(),
            tuning,
            clock: Duration::ZERO,
            targets_reached: 0,
            next_agent: 0,
        }
    }

    fn agent_index(&self, agent: AgentId) -> Option<usize> {
        self.metas.iter().position(|meta| meta.id == agent)
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        out_events.push(Event::TimeAdvanced { dt });
        if dt.is_zero() {
            return;
        }

        let raw = (dt.as_secs_f32() * self.tuning.step.substep_rate).ceil();
        let substeps = (raw.max(1.0) as u32).min(self.tuning.step.max_substeps.max(1));
        let sub_dt = dt / substeps;
        tracing::trace!(substeps, ?dt, "advancing simulation");

        // The final sub-step absorbs the integer-nanosecond division
        // remainder so the clock advances by exactly `dt`.
        let mut remaining = dt;
        for _ in 1..substeps {
            self.substep(sub_dt, out_events);
            remaining = remaining.saturating_sub(sub_dt);
        }
        self.substep(remaining, out_events);
    }

    fn substep(&mut self, sub_dt: Duration, out_events: &mut Vec<Event>) {
        // Parallel phase: every agent resolves against the same frozen
        // borrow of the body slice and the grid. The collect below is the
        // barrier; no position mutates until it completes. Cache inserts on
        // search misses are the one permitted grid mutation and go through
        // the concurrent map.
        let resolutions: Vec<Resolution> = {
            let grid = &self.grid;
            let bodies = self.bodies.as_slice();
            let walls = grid.wall_list();
            let force = &self.tuning.force;
            let now = self.clock;
            let ttl = self.tuning.field.cache_ttl;
            let next_waypoint = move |src: CellCoord, dst: CellCoord| {
                let path = grid.search(src, dst, now, ttl);
                if path.len() < 2 {
                    None
                } else {
                    Some(path[1])
                }
            };
            (0..bodies.len())
                .into_par_iter()
                .map(|index| steering::resolve(index, bodies, walls, &next_waypoint, force))
                .collect()
        };

        let dt_secs = sub_dt.as_secs_f32();
        let alpha = self.tuning.step.smoothing;
        let arrival_factor = self.tuning.step.arrival_factor;

        for (index, resolution) in resolutions.iter().enumerate() {
            let body = &mut self.bodies[index];
            body.direction -= (body.direction - resolution.steering) * alpha;
            let facing = (resolution.desired + resolution.steering).normalize_or_zero();
            body.pointer -= (body.pointer - facing) * alpha;
            body.reverse = resolution.reverse;
            body.position += body.direction * body.speed * dt_secs;

            let threshold = body.padding * arrival_factor;
            let arrived_now = body.distance_to_target() < threshold;
            let target = body.target;
            let meta = &mut self.metas[index];
            if arrived_now {
                if !meta.arrived {
                    meta.arrived = true;
                    self.targets_reached += 1;
                    out_events.push(Event::TargetReached {
                        agent: meta.id,
                        target,
                    });
                }
            } else {
                meta.arrived = false;
            }
        }

        self.grid
            .update_cost(&self.bodies, self.tuning.field.occupancy_cost);
        self.clock += sub_dt;
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { width, height } => {
            world.grid = grid::Grid::new(width, height);
            world.bodies.clear();
            world.metas.clear();
            world.clock = Duration::ZERO;
            world.targets_reached = 0;
            world.next_agent = 0;
            tracing::debug!(width, height, "configured grid");
            out_events.push(Event::GridConfigured { width, height });
        }
        Command::AddWall { cell } => {
            if world.grid.add_wall(cell) {
                out_events.push(Event::WallAdded { cell });
            }
        }
        Command::SpawnAgent {
            position,
            target,
            padding,
            speed,
        } => {
            debug_assert!(padding > 0.0, "agent padding must be positive");
            debug_assert!(speed >= 0.0, "agent speed must not be negative");
            let id = AgentId::new(world.next_agent);
            world.next_agent = world.next_agent.saturating_add(1);
            world.bodies.push(AgentBody {
                position,
                target,
                direction: Vec2::ZERO,
                pointer: Vec2::ZERO,
                padding,
                speed,
                reverse: false,
            });
            world.metas.push(AgentMeta {
                id,
                arrived: false,
            });
            out_events.push(Event::AgentSpawned {
                agent: id,
                cell: CellCoord::containing(position),
            });
        }
        Command::AssignTarget { agent, target } => {
            if let Some(index) = world.agent_index(agent) {
                world.bodies[index].target = target;
                world.metas[index].arrived = false;
            }
        }
        Command::Advance { dt } => {
            world.advance(dt, out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::sync::Arc;
    use std::time::Duration;

    use crowdflow_core::{AgentSnapshot, AgentView, CellCoord, CostView, WallView};
    use rand::Rng;

    use super::{grid, GridError, SimTuning, World};

    /// Captures a read-only, id-sorted view of every agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        let snapshots: Vec<AgentSnapshot> = world
            .metas
            .iter()
            .zip(world.bodies.iter())
            .map(|(meta, body)| AgentSnapshot {
                id: meta.id,
                position: body.position,
                target: body.target,
                pointer: body.pointer,
                padding: body.padding,
                reverse: body.reverse,
            })
            .collect();
        AgentView::from_snapshots(snapshots)
    }

    /// Exposes the dense wall bitmap for drawing occupancy.
    #[must_use]
    pub fn wall_view(world: &World) -> WallView<'_> {
        WallView::new(
            world.grid.walls(),
            world.grid.width(),
            world.grid.height(),
        )
    }

    /// Exposes the dense congestion field for drawing traffic pressure.
    #[must_use]
    pub fn cost_view(world: &World) -> CostView<'_> {
        CostView::new(
            world.grid.cost_cells(),
            world.grid.width(),
            world.grid.height(),
        )
    }

    /// Grid dimensions as `(width, height)` in cells.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        (world.grid.width(), world.grid.height())
    }

    /// Simulated time accumulated across applied sub-steps.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Running count of arrival crossings since the grid was configured.
    #[must_use]
    pub fn targets_reached(world: &World) -> u64 {
        world.targets_reached
    }

    /// The tuning surface the world was constructed with.
    #[must_use]
    pub fn tuning(world: &World) -> &SimTuning {
        &world.tuning
    }

    /// Captures the shared navigation handle used during force resolution.
    #[must_use]
    pub fn nav_view(world: &World) -> NavView<'_> {
        NavView {
            grid: &world.grid,
            now: world.clock,
            ttl: world.tuning.field.cache_ttl,
        }
    }

    /// Returns a uniformly sampled non-wall cell.
    ///
    /// Sampling is rejection-based with a budget proportional to the cell
    /// count, so a fully walled or zero-area grid yields a typed error
    /// instead of spinning forever.
    pub fn random_empty_cell<R: Rng>(
        world: &World,
        rng: &mut R,
    ) -> Result<CellCoord, GridError> {
        let width = world.grid.width();
        let height = world.grid.height();
        if width == 0 || height == 0 {
            return Err(GridError::DegenerateGrid);
        }

        let attempts = u32::try_from(world.grid.cell_count())
            .unwrap_or(u32::MAX)
            .saturating_mul(8)
            .max(64);
        for _ in 0..attempts {
            let cell = CellCoord::new(
                rng.gen_range(0..width) as i32,
                rng.gen_range(0..height) as i32,
            );
            if !world.grid.has_wall(cell) {
                return Ok(cell);
            }
        }
        Err(GridError::NoEmptyCell { attempts })
    }

    /// Read-only navigation handle over the frozen grid.
    ///
    /// Shared by every agent during the parallel resolution phase; the only
    /// state it mutates is the path cache behind its concurrent map.
    #[derive(Clone, Copy, Debug)]
    pub struct NavView<'a> {
        grid: &'a grid::Grid,
        now: Duration,
        ttl: Duration,
    }

    impl NavView<'_> {
        /// Cache-aware shortest path from `src` to `dst` inclusive.
        ///
        /// Paths shorter than two cells mean no useful route exists.
        #[must_use]
        pub fn search(&self, src: CellCoord, dst: CellCoord) -> Arc<[CellCoord]> {
            self.grid.search(src, dst, self.now, self.ttl)
        }

        /// First waypoint beyond the source cell on the path to `dst`.
        #[must_use]
        pub fn next_waypoint(&self, src: CellCoord, dst: CellCoord) -> Option<CellCoord> {
            let path = self.search(src, dst);
            if path.len() < 2 {
                None
            } else {
                Some(path[1])
            }
        }
    }
}
