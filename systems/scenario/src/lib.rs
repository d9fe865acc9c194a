#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic scenario system that lays out the arena, spawns the crowd,
//! and reassigns targets as agents arrive.
//!
//! The simulation core never chooses destinations itself: it reports
//! `TargetReached` events and this system answers with `AssignTarget`
//! commands. All randomness flows through one owned, seeded generator, so a
//! scenario replays bit-identically from its configuration.

use std::collections::HashSet;

use crowdflow_core::{CellCoord, Command, Event};
use crowdflow_world::{query, GridError, World};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Sampling budget multiplier used when placing obstacles and agents.
const PLACEMENT_ATTEMPTS_PER_ITEM: u32 = 64;

/// Configuration describing one crowd scenario.
///
/// Deserializable so adapters can load overrides from a TOML file; missing
/// fields fall back to the built-in arena.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Destination cells agents cycle between.
    pub hotspots: Vec<CellCoord>,
    /// Number of random interior wall cells beyond the border.
    pub obstacle_count: u32,
    /// Number of agents to spawn.
    pub agent_count: u32,
    /// Chebyshev clearance kept free of obstacles around every hotspot.
    pub hotspot_clearance: u32,
    /// Padding assigned to every spawned agent.
    pub padding: f32,
    /// Speed assigned to every spawned agent.
    pub speed: f32,
    /// Seed for the scenario's random generator.
    pub rng_seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            hotspots: vec![
                CellCoord::new(2, 2),
                CellCoord::new(29, 2),
                CellCoord::new(2, 29),
                CellCoord::new(29, 29),
                CellCoord::new(16, 16),
                CellCoord::new(2, 16),
                CellCoord::new(16, 2),
                CellCoord::new(16, 29),
                CellCoord::new(29, 16),
            ],
            obstacle_count: 100,
            agent_count: 400,
            hotspot_clearance: 2,
            padding: 0.2,
            speed: 2.0,
            rng_seed: 0x5eed_c0de,
        }
    }
}

/// Deterministic system owning scenario randomness and retarget bookkeeping.
#[derive(Debug)]
pub struct Scenario {
    config: ScenarioConfig,
    rng: ChaCha8Rng,
    reassignments: u64,
}

impl Scenario {
    /// Creates a new scenario system seeded from the configuration.
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self {
            config,
            rng,
            reassignments: 0,
        }
    }

    /// The configuration this scenario was built from.
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Number of `AssignTarget` commands emitted so far.
    #[must_use]
    pub fn reassignments(&self) -> u64 {
        self.reassignments
    }

    /// Emits the grid configuration, border walls, and random interior
    /// obstacles.
    ///
    /// Obstacles keep a clearance margin around every hotspot so destinations
    /// never end up sealed inside rubble. Placement uses bounded rejection
    /// sampling; on a crowded configuration fewer obstacles than requested
    /// may be placed.
    pub fn layout(&mut self, out: &mut Vec<Command>) {
        let width = self.config.width;
        let height = self.config.height;
        out.push(Command::ConfigureGrid { width, height });
        if width == 0 || height == 0 {
            return;
        }

        let mut blocked: HashSet<CellCoord> = HashSet::new();
        for x in 0..width as i32 {
            let _ = blocked.insert(CellCoord::new(x, 0));
            let _ = blocked.insert(CellCoord::new(x, height as i32 - 1));
        }
        for y in 0..height as i32 {
            let _ = blocked.insert(CellCoord::new(0, y));
            let _ = blocked.insert(CellCoord::new(width as i32 - 1, y));
        }
        let mut border: Vec<CellCoord> = blocked.iter().copied().collect();
        border.sort();
        for cell in border {
            out.push(Command::AddWall { cell });
        }

        let mut placed = 0;
        let budget = self.config.obstacle_count.saturating_mul(PLACEMENT_ATTEMPTS_PER_ITEM);
        for _ in 0..budget {
            if placed == self.config.obstacle_count {
                break;
            }
            let cell = CellCoord::new(
                self.rng.gen_range(0..width) as i32,
                self.rng.gen_range(0..height) as i32,
            );
            if blocked.contains(&cell) || self.near_hotspot(cell) {
                continue;
            }
            let _ = blocked.insert(cell);
            out.push(Command::AddWall { cell });
            placed += 1;
        }
    }

    /// Emits spawn commands for the configured crowd.
    ///
    /// Agents land on distinct empty cells with uniform jitter inside the
    /// cell, targeting a random hotspot each. Requires the layout commands to
    /// have been applied to `world` already.
    pub fn populate(&mut self, world: &World, out: &mut Vec<Command>) -> Result<(), GridError> {
        let mut taken: HashSet<CellCoord> = HashSet::new();
        let budget = self
            .config
            .agent_count
            .saturating_mul(PLACEMENT_ATTEMPTS_PER_ITEM)
            .max(64);
        let mut attempts = 0;

        for _ in 0..self.config.agent_count {
            let cell = loop {
                if attempts >= budget {
                    return Err(GridError::NoEmptyCell { attempts });
                }
                attempts += 1;
                let candidate = query::random_empty_cell(world, &mut self.rng)?;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            let _ = taken.insert(cell);

            let jitter = Vec2::new(
                self.rng.gen::<f32>() - 0.5,
                self.rng.gen::<f32>() - 0.5,
            );
            out.push(Command::SpawnAgent {
                position: cell.center() + jitter,
                target: self.random_hotspot().unwrap_or(cell).center(),
                padding: self.config.padding,
                speed: self.config.speed,
            });
        }
        Ok(())
    }

    /// Consumes world events, answering every arrival with a fresh target.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if let Event::TargetReached { agent, .. } = event {
                let Some(hotspot) = self.random_hotspot() else {
                    continue;
                };
                out.push(Command::AssignTarget {
                    agent: *agent,
                    target: hotspot.center(),
                });
                self.reassignments += 1;
            }
        }
    }

    fn random_hotspot(&mut self) -> Option<CellCoord> {
        if self.config.hotspots.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.config.hotspots.len());
        Some(self.config.hotspots[index])
    }

    fn near_hotspot(&self, cell: CellCoord) -> bool {
        self.config
            .hotspots
            .iter()
            .any(|hotspot| hotspot.chebyshev_distance(cell) <= self.config.hotspot_clearance)
    }
}
