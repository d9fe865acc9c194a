#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line runner for the Crowdflow simulation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crowdflow_core::{Command, Event};
use crowdflow_system_scenario::{Scenario, ScenarioConfig};
use crowdflow_world::{self as world, query, World};
use tracing_subscriber::EnvFilter;

/// Command-line arguments controlling the simulation run.
#[derive(Debug, Parser)]
#[command(name = "crowdflow", about = "Run a headless crowd simulation")]
struct Args {
    /// Path to a TOML scenario file overriding the built-in arena.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// RNG seed, overriding the scenario file.
    #[arg(long)]
    seed: Option<u64>,
    /// Agent count, overriding the scenario file.
    #[arg(long)]
    agents: Option<u32>,
    /// Simulated seconds to run.
    #[arg(long, default_value_t = 30.0)]
    duration: f32,
    /// Tick length in milliseconds.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
    /// Simulated seconds between throughput reports.
    #[arg(long, default_value_t = 5.0)]
    report_every: f32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = load_config(args.scenario.as_deref())?;
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    if let Some(agents) = args.agents {
        config.agent_count = agents;
    }

    let mut world = World::new();
    let mut scenario = Scenario::new(config);
    let mut commands = Vec::new();
    let mut events = Vec::new();

    scenario.layout(&mut commands);
    drain(&mut world, &mut commands, &mut events);
    events.clear();

    scenario
        .populate(&world, &mut commands)
        .context("placing agents on the grid")?;
    drain(&mut world, &mut commands, &mut events);
    tracing::info!(
        agents = query::agent_view(&world).len(),
        dimensions = ?query::dimensions(&world),
        "scenario bootstrapped"
    );

    let dt = Duration::from_millis(args.tick_ms.max(1));
    let total = Duration::from_secs_f32(args.duration.max(0.0));
    let report_every = Duration::from_secs_f32(args.report_every.max(0.1));
    let mut next_report = report_every;
    let mut elapsed = Duration::ZERO;

    while elapsed < total {
        events.clear();
        world::apply(&mut world, Command::Advance { dt }, &mut events);
        scenario.handle(&events, &mut commands);
        drain(&mut world, &mut commands, &mut events);
        elapsed += dt;

        if elapsed >= next_report {
            next_report += report_every;
            let seconds = elapsed.as_secs_f64();
            let reached = query::targets_reached(&world);
            println!(
                "{seconds:.1}s simulated, {reached} arrivals ({:.1}/s)",
                reached as f64 / seconds
            );
        }
    }

    let seconds = query::clock(&world).as_secs_f64();
    let reached = query::targets_reached(&world);
    println!(
        "done: {seconds:.1}s simulated, {reached} arrivals ({:.1}/s), {} retargets",
        reached as f64 / seconds.max(f64::EPSILON),
        scenario.reassignments()
    );
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScenarioConfig> {
    let Some(path) = path else {
        return Ok(ScenarioConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing scenario file {}", path.display()))
}

fn drain(world: &mut World, commands: &mut Vec<Command>, events: &mut Vec<Event>) {
    for command in commands.drain(..) {
        world::apply(world, command, events);
    }
}
