//! # engine_app demo driver
//!
//! Runs a swarm of drones through the runtime: each tick every drone moves by
//! its velocity, drones leaving the arena are destroyed and respawned, and a
//! range query periodically counts the drones near the origin.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use engine_app::{
    ENTITY_CREATED_EVENT, Runtime, RuntimeConfig, ScriptSystem, TickConfig, TickDriver,
};
use engine_component::registry::POSITION;
use engine_component::{Entity, EntityKind};
use engine_ecs::{QueryBounds, QueryHandle, StaticContent};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const VELOCITY: &str = "demo:velocity";
const ARENA_RADIUS: f64 = 32.0;
const REPORT_EVERY: u64 = 20;

#[derive(Parser, Debug)]
#[command(name = "engine_app", about = "Drive a demo swarm through the scripted entity runtime")]
struct Args {
    /// Number of ticks to run (0 = until interrupted)
    #[arg(short, long, default_value_t = 200)]
    ticks: u64,

    /// Target ticks per second
    #[arg(long, default_value_t = 20.0)]
    tick_rate: f64,

    /// Number of drones to keep alive
    #[arg(short, long, default_value_t = 32)]
    entities: usize,

    /// JSON document of entity templates
    #[arg(short, long)]
    content: Option<PathBuf>,

    /// Template to spawn drones from
    #[arg(long, requires = "content")]
    template: Option<String>,

    /// Maximum nesting depth of event publishes
    #[arg(long, default_value_t = 64)]
    max_event_depth: usize,
}

#[derive(Debug)]
struct Swarm {
    size: usize,
    template: Option<String>,
    movers: Option<QueryHandle>,
    spawned: Rc<Cell<u64>>,
    respawned: u64,
}

impl Swarm {
    fn new(size: usize, template: Option<String>) -> Self {
        Self {
            size,
            template,
            movers: None,
            spawned: Rc::new(Cell::new(0)),
            respawned: 0,
        }
    }

    fn spawn(&self, runtime: &mut Runtime, seed: u64) -> Result<Entity> {
        let entity = runtime.create_entity(EntityKind::Entity, self.template.as_deref())?;
        let seed = seed as f64;

        let mut position = runtime.create_component(entity, POSITION)?;
        position.set("x", (seed % 8.0) * 2.0 - 8.0)?;
        position.set("y", 64.0)?;
        position.set("z", (seed / 8.0).floor() % 8.0 * 2.0 - 8.0)?;
        runtime.apply_component_changes(entity, &position)?;

        let mut velocity = runtime.create_component(entity, VELOCITY)?;
        velocity.set("x", (seed * 0.37).sin() * 0.8)?;
        velocity.set("z", (seed * 0.53).cos() * 0.8)?;
        runtime.apply_component_changes(entity, &velocity)?;
        Ok(entity)
    }
}

impl ScriptSystem for Swarm {
    fn name(&self) -> &str {
        "swarm"
    }

    fn initialize(&mut self, runtime: &mut Runtime) -> Result<()> {
        runtime.register_component(VELOCITY, &json!({ "x": 0, "y": 0, "z": 0 }))?;
        let movers = runtime.register_query(Some(POSITION))?;
        runtime.add_filter_to_query(movers, VELOCITY)?;
        self.movers = Some(movers);

        let spawned = Rc::clone(&self.spawned);
        runtime.listen_for_event(ENTITY_CREATED_EVENT, move |_, _| {
            spawned.set(spawned.get() + 1);
            Ok(())
        });

        for seed in 0..self.size as u64 {
            self.spawn(runtime, seed)?;
        }
        Ok(())
    }

    fn update(&mut self, runtime: &mut Runtime) -> Result<()> {
        let movers = self.movers.context("swarm used before initialize")?;

        for entity in runtime.get_entities_from_query(movers, &QueryBounds::unbounded())? {
            let velocity = runtime.get_component(entity, VELOCITY)?;
            let mut position = runtime.get_component(entity, POSITION)?;
            let mut outside = false;
            for axis in ["x", "y", "z"] {
                let value = position.get_number(axis).unwrap_or_default()
                    + velocity.get_number(axis).unwrap_or_default();
                outside |= value.abs() > ARENA_RADIUS && axis != "y";
                position.set(axis, value)?;
            }
            runtime.apply_component_changes(entity, &position)?;

            if outside {
                runtime.destroy_entity(entity)?;
                self.respawned += 1;
                let replacement = self.spawn(runtime, self.size as u64 + self.respawned)?;
                debug!(%entity, %replacement, "drone left the arena");
            }
        }

        if runtime.tick() % REPORT_EVERY == 0 {
            let near_origin = QueryBounds::unbounded().first(-8.0, 8.0).third(-8.0, 8.0);
            let near = runtime.get_entities_from_query(movers, &near_origin)?.len();
            info!(
                tick = runtime.tick(),
                drones = runtime.world().entity_count(),
                near_origin = near,
                respawned = self.respawned,
                "swarm status"
            );
        }
        Ok(())
    }

    fn shutdown(&mut self, runtime: &mut Runtime) -> Result<()> {
        runtime.verify_indexes()?;
        info!(
            spawned = self.spawned.get(),
            respawned = self.respawned,
            "swarm finished"
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let tick_config = TickConfig::default()
        .with_tick_rate(args.tick_rate)
        .with_max_ticks(args.ticks);
    let runtime_config = RuntimeConfig::default().with_max_event_depth(args.max_event_depth);
    let swarm = Swarm::new(args.entities, args.template.clone());

    let mut driver = TickDriver::new(swarm, runtime_config, tick_config);
    if let Some(path) = &args.content {
        let content = StaticContent::load_file(path)
            .with_context(|| format!("loading content from {}", path.display()))?;
        info!(path = %path.display(), templates = content.len(), "loaded content");
        driver = driver.with_content(content);
    }

    info!(
        drones = args.entities,
        ticks = args.ticks,
        tick_rate = args.tick_rate,
        "demo starting"
    );
    driver.run()?;
    info!("demo finished");
    Ok(())
}
