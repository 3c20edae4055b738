use std::cell::RefCell;
use std::rc::Rc;

use engine_app::{
    DriverError, ENTITY_CREATED_EVENT, ENTITY_DESTROYED_EVENT, Runtime, RuntimeConfig,
    ScriptSystem, TickConfig, TickDriver,
};
use engine_component::registry::{NAMEABLE, POSITION};
use engine_component::{Entity, EntityKind};
use engine_ecs::{
    ErrorKind, LifecycleState, QueryBounds, QueryHandle, StaticContent, TemplateComponent,
};
use serde_json::{Value, json};

fn fast_ticks(max_ticks: u64) -> TickConfig {
    TickConfig::default()
        .with_tick_rate(0.0)
        .with_max_ticks(max_ticks)
}

/// Moves one entity along x by one unit per tick and records the result of a
/// fixed range query after every move.
#[derive(Default)]
struct Walker {
    entity: Option<Entity>,
    query: Option<QueryHandle>,
    observed: Vec<Vec<Entity>>,
}

impl ScriptSystem for Walker {
    fn initialize(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        rt.register_component("test:pos", &json!({ "x": 0, "y": 0, "z": 0 }))?;
        let entity = rt.create_entity(EntityKind::Entity, None)?;
        let mut pos = rt.create_component(entity, "test:pos")?;
        pos.set("x", 5.0)?;
        pos.set("y", 5.0)?;
        rt.apply_component_changes(entity, &pos)?;

        self.entity = Some(entity);
        self.query = Some(rt.register_query(Some("test:pos"))?);
        Ok(())
    }

    fn update(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        let (Some(entity), Some(query)) = (self.entity, self.query) else {
            anyhow::bail!("walker not initialized");
        };
        let mut pos = rt.get_component(entity, "test:pos")?;
        let x = pos.get_number("x").unwrap_or_default();
        pos.set("x", x + 1.0)?;
        rt.apply_component_changes(entity, &pos)?;

        let bounds = QueryBounds::unbounded().first(0.0, 7.0).second(0.0, 10.0);
        self.observed.push(rt.get_entities_from_query(query, &bounds)?);
        Ok(())
    }
}

#[test]
fn test_range_results_follow_commits_across_ticks() {
    let mut driver = TickDriver::new(Walker::default(), RuntimeConfig::default(), fast_ticks(3));
    driver.run().unwrap();

    let walker = driver.system();
    let entity = walker.entity.unwrap();
    // x goes 6, 7, 8.
    assert_eq!(walker.observed, vec![vec![entity], vec![entity], vec![]]);
    assert_eq!(driver.state(), LifecycleState::ShutDown);
}

/// Spawns from templates during initialize and destroys one entity per tick.
struct Spawner {
    query: Option<QueryHandle>,
    log: Rc<RefCell<Vec<String>>>,
}

impl ScriptSystem for Spawner {
    fn initialize(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        for event in [ENTITY_CREATED_EVENT, ENTITY_DESTROYED_EVENT] {
            let log = Rc::clone(&self.log);
            rt.listen_for_event(event, move |_, payload: &mut Value| {
                let entity = Entity::from_json(&payload["entity"])
                    .ok_or_else(|| anyhow::anyhow!("missing entity"))?;
                log.borrow_mut().push(format!("{event} {}", entity.id));
                Ok(())
            });
        }

        let query = rt.register_query(Some(POSITION))?;
        rt.add_filter_to_query(query, NAMEABLE)?;
        self.query = Some(query);

        for _ in 0..3 {
            rt.create_entity(EntityKind::Entity, Some("test:named"))?;
        }
        rt.create_entity(EntityKind::ItemEntity, Some("test:unnamed"))?;
        Ok(())
    }

    fn update(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        let query = self.query.ok_or_else(|| anyhow::anyhow!("not initialized"))?;
        let named = rt.get_entities_from_query(query, &QueryBounds::unbounded().second(60.0, 70.0))?;
        if let Some(first) = named.first() {
            let err = rt.destroy_component(*first, NAMEABLE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotRemovable);
            rt.destroy_entity(*first)?;
        }
        Ok(())
    }

    fn shutdown(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        rt.verify_indexes()?;
        Ok(())
    }
}

#[test]
fn test_templates_and_lifecycle_events() {
    let content = StaticContent::new()
        .with_template(
            "test:named",
            vec![
                TemplateComponent::new(POSITION).with("y", 64.0),
                TemplateComponent::new(NAMEABLE).with("name", "walker"),
            ],
        )
        .with_template("test:unnamed", vec![TemplateComponent::new(POSITION)]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let system = Spawner {
        query: None,
        log: Rc::clone(&log),
    };

    let mut driver =
        TickDriver::new(system, RuntimeConfig::default(), fast_ticks(2)).with_content(content);
    driver.initialize().unwrap();
    {
        let rt = driver.runtime().unwrap();
        let named = rt.get_component(Entity::new(1, EntityKind::Entity), NAMEABLE).unwrap();
        assert_eq!(named.get("name").and_then(|v| v.as_str()), Some("walker"));
        assert_eq!(rt.world().entity_count(), 4);
    }

    driver.update().unwrap();
    driver.update().unwrap();
    driver.shutdown().unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "minecraft:entity_created 1",
            "minecraft:entity_created 2",
            "minecraft:entity_created 3",
            "minecraft:entity_created 4",
            "minecraft:entity_destroyed 1",
            "minecraft:entity_destroyed 2",
        ]
    );
}

/// Publishes a chain of nested events from inside listeners.
#[derive(Default)]
struct Relay {
    trace: Rc<RefCell<Vec<String>>>,
}

impl ScriptSystem for Relay {
    fn initialize(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        let trace = Rc::clone(&self.trace);
        rt.listen_for_event("test:outer", move |rt, payload| {
            trace.borrow_mut().push("outer:first".into());
            payload["hops"] = json!(1);
            rt.broadcast_event("test:inner", payload)?;
            trace
                .borrow_mut()
                .push(format!("outer:first sees {} hops", payload["hops"]));
            Ok(())
        });

        let trace = Rc::clone(&self.trace);
        rt.listen_for_event("test:inner", move |_, payload| {
            trace.borrow_mut().push("inner".into());
            payload["hops"] = json!(payload["hops"].as_i64().unwrap_or(0) + 1);
            Ok(())
        });

        let trace = Rc::clone(&self.trace);
        rt.listen_for_event("test:outer", move |_, _| {
            trace.borrow_mut().push("outer:second".into());
            Ok(())
        });
        Ok(())
    }

    fn update(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
        let report = rt.broadcast_event("test:outer", &mut json!({}))?;
        anyhow::ensure!(report.is_clean(), "listener failures: {:?}", report.failures);
        Ok(())
    }
}

#[test]
fn test_nested_events_run_depth_first() {
    let mut driver = TickDriver::new(Relay::default(), RuntimeConfig::default(), fast_ticks(1));
    driver.run().unwrap();
    assert_eq!(
        *driver.system().trace.borrow(),
        vec!["outer:first", "inner", "outer:first sees 2 hops", "outer:second"]
    );
}

struct Idle;

impl ScriptSystem for Idle {
    fn update(&mut self, _rt: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn test_runtime_outside_lifecycle_window() {
    let mut driver = TickDriver::new(Idle, RuntimeConfig::default(), fast_ticks(1));
    assert!(driver.runtime().is_err());
    driver.run().unwrap();

    match driver.update() {
        Err(DriverError::Engine(err)) => assert_eq!(err.kind(), ErrorKind::LifecycleViolation),
        other => panic!("expected a lifecycle violation, got {other:?}"),
    }
    assert!(driver.runtime_mut().is_err());
}

#[test]
fn test_unknown_template_fails_initialize() {
    struct Broken;
    impl ScriptSystem for Broken {
        fn initialize(&mut self, rt: &mut Runtime) -> anyhow::Result<()> {
            rt.create_entity(EntityKind::Entity, Some("test:missing"))?;
            Ok(())
        }

        fn update(&mut self, _rt: &mut Runtime) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let mut driver = TickDriver::new(Broken, RuntimeConfig::default(), fast_ticks(1));
    let err = driver.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "script system failed during initialize: entity template 'test:missing' could not be resolved"
    );
    assert_eq!(driver.state(), LifecycleState::ShutDown);
}
