use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tessera::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Debug, PartialEq)]
struct Marked;

struct Ids {
    position: ComponentID,
    velocity: ComponentID,
    marked: ComponentID,
}

fn setup() -> (World, Ids) {
    let mut registry = ComponentRegistry::new();
    let ids = Ids {
        position: registry.register::<Position>(),
        velocity: registry.register::<Velocity>(),
        marked: registry.register::<Marked>(),
    };
    (World::new(registry), ids)
}

fn spawn_positions(world: &World, count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| world.spawn(Bundle::new().with(world.registry(), Position { x: i as f32, y: 0.0 })))
        .collect()
}

#[test]
fn add_during_iteration_is_queued_then_applied() {
    let (world, ids) = setup();
    spawn_positions(&world, 10);
    let mut visited = 0;

    world.for_each(&Query::all(&[ids.position]), |entity| {
        let change = world.add_component(entity, Velocity { dx: 1.0, dy: 0.0 });
        assert_eq!(change, Change::Queued);
        assert!(world.get_component::<Velocity>(entity).is_none());
        assert_eq!(world.location(entity).map(|l| l.archetype), Some(1));
        visited += 1;
    });

    assert_eq!(visited, 10);
    assert_eq!(world.pending_changes(), 0);
    assert_eq!(world.query_all(&[ids.position, ids.velocity]).len(), 10);
    world.validate().unwrap();
}

#[test]
fn visited_entities_still_match_the_query() {
    let (world, ids) = setup();
    for entity in spawn_positions(&world, 20) {
        world.add_component(entity, Velocity { dx: 0.0, dy: 0.0 });
    }

    world.for_each(&Query::all(&[ids.position, ids.velocity]), |entity| {
        assert!(world.has_component(entity, ids.velocity));
        world.remove_component(entity, ids.velocity);
    });

    assert!(world.query_all(&[ids.velocity]).is_empty());
    assert_eq!(world.query_exact(&[ids.position]).len(), 20);
}

#[test]
fn nested_iteration_flushes_at_outermost_exit() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 1);
    let entity = entities[0];

    world.for_each(&Query::all(&[ids.position]), |_| {
        world.for_each(&Query::all(&[ids.position]), |inner| {
            world.add_component(inner, Marked);
        });
        assert!(!world.has_component(entity, ids.marked));
        assert_eq!(world.pending_changes(), 1);
    });

    assert!(world.has_component(entity, ids.marked));
    assert_eq!(world.pending_changes(), 0);
}

#[test]
fn queued_remove_after_add_wins() {
    let (world, ids) = setup();
    let entity = spawn_positions(&world, 1)[0];

    world.for_each(&Query::all(&[ids.position]), |e| {
        assert_eq!(world.add_component(e, Velocity { dx: 1.0, dy: 1.0 }), Change::Queued);
        assert_eq!(world.remove_component(e, ids.velocity), Change::Queued);
    });

    assert!(!world.has_component(entity, ids.velocity));
    assert_eq!(world.component_ids_of(entity), Some(vec![ids.position]));
}

#[test]
fn queued_add_after_remove_wins() {
    let (world, ids) = setup();
    let entity = spawn_positions(&world, 1)[0];
    world.add_component(entity, Velocity { dx: 1.0, dy: 1.0 });

    world.for_each(&Query::all(&[ids.position]), |e| {
        world.remove_component(e, ids.velocity);
        world.add_component(e, Velocity { dx: 5.0, dy: 5.0 });
    });

    assert_eq!(world.component_cloned::<Velocity>(entity), Some(Velocity { dx: 5.0, dy: 5.0 }));
}

#[test]
fn flush_is_refused_during_iteration() {
    let (world, ids) = setup();
    let entity = spawn_positions(&world, 1)[0];

    world.for_each(&Query::all(&[ids.position]), |e| {
        world.add_component(e, Marked);
        world.remove_entity(e);
        let report = world.flush();
        assert!(report.is_empty());
        assert_eq!(world.pending_changes(), 1);
        assert_eq!(world.pending_removals(), 1);
    });

    assert!(world.has_component(entity, ids.marked));
    assert!(world.is_alive(entity));
    assert_eq!(world.pending_removals(), 1);

    let report = world.flush();
    assert_eq!(report.removed, 1);
    assert!(!world.is_alive(entity));
}

#[test]
fn removals_wait_for_flush() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 3);

    world.batch_remove_entities(&entities[..2]);
    assert_eq!(world.query_all(&[ids.position]).len(), 3);
    assert!(world.is_alive(entities[0]));

    let report = world.flush();
    assert_eq!(report.removed, 2);
    assert_eq!(world.query_all(&[ids.position]), vec![entities[2]]);
}

#[test]
fn queued_change_for_removed_entity_is_ignored() {
    let (world, ids) = setup();
    let entity = spawn_positions(&world, 1)[0];

    world.remove_entity(entity);
    world.flush();

    let survivor = world.create_entity();
    world.for_each(&Query::exact(&[]), |_| {
        world.add_component(entity, Marked);
        world.add_component(survivor, Marked);
    });
    assert!(world.has_component(survivor, ids.marked));
    assert!(!world.is_alive(entity));
    world.validate().unwrap();
}

#[test]
fn spawn_during_iteration_defers_components() {
    let (world, ids) = setup();
    spawn_positions(&world, 2);
    let mut spawned = Vec::new();

    world.for_each(&Query::all(&[ids.position]), |_| {
        let child = world.spawn(Bundle::new().with(world.registry(), Velocity { dx: 0.0, dy: 1.0 }));
        assert!(world.is_alive(child));
        assert!(!world.has_component(child, ids.velocity));
        spawned.push(child);
    });

    assert_eq!(spawned.len(), 2);
    for child in spawned {
        assert_eq!(world.component_cloned::<Velocity>(child), Some(Velocity { dx: 0.0, dy: 1.0 }));
    }
}

#[test]
fn densification_after_removal() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 5);
    let archetype = world.location(entities[0]).map(|l| l.archetype).unwrap();

    world.remove_entity(entities[1]);
    world.flush();

    let length = world.inspect(|data| data.archetype(archetype).map(|a| a.len()));
    assert_eq!(length, Some(4));

    let moved = world.location(entities[4]).unwrap();
    assert_eq!(moved.archetype, archetype);
    assert_eq!(moved.row, 1);
    assert_eq!(world.component_cloned::<Position>(entities[4]), Some(Position { x: 4.0, y: 0.0 }));
    assert_eq!(world.location(entities[3]).map(|l| l.row), Some(3));
    assert_eq!(world.query_exact(&[ids.position]).len(), 4);
    world.validate().unwrap();
}

#[test]
fn typed_iteration_mutates_in_place() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 8);
    world.add_component(entities[0], Marked);

    world.for_each_mut::<Position, _>(&Query::all(&[ids.position]), |_, position| {
        position.y += 2.0;
    });

    for entity in &entities {
        assert_eq!(world.get_component::<Position>(*entity).map(|p| p.y), Some(2.0));
    }

    world.for_each_mut::<Position, _>(&Query::all(&[]).without(&[ids.marked]), |_, position| {
        position.y = 0.0;
    });
    assert_eq!(world.get_component::<Position>(entities[0]).map(|p| p.y), Some(2.0));
    assert_eq!(world.get_component::<Position>(entities[1]).map(|p| p.y), Some(0.0));
}

#[test]
fn read1_write1_integrates_velocity() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 4);
    for entity in &entities {
        world.add_component(*entity, Velocity { dx: 1.0, dy: -1.0 });
    }

    world.for_each_read1_write1::<Velocity, Position, _>(&Query::all(&[ids.velocity]), |_, velocity, position| {
        position.x += velocity.dx;
        position.y += velocity.dy;
    });

    assert_eq!(world.component_cloned::<Position>(entities[2]), Some(Position { x: 3.0, y: -1.0 }));
}

#[test]
fn structural_changes_from_typed_iteration_are_queued() {
    let (world, ids) = setup();
    spawn_positions(&world, 6);

    world.for_each_mut::<Position, _>(&Query::all(&[ids.position]), |entity, position| {
        if position.x >= 3.0 {
            assert_eq!(world.add_component(entity, Marked), Change::Queued);
        }
    });

    assert_eq!(world.query_all(&[ids.marked]).len(), 3);
    world.validate().unwrap();
}

#[test]
#[should_panic(expected = "inside a typed column iteration")]
fn reentrant_lock_use_panics() {
    let (world, ids) = setup();
    spawn_positions(&world, 1);

    world.for_each_mut::<Position, _>(&Query::all(&[ids.position]), |entity, _| {
        let _ = world.get_component::<Velocity>(entity);
    });
}

#[test]
#[should_panic(expected = "inside a typed column iteration")]
fn component_read_inside_mutable_closure_panics() {
    let (world, _) = setup();
    let entity = spawn_positions(&world, 1)[0];

    world.with_component_mut::<Position, _>(entity, |position| {
        position.x += 1.0;
        let _ = world.component_cloned::<Position>(entity);
    });
}

#[test]
fn mutable_closure_may_queue_removals() {
    let (world, _) = setup();
    let entity = spawn_positions(&world, 1)[0];

    let x = world.with_component_mut::<Position, _>(entity, |position| {
        position.x = 7.0;
        world.remove_entity(entity);
        position.x
    });

    assert_eq!(x, Some(7.0));
    assert!(world.is_alive(entity));
    assert_eq!(world.flush().removed, 1);
    assert!(!world.is_alive(entity));
}

#[test]
fn queued_changes_apply_before_other_threads_change_immediately() {
    for _ in 0..50 {
        let (world, ids) = setup();
        let entity = spawn_positions(&world, 1)[0];
        let queued = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                while !queued.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                world.remove_component(entity, ids.velocity);
            });

            world.for_each(&Query::all(&[ids.position]), |entity| {
                world.add_component(entity, Velocity { dx: 1.0, dy: 1.0 });
                queued.store(true, Ordering::Release);
            });
        });

        world.flush();
        assert!(!world.has_component(entity, ids.velocity));
        world.validate().unwrap();
    }
}

#[test]
fn parallel_iteration_visits_every_row() {
    let (world, ids) = setup();
    let entities = spawn_positions(&world, 1000);
    for entity in entities.iter().step_by(2) {
        world.add_component(*entity, Marked);
    }
    let visits = AtomicUsize::new(0);

    world.par_for_each_mut::<Position, _>(&Query::all(&[ids.position]), |_, position| {
        position.x *= 2.0;
        visits.fetch_add(1, Ordering::Relaxed);
    });

    assert_eq!(visits.load(Ordering::Relaxed), 1000);
    assert_eq!(world.component_cloned::<Position>(entities[999]), Some(Position { x: 1998.0, y: 0.0 }));
}

#[test]
fn concurrent_writers_keep_storage_consistent() {
    let (world, ids) = setup();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let world = &world;
            scope.spawn(move || {
                for i in 0..100 {
                    let entity = world.create_entity();
                    world.add_component(entity, Position { x: t as f32, y: i as f32 });
                    if i % 2 == 0 {
                        world.add_component(entity, Velocity { dx: 0.0, dy: 0.0 });
                    }
                }
            });
        }
    });

    assert_eq!(world.entity_count(), 400);
    assert_eq!(world.query_all(&[ids.position]).len(), 400);
    assert_eq!(world.query_all(&[ids.velocity]).len(), 200);
    world.validate().unwrap();
}
