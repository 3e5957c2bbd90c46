use std::collections::HashSet;

use tessera::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Position(f32, f32);

#[derive(Clone, Debug, PartialEq)]
struct Velocity(f32, f32);

#[derive(Clone, Debug, PartialEq)]
struct Name(String);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Team(u8);

struct Ids {
    position: ComponentID,
    velocity: ComponentID,
    name: ComponentID,
    team: ComponentID,
}

fn setup() -> (World, Ids) {
    let mut registry = ComponentRegistry::new();
    let ids = Ids {
        position: registry.register::<Position>(),
        velocity: registry.register::<Velocity>(),
        name: registry.register::<Name>(),
        team: registry.register::<Team>(),
    };
    (World::new(registry), ids)
}

/// Entity `i` gets Position if i % 2 == 0, Velocity if i % 3 == 0, Name if i % 5 == 0.
fn populate(world: &World, count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            let entity = world.create_entity();
            if i % 2 == 0 {
                world.add_component(entity, Position(i as f32, 0.0));
            }
            if i % 3 == 0 {
                world.add_component(entity, Velocity(0.0, i as f32));
            }
            if i % 5 == 0 {
                world.add_component(entity, Name(format!("e{i}")));
            }
            entity
        })
        .collect()
}

fn expected(entities: &[Entity], keep: impl Fn(usize) -> bool) -> HashSet<Entity> {
    entities.iter().enumerate().filter(|(i, _)| keep(*i)).map(|(_, &e)| e).collect()
}

fn as_set(result: &[Entity]) -> HashSet<Entity> {
    let set: HashSet<Entity> = result.iter().copied().collect();
    assert_eq!(set.len(), result.len(), "query returned duplicates");
    set
}

#[test]
fn thousand_entities_no_duplicates() {
    let (world, ids) = setup();
    for i in 0..1000 {
        let entity = world.create_entity();
        world.add_component(entity, Position(i as f32, 0.0));
    }

    let result = world.query_all(&[ids.position]);
    assert_eq!(result.len(), 1000);
    assert_eq!(as_set(&result).len(), 1000);
}

#[test]
fn query_all_is_complete() {
    let (world, ids) = setup();
    let entities = populate(&world, 300);

    let result = world.query_all(&[ids.position, ids.velocity]);
    assert_eq!(as_set(&result), expected(&entities, |i| i % 6 == 0));

    let everyone = world.query_all(&[]);
    assert_eq!(as_set(&everyone).len(), 300);
}

#[test]
fn query_any_is_complete() {
    let (world, ids) = setup();
    let entities = populate(&world, 300);

    let result = world.query_any(&[ids.velocity, ids.name]);
    assert_eq!(as_set(&result), expected(&entities, |i| i % 3 == 0 || i % 5 == 0));
    assert!(world.query_any(&[]).is_empty());
}

#[test]
fn query_exact_selects_one_archetype() {
    let (world, ids) = setup();
    let entities = populate(&world, 300);

    let result = world.query_exact(&[ids.position]);
    assert_eq!(
        as_set(&result),
        expected(&entities, |i| i % 2 == 0 && i % 3 != 0 && i % 5 != 0)
    );
    assert_eq!(world.matching_archetypes(&Query::exact(&[ids.position])).len(), 1);
    assert!(world.query_exact(&[ids.team]).is_empty());

    let bare = world.query_exact(&[]);
    assert_eq!(as_set(&bare), expected(&entities, |i| i % 2 != 0 && i % 3 != 0 && i % 5 != 0));
}

#[test]
fn query_with_exclusion_drops_excluded_archetypes() {
    let (world, ids) = setup();
    let entities = populate(&world, 300);

    let result = world.query_with_exclusion(&[ids.position], &[ids.name]);
    assert_eq!(as_set(&result), expected(&entities, |i| i % 2 == 0 && i % 5 != 0));

    let result = world.query_with_exclusion(&[ids.position, ids.velocity], &[ids.name]);
    assert_eq!(
        as_set(&result),
        expected(&entities, |i| (i % 2 == 0 || i % 3 == 0) && i % 5 != 0)
    );
}

#[test]
fn query_excluding_tags_filters_by_value() {
    let (world, ids) = setup();
    let red = world.spawn(
        Bundle::new()
            .with(world.registry(), Position(0.0, 0.0))
            .with(world.registry(), Team(1)),
    );
    let blue = world.spawn(
        Bundle::new()
            .with(world.registry(), Position(1.0, 0.0))
            .with(world.registry(), Team(2)),
    );
    let untagged = world.spawn(Bundle::new().with(world.registry(), Position(2.0, 0.0)));
    let named = world.spawn(
        Bundle::new()
            .with(world.registry(), Position(3.0, 0.0))
            .with(world.registry(), Name("n".into())),
    );

    let result = world.query_excluding_tags(&[ids.position], &[ids.name], &[Team(2)]);
    assert_eq!(as_set(&result), HashSet::from([red, untagged]));

    let result = world.query_excluding_tags(&[ids.position], &[], &[Team(1), Team(2)]);
    assert_eq!(as_set(&result), HashSet::from([untagged, named]));

    assert!(!result.contains(&blue));
}

#[test]
fn typed_builder_matches_raw_ids() {
    let (world, ids) = setup();
    let entities = populate(&world, 120);

    let typed = world
        .query_builder()
        .with::<Position>()
        .without::<Velocity>()
        .build();
    let raw = Query::all(&[ids.position]).without(&[ids.velocity]);
    assert_eq!(typed, raw);
    assert_eq!(as_set(&world.query(&typed)), expected(&entities, |i| i % 2 == 0 && i % 3 != 0));

    let any = world.query_builder().any_of::<Velocity>().any_of::<Name>().build();
    assert_eq!(as_set(&world.query(&any)), expected(&entities, |i| i % 3 == 0 || i % 5 == 0));
}

#[test]
fn results_are_snapshots() {
    let (world, ids) = setup();
    let first = world.create_entity();
    world.add_component(first, Position(0.0, 0.0));

    let snapshot = world.query_all(&[ids.position]);
    let second = world.create_entity();
    world.add_component(second, Position(1.0, 0.0));
    world.remove_component(first, ids.position);

    assert_eq!(snapshot, vec![first]);
    assert_eq!(world.query_all(&[ids.position]), vec![second]);
}

#[test]
fn order_within_an_archetype_follows_rows() {
    let (world, ids) = setup();
    let spawned: Vec<Entity> = (0..10)
        .map(|i| world.spawn(Bundle::new().with(world.registry(), Velocity(i as f32, 0.0))))
        .collect();

    assert_eq!(world.query_exact(&[ids.velocity]), spawned);
}

#[test]
fn matching_archetypes_reports_lengths() {
    let (world, ids) = setup();
    populate(&world, 30);

    let matches = world.matching_archetypes(&Query::all(&[ids.velocity]));
    let total: usize = matches.iter().map(|m| m.length).sum();
    assert_eq!(total, 10);
    assert!(matches.len() >= 2);
}

#[test]
#[should_panic(expected = "component id 300 is not registered")]
fn query_with_id_past_capacity_panics() {
    let (world, _) = setup();
    populate(&world, 10);
    world.query_all(&[300]);
}

#[test]
#[should_panic(expected = "component id 42 is not registered")]
fn exclusion_with_unissued_id_panics() {
    let (world, ids) = setup();
    populate(&world, 10);
    world.query_with_exclusion(&[ids.position], &[42]);
}
