use std::hint::black_box;

use criterion::*;

mod common;
use common::*;

fn migrate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("migrate");

    group.bench_function("add_remove_sprite_10k", |b| {
        b.iter_batched(
            || {
                let (world, ids) = make_world();
                let entities = populate(&world, ENTITIES_SMALL);
                (world, ids, entities)
            },
            |(world, ids, entities)| {
                for &entity in &entities {
                    world.add_component(entity, Sprite { frame: 1 });
                }
                for &entity in &entities {
                    world.remove_component(entity, ids.sprite);
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("deferred_tagging_10k", |b| {
        b.iter_batched(
            || {
                let (world, ids) = make_world();
                populate(&world, ENTITIES_SMALL);
                (world, ids)
            },
            |(world, ids)| {
                world.for_each(&Query::all(&[ids.position]).without(&[ids.sprite]), |entity| {
                    world.add_component(entity, Sprite { frame: 2 });
                });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, migrate_benchmark);
criterion_main!(benches);
