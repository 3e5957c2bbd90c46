use std::hint::black_box;

use criterion::*;

mod common;
use common::*;

fn iterate_benchmark(c: &mut Criterion) {
    let (world, ids) = make_world();
    populate(&world, ENTITIES_MED);
    let moving = Query::all(&[ids.position, ids.velocity]);

    let mut group = c.benchmark_group("iterate");

    group.bench_function("query_all_100k", |b| {
        b.iter(|| black_box(world.query(&moving).len()));
    });

    group.bench_function("for_each_snapshot_100k", |b| {
        b.iter(|| {
            let mut visited = 0usize;
            world.for_each(&moving, |_| visited += 1);
            black_box(visited);
        });
    });

    group.bench_function("for_each_mut_position_100k", |b| {
        b.iter(|| {
            world.for_each_mut::<Position, _>(&moving, |_, position| {
                position.y += 1.0;
            });
        });
    });

    group.bench_function("read_velocity_write_position_100k", |b| {
        b.iter(|| {
            world.for_each_read1_write1::<Velocity, Position, _>(&moving, |_, velocity, position| {
                position.x += velocity.dx;
                position.y += velocity.dy;
            });
        });
    });

    group.bench_function("par_for_each_mut_position_100k", |b| {
        b.iter(|| {
            world.par_for_each_mut::<Position, _>(&moving, |_, position| {
                position.x *= 0.999;
            });
        });
    });

    let without_sprite = Query::all(&[ids.position]).without(&[ids.sprite]);
    group.bench_function("query_without_sprite_100k", |b| {
        b.iter(|| black_box(world.query(&without_sprite).len()));
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
