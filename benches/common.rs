#![allow(dead_code)]

use tessera::prelude::*;

pub const ENTITIES_SMALL: usize = 10_000;
pub const ENTITIES_MED: usize = 100_000;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Sprite {
    pub frame: u16,
}

pub struct Ids {
    pub position: ComponentID,
    pub velocity: ComponentID,
    pub sprite: ComponentID,
}

pub fn make_world() -> (World, Ids) {
    let mut registry = ComponentRegistry::new();
    let ids = Ids {
        position: registry.register::<Position>(),
        velocity: registry.register::<Velocity>(),
        sprite: registry.register::<Sprite>(),
    };
    (World::new(registry), ids)
}

/// Spawns `count` moving entities; every fourth one also carries a sprite.
pub fn populate(world: &World, count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            let mut bundle = Bundle::new()
                .with(world.registry(), Position { x: i as f32, y: 0.0 })
                .with(world.registry(), Velocity { dx: 1.0, dy: 0.5 });
            if i % 4 == 0 {
                bundle = bundle.with(world.registry(), Sprite { frame: 0 });
            }
            world.spawn(bundle)
        })
        .collect()
}
