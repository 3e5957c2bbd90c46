//! System Abstractions
//!
//! A **system** is a unit of game logic that runs once per frame against the
//! [`World`]. Systems query entities, read and write components, and request
//! structural changes; the schedule decides *when* they run relative to the
//! flush point.
//!
//! ## System Trait
//!
//! - [`System::name`] identifies the system in logs.
//! - [`System::run`] executes the system logic.
//!
//! Systems must be `Send + Sync` so a host may store them alongside a world
//! shared between threads.
//!
//! ## Function-backed Systems
//!
//! [`FnSystem`] wraps a closure or function, which avoids a dedicated type for
//! every piece of gameplay logic.

use crate::engine::manager::World;


/// A unit of executable logic operating on the world.
pub trait System: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Executes the system logic against the world.
    fn run(&self, world: &World);
}

/// A concrete [`System`] backed by a function or closure.
pub struct FnSystem<F>
where
    F: Fn(&World) + Send + Sync + 'static,
{
    name: &'static str,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&World) + Send + Sync + 'static,
{
    /// Creates a new function-backed system.
    ///
    /// # Parameters
    /// - `name`: Human-readable name, useful for debugging and profiling.
    /// - `f`: The function or closure executed when the system runs.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&World) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, world: &World) {
        (self.f)(world)
    }
}
