//! Per-frame system execution.
//!
//! A [`Schedule`] drives one frame of the game loop:
//!
//! 1. **Update**: every update system runs, in insertion order. Systems query
//!    the world and request structural changes.
//! 2. **Flush**: queued structural changes and deferred entity removals are
//!    applied.
//! 3. **Draw**: every draw system runs, in insertion order, against the
//!    settled world. Draw systems are expected to be read-only.
//!
//! ## Structural synchronization
//!
//! The flush between the two phases is the only point at which removals take
//! effect, so draw systems never observe an entity that was removed during
//! update, and update systems never see rows move under them.

use crate::engine::manager::{FlushReport, World};
use crate::engine::systems::System;
use crate::engine::types::Tick;


/// Phase of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Gameplay logic; may request structural changes.
    Update,
    /// Application of queued changes and removals.
    Flush,
    /// Rendering-side consumers; read-only by convention.
    Draw,
}

/// Ordered update and draw systems plus the frame counter.
#[derive(Default)]
pub struct Schedule {
    update: Vec<Box<dyn System>>,
    draw: Vec<Box<dyn System>>,
    tick: Tick,
}

impl Schedule {
    /// Creates an empty schedule at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system to the update phase.
    pub fn add_update(&mut self, system: impl System + 'static) -> &mut Self {
        self.update.push(Box::new(system));
        self
    }

    /// Appends a system to the draw phase.
    pub fn add_draw(&mut self, system: impl System + 'static) -> &mut Self {
        self.draw.push(Box::new(system));
        self
    }

    /// Number of frames run so far.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Systems registered for `stage`. The flush stage has none.
    pub fn systems(&self, stage: FrameStage) -> impl Iterator<Item = &str> {
        let systems: &[Box<dyn System>] = match stage {
            FrameStage::Update => &self.update,
            FrameStage::Draw => &self.draw,
            FrameStage::Flush => &[],
        };
        systems.iter().map(|system| system.name())
    }

    /// Runs one frame: update, flush, draw.
    ///
    /// ## Returns
    /// What the flush applied.

    pub fn run_frame(&mut self, world: &World) -> FlushReport {
        let _span = tracing::trace_span!("frame", tick = self.tick).entered();

        for system in &self.update {
            tracing::trace!(system = system.name(), stage = ?FrameStage::Update, "running system");
            system.run(world);
        }

        let report = world.flush();

        for system in &self.draw {
            tracing::trace!(system = system.name(), stage = ?FrameStage::Draw, "running system");
            system.run(world);
        }

        self.tick += 1;
        report
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("update", &self.systems(FrameStage::Update).collect::<Vec<_>>())
            .field("draw", &self.systems(FrameStage::Draw).collect::<Vec<_>>())
            .field("tick", &self.tick)
            .finish()
    }
}
