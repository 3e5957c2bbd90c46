//! # Tessera
//!
//! Archetype-based Entity-Component-System store for 2D games.
//!
//! ## Design Goals
//! - Archetype-based storage for cache efficiency
//! - Versioned entity handles that never resolve once stale
//! - Structural changes deferred while iteration is in progress
//! - Safe, explicit data access behind one reader/writer lock
//!
//! ## Usage
//! ```
//! use tessera::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut registry = ComponentRegistry::new();
//! let position = registry.register::<Position>();
//!
//! let world = World::new(registry);
//! let entity = world.create_entity();
//! world.add_component(entity, Position { x: 0.0, y: 0.0 });
//!
//! assert_eq!(world.query_all(&[position]), vec![entity]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core ECS types

pub use engine::manager::{
    World,
    WorldData,
    Change,
    FlushReport,
    ComponentRef,
    ComponentMut,
};

pub use engine::entity::{
    Entity,
    EntityLocation,
};

pub use engine::component::{
    Bundle,
    Component,
    ComponentDesc,
    ComponentRegistry,
};

pub use engine::archetype::{Archetype, ArchetypeMatch};

pub use engine::query::{Query, QueryBuilder};

pub use engine::systems::{FnSystem, System};
pub use engine::scheduler::{FrameStage, Schedule};

pub use engine::commands::Command;

pub use engine::config::WorldConfig;

pub use engine::error::{
    ECSResult,
    ECSError,
    RegistryError,
    AttributeError,
    MoveError,
};

pub use engine::types::{
    ArchetypeID,
    ComponentID,
    EntityID,
    QuerySignature,
    Signature,
    Tick,
    EMPTY_ARCHETYPE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Bundle,
        Change,
        ComponentID,
        ComponentRegistry,
        Entity,
        FnSystem,
        Query,
        QueryBuilder,
        Schedule,
        System,
        World,
        WorldConfig,
    };
}
