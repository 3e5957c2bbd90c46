//! # Commands
//!
//! Deferred structural changes recorded while iteration is in progress.
//!
//! ## Purpose
//! While any iteration over the world is active, structural mutations
//! (component additions and removals) cannot be applied without invalidating
//! the row indices an iterator is walking. They are recorded as [`Command`]
//! values instead and applied at the next synchronization point: the end of
//! the outermost iteration, or an explicit `World::flush`.
//!
//! Entity removals are always deferred, whether or not iteration is active,
//! and are kept in a separate list that is processed after the commands.
//!
//! ## Invariants
//! - Commands are applied in the order they were recorded.
//! - A command addressed to an entity that is dead at apply time is ignored.
//! - For the same (entity, component), the last recorded command wins.

use std::any::Any;

use crate::engine::entity::Entity;
use crate::engine::types::ComponentID;
use crate::engine::component::Bundle;


/// A recorded structural mutation.
pub enum Command {
    /// Adds one component to an existing entity.
    ///
    /// ## Behavior
    /// - Moves the entity to the archetype that includes `component_id`.
    /// - Ignored if the entity already has the component at apply time.
    Add {
        /// Target entity receiving the component.
        entity: Entity,
        /// Identifier of the component type to add.
        component_id: ComponentID,
        /// Component value; must match the registered type of `component_id`.
        value: Box<dyn Any + Send>,
    },

    /// Adds every component of a bundle in one migration.
    ///
    /// Recorded by `World::spawn` during iteration: the entity is allocated
    /// immediately in the empty archetype and receives its components here.
    Insert {
        /// Target entity.
        entity: Entity,
        /// Components to add. Ids the entity already has are skipped.
        bundle: Bundle,
    },

    /// Removes components from an existing entity in one migration.
    ///
    /// Ids the entity does not have are skipped. Removing every component
    /// moves the entity to the empty archetype; it stays alive.
    Remove {
        /// Target entity losing the components.
        entity: Entity,
        /// Components to remove.
        component_ids: Vec<ComponentID>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Add { entity, component_id, .. } => f
                .debug_struct("Add")
                .field("entity", entity)
                .field("component_id", component_id)
                .finish(),
            Command::Insert { entity, bundle } => f
                .debug_struct("Insert")
                .field("entity", entity)
                .field("bundle", bundle)
                .finish(),
            Command::Remove { entity, component_ids } => f
                .debug_struct("Remove")
                .field("entity", entity)
                .field("component_ids", component_ids)
                .finish(),
        }
    }
}

/// FIFO of pending structural commands plus the deferred-removal list.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
    removals: Vec<Entity>,
}

impl CommandQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a structural command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Records entities for removal at the next flush.
    pub fn push_removals(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.removals.extend(entities);
    }

    /// Number of pending structural commands.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Number of pending removals, duplicates included.
    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.removals.is_empty()
    }

    /// Takes every pending command, in submission order.
    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Takes every pending removal, in submission order.
    pub fn drain_removals(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.removals)
    }
}
