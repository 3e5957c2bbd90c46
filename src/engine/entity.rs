//! Entity handles and the slot allocator that tracks where each entity lives.
//!
//! An [`Entity`] is a packed `(index, version)` pair. The [`Entities`]
//! allocator owns, per slot:
//!
//! - the current version,
//! - whether the slot is alive,
//! - the entity's [`EntityLocation`] (archetype + row).
//!
//! Releasing a slot bumps its version, so any handle minted before the
//! release stops resolving. Slots are recycled through a free list.

use std::fmt;

use crate::engine::types::{
    ArchetypeID, EntityCount, EntityID, IndexID, RowID, VersionID, INDEX_BITS, INDEX_CAP, INDEX_MASK,
};
use crate::engine::error::{ECSError, ECSResult};


/// Opaque handle to one game object.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(EntityID);

#[inline]
const fn make_id(index: IndexID, version: VersionID) -> EntityID {
    ((version as EntityID) << INDEX_BITS) | (index as EntityID)
}

impl Entity {
    /// Builds a handle from its parts.
    #[inline]
    pub const fn new(index: IndexID, version: VersionID) -> Self {
        Entity(make_id(index, version))
    }

    /// Slot index.
    #[inline] pub const fn index(self) -> IndexID { (self.0 & INDEX_MASK) as IndexID }
    /// Generation of the slot this handle was minted for.
    #[inline] pub const fn version(self) -> VersionID { (self.0 >> INDEX_BITS) as VersionID }
    /// Packed representation.
    #[inline] pub const fn to_bits(self) -> EntityID { self.0 }
    /// Rebuilds a handle from [`Entity::to_bits`].
    #[inline] pub const fn from_bits(bits: EntityID) -> Self { Entity(bits) }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.version())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.version())
    }
}

/// Where a live entity's row currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeID,
    /// Row inside that archetype.
    pub row: RowID,
}

/// Slot allocator and location table.
///
/// ## Invariants
/// - `versions`, `alive` and `locations` always have the same length.
/// - Every index in `free_store` refers to a dead slot.
/// - `live` equals the number of `true` entries in `alive`.

#[derive(Debug)]
pub struct Entities {
    versions: Vec<VersionID>,
    free_store: Vec<IndexID>,
    alive: Vec<bool>,
    locations: Vec<EntityLocation>,
    live: EntityCount,
    growth: u32,
}

impl Default for Entities {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Entities {
    /// Creates an empty allocator that grows by `growth` slots at a time.
    pub fn new(growth: u32) -> Self {
        Self {
            versions: Vec::new(),
            free_store: Vec::new(),
            alive: Vec::new(),
            locations: Vec::new(),
            live: 0,
            growth: growth.max(1),
        }
    }

    fn ensure_capacity(&mut self, additional_entities: u32) -> ECSResult<()> {
        if additional_entities == 0 { return Ok(()); }

        let current_entity_count = self.versions.len() as u64;
        let capacity = INDEX_CAP as u64 + 1;
        let entities_needed = (current_entity_count + additional_entities as u64).min(capacity);
        if entities_needed <= current_entity_count {
            return Err(ECSError::EntityCapacity { entities_needed: current_entity_count + 1, capacity });
        }

        self.versions.resize(entities_needed as usize, 0);
        self.alive.resize(entities_needed as usize, false);
        self.locations.resize(entities_needed as usize, EntityLocation::default());

        // Reversed so the lowest fresh index is handed out first.
        for index in (current_entity_count..entities_needed).rev() {
            self.free_store.push(index as IndexID);
        }
        Ok(())
    }

    /// Allocates a slot and records `location` for it.
    pub fn spawn(&mut self, location: EntityLocation) -> ECSResult<Entity> {
        let index = match self.free_store.pop() {
            Some(index) => index,
            None => {
                self.ensure_capacity(self.growth)?;
                self.free_store
                    .pop()
                    .ok_or_else(|| ECSError::Invariant("capacity added must yield a slot".into()))?
            }
        };

        let slot = index as usize;
        let version = self.versions[slot];
        self.alive[slot] = true;
        self.locations[slot] = location;
        self.live += 1;

        Ok(Entity::new(index, version))
    }

    /// Releases the slot of `entity`. Returns `false` for stale or dead handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let index = entity.index() as usize;
        self.versions[index] = self.versions[index].wrapping_add(1);
        self.alive[index] = false;
        self.locations[index] = EntityLocation::default();
        self.free_store.push(entity.index());
        self.live -= 1;
        true
    }

    /// Returns `true` if `entity` refers to a live slot at the same version.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        index < self.versions.len()
            && self.alive[index]
            && self.versions[index] == entity.version()
    }

    /// Location of a live entity.
    pub fn get_location(&self, entity: Entity) -> Option<EntityLocation> {
        if self.is_alive(entity) {
            Some(self.locations[entity.index() as usize])
        } else {
            None
        }
    }

    /// Updates the location of a live entity.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        debug_assert!(
            self.is_alive(entity),
            "set_location was called on a dead or stale entity. Entity: {:?}, Location: {:?}",
            entity, location
        );
        if self.is_alive(entity) {
            self.locations[entity.index() as usize] = location;
        }
    }

    /// Number of live entities.
    pub fn live_count(&self) -> EntityCount {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_packs_index_and_version() {
        let entity = Entity::new(42, 7);
        assert_eq!(entity.index(), 42);
        assert_eq!(entity.version(), 7);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
    }

    #[test]
    fn released_slot_is_reused_with_new_version() {
        let mut entities = Entities::new(4);
        let first = entities.spawn(EntityLocation::default()).unwrap();
        assert_eq!(first.index(), 0);
        assert!(entities.despawn(first));
        assert!(!entities.despawn(first));

        let second = entities.spawn(EntityLocation::default()).unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.version(), first.version());
        assert!(!entities.is_alive(first));
        assert!(entities.is_alive(second));
        assert_eq!(entities.get_location(first), None);
    }

    #[test]
    fn allocator_grows_in_steps() {
        let mut entities = Entities::new(2);
        let spawned: Vec<_> = (0..5)
            .map(|_| entities.spawn(EntityLocation::default()).unwrap())
            .collect();
        let indices: Vec<_> = spawned.iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(entities.live_count(), 5);
    }
}
