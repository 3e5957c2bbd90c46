//! World management and execution layer.
//!
//! This module defines the central orchestration layer of the ECS, responsible
//! for:
//!
//! * owning archetypes and their component storage,
//! * coordinating entity movement between archetypes,
//! * deferring structural mutations while iteration is in progress,
//! * providing shared and exclusive access to world state.
//!
//! ## Concurrency model
//!
//! [`World`] is `Sync`. All archetype, entity and column state lives in a
//! [`WorldData`] behind one `parking_lot::RwLock`:
//!
//! * reads (`get_component`, queries) take a recursive read lock,
//! * writes (`create_entity`, immediate structural changes, `flush`,
//!   `get_component_mut`, typed column iteration) take the write lock.
//!
//! The command queue has its own mutex, so structural changes can be queued
//! while the world lock is held by a typed iteration.
//!
//! ## Deferral
//!
//! While any iteration is active ([`World::for_each`] and the typed
//! `for_each_*` methods), `add_component`, `remove_component(s)` and the
//! component part of `spawn` are queued instead of applied. The queue is
//! applied when the outermost iteration ends, in submission order, so the
//! last submission for a given (entity, component) wins. The ending
//! iteration takes the write lock before it releases its depth, so an
//! immediate change from another thread waits until the queue is applied.
//!
//! Entity removal is always deferred to [`World::flush`].
//!
//! ## References into storage
//!
//! [`ComponentRef`] and [`ComponentMut`] hold the world lock. Drop them
//! before issuing a structural change from the same thread: the row they
//! point at may move when any entity of the same archetype migrates.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use rayon::prelude::*;

use crate::engine::archetype::{Archetype, ArchetypeMatch};
use crate::engine::borrow::IterationTracker;
use crate::engine::commands::{Command, CommandQueue};
use crate::engine::component::{Bundle, Component, ComponentRegistry, DynamicBundle};
use crate::engine::config::WorldConfig;
use crate::engine::entity::{Entities, Entity, EntityLocation};
use crate::engine::error::{ECSError, ECSResult, MoveError};
use crate::engine::query::{Query, QueryBuilder};
use crate::engine::types::{
    ArchetypeID, ComponentID, EntityCount, QuerySignature, RowID, Signature, EMPTY_ARCHETYPE,
};


/// Shared reference to a component value. Holds the world's read lock.
pub type ComponentRef<'a, T> = MappedRwLockReadGuard<'a, T>;

/// Exclusive reference to a component value. Holds the world's write lock.
pub type ComponentMut<'a, T> = MappedRwLockWriteGuard<'a, T>;

/// Outcome of a structural change request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    /// The change was applied before the call returned.
    Applied,
    /// Iteration is in progress; the change will be applied at the next flush.
    Queued,
    /// Nothing to do: stale entity, duplicate add, or absent component.
    Ignored,
}

/// Counts produced by a flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Queued structural changes that took effect.
    pub applied: usize,
    /// Queued structural changes that were no-ops at apply time.
    pub ignored: usize,
    /// Entities physically removed.
    pub removed: usize,
}

impl FlushReport {
    /// Returns `true` if the flush did nothing.
    pub fn is_empty(&self) -> bool {
        self.applied == 0 && self.ignored == 0 && self.removed == 0
    }
}

/// Logs and panics on an internal invariant violation.
#[cold]
fn corruption(error: impl Display) -> ! {
    tracing::error!(%error, "ECS invariant violated");
    panic!("ECS corruption detected: {error}");
}

/// Unwraps a storage result at the world boundary.
///
/// Registry and capacity errors are programmer/usage errors and panic with
/// their own message; everything else is treated as corruption.
fn escalate<T>(result: ECSResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error @ (ECSError::Registry(_) | ECSError::EntityCapacity { .. })) => panic!("{error}"),
        Err(error) => corruption(error),
    }
}

/// Core ECS storage.
///
/// ## Responsibilities
/// * Owns all archetypes and their component storage
/// * Maps signatures to archetype IDs
/// * Manages entity placement across archetypes
///
/// ## Invariants
/// * `signature_map` and `archetypes` remain consistent; `archetypes[i]` has id `i`.
/// * Archetype `EMPTY_ARCHETYPE` always exists and has the empty signature.
/// * Every live entity is stored in exactly one archetype, at the row its
///   location records.

pub struct WorldData {
    registry: Arc<ComponentRegistry>,
    config: WorldConfig,
    archetypes: Vec<Archetype>,
    signature_map: HashMap<Signature, ArchetypeID>,
    entities: Entities,
}

impl WorldData {
    /// Creates storage pre-seeded with the empty archetype.
    pub fn new(registry: Arc<ComponentRegistry>, config: WorldConfig) -> ECSResult<Self> {
        let mut data = Self {
            registry,
            config,
            archetypes: Vec::new(),
            signature_map: HashMap::new(),
            entities: Entities::new(config.entity_growth),
        };
        let empty = data.get_or_create_archetype(&Signature::default())?;
        debug_assert_eq!(empty, EMPTY_ARCHETYPE);
        Ok(data)
    }

    /// Retrieves the archetype matching `signature`, creating it if necessary.
    ///
    /// ## Semantics
    /// Archetypes are created lazily and assigned monotonically increasing IDs.
    ///
    /// ## Complexity
    /// Amortized O(1).

    fn get_or_create_archetype(&mut self, signature: &Signature) -> ECSResult<ArchetypeID> {
        if let Some(&id) = self.signature_map.get(signature) {
            return Ok(id);
        }

        let id = ArchetypeID::try_from(self.archetypes.len())
            .map_err(|_| ECSError::Invariant("archetype id space exhausted".into()))?;
        let archetype = Archetype::new(id, *signature, &self.registry, self.config.initial_archetype_capacity)?;

        tracing::debug!(
            archetype = id,
            components = ?archetype.component_ids(),
            "created archetype"
        );

        self.signature_map.insert(*signature, id);
        self.archetypes.push(archetype);
        Ok(id)
    }

    /// Returns mutable references to two distinct archetypes.
    ///
    /// ## Panics
    /// Panics if `a == b`.

    #[inline]
    fn get_archetype_pair_mut(
        archetypes: &mut [Archetype],
        a: ArchetypeID,
        b: ArchetypeID,
    ) -> (&mut Archetype, &mut Archetype) {
        assert!(a != b);

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = archetypes.split_at_mut(high as usize);

        let left = &mut head[low as usize];
        let right = &mut tail[0];

        if a < b { (left, right) } else { (right, left) }
    }

    /// Allocates an entity in the empty archetype.
    pub fn create_entity(&mut self) -> ECSResult<Entity> {
        let archetype = &mut self.archetypes[EMPTY_ARCHETYPE as usize];
        let row = RowID::try_from(archetype.len()).map_err(|_| MoveError::RowOutOfBounds {
            archetype: EMPTY_ARCHETYPE,
            row: RowID::MAX,
        })?;

        let entity = self.entities.spawn(EntityLocation { archetype: EMPTY_ARCHETYPE, row })?;
        let placed = archetype.add_empty_row(entity)?;
        debug_assert_eq!(placed, row);
        Ok(entity)
    }

    /// Allocates an entity directly in the archetype of `bundle`.
    pub fn spawn_bundle(&mut self, mut bundle: Bundle) -> ECSResult<Entity> {
        let archetype_id = self.get_or_create_archetype(&bundle.signature())?;
        let archetype = &mut self.archetypes[archetype_id as usize];
        let row = RowID::try_from(archetype.len()).map_err(|_| MoveError::RowOutOfBounds {
            archetype: archetype_id,
            row: RowID::MAX,
        })?;

        let entity = self.entities.spawn(EntityLocation { archetype: archetype_id, row })?;
        let placed = archetype.spawn_row(entity, &mut bundle)?;
        debug_assert_eq!(placed, row);
        Ok(entity)
    }

    /// Moves `entity` from `location` to `destination_id`, appending `added`.
    fn migrate(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        destination_id: ArchetypeID,
        added: Vec<(ComponentID, Box<dyn Any + Send>)>,
    ) -> Result<(), MoveError> {
        let (source, destination) =
            Self::get_archetype_pair_mut(&mut self.archetypes, location.archetype, destination_id);

        let moved = source.move_row_to(destination, location.row, added)?;

        self.entities.set_location(
            entity,
            EntityLocation { archetype: destination_id, row: moved.destination_row },
        );
        if let Some(swapped) = moved.swapped {
            self.entities.set_location(swapped, location);
        }
        Ok(())
    }

    /// Adds a component to an entity, migrating it to a new archetype.
    ///
    /// ## Behavior
    /// 1. The entity's current location is retrieved; stale entities are ignored.
    /// 2. If the entity already has `component_id`, nothing happens.
    /// 3. The destination archetype is taken from the source's add edge, or
    ///    found/created from the extended signature and cached on the edge.
    /// 4. The row is migrated: shared components are moved, the new value is
    ///    appended, the source row is closed by swap-with-last.
    ///
    /// ## Errors
    /// Any error indicates corrupted storage.

    pub fn add_component(
        &mut self,
        entity: Entity,
        component_id: ComponentID,
        value: Box<dyn Any + Send>,
    ) -> ECSResult<Change> {
        let Some(location) = self.entities.get_location(entity) else {
            tracing::trace!(%entity, component_id, "add_component on stale entity ignored");
            return Ok(Change::Ignored);
        };

        let source = &self.archetypes[location.archetype as usize];
        if source.has_component(component_id) {
            tracing::debug!(
                %entity,
                component = self.registry.name_of(component_id),
                "duplicate component add ignored"
            );
            return Ok(Change::Ignored);
        }

        let destination_id = match source.add_edge(component_id) {
            Some(destination_id) => destination_id,
            None => {
                let signature = source.signature().with(component_id);
                let destination_id = self.get_or_create_archetype(&signature)?;
                self.archetypes[location.archetype as usize].set_add_edge(component_id, destination_id);
                self.archetypes[destination_id as usize].set_remove_edge(component_id, location.archetype);
                destination_id
            }
        };

        self.migrate(entity, location, destination_id, vec![(component_id, value)])?;
        Ok(Change::Applied)
    }

    /// Adds every component of `bundle` the entity does not already have, in
    /// one migration.
    pub fn insert_bundle(&mut self, entity: Entity, mut bundle: Bundle) -> ECSResult<Change> {
        let Some(location) = self.entities.get_location(entity) else {
            tracing::trace!(%entity, "insert on stale entity ignored");
            return Ok(Change::Ignored);
        };

        let source_signature = *self.archetypes[location.archetype as usize].signature();
        let mut signature = source_signature;
        let mut added = Vec::with_capacity(bundle.len());

        let component_ids: Vec<ComponentID> = bundle.component_ids().collect();
        for component_id in component_ids {
            if source_signature.has(component_id) {
                tracing::debug!(
                    %entity,
                    component = self.registry.name_of(component_id),
                    "duplicate component add ignored"
                );
                continue;
            }
            if let Some(value) = bundle.take(component_id) {
                signature.set(component_id);
                added.push((component_id, value));
            }
        }

        if added.is_empty() {
            return Ok(Change::Ignored);
        }

        let destination_id = self.get_or_create_archetype(&signature)?;
        self.migrate(entity, location, destination_id, added)?;
        Ok(Change::Applied)
    }

    /// Removes components from an entity in one migration.
    ///
    /// Ids the entity does not have are skipped. Removing the last component
    /// moves the entity to the empty archetype; it stays alive.

    pub fn remove_components(&mut self, entity: Entity, component_ids: &[ComponentID]) -> ECSResult<Change> {
        let Some(location) = self.entities.get_location(entity) else {
            tracing::trace!(%entity, "remove_components on stale entity ignored");
            return Ok(Change::Ignored);
        };

        let source = &self.archetypes[location.archetype as usize];
        let present: Vec<ComponentID> = component_ids
            .iter()
            .copied()
            .filter(|&component_id| source.has_component(component_id))
            .collect();

        let destination_id = match present.as_slice() {
            [] => return Ok(Change::Ignored),
            [single] => match source.remove_edge(*single) {
                Some(destination_id) => destination_id,
                None => {
                    let signature = source.signature().without(*single);
                    let destination_id = self.get_or_create_archetype(&signature)?;
                    self.archetypes[location.archetype as usize].set_remove_edge(*single, destination_id);
                    self.archetypes[destination_id as usize].set_add_edge(*single, location.archetype);
                    destination_id
                }
            },
            many => {
                let mut signature = *source.signature();
                for &component_id in many {
                    signature.clear(component_id);
                }
                self.get_or_create_archetype(&signature)?
            }
        };

        self.migrate(entity, location, destination_id, Vec::new())?;
        Ok(Change::Applied)
    }

    /// Removes `entity` and its row. Returns `false` for stale entities.
    ///
    /// The archetype's last row is swapped into the vacated row and that
    /// entity's location is updated.

    pub fn despawn(&mut self, entity: Entity) -> ECSResult<bool> {
        let Some(location) = self.entities.get_location(entity) else {
            return Ok(false);
        };

        let swapped = self.archetypes[location.archetype as usize].remove_row(location.row)?;
        if let Some(swapped) = swapped {
            self.entities.set_location(swapped, location);
        }
        Ok(self.entities.despawn(entity))
    }

    /// Applies one queued command.
    pub fn apply(&mut self, command: Command) -> ECSResult<Change> {
        match command {
            Command::Add { entity, component_id, value } => self.add_component(entity, component_id, value),
            Command::Insert { entity, bundle } => self.insert_bundle(entity, bundle),
            Command::Remove { entity, component_ids } => self.remove_components(entity, &component_ids),
        }
    }

    /// Typed component value of a live entity.
    pub fn get<T: Component>(&self, entity: Entity, component_id: ComponentID) -> Option<&T> {
        let location = self.entities.get_location(entity)?;
        self.archetypes[location.archetype as usize].get::<T>(component_id, location.row)
    }

    /// Mutable typed component value of a live entity.
    pub fn get_mut<T: Component>(&mut self, entity: Entity, component_id: ComponentID) -> Option<&mut T> {
        let location = self.entities.get_location(entity)?;
        self.archetypes[location.archetype as usize].get_mut::<T>(component_id, location.row)
    }

    /// Type-erased component value of a live entity.
    pub fn get_dyn(&self, entity: Entity, component_id: ComponentID) -> Option<&dyn Any> {
        let location = self.entities.get_location(entity)?;
        self.archetypes[location.archetype as usize].get_dyn(component_id, location.row)
    }

    /// Returns `true` if `entity` is live and has `component_id`.
    pub fn has_component(&self, entity: Entity, component_id: ComponentID) -> bool {
        self.entities
            .get_location(entity)
            .is_some_and(|location| self.archetypes[location.archetype as usize].has_component(component_id))
    }

    /// Component ids of a live entity, ascending.
    pub fn component_ids_of(&self, entity: Entity) -> Option<Vec<ComponentID>> {
        let location = self.entities.get_location(entity)?;
        Some(self.archetypes[location.archetype as usize].component_ids().to_vec())
    }

    /// Location of a live entity.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.get_location(entity)
    }

    /// Returns `true` if `entity` refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> EntityCount {
        self.entities.live_count()
    }

    /// Archetype by id.
    pub fn archetype(&self, archetype_id: ArchetypeID) -> Option<&Archetype> {
        self.archetypes.get(archetype_id as usize)
    }

    /// All archetypes, in id order.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Archetype whose signature is exactly `signature`.
    pub fn archetype_for(&self, signature: &Signature) -> Option<&Archetype> {
        let &id = self.signature_map.get(signature)?;
        self.archetypes.get(id as usize)
    }

    /// Returns archetypes matching a query signature.
    ///
    /// Exact queries resolve through the signature map in O(1); all others
    /// scan every archetype once.

    pub fn matching_archetypes(&self, query: &QuerySignature) -> Vec<ArchetypeMatch> {
        if query.exact {
            return self
                .archetype_for(&query.all)
                .map(|a| ArchetypeMatch { archetype_id: a.archetype_id(), length: a.len() })
                .into_iter()
                .collect();
        }

        self.archetypes
            .iter()
            .filter(|a| a.matches(query))
            .map(|a| ArchetypeMatch { archetype_id: a.archetype_id(), length: a.len() })
            .collect()
    }

    /// Snapshot of every entity matching `query`.
    pub fn query_entities(&self, query: &Query) -> Vec<Entity> {
        let matches = self.matching_archetypes(query.signature());
        let total = matches.iter().map(|m| m.length).sum();
        let mut entities = Vec::with_capacity(total);
        for m in matches {
            entities.extend_from_slice(self.archetypes[m.archetype_id as usize].entities());
        }
        entities
    }

    /// Snapshot of entities matching `query` whose `T` value is not one of
    /// `tags`. Entities without a `T` column are kept.
    pub fn query_excluding_tags<T: Component + PartialEq>(
        &self,
        query: &Query,
        tag_id: ComponentID,
        tags: &[T],
    ) -> Vec<Entity> {
        let mut entities = Vec::new();
        for m in self.matching_archetypes(query.signature()) {
            let archetype = &self.archetypes[m.archetype_id as usize];
            match archetype.attribute::<T>(tag_id) {
                Some(column) => entities.extend(
                    archetype
                        .entities()
                        .iter()
                        .zip(column.iter())
                        .filter(|(_, value)| !tags.contains(*value))
                        .map(|(&entity, _)| entity),
                ),
                None => entities.extend_from_slice(archetype.entities()),
            }
        }
        entities
    }

    /// Checks the storage invariants.
    ///
    /// ## Checks
    /// * every archetype's columns have as many rows as it has entities,
    /// * `signature_map` resolves each archetype's signature to its id,
    /// * every stored entity is live and its location points at its row,
    /// * the stored entity total equals the live count (no entity in two places).

    pub fn validate(&self) -> ECSResult<()> {
        if self.archetype_for(&Signature::default()).map(Archetype::archetype_id) != Some(EMPTY_ARCHETYPE) {
            return Err(ECSError::Invariant("empty archetype missing".into()));
        }

        let mut stored = 0usize;
        for (index, archetype) in self.archetypes.iter().enumerate() {
            let id = archetype.archetype_id();
            if id as usize != index {
                return Err(ECSError::Invariant(format!("archetype {id} stored at index {index}")));
            }
            archetype.verify_alignment()?;
            if self.signature_map.get(archetype.signature()) != Some(&id) {
                return Err(ECSError::Invariant(format!("archetype {id} missing from signature map")));
            }

            for (row, &entity) in archetype.entities().iter().enumerate() {
                let expected = EntityLocation { archetype: id, row: row as RowID };
                match self.entities.get_location(entity) {
                    Some(location) if location == expected => {}
                    Some(location) => {
                        return Err(ECSError::Invariant(format!(
                            "entity {entity} stored at {expected:?} but located at {location:?}"
                        )));
                    }
                    None => {
                        return Err(ECSError::Invariant(format!(
                            "dead entity {entity} stored in archetype {id}"
                        )));
                    }
                }
            }
            stored += archetype.len();
        }

        let live = self.entities.live_count() as usize;
        if stored != live {
            return Err(ECSError::Invariant(format!("{stored} stored rows for {live} live entities")));
        }
        Ok(())
    }
}

/// Thread-safe entry point to the ECS.
///
/// ## Role
/// `World` owns the frozen component registry, the storage lock, the
/// command queue and the iteration tracker. Every operation re-resolves the
/// entity's current location.
///
/// ## Failure policy
/// * Stale entities and absent components are not errors: lookups return
///   `None`, structural changes return [`Change::Ignored`].
/// * Unregistered component types panic with the type name.
/// * Corrupted storage is logged at `error` and panics.

pub struct World {
    registry: Arc<ComponentRegistry>,
    data: RwLock<WorldData>,
    queue: Mutex<CommandQueue>,
    iteration: IterationTracker,
}

impl World {
    /// Creates a world with the default configuration.
    ///
    /// Freezes `registry`; every component type must be registered first.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_config(registry, WorldConfig::default())
    }

    /// Creates a world with an explicit configuration.
    pub fn with_config(mut registry: ComponentRegistry, config: WorldConfig) -> Self {
        registry.freeze();
        let registry = Arc::new(registry);
        let data = escalate(WorldData::new(Arc::clone(&registry), config));

        tracing::debug!(components = registry.len(), ?config, "world created");

        Self {
            registry,
            data: RwLock::new(data),
            queue: Mutex::new(CommandQueue::new()),
            iteration: IterationTracker::new(),
        }
    }

    /// The frozen component registry.
    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Id of registered component type `T`.
    ///
    /// ## Panics
    /// If `T` is not registered.
    #[inline]
    pub fn component_id<T: Component>(&self) -> ComponentID {
        self.registry.require_id_of::<T>()
    }

    /// Starts a typed query.
    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.registry)
    }

    fn read(&self, operation: &str) -> RwLockReadGuard<'_, WorldData> {
        self.iteration.assert_not_reentrant(operation);
        self.data.read_recursive()
    }

    fn write(&self, operation: &str) -> RwLockWriteGuard<'_, WorldData> {
        self.iteration.assert_not_reentrant(operation);
        self.data.write()
    }

    /// Creates an entity with no components.
    pub fn create_entity(&self) -> Entity {
        escalate(self.write("create_entity").create_entity())
    }

    /// Creates an entity holding every component of `bundle`.
    ///
    /// The entity is placed directly in its final archetype. While iteration
    /// is active it is created empty and its components are queued.

    pub fn spawn(&self, bundle: Bundle) -> Entity {
        if self.iteration.is_iterating() {
            let entity = self.create_entity();
            if !bundle.is_empty() {
                self.queue.lock().push(Command::Insert { entity, bundle });
            }
            return entity;
        }
        escalate(self.write("spawn").spawn_bundle(bundle))
    }

    /// Adds every component of `bundle` that `entity` does not already have.
    pub fn insert(&self, entity: Entity, bundle: Bundle) -> Change {
        if self.iteration.is_iterating() {
            self.queue.lock().push(Command::Insert { entity, bundle });
            return Change::Queued;
        }
        escalate(self.write("insert").insert_bundle(entity, bundle))
    }

    /// Adds component `value` to `entity`.
    ///
    /// ## Returns
    /// * `Applied` once the entity has migrated,
    /// * `Queued` while iteration is active (liveness is checked at apply time),
    /// * `Ignored` for stale entities and components the entity already has.
    ///
    /// ## Panics
    /// If `T` is not registered.

    pub fn add_component<T: Component>(&self, entity: Entity, value: T) -> Change {
        let component_id = self.registry.require_id_of::<T>();
        let value: Box<dyn Any + Send> = Box::new(value);

        if self.iteration.is_iterating() {
            self.queue.lock().push(Command::Add { entity, component_id, value });
            return Change::Queued;
        }
        escalate(self.write("add_component").add_component(entity, component_id, value))
    }

    /// Removes one component from `entity`. No-op if absent.
    pub fn remove_component(&self, entity: Entity, component_id: ComponentID) -> Change {
        self.remove_components(entity, &[component_id])
    }

    /// Removes component type `T` from `entity`.
    pub fn remove<T: Component>(&self, entity: Entity) -> Change {
        self.remove_component(entity, self.registry.require_id_of::<T>())
    }

    /// Removes several components from `entity` in one migration.
    ///
    /// ## Panics
    /// If any id was never issued by the registry.

    pub fn remove_components(&self, entity: Entity, component_ids: &[ComponentID]) -> Change {
        self.registry.assert_registered(component_ids);

        if self.iteration.is_iterating() {
            self.queue.lock().push(Command::Remove { entity, component_ids: component_ids.to_vec() });
            return Change::Queued;
        }
        escalate(self.write("remove_components").remove_components(entity, component_ids))
    }

    /// Marks `entity` for removal at the next flush.
    pub fn remove_entity(&self, entity: Entity) {
        self.queue.lock().push_removals([entity]);
    }

    /// Marks every entity in `entities` for removal at the next flush.
    pub fn batch_remove_entities(&self, entities: &[Entity]) {
        self.queue.lock().push_removals(entities.iter().copied());
    }

    /// Applies queued structural changes, then deferred removals.
    ///
    /// ## Behavior
    /// * Refuses while any iteration is active: logs a warning and returns an
    ///   empty report.
    /// * Commands apply in submission order; commands addressed to entities
    ///   that are dead by then are ignored.
    /// * Removals of stale or duplicate handles are skipped.

    pub fn flush(&self) -> FlushReport {
        match self.try_flush() {
            Some(report) => report,
            None => {
                tracing::warn!(
                    depth = self.iteration.depth(),
                    "flush requested while iteration is in progress; deferred"
                );
                FlushReport::default()
            }
        }
    }

    fn try_flush(&self) -> Option<FlushReport> {
        if self.iteration.is_iterating() {
            return None;
        }

        let (commands, removals) = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return Some(FlushReport::default());
            }
            (queue.drain_commands(), queue.drain_removals())
        };

        let mut report = FlushReport::default();
        let mut data = self.write("flush");

        for command in commands {
            match escalate(data.apply(command)) {
                Change::Ignored => report.ignored += 1,
                _ => report.applied += 1,
            }
        }

        for entity in removals {
            if escalate(data.despawn(entity)) {
                report.removed += 1;
            }
        }

        tracing::debug!(
            applied = report.applied,
            ignored = report.ignored,
            removed = report.removed,
            "flushed structural changes"
        );
        Some(report)
    }

    /// Shared reference to `entity`'s `T`, or `None` if the entity is stale or
    /// lacks `T`.
    ///
    /// The returned guard holds the world's read lock. Drop it before any
    /// call on the same thread that needs the write lock (`create_entity`,
    /// an immediate structural change, `flush`, `get_component_mut`); such a
    /// call blocks forever while the guard is alive.
    ///
    /// ## Panics
    /// If `T` is not registered.

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<ComponentRef<'_, T>> {
        let component_id = self.registry.require_id_of::<T>();
        RwLockReadGuard::try_map(self.read("get_component"), |data| data.get::<T>(entity, component_id)).ok()
    }

    /// Exclusive reference to `entity`'s `T`.
    ///
    /// The returned guard holds the world's write lock. Any other `World`
    /// call on the same thread that touches storage blocks forever until the
    /// guard is dropped. Prefer [`World::with_component_mut`], which panics
    /// on such reentry instead.
    pub fn get_component_mut<T: Component>(&self, entity: Entity) -> Option<ComponentMut<'_, T>> {
        let component_id = self.registry.require_id_of::<T>();
        RwLockWriteGuard::try_map(self.write("get_component_mut"), |data| data.get_mut::<T>(entity, component_id))
            .ok()
    }

    /// Type-erased reference to the component `component_id` of `entity`.
    pub fn get_component_dyn(&self, entity: Entity, component_id: ComponentID) -> Option<ComponentRef<'_, dyn Any>> {
        RwLockReadGuard::try_map(self.read("get_component_dyn"), |data| data.get_dyn(entity, component_id)).ok()
    }

    /// Copy of `entity`'s `T`.
    pub fn component_cloned<T: Component + Clone>(&self, entity: Entity) -> Option<T> {
        self.get_component::<T>(entity).map(|value| value.clone())
    }

    /// Runs `f` on `entity`'s `T` under the write lock.
    ///
    /// ## Panics
    /// If `f` calls a `World` method that needs the lock. Queuing removals
    /// with `remove_entity` is allowed.

    pub fn with_component_mut<T: Component, R>(&self, entity: Entity, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut value = self.get_component_mut::<T>(entity)?;
        let _exclusive = self.iteration.enter_exclusive();
        Some(f(&mut value))
    }

    /// Returns `true` if `entity` is live and has `component_id`.
    pub fn has_component(&self, entity: Entity, component_id: ComponentID) -> bool {
        self.read("has_component").has_component(entity, component_id)
    }

    /// Returns `true` if `entity` refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.read("is_alive").is_alive(entity)
    }

    /// Number of live entities, including those marked for removal.
    pub fn entity_count(&self) -> usize {
        self.read("entity_count").entity_count() as usize
    }

    /// Number of archetypes, including the empty one.
    pub fn archetype_count(&self) -> usize {
        self.read("archetype_count").archetypes().len()
    }

    /// Current archetype and row of `entity`.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.read("location").location(entity)
    }

    /// Component ids of `entity`, ascending.
    pub fn component_ids_of(&self, entity: Entity) -> Option<Vec<ComponentID>> {
        self.read("component_ids_of").component_ids_of(entity)
    }

    /// Number of queued structural changes.
    pub fn pending_changes(&self) -> usize {
        self.queue.lock().pending_commands()
    }

    /// Number of entities marked for removal.
    pub fn pending_removals(&self) -> usize {
        self.queue.lock().pending_removals()
    }

    /// Checks the storage invariants.
    pub fn validate(&self) -> ECSResult<()> {
        self.read("validate").validate()
    }

    /// Runs `f` with read access to the storage.
    pub fn inspect<R>(&self, f: impl FnOnce(&WorldData) -> R) -> R {
        f(&self.read("inspect"))
    }

    /// Snapshot of entities matching `query`.
    pub fn query(&self, query: &Query) -> Vec<Entity> {
        self.read("query").query_entities(query)
    }

    /// Entities having every component in `component_ids`.
    ///
    /// ## Panics
    /// If any id was never issued by the registry. The same holds for the
    /// other id-slice queries below.

    pub fn query_all(&self, component_ids: &[ComponentID]) -> Vec<Entity> {
        self.registry.assert_registered(component_ids);
        self.query(&Query::all(component_ids))
    }

    /// Entities having at least one component in `component_ids`.
    pub fn query_any(&self, component_ids: &[ComponentID]) -> Vec<Entity> {
        self.registry.assert_registered(component_ids);
        self.query(&Query::any(component_ids))
    }

    /// Entities whose component set is exactly `component_ids`.
    pub fn query_exact(&self, component_ids: &[ComponentID]) -> Vec<Entity> {
        self.registry.assert_registered(component_ids);
        self.query(&Query::exact(component_ids))
    }

    /// Entities having any of `include` and none of `exclude`.
    pub fn query_with_exclusion(&self, include: &[ComponentID], exclude: &[ComponentID]) -> Vec<Entity> {
        self.registry.assert_registered(include);
        self.registry.assert_registered(exclude);
        self.query(&Query::with_exclusion(include, exclude))
    }

    /// Like [`World::query_with_exclusion`], additionally dropping entities
    /// whose `T` value equals one of `tags`. Entities without `T` are kept.
    ///
    /// ## Panics
    /// If `T` is not registered.

    pub fn query_excluding_tags<T: Component + PartialEq>(
        &self,
        include: &[ComponentID],
        exclude: &[ComponentID],
        tags: &[T],
    ) -> Vec<Entity> {
        let tag_id = self.registry.require_id_of::<T>();
        self.registry.assert_registered(include);
        self.registry.assert_registered(exclude);
        self.read("query_excluding_tags")
            .query_excluding_tags(&Query::with_exclusion(include, exclude), tag_id, tags)
    }

    /// Archetype-level pass of `query`.
    pub fn matching_archetypes(&self, query: &Query) -> Vec<ArchetypeMatch> {
        self.read("matching_archetypes").matching_archetypes(query.signature())
    }

    /// Calls `f` for every entity matching `query`.
    ///
    /// ## Behavior
    /// * The matching entities are snapshotted first; `f` runs with no lock
    ///   held, so it may call any `World` method.
    /// * Structural changes issued while any iteration is active are queued;
    ///   the queue is applied when the outermost iteration returns.
    /// * Entity removals stay deferred until an explicit [`World::flush`].

    pub fn for_each<F>(&self, query: &Query, mut f: F)
    where
        F: FnMut(Entity),
    {
        let iteration = self.iteration.enter();
        for entity in self.query(query) {
            f(entity);
        }

        let mut data = self.write("for_each");
        if iteration.exit() {
            self.apply_queued(&mut data);
        }
    }

    /// Calls `f` with each matching entity and a mutable reference to its `A`.
    ///
    /// Iterates column slices directly under the write lock. From inside `f`,
    /// structural changes may be queued, but any `World` call that needs the
    /// lock panics rather than deadlocking.
    ///
    /// ## Panics
    /// If `A` is not registered, or on reentrant lock use from `f`.

    pub fn for_each_mut<A, F>(&self, query: &Query, mut f: F)
    where
        A: Component,
        F: FnMut(Entity, &mut A),
    {
        let a = self.registry.require_id_of::<A>();
        let iteration = self.iteration.enter();
        {
            let mut data = self.write("for_each_mut");
            let _exclusive = self.iteration.enter_exclusive();

            for archetype in data.archetypes.iter_mut() {
                if !archetype.has_component(a) || !query.matches(archetype.signature()) {
                    continue;
                }
                let archetype_id = archetype.archetype_id();
                let Some((entities, column)) = archetype.entities_with_attribute_mut::<A>(a) else {
                    corruption(format!("archetype {archetype_id} column {a} is not `{}`", std::any::type_name::<A>()));
                };
                for (&entity, value) in entities.iter().zip(column.as_mut_slice()) {
                    f(entity, value);
                }
            }

            drop(_exclusive);
            if iteration.exit() {
                self.apply_queued(&mut data);
            }
        }
    }

    /// Calls `f` with each matching entity, a shared `A` and a mutable `B`.
    ///
    /// Same locking rules as [`World::for_each_mut`].
    ///
    /// ## Panics
    /// If `A` and `B` are the same component type.

    pub fn for_each_read1_write1<A, B, F>(&self, query: &Query, mut f: F)
    where
        A: Component,
        B: Component,
        F: FnMut(Entity, &A, &mut B),
    {
        let a = self.registry.require_id_of::<A>();
        let b = self.registry.require_id_of::<B>();
        assert!(a != b, "cannot read and write `{}` in the same iteration", std::any::type_name::<A>());

        let iteration = self.iteration.enter();
        {
            let mut data = self.write("for_each_read1_write1");
            let _exclusive = self.iteration.enter_exclusive();

            for archetype in data.archetypes.iter_mut() {
                if !archetype.contains_all(&[a, b]) || !query.matches(archetype.signature()) {
                    continue;
                }
                let archetype_id = archetype.archetype_id();
                let Some((entities, read, write)) = archetype.entities_with_attribute_pair::<A, B>(a, b) else {
                    corruption(format!("archetype {archetype_id} columns {a}/{b} have unexpected types"));
                };
                for ((&entity, value), target) in entities.iter().zip(read.as_slice()).zip(write.as_mut_slice()) {
                    f(entity, value, target);
                }
            }

            drop(_exclusive);
            if iteration.exit() {
                self.apply_queued(&mut data);
            }
        }
    }

    /// Parallel form of [`World::for_each_mut`] on the rayon pool.
    ///
    /// `f` runs on worker threads while the calling thread holds the write
    /// lock, so it must not call back into this world except to queue
    /// structural changes.

    pub fn par_for_each_mut<A, F>(&self, query: &Query, f: F)
    where
        A: Component,
        F: Fn(Entity, &mut A) + Send + Sync,
    {
        let a = self.registry.require_id_of::<A>();
        let iteration = self.iteration.enter();
        {
            let mut data = self.write("par_for_each_mut");
            let _exclusive = self.iteration.enter_exclusive();

            let mut jobs = Vec::new();
            for archetype in data.archetypes.iter_mut() {
                if !archetype.has_component(a) || !query.matches(archetype.signature()) || archetype.is_empty() {
                    continue;
                }
                let archetype_id = archetype.archetype_id();
                match archetype.entities_with_attribute_mut::<A>(a) {
                    Some(job) => jobs.push(job),
                    None => corruption(format!("archetype {archetype_id} column {a} is not `{}`", std::any::type_name::<A>())),
                }
            }

            jobs.into_par_iter().for_each(|(entities, column)| {
                entities
                    .par_iter()
                    .zip(column.as_mut_slice().par_iter_mut())
                    .for_each(|(&entity, value)| f(entity, value));
            });

            drop(_exclusive);
            if iteration.exit() {
                self.apply_queued(&mut data);
            }
        }
    }

    /// Applies commands queued during iteration. The caller holds the write
    /// lock from before the iteration depth was released, so no immediate
    /// change from another thread can overtake the queue.
    fn apply_queued(&self, data: &mut WorldData) {
        let commands = self.queue.lock().drain_commands();
        if commands.is_empty() {
            return;
        }

        let mut applied = 0usize;
        for command in commands {
            if escalate(data.apply(command)) != Change::Ignored {
                applied += 1;
            }
        }
        tracing::trace!(applied, "applied changes queued during iteration");
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("components", &self.registry.len())
            .field("iteration_depth", &self.iteration.depth())
            .finish_non_exhaustive()
    }
}
