//! # Archetype storage and row migration
//!
//! An [`Archetype`] stores every entity whose component set is exactly its
//! [`Signature`]. Storage is column-major: one [`TypeErasedAttribute`] per
//! component type, parallel-indexed with the `entities` list, so row `r` of
//! every column belongs to `entities[r]`.
//!
//! ## Structural operations
//!
//! * [`Archetype::add_empty_row`] reserves the next row (growing capacity by
//!   doubling) and appends the entity. The caller fills every column before
//!   releasing the world lock.
//! * [`Archetype::remove_row`] swap-removes a row from every column and the
//!   entity list, and reports which entity was moved into the vacated row.
//! * [`Archetype::move_row_to`] migrates one row into another archetype:
//!   shared components are *moved* (never aliased), source-only components are
//!   dropped, newly added values are appended.
//!
//! ## Invariants
//! * Every column has exactly `entities.len()` rows.
//! * `column_index[cid]` is `Some(i)` iff `cid` is in the signature, and
//!   `columns[i]` stores that component.
//! * `component_ids` is sorted ascending and parallel to `columns`.
//!
//! Callers must treat row indices as valid only until the next structural
//! operation on the same archetype.

use std::any::Any;
use std::collections::HashMap;

use crate::engine::types::{ArchetypeID, ComponentID, QuerySignature, RowID, Signature};
use crate::engine::storage::{Attribute, TypeErasedAttribute};
use crate::engine::entity::Entity;
use crate::engine::component::{Component, ComponentRegistry, DynamicBundle};
use crate::engine::error::{AttributeError, MoveError, RegistryError};


/// Summary of an archetype selected by a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchetypeMatch {
    /// Matching archetype.
    pub archetype_id: ArchetypeID,
    /// Number of entities it held when matched.
    pub length: usize,
}

/// Result of migrating a row between archetypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowMove {
    /// Row of the migrated entity in the destination archetype.
    pub destination_row: RowID,
    /// Entity that was swapped into the vacated source row, if any.
    pub swapped: Option<Entity>,
}

/// Stores entities that share an identical component signature.
pub struct Archetype {
    archetype_id: ArchetypeID,
    signature: Signature,
    component_ids: Vec<ComponentID>,
    columns: Vec<Box<dyn TypeErasedAttribute>>,
    column_index: Vec<Option<usize>>,
    entities: Vec<Entity>,
    capacity: usize,
    initial_capacity: usize,
    add_edges: HashMap<ComponentID, ArchetypeID>,
    remove_edges: HashMap<ComponentID, ArchetypeID>,
}

impl Archetype {

    /// Creates an empty archetype with one column per component in `signature`.
    ///
    /// ## Behavior
    /// - No rows are allocated until the first entity arrives; the first
    ///   allocation reserves `initial_capacity` rows.
    ///
    /// ## Errors
    /// `UnknownComponent` if the signature names an id the registry never issued.

    pub fn new(
        archetype_id: ArchetypeID,
        signature: Signature,
        registry: &ComponentRegistry,
        initial_capacity: usize,
    ) -> Result<Self, RegistryError> {
        let component_ids: Vec<ComponentID> = signature.iterate_over_components().collect();
        let index_len = component_ids.last().map_or(0, |&max| max as usize + 1);
        let mut column_index = vec![None; index_len];
        let mut columns = Vec::with_capacity(component_ids.len());

        for (position, &component_id) in component_ids.iter().enumerate() {
            columns.push(registry.make_empty_column(component_id)?);
            column_index[component_id as usize] = Some(position);
        }

        Ok(Self {
            archetype_id,
            signature,
            component_ids,
            columns,
            column_index,
            entities: Vec::new(),
            capacity: 0,
            initial_capacity: initial_capacity.max(1),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        })
    }

    /// Stable identifier of this archetype.
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeID { self.archetype_id }

    /// Canonical component set of this archetype.
    #[inline]
    pub fn signature(&self) -> &Signature { &self.signature }

    /// Component ids stored here, ascending.
    #[inline]
    pub fn component_ids(&self) -> &[ComponentID] { &self.component_ids }

    /// Number of entities stored.
    #[inline]
    pub fn len(&self) -> usize { self.entities.len() }

    /// Returns `true` if no entity lives here.
    #[inline]
    pub fn is_empty(&self) -> bool { self.entities.is_empty() }

    /// Rows reserved before the next doubling.
    #[inline]
    pub fn capacity(&self) -> usize { self.capacity }

    /// Entities in row order.
    #[inline]
    pub fn entities(&self) -> &[Entity] { &self.entities }

    /// Returns `true` if the archetype contains the specified component.
    #[inline]
    pub fn has_component(&self, component_id: ComponentID) -> bool {
        self.signature.has(component_id)
    }

    /// Returns `true` if every id in `component_ids` is present.
    pub fn contains_all(&self, component_ids: &[ComponentID]) -> bool {
        component_ids.iter().all(|&cid| self.signature.has(cid))
    }

    /// Returns `true` if at least one id in `component_ids` is present.
    pub fn contains_any(&self, component_ids: &[ComponentID]) -> bool {
        component_ids.iter().any(|&cid| self.signature.has(cid))
    }

    /// Returns `true` if the archetype satisfies `query`.
    #[inline]
    pub fn matches(&self, query: &QuerySignature) -> bool {
        query.matches(&self.signature)
    }

    #[inline]
    fn column_position(&self, component_id: ComponentID) -> Option<usize> {
        self.column_index.get(component_id as usize).copied().flatten()
    }

    /// Type-erased column for `component_id`.
    pub fn column(&self, component_id: ComponentID) -> Option<&dyn TypeErasedAttribute> {
        self.column_position(component_id).map(|i| self.columns[i].as_ref())
    }

    /// Typed column for `component_id`. `None` if absent or of another type.
    pub fn attribute<T: Component>(&self, component_id: ComponentID) -> Option<&Attribute<T>> {
        self.column(component_id)?.as_any().downcast_ref::<Attribute<T>>()
    }

    /// Mutable typed column for `component_id`.
    pub fn attribute_mut<T: Component>(&mut self, component_id: ComponentID) -> Option<&mut Attribute<T>> {
        let position = self.column_position(component_id)?;
        self.columns[position].as_any_mut().downcast_mut::<Attribute<T>>()
    }

    /// Entity list together with one mutable typed column.
    pub fn entities_with_attribute_mut<T: Component>(
        &mut self,
        component_id: ComponentID,
    ) -> Option<(&[Entity], &mut Attribute<T>)> {
        let position = self.column_position(component_id)?;
        let column = self.columns[position].as_any_mut().downcast_mut::<Attribute<T>>()?;
        Some((&self.entities, column))
    }

    /// Entity list, one shared column and one mutable column.
    ///
    /// Returns `None` if either column is missing, has another element type,
    /// or if both ids name the same column.
    pub fn entities_with_attribute_pair<A: Component, B: Component>(
        &mut self,
        read: ComponentID,
        write: ComponentID,
    ) -> Option<(&[Entity], &Attribute<A>, &mut Attribute<B>)> {
        let read_position = self.column_position(read)?;
        let write_position = self.column_position(write)?;
        if read_position == write_position {
            return None;
        }

        let (read_column, write_column) = if read_position < write_position {
            let (head, tail) = self.columns.split_at_mut(write_position);
            (&head[read_position], &mut tail[0])
        } else {
            let (head, tail) = self.columns.split_at_mut(read_position);
            (&tail[0], &mut head[write_position])
        };

        let read_column = read_column.as_any().downcast_ref::<Attribute<A>>()?;
        let write_column = write_column.as_any_mut().downcast_mut::<Attribute<B>>()?;
        Some((&self.entities, read_column, write_column))
    }

    /// Typed value at `row`.
    pub fn get<T: Component>(&self, component_id: ComponentID, row: RowID) -> Option<&T> {
        self.attribute::<T>(component_id)?.get(row)
    }

    /// Mutable typed value at `row`.
    pub fn get_mut<T: Component>(&mut self, component_id: ComponentID, row: RowID) -> Option<&mut T> {
        self.attribute_mut::<T>(component_id)?.get_mut(row)
    }

    /// Type-erased value at `row`.
    pub fn get_dyn(&self, component_id: ComponentID, row: RowID) -> Option<&dyn Any> {
        self.column(component_id)?.get_dyn(row)
    }

    /// Cached destination when `component_id` is added to this archetype.
    #[inline]
    pub fn add_edge(&self, component_id: ComponentID) -> Option<ArchetypeID> {
        self.add_edges.get(&component_id).copied()
    }

    /// Cached destination when `component_id` is removed from this archetype.
    #[inline]
    pub fn remove_edge(&self, component_id: ComponentID) -> Option<ArchetypeID> {
        self.remove_edges.get(&component_id).copied()
    }

    /// Records a transition edge.
    pub fn set_add_edge(&mut self, component_id: ComponentID, destination: ArchetypeID) {
        self.add_edges.insert(component_id, destination);
    }

    /// Records a transition edge.
    pub fn set_remove_edge(&mut self, component_id: ComponentID, destination: ArchetypeID) {
        self.remove_edges.insert(component_id, destination);
    }

    /// Doubles the reserved row count if the archetype is full.
    fn ensure_row_capacity(&mut self) {
        if self.entities.len() < self.capacity {
            return;
        }

        let new_capacity = if self.capacity == 0 {
            self.initial_capacity
        } else {
            self.capacity * 2
        };

        self.entities.reserve_exact(new_capacity - self.entities.len());
        for column in &mut self.columns {
            column.reserve_total(new_capacity);
        }
        self.capacity = new_capacity;
    }

    /// Appends `entity` as a new row and returns its index.
    ///
    /// ## Invariants
    /// Leaves every column one row short; the caller must push exactly one
    /// value into each column before the archetype is observed again.

    pub fn add_empty_row(&mut self, entity: Entity) -> Result<RowID, AttributeError> {
        let row = RowID::try_from(self.entities.len()).map_err(|_| AttributeError::IndexOverflow)?;
        self.ensure_row_capacity();
        self.entities.push(entity);
        Ok(row)
    }

    /// Swap-removes `row` from every column and the entity list.
    ///
    /// ## Returns
    /// The entity that previously occupied the last row and now lives at
    /// `row`, or `None` if `row` was the last row. The caller must update that
    /// entity's location.

    pub fn remove_row(&mut self, row: RowID) -> Result<Option<Entity>, MoveError> {
        let index = row as usize;
        if index >= self.entities.len() {
            return Err(MoveError::RowOutOfBounds { archetype: self.archetype_id, row });
        }

        for (position, column) in self.columns.iter_mut().enumerate() {
            column
                .swap_remove_dyn(row)
                .map_err(|e| MoveError::SwapRemoveError {
                    component_id: self.component_ids[position],
                    source_error: e,
                })?;
        }

        self.entities.swap_remove(index);
        Ok(self.entities.get(index).copied())
    }

    /// Places `entity` in a new row filled from `bundle`.
    ///
    /// Every component of this archetype must be present in the bundle.

    pub fn spawn_row(
        &mut self,
        entity: Entity,
        bundle: &mut dyn DynamicBundle,
    ) -> Result<RowID, MoveError> {
        let row = self
            .add_empty_row(entity)
            .map_err(|e| MoveError::PushFailed { component_id: 0, source_error: e })?;

        for (position, column) in self.columns.iter_mut().enumerate() {
            let component_id = self.component_ids[position];
            let value = bundle
                .take(component_id)
                .ok_or(MoveError::MissingColumn { archetype: self.archetype_id, component_id })?;
            column
                .push_dyn(value)
                .map_err(|e| MoveError::PushFailed { component_id, source_error: e })?;
        }

        self.verify_alignment()?;
        Ok(row)
    }

    /// Migrates the entity at `row` into `destination`.
    ///
    /// ## Behavior
    /// 1. A row is reserved in `destination`.
    /// 2. Components present in both archetypes are moved column by column.
    /// 3. Components absent from `destination` are dropped.
    /// 4. `added` values are appended to their destination columns.
    /// 5. The source row is closed by swap-with-last.
    ///
    /// ## Errors
    /// Any `MoveError` means the two archetypes no longer agree with their
    /// signatures and the world must not continue.

    pub fn move_row_to(
        &mut self,
        destination: &mut Archetype,
        row: RowID,
        added: Vec<(ComponentID, Box<dyn Any + Send>)>,
    ) -> Result<RowMove, MoveError> {
        let index = row as usize;
        let Some(&entity) = self.entities.get(index) else {
            return Err(MoveError::RowOutOfBounds { archetype: self.archetype_id, row });
        };

        let destination_row = destination
            .add_empty_row(entity)
            .map_err(|e| MoveError::PushFailed { component_id: 0, source_error: e })?;

        for (position, source_column) in self.columns.iter_mut().enumerate() {
            let component_id = self.component_ids[position];
            match destination.column_position(component_id) {
                Some(target) => {
                    destination.columns[target]
                        .push_from_dyn(&mut **source_column, row)
                        .map_err(|e| MoveError::PushFromFailed { component_id, source_error: e })?;
                }
                None => {
                    source_column
                        .swap_remove_dyn(row)
                        .map_err(|e| MoveError::SwapRemoveError { component_id, source_error: e })?;
                }
            }
        }

        for (component_id, value) in added {
            let target = destination.column_position(component_id).ok_or(MoveError::MissingColumn {
                archetype: destination.archetype_id,
                component_id,
            })?;
            destination.columns[target]
                .push_dyn(value)
                .map_err(|e| MoveError::PushFailed { component_id, source_error: e })?;
        }

        self.entities.swap_remove(index);
        let swapped = self.entities.get(index).copied();

        destination.verify_alignment()?;
        self.verify_alignment()?;

        Ok(RowMove { destination_row, swapped })
    }

    /// Checks that every column length equals the entity count.
    pub fn verify_alignment(&self) -> Result<(), MoveError> {
        let expected = self.entities.len();
        for (position, column) in self.columns.iter().enumerate() {
            let got = column.length();
            if got != expected {
                return Err(MoveError::RowMisalignment {
                    expected,
                    got,
                    component_id: self.component_ids[position],
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("archetype_id", &self.archetype_id)
            .field("component_ids", &self.component_ids)
            .field("length", &self.entities.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
