//! # Component Registry
//!
//! This module provides the registry that assigns stable `ComponentID` values
//! to Rust component types and exposes type-erased storage factories for
//! archetype column allocation.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, enabling archetypes to store heterogeneous
//! component columns behind `TypeErasedAttribute`.
//!
//! ## Design
//! - The registry is an explicit value. Build it at startup, register every
//!   component type, then move it into [`World::new`](crate::World::new),
//!   which freezes it. There is no process-wide registry.
//! - Components are assigned a compact `ComponentID` in `[0, COMPONENT_CAP)`,
//!   in registration order starting at 0.
//! - Each descriptor carries the factory used to construct an empty column.
//!
//! ## Invariants
//! - `ComponentID` values are unique and stable for the lifetime of the registry.
//! - Registering the same type twice returns the same ID.
//! - When frozen, registration of new types is disallowed.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    mem::{align_of, size_of},
};

use crate::engine::storage::{Attribute, TypeErasedAttribute};
use crate::engine::types::{ComponentID, Signature, COMPONENT_CAP};
use crate::engine::error::RegistryError;


/// Marker for types that can be stored as components.
///
/// Blanket-implemented for every `Send + Sync + 'static` type.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Factory function for constructing an empty type-erased component column.
pub type FactoryFn = fn() -> Box<dyn TypeErasedAttribute>;

fn new_attribute_storage<T: Component>() -> Box<dyn TypeErasedAttribute> {
    Box::new(Attribute::<T>::default())
}

/// Describes a registered component type.
///
/// ## Fields
/// - `component_id`: the runtime identifier assigned by the registry.
/// - `name`: the Rust type name (`type_name::<T>()`).
/// - `type_id`: the runtime `TypeId` for the component.
/// - `size` / `align`: layout of the component type in bytes.
/// - `factory`: builds an empty column for this type.

#[derive(Copy, Clone, Debug)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentID,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,

    factory: FactoryFn,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T` with the given id.
    #[inline]
    pub fn of<T: Component>(component_id: ComponentID) -> Self {
        Self {
            component_id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            factory: new_attribute_storage::<T>,
        }
    }

    /// Builds an empty column for this component type.
    #[inline]
    pub fn make_column(&self) -> Box<dyn TypeErasedAttribute> {
        (self.factory)()
    }
}

impl PartialEq for ComponentDesc {
    fn eq(&self, other: &Self) -> bool {
        self.component_id == other.component_id && self.type_id == other.type_id
    }
}

impl Eq for ComponentDesc {}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

/// Mapping between Rust component types and compact `ComponentID` values.
///
/// ## Design
/// - `by_type` maps `TypeId -> ComponentID`.
/// - `by_id` stores `ComponentDesc` indexed by `ComponentID`; its length is
///   the next ID to hand out.
/// - `frozen` prevents further registration once a world owns the registry.

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentID>,
    by_id: Vec<ComponentDesc>,
    frozen: bool,
}

impl ComponentRegistry {
    /// Creates an empty, unfrozen registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T` and returns its assigned `ComponentID`.
    ///
    /// ## Behavior
    /// - If `T` is already registered, returns the existing ID (even when frozen).
    /// - Otherwise allocates the next ID and stores a `ComponentDesc`.
    ///
    /// ## Errors
    /// - `Frozen` if a world already owns this registry.
    /// - `CapacityExceeded` past `COMPONENT_CAP` types.

    pub fn try_register<T: Component>(&mut self) -> Result<ComponentID, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        if self.frozen {
            return Err(RegistryError::Frozen { name: type_name::<T>() });
        }

        if self.by_id.len() >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded {
                name: type_name::<T>(),
                capacity: COMPONENT_CAP,
            });
        }

        let id = self.by_id.len() as ComponentID;
        self.by_type.insert(type_id, id);
        self.by_id.push(ComponentDesc::of::<T>(id));
        tracing::trace!(component = type_name::<T>(), id, "registered component");
        Ok(id)
    }

    /// Registers component type `T` and returns its `ComponentID`.
    ///
    /// ## Panics
    /// Panics if the registry is frozen or capacity is exceeded.

    pub fn register<T: Component>(&mut self) -> ComponentID {
        self.try_register::<T>().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Freezes the registry, preventing any further registration.
    pub fn freeze(&mut self) { self.frozen = true; }

    /// Returns `true` if the registry has been frozen.
    pub fn is_frozen(&self) -> bool { self.frozen }

    /// Number of registered component types.
    pub fn len(&self) -> usize { self.by_id.len() }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool { self.by_id.is_empty() }

    /// Returns the `ComponentID` for `T`, if registered.
    pub fn id_of<T: 'static>(&self) -> Option<ComponentID> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the `ComponentID` for `T`.
    ///
    /// ## Panics
    /// Panics with the type name if `T` was not registered. Using an
    /// unregistered type is a programmer error.

    pub fn require_id_of<T: 'static>(&self) -> ComponentID {
        match self.id_of::<T>() {
            Some(id) => id,
            None => panic!("component `{}` is not registered", type_name::<T>()),
        }
    }

    /// Returns the descriptor for `component_id`, if registered.
    pub fn describe(&self, component_id: ComponentID) -> Option<&ComponentDesc> {
        self.by_id.get(component_id as usize)
    }

    /// Iterates descriptors in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDesc> {
        self.by_id.iter()
    }

    /// Creates an empty column for `component_id`.
    pub fn make_empty_column(
        &self,
        component_id: ComponentID,
    ) -> Result<Box<dyn TypeErasedAttribute>, RegistryError> {
        self.describe(component_id)
            .map(ComponentDesc::make_column)
            .ok_or(RegistryError::UnknownComponent(component_id))
    }

    /// Type name for diagnostics; `"<unregistered>"` for unknown ids.
    pub fn name_of(&self, component_id: ComponentID) -> &'static str {
        self.describe(component_id).map_or("<unregistered>", |desc| desc.name)
    }

    /// Asserts every id in `component_ids` is registered.
    ///
    /// ## Panics
    /// Panics naming the first unknown id.

    pub fn assert_registered(&self, component_ids: &[ComponentID]) {
        for &component_id in component_ids {
            if self.describe(component_id).is_none() {
                panic!("{}", RegistryError::UnknownComponent(component_id));
            }
        }
    }
}

/// Type-erased container for component values.
pub trait DynamicBundle {
    /// Removes and returns the value for `component_id`, if present.
    fn take(&mut self, component_id: ComponentID) -> Option<Box<dyn Any + Send>>;
}

/// A set of component values used to spawn an entity in one placement.
///
/// ## Invariants
/// - At most one value per `ComponentID`; inserting twice replaces the value.
/// - `signature` has exactly the bits of the stored values.

#[derive(Default)]
pub struct Bundle {
    signature: Signature,
    values: Vec<(ComponentID, Box<dyn Any + Send>)>,
}

impl Bundle {
    /// Creates an empty bundle.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a component value under an explicit id.
    pub fn insert<T: Component>(&mut self, component_id: ComponentID, value: T) {
        let boxed: Box<dyn Any + Send> = Box::new(value);
        if self.signature.has(component_id) {
            if let Some(slot) = self.values.iter_mut().find(|(cid, _)| *cid == component_id) {
                slot.1 = boxed;
                return;
            }
        }
        self.signature.set(component_id);
        self.values.push((component_id, boxed));
    }

    /// Inserts a value, resolving its id through `registry`.
    ///
    /// ## Panics
    /// Panics if `T` is not registered.
    pub fn insert_component<T: Component>(&mut self, registry: &ComponentRegistry, value: T) {
        self.insert(registry.require_id_of::<T>(), value);
    }

    /// Builder form of [`Bundle::insert_component`].
    pub fn with<T: Component>(mut self, registry: &ComponentRegistry, value: T) -> Self {
        self.insert_component(registry, value);
        self
    }

    /// Number of component values held.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the bundle holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Signature of the components present in this bundle.
    #[inline]
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Component ids present, in insertion order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.values.iter().map(|(cid, _)| *cid)
    }
}

impl DynamicBundle for Bundle {
    #[inline]
    fn take(&mut self, component_id: ComponentID) -> Option<Box<dyn Any + Send>> {
        let index = self
            .values
            .iter()
            .position(|(cid, _)| *cid == component_id)?;

        self.signature.clear(component_id);
        let (_, value) = self.values.swap_remove(index);
        Some(value)
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("components", &self.component_ids().collect::<Vec<_>>())
            .finish()
    }
}
