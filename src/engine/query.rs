//! Query construction.
//!
//! A [`Query`] is a predicate over archetype signatures. It is built either
//! from raw [`ComponentID`]s (`Query::all`, `Query::any`, ...) or, with
//! component types, through the builder-style [`QueryBuilder`].
//!
//! ## Execution model
//! Queries are evaluated by the world in two passes:
//! 1. Select archetypes whose signature satisfies the [`QuerySignature`]
//!    (cost proportional to the number of archetypes).
//! 2. Concatenate the entity lists of the selected archetypes (cost
//!    proportional to the number of matching entities).
//!
//! The result is always a snapshot: a `Vec<Entity>` that later structural
//! changes do not affect.

use crate::engine::component::{Component, ComponentRegistry};
use crate::engine::types::{build_signature, ComponentID, QuerySignature, Signature};


/// Archetype predicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Query {
    signature: QuerySignature,
}

impl Query {
    /// Entities having every component in `component_ids`.
    pub fn all(component_ids: &[ComponentID]) -> Self {
        Self {
            signature: QuerySignature { all: build_signature(component_ids), ..Default::default() },
        }
    }

    /// Entities having at least one component in `component_ids`.
    ///
    /// An empty list matches nothing.
    pub fn any(component_ids: &[ComponentID]) -> Self {
        if component_ids.is_empty() {
            return Self::nothing();
        }
        Self {
            signature: QuerySignature { any: build_signature(component_ids), ..Default::default() },
        }
    }

    /// Entities whose component set equals `component_ids`, no more and no less.
    pub fn exact(component_ids: &[ComponentID]) -> Self {
        Self {
            signature: QuerySignature {
                all: build_signature(component_ids),
                exact: true,
                ..Default::default()
            },
        }
    }

    /// Entities having any of `include` and none of `exclude`.
    ///
    /// An empty `include` matches nothing.
    pub fn with_exclusion(include: &[ComponentID], exclude: &[ComponentID]) -> Self {
        Self::any(include).without(exclude)
    }

    /// Adds excluded components to this query.
    ///
    /// Exclusions on an exact query are redundant and ignored by matching.
    pub fn without(mut self, component_ids: &[ComponentID]) -> Self {
        for &component_id in component_ids {
            self.signature.without.set(component_id);
        }
        self
    }

    /// Underlying predicate.
    #[inline]
    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    /// Returns `true` if `archetype_signature` satisfies this query.
    #[inline]
    pub fn matches(&self, archetype_signature: &Signature) -> bool {
        self.signature.matches(archetype_signature)
    }

    /// Returns `true` if this query is an exact-set lookup.
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.signature.exact
    }

    // Requires and excludes the same id; no signature satisfies both.
    fn nothing() -> Self {
        let mut all = Signature::default();
        all.set(0);
        Self {
            signature: QuerySignature { all, without: all, ..Default::default() },
        }
    }
}

/// Typed builder for [`Query`].
///
/// ## Example
/// ```ignore
/// let moving = QueryBuilder::new(world.registry())
///     .with::<Position>()
///     .with::<Velocity>()
///     .without::<Frozen>()
///     .build();
/// ```
///
/// ## Panics
/// Every method panics with the type name if the component type is not
/// registered.

pub struct QueryBuilder<'r> {
    registry: &'r ComponentRegistry,
    signature: QuerySignature,
}

impl<'r> QueryBuilder<'r> {
    /// Creates an empty builder resolving types through `registry`.
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self { registry, signature: QuerySignature::default() }
    }

    /// Requires component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.signature.all.set(self.registry.require_id_of::<T>());
        self
    }

    /// Adds `T` to the set of which at least one component must be present.
    pub fn any_of<T: Component>(mut self) -> Self {
        self.signature.any.set(self.registry.require_id_of::<T>());
        self
    }

    /// Excludes archetypes containing `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.signature.without.set(self.registry.require_id_of::<T>());
        self
    }

    /// Requires the archetype to contain exactly the `with` components.
    pub fn exact(mut self) -> Self {
        self.signature.exact = true;
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Query {
        Query { signature: self.signature }
    }
}
