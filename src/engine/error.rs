//! Error types for component registration, column storage and migration.
//!
//! This module declares focused, composable error types used across the
//! registry, attribute storage and archetype migration pipeline. Each error
//! carries enough context to make failures actionable while remaining small
//! and cheap to pass around or convert into the aggregate [`ECSError`].
//!
//! ## Taxonomy
//! * **Programmer errors**: registering after the registry was frozen, using
//!   an unregistered component type. The public `World` API turns these into
//!   panics that name the offending type.
//! * **Data-dependent conditions**: stale entities, missing components,
//!   duplicate adds. These are *not* errors at all: the world reports them as
//!   `None` or as an ignored change.
//! * **Invariant violations**: columns disagreeing on row placement, a
//!   column holding the wrong element type. These are returned as
//!   [`MoveError`] / [`AttributeError`] from the storage layer and escalate to
//!   a panic at the world boundary, since continuing would corrupt the
//!   archetype layout.
//!
//! ## Display vs. Debug
//! * [`std::fmt::Display`] is optimized for logs (short, imperative phrasing).
//! * [`std::fmt::Debug`] (derived) retains full structure for diagnostics.

use std::any::TypeId;

use thiserror::Error;

use crate::engine::types::{ArchetypeID, ComponentID, RowID};


/// Failures raised by the component registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry was frozen by `World` construction.
    #[error("component registry is frozen; cannot register `{name}`")]
    Frozen {
        /// Type name of the rejected component.
        name: &'static str,
    },

    /// More than `COMPONENT_CAP` component types were registered.
    #[error("component capacity exceeded ({capacity} types) while registering `{name}`")]
    CapacityExceeded {
        /// Type name of the rejected component.
        name: &'static str,
        /// Configured capacity.
        capacity: usize,
    },

    /// A `ComponentID` that the registry never handed out.
    #[error("component id {0} is not registered")]
    UnknownComponent(ComponentID),
}

/// Returned when a column write targets storage whose element type does not
/// match the provided value's type (e.g. writing `Velocity` into a `Position`
/// column).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type mismatch: expected {expected_name}, actual {actual:?}")]
pub struct TypeMismatchError {
    /// Destination storage's declared element type.
    pub expected: TypeId,

    /// Human-readable name of the declared element type.
    pub expected_name: &'static str,

    /// Provided value's dynamic type.
    pub actual: TypeId,
}

/// Returned when a row index refers to a position outside a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("row {row} out of bounds (length {length})")]
pub struct RowOutOfBoundsError {
    /// Row index that was addressed.
    pub row: RowID,

    /// Number of rows held by the column.
    pub length: usize,
}

/// Aggregate error for attribute (component column) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// A row index addressed storage outside valid bounds.
    #[error(transparent)]
    Position(#[from] RowOutOfBoundsError),

    /// The dynamic type of a value did not match the column's element type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    /// A row index no longer fits in `RowID`.
    #[error("row index overflow")]
    IndexOverflow,
}

/// Errors that can occur while moving an entity between archetypes.
///
/// ## Notes
/// These errors indicate internal inconsistencies or violated invariants
/// rather than recoverable user-facing failures.

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    /// A column expected in the destination archetype was missing.
    #[error("destination archetype {archetype} has no column for component {component_id}")]
    MissingColumn {
        /// Archetype that lacked the column.
        archetype: ArchetypeID,
        /// Component whose column was missing.
        component_id: ComponentID,
    },

    /// Failed to move component data out of the source archetype.
    #[error("failed to move component {component_id} from source archetype: {source_error}")]
    PushFromFailed {
        /// Component being transferred.
        component_id: ComponentID,
        /// Underlying attribute error.
        source_error: AttributeError,
    },

    /// Failed while inserting a new component value.
    #[error("failed to insert component {component_id} into destination archetype: {source_error}")]
    PushFailed {
        /// Component being inserted.
        component_id: ComponentID,
        /// Underlying attribute error.
        source_error: AttributeError,
    },

    /// Failed while dropping a source-only component value.
    #[error("failed to remove component {component_id} from source archetype: {source_error}")]
    SwapRemoveError {
        /// Component being removed.
        component_id: ComponentID,
        /// Underlying attribute error.
        source_error: AttributeError,
    },

    /// A column's length disagreed with the archetype's entity count.
    #[error("component {component_id} column misaligned: expected {expected} rows, found {got}")]
    RowMisalignment {
        /// Entity count of the archetype.
        expected: usize,
        /// Column length encountered.
        got: usize,
        /// Component whose storage was misaligned.
        component_id: ComponentID,
    },

    /// The row addressed by an entity location does not exist.
    #[error("row {row} out of bounds in archetype {archetype}")]
    RowOutOfBounds {
        /// Archetype addressed.
        archetype: ArchetypeID,
        /// Row addressed.
        row: RowID,
    },
}

/// Top-level error for ECS operations that can fail internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ECSError {
    /// Registry misuse.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Column-level failure.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// Archetype migration failure.
    #[error(transparent)]
    Move(#[from] MoveError),

    /// The entity allocator cannot address more slots.
    #[error("entity limit reached ({entities_needed} needed; capacity {capacity})")]
    EntityCapacity {
        /// Total slots the allocator attempted to reach.
        entities_needed: u64,
        /// Maximum addressable slots.
        capacity: u64,
    },

    /// A structural invariant check failed.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Convenience alias for results produced by the ECS internals.
pub type ECSResult<T> = Result<T, ECSError>;
