//! Dense column storage and type-erased access for component data.
//!
//! This module implements the per-component column, [`Attribute<T>`], which
//! stores values densely in row order. An archetype owns one attribute per
//! component type and keeps all of them parallel-indexed with its entity list.
//!
//! # What this module provides
//!
//! - **`Attribute<T>`**: a contiguous storage container for a single element
//!   type `T`.
//! - **`TypeErasedAttribute`**: a dynamically-typed interface for working with
//!   attributes without knowing `T` at compile time, used by archetypes to
//!   hold heterogeneous columns and to migrate rows between archetypes.
//!
//! # Core operations
//!
//! - **Append**: `push` writes at the end of the column.
//! - **Remove**: `swap_remove` deletes an element in `O(1)` by moving the last
//!   element into the removed slot (unless the removed slot is already last).
//! - **Transfer**: `push_from` moves a value from one attribute into another,
//!   swap-removing it from the source.
//!
//! These operations are constant-time and preserve dense packing, but they do
//! **not** preserve element order.
//!
//! # Ownership
//!
//! Values are moved, never shared. After `push_from` the destination column
//! owns the only copy of the value; the source slot has been filled by the
//! source's former last element or truncated away.

use std::any::{type_name, Any, TypeId};

use crate::engine::types::RowID;
use crate::engine::error::{AttributeError, RowOutOfBoundsError, TypeMismatchError};


/// Object-safe view over an [`Attribute<T>`] of unknown element type.
pub trait TypeErasedAttribute: Any + Send + Sync {
    /// Number of initialized rows.
    fn length(&self) -> usize;

    /// Number of rows the column can hold without reallocating.
    fn capacity(&self) -> usize;

    /// Returns an immutable `&dyn Any` reference to this attribute.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable `&mut dyn Any` reference to this attribute.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// `TypeId` of the element type.
    fn element_type_id(&self) -> TypeId;

    /// Human-readable name of the element type.
    fn element_type_name(&self) -> &'static str;

    /// Grows backing storage so the column can hold `rows` rows in total.
    fn reserve_total(&mut self, rows: usize);

    /// Returns the value at `row` as `&dyn Any`.
    fn get_dyn(&self, row: RowID) -> Option<&dyn Any>;

    /// Appends a boxed value, checking its dynamic type.
    fn push_dyn(&mut self, value: Box<dyn Any + Send>) -> Result<RowID, AttributeError>;

    /// Removes and drops the value at `row`, filling the hole with the last row.
    fn swap_remove_dyn(&mut self, row: RowID) -> Result<(), AttributeError>;

    /// Moves the value at `row` of `source` to the end of this column.
    ///
    /// `source` must hold the same element type. The source slot is
    /// swap-removed, so the source's last row now lives at `row`.
    fn push_from_dyn(
        &mut self,
        source: &mut dyn TypeErasedAttribute,
        row: RowID,
    ) -> Result<RowID, AttributeError>;
}

/// Dense, growable column of `T`.
///
/// # Invariants
/// - Rows `0..length()` are initialized; there are no holes.
/// - Row indices are stable only until the next `swap_remove`/`push_from`
///   on this column.

#[derive(Debug)]
pub struct Attribute<T> {
    values: Vec<T>,
}

impl<T> Default for Attribute<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T> Attribute<T> {
    /// Number of stored rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the column holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    fn check_row(&self, row: RowID) -> Result<usize, AttributeError> {
        let index = row as usize;
        if index < self.values.len() {
            Ok(index)
        } else {
            Err(RowOutOfBoundsError { row, length: self.values.len() }.into())
        }
    }

    #[inline]
    fn next_row(&self) -> Result<RowID, AttributeError> {
        RowID::try_from(self.values.len()).map_err(|_| AttributeError::IndexOverflow)
    }

    /// Returns the value at `row`, if present.
    #[inline]
    pub fn get(&self, row: RowID) -> Option<&T> {
        self.values.get(row as usize)
    }

    /// Returns the value at `row` mutably, if present.
    #[inline]
    pub fn get_mut(&mut self, row: RowID) -> Option<&mut T> {
        self.values.get_mut(row as usize)
    }

    /// All rows as a slice, in row order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// All rows as a mutable slice, in row order.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Iterates rows in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Appends `value` and returns its row.
    pub fn push(&mut self, value: T) -> Result<RowID, AttributeError> {
        let row = self.next_row()?;
        self.values.push(value);
        Ok(row)
    }

    /// Removes the value at `row`, moving the last row into its place.
    ///
    /// Returns the removed value and, if a row was moved, its previous index.
    pub fn swap_remove(&mut self, row: RowID) -> Result<(T, Option<RowID>), AttributeError> {
        let index = self.check_row(row)?;
        let last = self.values.len() - 1;
        let value = self.values.swap_remove(index);
        let moved_from = if index != last { Some(last as RowID) } else { None };
        Ok((value, moved_from))
    }

    /// Moves the value at `row` of `source` to the end of this column.
    pub fn push_from(&mut self, source: &mut Attribute<T>, row: RowID) -> Result<RowID, AttributeError> {
        let (value, _) = source.swap_remove(row)?;
        self.push(value)
    }
}

impl<T: 'static + Send + Sync> Attribute<T> {
    fn mismatch(actual: TypeId) -> AttributeError {
        TypeMismatchError {
            expected: TypeId::of::<T>(),
            expected_name: type_name::<T>(),
            actual,
        }
        .into()
    }

    fn downcast_value(value: Box<dyn Any + Send>) -> Result<T, AttributeError> {
        let actual = (*value).type_id();
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Self::mismatch(actual))
    }
}

impl<T: 'static + Send + Sync> TypeErasedAttribute for Attribute<T> {
    fn length(&self) -> usize { self.values.len() }
    fn capacity(&self) -> usize { self.values.capacity() }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn element_type_id(&self) -> TypeId { TypeId::of::<T>() }
    fn element_type_name(&self) -> &'static str { type_name::<T>() }

    fn reserve_total(&mut self, rows: usize) {
        if self.values.capacity() < rows {
            self.values.reserve_exact(rows - self.values.len());
        }
    }

    fn get_dyn(&self, row: RowID) -> Option<&dyn Any> {
        self.values.get(row as usize).map(|value| value as &dyn Any)
    }

    fn push_dyn(&mut self, value: Box<dyn Any + Send>) -> Result<RowID, AttributeError> {
        let value = Self::downcast_value(value)?;
        self.push(value)
    }

    fn swap_remove_dyn(&mut self, row: RowID) -> Result<(), AttributeError> {
        self.swap_remove(row).map(|_| ())
    }

    fn push_from_dyn(
        &mut self,
        source: &mut dyn TypeErasedAttribute,
        row: RowID,
    ) -> Result<RowID, AttributeError> {
        let actual = source.element_type_id();
        let source = source
            .as_any_mut()
            .downcast_mut::<Attribute<T>>()
            .ok_or_else(|| Self::mismatch(actual))?;
        self.push_from(source, row)
    }
}
