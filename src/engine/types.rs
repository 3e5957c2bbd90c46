//! Core ECS Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental types, identifiers, bit layouts, and
//! signatures** shared by every part of the store: the component registry,
//! archetypes, the world and the query engine.
//!
//! ## Entity Representation
//!
//! Entities are encoded as a packed 64-bit integer with the following layout:
//!
//! ```text
//! | version | index |
//! ```
//!
//! - **Index** identifies the slot in the entity allocator.
//! - **Version** is bumped every time the slot is released, so a handle that
//!   outlived its entity no longer resolves.
//!
//! ## Archetypes and Components
//!
//! Components are identified by compact [`ComponentID`] values. Archetypes are
//! described by [`Signature`] bitsets indicating which components they contain.
//! The signature *is* the canonical encoding of an archetype: two archetypes
//! with the same component set always have bit-identical signatures.
//!
//! Component signatures:
//!
//! - are fixed-size arrays of `u64`,
//! - support fast bitwise comparison,
//! - allow efficient iteration over set bits,
//! - are used for both archetype identity and query matching.

/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Globally unique entity identifier encoded as a packed 64-bit value.
pub type EntityID = u64;
/// Slot index inside the entity allocator.
pub type IndexID = u32;
/// Generation counter used to detect stale entities.
pub type VersionID = u32;
/// Count of live entities.
pub type EntityCount = u32;

/// Frame counter advanced by the schedule.
pub type Tick = u64;

/// Total number of bits in an [`EntityID`].
pub const ENTITY_BITS: Bits = 64;
/// Number of bits reserved for entity versioning.
pub const VERSION_BITS: Bits = 32;
/// Number of bits reserved for the slot index.
pub const INDEX_BITS: Bits = ENTITY_BITS - VERSION_BITS;

const _: [(); 1] = [(); (VERSION_BITS < ENTITY_BITS) as usize];
const _: [(); 1] = [(); (INDEX_BITS > 0) as usize];

const fn mask(bits: Bits) -> EntityID {
    if bits == 0 { 0 } else if bits >= 64 { EntityID::MAX } else { ((1 as EntityID) << bits) - 1 }
}

/// Mask selecting the index portion of an [`EntityID`].
pub const INDEX_MASK: EntityID = mask(INDEX_BITS);
/// Largest addressable slot index.
pub const INDEX_CAP: IndexID = INDEX_MASK as IndexID;

/// Unique identifier for an archetype.
pub type ArchetypeID = u32;
/// Row index within an archetype.
pub type RowID = u32;

/// The archetype with no components. Every new entity starts here.
pub const EMPTY_ARCHETYPE: ArchetypeID = 0;

/// Unique identifier for a component type.
pub type ComponentID = u16;

/// Maximum number of registered component types.
pub const COMPONENT_CAP: usize = 256;
/// Number of `u64` words required to represent a full component signature.
pub const SIGNATURE_SIZE: usize = (COMPONENT_CAP + 63) / 64;

/// Bitset representing a set of components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    /// Packed component bitset.
    pub components: [u64; SIGNATURE_SIZE],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            components: [0u64; SIGNATURE_SIZE],
        }
    }
}

impl Signature {
    /// Sets the bit corresponding to `component_id`.
    ///
    /// ## Panics
    /// If `component_id` is not below [`COMPONENT_CAP`].

    #[inline]
    pub fn set(&mut self, component_id: ComponentID) {
        assert!(
            (component_id as usize) < COMPONENT_CAP,
            "component id {component_id} is not registered: ids must be below {COMPONENT_CAP}"
        );
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] |= 1u64 << bits;
    }

    /// Clears the bit corresponding to `component_id`. No-op past the cap.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentID) {
        let index = (component_id as usize) / 64;
        if index >= SIGNATURE_SIZE { return; }
        let bits = (component_id as usize) % 64;
        self.components[index] &= !(1u64 << bits);
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentID) -> bool {
        let index = (component_id as usize) / 64;
        if index >= SIGNATURE_SIZE { return false; }
        let bits = (component_id as usize) % 64;
        (self.components[index] >> bits) & 1 == 1
    }

    /// Returns a copy of this signature with `component_id` set.
    #[inline]
    pub fn with(mut self, component_id: ComponentID) -> Self {
        self.set(component_id);
        self
    }

    /// Returns a copy of this signature with `component_id` cleared.
    #[inline]
    pub fn without(mut self, component_id: ComponentID) -> Self {
        self.clear(component_id);
        self
    }

    /// Returns `true` if all components in `signature` are present.
    #[inline]
    pub fn contains_all(&self, signature: &Signature) -> bool {
        for (component_a, component_b) in self.components.iter().zip(signature.components.iter()) {
            if (component_a & component_b) != *component_b { return false; }
        }
        true
    }

    /// Returns `true` if at least one component of `signature` is present.
    #[inline]
    pub fn intersects(&self, signature: &Signature) -> bool {
        self.components
            .iter()
            .zip(signature.components.iter())
            .any(|(a, b)| (a & b) != 0)
    }

    /// Returns `true` if no component of `signature` is present.
    #[inline]
    pub fn is_disjoint(&self, signature: &Signature) -> bool {
        !self.intersects(signature)
    }

    /// Returns `true` if no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(|&word| word == 0)
    }

    /// Number of components in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.components.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Iterates over all component IDs set in this signature, in ascending order.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.components
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentID)
                })
            })
    }
}

/// Builds a component signature from a list of component IDs.
pub fn build_signature(component_ids: &[ComponentID]) -> Signature {
    let mut signature = Signature::default();
    for &component_id in component_ids { signature.set(component_id); }
    signature
}

/// Archetype predicate evaluated by the query engine.
///
/// ## Semantics
/// An archetype with signature `S` matches when:
/// - `S ⊇ all`,
/// - `any` is empty or `S ∩ any ≠ ∅`,
/// - `S ∩ without = ∅`,
/// - and, for exact queries, `S == all`.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuerySignature {
    /// Components every matching archetype must contain.
    pub all: Signature,

    /// Components of which a matching archetype must contain at least one.
    pub any: Signature,

    /// Components explicitly excluded from the query.
    pub without: Signature,

    /// When set, the archetype signature must equal `all`.
    pub exact: bool,
}

impl QuerySignature {
    /// Returns `true` if an archetype with `archetype_signature` satisfies this query.
    pub fn matches(&self, archetype_signature: &Signature) -> bool {
        if self.exact {
            return *archetype_signature == self.all;
        }

        archetype_signature.contains_all(&self.all)
            && (self.any.is_empty() || archetype_signature.intersects(&self.any))
            && archetype_signature.is_disjoint(&self.without)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_set_clear_and_iterate() {
        let mut signature = Signature::default();
        signature.set(3);
        signature.set(64);
        signature.set(200);
        assert!(signature.has(64));
        assert_eq!(signature.count(), 3);
        assert_eq!(signature.iterate_over_components().collect::<Vec<_>>(), vec![3, 64, 200]);

        signature.clear(64);
        assert!(!signature.has(64));
        assert_eq!(signature.count(), 2);
    }

    #[test]
    #[should_panic(expected = "component id 256 is not registered")]
    fn set_past_capacity_panics() {
        Signature::default().set(COMPONENT_CAP as ComponentID);
    }

    #[test]
    fn clear_past_capacity_is_a_no_op() {
        let mut signature = build_signature(&[1]);
        signature.clear(1000);
        assert_eq!(signature, build_signature(&[1]));
    }

    #[test]
    fn signatures_with_same_members_are_equal_regardless_of_order() {
        assert_eq!(build_signature(&[5, 1, 9]), build_signature(&[9, 5, 1]));
    }

    #[test]
    fn query_signature_predicates() {
        let archetype = build_signature(&[0, 1, 2]);

        let all = QuerySignature { all: build_signature(&[0, 2]), ..Default::default() };
        assert!(all.matches(&archetype));

        let any = QuerySignature { any: build_signature(&[7, 1]), ..Default::default() };
        assert!(any.matches(&archetype));

        let excluded = QuerySignature {
            any: build_signature(&[0]),
            without: build_signature(&[2]),
            ..Default::default()
        };
        assert!(!excluded.matches(&archetype));

        let exact = QuerySignature { all: build_signature(&[0, 1]), exact: true, ..Default::default() };
        assert!(!exact.matches(&archetype));
        assert!(exact.matches(&build_signature(&[1, 0])));
    }
}
