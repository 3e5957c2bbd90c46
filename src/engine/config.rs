//! World construction parameters.

/// Tunables applied when a [`World`](crate::World) is constructed.
///
/// ## Fields
/// - `initial_archetype_capacity`: rows reserved the first time an archetype
///   receives an entity. Capacity doubles from there.
/// - `entity_growth`: number of entity slots the allocator adds whenever its
///   free list runs dry.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Rows reserved for an archetype's first allocation.
    pub initial_archetype_capacity: usize,

    /// Entity slots added per allocator growth step.
    pub entity_growth: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_archetype_capacity: 16,
            entity_growth: 1024,
        }
    }
}

impl WorldConfig {
    /// Sets the initial archetype capacity. Values below 1 are clamped to 1.
    pub fn with_initial_archetype_capacity(mut self, rows: usize) -> Self {
        self.initial_archetype_capacity = rows.max(1);
        self
    }

    /// Sets the allocator growth step. Values below 1 are clamped to 1.
    pub fn with_entity_growth(mut self, slots: u32) -> Self {
        self.entity_growth = slots.max(1);
        self
    }
}
