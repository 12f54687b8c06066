//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Catalog rows (items, units, warehouses, bins) are entities: the store indexes
/// them by this id.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
