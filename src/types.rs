//! Packed entity identifiers and the sentinel values the solver reserves.

/// 64-bit entity identifier.
///
/// A relational id packs an object into the high 32 bits and a predicate
/// into the low 32 bits, with a role-bit field occupying the top byte:
/// `(object << 32) | predicate`, masked against [`ROLE_MASK`] and
/// [`COMPONENT_MASK`]. A unary (non-relational) id is just the low 32 bits.
pub type EntityId = u64;

/// Identifies a table within a [`crate::world::World`].
pub type TableId = u32;

/// Index of a row within a table.
pub type Row = u32;

/// Index of a column within a table's type.
pub type Column = u32;

/// Index of a [`crate::variable::Variable`] in the (post-sort) variable array.
pub type VarId = u32;

/// Sentinel "no variable" id, used for `lo_var`/`hi_var`/`r_in`/`r_out` slots
/// that have nothing bound. Spec.md uses `-1`; this crate reserves `u32::MAX`
/// since register/variable indices are unsigned throughout.
pub const NO_VAR: VarId = VarId::MAX;

/// Flag bits reserved in the top byte of a packed id to mark it as a pair.
pub const ROLE_MASK: u64 = 0xff << 56;

/// Role bit identifying a packed (predicate, object) pair.
pub const ROLE_PAIR: u64 = 1 << 56;

/// Mask isolating the low 32 bits (the predicate half) of a packed id.
pub const PREDICATE_MASK: u64 = 0xffff_ffff;

/// Mask isolating the high bits (the object half) of a packed id, before the
/// shift back down to a plain 32-bit value. Excludes the role byte, which
/// overlaps the object's own top byte once shifted into the high 32 bits.
pub const COMPONENT_MASK: u64 = 0x00ff_ffff;

/// Sentinel id that matches any id in either half of a packed pair.
///
/// Reserved so that it can never collide with a real entity id; excluded
/// from `Each`'s output alongside [`THIS`] to keep sentinels from leaking
/// into user-visible results (see the design notes on wildcards).
pub const WILDCARD: EntityId = EntityId::MAX;

/// The distinguished root placeholder `.` ("This") used in term subjects.
pub const THIS: EntityId = EntityId::MAX - 1;

/// Packs a binary term `P(_, O)` into `(O << 32) | P`, with the pair role
/// bit set.
pub const fn pack_pair(pred: u32, obj: u32) -> EntityId {
    ((obj as u64) << 32) | (pred as u64) | ROLE_PAIR
}

/// Packs a unary term `P(_)` into its bare predicate id.
pub const fn pack_unary(pred: u32) -> EntityId {
    pred as u64
}

/// Low (predicate) half of a packed id, role bits stripped.
pub const fn low(id: EntityId) -> u32 {
    (id & PREDICATE_MASK) as u32
}

/// High (object) half of a packed id.
pub const fn high(id: EntityId) -> u32 {
    ((id >> 32) & COMPONENT_MASK) as u32
}

/// True if `id` is the wildcard or This sentinel — values that must never
/// be handed back to a caller as a resolved entity.
pub const fn is_sentinel(id: EntityId) -> bool {
    id == WILDCARD || id == THIS
}
