//! External interface to the ECS world (spec.md §6).
//!
//! The solver never touches table storage directly — it only calls through
//! [`World`], a small, enumerated, read-only interface. This module also
//! ships [`memory::MemoryWorld`], a reference in-memory implementation used
//! by this crate's own tests and by callers who want to exercise the solver
//! without a full ECS engine attached.

use std::collections::HashMap;

use crate::types::{Column, EntityId, Row, TableId};

/// One entry of a [`TableSet`]: a table known to contain a given packed id,
/// and the first column at which it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    /// The table.
    pub table: TableId,
    /// First column index within the table's type where the id appears.
    pub column: Column,
}

/// The tables containing a given (possibly wildcard-bearing) packed id,
/// indexed for both ordered iteration (`Select`) and O(1) probing by table
/// id (`With`).
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    records: Vec<TableRecord>,
    by_table: HashMap<TableId, Column>,
}

impl TableSet {
    /// Build a table set from its member records, in iteration order.
    pub fn new(records: Vec<TableRecord>) -> Self {
        let by_table = records.iter().map(|r| (r.table, r.column)).collect();
        Self { records, by_table }
    }

    /// Iterate the set's records in the world's deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TableRecord> {
        self.records.iter()
    }

    /// Record at a given index, for `Select`'s ordered walk.
    pub fn get_index(&self, index: usize) -> Option<&TableRecord> {
        self.records.get(index)
    }

    /// Number of member tables.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the set has no member tables.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// O(1) probe: the column at which `table` first carries this set's id,
    /// if `table` is a member.
    pub fn column_of(&self, table: TableId) -> Option<Column> {
        self.by_table.get(&table).copied()
    }
}

/// A storage bucket for entities sharing an identical component set.
pub trait Table {
    /// The sorted sequence of component/pair ids all rows share.
    fn ty(&self) -> &[EntityId];
    /// Number of rows.
    fn count(&self) -> u32;
    /// The entity id stored at `row`.
    fn entity_at(&self, row: Row) -> EntityId;
}

/// The read-only interface the solver calls into the world through
/// (spec.md §6 "Dependencies on the world").
pub trait World {
    /// Concrete table type.
    type Table: Table;

    /// The table set for a packed id, which may contain [`crate::types::WILDCARD`]
    /// halves — the world must index both concrete ids and their wildcard
    /// forms (`(P, *)`, `(*, O)`, `*`).
    fn table_set(&self, mask: EntityId) -> Option<&TableSet>;

    /// The table a concrete entity currently lives in.
    fn table_from_entity(&self, e: EntityId) -> Option<TableId>;

    /// The table and row a concrete entity currently occupies.
    fn record_of(&self, e: EntityId) -> Option<(TableId, Row)>;

    /// `true` if `predicate` is declared transitive.
    fn is_transitive(&self, predicate: EntityId) -> bool;

    /// Fetch a table by id.
    fn table(&self, id: TableId) -> &Self::Table;
}

pub mod memory {
    //! A minimal in-memory [`World`] implementation, for tests and standalone
    //! use without a full ECS engine.

    use std::collections::HashMap;

    use super::{Table as TableTrait, TableRecord, TableSet, World};
    use crate::pair::WILDCARD_HALF;
    use crate::types::{self, pack_pair, pack_unary, EntityId, Row, TableId};

    /// A table: a fixed, sorted component type shared by every row.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryTable {
        ty: Vec<EntityId>,
        entities: Vec<EntityId>,
    }

    impl TableTrait for MemoryTable {
        fn ty(&self) -> &[EntityId] {
            &self.ty
        }

        fn count(&self) -> u32 {
            self.entities.len() as u32
        }

        fn entity_at(&self, row: Row) -> EntityId {
            self.entities[row as usize]
        }
    }

    /// A simple in-memory ECS world: a fixed set of tables plus the
    /// wildcard-aware index the solver requires.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryWorld {
        tables: Vec<MemoryTable>,
        index: HashMap<EntityId, TableSet>,
        entity_location: HashMap<EntityId, (TableId, Row)>,
        transitive: std::collections::HashSet<EntityId>,
    }

    impl MemoryWorld {
        /// Declare `predicate` as transitive.
        pub fn mark_transitive(&mut self, predicate: EntityId) {
            self.transitive.insert(predicate);
        }

        /// Add a table whose rows are `(entity, relations)` pairs, where
        /// `relations` lists every `(predicate, object)` fact that entity
        /// carries plus any plain (unary) component ids. Builds the
        /// wildcard index incrementally.
        pub fn add_table(&mut self, rows: Vec<(EntityId, Vec<EntityId>)>) -> TableId {
            let table_id = self.tables.len() as TableId;
            let mut ty: Vec<EntityId> = rows.iter().flat_map(|(_, ids)| ids.iter().copied()).collect();
            ty.sort_unstable();
            ty.dedup();

            let entities: Vec<EntityId> = rows.iter().map(|(e, _)| *e).collect();
            for (row, (e, _)) in rows.iter().enumerate() {
                self.entity_location.insert(*e, (table_id, row as Row));
            }

            for (col, &id) in ty.iter().enumerate() {
                self.index_id(id, table_id, col as u32);
            }

            self.tables.push(MemoryTable { ty, entities });
            table_id
        }

        fn index_id(&mut self, id: EntityId, table: TableId, column: u32) {
            self.push_record(id, table, column);

            if id & types::ROLE_PAIR != 0 {
                let pred = types::low(id);
                let obj = types::high(id);
                let pred_wild = pack_pair(pred, WILDCARD_HALF);
                let obj_wild = pack_pair(WILDCARD_HALF, obj);
                let all_wild = pack_pair(WILDCARD_HALF, WILDCARD_HALF);
                self.push_record(pred_wild, table, column);
                self.push_record(obj_wild, table, column);
                self.push_record(all_wild, table, column);
            } else {
                let wild = pack_unary(WILDCARD_HALF);
                self.push_record(wild, table, column);
            }
        }

        fn push_record(&mut self, key: EntityId, table: TableId, column: u32) {
            let set = self.index.entry(key).or_default();
            if !set.by_table_contains(table) {
                set.push(TableRecord { table, column });
            }
        }
    }

    impl TableSet {
        fn by_table_contains(&self, table: TableId) -> bool {
            self.column_of(table).is_some()
        }

        fn push(&mut self, record: TableRecord) {
            self.records_mut().push(record);
            self.by_table_mut().insert(record.table, record.column);
        }

        fn records_mut(&mut self) -> &mut Vec<TableRecord> {
            &mut self.records
        }

        fn by_table_mut(&mut self) -> &mut HashMap<TableId, u32> {
            &mut self.by_table
        }
    }

    impl World for MemoryWorld {
        type Table = MemoryTable;

        fn table_set(&self, mask: EntityId) -> Option<&TableSet> {
            self.index.get(&mask)
        }

        fn table_from_entity(&self, e: EntityId) -> Option<TableId> {
            self.entity_location.get(&e).map(|(t, _)| *t)
        }

        fn record_of(&self, e: EntityId) -> Option<(TableId, Row)> {
            self.entity_location.get(&e).copied()
        }

        fn is_transitive(&self, predicate: EntityId) -> bool {
            self.transitive.contains(&predicate)
        }

        fn table(&self, id: TableId) -> &Self::Table {
            &self.tables[id as usize]
        }
    }
}
