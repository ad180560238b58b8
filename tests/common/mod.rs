//! Shared fixture for integration tests: a small social world with
//! `Alice`/`Bob`/`Carol`/`Apple`, modeling a transitive `Knows` relation and a
//! plain `Eats` relation (spec.md §8's worked examples use this same shape).

#![allow(dead_code)]

use ecs_rule_solver::types::pack_pair;
use ecs_rule_solver::world::memory::MemoryWorld;
use ecs_rule_solver::world::Table;
use ecs_rule_solver::prelude::EntityId;

pub const ALICE: EntityId = 1;
pub const BOB: EntityId = 2;
pub const CAROL: EntityId = 3;
pub const APPLE: EntityId = 4;

pub const KNOWS: u32 = 10;
pub const EATS: u32 = 20;

/// Table ids `social_world` assigns its three rows, in add order.
pub const ALICE_TABLE: u32 = 0;
pub const BOB_TABLE: u32 = 1;
pub const CAROL_TABLE: u32 = 2;

/// `Alice Knows Bob`, `Bob Knows Carol`, both `Alice` and `Bob` `Eats Apple`.
/// `Carol` carries no outgoing facts. `Knows` is declared transitive.
pub fn social_world() -> MemoryWorld {
    let mut world = MemoryWorld::default();
    world.mark_transitive(KNOWS as EntityId);
    world.add_table(vec![(ALICE, vec![pack_pair(KNOWS, BOB as u32), pack_pair(EATS, APPLE as u32)])]);
    world.add_table(vec![(BOB, vec![pack_pair(KNOWS, CAROL as u32), pack_pair(EATS, APPLE as u32)])]);
    world.add_table(vec![(CAROL, vec![])]);
    world
}

/// The single entity a table's lone row holds, for fixtures built above
/// where every table has exactly one row.
pub fn only_entity(world: &MemoryWorld, table_id: u32) -> EntityId {
    world.table(table_id).entity_at(0)
}

/// `Alice Knows Bob`, `Bob Knows Carol`, `Carol Knows Alice` — a closed
/// transitive cycle, for exercising termination over a relation that never
/// bottoms out at a fact-free table.
pub fn cyclic_world() -> MemoryWorld {
    let mut world = MemoryWorld::default();
    world.mark_transitive(KNOWS as EntityId);
    world.add_table(vec![(ALICE, vec![pack_pair(KNOWS, BOB as u32)])]);
    world.add_table(vec![(BOB, vec![pack_pair(KNOWS, CAROL as u32)])]);
    world.add_table(vec![(CAROL, vec![pack_pair(KNOWS, ALICE as u32)])]);
    world
}
