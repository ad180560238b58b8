//! Structural invariants, the round-trip property, and the boundary cases
//! from spec.md §8, plus a property test over arbitrary chain lengths.

mod common;

use std::collections::HashSet;

use ecs_rule_solver::op::OpKind;
use ecs_rule_solver::prelude::*;
use ecs_rule_solver::term::{Term, Slot};
use ecs_rule_solver::world::memory::MemoryWorld;
use quickcheck_macros::quickcheck;

use common::*;

/// Every emitted program starts with `Input` and ends with `Yield`, and no
/// op's jump targets point outside the program or backward on success /
/// forward on failure (spec.md §8 invariants on op wiring).
fn assert_program_well_formed<W: World>(rule: &Rule<'_, W>) {
    let ops = rule.operations();
    assert_eq!(ops.first().unwrap().kind, OpKind::Input);
    assert_eq!(ops.last().unwrap().kind, OpKind::Yield);

    for (i, op) in ops.iter().enumerate() {
        if let Some(on_fail) = op.on_fail {
            assert!(on_fail < i, "op {i}'s on_fail ({on_fail}) must point to an earlier op");
        } else {
            assert_eq!(i, 0, "only Input may have no on_fail");
        }
        if let Some(on_ok) = op.on_ok {
            assert!(on_ok > i && on_ok <= ops.len(), "op {i}'s on_ok ({on_ok}) must point forward and in range");
        } else {
            assert_eq!(op.kind, OpKind::Yield, "only Yield may have no on_ok");
        }
    }
}

#[test]
fn ground_rule_round_trips_to_zero_or_one_result() {
    let world = social_world();

    let true_fact = vec![Term::binary(Slot::Entity(KNOWS as EntityId), Slot::Entity(ALICE), Slot::Entity(BOB))];
    let rule = Rule::compile(&world, true_fact).unwrap();
    assert_program_well_formed(&rule);
    let mut iter = rule.iter();
    assert_eq!(iter.next_match(), Some(RuleMatch::Boolean));
    assert_eq!(iter.next_match(), None);

    let false_fact = vec![Term::binary(Slot::Entity(KNOWS as EntityId), Slot::Entity(CAROL), Slot::Entity(ALICE))];
    let rule = Rule::compile(&world, false_fact).unwrap();
    let mut iter = rule.iter();
    // Carol has no outgoing facts at all, so even the transitive fallback
    // finds nothing to chain through.
    assert_eq!(iter.next_match(), None);
}

#[test]
fn this_appearing_once_yields_every_containing_table() {
    let world = social_world();
    let terms = vec![Term::binary(Slot::Entity(EATS as EntityId), Slot::This, Slot::Entity(APPLE))];
    let rule = Rule::compile(&world, terms).unwrap();
    assert_program_well_formed(&rule);
    let mut iter = rule.iter();

    let mut tables = HashSet::new();
    while let Some(m) = iter.next_match() {
        match m {
            RuleMatch::Table { table_id, row_count } => {
                assert_eq!(row_count, 1);
                tables.insert(table_id);
            }
            other => panic!("expected a Table match, got {other:?}"),
        }
    }
    assert_eq!(tables, [ALICE_TABLE, BOB_TABLE].into_iter().collect());
}

#[test]
fn wildcard_predicate_and_object_enumerates_every_pair() {
    let world = social_world();
    let terms = vec![Term::binary(Slot::var("P"), Slot::This, Slot::var("O"))];
    let rule = Rule::compile(&world, terms).unwrap();
    assert_program_well_formed(&rule);
    let p = rule.find_variable("P").unwrap();
    let o = rule.find_variable("O").unwrap();
    let mut iter = rule.iter();

    let mut seen = HashSet::new();
    while let Some(m) = iter.next_match() {
        let table_id = match m {
            RuleMatch::Table { table_id, .. } => table_id,
            other => panic!("expected a Table match, got {other:?}"),
        };
        seen.insert((table_id, iter.variable(p), iter.variable(o)));
    }

    let expected: HashSet<(u32, EntityId, EntityId)> = [
        (ALICE_TABLE, KNOWS as EntityId, BOB),
        (ALICE_TABLE, EATS as EntityId, APPLE),
        (BOB_TABLE, KNOWS as EntityId, CAROL),
        (BOB_TABLE, EATS as EntityId, APPLE),
    ]
    .into_iter()
    .collect();
    assert_eq!(seen, expected);
}

#[test]
fn transitive_cycle_terminates() {
    let world = cyclic_world();
    let terms = vec![Term::binary(Slot::Entity(KNOWS as EntityId), Slot::This, Slot::Entity(ALICE))];
    let rule = Rule::compile(&world, terms).unwrap();
    assert_program_well_formed(&rule);
    let mut iter = rule.iter();

    let mut tables = HashSet::new();
    for _ in 0..8 {
        match iter.next_match() {
            Some(RuleMatch::Table { table_id, .. }) => {
                tables.insert(table_id);
            }
            Some(other) => panic!("expected a Table match, got {other:?}"),
            None => break,
        }
    }
    assert_eq!(iter.next_match(), None, "a cyclic relation must still terminate");
    assert_eq!(tables, [ALICE_TABLE, BOB_TABLE, CAROL_TABLE].into_iter().collect());
}

/// `Knows(V0, V1), Knows(V1, V2), ..., Knows(V(n-1), Vn)` for a handful of
/// arbitrary chain lengths: the emitted program must stay well-formed no
/// matter how many links the chain has.
#[quickcheck]
fn chain_of_any_length_compiles_to_a_well_formed_program(len: u8) -> bool {
    let len = (len % 6) as usize + 1;
    let world = MemoryWorld::default();
    let names: Vec<String> = (0..=len).map(|i| format!("V{i}")).collect();
    let terms: Vec<Term> = names
        .windows(2)
        .map(|pair| Term::binary(Slot::Entity(KNOWS as EntityId), Slot::var(pair[0].clone()), Slot::var(pair[1].clone())))
        .collect();

    let rule = match Rule::compile(&world, terms) {
        Ok(rule) => rule,
        Err(_) => return false,
    };

    let ops = rule.operations();
    if ops.first().map(|op| op.kind) != Some(OpKind::Input) {
        return false;
    }
    if ops.last().map(|op| op.kind) != Some(OpKind::Yield) {
        return false;
    }
    ops.iter().enumerate().all(|(i, op)| {
        let ok_in_range = op.on_ok.map_or(op.kind == OpKind::Yield, |t| t > i && t <= ops.len());
        let fail_in_range = op.on_fail.map_or(i == 0, |t| t < i);
        ok_in_range && fail_in_range
    })
}
