//! Compile-time rejection cases (spec.md §7): a malformed rule must fail
//! `Rule::compile` with a typed error, never panic.

mod common;

use ecs_rule_solver::error::RuleError;
use ecs_rule_solver::limits::Limits;
use ecs_rule_solver::prelude::*;
use ecs_rule_solver::term::{Term, Slot};

use common::*;

#[test]
fn too_many_subject_variables_rejected() {
    let world = social_world();
    let terms = vec![
        Term::unary(Slot::Entity(KNOWS as EntityId), Slot::var("A")),
        Term::unary(Slot::Entity(EATS as EntityId), Slot::var("B")),
    ];
    let limits = Limits {
        max_subject_variables: 1,
        ..Limits::default()
    };

    match Rule::compile_with_limits(&world, terms, limits) {
        Err(RuleError::TooManyVariables { max, .. }) => assert_eq!(max, 1),
        other => panic!("expected TooManyVariables, got {other:?}"),
    }
}

#[test]
fn fully_disconnected_subjects_are_each_unconstrained() {
    let world = social_world();
    // Two subjects that never reference one another: `A` is discovered
    // first and wins the occurrence tie for root election, leaving `B`
    // unreachable.
    let terms = vec![
        Term::unary(Slot::Entity(KNOWS as EntityId), Slot::var("A")),
        Term::unary(Slot::Entity(EATS as EntityId), Slot::var("B")),
    ];
    match Rule::compile(&world, terms) {
        Err(RuleError::UnconstrainedVariable { name, .. }) => assert_eq!(name, "B"),
        other => panic!("expected UnconstrainedVariable(\"B\"), got {other:?}"),
    }
}

#[test]
fn single_ground_term_compiles_with_no_variables() {
    let world = social_world();
    let terms = vec![Term::unary(Slot::Entity(KNOWS as EntityId), Slot::Entity(ALICE))];
    let rule = Rule::compile(&world, terms).expect("a fully ground rule has nothing to analyze");
    assert_eq!(rule.variable_count(), 0);
}
