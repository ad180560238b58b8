//! Program emitter (spec.md §4.3): walks terms in variable order and emits
//! the linear opcode sequence the VM drives.

use crate::op::{OpKind, Operation};
use crate::pair::{Pair, RegMask};
use crate::term::{slot_name, Signature, Slot, Term};
use crate::types::{EntityId, NO_VAR, VarId};
use crate::variable::{VariableKind, Variables};
use crate::world::World;

/// Emit the bytecode program for `signature`, given its already-analyzed
/// [`Variables`].
pub fn emit<W: World>(signature: &Signature, vars: &Variables, world: &W) -> Vec<Operation> {
    let mut ops = vec![Operation::input()];
    let mut table_written = vec![false; vars.len()];
    let mut entity_written = vec![false; vars.len()];

    // Step 2 — constant-subject terms.
    for (col, term) in signature.iter().enumerate() {
        if let Slot::Entity(subject) = &term.subject {
            let pair = compile_pair(term, vars, world);
            push_op(
                &mut ops,
                OpKind::With,
                Some(pair),
                Some(*subject),
                col,
                NO_VAR,
                false,
                NO_VAR,
                false,
            );
            mark_term_written(term, vars, &mut entity_written);
        }
    }

    // Step 3 — subject variables in sort order.
    for v in &vars.vars {
        if v.kind != VariableKind::Table {
            continue;
        }
        for (col, term) in signature.iter().enumerate() {
            if slot_name(&term.subject) != Some(v.name.as_str()) {
                continue;
            }

            let entity_id = vars.entity_id(&v.name);
            let already_entity_written = entity_id.map_or(false, |id| entity_written[id as usize]);
            let already_table_written = table_written[v.id as usize];

            let pair = compile_pair(term, vars, world);

            if already_entity_written {
                let eid = entity_id.unwrap();
                push_op(&mut ops, OpKind::With, Some(pair), None, col, eid, true, NO_VAR, false);
            } else if already_table_written {
                push_op(&mut ops, OpKind::With, Some(pair), None, col, v.id, true, NO_VAR, false);
            } else {
                let kind = if pair.transitive { OpKind::Dfs } else { OpKind::Select };
                push_op(&mut ops, kind, Some(pair), None, col, NO_VAR, false, v.id, true);
                table_written[v.id as usize] = true;
            }

            mark_term_written(term, vars, &mut entity_written);
        }
    }

    // Step 4 — Each for every unwritten Entity-kind variable whose Table
    // companion was written (write_variable).
    for v in &vars.vars {
        if v.kind != VariableKind::Entity || entity_written[v.id as usize] {
            continue;
        }
        if let Some(table_id) = vars.table_id(&v.name) {
            if table_written[table_id as usize] {
                let op_index = ops.len();
                ops.push(Operation {
                    kind: OpKind::Each,
                    param: None,
                    subject: None,
                    on_ok: Some(op_index + 1),
                    on_fail: Some(op_index.saturating_sub(1)),
                    column: 0,
                    r_in: table_id,
                    r_out: v.id,
                    has_in: true,
                    has_out: true,
                });
                entity_written[v.id as usize] = true;
            }
        }
    }

    // Step 5 — Yield. Prefer the `This` entity incarnation (a single-row
    // result per reification); fall back to the table incarnation (a bulk
    // table result) when `.` never occurred as a predicate/object; a rule
    // with no `.` at all yields a boolean.
    let r_in = vars.entity_id(".").or_else(|| vars.table_id(".")).unwrap_or(NO_VAR);
    let has_in = r_in != NO_VAR;
    let operation_count = ops.len() + 1;
    ops.push(Operation::yield_op(operation_count, r_in, has_in));

    ops
}

#[allow(clippy::too_many_arguments)]
fn push_op(
    ops: &mut Vec<Operation>,
    kind: OpKind,
    param: Option<Pair>,
    subject: Option<EntityId>,
    column: usize,
    r_in: VarId,
    has_in: bool,
    r_out: VarId,
    has_out: bool,
) {
    let op_index = ops.len();
    ops.push(Operation {
        kind,
        param,
        subject,
        on_ok: Some(op_index + 1),
        on_fail: Some(op_index.saturating_sub(1)),
        column,
        r_in,
        r_out,
        has_in,
        has_out,
    });
}

/// Mark any variable occupying `term`'s predicate/object slots as
/// Entity-written — the op just emitted for this term reifies them via its
/// pair's `lo_var`/`hi_var` on a successful match.
fn mark_term_written(term: &Term, vars: &Variables, entity_written: &mut [bool]) {
    for slot in std::iter::once(&term.predicate).chain(term.object.iter()) {
        if let Some(name) = slot_name(slot) {
            if let Some(id) = vars.entity_id(name) {
                entity_written[id as usize] = true;
            }
        }
    }
}

/// Compile a term's predicate/object into a [`Pair`] (spec.md §4.1), given
/// the analyzer's resolved variable ids.
fn compile_pair<W: World>(term: &Term, vars: &Variables, world: &W) -> Pair {
    let (pred, pred_is_var) = compile_half(&term.predicate, vars);

    let (obj, obj_is_var, has_obj) = match &term.object {
        Some(slot) => {
            let (o, is_var) = compile_half(slot, vars);
            (o, is_var, true)
        }
        None => (0, false, false),
    };

    let mut reg_mask = RegMask::empty();
    if pred_is_var {
        reg_mask |= RegMask::PRED_VAR;
    }
    if obj_is_var {
        reg_mask |= RegMask::OBJ_VAR;
    }

    let transitive = has_obj && !pred_is_var && world.is_transitive(pred as EntityId);

    Pair {
        pred,
        obj,
        has_obj,
        reg_mask,
        transitive,
    }
}

/// Resolve one predicate/object slot to its 32-bit pair half and whether it
/// names a variable.
fn compile_half(slot: &Slot, vars: &Variables) -> (u32, bool) {
    match slot {
        Slot::Entity(e) => (*e as u32, false),
        Slot::This => (vars.entity_id(".").expect("This materialized by analyzer phase 2"), true),
        Slot::Var(name) => (
            vars.entity_id(name).expect("variable materialized by analyzer phase 2"),
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::analyze;
    use crate::world::memory::MemoryWorld;

    fn world_with_transitive(pred: EntityId) -> MemoryWorld {
        let mut w = MemoryWorld::default();
        w.mark_transitive(pred);
        w
    }

    #[test]
    fn program_starts_with_input_and_ends_with_yield() {
        let terms = vec![Term::unary(Slot::Entity(1), Slot::This)];
        let vars = analyze(&terms, 256).unwrap();
        let world = MemoryWorld::default();
        let ops = emit(&terms, &vars, &world);

        assert_eq!(ops.first().unwrap().kind, OpKind::Input);
        assert_eq!(ops.first().unwrap().on_ok, Some(1));
        assert_eq!(ops.first().unwrap().on_fail, None);

        let last = ops.last().unwrap();
        assert_eq!(last.kind, OpKind::Yield);
        assert_eq!(last.on_fail, Some(ops.len() - 2));
    }

    #[test]
    fn first_sighting_of_non_transitive_subject_emits_select() {
        let terms = vec![Term::binary(Slot::Entity(10), Slot::This, Slot::var("X"))];
        let vars = analyze(&terms, 256).unwrap();
        let world = MemoryWorld::default();
        let ops = emit(&terms, &vars, &world);

        assert!(ops.iter().any(|op| op.kind == OpKind::Select));
    }

    #[test]
    fn first_sighting_of_transitive_subject_emits_dfs() {
        let terms = vec![Term::binary(Slot::Entity(10), Slot::This, Slot::var("X"))];
        let vars = analyze(&terms, 256).unwrap();
        let world = world_with_transitive(10);
        let ops = emit(&terms, &vars, &world);

        assert!(ops.iter().any(|op| op.kind == OpKind::Dfs));
    }

    #[test]
    fn second_term_on_same_subject_emits_with() {
        let terms = vec![
            Term::binary(Slot::Entity(10), Slot::This, Slot::var("X")),
            Term::binary(Slot::Entity(20), Slot::This, Slot::Entity(99)),
        ];
        let vars = analyze(&terms, 256).unwrap();
        let world = MemoryWorld::default();
        let ops = emit(&terms, &vars, &world);

        let with_ops: Vec<_> = ops.iter().filter(|op| op.kind == OpKind::With).collect();
        assert_eq!(with_ops.len(), 1);
        assert!(with_ops[0].has_in);
    }

    #[test]
    fn jump_targets_stay_in_range() {
        let terms = vec![
            Term::binary(Slot::Entity(10), Slot::var("X"), Slot::var("Y")),
            Term::binary(Slot::Entity(10), Slot::var("Y"), Slot::var("Z")),
        ];
        let vars = analyze(&terms, 256).unwrap();
        let world = world_with_transitive(10);
        let ops = emit(&terms, &vars, &world);

        for (i, op) in ops.iter().enumerate().skip(1) {
            assert!(op.on_fail.unwrap() < i);
            if let Some(on_ok) = op.on_ok {
                assert!(on_ok > i && on_ok <= ops.len());
            }
        }
    }
}
