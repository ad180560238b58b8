//! Compiled operations: the bytecode program's instruction format
//! (spec.md §3, §4.3).

use strum::Display;

use crate::pair::Pair;
use crate::types::{EntityId, VarId, NO_VAR};

/// An opcode, one of the six the program emitter can produce.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Program entry point. Always operation 0.
    Input,
    /// First sighting of a non-transitive subject variable: binds a table.
    Select,
    /// First sighting of a transitive subject variable: DFS over the
    /// relation graph.
    Dfs,
    /// A subject already bound (as table or entity) in an earlier op:
    /// probes a known table/entity for this term's pair.
    With,
    /// Expands a Table-kind variable into its Entity-kind companion, one
    /// row at a time.
    Each,
    /// Suspension point: exposes a result to the caller.
    Yield,
}

/// One instruction of the compiled program.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The opcode.
    pub kind: OpKind,
    /// The term's compiled pair, for `Select`/`Dfs`/`With`. Unused by
    /// `Input`/`Each`/`Yield`.
    pub param: Option<Pair>,
    /// Constant subject entity, used when `r_in == NO_VAR` for a `With`
    /// whose subject was a ground entity rather than a variable.
    pub subject: Option<EntityId>,
    /// Jump target on success; `-1` (`None`) only for `Input`'s `on_fail`.
    pub on_ok: Option<usize>,
    /// Jump target on failure (redo the previous op); `None` terminates the
    /// program (hard fail).
    pub on_fail: Option<usize>,
    /// Index into the rule's signature this op's match is stashed under.
    pub column: usize,
    /// Input register: the variable this op reads to resolve its subject.
    /// `NO_VAR` when the subject was a ground entity (see `subject`).
    pub r_in: VarId,
    /// Output register: the variable this op writes on a match.
    pub r_out: VarId,
    /// `true` if `r_in` is meaningful.
    pub has_in: bool,
    /// `true` if `r_out` is meaningful.
    pub has_out: bool,
}

impl Operation {
    /// The program's mandatory first operation (spec.md invariant (a)).
    pub fn input() -> Self {
        Self {
            kind: OpKind::Input,
            param: None,
            subject: None,
            on_ok: Some(1),
            on_fail: None,
            column: 0,
            r_in: NO_VAR,
            r_out: NO_VAR,
            has_in: false,
            has_out: false,
        }
    }

    /// The program's mandatory last operation (spec.md invariant (b)).
    ///
    /// `r_in`/`has_in` name the `This` variable's incarnation to expose as
    /// the result, if the rule has one (spec.md §4.4 "Yield").
    pub fn yield_op(operation_count: usize, r_in: VarId, has_in: bool) -> Self {
        Self {
            kind: OpKind::Yield,
            param: None,
            subject: None,
            on_ok: None,
            on_fail: Some(operation_count.saturating_sub(2)),
            column: 0,
            r_in,
            r_out: NO_VAR,
            has_in,
            has_out: false,
        }
    }
}
