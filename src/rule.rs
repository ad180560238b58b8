//! Public surface: [`Rule`] (the compiler's output) and [`RuleIter`] (the
//! VM driver's public face). Spec.md §6 "External interfaces".

use std::fmt;

use crate::emit::emit;
use crate::error::RuleError;
use crate::limits::Limits;
use crate::op::Operation;
use crate::pair::{Pair, RegMask};
use crate::term::Signature;
use crate::types::{EntityId, Row, TableId, VarId};
use crate::variable::{analyze, VariableKind, Variables};
use crate::vm::{Driver, YieldBinding};
use crate::world::{Table, World};

/// A compiled rule: the parsed signature, its analyzed variables, and the
/// emitted program, borrowing the world it was compiled against.
pub struct Rule<'w, W: World> {
    world: &'w W,
    signature: Signature,
    variables: Variables,
    operations: Vec<Operation>,
    column_count: usize,
}

impl<'w, W: World> Rule<'w, W> {
    /// Compile `signature` against `world` using [`Limits::default`].
    pub fn compile(world: &'w W, signature: Signature) -> Result<Self, RuleError> {
        Self::compile_with_limits(world, signature, Limits::default())
    }

    /// Compile `signature` against `world` with caller-supplied limits.
    pub fn compile_with_limits(world: &'w W, signature: Signature, limits: Limits) -> Result<Self, RuleError> {
        let variables = analyze(&signature, limits.max_subject_variables).map_err(|err| {
            tracing::error!(expr = %crate::term::render_signature(&signature), %err, "rule compile failed");
            err
        })?;
        let operations = emit(&signature, &variables, world);
        let column_count = signature.len();
        Ok(Self {
            world,
            signature,
            variables,
            operations,
            column_count,
        })
    }

    /// Number of variables (both Table- and Entity-kind incarnations).
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Resolve a name to its variable id. Prefers the Table-kind
    /// incarnation, since that is what callers typically iterate over.
    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.variables.table_id(name).or_else(|| self.variables.entity_id(name))
    }

    /// The name a variable id was declared with.
    pub fn variable_name(&self, id: VarId) -> &str {
        &self.variables.get(id).name
    }

    /// `true` if `id` names an Entity-kind variable.
    pub fn variable_is_entity(&self, id: VarId) -> bool {
        self.variables.get(id).kind == VariableKind::Entity
    }

    /// The compiled program, for inspection or disassembly.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The original term list this rule was compiled from.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Start a fresh iterator over this rule's matches.
    pub fn iter<'a>(&'a self) -> RuleIter<'a, W> {
        RuleIter {
            world: self.world,
            variables: &self.variables,
            driver: Driver::new(self.world, &self.operations, &self.variables, self.column_count),
        }
    }
}

impl<'w, W: World> fmt::Display for Rule<'w, W> {
    /// Disassembly: one line per op, `i: [Pass:a, Fail:b] kind inputs -> outputs (filter)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.operations.iter().enumerate() {
            let pass = op.on_ok.map(|v| v as i64).unwrap_or(-1);
            let fail = op.on_fail.map(|v| v as i64).unwrap_or(-1);

            let inputs = if op.has_in {
                self.variables.get(op.r_in).name.clone()
            } else if let Some(e) = op.subject {
                e.to_string()
            } else {
                "_".to_string()
            };

            let outputs = if op.has_out {
                self.variables.get(op.r_out).name.clone()
            } else {
                "_".to_string()
            };

            let filter = op
                .param
                .as_ref()
                .map(|p| describe_pair(p, &self.variables))
                .unwrap_or_default();

            writeln!(f, "{i}: [Pass:{pass}, Fail:{fail}] {} {inputs} -> {outputs} {filter}", op.kind)?;
        }
        Ok(())
    }
}

/// Render a pair's predicate/object halves by variable name where
/// applicable, for disassembly. Branches on `has_obj` explicitly before
/// touching the object half, rather than leaving an object string
/// conditionally unset (spec.md §9 open question on `object_name`).
fn describe_pair(pair: &Pair, vars: &Variables) -> String {
    let pred = if pair.reg_mask.contains(RegMask::PRED_VAR) {
        vars.get(pair.pred).name.clone()
    } else {
        pair.pred.to_string()
    };

    if !pair.has_obj {
        return format!("{pred}(_)");
    }

    let obj = if pair.reg_mask.contains(RegMask::OBJ_VAR) {
        vars.get(pair.obj).name.clone()
    } else {
        pair.obj.to_string()
    };

    format!("{pred}(_, {obj})")
}

/// One VM pause: what a `Yield` exposed, resolved down to plain data the
/// caller can look up in the world directly (spec.md §6 `rule_next`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    /// The rule has no `This`; the program merely reached `Yield`.
    Boolean,
    /// `This` is Table-kind: every row of this table is a result.
    Table {
        /// The bound table.
        table_id: TableId,
        /// Number of result rows this batch represents.
        row_count: u32,
    },
    /// `This` is Entity-kind: exactly one entity is the result.
    Entity {
        /// The reified entity.
        entity: EntityId,
        /// The table it currently lives in.
        table_id: TableId,
        /// Its row within that table.
        row: Row,
    },
}

/// Drives a [`Rule`]'s program to enumerate matches. Borrows the rule
/// read-only; dropping it releases its scratch arrays (ordinary Rust drop
/// glue — there is no external resource to free explicitly).
pub struct RuleIter<'a, W: World> {
    world: &'a W,
    variables: &'a Variables,
    driver: Driver<'a, W>,
}

impl<'a, W: World> RuleIter<'a, W> {
    /// Advance to the next match, or `None` once the program terminates.
    pub fn next_match(&mut self) -> Option<RuleMatch> {
        if !self.driver.run() {
            return None;
        }
        Some(match self.driver.current_yield() {
            YieldBinding::None => RuleMatch::Boolean,
            YieldBinding::Table(table_id) => RuleMatch::Table {
                table_id,
                row_count: self.world.table(table_id).count(),
            },
            YieldBinding::Entity(entity) => match self.world.record_of(entity) {
                Some((table_id, row)) => RuleMatch::Entity { entity, table_id, row },
                None => RuleMatch::Entity {
                    entity,
                    table_id: 0,
                    row: 0,
                },
            },
        })
    }

    /// Read a variable's current value: the reified entity for an
    /// Entity-kind variable, or `0` for a Table-kind one (spec.md §6
    /// `rule_variable`). A Table-kind variable's bound table is exposed
    /// through the `RuleMatch` returned by [`Self::next_match`], not here.
    /// Use [`Rule::variable_is_entity`] to tell the two apart.
    pub fn variable(&self, id: VarId) -> EntityId {
        self.driver.variable(id)
    }

    /// The variable name a result's id was declared with.
    pub fn variable_name(&self, id: VarId) -> &str {
        &self.variables.get(id).name
    }
}

impl<'a, W: World> Iterator for RuleIter<'a, W> {
    type Item = RuleMatch;

    fn next(&mut self) -> Option<RuleMatch> {
        self.next_match()
    }
}
