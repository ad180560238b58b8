//! Evaluation VM (spec.md §4.4): a backtracking interpreter driven by a
//! single dispatch loop keyed on opcode, with per-operation register and
//! column frames enabling resumable (`redo`) execution.

use std::collections::HashSet;

use crate::op::{OpKind, Operation};
use crate::pair::{find_next_match, reify_variables, Filter, WILDCARD_HALF};
use crate::types::{self, is_sentinel, pack_pair, Column, EntityId, TableId, VarId, COMPONENT_MASK, PREDICATE_MASK, ROLE_MASK, ROLE_PAIR};
use crate::variable::{VariableKind, Variables};
use crate::world::{Table, TableSet, World};

/// What a paused `Yield` exposes, resolved from the op's input register and
/// the named variable's kind (spec.md §4.4 "Yield").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldBinding {
    /// The rule has no `This`: a boolean (did the program reach Yield at all) result.
    None,
    /// `This` is Table-kind: every row of this table is a result.
    Table(TableId),
    /// `This` is Entity-kind: exactly this entity is the result.
    Entity(EntityId),
}

/// Per-operation register file and column-resume array, flattened to
/// `operation_count * {var,column}_count` for contiguous frame-copies.
#[derive(Debug, Clone)]
struct VmState {
    registers: Vec<EntityId>,
    columns: Vec<Option<Column>>,
    ctx: Vec<OpCtx>,
    var_count: usize,
    column_count: usize,
}

impl VmState {
    fn new(operation_count: usize, var_count: usize, column_count: usize) -> Self {
        Self {
            registers: vec![types::WILDCARD; operation_count * var_count.max(1)],
            columns: vec![None; operation_count * column_count.max(1)],
            ctx: (0..operation_count).map(|_| OpCtx::None).collect(),
            var_count: var_count.max(1),
            column_count: column_count.max(1),
        }
    }

    fn frame(&self, op: usize) -> &[EntityId] {
        &self.registers[op * self.var_count..(op + 1) * self.var_count]
    }

    fn frame_mut(&mut self, op: usize) -> &mut [EntityId] {
        &mut self.registers[op * self.var_count..(op + 1) * self.var_count]
    }

    fn reg(&self, op: usize, var: VarId) -> EntityId {
        self.frame(op)[var as usize]
    }

    fn set_reg(&mut self, op: usize, var: VarId, value: EntityId) {
        self.frame_mut(op)[var as usize] = value;
    }

    fn copy_frame(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let vc = self.var_count;
        let src_regs: Vec<EntityId> = self.registers[from * vc..(from + 1) * vc].to_vec();
        self.registers[to * vc..(to + 1) * vc].copy_from_slice(&src_regs);

        let cc = self.column_count;
        let src_cols: Vec<Option<Column>> = self.columns[from * cc..(from + 1) * cc].to_vec();
        self.columns[to * cc..(to + 1) * cc].copy_from_slice(&src_cols);
    }

    fn col(&self, op: usize, slot: usize) -> Option<Column> {
        self.columns[op * self.column_count + slot]
    }

    fn set_col(&mut self, op: usize, slot: usize, value: Option<Column>) {
        self.columns[op * self.column_count + slot] = value;
    }
}

/// Per-operation scratch, tagged implicitly by the op's own kind.
#[derive(Debug, Clone)]
enum OpCtx {
    None,
    Select { set_index: usize },
    With { set_index: usize },
    Dfs { stack: DfsStack },
    Each { row: u32 },
}

/// One level of a transitive DFS: a resolved (table, column) match plus the
/// row cursor used to walk that table's entities for the next level down.
#[derive(Debug, Clone)]
struct DfsFrame {
    filter: Filter,
    set_index: usize,
    table: TableId,
    row: u32,
    column: Option<Column>,
}

/// Small-buffer-optimized DFS frame stack (spec.md §9): the common shallow
/// transitive chain never touches the heap.
#[derive(Debug, Clone)]
struct DfsStack {
    inline: [Option<DfsFrame>; crate::limits::INLINE_DFS_FRAMES],
    inline_len: usize,
    spill: Vec<DfsFrame>,
}

impl DfsStack {
    fn new() -> Self {
        Self {
            inline: Default::default(),
            inline_len: 0,
            spill: Vec::new(),
        }
    }

    fn push(&mut self, frame: DfsFrame) {
        if self.spill.is_empty() && self.inline_len < self.inline.len() {
            self.inline[self.inline_len] = Some(frame);
            self.inline_len += 1;
        } else {
            self.spill.push(frame);
        }
    }

    fn pop(&mut self) -> Option<DfsFrame> {
        if !self.spill.is_empty() {
            self.spill.pop()
        } else if self.inline_len > 0 {
            self.inline_len -= 1;
            self.inline[self.inline_len].take()
        } else {
            None
        }
    }

    fn top_mut(&mut self) -> Option<&mut DfsFrame> {
        if !self.spill.is_empty() {
            self.spill.last_mut()
        } else if self.inline_len > 0 {
            self.inline[self.inline_len - 1].as_mut()
        } else {
            None
        }
    }

    fn is_empty(&self) -> bool {
        self.inline_len == 0 && self.spill.is_empty()
    }

    fn len(&self) -> usize {
        self.inline_len + self.spill.len()
    }

    /// The root frame: always `inline[0]`, since a frame only ever spills
    /// once the inline buffer is full, and the root is always pushed first.
    fn bottom(&self) -> Option<&DfsFrame> {
        self.inline[0].as_ref()
    }

    /// `true` if some frame already on the stack is bound to `table` — used
    /// to cut a transitive-closure cycle instead of re-descending into it
    /// forever (spec.md §8 boundary case "transitive cycle termination").
    fn contains_table(&self, table: TableId) -> bool {
        self.inline[..self.inline_len].iter().flatten().any(|f| f.table == table) || self.spill.iter().any(|f| f.table == table)
    }
}

/// Find the first match at or after `(set_index, start_col)`, scanning
/// subsequent tables of `table_set` once the current one is exhausted.
fn locate_match<W: World>(
    world: &W,
    table_set: &TableSet,
    filter: &Filter,
    mut set_index: usize,
    mut start_col: Option<Column>,
) -> Option<(usize, TableId, Column)> {
    while let Some(record) = table_set.get_index(set_index) {
        let table = world.table(record.table);
        let from = start_col.unwrap_or(record.column);
        if let Some(col) = find_next_match(table.ty(), from, filter) {
            return Some((set_index, record.table, col));
        }
        set_index += 1;
        start_col = None;
    }
    None
}

/// The bytecode driver: owns the per-frame register/column state and the
/// current `(op, redo)` position (spec.md §4.4 "State machine for the
/// driver").
pub struct Driver<'a, W: World> {
    world: &'a W,
    ops: &'a [Operation],
    vars: &'a Variables,
    state: VmState,
    op: Option<usize>,
    redo: bool,
}

impl<'a, W: World> Driver<'a, W> {
    /// Allocate scratch and position at operation 0 with all registers set
    /// to `Wildcard` (spec.md §6 `rule_iter`).
    pub fn new(world: &'a W, ops: &'a [Operation], vars: &'a Variables, column_count: usize) -> Self {
        Self {
            world,
            ops,
            vars,
            state: VmState::new(ops.len(), vars.len(), column_count),
            op: Some(0),
            redo: false,
        }
    }

    /// Read a variable's current register value (spec.md §6 `rule_variable`):
    /// the reified entity for an Entity-kind variable, or `0` for a
    /// Table-kind one. Callers read a Table-kind variable's bound table
    /// through the match returned by `next_match`/`Rule::iter`, not here;
    /// use [`crate::rule::Rule::variable_is_entity`] to tell the two apart.
    pub fn variable(&self, var: VarId) -> EntityId {
        if self.vars.get(var).kind != VariableKind::Entity {
            return 0;
        }
        let op_index = self.op.unwrap_or(self.ops.len() - 1);
        self.state.reg(op_index, var)
    }

    /// Run until `Yield` (returns `true`, result available via
    /// [`Self::current_yield`]) or the program terminates (returns `false`).
    pub fn run(&mut self) -> bool {
        loop {
            let op_index = match self.op {
                Some(i) => i,
                None => return false,
            };

            if self.ops[op_index].kind == OpKind::Yield && !self.redo {
                // Mark this pause for redo so the next `run()` call resumes
                // by backtracking out of Yield instead of re-returning the
                // same result forever.
                self.redo = true;
                return true;
            }

            let ok = self.eval(op_index, self.redo);
            let operation = &self.ops[op_index];
            if ok {
                let next = operation.on_ok.expect("non-terminal op always has on_ok");
                self.state.copy_frame(op_index, next);
                self.op = Some(next);
                self.redo = false;
            } else {
                match operation.on_fail {
                    Some(target) => {
                        self.op = Some(target);
                        self.redo = true;
                    }
                    None => {
                        self.op = None;
                        return false;
                    }
                }
            }
        }
    }

    /// Resolve what the paused `Yield` exposes.
    pub fn current_yield(&self) -> YieldBinding {
        let op_index = self.op.expect("current_yield called while paused at Yield");
        let yield_op = &self.ops[op_index];
        if !yield_op.has_in {
            return YieldBinding::None;
        }
        let value = self.state.reg(op_index, yield_op.r_in);
        match self.vars.get(yield_op.r_in).kind {
            VariableKind::Table => YieldBinding::Table(value as TableId),
            _ => YieldBinding::Entity(value),
        }
    }

    fn eval(&mut self, op_index: usize, redo: bool) -> bool {
        match self.ops[op_index].kind {
            OpKind::Input => !redo,
            OpKind::Select => self.eval_select(op_index, redo),
            OpKind::Dfs => self.eval_dfs(op_index, redo),
            OpKind::With => self.eval_with(op_index, redo),
            OpKind::Each => self.eval_each(op_index, redo),
            OpKind::Yield => false,
        }
    }

    fn eval_select(&mut self, op_index: usize, redo: bool) -> bool {
        let operation = &self.ops[op_index];
        let pair = operation.param.as_ref().expect("Select carries a pair");
        let column_slot = operation.column;
        let filter = Filter::build(pair, self.state.frame(op_index));

        let table_set = match self.world.table_set(filter.mask) {
            Some(ts) => ts,
            None => return false,
        };

        let prev_set_index = match &self.state.ctx[op_index] {
            OpCtx::Select { set_index } => *set_index,
            _ => 0,
        };

        let (set_index, start_col) = if redo {
            if filter.wildcard {
                (prev_set_index, self.state.col(op_index, column_slot).map(|c| c + 1))
            } else {
                (prev_set_index + 1, None)
            }
        } else {
            (0, None)
        };

        match locate_match(self.world, table_set, &filter, set_index, start_col) {
            Some((found_index, table, col)) => {
                let ty = self.world.table(table).ty();
                reify_variables(&filter, ty, col, self.state.frame_mut(op_index));
                if operation.has_out {
                    self.state.set_reg(op_index, operation.r_out, table as EntityId);
                }
                self.state.set_col(op_index, column_slot, Some(col));
                self.state.ctx[op_index] = OpCtx::Select { set_index: found_index };
                true
            }
            None => false,
        }
    }

    fn resolve_subject_table(&self, operation: &Operation, op_index: usize) -> Option<TableId> {
        if operation.has_in {
            let value = self.state.reg(op_index, operation.r_in);
            if is_sentinel(value) {
                return None;
            }
            match self.vars.get(operation.r_in).kind {
                VariableKind::Table => Some(value as TableId),
                _ => self.world.table_from_entity(value),
            }
        } else {
            operation.subject.and_then(|e| self.world.table_from_entity(e))
        }
    }

    fn eval_with(&mut self, op_index: usize, redo: bool) -> bool {
        let operation = &self.ops[op_index];
        let pair = operation.param.as_ref().expect("With carries a pair");
        let column_slot = operation.column;
        let filter = Filter::build(pair, self.state.frame(op_index));

        let table = match self.resolve_subject_table(operation, op_index) {
            Some(t) => t,
            None => return false,
        };

        if redo {
            if !filter.wildcard {
                return false;
            }
            let ty = self.world.table(table).ty();
            let start = self.state.col(op_index, column_slot).map(|c| c + 1).unwrap_or(0);
            return match find_next_match(ty, start, &filter) {
                Some(col) => {
                    reify_variables(&filter, ty, col, self.state.frame_mut(op_index));
                    self.state.set_col(op_index, column_slot, Some(col));
                    true
                }
                None => false,
            };
        }

        let table_set = match self.world.table_set(filter.mask) {
            Some(ts) => ts,
            None => {
                return self.with_transitive_fallback(op_index, &filter, pair.transitive, table);
            }
        };

        match table_set.column_of(table) {
            Some(start) => {
                let ty = self.world.table(table).ty();
                match find_next_match(ty, start, &filter) {
                    Some(col) => {
                        reify_variables(&filter, ty, col, self.state.frame_mut(op_index));
                        self.state.set_col(op_index, column_slot, Some(col));
                        true
                    }
                    None => false,
                }
            }
            None => self.with_transitive_fallback(op_index, &filter, pair.transitive, table),
        }
    }

    fn with_transitive_fallback(&self, _op_index: usize, filter: &Filter, transitive: bool, table: TableId) -> bool {
        if !transitive || filter.obj_wildcard {
            return false;
        }
        // `transitive` is only set for a concrete (non-variable) predicate,
        // so the mask's low half is never a wildcard here.
        let pred = types::low(filter.mask);
        let target_obj = types::high(filter.mask);
        let mut visited = HashSet::new();
        is_transitively_reachable(self.world, pred, target_obj, table, &mut visited)
    }

    fn eval_dfs(&mut self, op_index: usize, redo: bool) -> bool {
        if !redo {
            let operation = &self.ops[op_index];
            let pair = operation.param.as_ref().expect("Dfs carries a pair");
            let filter = Filter::build(pair, self.state.frame(op_index));
            let table_set = match self.world.table_set(filter.mask) {
                Some(ts) => ts,
                None => return false,
            };
            return match locate_match(self.world, table_set, &filter, 0, None) {
                Some((set_index, table, col)) => {
                    let ty = self.world.table(table).ty();
                    reify_variables(&filter, ty, col, self.state.frame_mut(op_index));
                    if operation.has_out {
                        self.state.set_reg(op_index, operation.r_out, table as EntityId);
                    }
                    let mut stack = DfsStack::new();
                    stack.push(DfsFrame {
                        filter,
                        set_index,
                        table,
                        row: 0,
                        column: Some(col),
                    });
                    self.state.ctx[op_index] = OpCtx::Dfs { stack };
                    true
                }
                None => false,
            };
        }

        loop {
            let (is_bottom, frame_row_and_table) = match &mut self.state.ctx[op_index] {
                OpCtx::Dfs { stack } => {
                    let is_bottom = stack.len() == 1;
                    let row_and_table = match stack.top_mut() {
                        Some(frame) => {
                            let row = frame.row;
                            frame.row += 1;
                            Some((row, frame.table, frame.filter.pred_only_predicate()))
                        }
                        None => None,
                    };
                    (is_bottom, row_and_table)
                }
                _ => return false,
            };

            let (row, table, pred) = match frame_row_and_table {
                Some(v) => v,
                None => return false,
            };

            let ty_len = self.world.table(table).count();
            if row >= ty_len {
                if is_bottom {
                    // The root binding's own chain is exhausted. Rather than
                    // terminate, resume the *top-level* search (the same
                    // table_set the initial `!redo` call located) from the
                    // next record — a later table may independently satisfy
                    // the root term.
                    let (filter, set_index) = match &self.state.ctx[op_index] {
                        OpCtx::Dfs { stack } => {
                            let bottom = stack.bottom().expect("bottom frame present while is_bottom");
                            (bottom.filter, bottom.set_index)
                        }
                        _ => return false,
                    };
                    self.state.ctx[op_index].dfs_pop();

                    let table_set = match self.world.table_set(filter.mask) {
                        Some(ts) => ts,
                        None => return false,
                    };
                    return match locate_match(self.world, table_set, &filter, set_index + 1, None) {
                        Some((new_set_index, new_table, new_col)) => {
                            let ty = self.world.table(new_table).ty();
                            reify_variables(&filter, ty, new_col, self.state.frame_mut(op_index));
                            let operation = &self.ops[op_index];
                            if operation.has_out {
                                self.state.set_reg(op_index, operation.r_out, new_table as EntityId);
                            }
                            if let OpCtx::Dfs { stack } = &mut self.state.ctx[op_index] {
                                stack.push(DfsFrame {
                                    filter,
                                    set_index: new_set_index,
                                    table: new_table,
                                    row: 0,
                                    column: Some(new_col),
                                });
                            }
                            true
                        }
                        None => false,
                    };
                }
                self.state.ctx[op_index].dfs_pop();
                if let OpCtx::Dfs { stack } = &self.state.ctx[op_index] {
                    if stack.is_empty() {
                        return false;
                    }
                }
                continue;
            }

            let e = self.world.table(table).entity_at(row);
            if is_sentinel(e) {
                continue;
            }

            let child_filter = exact_pair_filter(pred, e as u32);
            let child_set = match self.world.table_set(child_filter.mask) {
                Some(ts) => ts,
                None => continue,
            };
            if let Some((set_index, child_table, col)) = locate_match(self.world, child_set, &child_filter, 0, None) {
                let already_on_stack = match &self.state.ctx[op_index] {
                    OpCtx::Dfs { stack } => stack.contains_table(child_table),
                    _ => false,
                };
                if already_on_stack {
                    continue;
                }
                let operation = &self.ops[op_index];
                if operation.has_out {
                    self.state.set_reg(op_index, operation.r_out, child_table as EntityId);
                }
                if let OpCtx::Dfs { stack } = &mut self.state.ctx[op_index] {
                    stack.push(DfsFrame {
                        filter: child_filter,
                        set_index,
                        table: child_table,
                        row: 0,
                        column: Some(col),
                    });
                }
                return true;
            }
        }
    }

    fn eval_each(&mut self, op_index: usize, redo: bool) -> bool {
        let operation = &self.ops[op_index];
        let table_value = self.state.reg(op_index, operation.r_in);
        let table_id = table_value as TableId;
        let table = self.world.table(table_id);

        let mut row = match &self.state.ctx[op_index] {
            OpCtx::Each { row } if redo => *row + 1,
            _ if redo => return false,
            _ => 0,
        };

        while row < table.count() {
            let e = table.entity_at(row);
            if !is_sentinel(e) {
                self.state.set_reg(op_index, operation.r_out, e);
                self.state.ctx[op_index] = OpCtx::Each { row };
                return true;
            }
            row += 1;
        }
        false
    }
}

impl OpCtx {
    fn dfs_pop(&mut self) {
        if let OpCtx::Dfs { stack } = self {
            stack.pop();
        }
    }
}

impl Filter {
    /// The predicate this filter was built against, recovered from its mask
    /// (valid only for pair filters constructed by this module's own
    /// point-lookups, where the predicate half is always concrete).
    fn pred_only_predicate(&self) -> u32 {
        types::low(self.mask)
    }
}

/// Build an exact (non-wildcard) point filter for `pred(_, obj)`, used by
/// the DFS's backward-chaining child search.
fn exact_pair_filter(pred: u32, obj: u32) -> Filter {
    let mask = pack_pair(pred, obj);
    Filter {
        mask,
        expr_mask: ROLE_MASK | PREDICATE_MASK | (COMPONENT_MASK << 32),
        expr_match: mask,
        wildcard: false,
        pred_wildcard: false,
        obj_wildcard: false,
        same_var: false,
        lo_var: None,
        hi_var: None,
    }
}

/// `test_if_transitive` (spec.md §4.4): does some chain of `pred` relations
/// starting at `table` eventually reach an entity whose object half equals
/// `target_obj`? Cycle-guarded by table id.
fn is_transitively_reachable<W: World>(world: &W, pred: u32, target_obj: u32, table: TableId, visited: &mut HashSet<TableId>) -> bool {
    if !visited.insert(table) {
        return false;
    }
    let all_for_pred = match world.table_set(pack_pair(pred, WILDCARD_HALF)) {
        Some(ts) => ts,
        None => return false,
    };
    let start = match all_for_pred.column_of(table) {
        Some(col) => col,
        None => return false,
    };
    let ty = world.table(table).ty();
    let filter = Filter {
        mask: pack_pair(pred, WILDCARD_HALF),
        expr_mask: ROLE_MASK | PREDICATE_MASK,
        expr_match: (pred as EntityId) | ROLE_PAIR,
        wildcard: true,
        pred_wildcard: false,
        obj_wildcard: true,
        same_var: false,
        lo_var: None,
        hi_var: None,
    };

    let mut col = start;
    loop {
        match find_next_match(ty, col, &filter) {
            None => return false,
            Some(found) => {
                let e = ty[found as usize];
                let o = types::high(e);
                if o == target_obj {
                    return true;
                }
                if let Some(o_table) = world.table_from_entity(o as EntityId) {
                    if o_table == table {
                        // already visited via this frame; skip.
                    } else if is_transitively_reachable(world, pred, target_obj, o_table, visited) {
                        return true;
                    }
                }
                col = found + 1;
            }
        }
    }
}
