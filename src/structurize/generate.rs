//! Reaching-condition structurization
//!
//! Builds the first, unstructured AST of a function: blocks are emitted
//! in reverse post-order, each wrapped in `if (RC(b)) { ... }` where
//! `RC(b)` is the block's reaching condition, and every natural loop
//! becomes `while (true) { ... }` with `break` on its exit edges.
//! Refinement later folds this into conventional structured code.

use crate::ast::nodes::{CType, Expr, FunctionDef, Stmt};
use crate::ast::{AstContext, IrEntity};
use crate::ir::{BlockId, IrFunction, Terminator};
use crate::structurize::cfg::CfgInfo;
use crate::structurize::values::ExprGen;
use std::collections::HashMap;

/// One outgoing edge of a block, as seen by the region emitter
struct Edge {
    target: BlockId,
    /// Terminator guard for this edge; `None` for unconditional edges
    guard: Option<Expr>,
    /// Selector assignments for the target's phi nodes
    phi_assigns: Vec<Stmt>,
}

/// Build the body of one function
///
/// The error string describes an unsupported construct; the caller
/// skips the function and continues with the rest of the module.
pub fn structure_function(cx: &mut AstContext, func: &IrFunction) -> Result<FunctionDef, String> {
    let cfg = CfgInfo::compute(func)?;
    let gen = ExprGen::new(func);

    let emitter = Emitter {
        func,
        cfg: &cfg,
        gen,
    };

    let mut stmts = emitter.gen.decls(cx);
    let (region_stmts, _) = emitter.emit_region(cx, None, func.entry_block);
    stmts.extend(region_stmts);

    let params = func
        .params
        .iter()
        .map(|p| (p.name.clone(), CType::from_ir(&p.ty)))
        .collect();

    Ok(FunctionDef {
        name: func.name.clone(),
        return_type: CType::from_ir(&func.return_type),
        params,
        body: cx.builder.compound(stmts),
    })
}

struct Emitter<'a> {
    func: &'a IrFunction,
    cfg: &'a CfgInfo,
    gen: ExprGen<'a>,
}

impl Emitter<'_> {
    /// Emit the acyclic region owned by `region` (`None` for the
    /// function's top level, `Some(l)` for the body of loop `l`).
    ///
    /// Returns the region's statements plus, for a loop region, the
    /// conditions under which each exit target is reached.
    fn emit_region(
        &self,
        cx: &mut AstContext,
        region: Option<usize>,
        entry: BlockId,
    ) -> (Vec<Stmt>, Vec<(BlockId, Expr)>) {
        let mut rc: HashMap<BlockId, Expr> = HashMap::new();
        let entry_true = cx.builder.bool_lit(true);
        cx.provenance.set(entry_true.id, IrEntity::Block(entry));
        rc.insert(entry, entry_true);

        let mut out: Vec<Stmt> = Vec::new();
        let mut exits: Vec<(BlockId, Expr)> = Vec::new();

        for &b in &self.cfg.rpo {
            if self.region_node(b, region) != Some(b) {
                continue;
            }
            let Some(cond) = rc.remove(&b) else {
                // No acyclic path from the region entry reaches it
                continue;
            };

            match self.child_loop_at(b, region) {
                Some(child) => {
                    self.emit_loop_node(cx, region, child, b, cond, &mut rc, &mut out, &mut exits)
                }
                None => {
                    self.emit_block_node(cx, region, b, cond, &mut rc, &mut out, &mut exits)
                }
            }
        }

        (out, exits)
    }

    /// A nested loop, emitted as `while (true) { ... }` at its header's
    /// position in the parent region
    #[allow(clippy::too_many_arguments)]
    fn emit_loop_node(
        &self,
        cx: &mut AstContext,
        region: Option<usize>,
        child: usize,
        header: BlockId,
        cond: Expr,
        rc: &mut HashMap<BlockId, Expr>,
        out: &mut Vec<Stmt>,
        exits: &mut Vec<(BlockId, Expr)>,
    ) {
        let (body, loop_exits) = self.emit_region(cx, Some(child), header);

        let loop_cond = cx.builder.bool_lit(true);
        cx.provenance.set(loop_cond.id, IrEntity::Block(header));
        let body_stmt = cx.builder.compound(body);
        let loop_stmt = cx.builder.while_stmt(loop_cond, body_stmt);

        // With a single exit target, leaving the loop is reaching it
        let mut targets: Vec<BlockId> = loop_exits.iter().map(|(t, _)| *t).collect();
        targets.sort();
        targets.dedup();
        if targets.len() == 1 {
            let reached = cx.clone_expr(&cond);
            self.route(cx, region, targets[0], reached, rc, exits);
        } else {
            for (target, exit_cond) in loop_exits {
                let guard = cx.clone_expr(&cond);
                let reached = and_expr(cx, header, guard, exit_cond);
                self.route(cx, region, target, reached, rc, exits);
            }
        }

        push_guarded(cx, out, cond, vec![loop_stmt]);
    }

    /// A plain block: its statements guarded by the reaching condition,
    /// edge bookkeeping for the successors
    #[allow(clippy::too_many_arguments)]
    fn emit_block_node(
        &self,
        cx: &mut AstContext,
        region: Option<usize>,
        b: BlockId,
        cond: Expr,
        rc: &mut HashMap<BlockId, Expr>,
        out: &mut Vec<Stmt>,
        exits: &mut Vec<(BlockId, Expr)>,
    ) {
        let (mut stmts, edges) = self.emit_block(cx, b);
        let mut break_stmts: Vec<Stmt> = Vec::new();

        for edge in edges {
            let in_region = self.region_node(edge.target, region).is_some();
            let is_continue = match region {
                Some(l) => edge.target == self.cfg.loops[l].header,
                None => false,
            };

            if is_continue {
                // Fall-through back to the loop header; only the phi
                // selectors need assigning
                attach_assigns(cx, &mut stmts, edge.guard, edge.phi_assigns);
            } else if in_region {
                let contribution = match &edge.guard {
                    Some(guard) => {
                        let guard_clone = cx.clone_expr(guard);
                        let cond_clone = cx.clone_expr(&cond);
                        and_expr(cx, b, cond_clone, guard_clone)
                    }
                    None => cx.clone_expr(&cond),
                };
                attach_assigns(cx, &mut stmts, edge.guard, edge.phi_assigns);
                merge_cond(cx, b, rc, self.region_key(edge.target, region), contribution);
            } else {
                // Leaving the loop: break under the full edge condition
                let full = match edge.guard {
                    Some(guard) => {
                        let cond_clone = cx.clone_expr(&cond);
                        and_expr(cx, b, cond_clone, guard)
                    }
                    None => cx.clone_expr(&cond),
                };
                exits.push((edge.target, cx.clone_expr(&full)));

                let mut body = edge.phi_assigns;
                body.push(cx.builder.brk());
                let compound = cx.builder.compound(body);
                break_stmts.push(cx.builder.if_stmt(full, compound, None));
            }
        }

        push_guarded(cx, out, cond, stmts);
        out.extend(break_stmts);
    }

    /// Statements of one block plus its outgoing edges
    fn emit_block(&self, cx: &mut AstContext, b: BlockId) -> (Vec<Stmt>, Vec<Edge>) {
        let block = self.func.get_block(b).unwrap();

        let mut stmts = Vec::new();
        for instr in &block.instructions {
            if let Some(stmt) = self.gen.instr_stmt(cx, b, instr) {
                stmts.push(stmt);
            }
        }

        let mut edges = Vec::new();
        match &block.terminator {
            Terminator::Jump { target } => {
                edges.push(self.edge(cx, b, *target, None));
            }
            Terminator::Branch {
                cond,
                true_target,
                false_target,
            } => {
                let guard = self.gen.guard_expr(cx, *cond);
                let negated = {
                    let clone = cx.clone_expr(&guard);
                    cx.lnot_of(clone)
                };
                edges.push(self.edge(cx, b, *true_target, Some(guard)));
                edges.push(self.edge(cx, b, *false_target, Some(negated)));
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                // Equality guards per case; the default gets the
                // conjunction of the negations
                let mut default_guard: Option<Expr> = None;
                for (case_value, target) in cases {
                    let scrutinee = self.gen.use_expr(cx, *value);
                    let lit = cx.builder.int_lit(scrutinee.ty.clone(), *case_value);
                    cx.provenance.set(lit.id, IrEntity::Value(*value));
                    let guard = cx.builder.cmp(crate::ast::BinOp::Eq, scrutinee, lit);
                    cx.provenance.set(guard.id, IrEntity::Value(*value));
                    cx.provenance.set_use(guard.id, *value);
                    edges.push(self.edge(cx, b, *target, Some(guard)));

                    let scrutinee = self.gen.use_expr(cx, *value);
                    let lit = cx.builder.int_lit(scrutinee.ty.clone(), *case_value);
                    cx.provenance.set(lit.id, IrEntity::Value(*value));
                    let miss = cx.builder.cmp(crate::ast::BinOp::Ne, scrutinee, lit);
                    cx.provenance.set(miss.id, IrEntity::Value(*value));
                    cx.provenance.set_use(miss.id, *value);
                    default_guard = Some(match default_guard {
                        Some(acc) => and_expr(cx, b, acc, miss),
                        None => miss,
                    });
                }
                edges.push(self.edge(cx, b, *default, default_guard));
            }
            Terminator::Return { value } => {
                let value_expr = value.map(|v| self.gen.use_expr(cx, v));
                stmts.push(cx.builder.ret(value_expr));
            }
            Terminator::Unreachable => {}
        }

        (stmts, edges)
    }

    fn edge(&self, cx: &mut AstContext, from: BlockId, target: BlockId, guard: Option<Expr>) -> Edge {
        let mut phi_assigns = Vec::new();
        if let Some(block) = self.func.get_block(target) {
            for phi in &block.phi_nodes {
                if let Some(incoming) = phi.incoming_from(from) {
                    phi_assigns.push(self.gen.phi_assign(cx, phi.dst, incoming));
                }
            }
        }
        Edge {
            target,
            guard,
            phi_assigns,
        }
    }

    /// The node that represents `b` inside `region`: `b` itself when it
    /// belongs directly to the region, the header of the child loop
    /// containing it otherwise, `None` when `b` is outside the region
    fn region_node(&self, b: BlockId, region: Option<usize>) -> Option<BlockId> {
        if let Some(l) = region {
            if !self.cfg.loops[l].body.contains(&b) {
                return None;
            }
        }
        let mut current = self.cfg.loop_of(b);
        if current == region {
            return Some(b);
        }
        while let Some(l) = current {
            let parent = self.cfg.parent_of(l);
            if parent == region {
                return Some(self.cfg.loops[l].header);
            }
            current = parent;
        }
        None
    }

    fn region_key(&self, b: BlockId, region: Option<usize>) -> BlockId {
        self.region_node(b, region).unwrap_or(b)
    }

    /// The child loop of `region` headed exactly at `b`, if any
    fn child_loop_at(&self, b: BlockId, region: Option<usize>) -> Option<usize> {
        self.cfg
            .loops
            .iter()
            .enumerate()
            .find(|(i, l)| {
                l.header == b && Some(*i) != region && self.cfg.parent_of(*i) == region
            })
            .map(|(i, _)| i)
    }

    #[allow(clippy::too_many_arguments)]
    fn route(
        &self,
        cx: &mut AstContext,
        region: Option<usize>,
        target: BlockId,
        cond: Expr,
        rc: &mut HashMap<BlockId, Expr>,
        exits: &mut Vec<(BlockId, Expr)>,
    ) {
        if let Some(l) = region {
            if target == self.cfg.loops[l].header {
                // Implicit continue of the current loop
                return;
            }
            if !self.cfg.loops[l].body.contains(&target) {
                exits.push((target, cond));
                return;
            }
        }
        merge_cond(cx, target, rc, self.region_key(target, region), cond);
    }
}

/// `true && x` folds to `x`
fn and_expr(cx: &mut AstContext, block: BlockId, lhs: Expr, rhs: Expr) -> Expr {
    if lhs.is_bool_lit(true) {
        return rhs;
    }
    if rhs.is_bool_lit(true) {
        return lhs;
    }
    let expr = cx.builder.land(lhs, rhs);
    cx.provenance.set(expr.id, IrEntity::Block(block));
    expr
}

fn merge_cond(
    cx: &mut AstContext,
    block: BlockId,
    rc: &mut HashMap<BlockId, Expr>,
    key: BlockId,
    cond: Expr,
) {
    match rc.remove(&key) {
        Some(existing) => {
            let merged = if existing.is_bool_lit(true) || cond.is_bool_lit(true) {
                let lit = cx.builder.bool_lit(true);
                cx.provenance.set(lit.id, IrEntity::Block(block));
                lit
            } else {
                let or = cx.builder.lor(existing, cond);
                cx.provenance.set(or.id, IrEntity::Block(block));
                or
            };
            rc.insert(key, merged);
        }
        None => {
            rc.insert(key, cond);
        }
    }
}

/// Append block statements under their reaching condition; a literally
/// true condition emits them bare
fn push_guarded(cx: &mut AstContext, out: &mut Vec<Stmt>, cond: Expr, stmts: Vec<Stmt>) {
    if stmts.is_empty() {
        return;
    }
    if cond.is_bool_lit(true) {
        out.extend(stmts);
    } else {
        let compound = cx.builder.compound(stmts);
        out.push(cx.builder.if_stmt(cond, compound, None));
    }
}

fn attach_assigns(cx: &mut AstContext, stmts: &mut Vec<Stmt>, guard: Option<Expr>, assigns: Vec<Stmt>) {
    if assigns.is_empty() {
        return;
    }
    match guard {
        Some(guard) => {
            let compound = cx.builder.compound(assigns);
            stmts.push(cx.builder.if_stmt(guard, compound, None));
        }
        None => stmts.extend(assigns),
    }
}
