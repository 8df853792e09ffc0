//! Condition-based refinement
//!
//! Runs of adjacent `if` statements whose guards are pairwise disjoint
//! and jointly exhaustive fold into an if/else-if/else chain. The
//! two-statement case is the classic merge of `if (C) A; if (!C) B;`
//! into `if (C) A else B;`. Matching is leftmost and longest-first;
//! an unknown solver verdict vetoes the rewrite.

use crate::ast::AstContext;
use crate::ast::nodes::{Expr, FunctionDef, Stmt, StmtKind};
use crate::refine::{AstPass, RefineError};
use crate::smt::CondSimplifier;
use std::cell::RefCell;
use std::rc::Rc;

pub struct CondBasedRefine {
    simplifier: Rc<RefCell<CondSimplifier>>,
}

impl CondBasedRefine {
    pub fn new(simplifier: Rc<RefCell<CondSimplifier>>) -> Self {
        Self { simplifier }
    }

    fn visit(&self, stmt: &mut Stmt, cx: &mut AstContext) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts.iter_mut() {
                    changed |= self.visit(s, cx);
                }
                changed |= self.refine_runs(stmts, cx);
            }
            StmtKind::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                changed |= self.visit(then_stmt, cx);
                if let Some(else_stmt) = else_stmt {
                    changed |= self.visit(else_stmt, cx);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                changed |= self.visit(body, cx);
            }
            _ => {}
        }
        changed
    }

    fn refine_runs(&self, stmts: &mut Vec<Stmt>, cx: &mut AstContext) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < stmts.len() {
            let mut run = 0;
            while i + run < stmts.len() && is_candidate(&stmts[i + run]) {
                run += 1;
            }
            if run >= 2 {
                for end in (i + 2..=i + run).rev() {
                    let guards: Vec<&Expr> = stmts[i..end].iter().map(guard_of).collect();
                    if self.guards_partition(&guards) {
                        let merged: Vec<Stmt> = stmts.drain(i..end).collect();
                        stmts.insert(i, build_chain(merged, cx));
                        changed = true;
                        break;
                    }
                }
            }
            i += 1;
        }
        changed
    }

    /// Pairwise disjoint and jointly exhaustive
    fn guards_partition(&self, guards: &[&Expr]) -> bool {
        let mut simplifier = self.simplifier.borrow_mut();
        for (n, a) in guards.iter().enumerate() {
            for b in &guards[n + 1..] {
                if !simplifier.prove_disjoint(a, b).is_valid() {
                    return false;
                }
            }
        }
        simplifier.prove_covers(guards).is_valid()
    }
}

fn is_candidate(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::If {
            cond,
            else_stmt: None,
            ..
        } => cond.is_pure(),
        _ => false,
    }
}

fn guard_of(stmt: &Stmt) -> &Expr {
    match &stmt.kind {
        StmtKind::If { cond, .. } => cond,
        _ => unreachable!("candidates are if statements"),
    }
}

/// Fold a run of guarded statements into a chain; the last guard is
/// implied by the others and becomes the trailing else
fn build_chain(run: Vec<Stmt>, cx: &mut AstContext) -> Stmt {
    let mut iter = run.into_iter().rev();
    let last = iter.next().expect("run has at least two statements");
    let StmtKind::If {
        then_stmt: mut else_branch,
        ..
    } = last.kind
    else {
        unreachable!()
    };
    for stmt in iter {
        let StmtKind::If {
            cond, then_stmt, ..
        } = stmt.kind
        else {
            unreachable!()
        };
        else_branch = Box::new(cx.builder.if_stmt(cond, *then_stmt, Some(*else_branch)));
    }
    *else_branch
}

impl AstPass for CondBasedRefine {
    fn name(&self) -> &'static str {
        "cond-based-refine"
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(self.visit(&mut func.body, cx))
    }
}
