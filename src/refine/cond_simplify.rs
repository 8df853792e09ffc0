//! Condition canonicalization pass
//!
//! Pushes every branch and loop condition through the shared
//! simplifier. Two configurations of this pass exist, one with the
//! cheap pipeline for condition-based refinement and one with the
//! heavier final pipeline.

use crate::ast::AstContext;
use crate::ast::nodes::{FunctionDef, Stmt, StmtKind};
use crate::refine::{AstPass, RefineError};
use crate::smt::CondSimplifier;
use std::cell::RefCell;
use std::rc::Rc;

pub struct CondSimplify {
    name: &'static str,
    simplifier: Rc<RefCell<CondSimplifier>>,
}

impl CondSimplify {
    pub fn new(name: &'static str, simplifier: Rc<RefCell<CondSimplifier>>) -> Self {
        Self { name, simplifier }
    }

    /// Re-run until the condition stops shrinking, so one pass
    /// invocation leaves each guard at a local minimum
    fn simplify_cond(&self, cond: &mut crate::ast::Expr, cx: &mut AstContext) -> bool {
        let mut changed = false;
        while let Some(new) = self.simplifier.borrow_mut().simplify(cx, cond) {
            *cond = new;
            changed = true;
        }
        changed
    }

    fn visit(&self, stmt: &mut Stmt, cx: &mut AstContext) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    changed |= self.visit(s, cx);
                }
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                changed |= self.simplify_cond(cond, cx);
                changed |= self.visit(then_stmt, cx);
                if let Some(else_stmt) = else_stmt {
                    changed |= self.visit(else_stmt, cx);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { cond, body } => {
                changed |= self.simplify_cond(cond, cx);
                changed |= self.visit(body, cx);
            }
            _ => {}
        }
        changed
    }
}

impl AstPass for CondSimplify {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(self.visit(&mut func.body, cx))
    }
}
