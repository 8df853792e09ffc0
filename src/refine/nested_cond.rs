//! Nested condition propagation
//!
//! Inside `if (A)`, a nested condition holds whatever `A` establishes;
//! inside the else-branch, whatever `!A` establishes. Nested guards are
//! simplified under that assumption context, so `if (a) { if (a && b) }`
//! becomes `if (a) { if (b) }`. Loop bodies reset the context, since an
//! iteration may invalidate facts established outside the loop.

use crate::ast::AstContext;
use crate::ast::nodes::{Expr, FunctionDef, Stmt, StmtKind};
use crate::refine::{AstPass, RefineError};
use crate::smt::CondSimplifier;
use im::Vector;
use std::cell::RefCell;
use std::rc::Rc;

pub struct NestedCondProp {
    simplifier: Rc<RefCell<CondSimplifier>>,
}

impl NestedCondProp {
    pub fn new(simplifier: Rc<RefCell<CondSimplifier>>) -> Self {
        Self { simplifier }
    }

    fn visit(&self, stmt: &mut Stmt, cx: &mut AstContext, assumptions: &Vector<Expr>) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    changed |= self.visit(s, cx, assumptions);
                }
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                if cond.is_pure() && !assumptions.is_empty() {
                    let refs: Vec<&Expr> = assumptions.iter().collect();
                    if let Some(new) = self
                        .simplifier
                        .borrow_mut()
                        .simplify_under(cx, &refs, cond)
                    {
                        *cond = new;
                        changed = true;
                    }
                }

                if cond.is_pure() {
                    let mut then_assumptions = assumptions.clone();
                    then_assumptions.push_back(cond.clone());
                    changed |= self.visit(then_stmt, cx, &then_assumptions);

                    if let Some(else_stmt) = else_stmt {
                        let mut else_assumptions = assumptions.clone();
                        let negated = cx.lnot_of(cond.clone());
                        else_assumptions.push_back(negated);
                        changed |= self.visit(else_stmt, cx, &else_assumptions);
                    }
                } else {
                    changed |= self.visit(then_stmt, cx, assumptions);
                    if let Some(else_stmt) = else_stmt {
                        changed |= self.visit(else_stmt, cx, assumptions);
                    }
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                changed |= self.visit(body, cx, &Vector::new());
            }
            _ => {}
        }
        changed
    }
}

impl AstPass for NestedCondProp {
    fn name(&self) -> &'static str {
        "nested-cond-prop"
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(self.visit(&mut func.body, cx, &Vector::new()))
    }
}
