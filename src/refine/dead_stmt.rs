//! Dead statement elimination
//!
//! Folds branches with literal conditions, drops null statements and
//! empty scopes, and removes declarations and pure assignments whose
//! variable is never read. Runs to a local fixpoint so cascading
//! removals (a write feeding only another dead write) converge within
//! one invocation.

use crate::ast::AstContext;
use crate::ast::nodes::{ExprKind, FunctionDef, Stmt, StmtKind};
use crate::refine::{AstPass, RefineError};
use std::collections::HashMap;

pub struct DeadStmtElim;

impl AstPass for DeadStmtElim {
    fn name(&self) -> &'static str {
        "dead-stmt-elim"
    }

    fn run(&mut self, func: &mut FunctionDef, _cx: &mut AstContext) -> Result<bool, RefineError> {
        let mut changed = false;
        loop {
            let mut local = sweep(&mut func.body);
            local |= prune_unused_vars(func);
            if !local {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }
}

/// A statement with nothing left to execute
fn is_empty_stmt(s: &Stmt) -> bool {
    match &s.kind {
        StmtKind::Null => true,
        StmtKind::Compound(stmts) => stmts.iter().all(is_empty_stmt),
        _ => false,
    }
}

fn sweep(stmt: &mut Stmt) -> bool {
    let mut changed = false;
    match &mut stmt.kind {
        StmtKind::Compound(stmts) => {
            for s in stmts.iter_mut() {
                changed |= sweep(s);
            }

            let old = std::mem::take(stmts);
            let mut rebuilt = Vec::with_capacity(old.len());
            for s in old {
                match s.kind {
                    StmtKind::Null => {
                        changed = true;
                    }
                    StmtKind::Compound(ref inner) if inner.is_empty() => {
                        changed = true;
                    }
                    StmtKind::If {
                        ref cond,
                        ref then_stmt,
                        ref else_stmt,
                    } if cond.is_pure()
                        && is_empty_stmt(then_stmt)
                        && else_stmt.as_deref().map_or(true, is_empty_stmt) =>
                    {
                        changed = true;
                    }
                    StmtKind::If {
                        cond,
                        then_stmt,
                        else_stmt,
                    } if matches!(cond.kind, ExprKind::BoolLit(_)) => {
                        changed = true;
                        let ExprKind::BoolLit(value) = cond.kind else {
                            unreachable!()
                        };
                        if value {
                            rebuilt.push(*then_stmt);
                        } else if let Some(else_stmt) = else_stmt {
                            rebuilt.push(*else_stmt);
                        }
                    }
                    StmtKind::While { ref cond, .. } if cond.is_bool_lit(false) => {
                        changed = true;
                    }
                    _ => rebuilt.push(s),
                }
            }
            *stmts = rebuilt;
        }
        StmtKind::If {
            then_stmt,
            else_stmt,
            ..
        } => {
            changed |= sweep(then_stmt);
            if let Some(e) = else_stmt {
                changed |= sweep(e);
            }
            // An empty else-branch is no else-branch
            if else_stmt.as_deref().map_or(false, is_empty_stmt) {
                *else_stmt = None;
                changed = true;
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            changed |= sweep(body);
        }
        _ => {}
    }
    changed
}

/// Remove declarations and pure writes for variables nothing reads
fn prune_unused_vars(func: &mut FunctionDef) -> bool {
    let mut reads: HashMap<String, usize> = HashMap::new();
    func.body.count_reads(&mut reads);
    remove_dead_writes(&mut func.body, &reads)
}

fn remove_dead_writes(stmt: &mut Stmt, reads: &HashMap<String, usize>) -> bool {
    let is_unread = |name: &str| reads.get(name).copied().unwrap_or(0) == 0;
    let mut changed = false;
    match &mut stmt.kind {
        StmtKind::Compound(stmts) => {
            for s in stmts.iter_mut() {
                changed |= remove_dead_writes(s, reads);
            }
            let before = stmts.len();
            stmts.retain(|s| match &s.kind {
                StmtKind::Decl { name, init, .. } => {
                    !(is_unread(name) && init.as_ref().map_or(true, |e| e.is_pure()))
                }
                StmtKind::Expr(e) => match &e.kind {
                    ExprKind::Assign {
                        op: None,
                        lhs,
                        rhs,
                    } => match &lhs.kind {
                        ExprKind::VarRef(name) => !(is_unread(name) && rhs.is_pure()),
                        _ => true,
                    },
                    _ => true,
                },
                _ => true,
            });
            changed |= stmts.len() != before;
        }
        StmtKind::If {
            then_stmt,
            else_stmt,
            ..
        } => {
            changed |= remove_dead_writes(then_stmt, reads);
            if let Some(else_stmt) = else_stmt {
                changed |= remove_dead_writes(else_stmt, reads);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            changed |= remove_dead_writes(body, reads);
        }
        _ => {}
    }
    changed
}
