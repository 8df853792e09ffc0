//! Nested scope combination
//!
//! Splices compound statements that are direct children of other
//! compounds, and merges adjacent `if` statements whose side-effect
//! free conditions are structurally identical.

use crate::ast::AstContext;
use crate::ast::nodes::{FunctionDef, Stmt, StmtKind, canon_key};
use crate::refine::{AstPass, RefineError};

pub struct NestedScopeCombiner;

impl NestedScopeCombiner {
    fn visit(&self, stmt: &mut Stmt, cx: &mut AstContext) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts.iter_mut() {
                    changed |= self.visit(s, cx);
                }

                if stmts.iter().any(|s| matches!(s.kind, StmtKind::Compound(_))) {
                    let old = std::mem::take(stmts);
                    for s in old {
                        match s.kind {
                            StmtKind::Compound(inner) => stmts.extend(inner),
                            _ => stmts.push(s),
                        }
                    }
                    changed = true;
                }

                changed |= merge_adjacent_ifs(stmts, cx);
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
}

/// `if (A) S; if (A) T;` with a pure `A` merges into `if (A) { S; T }`
fn merge_adjacent_ifs(stmts: &mut Vec<Stmt>, cx: &mut AstContext) -> bool {
    fn mergeable(a: &Stmt, b: &Stmt) -> bool {
        let (
            StmtKind::If {
                cond: ca,
                else_stmt: None,
                ..
            },
            StmtKind::If {
                cond: cb,
                else_stmt: None,
                ..
            },
        ) = (&a.kind, &b.kind)
        else {
            return false;
        };
        ca.is_pure() && cb.is_pure() && canon_key(ca) == canon_key(cb)
    }

    let mut changed = false;
    let mut i = 0;
    while i + 1 < stmts.len() {
        if mergeable(&stmts[i], &stmts[i + 1]) {
            let second = stmts.remove(i + 1);
            let StmtKind::If {
                then_stmt: second_then,
                ..
            } = second.kind
            else {
                unreachable!()
            };
            let StmtKind::If { then_stmt, .. } = &mut stmts[i].kind else {
                unreachable!()
            };
            append_to_compound(then_stmt, *second_then, cx);
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

fn append_to_compound(target: &mut Stmt, source: Stmt, cx: &mut AstContext) {
    let items = match source.kind {
        StmtKind::Compound(stmts) => stmts,
        _ => vec![source],
    };
    match &mut target.kind {
        StmtKind::Compound(stmts) => stmts.extend(items),
        _ => {
            let placeholder = cx.builder.null_stmt();
            let old = std::mem::replace(target, placeholder);
            let mut combined = vec![old];
            combined.extend(items);
            *target = cx.builder.compound(combined);
        }
    }
}

impl AstPass for NestedScopeCombiner {
    fn name(&self) -> &'static str {
        "nested-scope-combine"
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(self.visit(&mut func.body, cx))
    }
}
