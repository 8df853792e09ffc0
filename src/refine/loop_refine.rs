//! Rule-based loop refinement
//!
//! Rewrites `while (true)` loops into `while`, `do`-`while`, or
//! straight-line code. Rules are tried in a fixed order and the first
//! whose pattern and side conditions hold is applied; loops are visited
//! innermost-first. Negated guards are produced through the builder and
//! inherit the provenance of the guard they negate.

use crate::ast::AstContext;
use crate::ast::nodes::{Expr, FunctionDef, Stmt, StmtKind};
use crate::refine::{AstPass, RefineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopRule {
    /// `while(1) { if (C) T else E(break) }` -> `while(1) { while (C) T; E }`
    CondToSeq,
    /// `while(1) { if (C) T(break) else E }` -> `while(1) { while (!C) E; T }`
    CondToSeqNeg,
    /// Unique tail `if (C) { ..break.. } else E` -> `while(1) { do { ..; E } while (!C); then }`
    NestedDoWhile,
    /// Every path breaks; the loop wrapper is straight-line code
    LoopToSeq,
    /// Front `if (C) break;` -> `while (!C) { rest }`
    While,
    /// Tail `if (C) break;` -> `do { .. } while (!C);`
    DoWhile,
}

const RULES: [LoopRule; 6] = [
    LoopRule::CondToSeq,
    LoopRule::CondToSeqNeg,
    LoopRule::NestedDoWhile,
    LoopRule::LoopToSeq,
    LoopRule::While,
    LoopRule::DoWhile,
];

pub struct LoopRefine;

impl LoopRefine {
    fn visit(&self, stmt: &mut Stmt, cx: &mut AstContext) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    changed |= self.visit(s, cx);
                }
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

        if is_while_true(stmt) {
            if let Some(rule) = RULES.iter().find(|r| r.matches(stmt)) {
                let placeholder = cx.builder.null_stmt();
                let old = std::mem::replace(stmt, placeholder);
                *stmt = rule.rewrite(old, cx);
                changed = true;
            }
        }
        changed
    }
}

impl AstPass for LoopRefine {
    fn name(&self) -> &'static str {
        "loop-refine"
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(self.visit(&mut func.body, cx))
    }
}

// ============================================================================
// Pattern helpers
// ============================================================================

fn is_while_true(stmt: &Stmt) -> bool {
    matches!(&stmt.kind, StmtKind::While { cond, .. } if cond.is_bool_lit(true))
}

fn body_stmts(stmt: &Stmt) -> Option<&Vec<Stmt>> {
    match &stmt.kind {
        StmtKind::While { body, .. } => body.as_compound(),
        _ => None,
    }
}

/// `break;` or `{ break; }`
fn is_comp_break(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Break => true,
        StmtKind::Compound(stmts) => {
            stmts.len() == 1 && matches!(stmts[0].kind, StmtKind::Break)
        }
        _ => false,
    }
}

/// A `break` among the direct children of the arm
fn has_child_break(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Break => true,
        StmtKind::Compound(stmts) => stmts.iter().any(|s| matches!(s.kind, StmtKind::Break)),
        _ => false,
    }
}

/// Flatten an arm into a statement list
fn arm_stmts(stmt: Stmt) -> Vec<Stmt> {
    match stmt.kind {
        StmtKind::Compound(stmts) => stmts,
        StmtKind::Null => vec![],
        _ => vec![stmt],
    }
}

/// Everything up to (and excluding) the first top-level `break`
fn truncate_at_break(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::new();
    for s in stmts {
        if matches!(s.kind, StmtKind::Break) {
            break;
        }
        out.push(s);
    }
    out
}

fn destructure_loop(stmt: Stmt) -> (Expr, Vec<Stmt>) {
    let StmtKind::While { cond, body } = stmt.kind else {
        unreachable!("loop rules only match while statements");
    };
    let stmts = match body.kind {
        StmtKind::Compound(stmts) => stmts,
        _ => vec![*body],
    };
    (cond, stmts)
}

fn destructure_if(stmt: Stmt) -> (Expr, Stmt, Option<Stmt>) {
    let StmtKind::If {
        cond,
        then_stmt,
        else_stmt,
    } = stmt.kind
    else {
        unreachable!("pattern guaranteed an if statement");
    };
    (cond, *then_stmt, else_stmt.map(|s| *s))
}

// ============================================================================
// Rules
// ============================================================================

impl LoopRule {
    fn matches(&self, stmt: &Stmt) -> bool {
        let Some(body) = body_stmts(stmt) else {
            return false;
        };
        match self {
            LoopRule::CondToSeq => {
                let [only] = body.as_slice() else {
                    return false;
                };
                let StmtKind::If {
                    then_stmt,
                    else_stmt: Some(else_stmt),
                    ..
                } = &only.kind
                else {
                    return false;
                };
                !then_stmt.contains_break() && else_stmt.contains_break()
            }
            LoopRule::CondToSeqNeg => {
                let [only] = body.as_slice() else {
                    return false;
                };
                let StmtKind::If {
                    then_stmt,
                    else_stmt: Some(else_stmt),
                    ..
                } = &only.kind
                else {
                    return false;
                };
                then_stmt.contains_break() && !else_stmt.contains_break()
            }
            LoopRule::NestedDoWhile => {
                // Exactly one if-with-break anywhere in the body, and it
                // must be the tail statement; an else arm that also
                // breaks would change meaning under the rewrite
                let mut candidates = 0;
                for s in body {
                    s.for_each_stmt(&mut |inner| {
                        if let StmtKind::If { then_stmt, .. } = &inner.kind {
                            if has_child_break(then_stmt) {
                                candidates += 1;
                            }
                        }
                    });
                }
                if candidates != 1 {
                    return false;
                }
                let Some(last) = body.last() else {
                    return false;
                };
                let StmtKind::If {
                    then_stmt,
                    else_stmt,
                    ..
                } = &last.kind
                else {
                    return false;
                };
                has_child_break(then_stmt)
                    && else_stmt.as_deref().map_or(true, |e| !e.contains_break())
            }
            LoopRule::LoopToSeq => {
                if body.iter().any(|s| matches!(s.kind, StmtKind::Break)) {
                    return true;
                }
                let Some(last) = body.last() else {
                    return false;
                };
                let StmtKind::If {
                    then_stmt,
                    else_stmt: Some(else_stmt),
                    ..
                } = &last.kind
                else {
                    return false;
                };
                has_child_break(then_stmt) && has_child_break(else_stmt)
            }
            LoopRule::While => body.first().map_or(false, |first| {
                matches!(&first.kind, StmtKind::If { then_stmt, .. } if is_comp_break(then_stmt))
            }),
            LoopRule::DoWhile => body.last().map_or(false, |last| {
                matches!(&last.kind, StmtKind::If { then_stmt, .. } if is_comp_break(then_stmt))
            }),
        }
    }

    fn rewrite(&self, stmt: Stmt, cx: &mut AstContext) -> Stmt {
        match self {
            LoopRule::CondToSeq => {
                let (outer_cond, mut body) = destructure_loop(stmt);
                let (cond, then_stmt, else_stmt) = destructure_if(body.remove(0));
                let inner = cx.builder.while_stmt(cond, then_stmt);
                let mut new_body = vec![inner];
                new_body.extend(arm_stmts(else_stmt.expect("pattern has an else arm")));
                let compound = cx.builder.compound(new_body);
                cx.builder.while_stmt(outer_cond, compound)
            }
            LoopRule::CondToSeqNeg => {
                let (outer_cond, mut body) = destructure_loop(stmt);
                let (cond, then_stmt, else_stmt) = destructure_if(body.remove(0));
                let negated = cx.lnot_of(cond);
                let inner = cx
                    .builder
                    .while_stmt(negated, else_stmt.expect("pattern has an else arm"));
                let mut new_body = vec![inner];
                new_body.extend(arm_stmts(then_stmt));
                let compound = cx.builder.compound(new_body);
                cx.builder.while_stmt(outer_cond, compound)
            }
            LoopRule::NestedDoWhile => {
                let (outer_cond, mut body) = destructure_loop(stmt);
                let tail = body.pop().expect("pattern has a tail if");
                let (cond, then_stmt, else_stmt) = destructure_if(tail);
                let mut do_body = body;
                if let Some(else_stmt) = else_stmt {
                    do_body.extend(arm_stmts(else_stmt));
                }
                let negated = cx.lnot_of(cond);
                let do_compound = cx.builder.compound(do_body);
                let do_stmt = cx.builder.do_stmt(negated, do_compound);
                let new_body = cx.builder.compound(vec![do_stmt, then_stmt]);
                cx.builder.while_stmt(outer_cond, new_body)
            }
            LoopRule::LoopToSeq => {
                let (_, mut body) = destructure_loop(stmt);
                let tail_is_breaking_if = body.last().map_or(false, |last| {
                    matches!(
                        &last.kind,
                        StmtKind::If {
                            then_stmt,
                            else_stmt: Some(else_stmt),
                            ..
                        } if has_child_break(then_stmt) && has_child_break(else_stmt)
                    )
                }) && !body.iter().any(|s| matches!(s.kind, StmtKind::Break));
                if tail_is_breaking_if {
                    let (cond, then_stmt, else_stmt) = destructure_if(body.pop().unwrap());
                    let then_body = truncate_at_break(arm_stmts(then_stmt));
                    let else_body =
                        truncate_at_break(arm_stmts(else_stmt.expect("pattern has an else arm")));
                    let then_compound = cx.builder.compound(then_body);
                    let else_compound = cx.builder.compound(else_body);
                    body.push(
                        cx.builder
                            .if_stmt(cond, then_compound, Some(else_compound)),
                    );
                    cx.builder.compound(body)
                } else {
                    cx.builder.compound(truncate_at_break(body))
                }
            }
            LoopRule::While => {
                let (_, mut body) = destructure_loop(stmt);
                let (cond, _, else_stmt) = destructure_if(body.remove(0));
                let mut new_body = else_stmt.map(arm_stmts).unwrap_or_default();
                new_body.append(&mut body);
                let negated = cx.lnot_of(cond);
                let compound = cx.builder.compound(new_body);
                cx.builder.while_stmt(negated, compound)
            }
            LoopRule::DoWhile => {
                let (_, mut body) = destructure_loop(stmt);
                let (cond, _, else_stmt) = destructure_if(body.pop().expect("pattern has a tail"));
                if let Some(else_stmt) = else_stmt {
                    body.extend(arm_stmts(else_stmt));
                }
                let negated = cx.lnot_of(cond);
                let compound = cx.builder.compound(body);
                cx.builder.do_stmt(negated, compound)
            }
        }
    }
}
