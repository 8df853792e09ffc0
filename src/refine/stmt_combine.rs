//! Statement and expression combination
//!
//! Peephole cleanups for the final phase: double negation, negated
//! comparisons, literal folding, inverted empty branches, compound
//! assignment, and collapsing single-statement scopes where that is
//! syntactically safe.

use crate::ast::AstContext;
use crate::ast::nodes::{BinOp, Expr, ExprKind, FunctionDef, Stmt, StmtKind, UnOp};
use crate::refine::{AstPass, RefineError};

pub struct StmtCombine;

impl AstPass for StmtCombine {
    fn name(&self) -> &'static str {
        "stmt-combine"
    }

    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError> {
        Ok(visit_stmt(&mut func.body, cx))
    }
}

fn visit_stmt(stmt: &mut Stmt, cx: &mut AstContext) -> bool {
    let mut changed = false;
    match &mut stmt.kind {
        StmtKind::Compound(stmts) => {
            for s in stmts.iter_mut() {
                changed |= visit_stmt(s, cx);
            }
            changed |= fold_literal_ifs(stmts);
        }
        StmtKind::Decl {
            init: Some(init), ..
        } => {
            changed |= rewrite_expr_in_place(init, cx);
        }
        StmtKind::Expr(e) => {
            changed |= rewrite_expr_in_place(e, cx);
        }
        StmtKind::Return(Some(e)) => {
            changed |= rewrite_expr_in_place(e, cx);
        }
        StmtKind::If { .. } => {
            changed |= visit_if(stmt, cx);
        }
        StmtKind::While { cond, body } => {
            changed |= rewrite_expr_in_place(cond, cx);
            changed |= visit_stmt(body, cx);
            changed |= collapse_single(body, cx);
        }
        StmtKind::DoWhile { cond, body } => {
            changed |= rewrite_expr_in_place(cond, cx);
            changed |= visit_stmt(body, cx);
            changed |= collapse_single(body, cx);
        }
        _ => {}
    }
    changed
}

/// Branches whose condition folded to a literal keep only the taken arm
fn fold_literal_ifs(stmts: &mut Vec<Stmt>) -> bool {
    let has_literal_if = stmts.iter().any(|s| {
        matches!(&s.kind, StmtKind::If { cond, .. } if matches!(cond.kind, ExprKind::BoolLit(_)))
    });
    if !has_literal_if {
        return false;
    }
    let old = std::mem::take(stmts);
    for s in old {
        match s.kind {
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } if matches!(cond.kind, ExprKind::BoolLit(_)) => {
                let ExprKind::BoolLit(value) = cond.kind else {
                    unreachable!()
                };
                let taken = if value {
                    Some(*then_stmt)
                } else {
                    else_stmt.map(|s| *s)
                };
                match taken {
                    Some(Stmt {
                        kind: StmtKind::Compound(inner),
                        ..
                    }) => stmts.extend(inner),
                    Some(other) => stmts.push(other),
                    None => {}
                }
            }
            _ => stmts.push(s),
        }
    }
    true
}

fn visit_if(stmt: &mut Stmt, cx: &mut AstContext) -> bool {
    let StmtKind::If {
        cond,
        then_stmt,
        else_stmt,
    } = &mut stmt.kind
    else {
        return false;
    };
    let mut changed = rewrite_expr_in_place(cond, cx);
    changed |= visit_stmt(then_stmt, cx);
    if let Some(else_stmt) = else_stmt {
        changed |= visit_stmt(else_stmt, cx);
    }

    // `if (C) {} else E` reads better as `if (!C) E`
    let then_is_empty = matches!(&then_stmt.kind, StmtKind::Compound(stmts) if stmts.is_empty())
        || then_stmt.is_null();
    if then_is_empty && else_stmt.is_some() {
        let placeholder = cx.builder.bool_lit(false);
        let old_cond = std::mem::replace(cond, placeholder);
        let negated = cx.lnot_of(old_cond);
        let (negated, _) = rewrite_expr(negated, cx);
        *cond = negated;
        **then_stmt = *else_stmt.take().expect("else arm checked above");
        changed = true;
    }

    changed |= collapse_single(then_stmt, cx);
    if let Some(else_stmt) = else_stmt {
        changed |= collapse_single(else_stmt, cx);
    }
    changed
}

/// `{ S; }` collapses to `S` for simple statements; declarations keep
/// their scope and nested control flow keeps its braces
fn collapse_single(body: &mut Stmt, cx: &mut AstContext) -> bool {
    let collapsible = match &body.kind {
        StmtKind::Compound(stmts) if stmts.len() == 1 => matches!(
            stmts[0].kind,
            StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Break
        ),
        _ => false,
    };
    if !collapsible {
        return false;
    }
    let placeholder = cx.builder.null_stmt();
    let old = std::mem::replace(body, placeholder);
    let StmtKind::Compound(mut stmts) = old.kind else {
        unreachable!()
    };
    *body = stmts.pop().expect("length checked above");
    true
}

fn rewrite_expr_in_place(e: &mut Expr, cx: &mut AstContext) -> bool {
    let placeholder = cx.builder.bool_lit(false);
    let old = std::mem::replace(e, placeholder);
    let (new, changed) = rewrite_expr(old, cx);
    *e = new;
    changed
}

/// Bottom-up expression rewriting; children keep their node IDs unless
/// a pattern replaces them
fn rewrite_expr(e: Expr, cx: &mut AstContext) -> (Expr, bool) {
    let Expr { id, ty, kind } = e;
    let (kind, mut changed) = match kind {
        ExprKind::Unary { op, operand } => {
            let (operand, c) = rewrite_expr(*operand, cx);
            (
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                c,
            )
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let (lhs, c1) = rewrite_expr(*lhs, cx);
            let (rhs, c2) = rewrite_expr(*rhs, cx);
            (
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                c1 | c2,
            )
        }
        ExprKind::Assign { op, lhs, rhs } => {
            let (lhs, c1) = rewrite_expr(*lhs, cx);
            let (rhs, c2) = rewrite_expr(*rhs, cx);
            (
                ExprKind::Assign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                c1 | c2,
            )
        }
        ExprKind::Cast { operand } => {
            let (operand, c) = rewrite_expr(*operand, cx);
            (
                ExprKind::Cast {
                    operand: Box::new(operand),
                },
                c,
            )
        }
        ExprKind::Call { callee, args } => {
            let mut c = false;
            let args = args
                .into_iter()
                .map(|a| {
                    let (a, ac) = rewrite_expr(a, cx);
                    c |= ac;
                    a
                })
                .collect();
            (ExprKind::Call { callee, args }, c)
        }
        other => (other, false),
    };

    let mut e = Expr { id, ty, kind };
    loop {
        match combine(e, cx) {
            (new, true) => {
                changed = true;
                e = new;
            }
            (new, false) => {
                e = new;
                break;
            }
        }
    }
    (e, changed)
}

/// One round of pattern matching at the root
fn combine(e: Expr, cx: &mut AstContext) -> (Expr, bool) {
    let Expr { id, ty, kind } = e;
    match kind {
        ExprKind::Unary {
            op: UnOp::LNot,
            operand,
        } => match *operand {
            // !!x
            Expr {
                kind:
                    ExprKind::Unary {
                        op: UnOp::LNot,
                        operand: inner,
                    },
                ..
            } => (*inner, true),
            // !true, !false
            Expr {
                kind: ExprKind::BoolLit(value),
                ..
            } => {
                let lit = cx.builder.bool_lit(!value);
                cx.provenance.copy(id, lit.id);
                (lit, true)
            }
            // !(a == b) and friends
            Expr {
                id: cmp_id,
                kind: ExprKind::Binary { op, lhs, rhs },
                ..
            } if op.negated_comparison().is_some() => {
                let flipped = op.negated_comparison().unwrap();
                let new = cx.builder.cmp(flipped, *lhs, *rhs);
                cx.provenance.copy(cmp_id, new.id);
                (new, true)
            }
            operand => (
                Expr {
                    id,
                    ty,
                    kind: ExprKind::Unary {
                        op: UnOp::LNot,
                        operand: Box::new(operand),
                    },
                },
                false,
            ),
        },
        ExprKind::Unary {
            op: UnOp::Neg,
            operand,
        } => match *operand {
            Expr {
                kind: ExprKind::IntLit(n),
                ..
            } => {
                let lit = cx.builder.int_lit(ty, n.wrapping_neg());
                cx.provenance.copy(id, lit.id);
                (lit, true)
            }
            operand => (
                Expr {
                    id,
                    ty,
                    kind: ExprKind::Unary {
                        op: UnOp::Neg,
                        operand: Box::new(operand),
                    },
                },
                false,
            ),
        },
        ExprKind::Binary { op, lhs, rhs } => combine_binary(id, ty, op, lhs, rhs, cx),
        ExprKind::Assign {
            op: None,
            lhs,
            rhs,
        } => combine_assign(id, ty, lhs, rhs, cx),
        kind => (Expr { id, ty, kind }, false),
    }
}

fn combine_binary(
    id: crate::ast::NodeId,
    ty: crate::ast::CType,
    op: BinOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    cx: &mut AstContext,
) -> (Expr, bool) {
    // Logical connectives with a literal side
    if matches!(op, BinOp::LAnd | BinOp::LOr) {
        let lhs_lit = match lhs.kind {
            ExprKind::BoolLit(b) => Some(b),
            _ => None,
        };
        let rhs_lit = match rhs.kind {
            ExprKind::BoolLit(b) => Some(b),
            _ => None,
        };
        let identity = op == BinOp::LAnd;
        if let Some(b) = lhs_lit {
            return if b == identity {
                (*rhs, true)
            } else {
                let lit = cx.builder.bool_lit(b);
                cx.provenance.copy(id, lit.id);
                (lit, true)
            };
        }
        if let Some(b) = rhs_lit {
            return if b == identity {
                (*lhs, true)
            } else {
                let lit = cx.builder.bool_lit(b);
                cx.provenance.copy(id, lit.id);
                (lit, true)
            };
        }
    }

    // Integer constant folding
    if let (ExprKind::IntLit(a), ExprKind::IntLit(b)) = (&lhs.kind, &rhs.kind) {
        let (a, b) = (*a, *b);
        let folded = match op {
            BinOp::Add => Some(a.wrapping_add(b)),
            BinOp::Sub => Some(a.wrapping_sub(b)),
            BinOp::Mul => Some(a.wrapping_mul(b)),
            BinOp::And => Some(a & b),
            BinOp::Or => Some(a | b),
            BinOp::Xor => Some(a ^ b),
            _ => None,
        };
        if let Some(value) = folded {
            let lit = cx.builder.int_lit(ty, value);
            cx.provenance.copy(id, lit.id);
            return (lit, true);
        }
        let compared = match op {
            BinOp::Eq => Some(a == b),
            BinOp::Ne => Some(a != b),
            BinOp::Lt => Some(a < b),
            BinOp::Le => Some(a <= b),
            BinOp::Gt => Some(a > b),
            BinOp::Ge => Some(a >= b),
            _ => None,
        };
        if let Some(value) = compared {
            let lit = cx.builder.bool_lit(value);
            cx.provenance.copy(id, lit.id);
            return (lit, true);
        }
    }

    (
        Expr {
            id,
            ty,
            kind: ExprKind::Binary { op, lhs, rhs },
        },
        false,
    )
}

fn combine_assign(
    id: crate::ast::NodeId,
    ty: crate::ast::CType,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    cx: &mut AstContext,
) -> (Expr, bool) {
    // `a = a op b` becomes `a op= b`
    let is_compound = match (&lhs.kind, &rhs.kind) {
        (ExprKind::VarRef(target), ExprKind::Binary { op, lhs: bl, .. }) => {
            matches!(
                op,
                BinOp::Add
                    | BinOp::Sub
                    | BinOp::Mul
                    | BinOp::And
                    | BinOp::Or
                    | BinOp::Xor
                    | BinOp::Shl
                    | BinOp::Shr
            ) && matches!(&bl.kind, ExprKind::VarRef(name) if name == target)
        }
        _ => false,
    };
    if is_compound {
        let ExprKind::Binary { op, rhs: value, .. } = rhs.kind else {
            unreachable!()
        };
        let new = cx.builder.compound_assign(op, *lhs, *value);
        cx.provenance.copy(id, new.id);
        return (new, true);
    }

    (
        Expr {
            id,
            ty,
            kind: ExprKind::Assign {
                op: None,
                lhs,
                rhs,
            },
        },
        false,
    )
}
