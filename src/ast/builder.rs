//! AST node factory
//!
//! All node construction goes through the builder: it hands out the
//! stable IDs that key the provenance map, and it inserts the implicit
//! integer casts the output language requires. Passes never assemble
//! node structs by hand.

use crate::ast::nodes::{BinOp, CType, Expr, ExprKind, NodeId, Stmt, StmtKind, UnOp};

/// Factory for typed AST nodes
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u64,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    pub(crate) fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        NodeId(id)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn int_lit(&mut self, ty: CType, value: i64) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::IntLit(value),
        }
    }

    pub fn bool_lit(&mut self, value: bool) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty: CType::Bool,
            kind: ExprKind::BoolLit(value),
        }
    }

    pub fn var_ref(&mut self, ty: CType, name: &str) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::VarRef(name.to_string()),
        }
    }

    pub fn unary(&mut self, op: UnOp, ty: CType, operand: Expr) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        }
    }

    /// Logical negation; the operand must already be boolean
    pub fn lnot(&mut self, operand: Expr) -> Expr {
        self.unary(UnOp::LNot, CType::Bool, operand)
    }

    pub fn land(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinOp::LAnd, CType::Bool, lhs, rhs)
    }

    pub fn lor(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinOp::LOr, CType::Bool, lhs, rhs)
    }

    pub fn binary(&mut self, op: BinOp, ty: CType, lhs: Expr, rhs: Expr) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    /// Comparison over integer operands; widths are unified with an
    /// implicit cast on the narrower side
    pub fn cmp(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let (lhs, rhs) = self.unify_widths(lhs, rhs);
        self.binary(op, CType::Bool, lhs, rhs)
    }

    pub fn cast(&mut self, to: CType, operand: Expr) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty: to,
            kind: ExprKind::Cast {
                operand: Box::new(operand),
            },
        }
    }

    /// Plain assignment; the value is cast when its type disagrees with
    /// the target
    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        let rhs = self.coerce(lhs.ty.clone(), rhs);
        let ty = lhs.ty.clone();
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::Assign {
                op: None,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    pub fn compound_assign(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = lhs.ty.clone();
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::Assign {
                op: Some(op),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    pub fn call(&mut self, ty: CType, callee: &str, args: Vec<Expr>) -> Expr {
        Expr {
            id: self.fresh_id(),
            ty,
            kind: ExprKind::Call {
                callee: callee.to_string(),
                args,
            },
        }
    }

    /// Insert a cast when the expression's type differs from the target
    pub fn coerce(&mut self, to: CType, expr: Expr) -> Expr {
        if expr.ty == to {
            expr
        } else {
            self.cast(to, expr)
        }
    }

    fn unify_widths(&mut self, lhs: Expr, rhs: Expr) -> (Expr, Expr) {
        if !lhs.ty.is_integer() || !rhs.ty.is_integer() || lhs.ty.bits() == rhs.ty.bits() {
            return (lhs, rhs);
        }
        if lhs.ty.bits() >= rhs.ty.bits() {
            let ty = lhs.ty.clone();
            let rhs = self.cast(ty, rhs);
            (lhs, rhs)
        } else {
            let ty = rhs.ty.clone();
            let lhs = self.cast(ty, lhs);
            (lhs, rhs)
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn compound(&mut self, stmts: Vec<Stmt>) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Compound(stmts),
        }
    }

    pub fn decl(&mut self, name: &str, ty: CType, init: Option<Expr>) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Decl {
                name: name.to_string(),
                ty,
                init,
            },
        }
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Expr(expr),
        }
    }

    pub fn if_stmt(&mut self, cond: Expr, then_stmt: Stmt, else_stmt: Option<Stmt>) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::If {
                cond,
                then_stmt: Box::new(then_stmt),
                else_stmt: else_stmt.map(Box::new),
            },
        }
    }

    pub fn while_stmt(&mut self, cond: Expr, body: Stmt) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::While {
                cond,
                body: Box::new(body),
            },
        }
    }

    pub fn do_stmt(&mut self, cond: Expr, body: Stmt) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::DoWhile {
                cond,
                body: Box::new(body),
            },
        }
    }

    pub fn brk(&mut self) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Break,
        }
    }

    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Return(value),
        }
    }

    pub fn null_stmt(&mut self) -> Stmt {
        Stmt {
            id: self.fresh_id(),
            kind: StmtKind::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_ty() -> CType {
        CType::Int {
            bits: 32,
            signed: false,
        }
    }

    fn u8_ty() -> CType {
        CType::Int {
            bits: 8,
            signed: false,
        }
    }

    #[test]
    fn test_assign_inserts_implicit_cast() {
        let mut b = AstBuilder::new();
        let lhs = b.var_ref(u32_ty(), "x");
        let rhs = b.var_ref(u8_ty(), "y");
        let assign = b.assign(lhs, rhs);
        match assign.kind {
            ExprKind::Assign { rhs, .. } => {
                assert!(matches!(rhs.kind, ExprKind::Cast { .. }));
                assert_eq!(rhs.ty, u32_ty());
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn test_cmp_unifies_widths() {
        let mut b = AstBuilder::new();
        let lhs = b.var_ref(u8_ty(), "a");
        let rhs = b.var_ref(u32_ty(), "b");
        let cmp = b.cmp(BinOp::Lt, lhs, rhs);
        assert_eq!(cmp.ty, CType::Bool);
        match cmp.kind {
            ExprKind::Binary { lhs, .. } => {
                assert!(matches!(lhs.kind, ExprKind::Cast { .. }));
            }
            _ => panic!("expected comparison"),
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let mut b = AstBuilder::new();
        let x = b.var_ref(u32_ty(), "x");
        let y = b.var_ref(u32_ty(), "y");
        assert_ne!(x.id, y.id);
    }
}
