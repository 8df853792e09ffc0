//! IR value translation
//!
//! Turns IR values into C expressions. Each non-constant value becomes
//! a function-local variable named after its IR name; constants become
//! literals. Branch guards inline the pure defining instructions of the
//! condition so refinement operates on real boolean formulas instead of
//! opaque temporaries. Every created node is registered with the
//! provenance map before anything else sees it.

use crate::ast::nodes::{BinOp, CType, Expr, Stmt, StmtKind, UnOp};
use crate::ast::{AstContext, IrEntity};
use crate::ir::{BinaryOp, BlockId, DefSite, Instr, IrFunction, IrType, UnaryOp, ValueId};
use std::collections::HashMap;

/// Backstop registration: any node of the tree still missing an entry
/// (an implicit cast inserted by the builder, for instance) is tied to
/// the value whose translation produced it
fn ensure_provenance(cx: &mut AstContext, e: &Expr, entity: IrEntity) {
    let mut ids = Vec::new();
    e.for_each(&mut |n| ids.push(n.id));
    for id in ids {
        if cx.provenance.get(id).is_none() {
            cx.provenance.set(id, entity);
        }
    }
}

/// Translator from IR values to expressions for one function
pub struct ExprGen<'a> {
    func: &'a IrFunction,
    defs: HashMap<ValueId, DefSite>,
    types: HashMap<ValueId, IrType>,
    names: HashMap<ValueId, String>,
}

impl<'a> ExprGen<'a> {
    pub fn new(func: &'a IrFunction) -> Self {
        let defs = func.defs();
        let types = func.value_types();
        let mut names = HashMap::new();
        for (&value, _) in &defs {
            let name = match func.value_names.get(&value) {
                Some(name) => name.clone(),
                None => format!("v{}", value.0),
            };
            names.insert(value, name);
        }
        Self {
            func,
            defs,
            types,
            names,
        }
    }

    pub fn name_of(&self, value: ValueId) -> &str {
        &self.names[&value]
    }

    pub fn ctype_of(&self, value: ValueId) -> CType {
        CType::from_ir(&self.types[&value])
    }

    fn def_instr(&self, value: ValueId) -> Option<&'a Instr> {
        match self.defs.get(&value)? {
            DefSite::Instr(block, idx) => Some(&self.func.get_block(*block)?.instructions[*idx]),
            _ => None,
        }
    }

    /// Expression for a use of a value: a literal for constants, a
    /// variable reference otherwise
    pub fn use_expr(&self, cx: &mut AstContext, value: ValueId) -> Expr {
        let expr = match self.def_instr(value) {
            Some(Instr::Const { value: n, ty, .. }) => match ty {
                IrType::Bool => cx.builder.bool_lit(*n != 0),
                _ => cx.builder.int_lit(CType::from_ir(ty), *n),
            },
            _ => {
                let ty = self.ctype_of(value);
                cx.builder.var_ref(ty, self.name_of(value))
            }
        };
        cx.provenance.set(expr.id, IrEntity::Value(value));
        cx.provenance.set_use(expr.id, value);
        expr
    }

    /// Boolean expression for a branch guard, inlining pure boolean
    /// structure (comparisons, conjunctions, negations) of the defining
    /// instructions
    pub fn guard_expr(&self, cx: &mut AstContext, value: ValueId) -> Expr {
        let expr = match self.def_instr(value) {
            Some(Instr::Const { value: n, .. }) => cx.builder.bool_lit(*n != 0),
            Some(Instr::Copy { src, .. }) => return self.guard_expr(cx, *src),
            Some(Instr::Binary {
                op, lhs, rhs, ..
            }) if op.is_comparison() => {
                let ast_op = comparison_op(*op);
                let lhs_e = self.operand_expr(cx, *lhs);
                let rhs_e = self.operand_expr(cx, *rhs);
                cx.builder.cmp(ast_op, lhs_e, rhs_e)
            }
            Some(Instr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
                ty: IrType::Bool,
                ..
            }) => {
                let lhs_e = self.guard_expr(cx, *lhs);
                let rhs_e = self.guard_expr(cx, *rhs);
                cx.builder.land(lhs_e, rhs_e)
            }
            Some(Instr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
                ty: IrType::Bool,
                ..
            }) => {
                let lhs_e = self.guard_expr(cx, *lhs);
                let rhs_e = self.guard_expr(cx, *rhs);
                cx.builder.lor(lhs_e, rhs_e)
            }
            Some(Instr::Binary {
                op: BinaryOp::Xor,
                lhs,
                rhs,
                ty: IrType::Bool,
                ..
            }) => {
                // Boolean xor reads best as an inequality
                let lhs_e = self.guard_expr(cx, *lhs);
                let rhs_e = self.guard_expr(cx, *rhs);
                cx.builder.cmp(BinOp::Ne, lhs_e, rhs_e)
            }
            Some(Instr::Unary {
                op: UnaryOp::Not,
                operand,
                ty: IrType::Bool,
                ..
            }) => {
                let inner = self.guard_expr(cx, *operand);
                cx.builder.lnot(inner)
            }
            _ => return self.use_expr(cx, value),
        };
        cx.provenance.set(expr.id, IrEntity::Value(value));
        cx.provenance.set_use(expr.id, value);
        ensure_provenance(cx, &expr, IrEntity::Value(value));
        expr
    }

    /// Operand of a comparison: inline boolean structure for booleans,
    /// use a plain reference or literal otherwise
    fn operand_expr(&self, cx: &mut AstContext, value: ValueId) -> Expr {
        if self.types.get(&value) == Some(&IrType::Bool) {
            self.guard_expr(cx, value)
        } else {
            self.use_expr(cx, value)
        }
    }

    /// Declarations for every value that is assigned by a statement
    pub fn decls(&self, cx: &mut AstContext) -> Vec<Stmt> {
        let mut block_ids: Vec<BlockId> = self.func.blocks.keys().copied().collect();
        block_ids.sort();

        let mut decls = Vec::new();
        for block_id in block_ids {
            let block = self.func.get_block(block_id).unwrap();
            for phi in &block.phi_nodes {
                decls.push(cx.builder.decl(
                    self.name_of(phi.dst),
                    CType::from_ir(&phi.ty),
                    None,
                ));
            }
            for instr in &block.instructions {
                if matches!(instr, Instr::Const { .. }) {
                    continue;
                }
                if let Some(dst) = instr.dst() {
                    decls.push(cx.builder.decl(self.name_of(dst), self.ctype_of(dst), None));
                }
            }
        }
        decls
    }

    /// Assignment of a phi selector variable for one incoming edge
    pub fn phi_assign(&self, cx: &mut AstContext, dst: ValueId, incoming: ValueId) -> Stmt {
        let target = self.use_expr(cx, dst);
        let value = self.use_expr(cx, incoming);
        let assign = cx.builder.assign(target, value);
        cx.provenance.set(assign.id, IrEntity::Value(dst));
        ensure_provenance(cx, &assign, IrEntity::Value(dst));
        cx.builder.expr_stmt(assign)
    }

    /// Statement form of one instruction, if it has one
    pub fn instr_stmt(&self, cx: &mut AstContext, block: BlockId, instr: &Instr) -> Option<Stmt> {
        let stmt = match instr {
            // Constants are always used inline
            Instr::Const { .. } => return None,
            Instr::Copy { dst, src, .. } => {
                let target = self.use_expr(cx, *dst);
                let value = self.use_expr(cx, *src);
                let assign = cx.builder.assign(target, value);
                cx.provenance.set(assign.id, IrEntity::Value(*dst));
                cx.builder.expr_stmt(assign)
            }
            Instr::Binary {
                dst, op, lhs, rhs, ty,
            } => {
                let rhs_expr = if op.is_comparison() {
                    let lhs_e = self.operand_expr(cx, *lhs);
                    let rhs_e = self.operand_expr(cx, *rhs);
                    cx.builder.cmp(comparison_op(*op), lhs_e, rhs_e)
                } else if *ty == IrType::Bool && matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let lhs_e = self.guard_expr(cx, *lhs);
                    let rhs_e = self.guard_expr(cx, *rhs);
                    match op {
                        BinaryOp::And => cx.builder.land(lhs_e, rhs_e),
                        _ => cx.builder.lor(lhs_e, rhs_e),
                    }
                } else {
                    let lhs_e = self.use_expr(cx, *lhs);
                    let rhs_e = self.use_expr(cx, *rhs);
                    cx.builder
                        .binary(arith_op(*op), CType::from_ir(ty), lhs_e, rhs_e)
                };
                cx.provenance.set(rhs_expr.id, IrEntity::Value(*dst));
                cx.provenance.set_use(rhs_expr.id, *dst);
                let target = self.use_expr(cx, *dst);
                let assign = cx.builder.assign(target, rhs_expr);
                cx.provenance.set(assign.id, IrEntity::Value(*dst));
                cx.builder.expr_stmt(assign)
            }
            Instr::Unary {
                dst, op, operand, ty,
            } => {
                let operand_e = self.use_expr(cx, *operand);
                let rhs_expr = match (op, ty) {
                    (UnaryOp::Not, IrType::Bool) => cx.builder.lnot(operand_e),
                    (UnaryOp::Not, _) => {
                        cx.builder.unary(UnOp::Not, CType::from_ir(ty), operand_e)
                    }
                    (UnaryOp::Neg, _) => {
                        cx.builder.unary(UnOp::Neg, CType::from_ir(ty), operand_e)
                    }
                };
                cx.provenance.set(rhs_expr.id, IrEntity::Value(*dst));
                cx.provenance.set_use(rhs_expr.id, *dst);
                let target = self.use_expr(cx, *dst);
                let assign = cx.builder.assign(target, rhs_expr);
                cx.provenance.set(assign.id, IrEntity::Value(*dst));
                cx.builder.expr_stmt(assign)
            }
            Instr::Load { dst, addr, ty } => {
                let addr_e = self.use_expr(cx, *addr);
                let load = cx.builder.unary(UnOp::Deref, CType::from_ir(ty), addr_e);
                cx.provenance.set(load.id, IrEntity::Value(*dst));
                let target = self.use_expr(cx, *dst);
                let assign = cx.builder.assign(target, load);
                cx.provenance.set(assign.id, IrEntity::Value(*dst));
                cx.builder.expr_stmt(assign)
            }
            Instr::Store { addr, value } => {
                let addr_e = self.use_expr(cx, *addr);
                let pointee = match &self.types[addr] {
                    IrType::Ptr(pointee) => CType::from_ir(pointee),
                    other => CType::from_ir(other),
                };
                let target = cx.builder.unary(UnOp::Deref, pointee, addr_e);
                cx.provenance.set(target.id, IrEntity::Value(*addr));
                let value_e = self.use_expr(cx, *value);
                let assign = cx.builder.assign(target, value_e);
                cx.provenance.set(assign.id, IrEntity::Value(*value));
                cx.builder.expr_stmt(assign)
            }
            Instr::Call {
                dst,
                callee,
                args,
                ty,
            } => {
                let arg_exprs: Vec<Expr> =
                    args.iter().map(|a| self.use_expr(cx, *a)).collect();
                let call = cx.builder.call(CType::from_ir(ty), callee, arg_exprs);
                match dst {
                    Some(dst) => {
                        cx.provenance.set(call.id, IrEntity::Value(*dst));
                        let target = self.use_expr(cx, *dst);
                        let assign = cx.builder.assign(target, call);
                        cx.provenance.set(assign.id, IrEntity::Value(*dst));
                        cx.builder.expr_stmt(assign)
                    }
                    None => {
                        cx.provenance.set(call.id, IrEntity::Block(block));
                        cx.builder.expr_stmt(call)
                    }
                }
            }
        };
        let entity = instr
            .dst()
            .map(IrEntity::Value)
            .unwrap_or(IrEntity::Block(block));
        if let StmtKind::Expr(e) = &stmt.kind {
            ensure_provenance(cx, e, entity);
        }
        Some(stmt)
    }
}

fn comparison_op(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Ne => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        _ => unreachable!("not a comparison"),
    }
}

fn arith_op(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::And => BinOp::And,
        BinaryOp::Or => BinOp::Or,
        BinaryOp::Xor => BinOp::Xor,
        BinaryOp::Shl => BinOp::Shl,
        BinaryOp::LShr | BinaryOp::AShr => BinOp::Shr,
        _ => unreachable!("not an arithmetic operation"),
    }
}
