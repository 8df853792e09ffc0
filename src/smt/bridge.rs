//! AST / Z3 translation
//!
//! Boolean expressions lower structurally; integer subterms lower to
//! bit-vectors with the width and signedness of their C type. Every
//! lowered term is remembered in a reverse cache so that rebuilding an
//! expression after simplification reuses the original sub-expressions
//! (and their provenance) wherever the solver kept them intact.

use crate::ast::nodes::{BinOp, CType, Expr, ExprKind, UnOp};
use crate::ast::AstContext;
use crate::smt::SmtError;
use std::collections::HashMap;
use z3::ast::{Ast, BV, Bool, Dynamic};
use z3::DeclKind;

/// Bidirectional converter between AST booleans and Z3 formulas
#[derive(Default)]
pub struct Z3Bridge {
    /// Z3 term to the AST expression it was lowered from
    back: HashMap<Dynamic, Expr>,
    /// Named constants to the opaque expressions they stand for
    consts: HashMap<String, Expr>,
}

impl Z3Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // AST -> Z3
    // ========================================================================

    pub fn to_bool(&mut self, e: &Expr) -> Result<Bool, SmtError> {
        let term = match &e.kind {
            ExprKind::BoolLit(b) => Bool::from_bool(*b),
            ExprKind::VarRef(name) => {
                self.consts.insert(name.clone(), e.clone());
                Bool::new_const(name.as_str())
            }
            ExprKind::Unary {
                op: UnOp::LNot,
                operand,
            } => self.to_bool(operand)?.not(),
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinOp::LAnd => {
                    let l = self.to_bool(lhs)?;
                    let r = self.to_bool(rhs)?;
                    Bool::and(&[&l, &r])
                }
                BinOp::LOr => {
                    let l = self.to_bool(lhs)?;
                    let r = self.to_bool(rhs)?;
                    Bool::or(&[&l, &r])
                }
                op if op.is_comparison() && lhs.ty.is_bool() => {
                    let l = self.to_bool(lhs)?;
                    let r = self.to_bool(rhs)?;
                    match op {
                        BinOp::Eq => l._eq(&r),
                        BinOp::Ne => l._eq(&r).not(),
                        _ => return Err(SmtError::Unsupported("ordering on booleans".into())),
                    }
                }
                op if op.is_comparison() => {
                    let l = self.to_bv(lhs)?;
                    let r = self.to_bv(rhs)?;
                    let signed = lhs.ty.is_signed() || rhs.ty.is_signed();
                    match (op, signed) {
                        (BinOp::Eq, _) => l._eq(&r),
                        (BinOp::Ne, _) => l._eq(&r).not(),
                        (BinOp::Lt, true) => l.bvslt(&r),
                        (BinOp::Le, true) => l.bvsle(&r),
                        (BinOp::Gt, true) => l.bvsgt(&r),
                        (BinOp::Ge, true) => l.bvsge(&r),
                        (BinOp::Lt, false) => l.bvult(&r),
                        (BinOp::Le, false) => l.bvule(&r),
                        (BinOp::Gt, false) => l.bvugt(&r),
                        (BinOp::Ge, false) => l.bvuge(&r),
                        _ => unreachable!("non-comparison handled above"),
                    }
                }
                _ => return Err(SmtError::Unsupported(format!("boolean operator {}", op))),
            },
            ExprKind::Cast { operand } if operand.ty.is_integer() => {
                // Integer-to-boolean conversion tests against zero
                let inner = self.to_bv(operand)?;
                let zero = BV::from_i64(0, operand.ty.bits());
                inner._eq(&zero).not()
            }
            _ => self.opaque_bool(e)?,
        };
        self.back.insert(Dynamic::from_ast(&term), e.clone());
        Ok(term)
    }

    fn to_bv(&mut self, e: &Expr) -> Result<BV, SmtError> {
        let bits = e.ty.bits();
        let term = match &e.kind {
            ExprKind::IntLit(n) => BV::from_i64(*n, bits),
            ExprKind::VarRef(name) => {
                self.consts.insert(name.clone(), e.clone());
                BV::new_const(name.as_str(), bits)
            }
            ExprKind::Unary { op, operand } => {
                let inner = self.to_bv(operand)?;
                match op {
                    UnOp::Not => inner.bvnot(),
                    UnOp::Neg => inner.bvneg(),
                    _ => return self.opaque_bv(e),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.to_bv(lhs)?;
                let r = self.to_bv(rhs)?;
                match op {
                    BinOp::Add => l.bvadd(&r),
                    BinOp::Sub => l.bvsub(&r),
                    BinOp::Mul => l.bvmul(&r),
                    BinOp::And => l.bvand(&r),
                    BinOp::Or => l.bvor(&r),
                    BinOp::Xor => l.bvxor(&r),
                    BinOp::Shl => l.bvshl(&r),
                    BinOp::Shr if e.ty.is_signed() => l.bvashr(&r),
                    BinOp::Shr => l.bvlshr(&r),
                    _ => return Err(SmtError::Unsupported(format!("bit-vector operator {}", op))),
                }
            }
            ExprKind::Cast { operand } if operand.ty.is_integer() && e.ty.is_integer() => {
                let inner = self.to_bv(operand)?;
                let from = operand.ty.bits();
                if bits > from {
                    if operand.ty.is_signed() {
                        inner.sign_ext(bits - from)
                    } else {
                        inner.zero_ext(bits - from)
                    }
                } else if bits < from {
                    inner.extract(bits - 1, 0)
                } else {
                    inner
                }
            }
            ExprKind::Cast { operand } if operand.ty.is_bool() => {
                let inner = self.to_bool(operand)?;
                let one = BV::from_i64(1, bits);
                let zero = BV::from_i64(0, bits);
                inner.ite(&one, &zero)
            }
            _ => return self.opaque_bv(e),
        };
        self.back.insert(Dynamic::from_ast(&term), e.clone());
        Ok(term)
    }

    /// Subterms the theory cannot express become fresh named constants
    fn opaque_bool(&mut self, e: &Expr) -> Result<Bool, SmtError> {
        let name = self.opaque_name(e);
        self.consts.insert(name.clone(), e.clone());
        Ok(Bool::new_const(name.as_str()))
    }

    fn opaque_bv(&mut self, e: &Expr) -> Result<BV, SmtError> {
        if !e.ty.is_integer() {
            return Err(SmtError::Unsupported(format!(
                "cannot lower type {} to a bit-vector",
                e.ty
            )));
        }
        let name = self.opaque_name(e);
        self.consts.insert(name.clone(), e.clone());
        let term = BV::new_const(name.as_str(), e.ty.bits());
        self.back.insert(Dynamic::from_ast(&term), e.clone());
        Ok(term)
    }

    fn opaque_name(&self, e: &Expr) -> String {
        format!("opaque!{}", e.id.0)
    }

    // ========================================================================
    // Z3 -> AST
    // ========================================================================

    /// Rebuild an expression from a simplified formula
    ///
    /// Cached terms come back as clones of the original sub-expressions
    /// with provenance intact; genuinely new terms are built fresh and
    /// inherit the provenance of `source`.
    pub fn from_bool(
        &self,
        cx: &mut AstContext,
        term: &Bool,
        source: &Expr,
    ) -> Result<Expr, SmtError> {
        if let Some(template) = self.back.get(&Dynamic::from_ast(term)) {
            let template = template.clone();
            return Ok(cx.clone_expr(&template));
        }

        let decl = term.decl();
        let children = term.children();
        let expr = match decl.kind() {
            DeclKind::True => self.fresh_bool_lit(cx, true, source),
            DeclKind::False => self.fresh_bool_lit(cx, false, source),
            DeclKind::Not => {
                let inner = self.child_bool(cx, &children, 0, source)?;
                let e = cx.builder.lnot(inner);
                cx.provenance.copy(source.id, e.id);
                e
            }
            DeclKind::And => self.fold_connective(cx, &children, source, true)?,
            DeclKind::Or => self.fold_connective(cx, &children, source, false)?,
            DeclKind::Eq | DeclKind::Iff => self.comparison(cx, &children, BinOp::Eq, source)?,
            DeclKind::Distinct | DeclKind::Xor => {
                self.comparison(cx, &children, BinOp::Ne, source)?
            }
            DeclKind::Slt | DeclKind::Ult => self.comparison(cx, &children, BinOp::Lt, source)?,
            DeclKind::Sleq | DeclKind::Uleq => {
                self.comparison(cx, &children, BinOp::Le, source)?
            }
            DeclKind::Sgt | DeclKind::Ugt => self.comparison(cx, &children, BinOp::Gt, source)?,
            DeclKind::Sgeq | DeclKind::Ugeq => {
                self.comparison(cx, &children, BinOp::Ge, source)?
            }
            DeclKind::Uninterpreted => {
                let name = decl.name();
                match self.consts.get(&name) {
                    Some(template) => {
                        let template = template.clone();
                        cx.clone_expr(&template)
                    }
                    None => {
                        return Err(SmtError::Unsupported(format!(
                            "foreign constant `{}` in simplified formula",
                            name
                        )));
                    }
                }
            }
            other => {
                return Err(SmtError::Unsupported(format!(
                    "declaration kind {:?} in simplified formula",
                    other
                )));
            }
        };
        Ok(expr)
    }

    fn from_bv(&self, cx: &mut AstContext, term: &BV, source: &Expr) -> Result<Expr, SmtError> {
        if let Some(template) = self.back.get(&Dynamic::from_ast(term)) {
            let template = template.clone();
            return Ok(cx.clone_expr(&template));
        }

        let decl = term.decl();
        let children = term.children();
        let expr = match decl.kind() {
            DeclKind::Bnum => {
                let value = term
                    .as_i64()
                    .or_else(|| term.as_u64().map(|v| v as i64))
                    .ok_or_else(|| SmtError::Unsupported("oversized numeral".into()))?;
                let ty = CType::Int {
                    bits: term.get_size(),
                    signed: true,
                };
                let lit = cx.builder.int_lit(ty, value);
                cx.provenance.copy(source.id, lit.id);
                lit
            }
            DeclKind::Badd => self.bv_chain(cx, &children, BinOp::Add, source)?,
            DeclKind::Bsub => self.bv_chain(cx, &children, BinOp::Sub, source)?,
            DeclKind::Bmul => self.bv_chain(cx, &children, BinOp::Mul, source)?,
            DeclKind::Band => self.bv_chain(cx, &children, BinOp::And, source)?,
            DeclKind::Bor => self.bv_chain(cx, &children, BinOp::Or, source)?,
            DeclKind::Bxor => self.bv_chain(cx, &children, BinOp::Xor, source)?,
            DeclKind::Bshl => self.bv_chain(cx, &children, BinOp::Shl, source)?,
            DeclKind::Blshr | DeclKind::Bashr => {
                self.bv_chain(cx, &children, BinOp::Shr, source)?
            }
            DeclKind::Bnot => {
                let inner = self.child_bv(cx, &children, 0, source)?;
                let ty = inner.ty.clone();
                let e = cx.builder.unary(UnOp::Not, ty, inner);
                cx.provenance.copy(source.id, e.id);
                e
            }
            DeclKind::Bneg => {
                let inner = self.child_bv(cx, &children, 0, source)?;
                let ty = inner.ty.clone();
                let e = cx.builder.unary(UnOp::Neg, ty, inner);
                cx.provenance.copy(source.id, e.id);
                e
            }
            DeclKind::Uninterpreted => {
                let name = decl.name();
                match self.consts.get(&name) {
                    Some(template) => {
                        let template = template.clone();
                        cx.clone_expr(&template)
                    }
                    None => {
                        return Err(SmtError::Unsupported(format!(
                            "foreign constant `{}` in simplified formula",
                            name
                        )));
                    }
                }
            }
            other => {
                return Err(SmtError::Unsupported(format!(
                    "bit-vector declaration kind {:?} in simplified formula",
                    other
                )));
            }
        };
        Ok(expr)
    }

    fn fresh_bool_lit(&self, cx: &mut AstContext, value: bool, source: &Expr) -> Expr {
        let lit = cx.builder.bool_lit(value);
        cx.provenance.copy(source.id, lit.id);
        lit
    }

    fn child_bool(
        &self,
        cx: &mut AstContext,
        children: &[Dynamic],
        idx: usize,
        source: &Expr,
    ) -> Result<Expr, SmtError> {
        let child = children
            .get(idx)
            .and_then(|c| c.as_bool())
            .ok_or_else(|| SmtError::Unsupported("malformed boolean term".into()))?;
        self.from_bool(cx, &child, source)
    }

    fn child_bv(
        &self,
        cx: &mut AstContext,
        children: &[Dynamic],
        idx: usize,
        source: &Expr,
    ) -> Result<Expr, SmtError> {
        let child = children
            .get(idx)
            .and_then(|c| c.as_bv())
            .ok_or_else(|| SmtError::Unsupported("malformed bit-vector term".into()))?;
        self.from_bv(cx, &child, source)
    }

    fn fold_connective(
        &self,
        cx: &mut AstContext,
        children: &[Dynamic],
        source: &Expr,
        conjunction: bool,
    ) -> Result<Expr, SmtError> {
        if children.is_empty() {
            return Ok(self.fresh_bool_lit(cx, conjunction, source));
        }
        let mut acc = self.child_bool(cx, children, 0, source)?;
        for idx in 1..children.len() {
            let rhs = self.child_bool(cx, children, idx, source)?;
            acc = if conjunction {
                cx.builder.land(acc, rhs)
            } else {
                cx.builder.lor(acc, rhs)
            };
            cx.provenance.copy(source.id, acc.id);
        }
        Ok(acc)
    }

    fn comparison(
        &self,
        cx: &mut AstContext,
        children: &[Dynamic],
        op: BinOp,
        source: &Expr,
    ) -> Result<Expr, SmtError> {
        let (lhs, rhs) = match (children.first(), children.get(1)) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(SmtError::Unsupported("malformed comparison".into())),
        };
        let (lhs, rhs) = match (lhs.as_bool(), rhs.as_bool()) {
            (Some(l), Some(r)) => (self.from_bool(cx, &l, source)?, self.from_bool(cx, &r, source)?),
            _ => {
                let l = lhs
                    .as_bv()
                    .ok_or_else(|| SmtError::Unsupported("malformed comparison".into()))?;
                let r = rhs
                    .as_bv()
                    .ok_or_else(|| SmtError::Unsupported("malformed comparison".into()))?;
                (self.from_bv(cx, &l, source)?, self.from_bv(cx, &r, source)?)
            }
        };
        let e = cx.builder.cmp(op, lhs, rhs);
        cx.provenance.copy(source.id, e.id);
        Ok(e)
    }

    fn bv_chain(
        &self,
        cx: &mut AstContext,
        children: &[Dynamic],
        op: BinOp,
        source: &Expr,
    ) -> Result<Expr, SmtError> {
        if children.is_empty() {
            return Err(SmtError::Unsupported("empty bit-vector term".into()));
        }
        let mut acc = self.child_bv(cx, children, 0, source)?;
        for idx in 1..children.len() {
            let rhs = self.child_bv(cx, children, idx, source)?;
            let ty = acc.ty.clone();
            acc = cx.builder.binary(op, ty, acc, rhs);
            cx.provenance.copy(source.id, acc.id);
        }
        Ok(acc)
    }
}
