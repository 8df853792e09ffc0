//! Output C AST, node factory, provenance bookkeeping and printer

pub mod builder;
pub mod nodes;
pub mod printer;
pub mod provenance;

pub use builder::AstBuilder;
pub use nodes::{
    BinOp, CType, Expr, ExprKind, FunctionDef, NodeId, Stmt, StmtKind, TranslationUnit, UnOp,
    canon_key,
};
pub use printer::print_unit;
pub use provenance::{IrEntity, Provenance, check_totality, live_expr_nodes};

/// Per-run context owning the node factory and the provenance map
///
/// Created when structuring starts, mutated by structuring and
/// refinement, dropped after printing.
#[derive(Debug, Default)]
pub struct AstContext {
    pub builder: AstBuilder,
    pub provenance: Provenance,
}

impl AstContext {
    pub fn new() -> Self {
        Self {
            builder: AstBuilder::new(),
            provenance: Provenance::new(),
        }
    }

    /// Deep-clone an expression with fresh node IDs, copying provenance
    /// entries node-for-node
    pub fn clone_expr(&mut self, e: &Expr) -> Expr {
        let kind = match &e.kind {
            ExprKind::IntLit(n) => ExprKind::IntLit(*n),
            ExprKind::BoolLit(b) => ExprKind::BoolLit(*b),
            ExprKind::VarRef(name) => ExprKind::VarRef(name.clone()),
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: Box::new(self.clone_expr(operand)),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: Box::new(self.clone_expr(lhs)),
                rhs: Box::new(self.clone_expr(rhs)),
            },
            ExprKind::Assign { op, lhs, rhs } => ExprKind::Assign {
                op: *op,
                lhs: Box::new(self.clone_expr(lhs)),
                rhs: Box::new(self.clone_expr(rhs)),
            },
            ExprKind::Cast { operand } => ExprKind::Cast {
                operand: Box::new(self.clone_expr(operand)),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: callee.clone(),
                args: args.iter().map(|a| self.clone_expr(a)).collect(),
            },
        };
        let clone = Expr {
            id: self.builder.fresh_id(),
            ty: e.ty.clone(),
            kind,
        };
        self.provenance.copy(e.id, clone.id);
        clone
    }

    /// Build `!e`, inheriting provenance from the negated expression
    pub fn lnot_of(&mut self, e: Expr) -> Expr {
        let source = e.id;
        let negated = self.builder.lnot(e);
        self.provenance.copy(source, negated.id);
        negated
    }
}
