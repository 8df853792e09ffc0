//! Output C AST
//!
//! The refined program is represented as a strict tree of typed nodes
//! in a C-family grammar. Every node carries a stable ID assigned by
//! the builder; IDs are never reused, so side tables keyed by them stay
//! valid across rewrites.

use crate::ir::IrType;
use std::collections::HashMap;
use std::fmt;

/// Stable identifier for an AST node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// C-level types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CType {
    Void,
    Bool,
    Int { bits: u32, signed: bool },
    Ptr(Box<CType>),
}

impl CType {
    pub fn from_ir(ty: &IrType) -> Self {
        match ty {
            IrType::Bool => CType::Bool,
            IrType::Int { bits, signed } => CType::Int {
                bits: *bits,
                signed: *signed,
            },
            IrType::Ptr(pointee) => CType::Ptr(Box::new(CType::from_ir(pointee))),
            IrType::Void => CType::Void,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, CType::Bool)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CType::Int { .. })
    }

    pub fn bits(&self) -> u32 {
        match self {
            CType::Bool => 1,
            CType::Int { bits, .. } => *bits,
            CType::Ptr(_) => 64,
            CType::Void => 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, CType::Int { signed: true, .. })
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Bool => write!(f, "bool"),
            CType::Int { bits, signed: true } => write!(f, "int{}_t", bits),
            CType::Int {
                bits,
                signed: false,
            } => write!(f, "uint{}_t", bits),
            CType::Ptr(pointee) => write!(f, "{} *", pointee),
        }
    }
}

/// Binary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LAnd,
    LOr,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// The comparison with the complementary truth table
    pub fn negated_comparison(&self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::Ne),
            BinOp::Ne => Some(BinOp::Eq),
            BinOp::Lt => Some(BinOp::Ge),
            BinOp::Ge => Some(BinOp::Lt),
            BinOp::Gt => Some(BinOp::Le),
            BinOp::Le => Some(BinOp::Gt),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::LAnd => "&&",
            BinOp::LOr => "||",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// Logical negation `!`
    LNot,
    /// Bitwise complement `~`
    Not,
    /// Arithmetic negation `-`
    Neg,
    /// Pointer dereference `*`
    Deref,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            UnOp::LNot => "!",
            UnOp::Not => "~",
            UnOp::Neg => "-",
            UnOp::Deref => "*",
        };
        write!(f, "{}", s)
    }
}

/// Expression node
#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub ty: CType,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    IntLit(i64),
    BoolLit(bool),
    VarRef(String),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Assignment, plain (`=`) or compound (`+=` etc.)
    Assign {
        op: Option<BinOp>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Implicit or explicit conversion to `self.ty`
    Cast {
        operand: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Visit this expression and all sub-expressions, preorder
    pub fn for_each(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::IntLit(_) | ExprKind::BoolLit(_) | ExprKind::VarRef(_) => {}
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand } => operand.for_each(f),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs, .. } => {
                lhs.for_each(f);
                rhs.for_each(f);
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.for_each(f);
                }
            }
        }
    }

    /// Total node count of this expression tree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.for_each(&mut |_| count += 1);
        count
    }

    /// True when evaluation has no side effects
    pub fn is_pure(&self) -> bool {
        let mut pure = true;
        self.for_each(&mut |e| {
            if matches!(e.kind, ExprKind::Assign { .. } | ExprKind::Call { .. }) {
                pure = false;
            }
        });
        pure
    }

    pub fn is_bool_lit(&self, value: bool) -> bool {
        matches!(self.kind, ExprKind::BoolLit(b) if b == value)
    }
}

/// Structural cache key for boolean expressions
///
/// Operands of `&&` and `||` are flattened and sorted, so keys are
/// stable under commutativity of the logical connectives.
pub fn canon_key(e: &Expr) -> String {
    fn flatten<'a>(e: &'a Expr, op: BinOp, out: &mut Vec<&'a Expr>) {
        match &e.kind {
            ExprKind::Binary { op: o, lhs, rhs } if *o == op => {
                flatten(lhs, op, out);
                flatten(rhs, op, out);
            }
            _ => out.push(e),
        }
    }

    match &e.kind {
        ExprKind::IntLit(n) => format!("i{}", n),
        ExprKind::BoolLit(b) => format!("B{}", b),
        ExprKind::VarRef(name) => format!("v:{}", name),
        ExprKind::Unary { op, operand } => format!("u{}({})", op, canon_key(operand)),
        ExprKind::Binary { op, lhs, rhs } => match op {
            BinOp::LAnd | BinOp::LOr => {
                let mut operands = Vec::new();
                flatten(e, *op, &mut operands);
                let mut keys: Vec<String> = operands.iter().map(|o| canon_key(o)).collect();
                keys.sort();
                format!("l{}[{}]", op, keys.join(","))
            }
            _ => format!("b{}({},{})", op, canon_key(lhs), canon_key(rhs)),
        },
        ExprKind::Assign { op, lhs, rhs } => match op {
            Some(op) => format!("a{}({},{})", op, canon_key(lhs), canon_key(rhs)),
            None => format!("a=({},{})", canon_key(lhs), canon_key(rhs)),
        },
        ExprKind::Cast { operand } => format!("c<{}>({})", e.ty, canon_key(operand)),
        ExprKind::Call { callee, args } => {
            let keys: Vec<String> = args.iter().map(canon_key).collect();
            format!("f{}({})", callee, keys.join(","))
        }
    }
}

/// Statement node
#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Compound(Vec<Stmt>),
    Decl {
        name: String,
        ty: CType,
        init: Option<Expr>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        cond: Expr,
        body: Box<Stmt>,
    },
    Break,
    Return(Option<Expr>),
    Null,
}

impl Stmt {
    pub fn is_null(&self) -> bool {
        matches!(self.kind, StmtKind::Null)
    }

    pub fn as_compound(&self) -> Option<&Vec<Stmt>> {
        match &self.kind {
            StmtKind::Compound(stmts) => Some(stmts),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Vec<Stmt>> {
        match &mut self.kind {
            StmtKind::Compound(stmts) => Some(stmts),
            _ => None,
        }
    }

    /// True when a `break` occurs anywhere below this statement
    pub fn contains_break(&self) -> bool {
        self.break_count() > 0
    }

    /// Number of `break` statements anywhere below this statement
    pub fn break_count(&self) -> usize {
        let mut count = 0;
        self.for_each_stmt(&mut |s| {
            if matches!(s.kind, StmtKind::Break) {
                count += 1;
            }
        });
        count
    }

    /// Visit this statement and all sub-statements, preorder
    pub fn for_each_stmt(&self, f: &mut impl FnMut(&Stmt)) {
        f(self);
        match &self.kind {
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    s.for_each_stmt(f);
                }
            }
            StmtKind::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                then_stmt.for_each_stmt(f);
                if let Some(e) = else_stmt {
                    e.for_each_stmt(f);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => body.for_each_stmt(f),
            _ => {}
        }
    }

    /// Visit every expression in this statement tree
    pub fn for_each_expr(&self, f: &mut impl FnMut(&Expr)) {
        self.for_each_stmt(&mut |s| match &s.kind {
            StmtKind::Decl { init: Some(e), .. }
            | StmtKind::Expr(e)
            | StmtKind::Return(Some(e)) => e.for_each(f),
            StmtKind::If { cond, .. }
            | StmtKind::While { cond, .. }
            | StmtKind::DoWhile { cond, .. } => cond.for_each(f),
            _ => {}
        });
    }

    /// Count reads of each variable name below this statement
    ///
    /// The target of a plain assignment is a write, not a read; the
    /// target of a compound assignment is both.
    pub fn count_reads(&self, counts: &mut HashMap<String, usize>) {
        fn count_expr(e: &Expr, counts: &mut HashMap<String, usize>) {
            match &e.kind {
                ExprKind::VarRef(name) => {
                    *counts.entry(name.clone()).or_insert(0) += 1;
                }
                ExprKind::Assign { op, lhs, rhs } => {
                    match (&lhs.kind, op) {
                        (ExprKind::VarRef(_), None) => {}
                        _ => count_expr(lhs, counts),
                    }
                    count_expr(rhs, counts);
                }
                ExprKind::Unary { operand, .. } | ExprKind::Cast { operand } => {
                    count_expr(operand, counts)
                }
                ExprKind::Binary { lhs, rhs, .. } => {
                    count_expr(lhs, counts);
                    count_expr(rhs, counts);
                }
                ExprKind::Call { args, .. } => {
                    for arg in args {
                        count_expr(arg, counts);
                    }
                }
                ExprKind::IntLit(_) | ExprKind::BoolLit(_) => {}
            }
        }

        self.for_each_stmt(&mut |s| match &s.kind {
            StmtKind::Decl { init: Some(e), .. }
            | StmtKind::Expr(e)
            | StmtKind::Return(Some(e)) => count_expr(e, counts),
            StmtKind::If { cond, .. }
            | StmtKind::While { cond, .. }
            | StmtKind::DoWhile { cond, .. } => count_expr(cond, counts),
            _ => {}
        });
    }
}

/// A function definition
#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<(String, CType)>,
    /// Always a compound statement
    pub body: Stmt,
}

/// The root declaration of the output program
#[derive(Clone, Debug, Default)]
pub struct TranslationUnit {
    pub functions: Vec<FunctionDef>,
}

impl TranslationUnit {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
        }
    }
}
