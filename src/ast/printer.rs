//! Textual C printer
//!
//! Renders a translation unit as C99 source. Parenthesization is
//! driven by operator precedence, so the tree never stores parens.

use crate::ast::nodes::{
    BinOp, CType, Expr, ExprKind, FunctionDef, Stmt, StmtKind, TranslationUnit, UnOp,
};

/// Render a translation unit as C source
pub fn print_unit(unit: &TranslationUnit) -> String {
    let mut printer = Printer {
        out: String::new(),
        indent: 0,
    };
    printer.out.push_str("#include <stdbool.h>\n#include <stdint.h>\n");
    for func in &unit.functions {
        printer.out.push('\n');
        printer.write_function(func);
    }
    printer.out
}

const INDENT: &str = "  ";

// Precedence levels, higher binds tighter
const PREC_ASSIGN: u8 = 1;
const PREC_LOR: u8 = 2;
const PREC_LAND: u8 = 3;
const PREC_BITOR: u8 = 4;
const PREC_BITXOR: u8 = 5;
const PREC_BITAND: u8 = 6;
const PREC_EQUALITY: u8 = 7;
const PREC_RELATIONAL: u8 = 8;
const PREC_SHIFT: u8 = 9;
const PREC_ADDITIVE: u8 = 10;
const PREC_MULTIPLICATIVE: u8 = 11;
const PREC_UNARY: u8 = 12;
const PREC_PRIMARY: u8 = 13;

fn binop_prec(op: BinOp) -> u8 {
    match op {
        BinOp::LOr => PREC_LOR,
        BinOp::LAnd => PREC_LAND,
        BinOp::Or => PREC_BITOR,
        BinOp::Xor => PREC_BITXOR,
        BinOp::And => PREC_BITAND,
        BinOp::Eq | BinOp::Ne => PREC_EQUALITY,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => PREC_RELATIONAL,
        BinOp::Shl | BinOp::Shr => PREC_SHIFT,
        BinOp::Add | BinOp::Sub => PREC_ADDITIVE,
        BinOp::Mul => PREC_MULTIPLICATIVE,
    }
}

fn expr_prec(e: &Expr) -> u8 {
    match &e.kind {
        ExprKind::IntLit(_) | ExprKind::BoolLit(_) | ExprKind::VarRef(_) => PREC_PRIMARY,
        ExprKind::Call { .. } => PREC_PRIMARY,
        ExprKind::Unary { .. } | ExprKind::Cast { .. } => PREC_UNARY,
        ExprKind::Binary { op, .. } => binop_prec(*op),
        ExprKind::Assign { .. } => PREC_ASSIGN,
    }
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn write_function(&mut self, func: &FunctionDef) {
        self.out.push_str(&format!("{} {}(", func.return_type, func.name));
        if func.params.is_empty() {
            self.out.push_str("void");
        } else {
            for (i, (name, ty)) in func.params.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.write_decl_head(ty, name);
            }
        }
        self.out.push_str(") {\n");
        self.indent += 1;
        if let StmtKind::Compound(stmts) = &func.body.kind {
            for stmt in stmts {
                self.write_stmt(stmt);
            }
        } else {
            self.write_stmt(&func.body);
        }
        self.indent -= 1;
        self.out.push_str("}\n");
    }

    fn write_decl_head(&mut self, ty: &CType, name: &str) {
        match ty {
            CType::Ptr(_) => self.out.push_str(&format!("{}{}", ty, name)),
            _ => self.out.push_str(&format!("{} {}", ty, name)),
        }
    }

    /// Write a statement on its own line(s)
    fn write_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                self.line_start();
                self.out.push_str("{\n");
                self.indent += 1;
                for s in stmts {
                    self.write_stmt(s);
                }
                self.indent -= 1;
                self.line_start();
                self.out.push_str("}\n");
            }
            StmtKind::Decl { name, ty, init } => {
                self.line_start();
                self.write_decl_head(ty, name);
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.write_expr(init, PREC_ASSIGN);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Expr(e) => {
                self.line_start();
                self.write_expr(e, 0);
                self.out.push_str(";\n");
            }
            StmtKind::If { .. } => {
                self.line_start();
                self.write_if_chain(stmt);
            }
            StmtKind::While { cond, body } => {
                self.line_start();
                self.out.push_str("while (");
                self.write_expr(cond, 0);
                self.out.push(')');
                self.write_attached_body(body);
            }
            StmtKind::DoWhile { cond, body } => {
                self.line_start();
                self.out.push_str("do");
                match &body.kind {
                    StmtKind::Compound(stmts) => {
                        self.out.push_str(" {\n");
                        self.indent += 1;
                        for s in stmts {
                            self.write_stmt(s);
                        }
                        self.indent -= 1;
                        self.line_start();
                        self.out.push_str("} while (");
                    }
                    _ => {
                        self.out.push('\n');
                        self.indent += 1;
                        self.write_stmt(body);
                        self.indent -= 1;
                        self.line_start();
                        self.out.push_str("while (");
                    }
                }
                self.write_expr(cond, 0);
                self.out.push_str(");\n");
            }
            StmtKind::Break => {
                self.line_start();
                self.out.push_str("break;\n");
            }
            StmtKind::Return(value) => {
                self.line_start();
                match value {
                    Some(e) => {
                        self.out.push_str("return ");
                        self.write_expr(e, 0);
                        self.out.push_str(";\n");
                    }
                    None => self.out.push_str("return;\n"),
                }
            }
            StmtKind::Null => {
                self.line_start();
                self.out.push_str(";\n");
            }
        }
    }

    /// `if`/`else if` chains print flat
    fn write_if_chain(&mut self, stmt: &Stmt) {
        let StmtKind::If {
            cond,
            then_stmt,
            else_stmt,
        } = &stmt.kind
        else {
            return;
        };
        self.out.push_str("if (");
        self.write_expr(cond, 0);
        self.out.push(')');
        self.write_attached_body(then_stmt);
        if let Some(else_stmt) = else_stmt {
            if matches!(then_stmt.kind, StmtKind::Compound(_)) {
                // Splice the trailing newline of the closing brace
                self.out.pop();
                self.out.push(' ');
            } else {
                self.line_start();
            }
            match &else_stmt.kind {
                StmtKind::If { .. } => {
                    self.out.push_str("else ");
                    self.write_if_chain(else_stmt);
                }
                _ => {
                    self.out.push_str("else");
                    self.write_attached_body(else_stmt);
                }
            }
        }
    }

    /// A loop or branch body following its header on the same line
    fn write_attached_body(&mut self, body: &Stmt) {
        match &body.kind {
            StmtKind::Compound(stmts) => {
                self.out.push_str(" {\n");
                self.indent += 1;
                for s in stmts {
                    self.write_stmt(s);
                }
                self.indent -= 1;
                self.line_start();
                self.out.push_str("}\n");
            }
            _ => {
                self.out.push('\n');
                self.indent += 1;
                self.write_stmt(body);
                self.indent -= 1;
            }
        }
    }

    /// Write an expression, parenthesized when it binds looser than the
    /// surrounding context
    fn write_expr(&mut self, e: &Expr, min_prec: u8) {
        let prec = expr_prec(e);
        let needs_parens = prec < min_prec;
        if needs_parens {
            self.out.push('(');
        }
        match &e.kind {
            ExprKind::IntLit(n) => self.out.push_str(&n.to_string()),
            ExprKind::BoolLit(b) => self.out.push_str(if *b { "true" } else { "false" }),
            ExprKind::VarRef(name) => self.out.push_str(name),
            ExprKind::Unary { op, operand } => {
                self.out.push_str(&op.to_string());
                self.write_expr(operand, PREC_UNARY);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op_prec = binop_prec(*op);
                self.write_expr(lhs, op_prec);
                self.out.push_str(&format!(" {} ", op));
                self.write_expr(rhs, op_prec + 1);
            }
            ExprKind::Assign { op, lhs, rhs } => {
                self.write_expr(lhs, PREC_UNARY);
                match op {
                    Some(op) => self.out.push_str(&format!(" {}= ", op)),
                    None => self.out.push_str(" = "),
                }
                self.write_expr(rhs, PREC_ASSIGN);
            }
            ExprKind::Cast { operand } => {
                self.out.push_str(&format!("({})", e.ty));
                self.write_expr(operand, PREC_UNARY);
            }
            ExprKind::Call { callee, args } => {
                self.out.push_str(callee);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(arg, PREC_ASSIGN);
                }
                self.out.push(')');
            }
        }
        if needs_parens {
            self.out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;

    fn u32_ty() -> CType {
        CType::Int {
            bits: 32,
            signed: false,
        }
    }

    #[test]
    fn test_precedence_parens() {
        let mut b = AstBuilder::new();
        // (x + y) * z needs parens, x + y * z does not
        let x = b.var_ref(u32_ty(), "x");
        let y = b.var_ref(u32_ty(), "y");
        let z = b.var_ref(u32_ty(), "z");
        let sum = b.binary(BinOp::Add, u32_ty(), x, y);
        let product = b.binary(BinOp::Mul, u32_ty(), sum, z);
        let stmt = b.expr_stmt(product);
        let body = b.compound(vec![stmt]);
        let unit = TranslationUnit {
            functions: vec![FunctionDef {
                name: "f".to_string(),
                return_type: CType::Void,
                params: vec![],
                body,
            }],
        };
        let out = print_unit(&unit);
        assert!(out.contains("(x + y) * z"), "got:\n{out}");
    }

    #[test]
    fn test_else_if_chain_prints_flat() {
        let mut b = AstBuilder::new();
        let a = b.var_ref(CType::Bool, "a");
        let c = b.var_ref(CType::Bool, "c");
        let s1 = b.null_stmt();
        let t1 = b.compound(vec![s1]);
        let s2 = b.null_stmt();
        let t2 = b.compound(vec![s2]);
        let s3 = b.null_stmt();
        let t3 = b.compound(vec![s3]);
        let inner = b.if_stmt(c, t2, Some(t3));
        let outer = b.if_stmt(a, t1, Some(inner));
        let body = b.compound(vec![outer]);
        let unit = TranslationUnit {
            functions: vec![FunctionDef {
                name: "f".to_string(),
                return_type: CType::Void,
                params: vec![],
                body,
            }],
        };
        let out = print_unit(&unit);
        assert!(out.contains("} else if (c) {"), "got:\n{out}");
    }

    #[test]
    fn test_do_while_layout() {
        let mut b = AstBuilder::new();
        let x = b.var_ref(u32_ty(), "x");
        let zero = b.int_lit(u32_ty(), 0);
        let cond = b.cmp(BinOp::Ne, x, zero);
        let inner = b.null_stmt();
        let body = b.compound(vec![inner]);
        let loop_stmt = b.do_stmt(cond, body);
        let fn_body = b.compound(vec![loop_stmt]);
        let unit = TranslationUnit {
            functions: vec![FunctionDef {
                name: "f".to_string(),
                return_type: CType::Void,
                params: vec![],
                body: fn_body,
            }],
        };
        let out = print_unit(&unit);
        assert!(out.contains("} while (x != 0);"), "got:\n{out}");
    }
}
