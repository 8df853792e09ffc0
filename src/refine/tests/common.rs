use crate::ast::nodes::{BinOp, CType, Expr, FunctionDef, Stmt, TranslationUnit};
use crate::ast::{AstContext, IrEntity, print_unit};
use crate::ir::ValueId;

pub fn u32_ty() -> CType {
    CType::Int {
        bits: 32,
        signed: false,
    }
}

/// Register provenance for every node of an expression that lacks it
pub fn mark(cx: &mut AstContext, e: &Expr) {
    let mut ids = Vec::new();
    e.for_each(&mut |n| ids.push(n.id));
    for id in ids {
        if cx.provenance.get(id).is_none() {
            cx.provenance.set(id, IrEntity::Value(ValueId(0)));
        }
    }
}

/// A boolean variable with provenance
pub fn bool_var(cx: &mut AstContext, name: &str) -> Expr {
    let e = cx.builder.var_ref(CType::Bool, name);
    mark(cx, &e);
    e
}

/// `name == 0` over an unsigned variable
pub fn eq_zero(cx: &mut AstContext, name: &str) -> Expr {
    let var = cx.builder.var_ref(u32_ty(), name);
    let zero = cx.builder.int_lit(u32_ty(), 0);
    let cmp = cx.builder.cmp(BinOp::Eq, var, zero);
    mark(cx, &cmp);
    cmp
}

/// `name = name + 1;`
pub fn increment(cx: &mut AstContext, name: &str) -> Stmt {
    let var = cx.builder.var_ref(u32_ty(), name);
    let one = cx.builder.int_lit(u32_ty(), 1);
    let rhs_var = cx.builder.var_ref(u32_ty(), name);
    let sum = cx.builder.binary(BinOp::Add, u32_ty(), rhs_var, one);
    let assign = cx.builder.assign(var, sum);
    mark(cx, &assign);
    cx.builder.expr_stmt(assign)
}

/// A side-effecting call statement, immune to dead-statement removal
pub fn call_stmt(cx: &mut AstContext, name: &str) -> Stmt {
    let call = cx.builder.call(CType::Void, name, vec![]);
    mark(cx, &call);
    cx.builder.expr_stmt(call)
}

/// `while (true) { body }` with provenance on the condition
pub fn while_true(cx: &mut AstContext, body: Vec<Stmt>) -> Stmt {
    let cond = cx.builder.bool_lit(true);
    mark(cx, &cond);
    let compound = cx.builder.compound(body);
    cx.builder.while_stmt(cond, compound)
}

/// `if (cond) { then }` / `if (cond) { then } else { else }`
pub fn guarded(cx: &mut AstContext, cond: Expr, then: Vec<Stmt>, els: Option<Vec<Stmt>>) -> Stmt {
    let then_compound = cx.builder.compound(then);
    let else_compound = els.map(|stmts| cx.builder.compound(stmts));
    cx.builder.if_stmt(cond, then_compound, else_compound)
}

pub fn function_of(cx: &mut AstContext, stmts: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: "probe".to_string(),
        return_type: CType::Void,
        params: vec![
            ("x".to_string(), u32_ty()),
            ("y".to_string(), u32_ty()),
            ("a".to_string(), CType::Bool),
            ("b".to_string(), CType::Bool),
        ],
        body: cx.builder.compound(stmts),
    }
}

pub fn render(func: &FunctionDef) -> String {
    print_unit(&TranslationUnit {
        functions: vec![func.clone()],
    })
}

/// A `while (true)` loop containing exactly one `break` in the final
/// AST means some loop rule failed to fire
pub fn count_dangling_loops(func: &FunctionDef) -> usize {
    let mut count = 0;
    func.body.for_each_stmt(&mut |s| {
        if let crate::ast::StmtKind::While { cond, body } = &s.kind {
            if cond.is_bool_lit(true) && body.break_count() == 1 {
                count += 1;
            }
        }
    });
    count
}
