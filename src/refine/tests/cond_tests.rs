use super::common::*;
use crate::ast::AstContext;
use crate::refine::{RefineOptions, refine_function};

/// `if (a) S1; if (!a) S2;` merges into an if/else once the solver
/// proves the guards complementary
#[test]
fn test_cond_based_merge() {
    let mut cx = AstContext::new();
    let a = bool_var(&mut cx, "a");
    let s1 = call_stmt(&mut cx, "f");
    let first = guarded(&mut cx, a, vec![s1], None);

    let a2 = bool_var(&mut cx, "a");
    let not_a = cx.lnot_of(a2);
    let s2 = call_stmt(&mut cx, "g");
    let second = guarded(&mut cx, not_a, vec![s2], None);

    let mut func = function_of(&mut cx, vec![first, second]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(out.contains("if (a)"), "got:\n{out}");
    assert!(out.contains("else"), "got:\n{out}");
    assert!(out.contains("f()"), "got:\n{out}");
    assert!(out.contains("g()"), "got:\n{out}");
    // One if remains, not two
    assert_eq!(out.matches("if (").count(), 1, "got:\n{out}");
}

/// Complementary comparisons merge even without shared structure
#[test]
fn test_cond_based_merge_on_comparisons() {
    let mut cx = AstContext::new();
    let zero_eq = eq_zero(&mut cx, "x");
    let s1 = call_stmt(&mut cx, "f");
    let first = guarded(&mut cx, zero_eq, vec![s1], None);

    let var = cx.builder.var_ref(u32_ty(), "x");
    let zero = cx.builder.int_lit(u32_ty(), 0);
    let ne = cx.builder.cmp(crate::ast::BinOp::Ne, var, zero);
    mark(&mut cx, &ne);
    let s2 = call_stmt(&mut cx, "g");
    let second = guarded(&mut cx, ne, vec![s2], None);

    let mut func = function_of(&mut cx, vec![first, second]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(out.contains("else"), "got:\n{out}");
    assert_eq!(out.matches("if (").count(), 1, "got:\n{out}");
}

/// A run of three disjoint, exhaustive guards becomes an else-if chain
#[test]
fn test_cond_based_chain_of_three() {
    let mut cx = AstContext::new();

    let var = cx.builder.var_ref(u32_ty(), "x");
    let one = cx.builder.int_lit(u32_ty(), 1);
    let lt = cx.builder.cmp(crate::ast::BinOp::Lt, var, one);
    mark(&mut cx, &lt);
    let s1 = call_stmt(&mut cx, "f");
    let first = guarded(&mut cx, lt, vec![s1], None);

    let var = cx.builder.var_ref(u32_ty(), "x");
    let one = cx.builder.int_lit(u32_ty(), 1);
    let eq = cx.builder.cmp(crate::ast::BinOp::Eq, var, one);
    mark(&mut cx, &eq);
    let s2 = call_stmt(&mut cx, "g");
    let second = guarded(&mut cx, eq, vec![s2], None);

    let var = cx.builder.var_ref(u32_ty(), "x");
    let one = cx.builder.int_lit(u32_ty(), 1);
    let gt = cx.builder.cmp(crate::ast::BinOp::Gt, var, one);
    mark(&mut cx, &gt);
    let s3 = call_stmt(&mut cx, "h");
    let third = guarded(&mut cx, gt, vec![s3], None);

    let mut func = function_of(&mut cx, vec![first, second, third]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(out.contains("else if"), "got:\n{out}");
    // The last guard is implied and becomes the trailing else
    assert_eq!(out.matches("if (").count(), 2, "got:\n{out}");
    assert!(out.contains("h()"), "got:\n{out}");
}

/// Overlapping guards must not merge
#[test]
fn test_cond_based_rejects_overlap() {
    let mut cx = AstContext::new();
    let a = bool_var(&mut cx, "a");
    let s1 = call_stmt(&mut cx, "f");
    let first = guarded(&mut cx, a, vec![s1], None);

    let b = bool_var(&mut cx, "b");
    let s2 = call_stmt(&mut cx, "g");
    let second = guarded(&mut cx, b, vec![s2], None);

    let mut func = function_of(&mut cx, vec![first, second]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(!out.contains("else"), "independent guards stay apart:\n{out}");
    assert_eq!(out.matches("if (").count(), 2, "got:\n{out}");
}

/// `if (a) { if (a && b) S; }` loses the redundant conjunct
#[test]
fn test_nested_cond_prop() {
    let mut cx = AstContext::new();
    let outer_cond = bool_var(&mut cx, "a");
    let a2 = bool_var(&mut cx, "a");
    let b = bool_var(&mut cx, "b");
    let both = cx.builder.land(a2, b);
    mark(&mut cx, &both);
    let s = call_stmt(&mut cx, "f");
    let inner = guarded(&mut cx, both, vec![s], None);
    let outer = guarded(&mut cx, outer_cond, vec![inner], None);

    let mut func = function_of(&mut cx, vec![outer]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(out.contains("if (b)"), "got:\n{out}");
    assert!(!out.contains("a && b"), "got:\n{out}");
}

/// The else-branch assumes the negated condition
#[test]
fn test_nested_cond_prop_in_else() {
    let mut cx = AstContext::new();
    let outer_cond = bool_var(&mut cx, "a");
    let then_s = call_stmt(&mut cx, "f");

    let a2 = bool_var(&mut cx, "a");
    let not_a = cx.lnot_of(a2);
    let b = bool_var(&mut cx, "b");
    let both = cx.builder.land(not_a, b);
    mark(&mut cx, &both);
    let s = call_stmt(&mut cx, "g");
    let inner = guarded(&mut cx, both, vec![s], None);

    let outer = guarded(&mut cx, outer_cond, vec![then_s], Some(vec![inner]));
    let mut func = function_of(&mut cx, vec![outer]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(out.contains("if (b)"), "got:\n{out}");
    assert!(!out.contains("!a && b"), "got:\n{out}");
}

/// `if (false) S1 else S2` keeps only the else-branch
#[test]
fn test_dead_stmt_literal_branch() {
    let mut cx = AstContext::new();
    let lit = cx.builder.bool_lit(false);
    mark(&mut cx, &lit);
    let s1 = call_stmt(&mut cx, "f");
    let s2 = call_stmt(&mut cx, "g");
    let branch = guarded(&mut cx, lit, vec![s1], Some(vec![s2]));

    let mut func = function_of(&mut cx, vec![branch]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(!out.contains("f()"), "got:\n{out}");
    assert!(out.contains("g()"), "got:\n{out}");
    assert!(!out.contains("if"), "got:\n{out}");
}

/// Unread declarations and their pure writes disappear
#[test]
fn test_dead_stmt_unused_variable() {
    let mut cx = AstContext::new();
    let decl = cx.builder.decl("scratch", u32_ty(), None);
    let target = cx.builder.var_ref(u32_ty(), "scratch");
    let value = cx.builder.int_lit(u32_ty(), 7);
    let assign = cx.builder.assign(target, value);
    mark(&mut cx, &assign);
    let write = cx.builder.expr_stmt(assign);
    let keep = call_stmt(&mut cx, "f");

    let mut func = function_of(&mut cx, vec![decl, write, keep]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert!(!out.contains("scratch"), "got:\n{out}");
    assert!(out.contains("f()"), "got:\n{out}");
}

/// Adjacent ifs with identical pure guards share one scope
#[test]
fn test_scope_combine_adjacent_ifs() {
    let mut cx = AstContext::new();
    let a1 = bool_var(&mut cx, "a");
    let s1 = call_stmt(&mut cx, "f");
    let first = guarded(&mut cx, a1, vec![s1], None);
    let a2 = bool_var(&mut cx, "a");
    let s2 = call_stmt(&mut cx, "g");
    let second = guarded(&mut cx, a2, vec![s2], None);

    let mut func = function_of(&mut cx, vec![first, second]);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert_eq!(out.matches("if (").count(), 1, "got:\n{out}");
    assert!(out.contains("f()"), "got:\n{out}");
    assert!(out.contains("g()"), "got:\n{out}");
}
