use super::common::*;
use crate::ast::{AstContext, check_totality};
use crate::refine::{RefineOptions, refine_function, run_final_phase};

/// The full S1-shaped pipeline input, reused across properties
fn sample_loop(cx: &mut AstContext) -> crate::ast::FunctionDef {
    let cond = eq_zero(cx, "x");
    let brk = cx.builder.brk();
    let body = increment(cx, "y");
    let branch = guarded(cx, cond, vec![brk], Some(vec![body]));
    let loop_stmt = while_true(cx, vec![branch]);
    function_of(cx, vec![loop_stmt])
}

/// Re-running the final phase on refined output changes nothing
#[test]
fn test_final_phase_is_idempotent() {
    let mut cx = AstContext::new();
    let mut func = sample_loop(&mut cx);
    let opts = RefineOptions::default();
    refine_function(&mut func, &mut cx, &opts).unwrap();

    let changed = run_final_phase(&mut func, &mut cx, &opts).unwrap();
    assert!(!changed, "final phase must be idempotent:\n{}", render(&func));
}

/// Every expression node of the refined AST still has provenance
#[test]
fn test_provenance_survives_refinement() {
    let mut cx = AstContext::new();
    let mut func = sample_loop(&mut cx);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    check_totality(&func, &cx.provenance).unwrap();
}

/// No single-exit `while (true)` survives refinement
#[test]
fn test_no_dangling_infinite_loops() {
    let mut cx = AstContext::new();
    let mut func = sample_loop(&mut cx);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    assert_eq!(count_dangling_loops(&func), 0, "got:\n{}", render(&func));
}

/// The fixpoint bound is generous; a well-formed input never hits it
#[test]
fn test_fixpoint_terminates_on_stacked_input() {
    let mut cx = AstContext::new();

    // Several independent refinement sites in one body
    let mut stmts = Vec::new();
    for _ in 0..4 {
        let cond = eq_zero(&mut cx, "x");
        let brk = cx.builder.brk();
        let body = increment(&mut cx, "y");
        let branch = guarded(&mut cx, cond, vec![brk], Some(vec![body]));
        stmts.push(while_true(&mut cx, vec![branch]));
    }
    let a = bool_var(&mut cx, "a");
    let s1 = call_stmt(&mut cx, "f");
    stmts.push(guarded(&mut cx, a, vec![s1], None));
    let a2 = bool_var(&mut cx, "a");
    let not_a = cx.lnot_of(a2);
    let s2 = call_stmt(&mut cx, "g");
    stmts.push(guarded(&mut cx, not_a, vec![s2], None));

    let mut func = function_of(&mut cx, stmts);
    refine_function(&mut func, &mut cx, &RefineOptions::default())
        .expect("refinement must terminate");

    let out = render(&func);
    assert!(!out.contains("while (true)"), "got:\n{out}");
}

/// The emitted source stays well-formed under refinement
#[test]
fn test_output_is_balanced() {
    let mut cx = AstContext::new();
    let mut func = sample_loop(&mut cx);
    refine_function(&mut func, &mut cx, &RefineOptions::default()).unwrap();
    let out = render(&func);

    assert_eq!(out.matches('{').count(), out.matches('}').count());
    assert_eq!(out.matches('(').count(), out.matches(')').count());
    assert!(out.ends_with("}\n"), "got:\n{out}");
}
