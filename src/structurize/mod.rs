//! Structurization: from CFG to first-cut AST
//!
//! The entry point is [`structure_function`], which runs the CFG
//! analyses and emits a function body where all control flow lives in
//! reaching-condition guards and `while (true)` / `break`.

pub mod cfg;
pub mod generate;
pub mod values;

pub use cfg::{CfgInfo, NaturalLoop};
pub use generate::structure_function;
pub use values::ExprGen;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstContext, StmtKind, check_totality};
    use crate::ir::parse_module;

    fn structure(src: &str) -> (AstContext, crate::ast::FunctionDef) {
        let module = parse_module("test.ir", src).unwrap();
        let mut cx = AstContext::new();
        let func = structure_function(&mut cx, &module.functions[0]).unwrap();
        (cx, func)
    }

    #[test]
    fn test_straight_line_function() {
        let src = r#"
            fn add(%a: i32, %b: i32) -> i32 {
            bb0:
              %s: i32 = add %a, %b
              ret %s
            }
        "#;
        let (cx, func) = structure(src);

        // One decl for %s, the assignment, and the return
        let StmtKind::Compound(stmts) = &func.body.kind else {
            panic!("body must be a compound");
        };
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::Decl { .. }));
        assert!(matches!(stmts[2].kind, StmtKind::Return(Some(_))));
        check_totality(&func, &cx.provenance).unwrap();
    }

    #[test]
    fn test_branch_becomes_guarded_blocks() {
        let src = r#"
            fn f(%c: i1) -> i32 {
            bb0:
              cbr %c, bb1, bb2
            bb1:
              %a: i32 = const 1
              ret %a
            bb2:
              %b: i32 = const 2
              ret %b
            }
        "#;
        let (cx, func) = structure(src);
        let StmtKind::Compound(stmts) = &func.body.kind else {
            panic!("body must be a compound");
        };
        // Entry has no statements; both arms are guarded returns
        let guarded: Vec<_> = stmts
            .iter()
            .filter(|s| matches!(s.kind, StmtKind::If { .. }))
            .collect();
        assert_eq!(guarded.len(), 2);
        check_totality(&func, &cx.provenance).unwrap();
    }

    #[test]
    fn test_loop_becomes_while_true_with_break() {
        let src = r#"
            fn count(%n: i32) -> i32 {
            bb0:
              %c: i32 = const 0
              br bb1
            bb1:
              %i: i32 = phi [bb0: %c], [bb2: %i2]
              %t: i1 = lt %i, %n
              cbr %t, bb2, bb3
            bb2:
              %one: i32 = const 1
              %i2: i32 = add %i, %one
              br bb1
            bb3:
              ret %i
            }
        "#;
        let (cx, func) = structure(src);

        let mut while_count = 0;
        let mut break_count = 0;
        func.body.for_each_stmt(&mut |s| match &s.kind {
            StmtKind::While { cond, .. } => {
                assert!(cond.is_bool_lit(true));
                while_count += 1;
            }
            StmtKind::Break => break_count += 1,
            _ => {}
        });
        assert_eq!(while_count, 1);
        assert_eq!(break_count, 1);
        check_totality(&func, &cx.provenance).unwrap();
    }

    #[test]
    fn test_switch_lowers_to_equality_guards() {
        let src = r#"
            fn pick(%x: i32) -> i32 {
            bb0:
              switch %x, [0: bb1], [1: bb2], default bb3
            bb1:
              %a: i32 = const 10
              ret %a
            bb2:
              %b: i32 = const 20
              ret %b
            bb3:
              %c: i32 = const 30
              ret %c
            }
        "#;
        let (cx, func) = structure(src);
        let StmtKind::Compound(stmts) = &func.body.kind else {
            panic!("body must be a compound");
        };
        let guarded = stmts
            .iter()
            .filter(|s| matches!(s.kind, StmtKind::If { .. }))
            .count();
        assert_eq!(guarded, 3);
        check_totality(&func, &cx.provenance).unwrap();
    }
}
