//! End-to-end decompilation pipeline
//!
//! ```text
//! IR text (&str)
//!     |
//!     v loader (lexer + parser + resolution)
//! IrModule
//!     |
//!     v structurizer (per function)
//! first-cut AST (guards + while(true)/break)
//!     |
//!     v refinement (fixpoint passes, SMT-backed)
//! refined AST
//!     |
//!     v printer
//! C source (String)
//! ```
//!
//! Functions with unsupported control flow are reported and skipped;
//! the rest of the module still decompiles.

use crate::ast::{AstContext, TranslationUnit, check_totality, live_expr_nodes, print_unit};
use crate::ir::parse_module;
use crate::refine::{RefineError, RefineOptions, refine_function};
use crate::structurize::structure_function;
use std::collections::HashSet;
use std::fmt;

/// Fatal pipeline failure
#[derive(Debug)]
pub enum DecompileError {
    /// Input could not be loaded; carries a rendered report
    Load(String),
    /// Internal contract broken; a bug, not an input problem
    Invariant(String),
    /// Solver broken beyond per-call recovery
    Smt(String),
    /// Output could not be written
    Write(std::io::Error),
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompileError::Load(msg) => write!(f, "{}", msg),
            DecompileError::Invariant(msg) => write!(f, "invariant violation: {}", msg),
            DecompileError::Smt(msg) => write!(f, "SMT failure: {}", msg),
            DecompileError::Write(e) => write!(f, "cannot write output: {}", e),
        }
    }
}

impl std::error::Error for DecompileError {}

/// Result of a successful decompilation
#[derive(Debug)]
pub struct DecompileOutput {
    /// The emitted C source
    pub code: String,
    /// Functions that were skipped, with the reason
    pub skipped: Vec<(String, String)>,
}

/// Decompile a textual IR module to C source
pub fn decompile(
    filename: &str,
    source: &str,
    opts: &RefineOptions,
) -> Result<DecompileOutput, DecompileError> {
    let module = parse_module(filename, source).map_err(DecompileError::Load)?;

    let mut cx = AstContext::new();
    let mut unit = TranslationUnit::new();
    let mut skipped = Vec::new();

    for func in &module.functions {
        tracing::info!(function = %func.name, "structuring");
        let mut def = match structure_function(&mut cx, func) {
            Ok(def) => def,
            Err(reason) => {
                tracing::warn!(function = %func.name, %reason, "skipping function");
                skipped.push((func.name.clone(), reason));
                continue;
            }
        };

        refine_function(&mut def, &mut cx, opts).map_err(|e| match e {
            RefineError::Smt(msg) => DecompileError::Smt(msg),
            RefineError::Invariant(msg) => DecompileError::Invariant(msg),
        })?;

        check_totality(&def, &cx.provenance).map_err(DecompileError::Invariant)?;
        unit.functions.push(def);
    }

    // Entries for nodes dropped during refinement are garbage now
    let mut live = HashSet::new();
    for def in &unit.functions {
        live_expr_nodes(def, &mut live);
    }
    cx.provenance.prune(&live);

    Ok(DecompileOutput {
        code: print_unit(&unit),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> DecompileOutput {
        decompile("test.ir", source, &RefineOptions::default()).unwrap()
    }

    #[test]
    fn test_decompile_diamond_to_if_else() {
        let source = r#"
            fn max(%a: i32, %b: i32) -> i32 {
            bb0:
              %t: i1 = lt %a, %b
              cbr %t, bb1, bb2
            bb1:
              ret %b
            bb2:
              ret %a
            }
        "#;
        let out = run(source);
        let code = &out.code;
        assert!(out.skipped.is_empty());
        assert!(code.contains("int32_t max(int32_t a, int32_t b)"), "got:\n{code}");
        assert!(code.contains("if (a < b)"), "got:\n{code}");
        assert!(code.contains("else"), "got:\n{code}");
        assert_eq!(code.matches("return").count(), 2, "got:\n{code}");
        assert_eq!(code.matches("if (").count(), 1, "got:\n{code}");
    }

    #[test]
    fn test_decompile_counting_loop() {
        let source = r#"
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
        let out = run(source);
        let code = &out.code;
        assert!(code.contains("while (i < n)"), "got:\n{code}");
        assert!(code.contains("i = 0;"), "got:\n{code}");
        assert!(code.contains("i2 = i + 1;"), "got:\n{code}");
        assert!(code.contains("return i;"), "got:\n{code}");
        assert!(!code.contains("while (true)"), "got:\n{code}");
        assert!(!code.contains("break"), "got:\n{code}");
        // The inlined comparison leaves its temporary with no reads
        assert!(!code.contains("bool t"), "got:\n{code}");
    }

    #[test]
    fn test_decompile_switch_to_chain() {
        let source = r#"
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
        let out = run(source);
        let code = &out.code;
        assert!(code.contains("if (x == 0)"), "got:\n{code}");
        assert!(code.contains("else"), "got:\n{code}");
        assert!(code.contains("return 30;"), "got:\n{code}");
    }

    #[test]
    fn test_unsupported_function_is_skipped() {
        let source = r#"
            fn spin(%c: i1) -> void {
            bb0:
              cbr %c, bb1, bb2
            bb1:
              br bb2
            bb2:
              br bb1
            }

            fn fine() -> i32 {
            bb0:
              %r: i32 = const 1
              ret %r
            }
        "#;
        let out = run(source);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].0, "spin");
        assert!(out.skipped[0].1.contains("irreducible"));
        assert!(out.code.contains("fine"), "got:\n{}", out.code);
    }

    #[test]
    fn test_load_error_is_fatal() {
        let err = decompile("bad.ir", "fn oops(", &RefineOptions::default()).unwrap_err();
        assert!(matches!(err, DecompileError::Load(_)));
    }

    #[test]
    fn test_calls_and_stores_survive() {
        let source = r#"
            fn touch(%p: ptr<i32>, %n: i32) -> void {
            bb0:
              %v: i32 = load %p
              %s: i32 = add %v, %n
              store %p, %s
              call log(%s)
              ret
            }
        "#;
        let out = run(source);
        let code = &out.code;
        assert!(code.contains("v = *p;"), "got:\n{code}");
        assert!(code.contains("*p = s;"), "got:\n{code}");
        assert!(code.contains("log(s);"), "got:\n{code}");
    }

    #[test]
    fn test_output_is_balanced_c() {
        let source = r#"
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
        let out = run(source);
        let code = &out.code;
        assert!(code.starts_with("#include <stdbool.h>\n#include <stdint.h>\n"));
        assert_eq!(code.matches('{').count(), code.matches('}').count());
        assert_eq!(code.matches('(').count(), code.matches(')').count());
    }
}
