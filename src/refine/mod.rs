//! AST refinement
//!
//! A suite of rewrite passes driven to fixpoints by the pass manager.
//! Each pass traverses the function body and reports whether it changed
//! anything; the manager owns pass ordering, the phase structure, and
//! the termination bound.

pub mod cond_based;
pub mod cond_simplify;
pub mod dead_stmt;
pub mod loop_refine;
pub mod manager;
pub mod nested_cond;
pub mod nested_scope;
pub mod stmt_combine;

#[cfg(test)]
mod tests;

pub use cond_based::CondBasedRefine;
pub use cond_simplify::CondSimplify;
pub use dead_stmt::DeadStmtElim;
pub use loop_refine::LoopRefine;
pub use manager::{MAX_FIXPOINT_ITERS, RefineOptions, refine_function, run_final_phase};
pub use nested_cond::NestedCondProp;
pub use nested_scope::NestedScopeCombiner;
pub use stmt_combine::StmtCombine;

use crate::ast::AstContext;
use crate::ast::nodes::FunctionDef;
use std::fmt;

/// Non-recoverable refinement failure
#[derive(Debug)]
pub enum RefineError {
    /// Solver unavailable or broken beyond the per-call recovery
    Smt(String),
    /// Internal contract broken; indicates a bug, not an input problem
    Invariant(String),
}

impl fmt::Display for RefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefineError::Smt(msg) => write!(f, "SMT failure: {}", msg),
            RefineError::Invariant(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for RefineError {}

/// One AST-to-AST rewrite pass
pub trait AstPass {
    fn name(&self) -> &'static str;

    /// Run over a function body; `Ok(true)` when anything was rewritten
    fn run(&mut self, func: &mut FunctionDef, cx: &mut AstContext) -> Result<bool, RefineError>;
}
