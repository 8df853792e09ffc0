//! lucent: a decompiler core
//!
//! Translates a typed, SSA-form intermediate representation with an
//! explicit control-flow graph into readable C pseudocode. Control
//! flow is first rebuilt from reaching conditions computed over the
//! dominator structure of each function, then an SMT-backed fixpoint
//! of rewrite passes folds the guarded form into conventional
//! `if`/`else`, `while` and `do`-`while` statements.

pub mod ast;
pub mod cli;
pub mod ir;
pub mod pipeline;
pub mod refine;
pub mod smt;
pub mod structurize;

pub use pipeline::{DecompileError, DecompileOutput, decompile};
