//! Input SSA intermediate representation
//!
//! The decompiler consumes a typed, SSA-form IR with an explicit CFG:
//! a module is an ordered sequence of functions, each function a graph
//! of basic blocks ending in terminators, with phi nodes at join
//! points. This module defines the in-memory representation, a builder
//! for assembling it, and a loader for a textual serialization of it.

pub mod builder;
pub mod instr;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod phi;
pub mod report;
pub mod types;

pub use builder::FunctionBuilder;
pub use instr::{BinaryOp, Instr, Terminator, UnaryOp};
pub use module::{BasicBlock, DefSite, IrFunction, IrModule, Param};
pub use parser::parse_module;
pub use phi::PhiNode;
pub use types::{BlockId, IrType, ValueId};

/// Source span used by the loader
pub type Span = chumsky::prelude::SimpleSpan;

/// A value paired with its source span
pub type Spanned<T> = (T, Span);
