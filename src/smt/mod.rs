//! SMT bridge and condition simplification
//!
//! Boolean guards are lowered to the Z3 theories of booleans and
//! bit-vectors, pushed through configurable tactic pipelines, and
//! rebuilt as AST expressions with provenance preserved. Recoverable
//! solver outcomes (unknown, timeout) never escape this module's
//! callers as errors; they read as "no rewrite".

pub mod bridge;
pub mod simplify;

pub use bridge::Z3Bridge;
pub use simplify::{
    CBR_TACTICS, CondSimplifier, DEFAULT_TIMEOUT_MS, FINAL_TACTICS, ProveResult,
};

use std::fmt;

/// Translation failure between the AST and the solver theories
#[derive(Debug)]
pub enum SmtError {
    Unsupported(String),
}

impl fmt::Display for SmtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtError::Unsupported(msg) => write!(f, "unsupported SMT translation: {}", msg),
        }
    }
}

impl std::error::Error for SmtError {}
