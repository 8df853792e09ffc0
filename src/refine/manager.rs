//! Pass manager
//!
//! Owns the phase structure and drives each phase's passes to a
//! fixpoint. Termination rests on a well-founded measure (guarded
//! blocks, breaks inside loops, total node count); the iteration bound
//! is a backstop that turns a non-terminating rewrite into a reported
//! bug instead of a hang.
//!
//! Phase order:
//!
//! 1. Dead statement elimination, once, right after structurization.
//! 2. Condition-based refinement fixpoint: condition simplifier,
//!    nested-condition propagation, scope combination, condition-based
//!    refinement.
//! 3. Loop fixpoint: loop refinement, scope combination.
//! 4. Final phase, once: the heavier condition simplifier,
//!    nested-condition propagation, scope combination, statement
//!    combination.

use crate::ast::AstContext;
use crate::ast::nodes::FunctionDef;
use crate::refine::{
    AstPass, CondBasedRefine, CondSimplify, DeadStmtElim, LoopRefine, NestedCondProp,
    NestedScopeCombiner, RefineError, StmtCombine,
};
use crate::smt::{CBR_TACTICS, CondSimplifier, DEFAULT_TIMEOUT_MS, FINAL_TACTICS};
use std::cell::RefCell;
use std::rc::Rc;

/// Hard upper bound on fixpoint iterations per phase
pub const MAX_FIXPOINT_ITERS: usize = 64;

/// Knobs for the refinement pipeline
#[derive(Clone, Debug)]
pub struct RefineOptions {
    pub smt_timeout_ms: u64,
    pub cbr_tactics: Vec<String>,
    pub final_tactics: Vec<String>,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            smt_timeout_ms: DEFAULT_TIMEOUT_MS,
            cbr_tactics: CBR_TACTICS.iter().map(|s| s.to_string()).collect(),
            final_tactics: FINAL_TACTICS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Refine one structured function to its final form
pub fn refine_function(
    func: &mut FunctionDef,
    cx: &mut AstContext,
    opts: &RefineOptions,
) -> Result<(), RefineError> {
    DeadStmtElim.run(func, cx)?;

    let cbr_simplifier = Rc::new(RefCell::new(CondSimplifier::new(
        &opts.cbr_tactics,
        opts.smt_timeout_ms,
    )));
    let mut cbr_passes: Vec<Box<dyn AstPass>> = vec![
        Box::new(CondSimplify::new("cond-simplify", cbr_simplifier.clone())),
        Box::new(NestedCondProp::new(cbr_simplifier.clone())),
        Box::new(NestedScopeCombiner),
        Box::new(CondBasedRefine::new(cbr_simplifier)),
    ];
    run_fixpoint(func, cx, &mut cbr_passes, "condition-based refinement")?;

    let mut loop_passes: Vec<Box<dyn AstPass>> =
        vec![Box::new(LoopRefine), Box::new(NestedScopeCombiner)];
    run_fixpoint(func, cx, &mut loop_passes, "loop refinement")?;

    run_final_phase(func, cx, opts)?;
    Ok(())
}

/// The final cleanup phase, run once
///
/// Exposed separately so its idempotence can be checked: re-running it
/// on already-refined output must report no change.
pub fn run_final_phase(
    func: &mut FunctionDef,
    cx: &mut AstContext,
    opts: &RefineOptions,
) -> Result<bool, RefineError> {
    let final_simplifier = Rc::new(RefCell::new(CondSimplifier::new(
        &opts.final_tactics,
        opts.smt_timeout_ms,
    )));
    let mut passes: Vec<Box<dyn AstPass>> = vec![
        Box::new(CondSimplify::new(
            "final-cond-simplify",
            final_simplifier.clone(),
        )),
        Box::new(NestedCondProp::new(final_simplifier)),
        Box::new(NestedScopeCombiner),
        Box::new(StmtCombine),
    ];

    let mut changed = false;
    for pass in &mut passes {
        let pass_changed = pass.run(func, cx)?;
        tracing::debug!(
            pass = pass.name(),
            function = %func.name,
            changed = pass_changed,
            "final phase pass finished"
        );
        changed |= pass_changed;
    }
    Ok(changed)
}

fn run_fixpoint(
    func: &mut FunctionDef,
    cx: &mut AstContext,
    passes: &mut [Box<dyn AstPass>],
    phase: &str,
) -> Result<(), RefineError> {
    for iteration in 0..MAX_FIXPOINT_ITERS {
        let mut changed = false;
        for pass in passes.iter_mut() {
            let pass_changed = pass.run(func, cx)?;
            tracing::debug!(
                pass = pass.name(),
                function = %func.name,
                iteration,
                changed = pass_changed,
                "pass finished"
            );
            changed |= pass_changed;
        }
        if !changed {
            return Ok(());
        }
    }
    Err(RefineError::Invariant(format!(
        "{} did not reach a fixpoint within {} iterations for `{}`",
        phase, MAX_FIXPOINT_ITERS, func.name
    )))
}
