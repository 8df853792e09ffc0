//! Tactic-driven condition simplification
//!
//! A simplifier owns one Z3 bridge, one tactic pipeline, and one result
//! cache; its caches live exactly as long as the instance. Two
//! instances exist per function run, one for condition-based refinement
//! and one for the final cleanup, each with its own pipeline.

use crate::ast::nodes::{BinOp, Expr, ExprKind, canon_key};
use crate::ast::AstContext;
use crate::smt::bridge::Z3Bridge;
use std::collections::HashMap;
use std::time::Duration;
use z3::ast::Bool;
use z3::{Goal, Params, SatResult, Solver, Tactic};

/// Default tactic pipeline for the condition-based refinement phase
pub const CBR_TACTICS: &[&str] = &["aig", "simplify"];

/// Default tactic pipeline for the final phase
pub const FINAL_TACTICS: &[&str] = &["aig", "propagate-bv-bounds", "tseitin-cnf", "ctx-simplify"];

/// Default per-call solver timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Outcome of a validity query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProveResult {
    Valid,
    Invalid,
    /// Solver gave up or timed out; callers treat this as `Invalid`
    Unknown,
}

impl ProveResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ProveResult::Valid)
    }
}

/// Boolean condition simplifier backed by a Z3 tactic pipeline
pub struct CondSimplifier {
    bridge: Z3Bridge,
    tactics: Vec<String>,
    timeout: Duration,
    /// Structural key of the input to the simplified template, `None`
    /// when simplification did not improve the expression
    cache: HashMap<String, Option<Expr>>,
}

impl CondSimplifier {
    pub fn new(tactics: &[String], timeout_ms: u64) -> Self {
        Self {
            bridge: Z3Bridge::new(),
            tactics: tactics.to_vec(),
            timeout: Duration::from_millis(timeout_ms),
            cache: HashMap::new(),
        }
    }

    pub fn with_defaults(tactics: &[&str]) -> Self {
        let tactics: Vec<String> = tactics.iter().map(|s| s.to_string()).collect();
        Self::new(&tactics, DEFAULT_TIMEOUT_MS)
    }

    fn pipeline(&self) -> Tactic {
        let mut tactic = Tactic::new(&self.tactics[0]);
        for name in &self.tactics[1..] {
            tactic = tactic.and_then(&Tactic::new(name));
        }
        tactic.try_for(self.timeout)
    }

    fn solver(&self) -> Solver {
        let solver = Solver::new();
        let mut params = Params::new();
        params.set_u32("timeout", self.timeout.as_millis() as u32);
        solver.set_params(&params);
        solver
    }

    /// Canonicalize a boolean expression through the tactic pipeline
    ///
    /// Returns `Some(expr')` with `expr' <-> expr` valid only when the
    /// result is strictly smaller; anything else is no rewrite, which
    /// keeps the refinement measure monotone.
    pub fn simplify(&mut self, cx: &mut AstContext, e: &Expr) -> Option<Expr> {
        if !e.ty.is_bool() || matches!(e.kind, ExprKind::BoolLit(_)) {
            return None;
        }

        let key = canon_key(e);
        if let Some(cached) = self.cache.get(&key) {
            let template = cached.clone()?;
            return Some(cx.clone_expr(&template));
        }

        let Ok(formula) = self.bridge.to_bool(e) else {
            self.cache.insert(key, None);
            return None;
        };

        let goal = Goal::new(false, false, false);
        goal.assert(&formula);
        let Ok(applied) = self.pipeline().apply(&goal, None) else {
            self.cache.insert(key, None);
            return None;
        };

        let mut formulas: Vec<Bool> = Vec::new();
        for subgoal in applied.list_subgoals() {
            formulas.extend(subgoal.get_formulas());
        }
        let simplified = match formulas.len() {
            0 => Bool::from_bool(true),
            1 => formulas.swap_remove(0),
            _ => {
                let refs: Vec<&Bool> = formulas.iter().collect();
                Bool::and(&refs)
            }
        };

        let rebuilt = match self.bridge.from_bool(cx, &simplified, e) {
            Ok(expr) => expr,
            Err(_) => {
                // A tactic introduced terms we cannot express; keep the
                // original condition
                self.cache.insert(key, None);
                return None;
            }
        };

        if rebuilt.node_count() < e.node_count() {
            self.cache.insert(key, Some(rebuilt.clone()));
            Some(rebuilt)
        } else {
            self.cache.insert(key, None);
            None
        }
    }

    /// Is `e` a tautology?
    pub fn prove(&mut self, e: &Expr) -> ProveResult {
        let Ok(formula) = self.bridge.to_bool(e) else {
            return ProveResult::Unknown;
        };
        let solver = self.solver();
        solver.assert(&formula.not());
        Self::check_unsat(&solver)
    }

    /// Does the conjunction of `assumptions` entail `goal`?
    pub fn prove_with(&mut self, assumptions: &[&Expr], goal: &Expr) -> ProveResult {
        let Ok(goal_formula) = self.bridge.to_bool(goal) else {
            return ProveResult::Unknown;
        };
        let solver = self.solver();
        for assumption in assumptions {
            // Dropping an untranslatable assumption only weakens the
            // context, never unsoundly proves the goal
            if let Ok(formula) = self.bridge.to_bool(assumption) {
                solver.assert(&formula);
            }
        }
        solver.assert(&goal_formula.not());
        Self::check_unsat(&solver)
    }

    /// Is `e` unsatisfiable under the assumptions?
    pub fn prove_refuted(&mut self, assumptions: &[&Expr], e: &Expr) -> ProveResult {
        let Ok(formula) = self.bridge.to_bool(e) else {
            return ProveResult::Unknown;
        };
        let solver = self.solver();
        for assumption in assumptions {
            if let Ok(f) = self.bridge.to_bool(assumption) {
                solver.assert(&f);
            }
        }
        solver.assert(&formula);
        Self::check_unsat(&solver)
    }

    /// Can `a` and `b` ever hold together?
    pub fn prove_disjoint(&mut self, a: &Expr, b: &Expr) -> ProveResult {
        self.prove_refuted(&[a], b)
    }

    /// Do the guards jointly cover every execution?
    pub fn prove_covers(&mut self, guards: &[&Expr]) -> ProveResult {
        let mut formulas = Vec::new();
        for guard in guards {
            let Ok(formula) = self.bridge.to_bool(guard) else {
                return ProveResult::Unknown;
            };
            formulas.push(formula);
        }
        let refs: Vec<&Bool> = formulas.iter().collect();
        let solver = self.solver();
        solver.assert(&Bool::or(&refs).not());
        Self::check_unsat(&solver)
    }

    /// Are the two expressions logically equivalent?
    pub fn equivalent(&mut self, a: &Expr, b: &Expr) -> ProveResult {
        let (Ok(fa), Ok(fb)) = (self.bridge.to_bool(a), self.bridge.to_bool(b)) else {
            return ProveResult::Unknown;
        };
        let solver = self.solver();
        solver.assert(&fa.iff(&fb).not());
        Self::check_unsat(&solver)
    }

    /// Simplify `e` under an assumption context: conjuncts the
    /// assumptions entail are dropped, disjuncts they refute are
    /// dropped, and a fully determined condition becomes a literal
    pub fn simplify_under(
        &mut self,
        cx: &mut AstContext,
        assumptions: &[&Expr],
        e: &Expr,
    ) -> Option<Expr> {
        if assumptions.is_empty() || !e.ty.is_bool() || matches!(e.kind, ExprKind::BoolLit(_)) {
            return None;
        }

        if self.prove_with(assumptions, e).is_valid() {
            let lit = cx.builder.bool_lit(true);
            cx.provenance.copy(e.id, lit.id);
            return Some(lit);
        }
        if self.prove_refuted(assumptions, e).is_valid() {
            let lit = cx.builder.bool_lit(false);
            cx.provenance.copy(e.id, lit.id);
            return Some(lit);
        }

        match &e.kind {
            ExprKind::Binary {
                op: BinOp::LAnd, ..
            } => {
                let conjuncts = flatten(e, BinOp::LAnd);
                let kept: Vec<&Expr> = conjuncts
                    .iter()
                    .copied()
                    .filter(|c| !self.prove_with(assumptions, c).is_valid())
                    .collect();
                if kept.len() == conjuncts.len() {
                    return None;
                }
                Some(self.rebuild(cx, e, &kept, BinOp::LAnd))
            }
            ExprKind::Binary { op: BinOp::LOr, .. } => {
                let disjuncts = flatten(e, BinOp::LOr);
                let kept: Vec<&Expr> = disjuncts
                    .iter()
                    .copied()
                    .filter(|d| !self.prove_refuted(assumptions, d).is_valid())
                    .collect();
                if kept.len() == disjuncts.len() {
                    return None;
                }
                Some(self.rebuild(cx, e, &kept, BinOp::LOr))
            }
            _ => None,
        }
    }

    fn rebuild(&mut self, cx: &mut AstContext, source: &Expr, kept: &[&Expr], op: BinOp) -> Expr {
        // The whole-condition checks above rule out an empty remainder
        let mut iter = kept.iter();
        let first = iter.next().expect("at least one operand survives");
        let mut acc = cx.clone_expr(first);
        for operand in iter {
            let rhs = cx.clone_expr(operand);
            acc = match op {
                BinOp::LAnd => cx.builder.land(acc, rhs),
                _ => cx.builder.lor(acc, rhs),
            };
            cx.provenance.copy(source.id, acc.id);
        }
        acc
    }

    fn check_unsat(solver: &Solver) -> ProveResult {
        match solver.check() {
            SatResult::Unsat => ProveResult::Valid,
            SatResult::Sat => ProveResult::Invalid,
            SatResult::Unknown => ProveResult::Unknown,
        }
    }
}

/// Flatten nested applications of one connective into operand order
fn flatten(e: &Expr, op: BinOp) -> Vec<&Expr> {
    fn go<'a>(e: &'a Expr, op: BinOp, out: &mut Vec<&'a Expr>) {
        match &e.kind {
            ExprKind::Binary { op: o, lhs, rhs } if *o == op => {
                go(lhs, op, out);
                go(rhs, op, out);
            }
            _ => out.push(e),
        }
    }
    let mut out = Vec::new();
    go(e, op, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::nodes::CType;
    use crate::ast::{AstContext, IrEntity};
    use crate::ir::ValueId;

    fn u32_ty() -> CType {
        CType::Int {
            bits: 32,
            signed: false,
        }
    }

    /// `x == 0` over a fresh context, with provenance registered
    fn eq_zero(cx: &mut AstContext) -> Expr {
        let x = cx.builder.var_ref(u32_ty(), "x");
        cx.provenance.set(x.id, IrEntity::Value(ValueId(0)));
        cx.provenance.set_use(x.id, ValueId(0));
        let zero = cx.builder.int_lit(u32_ty(), 0);
        cx.provenance.set(zero.id, IrEntity::Value(ValueId(1)));
        let cmp = cx.builder.cmp(BinOp::Eq, x, zero);
        cx.provenance.set(cmp.id, IrEntity::Value(ValueId(2)));
        cx.provenance.set_use(cmp.id, ValueId(2));
        cmp
    }

    #[test]
    fn test_prove_negation_pair() {
        let mut cx = AstContext::new();
        let mut sim = CondSimplifier::with_defaults(CBR_TACTICS);

        let a = eq_zero(&mut cx);
        let clone = cx.clone_expr(&a);
        let not_a = cx.lnot_of(clone);

        assert_eq!(sim.prove_disjoint(&a, &not_a), ProveResult::Valid);
        assert_eq!(sim.prove_covers(&[&a, &not_a]), ProveResult::Valid);

        // `x == 0` alone is neither valid nor refutable
        assert_eq!(sim.prove(&a), ProveResult::Invalid);
    }

    #[test]
    fn test_simplify_keeps_equivalence() {
        let mut cx = AstContext::new();
        let mut sim = CondSimplifier::with_defaults(CBR_TACTICS);

        // (x == 0) && (x == 0) should shrink, and stay equivalent
        let a = eq_zero(&mut cx);
        let b = cx.clone_expr(&a);
        let both = cx.builder.land(a, b);
        cx.provenance.set(both.id, IrEntity::Value(ValueId(2)));

        if let Some(simplified) = sim.simplify(&mut cx, &both) {
            assert!(simplified.node_count() < both.node_count());
            assert_eq!(sim.equivalent(&both, &simplified), ProveResult::Valid);
        }
    }

    #[test]
    fn test_simplify_under_drops_entailed_conjunct() {
        let mut cx = AstContext::new();
        let mut sim = CondSimplifier::with_defaults(CBR_TACTICS);

        let a = eq_zero(&mut cx);
        let a2 = cx.clone_expr(&a);
        let b = cx.builder.var_ref(CType::Bool, "b");
        cx.provenance.set(b.id, IrEntity::Value(ValueId(3)));
        cx.provenance.set_use(b.id, ValueId(3));
        let inner = cx.builder.land(a2, b);
        cx.provenance.set(inner.id, IrEntity::Value(ValueId(3)));

        // Under the assumption `x == 0`, `x == 0 && b` is just `b`
        let result = sim
            .simplify_under(&mut cx, &[&a], &inner)
            .expect("conjunct should drop");
        assert_eq!(canon_key(&result), "v:b");
    }

    #[test]
    fn test_simplify_under_whole_condition() {
        let mut cx = AstContext::new();
        let mut sim = CondSimplifier::with_defaults(CBR_TACTICS);

        let a = eq_zero(&mut cx);
        let same = cx.clone_expr(&a);
        let result = sim
            .simplify_under(&mut cx, &[&a], &same)
            .expect("assumption entails the condition");
        assert!(result.is_bool_lit(true));

        let clone = cx.clone_expr(&a);
        let negated = cx.lnot_of(clone);
        let result = sim
            .simplify_under(&mut cx, &[&a], &negated)
            .expect("assumption refutes the condition");
        assert!(result.is_bool_lit(false));
    }

    #[test]
    fn test_unknown_is_conservative() {
        let mut cx = AstContext::new();
        let mut sim = CondSimplifier::with_defaults(CBR_TACTICS);

        // An opaque call cannot be decided, so nothing may rewrite
        let call = cx.builder.call(CType::Bool, "oracle", vec![]);
        cx.provenance.set(call.id, IrEntity::Value(ValueId(9)));
        let a = eq_zero(&mut cx);
        assert!(sim.simplify_under(&mut cx, &[&a], &call).is_none());
    }
}
