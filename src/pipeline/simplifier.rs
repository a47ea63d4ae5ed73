//! Algebraic simplification of terms.
//!
//! Rules are applied bottom-up at every node until none matches:
//!
//! | Rule | Example |
//! |------|---------|
//! | Constant folding | `2 * 3` → `6` |
//! | Double negation | `!!b` → `b`, `-(-x)` → `x` |
//! | Comparison negation | `!(x < y)` → `x >= y` (not on floats) |
//! | Identity elements | `x + 0`, `x * 1`, `x << 0`, `b & true` → `x` / `b` |
//! | Absorbing elements | `x * 0` → `0`, `b \| true` → `true` |
//! | Reflexive comparisons | `x == x` → `true`, `x < x` → `false` |
//! | Boolean equality | `b == true` → `b`, `b == false` → `!b` |
//! | Conditionals | `ite(true, a, b)` → `a`, `ite(c, a, a)` → `a`, `ite(c, true, false)` → `c` |
//! | Quantifiers | empty constant range → `true`, single-element range → body at `lo` |
//!
//! A rule that would drop an operand only fires when that operand cannot fault, and a
//! rule that would return an operand only fires when the operand has the static type of
//! the rewritten node.

use crate::{
    pipeline::{EventKind, PassContext, StatePass},
    solver::eval,
    state::{Predicate, PredicateState},
    term::{
        visit::{self, PostOrder},
        BinaryOp, CmpOp, Literal, Term, TermFactory, TermKind, UnaryOp,
    },
    Result,
};

const NAME: &str = "simplifier";

/// Rule applications per node before giving up.
const MAX_NODE_REWRITES: usize = 16;

/// Applies algebraic identities and collapses trivial quantifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Simplifier;

impl Simplifier {
    /// Creates a new simplifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Simplifies a single term.
    ///
    /// # Errors
    ///
    /// Returns an error if a rewritten term cannot be rebuilt.
    pub fn simplify(&self, term: &Term, factory: &TermFactory) -> Result<Term> {
        Rules { factory }.term(term)
    }
}

impl StatePass for Simplifier {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Applies algebraic identities and collapses trivial quantifiers"
    }

    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let rules = Rules {
            factory: ctx.factory,
        };
        state.try_map_predicates(&mut |predicate: &Predicate| {
            let simplified = predicate.try_map_operands(|t| rules.term(t))?;
            if simplified != *predicate {
                ctx.events
                    .record(EventKind::TermSimplified)
                    .pass(NAME)
                    .at(predicate.location())
                    .message(format!("{predicate} => {simplified}"));
            }
            Ok(Some(simplified))
        })
    }
}

struct Rules<'a> {
    factory: &'a TermFactory,
}

/// Returns `candidate` if it can stand in for `node` without changing its type.
fn keep(node: &Term, candidate: &Term) -> Term {
    if candidate.ty() == node.ty() {
        candidate.clone()
    } else {
        node.clone()
    }
}

fn is_int(term: &Term, value: i64) -> bool {
    term.ty().is_integral() && term.as_int_const() == Some(value)
}

impl Rules<'_> {
    fn term(&self, term: &Term) -> Result<Term> {
        let mut rewriter = PostOrder::new(|t: &Term| self.node(t));
        rewriter.apply(term)
    }

    fn node(&self, term: &Term) -> Result<Term> {
        let mut current = term.clone();
        for _ in 0..MAX_NODE_REWRITES {
            let next = self.rewrite(&current)?;
            if next == current {
                break;
            }
            current = next;
        }
        Ok(current)
    }

    fn rewrite(&self, term: &Term) -> Result<Term> {
        if let Some(literal) = eval::fold(term) {
            return Ok(self.factory.literal(literal, term.ty().clone()));
        }
        match term.kind() {
            TermKind::Unary { op, operand } => self.unary(term, *op, operand),
            TermKind::Binary { op, lhs, rhs } if term.ty().is_bool() => {
                self.logical(term, *op, lhs, rhs)
            }
            TermKind::Binary { op, lhs, rhs } if term.ty().is_integral() => {
                Ok(self.arithmetic(term, *op, lhs, rhs))
            }
            TermKind::Cmp { op, lhs, rhs } => Ok(self
                .compare(*op, lhs, rhs)?
                .unwrap_or_else(|| term.clone())),
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => self.ite(term, cond, then, otherwise),
            TermKind::ForAll { lo, hi, body } => self.for_all(term, lo, hi, body),
            TermKind::Cast { operand, target } if operand.ty() == target => Ok(operand.clone()),
            TermKind::InstanceOf { operand, .. }
                if operand.as_literal().is_some_and(Literal::is_null) =>
            {
                Ok(self.factory.bool(false))
            }
            _ => Ok(term.clone()),
        }
    }

    fn unary(&self, term: &Term, op: UnaryOp, operand: &Term) -> Result<Term> {
        match operand.kind() {
            TermKind::Unary {
                op: inner,
                operand: innermost,
            } if *inner == op => Ok(keep(term, innermost)),
            TermKind::Cmp { op: cmp, lhs, rhs }
                if op == UnaryOp::Not && !lhs.ty().is_floating() =>
            {
                self.factory.cmp(cmp.negate(), lhs, rhs)
            }
            _ => Ok(term.clone()),
        }
    }

    fn logical(&self, term: &Term, op: BinaryOp, lhs: &Term, rhs: &Term) -> Result<Term> {
        let tf = self.factory;
        Ok(match op {
            BinaryOp::And => {
                if lhs.is_true() {
                    rhs.clone()
                } else if rhs.is_true() || lhs == rhs {
                    lhs.clone()
                } else if lhs.is_false() || (rhs.is_false() && visit::is_total(lhs)) {
                    tf.bool(false)
                } else {
                    term.clone()
                }
            }
            BinaryOp::Or => {
                if lhs.is_false() {
                    rhs.clone()
                } else if rhs.is_false() || lhs == rhs {
                    lhs.clone()
                } else if lhs.is_true() || (rhs.is_true() && visit::is_total(lhs)) {
                    tf.bool(true)
                } else {
                    term.clone()
                }
            }
            BinaryOp::Xor => {
                if lhs.is_false() {
                    rhs.clone()
                } else if rhs.is_false() {
                    lhs.clone()
                } else if lhs.is_true() {
                    tf.not(rhs)?
                } else if rhs.is_true() {
                    tf.not(lhs)?
                } else if lhs == rhs && visit::is_total(lhs) {
                    tf.bool(false)
                } else {
                    term.clone()
                }
            }
            _ => term.clone(),
        })
    }

    fn arithmetic(&self, term: &Term, op: BinaryOp, lhs: &Term, rhs: &Term) -> Term {
        let zero = || self.factory.literal(Literal::Int(0), term.ty().clone());
        match op {
            BinaryOp::Add | BinaryOp::Or | BinaryOp::Xor if is_int(rhs, 0) => keep(term, lhs),
            BinaryOp::Add | BinaryOp::Or | BinaryOp::Xor if is_int(lhs, 0) => keep(term, rhs),
            BinaryOp::Sub | BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr if is_int(rhs, 0) => {
                keep(term, lhs)
            }
            BinaryOp::Mul if is_int(rhs, 1) => keep(term, lhs),
            BinaryOp::Mul if is_int(lhs, 1) => keep(term, rhs),
            BinaryOp::Div if is_int(rhs, 1) => keep(term, lhs),
            BinaryOp::Mul | BinaryOp::And
                if (is_int(rhs, 0) && visit::is_total(lhs))
                    || (is_int(lhs, 0) && visit::is_total(rhs)) =>
            {
                zero()
            }
            BinaryOp::Rem if is_int(rhs, 1) && visit::is_total(lhs) => zero(),
            BinaryOp::Sub | BinaryOp::Xor if lhs == rhs && visit::is_total(lhs) => zero(),
            BinaryOp::And | BinaryOp::Or if lhs == rhs => keep(term, lhs),
            _ => term.clone(),
        }
    }

    /// Returns `None` when no rule applies.
    fn compare(&self, op: CmpOp, lhs: &Term, rhs: &Term) -> Result<Option<Term>> {
        let tf = self.factory;
        if lhs == rhs && !lhs.ty().is_floating() && visit::is_total(lhs) {
            let holds = matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge);
            return Ok(Some(tf.bool(holds)));
        }
        if !op.is_equality() || !lhs.ty().is_bool() {
            return Ok(None);
        }
        let (var, literal) = match (lhs.as_bool_const(), rhs.as_bool_const()) {
            (None, Some(value)) => (lhs, value),
            (Some(value), None) => (rhs, value),
            _ => return Ok(None),
        };
        // b == true and b != false are b itself
        if literal == (op == CmpOp::Eq) {
            Ok(Some(var.clone()))
        } else {
            tf.not(var).map(Some)
        }
    }

    fn ite(&self, term: &Term, cond: &Term, then: &Term, otherwise: &Term) -> Result<Term> {
        if cond.is_true() {
            return Ok(keep(term, then));
        }
        if cond.is_false() {
            return Ok(keep(term, otherwise));
        }
        if then == otherwise {
            return Ok(keep(term, then));
        }
        if then.is_true() && otherwise.is_false() {
            return Ok(cond.clone());
        }
        if then.is_false() && otherwise.is_true() {
            return self.factory.not(cond);
        }
        Ok(term.clone())
    }

    fn for_all(&self, term: &Term, lo: &Term, hi: &Term, body: &Term) -> Result<Term> {
        let tf = self.factory;
        if let (Some(lo_value), Some(hi_value)) = (lo.as_int_const(), hi.as_int_const()) {
            if hi_value <= lo_value {
                return Ok(tf.bool(true));
            }
            if hi_value == lo_value.wrapping_add(1) {
                let instance = tf.apply(body, std::slice::from_ref(lo))?;
                return self.term(&instance);
            }
        }
        match body.as_lambda() {
            Some((_, inner)) if inner.is_true() => Ok(tf.bool(true)),
            Some((_, inner)) if inner.is_false() => tf.le(hi, lo),
            _ => Ok(term.clone()),
        }
    }
}
