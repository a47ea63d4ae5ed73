//! Removal of redundant predicates and syntactically infeasible branches.
//!
//! The optimizer performs the cheap, solver-free cleanups:
//!
//! - assumptions and path predicates that are tautologies (`true`, `t == t` on non-float
//!   total terms) are dropped
//! - assignments to generated variables that are never read anywhere in the state are
//!   dropped when their right-hand side cannot fault
//! - everything following a literal-false constraint in a sequence is dropped
//! - choice branches containing a literal-false constraint in their top-level sequence
//!   are pruned; a choice left without branches becomes `assume false`

use rustc_hash::FxHashSet;

use crate::{
    pipeline::{EventKind, PassContext, StatePass},
    state::{Predicate, PredicateKind, PredicateState, Segment},
    term::{visit, CmpOp, Term, TermKind, VarId},
    Result,
};

const NAME: &str = "optimizer";

/// Tautology, dead-assignment and infeasible-branch elimination.
#[derive(Debug, Default, Clone, Copy)]
pub struct Optimizer;

impl Optimizer {
    /// Creates a new optimizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatePass for Optimizer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Removes tautologies, dead generated assignments and infeasible branches"
    }

    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let reads = read_variables(state);
        let walker = Walker { ctx, reads: &reads };
        let (rewritten, _) = walker.sequence(state)?;
        Ok(rewritten.normalize())
    }
}

/// Every variable read by some predicate of the state.
fn read_variables(state: &PredicateState) -> FxHashSet<Term> {
    let mut reads = FxHashSet::default();
    for predicate in state.predicates() {
        for operand in predicate.operands() {
            reads.extend(visit::free_vars(operand));
        }
    }
    reads
}

/// Returns `true` if `cond` holds on every execution where it is evaluated.
fn is_tautology(cond: &Term) -> bool {
    if cond.is_true() {
        return true;
    }
    match cond.kind() {
        TermKind::Cmp {
            op: CmpOp::Eq | CmpOp::Le | CmpOp::Ge,
            lhs,
            rhs,
        } => lhs == rhs && !lhs.ty().is_floating() && visit::is_total(lhs),
        _ => false,
    }
}

fn is_contradiction(predicate: &Predicate) -> bool {
    predicate.condition().is_some_and(Term::is_false)
}

struct Walker<'a, 'c> {
    ctx: &'a PassContext<'c>,
    reads: &'a FxHashSet<Term>,
}

impl Walker<'_, '_> {
    /// Rewrites one sequence. The flag is `true` when the sequence contains a literal
    /// false constraint at its top level, i.e. admits no execution.
    fn sequence(&self, state: &PredicateState) -> Result<(PredicateState, bool)> {
        let segments = state.segments();
        let mut parts: Vec<PredicateState> = Vec::new();
        let mut block: Vec<Predicate> = Vec::new();

        for (position, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Block(predicates) => {
                    for (index, predicate) in predicates.iter().enumerate() {
                        if is_contradiction(predicate) {
                            block.push(predicate.clone());
                            let rest = predicates.len() - index - 1
                                + segments[position + 1..]
                                    .iter()
                                    .map(segment_size)
                                    .sum::<usize>();
                            if rest > 0 {
                                self.ctx
                                    .events
                                    .record(EventKind::PredicateRemoved)
                                    .pass(NAME)
                                    .at(predicate.location())
                                    .message(format!("{rest} predicates after {predicate}"));
                            }
                            return Ok((close(parts, block), true));
                        }
                        if self.is_redundant(predicate) {
                            self.ctx
                                .events
                                .record(EventKind::PredicateRemoved)
                                .pass(NAME)
                                .at(predicate.location())
                                .message(predicate);
                            continue;
                        }
                        block.push(predicate.clone());
                    }
                }
                Segment::Choice(branches) => {
                    let mut feasible = Vec::with_capacity(branches.len());
                    for (index, branch) in branches.iter().enumerate() {
                        let (rewritten, infeasible) = self.sequence(branch)?;
                        if infeasible {
                            self.ctx
                                .events
                                .record(EventKind::BranchPruned)
                                .pass(NAME)
                                .message(format!("branch {index} of {}", branches.len()));
                        } else {
                            feasible.push(rewritten);
                        }
                    }
                    if feasible.is_empty() {
                        let falsity = self.ctx.factory.bool(false);
                        block.push(Predicate::assume(&falsity)?);
                        return Ok((close(parts, block), true));
                    }
                    if !block.is_empty() {
                        parts.push(PredicateState::basic(std::mem::take(&mut block)));
                    }
                    parts.push(PredicateState::choice(feasible));
                }
            }
        }
        Ok((close(parts, block), false))
    }

    fn is_redundant(&self, predicate: &Predicate) -> bool {
        match predicate.kind() {
            PredicateKind::Assume(cond) | PredicateKind::Path(cond) => is_tautology(cond),
            PredicateKind::Assign { lhv, rhv } => {
                lhv.as_var().is_some_and(VarId::is_generated)
                    && !self.reads.contains(lhv)
                    && visit::is_total(rhv)
            }
            PredicateKind::Store { .. } | PredicateKind::Call { .. } => false,
        }
    }
}

fn segment_size(segment: &Segment<'_>) -> usize {
    match segment {
        Segment::Block(predicates) => predicates.len(),
        Segment::Choice(branches) => branches.iter().map(PredicateState::size).sum(),
    }
}

fn close(parts: Vec<PredicateState>, block: Vec<Predicate>) -> PredicateState {
    parts
        .into_iter()
        .chain(std::iter::once(PredicateState::basic(block)))
        .fold(PredicateState::empty(), PredicateState::chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{EventLog, TypePointsTo},
        state::StateBuilder,
        term::{TermFactory, TermType},
    };

    fn run(tf: &TermFactory, state: &PredicateState) -> (PredicateState, EventLog) {
        let events = EventLog::new();
        let points_to = TypePointsTo;
        let ctx = PassContext::new(tf, &events, &points_to);
        let result = Optimizer.run(state, &ctx).unwrap();
        (result, events)
    }

    #[test]
    fn test_tautologies_removed() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .assume(&tf.bool(true))
            .unwrap()
            .path(&tf.eq(&x, &x).unwrap())
            .unwrap()
            .path(&tf.gt(&x, &tf.int(0)).unwrap())
            .unwrap();

        let (result, events) = run(&tf, &builder.current());
        assert_eq!(result.size(), 1);
        assert_eq!(events.count(EventKind::PredicateRemoved), 2);
    }

    #[test]
    fn test_float_self_equality_kept() {
        let tf = TermFactory::new();
        let d = tf.var("d", TermType::Double);
        let mut builder = StateBuilder::new();
        builder.path(&tf.eq(&d, &d).unwrap()).unwrap();
        let (result, _) = run(&tf, &builder.current());
        assert_eq!(result.size(), 1);
    }

    #[test]
    fn test_dead_generated_assignment_removed() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let dead = tf.fresh_var("t", TermType::INT);
        let live = tf.fresh_var("t", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&dead, &tf.add(&x, &tf.int(1)).unwrap())
            .unwrap()
            .state(&live, &tf.int(2))
            .unwrap()
            .path(&tf.gt(&live, &x).unwrap())
            .unwrap();

        let (result, _) = run(&tf, &builder.current());
        let defined: Vec<_> = result
            .predicates()
            .iter()
            .filter_map(|p| p.defined_var().cloned())
            .collect();
        assert_eq!(defined, vec![live]);
    }

    #[test]
    fn test_named_and_faulting_assignments_kept() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::char_array());
        let named = tf.var("y", TermType::INT);
        let generated = tf.fresh_var("len", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&named, &tf.int(1))
            .unwrap()
            .state(&generated, &tf.length(&a).unwrap())
            .unwrap();
        let (result, _) = run(&tf, &builder.current());
        assert_eq!(result.size(), 2);
    }

    #[test]
    fn test_infeasible_branch_pruned() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let mut dead = StateBuilder::new();
        dead.path(&tf.bool(false)).unwrap();
        dead.path(&tf.gt(&x, &tf.int(3)).unwrap()).unwrap();
        let mut alive = StateBuilder::new();
        alive.path(&tf.gt(&x, &tf.int(0)).unwrap()).unwrap();
        let mut other = StateBuilder::new();
        other.path(&tf.lt(&x, &tf.int(-1)).unwrap()).unwrap();

        let mut builder = StateBuilder::new();
        builder.choice(vec![dead.build(), alive.build(), other.build()]);
        let (result, events) = run(&tf, &builder.current());

        assert_eq!(events.count(EventKind::BranchPruned), 1);
        match &result {
            PredicateState::Choice(branches) => assert_eq!(branches.len(), 2),
            other => panic!("expected a choice, got {other}"),
        }
    }

    #[test]
    fn test_all_branches_infeasible() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let mut dead = StateBuilder::new();
        dead.assume(&tf.bool(false)).unwrap();

        let mut builder = StateBuilder::new();
        builder
            .choice(vec![dead.current(), dead.build()])
            .path(&tf.gt(&x, &tf.int(0)).unwrap())
            .unwrap();
        let (result, _) = run(&tf, &builder.current());

        let predicates = result.predicates();
        assert_eq!(predicates.len(), 1);
        assert!(predicates[0].condition().is_some_and(Term::is_false));
    }

    #[test]
    fn test_unchanged_state_is_stable() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let mut builder = StateBuilder::new();
        builder.path(&tf.gt(&x, &tf.int(0)).unwrap()).unwrap();
        let state = builder.build();
        let (result, events) = run(&tf, &state);
        assert_eq!(result, state.normalize());
        assert!(events.is_empty());
    }
}
