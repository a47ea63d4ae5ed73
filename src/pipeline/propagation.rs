//! Constant propagation along execution order.
//!
//! Walks every sequence in program order carrying an environment of variables known to
//! hold a literal. Each operand is substituted through the environment and folded
//! bottom-up with the concrete operator semantics; an assignment whose folded right-hand
//! side is a literal extends the environment.
//!
//! Facts learned inside a choice branch stay in that branch: every branch starts from a
//! copy of the environment at the split, and the code after the choice continues with the
//! environment from before it.

use rustc_hash::FxHashMap;

use crate::{
    pipeline::{EventKind, PassContext, StatePass},
    solver::eval,
    state::{Predicate, PredicateKind, PredicateState, Segment},
    term::{visit, visit::PostOrder, Term, TermFactory},
    Result,
};

const NAME: &str = "constant-propagation";

type Env = FxHashMap<Term, Term>;

/// Substitutes literal-valued variables and folds constant operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantPropagator;

impl ConstantPropagator {
    /// Creates a new constant propagator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatePass for ConstantPropagator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Substitutes variables bound to literals and folds constant operations"
    }

    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let mut env = Env::default();
        propagate(state, &mut env, ctx)
    }
}

fn propagate(state: &PredicateState, env: &mut Env, ctx: &PassContext<'_>) -> Result<PredicateState> {
    let mut result = PredicateState::empty();
    for segment in state.segments() {
        match segment {
            Segment::Block(predicates) => {
                let mut block = Vec::with_capacity(predicates.len());
                for predicate in predicates {
                    block.push(rewrite(predicate, env, ctx)?);
                }
                result = result.append(block);
            }
            Segment::Choice(branches) => {
                let mut rewritten = Vec::with_capacity(branches.len());
                for branch in branches {
                    let mut local = env.clone();
                    rewritten.push(propagate(branch, &mut local, ctx)?);
                }
                result = result.then(&PredicateState::choice(rewritten));
            }
        }
    }
    Ok(result)
}

fn rewrite(predicate: &Predicate, env: &mut Env, ctx: &PassContext<'_>) -> Result<Predicate> {
    let rewritten = predicate.try_map_operands(|t| substitute_and_fold(t, env, ctx.factory))?;
    if rewritten != *predicate {
        ctx.events
            .record(EventKind::ConstantPropagated)
            .pass(NAME)
            .at(predicate.location())
            .message(format!("{predicate} => {rewritten}"));
    }
    if let PredicateKind::Assign { lhv, rhv } = rewritten.kind() {
        if rhv.is_const() {
            env.insert(lhv.clone(), rhv.clone());
        }
    }
    Ok(rewritten)
}

fn substitute_and_fold(term: &Term, env: &Env, factory: &TermFactory) -> Result<Term> {
    let substituted = visit::substitute(term, env);
    let mut folder = PostOrder::new(|t: &Term| {
        Ok(match eval::fold(t) {
            Some(literal) => factory.literal(literal, t.ty().clone()),
            None => t.clone(),
        })
    });
    folder.apply(&substituted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{EventLog, TypePointsTo},
        state::StateBuilder,
        term::TermType,
    };

    fn run(tf: &TermFactory, state: &PredicateState) -> (PredicateState, EventLog) {
        let events = EventLog::new();
        let points_to = TypePointsTo;
        let ctx = PassContext::new(tf, &events, &points_to);
        let result = ConstantPropagator.run(state, &ctx).unwrap();
        (result, events)
    }

    fn rendered(state: &PredicateState) -> Vec<String> {
        state.predicates().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_transitive_propagation() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::INT);
        let b = tf.var("b", TermType::INT);
        let x = tf.var("x", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&a, &tf.int(2))
            .unwrap()
            .state(&b, &tf.mul(&a, &tf.int(3)).unwrap())
            .unwrap()
            .path(&tf.gt(&x, &b).unwrap())
            .unwrap();

        let (result, events) = run(&tf, &builder.current());
        assert_eq!(rendered(&result), vec!["a = 2", "b = 6", "@P (x > 6)"]);
        assert_eq!(events.count(EventKind::ConstantPropagated), 2);
    }

    #[test]
    fn test_branch_facts_do_not_leak() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let y = tf.var("y", TermType::INT);
        let mut left = StateBuilder::new();
        left.state(&x, &tf.int(1)).unwrap();
        left.path(&tf.gt(&y, &x).unwrap()).unwrap();
        let mut right = StateBuilder::new();
        right.path(&tf.lt(&y, &x).unwrap()).unwrap();

        let mut builder = StateBuilder::new();
        builder
            .choice(vec![left.build(), right.build()])
            .path(&tf.ne(&x, &y).unwrap())
            .unwrap();
        let (result, _) = run(&tf, &builder.current());

        assert_eq!(
            rendered(&result),
            vec!["x = 1", "@P (y > 1)", "@P (y < x)", "@P (x != y)"]
        );
    }

    #[test]
    fn test_faulting_operation_not_folded() {
        let tf = TermFactory::new();
        let z = tf.var("z", TermType::INT);
        let q = tf.var("q", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&z, &tf.int(0))
            .unwrap()
            .state(&q, &tf.binary(crate::term::BinaryOp::Div, &tf.int(7), &z).unwrap())
            .unwrap();
        let (result, _) = run(&tf, &builder.current());
        assert_eq!(rendered(&result), vec!["z = 0", "q = (7 / 0)"]);
    }
}
