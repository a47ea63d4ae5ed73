//! The bounded reference backend.
//!
//! [`BoundedSolver`] decides reachability by executing the state concretely under
//! systematically enumerated choices. A single execution walks the state once: every
//! `Choice` picks one branch, every assignment and store is performed on a concrete heap,
//! and every assume or path predicate must evaluate to `true`. Values the execution needs
//! but the state does not define are drawn from small candidate domains:
//!
//! | Needed value | Candidates | Exhaustive |
//! |--------------|------------|------------|
//! | branch of a choice | every branch | yes |
//! | boolean input | `false`, `true` | yes |
//! | integer input | `0`, `1`, `-1`, every constant `c` of the query and `c ± 1` | no |
//! | reference input | `null`, a fresh input object, every compatible input object | for strings and arrays |
//! | input array length | `0..=max_array_length` | no |
//! | atomic string input | `null`, `""`, every string constant of the query | no |
//!
//! An input `x` with a constraint `x == e` on the executed path (and `e` free of memory
//! reads) is not enumerated: it takes the value of `e`. This keeps queries such as
//! `x == -5 && x > 0` exhaustive.
//!
//! The search is a depth-first enumeration of choice sequences by restarting: the chooser
//! replays a recorded prefix of decisions, extends it with first options, and after a
//! failed execution advances the deepest decision that still has options left.
//!
//! # Verdicts
//!
//! - `Sat` as soon as one execution satisfies the state and the goal; the model holds
//!   every variable bound by that execution, every free variable of the goal, and the
//!   heap.
//! - `Unsat` only when every choice sequence was tried, every decision point had a
//!   complete domain, and no execution ended in a runtime fault, an unmodeled call or a
//!   resource bound.
//! - `Unknown` otherwise, including on timeout.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    config::SolverConfig,
    solver::{
        eval::{EvalError, EvalResult, Evaluator, Inputs, Machine},
        model::{Addr, HeapObject, Model, Origin, SolverResult, Value},
        SolverBackend,
    },
    state::{Predicate, PredicateKind, PredicateState, Segment},
    term::{visit, BinaryOp, CmpOp, FieldRef, IntType, Literal, Term, TermKind, TermType, UnaryOp},
};

/// A decision point of the current choice sequence.
#[derive(Debug, Clone, Copy)]
struct ChoicePoint {
    chosen: usize,
    options: usize,
}

/// Records, replays and advances choice sequences.
#[derive(Debug, Default)]
struct Chooser {
    trail: Vec<ChoicePoint>,
    pos: usize,
    incomplete: bool,
}

impl Chooser {
    /// Picks one of `options` alternatives. Returns `None` when there is none.
    fn choose(&mut self, options: usize, complete: bool) -> Option<usize> {
        if options == 0 {
            return None;
        }
        if !complete {
            self.incomplete = true;
        }
        if let Some(point) = self.trail.get(self.pos) {
            self.pos += 1;
            return Some(point.chosen.min(options - 1));
        }
        self.trail.push(ChoicePoint { chosen: 0, options });
        self.pos += 1;
        Some(0)
    }

    /// Starts the next execution, replaying the trail from the beginning.
    fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Moves to the next unexplored choice sequence. Returns `false` when the search
    /// space is exhausted.
    fn advance(&mut self) -> bool {
        self.trail.truncate(self.pos);
        while let Some(last) = self.trail.last_mut() {
            if last.chosen + 1 < last.options {
                last.chosen += 1;
                return true;
            }
            self.trail.pop();
        }
        false
    }
}

/// Candidate values derived from the constants of a query.
#[derive(Debug, Default)]
struct Domains {
    ints: Vec<i64>,
    floats: Vec<f64>,
    strings: Vec<String>,
    opaque_strings: bool,
    int_candidates: usize,
}

impl Domains {
    fn collect(states: &[&PredicateState], int_candidates: usize) -> Self {
        let mut ints = Vec::new();
        let mut floats = Vec::new();
        let mut strings = vec![String::new()];
        let mut opaque_strings = false;
        for state in states {
            for predicate in state.predicates() {
                for term in predicate.operands() {
                    visit::any(term, &mut |t: &Term| {
                        match t.kind() {
                            TermKind::Const(Literal::Int(v)) => ints.push(*v),
                            TermKind::Const(lit @ Literal::Float(_)) => {
                                floats.extend(lit.as_float());
                            }
                            TermKind::Const(Literal::Str(s)) => {
                                opaque_strings = true;
                                if !strings.iter().any(|known| **known == **s) {
                                    strings.push(s.to_string());
                                }
                            }
                            TermKind::Str { .. } => opaque_strings = true,
                            _ => {}
                        }
                        false
                    });
                }
            }
        }
        ints.sort_unstable();
        ints.dedup();

        let mut candidates = vec![0, 1, -1];
        for c in ints {
            candidates.extend([c, c.saturating_sub(1), c.saturating_add(1)]);
        }
        let mut seen = FxHashSet::default();
        candidates.retain(|c| seen.insert(*c));

        let mut float_candidates = vec![0.0, 1.0, -1.0];
        float_candidates.extend(floats);

        Domains {
            ints: candidates,
            floats: float_candidates,
            strings,
            opaque_strings,
            int_candidates: int_candidates.max(1),
        }
    }

    fn ints(&self, it: IntType) -> Vec<i64> {
        self.ints
            .iter()
            .copied()
            .filter(|c| it.contains(*c))
            .take(self.int_candidates)
            .collect()
    }
}

/// Facts about the linear path of one execution.
#[derive(Debug, Default)]
struct Plan {
    /// Variables assigned somewhere on the path.
    assigned: FxHashSet<Term>,
    /// Defining expressions of unassigned variables, in path order.
    definitions: FxHashMap<Term, Vec<Term>>,
}

impl Plan {
    fn new(path: &[&Predicate]) -> Self {
        let mut plan = Plan::default();
        for predicate in path {
            if let PredicateKind::Assign { lhv, .. } = predicate.kind() {
                plan.assigned.insert(lhv.clone());
            }
        }
        for predicate in path {
            if let PredicateKind::Assume(cond) | PredicateKind::Path(cond) = predicate.kind() {
                plan.define(cond);
            }
        }
        plan
    }

    fn define(&mut self, cond: &Term) {
        match cond.kind() {
            TermKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } if cond.ty().is_bool() => {
                self.define(lhs);
                self.define(rhs);
            }
            TermKind::Cmp {
                op: CmpOp::Eq,
                lhs,
                rhs,
            } => {
                self.define_as(lhs, rhs);
                self.define_as(rhs, lhs);
            }
            TermKind::Var(_) if cond.ty().is_bool() => {
                self.define_as(cond, &Term::new(TermKind::Const(Literal::Bool(true)), TermType::Bool));
            }
            TermKind::Unary {
                op: UnaryOp::Not,
                operand,
            } if operand.is_var() && operand.ty().is_bool() => {
                self.define_as(
                    operand,
                    &Term::new(TermKind::Const(Literal::Bool(false)), TermType::Bool),
                );
            }
            _ => {}
        }
    }

    fn define_as(&mut self, var: &Term, value: &Term) {
        if !var.is_var() || var.ty().is_floating() || self.assigned.contains(var) {
            return;
        }
        let reads_memory = visit::any(value, &mut |t: &Term| {
            matches!(
                t.kind(),
                TermKind::Load(_)
                    | TermKind::ArrayLength { .. }
                    | TermKind::New { .. }
                    | TermKind::Call { .. }
            )
        });
        if reads_memory || visit::mentions(value, var) {
            return;
        }
        self.definitions
            .entry(var.clone())
            .or_default()
            .push(value.clone());
    }
}

/// Answers the evaluator's requests for one execution.
struct Run<'s> {
    chooser: &'s mut Chooser,
    plan: &'s Plan,
    domains: &'s Domains,
    max_array_length: usize,
    resolving: FxHashSet<Term>,
}

impl Run<'_> {
    fn choose(&mut self, options: usize, complete: bool) -> EvalResult<usize> {
        self.chooser
            .choose(options, complete)
            .ok_or_else(|| EvalError::Limit("empty domain".to_string()))
    }

    fn value_of(&mut self, machine: &mut Machine, ty: &TermType) -> EvalResult<Value> {
        match ty {
            TermType::Bool => Ok(Value::Bool(self.choose(2, true)? == 1)),
            TermType::Int(it) => {
                let candidates = self.domains.ints(*it);
                let k = self.choose(candidates.len(), false)?;
                Ok(Value::Int(candidates[k]))
            }
            TermType::Float | TermType::Double => {
                let k = self.choose(self.domains.floats.len(), false)?;
                Ok(Value::Float(self.domains.floats[k]))
            }
            TermType::Null => Ok(Value::Null),
            TermType::Void => Err(EvalError::Unsupported("value of type void".to_string())),
            t if self.domains.opaque_strings && is_string_like(t) => {
                let k = self.choose(self.domains.strings.len() + 1, false)?;
                Ok(match k {
                    0 => Value::Null,
                    k => Value::Str(self.domains.strings[k - 1].as_str().into()),
                })
            }
            t => self.reference(machine, t),
        }
    }

    fn reference(&mut self, machine: &mut Machine, ty: &TermType) -> EvalResult<Value> {
        let fresh = fresh_types(ty);
        let aliases: Vec<Addr> = machine
            .heap
            .iter()
            .filter(|(_, object)| object.is_input() && object.ty.is_subtype_of(ty))
            .map(|(addr, _)| addr)
            .collect();
        let complete = ty.element().is_some() || *ty == TermType::string();
        let k = self.choose(1 + fresh.len() + aliases.len(), complete)?;
        if k == 0 {
            return Ok(Value::Null);
        }
        if let Some(dynamic) = fresh.get(k - 1) {
            let object = HeapObject::new(dynamic.clone(), Origin::Input, None);
            return Ok(Value::Ref(machine.heap.allocate(object)));
        }
        Ok(Value::Ref(aliases[k - 1 - fresh.len()]))
    }
}

fn is_string_like(ty: &TermType) -> bool {
    *ty == TermType::string() || *ty == TermType::char_sequence()
}

/// Dynamic types a fresh input object of static type `ty` may have.
fn fresh_types(ty: &TermType) -> Vec<TermType> {
    let string = TermType::string();
    if *ty != string && string.is_subtype_of(ty) {
        vec![string, ty.clone()]
    } else {
        vec![ty.clone()]
    }
}

impl Inputs for Run<'_> {
    fn variable(&mut self, machine: &mut Machine, var: &Term) -> EvalResult<Value> {
        if self.plan.assigned.contains(var) {
            return Err(EvalError::NotReady(var.to_string()));
        }
        let plan = self.plan;
        if let Some(definitions) = plan.definitions.get(var) {
            if self.resolving.insert(var.clone()) {
                let mut resolved = None;
                for definition in definitions {
                    if let Ok(value) = Evaluator::new(machine, self).eval(definition) {
                        resolved = Some(value);
                        break;
                    }
                }
                self.resolving.remove(var);
                if let Some(value) = resolved {
                    return Ok(match (value, var.ty()) {
                        (Value::Int(v), TermType::Int(it)) => Value::Int(it.wrap(v)),
                        (value, _) => value,
                    });
                }
            }
        }
        self.value_of(machine, var.ty())
    }

    fn field(&mut self, machine: &mut Machine, _addr: Addr, field: &FieldRef) -> EvalResult<Value> {
        self.value_of(machine, &field.ty)
    }

    fn length(&mut self, _machine: &mut Machine, _addr: Addr) -> EvalResult<i64> {
        let k = self.choose(self.max_array_length + 1, false)?;
        Ok(k as i64)
    }

    fn element(&mut self, machine: &mut Machine, addr: Addr, _index: i64) -> EvalResult<Value> {
        let elem = machine
            .object(addr)?
            .ty
            .element()
            .cloned()
            .unwrap_or(TermType::Void);
        self.value_of(machine, &elem)
    }
}

/// How one execution ended.
enum Outcome {
    Witness(Model),
    Infeasible,
    Aborted(EvalError),
}

/// Why the search could not conclude `Unsat`.
#[derive(Debug, Default)]
struct Inconclusive {
    reasons: Vec<String>,
}

impl Inconclusive {
    fn note(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Bounded enumerative backend; see the [module documentation](self).
#[derive(Debug, Clone, Default)]
pub struct BoundedSolver {
    config: SolverConfig,
}

impl BoundedSolver {
    /// Creates a solver with the given bounds.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        BoundedSolver { config }
    }

    /// The bounds of this solver.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn execute(
        &self,
        path: &[&Predicate],
        goal: &PredicateState,
        domains: &Domains,
        chooser: &mut Chooser,
        inconclusive: &mut Inconclusive,
    ) -> Outcome {
        let plan = Plan::new(path);
        let max_array_length = i64::try_from(self.config.max_array_length).unwrap_or(i64::MAX);
        let mut machine = Machine::new(max_array_length);
        let mut run = Run {
            chooser,
            plan: &plan,
            domains,
            max_array_length: self.config.max_array_length,
            resolving: FxHashSet::default(),
        };

        for predicate in path {
            let mut evaluator = Evaluator::new(&mut machine, &mut run);
            let step = match predicate.kind() {
                PredicateKind::Assign { lhv, rhv } => evaluator.assign(lhv, rhv).map(|()| true),
                PredicateKind::Store { target, value } => {
                    evaluator.store(target, value).map(|()| true)
                }
                PredicateKind::Call { lhv, call } => {
                    inconclusive.note(format!("unmodeled call {call}"));
                    match lhv {
                        Some(lhv) => evaluator.eval(lhv).map(|_| true),
                        None => Ok(true),
                    }
                }
                PredicateKind::Assume(cond) | PredicateKind::Path(cond) => evaluator.check(cond),
            };
            match step {
                Ok(true) => {}
                Ok(false) => return Outcome::Infeasible,
                Err(error) => return Outcome::Aborted(error),
            }
        }

        let mut evaluator = Evaluator::new(&mut machine, &mut run);
        match holds(&mut evaluator, goal) {
            Ok(true) => {}
            Ok(false) => return Outcome::Infeasible,
            Err(error) => return Outcome::Aborted(error),
        }
        cover_goal(&mut evaluator, goal);

        let values: BTreeMap<String, Value> = machine
            .env
            .iter()
            .filter(|(var, _)| var.is_var())
            .map(|(var, value)| (var.to_string(), value.clone()))
            .collect();
        Outcome::Witness(Model {
            values,
            heap: machine.heap,
        })
    }
}

/// Evaluates a goal state as a formula: sequences are conjunctions, choices are
/// disjunctions tried left to right.
fn holds<I: Inputs + ?Sized>(evaluator: &mut Evaluator<'_, I>, goal: &PredicateState) -> EvalResult<bool> {
    for segment in goal.segments() {
        match segment {
            Segment::Block(predicates) => {
                for predicate in predicates {
                    if let Some(cond) = predicate.condition() {
                        if !evaluator.check(cond)? {
                            return Ok(false);
                        }
                    }
                }
            }
            Segment::Choice(branches) => {
                let mut any = false;
                for branch in branches {
                    if holds(evaluator, branch)? {
                        any = true;
                        break;
                    }
                }
                if !any {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Gives every free variable of the goal a value, including those of choice branches
/// `holds` never had to try.
fn cover_goal<I: Inputs + ?Sized>(evaluator: &mut Evaluator<'_, I>, goal: &PredicateState) {
    for predicate in goal.predicates() {
        for operand in predicate.operands() {
            for var in visit::free_vars(operand) {
                if let Err(error) = evaluator.eval(&var) {
                    log::trace!("no model value for {var}: {error}");
                }
            }
        }
    }
}

/// Flattens the state into the predicates of one branch combination.
///
/// Returns `false` if a choice without branches was reached.
fn linearize<'s>(
    state: &'s PredicateState,
    chooser: &mut Chooser,
    out: &mut Vec<&'s Predicate>,
    picks: &mut Vec<usize>,
) -> bool {
    for segment in state.segments() {
        match segment {
            Segment::Block(predicates) => out.extend(predicates.iter()),
            Segment::Choice(branches) => {
                let Some(k) = chooser.choose(branches.len(), true) else {
                    return false;
                };
                picks.push(k);
                if !linearize(&branches[k], chooser, out, picks) {
                    return false;
                }
            }
        }
    }
    true
}

impl SolverBackend for BoundedSolver {
    fn name(&self) -> &'static str {
        "bounded"
    }

    fn description(&self) -> &'static str {
        "Enumerates branch combinations and small input domains over a concrete heap"
    }

    fn is_path_possible(&self, state: &PredicateState, path: &PredicateState) -> SolverResult {
        let start = Instant::now();
        let deadline = start.checked_add(self.config.timeout);
        let domains = Domains::collect(&[state, path], self.config.int_candidates);
        let mut chooser = Chooser::default();
        let mut selections: FxHashSet<Vec<usize>> = FxHashSet::default();
        let mut inconclusive = Inconclusive::default();
        let mut executions = 0usize;

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                log::debug!(
                    "bounded search timed out after {executions} executions ({:?})",
                    self.config.timeout
                );
                return SolverResult::Unknown(format!(
                    "timeout after {}",
                    format_duration(self.config.timeout)
                ));
            }
            if executions >= self.config.max_search_nodes {
                inconclusive.note(format!("search limit of {executions} executions reached"));
                break;
            }
            executions += 1;

            chooser.rewind();
            let mut linear = Vec::new();
            let mut picks = Vec::new();
            let feasible = linearize(state, &mut chooser, &mut linear, &mut picks);
            if !selections.contains(&picks) {
                if selections.len() >= self.config.max_paths {
                    inconclusive.note(format!("path limit of {} reached", self.config.max_paths));
                    break;
                }
                selections.insert(picks);
            }

            if feasible {
                match self.execute(&linear, path, &domains, &mut chooser, &mut inconclusive) {
                    Outcome::Witness(model) => {
                        log::debug!(
                            "bounded search found a witness after {executions} executions in {:?}",
                            start.elapsed()
                        );
                        return SolverResult::Sat(model);
                    }
                    Outcome::Infeasible => {}
                    Outcome::Aborted(EvalError::NotReady(var)) => {
                        inconclusive.note(format!("{var} read before its definition"));
                    }
                    Outcome::Aborted(error) => {
                        log::trace!("execution {executions} aborted: {error}");
                        inconclusive.note(error.to_string());
                    }
                }
            }

            if !chooser.advance() {
                break;
            }
        }

        log::debug!(
            "bounded search explored {executions} executions over {} branch combinations in {:?}",
            selections.len(),
            start.elapsed()
        );
        if inconclusive.is_empty() && !chooser.incomplete {
            return SolverResult::Unsat;
        }
        if inconclusive.is_empty() {
            return SolverResult::Unknown(
                "no witness within the bounded input domains".to_string(),
            );
        }
        SolverResult::Unknown(format!(
            "bounded search inconclusive: {}",
            inconclusive.reasons.join("; ")
        ))
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
