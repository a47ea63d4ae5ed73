//! SMT backend on top of Z3.
//!
//! # Encoding
//!
//! - Integers of every width are unbounded Z3 integers; inputs are constrained to the
//!   range of their type, arithmetic does not wrap.
//! - References are integers: `null` is `0`, input objects are positive and the object
//!   allocated at site `k` is `-(k + 1)`.
//! - Memory is one array per `(space, field)` mapping addresses to values, one per
//!   `(space, element type)` mapping addresses to element arrays, and one per space for
//!   array lengths. Stores create new versions; the versions of the branches of a choice
//!   are joined with `ite` on the branch selector.
//! - Every choice gets an integer selector; a predicate inside a branch is asserted
//!   under the conjunction of the selectors leading to it.
//! - `forAll` becomes a bounded `forall`; generated arrays become a quantified element
//!   definition.
//! - `instanceof` on a statically unrelated type is an uninterpreted predicate per target
//!   type, fixed for allocated objects.
//!
//! Floating point values, string terms, bitwise operators and narrowing casts are not
//! encoded; a query containing one is [`SolverResult::Unknown`]. An unmodeled call
//! havocs memory and downgrades `Unsat` to `Unknown`.

use std::{fmt, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};
use z3::{
    ast::{self, Ast, Bool, Dynamic, Int},
    Config, Context, Params, SatResult, Solver, Sort,
};

use crate::{
    config::SolverConfig,
    solver::{Model, SolverBackend, SolverResult, Value},
    state::{PredicateKind, PredicateState, Segment},
    term::{
        visit, AllocSite, BinaryOp, CmpOp, Literal, MemRef, MemorySpace, Term, TermKind, TermType,
        UnaryOp,
    },
    Error, Result,
};

/// Z3-backed solving backend; see the [module documentation](self).
#[derive(Debug, Clone, Default)]
pub struct Z3Solver {
    config: SolverConfig,
}

impl Z3Solver {
    /// Creates a backend. Only the timeout of `config` is used.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Z3Solver { config }
    }

    fn solve(&self, state: &PredicateState, path: &PredicateState) -> Result<SolverResult> {
        let ctx = Context::new(&Config::new());
        let mut encoder = Encoder::new(&ctx);
        encoder.state(state)?;
        let goal = encoder.goal(path)?;
        encoder.finish();

        let solver = Solver::new(&ctx);
        let mut params = Params::new(&ctx);
        let timeout = u32::try_from(self.config.timeout.as_millis()).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout);
        solver.set_params(&params);
        for assertion in &encoder.assertions {
            solver.assert(assertion);
        }
        solver.assert(&goal);

        Ok(match solver.check() {
            SatResult::Sat => match solver.get_model() {
                Some(model) => SolverResult::Sat(encoder.model(&model)),
                None => SolverResult::Unknown("z3 reported sat without a model".to_string()),
            },
            SatResult::Unsat if encoder.opaque_calls > 0 => SolverResult::Unknown(format!(
                "unsat modulo {} unmodeled calls",
                encoder.opaque_calls
            )),
            SatResult::Unsat => SolverResult::Unsat,
            SatResult::Unknown => SolverResult::Unknown(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "z3 returned unknown".to_string()),
            ),
        })
    }
}

impl SolverBackend for Z3Solver {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn description(&self) -> &'static str {
        "Encodes states into Z3 with versioned memory arrays"
    }

    fn is_path_possible(&self, state: &PredicateState, path: &PredicateState) -> SolverResult {
        match self.solve(state, path) {
            Ok(result) => result,
            Err(error) => {
                log::debug!("z3 encoding failed: {error}");
                SolverResult::Unknown(error.to_string())
            }
        }
    }
}

/// An encoded term.
#[derive(Clone)]
enum Sym<'ctx> {
    Bool(Bool<'ctx>),
    Int(Int<'ctx>),
}

impl<'ctx> Sym<'ctx> {
    fn int(self) -> Result<Int<'ctx>> {
        match self {
            Sym::Int(i) => Ok(i),
            Sym::Bool(_) => Err(malformed_error!("expected an integer encoding")),
        }
    }

    fn bool(self) -> Result<Bool<'ctx>> {
        match self {
            Sym::Bool(b) => Ok(b),
            Sym::Int(_) => Err(malformed_error!("expected a boolean encoding")),
        }
    }

    fn dynamic(&self) -> Dynamic<'ctx> {
        match self {
            Sym::Bool(b) => Dynamic::from_ast(b),
            Sym::Int(i) => Dynamic::from_ast(i),
        }
    }

    fn equals(&self, other: &Sym<'ctx>) -> Result<Bool<'ctx>> {
        match (self, other) {
            (Sym::Bool(a), Sym::Bool(b)) => Ok(a._eq(b)),
            (Sym::Int(a), Sym::Int(b)) => Ok(a._eq(b)),
            _ => Err(malformed_error!("comparison of a boolean with an integer")),
        }
    }

    fn from_dynamic(value: &Dynamic<'ctx>, ty: &TermType) -> Result<Sym<'ctx>> {
        if ty.is_bool() {
            value
                .as_bool()
                .map(Sym::Bool)
                .ok_or_else(|| malformed_error!("memory of {} holds a non-boolean", ty))
        } else {
            value
                .as_int()
                .map(Sym::Int)
                .ok_or_else(|| malformed_error!("memory of {} holds a non-integer", ty))
        }
    }
}

/// One memory array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MemKey {
    Field {
        space: MemorySpace,
        class: Arc<str>,
        name: Arc<str>,
        ty: TermType,
    },
    Elements {
        space: MemorySpace,
        elem: TermType,
    },
    Length {
        space: MemorySpace,
    },
}

impl fmt::Display for MemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemKey::Field {
                space, class, name, ..
            } => write!(f, "{class}.{name}{space}"),
            MemKey::Elements { space, elem } => write!(f, "{elem}[]{space}"),
            MemKey::Length { space } => write!(f, "length{space}"),
        }
    }
}

fn sort_of<'ctx>(ctx: &'ctx Context, ty: &TermType) -> Result<Sort<'ctx>> {
    match ty {
        TermType::Bool => Ok(Sort::bool(ctx)),
        TermType::Int(_) | TermType::Null | TermType::Class(_) | TermType::Array(_) => {
            Ok(Sort::int(ctx))
        }
        other => Err(Error::Solver(format!("values of type {other} are not encoded"))),
    }
}

impl MemKey {
    fn declare<'ctx>(&self, ctx: &'ctx Context, name: String) -> Result<ast::Array<'ctx>> {
        let address = Sort::int(ctx);
        let range = match self {
            MemKey::Field { ty, .. } => sort_of(ctx, ty)?,
            MemKey::Elements { elem, .. } => Sort::array(ctx, &Sort::int(ctx), &sort_of(ctx, elem)?),
            MemKey::Length { .. } => Sort::int(ctx),
        };
        Ok(ast::Array::new_const(ctx, name, &address, &range))
    }

    fn initial<'ctx>(&self, ctx: &'ctx Context) -> Result<ast::Array<'ctx>> {
        self.declare(ctx, self.to_string())
    }
}

/// Current version of every memory array touched so far. Untouched arrays are at their
/// initial version.
#[derive(Clone, Default)]
struct Memory<'ctx> {
    arrays: FxHashMap<MemKey, ast::Array<'ctx>>,
}

struct Encoder<'ctx> {
    ctx: &'ctx Context,
    vars: FxHashMap<Term, Sym<'ctx>>,
    bound: FxHashMap<Term, Int<'ctx>>,
    assigned: FxHashSet<Term>,
    memory: Memory<'ctx>,
    guard: Bool<'ctx>,
    assertions: Vec<Bool<'ctx>>,
    path_conditions: FxHashMap<Term, Bool<'ctx>>,
    allocations: FxHashMap<AllocSite, TermType>,
    type_tests: FxHashSet<TermType>,
    binder_depth: usize,
    counter: usize,
    opaque_calls: usize,
}

impl<'ctx> Encoder<'ctx> {
    fn new(ctx: &'ctx Context) -> Self {
        Encoder {
            ctx,
            vars: FxHashMap::default(),
            bound: FxHashMap::default(),
            assigned: FxHashSet::default(),
            memory: Memory::default(),
            guard: Bool::from_bool(ctx, true),
            assertions: Vec::new(),
            path_conditions: FxHashMap::default(),
            allocations: FxHashMap::default(),
            type_tests: FxHashSet::default(),
            binder_depth: 0,
            counter: 0,
            opaque_calls: 0,
        }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}!{}", self.counter)
    }

    fn int(&self, value: i64) -> Int<'ctx> {
        Int::from_i64(self.ctx, value)
    }

    fn assert_guarded(&mut self, fact: &Bool<'ctx>) {
        self.assertions.push(self.guard.implies(fact));
    }

    // State walk

    fn state(&mut self, state: &PredicateState) -> Result<()> {
        for predicate in state.predicates() {
            if let Some(var) = predicate.defined_var() {
                self.assigned.insert(var.clone());
            }
        }
        self.sequence(state)
    }

    fn sequence(&mut self, state: &PredicateState) -> Result<()> {
        for segment in state.segments() {
            match segment {
                Segment::Block(predicates) => {
                    for predicate in predicates {
                        self.predicate(predicate.kind())?;
                    }
                }
                Segment::Choice(branches) => self.choice(branches)?,
            }
        }
        Ok(())
    }

    fn predicate(&mut self, kind: &PredicateKind) -> Result<()> {
        match kind {
            PredicateKind::Assign { lhv, rhv } => {
                let value = self.encode(rhv)?;
                let var = self.var(lhv)?;
                let fact = var.equals(&value)?;
                self.assert_guarded(&fact);
            }
            PredicateKind::Store { target, value } => {
                let value = self.encode(value)?;
                self.store(target, &value)?;
            }
            PredicateKind::Call { lhv, call } => {
                log::debug!("z3: unmodeled call {call}, havocking memory");
                self.opaque_calls += 1;
                if let Some(lhv) = lhv {
                    self.var(lhv)?;
                }
                self.havoc()?;
            }
            PredicateKind::Assume(cond) => {
                let fact = self.encode(cond)?.bool()?;
                self.assert_guarded(&fact);
            }
            PredicateKind::Path(cond) => {
                let fact = self.encode(cond)?.bool()?;
                self.assert_guarded(&fact);
                self.path_conditions.insert(cond.clone(), fact);
            }
        }
        Ok(())
    }

    fn choice(&mut self, branches: &[PredicateState]) -> Result<()> {
        if branches.is_empty() {
            let infeasible = Bool::from_bool(self.ctx, false);
            self.assert_guarded(&infeasible);
            return Ok(());
        }
        let name = self.fresh("choice");
        let selector = Int::new_const(self.ctx, name);
        let count = i64::try_from(branches.len()).unwrap_or(i64::MAX);
        self.assertions.push(Bool::and(
            self.ctx,
            &[&selector.ge(&self.int(0)), &selector.lt(&self.int(count))],
        ));

        let outer_guard = self.guard.clone();
        let outer_memory = self.memory.clone();
        let mut arms = Vec::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            let selected = selector._eq(&self.int(i as i64));
            self.guard = Bool::and(self.ctx, &[&outer_guard, &selected]);
            self.memory = outer_memory.clone();
            self.sequence(branch)?;
            arms.push((selected, std::mem::take(&mut self.memory)));
        }
        self.guard = outer_guard;
        self.memory = self.join(&arms)?;
        Ok(())
    }

    fn join(&self, arms: &[(Bool<'ctx>, Memory<'ctx>)]) -> Result<Memory<'ctx>> {
        let keys: FxHashSet<&MemKey> = arms.iter().flat_map(|(_, m)| m.arrays.keys()).collect();
        let mut joined = Memory::default();
        for key in keys {
            let version = |memory: &Memory<'ctx>| match memory.arrays.get(key) {
                Some(array) => Ok(array.clone()),
                None => key.initial(self.ctx),
            };
            let Some(((_, last), rest)) = arms.split_last() else {
                continue;
            };
            let mut value = version(last)?;
            for (selected, memory) in rest.iter().rev() {
                value = selected.ite(&version(memory)?, &value);
            }
            joined.arrays.insert(key.clone(), value);
        }
        Ok(joined)
    }

    fn havoc(&mut self) -> Result<()> {
        let keys: Vec<MemKey> = self.memory.arrays.keys().cloned().collect();
        for key in keys {
            let name = self.fresh(&format!("{key}#havoc"));
            let array = key.declare(self.ctx, name)?;
            self.memory.arrays.insert(key, array);
        }
        Ok(())
    }

    // Memory

    fn array(&self, key: &MemKey) -> Result<ast::Array<'ctx>> {
        if let Some(array) = self.memory.arrays.get(key) {
            return Ok(array.clone());
        }
        key.initial(self.ctx)
    }

    fn read(&mut self, target: &MemRef) -> Result<Sym<'ctx>> {
        match target {
            MemRef::Field {
                owner,
                field,
                space,
            } => {
                let owner = self.encode(owner)?.int()?;
                let key = MemKey::Field {
                    space: *space,
                    class: field.class.clone(),
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                };
                let value = self.array(&key)?.select(&owner);
                Sym::from_dynamic(&value, &field.ty)
            }
            MemRef::Element {
                array,
                index,
                space,
            } => {
                let elem = element_type(array)?;
                let base = self.encode(array)?.int()?;
                let index = self.encode(index)?.int()?;
                let key = MemKey::Elements {
                    space: *space,
                    elem: elem.clone(),
                };
                let elements = self
                    .array(&key)?
                    .select(&base)
                    .as_array()
                    .ok_or_else(|| malformed_error!("element memory {} is not nested", key))?;
                Sym::from_dynamic(&elements.select(&index), &elem)
            }
        }
    }

    fn store(&mut self, target: &MemRef, value: &Sym<'ctx>) -> Result<()> {
        match target {
            MemRef::Field {
                owner,
                field,
                space,
            } => {
                let owner = self.encode(owner)?.int()?;
                let key = MemKey::Field {
                    space: *space,
                    class: field.class.clone(),
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                };
                let current = self.array(&key)?;
                let updated = current.store(&owner, &value.dynamic());
                self.memory.arrays.insert(key, updated);
            }
            MemRef::Element {
                array,
                index,
                space,
            } => {
                let elem = element_type(array)?;
                let base = self.encode(array)?.int()?;
                let index = self.encode(index)?.int()?;
                let key = MemKey::Elements { space: *space, elem };
                let current = self.array(&key)?;
                let elements = current
                    .select(&base)
                    .as_array()
                    .ok_or_else(|| malformed_error!("element memory {} is not nested", key))?;
                let updated = current.store(&base, &elements.store(&index, &value.dynamic()));
                self.memory.arrays.insert(key, updated);
            }
        }
        Ok(())
    }

    fn length(&mut self, array: &Int<'ctx>, space: MemorySpace) -> Result<Int<'ctx>> {
        let length = self
            .array(&MemKey::Length { space })?
            .select(array)
            .as_int()
            .ok_or_else(|| malformed_error!("length memory holds a non-integer"))?;
        self.assertions.push(length.ge(&self.int(0)));
        Ok(length)
    }

    // Terms

    fn var(&mut self, term: &Term) -> Result<Sym<'ctx>> {
        if let Some(bound) = self.bound.get(term) {
            return Ok(Sym::Int(bound.clone()));
        }
        if let Some(sym) = self.vars.get(term) {
            return Ok(sym.clone());
        }
        let name = term.to_string();
        let ty = term.ty();
        let sym = if ty.is_bool() {
            Sym::Bool(Bool::new_const(self.ctx, name))
        } else {
            sort_of(self.ctx, ty)?;
            Sym::Int(Int::new_const(self.ctx, name))
        };
        if !self.assigned.contains(term) {
            if let (Sym::Int(value), Some(int_type)) = (&sym, ty.as_int()) {
                self.assertions.push(value.ge(&self.int(int_type.min_value())));
                self.assertions.push(value.le(&self.int(int_type.max_value())));
            } else if let Sym::Int(value) = &sym {
                self.assertions.push(value.ge(&self.int(0)));
            }
        }
        self.vars.insert(term.clone(), sym.clone());
        Ok(sym)
    }

    fn encode(&mut self, term: &Term) -> Result<Sym<'ctx>> {
        let ctx = self.ctx;
        Ok(match term.kind() {
            TermKind::Const(literal) => match literal {
                Literal::Bool(b) => Sym::Bool(Bool::from_bool(ctx, *b)),
                Literal::Int(v) => Sym::Int(self.int(*v)),
                Literal::Null => Sym::Int(self.int(0)),
                Literal::Float(_) | Literal::Str(_) => {
                    return Err(Error::Solver(format!("literal {literal} is not encoded")))
                }
            },
            TermKind::Var(_) => self.var(term)?,
            TermKind::Load(target) => self.read(target)?,
            TermKind::ArrayLength { array, space } => {
                let array = self.encode(array)?.int()?;
                Sym::Int(self.length(&array, *space)?)
            }
            TermKind::Binary { op, lhs, rhs } => {
                let lhs = self.encode(lhs)?;
                let rhs = self.encode(rhs)?;
                self.binary(*op, lhs, rhs)?
            }
            TermKind::Cmp { op, lhs, rhs } => {
                let lhs = self.encode(lhs)?;
                let rhs = self.encode(rhs)?;
                Sym::Bool(match op {
                    CmpOp::Eq => lhs.equals(&rhs)?,
                    CmpOp::Ne => lhs.equals(&rhs)?.not(),
                    CmpOp::Lt => lhs.int()?.lt(&rhs.int()?),
                    CmpOp::Le => lhs.int()?.le(&rhs.int()?),
                    CmpOp::Gt => lhs.int()?.gt(&rhs.int()?),
                    CmpOp::Ge => lhs.int()?.ge(&rhs.int()?),
                })
            }
            TermKind::Unary { op, operand } => match (op, self.encode(operand)?) {
                (UnaryOp::Neg, Sym::Int(value)) => Sym::Int(value.unary_minus()),
                (UnaryOp::Not, Sym::Bool(value)) => Sym::Bool(value.not()),
                _ => return Err(Error::Solver(format!("operator in {term} is not encoded"))),
            },
            TermKind::InstanceOf { operand, target } => {
                let value = self.encode(operand)?.int()?;
                let non_null = value._eq(&self.int(0)).not();
                if operand.ty().is_subtype_of(target) {
                    Sym::Bool(non_null)
                } else {
                    self.type_tests.insert(target.clone());
                    let test = type_test(ctx, target).select(&value).as_bool().ok_or_else(|| {
                        malformed_error!("type test of {} holds a non-boolean", target)
                    })?;
                    Sym::Bool(Bool::and(ctx, &[&non_null, &test]))
                }
            }
            TermKind::Cast { operand, target } => {
                let value = self.encode(operand)?;
                match (operand.ty().as_int(), target.as_int()) {
                    (Some(from), Some(to))
                        if to.min_value() > from.min_value() || to.max_value() < from.max_value() =>
                    {
                        return Err(Error::Solver(format!("narrowing cast {term} is not encoded")))
                    }
                    _ => value,
                }
            }
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.encode(cond)?.bool()?;
                match (self.encode(then)?, self.encode(otherwise)?) {
                    (Sym::Bool(a), Sym::Bool(b)) => Sym::Bool(cond.ite(&a, &b)),
                    (Sym::Int(a), Sym::Int(b)) => Sym::Int(cond.ite(&a, &b)),
                    _ => return Err(malformed_error!("ite branches of different sorts in {}", term)),
                }
            }
            TermKind::New { site, length, init } => {
                self.allocate(term, *site, length.as_ref(), init.as_ref())?
            }
            TermKind::ForAll { lo, hi, body } => {
                let lo = self.encode(lo)?.int()?;
                let hi = self.encode(hi)?.int()?;
                let name = self.fresh("q");
                let q = Int::new_const(ctx, name);
                let body = self.apply(body, &q)?.bool()?;
                let range = Bool::and(ctx, &[&lo.le(&q), &q.lt(&hi)]);
                Sym::Bool(ast::forall_const(ctx, &[&q], &[], &range.implies(&body)))
            }
            TermKind::Lambda { .. } => {
                return Err(malformed_error!("lambda {} outside of a binder", term))
            }
            TermKind::Call { .. } | TermKind::Str { .. } => {
                return Err(Error::Solver(format!("{term} is not encoded")))
            }
        })
    }

    fn binary(&self, op: BinaryOp, lhs: Sym<'ctx>, rhs: Sym<'ctx>) -> Result<Sym<'ctx>> {
        let ctx = self.ctx;
        Ok(match (op, lhs, rhs) {
            (BinaryOp::And, Sym::Bool(a), Sym::Bool(b)) => Sym::Bool(Bool::and(ctx, &[&a, &b])),
            (BinaryOp::Or, Sym::Bool(a), Sym::Bool(b)) => Sym::Bool(Bool::or(ctx, &[&a, &b])),
            (BinaryOp::Xor, Sym::Bool(a), Sym::Bool(b)) => Sym::Bool(a.xor(&b)),
            (BinaryOp::Add, Sym::Int(a), Sym::Int(b)) => Sym::Int(Int::add(ctx, &[&a, &b])),
            (BinaryOp::Sub, Sym::Int(a), Sym::Int(b)) => Sym::Int(Int::sub(ctx, &[&a, &b])),
            (BinaryOp::Mul, Sym::Int(a), Sym::Int(b)) => Sym::Int(Int::mul(ctx, &[&a, &b])),
            (BinaryOp::Div, Sym::Int(a), Sym::Int(b)) => Sym::Int(self.truncated_div(&a, &b)),
            (BinaryOp::Rem, Sym::Int(a), Sym::Int(b)) => {
                let quotient = self.truncated_div(&a, &b);
                Sym::Int(Int::sub(ctx, &[&a, &Int::mul(ctx, &[&b, &quotient])]))
            }
            (op, _, _) => {
                return Err(Error::Solver(format!("operator {} is not encoded", op.name())))
            }
        })
    }

    /// Division rounding toward zero.
    fn truncated_div(&self, a: &Int<'ctx>, b: &Int<'ctx>) -> Int<'ctx> {
        let zero = self.int(0);
        let abs = |x: &Int<'ctx>| x.ge(&zero).ite(x, &x.unary_minus());
        let magnitude = abs(a).div(&abs(b));
        let same_sign = a.ge(&zero)._eq(&b.gt(&zero));
        same_sign.ite(&magnitude, &magnitude.unary_minus())
    }

    /// Encodes the body of a one-parameter lambda with its parameter bound to `q`.
    fn apply(&mut self, lambda: &Term, q: &Int<'ctx>) -> Result<Sym<'ctx>> {
        let (params, body) = lambda
            .as_lambda()
            .ok_or_else(|| malformed_error!("expected a lambda, found {}", lambda))?;
        let [param] = params else {
            return Err(malformed_error!("expected one parameter in {}", lambda));
        };
        let shadowed = self.bound.insert(param.clone(), q.clone());
        self.binder_depth += 1;
        let result = self.encode(body);
        self.binder_depth -= 1;
        match shadowed {
            Some(previous) => self.bound.insert(param.clone(), previous),
            None => self.bound.remove(param),
        };
        result
    }

    fn allocate(
        &mut self,
        term: &Term,
        site: AllocSite,
        length: Option<&Term>,
        init: Option<&Term>,
    ) -> Result<Sym<'ctx>> {
        if self.binder_depth > 0 {
            return Err(Error::Solver(format!("allocation {term} inside a quantifier")));
        }
        let address = self.int(allocation_address(site));
        self.allocations.insert(site, term.ty().clone());
        let Some(length) = length else {
            return Ok(Sym::Int(address));
        };

        let elem = element_type(term)?;
        let count = self.encode(length)?.int()?;
        let stored = self.length(&address, MemorySpace::SHARED)?;
        let sized = Bool::and(self.ctx, &[&stored._eq(&count), &count.ge(&self.int(0))]);
        self.assert_guarded(&sized);

        let name = self.fresh("i");
        let q = Int::new_const(self.ctx, name);
        let value = match init {
            Some(init) => self.apply(init, &q)?,
            None if elem.is_bool() => Sym::Bool(Bool::from_bool(self.ctx, false)),
            None => Sym::Int(self.int(0)),
        };
        let key = MemKey::Elements {
            space: MemorySpace::SHARED,
            elem: elem.clone(),
        };
        let elements = self
            .array(&key)?
            .select(&address)
            .as_array()
            .ok_or_else(|| malformed_error!("element memory {} is not nested", key))?;
        let element = Sym::from_dynamic(&elements.select(&q), &elem)?;
        let in_range = Bool::and(self.ctx, &[&self.int(0).le(&q), &q.lt(&count)]);
        let defined = ast::forall_const(self.ctx, &[&q], &[], &in_range.implies(&element.equals(&value)?));
        self.assert_guarded(&defined);
        Ok(Sym::Int(address))
    }

    // Goal and model

    /// Encodes the goal state: sequences are conjunctions, choices disjunctions.
    ///
    /// Conditions already asserted while walking the full state reuse that encoding so
    /// that their memory reads see the right versions. A condition that reads memory
    /// and was not seen is dropped; the full state asserts every path condition it
    /// holds, so the goal only ever narrows it.
    fn goal(&mut self, path: &PredicateState) -> Result<Bool<'ctx>> {
        let mut conjuncts = Vec::new();
        for segment in path.segments() {
            match segment {
                Segment::Block(predicates) => {
                    for predicate in predicates {
                        let Some(cond) = predicate.condition() else {
                            continue;
                        };
                        if let Some(encoded) = self.path_conditions.get(cond) {
                            conjuncts.push(encoded.clone());
                        } else if reads_memory(cond) {
                            log::trace!("z3: goal condition {cond} left to the full state");
                        } else {
                            conjuncts.push(self.encode(cond)?.bool()?);
                        }
                    }
                }
                Segment::Choice(branches) => {
                    let mut disjuncts = Vec::with_capacity(branches.len());
                    for branch in branches {
                        disjuncts.push(self.goal(branch)?);
                    }
                    let refs: Vec<&Bool<'ctx>> = disjuncts.iter().collect();
                    conjuncts.push(Bool::or(self.ctx, &refs));
                }
            }
        }
        let refs: Vec<&Bool<'ctx>> = conjuncts.iter().collect();
        Ok(Bool::and(self.ctx, &refs))
    }

    /// Fixes the type tests of every allocated object.
    fn finish(&mut self) {
        let mut facts = Vec::new();
        for target in &self.type_tests {
            let test = type_test(self.ctx, target);
            for (site, ty) in &self.allocations {
                let address = self.int(allocation_address(*site));
                if let Some(holds) = test.select(&address).as_bool() {
                    let expected = Bool::from_bool(self.ctx, ty.is_subtype_of(target));
                    facts.push(holds._eq(&expected));
                }
            }
        }
        self.assertions.extend(facts);
    }

    fn model(&self, model: &z3::Model<'ctx>) -> Model {
        let mut result = Model::default();
        for (term, sym) in &self.vars {
            let value = match sym {
                Sym::Bool(b) => model.eval(b, true).and_then(|v| v.as_bool()).map(Value::Bool),
                Sym::Int(i) => model
                    .eval(i, true)
                    .and_then(|v| v.as_i64())
                    .map(|v| decode_int(term.ty(), v)),
            };
            if let Some(value) = value {
                result.values.insert(term.to_string(), value);
            }
        }
        result
    }
}

fn element_type(array: &Term) -> Result<TermType> {
    array
        .ty()
        .element()
        .cloned()
        .ok_or_else(|| malformed_error!("{} is not an array", array))
}

fn allocation_address(site: AllocSite) -> i64 {
    -(i64::try_from(site.0).unwrap_or(i64::MAX - 1) + 1)
}

fn type_test<'ctx>(ctx: &'ctx Context, target: &TermType) -> ast::Array<'ctx> {
    ast::Array::new_const(ctx, format!("instanceof {target}"), &Sort::int(ctx), &Sort::bool(ctx))
}

fn reads_memory(term: &Term) -> bool {
    visit::any(term, &mut |t: &Term| {
        matches!(t.kind(), TermKind::Load(_) | TermKind::ArrayLength { .. })
    })
}

/// Decodes an integer of the model. Input objects keep their positive address; allocated
/// objects count down from `u64::MAX`.
fn decode_int(ty: &TermType, value: i64) -> Value {
    if !ty.is_reference() {
        return Value::Int(value);
    }
    match value {
        0 => Value::Null,
        v if v > 0 => Value::Ref(v.unsigned_abs()),
        v => Value::Ref(u64::MAX - (v.unsigned_abs() - 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::StateBuilder, term::TermFactory};

    fn solve(state: &PredicateState, path: &PredicateState) -> SolverResult {
        Z3Solver::default().is_path_possible(state, path)
    }

    #[test]
    fn test_linear_constraints() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let y = tf.var("y", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&y, &tf.mul(&x, &tf.int(2)).unwrap())
            .unwrap()
            .path(&tf.gt(&y, &tf.int(10)).unwrap())
            .unwrap()
            .path(&tf.lt(&x, &tf.int(7)).unwrap())
            .unwrap();
        let state = builder.build();
        let path = state.filter_by_type(crate::state::PredicateTypes::PATH);

        let result = solve(&state, &path);
        assert_eq!(result.model().and_then(|m| m.int("x")), Some(6));
    }

    #[test]
    fn test_memory_versions() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::char_array());
        let first = tf.element(&a, &tf.int(0)).unwrap();
        let read = tf.load(&first);
        let mut builder = StateBuilder::new();
        builder
            .store(&first, &tf.char(7))
            .unwrap()
            .path(&tf.ne(&read, &tf.char(7)).unwrap())
            .unwrap();
        let state = builder.build();
        let path = state.filter_by_type(crate::state::PredicateTypes::PATH);
        assert_eq!(solve(&state, &path), SolverResult::Unsat);
    }

    #[test]
    fn test_string_terms_unknown() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let length = tf.str_op(crate::term::StrOp::Length, &[s]).unwrap();
        let mut builder = StateBuilder::new();
        builder.path(&tf.gt(&length, &tf.int(0)).unwrap()).unwrap();
        let state = builder.build();
        assert!(solve(&state, &state).is_unknown());
    }

    #[test]
    fn test_decode_references() {
        let ty = TermType::string();
        assert_eq!(decode_int(&ty, 0), Value::Null);
        assert_eq!(decode_int(&ty, 3), Value::Ref(3));
        assert_eq!(decode_int(&ty, -1), Value::Ref(u64::MAX));
        assert_eq!(decode_int(&TermType::INT, -1), Value::Int(-1));
    }
}
