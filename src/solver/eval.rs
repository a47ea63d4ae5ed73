//! Concrete evaluation of terms.
//!
//! The [`Evaluator`] computes the value of a term over a [`Machine`]: a variable
//! environment plus a concrete [`Heap`]. Whatever the machine does not know yet (an
//! unbound input variable, a field of an input object, the length or an element of an
//! input array) is requested from an [`Inputs`] implementation and cached in the machine,
//! so later reads of the same cell observe the same value.
//!
//! The bounded solver answers those requests with search choices. [`Closed`] answers none
//! of them and is used to evaluate closed terms, for instance when folding constants.
//!
//! The operator semantics (`binary`, `compare`, `unary`, `convert` and `str_op`) are
//! exposed separately so rewrites can fold literals without building a machine.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    solver::model::{Addr, Heap, HeapObject, Origin, Value},
    term::{
        AllocSite, BinaryOp, CmpOp, FieldRef, IntType, Literal, MemRef, MemorySpace, StrOp, Term,
        TermKind, TermType, UnaryOp,
    },
};

/// Largest quantifier range evaluated element by element.
const MAX_QUANTIFIER_RANGE: i64 = 1 << 16;

/// Largest array length used by a default machine.
const DEFAULT_MAX_ARRAY_LENGTH: i64 = 64;

/// Why an evaluation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A value was needed that nobody could supply.
    #[error("no value for {0}")]
    Unbound(String),

    /// The execution would fail at runtime (null dereference, index out of bounds,
    /// division by zero, failing cast).
    #[error("runtime fault: {0}")]
    Fault(String),

    /// The variable is defined by a predicate that has not been executed yet.
    #[error("{0} is defined later on the path")]
    NotReady(String),

    /// A resource bound was hit.
    #[error("limit reached: {0}")]
    Limit(String),

    /// The term has no concrete semantics (calls, bare lambdas).
    #[error("cannot evaluate {0}")]
    Unsupported(String),
}

/// Result type of evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Variable bindings and heap of one concrete execution.
#[derive(Debug, Clone)]
pub struct Machine {
    /// Values of bound variables.
    pub env: FxHashMap<Term, Value>,
    /// The heap.
    pub heap: Heap,
    /// Object allocated at each site during this execution.
    pub sites: FxHashMap<AllocSite, Addr>,
    /// Allocations of longer arrays stop the execution with [`EvalError::Limit`].
    pub max_array_length: i64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ARRAY_LENGTH)
    }
}

impl Machine {
    /// Creates an empty machine.
    #[must_use]
    pub fn new(max_array_length: i64) -> Self {
        Machine {
            env: FxHashMap::default(),
            heap: Heap::new(),
            sites: FxHashMap::default(),
            max_array_length,
        }
    }

    /// Looks up a live object.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Fault`] for a dangling address.
    pub fn object(&self, addr: Addr) -> EvalResult<&HeapObject> {
        self.heap
            .get(addr)
            .ok_or_else(|| EvalError::Fault(format!("dangling reference #{addr}")))
    }

    /// Looks up a live object mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Fault`] for a dangling address.
    pub fn object_mut(&mut self, addr: Addr) -> EvalResult<&mut HeapObject> {
        self.heap
            .get_mut(addr)
            .ok_or_else(|| EvalError::Fault(format!("dangling reference #{addr}")))
    }
}

/// Supplies values the machine does not know yet.
///
/// Each method is called at most once per variable or cell within one execution; the
/// evaluator caches the answer in the machine.
pub trait Inputs {
    /// Value of an unbound variable.
    ///
    /// # Errors
    ///
    /// Implementations return [`EvalError`]s to stop the execution.
    fn variable(&mut self, machine: &mut Machine, var: &Term) -> EvalResult<Value>;

    /// Initial value of a field of an input object.
    ///
    /// # Errors
    ///
    /// Implementations return [`EvalError`]s to stop the execution.
    fn field(&mut self, machine: &mut Machine, addr: Addr, field: &FieldRef) -> EvalResult<Value>;

    /// Length of an input array.
    ///
    /// # Errors
    ///
    /// Implementations return [`EvalError`]s to stop the execution.
    fn length(&mut self, machine: &mut Machine, addr: Addr) -> EvalResult<i64>;

    /// Initial value of an element of an input array.
    ///
    /// # Errors
    ///
    /// Implementations return [`EvalError`]s to stop the execution.
    fn element(&mut self, machine: &mut Machine, addr: Addr, index: i64) -> EvalResult<Value>;
}

/// Inputs for closed terms: every request fails with [`EvalError::Unbound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Closed;

impl Inputs for Closed {
    fn variable(&mut self, _machine: &mut Machine, var: &Term) -> EvalResult<Value> {
        Err(EvalError::Unbound(var.to_string()))
    }

    fn field(&mut self, _machine: &mut Machine, addr: Addr, field: &FieldRef) -> EvalResult<Value> {
        Err(EvalError::Unbound(format!("#{addr}.{}", field.name)))
    }

    fn length(&mut self, _machine: &mut Machine, addr: Addr) -> EvalResult<i64> {
        Err(EvalError::Unbound(format!("#{addr}.length")))
    }

    fn element(&mut self, _machine: &mut Machine, addr: Addr, index: i64) -> EvalResult<Value> {
        Err(EvalError::Unbound(format!("#{addr}[{index}]")))
    }
}

/// Evaluates terms against a machine.
pub struct Evaluator<'a, I: Inputs + ?Sized> {
    machine: &'a mut Machine,
    inputs: &'a mut I,
}

impl<'a, I: Inputs + ?Sized> Evaluator<'a, I> {
    /// Creates an evaluator.
    pub fn new(machine: &'a mut Machine, inputs: &'a mut I) -> Self {
        Evaluator { machine, inputs }
    }

    /// Evaluates a boolean term.
    ///
    /// # Errors
    ///
    /// See [`Evaluator::eval`]; additionally fails with [`EvalError::Unsupported`] if the
    /// term does not produce a boolean.
    pub fn check(&mut self, cond: &Term) -> EvalResult<bool> {
        self.eval(cond)?
            .as_bool()
            .ok_or_else(|| EvalError::Unsupported(format!("non-boolean condition {cond}")))
    }

    /// Executes `lhv = rhv`.
    ///
    /// # Errors
    ///
    /// See [`Evaluator::eval`].
    pub fn assign(&mut self, lhv: &Term, rhv: &Term) -> EvalResult<()> {
        let value = convert_to(self.eval(rhv)?, lhv.ty());
        self.machine.env.insert(lhv.clone(), value);
        Ok(())
    }

    /// Executes `*target = value`.
    ///
    /// # Errors
    ///
    /// See [`Evaluator::eval`]; stores through null or out of bounds fault.
    pub fn store(&mut self, target: &MemRef, value: &Term) -> EvalResult<()> {
        let value = convert_to(self.eval(value)?, &target.value_type());
        match target {
            MemRef::Field {
                owner,
                field,
                space,
            } => {
                let addr = self.reference(owner)?;
                self.machine
                    .object_mut(addr)?
                    .fields
                    .insert((*space, field.name.clone()), value);
            }
            MemRef::Element {
                array,
                index,
                space,
            } => {
                let addr = self.reference(array)?;
                let index = self.int(index)?;
                self.bounds(addr, index)?;
                let object = self.machine.object_mut(addr)?;
                object.last_space = *space;
                object.elements.insert((*space, index), value);
            }
        }
        Ok(())
    }

    /// Computes the value of `term`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Fault`] when the execution would fail at runtime, and
    /// propagates errors from the [`Inputs`].
    pub fn eval(&mut self, term: &Term) -> EvalResult<Value> {
        match term.kind() {
            TermKind::Const(lit) => Ok(Value::from_literal(lit)),
            TermKind::Var(_) => {
                if let Some(value) = self.machine.env.get(term) {
                    return Ok(value.clone());
                }
                let value = self.inputs.variable(self.machine, term)?;
                self.machine.env.insert(term.clone(), value.clone());
                Ok(value)
            }
            TermKind::Load(target) => self.load(target),
            TermKind::ArrayLength { array, .. } => {
                let addr = self.reference(array)?;
                self.length(addr).map(Value::Int)
            }
            TermKind::Binary { op, lhs, rhs } => {
                if term.ty().is_bool() && matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let left = self.check(lhs)?;
                    if left == (*op == BinaryOp::Or) {
                        return Ok(Value::Bool(left));
                    }
                    return self.check(rhs).map(Value::Bool);
                }
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                binary(*op, term.ty(), &left, &right)
            }
            TermKind::Cmp { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            TermKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, term.ty(), &value)
            }
            TermKind::InstanceOf { operand, target } => {
                let value = self.eval(operand)?;
                self.dynamic_type(&value)
                    .map(|ty| Value::Bool(ty.is_some_and(|ty| ty.is_subtype_of(target))))
            }
            TermKind::Cast { operand, target } => {
                let value = self.eval(operand)?;
                if !target.is_reference() {
                    return convert(&value, target);
                }
                match self.dynamic_type(&value)? {
                    Some(ty) if !ty.is_subtype_of(target) => {
                        Err(EvalError::Fault(format!("{ty} cannot be cast to {target}")))
                    }
                    _ => Ok(value),
                }
            }
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => {
                if self.check(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            TermKind::New { site, length, init } => self.allocate(term, *site, length, init),
            TermKind::Lambda { .. } => Err(EvalError::Unsupported(format!("lambda {term}"))),
            TermKind::ForAll { lo, hi, body } => {
                let lo = self.int(lo)?;
                let hi = self.int(hi)?;
                if hi.saturating_sub(lo) > MAX_QUANTIFIER_RANGE {
                    return Err(EvalError::Limit(format!("quantifier range [{lo}, {hi})")));
                }
                for i in lo..hi {
                    if !self.apply(body, Value::Int(i))?.as_bool().unwrap_or(false) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            TermKind::Call { .. } => Err(EvalError::Unsupported(format!("call {term}"))),
            TermKind::Str { op, args } => {
                if *op == StrOp::FromChars {
                    return self.from_chars(args);
                }
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                str_op(*op, &values)
            }
        }
    }

    /// Evaluates a one-parameter lambda at `arg`.
    fn apply(&mut self, lambda: &Term, arg: Value) -> EvalResult<Value> {
        let (params, body) = lambda
            .as_lambda()
            .ok_or_else(|| EvalError::Unsupported(format!("expected a lambda, found {lambda}")))?;
        let [param] = params else {
            return Err(EvalError::Unsupported(format!("lambda arity of {lambda}")));
        };
        let saved = self.machine.env.insert(param.clone(), arg);
        let result = self.eval(body);
        match saved {
            Some(previous) => self.machine.env.insert(param.clone(), previous),
            None => self.machine.env.remove(param),
        };
        result
    }

    fn int(&mut self, term: &Term) -> EvalResult<i64> {
        self.eval(term)?
            .as_int()
            .ok_or_else(|| EvalError::Unsupported(format!("non-integer operand {term}")))
    }

    fn reference(&mut self, term: &Term) -> EvalResult<Addr> {
        match self.eval(term)? {
            Value::Ref(addr) => Ok(addr),
            Value::Null => Err(EvalError::Fault(format!("null dereference of {term}"))),
            other => Err(EvalError::Unsupported(format!("{term} = {other} is not a heap reference"))),
        }
    }

    fn dynamic_type(&self, value: &Value) -> EvalResult<Option<TermType>> {
        Ok(match value {
            Value::Null => None,
            Value::Ref(addr) => Some(self.machine.object(*addr)?.ty.clone()),
            Value::Str(_) => Some(TermType::string()),
            other => return Err(EvalError::Unsupported(format!("type test on {other}"))),
        })
    }

    fn allocate(
        &mut self,
        term: &Term,
        site: AllocSite,
        length: &Option<Term>,
        init: &Option<Term>,
    ) -> EvalResult<Value> {
        if let Some(addr) = self.machine.sites.get(&site) {
            return Ok(Value::Ref(*addr));
        }
        let Some(length) = length else {
            let object = HeapObject::new(term.ty().clone(), Origin::Allocated(site), None);
            let addr = self.machine.heap.allocate(object);
            self.machine.sites.insert(site, addr);
            return Ok(Value::Ref(addr));
        };

        let length = self.int(length)?;
        if length < 0 {
            return Err(EvalError::Fault(format!("negative array size {length}")));
        }
        if length > self.machine.max_array_length {
            return Err(EvalError::Limit(format!("array of length {length}")));
        }
        let elem = term.ty().element().cloned().unwrap_or(TermType::Void);
        let mut initial = Vec::new();
        for i in 0..length {
            let value = match init {
                Some(init) => convert_to(self.apply(init, Value::Int(i))?, &elem),
                None => Value::default_of(&elem),
            };
            initial.push(value);
        }
        let mut object = HeapObject::new(term.ty().clone(), Origin::Allocated(site), Some(length));
        object.initial = initial;
        let addr = self.machine.heap.allocate(object);
        self.machine.sites.insert(site, addr);
        Ok(Value::Ref(addr))
    }

    fn load(&mut self, target: &MemRef) -> EvalResult<Value> {
        match target {
            MemRef::Field {
                owner,
                field,
                space,
            } => {
                let addr = self.reference(owner)?;
                let key = (*space, field.name.clone());
                let object = self.machine.object(addr)?;
                if let Some(value) = object.fields.get(&key) {
                    return Ok(value.clone());
                }
                let value = if object.is_input() {
                    self.inputs.field(self.machine, addr, field)?
                } else {
                    Value::default_of(&field.ty)
                };
                self.machine
                    .object_mut(addr)?
                    .fields
                    .insert(key, value.clone());
                Ok(value)
            }
            MemRef::Element {
                array,
                index,
                space,
            } => {
                let addr = self.reference(array)?;
                let index = self.int(index)?;
                self.bounds(addr, index)?;
                self.element(addr, index, *space)
            }
        }
    }

    fn element(&mut self, addr: Addr, index: i64, space: MemorySpace) -> EvalResult<Value> {
        let object = self.machine.object_mut(addr)?;
        object.last_space = space;
        if let Some(value) = object.elements.get(&(space, index)) {
            return Ok(value.clone());
        }
        let value = if object.is_input() {
            self.inputs.element(self.machine, addr, index)?
        } else {
            let elem = object.ty.element().cloned().unwrap_or(TermType::Void);
            usize::try_from(index)
                .ok()
                .and_then(|i| object.initial.get(i))
                .cloned()
                .unwrap_or_else(|| Value::default_of(&elem))
        };
        self.machine
            .object_mut(addr)?
            .elements
            .insert((space, index), value.clone());
        Ok(value)
    }

    fn length(&mut self, addr: Addr) -> EvalResult<i64> {
        let object = self.machine.object(addr)?;
        if let Some(length) = object.length {
            return Ok(length);
        }
        if !object.is_input() || object.ty.element().is_none() {
            return Err(EvalError::Unsupported(format!("length of non-array #{addr}")));
        }
        let length = self.inputs.length(self.machine, addr)?;
        self.machine.object_mut(addr)?.length = Some(length);
        Ok(length)
    }

    fn bounds(&mut self, addr: Addr, index: i64) -> EvalResult<()> {
        let length = self.length(addr)?;
        if index < 0 || index >= length {
            return Err(EvalError::Fault(format!(
                "index {index} out of bounds for length {length}"
            )));
        }
        Ok(())
    }

    fn from_chars(&mut self, args: &[Term]) -> EvalResult<Value> {
        let [array, offset, count] = args else {
            return Err(EvalError::Unsupported("fromChars arity".to_string()));
        };
        let addr = self.reference(array)?;
        let offset = self.int(offset)?;
        let count = self.int(count)?;
        let length = self.length(addr)?;
        if offset < 0 || count < 0 || offset > length - count {
            return Err(EvalError::Fault(format!(
                "range [{offset}, {offset} + {count}) out of bounds for length {length}"
            )));
        }
        let space = self.machine.object(addr)?.last_space;
        let mut units = Vec::new();
        for index in offset..offset + count {
            units.push(unit(&self.element(addr, index, space)?)?);
        }
        Ok(string(&units))
    }
}

/// Converts a value to the representation of a cell of type `ty`.
fn convert_to(value: Value, ty: &TermType) -> Value {
    match (&value, ty) {
        (Value::Int(_) | Value::Float(_), t) if t.is_numeric() => {
            convert(&value, t).unwrap_or(value)
        }
        _ => value,
    }
}

fn round_to(ty: &TermType, value: f64) -> f64 {
    if *ty == TermType::Float {
        f64::from(value as f32)
    } else {
        value
    }
}

/// Applies a binary operator. `ty` is the result type of the operation.
///
/// # Errors
///
/// Returns [`EvalError::Fault`] on integer division by zero and
/// [`EvalError::Unsupported`] on operands of the wrong kind.
pub fn binary(op: BinaryOp, ty: &TermType, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(*a && *b)),
            BinaryOp::Or => Ok(Value::Bool(*a || *b)),
            BinaryOp::Xor => Ok(Value::Bool(a ^ b)),
            _ => Err(EvalError::Unsupported(format!("{op} on booleans"))),
        },
        (Value::Int(a), Value::Int(b)) => {
            int_binary(op, ty.as_int().unwrap_or(IntType::LONG), *a, *b).map(Value::Int)
        }
        (Value::Float(a), Value::Float(b)) => {
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return Err(EvalError::Unsupported(format!("{op} on floating point"))),
            };
            Ok(Value::Float(round_to(ty, value)))
        }
        _ => Err(EvalError::Unsupported(format!("{lhs} {op} {rhs}"))),
    }
}

fn int_binary(op: BinaryOp, it: IntType, a: i64, b: i64) -> EvalResult<i64> {
    let shift_mask = if it.bits > 32 { 63 } else { 31 };
    let shift = (b & shift_mask) as u32;
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => {
            return Err(EvalError::Fault("division by zero".to_string()))
        }
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem => a.wrapping_rem(b),
        BinaryOp::Shl => a.wrapping_shl(shift),
        BinaryOp::Shr => a.wrapping_shr(shift),
        BinaryOp::Ushr => {
            let width = if it.bits >= 64 {
                u64::MAX
            } else {
                (1u64 << it.bits) - 1
            };
            ((a as u64 & width) >> shift) as i64
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
    };
    Ok(it.wrap(value))
}

/// Applies a comparison.
///
/// Orderings on floating point are false whenever a NaN is involved; `!=` is then true.
///
/// # Errors
///
/// Returns [`EvalError::Unsupported`] for orderings on non-numeric values.
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => match a.partial_cmp(b) {
            Some(ordering) => ordering,
            None => return Ok(op == CmpOp::Ne),
        },
        _ if op.is_equality() => return Ok((lhs == rhs) == (op == CmpOp::Eq)),
        _ => return Err(EvalError::Unsupported(format!("{lhs} {op} {rhs}"))),
    };
    Ok(op.holds(ordering))
}

/// Applies a unary operator. `ty` is the result type of the operation.
///
/// # Errors
///
/// Returns [`EvalError::Unsupported`] on operands of the wrong kind.
pub fn unary(op: UnaryOp, ty: &TermType, value: &Value) -> EvalResult<Value> {
    let it = ty.as_int().unwrap_or(IntType::LONG);
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(it.wrap(v.wrapping_neg()))),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, Value::Int(v)) => Ok(Value::Int(it.wrap(!v))),
        _ => Err(EvalError::Unsupported(format!("{op}{value}"))),
    }
}

/// Converts a primitive value to another primitive type.
///
/// Integer conversions wrap; floating point to integer conversions truncate toward zero
/// and saturate at the bounds of `int` (or `long`), with NaN mapped to zero.
///
/// # Errors
///
/// Returns [`EvalError::Unsupported`] for conversions between unrelated kinds.
pub fn convert(value: &Value, target: &TermType) -> EvalResult<Value> {
    match (value, target) {
        (Value::Int(v), TermType::Int(it)) => Ok(Value::Int(it.wrap(*v))),
        (Value::Int(v), t) if t.is_floating() => Ok(Value::Float(round_to(t, *v as f64))),
        (Value::Float(v), TermType::Int(it)) => {
            let wide = if it.bits >= 64 { IntType::LONG } else { IntType::INT };
            let truncated = (*v as i64).clamp(wide.min_value(), wide.max_value());
            Ok(Value::Int(it.wrap(truncated)))
        }
        (Value::Float(v), t) if t.is_floating() => Ok(Value::Float(round_to(t, *v))),
        (Value::Bool(_), TermType::Bool) => Ok(value.clone()),
        _ => Err(EvalError::Unsupported(format!("conversion of {value} to {target}"))),
    }
}

fn units(value: &Value) -> EvalResult<Vec<u16>> {
    match value {
        Value::Str(s) => Ok(s.encode_utf16().collect()),
        Value::Null => Err(EvalError::Fault("null string".to_string())),
        other => Err(EvalError::Unsupported(format!("{other} is not a string value"))),
    }
}

fn unit(value: &Value) -> EvalResult<u16> {
    value
        .as_int()
        .and_then(|v| u16::try_from(IntType::CHAR.wrap(v)).ok())
        .ok_or_else(|| EvalError::Unsupported(format!("{value} is not a character")))
}

fn string(units: &[u16]) -> Value {
    Value::Str(Arc::from(String::from_utf16_lossy(units)))
}

fn index(value: &Value) -> EvalResult<i64> {
    value
        .as_int()
        .ok_or_else(|| EvalError::Unsupported(format!("{value} is not an index")))
}

fn position(value: i64, units: &[u16]) -> Option<usize> {
    usize::try_from(value).ok().filter(|v| *v <= units.len())
}

/// Applies an atomic string operation to string values.
///
/// [`StrOp::FromChars`] reads the heap and is only available through the [`Evaluator`].
///
/// # Errors
///
/// Returns [`EvalError::Fault`] for null receivers and out-of-range indices, and
/// [`EvalError::Unsupported`] for arguments of the wrong shape.
pub fn str_op(op: StrOp, args: &[Value]) -> EvalResult<Value> {
    if args.len() != op.arity() {
        return Err(EvalError::Unsupported(format!("{op} with {} arguments", args.len())));
    }
    match op {
        StrOp::Length => Ok(Value::Int(units(&args[0])?.len() as i64)),
        StrOp::CharAt => {
            let s = units(&args[0])?;
            let i = index(&args[1])?;
            usize::try_from(i)
                .ok()
                .and_then(|i| s.get(i))
                .map(|c| Value::Int(i64::from(*c)))
                .ok_or_else(|| EvalError::Fault(format!("index {i} out of bounds for length {}", s.len())))
        }
        StrOp::Equals => {
            let s = units(&args[0])?;
            match &args[1] {
                Value::Null => Ok(Value::Bool(false)),
                other => Ok(Value::Bool(s == units(other)?)),
            }
        }
        StrOp::StartsWith => {
            let s = units(&args[0])?;
            let prefix = units(&args[1])?;
            let result = position(index(&args[2])?, &s).is_some_and(|at| s[at..].starts_with(&prefix));
            Ok(Value::Bool(result))
        }
        StrOp::EndsWith => {
            let s = units(&args[0])?;
            let suffix = units(&args[1])?;
            Ok(Value::Bool(s.ends_with(&suffix)))
        }
        StrOp::IndexOf => {
            let s = units(&args[0])?;
            let t = units(&args[1])?;
            let from = index(&args[2])?.max(0);
            let start = usize::try_from(from).unwrap_or(usize::MAX).min(s.len());
            let found = (start..=s.len()).find(|&k| s[k..].starts_with(&t));
            Ok(Value::Int(found.map_or(-1, |k| k as i64)))
        }
        StrOp::Substring => {
            let s = units(&args[0])?;
            let (begin, end) = (index(&args[1])?, index(&args[2])?);
            match (position(begin, &s), position(end, &s)) {
                (Some(b), Some(e)) if b <= e => Ok(string(&s[b..e])),
                _ => Err(EvalError::Fault(format!(
                    "substring [{begin}, {end}) out of bounds for length {}",
                    s.len()
                ))),
            }
        }
        StrOp::Concat => {
            let mut s = units(&args[0])?;
            s.extend(units(&args[1])?);
            Ok(string(&s))
        }
        StrOp::Contains => {
            let s = units(&args[0])?;
            let t = units(&args[1])?;
            Ok(Value::Bool(t.is_empty() || s.windows(t.len()).any(|w| w == t.as_slice())))
        }
        StrOp::Compare => {
            let s = units(&args[0])?;
            let t = units(&args[1])?;
            let diff = s
                .iter()
                .zip(&t)
                .find(|(a, b)| a != b)
                .map_or(s.len() as i64 - t.len() as i64, |(a, b)| {
                    i64::from(*a) - i64::from(*b)
                });
            Ok(Value::Int(diff))
        }
        StrOp::FromChar => Ok(string(&[unit(&args[0])?])),
        StrOp::FromChars => Err(EvalError::Unsupported("fromChars needs a heap".to_string())),
    }
}

/// Folds a pure operation whose operands are all literals.
///
/// Returns `None` when the term is not a pure operation, an operand is not a literal, or
/// the operation would fault at runtime.
#[must_use]
pub fn fold(term: &Term) -> Option<Literal> {
    let pure = match term.kind() {
        TermKind::Binary { .. } | TermKind::Cmp { .. } | TermKind::Unary { .. } => true,
        TermKind::Cast { target, .. } => !target.is_reference(),
        TermKind::Str { op, .. } => *op != StrOp::FromChars,
        _ => false,
    };
    if !pure || !term.children().iter().all(|child| child.is_const()) {
        return None;
    }
    let mut machine = Machine::default();
    let mut inputs = Closed;
    Evaluator::new(&mut machine, &mut inputs)
        .eval(term)
        .ok()?
        .to_literal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{TermFactory, TermType};

    fn eval(term: &Term) -> EvalResult<Value> {
        let mut machine = Machine::default();
        let mut inputs = Closed;
        Evaluator::new(&mut machine, &mut inputs).eval(term)
    }

    /// Answers every request with a fixed integer and counts the requests.
    struct Fixed {
        value: i64,
        requests: usize,
    }

    impl Inputs for Fixed {
        fn variable(&mut self, machine: &mut Machine, var: &Term) -> EvalResult<Value> {
            self.requests += 1;
            if var.ty().is_reference() {
                let object = HeapObject::new(var.ty().clone(), Origin::Input, None);
                return Ok(Value::Ref(machine.heap.allocate(object)));
            }
            Ok(Value::Int(self.value))
        }

        fn field(&mut self, _: &mut Machine, _: Addr, _: &FieldRef) -> EvalResult<Value> {
            self.requests += 1;
            Ok(Value::Int(self.value))
        }

        fn length(&mut self, _: &mut Machine, _: Addr) -> EvalResult<i64> {
            self.requests += 1;
            Ok(2)
        }

        fn element(&mut self, _: &mut Machine, _: Addr, index: i64) -> EvalResult<Value> {
            self.requests += 1;
            Ok(Value::Int(index * 10))
        }
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        let tf = TermFactory::new();
        let max = tf.int(i64::from(i32::MAX));
        let sum = tf.add(&max, &tf.int(1)).unwrap();
        assert_eq!(eval(&sum).unwrap(), Value::Int(i64::from(i32::MIN)));

        let ushr = tf.binary(BinaryOp::Ushr, &tf.int(-1), &tf.int(28)).unwrap();
        assert_eq!(eval(&ushr).unwrap(), Value::Int(0xF));
    }

    #[test]
    fn test_division_by_zero_faults() {
        let tf = TermFactory::new();
        let div = tf.binary(BinaryOp::Div, &tf.int(1), &tf.int(0)).unwrap();
        assert!(matches!(eval(&div), Err(EvalError::Fault(_))));
    }

    #[test]
    fn test_conjunction_short_circuits() {
        let tf = TermFactory::new();
        let div = tf.binary(BinaryOp::Div, &tf.int(1), &tf.int(0)).unwrap();
        let faulty = tf.eq(&div, &tf.int(0)).unwrap();
        let guarded = tf.and(&tf.bool(false), &faulty).unwrap();
        assert_eq!(eval(&guarded).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_forall_empty_range_is_true() {
        let tf = TermFactory::new();
        let body = tf.index_lambda(|_| Ok(tf.bool(false))).unwrap();
        let empty = tf.for_all(&tf.int(3), &tf.int(3), &body).unwrap();
        let inverted = tf.for_all(&tf.int(5), &tf.int(1), &body).unwrap();
        let one = tf.for_all(&tf.int(0), &tf.int(1), &body).unwrap();
        assert_eq!(eval(&empty).unwrap(), Value::Bool(true));
        assert_eq!(eval(&inverted).unwrap(), Value::Bool(true));
        assert_eq!(eval(&one).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_generated_array_contents() {
        let tf = TermFactory::new();
        let array = tf.char_array("hey").unwrap();
        let second = tf.load_element(&array, &tf.int(1)).unwrap();
        let length = tf.length(&array).unwrap();
        assert_eq!(eval(&second).unwrap(), Value::Int(i64::from(b'e')));
        assert_eq!(eval(&length).unwrap(), Value::Int(3));

        let out_of_bounds = tf.load_element(&array, &tf.int(3)).unwrap();
        assert!(matches!(eval(&out_of_bounds), Err(EvalError::Fault(_))));
    }

    #[test]
    fn test_store_then_load() {
        let tf = TermFactory::new();
        let array = tf.new_array(&TermType::INT, &tf.int(2)).unwrap();
        let a = tf.var("a", TermType::array(TermType::INT));
        let target = tf.element(&a, &tf.int(1)).unwrap();

        let mut machine = Machine::default();
        let mut inputs = Closed;
        let mut evaluator = Evaluator::new(&mut machine, &mut inputs);
        evaluator.assign(&a, &array).unwrap();
        evaluator.store(&target, &tf.int(7)).unwrap();
        assert_eq!(evaluator.eval(&tf.load(&target)).unwrap(), Value::Int(7));
        let first = tf.load_element(&a, &tf.int(0)).unwrap();
        assert_eq!(evaluator.eval(&first).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_inputs_are_requested_once() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::array(TermType::INT));
        let first = tf.load_element(&a, &tf.int(1)).unwrap();
        let twice = tf.add(&first, &first).unwrap();

        let mut machine = Machine::default();
        let mut inputs = Fixed {
            value: 0,
            requests: 0,
        };
        let value = Evaluator::new(&mut machine, &mut inputs).eval(&twice).unwrap();
        assert_eq!(value, Value::Int(20));
        // variable, length, element
        assert_eq!(inputs.requests, 3);
    }

    #[test]
    fn test_null_dereference_faults() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::char_array());
        let mut machine = Machine::default();
        machine.env.insert(a.clone(), Value::Null);
        let mut inputs = Closed;
        let result = Evaluator::new(&mut machine, &mut inputs).eval(&tf.length(&a).unwrap());
        assert!(matches!(result, Err(EvalError::Fault(_))));
    }

    #[test]
    fn test_string_operations() {
        let s = |v: &str| Value::Str(Arc::from(v));
        assert_eq!(
            str_op(StrOp::StartsWith, &[s("abc"), s("ab"), Value::Int(0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            str_op(StrOp::StartsWith, &[s("abc"), s("c"), Value::Int(4)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            str_op(StrOp::IndexOf, &[s("abcabc"), s("ca"), Value::Int(0)]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            str_op(StrOp::Substring, &[s("abc"), Value::Int(1), Value::Int(1)]).unwrap(),
            s("")
        );
        assert!(str_op(StrOp::Substring, &[s("abc"), Value::Int(2), Value::Int(1)]).is_err());
        assert_eq!(str_op(StrOp::Compare, &[s("ab"), s("abc")]).unwrap(), Value::Int(-1));
        assert_eq!(str_op(StrOp::Equals, &[s("ab"), Value::Null]).unwrap(), Value::Bool(false));
        assert!(matches!(
            str_op(StrOp::Length, &[Value::Null]),
            Err(EvalError::Fault(_))
        ));
    }

    #[test]
    fn test_fold() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let closed = tf.mul(&tf.int(6), &tf.int(7)).unwrap();
        let open = tf.mul(&x, &tf.int(7)).unwrap();
        let faulty = tf.binary(BinaryOp::Rem, &tf.int(6), &tf.int(0)).unwrap();
        assert_eq!(fold(&closed), Some(Literal::Int(42)));
        assert_eq!(fold(&open), None);
        assert_eq!(fold(&faulty), None);

        let length = tf.str_op(StrOp::Length, &[tf.string("four")]).unwrap();
        assert_eq!(fold(&length), Some(Literal::Int(4)));
    }

    #[test]
    fn test_float_to_int_conversion_saturates() {
        assert_eq!(convert(&Value::Float(1e20), &TermType::INT).unwrap(), Value::Int(i64::from(i32::MAX)));
        assert_eq!(convert(&Value::Float(f64::NAN), &TermType::INT).unwrap(), Value::Int(0));
        assert_eq!(convert(&Value::Float(-2.9), &TermType::INT).unwrap(), Value::Int(-2));
    }
}
