//! Type-checked term construction, interning and session counters.
//!
//! The [`TermFactory`] is the only public way to build terms. Every constructor checks
//! operand types and returns [`Error::TypeMismatch`] (or [`Error::Arity`]) immediately on
//! ill-typed input; nothing is deferred to solving.
//!
//! # Interning
//!
//! Structurally equal terms built through the same factory share one allocation. The
//! cache is a [`DashMap`] so that several threads may build terms through a shared
//! factory. Interning is an optimization only: term equality is structural either way.
//!
//! # Fresh names
//!
//! Generated variables and allocation sites are numbered from per-factory atomic counters.
//! Numbers never repeat within a session, so regenerating the same logical variable twice
//! yields two distinct terms.
//!
//! # Examples
//!
//! ```rust
//! use pathscope::{term::TermType, Session};
//!
//! let session = Session::new();
//! let tf = session.factory();
//!
//! let x = tf.var("x", TermType::INT);
//! let cond = tf.gt(&x, &tf.int(0))?;
//! assert_eq!(cond.to_string(), "(x > 0)");
//!
//! let a = tf.fresh_var("tmp", TermType::INT);
//! let b = tf.fresh_var("tmp", TermType::INT);
//! assert_ne!(a, b);
//! # Ok::<(), pathscope::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::{
    term::{
        visit, AllocSite, BinaryOp, CmpOp, FieldRef, IntType, Literal, MemRef, MemorySpace,
        MethodRef, StrOp, Term, TermKind, TermType, UnaryOp, VarId,
    },
    Error, Result,
};

/// Builds type-checked, interned terms and hands out fresh names.
pub struct TermFactory {
    cache: DashMap<Term, Term, FxBuildHasher>,
    next_var: AtomicU64,
    next_site: AtomicU64,
}

impl Default for TermFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TermFactory {
    /// Creates a factory with empty cache and counters starting at zero.
    #[must_use]
    pub fn new() -> Self {
        TermFactory {
            cache: DashMap::with_hasher(FxBuildHasher),
            next_var: AtomicU64::new(0),
            next_site: AtomicU64::new(0),
        }
    }

    /// Number of distinct terms currently interned.
    #[must_use]
    pub fn interned(&self) -> usize {
        self.cache.len()
    }

    fn intern(&self, kind: TermKind, ty: TermType) -> Term {
        let term = Term::new(kind, ty);
        if let Some(existing) = self.cache.get(&term) {
            return existing.value().clone();
        }
        self.cache.entry(term.clone()).or_insert(term).value().clone()
    }

    // Literals

    /// A literal of the given type. The caller is responsible for the literal matching
    /// the type; integer literals are wrapped to the type's range.
    #[must_use]
    pub fn literal(&self, literal: Literal, ty: TermType) -> Term {
        let literal = match (&literal, &ty) {
            (Literal::Int(v), TermType::Int(it)) => Literal::Int(it.wrap(*v)),
            _ => literal,
        };
        self.intern(TermKind::Const(literal), ty)
    }

    /// Boolean constant.
    #[must_use]
    pub fn bool(&self, value: bool) -> Term {
        self.literal(Literal::Bool(value), TermType::Bool)
    }

    /// 32-bit integer constant.
    #[must_use]
    pub fn int(&self, value: i64) -> Term {
        self.literal(Literal::Int(value), TermType::INT)
    }

    /// 64-bit integer constant.
    #[must_use]
    pub fn long(&self, value: i64) -> Term {
        self.literal(Literal::Int(value), TermType::LONG)
    }

    /// Integer constant of an arbitrary integer type.
    #[must_use]
    pub fn int_of(&self, value: i64, ty: IntType) -> Term {
        self.literal(Literal::Int(value), TermType::Int(ty))
    }

    /// Character constant.
    #[must_use]
    pub fn char(&self, value: u16) -> Term {
        self.literal(Literal::Int(i64::from(value)), TermType::CHAR)
    }

    /// Double precision constant.
    #[must_use]
    pub fn double(&self, value: f64) -> Term {
        self.literal(Literal::float(value), TermType::Double)
    }

    /// Single precision constant.
    #[must_use]
    pub fn float(&self, value: f32) -> Term {
        self.literal(Literal::float(f64::from(value)), TermType::Float)
    }

    /// The null reference.
    #[must_use]
    pub fn null(&self) -> Term {
        self.literal(Literal::Null, TermType::Null)
    }

    /// An atomic string constant (opaque string strategy).
    #[must_use]
    pub fn string(&self, value: &str) -> Term {
        self.literal(Literal::Str(Arc::from(value)), TermType::string())
    }

    /// A zero value of the given type (`false`, `0`, `0.0` or `null`).
    #[must_use]
    pub fn default_value(&self, ty: &TermType) -> Term {
        match ty {
            TermType::Bool => self.bool(false),
            TermType::Int(_) => self.literal(Literal::Int(0), ty.clone()),
            TermType::Float | TermType::Double => self.literal(Literal::float(0.0), ty.clone()),
            _ => self.null(),
        }
    }

    // Variables and sites

    /// A named input variable.
    #[must_use]
    pub fn var(&self, name: &str, ty: TermType) -> Term {
        self.intern(
            TermKind::Var(VarId {
                name: Arc::from(name),
                index: None,
            }),
            ty,
        )
    }

    /// A generated variable that is distinct from every other variable of this session.
    #[must_use]
    pub fn fresh_var(&self, prefix: &str, ty: TermType) -> Term {
        let index = self.next_var.fetch_add(1, Ordering::Relaxed);
        self.intern(
            TermKind::Var(VarId {
                name: Arc::from(prefix),
                index: Some(index),
            }),
            ty,
        )
    }

    /// A fresh allocation site.
    #[must_use]
    pub fn fresh_site(&self) -> AllocSite {
        AllocSite(self.next_site.fetch_add(1, Ordering::Relaxed))
    }

    // Memory

    /// The memory cell `owner.field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `owner` is not a reference to the field's
    /// declaring class (or a subtype of it).
    pub fn field(&self, owner: &Term, field: &FieldRef) -> Result<MemRef> {
        if !owner.ty().is_reference() || owner.ty().element().is_some() {
            return Err(Error::mismatch("field", "object reference", owner.ty()));
        }
        let declaring = TermType::Class(field.class.clone());
        if !owner.ty().is_subtype_of(&declaring) {
            return Err(Error::mismatch("field", declaring.to_string(), owner.ty()));
        }
        Ok(MemRef::Field {
            owner: owner.clone(),
            field: field.clone(),
            space: MemorySpace::SHARED,
        })
    }

    /// The memory cell `array[index]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `array` is not an array or `index` not an integer.
    pub fn element(&self, array: &Term, index: &Term) -> Result<MemRef> {
        if array.ty().element().is_none() {
            return Err(Error::mismatch("element", "array", array.ty()));
        }
        if !index.ty().is_integral() {
            return Err(Error::mismatch("element", "integer index", index.ty()));
        }
        Ok(MemRef::Element {
            array: array.clone(),
            index: index.clone(),
            space: MemorySpace::SHARED,
        })
    }

    /// A read of a memory cell.
    #[must_use]
    pub fn load(&self, target: &MemRef) -> Term {
        let ty = target.value_type();
        self.intern(TermKind::Load(target.clone()), ty)
    }

    /// Shorthand for `load(field(owner, field))`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::field`].
    pub fn load_field(&self, owner: &Term, field: &FieldRef) -> Result<Term> {
        Ok(self.load(&self.field(owner, field)?))
    }

    /// Shorthand for `load(element(array, index))`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::element`].
    pub fn load_element(&self, array: &Term, index: &Term) -> Result<Term> {
        Ok(self.load(&self.element(array, index)?))
    }

    /// The length of an array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `array` is not an array.
    pub fn length(&self, array: &Term) -> Result<Term> {
        if array.ty().element().is_none() {
            return Err(Error::mismatch("length", "array", array.ty()));
        }
        Ok(self.intern(
            TermKind::ArrayLength {
                array: array.clone(),
                space: MemorySpace::SHARED,
            },
            TermType::INT,
        ))
    }

    // Operations

    /// A binary operation.
    ///
    /// Arithmetic operators take two integers or two floating point operands, shifts take
    /// two integers, and `and`/`or`/`xor` take two booleans or two integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] on incompatible operands.
    pub fn binary(&self, op: BinaryOp, lhs: &Term, rhs: &Term) -> Result<Term> {
        let (lt, rt) = (lhs.ty(), rhs.ty());
        let ty = if op.is_shift() {
            if !lt.is_integral() {
                return Err(Error::mismatch(op.name(), "integer", lt));
            }
            if !rt.is_integral() {
                return Err(Error::mismatch(op.name(), "integer", rt));
            }
            lt.clone()
        } else if op.is_logical() && lt.is_bool() {
            if !rt.is_bool() {
                return Err(Error::mismatch(op.name(), "bool", rt));
            }
            TermType::Bool
        } else if op.is_logical() {
            if !lt.is_integral() {
                return Err(Error::mismatch(op.name(), "bool or integer", lt));
            }
            if !rt.is_integral() {
                return Err(Error::mismatch(op.name(), "integer", rt));
            }
            lt.widen(rt)
        } else {
            if !lt.is_numeric() {
                return Err(Error::mismatch(op.name(), "number", lt));
            }
            if lt.is_integral() != rt.is_integral() || !rt.is_numeric() {
                return Err(Error::mismatch(op.name(), lt.to_string(), rt));
            }
            lt.widen(rt)
        };
        Ok(self.intern(
            TermKind::Binary {
                op,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            ty,
        ))
    }

    /// `lhs + rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn add(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn sub(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn mul(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// Boolean conjunction.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn and(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    /// Boolean disjunction.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn or(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    /// Conjunction of all terms, `true` when empty.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::binary`].
    pub fn and_all<'a, I>(&self, terms: I) -> Result<Term>
    where
        I: IntoIterator<Item = &'a Term>,
    {
        let mut acc: Option<Term> = None;
        for term in terms {
            acc = Some(match acc {
                None => {
                    if !term.ty().is_bool() {
                        return Err(Error::mismatch("and", "bool", term.ty()));
                    }
                    term.clone()
                }
                Some(prev) => self.and(&prev, term)?,
            });
        }
        Ok(acc.unwrap_or_else(|| self.bool(true)))
    }

    /// A comparison.
    ///
    /// Equality is defined on comparable types (integers of any width, floating point,
    /// booleans, related references). Orderings require two numbers of one kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] on incompatible operands.
    pub fn cmp(&self, op: CmpOp, lhs: &Term, rhs: &Term) -> Result<Term> {
        let (lt, rt) = (lhs.ty(), rhs.ty());
        if op.is_equality() {
            if !lt.is_comparable_with(rt) {
                return Err(Error::mismatch(op.name(), lt.to_string(), rt));
            }
        } else {
            if !lt.is_numeric() {
                return Err(Error::mismatch(op.name(), "number", lt));
            }
            if lt.is_integral() != rt.is_integral() || !rt.is_numeric() {
                return Err(Error::mismatch(op.name(), lt.to_string(), rt));
            }
        }
        Ok(self.intern(
            TermKind::Cmp {
                op,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            TermType::Bool,
        ))
    }

    /// `lhs == rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn eq(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Eq, lhs, rhs)
    }

    /// `lhs != rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn ne(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Ne, lhs, rhs)
    }

    /// `lhs < rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn lt(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Lt, lhs, rhs)
    }

    /// `lhs <= rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn le(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Le, lhs, rhs)
    }

    /// `lhs > rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn gt(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Gt, lhs, rhs)
    }

    /// `lhs >= rhs`.
    ///
    /// # Errors
    ///
    /// See [`TermFactory::cmp`].
    pub fn ge(&self, lhs: &Term, rhs: &Term) -> Result<Term> {
        self.cmp(CmpOp::Ge, lhs, rhs)
    }

    /// Logical (booleans) or bitwise (integers) complement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for other operand types.
    pub fn not(&self, operand: &Term) -> Result<Term> {
        if !operand.ty().is_bool() && !operand.ty().is_integral() {
            return Err(Error::mismatch("not", "bool or integer", operand.ty()));
        }
        Ok(self.intern(
            TermKind::Unary {
                op: UnaryOp::Not,
                operand: operand.clone(),
            },
            operand.ty().clone(),
        ))
    }

    /// Arithmetic negation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for non-numeric operands.
    pub fn neg(&self, operand: &Term) -> Result<Term> {
        if !operand.ty().is_numeric() {
            return Err(Error::mismatch("neg", "number", operand.ty()));
        }
        Ok(self.intern(
            TermKind::Unary {
                op: UnaryOp::Neg,
                operand: operand.clone(),
            },
            operand.ty().clone(),
        ))
    }

    /// Dynamic type test `operand instanceof target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are reference types.
    pub fn instance_of(&self, operand: &Term, target: &TermType) -> Result<Term> {
        if !operand.ty().is_reference() {
            return Err(Error::mismatch("instanceof", "reference", operand.ty()));
        }
        if !target.is_reference() || *target == TermType::Null {
            return Err(Error::mismatch("instanceof", "class or array type", target));
        }
        Ok(self.intern(
            TermKind::InstanceOf {
                operand: operand.clone(),
                target: target.clone(),
            },
            TermType::Bool,
        ))
    }

    /// Checked cast. Reference casts keep the reference; numeric casts convert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] when casting between reference and primitive types.
    pub fn cast(&self, operand: &Term, target: &TermType) -> Result<Term> {
        let from = operand.ty();
        let valid = (from.is_reference() && target.is_reference())
            || (from.is_numeric() && target.is_numeric())
            || (from.is_bool() && target.is_bool());
        if !valid {
            return Err(Error::mismatch("cast", target.to_string(), from));
        }
        if from == target {
            return Ok(operand.clone());
        }
        Ok(self.intern(
            TermKind::Cast {
                operand: operand.clone(),
                target: target.clone(),
            },
            target.clone(),
        ))
    }

    /// `ite(cond, then, otherwise)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `cond` is not boolean or the branches have
    /// incompatible types.
    pub fn ite(&self, cond: &Term, then: &Term, otherwise: &Term) -> Result<Term> {
        if !cond.ty().is_bool() {
            return Err(Error::mismatch("ite", "bool", cond.ty()));
        }
        let (tt, ot) = (then.ty(), otherwise.ty());
        if !tt.is_comparable_with(ot) {
            return Err(Error::mismatch("ite", tt.to_string(), ot));
        }
        let ty = match (tt, ot) {
            (TermType::Null, other) => other.clone(),
            (a, b) if a.is_reference() && b.is_subtype_of(a) => a.clone(),
            (a, b) if a.is_reference() => b.clone(),
            (a, b) => a.widen(b),
        };
        Ok(self.intern(
            TermKind::Ite {
                cond: cond.clone(),
                then: then.clone(),
                otherwise: otherwise.clone(),
            },
            ty,
        ))
    }

    // Binders

    /// A lambda over the given parameters. The lambda has the type of its body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] if a parameter is not a variable.
    pub fn lambda(&self, params: &[Term], body: &Term) -> Result<Term> {
        if let Some(bad) = params.iter().find(|p| !p.is_var()) {
            return Err(Error::InvalidTerm(format!(
                "lambda parameter must be a variable, found {bad}"
            )));
        }
        Ok(self.intern(
            TermKind::Lambda {
                params: params.to_vec(),
                body: body.clone(),
            },
            body.ty().clone(),
        ))
    }

    /// Builds `\(i) -> body(i)` with a fresh integer parameter.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `body`.
    pub fn index_lambda<F>(&self, body: F) -> Result<Term>
    where
        F: FnOnce(&Term) -> Result<Term>,
    {
        let index = self.fresh_var("i", TermType::INT);
        let body = body(&index)?;
        self.lambda(&[index], &body)
    }

    /// Applies a lambda to arguments by substituting them for its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] if `lambda` is not a lambda and [`Error::Arity`] if
    /// the argument count differs from the parameter count.
    pub fn apply(&self, lambda: &Term, args: &[Term]) -> Result<Term> {
        let (params, body) = lambda
            .as_lambda()
            .ok_or_else(|| Error::InvalidTerm(format!("expected a lambda, found {lambda}")))?;
        if params.len() != args.len() {
            return Err(Error::Arity {
                operation: "apply",
                expected: params.len(),
                found: args.len(),
            });
        }
        let mapping: FxHashMap<Term, Term> =
            params.iter().cloned().zip(args.iter().cloned()).collect();
        Ok(visit::substitute(body, &mapping))
    }

    /// `forAll i in [lo, hi): body(i)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for non-integer bounds or a non-boolean body,
    /// [`Error::InvalidTerm`] if `body` is not a lambda and [`Error::Arity`] unless the
    /// lambda has exactly one parameter.
    pub fn for_all(&self, lo: &Term, hi: &Term, body: &Term) -> Result<Term> {
        if !lo.ty().is_integral() {
            return Err(Error::mismatch("forall", "integer", lo.ty()));
        }
        if !hi.ty().is_integral() {
            return Err(Error::mismatch("forall", "integer", hi.ty()));
        }
        let (params, inner) = body
            .as_lambda()
            .ok_or_else(|| Error::InvalidTerm(format!("forall body must be a lambda: {body}")))?;
        if params.len() != 1 {
            return Err(Error::Arity {
                operation: "forall",
                expected: 1,
                found: params.len(),
            });
        }
        if !inner.ty().is_bool() {
            return Err(Error::mismatch("forall", "bool", inner.ty()));
        }
        Ok(self.intern(
            TermKind::ForAll {
                lo: lo.clone(),
                hi: hi.clone(),
                body: body.clone(),
            },
            TermType::Bool,
        ))
    }

    // Calls and allocation

    /// A method invocation `owner.method(args)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] when the argument count does not match the signature and
    /// [`Error::TypeMismatch`] when an argument is not assignable to its parameter.
    pub fn call(&self, owner: &Term, method: &MethodRef, args: &[Term]) -> Result<Term> {
        let params = &method.signature.params;
        if params.len() != args.len() {
            return Err(Error::Arity {
                operation: "call",
                expected: params.len(),
                found: args.len(),
            });
        }
        if !owner.ty().is_reference() {
            return Err(Error::mismatch("call", "receiver reference", owner.ty()));
        }
        for (param, arg) in params.iter().zip(args) {
            if !arg.ty().is_assignable_to(param) {
                return Err(Error::mismatch("call", param.to_string(), arg.ty()));
            }
        }
        Ok(self.intern(
            TermKind::Call {
                owner: owner.clone(),
                method: method.clone(),
                args: args.to_vec(),
            },
            method.signature.ret.clone(),
        ))
    }

    /// A new object of class `ty` at a fresh site.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless `ty` is a class type.
    pub fn new_object(&self, ty: &TermType) -> Result<Term> {
        if ty.class_name().is_none() {
            return Err(Error::mismatch("new", "class type", ty));
        }
        Ok(self.intern(
            TermKind::New {
                site: self.fresh_site(),
                length: None,
                init: None,
            },
            ty.clone(),
        ))
    }

    /// A new array of `length` default-initialized elements at a fresh site.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for a non-integer length or a void element type.
    pub fn new_array(&self, elem: &TermType, length: &Term) -> Result<Term> {
        self.allocate_array(elem, length, None)
    }

    /// A new array of `length` elements where element `i` equals `init(i)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for a non-integer length or an initializer whose
    /// body type is not assignable to `elem`, [`Error::InvalidTerm`] if `init` is not a
    /// lambda and [`Error::Arity`] unless it takes exactly one parameter.
    pub fn generate_array(&self, elem: &TermType, length: &Term, init: &Term) -> Result<Term> {
        let (params, body) = init
            .as_lambda()
            .ok_or_else(|| Error::InvalidTerm(format!("array initializer must be a lambda: {init}")))?;
        if params.len() != 1 {
            return Err(Error::Arity {
                operation: "generate",
                expected: 1,
                found: params.len(),
            });
        }
        if !body.ty().is_assignable_to(elem) {
            return Err(Error::mismatch("generate", elem.to_string(), body.ty()));
        }
        self.allocate_array(elem, length, Some(init.clone()))
    }

    fn allocate_array(&self, elem: &TermType, length: &Term, init: Option<Term>) -> Result<Term> {
        if !length.ty().is_integral() {
            return Err(Error::mismatch("newarray", "integer length", length.ty()));
        }
        if *elem == TermType::Void {
            return Err(Error::mismatch("newarray", "element type", elem));
        }
        Ok(self.intern(
            TermKind::New {
                site: self.fresh_site(),
                length: Some(length.clone()),
                init,
            },
            TermType::array(elem.clone()),
        ))
    }

    /// A generated `char[]` holding the UTF-16 code units of `text`.
    ///
    /// # Errors
    ///
    /// Never fails for valid input; the signature matches the other constructors.
    pub fn char_array(&self, text: &str) -> Result<Term> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let init = self.index_lambda(|i| {
            let mut body = self.char(0);
            for (pos, unit) in units.iter().enumerate().rev() {
                let at = self.eq(i, &self.int(pos as i64))?;
                body = self.ite(&at, &self.char(*unit), &body)?;
            }
            Ok(body)
        })?;
        self.generate_array(&TermType::CHAR, &self.int(units.len() as i64), &init)
    }

    /// An atomic string operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] or [`Error::TypeMismatch`] if the arguments do not match the
    /// shape documented on [`StrOp`].
    pub fn str_op(&self, op: StrOp, args: &[Term]) -> Result<Term> {
        if args.len() != op.arity() {
            return Err(Error::Arity {
                operation: "str",
                expected: op.arity(),
                found: args.len(),
            });
        }
        let string = TermType::string();
        let expect_string = |t: &Term| {
            if t.ty().is_subtype_of(&TermType::char_sequence()) || *t.ty() == TermType::Null {
                Ok(())
            } else {
                Err(Error::mismatch("str", "string", t.ty()))
            }
        };
        let expect_int = |t: &Term| {
            if t.ty().is_integral() {
                Ok(())
            } else {
                Err(Error::mismatch("str", "integer", t.ty()))
            }
        };
        let ty = match op {
            StrOp::Length => {
                expect_string(&args[0])?;
                TermType::INT
            }
            StrOp::CharAt => {
                expect_string(&args[0])?;
                expect_int(&args[1])?;
                TermType::CHAR
            }
            StrOp::Equals | StrOp::EndsWith | StrOp::Contains => {
                expect_string(&args[0])?;
                expect_string(&args[1])?;
                TermType::Bool
            }
            StrOp::Compare => {
                expect_string(&args[0])?;
                expect_string(&args[1])?;
                TermType::INT
            }
            StrOp::StartsWith => {
                expect_string(&args[0])?;
                expect_string(&args[1])?;
                expect_int(&args[2])?;
                TermType::Bool
            }
            StrOp::IndexOf => {
                expect_string(&args[0])?;
                expect_string(&args[1])?;
                expect_int(&args[2])?;
                TermType::INT
            }
            StrOp::Substring => {
                expect_string(&args[0])?;
                expect_int(&args[1])?;
                expect_int(&args[2])?;
                string
            }
            StrOp::Concat => {
                expect_string(&args[0])?;
                expect_string(&args[1])?;
                string
            }
            StrOp::FromChars => {
                if *args[0].ty() != TermType::char_array() {
                    return Err(Error::mismatch("str", "char[]", args[0].ty()));
                }
                expect_int(&args[1])?;
                expect_int(&args[2])?;
                string
            }
            StrOp::FromChar => {
                expect_int(&args[0])?;
                string
            }
        };
        Ok(self.intern(
            TermKind::Str {
                op,
                args: args.to_vec(),
            },
            ty,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::MethodSignature;

    #[test]
    fn test_interning_shares_allocation() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let a = tf.add(&x, &tf.int(1)).unwrap();
        let b = tf.add(&tf.var("x", TermType::INT), &tf.int(1)).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_fresh_vars_distinct() {
        let tf = TermFactory::new();
        let a = tf.fresh_var("v", TermType::INT);
        let b = tf.fresh_var("v", TermType::INT);
        assert_ne!(a, b);
        assert_ne!(tf.fresh_site(), tf.fresh_site());
    }

    #[test]
    fn test_type_mismatch_is_immediate() {
        let tf = TermFactory::new();
        let flag = tf.bool(true);
        let x = tf.var("x", TermType::INT);
        assert!(matches!(
            tf.add(&flag, &x),
            Err(Error::TypeMismatch { operation: "add", .. })
        ));
        assert!(tf.lt(&flag, &x).is_err());
        assert!(tf.eq(&tf.var("s", TermType::string()), &x).is_err());
        assert!(tf.ite(&x, &x, &x).is_err());
        assert!(tf.length(&x).is_err());
    }

    #[test]
    fn test_field_owner_must_declare_field() {
        let tf = TermFactory::new();
        let value = FieldRef::new(crate::term::STRING_CLASS, "value", TermType::char_array());
        let s = tf.var("s", TermType::string());
        let o = tf.var("o", TermType::object());
        let seq = tf.var("cs", TermType::class(crate::term::CHAR_SEQUENCE_CLASS));

        assert!(tf.field(&s, &value).is_ok());
        assert!(tf.field(&tf.null(), &value).is_ok());
        assert!(matches!(
            tf.field(&o, &value),
            Err(Error::TypeMismatch { operation: "field", .. })
        ));
        assert!(tf.load_field(&seq, &value).is_err());
        let cast = tf.cast(&o, &TermType::string()).unwrap();
        assert!(tf.field(&cast, &value).is_ok());
    }

    #[test]
    fn test_int_literals_wrap() {
        let tf = TermFactory::new();
        assert_eq!(tf.char(0x41).as_int_const(), Some(0x41));
        assert_eq!(
            tf.int(i64::from(i32::MAX) + 1).as_int_const(),
            Some(i64::from(i32::MIN))
        );
    }

    #[test]
    fn test_for_all_requires_unary_bool_lambda() {
        let tf = TermFactory::new();
        let i = tf.fresh_var("i", TermType::INT);
        let j = tf.fresh_var("j", TermType::INT);
        let body = tf.ge(&i, &tf.int(0)).unwrap();
        let unary = tf.lambda(&[i.clone()], &body).unwrap();
        let binary = tf.lambda(&[i.clone(), j], &body).unwrap();

        assert!(tf.for_all(&tf.int(0), &tf.int(3), &unary).is_ok());
        assert!(matches!(
            tf.for_all(&tf.int(0), &tf.int(3), &binary),
            Err(Error::Arity { .. })
        ));
        assert!(matches!(
            tf.for_all(&tf.int(0), &tf.int(3), &body),
            Err(Error::InvalidTerm(_))
        ));
    }

    #[test]
    fn test_apply_substitutes_parameters() {
        let tf = TermFactory::new();
        let lambda = tf.index_lambda(|i| tf.add(i, &tf.int(1))).unwrap();
        let applied = tf.apply(&lambda, &[tf.int(4)]).unwrap();
        assert_eq!(applied.to_string(), "(4 + 1)");
        assert!(matches!(tf.apply(&lambda, &[]), Err(Error::Arity { .. })));
    }

    #[test]
    fn test_call_arity() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let char_at = MethodRef::new(
            crate::term::STRING_CLASS,
            MethodSignature::new("charAt", vec![TermType::INT], TermType::CHAR),
        );
        assert_eq!(*tf.call(&s, &char_at, &[tf.int(0)]).unwrap().ty(), TermType::CHAR);
        assert!(matches!(
            tf.call(&s, &char_at, &[]),
            Err(Error::Arity { operation: "call", .. })
        ));
    }

    #[test]
    fn test_char_array_shape() {
        let tf = TermFactory::new();
        let chars = tf.char_array("ab").unwrap();
        assert_eq!(*chars.ty(), TermType::char_array());
        match chars.kind() {
            TermKind::New {
                length: Some(len),
                init: Some(_),
                ..
            } => assert_eq!(len.as_int_const(), Some(2)),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_str_op_shapes() {
        let tf = TermFactory::new();
        let s = tf.string("abc");
        assert_eq!(*tf.str_op(StrOp::Length, &[s.clone()]).unwrap().ty(), TermType::INT);
        assert!(tf.str_op(StrOp::Length, &[]).is_err());
        assert!(tf.str_op(StrOp::CharAt, &[s.clone(), s]).is_err());
    }
}
