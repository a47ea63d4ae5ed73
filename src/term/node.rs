//! The term representation.
//!
//! A [`Term`] is an immutable, reference-counted node in a term DAG. Identity is
//! structural: two terms compare and hash equal whenever their kinds and types are equal,
//! regardless of whether they share an allocation. Each node caches its hash at
//! construction time, so hashing a term is O(1) and structural comparison only descends
//! into nodes whose hashes already agree.
//!
//! Terms are constructed through [`TermFactory`](crate::term::TermFactory), which performs
//! type checking and interning. Rewrite passes rebuild terms through
//! [`Term::with_kind`], which keeps the (already checked) type of the node being replaced.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use rustc_hash::FxHasher;

use crate::term::{BinaryOp, CmpOp, Literal, StrOp, TermType, UnaryOp};

/// Identity of a symbolic variable.
///
/// Named variables (`index == None`) are inputs such as method arguments; generated
/// variables carry a session-unique index and are produced by
/// [`TermFactory::fresh_var`](crate::term::TermFactory::fresh_var).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId {
    /// Human readable name or prefix.
    pub name: Arc<str>,
    /// Session-unique counter value for generated variables.
    pub index: Option<u64>,
}

impl VarId {
    /// Returns `true` for variables produced by the fresh-name generator.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.index.is_some()
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "%{}{}", self.name, index),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A memory region discriminator assigned by the memory spacer.
///
/// Accesses in different spaces never alias. Before spacing every access lives in
/// [`MemorySpace::SHARED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MemorySpace(pub u32);

impl MemorySpace {
    /// The space every access starts in.
    pub const SHARED: MemorySpace = MemorySpace(0);
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// An allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocSite(pub u64);

impl fmt::Display for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site{}", self.0)
    }
}

/// A field of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    /// Declaring class.
    pub class: Arc<str>,
    /// Field name.
    pub name: Arc<str>,
    /// Declared type of the field.
    pub ty: TermType,
}

impl FieldRef {
    /// Creates a field reference.
    #[must_use]
    pub fn new(class: &str, name: &str, ty: TermType) -> Self {
        Self {
            class: Arc::from(class),
            name: Arc::from(name),
            ty,
        }
    }
}

/// The signature of a method: name, parameter types and return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSignature {
    /// Method name (`<init>` for constructors).
    pub name: Arc<str>,
    /// Declared parameter types, excluding the receiver.
    pub params: Vec<TermType>,
    /// Declared return type.
    pub ret: TermType,
}

impl MethodSignature {
    /// Creates a method signature.
    #[must_use]
    pub fn new(name: &str, params: Vec<TermType>, ret: TermType) -> Self {
        Self {
            name: Arc::from(name),
            params,
            ret,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, "): {}", self.ret)
    }
}

/// A method of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Declaring class.
    pub class: Arc<str>,
    /// Signature.
    pub signature: MethodSignature,
}

impl MethodRef {
    /// Creates a method reference.
    #[must_use]
    pub fn new(class: &str, signature: MethodSignature) -> Self {
        Self {
            class: Arc::from(class),
            signature,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.signature)
    }
}

/// A readable and writable memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemRef {
    /// Instance field `owner.field`.
    Field {
        /// Object whose field is accessed.
        owner: Term,
        /// The field.
        field: FieldRef,
        /// Region of the access.
        space: MemorySpace,
    },
    /// Array element `array[index]`.
    Element {
        /// Array being accessed.
        array: Term,
        /// Element index.
        index: Term,
        /// Region of the access.
        space: MemorySpace,
    },
}

impl MemRef {
    /// The reference whose memory is accessed.
    #[must_use]
    pub fn base(&self) -> &Term {
        match self {
            MemRef::Field { owner, .. } => owner,
            MemRef::Element { array, .. } => array,
        }
    }

    /// The region of the access.
    #[must_use]
    pub fn space(&self) -> MemorySpace {
        match self {
            MemRef::Field { space, .. } | MemRef::Element { space, .. } => *space,
        }
    }

    /// Returns the same access in another region.
    #[must_use]
    pub fn with_space(&self, space: MemorySpace) -> MemRef {
        match self {
            MemRef::Field { owner, field, .. } => MemRef::Field {
                owner: owner.clone(),
                field: field.clone(),
                space,
            },
            MemRef::Element { array, index, .. } => MemRef::Element {
                array: array.clone(),
                index: index.clone(),
                space,
            },
        }
    }

    /// Type of the value stored in the cell.
    #[must_use]
    pub fn value_type(&self) -> TermType {
        match self {
            MemRef::Field { field, .. } => field.ty.clone(),
            MemRef::Element { array, .. } => {
                array.ty().element().cloned().unwrap_or(TermType::Void)
            }
        }
    }

    /// Rebuilds the access with its operand terms mapped through `f`.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `f`.
    pub fn try_map<F>(&self, mut f: F) -> crate::Result<MemRef>
    where
        F: FnMut(&Term) -> crate::Result<Term>,
    {
        Ok(match self {
            MemRef::Field {
                owner,
                field,
                space,
            } => MemRef::Field {
                owner: f(owner)?,
                field: field.clone(),
                space: *space,
            },
            MemRef::Element {
                array,
                index,
                space,
            } => MemRef::Element {
                array: f(array)?,
                index: f(index)?,
                space: *space,
            },
        })
    }
}

impl fmt::Display for MemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemRef::Field {
                owner,
                field,
                space,
            } => {
                write!(f, "{}.{}", owner, field.name)?;
                if *space != MemorySpace::SHARED {
                    write!(f, "{space}")?;
                }
                Ok(())
            }
            MemRef::Element {
                array,
                index,
                space,
            } => {
                write!(f, "{array}[{index}]")?;
                if *space != MemorySpace::SHARED {
                    write!(f, "{space}")?;
                }
                Ok(())
            }
        }
    }
}

/// The shape of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKind {
    /// Literal constant.
    Const(Literal),
    /// Symbolic variable.
    Var(VarId),
    /// Read of a field or array element.
    Load(MemRef),
    /// Length of an array.
    ArrayLength {
        /// The array.
        array: Term,
        /// Region of the access.
        space: MemorySpace,
    },
    /// Binary arithmetic, bitwise or logical operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Term,
        /// Right operand.
        rhs: Term,
    },
    /// Comparison.
    Cmp {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: Term,
        /// Right operand.
        rhs: Term,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Term,
    },
    /// Dynamic type test.
    InstanceOf {
        /// Tested reference.
        operand: Term,
        /// Type tested against.
        target: TermType,
    },
    /// Checked cast.
    Cast {
        /// Cast operand.
        operand: Term,
        /// Target type.
        target: TermType,
    },
    /// If-then-else.
    Ite {
        /// Boolean condition.
        cond: Term,
        /// Value when the condition holds.
        then: Term,
        /// Value otherwise.
        otherwise: Term,
    },
    /// Allocation of an object, an array, or a generated array.
    New {
        /// Allocation site.
        site: AllocSite,
        /// Array length, `None` for objects.
        length: Option<Term>,
        /// Element generator `\(i) -> a[i]` for generated arrays.
        init: Option<Term>,
    },
    /// Parameterized term used as the body of quantifiers and generators.
    Lambda {
        /// Bound variables.
        params: Vec<Term>,
        /// Body.
        body: Term,
    },
    /// `forAll i in [lo, hi): body(i)`; vacuously true on an empty range.
    ForAll {
        /// Inclusive lower bound.
        lo: Term,
        /// Exclusive upper bound.
        hi: Term,
        /// Boolean lambda of one integer parameter.
        body: Term,
    },
    /// Method invocation on a receiver.
    Call {
        /// Receiver.
        owner: Term,
        /// Invoked method.
        method: MethodRef,
        /// Arguments in declaration order.
        args: Vec<Term>,
    },
    /// Atomic string operation (opaque string strategy).
    Str {
        /// Operation.
        op: StrOp,
        /// Arguments, see [`StrOp`] for the shape.
        args: Vec<Term>,
    },
}

impl TermKind {
    /// Returns references to the direct operands of this term.
    ///
    /// Lambda parameters are binders and are not reported.
    #[must_use]
    pub fn children(&self) -> Vec<&Term> {
        match self {
            TermKind::Const(_) | TermKind::Var(_) => Vec::new(),
            TermKind::Load(MemRef::Field { owner, .. }) => vec![owner],
            TermKind::Load(MemRef::Element { array, index, .. }) => vec![array, index],
            TermKind::ArrayLength { array, .. } => vec![array],
            TermKind::Binary { lhs, rhs, .. } | TermKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            TermKind::Unary { operand, .. }
            | TermKind::InstanceOf { operand, .. }
            | TermKind::Cast { operand, .. } => vec![operand],
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
            TermKind::New { length, init, .. } => length.iter().chain(init.iter()).collect(),
            TermKind::Lambda { body, .. } => vec![body],
            TermKind::ForAll { lo, hi, body } => vec![lo, hi, body],
            TermKind::Call { owner, args, .. } => std::iter::once(owner).chain(args).collect(),
            TermKind::Str { args, .. } => args.iter().collect(),
        }
    }

    /// Rebuilds this kind with every direct operand mapped through `f`.
    ///
    /// Lambda parameters are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `f`.
    pub fn try_map_children<F>(&self, mut f: F) -> crate::Result<TermKind>
    where
        F: FnMut(&Term) -> crate::Result<Term>,
    {
        Ok(match self {
            TermKind::Const(_) | TermKind::Var(_) => self.clone(),
            TermKind::Load(mem) => TermKind::Load(mem.try_map(&mut f)?),
            TermKind::ArrayLength { array, space } => TermKind::ArrayLength {
                array: f(array)?,
                space: *space,
            },
            TermKind::Binary { op, lhs, rhs } => TermKind::Binary {
                op: *op,
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            TermKind::Cmp { op, lhs, rhs } => TermKind::Cmp {
                op: *op,
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            TermKind::Unary { op, operand } => TermKind::Unary {
                op: *op,
                operand: f(operand)?,
            },
            TermKind::InstanceOf { operand, target } => TermKind::InstanceOf {
                operand: f(operand)?,
                target: target.clone(),
            },
            TermKind::Cast { operand, target } => TermKind::Cast {
                operand: f(operand)?,
                target: target.clone(),
            },
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => TermKind::Ite {
                cond: f(cond)?,
                then: f(then)?,
                otherwise: f(otherwise)?,
            },
            TermKind::New { site, length, init } => TermKind::New {
                site: *site,
                length: length.as_ref().map(&mut f).transpose()?,
                init: init.as_ref().map(&mut f).transpose()?,
            },
            TermKind::Lambda { params, body } => TermKind::Lambda {
                params: params.clone(),
                body: f(body)?,
            },
            TermKind::ForAll { lo, hi, body } => TermKind::ForAll {
                lo: f(lo)?,
                hi: f(hi)?,
                body: f(body)?,
            },
            TermKind::Call {
                owner,
                method,
                args,
            } => TermKind::Call {
                owner: f(owner)?,
                method: method.clone(),
                args: args.iter().map(&mut f).collect::<crate::Result<_>>()?,
            },
            TermKind::Str { op, args } => TermKind::Str {
                op: *op,
                args: args.iter().map(&mut f).collect::<crate::Result<_>>()?,
            },
        })
    }
}

struct TermNode {
    kind: TermKind,
    ty: TermType,
    hash: u64,
}

/// An immutable symbolic value expression with a static type.
///
/// Cloning a term is a reference-count increment. Terms are `Send + Sync` and may be
/// shared freely between threads once built.
#[derive(Clone)]
pub struct Term(Arc<TermNode>);

impl Term {
    /// Creates a term node without type checking.
    ///
    /// Only the factory and structure-preserving rewrites call this; both guarantee that
    /// `ty` is the correct type for `kind`.
    pub(crate) fn new(kind: TermKind, ty: TermType) -> Self {
        let mut hasher = FxHasher::default();
        kind.hash(&mut hasher);
        ty.hash(&mut hasher);
        let hash = hasher.finish();
        Term(Arc::new(TermNode { kind, ty, hash }))
    }

    /// Returns a term of the same type with a different kind.
    ///
    /// Used by rewrites that replace operands with equivalent ones; the caller guarantees
    /// that the new kind has the same static type. If the kind is unchanged the original
    /// allocation is returned.
    #[must_use]
    pub fn with_kind(&self, kind: TermKind) -> Term {
        if kind == self.0.kind {
            return self.clone();
        }
        Term::new(kind, self.0.ty.clone())
    }

    /// The shape of this term.
    #[must_use]
    pub fn kind(&self) -> &TermKind {
        &self.0.kind
    }

    /// The static type of this term.
    #[must_use]
    pub fn ty(&self) -> &TermType {
        &self.0.ty
    }

    /// Returns `true` if both handles share one allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Term) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the literal, if this is a constant.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.0.kind {
            TermKind::Const(lit) => Some(lit),
            _ => None,
        }
    }

    /// Returns `true` if this is a constant.
    #[must_use]
    pub fn is_const(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Returns the boolean value of a boolean constant.
    #[must_use]
    pub fn as_bool_const(&self) -> Option<bool> {
        self.as_literal().and_then(Literal::as_bool)
    }

    /// Returns the integer value of an integer constant.
    #[must_use]
    pub fn as_int_const(&self) -> Option<i64> {
        self.as_literal().and_then(Literal::as_int)
    }

    /// Returns `true` for the boolean constant `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.as_bool_const() == Some(true)
    }

    /// Returns `true` for the boolean constant `false`.
    #[must_use]
    pub fn is_false(&self) -> bool {
        self.as_bool_const() == Some(false)
    }

    /// Returns the variable identity, if this is a variable.
    #[must_use]
    pub fn as_var(&self) -> Option<&VarId> {
        match &self.0.kind {
            TermKind::Var(id) => Some(id),
            _ => None,
        }
    }

    /// Returns `true` if this is a variable.
    #[must_use]
    pub fn is_var(&self) -> bool {
        self.as_var().is_some()
    }

    /// Returns the lambda parameters and body, if this is a lambda.
    #[must_use]
    pub fn as_lambda(&self) -> Option<(&[Term], &Term)> {
        match &self.0.kind {
            TermKind::Lambda { params, body } => Some((params, body)),
            _ => None,
        }
    }

    /// Direct operands of this term.
    #[must_use]
    pub fn children(&self) -> Vec<&Term> {
        self.0.kind.children()
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash
                && self.0.ty == other.0.ty
                && self.0.kind == other.0.kind)
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        self.0
            .kind
            .cmp(&other.0.kind)
            .then_with(|| self.0.ty.cmp(&other.0.ty))
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}: {}", self.0.ty)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            TermKind::Const(lit) => write!(f, "{lit}"),
            TermKind::Var(id) => write!(f, "{id}"),
            TermKind::Load(mem) => write!(f, "*{mem}"),
            TermKind::ArrayLength { array, space } => {
                write!(f, "{array}.length")?;
                if *space != MemorySpace::SHARED {
                    write!(f, "{space}")?;
                }
                Ok(())
            }
            TermKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            TermKind::Cmp { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            TermKind::Unary { op, operand } => write!(f, "{op}{operand}"),
            TermKind::InstanceOf { operand, target } => {
                write!(f, "({operand} instanceof {target})")
            }
            TermKind::Cast { operand, target } => write!(f, "(({target}) {operand})"),
            TermKind::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "ite({cond}, {then}, {otherwise})"),
            TermKind::New { site, length, init } => {
                match (self.0.ty.element(), length) {
                    (Some(elem), Some(len)) => write!(f, "new {elem}[{len}]")?,
                    _ => write!(f, "new {}", self.0.ty)?,
                }
                if let Some(init) = init {
                    write!(f, " {{{init}}}")?;
                }
                write!(f, " at {site}")
            }
            TermKind::Lambda { params, body } => {
                write!(f, "\\(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {body}")
            }
            TermKind::ForAll { lo, hi, body } => write!(f, "forAll[{lo}, {hi})({body})"),
            TermKind::Call {
                owner,
                method,
                args,
            } => {
                write!(f, "{owner}.{}(", method.signature.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            TermKind::Str { op, args } => {
                write!(f, "{op}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
