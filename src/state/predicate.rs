//! Predicates: the effects and constraints recorded in a predicate state.

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::{
    term::{MemRef, Term, TermKind, TermType},
    Error, Result,
};

/// Source location of a predicate, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Location {
    /// Fully qualified method, if known.
    pub method: Option<Arc<str>>,
    /// Source line, if known.
    pub line: Option<u32>,
}

impl Location {
    /// A known location.
    #[must_use]
    pub fn new(method: &str, line: u32) -> Self {
        Location {
            method: Some(Arc::from(method)),
            line: Some(line),
        }
    }

    /// The unknown location.
    #[must_use]
    pub fn unknown() -> Self {
        Location::default()
    }

    /// Returns `true` if neither method nor line is known.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.method.is_none() && self.line.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.method, self.line) {
            (Some(method), Some(line)) => write!(f, "{method}:{line}"),
            (Some(method), None) => write!(f, "{method}"),
            (None, Some(line)) => write!(f, "<unknown>:{line}"),
            (None, None) => write!(f, "<unknown>"),
        }
    }
}

/// Broad classification of predicates used when projecting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PredicateType {
    /// Data effects: assignments, stores and calls.
    State,
    /// Unconditional constraints.
    Assume,
    /// Branch conditions.
    Path,
}

bitflags! {
    /// A set of [`PredicateType`]s, used to filter states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PredicateTypes : u8 {
        /// Assignments, stores and calls
        const STATE = 0b001;
        /// Assumptions
        const ASSUME = 0b010;
        /// Path predicates
        const PATH = 0b100;
    }
}

impl From<PredicateType> for PredicateTypes {
    fn from(ty: PredicateType) -> Self {
        match ty {
            PredicateType::State => PredicateTypes::STATE,
            PredicateType::Assume => PredicateTypes::ASSUME,
            PredicateType::Path => PredicateTypes::PATH,
        }
    }
}

/// The shape of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    /// `lhv := rhv`. The left-hand side is a variable assigned once per block.
    Assign {
        /// Assigned variable.
        lhv: Term,
        /// Assigned value.
        rhv: Term,
    },
    /// `*target := value`.
    Store {
        /// Written cell.
        target: MemRef,
        /// Written value.
        value: Term,
    },
    /// A method invocation with an optional result binding.
    Call {
        /// Result variable, if the result is used.
        lhv: Option<Term>,
        /// A [`TermKind::Call`] term.
        call: Term,
    },
    /// A constraint that holds on this path.
    Assume(Term),
    /// A branch condition.
    Path(Term),
}

/// An immutable effect or constraint with its source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    kind: PredicateKind,
    location: Location,
}

fn check_bool(operation: &'static str, cond: &Term) -> Result<()> {
    if cond.ty().is_bool() {
        Ok(())
    } else {
        Err(Error::mismatch(operation, "bool", cond.ty()))
    }
}

impl Predicate {
    /// `lhv := rhv`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] if `lhv` is not a variable and
    /// [`Error::TypeMismatch`] if `rhv` is not assignable to it.
    pub fn assign(lhv: &Term, rhv: &Term) -> Result<Self> {
        if !lhv.is_var() {
            return Err(Error::InvalidTerm(format!(
                "assignment target must be a variable, found {lhv}"
            )));
        }
        if !rhv.ty().is_assignable_to(lhv.ty()) {
            return Err(Error::mismatch("assign", lhv.ty().to_string(), rhv.ty()));
        }
        Ok(Predicate::from_kind(PredicateKind::Assign {
            lhv: lhv.clone(),
            rhv: rhv.clone(),
        }))
    }

    /// `*target := value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `value` is not assignable to the cell.
    pub fn store(target: &MemRef, value: &Term) -> Result<Self> {
        let cell = target.value_type();
        if !value.ty().is_assignable_to(&cell) {
            return Err(Error::mismatch("store", cell.to_string(), value.ty()));
        }
        Ok(Predicate::from_kind(PredicateKind::Store {
            target: target.clone(),
            value: value.clone(),
        }))
    }

    /// A call predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] if `call` is not a call term or `lhv` is not a
    /// variable, and [`Error::TypeMismatch`] if the result type is not assignable to `lhv`.
    pub fn call(lhv: Option<&Term>, call: &Term) -> Result<Self> {
        if !matches!(call.kind(), TermKind::Call { .. }) {
            return Err(Error::InvalidTerm(format!("expected a call term, found {call}")));
        }
        if let Some(lhv) = lhv {
            if !lhv.is_var() {
                return Err(Error::InvalidTerm(format!(
                    "call result must be bound to a variable, found {lhv}"
                )));
            }
            if *call.ty() == TermType::Void || !call.ty().is_assignable_to(lhv.ty()) {
                return Err(Error::mismatch("call", lhv.ty().to_string(), call.ty()));
            }
        }
        Ok(Predicate::from_kind(PredicateKind::Call {
            lhv: lhv.cloned(),
            call: call.clone(),
        }))
    }

    /// An assumption.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless `cond` is boolean.
    pub fn assume(cond: &Term) -> Result<Self> {
        check_bool("assume", cond)?;
        Ok(Predicate::from_kind(PredicateKind::Assume(cond.clone())))
    }

    /// A path predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless `cond` is boolean.
    pub fn path(cond: &Term) -> Result<Self> {
        check_bool("path", cond)?;
        Ok(Predicate::from_kind(PredicateKind::Path(cond.clone())))
    }

    pub(crate) fn from_kind(kind: PredicateKind) -> Self {
        Predicate {
            kind,
            location: Location::unknown(),
        }
    }

    /// Returns the predicate with the given location.
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// The shape of the predicate.
    #[must_use]
    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    /// The source location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The broad classification of the predicate.
    #[must_use]
    pub fn ty(&self) -> PredicateType {
        match self.kind {
            PredicateKind::Assign { .. } | PredicateKind::Store { .. } | PredicateKind::Call { .. } => {
                PredicateType::State
            }
            PredicateKind::Assume(_) => PredicateType::Assume,
            PredicateKind::Path(_) => PredicateType::Path,
        }
    }

    /// The constraint term of an assume or path predicate.
    #[must_use]
    pub fn condition(&self) -> Option<&Term> {
        match &self.kind {
            PredicateKind::Assume(cond) | PredicateKind::Path(cond) => Some(cond),
            _ => None,
        }
    }

    /// The variable defined by this predicate, if any.
    #[must_use]
    pub fn defined_var(&self) -> Option<&Term> {
        match &self.kind {
            PredicateKind::Assign { lhv, .. } => Some(lhv),
            PredicateKind::Call { lhv, .. } => lhv.as_ref(),
            _ => None,
        }
    }

    /// Every operand term read by this predicate (the assigned variable is not a read).
    #[must_use]
    pub fn operands(&self) -> Vec<&Term> {
        match &self.kind {
            PredicateKind::Assign { rhv, .. } => vec![rhv],
            PredicateKind::Store { target, value } => match target {
                MemRef::Field { owner, .. } => vec![owner, value],
                MemRef::Element { array, index, .. } => vec![array, index, value],
            },
            PredicateKind::Call { call, .. } => vec![call],
            PredicateKind::Assume(cond) | PredicateKind::Path(cond) => vec![cond],
        }
    }

    /// Rebuilds the predicate with every operand term mapped through `f`.
    ///
    /// The assigned variable of an assignment or call is left untouched. The rebuilt
    /// predicate keeps the location; no type checks are repeated, so `f` must preserve
    /// types.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `f`.
    pub fn try_map_operands<F>(&self, mut f: F) -> Result<Predicate>
    where
        F: FnMut(&Term) -> Result<Term>,
    {
        let kind = match &self.kind {
            PredicateKind::Assign { lhv, rhv } => PredicateKind::Assign {
                lhv: lhv.clone(),
                rhv: f(rhv)?,
            },
            PredicateKind::Store { target, value } => PredicateKind::Store {
                target: target.try_map(&mut f)?,
                value: f(value)?,
            },
            PredicateKind::Call { lhv, call } => PredicateKind::Call {
                lhv: lhv.clone(),
                call: f(call)?,
            },
            PredicateKind::Assume(cond) => PredicateKind::Assume(f(cond)?),
            PredicateKind::Path(cond) => PredicateKind::Path(f(cond)?),
        };
        Ok(self.with_kind(kind))
    }

    /// Returns a predicate with the same location and another shape.
    #[must_use]
    pub fn with_kind(&self, kind: PredicateKind) -> Predicate {
        Predicate {
            kind,
            location: self.location.clone(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PredicateKind::Assign { lhv, rhv } => write!(f, "{lhv} = {rhv}"),
            PredicateKind::Store { target, value } => write!(f, "*{target} = {value}"),
            PredicateKind::Call {
                lhv: Some(lhv),
                call,
            } => write!(f, "{lhv} = {call}"),
            PredicateKind::Call { lhv: None, call } => write!(f, "{call}"),
            PredicateKind::Assume(cond) => write!(f, "@A {cond}"),
            PredicateKind::Path(cond) => write!(f, "@P {cond}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{FieldRef, TermFactory};

    #[test]
    fn test_assign_type_checked() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let flag = tf.var("flag", TermType::Bool);
        assert!(Predicate::assign(&x, &tf.int(3)).is_ok());
        assert!(matches!(
            Predicate::assign(&x, &flag),
            Err(Error::TypeMismatch { operation: "assign", .. })
        ));
        assert!(matches!(
            Predicate::assign(&tf.int(1), &tf.int(3)),
            Err(Error::InvalidTerm(_))
        ));
    }

    #[test]
    fn test_condition_must_be_bool() {
        let tf = TermFactory::new();
        assert!(Predicate::assume(&tf.int(1)).is_err());
        assert!(Predicate::path(&tf.bool(true)).is_ok());
    }

    #[test]
    fn test_types_and_flags() {
        let tf = TermFactory::new();
        let obj = tf.var("o", TermType::class("Point"));
        let field = FieldRef::new("Point", "x", TermType::INT);
        let store = Predicate::store(&tf.field(&obj, &field).unwrap(), &tf.int(1)).unwrap();
        let path = Predicate::path(&tf.bool(true)).unwrap();

        assert_eq!(store.ty(), PredicateType::State);
        assert_eq!(path.ty(), PredicateType::Path);
        assert!(PredicateTypes::from(PredicateType::Path).contains(PredicateTypes::PATH));
        assert_eq!(store.to_string(), "*o.x = 1");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("Foo.bar", 12).to_string(), "Foo.bar:12");
        assert_eq!(Location::unknown().to_string(), "<unknown>");
    }
}
