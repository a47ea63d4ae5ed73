//! Literal constants.

use std::{fmt, sync::Arc};

/// A literal constant carried by a [`TermKind::Const`](crate::term::TermKind::Const) term.
///
/// Floating point literals are stored by bit pattern so that literals can be hashed and
/// compared structurally (two NaNs with the same payload are the same literal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// Boolean constant
    Bool(bool),
    /// Integer constant, already wrapped to the term's integer type
    Int(i64),
    /// Floating point constant (bit pattern of an `f64`)
    Float(u64),
    /// The null reference
    Null,
    /// String constant, only meaningful for the opaque string strategy
    Str(Arc<str>),
}

impl Literal {
    /// Creates a floating point literal.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Literal::Float(value.to_bits())
    }

    /// Returns the boolean value, if this is a boolean literal.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer literal.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the floating point value, if this is a float literal.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Literal::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns `true` for the null literal.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Literal::Null => write!(f, "null"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}
