//! Operators used by binary, comparison, unary and string terms.

use strum::{Display, EnumIter, IntoStaticStr};

/// Binary arithmetic, bitwise and logical operators.
///
/// `And`, `Or` and `Xor` are logical on boolean operands and bitwise on integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
pub enum BinaryOp {
    /// Addition
    #[strum(to_string = "+")]
    Add,
    /// Subtraction
    #[strum(to_string = "-")]
    Sub,
    /// Multiplication
    #[strum(to_string = "*")]
    Mul,
    /// Division (truncating for integers)
    #[strum(to_string = "/")]
    Div,
    /// Remainder
    #[strum(to_string = "%")]
    Rem,
    /// Shift left
    #[strum(to_string = "<<")]
    Shl,
    /// Arithmetic shift right
    #[strum(to_string = ">>")]
    Shr,
    /// Logical shift right
    #[strum(to_string = ">>>")]
    Ushr,
    /// Conjunction / bitwise and
    #[strum(to_string = "&")]
    And,
    /// Disjunction / bitwise or
    #[strum(to_string = "|")]
    Or,
    /// Exclusive or
    #[strum(to_string = "^")]
    Xor,
}

impl BinaryOp {
    /// Mnemonic used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Ushr => "ushr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    /// Returns `true` for the operators whose operands may be booleans.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    /// Returns `true` for shift operators.
    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr)
    }

    /// Returns `true` if `a op b == b op a`.
    #[must_use]
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor
        )
    }
}

/// Comparison operators. All comparisons produce a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
pub enum CmpOp {
    /// Equality
    #[strum(to_string = "==")]
    Eq,
    /// Inequality
    #[strum(to_string = "!=")]
    Ne,
    /// Less than
    #[strum(to_string = "<")]
    Lt,
    /// Less than or equal
    #[strum(to_string = "<=")]
    Le,
    /// Greater than
    #[strum(to_string = ">")]
    Gt,
    /// Greater than or equal
    #[strum(to_string = ">=")]
    Ge,
}

impl CmpOp {
    /// Mnemonic used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        }
    }

    /// The operator producing the logical negation of this comparison.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    /// The operator for the same comparison with swapped operands.
    #[must_use]
    pub fn swap(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => other,
        }
    }

    /// Returns `true` for `==` and `!=`, the only comparisons defined on references.
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    /// Applies the comparison to an ordering result.
    #[must_use]
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            CmpOp::Eq => ordering == Equal,
            CmpOp::Ne => ordering != Equal,
            CmpOp::Lt => ordering == Less,
            CmpOp::Le => ordering != Greater,
            CmpOp::Gt => ordering == Greater,
            CmpOp::Ge => ordering != Less,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
pub enum UnaryOp {
    /// Arithmetic negation
    #[strum(to_string = "-")]
    Neg,
    /// Logical / bitwise complement
    #[strum(to_string = "!")]
    Not,
}

/// Atomic string operations used by the opaque string strategy.
///
/// Strings handled by these operations are values, not heap records. The argument
/// shapes are fixed per operation:
///
/// | Operation | Arguments | Result |
/// |-----------|-----------|--------|
/// | `Length` | `s` | int |
/// | `CharAt` | `s, i` | char |
/// | `Equals` | `s, t` | bool |
/// | `StartsWith` | `s, prefix, offset` | bool |
/// | `EndsWith` | `s, suffix` | bool |
/// | `IndexOf` | `s, t, from` | int |
/// | `Substring` | `s, begin, end` | string |
/// | `Concat` | `s, t` | string |
/// | `Contains` | `s, t` | bool |
/// | `Compare` | `s, t` | int |
/// | `FromChars` | `array, offset, count` | string |
/// | `FromChar` | `c` | string |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum StrOp {
    /// Number of characters
    Length,
    /// Character at an index
    CharAt,
    /// Content equality
    Equals,
    /// Prefix test at an offset
    StartsWith,
    /// Suffix test
    EndsWith,
    /// First index of a substring at or after an offset, or -1
    IndexOf,
    /// Characters in `[begin, end)`
    Substring,
    /// Concatenation
    Concat,
    /// Substring containment
    Contains,
    /// Lexicographic comparison
    Compare,
    /// String built from a character array range
    FromChars,
    /// Single-character string
    FromChar,
}

impl StrOp {
    /// Number of arguments the operation takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            StrOp::Length | StrOp::FromChar => 1,
            StrOp::CharAt
            | StrOp::Equals
            | StrOp::EndsWith
            | StrOp::Concat
            | StrOp::Contains
            | StrOp::Compare => 2,
            StrOp::StartsWith | StrOp::IndexOf | StrOp::Substring | StrOp::FromChars => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_negate_is_involution() {
        for op in CmpOp::iter() {
            assert_eq!(op.negate().negate(), op);
            for ordering in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_ne!(op.holds(ordering), op.negate().holds(ordering));
            }
        }
    }

    #[test]
    fn test_swap() {
        for op in CmpOp::iter() {
            for ordering in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_eq!(op.holds(ordering), op.swap().holds(ordering.reverse()));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(BinaryOp::Ushr.to_string(), ">>>");
        assert_eq!(CmpOp::Ge.to_string(), ">=");
        assert_eq!(StrOp::IndexOf.to_string(), "indexOf");
    }
}
