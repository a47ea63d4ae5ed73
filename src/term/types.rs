//! Static semantic types of terms.
//!
//! Every [`Term`](crate::term::Term) carries a [`TermType`] computed at construction time.
//! The factory uses these types to reject ill-typed construction immediately, and the
//! solving backends use them to pick value domains and encodings.
//!
//! The type system mirrors a JVM-style object model:
//!
//! | Type | Description |
//! |------|-------------|
//! | `Void` | Result type of constructors and void methods; never the type of a value |
//! | `Bool` | Boolean |
//! | `Int` | Fixed-width integer with signedness (`char` is an unsigned 16-bit integer) |
//! | `Float` / `Double` | IEEE-754 floating point |
//! | `Null` | Type of the `null` literal, a subtype of every reference type |
//! | `Class` | Reference to an instance of a named class |
//! | `Array` | Reference to an array of the element type |

use std::{fmt, sync::Arc};

/// Name of the root class every reference type is a subtype of.
pub const OBJECT_CLASS: &str = "java/lang/Object";
/// Name of the string class modeled by the desugaring layer.
pub const STRING_CLASS: &str = "java/lang/String";
/// Name of the character-sequence interface implemented by strings.
pub const CHAR_SEQUENCE_CLASS: &str = "java/lang/CharSequence";

/// A fixed-width integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntType {
    /// Width in bits (8, 16, 32 or 64).
    pub bits: u8,
    /// Whether values are interpreted as two's complement.
    pub signed: bool,
}

impl IntType {
    /// Signed 8-bit integer.
    pub const BYTE: IntType = IntType {
        bits: 8,
        signed: true,
    };
    /// Signed 16-bit integer.
    pub const SHORT: IntType = IntType {
        bits: 16,
        signed: true,
    };
    /// Unsigned 16-bit integer (a character).
    pub const CHAR: IntType = IntType {
        bits: 16,
        signed: false,
    };
    /// Signed 32-bit integer.
    pub const INT: IntType = IntType {
        bits: 32,
        signed: true,
    };
    /// Signed 64-bit integer.
    pub const LONG: IntType = IntType {
        bits: 64,
        signed: true,
    };

    /// Wraps an arbitrary `i64` into the value range of this type.
    ///
    /// Arithmetic on symbolic integers is modular; this is the single place the
    /// truncation and sign extension rules live.
    #[must_use]
    pub fn wrap(self, value: i64) -> i64 {
        if self.bits >= 64 {
            return value;
        }
        let mask = (1i64 << self.bits) - 1;
        let truncated = value & mask;
        if self.signed && truncated & (1i64 << (self.bits - 1)) != 0 {
            truncated - (1i64 << self.bits)
        } else {
            truncated
        }
    }

    /// Smallest representable value.
    #[must_use]
    pub fn min_value(self) -> i64 {
        match (self.signed, self.bits) {
            (false, _) => 0,
            (true, 64) => i64::MIN,
            (true, bits) => -(1i64 << (bits - 1)),
        }
    }

    /// Largest representable value.
    #[must_use]
    pub fn max_value(self) -> i64 {
        match (self.signed, self.bits) {
            (_, 64) => i64::MAX,
            (true, bits) => (1i64 << (bits - 1)) - 1,
            (false, bits) => (1i64 << bits) - 1,
        }
    }

    /// Returns `true` if `value` lies inside the representable range.
    #[must_use]
    pub fn contains(self, value: i64) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }
}

/// The static semantic type of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermType {
    /// No value (constructors, void methods).
    Void,
    /// Boolean.
    Bool,
    /// Fixed-width integer.
    Int(IntType),
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// The type of `null`.
    Null,
    /// Instance of a named class.
    Class(Arc<str>),
    /// Array of the element type.
    Array(Box<TermType>),
}

impl TermType {
    /// The 32-bit signed integer type.
    pub const INT: TermType = TermType::Int(IntType::INT);
    /// The 64-bit signed integer type.
    pub const LONG: TermType = TermType::Int(IntType::LONG);
    /// The character type.
    pub const CHAR: TermType = TermType::Int(IntType::CHAR);

    /// Creates a class type.
    #[must_use]
    pub fn class(name: &str) -> Self {
        TermType::Class(Arc::from(name))
    }

    /// Creates an array type over `elem`.
    #[must_use]
    pub fn array(elem: TermType) -> Self {
        TermType::Array(Box::new(elem))
    }

    /// The `java/lang/String` class type.
    #[must_use]
    pub fn string() -> Self {
        Self::class(STRING_CLASS)
    }

    /// The `java/lang/CharSequence` interface type.
    #[must_use]
    pub fn char_sequence() -> Self {
        Self::class(CHAR_SEQUENCE_CLASS)
    }

    /// The `java/lang/Object` class type.
    #[must_use]
    pub fn object() -> Self {
        Self::class(OBJECT_CLASS)
    }

    /// The `char[]` type backing structural strings.
    #[must_use]
    pub fn char_array() -> Self {
        Self::array(Self::CHAR)
    }

    /// Returns `true` for `Bool`.
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self, TermType::Bool)
    }

    /// Returns `true` for fixed-width integers.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self, TermType::Int(_))
    }

    /// Returns `true` for `Float` and `Double`.
    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(self, TermType::Float | TermType::Double)
    }

    /// Returns `true` for integers and floating point.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// Returns `true` for `Class`, `Array` and `Null`.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TermType::Class(_) | TermType::Array(_) | TermType::Null
        )
    }

    /// Returns the integer type, if integral.
    #[must_use]
    pub fn as_int(&self) -> Option<IntType> {
        match self {
            TermType::Int(it) => Some(*it),
            _ => None,
        }
    }

    /// Returns the element type, if this is an array.
    #[must_use]
    pub fn element(&self) -> Option<&TermType> {
        match self {
            TermType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Returns the class name, if this is a class type.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TermType::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` if `self` may be used where `other` is expected.
    ///
    /// Only the modeled part of the hierarchy is known: `Null` is a subtype of every
    /// reference type, every reference type is a subtype of `Object`, and `String`
    /// implements `CharSequence`.
    #[must_use]
    pub fn is_subtype_of(&self, other: &TermType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (TermType::Null, o) => o.is_reference(),
            (s, TermType::Class(name)) if s.is_reference() && &**name == OBJECT_CLASS => true,
            (TermType::Class(s), TermType::Class(o)) => {
                &**s == STRING_CLASS && &**o == CHAR_SEQUENCE_CLASS
            }
            _ => false,
        }
    }

    /// Returns `true` if a value of type `self` may be stored into a cell of type `target`.
    ///
    /// Integers of different widths are implicitly converted, as are floating point values.
    #[must_use]
    pub fn is_assignable_to(&self, target: &TermType) -> bool {
        self.is_subtype_of(target)
            || (self.is_integral() && target.is_integral())
            || (self.is_floating() && target.is_floating())
    }

    /// Returns `true` if values of the two types can be compared for equality.
    #[must_use]
    pub fn is_comparable_with(&self, other: &TermType) -> bool {
        match (self, other) {
            (a, b) if a.is_integral() && b.is_integral() => true,
            (a, b) if a.is_floating() && b.is_floating() => true,
            (a, b) if a.is_reference() && b.is_reference() => {
                a.is_subtype_of(b) || b.is_subtype_of(a)
            }
            (a, b) => a == b,
        }
    }

    /// Returns the wider of two integer types, preferring the left operand on ties.
    #[must_use]
    pub fn widen(&self, other: &TermType) -> TermType {
        match (self, other) {
            (TermType::Int(a), TermType::Int(b)) if b.bits > a.bits => other.clone(),
            (TermType::Float, TermType::Double) => TermType::Double,
            _ => self.clone(),
        }
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermType::Void => write!(f, "void"),
            TermType::Bool => write!(f, "bool"),
            TermType::Int(IntType::CHAR) => write!(f, "char"),
            TermType::Int(it) => write!(f, "{}{}", if it.signed { "i" } else { "u" }, it.bits),
            TermType::Float => write!(f, "float"),
            TermType::Double => write!(f, "double"),
            TermType::Null => write!(f, "null"),
            TermType::Class(name) => write!(f, "{name}"),
            TermType::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_signed() {
        assert_eq!(IntType::BYTE.wrap(127), 127);
        assert_eq!(IntType::BYTE.wrap(128), -128);
        assert_eq!(IntType::INT.wrap(i64::from(i32::MAX) + 1), i64::from(i32::MIN));
        assert_eq!(IntType::LONG.wrap(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_wrap_unsigned() {
        assert_eq!(IntType::CHAR.wrap(-1), 0xFFFF);
        assert_eq!(IntType::CHAR.wrap(0x1_0041), 0x41);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(IntType::CHAR.min_value(), 0);
        assert_eq!(IntType::CHAR.max_value(), 0xFFFF);
        assert_eq!(IntType::INT.min_value(), i64::from(i32::MIN));
        assert!(IntType::BYTE.contains(-128));
        assert!(!IntType::BYTE.contains(128));
    }

    #[test]
    fn test_subtyping() {
        let string = TermType::string();
        assert!(string.is_subtype_of(&TermType::char_sequence()));
        assert!(string.is_subtype_of(&TermType::object()));
        assert!(TermType::Null.is_subtype_of(&TermType::char_array()));
        assert!(TermType::char_array().is_subtype_of(&TermType::object()));
        assert!(!TermType::char_sequence().is_subtype_of(&string));
        assert!(!TermType::INT.is_subtype_of(&TermType::object()));
    }

    #[test]
    fn test_comparable() {
        assert!(TermType::INT.is_comparable_with(&TermType::CHAR));
        assert!(TermType::string().is_comparable_with(&TermType::Null));
        assert!(!TermType::Bool.is_comparable_with(&TermType::INT));
    }

    #[test]
    fn test_display() {
        assert_eq!(TermType::char_array().to_string(), "char[]");
        assert_eq!(TermType::INT.to_string(), "i32");
        assert_eq!(TermType::string().to_string(), "java/lang/String");
    }
}
