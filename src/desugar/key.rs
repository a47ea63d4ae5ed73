//! Dispatch keys for library-call adapters.

use std::{fmt, sync::Arc};

use crate::term::{MethodRef, MethodSignature};

/// Identifies a library method by declaring class and full signature.
///
/// Keys compare the complete signature, so overloads (`startsWith(String)` and
/// `startsWith(String, int)`) and the same method declared on different classes
/// (`String.length()` and `CharSequence.length()`) are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallKey {
    /// Declaring class.
    pub class: Arc<str>,
    /// Name, parameter types and return type.
    pub method: MethodSignature,
}

impl CallKey {
    /// Creates a key.
    #[must_use]
    pub fn new(class: &str, method: MethodSignature) -> Self {
        CallKey {
            class: Arc::from(class),
            method,
        }
    }
}

impl From<&MethodRef> for CallKey {
    fn from(method: &MethodRef) -> Self {
        CallKey {
            class: method.class.clone(),
            method: method.signature.clone(),
        }
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{TermType, CHAR_SEQUENCE_CLASS, STRING_CLASS};

    #[test]
    fn test_keys_distinguish_class_and_overload() {
        let length = MethodSignature::new("length", vec![], TermType::INT);
        let on_string = CallKey::new(STRING_CLASS, length.clone());
        let on_sequence = CallKey::new(CHAR_SEQUENCE_CLASS, length);
        assert_ne!(on_string, on_sequence);

        let starts = CallKey::new(
            STRING_CLASS,
            MethodSignature::new("startsWith", vec![TermType::string()], TermType::Bool),
        );
        let starts_at = CallKey::new(
            STRING_CLASS,
            MethodSignature::new(
                "startsWith",
                vec![TermType::string(), TermType::INT],
                TermType::Bool,
            ),
        );
        assert_ne!(starts, starts_at);
    }

    #[test]
    fn test_from_method_ref() {
        let method = MethodRef::new(
            STRING_CLASS,
            MethodSignature::new("isEmpty", vec![], TermType::Bool),
        );
        let key = CallKey::from(&method);
        assert_eq!(&*key.class, STRING_CLASS);
        assert_eq!(key.to_string(), format!("{STRING_CLASS}.isEmpty(): bool"));
    }
}
