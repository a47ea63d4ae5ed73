//! String library models.
//!
//! Two interchangeable strategies model `java/lang/String` and the `CharSequence`
//! interface methods that strings implement:
//!
//! - [`structural`] - strings are heap records whose `value` field holds a `char[]`;
//!   operations become loads, generated arrays and quantified element constraints.
//! - [`opaque`] - strings are atomic values; operations become
//!   [`Str`](crate::term::TermKind::Str) terms plus axioms.
//!
//! Both register their adapters through a `register(&mut AdapterRegistry)` function
//! against the keys of [`StringMethod`].
//!
//! # Modeled methods
//!
//! | Method | Structural | Opaque |
//! |--------|:----------:|:------:|
//! | `String.<init>()`, `<init>(String)`, `<init>(char[])`, `<init>(char[], int, int)` | yes | yes |
//! | `length`, `isEmpty`, `charAt`, `equals` | yes | yes |
//! | `startsWith(String)`, `startsWith(String, int)`, `endsWith` | yes | yes |
//! | `substring(int)`, `substring(int, int)`, `subSequence`, `concat` | yes | yes |
//! | `toString`, `toCharArray` | yes | yes |
//! | `CharSequence.length`, `charAt`, `subSequence`, `toString` | yes | yes |
//! | `indexOf(String)`, `indexOf(String, int)`, `contains`, `compareTo` | no | yes |

pub mod opaque;
pub mod structural;

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    desugar::{CallKey, CallSite, DesugarContext},
    state::StateBuilder,
    term::{
        FieldRef, MethodRef, MethodSignature, Term, TermType, CHAR_SEQUENCE_CLASS, STRING_CLASS,
    },
    Result,
};

/// The string methods with a model in at least one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum StringMethod {
    /// `String.<init>()`
    EmptyInit,
    /// `String.<init>(String)`
    CopyInit,
    /// `String.<init>(char[])`
    CharArrayInit,
    /// `String.<init>(char[], int offset, int count)`
    CharArrayRangeInit,
    /// `String.length()`
    Length,
    /// `String.isEmpty()`
    IsEmpty,
    /// `String.charAt(int)`
    CharAt,
    /// `String.equals(Object)`
    Equals,
    /// `String.startsWith(String)`
    StartsWith,
    /// `String.startsWith(String, int offset)`
    StartsWithOffset,
    /// `String.endsWith(String)`
    EndsWith,
    /// `String.substring(int begin)`
    Substring,
    /// `String.substring(int begin, int end)`
    SubstringRange,
    /// `String.subSequence(int begin, int end)`
    SubSequence,
    /// `String.concat(String)`
    Concat,
    /// `String.toString()`
    ToString,
    /// `String.toCharArray()`
    ToCharArray,
    /// `String.indexOf(String)`
    IndexOf,
    /// `String.indexOf(String, int from)`
    IndexOfFrom,
    /// `String.contains(CharSequence)`
    Contains,
    /// `String.compareTo(String)`
    CompareTo,
    /// `CharSequence.length()`
    SequenceLength,
    /// `CharSequence.charAt(int)`
    SequenceCharAt,
    /// `CharSequence.subSequence(int, int)`
    SequenceSubSequence,
    /// `CharSequence.toString()`
    SequenceToString,
}

impl StringMethod {
    /// The declaring class.
    #[must_use]
    pub fn class(self) -> &'static str {
        match self {
            StringMethod::SequenceLength
            | StringMethod::SequenceCharAt
            | StringMethod::SequenceSubSequence
            | StringMethod::SequenceToString => CHAR_SEQUENCE_CLASS,
            _ => STRING_CLASS,
        }
    }

    /// The method signature.
    #[must_use]
    pub fn signature(self) -> MethodSignature {
        let string = TermType::string;
        let sequence = TermType::char_sequence;
        let int = || TermType::INT;
        let (name, params, ret) = match self {
            StringMethod::EmptyInit => ("<init>", vec![], TermType::Void),
            StringMethod::CopyInit => ("<init>", vec![string()], TermType::Void),
            StringMethod::CharArrayInit => ("<init>", vec![TermType::char_array()], TermType::Void),
            StringMethod::CharArrayRangeInit => (
                "<init>",
                vec![TermType::char_array(), int(), int()],
                TermType::Void,
            ),
            StringMethod::Length | StringMethod::SequenceLength => ("length", vec![], int()),
            StringMethod::IsEmpty => ("isEmpty", vec![], TermType::Bool),
            StringMethod::CharAt | StringMethod::SequenceCharAt => {
                ("charAt", vec![int()], TermType::CHAR)
            }
            StringMethod::Equals => ("equals", vec![TermType::object()], TermType::Bool),
            StringMethod::StartsWith => ("startsWith", vec![string()], TermType::Bool),
            StringMethod::StartsWithOffset => {
                ("startsWith", vec![string(), int()], TermType::Bool)
            }
            StringMethod::EndsWith => ("endsWith", vec![string()], TermType::Bool),
            StringMethod::Substring => ("substring", vec![int()], string()),
            StringMethod::SubstringRange => ("substring", vec![int(), int()], string()),
            StringMethod::SubSequence | StringMethod::SequenceSubSequence => {
                ("subSequence", vec![int(), int()], sequence())
            }
            StringMethod::Concat => ("concat", vec![string()], string()),
            StringMethod::ToString | StringMethod::SequenceToString => {
                ("toString", vec![], string())
            }
            StringMethod::ToCharArray => ("toCharArray", vec![], TermType::char_array()),
            StringMethod::IndexOf => ("indexOf", vec![string()], int()),
            StringMethod::IndexOfFrom => ("indexOf", vec![string(), int()], int()),
            StringMethod::Contains => ("contains", vec![sequence()], TermType::Bool),
            StringMethod::CompareTo => ("compareTo", vec![string()], int()),
        };
        MethodSignature::new(name, params, ret)
    }

    /// The dispatch key.
    #[must_use]
    pub fn key(self) -> CallKey {
        CallKey::new(self.class(), self.signature())
    }

    /// A method reference for building call terms.
    #[must_use]
    pub fn method_ref(self) -> MethodRef {
        MethodRef::new(self.class(), self.signature())
    }

    /// Returns the string method `method` refers to, if it is one of the table.
    #[must_use]
    pub fn resolve(method: &MethodRef) -> Option<Self> {
        if &*method.class != STRING_CLASS && &*method.class != CHAR_SEQUENCE_CLASS {
            return None;
        }
        let key = CallKey::from(method);
        StringMethod::iter().find(|m| m.key() == key)
    }
}

/// The `String.value` field of the structural model.
#[must_use]
pub fn value_field() -> FieldRef {
    FieldRef::new(STRING_CLASS, "value", TermType::char_array())
}

/// Binds the receiver as a `String` and assumes it is non-null.
///
/// A `CharSequence` receiver is cast to `String` first; an invocation that returned
/// normally had a non-null receiver.
fn receiver(ctx: &DesugarContext<'_>, builder: &mut StateBuilder, site: &CallSite<'_>) -> Result<Term> {
    let tf = ctx.factory;
    let string = TermType::string();
    let this = if *site.owner.ty() == string {
        site.owner.clone()
    } else {
        let cast = tf.fresh_var("str", string.clone());
        builder.state(&cast, &tf.cast(site.owner, &string)?)?;
        cast
    };
    builder.assume(&tf.ne(&this, &tf.null())?)?;
    Ok(this)
}

/// Assumes `term` is non-null.
fn non_null(ctx: &DesugarContext<'_>, builder: &mut StateBuilder, term: &Term) -> Result<()> {
    let tf = ctx.factory;
    builder.assume(&tf.ne(term, &tf.null())?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<CallKey> = StringMethod::iter().map(StringMethod::key).collect();
        assert_eq!(keys.len(), StringMethod::iter().count());
    }

    #[test]
    fn test_resolve_round_trips() {
        for method in StringMethod::iter() {
            assert_eq!(StringMethod::resolve(&method.method_ref()), Some(method));
        }
        let unknown = MethodRef::new(
            STRING_CLASS,
            MethodSignature::new("intern", vec![], TermType::string()),
        );
        assert_eq!(StringMethod::resolve(&unknown), None);
    }

    #[test]
    fn test_sequence_keys_distinct_from_string_keys() {
        assert_ne!(StringMethod::Length.key(), StringMethod::SequenceLength.key());
        assert_eq!(
            StringMethod::Length.signature(),
            StringMethod::SequenceLength.signature()
        );
        assert_eq!(StringMethod::SequenceCharAt.to_string(), "sequenceCharAt");
    }
}
