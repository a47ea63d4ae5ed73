//! Opaque string model.
//!
//! Strings are atomic values. Each operation binds its result to a
//! [`Str`](crate::term::TermKind::Str) term and adds the axioms a solver needs to relate
//! it to the other string terms of the state:
//!
//! | Method | Result | Axioms |
//! |--------|--------|--------|
//! | `length()` | `length(s)` | `result >= 0` |
//! | `charAt(i)` | `charAt(s, i)` | `0 <= i < length(s)` |
//! | `equals(o)` | `equals(s, (String) o)` when `o` is a string | equal strings have equal lengths |
//! | `startsWith(p[, k])` | `startsWith(s, p, k)` | a match fits inside `s` |
//! | `endsWith(p)` | `endsWith(s, p)` | a match fits inside `s` |
//! | `indexOf(t[, from])` | `indexOf(s, t, from)` | `-1` or the position of a match |
//! | `substring(b[, e])` | `substring(s, b, e)` when `e - b >= 0`, else `null` | bounds, result length |
//! | `concat(t)` | `concat(s, t)` | result length is the sum |
//! | `contains(t)` | `contains(s, t)` | a match fits inside `s` |
//! | `compareTo(t)` | `compare(s, t)` | |
//!
//! Constructors rebind the receiver to the string value they build, which requires the
//! receiver to be a variable; a constructor on any other receiver is kept as a call.

use crate::{
    desugar::{
        string::{non_null, receiver, StringMethod},
        Adapter, AdapterRegistry, CallSite, DesugarContext,
    },
    state::{PredicateState, StateBuilder},
    term::{StrOp, Term, TermFactory, TermType},
    Result,
};

const ADAPTERS: &[(StringMethod, Adapter)] = &[
    (StringMethod::EmptyInit, empty_init),
    (StringMethod::CopyInit, copy_init),
    (StringMethod::CharArrayInit, char_array_init),
    (StringMethod::CharArrayRangeInit, char_array_range_init),
    (StringMethod::Length, length),
    (StringMethod::SequenceLength, length),
    (StringMethod::IsEmpty, is_empty),
    (StringMethod::CharAt, char_at),
    (StringMethod::SequenceCharAt, char_at),
    (StringMethod::Equals, equals),
    (StringMethod::StartsWith, starts_with),
    (StringMethod::StartsWithOffset, starts_with_offset),
    (StringMethod::EndsWith, ends_with),
    (StringMethod::Substring, substring),
    (StringMethod::SubstringRange, substring_range),
    (StringMethod::SubSequence, substring_range),
    (StringMethod::SequenceSubSequence, substring_range),
    (StringMethod::Concat, concat),
    (StringMethod::ToString, to_string),
    (StringMethod::SequenceToString, to_string),
    (StringMethod::ToCharArray, to_char_array),
    (StringMethod::IndexOf, index_of),
    (StringMethod::IndexOfFrom, index_of_from),
    (StringMethod::Contains, contains),
    (StringMethod::CompareTo, compare_to),
];

/// Registers the opaque string adapters.
///
/// # Errors
///
/// Returns [`Error::DuplicateAdapter`](crate::Error::DuplicateAdapter) if one of the keys
/// is already registered.
pub fn register(registry: &mut AdapterRegistry) -> Result<()> {
    for (method, adapter) in ADAPTERS {
        registry.register(method.key(), *adapter)?;
    }
    Ok(())
}

/// Rewrites a string call nested in a term to a pure expression, if it has one.
pub(crate) fn inline(
    tf: &TermFactory,
    method: StringMethod,
    owner: &Term,
    args: &[Term],
) -> Result<Option<Term>> {
    let arg = |i: usize| args.get(i).cloned();
    Ok(match method {
        StringMethod::Length | StringMethod::SequenceLength => {
            Some(tf.str_op(StrOp::Length, &[owner.clone()])?)
        }
        StringMethod::IsEmpty => Some(tf.eq(
            &tf.str_op(StrOp::Length, &[owner.clone()])?,
            &tf.int(0),
        )?),
        StringMethod::CharAt | StringMethod::SequenceCharAt => match arg(0) {
            Some(index) => Some(tf.str_op(StrOp::CharAt, &[owner.clone(), index])?),
            None => None,
        },
        StringMethod::Equals => match arg(0) {
            Some(other) => Some(string_equals(tf, owner, &other)?),
            None => None,
        },
        StringMethod::ToString | StringMethod::SequenceToString => {
            Some(tf.cast(owner, &TermType::string())?)
        }
        _ => None,
    })
}

/// `o instanceof String ? equals(s, (String) o) : false`
fn string_equals(tf: &TermFactory, this: &Term, other: &Term) -> Result<Term> {
    let string = TermType::string();
    tf.ite(
        &tf.instance_of(other, &string)?,
        &tf.str_op(StrOp::Equals, &[this.clone(), tf.cast(other, &string)?])?,
        &tf.bool(false),
    )
}

fn str_length(tf: &TermFactory, s: &Term) -> Result<Term> {
    tf.str_op(StrOp::Length, &[s.clone()])
}

/// `!result || fact`
fn implied(tf: &TermFactory, result: &Term, fact: &Term) -> Result<Term> {
    tf.or(&tf.not(result)?, fact)
}

/// Rebinds the constructed receiver, or keeps the constructor call when the receiver is
/// not a variable.
fn rebind(
    ctx: &DesugarContext<'_>,
    mut builder: StateBuilder,
    site: &CallSite<'_>,
    value: &Term,
) -> Result<PredicateState> {
    let tf = ctx.factory;
    if site.owner.is_var() {
        builder.state(site.owner, value)?;
    } else {
        log::debug!("constructor receiver {} is not a variable, keeping the call", site.owner);
        builder.call(None, &tf.call(site.owner, site.method, site.args)?)?;
    }
    Ok(builder.build())
}

fn empty_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    rebind(ctx, ctx.builder(site), site, &ctx.factory.string(""))
}

fn copy_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let original = site.arg(0)?;
    non_null(ctx, &mut builder, original)?;
    rebind(ctx, builder, site, original)
}

fn char_array_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let source = site.arg(0)?;
    non_null(ctx, &mut builder, source)?;
    let value = tf.str_op(StrOp::FromChars, &[source.clone(), tf.int(0), tf.length(source)?])?;
    rebind(ctx, builder, site, &value)
}

fn char_array_range_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let (source, offset, count) = (site.arg(0)?, site.arg(1)?, site.arg(2)?);
    non_null(ctx, &mut builder, source)?;
    builder
        .assume(&tf.ge(offset, &tf.int(0))?)?
        .assume(&tf.ge(count, &tf.int(0))?)?
        .assume(&tf.le(offset, &tf.sub(&tf.length(source)?, count)?)?)?;
    let value = tf.str_op(StrOp::FromChars, &[source.clone(), offset.clone(), count.clone()])?;
    rebind(ctx, builder, site, &value)
}

fn length(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let result = site.result(tf, TermType::INT);
    builder
        .state(&result, &str_length(tf, &this)?)?
        .assume(&tf.ge(&result, &tf.int(0))?)?;
    Ok(builder.build())
}

fn is_empty(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let result = site.result(tf, TermType::Bool);
    builder.state(&result, &tf.eq(&str_length(tf, &this)?, &tf.int(0))?)?;
    Ok(builder.build())
}

fn char_at(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let index = site.arg(0)?;
    let result = site.result(tf, TermType::CHAR);
    builder
        .assume(&tf.ge(index, &tf.int(0))?)?
        .assume(&tf.lt(index, &str_length(tf, &this)?)?)?
        .state(&result, &tf.str_op(StrOp::CharAt, &[this.clone(), index.clone()])?)?;
    Ok(builder.build())
}

fn equals(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let string = TermType::string();
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let other = site.arg(0)?;
    let result = site.result(tf, TermType::Bool);
    let same_length = tf.and(
        &tf.instance_of(other, &string)?,
        &tf.eq(&str_length(tf, &this)?, &str_length(tf, &tf.cast(other, &string)?)?)?,
    )?;
    builder
        .state(&result, &string_equals(tf, &this, other)?)?
        .assume(&implied(tf, &result, &same_length)?)?;
    Ok(builder.build())
}

fn starts_with(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    starts_with_at(ctx, site, &ctx.factory.int(0))
}

fn starts_with_offset(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    starts_with_at(ctx, site, site.arg(1)?)
}

fn starts_with_at(
    ctx: &DesugarContext<'_>,
    site: &CallSite<'_>,
    offset: &Term,
) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let prefix = site.arg(0)?;
    non_null(ctx, &mut builder, prefix)?;
    let result = site.result(tf, TermType::Bool);
    let fits = tf.and(
        &tf.ge(offset, &tf.int(0))?,
        &tf.le(&tf.add(offset, &str_length(tf, prefix)?)?, &str_length(tf, &this)?)?,
    )?;
    builder
        .state(
            &result,
            &tf.str_op(StrOp::StartsWith, &[this.clone(), prefix.clone(), offset.clone()])?,
        )?
        .assume(&implied(tf, &result, &fits)?)?;
    Ok(builder.build())
}

fn ends_with(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let suffix = site.arg(0)?;
    non_null(ctx, &mut builder, suffix)?;
    let result = site.result(tf, TermType::Bool);
    let fits = tf.le(&str_length(tf, suffix)?, &str_length(tf, &this)?)?;
    builder
        .state(&result, &tf.str_op(StrOp::EndsWith, &[this.clone(), suffix.clone()])?)?
        .assume(&implied(tf, &result, &fits)?)?;
    Ok(builder.build())
}

fn index_of(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    index_of_at(ctx, site, &ctx.factory.int(0))
}

fn index_of_from(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    index_of_at(ctx, site, site.arg(1)?)
}

fn index_of_at(ctx: &DesugarContext<'_>, site: &CallSite<'_>, from: &Term) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let needle = site.arg(0)?;
    non_null(ctx, &mut builder, needle)?;
    let result = site.result(tf, TermType::INT);
    let missing = tf.eq(&result, &tf.int(-1))?;
    let located = tf.str_op(StrOp::StartsWith, &[this.clone(), needle.clone(), result.clone()])?;
    builder
        .state(
            &result,
            &tf.str_op(StrOp::IndexOf, &[this.clone(), needle.clone(), from.clone()])?,
        )?
        .assume(&tf.ge(&result, &tf.int(-1))?)?
        .assume(&tf.or(&missing, &located)?)?;
    Ok(builder.build())
}

fn substring(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let end = str_length(ctx.factory, &this)?;
    slice(ctx, site, builder, &this, site.arg(0)?, &end)
}

fn substring_range(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    slice(ctx, site, builder, &this, site.arg(0)?, site.arg(1)?)
}

/// `substring(this, begin, end)` when `end - begin >= 0`, `null` otherwise, with the same
/// bounds as the structural model.
fn slice(
    ctx: &DesugarContext<'_>,
    site: &CallSite<'_>,
    mut builder: StateBuilder,
    this: &Term,
    begin: &Term,
    end: &Term,
) -> Result<PredicateState> {
    let tf = ctx.factory;
    builder
        .assume(&tf.ge(begin, &tf.int(0))?)?
        .assume(&tf.le(end, &str_length(tf, this)?)?)?;
    let result = tf.fresh_var("res", TermType::string());
    let count = tf.sub(end, begin)?;
    let non_negative = tf.fresh_var("nonNegative", TermType::Bool);
    builder.state(&non_negative, &tf.ge(&count, &tf.int(0))?)?;

    let mut taken = ctx.builder(site);
    taken
        .path(&non_negative)?
        .state(
            &result,
            &tf.str_op(StrOp::Substring, &[this.clone(), begin.clone(), end.clone()])?,
        )?
        .assume(&tf.eq(&str_length(tf, &result)?, &count)?)?;
    let mut empty = ctx.builder(site);
    empty
        .path(&tf.not(&non_negative)?)?
        .state(&result, &tf.null())?;

    builder.choice(vec![taken.build(), empty.build()]);
    if let Some(lhv) = site.lhv {
        builder.state(lhv, &result)?;
    }
    Ok(builder.build())
}

fn concat(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let other = site.arg(0)?;
    non_null(ctx, &mut builder, other)?;
    let result = site.result(tf, TermType::string());
    let total = tf.add(&str_length(tf, &this)?, &str_length(tf, other)?)?;
    builder
        .state(&result, &tf.str_op(StrOp::Concat, &[this.clone(), other.clone()])?)?
        .assume(&tf.eq(&str_length(tf, &result)?, &total)?)?;
    Ok(builder.build())
}

fn contains(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let needle = site.arg(0)?;
    non_null(ctx, &mut builder, needle)?;
    let result = site.result(tf, TermType::Bool);
    let fits = tf.le(&str_length(tf, needle)?, &str_length(tf, &this)?)?;
    builder
        .state(&result, &tf.str_op(StrOp::Contains, &[this.clone(), needle.clone()])?)?
        .assume(&implied(tf, &result, &fits)?)?;
    Ok(builder.build())
}

fn compare_to(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let other = site.arg(0)?;
    non_null(ctx, &mut builder, other)?;
    let result = site.result(tf, TermType::INT);
    builder.state(&result, &tf.str_op(StrOp::Compare, &[this.clone(), other.clone()])?)?;
    Ok(builder.build())
}

fn to_string(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    if let Some(lhv) = site.lhv {
        builder.state(lhv, &this)?;
    }
    Ok(builder.build())
}

fn to_char_array(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let init = tf.index_lambda(|i| tf.str_op(StrOp::CharAt, &[this.clone(), i.clone()]))?;
    let result = site.result(tf, TermType::char_array());
    builder.state(
        &result,
        &tf.generate_array(&TermType::CHAR, &str_length(tf, &this)?, &init)?,
    )?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{Predicate, PredicateKind},
        term::{TermKind, STRING_CLASS},
    };

    fn desugar(
        tf: &TermFactory,
        method: StringMethod,
        lhv: Option<&Term>,
        owner: &Term,
        args: &[Term],
    ) -> PredicateState {
        let call = tf.call(owner, &method.method_ref(), args).unwrap();
        let predicate = Predicate::call(lhv, &call).unwrap();
        let site = CallSite::of(&predicate).unwrap();
        let adapter = ADAPTERS.iter().find(|(m, _)| *m == method).unwrap().1;
        adapter(&DesugarContext::new(tf), &site).unwrap()
    }

    fn rendered(state: &PredicateState) -> Vec<String> {
        state.predicates().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_length_axiom() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let n = tf.var("n", TermType::INT);
        let state = desugar(&tf, StringMethod::Length, Some(&n), &s, &[]);
        assert_eq!(
            rendered(&state),
            vec!["@A (s != null)", "n = length(s)", "@A (n >= 0)"]
        );
    }

    #[test]
    fn test_char_at_bounds() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let c = tf.var("c", TermType::CHAR);
        let i = tf.var("i", TermType::INT);
        let state = desugar(&tf, StringMethod::CharAt, Some(&c), &s, &[i]);
        assert_eq!(
            rendered(&state),
            vec![
                "@A (s != null)",
                "@A (i >= 0)",
                "@A (i < length(s))",
                "c = charAt(s, i)"
            ]
        );
    }

    #[test]
    fn test_index_of_located() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let t = tf.var("t", TermType::string());
        let k = tf.var("k", TermType::INT);
        let state = desugar(&tf, StringMethod::IndexOf, Some(&k), &s, &[t]);
        let lines = rendered(&state);
        assert_eq!(lines[2], "k = indexOf(s, t, 0)");
        assert_eq!(lines[4], "@A ((k == -1) | startsWith(s, t, k))");
    }

    #[test]
    fn test_constructor_rebinds_variable_receiver() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let state = desugar(&tf, StringMethod::EmptyInit, None, &s, &[]);
        assert_eq!(rendered(&state), vec!["s = \"\""]);
    }

    #[test]
    fn test_constructor_on_field_is_kept() {
        let tf = TermFactory::new();
        let holder = tf.var("h", TermType::class("Holder"));
        let field = crate::term::FieldRef::new("Holder", "name", TermType::string());
        let owner = tf.load_field(&holder, &field).unwrap();
        let state = desugar(&tf, StringMethod::EmptyInit, None, &owner, &[]);
        let predicates = state.predicates();
        assert_eq!(predicates.len(), 1);
        match predicates[0].kind() {
            PredicateKind::Call { call, .. } => match call.kind() {
                TermKind::Call { method, .. } => assert_eq!(&*method.class, STRING_CLASS),
                other => panic!("unexpected term {other:?}"),
            },
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_inline_equals_checks_type() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let o = tf.var("o", TermType::object());
        let term = inline(&tf, StringMethod::Equals, &s, &[o]).unwrap().unwrap();
        assert_eq!(
            term.to_string(),
            "ite((o instanceof java/lang/String), equals(s, ((java/lang/String) o)), false)"
        );
        assert!(inline(&tf, StringMethod::ToCharArray, &s, &[]).unwrap().is_none());
    }
}
