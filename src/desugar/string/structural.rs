//! Structural string model.
//!
//! A string is a heap object whose `value` field holds its characters as a `char[]`.
//! Every operation reads the arrays it needs, assumes they are non-null, and expresses its
//! result through array lengths, element loads, generated arrays and bounded quantifiers.
//!
//! # Models
//!
//! | Method | Model |
//! |--------|-------|
//! | `<init>()` | `value := new char[0]` |
//! | `<init>(String s)` | `value := s.value` |
//! | `<init>(char[] a)` | `value :=` copy of `a` |
//! | `<init>(char[] a, off, n)` | `value :=` copy of `a[off..off+n]`, bounds assumed |
//! | `length()` | `value.length` |
//! | `isEmpty()` | `value.length == 0` |
//! | `charAt(i)` | `value[i]`, `0 <= i < value.length` assumed |
//! | `equals(o)` | null / type / length branches, element-wise quantifier |
//! | `startsWith(p[, k])` | offset and remaining-length branches, element-wise quantifier |
//! | `endsWith(p)` | length branch, element-wise quantifier at `length - p.length` |
//! | `substring(b[, e])`, `subSequence(b, e)` | fresh copy when `e - b >= 0`, else `null` |
//! | `concat(t)` | fresh array selecting from both operands by index |
//! | `toString()` | the receiver |
//! | `toCharArray()` | fresh copy of `value` |
//!
//! The `CharSequence` variants of `length`, `charAt`, `subSequence` and `toString` cast
//! the receiver to `String` and share the `String` models.

use crate::{
    desugar::{
        string::{non_null, receiver, value_field, StringMethod},
        Adapter, AdapterRegistry, CallSite, DesugarContext,
    },
    state::{PredicateState, StateBuilder},
    term::{Term, TermFactory, TermType},
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
];

/// Registers the structural string adapters.
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
    let string = TermType::string();
    let this = tf.cast(owner, &string)?;
    let chars = |s: &Term| tf.load_field(s, &value_field());
    let arg = |i: usize| args.get(i).cloned();
    Ok(match method {
        StringMethod::Length | StringMethod::SequenceLength => Some(tf.length(&chars(&this)?)?),
        StringMethod::IsEmpty => Some(tf.eq(&tf.length(&chars(&this)?)?, &tf.int(0))?),
        StringMethod::CharAt | StringMethod::SequenceCharAt => match arg(0) {
            Some(index) => Some(tf.load_element(&chars(&this)?, &index)?),
            None => None,
        },
        StringMethod::Equals => match arg(0) {
            Some(other) => {
                let this_chars = chars(&this)?;
                let other_chars = chars(&tf.cast(&other, &string)?)?;
                let this_length = tf.length(&this_chars)?;
                let same = tf.and(
                    &tf.eq(&this_length, &tf.length(&other_chars)?)?,
                    &region_equals(tf, &this_chars, &tf.int(0), &other_chars, &this_length)?,
                )?;
                let typed = tf.ite(&tf.instance_of(&other, &string)?, &same, &tf.bool(false))?;
                Some(tf.ite(&tf.eq(&other, &tf.null())?, &tf.bool(false), &typed)?)
            }
            None => None,
        },
        StringMethod::ToString | StringMethod::SequenceToString => Some(this),
        StringMethod::ToCharArray => Some(chars(&this)?),
        _ => None,
    })
}

/// Loads `string.value` into a fresh variable and assumes it is non-null.
fn chars(ctx: &DesugarContext<'_>, builder: &mut StateBuilder, string: &Term) -> Result<Term> {
    let tf = ctx.factory;
    let value = tf.fresh_var("value", TermType::char_array());
    builder.state(&value, &tf.load_field(string, &value_field())?)?;
    non_null(ctx, builder, &value)?;
    Ok(value)
}

fn length_of(ctx: &DesugarContext<'_>, builder: &mut StateBuilder, array: &Term) -> Result<Term> {
    let tf = ctx.factory;
    let length = tf.fresh_var("length", TermType::INT);
    builder.state(&length, &tf.length(array)?)?;
    Ok(length)
}

/// `forAll i in [0, count): this[offset + i] == other[i]`
fn region_equals(
    tf: &TermFactory,
    this: &Term,
    offset: &Term,
    other: &Term,
    count: &Term,
) -> Result<Term> {
    let body = tf.index_lambda(|i| {
        tf.eq(
            &tf.load_element(this, &tf.add(offset, i)?)?,
            &tf.load_element(other, i)?,
        )
    })?;
    tf.for_all(&tf.int(0), count, &body)
}

/// Binds a fresh `char[]` holding `source[offset..offset + count]`.
fn copy(
    ctx: &DesugarContext<'_>,
    builder: &mut StateBuilder,
    source: &Term,
    offset: &Term,
    count: &Term,
) -> Result<Term> {
    let tf = ctx.factory;
    let init = tf.index_lambda(|i| tf.load_element(source, &tf.add(offset, i)?))?;
    let chars = tf.fresh_var("chars", TermType::char_array());
    builder.state(&chars, &tf.generate_array(&TermType::CHAR, count, &init)?)?;
    Ok(chars)
}

/// Binds `result` to a new string holding `chars`.
fn new_string(
    ctx: &DesugarContext<'_>,
    builder: &mut StateBuilder,
    result: &Term,
    chars: &Term,
) -> Result<()> {
    let tf = ctx.factory;
    builder
        .state(result, &tf.new_object(&TermType::string())?)?
        .store(&tf.field(result, &value_field())?, chars)?;
    Ok(())
}

/// Binds the call's result variable, if any, to `result` and finishes the state.
fn finish(mut builder: StateBuilder, site: &CallSite<'_>, result: &Term) -> Result<PredicateState> {
    if let Some(lhv) = site.lhv {
        builder.state(lhv, result)?;
    }
    Ok(builder.build())
}

fn store_value(
    ctx: &DesugarContext<'_>,
    mut builder: StateBuilder,
    this: &Term,
    chars: &Term,
) -> Result<PredicateState> {
    builder.store(&ctx.factory.field(this, &value_field())?, chars)?;
    Ok(builder.build())
}

fn empty_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = tf.fresh_var("chars", TermType::char_array());
    builder.state(&chars, &tf.new_array(&TermType::CHAR, &tf.int(0))?)?;
    store_value(ctx, builder, &this, &chars)
}

fn copy_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let original = site.arg(0)?;
    non_null(ctx, &mut builder, original)?;
    let chars = chars(ctx, &mut builder, original)?;
    store_value(ctx, builder, &this, &chars)
}

fn char_array_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let source = site.arg(0)?;
    non_null(ctx, &mut builder, source)?;
    let length = length_of(ctx, &mut builder, source)?;
    let chars = copy(ctx, &mut builder, source, &tf.int(0), &length)?;
    store_value(ctx, builder, &this, &chars)
}

fn char_array_range_init(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let (source, offset, count) = (site.arg(0)?, site.arg(1)?, site.arg(2)?);
    non_null(ctx, &mut builder, source)?;
    let length = length_of(ctx, &mut builder, source)?;
    builder
        .assume(&tf.ge(offset, &tf.int(0))?)?
        .assume(&tf.ge(count, &tf.int(0))?)?
        .assume(&tf.le(offset, &tf.sub(&length, count)?)?)?;
    let chars = copy(ctx, &mut builder, source, offset, count)?;
    store_value(ctx, builder, &this, &chars)
}

fn length(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = chars(ctx, &mut builder, &this)?;
    let result = site.result(tf, TermType::INT);
    builder.state(&result, &tf.length(&chars)?)?;
    Ok(builder.build())
}

fn is_empty(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = chars(ctx, &mut builder, &this)?;
    let result = site.result(tf, TermType::Bool);
    builder.state(&result, &tf.eq(&tf.length(&chars)?, &tf.int(0))?)?;
    Ok(builder.build())
}

fn char_at(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let index = site.arg(0)?;
    let chars = chars(ctx, &mut builder, &this)?;
    let length = length_of(ctx, &mut builder, &chars)?;
    builder
        .assume(&tf.ge(index, &tf.int(0))?)?
        .assume(&tf.lt(index, &length)?)?;
    let result = site.result(tf, TermType::CHAR);
    builder.state(&result, &tf.load_element(&chars, index)?)?;
    Ok(builder.build())
}

fn equals(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let string = TermType::string();
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let other = site.arg(0)?;
    let result = tf.fresh_var("res", TermType::Bool);

    let is_null = tf.fresh_var("isNull", TermType::Bool);
    let is_string = tf.fresh_var("isString", TermType::Bool);
    builder
        .state(&is_null, &tf.eq(other, &tf.null())?)?
        .state(&is_string, &tf.instance_of(other, &string)?)?;

    let mut null = ctx.builder(site);
    null.path(&is_null)?.state(&result, &tf.bool(false))?;

    let mut foreign = ctx.builder(site);
    foreign
        .path(&tf.not(&is_null)?)?
        .path(&tf.not(&is_string)?)?
        .state(&result, &tf.bool(false))?;

    let mut compared = ctx.builder(site);
    compared.path(&tf.not(&is_null)?)?.path(&is_string)?;
    let cast = tf.fresh_var("other", string.clone());
    compared.state(&cast, &tf.cast(other, &string)?)?;
    let this_chars = chars(ctx, &mut compared, &this)?;
    let other_chars = chars(ctx, &mut compared, &cast)?;
    let this_length = length_of(ctx, &mut compared, &this_chars)?;
    let other_length = length_of(ctx, &mut compared, &other_chars)?;
    let same_length = tf.fresh_var("lengthEquals", TermType::Bool);
    compared.state(&same_length, &tf.eq(&this_length, &other_length)?)?;

    let mut same = ctx.builder(site);
    same.path(&same_length)?.state(
        &result,
        &region_equals(tf, &this_chars, &tf.int(0), &other_chars, &this_length)?,
    )?;
    let mut different = ctx.builder(site);
    different
        .path(&tf.not(&same_length)?)?
        .state(&result, &tf.bool(false))?;
    compared.choice(vec![same.build(), different.build()]);

    builder.choice(vec![null.build(), foreign.build(), compared.build()]);
    finish(builder, site, &result)
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
    let this_chars = chars(ctx, &mut builder, &this)?;
    let prefix_chars = chars(ctx, &mut builder, prefix)?;
    let this_length = length_of(ctx, &mut builder, &this_chars)?;
    let prefix_length = length_of(ctx, &mut builder, &prefix_chars)?;
    let result = tf.fresh_var("res", TermType::Bool);

    let in_range = tf.fresh_var("inRange", TermType::Bool);
    let fits = tf.fresh_var("fits", TermType::Bool);
    builder
        .state(&in_range, &tf.ge(offset, &tf.int(0))?)?
        .state(&fits, &tf.ge(&tf.sub(&this_length, offset)?, &prefix_length)?)?;

    let mut matching = ctx.builder(site);
    matching.path(&fits)?.state(
        &result,
        &region_equals(tf, &this_chars, offset, &prefix_chars, &prefix_length)?,
    )?;
    let mut short = ctx.builder(site);
    short.path(&tf.not(&fits)?)?.state(&result, &tf.bool(false))?;

    let mut inside = ctx.builder(site);
    inside
        .path(&in_range)?
        .choice(vec![matching.build(), short.build()]);
    let mut outside = ctx.builder(site);
    outside
        .path(&tf.not(&in_range)?)?
        .state(&result, &tf.bool(false))?;

    builder.choice(vec![inside.build(), outside.build()]);
    finish(builder, site, &result)
}

fn ends_with(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let suffix = site.arg(0)?;
    non_null(ctx, &mut builder, suffix)?;
    let this_chars = chars(ctx, &mut builder, &this)?;
    let suffix_chars = chars(ctx, &mut builder, suffix)?;
    let this_length = length_of(ctx, &mut builder, &this_chars)?;
    let suffix_length = length_of(ctx, &mut builder, &suffix_chars)?;
    let result = tf.fresh_var("res", TermType::Bool);

    let offset = tf.fresh_var("offset", TermType::INT);
    let fits = tf.fresh_var("fits", TermType::Bool);
    builder
        .state(&offset, &tf.sub(&this_length, &suffix_length)?)?
        .state(&fits, &tf.ge(&offset, &tf.int(0))?)?;

    let mut matching = ctx.builder(site);
    matching.path(&fits)?.state(
        &result,
        &region_equals(tf, &this_chars, &offset, &suffix_chars, &suffix_length)?,
    )?;
    let mut short = ctx.builder(site);
    short.path(&tf.not(&fits)?)?.state(&result, &tf.bool(false))?;

    builder.choice(vec![matching.build(), short.build()]);
    finish(builder, site, &result)
}

fn substring(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = chars(ctx, &mut builder, &this)?;
    let end = length_of(ctx, &mut builder, &chars)?;
    slice(ctx, site, builder, &chars, site.arg(0)?, &end)
}

fn substring_range(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = chars(ctx, &mut builder, &this)?;
    slice(ctx, site, builder, &chars, site.arg(0)?, site.arg(1)?)
}

/// The string of `chars[begin..end]`: a fresh copy when `end - begin >= 0`, `null`
/// otherwise. The bounds `0 <= begin` and `end <= chars.length` are assumed.
fn slice(
    ctx: &DesugarContext<'_>,
    site: &CallSite<'_>,
    mut builder: StateBuilder,
    chars: &Term,
    begin: &Term,
    end: &Term,
) -> Result<PredicateState> {
    let tf = ctx.factory;
    let length = length_of(ctx, &mut builder, chars)?;
    builder
        .assume(&tf.ge(begin, &tf.int(0))?)?
        .assume(&tf.le(end, &length)?)?;
    let result = tf.fresh_var("res", TermType::string());

    let count = tf.fresh_var("count", TermType::INT);
    let non_negative = tf.fresh_var("nonNegative", TermType::Bool);
    builder
        .state(&count, &tf.sub(end, begin)?)?
        .state(&non_negative, &tf.ge(&count, &tf.int(0))?)?;

    let mut copied = ctx.builder(site);
    copied.path(&non_negative)?;
    let copy = copy(ctx, &mut copied, chars, begin, &count)?;
    new_string(ctx, &mut copied, &result, &copy)?;
    let mut empty = ctx.builder(site);
    empty
        .path(&tf.not(&non_negative)?)?
        .state(&result, &tf.null())?;

    builder.choice(vec![copied.build(), empty.build()]);
    finish(builder, site, &result)
}

fn concat(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let other = site.arg(0)?;
    non_null(ctx, &mut builder, other)?;
    let this_chars = chars(ctx, &mut builder, &this)?;
    let other_chars = chars(ctx, &mut builder, other)?;
    let this_length = length_of(ctx, &mut builder, &this_chars)?;
    let other_length = length_of(ctx, &mut builder, &other_chars)?;

    let total = tf.fresh_var("length", TermType::INT);
    builder.state(&total, &tf.add(&this_length, &other_length)?)?;
    let init = tf.index_lambda(|i| {
        tf.ite(
            &tf.lt(i, &this_length)?,
            &tf.load_element(&this_chars, i)?,
            &tf.load_element(&other_chars, &tf.sub(i, &this_length)?)?,
        )
    })?;
    let chars = tf.fresh_var("chars", TermType::char_array());
    builder.state(&chars, &tf.generate_array(&TermType::CHAR, &total, &init)?)?;

    let result = tf.fresh_var("res", TermType::string());
    new_string(ctx, &mut builder, &result, &chars)?;
    finish(builder, site, &result)
}

fn to_string(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    finish(builder, site, &this)
}

fn to_char_array(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    let tf = ctx.factory;
    let mut builder = ctx.builder(site);
    let this = receiver(ctx, &mut builder, site)?;
    let chars = chars(ctx, &mut builder, &this)?;
    let length = length_of(ctx, &mut builder, &chars)?;
    let copy = copy(ctx, &mut builder, &chars, &tf.int(0), &length)?;
    finish(builder, site, &copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{Location, Predicate, PredicateKind},
        term::TermKind,
    };

    fn desugar(
        tf: &TermFactory,
        method: StringMethod,
        lhv: Option<&Term>,
        owner: &Term,
        args: &[Term],
    ) -> PredicateState {
        let call = tf.call(owner, &method.method_ref(), args).unwrap();
        let predicate = Predicate::call(lhv, &call)
            .unwrap()
            .at(Location::new("Main.run", 7));
        let site = CallSite::of(&predicate).unwrap();
        let ctx = DesugarContext::new(tf);
        let adapter = ADAPTERS.iter().find(|(m, _)| *m == method).unwrap().1;
        adapter(&ctx, &site).unwrap()
    }

    fn rendered(state: &PredicateState) -> Vec<String> {
        state.predicates().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_length_reads_value_array() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let n = tf.var("n", TermType::INT);
        let state = desugar(&tf, StringMethod::Length, Some(&n), &s, &[]);

        let lines = rendered(&state);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "@A (s != null)");
        assert!(lines[1].ends_with(" = *s.value"));
        assert!(lines[3].starts_with("n = "));
        assert!(state
            .predicates()
            .iter()
            .all(|p| p.location() == &Location::new("Main.run", 7)));
    }

    #[test]
    fn test_char_at_assumes_bounds() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let c = tf.var("c", TermType::CHAR);
        let i = tf.var("i", TermType::INT);
        let state = desugar(&tf, StringMethod::CharAt, Some(&c), &s, &[i]);

        let assumes: Vec<String> = state
            .predicates()
            .iter()
            .filter(|p| matches!(p.kind(), PredicateKind::Assume(_)))
            .map(|p| p.to_string())
            .collect();
        assert_eq!(assumes.len(), 4);
        assert_eq!(assumes[2], "@A (i >= 0)");
        assert!(assumes[3].starts_with("@A (i < "));
    }

    #[test]
    fn test_equals_has_three_branches() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let o = tf.var("o", TermType::object());
        let r = tf.var("r", TermType::Bool);
        let state = desugar(&tf, StringMethod::Equals, Some(&r), &s, &[o]);

        let choices: Vec<usize> = state
            .segments()
            .iter()
            .filter_map(|segment| match segment {
                crate::state::Segment::Choice(branches) => Some(branches.len()),
                crate::state::Segment::Block(_) => None,
            })
            .collect();
        assert_eq!(choices, vec![3]);
        assert!(rendered(&state).last().unwrap().starts_with("r = "));
    }

    #[test]
    fn test_sequence_receiver_is_cast() {
        let tf = TermFactory::new();
        let cs = tf.var("cs", TermType::char_sequence());
        let n = tf.var("n", TermType::INT);
        let state = desugar(&tf, StringMethod::SequenceLength, Some(&n), &cs, &[]);

        let first = state.predicates()[0].clone();
        match first.kind() {
            PredicateKind::Assign { rhv, .. } => {
                assert!(matches!(rhv.kind(), TermKind::Cast { .. }));
                assert_eq!(*rhv.ty(), TermType::string());
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_discarded_result_still_constrains() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let state = desugar(&tf, StringMethod::CharAt, None, &s, &[tf.int(3)]);
        assert!(rendered(&state).iter().any(|line| line == "@A (3 >= 0)"));
    }

    #[test]
    fn test_inline_equals_compares_lengths() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let o = tf.var("o", TermType::object());
        let term = inline(&tf, StringMethod::Equals, &s, &[o]).unwrap().unwrap();
        assert_eq!(*term.ty(), TermType::Bool);
        assert!(term.to_string().contains("forAll"));
        assert!(inline(&tf, StringMethod::Concat, &s, &[s.clone()]).unwrap().is_none());
    }
}
