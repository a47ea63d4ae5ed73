//! String modeling integration tests.
//!
//! Every query is checked under both string strategies: the structural heap model over
//! `char[]` and the opaque model over atomic string values. Both must agree on states
//! built from string literals, where no input has to be guessed.

use std::collections::HashMap;

use pathscope::{
    checker::{Checker, ProgramPoint},
    config::StringStrategy,
    desugar::{string::StringMethod, AdapterRegistry, CallSite, DesugarContext},
    state::{PredicateState, StateBuilder},
    term::{Term, TermType},
    CheckerConfig, Error, Result, Session, SolverResult,
};

const STRATEGIES: [StringStrategy; 2] = [StringStrategy::Structural, StringStrategy::Opaque];

/// Checks `state` at a single point under `strategy`.
fn check(session: &Session, state: PredicateState, strategy: StringStrategy) -> Result<SolverResult> {
    let point = ProgramPoint::new("Strings.test", 0);
    let mut states = HashMap::new();
    states.insert(point.clone(), state);
    let config = CheckerConfig::default().with_string_strategy(strategy);
    Checker::new(session.clone(), states, config)?.check_reachable(&point)
}

/// `s = literal; lhv = s.method(args)`, followed by `goal(lhv)` as a path condition.
fn call_on_literal(
    session: &Session,
    literal: &str,
    method: StringMethod,
    args: &[Term],
    result: TermType,
    goal: impl Fn(&Term) -> Result<Term>,
) -> Result<PredicateState> {
    let tf = session.factory();
    let s = tf.var("s", TermType::string());
    let r = tf.var("r", result);
    let mut builder = StateBuilder::new();
    builder
        .state(&s, &tf.string(literal))?
        .call(Some(&r), &tf.call(&s, &method.method_ref(), args)?)?
        .path(&goal(&r)?)?;
    Ok(builder.build())
}

#[test]
fn test_length_of_literal() -> Result<()> {
    for strategy in STRATEGIES {
        let session = Session::new();
        let tf = session.factory();
        let two = call_on_literal(&session, "ab", StringMethod::Length, &[], TermType::INT, |r| {
            tf.eq(r, &tf.int(2))
        })?;
        let three = call_on_literal(&session, "ab", StringMethod::Length, &[], TermType::INT, |r| {
            tf.eq(r, &tf.int(3))
        })?;

        let result = check(&session, two, strategy)?;
        assert!(result.is_sat(), "{strategy}: expected SAT, got {result}");
        let result = check(&session, three, strategy)?;
        assert!(result.is_unsat(), "{strategy}: expected UNSAT, got {result}");
    }
    Ok(())
}

#[test]
fn test_starts_with_literal_prefix() -> Result<()> {
    for strategy in STRATEGIES {
        let session = Session::new();
        let tf = session.factory();
        let prefix = [tf.string("he")];
        let holds = call_on_literal(
            &session,
            "hello",
            StringMethod::StartsWith,
            &prefix,
            TermType::Bool,
            |r| Ok(r.clone()),
        )?;
        let fails = call_on_literal(
            &session,
            "hello",
            StringMethod::StartsWith,
            &prefix,
            TermType::Bool,
            |r| tf.not(r),
        )?;

        assert!(check(&session, holds, strategy)?.is_sat(), "{strategy}");
        assert!(check(&session, fails, strategy)?.is_unsat(), "{strategy}");
    }
    Ok(())
}

#[test]
fn test_foreign_prefix_forces_false() -> Result<()> {
    for strategy in STRATEGIES {
        let session = Session::new();
        let tf = session.factory();
        let prefix = [tf.string("xy")];
        let rejected = call_on_literal(
            &session,
            "abc",
            StringMethod::StartsWith,
            &prefix,
            TermType::Bool,
            |r| tf.not(r),
        )?;
        let accepted = call_on_literal(
            &session,
            "abc",
            StringMethod::StartsWith,
            &prefix,
            TermType::Bool,
            |r| Ok(r.clone()),
        )?;

        let result = check(&session, rejected, strategy)?;
        assert_eq!(result.model().and_then(|m| m.bool("r")), Some(false), "{strategy}");
        assert!(check(&session, accepted, strategy)?.is_unsat(), "{strategy}");
    }
    Ok(())
}

#[test]
fn test_longer_prefix_never_matches() -> Result<()> {
    for strategy in STRATEGIES {
        let session = Session::new();
        let tf = session.factory();
        let prefix = [tf.string("hello!")];
        let state = call_on_literal(
            &session,
            "hello",
            StringMethod::StartsWith,
            &prefix,
            TermType::Bool,
            |r| Ok(r.clone()),
        )?;
        assert!(check(&session, state, strategy)?.is_unsat(), "{strategy}");
    }
    Ok(())
}

#[test]
fn test_empty_substring_is_not_null() -> Result<()> {
    for strategy in STRATEGIES {
        let session = Session::new();
        let tf = session.factory();
        let range = [tf.int(1), tf.int(1)];
        let is_null = call_on_literal(
            &session,
            "abc",
            StringMethod::SubstringRange,
            &range,
            TermType::string(),
            |r| tf.eq(r, &tf.null()),
        )?;
        assert!(check(&session, is_null, strategy)?.is_unsat(), "{strategy}");
    }
    Ok(())
}

#[test]
fn test_for_all_over_empty_range_holds() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let never = tf.index_lambda(|_| Ok(tf.bool(false)))?;

    let mut empty = StateBuilder::new();
    empty.path(&tf.for_all(&tf.int(5), &tf.int(5), &never)?)?;
    let mut single = StateBuilder::new();
    single.path(&tf.for_all(&tf.int(0), &tf.int(1), &never)?)?;

    assert!(check(&session, empty.build(), StringStrategy::Structural)?.is_sat());
    assert!(check(&session, single.build(), StringStrategy::Structural)?.is_unsat());
    Ok(())
}

#[test]
fn test_unmodeled_string_call_is_unknown() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let s = tf.var("s", TermType::string());
    let h = tf.var("h", TermType::INT);
    let hash_code = pathscope::term::MethodRef::new(
        pathscope::term::STRING_CLASS,
        pathscope::term::MethodSignature::new("hashCode", vec![], TermType::INT),
    );
    let mut builder = StateBuilder::new();
    builder
        .state(&s, &tf.string("x"))?
        .call(Some(&h), &tf.call(&s, &hash_code, &[])?)?
        .path(&tf.eq(&h, &tf.int(5))?)?
        .path(&tf.eq(&h, &tf.int(6))?)?;

    for strategy in STRATEGIES {
        let result = check(&session, builder.current(), strategy)?;
        assert!(!result.is_unsat(), "{strategy}: an unmodeled call must not prove UNSAT");
    }
    Ok(())
}

fn noop(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> Result<PredicateState> {
    Ok(ctx.builder(site).build())
}

#[test]
fn test_registry_rejects_duplicates() -> Result<()> {
    for strategy in STRATEGIES {
        let mut registry = AdapterRegistry::for_strategy(strategy)?;
        let before = registry.len();
        match registry.register(StringMethod::Length.key(), noop) {
            Err(Error::DuplicateAdapter(key)) => assert!(key.contains("length")),
            other => panic!("{strategy}: expected a duplicate error, got {other:?}"),
        }
        assert_eq!(registry.len(), before);
    }
    Ok(())
}

#[test]
fn test_char_sequence_keys_are_distinct() -> Result<()> {
    assert_ne!(StringMethod::Length.key(), StringMethod::SequenceLength.key());
    assert_ne!(StringMethod::StartsWith.key(), StringMethod::StartsWithOffset.key());

    for strategy in STRATEGIES {
        let registry = AdapterRegistry::for_strategy(strategy)?;
        assert!(registry.contains(&StringMethod::Length.key()), "{strategy}");
        assert!(registry.contains(&StringMethod::SequenceLength.key()), "{strategy}");
    }
    let opaque = AdapterRegistry::for_strategy(StringStrategy::Opaque)?;
    let structural = AdapterRegistry::for_strategy(StringStrategy::Structural)?;
    assert!(opaque.contains(&StringMethod::IndexOf.key()));
    assert!(!structural.contains(&StringMethod::IndexOf.key()));
    Ok(())
}
