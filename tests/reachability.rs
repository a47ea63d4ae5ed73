//! Reachability integration tests.
//!
//! These tests drive complete queries through the public API:
//! 1. Build predicate states with `StateBuilder`
//! 2. Register them in a map-backed `StateSupplier`
//! 3. Check points with `Checker` and the bounded backend
//! 4. Verify verdicts, models and diagnostics

use std::{collections::HashMap, sync::Arc};

use pathscope::{
    checker::{Checker, MemorySink, ProgramPoint, TraceRecord, NO_STATE},
    state::{PredicateState, StateBuilder},
    term::TermType,
    CheckerConfig, Result, Session, SolverResult,
};

fn checker_for(
    session: &Session,
    states: Vec<(ProgramPoint, PredicateState)>,
) -> Result<Checker> {
    let states: HashMap<ProgramPoint, PredicateState> = states.into_iter().collect();
    Checker::new(session.clone(), states, CheckerConfig::default())
}

#[test]
fn test_interval_has_single_witness() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);

    let mut builder = StateBuilder::new();
    builder
        .path(&tf.gt(&x, &tf.int(10))?)?
        .path(&tf.lt(&x, &tf.int(12))?)?;
    let point = ProgramPoint::new("Main.run", 3);
    let checker = checker_for(&session, vec![(point.clone(), builder.build())])?;

    let result = checker.check_reachable(&point)?;
    assert!(result.is_sat(), "expected SAT, got {result}");
    assert_eq!(result.model().and_then(|m| m.int("x")), Some(11));
    Ok(())
}

#[test]
fn test_contradicting_definition_unsat() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);

    // x == -5 && x > 0
    let mut builder = StateBuilder::new();
    builder
        .path(&tf.eq(&x, &tf.int(-5))?)?
        .path(&tf.gt(&x, &tf.int(0))?)?;
    let point = ProgramPoint::new("Main.run", 4);
    let checker = checker_for(&session, vec![(point.clone(), builder.build())])?;

    assert_eq!(checker.check_reachable(&point)?, SolverResult::Unsat);
    Ok(())
}

#[test]
fn test_point_inside_branch() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);
    let positive = tf.gt(&x, &tf.int(0))?;

    // A point inside the `x > 0` branch of `if (x > 0) ... else ...`
    let mut branch = StateBuilder::new();
    branch.path(&positive)?;
    let mut pinned = StateBuilder::new();
    pinned.assume(&tf.eq(&x, &tf.int(-5))?)?.path(&positive)?;

    let free = ProgramPoint::new("Main.sign", 1);
    let fixed = ProgramPoint::new("Main.sign", 2);
    let checker = checker_for(
        &session,
        vec![(free.clone(), branch.build()), (fixed.clone(), pinned.build())],
    )?;

    let result = checker.check_reachable(&free)?;
    let witness = result.model().and_then(|m| m.int("x"));
    assert!(witness.is_some_and(|x| x > 0), "expected a positive witness, got {result}");
    assert!(checker.check_reachable(&fixed)?.is_unsat());
    Ok(())
}

#[test]
fn test_branch_assignments() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let y = tf.var("y", TermType::INT);

    // if (...) y = 1 else y = 2
    let mut then = StateBuilder::new();
    then.state(&y, &tf.int(1))?;
    let mut otherwise = StateBuilder::new();
    otherwise.state(&y, &tf.int(2))?;

    let mut reachable = StateBuilder::new();
    reachable
        .choice(vec![then.current(), otherwise.current()])
        .path(&tf.eq(&y, &tf.int(2))?)?;
    let mut dead = StateBuilder::new();
    dead.choice(vec![then.build(), otherwise.build()])
        .path(&tf.eq(&y, &tf.int(3))?)?;

    let live_point = ProgramPoint::new("Main.branch", 1);
    let dead_point = ProgramPoint::new("Main.branch", 2);
    let checker = checker_for(
        &session,
        vec![
            (live_point.clone(), reachable.build()),
            (dead_point.clone(), dead.build()),
        ],
    )?;

    assert!(checker.check_reachable(&live_point)?.is_sat());
    assert!(checker.check_reachable(&dead_point)?.is_unsat());
    Ok(())
}

#[test]
fn test_allocated_array_length_is_known() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let a = tf.var("a", TermType::array(TermType::INT));
    let first = tf.element(&a, &tf.int(0))?;

    let mut builder = StateBuilder::new();
    builder
        .state(&a, &tf.new_array(&TermType::INT, &tf.int(3))?)?
        .store(&first, &tf.int(7))?;
    let base = builder.current();

    let mut sized = StateBuilder::from_state(base.clone());
    sized.path(&tf.eq(&tf.length(&a)?, &tf.int(3))?)?;
    let mut resized = StateBuilder::from_state(base.clone());
    resized.path(&tf.eq(&tf.length(&a)?, &tf.int(4))?)?;
    let mut stored = StateBuilder::from_state(base);
    stored.path(&tf.eq(&tf.load(&first), &tf.int(7))?)?;

    let points: Vec<ProgramPoint> = (0..3).map(|i| ProgramPoint::new("Arrays.fill", i)).collect();
    let checker = checker_for(
        &session,
        vec![
            (points[0].clone(), sized.build()),
            (points[1].clone(), resized.build()),
            (points[2].clone(), stored.build()),
        ],
    )?;

    assert!(checker.check_reachable(&points[0])?.is_sat());
    assert!(checker.check_reachable(&points[1])?.is_unsat());
    assert!(checker.check_reachable(&points[2])?.is_sat());
    Ok(())
}

#[test]
fn test_check_many_keeps_point_order() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);

    let mut sat = StateBuilder::new();
    sat.path(&tf.eq(&x, &tf.int(1))?)?;
    let mut unsat = StateBuilder::new();
    unsat
        .path(&tf.eq(&x, &tf.int(1))?)?
        .path(&tf.eq(&x, &tf.int(2))?)?;

    let a = ProgramPoint::new("Main.a", 0);
    let b = ProgramPoint::new("Main.b", 0);
    let missing = ProgramPoint::new("Main.c", 0);
    let checker = checker_for(
        &session,
        vec![(a.clone(), sat.build()), (b.clone(), unsat.build())],
    )?;

    let results = checker.check_many(&[b, missing, a]);
    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().is_ok_and(SolverResult::is_unsat));
    assert_eq!(
        results[1].as_ref().ok(),
        Some(&SolverResult::Unknown(NO_STATE.to_string()))
    );
    assert!(results[2].as_ref().is_ok_and(SolverResult::is_sat));
    Ok(())
}

#[test]
fn test_sink_sees_every_query() -> Result<()> {
    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);
    let y = tf.var("y", TermType::INT);

    let mut builder = StateBuilder::new();
    builder
        .state(&y, &tf.add(&x, &tf.int(1))?)?
        .path(&tf.eq(&y, &tf.int(8))?)?;
    let point = ProgramPoint::new("Main.next", 5);
    let sink = Arc::new(MemorySink::new());
    let checker =
        checker_for(&session, vec![(point.clone(), builder.build())])?.with_sink(sink.clone());

    let result = checker.check_reachable(&point)?;
    assert_eq!(result.model().and_then(|m| m.int("x")), Some(7));

    let records = sink.records_for(&point);
    assert_eq!(records.len(), 4);
    assert!(matches!(records[0], TraceRecord::PointRecognized { predicates: 2, .. }));
    match records.last() {
        Some(TraceRecord::Verdict { result: verdict, .. }) => assert_eq!(verdict, &result),
        other => panic!("expected a verdict record, got {other:?}"),
    }
    Ok(())
}

#[cfg(feature = "z3")]
#[test]
fn test_z3_backend_agrees() -> Result<()> {
    use pathscope::solver::Z3Solver;

    let session = Session::new();
    let tf = session.factory();
    let x = tf.var("x", TermType::INT);
    let y = tf.var("y", TermType::INT);

    let mut builder = StateBuilder::new();
    builder
        .state(&y, &tf.add(&x, &tf.int(100))?)?
        .path(&tf.gt(&y, &tf.int(1000))?)?
        .path(&tf.lt(&x, &tf.int(902))?)?;
    let point = ProgramPoint::new("Main.wide", 1);
    let config = CheckerConfig::default();
    let checker = checker_for(&session, vec![(point.clone(), builder.build())])?
        .with_backend(Z3Solver::new(config.solver.clone()));

    let result = checker.check_reachable(&point)?;
    assert_eq!(checker.backend_name(), "z3");
    assert_eq!(result.model().and_then(|m| m.int("x")), Some(901));
    Ok(())
}
