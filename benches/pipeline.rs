//! Benchmarks for state preparation and solving.
//!
//! Measures the stages of a reachability query on synthetic states:
//! - Rewrite pipeline on long straight-line states
//! - Rewrite pipeline on nested choices
//! - Structural and opaque string desugaring
//! - Complete queries through the checker

extern crate pathscope;

use std::{collections::HashMap, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pathscope::{
    checker::{Checker, ProgramPoint},
    config::StringStrategy,
    desugar::{string::StringMethod, Desugarer},
    pipeline::{EventLog, PassContext, PassPipeline, StatePass, TypePointsTo},
    state::{PredicateState, StateBuilder},
    term::{TermFactory, TermType},
    CheckerConfig, PipelineConfig, Session,
};

/// `x0 = 1; x1 = x0 + 1; ...; path x{n-1} > n / 2`
fn chain(tf: &TermFactory, length: usize) -> PredicateState {
    let mut builder = StateBuilder::new();
    let mut prev = tf.var("x0", TermType::INT);
    builder.state(&prev, &tf.int(1)).unwrap();
    for i in 1..length {
        let next = tf.var(&format!("x{i}"), TermType::INT);
        builder.state(&next, &tf.add(&prev, &tf.int(1)).unwrap()).unwrap();
        prev = next;
    }
    builder
        .path(&tf.gt(&prev, &tf.int((length / 2) as i64)).unwrap())
        .unwrap();
    builder.build()
}

/// `depth` nested two-way choices over input flags, each assigning a counter.
fn diamonds(tf: &TermFactory, depth: usize) -> PredicateState {
    let mut state = PredicateState::empty();
    for i in 0..depth {
        let flag = tf.var(&format!("flag{i}"), TermType::Bool);
        let counter = tf.var(&format!("c{i}"), TermType::INT);
        let mut then = StateBuilder::new();
        then.path(&flag).unwrap().state(&counter, &tf.int(1)).unwrap();
        let mut otherwise = StateBuilder::new();
        otherwise
            .path(&tf.not(&flag).unwrap())
            .unwrap()
            .state(&counter, &tf.int(0))
            .unwrap();
        state = state.then(&PredicateState::choice(vec![then.build(), otherwise.build()]));
    }
    state
}

/// A series of `length()` and `charAt(0)` calls on string literals.
fn string_calls(tf: &TermFactory, count: usize) -> PredicateState {
    let mut builder = StateBuilder::new();
    for i in 0..count {
        let s = tf.var(&format!("s{i}"), TermType::string());
        let n = tf.var(&format!("n{i}"), TermType::INT);
        let c = tf.var(&format!("c{i}"), TermType::CHAR);
        builder
            .state(&s, &tf.string("benchmark"))
            .unwrap()
            .call(
                Some(&n),
                &tf.call(&s, &StringMethod::Length.method_ref(), &[]).unwrap(),
            )
            .unwrap()
            .call(
                Some(&c),
                &tf.call(&s, &StringMethod::CharAt.method_ref(), &[tf.int(0)])
                    .unwrap(),
            )
            .unwrap();
    }
    builder.build()
}

fn bench_pipeline_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_chain");
    for length in [16, 64, 256] {
        let session = Session::new();
        let tf = session.factory();
        let state = chain(tf, length);
        let pipeline = PassPipeline::from_config(&PipelineConfig::default());

        group.bench_with_input(BenchmarkId::from_parameter(length), &state, |b, state| {
            b.iter(|| {
                let events = EventLog::new();
                let ctx = PassContext::new(tf, &events, &TypePointsTo);
                black_box(pipeline.run(black_box(state), &ctx).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_pipeline_diamonds(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_diamonds");
    for depth in [4, 8, 16] {
        let session = Session::new();
        let tf = session.factory();
        let state = diamonds(tf, depth);
        let pipeline = PassPipeline::from_config(&PipelineConfig::default());

        group.bench_with_input(BenchmarkId::from_parameter(depth), &state, |b, state| {
            b.iter(|| {
                let events = EventLog::new();
                let ctx = PassContext::new(tf, &events, &TypePointsTo);
                black_box(pipeline.run(black_box(state), &ctx).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_desugar(c: &mut Criterion) {
    let mut group = c.benchmark_group("desugar_strings");
    for strategy in [StringStrategy::Structural, StringStrategy::Opaque] {
        let session = Session::new();
        let tf = session.factory();
        let state = string_calls(tf, 32);
        let desugarer = Desugarer::for_strategy(strategy).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(strategy),
            &state,
            |b, state| {
                b.iter(|| {
                    let events = EventLog::new();
                    let ctx = PassContext::new(tf, &events, &TypePointsTo);
                    black_box(desugarer.run(black_box(state), &ctx).unwrap())
                });
            },
        );
    }
    group.finish();
}

fn bench_check_reachable(c: &mut Criterion) {
    let session = Session::new();
    let tf = session.factory();
    let point = ProgramPoint::new("Bench.run", 0);
    let mut states = HashMap::new();
    states.insert(point.clone(), chain(tf, 64).then(&diamonds(tf, 6)));
    let checker = Checker::new(session.clone(), states, CheckerConfig::default()).unwrap();

    c.bench_function("check_reachable", |b| {
        b.iter(|| black_box(checker.check_reachable(black_box(&point)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_pipeline_chain,
    bench_pipeline_diamonds,
    bench_desugar,
    bench_check_reachable
);
criterion_main!(benches);
