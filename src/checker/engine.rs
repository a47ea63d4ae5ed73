//! The reachability checker.

use std::time::Instant;

use rayon::prelude::*;

use crate::{
    checker::{DiagnosticsSink, LogSink, ProgramPoint, Projection, StateSupplier, TraceRecord},
    config::CheckerConfig,
    desugar::Desugarer,
    pipeline::{EventLog, PassContext, PassPipeline, PointsTo, StatePass, TypePointsTo},
    session::Session,
    solver::{BoundedSolver, SolverBackend, SolverResult},
    state::{PredicateState, PredicateTypes},
    Result,
};

/// Reason reported when the supplier has no state for a point.
pub const NO_STATE: &str = "no state available";

/// A query's state after desugaring and rewriting.
#[derive(Debug)]
pub struct PreparedQuery {
    /// The full state in pipeline normal form.
    pub state: PredicateState,
    /// The path projection of `state`, in pipeline normal form.
    pub path: PredicateState,
    /// Every change made while preparing.
    pub events: EventLog,
}

/// Decides whether program points are reachable.
///
/// A query takes the state the supplier built for the point, replaces library calls by
/// their models, rewrites the state to pipeline normal form, projects the path
/// predicates and hands both to the solving backend exactly once. The verdict is
/// returned as the backend produced it.
///
/// Everything needed per query is built once in the constructor; queries only read the
/// checker, so [`Checker::check_many`] runs them in parallel.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use pathscope::{
///     checker::{Checker, ProgramPoint},
///     state::StateBuilder,
///     term::TermType,
///     CheckerConfig, Session,
/// };
///
/// let session = Session::new();
/// let tf = session.factory();
/// let x = tf.var("x", TermType::INT);
///
/// let mut reachable = StateBuilder::new();
/// reachable.path(&tf.gt(&x, &tf.int(3))?)?;
/// let mut dead = StateBuilder::new();
/// dead.path(&tf.gt(&x, &tf.int(3))?)?.path(&tf.lt(&x, &tf.int(2))?)?;
///
/// let mut states = HashMap::new();
/// states.insert(ProgramPoint::new("Main.run", 1), reachable.build());
/// states.insert(ProgramPoint::new("Main.run", 2), dead.build());
///
/// let checker = Checker::new(session.clone(), states, CheckerConfig::default())?;
/// assert!(checker.check_reachable(&ProgramPoint::new("Main.run", 1))?.is_sat());
/// assert!(checker.check_reachable(&ProgramPoint::new("Main.run", 2))?.is_unsat());
/// assert!(checker.check_reachable(&ProgramPoint::new("Main.run", 3))?.is_unknown());
/// # Ok::<(), pathscope::Error>(())
/// ```
pub struct Checker {
    /// Configuration.
    config: CheckerConfig,
    /// Owner of the term factory shared with the supplier.
    session: Session,
    /// Static analysis collaborator.
    supplier: Box<dyn StateSupplier>,
    /// Library call models for the configured string strategy.
    desugarer: Desugarer,
    /// Rewrite passes (built once in the constructor).
    pipeline: PassPipeline,
    /// Decision procedure.
    backend: Box<dyn SolverBackend>,
    /// Points-to collaborator consulted by memory spacing.
    points_to: Box<dyn PointsTo>,
    /// Trace record receiver.
    sink: Box<dyn DiagnosticsSink>,
}

impl Checker {
    /// Creates a checker with the bounded reference backend, type-based points-to
    /// information and a [`LogSink`].
    ///
    /// # Arguments
    ///
    /// * `session` - The session whose factory built the supplied states.
    /// * `supplier` - The source of program point states.
    /// * `config` - Pipeline, string model and solver settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAdapter`](crate::Error::DuplicateAdapter) if the string
    /// models of the configured strategy conflict.
    pub fn new(
        session: Session,
        supplier: impl StateSupplier + 'static,
        config: CheckerConfig,
    ) -> Result<Self> {
        let desugarer = Desugarer::for_strategy(config.strings)?;
        let pipeline = PassPipeline::from_config(&config.pipeline);
        let backend = BoundedSolver::new(config.solver.clone());
        Ok(Self {
            config,
            session,
            supplier: Box::new(supplier),
            desugarer,
            pipeline,
            backend: Box::new(backend),
            points_to: Box::new(TypePointsTo),
            sink: Box::new(LogSink),
        })
    }

    /// Replaces the solving backend.
    #[must_use]
    pub fn with_backend(mut self, backend: impl SolverBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Replaces the points-to collaborator.
    #[must_use]
    pub fn with_points_to(mut self, points_to: impl PointsTo + 'static) -> Self {
        self.points_to = Box::new(points_to);
        self
    }

    /// Replaces the diagnostics sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Replaces the desugarer, e.g. with one holding additional adapters.
    #[must_use]
    pub fn with_desugarer(mut self, desugarer: Desugarer) -> Self {
        self.desugarer = desugarer;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The name of the solving backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Decides whether `point` is reachable.
    ///
    /// A point without a supplied state is [`SolverResult::Unknown`] with the reason
    /// [`NO_STATE`]. Backend failures and timeouts are `Unknown` as well.
    ///
    /// # Errors
    ///
    /// Returns an error only if preparing the state hits a construction error, which
    /// means the supplied state or an adapter is ill-formed.
    pub fn check_reachable(&self, point: &ProgramPoint) -> Result<SolverResult> {
        let start = Instant::now();
        let Some(state) = self.supplier.instruction_state(point) else {
            log::warn!("{point}: {NO_STATE}");
            let result = SolverResult::Unknown(NO_STATE.to_string());
            self.sink.record(&TraceRecord::Verdict {
                point: point.clone(),
                result: result.clone(),
                elapsed: start.elapsed(),
            });
            return Ok(result);
        };
        self.sink.record(&TraceRecord::PointRecognized {
            point: point.clone(),
            predicates: state.size(),
        });

        let prepared = self.prepare(&state)?;
        log::debug!(
            "{point}: prepared with {} pipeline events",
            prepared.events.len()
        );
        self.sink.record(&TraceRecord::StatePrepared {
            point: point.clone(),
            projection: Projection::Full,
            before: state.clone(),
            after: prepared.state.clone(),
        });
        self.sink.record(&TraceRecord::StatePrepared {
            point: point.clone(),
            projection: Projection::Path,
            before: state.filter_by_type(PredicateTypes::PATH),
            after: prepared.path.clone(),
        });

        let result = self
            .backend
            .is_path_possible(&prepared.state, &prepared.path);
        self.sink.record(&TraceRecord::Verdict {
            point: point.clone(),
            result: result.clone(),
            elapsed: start.elapsed(),
        });
        Ok(result)
    }

    /// Checks several points in parallel.
    ///
    /// Returns one verdict per point, in the order of `points`.
    pub fn check_many(&self, points: &[ProgramPoint]) -> Vec<Result<SolverResult>> {
        points
            .par_iter()
            .map(|point| self.check_reachable(point))
            .collect()
    }

    /// Desugars `state`, rewrites it to normal form and projects its path predicates.
    ///
    /// The projection is taken from the rewritten full state, so path conditions that
    /// refer to assigned variables already see their definitions substituted, and is
    /// then rewritten on its own.
    ///
    /// # Errors
    ///
    /// Propagates construction errors of the desugarer and the passes.
    pub fn prepare(&self, state: &PredicateState) -> Result<PreparedQuery> {
        let events = EventLog::new();
        let ctx = PassContext::new(self.session.factory(), &events, self.points_to.as_ref());
        let desugared = self.desugarer.run(state, &ctx)?;
        let full = self.pipeline.run(&desugared, &ctx)?;
        let path = self
            .pipeline
            .run(&full.filter_by_type(PredicateTypes::PATH), &ctx)?;
        Ok(PreparedQuery {
            state: full,
            path,
            events,
        })
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("strings", &self.desugarer.strategy())
            .field("passes", &self.pipeline.pass_names())
            .field("backend", &self.backend.name())
            .finish()
    }
}
